//! Typed client for the LifeTracker API.
//!
//! `AuthSession` signs requests, `QueryCache` keeps fetched lists and details fresh for five
//! minutes, and `ResourceClient` runs optimistic create/update/delete with rollback.

pub mod auth;
pub mod cache;
pub mod error;
pub mod models;
pub mod resources;
pub mod transport;

pub use auth::{
    create_auth_provider, Account, AuthConfig, AuthProvider, AuthSession, InteractiveLogin,
    MockAuthProvider, TokenSet,
};
pub use cache::{QueryCache, DEFAULT_STALE_TIME};
pub use error::{AuthError, ClientError};
pub use models::{Activity, Frequency, Goal, Habit, LifeTrackerClient};
pub use resources::{ListParams, Notifier, Page, Resource, ResourceClient, TracingNotifier};
pub use transport::{HttpTransport, Transport};
