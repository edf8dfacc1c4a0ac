// Cross-domain statistics, stored snapshots and the fitness summary.

pub mod handlers;
pub mod models;
pub mod prompts;
pub mod stats;
pub mod summary;
