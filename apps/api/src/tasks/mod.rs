// Personal and project tasks.

pub mod handlers;
pub mod models;
