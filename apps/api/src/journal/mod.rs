// Journal entries with sentiment scoring.

pub mod handlers;
pub mod models;
pub mod sentiment;
