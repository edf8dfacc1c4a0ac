// Logged activities (anything that is not a workout).

pub mod handlers;
pub mod models;
