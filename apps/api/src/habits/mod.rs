// Habits with check-ins and streak tracking.

pub mod handlers;
pub mod models;
