// Fitness records: workouts, body measurements and goals, all in the `fitness` container.

pub mod handlers;
pub mod models;
