// Fitness goals with the progress/achieved invariant.

pub mod handlers;
pub mod models;
