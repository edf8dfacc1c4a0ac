// Prompt text for the fitness summary.

use super::stats::FitnessStats;

pub const FITNESS_SUMMARY_SYSTEM: &str = "You are an encouraging personal fitness coach. \
    Write a short summary (at most 120 words) of the user's recent training based only on \
    the statistics provided. Mention one concrete strength and one suggestion. \
    Respond in plain text without markdown or lists.";

pub fn fitness_summary_prompt(stats: &FitnessStats, days: u32) -> String {
    let types = if stats.workout_types.is_empty() {
        "none".to_string()
    } else {
        stats
            .workout_types
            .iter()
            .map(|(kind, count)| format!("{kind} x{count}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut prompt = format!(
        "Statistics for the last {days} days:\n\
         - workouts: {}\n\
         - total minutes: {}\n\
         - calories burned: {}\n\
         - workout types: {types}\n\
         - body measurements logged: {}\n",
        stats.workouts, stats.total_minutes, stats.total_calories, stats.measurements
    );
    if let Some(weight) = stats.latest_weight {
        prompt.push_str(&format!("- latest weight: {weight} kg\n"));
    }
    if let Some(change) = stats.weight_change {
        prompt.push_str(&format!("- weight change over the period: {change:+} kg\n"));
    }
    prompt
}
