//! Pure aggregation over already-windowed records. No I/O here.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::activities::models::Activity;
use crate::fitness::models::{FitnessDocument, FitnessKind};
use crate::goals::models::Goal;
use crate::habits::models::Habit;
use crate::journal::models::JournalEntry;
use crate::tasks::models::{Task, TaskStatus};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FitnessStats {
    pub workouts: usize,
    pub total_minutes: u64,
    pub total_calories: u64,
    pub measurements: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_change: Option<f64>,
    /// Workout count per `workoutType`.
    pub workout_types: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalStats {
    pub total: usize,
    pub achieved: usize,
    pub average_progress: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
    pub overdue: usize,
    pub completed_in_window: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub entries: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub average_sentiment: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub count: usize,
    pub total_minutes: u64,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HabitStats {
    pub total: usize,
    pub check_ins_in_window: usize,
    pub best_current_streak: u32,
}

/// Inclusive date window `[from, to]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Window {
    /// The `days` days ending on `today`.
    pub fn ending(today: NaiveDate, days: u32) -> Self {
        let span = days.max(1) as u64 - 1;
        Self {
            from: today - chrono::Days::new(span),
            to: today,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }
}

/// Workouts and measurements in `records`; goals are ignored.
pub fn compute_fitness_stats(records: &[FitnessDocument]) -> FitnessStats {
    let mut stats = FitnessStats::default();
    let mut weights: Vec<(chrono::DateTime<chrono::Utc>, f64)> = Vec::new();

    for record in records {
        match record.kind {
            FitnessKind::Workout => {
                stats.workouts += 1;
                stats.total_minutes += record.number("duration").unwrap_or(0.0).max(0.0) as u64;
                stats.total_calories +=
                    record.number("caloriesBurned").unwrap_or(0.0).max(0.0) as u64;
                let workout_type = record.text("workoutType").unwrap_or("other").to_lowercase();
                *stats.workout_types.entry(workout_type).or_default() += 1;
            }
            FitnessKind::Measurement => {
                stats.measurements += 1;
                if let Some(weight) = record.number("weight") {
                    weights.push((record.date, weight));
                }
            }
            FitnessKind::Goal => {}
        }
    }

    weights.sort_by(|a, b| a.0.cmp(&b.0));
    if let (Some(first), Some(last)) = (weights.first(), weights.last()) {
        stats.latest_weight = Some(last.1);
        if weights.len() > 1 {
            stats.weight_change = Some(round2(last.1 - first.1));
        }
    }
    stats
}

pub fn compute_goal_stats(goals: &[Goal]) -> GoalStats {
    let total = goals.len();
    let average_progress = if total == 0 {
        0.0
    } else {
        round2(goals.iter().map(|g| g.progress as f64).sum::<f64>() / total as f64)
    };
    GoalStats {
        total,
        achieved: goals.iter().filter(|g| g.achieved).count(),
        average_progress,
    }
}

pub fn compute_task_stats(tasks: &[Task], window: Window) -> TaskStats {
    let mut stats = TaskStats {
        total: tasks.len(),
        ..Default::default()
    };
    for task in tasks {
        *stats.by_status.entry(task.status.as_str().to_string()).or_default() += 1;
        if task.is_overdue(window.to) {
            stats.overdue += 1;
        }
        let completed_here = task.status == TaskStatus::Completed
            && task
                .completed_at
                .is_some_and(|at| window.contains(at.date_naive()));
        if completed_here {
            stats.completed_in_window += 1;
        }
    }
    stats
}

pub fn compute_journal_stats(entries: &[JournalEntry]) -> JournalStats {
    let average_sentiment = (!entries.is_empty()).then(|| {
        round2(entries.iter().map(|e| e.sentiment_score).sum::<f64>() / entries.len() as f64)
    });
    JournalStats {
        entries: entries.len(),
        average_sentiment,
    }
}

pub fn compute_activity_stats(activities: &[Activity]) -> ActivityStats {
    let mut stats = ActivityStats {
        count: activities.len(),
        ..Default::default()
    };
    for activity in activities {
        stats.total_minutes += activity.duration.unwrap_or(0) as u64;
        *stats.by_category.entry(activity.category.clone()).or_default() += 1;
    }
    stats
}

pub fn compute_habit_stats(habits: &[Habit], window: Window) -> HabitStats {
    HabitStats {
        total: habits.len(),
        check_ins_in_window: habits
            .iter()
            .flat_map(|h| h.completions.iter())
            .filter(|d| window.contains(**d))
            .count(),
        best_current_streak: habits.iter().map(|h| h.current_streak).max().unwrap_or(0),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Map, Value};

    fn record(kind: FitnessKind, day: u32, details: Value) -> FitnessDocument {
        let date = Utc.with_ymd_and_hms(2024, 4, day, 8, 0, 0).unwrap();
        let details: Map<String, Value> = match details {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        FitnessDocument {
            id: format!("r{day}"),
            user_id: "u1".to_string(),
            kind,
            date,
            created_at: date,
            updated_at: date,
            details,
        }
    }

    #[test]
    fn test_fitness_stats() {
        let records = vec![
            record(
                FitnessKind::Workout,
                1,
                json!({"workoutType": "Running", "duration": 30, "caloriesBurned": 300}),
            ),
            record(FitnessKind::Workout, 2, json!({"workoutType": "running", "duration": 25})),
            record(FitnessKind::Workout, 3, json!({"workoutType": "yoga", "duration": 60})),
            record(FitnessKind::Measurement, 4, json!({"weight": 80.5})),
            record(FitnessKind::Measurement, 1, json!({"weight": 81.0})),
            record(FitnessKind::Goal, 2, json!({"title": "x", "progress": 10})),
        ];
        let stats = compute_fitness_stats(&records);
        assert_eq!(stats.workouts, 3);
        assert_eq!(stats.total_minutes, 115);
        assert_eq!(stats.total_calories, 300);
        assert_eq!(stats.measurements, 2);
        assert_eq!(stats.latest_weight, Some(80.5));
        assert_eq!(stats.weight_change, Some(-0.5));
        assert_eq!(stats.workout_types.get("running"), Some(&2));
        assert_eq!(stats.workout_types.get("yoga"), Some(&1));
    }

    #[test]
    fn test_empty_fitness_stats() {
        let stats = compute_fitness_stats(&[]);
        assert_eq!(stats, FitnessStats::default());
    }

    #[test]
    fn test_window_is_inclusive() {
        let today = NaiveDate::from_ymd_opt(2024, 4, 30).unwrap();
        let window = Window::ending(today, 7);
        assert_eq!(window.from, NaiveDate::from_ymd_opt(2024, 4, 24).unwrap());
        assert!(window.contains(window.from));
        assert!(window.contains(today));
        assert!(!window.contains(today.succ_opt().unwrap()));
        assert_eq!(Window::ending(today, 0).from, today);
    }

    #[test]
    fn test_journal_average() {
        assert_eq!(compute_journal_stats(&[]).average_sentiment, None);
    }
}
