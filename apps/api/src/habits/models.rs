use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::models::required_text;
use crate::pagination::{paginate, Page};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
        }
    }

    /// First day of the period containing `date`. Weeks are ISO weeks starting Monday.
    fn period_start(&self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => date - Duration::days(date.weekday().num_days_from_monday() as i64),
        }
    }

    fn period_length(&self) -> Duration {
        match self {
            Frequency::Daily => Duration::days(1),
            Frequency::Weekly => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    pub id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency: Frequency,
    pub target_per_period: u32,
    /// Sorted, one entry per day.
    #[serde(default)]
    pub completions: Vec<NaiveDate>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for Habit {
    const CONTAINER: &'static str = "habits";
    const KIND: &'static str = "Habit";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl Habit {
    fn refresh_streaks(&mut self, today: NaiveDate) {
        let streaks = compute_streaks(&self.completions, self.frequency, self.target_per_period, today);
        self.current_streak = streaks.current;
        self.longest_streak = streaks.longest;
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewHabit {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub target_per_period: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub frequency: Option<Frequency>,
    pub target_per_period: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitFilter {
    pub frequency: Option<Frequency>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckIn {
    /// Defaults to today (UTC).
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

/// Daily habits complete a period with one check-in, so only weekly habits may ask for more.
fn validate_target(frequency: Frequency, target: u32) -> Result<u32, AppError> {
    let max = match frequency {
        Frequency::Daily => 1,
        Frequency::Weekly => 7,
    };
    if target == 0 || target > max {
        return Err(AppError::validation(format!(
            "targetPerPeriod for a {} habit must be between 1 and {max}",
            frequency.as_str()
        )));
    }
    Ok(target)
}

/// Current and longest run of consecutive satisfied periods.
///
/// A period is satisfied when it holds at least `target` completions. The current streak
/// is the run ending in the period containing `today` or the one before it (so a streak
/// survives until the current period is over); otherwise it is 0.
pub fn compute_streaks(
    completions: &[NaiveDate],
    frequency: Frequency,
    target: u32,
    today: NaiveDate,
) -> Streaks {
    let mut per_period: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for date in completions {
        *per_period.entry(frequency.period_start(*date)).or_default() += 1;
    }
    let step = frequency.period_length();
    let satisfied = per_period
        .into_iter()
        .filter(|(_, count)| *count >= target.max(1))
        .map(|(start, _)| start);

    let mut longest = 0;
    let mut run = 0;
    let mut last: Option<NaiveDate> = None;
    for start in satisfied {
        run = match last {
            Some(prev) if prev + step == start => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        last = Some(start);
    }

    let this_period = frequency.period_start(today);
    let current = match last {
        Some(end) if end == this_period || end + step == this_period => run,
        _ => 0,
    };
    Streaks { current, longest }
}

pub struct HabitModel {
    repo: Repository<Habit>,
}

impl HabitModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client),
        }
    }

    pub async fn create(&self, user_id: &str, input: NewHabit) -> Result<Habit, AppError> {
        let name = required_text(&input.name, "name")?;
        let frequency = input.frequency.unwrap_or_default();
        let target_per_period = validate_target(frequency, input.target_per_period.unwrap_or(1))?;
        let now = Utc::now();

        let habit = Habit {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name,
            description: input.description,
            frequency,
            target_per_period,
            completions: Vec::new(),
            current_streak: 0,
            longest_streak: 0,
            created_at: now,
            updated_at: now,
        };
        let habit = self.repo.insert(&habit).await?;
        info!(user_id, id = %habit.id, frequency = frequency.as_str(), "Created habit");
        Ok(habit)
    }

    /// Streaks are recomputed against today so a lapsed streak reads as 0.
    pub async fn get(&self, user_id: &str, id: &str) -> Result<Habit, AppError> {
        let mut habit = self.repo.find(user_id, id).await?;
        habit.refresh_streaks(Utc::now().date_naive());
        Ok(habit)
    }

    pub async fn list(&self, user_id: &str, filter: &HabitFilter) -> Result<Page<Habit>, AppError> {
        let habits = self.all(user_id, filter.frequency).await?;
        Ok(paginate(habits, filter.page, filter.page_size))
    }

    /// Every habit of the user, oldest first, with fresh streaks.
    pub async fn all(&self, user_id: &str, frequency: Option<Frequency>) -> Result<Vec<Habit>, AppError> {
        let mut text = String::from("SELECT * FROM c WHERE c.userId = @userId");
        if frequency.is_some() {
            text.push_str(" AND c.frequency = @frequency");
        }
        let mut query = SqlQuery::new(text).param("@userId", user_id);
        if let Some(frequency) = frequency {
            query = query.param("@frequency", frequency.as_str());
        }

        let today = Utc::now().date_naive();
        let mut habits = self.repo.query(user_id, query).await?;
        for habit in habits.iter_mut() {
            habit.refresh_streaks(today);
        }
        habits.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(habits)
    }

    pub async fn update(&self, user_id: &str, id: &str, update: HabitUpdate) -> Result<Habit, AppError> {
        let mut habit = self.repo.find(user_id, id).await?;

        if let Some(name) = update.name {
            habit.name = required_text(&name, "name")?;
        }
        if let Some(description) = update.description {
            habit.description = Some(description);
        }
        if let Some(frequency) = update.frequency {
            habit.frequency = frequency;
            if update.target_per_period.is_none() {
                habit.target_per_period = habit.target_per_period.min(match frequency {
                    Frequency::Daily => 1,
                    Frequency::Weekly => 7,
                });
            }
        }
        if let Some(target) = update.target_per_period {
            habit.target_per_period = target;
        }
        habit.target_per_period = validate_target(habit.frequency, habit.target_per_period)?;
        habit.refresh_streaks(Utc::now().date_naive());
        habit.updated_at = Utc::now();

        self.repo.replace(&habit).await
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await
    }

    /// Records a completion on `date` (default today). Checking in twice on the same day
    /// leaves the habit unchanged.
    pub async fn check_in(&self, user_id: &str, id: &str, date: Option<NaiveDate>) -> Result<Habit, AppError> {
        let today = Utc::now().date_naive();
        let date = date.unwrap_or(today);
        if date > today {
            return Err(AppError::validation("cannot check in on a future date"));
        }

        let mut habit = self.repo.find(user_id, id).await?;
        if let Err(position) = habit.completions.binary_search(&date) {
            habit.completions.insert(position, date);
            habit.refresh_streaks(today);
            habit.updated_at = Utc::now();
            habit = self.repo.replace(&habit).await?;
            info!(user_id, id, %date, streak = habit.current_streak, "Habit check-in");
        } else {
            habit.refresh_streaks(today);
        }
        Ok(habit)
    }
}
