use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::cosmos::{CosmosClient, Document, Repository, SqlQuery};
use crate::errors::AppError;
use crate::goals::models::{Goal, GoalModel, GoalUpdate, NewGoal};
use crate::models::required_text;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FitnessKind {
    Workout,
    Measurement,
    Goal,
}

impl FitnessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FitnessKind::Workout => "workout",
            FitnessKind::Measurement => "measurement",
            FitnessKind::Goal => "goal",
        }
    }
}

/// Any document in the `fitness` container. Type-specific fields are kept in `details`
/// and flattened into the stored JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FitnessDocument {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: FitnessKind,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl Document for FitnessDocument {
    const CONTAINER: &'static str = "fitness";
    const KIND: &'static str = "Fitness record";

    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl FitnessDocument {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(Value::as_f64)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.details.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sets: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutInput {
    pub workout_type: String,
    /// Minutes.
    pub duration: u32,
    #[serde(default)]
    pub calories_burned: Option<u32>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementInput {
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub body_fat: Option<f64>,
    #[serde(default)]
    pub measurements: BTreeMap<String, f64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitnessFilter {
    #[serde(rename = "type")]
    pub kind: Option<FitnessKind>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl FitnessFilter {
    fn contains(&self, date: &DateTime<Utc>) -> bool {
        let day = date.date_naive();
        self.from.map_or(true, |from| day >= from) && self.to.map_or(true, |to| day <= to)
    }
}

/// Fields that identify or timestamp a document and cannot be patched.
const IMMUTABLE_FIELDS: [&str; 5] = ["id", "userId", "type", "createdAt", "updatedAt"];

const GOAL_FIELDS: [&str; 6] = [
    "title",
    "description",
    "category",
    "targetDate",
    "progress",
    "achieved",
];

pub struct FitnessModel {
    repo: Repository<FitnessDocument>,
    client: Arc<CosmosClient>,
}

impl FitnessModel {
    pub fn new(client: Arc<CosmosClient>) -> Self {
        Self {
            repo: Repository::new(client.clone()),
            client,
        }
    }

    pub async fn log_workout(
        &self,
        user_id: &str,
        input: WorkoutInput,
    ) -> Result<FitnessDocument, AppError> {
        let workout_type = check_workout(&input)?;
        let details = without_nulls(json!({
            "workoutType": workout_type,
            "duration": input.duration,
            "caloriesBurned": input.calories_burned,
            "exercises": input.exercises,
            "notes": input.notes,
        }));
        let record = self
            .insert(user_id, FitnessKind::Workout, input.date, details)
            .await?;
        info!(user_id, id = %record.id, "Logged workout");
        Ok(record)
    }

    pub async fn log_measurement(
        &self,
        user_id: &str,
        input: MeasurementInput,
    ) -> Result<FitnessDocument, AppError> {
        check_measurement(&input)?;
        let measurements = (!input.measurements.is_empty()).then_some(input.measurements);
        let details = without_nulls(json!({
            "weight": input.weight,
            "bodyFat": input.body_fat,
            "measurements": measurements,
            "notes": input.notes,
        }));
        let record = self
            .insert(user_id, FitnessKind::Measurement, input.date, details)
            .await?;
        info!(user_id, id = %record.id, "Logged measurement");
        Ok(record)
    }

    /// Goals live in the fitness container; the goal model owns their invariants.
    pub async fn create_goal(&self, user_id: &str, input: NewGoal) -> Result<Goal, AppError> {
        GoalModel::new(self.client.clone()).create(user_id, input).await
    }

    pub async fn get_record(&self, user_id: &str, id: &str) -> Result<FitnessDocument, AppError> {
        self.repo.find(user_id, id).await
    }

    /// Records matching `filter`, newest first.
    pub async fn list_records(
        &self,
        user_id: &str,
        filter: &FitnessFilter,
    ) -> Result<Vec<FitnessDocument>, AppError> {
        let mut text = String::from("SELECT * FROM c WHERE c.userId = @userId");
        if filter.kind.is_some() {
            text.push_str(" AND c.type = @type");
        }
        let mut query = SqlQuery::new(text).param("@userId", user_id);
        if let Some(kind) = filter.kind {
            query = query.param("@type", kind.as_str());
        }

        let mut records: Vec<FitnessDocument> = self
            .repo
            .query(user_id, query)
            .await?
            .into_iter()
            .filter(|r| filter.contains(&r.date))
            .collect();
        records.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(records)
    }

    /// Merges `patch` into the stored record and replaces it. `null` removes an optional field.
    ///
    /// The merged record must still pass the checks its kind is created with; goals are
    /// updated through the goal model.
    pub async fn update_fitness_record(
        &self,
        user_id: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<FitnessDocument, AppError> {
        if patch.is_empty() {
            return Err(AppError::validation("no fields to update"));
        }
        if let Some(field) = patch.keys().find(|k| IMMUTABLE_FIELDS.contains(&k.as_str())) {
            return Err(AppError::validation(format!("{field} cannot be updated")));
        }

        let mut record = self.repo.find(user_id, id).await?;
        if record.kind == FitnessKind::Goal {
            return self.update_goal(user_id, id, patch).await;
        }

        for (key, value) in patch {
            if key == "date" {
                record.date = serde_json::from_value(value)
                    .map_err(|_| AppError::validation("date must be an RFC 3339 timestamp"))?;
            } else if value.is_null() {
                record.details.remove(&key);
            } else {
                record.details.insert(key, value);
            }
        }

        match record.kind {
            FitnessKind::Workout => {
                let input: WorkoutInput = decode_details(record.kind, &record.details)?;
                let workout_type = check_workout(&input)?;
                record
                    .details
                    .insert("workoutType".to_string(), Value::String(workout_type));
            }
            FitnessKind::Measurement => {
                let input: MeasurementInput = decode_details(record.kind, &record.details)?;
                check_measurement(&input)?;
            }
            FitnessKind::Goal => {}
        }

        record.updated_at = Utc::now();
        self.repo.replace(&record).await
    }

    async fn update_goal(
        &self,
        user_id: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<FitnessDocument, AppError> {
        if let Some(field) = patch.keys().find(|k| !GOAL_FIELDS.contains(&k.as_str())) {
            return Err(AppError::validation(format!(
                "{field} cannot be updated on a goal"
            )));
        }
        if let Some((field, _)) = patch.iter().find(|(_, v)| v.is_null()) {
            return Err(AppError::validation(format!(
                "{field} cannot be removed from a goal"
            )));
        }
        let update: GoalUpdate = serde_json::from_value(Value::Object(patch))
            .map_err(|e| AppError::validation(format!("invalid goal fields: {e}")))?;

        let goal = GoalModel::new(self.client.clone())
            .update(user_id, id, update)
            .await?;
        serde_json::to_value(goal)
            .and_then(serde_json::from_value)
            .map_err(|e| AppError::Internal(e.into()))
    }

    pub async fn delete_fitness_record(&self, user_id: &str, id: &str) -> Result<(), AppError> {
        self.repo.remove(user_id, id).await?;
        info!(user_id, id, "Deleted fitness record");
        Ok(())
    }

    async fn insert(
        &self,
        user_id: &str,
        kind: FitnessKind,
        date: Option<DateTime<Utc>>,
        details: Map<String, Value>,
    ) -> Result<FitnessDocument, AppError> {
        let now = Utc::now();
        let record = FitnessDocument {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            kind,
            date: date.unwrap_or(now),
            created_at: now,
            updated_at: now,
            details,
        };
        self.repo.insert(&record).await
    }
}

/// Validates a workout and returns its trimmed type.
fn check_workout(input: &WorkoutInput) -> Result<String, AppError> {
    let workout_type = required_text(&input.workout_type, "workoutType")?;
    if input.duration == 0 {
        return Err(AppError::validation("duration must be greater than zero"));
    }
    Ok(workout_type)
}

fn check_measurement(input: &MeasurementInput) -> Result<(), AppError> {
    if input.weight.is_none() && input.body_fat.is_none() && input.measurements.is_empty() {
        return Err(AppError::validation(
            "a measurement needs weight, bodyFat or at least one body measurement",
        ));
    }
    let out_of_range = input.weight.is_some_and(|w| w <= 0.0)
        || input.body_fat.is_some_and(|b| !(0.0..=100.0).contains(&b))
        || input.measurements.values().any(|v| *v <= 0.0);
    if out_of_range {
        return Err(AppError::validation("measurement values are out of range"));
    }
    Ok(())
}

/// Reads merged `details` back as the creation input of `kind`.
fn decode_details<T: DeserializeOwned>(
    kind: FitnessKind,
    details: &Map<String, Value>,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(details.clone()))
        .map_err(|e| AppError::validation(format!("invalid {} fields: {e}", kind.as_str())))
}

fn without_nulls(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(mut map) => {
            map.retain(|_, v| !(v.is_null() || v.as_array().is_some_and(Vec::is_empty)));
            map
        }
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals::models::GoalFilter;
    use chrono::{Duration, TimeZone};

    fn model() -> FitnessModel {
        FitnessModel::new(Arc::new(CosmosClient::mock()))
    }

    fn workout(kind: &str, minutes: u32) -> WorkoutInput {
        WorkoutInput {
            workout_type: kind.to_string(),
            duration: minutes,
            calories_burned: Some(300),
            exercises: vec![],
            notes: None,
            date: None,
        }
    }

    fn measurement(weight: f64) -> MeasurementInput {
        MeasurementInput {
            weight: Some(weight),
            body_fat: None,
            measurements: BTreeMap::new(),
            notes: None,
            date: None,
        }
    }

    #[tokio::test]
    async fn test_create_then_read_returns_same_record() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        assert_eq!(created.kind, FitnessKind::Workout);
        assert_eq!(created.text("workoutType"), Some("running"));
        assert_eq!(created.number("duration"), Some(30.0));
        assert!(!created.details.contains_key("notes"));

        let read = model.get_record("u1", &created.id).await.unwrap();
        assert_eq!(read, created);
    }

    #[tokio::test]
    async fn test_workout_validation() {
        let model = model();
        assert!(matches!(
            model.log_workout("u1", workout("  ", 30)).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            model.log_workout("u1", workout("yoga", 0)).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_measurement_requires_a_value() {
        let model = model();
        let empty = MeasurementInput {
            weight: None,
            body_fat: None,
            measurements: BTreeMap::new(),
            notes: Some("nothing".to_string()),
            date: None,
        };
        assert!(matches!(
            model.log_measurement("u1", empty).await,
            Err(AppError::Validation(_))
        ));
        assert!(model.log_measurement("u1", measurement(72.5)).await.is_ok());
        assert!(model.log_measurement("u1", measurement(-1.0)).await.is_err());
    }

    #[tokio::test]
    async fn test_list_by_type_returns_exact_subset() {
        let model = model();
        model.log_workout("u1", workout("running", 30)).await.unwrap();
        model.log_workout("u1", workout("cycling", 45)).await.unwrap();
        model.log_measurement("u1", measurement(70.0)).await.unwrap();
        model.log_workout("u2", workout("swimming", 20)).await.unwrap();

        let filter = FitnessFilter {
            kind: Some(FitnessKind::Workout),
            ..Default::default()
        };
        let workouts = model.list_records("u1", &filter).await.unwrap();
        assert_eq!(workouts.len(), 2);
        assert!(workouts.iter().all(|w| w.kind == FitnessKind::Workout && w.user_id == "u1"));

        let everything = model.list_records("u1", &FitnessFilter::default()).await.unwrap();
        assert_eq!(everything.len(), 3);
    }

    #[tokio::test]
    async fn test_list_date_range_and_order() {
        let model = model();
        for day in [1, 10, 20] {
            let mut input = workout("running", 30);
            input.date = Some(Utc.with_ymd_and_hms(2024, 5, day, 7, 0, 0).unwrap());
            model.log_workout("u1", input).await.unwrap();
        }
        let filter = FitnessFilter {
            kind: None,
            from: NaiveDate::from_ymd_opt(2024, 5, 5),
            to: NaiveDate::from_ymd_opt(2024, 5, 20),
        };
        let records = model.list_records("u1", &filter).await.unwrap();
        let days: Vec<u32> = records
            .iter()
            .map(|r| chrono::Datelike::day(&r.date))
            .collect();
        assert_eq!(days, vec![20, 10]);
    }

    #[tokio::test]
    async fn test_update_replaces_only_given_fields() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let patch = json!({"duration": 42, "notes": "felt good", "caloriesBurned": null});
        let updated = model
            .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();

        assert_eq!(updated.number("duration"), Some(42.0));
        assert_eq!(updated.text("notes"), Some("felt good"));
        assert!(!updated.details.contains_key("caloriesBurned"));
        assert_eq!(updated.text("workoutType"), Some("running"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
        assert_eq!(model.get_record("u1", &created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_rejects_identity_fields() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        let patch = json!({"userId": "u2"});
        assert!(matches!(
            model
                .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_date_moves_record() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        let new_date = created.date - Duration::days(3);
        let patch = json!({ "date": new_date });
        let updated = model
            .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.date, new_date);
    }

    #[tokio::test]
    async fn test_goal_update_through_fitness_keeps_invariant() {
        let model = model();
        let goal = model
            .create_goal(
                "u1",
                NewGoal {
                    title: "Run 10k".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let patch = json!({"progress": 100});
        let updated = model
            .update_fitness_record("u1", &goal.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.details["achieved"], json!(true));
    }

    #[tokio::test]
    async fn test_goal_patch_cannot_break_goal_documents() {
        let model = model();
        let goals = GoalModel::new(model.client.clone());
        for title in ["Run 10k", "Swim 1k"] {
            model
                .create_goal(
                    "u1",
                    NewGoal {
                        title: title.to_string(),
                        ..Default::default()
                    },
                )
                .await
                .unwrap();
        }
        let target = goals.all("u1").await.unwrap()[1].clone();

        for patch in [
            json!({"title": null}),
            json!({"targetDate": "garbage"}),
            json!({"title": "   "}),
            json!({"date": "2024-05-01T00:00:00Z"}),
        ] {
            let result = model
                .update_fitness_record("u1", &target.id, patch.as_object().unwrap().clone())
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{patch}");
        }

        let page = goals.list("u1", &GoalFilter::default()).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(goals.get("u1", &target.id).await.unwrap(), target);
    }

    #[tokio::test]
    async fn test_goal_patch_goes_through_goal_rules() {
        let model = model();
        let goal = model
            .create_goal(
                "u1",
                NewGoal {
                    title: "Run 10k".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let patch = json!({"title": "  Run a half marathon ", "targetDate": "2024-09-01"});
        let updated = model
            .update_fitness_record("u1", &goal.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.kind, FitnessKind::Goal);
        assert_eq!(updated.text("title"), Some("Run a half marathon"));
        assert_eq!(updated.text("targetDate"), Some("2024-09-01"));
    }

    #[tokio::test]
    async fn test_workout_patch_is_revalidated() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();

        for patch in [
            json!({"duration": -5, "workoutType": null}),
            json!({"duration": 0}),
            json!({"duration": "long"}),
            json!({"workoutType": null}),
            json!({"workoutType": "  "}),
            json!({"caloriesBurned": -100}),
        ] {
            let result = model
                .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{patch}");
        }
        assert_eq!(model.get_record("u1", &created.id).await.unwrap(), created);

        let patch = json!({"workoutType": " trail running "});
        let updated = model
            .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated.text("workoutType"), Some("trail running"));
    }

    #[tokio::test]
    async fn test_measurement_patch_is_revalidated() {
        let model = model();
        let created = model.log_measurement("u1", measurement(72.5)).await.unwrap();

        for patch in [
            json!({"weight": null}),
            json!({"bodyFat": 150}),
            json!({"measurements": {"waist": -3.0}}),
        ] {
            let result = model
                .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
                .await;
            assert!(matches!(result, Err(AppError::Validation(_))), "{patch}");
        }
        assert_eq!(model.get_record("u1", &created.id).await.unwrap(), created);

        let patch = json!({"weight": null, "bodyFat": 18.5});
        let updated = model
            .update_fitness_record("u1", &created.id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert!(!updated.details.contains_key("weight"));
        assert_eq!(updated.number("bodyFat"), Some(18.5));
    }

    #[tokio::test]
    async fn test_delete_then_read_is_not_found() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        model.delete_fitness_record("u1", &created.id).await.unwrap();
        assert!(matches!(
            model.get_record("u1", &created.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            model.delete_fitness_record("u1", &created.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_other_users_record_is_forbidden() {
        let model = model();
        let created = model.log_workout("u1", workout("running", 30)).await.unwrap();
        assert!(matches!(
            model.get_record("u2", &created.id).await,
            Err(AppError::Forbidden)
        ));
    }
}
