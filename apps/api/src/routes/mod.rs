pub mod health;
pub mod users;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::state::AppState;
use crate::{activities, analytics, fitness, goals, habits, journal, tasks};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/users/me", get(users::handle_me))
        // Fitness
        .route("/api/fitness", get(fitness::handlers::handle_list))
        .route(
            "/api/fitness/workouts",
            post(fitness::handlers::handle_log_workout),
        )
        .route(
            "/api/fitness/measurements",
            post(fitness::handlers::handle_log_measurement),
        )
        .route(
            "/api/fitness/:id",
            get(fitness::handlers::handle_get)
                .put(fitness::handlers::handle_update)
                .delete(fitness::handlers::handle_delete),
        )
        // Goals
        .route(
            "/api/goals",
            get(goals::handlers::handle_list).post(goals::handlers::handle_create),
        )
        .route(
            "/api/goals/:id",
            get(goals::handlers::handle_get)
                .put(goals::handlers::handle_update)
                .delete(goals::handlers::handle_delete),
        )
        // Tasks
        .route(
            "/api/tasks",
            get(tasks::handlers::handle_list).post(tasks::handlers::handle_create),
        )
        .route(
            "/api/tasks/:id",
            get(tasks::handlers::handle_get)
                .put(tasks::handlers::handle_update)
                .delete(tasks::handlers::handle_delete),
        )
        // Journal
        .route(
            "/api/journal",
            get(journal::handlers::handle_list).post(journal::handlers::handle_create),
        )
        .route(
            "/api/journal/:id",
            get(journal::handlers::handle_get)
                .put(journal::handlers::handle_update)
                .delete(journal::handlers::handle_delete),
        )
        // Activities
        .route(
            "/api/activities",
            get(activities::handlers::handle_list).post(activities::handlers::handle_create),
        )
        .route(
            "/api/activities/:id",
            get(activities::handlers::handle_get)
                .put(activities::handlers::handle_update)
                .delete(activities::handlers::handle_delete),
        )
        // Habits
        .route(
            "/api/habits",
            get(habits::handlers::handle_list).post(habits::handlers::handle_create),
        )
        .route(
            "/api/habits/:id",
            get(habits::handlers::handle_get)
                .put(habits::handlers::handle_update)
                .delete(habits::handlers::handle_delete),
        )
        .route(
            "/api/habits/:id/check-in",
            post(habits::handlers::handle_check_in),
        )
        // Analytics
        .route("/api/analytics", get(analytics::handlers::handle_snapshot))
        .route(
            "/api/openai/fitness-summary",
            post(analytics::handlers::handle_fitness_summary),
        )
        .with_state(state)
}

/// Restricts browsers to `origins`; any origin is allowed when the list is empty.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {origin:?}");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_reports_modes_without_auth() {
        let app = build_router(test_state());
        let (status, body) = send(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"], "mock");
        assert_eq!(body["auth"], "mock");
        assert_eq!(body["summaries"], "mock");
    }

    #[tokio::test]
    async fn test_cors_allows_only_configured_origins() {
        let app = build_router(test_state())
            .layer(cors_layer(&["https://app.example.com".to_string()]));
        let request = |origin: &str| {
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app
            .clone()
            .oneshot(request("https://app.example.com"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );

        let other = app.oneshot(request("https://evil.example")).await.unwrap();
        assert!(other
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let app = build_router(test_state());
        let (status, body) = send(&app, Method::GET, "/api/tasks", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_users_me_upserts_profile() {
        let app = build_router(test_state());
        let (status, body) =
            send(&app, Method::GET, "/api/users/me", Some("mock:alice"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "alice");
        assert_eq!(body["userId"], "alice");
    }

    #[tokio::test]
    async fn test_task_crud_flow() {
        let app = build_router(test_state());
        let token = Some("mock:alice");

        let (status, created) = send(
            &app,
            Method::POST,
            "/api/tasks",
            token,
            Some(json!({"title": "Renew passport", "priority": "high", "tags": ["admin"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "todo");
        let id = created["id"].as_str().unwrap().to_string();

        let (status, updated) = send(
            &app,
            Method::PUT,
            &format!("/api/tasks/{id}"),
            token,
            Some(json!({"status": "completed"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(updated["completedAt"].is_string());
        assert_eq!(updated["priority"], "high");

        let (status, listed) = send(
            &app,
            Method::GET,
            "/api/tasks?status=completed",
            token,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/tasks/{id}"), token, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, &format!("/api/tasks/{id}"), token, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_body_is_bad_request() {
        let app = build_router(test_state());
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/goals",
            Some("mock:alice"),
            Some(json!({"title": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            Method::PUT,
            "/api/fitness/anything",
            Some("mock:alice"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_foreign_document_is_forbidden() {
        let app = build_router(test_state());
        let (_, created) = send(
            &app,
            Method::POST,
            "/api/journal",
            Some("mock:alice"),
            Some(json!({"content": "private thoughts"})),
        )
        .await;
        let uri = format!("/api/journal/{}", created["id"].as_str().unwrap());

        let (status, body) = send(&app, Method::GET, &uri, Some("mock:mallory"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "FORBIDDEN");

        let (status, _) = send(&app, Method::DELETE, &uri, Some("mock:mallory"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, &uri, Some("mock:alice"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_fitness_update_cannot_corrupt_goals() {
        let app = build_router(test_state());
        let token = Some("mock:erin");
        let (_, goal) = send(
            &app,
            Method::POST,
            "/api/goals",
            token,
            Some(json!({"title": "Bench 100kg"})),
        )
        .await;
        let uri = format!("/api/fitness/{}", goal["id"].as_str().unwrap());

        let (status, body) =
            send(&app, Method::PUT, &uri, token, Some(json!({"title": null}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, page) = send(&app, Method::GET, "/api/goals", token, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["items"][0]["title"], "Bench 100kg");

        let (status, updated) =
            send(&app, Method::PUT, &uri, token, Some(json!({"progress": 100}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["achieved"], true);
    }

    #[tokio::test]
    async fn test_goal_list_is_paginated() {
        let app = build_router(test_state());
        for n in 0..3 {
            send(
                &app,
                Method::POST,
                "/api/goals",
                Some("mock:bob"),
                Some(json!({"title": format!("Goal {n}")})),
            )
            .await;
        }
        let (status, page) = send(
            &app,
            Method::GET,
            "/api/goals?page=2&pageSize=2",
            Some("mock:bob"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 3);
        assert_eq!(page["page"], 2);
        assert_eq!(page["pageSize"], 2);
        assert_eq!(page["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_habit_check_in_without_body() {
        let app = build_router(test_state());
        let (_, habit) = send(
            &app,
            Method::POST,
            "/api/habits",
            Some("mock:carol"),
            Some(json!({"name": "Read 10 pages"})),
        )
        .await;
        let uri = format!("/api/habits/{}/check-in", habit["id"].as_str().unwrap());

        let (status, checked) = send(&app, Method::POST, &uri, Some("mock:carol"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(checked["currentStreak"], 1);
        assert_eq!(checked["completions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fitness_summary_uses_logged_workouts() {
        let app = build_router(test_state());
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/fitness/workouts",
            Some("mock:dana"),
            Some(json!({"workoutType": "cycling", "duration": 45, "caloriesBurned": 400})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/openai/fitness-summary",
            Some("mock:dana"),
            Some(json!({"days": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["provider"], "mock");
        assert_eq!(body["days"], 7);
        assert_eq!(body["stats"]["workouts"], 1);
        assert!(body["summary"].as_str().unwrap().contains("cycling"));

        let (status, snapshot) =
            send(&app, Method::GET, "/api/analytics?days=7", Some("mock:dana"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["id"], "summary-dana");
        assert_eq!(snapshot["fitness"]["totalMinutes"], 45);
    }
}
