// HTTP-level tests for the schedule router.
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;
use shared_database::AppState;

fn app() -> axum::Router {
    schedule_routes(Arc::new(AppState::new(AppConfig::default())))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn template_upsert_roundtrips_through_the_weekly_schedule() {
    let app = app();
    let doctor_id = Uuid::new_v4();

    let payload = json!({
        "day_of_week": 0,
        "start_time": "09:00:00",
        "end_time": "17:00:00",
        "break_start": "13:00:00",
        "break_end": "14:00:00",
        "slot_duration_minutes": 30,
        "max_patients_per_slot": 1,
        "consultation_fee": 75.0,
        "is_active": true
    });

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/doctors/{}/template", doctor_id))
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/doctors/{}", doctor_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let schedule = body["schedule"].as_array().unwrap();
    assert_eq!(schedule.len(), 1);
    assert_eq!(schedule[0]["day_of_week"], 0);
    assert_eq!(schedule[0]["start_time"], "09:00:00");
}

#[tokio::test]
async fn invalid_template_window_returns_bad_request() {
    let app = app();
    let doctor_id = Uuid::new_v4();

    let payload = json!({
        "day_of_week": 0,
        "start_time": "17:00:00",
        "end_time": "09:00:00",
        "slot_duration_minutes": 30
    });

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/doctors/{}/template", doctor_id))
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("start"));
}
