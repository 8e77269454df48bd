use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, SecondsFormat, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use habitstreak_api::{
    config::Config,
    router,
    store::{Collection, InMemoryStore},
    AppState,
};

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    session: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(session) = session {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", session));
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
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn sign_up(app: &Router, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": email, "password": "secret123", "name": "Tester" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    (
        body["session"].as_str().unwrap().to_string(),
        body["user"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_habit(app: &Router, session: &str, title: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/habits",
        Some(session),
        Some(json!({ "title": title, "description": "", "frequency": "daily" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["id"].as_str().unwrap().to_string()
}

fn app() -> Router {
    router(AppState::in_memory(Config::default()))
}

#[tokio::test]
async fn health_reports_ok() {
    let app = app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/readyz", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["document_store"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/habits", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], 401);

    let (status, _) = send(&app, "GET", "/api/streaks", Some("not-a-session"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sign_up_validates_input() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": "", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["message"], "Please fill in all fields");

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": "a@example.com", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["error"]["message"],
        "Password must be at least 6 characters long"
    );
}

#[tokio::test]
async fn sign_in_and_out() {
    let app = app();
    sign_up(&app, "a@example.com").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/signup",
        None,
        Some(json!({ "email": "a@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/signin",
        None,
        Some(json!({ "email": "a@example.com", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/signin",
        None,
        Some(json!({ "email": "a@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session = body["session"].as_str().unwrap().to_string();

    let (status, me) = send(&app, "GET", "/api/me", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "a@example.com");

    let (status, _) = send(&app, "POST", "/api/auth/signout", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/api/me", Some(&session), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn complete_habit_and_read_streaks() {
    let app = app();
    let (session, _) = sign_up(&app, "a@example.com").await;
    let habit_id = create_habit(&app, &session, "Read").await;

    let (_, habits) = send(&app, "GET", "/api/habits", Some(&session), None).await;
    assert_eq!(habits[0]["completed_today"], false);
    assert_eq!(habits[0]["title"], "Read");
    assert_eq!(habits[0]["streak_count"], 0);

    let uri = format!("/api/habits/{}/complete", habit_id);
    let (status, first) = send(&app, "POST", &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);
    let (_, second) = send(&app, "POST", &uri, Some(&session), None).await;
    assert_eq!(second["created"], false);

    let (_, habits) = send(&app, "GET", "/api/habits", Some(&session), None).await;
    assert_eq!(habits[0]["completed_today"], true);
    assert_eq!(habits[0]["streak_count"], 1);

    let (_, today) = send(&app, "GET", "/api/completions/today", Some(&session), None).await;
    assert_eq!(today["habit_ids"], json!([habit_id]));

    let (status, report) = send(&app, "GET", "/api/streaks", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["dropped_records"], 0);
    assert_eq!(
        report["rankings"][0]["stats"],
        json!({ "current_streak": 1, "best_streak": 1, "total_completions": 1 })
    );

    let uri = format!("/api/habits/{}/streak", habit_id);
    let (status, streak) = send(&app, "GET", &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(streak["habit_id"], habit_id.as_str());
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["dropped_records"], 0);
}

#[tokio::test]
async fn habits_are_private_and_deletable() {
    let app = app();
    let (alice, _) = sign_up(&app, "alice@example.com").await;
    let (bob, _) = sign_up(&app, "bob@example.com").await;
    let habit_id = create_habit(&app, &alice, "Meditate").await;

    let (_, bobs) = send(&app, "GET", "/api/habits", Some(&bob), None).await;
    assert_eq!(bobs, json!([]));

    let uri = format!("/api/habits/{}", habit_id);
    let (status, _) = send(&app, "DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "POST", &format!("{}/complete", uri), Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);
    let (status, _) = send(&app, "DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn habit_title_is_required() {
    let app = app();
    let (session, _) = sign_up(&app, "a@example.com").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/habits",
        Some(&session),
        Some(json!({ "title": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn leaderboard_keeps_top_three_in_stable_order() {
    let app = app();
    let (session, _) = sign_up(&app, "a@example.com").await;
    let mut ids = Vec::new();
    for title in ["A", "B", "C", "D"] {
        ids.push(create_habit(&app, &session, title).await);
    }
    send(&app, "POST", &format!("/api/habits/{}/complete", ids[2]), Some(&session), None).await;

    let (status, top) = send(&app, "GET", "/api/streaks/leaderboard", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = top
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["habit"]["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["C", "A", "B"]);
}

#[tokio::test]
async fn rejects_impossible_offsets() {
    let app = app();
    let (session, _) = sign_up(&app, "a@example.com").await;
    let (status, _) = send(&app, "GET", "/api/streaks?tz_offset=9999", Some(&session), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, "GET", "/api/streaks?tz_offset=-300", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unreadable_history_is_dropped_not_fatal() {
    let store = InMemoryStore::new();
    let state = AppState {
        store: Arc::new(store.clone()),
        ..AppState::in_memory(Config::default())
    };
    let app = router(state);
    let (session, user_id) = sign_up(&app, "a@example.com").await;
    let habit_id = create_habit(&app, &session, "Journal").await;

    let now = Utc::now();
    let stamps = [
        json!((now - Duration::days(2)).to_rfc3339_opts(SecondsFormat::Millis, true)),
        json!((now - Duration::days(1)).to_rfc3339_opts(SecondsFormat::Millis, true)),
        json!("31/31/2031"),
        Value::Null,
    ];
    for (i, stamp) in stamps.into_iter().enumerate() {
        store
            .insert_raw(
                Collection::Completions,
                json!({
                    "$id": format!("seed{i}"),
                    "user_id": user_id,
                    "habit_id": habit_id,
                    "completed_at": stamp,
                }),
            )
            .await;
    }

    let (status, report) = send(&app, "GET", "/api/streaks", Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["dropped_records"], 2);
    assert_eq!(report["warnings"].as_array().unwrap().len(), 2);
    assert_eq!(
        report["rankings"][0]["stats"],
        json!({ "current_streak": 2, "best_streak": 2, "total_completions": 2 })
    );

    let uri = format!("/api/habits/{}/streak", habit_id);
    let (status, streak) = send(&app, "GET", &uri, Some(&session), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(streak["current_streak"], 2);
    assert_eq!(streak["dropped_records"], 2);
    assert_eq!(streak["warnings"].as_array().unwrap().len(), 2);

    let (_, habits) = send(&app, "GET", "/api/habits", Some(&session), None).await;
    assert_eq!(habits[0]["streak_count"], 2);
}
