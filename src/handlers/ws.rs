use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::services::streaks::streak_report;
use crate::streak::StreakEngine;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    session: Option<String>,
    tz_offset: Option<i32>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    let user_id = match authenticate_ws(&state, query.session.as_deref()).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("WebSocket auth failed: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    let engine = match state.engine(query.tz_offset) {
        Ok(engine) => engine,
        Err(e) => return e.into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id, engine))
}

async fn authenticate_ws(state: &AppState, session: Option<&str>) -> Result<String, &'static str> {
    let session = session
        .filter(|s| !s.is_empty())
        .ok_or("Missing session query parameter")?;

    match state.auth.current_user(session).await {
        Ok(Some(user)) => Ok(user.id),
        Ok(None) => Err("Invalid or expired session"),
        Err(_) => Err("Session lookup failed"),
    }
}

/// Serialized `streaks_changed` message with a freshly computed report.
async fn refresh_message(state: &AppState, user_id: &str, engine: &StreakEngine, reason: &str) -> Option<String> {
    let today = engine.today_at(Utc::now());
    match streak_report(state, user_id, engine, today).await {
        Ok(report) => Some(
            serde_json::json!({
                "type": "streaks_changed",
                "reason": reason,
                "report": report,
            })
            .to_string(),
        ),
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Streak refresh failed");
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String, engine: StreakEngine) {
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!(user_id = %user_id, "WebSocket connection established");

    // Subscribe before the initial snapshot so no change slips in between.
    let mut rx = state.changes.subscribe();

    let uid = user_id.clone();
    let mut send_task = tokio::spawn(async move {
        if let Some(msg) = refresh_message(&state, &uid, &engine, "connected").await {
            if sender.send(Message::Text(msg)).await.is_err() {
                return;
            }
        }

        loop {
            let reason = match rx.recv().await {
                Ok(event) if event.user_id == uid && event.requires_refresh() => {
                    event.channel(&state.config.backend.database_id)
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(user_id = %uid, missed, "Change feed lagged, refreshing");
                    "lagged".to_string()
                }
                Err(RecvError::Closed) => break,
            };

            let Some(msg) = refresh_message(&state, &uid, &engine, &reason).await else {
                continue;
            };
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let uid = user_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    tracing::debug!(user_id = %uid, message = %text, "WebSocket message received");
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!(user_id = %user_id, "WebSocket connection closed");
}
