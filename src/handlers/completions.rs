use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::completion::{CompletionOutcome, LocalDayQuery};
use crate::services::habits as habit_service;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct TodayCompletions {
    pub date: chrono::NaiveDate,
    pub habit_ids: Vec<String>,
}

pub async fn complete_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<CompletionOutcome>> {
    let engine = state.engine(query.tz_offset)?;
    let outcome =
        habit_service::complete_habit(&state, &auth_user.id, &habit_id, &engine, Utc::now()).await?;
    Ok(Json(outcome))
}

pub async fn list_today(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<TodayCompletions>> {
    let engine = state.engine(query.tz_offset)?;
    let now = Utc::now();
    let habit_ids = habit_service::completed_today(&state, &auth_user.id, &engine, now).await?;

    Ok(Json(TodayCompletions {
        date: engine.today_at(now),
        habit_ids,
    }))
}
