use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::completion::LocalDayQuery;
use crate::models::habit::{CreateHabitRequest, Habit, HabitWithStatus};
use crate::services::habits as habit_service;
use crate::AppState;

pub async fn list_habits(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<Vec<HabitWithStatus>>> {
    let engine = state.engine(query.tz_offset)?;

    let habits = habit_service::habits_with_status(&state, &auth_user.id, &engine, Utc::now()).await?;
    Ok(Json(habits))
}

pub async fn create_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateHabitRequest>,
) -> AppResult<Json<Habit>> {
    body.validate()?;
    let habit = habit_service::create_habit(&state, &auth_user.id, body).await?;
    Ok(Json(habit))
}

pub async fn delete_habit(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    habit_service::delete_habit(&state, &auth_user.id, &habit_id).await?;
    Ok(Json(serde_json::json!({ "deleted": true, "id": habit_id })))
}
