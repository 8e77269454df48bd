use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::auth::middleware::AuthUser;
use crate::error::AppResult;
use crate::models::completion::{HabitStreak, LocalDayQuery, RankedHabit, StreakReport};
use crate::services::streaks as streak_service;
use crate::streak::LEADERBOARD_SIZE;
use crate::AppState;

pub async fn get_streaks(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<StreakReport>> {
    let engine = state.engine(query.tz_offset)?;
    let today = engine.today_at(Utc::now());
    let report = streak_service::streak_report(&state, &auth_user.id, &engine, today).await?;
    Ok(Json(report))
}

pub async fn get_leaderboard(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<Vec<RankedHabit>>> {
    let engine = state.engine(query.tz_offset)?;
    let today = engine.today_at(Utc::now());
    let report = streak_service::streak_report(&state, &auth_user.id, &engine, today).await?;

    let top = report.rankings.into_iter().take(LEADERBOARD_SIZE).collect();
    Ok(Json(top))
}

pub async fn get_habit_streak(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(habit_id): Path<String>,
    Query(query): Query<LocalDayQuery>,
) -> AppResult<Json<HabitStreak>> {
    let engine = state.engine(query.tz_offset)?;
    let today = engine.today_at(Utc::now());
    let streak =
        streak_service::habit_streak(&state, &auth_user.id, &habit_id, &engine, today).await?;
    Ok(Json(streak))
}
