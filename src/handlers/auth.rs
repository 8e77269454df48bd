use axum::{extract::State, Extension, Json};
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::user::{SessionResponse, SignInRequest, SignUpRequest, User};
use crate::AppState;

pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> AppResult<Json<SessionResponse>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation("Please fill in all fields".into()));
    }
    body.validate()?;

    let name = body.name.as_deref().unwrap_or_default().trim();
    let (user, session) = state.auth.sign_up(body.email.trim(), &body.password, name).await?;

    Ok(Json(SessionResponse {
        session: session.secret,
        expires_at: session.expires_at,
        user,
    }))
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(body): Json<SignInRequest>,
) -> AppResult<Json<SessionResponse>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation("Please fill in all fields".into()));
    }
    body.validate()?;

    let (user, session) = state.auth.sign_in(body.email.trim(), &body.password).await?;
    tracing::info!(user_id = %user.id, "Signed in");

    Ok(Json(SessionResponse {
        session: session.secret,
        expires_at: session.expires_at,
        user,
    }))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<serde_json::Value>> {
    state.auth.sign_out(&auth_user.session).await?;
    tracing::info!(user_id = %auth_user.id, "Signed out");
    Ok(Json(serde_json::json!({ "signed_out": true })))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<User>> {
    let user = state
        .auth
        .current_user(&auth_user.session)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(Json(user))
}
