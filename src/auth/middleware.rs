use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub session: String,
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    let secret = auth_header
        .strip_prefix("Bearer ")
        .filter(|s| !s.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let user = state
        .auth
        .current_user(secret)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let auth_user = AuthUser {
        id: user.id,
        email: user.email,
        session: secret.to_string(),
    };

    req.extensions_mut().insert(auth_user);
    Ok(next.run(req).await)
}
