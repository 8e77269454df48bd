use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::AuthProvider;
use crate::config::BackendConfig;
use crate::error::{AppError, AppResult};
use crate::models::user::{Session, User};
use crate::store::appwrite::check;

/// Account API of the hosted backend. Server-side calls use the API key; calls made
/// on behalf of a user carry that user's session secret.
#[derive(Clone)]
pub struct AppwriteAuth {
    client: Client,
    config: BackendConfig,
}

#[derive(Deserialize)]
struct SessionDoc {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(default)]
    secret: String,
    #[serde(default)]
    expire: Option<DateTime<Utc>>,
}

impl AppwriteAuth {
    pub fn new(config: BackendConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    async fn create_session(&self, email: &str, password: &str) -> AppResult<Session> {
        let response = self
            .client
            .post(self.url("/account/sessions/email"))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let doc: SessionDoc = check(response).await?.json().await?;

        if doc.secret.is_empty() {
            return Err(AppError::Upstream(
                "session created without a secret; check the API key scopes".into(),
            ));
        }

        Ok(Session {
            secret: doc.secret,
            user_id: doc.user_id,
            expires_at: doc.expire,
        })
    }

    async fn session_user(&self, session: Session) -> AppResult<(User, Session)> {
        let user = self
            .current_user(&session.secret)
            .await?
            .ok_or_else(|| AppError::Upstream("new session was not accepted".into()))?;
        Ok((user, session))
    }
}

#[async_trait]
impl AuthProvider for AppwriteAuth {
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AppResult<(User, Session)> {
        let response = self
            .client
            .post(self.url("/users"))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
            .json(&json!({
                "userId": "unique()",
                "email": email,
                "password": password,
                "name": name,
            }))
            .send()
            .await?;
        let user: User = check(response).await?.json().await?;
        tracing::info!(user_id = %user.id, "Account created");

        let session = self.create_session(email, password).await?;
        Ok((user, session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<(User, Session)> {
        let session = self.create_session(email, password).await?;
        self.session_user(session).await
    }

    async fn sign_out(&self, secret: &str) -> AppResult<()> {
        let response = self
            .client
            .delete(self.url("/account/sessions/current"))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Session", secret)
            .send()
            .await?;
        match check(response).await {
            Ok(_) | Err(AppError::Unauthorized) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn current_user(&self, secret: &str) -> AppResult<Option<User>> {
        let response = self
            .client
            .get(self.url("/account"))
            .header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Session", secret)
            .send()
            .await?;
        match check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(AppError::Unauthorized) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
