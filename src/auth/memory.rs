use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

use super::password::{hash_password, verify_password};
use super::AuthProvider;
use crate::error::{AppError, AppResult};
use crate::models::user::{Session, User};

const SESSION_TTL_DAYS: i64 = 30;

struct Account {
    user: User,
    password_hash: String,
}

struct StoredSession {
    user_id: String,
    expires_at: DateTime<Utc>,
}

/// Accounts and sessions held in process memory. Only hashes of session secrets are kept.
#[derive(Clone, Default)]
pub struct InMemoryAuth {
    accounts: Arc<RwLock<HashMap<String, Account>>>,
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    /// Verified against when the email is unknown, so both paths cost one argon2 check.
    dummy_hash: Arc<OnceCell<String>>,
}

impl InMemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    async fn dummy_hash(&self) -> AppResult<&str> {
        self.dummy_hash
            .get_or_try_init(|| async { hash_password("not-a-real-password") })
            .await
            .map(String::as_str)
    }

    async fn open_session(&self, user: &User) -> Session {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let secret = hex::encode(raw);
        let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);

        self.sessions.write().await.insert(
            hash_secret(&secret),
            StoredSession {
                user_id: user.id.clone(),
                expires_at,
            },
        );

        Session {
            secret,
            user_id: user.id.clone(),
            expires_at: Some(expires_at),
        }
    }
}

/// SHA-256 of a session secret, lowercase hex.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl AuthProvider for InMemoryAuth {
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AppResult<(User, Session)> {
        let key = email.trim().to_lowercase();
        let password_hash = hash_password(password)?;

        let user = {
            let mut accounts = self.accounts.write().await;
            if accounts.contains_key(&key) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            let user = User {
                id: Uuid::new_v4().simple().to_string(),
                email: key.clone(),
                name: name.to_string(),
            };
            accounts.insert(
                key,
                Account {
                    user: user.clone(),
                    password_hash,
                },
            );
            user
        };

        tracing::info!(user_id = %user.id, "Account created");
        let session = self.open_session(&user).await;
        Ok((user, session))
    }

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<(User, Session)> {
        let key = email.trim().to_lowercase();
        let account = {
            let accounts = self.accounts.read().await;
            accounts
                .get(&key)
                .map(|a| (a.user.clone(), a.password_hash.clone()))
        };

        let Some((user, password_hash)) = account else {
            verify_password(password, self.dummy_hash().await?)?;
            return Err(AppError::Unauthorized);
        };
        if !verify_password(password, &password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let session = self.open_session(&user).await;
        Ok((user, session))
    }

    async fn sign_out(&self, secret: &str) -> AppResult<()> {
        self.sessions.write().await.remove(&hash_secret(secret));
        Ok(())
    }

    async fn current_user(&self, secret: &str) -> AppResult<Option<User>> {
        let key = hash_secret(secret);
        let user_id = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(&key) {
                Some(s) if s.expires_at > Utc::now() => s.user_id.clone(),
                Some(_) => {
                    sessions.remove(&key);
                    return Ok(None);
                }
                None => return Ok(None),
            }
        };

        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.user.id == user_id)
            .map(|a| a.user.clone()))
    }
}
