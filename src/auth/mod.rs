use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::user::{Session, User};

pub mod appwrite;
pub mod memory;
pub mod middleware;
pub mod password;

pub use appwrite::AppwriteAuth;
pub use memory::InMemoryAuth;

/// Account operations of the hosted backend. Session secrets are opaque to callers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> AppResult<(User, Session)>;

    async fn sign_in(&self, email: &str, password: &str) -> AppResult<(User, Session)>;

    async fn sign_out(&self, secret: &str) -> AppResult<()>;

    /// `None` when the secret is unknown or expired.
    async fn current_user(&self, secret: &str) -> AppResult<Option<User>>;
}
