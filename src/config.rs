use std::env;

use anyhow::{bail, Context};

/// Which document store / account backend the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Appwrite,
}

/// Connection details for the hosted document store and account API.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub habits_collection_id: String,
    pub completions_collection_id: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost/v1".into(),
            project_id: String::new(),
            api_key: String::new(),
            database_id: "habits-db".into(),
            habits_collection_id: "habits".into(),
            completions_collection_id: "habit_completions".into(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    pub cors_extra_origins: Vec<String>,

    pub storage: StorageBackend,
    pub backend: BackendConfig,

    /// Offset used to derive local calendar days when a request does not send one.
    pub default_utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            frontend_url: "http://localhost:8081".into(),
            cors_extra_origins: Vec::new(),
            storage: StorageBackend::Memory,
            backend: BackendConfig::default(),
            default_utc_offset_minutes: 0,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Config::default();

        let storage = match env::var("STORAGE_BACKEND")
            .unwrap_or_else(|_| "memory".into())
            .to_lowercase()
            .as_str()
        {
            "memory" => StorageBackend::Memory,
            "appwrite" => StorageBackend::Appwrite,
            other => bail!("STORAGE_BACKEND must be 'memory' or 'appwrite', got '{}'", other),
        };

        let backend = if storage == StorageBackend::Appwrite {
            BackendConfig {
                endpoint: required("APPWRITE_ENDPOINT")?,
                project_id: required("APPWRITE_PROJECT_ID")?,
                api_key: required("APPWRITE_API_KEY")?,
                database_id: required("APPWRITE_DB_ID")?,
                habits_collection_id: required("APPWRITE_HABITS_COLLECTION_ID")?,
                completions_collection_id: required("APPWRITE_COMPLETIONS_COLLECTION_ID")?,
                timeout_secs: parsed("BACKEND_TIMEOUT_SECS", defaults.backend.timeout_secs)?,
            }
        } else {
            defaults.backend.clone()
        };

        let default_utc_offset_minutes =
            parsed("DEFAULT_UTC_OFFSET_MINUTES", defaults.default_utc_offset_minutes)?;
        if crate::streak::offset_from_minutes(default_utc_offset_minutes).is_none() {
            bail!("DEFAULT_UTC_OFFSET_MINUTES must be between -720 and 840");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parsed("PORT", defaults.port)?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            cors_extra_origins: env::var("CORS_EXTRA_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            storage,
            backend,
            default_utc_offset_minutes,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .with_context(|| format!("{} must be set", key))
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("{} must be a number: {}", key, e)),
        Err(_) => Ok(default),
    }
}
