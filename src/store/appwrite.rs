use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

use super::{Collection, DocumentStore, Query};
use crate::config::BackendConfig;
use crate::error::{AppError, AppResult};

/// REST client for the hosted document store.
#[derive(Clone)]
pub struct AppwriteStore {
    client: Client,
    config: BackendConfig,
}

impl AppwriteStore {
    pub fn new(config: BackendConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    fn collection_id(&self, collection: Collection) -> &str {
        match collection {
            Collection::Habits => &self.config.habits_collection_id,
            Collection::Completions => &self.config.completions_collection_id,
        }
    }

    fn documents_url(&self, collection: Collection) -> String {
        format!(
            "{}/databases/{}/collections/{}/documents",
            self.config.endpoint.trim_end_matches('/'),
            self.config.database_id,
            self.collection_id(collection),
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("X-Appwrite-Project", &self.config.project_id)
            .header("X-Appwrite-Key", &self.config.api_key)
    }
}

/// Maps non-2xx responses onto `AppError`; 404 stays a not-found.
pub(crate) async fn check(response: Response) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or(body);

    Err(match status {
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::UNAUTHORIZED => AppError::Unauthorized,
        StatusCode::FORBIDDEN => AppError::Forbidden,
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::BAD_REQUEST => AppError::Validation(message),
        _ => AppError::Upstream(format!("{}: {}", status, message)),
    })
}

#[async_trait]
impl DocumentStore for AppwriteStore {
    async fn list_documents(&self, collection: Collection, queries: &[Query]) -> AppResult<Vec<Value>> {
        let params: Vec<(&str, String)> = queries.iter().map(|q| ("queries[]", q.to_wire())).collect();

        let response = self
            .authorized(self.client.get(self.documents_url(collection)))
            .query(&params)
            .send()
            .await?;
        let body: Value = check(response).await?.json().await?;

        match body.get("documents") {
            Some(Value::Array(docs)) => Ok(docs.clone()),
            _ => Err(AppError::Upstream("document list response had no documents".into())),
        }
    }

    async fn create_document(&self, collection: Collection, data: Value) -> AppResult<Value> {
        let response = self
            .authorized(self.client.post(self.documents_url(collection)))
            .json(&json!({ "documentId": "unique()", "data": data }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn update_document(&self, collection: Collection, id: &str, data: Value) -> AppResult<Value> {
        let url = format!("{}/{}", self.documents_url(collection), id);
        let response = self
            .authorized(self.client.patch(url))
            .json(&json!({ "data": data }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> AppResult<()> {
        let url = format!("{}/{}", self.documents_url(collection), id);
        let response = self.authorized(self.client.delete(url)).send().await?;
        check(response).await?;
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        let response = self
            .authorized(self.client.get(self.documents_url(Collection::Habits)))
            .query(&[("queries[]", Query::Limit(1).to_wire())])
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}
