use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, DocumentStore, Query};
use crate::error::{AppError, AppResult};

/// Process-local document store. Documents keep insertion order, like the hosted
/// store's default ordering.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    collections: Arc<RwLock<HashMap<Collection, Vec<Value>>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a document verbatim, bypassing id assignment. Used to seed fixtures.
    pub async fn insert_raw(&self, collection: Collection, doc: Value) {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc);
    }
}

fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("$id").and_then(Value::as_str)
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn list_documents(&self, collection: Collection, queries: &[Query]) -> AppResult<Vec<Value>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Value> = docs
            .iter()
            .filter(|doc| queries.iter().all(|q| q.matches(doc)))
            .cloned()
            .collect();

        for q in queries {
            if let Query::OrderAsc(field) = q {
                matched.sort_by(|a, b| {
                    let a = a.get(field).map(ToString::to_string).unwrap_or_default();
                    let b = b.get(field).map(ToString::to_string).unwrap_or_default();
                    a.cmp(&b)
                });
            }
        }

        let offset = queries
            .iter()
            .find_map(|q| match q {
                Query::Offset(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(0);
        let limit = queries
            .iter()
            .find_map(|q| match q {
                Query::Limit(n) => Some(*n),
                _ => None,
            })
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn create_document(&self, collection: Collection, data: Value) -> AppResult<Value> {
        let Value::Object(mut fields) = data else {
            return Err(AppError::Validation("Document data must be a JSON object".into()));
        };

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        fields.insert("$id".into(), Value::String(Uuid::new_v4().simple().to_string()));
        fields.insert("$createdAt".into(), Value::String(now.clone()));
        fields.insert("$updatedAt".into(), Value::String(now));

        let doc = Value::Object(fields);
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push(doc.clone());

        tracing::debug!(collection = collection.as_str(), id = doc_id(&doc), "Document created");
        Ok(doc)
    }

    async fn update_document(&self, collection: Collection, id: &str, data: Value) -> AppResult<Value> {
        let Value::Object(changes) = data else {
            return Err(AppError::Validation("Document data must be a JSON object".into()));
        };

        let mut collections = self.collections.write().await;
        let doc = collections
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|d| doc_id(d) == Some(id)))
            .ok_or_else(|| AppError::NotFound("Document not found".into()))?;

        if let Value::Object(fields) = doc {
            fields.extend(changes);
            fields.insert(
                "$updatedAt".into(),
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            );
        }
        Ok(doc.clone())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection).or_default();
        let before = docs.len();
        docs.retain(|d| doc_id(d) != Some(id));

        if docs.len() == before {
            return Err(AppError::NotFound("Document not found".into()));
        }
        Ok(())
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
