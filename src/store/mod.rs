use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;

use crate::error::AppResult;

pub mod appwrite;
pub mod memory;

pub use appwrite::AppwriteStore;
pub use memory::InMemoryStore;

/// Page size used when walking a whole collection. The hosted store caps unpaged
/// list calls at 25 documents.
pub const PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Habits,
    Completions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Habits => "habits",
            Self::Completions => "completions",
        }
    }
}

/// Filters and paging understood by every document store.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Value),
    NotEqual(String, Value),
    GreaterThanEqual(String, Value),
    LessThan(String, Value),
    OrderAsc(String),
    Limit(usize),
    Offset(usize),
}

impl Query {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Self::Equal(field.into(), value.into())
    }

    pub fn greater_than_equal(field: &str, value: impl Into<Value>) -> Self {
        Self::GreaterThanEqual(field.into(), value.into())
    }

    pub fn less_than(field: &str, value: impl Into<Value>) -> Self {
        Self::LessThan(field.into(), value.into())
    }

    /// Wire form used by the hosted store's `queries[]` parameter.
    pub fn to_wire(&self) -> String {
        let q = match self {
            Self::Equal(f, v) => json!({ "method": "equal", "attribute": f, "values": [v] }),
            Self::NotEqual(f, v) => json!({ "method": "notEqual", "attribute": f, "values": [v] }),
            Self::GreaterThanEqual(f, v) => {
                json!({ "method": "greaterThanEqual", "attribute": f, "values": [v] })
            }
            Self::LessThan(f, v) => json!({ "method": "lessThan", "attribute": f, "values": [v] }),
            Self::OrderAsc(f) => json!({ "method": "orderAsc", "attribute": f }),
            Self::Limit(n) => json!({ "method": "limit", "values": [n] }),
            Self::Offset(n) => json!({ "method": "offset", "values": [n] }),
        };
        q.to_string()
    }

    /// Whether `doc` passes this filter. Paging and ordering always pass.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Self::Equal(f, v) => doc.get(f) == Some(v),
            Self::NotEqual(f, v) => doc.get(f) != Some(v),
            Self::GreaterThanEqual(f, v) => doc
                .get(f)
                .and_then(|field| compare(field, v))
                .is_some_and(|o| o != Ordering::Less),
            Self::LessThan(f, v) => doc
                .get(f)
                .and_then(|field| compare(field, v))
                .is_some_and(|o| o == Ordering::Less),
            Self::OrderAsc(_) | Self::Limit(_) | Self::Offset(_) => true,
        }
    }
}

/// Strings compare lexically, which orders UTC ISO-8601 timestamps correctly.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(&self, collection: Collection, queries: &[Query]) -> AppResult<Vec<Value>>;

    /// Stores `data` under a fresh id and returns the saved document including `$id`.
    async fn create_document(&self, collection: Collection, data: Value) -> AppResult<Value>;

    /// Merges `data` into the existing document.
    async fn update_document(&self, collection: Collection, id: &str, data: Value) -> AppResult<Value>;

    async fn delete_document(&self, collection: Collection, id: &str) -> AppResult<()>;

    async fn ping(&self) -> AppResult<()>;
}

/// Every document matching `filters`, fetched page by page.
pub async fn list_all(
    store: &dyn DocumentStore,
    collection: Collection,
    filters: &[Query],
) -> AppResult<Vec<Value>> {
    let mut all = Vec::new();
    loop {
        let mut queries = filters.to_vec();
        queries.push(Query::Limit(PAGE_SIZE));
        queries.push(Query::Offset(all.len()));

        let page = store.list_documents(collection, &queries).await?;
        let short = page.len() < PAGE_SIZE;
        all.extend(page);
        if short {
            break;
        }
    }
    Ok(all)
}
