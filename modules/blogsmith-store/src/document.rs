use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use blogsmith_common::{BlogsmithError, OutlineRecord, SourcesRecord};

/// A blog document: per-stage append-only history arrays plus step tracking.
/// "Latest" for any stage is the last element of its array.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BlogDocument {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub country: Option<String>,
    pub title: Value,
    pub outlines: Value,
    pub sources: Value,
    pub titles: Value,
    pub categories: Value,
    pub secondary_keywords: Value,
    pub primary_keyword: Value,
    pub word_count: Value,
    pub step_tracking: Value,
}

/// Last element of a JSON array, if any.
pub fn latest(array: &Value) -> Option<&Value> {
    array.as_array().and_then(|a| a.last())
}

impl BlogDocument {
    /// Latest primary keyword produced by the keyword stage, if any.
    pub fn latest_primary_keyword(&self) -> Option<String> {
        latest(&self.primary_keyword)?
            .get("keyword")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Latest working title, if any.
    pub fn latest_title(&self) -> Option<String> {
        latest(&self.title)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn country_or_default(&self) -> String {
        self.country.clone().unwrap_or_else(|| "us".to_string())
    }
}

/// Async document store for blog pipeline state.
///
/// Stage arrays are append-only: runs append new entries, nothing rewrites
/// history. All appends for one collection run land in a single atomic update.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a blog scoped to its project and owner.
    async fn fetch_blog(
        &self,
        blog_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<BlogDocument>, BlogsmithError>;

    /// Owner of a project, if the project exists.
    async fn project_owner(&self, project_id: Uuid) -> Result<Option<Uuid>, BlogsmithError>;

    /// Append a completed collection run: the sources record, the finalized
    /// outline record, and step-tracking entries for both stages, atomically.
    async fn append_collection_run(
        &self,
        blog_id: Uuid,
        sources: &SourcesRecord,
        outline: &OutlineRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), BlogsmithError>;

    /// Append an externally-supplied sources entry (the PUT path).
    async fn append_raw_sources(
        &self,
        blog_id: Uuid,
        entry: &Value,
    ) -> Result<(), BlogsmithError>;
}
