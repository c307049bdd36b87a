//! In-memory doubles for the store traits.
//!
//! `MemoryDocumentStore` mirrors the Postgres append semantics on a
//! `HashMap`, with builder-style seeding and assertion helpers. Used by the
//! collector/api tests and handy for local runs without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use blogsmith_common::{BlogsmithError, OutlineRecord, SourcesRecord, StepEntry};

use crate::balance::{BalanceChecker, BalanceStatus};
use crate::document::{BlogDocument, DocumentStore};

/// Blank blog document for seeding.
pub fn empty_blog(id: Uuid, project_id: Uuid, user_id: Uuid) -> BlogDocument {
    BlogDocument {
        id,
        project_id,
        user_id,
        country: Some("us".to_string()),
        title: json!([]),
        outlines: json!([]),
        sources: json!([]),
        titles: json!([]),
        categories: json!([]),
        secondary_keywords: json!([]),
        primary_keyword: json!([]),
        word_count: json!([]),
        step_tracking: json!({"outline": [], "sources": [], "current_step": null}),
    }
}

struct MemoryInner {
    blogs: HashMap<Uuid, BlogDocument>,
    projects: HashMap<Uuid, Uuid>,
    fail_appends: bool,
}

pub struct MemoryDocumentStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                blogs: HashMap::new(),
                projects: HashMap::new(),
                fail_appends: false,
            }),
        }
    }

    pub fn with_project(self, project_id: Uuid, owner: Uuid) -> Self {
        self.inner
            .lock()
            .unwrap()
            .projects
            .insert(project_id, owner);
        self
    }

    pub fn with_blog(self, blog: BlogDocument) -> Self {
        self.inner.lock().unwrap().blogs.insert(blog.id, blog);
        self
    }

    /// Make every append return a database error.
    pub fn failing_appends(self) -> Self {
        self.inner.lock().unwrap().fail_appends = true;
        self
    }

    // --- Assertion helpers ---

    pub fn sources_len(&self, blog_id: Uuid) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .blogs
            .get(&blog_id)
            .and_then(|b| b.sources.as_array().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn latest_sources(&self, blog_id: Uuid) -> Option<Value> {
        let inner = self.inner.lock().unwrap();
        inner
            .blogs
            .get(&blog_id)
            .and_then(|b| b.sources.as_array())
            .and_then(|a| a.last())
            .cloned()
    }

    pub fn current_step(&self, blog_id: Uuid) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .blogs
            .get(&blog_id)
            .and_then(|b| b.step_tracking.get("current_step"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

fn push_entry(array: &mut Value, entry: Value) {
    match array.as_array_mut() {
        Some(items) => items.push(entry),
        None => *array = json!([entry]),
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_blog(
        &self,
        blog_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<BlogDocument>, BlogsmithError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .blogs
            .get(&blog_id)
            .filter(|b| b.project_id == project_id && b.user_id == user_id)
            .cloned())
    }

    async fn project_owner(&self, project_id: Uuid) -> Result<Option<Uuid>, BlogsmithError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.projects.get(&project_id).copied())
    }

    async fn append_collection_run(
        &self,
        blog_id: Uuid,
        sources: &SourcesRecord,
        outline: &OutlineRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), BlogsmithError> {
        let sources_entry = serde_json::to_value(sources)
            .map_err(|e| BlogsmithError::Serialization(e.to_string()))?;
        let outline_entry = serde_json::to_value(outline)
            .map_err(|e| BlogsmithError::Serialization(e.to_string()))?;

        let mut inner = self.inner.lock().unwrap();
        if inner.fail_appends {
            return Err(BlogsmithError::Database(
                "MemoryDocumentStore: append forced failure".to_string(),
            ));
        }
        let blog = inner
            .blogs
            .get_mut(&blog_id)
            .ok_or_else(|| BlogsmithError::Database(format!("blog {blog_id} not found")))?;

        push_entry(&mut blog.sources, sources_entry);
        push_entry(&mut blog.outlines, outline_entry);

        for (key, status) in [("outline", "done"), ("sources", "generated")] {
            let entry = serde_json::to_value(StepEntry {
                step: key.to_string(),
                status: status.to_string(),
                completed_at,
            })
            .map_err(|e| BlogsmithError::Serialization(e.to_string()))?;
            match blog.step_tracking.get_mut(key) {
                Some(array) => push_entry(array, entry),
                None => {
                    blog.step_tracking[key] = json!([entry]);
                }
            }
        }
        blog.step_tracking["current_step"] = json!("sources");

        Ok(())
    }

    async fn append_raw_sources(
        &self,
        blog_id: Uuid,
        entry: &Value,
    ) -> Result<(), BlogsmithError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_appends {
            return Err(BlogsmithError::Database(
                "MemoryDocumentStore: append forced failure".to_string(),
            ));
        }
        let blog = inner
            .blogs
            .get_mut(&blog_id)
            .ok_or_else(|| BlogsmithError::Database(format!("blog {blog_id} not found")))?;
        push_entry(&mut blog.sources, entry.clone());
        Ok(())
    }
}

/// Balance checker returning a fixed status for every check.
pub struct StaticBalanceChecker {
    status: BalanceStatus,
}

impl StaticBalanceChecker {
    pub fn sufficient() -> Self {
        Self {
            status: BalanceStatus::Sufficient {
                current_balance: 100.0,
                required_balance: 3.0,
            },
        }
    }

    pub fn insufficient(required: f64, current: f64) -> Self {
        Self {
            status: BalanceStatus::Insufficient {
                message: "Insufficient balance for sources collection".to_string(),
                required_balance: required,
                current_balance: current,
                shortfall: required - current,
                next_refill_time: None,
            },
        }
    }

    pub fn with_status(status: BalanceStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl BalanceChecker for StaticBalanceChecker {
    async fn check(
        &self,
        _user_id: Uuid,
        _service_key: &str,
    ) -> Result<BalanceStatus, BlogsmithError> {
        Ok(self.status.clone())
    }
}
