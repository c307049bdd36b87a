use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use blogsmith_common::{BlogsmithError, OutlineRecord, SourcesRecord, StepEntry};

use crate::document::{BlogDocument, DocumentStore};

/// Create the tables this service reads and writes. Idempotent.
pub async fn init_schema(pool: &PgPool) -> Result<(), BlogsmithError> {
    const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS projects (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        name TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );

    CREATE TABLE IF NOT EXISTS accounts (
        user_id UUID PRIMARY KEY,
        credits DOUBLE PRECISION NOT NULL DEFAULT 0,
        next_refill_time TIMESTAMPTZ
    );

    CREATE TABLE IF NOT EXISTS blogs (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        project_id UUID NOT NULL,
        user_id UUID NOT NULL,
        country TEXT,
        title JSONB NOT NULL DEFAULT '[]'::jsonb,
        outlines JSONB NOT NULL DEFAULT '[]'::jsonb,
        sources JSONB NOT NULL DEFAULT '[]'::jsonb,
        titles JSONB NOT NULL DEFAULT '[]'::jsonb,
        categories JSONB NOT NULL DEFAULT '[]'::jsonb,
        secondary_keywords JSONB NOT NULL DEFAULT '[]'::jsonb,
        primary_keyword JSONB NOT NULL DEFAULT '[]'::jsonb,
        word_count JSONB NOT NULL DEFAULT '[]'::jsonb,
        step_tracking JSONB NOT NULL DEFAULT '{"outline": [], "sources": [], "current_step": null}'::jsonb,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    );
    "#;

    for statement in SCHEMA.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| BlogsmithError::Database(e.to_string()))?;
    }

    info!("Blog store schema ready");
    Ok(())
}

/// Postgres-backed document store. JSONB array columns hold the per-stage
/// history; appends concatenate onto them inside one UPDATE statement, so a
/// collection run lands atomically or not at all.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Wrap a record in a single-element JSON array so jsonb `||` always means
/// "append one element" regardless of the record's own shape.
fn as_append_element<T: serde::Serialize>(record: &T) -> Result<Value, BlogsmithError> {
    let value =
        serde_json::to_value(record).map_err(|e| BlogsmithError::Serialization(e.to_string()))?;
    Ok(Value::Array(vec![value]))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn fetch_blog(
        &self,
        blog_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<BlogDocument>, BlogsmithError> {
        sqlx::query_as::<_, BlogDocument>(
            r#"
            SELECT id, project_id, user_id, country, title, outlines, sources, titles,
                   categories, secondary_keywords, primary_keyword, word_count, step_tracking
            FROM blogs
            WHERE id = $1 AND project_id = $2 AND user_id = $3
            "#,
        )
        .bind(blog_id)
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| BlogsmithError::Database(e.to_string()))
    }

    async fn project_owner(&self, project_id: Uuid) -> Result<Option<Uuid>, BlogsmithError> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM projects WHERE id = $1")
            .bind(project_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BlogsmithError::Database(e.to_string()))?;
        Ok(row.map(|(owner,)| owner))
    }

    async fn append_collection_run(
        &self,
        blog_id: Uuid,
        sources: &SourcesRecord,
        outline: &OutlineRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<(), BlogsmithError> {
        let sources_entry = as_append_element(sources)?;
        let outline_entry = as_append_element(outline)?;
        let outline_step = as_append_element(&StepEntry {
            step: "outline".to_string(),
            status: "done".to_string(),
            completed_at,
        })?;
        let sources_step = as_append_element(&StepEntry {
            step: "sources".to_string(),
            status: "generated".to_string(),
            completed_at,
        })?;

        let result = sqlx::query(
            r#"
            UPDATE blogs SET
                sources = sources || $2::jsonb,
                outlines = outlines || $3::jsonb,
                step_tracking = jsonb_set(
                    jsonb_set(
                        jsonb_set(
                            step_tracking,
                            '{outline}',
                            coalesce(step_tracking->'outline', '[]'::jsonb) || $4::jsonb
                        ),
                        '{sources}',
                        coalesce(step_tracking->'sources', '[]'::jsonb) || $5::jsonb
                    ),
                    '{current_step}',
                    '"sources"'
                ),
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(blog_id)
        .bind(&sources_entry)
        .bind(&outline_entry)
        .bind(&outline_step)
        .bind(&sources_step)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| BlogsmithError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(BlogsmithError::Database(format!(
                "blog {blog_id} not found for sources append"
            )));
        }

        info!(
            %blog_id,
            subsections = sources.total_subsections,
            sources = sources.total_sources,
            "Appended collection run"
        );
        Ok(())
    }

    async fn append_raw_sources(
        &self,
        blog_id: Uuid,
        entry: &Value,
    ) -> Result<(), BlogsmithError> {
        let element = as_append_element(entry)?;

        let result = sqlx::query(
            "UPDATE blogs SET sources = sources || $2::jsonb, updated_at = $3 WHERE id = $1",
        )
        .bind(blog_id)
        .bind(&element)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| BlogsmithError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(BlogsmithError::Database(format!(
                "blog {blog_id} not found for raw sources append"
            )));
        }

        Ok(())
    }
}
