//! Non-streaming companions: read the latest collected sources, or append an
//! externally-supplied sources payload directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;
use uuid::Uuid;

use blogsmith_store::latest;

use crate::{caller_id, ApiError, AppState};

/// Latest sources entry plus denormalized snapshots of the earlier pipeline
/// stages, so the client renders one response instead of five.
#[derive(Debug, Serialize)]
pub struct LatestSourcesResponse {
    pub sources: Option<Value>,
    pub total_subsections: Option<u64>,
    pub total_sources: Option<u64>,
    pub outline: Option<Value>,
    pub titles: Option<Value>,
    pub categories: Option<Value>,
    pub secondary_keywords: Option<Value>,
    pub primary_keyword: Option<Value>,
    pub word_count: Option<Value>,
    pub country: Option<String>,
    pub blog_title: Option<String>,
    pub processing_metadata: Option<Value>,
    pub generated_at: Option<String>,
    pub status: String,
    pub blog_id: Uuid,
}

fn not_found(message: &str) -> ApiError {
    (StatusCode::NOT_FOUND, Json(json!({"error": message})))
}

/// GET /api/projects/{project_id}/sources/{blog_id}
pub async fn get_latest_sources(
    State(state): State<Arc<AppState>>,
    Path((project_id, blog_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
) -> Result<Json<LatestSourcesResponse>, ApiError> {
    let user_id = caller_id(&headers)?;

    match state.store.project_owner(project_id).await {
        Ok(Some(owner)) if owner == user_id => {}
        Ok(Some(_)) => {
            return Err((
                StatusCode::FORBIDDEN,
                Json(json!({"error": "Project access denied"})),
            ));
        }
        Ok(None) => return Err(not_found("Project not found")),
        Err(e) => {
            error!(error = %e, "Project lookup failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            ));
        }
    }

    let blog = match state.store.fetch_blog(blog_id, project_id, user_id).await {
        Ok(Some(blog)) => blog,
        Ok(None) => return Err(not_found("Blog not found")),
        Err(e) => {
            error!(error = %e, "Blog fetch failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            ));
        }
    };

    let latest_sources = latest(&blog.sources);
    let sources = latest_sources.and_then(|e| e.get("subsections_data")).cloned();

    let response = LatestSourcesResponse {
        status: if sources.is_some() {
            "success".to_string()
        } else {
            "no_data".to_string()
        },
        total_subsections: latest_sources
            .and_then(|e| e.get("total_subsections"))
            .and_then(Value::as_u64),
        total_sources: latest_sources
            .and_then(|e| e.get("total_sources"))
            .and_then(Value::as_u64),
        processing_metadata: latest_sources.and_then(|e| e.get("processing_metadata")).cloned(),
        generated_at: latest_sources
            .and_then(|e| e.get("generated_at"))
            .and_then(Value::as_str)
            .map(str::to_string),
        sources,
        outline: latest(&blog.outlines).and_then(|e| e.get("outline")).cloned(),
        titles: latest(&blog.titles).and_then(|e| e.get("titles")).cloned(),
        categories: latest(&blog.categories)
            .and_then(|e| e.get("categories"))
            .cloned(),
        secondary_keywords: latest(&blog.secondary_keywords)
            .and_then(|e| e.get("keywords"))
            .cloned(),
        primary_keyword: latest(&blog.primary_keyword).cloned(),
        word_count: latest(&blog.word_count).cloned(),
        country: Some(blog.country_or_default()),
        blog_title: Some(
            blog.latest_title()
                .unwrap_or_else(|| "Untitled Blog".to_string()),
        ),
        blog_id,
    };

    Ok(Json(response))
}

/// PUT /api/projects/{project_id}/sources/{blog_id}
///
/// Appends the supplied payload as a new sources entry, tag `updated`, with
/// no collection run. Minimal validation by design.
pub async fn put_sources(
    State(state): State<Arc<AppState>>,
    Path((project_id, blog_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let user_id = caller_id(&headers)?;

    let sources = match body.get("sources") {
        Some(sources) if !sources.is_null() => sources.clone(),
        _ => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "sources object required"})),
            ));
        }
    };

    match state.store.fetch_blog(blog_id, project_id, user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(not_found("Blog not found")),
        Err(e) => {
            error!(error = %e, "Blog fetch failed");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            ));
        }
    }

    let entry = json!({
        "subsections_data": sources,
        "generated_at": Utc::now(),
        "tag": "updated",
    });

    if let Err(e) = state.store.append_raw_sources(blog_id, &entry).await {
        error!(error = %e, "Raw sources append failed");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string()})),
        ));
    }

    Ok(Json(json!({
        "status": "updated",
        "sources": sources,
        "blog_id": blog_id,
        "message": "Raw sources data appended",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use blogsmith_collector::testing::{
        MockInfoExtractor, MockQueryPlanner, MockScraper, MockSearcher,
    };
    use blogsmith_collector::{CollectorConfig, SourceCollector};
    use blogsmith_store::memory::empty_blog;
    use blogsmith_store::{MemoryDocumentStore, StaticBalanceChecker};

    fn test_state(store: Arc<MemoryDocumentStore>) -> Arc<AppState> {
        let collector = SourceCollector::new(
            Arc::new(MockSearcher::new()),
            Arc::new(MockScraper::new()),
            Arc::new(MockQueryPlanner::new()),
            Arc::new(MockInfoExtractor::new()),
            CollectorConfig::default(),
        );
        Arc::new(AppState {
            store,
            balance: Arc::new(StaticBalanceChecker::sufficient()),
            collector: Arc::new(collector),
        })
    }

    fn user_headers(user_id: Uuid) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-user-id",
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn put_then_get_round_trips_the_latest_entry() {
        let (blog_id, project_id, user_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(project_id, user_id)
                .with_blog(empty_blog(blog_id, project_id, user_id)),
        );
        let state = test_state(store.clone());

        let payload = json!({"sources": [{"title": "Manual", "sources": [], "informations": {}}]});
        let Json(put_response) = put_sources(
            State(state.clone()),
            Path((project_id, blog_id)),
            user_headers(user_id),
            Json(payload),
        )
        .await
        .unwrap();
        assert_eq!(put_response["status"], json!("updated"));

        let Json(get_response) = get_latest_sources(
            State(state),
            Path((project_id, blog_id)),
            user_headers(user_id),
        )
        .await
        .unwrap();
        assert_eq!(get_response.status, "success");
        assert_eq!(
            get_response.sources,
            Some(json!([{"title": "Manual", "sources": [], "informations": {}}]))
        );

        let record = store.latest_sources(blog_id).unwrap();
        assert_eq!(record["tag"], json!("updated"));
    }

    #[tokio::test]
    async fn get_is_idempotent_between_writes() {
        let (blog_id, project_id, user_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut blog = empty_blog(blog_id, project_id, user_id);
        blog.sources = json!([{
            "subsections_data": [{"title": "A"}],
            "total_subsections": 1,
            "total_sources": 0,
            "generated_at": "2026-08-01T00:00:00Z",
            "tag": "generated",
        }]);
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(project_id, user_id)
                .with_blog(blog),
        );
        let state = test_state(store);

        let mut bodies = Vec::new();
        for _ in 0..2 {
            let Json(response) = get_latest_sources(
                State(state.clone()),
                Path((project_id, blog_id)),
                user_headers(user_id),
            )
            .await
            .unwrap();
            bodies.push(serde_json::to_string(&response).unwrap());
        }
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn get_without_data_reports_no_data() {
        let (blog_id, project_id, user_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(project_id, user_id)
                .with_blog(empty_blog(blog_id, project_id, user_id)),
        );

        let Json(response) = get_latest_sources(
            State(test_state(store)),
            Path((project_id, blog_id)),
            user_headers(user_id),
        )
        .await
        .unwrap();
        assert_eq!(response.status, "no_data");
        assert!(response.sources.is_none());
    }

    #[tokio::test]
    async fn put_rejects_missing_sources_and_unknown_blog() {
        let (blog_id, project_id, user_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(project_id, user_id)
                .with_blog(empty_blog(blog_id, project_id, user_id)),
        );
        let state = test_state(store);

        let (status, _) = put_sources(
            State(state.clone()),
            Path((project_id, blog_id)),
            user_headers(user_id),
            Json(json!({})),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = put_sources(
            State(state),
            Path((project_id, Uuid::new_v4())),
            user_headers(user_id),
            Json(json!({"sources": []})),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn foreign_user_cannot_read_sources() {
        let (blog_id, project_id, owner) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(project_id, owner)
                .with_blog(empty_blog(blog_id, project_id, owner)),
        );

        let (status, _) = get_latest_sources(
            State(test_state(store)),
            Path((project_id, blog_id)),
            user_headers(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}
