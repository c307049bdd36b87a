use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ai_client::OpenAi;
use blogsmith_collector::{
    CollectorConfig, HttpScraper, OpenAiInfoExtractor, OpenAiQueryPlanner, SerperSearcher,
    SourceCollector,
};
use blogsmith_common::Config;
use blogsmith_store::{BalanceChecker, DocumentStore, PgBalanceChecker, PgDocumentStore};

mod sources;
mod stream;
mod validate;

pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub balance: Arc<dyn BalanceChecker>,
    pub collector: Arc<SourceCollector>,
}

pub type ApiError = (StatusCode, Json<serde_json::Value>);

/// Caller identity from the `x-user-id` header. Auth internals live upstream;
/// the gateway hands us a verified user id.
pub fn caller_id(headers: &HeaderMap) -> Result<Uuid, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": "Missing or invalid x-user-id header"})),
        ))
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        .route(
            "/api/projects/{project_id}/sources/{blog_id}",
            post(stream::collect_sources_stream)
                .get(sources::get_latest_sources)
                .put(sources::put_sources),
        )
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("blogsmith_api=info".parse()?)
                .add_directive("blogsmith_collector=info".parse()?)
                .add_directive("blogsmith_store=info".parse()?),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    blogsmith_store::init_schema(&pool).await?;

    let collector = SourceCollector::new(
        Arc::new(SerperSearcher::new(&config.serper_api_key)),
        Arc::new(HttpScraper::new(Duration::from_secs(config.scrape_timeout_secs))),
        Arc::new(OpenAiQueryPlanner::new(OpenAi::new(
            &config.openai_api_key,
            &config.query_model,
        ))),
        Arc::new(OpenAiInfoExtractor::new(OpenAi::new(
            &config.openai_api_key,
            &config.extraction_model,
        ))),
        CollectorConfig::from_config(&config),
    );

    let state = Arc::new(AppState {
        store: Arc::new(PgDocumentStore::new(pool.clone())),
        balance: Arc::new(PgBalanceChecker::new(pool)),
        collector: Arc::new(collector),
    });

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Blogsmith API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn caller_id_parses_valid_header() {
        let user_id = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-user-id",
            HeaderValue::from_str(&user_id.to_string()).unwrap(),
        );
        assert_eq!(caller_id(&headers).unwrap(), user_id);
    }

    #[test]
    fn caller_id_rejects_missing_or_garbage_header() {
        let headers = HeaderMap::new();
        let (status, _) = caller_id(&headers).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("not-a-uuid"));
        let (status, _) = caller_id(&headers).unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
