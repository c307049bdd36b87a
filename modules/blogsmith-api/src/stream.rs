//! SSE streaming endpoint for sources collection.
//!
//! The handler spawns one producer task per request and wires its bounded
//! event channel to the SSE body. The producer runs the whole pipeline:
//! validation, collection (through an inner channel so results can be
//! aggregated as events pass through), and the final persistence write.
//! A client disconnect drops the receiver; the producer observes the closed
//! channel at its next send and winds down without persisting.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use chrono::Utc;
use futures::stream::{self, Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, info, warn};
use uuid::Uuid;

use blogsmith_collector::{EventSink, ResultAggregator, RunContext};
use blogsmith_common::{
    BlogsmithError, Outline, OutlineRecord, RecordTag, SourcesRecord, StreamEvent,
};

use crate::validate::validate_request;
use crate::{caller_id, AppState};

/// Events buffered between producer and transport. One in-flight event plus
/// a little slack so found-website bursts don't stall the scrape fan-out.
const EVENT_CHANNEL_CAPACITY: usize = 16;

const DONE_SENTINEL: &str = "[DONE]";

fn sse_frame(event: &StreamEvent) -> Event {
    let json = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"status":"stream_error","message":"serialization failed"}"#.into());
    Event::default().data(json)
}

/// POST /api/projects/{project_id}/sources/{blog_id}
pub async fn collect_sources_stream(
    State(state): State<Arc<AppState>>,
    Path((project_id, blog_id)): Path<(Uuid, Uuid)>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<Value>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, crate::ApiError> {
    let user_id = caller_id(&headers)?;

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let sink = EventSink::new(tx);

    tokio::spawn(async move {
        run_pipeline(state, user_id, project_id, blog_id, payload, sink).await;
    });

    let body = ReceiverStream::new(rx)
        .map(|event| Ok(sse_frame(&event)))
        .chain(stream::once(async {
            Ok(Event::default().data(DONE_SENTINEL))
        }));

    Ok(Sse::new(body).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// The producer side of one streaming request. Every exit path simply drops
/// the sink, which ends the SSE body after the `[DONE]` sentinel.
pub(crate) async fn run_pipeline(
    state: Arc<AppState>,
    user_id: Uuid,
    project_id: Uuid,
    blog_id: Uuid,
    payload: Value,
    sink: EventSink,
) {
    if !sink
        .send(StreamEvent::processing("Starting sources collection"))
        .await
    {
        return;
    }

    let validated = match validate_request(
        state.store.as_ref(),
        state.balance.as_ref(),
        user_id,
        project_id,
        blog_id,
    )
    .await
    {
        Ok(validated) => validated,
        Err(event) => {
            info!(%blog_id, "Validation failed, ending stream");
            sink.send(event).await;
            return;
        }
    };

    let outline_payload = payload.get("outline").cloned().unwrap_or(Value::Null);
    let ctx = RunContext {
        blog_title: validated.blog_title.clone(),
        primary_keyword: validated.primary_keyword.clone(),
        country: validated.country.clone(),
        outline: Outline::from_payload(&outline_payload),
    };

    // Inner channel between the collector and this forwarding loop, so the
    // aggregator sees every event on its way to the client. The collector task
    // owns the only sender; the loop ends when the collector is done.
    let (inner_tx, mut inner_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let collector_sink = EventSink::new(inner_tx);
    let collector = state.collector.clone();
    let collect_handle =
        tokio::spawn(async move { collector.collect(&ctx, &collector_sink).await });

    let mut aggregator = ResultAggregator::new();
    let mut collection_complete = false;

    while let Some(event) = inner_rx.recv().await {
        aggregator.observe(&event);
        if matches!(event, StreamEvent::ProcessingComplete { .. }) {
            collection_complete = true;
        }
        if !sink.send(event).await {
            break;
        }
    }
    // Dropping the receiver is the cancellation signal: the collector's next
    // send or cancellation check sees the closed channel and stops.
    drop(inner_rx);

    match collect_handle.await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            error!(%blog_id, error = %e, "Sources collection failed");
            sink.send(StreamEvent::failed(format!(
                "Sources collection failed: {e}"
            )))
            .await;
            return;
        }
        Err(e) => {
            error!(%blog_id, error = %e, "Collector task panicked");
            sink.send(StreamEvent::stream_error("Streaming failed unexpectedly"))
                .await;
            return;
        }
    }

    // Persist only for a completed run with the client still attached.
    if !collection_complete || sink.is_cancelled() {
        info!(%blog_id, "Run ended without completion, nothing persisted");
        return;
    }

    let total_subsections = aggregator.len();
    let total_sources = aggregator.total_sources();
    let now = Utc::now();

    let sources_record = SourcesRecord {
        subsections_data: aggregator.into_results(),
        outline: outline_payload.clone(),
        total_subsections,
        total_sources,
        primary_keyword: validated.primary_keyword.clone(),
        country: validated.country.clone(),
        blog_title: validated.blog_title.clone(),
        generated_at: now,
        processing_metadata: state.collector.config().metadata(),
        tag: RecordTag::Generated,
    };
    let outline_record = OutlineRecord {
        outline: outline_payload,
        sources_collected: true,
        finalized_at: now,
        primary_keyword: validated.primary_keyword,
        country: validated.country,
        blog_title: validated.blog_title,
        tag: RecordTag::Final,
    };

    match state
        .store
        .append_collection_run(blog_id, &sources_record, &outline_record, now)
        .await
    {
        Ok(()) => {
            sink.send(StreamEvent::completed(
                blog_id,
                total_subsections,
                total_sources,
            ))
            .await;
        }
        Err(BlogsmithError::Database(e)) => {
            warn!(%blog_id, error = %e, "Persistence write failed after collection");
            sink.send(StreamEvent::completed_with_warning(
                blog_id,
                "Sources collected but failed to save",
            ))
            .await;
        }
        Err(e) => {
            warn!(%blog_id, error = %e, "Could not prepare persistence write");
            sink.send(StreamEvent::completed_with_error(
                "Sources collected but save operation failed",
                e.to_string(),
            ))
            .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_collector::testing::{
        hit, MockInfoExtractor, MockQueryPlanner, MockScraper, MockSearcher,
    };
    use blogsmith_collector::{CollectorConfig, SourceCollector};
    use blogsmith_store::memory::empty_blog;
    use blogsmith_store::{BalanceChecker, MemoryDocumentStore, StaticBalanceChecker};
    use serde_json::json;

    struct Ids {
        user: Uuid,
        project: Uuid,
        blog: Uuid,
    }

    fn ids() -> Ids {
        Ids {
            user: Uuid::new_v4(),
            project: Uuid::new_v4(),
            blog: Uuid::new_v4(),
        }
    }

    /// Collector wired for the two-subsection scenario: one query per unit,
    /// one result per query, fixed fixtures.
    fn scenario_collector() -> SourceCollector {
        let searcher = MockSearcher::new()
            .on_query("intro query", vec![hit("https://intro.example", "Intro Source")])
            .on_query("details query", vec![hit("https://details.example", "Details Source")]);
        let scraper = MockScraper::new()
            .on_page("https://intro.example", "intro content")
            .on_page("https://details.example", "details content");
        let planner = MockQueryPlanner::new()
            .on_unit("Intro", &["intro query"])
            .on_unit("Details", &["details query"]);
        let extractor = MockInfoExtractor::new()
            .on_unit("Intro", json!({"point": "intro"}))
            .on_unit("Details", json!({"point": "details"}));
        SourceCollector::new(
            Arc::new(searcher),
            Arc::new(scraper),
            Arc::new(planner),
            Arc::new(extractor),
            CollectorConfig {
                queries_per_subsection: 1,
                results_per_query: 1,
                ..CollectorConfig::default()
            },
        )
    }

    fn scenario_payload() -> Value {
        json!({"outline": [{"heading": "Overview", "subsections": ["Intro", "Details"]}]})
    }

    fn seeded_memory_store(ids: &Ids) -> MemoryDocumentStore {
        let mut blog = empty_blog(ids.blog, ids.project, ids.user);
        blog.primary_keyword = json!([{"keyword": "rust streaming"}]);
        blog.title = json!(["Streaming in Rust"]);
        MemoryDocumentStore::new()
            .with_project(ids.project, ids.user)
            .with_blog(blog)
    }

    fn app_state(
        store: Arc<MemoryDocumentStore>,
        balance: impl BalanceChecker + 'static,
        collector: SourceCollector,
    ) -> Arc<AppState> {
        Arc::new(AppState {
            store,
            balance: Arc::new(balance),
            collector: Arc::new(collector),
        })
    }

    async fn drain(
        state: Arc<AppState>,
        ids: &Ids,
        payload: Value,
    ) -> Vec<StreamEvent> {
        let (tx, mut rx) = mpsc::channel(64);
        let sink = EventSink::new(tx);
        let handle = tokio::spawn(run_pipeline(
            state,
            ids.user,
            ids.project,
            ids.blog,
            payload,
            sink,
        ));

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        handle.await.unwrap();
        events
    }

    #[tokio::test]
    async fn happy_path_streams_scenario_sequence_and_persists_once() {
        let ids = ids();
        let store = Arc::new(seeded_memory_store(&ids));
        let state = app_state(
            store.clone(),
            StaticBalanceChecker::sufficient(),
            scenario_collector(),
        );

        let events = drain(state, &ids, scenario_payload()).await;
        let statuses: Vec<&str> = events.iter().map(StreamEvent::status).collect();
        assert_eq!(
            statuses,
            vec![
                "processing",
                "found_websites",
                "subsection_completed",
                "found_websites",
                "subsection_completed",
                "processing_complete",
                "completed",
            ]
        );

        match events.last().unwrap() {
            StreamEvent::Completed {
                total_subsections,
                total_sources,
                ..
            } => {
                assert_eq!(*total_subsections, 2);
                assert_eq!(*total_sources, 2);
            }
            other => panic!("expected completed, got {}", other.status()),
        }

        // Exactly one append, carrying both subsections in outline order.
        assert_eq!(store.sources_len(ids.blog), 1);
        let record = store.latest_sources(ids.blog).unwrap();
        assert_eq!(record["tag"], json!("generated"));
        assert_eq!(record["total_subsections"], json!(2));
        assert_eq!(record["subsections_data"][0]["title"], json!("Intro"));
        assert_eq!(record["subsections_data"][1]["title"], json!("Details"));
        assert_eq!(store.current_step(ids.blog).as_deref(), Some("sources"));
    }

    #[tokio::test]
    async fn insufficient_balance_ends_stream_before_collection() {
        let ids = ids();
        let store = Arc::new(seeded_memory_store(&ids));
        let state = app_state(
            store.clone(),
            StaticBalanceChecker::insufficient(3.0, 0.5),
            scenario_collector(),
        );

        let events = drain(state, &ids, scenario_payload()).await;
        let statuses: Vec<&str> = events.iter().map(StreamEvent::status).collect();
        assert_eq!(statuses, vec!["processing", "error"]);
        assert_eq!(store.sources_len(ids.blog), 0);
    }

    #[tokio::test]
    async fn persistence_failure_reports_warning_not_collection_failure() {
        let ids = ids();
        let mut blog = empty_blog(ids.blog, ids.project, ids.user);
        blog.primary_keyword = json!([{"keyword": "rust streaming"}]);
        let store = Arc::new(
            MemoryDocumentStore::new()
                .with_project(ids.project, ids.user)
                .with_blog(blog)
                .failing_appends(),
        );
        let state = app_state(
            store.clone(),
            StaticBalanceChecker::sufficient(),
            scenario_collector(),
        );

        let events = drain(state, &ids, scenario_payload()).await;
        assert_eq!(events.last().unwrap().status(), "completed_with_warning");
        // Collection itself still completed.
        assert!(events
            .iter()
            .any(|e| e.status() == "processing_complete"));
        assert_eq!(store.sources_len(ids.blog), 0);
    }

    #[tokio::test]
    async fn disconnect_before_completion_skips_persistence() {
        let ids = ids();
        let store = Arc::new(seeded_memory_store(&ids));
        let state = app_state(
            store.clone(),
            StaticBalanceChecker::sufficient(),
            scenario_collector(),
        );

        let (tx, mut rx) = mpsc::channel(1);
        let sink = EventSink::new(tx);
        let handle = tokio::spawn(run_pipeline(
            state,
            ids.user,
            ids.project,
            ids.blog,
            scenario_payload(),
            sink,
        ));

        // Hang up after the first unit completes.
        loop {
            let event = rx.recv().await.expect("stream ended early");
            if event.status() == "subsection_completed" {
                break;
            }
        }
        drop(rx);
        handle.await.unwrap();

        assert_eq!(store.sources_len(ids.blog), 0);
    }

    #[tokio::test]
    async fn empty_outline_persists_empty_record() {
        let ids = ids();
        let store = Arc::new(seeded_memory_store(&ids));
        let state = app_state(
            store.clone(),
            StaticBalanceChecker::sufficient(),
            scenario_collector(),
        );

        let events = drain(state, &ids, json!({"outline": []})).await;
        let statuses: Vec<&str> = events.iter().map(StreamEvent::status).collect();
        assert_eq!(statuses, vec!["processing", "processing_complete", "completed"]);

        let record = store.latest_sources(ids.blog).unwrap();
        assert_eq!(record["total_subsections"], json!(0));
        assert_eq!(record["total_sources"], json!(0));
    }
}
