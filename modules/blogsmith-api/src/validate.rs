//! Pre-flight validation for a collection run.
//!
//! Three independent read-only checks run concurrently against the shared
//! pool: balance, project ownership, blog existence. All three are awaited
//! before any verdict; the first failing check in reporting order wins and
//! becomes the single terminal error event for the stream.

use tracing::warn;
use uuid::Uuid;

use blogsmith_common::StreamEvent;
use blogsmith_store::{BalanceChecker, BalanceStatus, DocumentStore};

pub const SOURCES_SERVICE_KEY: &str = "sources_generation";

/// Upstream fields every collection run needs, extracted during validation.
#[derive(Debug, Clone)]
pub struct ValidatedBlog {
    pub primary_keyword: String,
    pub country: String,
    pub blog_title: String,
}

pub async fn validate_request(
    store: &dyn DocumentStore,
    balance: &dyn BalanceChecker,
    user_id: Uuid,
    project_id: Uuid,
    blog_id: Uuid,
) -> Result<ValidatedBlog, StreamEvent> {
    let (balance_result, owner_result, blog_result) = tokio::join!(
        balance.check(user_id, SOURCES_SERVICE_KEY),
        store.project_owner(project_id),
        store.fetch_blog(blog_id, project_id, user_id),
    );

    match balance_result {
        Ok(BalanceStatus::Sufficient { .. }) => {}
        Ok(BalanceStatus::Insufficient {
            message,
            required_balance,
            current_balance,
            next_refill_time,
            ..
        }) => {
            return Err(StreamEvent::insufficient_balance(
                message,
                required_balance,
                current_balance,
                next_refill_time,
            ));
        }
        Ok(BalanceStatus::AccountNotFound) => {
            return Err(StreamEvent::validation_error(
                "account_not_found",
                "No account found for user",
            ));
        }
        Ok(BalanceStatus::UnknownService { service_key }) => {
            return Err(StreamEvent::validation_error(
                "unknown_service",
                format!("Unknown service key: {service_key}"),
            ));
        }
        Err(e) => {
            warn!(error = %e, "Balance check failed");
            return Err(StreamEvent::validation_error(
                "validation_failed",
                format!("Balance check failed: {e}"),
            ));
        }
    }

    match owner_result {
        Ok(Some(owner)) if owner == user_id => {}
        Ok(_) => {
            return Err(StreamEvent::validation_error(
                "project_access_denied",
                "Project access denied",
            ));
        }
        Err(e) => {
            warn!(error = %e, "Project lookup failed");
            return Err(StreamEvent::validation_error(
                "validation_failed",
                format!("Project lookup failed: {e}"),
            ));
        }
    }

    let blog = match blog_result {
        Ok(Some(blog)) => blog,
        Ok(None) => {
            return Err(StreamEvent::validation_error(
                "blog_not_found",
                "Blog not found",
            ));
        }
        Err(e) => {
            warn!(error = %e, "Blog lookup failed");
            return Err(StreamEvent::validation_error(
                "validation_failed",
                format!("Blog lookup failed: {e}"),
            ));
        }
    };

    let Some(primary_keyword) = blog.latest_primary_keyword() else {
        return Err(StreamEvent::validation_error(
            "missing_primary_keyword",
            "No primary keyword found. Please complete previous steps.",
        ));
    };

    Ok(ValidatedBlog {
        primary_keyword,
        country: blog.country_or_default(),
        blog_title: blog
            .latest_title()
            .unwrap_or_else(|| "Untitled Blog".to_string()),
    })
}
