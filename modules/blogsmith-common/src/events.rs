//! Events pushed to the client during a sources-collection stream.
//!
//! The `status` tag is the wire field clients switch on; every variant
//! carries its emission timestamp. Events are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::types::{ProcessingUnit, SourceRef};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEvent {
    /// First event of every stream.
    Processing {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A page was scraped successfully while working on a unit.
    FoundWebsites {
        subsection_title: String,
        heading_index: usize,
        subsection_index: usize,
        is_direct_heading: bool,
        website: SourceRef,
        /// 1-based position among the unit's accepted sources.
        position: usize,
        timestamp: DateTime<Utc>,
    },

    /// A subsection finished: search, scrape, and information extraction.
    SubsectionCompleted {
        subsection_title: String,
        heading_index: usize,
        subsection_index: usize,
        heading_title: String,
        is_direct_heading: bool,
        message: String,
        sources: Vec<SourceRef>,
        informations: Value,
        timestamp: DateTime<Utc>,
    },

    /// A heading processed as a single unit (no subsections) finished.
    HeadingCompleted {
        subsection_title: String,
        heading_index: usize,
        subsection_index: usize,
        heading_title: String,
        is_direct_heading: bool,
        message: String,
        sources: Vec<SourceRef>,
        informations: Value,
        timestamp: DateTime<Utc>,
    },

    /// All units processed. Emitted exactly once, after the last unit.
    ProcessingComplete {
        message: String,
        total_processed: usize,
        timestamp: DateTime<Utc>,
    },

    /// Terminal validation failure; nothing was collected.
    Error {
        error_type: String,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        required_balance: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        current_balance: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        shortfall: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        next_refill_time: Option<DateTime<Utc>>,
        timestamp: DateTime<Utc>,
    },

    /// The collection run aborted; nothing was persisted.
    Failed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Last-resort sentinel for unexpected stream errors.
    StreamError {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Collection finished and results were persisted.
    Completed {
        message: String,
        blog_id: Uuid,
        total_subsections: usize,
        total_sources: usize,
        timestamp: DateTime<Utc>,
    },

    /// Collection finished but the persistence write failed.
    CompletedWithWarning {
        message: String,
        blog_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// Collection finished but the record could not be prepared or written.
    CompletedWithError {
        message: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl StreamEvent {
    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn found_websites(unit: &ProcessingUnit, website: SourceRef, position: usize) -> Self {
        Self::FoundWebsites {
            subsection_title: unit.title.clone(),
            heading_index: unit.heading_index,
            subsection_index: unit.subsection_index,
            is_direct_heading: unit.is_direct_heading,
            website,
            position,
            timestamp: Utc::now(),
        }
    }

    /// Completion event for a unit: `HeadingCompleted` for direct headings,
    /// `SubsectionCompleted` otherwise.
    pub fn unit_completed(
        unit: &ProcessingUnit,
        sources: Vec<SourceRef>,
        informations: Value,
    ) -> Self {
        let message = format!("Completed {} ({} sources)", unit.title, sources.len());
        let timestamp = Utc::now();
        if unit.is_direct_heading {
            Self::HeadingCompleted {
                subsection_title: unit.title.clone(),
                heading_index: unit.heading_index,
                subsection_index: unit.subsection_index,
                heading_title: unit.heading_title.clone(),
                is_direct_heading: true,
                message,
                sources,
                informations,
                timestamp,
            }
        } else {
            Self::SubsectionCompleted {
                subsection_title: unit.title.clone(),
                heading_index: unit.heading_index,
                subsection_index: unit.subsection_index,
                heading_title: unit.heading_title.clone(),
                is_direct_heading: false,
                message,
                sources,
                informations,
                timestamp,
            }
        }
    }

    pub fn processing_complete(total_processed: usize) -> Self {
        Self::ProcessingComplete {
            message: format!("All processing complete. {total_processed} subsections processed."),
            total_processed,
            timestamp: Utc::now(),
        }
    }

    pub fn validation_error(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            error_type: error_type.into(),
            message: message.into(),
            required_balance: None,
            current_balance: None,
            shortfall: None,
            next_refill_time: None,
            timestamp: Utc::now(),
        }
    }

    pub fn insufficient_balance(
        message: impl Into<String>,
        required_balance: f64,
        current_balance: f64,
        next_refill_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self::Error {
            error_type: "insufficient_balance".to_string(),
            message: message.into(),
            required_balance: Some(required_balance),
            current_balance: Some(current_balance),
            shortfall: Some(required_balance - current_balance),
            next_refill_time,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn stream_error(message: impl Into<String>) -> Self {
        Self::StreamError {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn completed(blog_id: Uuid, total_subsections: usize, total_sources: usize) -> Self {
        Self::Completed {
            message: "Sources collection complete and saved".to_string(),
            blog_id,
            total_subsections,
            total_sources,
            timestamp: Utc::now(),
        }
    }

    pub fn completed_with_warning(blog_id: Uuid, message: impl Into<String>) -> Self {
        Self::CompletedWithWarning {
            message: message.into(),
            blog_id,
            timestamp: Utc::now(),
        }
    }

    pub fn completed_with_error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self::CompletedWithError {
            message: message.into(),
            error: error.into(),
            timestamp: Utc::now(),
        }
    }

    /// True for the per-unit completion events the aggregator records.
    pub fn is_unit_completion(&self) -> bool {
        matches!(
            self,
            Self::SubsectionCompleted { .. } | Self::HeadingCompleted { .. }
        )
    }

    /// The wire value of the `status` tag.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Processing { .. } => "processing",
            Self::FoundWebsites { .. } => "found_websites",
            Self::SubsectionCompleted { .. } => "subsection_completed",
            Self::HeadingCompleted { .. } => "heading_completed",
            Self::ProcessingComplete { .. } => "processing_complete",
            Self::Error { .. } => "error",
            Self::Failed { .. } => "failed",
            Self::StreamError { .. } => "stream_error",
            Self::Completed { .. } => "completed",
            Self::CompletedWithWarning { .. } => "completed_with_warning",
            Self::CompletedWithError { .. } => "completed_with_error",
        }
    }
}
