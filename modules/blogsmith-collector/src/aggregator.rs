//! In-memory accumulation of per-unit results during a stream.

use blogsmith_common::{StreamEvent, SubsectionResult};

/// Watches events on their way to the client and keeps the completed unit
/// results, in emission order, for the final persistence write. Pure
/// bookkeeping: no suspension, nothing to fail.
#[derive(Default)]
pub struct ResultAggregator {
    results: Vec<SubsectionResult>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::SubsectionCompleted {
                subsection_title,
                heading_index,
                subsection_index,
                heading_title,
                is_direct_heading,
                sources,
                informations,
                timestamp,
                ..
            }
            | StreamEvent::HeadingCompleted {
                subsection_title,
                heading_index,
                subsection_index,
                heading_title,
                is_direct_heading,
                sources,
                informations,
                timestamp,
                ..
            } => {
                self.results.push(SubsectionResult {
                    title: subsection_title.clone(),
                    heading_index: *heading_index,
                    subsection_index: *subsection_index,
                    heading_title: heading_title.clone(),
                    is_direct_heading: *is_direct_heading,
                    sources: sources.clone(),
                    informations: informations.clone(),
                    processed_at: *timestamp,
                    sources_count: sources.len(),
                });
            }
            _ => {}
        }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn total_sources(&self) -> usize {
        self.results.iter().map(|r| r.sources_count).sum()
    }

    pub fn into_results(self) -> Vec<SubsectionResult> {
        self.results
    }
}
