use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Marker stored as `informations` when a subsection produced nothing usable.
pub const NO_INFORMATION_FOUND: &str = "No information found";

pub fn no_information_marker() -> Value {
    serde_json::json!({ "message": NO_INFORMATION_FOUND })
}

// --- Outline ---

/// Canonical outline shape: ordered headings, each with ordered subsection
/// titles. Produced once at the request boundary by [`Outline::from_payload`];
/// everything downstream only sees this form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    pub headings: Vec<OutlineHeading>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineHeading {
    pub title: String,
    pub subsections: Vec<String>,
}

/// One unit of collection work: a subsection, or a heading with no
/// subsections standing in for one (`is_direct_heading`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingUnit {
    pub heading_index: usize,
    pub subsection_index: usize,
    pub heading_title: String,
    pub title: String,
    pub is_direct_heading: bool,
}

impl Outline {
    /// Normalize the legacy payload shapes into the canonical outline.
    ///
    /// Accepted shapes for the `outline` value:
    /// - `{"outline": {"sections": [...]}}` (doubly nested)
    /// - `{"sections": [...]}`
    /// - `[...]` (flat section list)
    ///
    /// Each section is `{"heading": "...", "subsections": [...]}` where a
    /// subsection is either a bare string or `{"title": "..."}`. Anything
    /// unrecognized is skipped; a missing heading title gets a positional
    /// placeholder.
    pub fn from_payload(payload: &Value) -> Self {
        let mut node = payload;
        if let Some(inner) = node.get("outline") {
            node = inner;
        }
        if let Some(sections) = node.get("sections") {
            node = sections;
        }

        let sections = match node.as_array() {
            Some(sections) => sections,
            None => return Self { headings: Vec::new() },
        };

        let mut headings = Vec::new();
        for (idx, section) in sections.iter().enumerate() {
            let section = match section.as_object() {
                Some(obj) => obj,
                None => continue,
            };

            let title = section
                .get("heading")
                .or_else(|| section.get("title"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Heading {}", idx + 1));

            let subsections = section
                .get("subsections")
                .and_then(Value::as_array)
                .map(|subs| {
                    subs.iter()
                        .filter_map(|sub| match sub {
                            Value::String(s) => Some(s.clone()),
                            Value::Object(obj) => obj
                                .get("title")
                                .and_then(Value::as_str)
                                .map(str::to_string),
                            _ => None,
                        })
                        .collect()
                })
                .unwrap_or_default();

            headings.push(OutlineHeading { title, subsections });
        }

        Self { headings }
    }

    /// Flatten into processing units in heading-major, subsection-minor order.
    /// A heading without subsections becomes a single direct-heading unit.
    pub fn units(&self) -> Vec<ProcessingUnit> {
        let mut units = Vec::new();
        for (heading_index, heading) in self.headings.iter().enumerate() {
            if heading.subsections.is_empty() {
                units.push(ProcessingUnit {
                    heading_index,
                    subsection_index: 0,
                    heading_title: heading.title.clone(),
                    title: heading.title.clone(),
                    is_direct_heading: true,
                });
                continue;
            }
            for (subsection_index, title) in heading.subsections.iter().enumerate() {
                units.push(ProcessingUnit {
                    heading_index,
                    subsection_index,
                    heading_title: heading.title.clone(),
                    title: title.clone(),
                    is_direct_heading: false,
                });
            }
        }
        units
    }

    pub fn is_empty(&self) -> bool {
        self.headings.is_empty()
    }
}

// --- Collection results ---

/// A web page discovered for a subsection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// Completed collection output for one processing unit. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsectionResult {
    pub title: String,
    pub heading_index: usize,
    pub subsection_index: usize,
    pub heading_title: String,
    pub is_direct_heading: bool,
    pub sources: Vec<SourceRef>,
    pub informations: Value,
    pub processed_at: DateTime<Utc>,
    pub sources_count: usize,
}

// --- Persisted records ---

/// How a persisted record was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordTag {
    Final,
    Generated,
    Updated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingMetadata {
    pub queries_per_subsection: usize,
    pub results_per_query: usize,
    pub max_sources_per_subsection: usize,
}

/// One entry of the append-only `sources` history on a blog document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesRecord {
    pub subsections_data: Vec<SubsectionResult>,
    pub outline: Value,
    pub total_subsections: usize,
    pub total_sources: usize,
    pub primary_keyword: String,
    pub country: String,
    pub blog_title: String,
    pub generated_at: DateTime<Utc>,
    pub processing_metadata: ProcessingMetadata,
    pub tag: RecordTag,
}

/// Sibling "outline finalized" entry appended alongside a sources record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineRecord {
    pub outline: Value,
    pub sources_collected: bool,
    pub finalized_at: DateTime<Utc>,
    pub primary_keyword: String,
    pub country: String,
    pub blog_title: String,
    pub tag: RecordTag,
}

/// Step-tracking entry recording a pipeline stage completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEntry {
    pub step: String,
    pub status: String,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_flat_section_list() {
        let payload = json!([
            {"heading": "Intro", "subsections": ["What", "Why"]},
            {"heading": "Details", "subsections": [{"title": "How"}]},
        ]);
        let outline = Outline::from_payload(&payload);
        assert_eq!(outline.headings.len(), 2);
        assert_eq!(outline.headings[0].subsections, vec!["What", "Why"]);
        assert_eq!(outline.headings[1].subsections, vec!["How"]);
    }

    #[test]
    fn normalizes_doubly_nested_shape() {
        let payload = json!({
            "outline": {
                "sections": [{"heading": "Basics", "subsections": ["One"]}]
            }
        });
        let outline = Outline::from_payload(&payload);
        assert_eq!(outline.headings.len(), 1);
        assert_eq!(outline.headings[0].title, "Basics");
    }

    #[test]
    fn unrecognized_payload_yields_empty_outline() {
        assert!(Outline::from_payload(&json!("nonsense")).is_empty());
        assert!(Outline::from_payload(&json!({"foo": 1})).is_empty());
        assert!(Outline::from_payload(&Value::Null).is_empty());
    }

    #[test]
    fn missing_heading_title_gets_placeholder() {
        let payload = json!([{"subsections": ["A"]}]);
        let outline = Outline::from_payload(&payload);
        assert_eq!(outline.headings[0].title, "Heading 1");
    }

    #[test]
    fn heading_without_subsections_becomes_direct_unit() {
        let payload = json!([
            {"heading": "Conclusion"},
            {"heading": "Body", "subsections": ["First", "Second"]},
        ]);
        let units = Outline::from_payload(&payload).units();
        assert_eq!(units.len(), 3);
        assert!(units[0].is_direct_heading);
        assert_eq!(units[0].title, "Conclusion");
        assert_eq!(units[0].heading_title, "Conclusion");
        assert!(!units[1].is_direct_heading);
        assert_eq!(units[2].title, "Second");
        assert_eq!(units[2].heading_index, 1);
        assert_eq!(units[2].subsection_index, 1);
    }

    #[test]
    fn units_preserve_outline_order() {
        let payload = json!([
            {"heading": "H1", "subsections": ["a", "b"]},
            {"heading": "H2", "subsections": ["c"]},
        ]);
        let titles: Vec<String> = Outline::from_payload(&payload)
            .units()
            .into_iter()
            .map(|u| u.title)
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn record_tag_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(RecordTag::Generated).unwrap(),
            json!("generated")
        );
        assert_eq!(
            serde_json::to_value(RecordTag::Final).unwrap(),
            json!("final")
        );
    }
}
