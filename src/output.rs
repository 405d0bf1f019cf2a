//! Work items and the results a batch run produces.
//!
//! [`WorkItem`] is created when an entry is pulled from the pending list and
//! filled in as the controller resolves its extension and page count. Every
//! item ends with exactly one [`ProcessingOutcome`]; the outcomes are gathered
//! into a [`BatchReport`] returned to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One repository entry flagged as needing a generated preview.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkItem {
    /// Repository-assigned identifier.
    pub id: String,
    /// Declared mime type, once metadata is fetched.
    pub mime_type: Option<String>,
    /// Extension recorded by the uploader, e.g. `.pdf`.
    pub hinted_extension: Option<String>,
    /// Extension chosen by the classifier.
    pub extension: Option<String>,
    /// Path of the staged copy, `<id><extension>`.
    pub local_file: Option<PathBuf>,
    /// Number of pages published.
    pub page_count: Option<usize>,
}

impl WorkItem {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

/// One rasterised page on local disk.
///
/// `index` is the rasteriser's 0-based ordinal; publishing renumbers pages
/// from 1 in `index` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    pub index: usize,
    pub path: PathBuf,
}

/// Why an item produced no previews without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    /// Mime type is on the ignore list.
    IgnoredType,
    /// Mime type has no entry in the extension table.
    UnknownType,
    /// The document yielded zero pages.
    NoPages,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::IgnoredType => "ignored-type",
            SkipReason::UnknownType => "unknown-type",
            SkipReason::NoPages => "no-pages",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse failure category, derived from [`crate::error::ItemError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    MetadataFetch,
    ContentFetch,
    InvalidId,
    Staging,
    Rasterize,
    Transform,
    Publish,
    Internal,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::MetadataFetch => "metadata-fetch",
            FailureReason::ContentFetch => "content-fetch",
            FailureReason::InvalidId => "invalid-id",
            FailureReason::Staging => "staging-error",
            FailureReason::Rasterize => "rasterize-error",
            FailureReason::Transform => "transform-error",
            FailureReason::Publish => "publish-error",
            FailureReason::Internal => "internal-error",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    Succeeded { page_count: usize },
    Skipped { reason: SkipReason },
    Failed { reason: FailureReason, message: String },
}

impl ProcessingOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ProcessingOutcome::Failed { .. })
    }
}

impl fmt::Display for ProcessingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingOutcome::Succeeded { page_count } => {
                write!(f, "succeeded ({page_count} pages)")
            }
            ProcessingOutcome::Skipped { reason } => write!(f, "skipped ({reason})"),
            ProcessingOutcome::Failed { reason, message } => {
                write!(f, "failed ({reason}): {message}")
            }
        }
    }
}

/// The outcome recorded for one item of a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReport {
    pub item: WorkItem,
    pub outcome: ProcessingOutcome,
}

/// Summary of one controller run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Items in the order they were processed.
    pub items: Vec<ItemReport>,
    /// Wall-clock time for the whole run.
    pub duration_ms: u64,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ProcessingOutcome::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ProcessingOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(ProcessingOutcome::is_failure)
    }

    fn count(&self, pred: impl Fn(&ProcessingOutcome) -> bool) -> usize {
        self.items.iter().filter(|r| pred(&r.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: ProcessingOutcome) -> ItemReport {
        ItemReport {
            item: WorkItem::new("x"),
            outcome,
        }
    }

    #[test]
    fn batch_report_counts() {
        let batch = BatchReport {
            items: vec![
                report(ProcessingOutcome::Succeeded { page_count: 3 }),
                report(ProcessingOutcome::Skipped {
                    reason: SkipReason::NoPages,
                }),
                report(ProcessingOutcome::Failed {
                    reason: FailureReason::ContentFetch,
                    message: "HTTP 404".into(),
                }),
                report(ProcessingOutcome::Succeeded { page_count: 1 }),
            ],
            duration_ms: 10,
        };
        assert_eq!(batch.total(), 4);
        assert_eq!(batch.succeeded(), 2);
        assert_eq!(batch.skipped(), 1);
        assert_eq!(batch.failed(), 1);
    }

    #[test]
    fn outcome_serialises_with_kebab_reasons() {
        let json = serde_json::to_string(&ProcessingOutcome::Skipped {
            reason: SkipReason::IgnoredType,
        })
        .unwrap();
        assert_eq!(json, r#"{"status":"skipped","reason":"ignored-type"}"#);
    }
}
