//! Outcome reporting for multi-row persistence operations.
//!
//! Batches issue one independent request per row. A failed row never rolls back the
//! rows before it and never stops the rows after it; only cancellation stops a batch,
//! and rows not attempted are listed as skipped.

use std::fmt;

use serde::Serialize;

use catalog_core::VariantId;
use catalog_variants::CombinationKey;

use crate::editor::EditorError;
use crate::store::StoreError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum BatchOperation {
    GenerateVariants,
    SetAvailability { is_available: bool },
    PruneOrphans,
}

impl fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchOperation::GenerateVariants => f.write_str("generate variants"),
            BatchOperation::SetAvailability { is_available: true } => {
                f.write_str("mark all available")
            }
            BatchOperation::SetAvailability {
                is_available: false,
            } => f.write_str("mark all unavailable"),
            BatchOperation::PruneOrphans => f.write_str("delete orphaned variants"),
        }
    }
}

/// One row of a batch, identified the way the operator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchItem {
    pub label: String,
    pub key: CombinationKey,
    /// Set once the row has a persisted variant (always, except for failed creates).
    pub variant_id: Option<VariantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    pub item: BatchItem,
    #[serde(serialize_with = "serialize_error")]
    pub error: StoreError,
}

fn serialize_error<S: serde::Serializer>(err: &StoreError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(err)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub operation: BatchOperation,
    pub succeeded: Vec<BatchItem>,
    pub failed: Vec<BatchFailure>,
    /// Rows never attempted because the batch was cancelled.
    pub skipped: Vec<BatchItem>,
}

impl BatchReport {
    pub fn new(operation: BatchOperation) -> Self {
        Self {
            operation,
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    /// Every row was attempted and none failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn was_cancelled(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Aggregate line for the operator, e.g. `generate variants: 3 succeeded, 1 failed`.
    pub fn summary(&self) -> String {
        if self.total() == 0 {
            return format!("{}: nothing to do", self.operation);
        }
        let mut summary = format!(
            "{}: {} succeeded, {} failed",
            self.operation,
            self.succeeded.len(),
            self.failed.len()
        );
        if self.was_cancelled() {
            summary.push_str(&format!(", {} skipped (cancelled)", self.skipped.len()));
        }
        summary
    }

    /// The aggregate notice followed by one notice per failed row.
    pub fn notices(&self) -> Vec<Notice> {
        let level = if !self.failed.is_empty() {
            NoticeLevel::Error
        } else if self.was_cancelled() {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Info
        };

        std::iter::once(Notice::new(level, self.summary()))
            .chain(self.failed.iter().map(|failure| {
                Notice::new(
                    NoticeLevel::Error,
                    format!(
                        "{} failed for '{}': {}",
                        self.operation, failure.item.label, failure.error
                    ),
                )
            }))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A dismissible message for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn from_error(err: &EditorError) -> Self {
        let level = match err {
            EditorError::TooManyCombinations { .. } => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Self::new(level, err.to_string())
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}
