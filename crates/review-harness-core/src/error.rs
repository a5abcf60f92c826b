//! Error taxonomy for the review core.
//!
//! `InvalidSectioning`, `DanglingReference` and `DuplicateIssue` mean an
//! external collaborator produced data that is inconsistent with the
//! document it describes. They are reported to the caller and never
//! recovered by dropping the offending record. `OutOfRange` on page
//! navigation is recovered by clamping inside the resolver and only
//! escapes from offset lookups.

use thiserror::Error;

/// Errors produced by the document model, annotation store and resolver,
/// and by the external service contracts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    /// Section lengths or pre-split pages do not tile the document content.
    #[error("invalid sectioning: {0}")]
    InvalidSectioning(String),

    /// A range was constructed with `start > end`.
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },

    /// An offset fell outside `[0, len)` of the text it indexes.
    #[error("offset {offset} is out of range for length {len}")]
    OutOfRange { offset: usize, len: usize },

    /// An issue or reference points at a section, issue or page that does
    /// not exist.
    #[error("dangling {kind} reference: {target}")]
    DanglingReference { kind: &'static str, target: String },

    /// Two issues in one analysis share an id.
    #[error("duplicate issue id: {0}")]
    DuplicateIssue(String),

    /// The analysis service failed. Retryable.
    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    /// The response generator failed. Retryable.
    #[error("generation failed: {0}")]
    GenerationFailed(String),

    /// A result arrived for a document that is no longer current.
    #[error("stale response for document {document_id}")]
    StaleResponse { document_id: String },
}

impl ReviewError {
    pub(crate) fn dangling(kind: &'static str, target: impl Into<String>) -> Self {
        ReviewError::DanglingReference {
            kind,
            target: target.into(),
        }
    }

    /// Whether re-invoking the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReviewError::AnalysisFailed(_) | ReviewError::GenerationFailed(_)
        )
    }
}

pub type Result<T, E = ReviewError> = std::result::Result<T, E>;
