//! Contracts for the external collaborators.
//!
//! The core never computes an analysis or writes a reply. It consumes
//! whatever an [`AnalysisService`] or [`ResponseGenerator`] returns and
//! validates it against the document it describes.
//!
//! Both traits are async (via `async-trait`) and `Send + Sync` so an
//! application can drive them from a tokio task. Failures are reported as
//! [`ReviewError::AnalysisFailed`](crate::error::ReviewError::AnalysisFailed)
//! and [`ReviewError::GenerationFailed`](crate::error::ReviewError::GenerationFailed).

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Analysis, Document, Message, Reply};

/// Produces issues and a score for a document.
///
/// Every returned issue must name a section of `document` and a range
/// inside it; the caller checks this when attaching the analysis.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(&self, document: &Document) -> Result<Analysis>;
}

/// Produces the assistant's reply to a user message.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// `conversation` is the log so far, including the user message being
    /// answered as its last user entry.
    async fn respond(&self, conversation: &[Message], document: &Document, text: &str)
        -> Result<Reply>;
}
