//! In-memory library of uploaded documents.
//!
//! Documents keep upload order. Uploading the same text twice returns the
//! existing entry (matched by content hash) instead of adding a copy.

use std::sync::Arc;
use tracing::debug;

use review_harness_core::models::Document;

#[derive(Debug, Default, Clone)]
pub struct Library {
    documents: Vec<Arc<Document>>,
}

/// Result of [`Library::add`].
#[derive(Debug, Clone)]
pub enum Added {
    New(Arc<Document>),
    /// Same content was already uploaded under this entry.
    Existing(Arc<Document>),
}

impl Added {
    pub fn document(&self) -> &Arc<Document> {
        match self {
            Added::New(d) | Added::Existing(d) => d,
        }
    }
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, document: Document) -> Added {
        if let Some(existing) = self
            .documents
            .iter()
            .find(|d| d.content_hash == document.content_hash)
        {
            debug!(document_id = %existing.id, "Duplicate upload");
            return Added::Existing(existing.clone());
        }
        let document = Arc::new(document);
        self.documents.push(document.clone());
        Added::New(document)
    }

    /// Swap in a newer snapshot of a stored document, e.g. once analyzed.
    pub fn update(&mut self, document: Arc<Document>) -> bool {
        match self.documents.iter_mut().find(|d| d.id == document.id) {
            Some(slot) => {
                *slot = document;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Document>> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Arc<Document>> {
        let index = self.documents.iter().position(|d| d.id == id)?;
        Some(self.documents.remove(index))
    }

    /// Documents whose title contains `query`, ignoring case.
    pub fn filter(&self, query: &str) -> Vec<&Arc<Document>> {
        let query = query.to_lowercase();
        self.documents
            .iter()
            .filter(|d| d.title.to_lowercase().contains(&query))
            .collect()
    }

    pub fn list(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}
