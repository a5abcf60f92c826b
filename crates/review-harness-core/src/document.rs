//! Document construction and offset lookups.
//!
//! A document carries two independent partitions of its content: ordered
//! [`Section`]s (semantic grouping) and ordered [`Page`]s (display
//! pagination). Both are stored as offset tables sorted by offset, and
//! both are searched with the same binary search ([`locate`]). The
//! resolver uses these tables in both navigation directions, so there is
//! one source of truth for where a section or page begins.
//!
//! # Building
//!
//! [`build_document`] computes contiguous section offsets by prefix-summing
//! the requested lengths:
//!
//! ```rust
//! use review_harness_core::document::{build_document, SectionSpec, Sectioning};
//!
//! let doc = build_document(
//!     "Essay",
//!     "Intro.Body.",
//!     Sectioning::Lengths(vec![SectionSpec::new("Intro", 6), SectionSpec::new("Body", 5)]),
//!     None,
//! )
//! .unwrap();
//! assert_eq!(doc.sections[1].offset, 6);
//! assert_eq!(doc.sections[1].content, "Body.");
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::annotations::verify_references;
use crate::error::{ReviewError, Result};
use crate::models::{Analysis, Document, DocumentMeta, Page, Section};
use crate::range::{char_len, TextRange};

/// Title used for the section produced by [`Sectioning::Single`] when none
/// is given.
pub const DEFAULT_SECTION_TITLE: &str = "Document";

/// One requested section: a title and a length in characters.
///
/// `length` is signed because specs arrive from external collaborators;
/// negative values are rejected by [`build_document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub title: String,
    pub length: i64,
}

impl SectionSpec {
    pub fn new(title: impl Into<String>, length: i64) -> Self {
        Self {
            title: title.into(),
            length,
        }
    }
}

/// How to partition content into sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sectioning {
    /// One section spanning the whole content.
    Single { title: String },
    /// Consecutive sections with the given lengths.
    Lengths(Vec<SectionSpec>),
}

impl Default for Sectioning {
    fn default() -> Self {
        Sectioning::Single {
            title: DEFAULT_SECTION_TITLE.to_string(),
        }
    }
}

/// Stable id of the `index`-th section (zero-based).
pub fn section_id(index: usize) -> String {
    format!("sec-{}", index + 1)
}

/// Build a document from raw text.
///
/// Sections are laid out contiguously by prefix sum. When `pages` is
/// given, each page is located in order inside `content`; text between two
/// located pages (e.g. a `"\n\n"` separator) belongs to the preceding page.
/// Without `pages`, the document has a single page holding all content.
///
/// # Errors
///
/// [`ReviewError::InvalidSectioning`] if a length is negative, the lengths
/// do not sum to the content length, or a page cannot be located.
pub fn build_document(
    title: &str,
    content: &str,
    sectioning: Sectioning,
    pages: Option<Vec<String>>,
) -> Result<Document> {
    build_document_with_meta(title, content, sectioning, pages, DocumentMeta::default())
}

/// [`build_document`] with explicit upload metadata.
pub fn build_document_with_meta(
    title: &str,
    content: &str,
    sectioning: Sectioning,
    pages: Option<Vec<String>>,
    meta: DocumentMeta,
) -> Result<Document> {
    let sections = layout_sections(content, sectioning)?;
    let pages = match pages {
        Some(pages) => locate_pages(content, pages)?,
        None => vec![Page {
            offset: 0,
            text: content.to_string(),
        }],
    };

    Ok(Document {
        id: Uuid::new_v4().to_string(),
        title: title.to_string(),
        content: Arc::from(content),
        content_hash: content_hash(content),
        meta,
        sections: sections.into(),
        pages: pages.into(),
        analysis: None,
    })
}

/// Assemble a document from externally supplied sections and pages
/// without validating them.
///
/// Lookups on the result never panic, even if the offsets are
/// inconsistent; call [`Document::verify_tiling`] to find out whether they
/// are.
pub fn document_from_parts(
    id: impl Into<String>,
    title: impl Into<String>,
    content: &str,
    sections: Vec<Section>,
    pages: Vec<Page>,
) -> Document {
    let pages = if pages.is_empty() {
        vec![Page {
            offset: 0,
            text: content.to_string(),
        }]
    } else {
        pages
    };
    Document {
        id: id.into(),
        title: title.into(),
        content: Arc::from(content),
        content_hash: content_hash(content),
        meta: DocumentMeta::default(),
        sections: sections.into(),
        pages: pages.into(),
        analysis: None,
    }
}

fn layout_sections(content: &str, sectioning: Sectioning) -> Result<Vec<Section>> {
    let specs = match sectioning {
        Sectioning::Single { title } => {
            return Ok(vec![Section {
                id: section_id(0),
                title,
                content: content.to_string(),
                offset: 0,
            }]);
        }
        Sectioning::Lengths(specs) => specs,
    };

    if specs.is_empty() {
        return Err(ReviewError::InvalidSectioning(
            "at least one section is required".to_string(),
        ));
    }
    if let Some(bad) = specs.iter().find(|s| s.length < 0) {
        return Err(ReviewError::InvalidSectioning(format!(
            "section '{}' has negative length {}",
            bad.title, bad.length
        )));
    }

    let total = specs
        .iter()
        .try_fold(0i64, |acc, s| acc.checked_add(s.length))
        .ok_or_else(|| {
            ReviewError::InvalidSectioning("section lengths overflow".to_string())
        })?;
    let len = char_len(content);
    if total != len as i64 {
        return Err(ReviewError::InvalidSectioning(format!(
            "section lengths sum to {} but content has {} characters",
            total, len
        )));
    }

    let mut sections = Vec::with_capacity(specs.len());
    let mut offset = 0usize;
    for (index, spec) in specs.into_iter().enumerate() {
        let length = spec.length as usize;
        let range = TextRange::with_len(offset, length);
        sections.push(Section {
            id: section_id(index),
            title: spec.title,
            content: range.slice(content).to_string(),
            offset,
        });
        offset += length;
    }
    Ok(sections)
}

fn locate_pages(content: &str, pages: Vec<String>) -> Result<Vec<Page>> {
    if pages.is_empty() {
        return Ok(vec![Page {
            offset: 0,
            text: content.to_string(),
        }]);
    }

    let mut located = Vec::with_capacity(pages.len());
    let mut cursor_bytes = 0usize;
    let mut cursor_chars = 0usize;
    for (index, text) in pages.into_iter().enumerate() {
        let found = content[cursor_bytes..].find(text.as_str()).ok_or_else(|| {
            ReviewError::InvalidSectioning(format!(
                "page {} does not appear in the content after offset {}",
                index + 1,
                cursor_chars
            ))
        })?;
        let start_bytes = cursor_bytes + found;
        let offset = cursor_chars + char_len(&content[cursor_bytes..start_bytes]);
        cursor_bytes = start_bytes + text.len();
        cursor_chars = offset + char_len(&text);
        located.push(Page { offset, text });
    }
    // Leading text before the first page belongs to it.
    if let Some(first) = located.first_mut() {
        first.offset = 0;
    }
    Ok(located)
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Index of the last entry whose offset is `<= target`.
///
/// Entries are expected in ascending offset order. If they are not, the
/// result is still a valid index (or `None`), just not a meaningful one.
pub(crate) fn locate<T>(entries: &[T], offset_of: impl Fn(&T) -> usize, target: usize) -> Option<usize> {
    let after = entries.partition_point(|e| offset_of(e) <= target);
    after.checked_sub(1)
}

/// The section containing `global_offset`.
///
/// # Errors
///
/// [`ReviewError::OutOfRange`] if `global_offset` is outside
/// `[0, content length)`.
pub fn section_at(document: &Document, global_offset: usize) -> Result<&Section> {
    let len = document.len();
    if global_offset >= len {
        return Err(ReviewError::OutOfRange {
            offset: global_offset,
            len,
        });
    }
    locate(&document.sections, |s| s.offset, global_offset)
        .map(|i| &document.sections[i])
        .ok_or(ReviewError::OutOfRange {
            offset: global_offset,
            len,
        })
}

/// Index of the page containing `global_offset`.
///
/// An empty document has one empty page and offset `0` maps to it.
pub fn page_at(document: &Document, global_offset: usize) -> Result<usize> {
    let len = document.len();
    if global_offset >= len && !(len == 0 && global_offset == 0) {
        return Err(ReviewError::OutOfRange {
            offset: global_offset,
            len,
        });
    }
    locate(&document.pages, |p| p.offset, global_offset).ok_or(ReviewError::OutOfRange {
        offset: global_offset,
        len,
    })
}

/// Global span of page `index`: from its offset to the next page's offset,
/// or to the end of content for the last page.
pub fn page_range(document: &Document, index: usize) -> Option<TextRange> {
    let page = document.pages.get(index)?;
    let end = document
        .pages
        .get(index + 1)
        .map(|next| next.offset)
        .unwrap_or_else(|| document.len());
    Some(TextRange::with_len(page.offset, end.saturating_sub(page.offset)))
}

/// Return a new snapshot with `analysis` attached.
///
/// The argument is not modified; readers holding the old snapshot keep
/// seeing `analysis == None`.
///
/// # Errors
///
/// Every issue is checked with
/// [`verify_references`](crate::annotations::verify_references); the first
/// inconsistency is returned and nothing is attached.
pub fn attach_analysis(document: &Document, analysis: Analysis) -> Result<Document> {
    verify_references(&analysis, document)?;
    Ok(Document {
        analysis: Some(Arc::new(analysis)),
        ..document.clone()
    })
}

impl Document {
    /// Check that sections tile the content: first offset 0, each section
    /// starting where the previous ended, the last ending at the content
    /// length, and each section's text matching the content at its offset.
    pub fn verify_tiling(&self) -> Result<()> {
        let len = self.len();
        let mut expected = 0usize;
        for section in self.sections.iter() {
            if section.offset != expected {
                let what = if section.offset > expected { "gap" } else { "overlap" };
                return Err(ReviewError::InvalidSectioning(format!(
                    "{} before section '{}': expected offset {}, found {}",
                    what, section.id, expected, section.offset
                )));
            }
            let span = section.global_range();
            if span.end() > len || span.slice(&self.content) != section.content {
                return Err(ReviewError::InvalidSectioning(format!(
                    "section '{}' text does not match content at offset {}",
                    section.id, section.offset
                )));
            }
            expected = span.end();
        }
        if expected != len {
            return Err(ReviewError::InvalidSectioning(format!(
                "sections cover {} of {} characters",
                expected, len
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_sections() -> Document {
        build_document(
            "Essay",
            "Intro text. Body text here. End.",
            Sectioning::Lengths(vec![
                SectionSpec::new("Intro", 12),
                SectionSpec::new("Body", 16),
                SectionSpec::new("End", 4),
            ]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_prefix_sum_offsets() {
        let doc = three_sections();
        let offsets: Vec<usize> = doc.sections.iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0, 12, 28]);
        assert_eq!(doc.sections[0].content, "Intro text. ");
        assert_eq!(doc.sections[2].content, "End.");
        assert_eq!(doc.sections[1].id, "sec-2");
        doc.verify_tiling().unwrap();
    }

    #[test]
    fn test_single_section_default() {
        let doc = build_document("T", "hello", Sectioning::default(), None).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, DEFAULT_SECTION_TITLE);
        assert_eq!(doc.sections[0].content, "hello");
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn test_lengths_must_sum_to_content() {
        let err = build_document(
            "T",
            "hello",
            Sectioning::Lengths(vec![SectionSpec::new("a", 2), SectionSpec::new("b", 2)]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidSectioning(_)));
    }

    #[test]
    fn test_negative_length_rejected() {
        let err = build_document(
            "T",
            "hello",
            Sectioning::Lengths(vec![SectionSpec::new("a", 7), SectionSpec::new("b", -2)]),
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[test]
    fn test_overflowing_lengths_rejected() {
        let err = build_document(
            "T",
            "ab",
            Sectioning::Lengths(vec![
                SectionSpec::new("a", i64::MAX),
                SectionSpec::new("b", 3),
            ]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidSectioning(_)));
        assert!(err.to_string().contains("overflow"));
    }

    #[test]
    fn test_section_at_boundaries() {
        let doc = three_sections();
        assert_eq!(section_at(&doc, 0).unwrap().id, "sec-1");
        assert_eq!(section_at(&doc, 11).unwrap().id, "sec-1");
        assert_eq!(section_at(&doc, 12).unwrap().id, "sec-2");
        assert_eq!(section_at(&doc, 31).unwrap().id, "sec-3");
        assert_eq!(
            section_at(&doc, 32),
            Err(ReviewError::OutOfRange { offset: 32, len: 32 })
        );
    }

    #[test]
    fn test_section_at_skips_empty_sections() {
        let doc = build_document(
            "T",
            "abcdef",
            Sectioning::Lengths(vec![
                SectionSpec::new("a", 3),
                SectionSpec::new("empty", 0),
                SectionSpec::new("b", 3),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(section_at(&doc, 3).unwrap().title, "b");
        assert_eq!(section_at(&doc, 2).unwrap().title, "a");
    }

    #[test]
    fn test_pages_located_with_separators() {
        let pages = vec!["Page one.".to_string(), "Page two.".to_string()];
        let content = pages.join("\n\n");
        let doc = build_document("T", &content, Sectioning::default(), Some(pages)).unwrap();
        assert_eq!(doc.pages[0].offset, 0);
        assert_eq!(doc.pages[1].offset, 11);
        assert_eq!(page_at(&doc, 9).unwrap(), 0); // separator belongs to page 0
        assert_eq!(page_at(&doc, 11).unwrap(), 1);
        assert_eq!(page_range(&doc, 0), Some(TextRange::new(0, 11).unwrap()));
        assert_eq!(page_range(&doc, 1), Some(TextRange::new(11, 20).unwrap()));
    }

    #[test]
    fn test_missing_page_rejected() {
        let err = build_document(
            "T",
            "alpha beta",
            Sectioning::default(),
            Some(vec!["beta".to_string(), "alpha".to_string()]),
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidSectioning(_)));
    }

    #[test]
    fn test_empty_document() {
        let doc = build_document("Empty", "", Sectioning::default(), None).unwrap();
        assert!(doc.is_empty());
        assert!(section_at(&doc, 0).is_err());
        assert_eq!(page_at(&doc, 0).unwrap(), 0);
        doc.verify_tiling().unwrap();
    }

    #[test]
    fn test_inconsistent_external_sections_do_not_panic() {
        let sections = vec![
            Section {
                id: "b".into(),
                title: "B".into(),
                content: "world".into(),
                offset: 40,
            },
            Section {
                id: "a".into(),
                title: "A".into(),
                content: "hello".into(),
                offset: 0,
            },
        ];
        let doc = document_from_parts("d", "T", "hello world", sections, Vec::new());
        // Unsorted offsets still produce some answer without panicking.
        for offset in 0..doc.len() {
            let _ = section_at(&doc, offset);
        }
        assert!(matches!(
            doc.verify_tiling(),
            Err(ReviewError::InvalidSectioning(_))
        ));
    }

    #[test]
    fn test_attach_analysis_returns_new_snapshot() {
        let doc = three_sections();
        let analysis = Analysis {
            issues: Vec::new(),
            overall_score: 8.0,
            strengths: vec!["Clear thesis".into()],
            suggestions: Vec::new(),
            complete: true,
        };
        let analyzed = attach_analysis(&doc, analysis).unwrap();
        assert!(doc.analysis.is_none());
        assert!(analyzed.analysis.is_some());
        assert_eq!(analyzed.id, doc.id);
        assert!(Arc::ptr_eq(&analyzed.sections, &doc.sections));
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = build_document("A", "same", Sectioning::default(), None).unwrap();
        let b = build_document("B", "same", Sectioning::default(), None).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_ne!(a.id, b.id);
    }
}
