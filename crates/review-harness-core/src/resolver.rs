//! Reference → navigation target, and page → visible content.
//!
//! Both directions read the document's section and page offset tables
//! through [`page_at`], [`page_range`] and the section list. Nothing here
//! keeps its own copy of those tables.
//!
//! | Reference | Resolves to |
//! |-----------|-------------|
//! | `Page(n)` | page `n`, clamped to `[0, pages - 1]` |
//! | `Section(id)` | page holding the section's first character |
//! | `Issue(id)` | same page as `Section(issue.section_id)`, anchored at the issue |

use serde::Serialize;

use crate::annotations::issue_by_id;
use crate::document::{page_at, page_range};
use crate::error::{ReviewError, Result};
use crate::models::{Document, Reference, Section};
use crate::range::TextRange;

/// Where the view should scroll to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScrollAnchor {
    /// Top of the page.
    Page,
    /// Heading of a section.
    Section { section_id: String },
    /// An issue's highlight, with its global character range.
    Issue { issue_id: String, range: TextRange },
}

/// A concrete navigation target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub page_index: usize,
    /// Section at the anchor point. `None` only for an empty document.
    pub section_id: Option<String>,
    pub anchor: ScrollAnchor,
}

/// What is visible when a page is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageView {
    pub page_index: usize,
    /// Global character span of the page.
    pub range: TextRange,
    /// Sections with at least one character on the page, in order. An
    /// empty page lists the section at its offset.
    pub section_ids: Vec<String>,
    /// Issues whose global range touches the page, in insertion order.
    pub issue_ids: Vec<String>,
}

/// Clamp a possibly hallucinated page number into the document.
pub fn clamp_page(document: &Document, page: i64) -> usize {
    let last = document.page_count().saturating_sub(1) as i64;
    page.clamp(0, last) as usize
}

/// Resolve a reference into a [`Location`].
///
/// # Errors
///
/// [`ReviewError::DanglingReference`] when a section or issue does not
/// exist (including issue references on a document with no analysis).
/// Page references never fail.
pub fn resolve(document: &Document, reference: &Reference) -> Result<Location> {
    match reference {
        Reference::Page(n) => {
            let page_index = clamp_page(document, *n);
            let section_id = page_range(document, page_index)
                .and_then(|r| section_starting_view(document, r.start()))
                .map(|s| s.id.clone());
            Ok(Location {
                page_index,
                section_id,
                anchor: ScrollAnchor::Page,
            })
        }
        Reference::Section(id) => {
            let section = document
                .section(id)
                .ok_or_else(|| ReviewError::dangling("section", id.clone()))?;
            Ok(Location {
                page_index: page_for_offset(document, section.offset),
                section_id: Some(section.id.clone()),
                anchor: ScrollAnchor::Section {
                    section_id: section.id.clone(),
                },
            })
        }
        Reference::Issue(id) => {
            let issue = document
                .analysis
                .as_deref()
                .and_then(|a| issue_by_id(a, id))
                .ok_or_else(|| ReviewError::dangling("issue", id.clone()))?;
            let section = document
                .section(&issue.section_id)
                .ok_or_else(|| ReviewError::dangling("section", issue.section_id.clone()))?;
            let global = issue.range.offset_by(section.offset);
            Ok(Location {
                page_index: page_for_offset(document, section.offset),
                section_id: Some(section.id.clone()),
                anchor: ScrollAnchor::Issue {
                    issue_id: issue.id.clone(),
                    range: global,
                },
            })
        }
    }
}

/// Resolve every reference, keeping each outcome.
pub fn resolve_all(document: &Document, references: &[Reference]) -> Vec<Result<Location>> {
    references.iter().map(|r| resolve(document, r)).collect()
}

/// Inverse of [`resolve`]: the sections and issues visible on `page`.
///
/// The page is clamped like a `Page` reference.
pub fn view_for_page(document: &Document, page: i64) -> PageView {
    let page_index = clamp_page(document, page);
    let range = page_range(document, page_index).unwrap_or(TextRange::point(0));

    let mut section_ids: Vec<String> = document
        .sections
        .iter()
        .filter(|s| s.global_range().overlaps(&range))
        .map(|s| s.id.clone())
        .collect();
    if section_ids.is_empty() {
        if let Some(s) = section_starting_view(document, range.start()) {
            section_ids.push(s.id.clone());
        }
    }

    let issue_ids = document
        .analysis
        .as_deref()
        .map(|analysis| {
            analysis
                .issues
                .iter()
                .filter(|issue| {
                    document.section(&issue.section_id).is_some_and(|s| {
                        let global = issue.range.offset_by(s.offset);
                        global.overlaps(&range)
                            || (global.is_point() && range.contains(global.start()))
                    })
                })
                .map(|issue| issue.id.clone())
                .collect()
        })
        .unwrap_or_default();

    PageView {
        page_index,
        range,
        section_ids,
        issue_ids,
    }
}

/// Page holding `offset`; offsets at or past the end map to the last page.
fn page_for_offset(document: &Document, offset: usize) -> usize {
    page_at(document, offset).unwrap_or_else(|_| document.page_count().saturating_sub(1))
}

/// Section holding `offset`, falling back to the last section for offsets
/// at the very end (empty trailing sections, empty documents).
fn section_starting_view(document: &Document, offset: usize) -> Option<&Section> {
    crate::document::section_at(document, offset)
        .ok()
        .or_else(|| document.sections.last())
}

/// Page numbers mentioned in free text as `page 3` or `pages 2-4`.
///
/// Numbers in text are 1-based; the result is 0-based and deduplicated in
/// order of first mention. Useful when a reply carries no structured
/// references.
pub fn mentioned_pages(text: &str) -> Vec<Reference> {
    let lower = text.to_lowercase();
    let mut pages: Vec<i64> = Vec::new();
    let mut push = |n: i64| {
        if n >= 1 && !pages.contains(&(n - 1)) {
            pages.push(n - 1);
        }
    };

    let mut rest = lower.as_str();
    while let Some(pos) = rest.find("page") {
        let after = &rest[pos + 4..];
        let after = after.strip_prefix('s').unwrap_or(after);
        let after = after.trim_start();
        let (first, tail) = take_number(after);
        if let Some(first) = first {
            let tail_trimmed = tail.trim_start();
            let range_tail = tail_trimmed
                .strip_prefix('-')
                .or_else(|| tail_trimmed.strip_prefix('–'))
                .or_else(|| tail_trimmed.strip_prefix("to "));
            match range_tail.map(|t| take_number(t.trim_start()).0) {
                Some(Some(last)) if last >= first && last - first < 1000 => {
                    (first..=last).for_each(&mut push)
                }
                _ => push(first),
            }
        }
        rest = &rest[pos + 4..];
    }
    pages.into_iter().map(Reference::Page).collect()
}

fn take_number(s: &str) -> (Option<i64>, &str) {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return (None, s);
    }
    (s[..digits].parse().ok(), &s[digits..])
}
