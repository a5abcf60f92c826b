//! Interval-partition highlight renderer.
//!
//! Given a section's text and the issues anchored to it, produce a
//! sequence of [`Segment`]s that covers the text with no gaps or overlaps.
//! Each segment carries every issue whose range contains it, so two
//! overlapping issues share at least one segment and neither marker is
//! lost.
//!
//! # Algorithm
//!
//! 1. Collect cut points: `0`, the text length, and the start and end of
//!    every issue range (clamped to the text length).
//! 2. Emit one segment per consecutive pair of cut points. Its active set
//!    is every non-point issue whose range contains the pair, in the order
//!    the issues were given.
//! 3. Style the segment with the highest severity in its active set.
//! 4. Flag the segment as selected if the selected issue is active.
//!
//! Point issues (`start == end`) never enter an active set. They become
//! [`PointMarker`]s sitting between two segments.
//!
//! # Example
//!
//! ```rust
//! use review_harness_core::highlight::render_section;
//! use review_harness_core::models::{Issue, IssueKind, Severity};
//! use review_harness_core::range::TextRange;
//!
//! let issue = |id: &str, start, end, severity| Issue {
//!     id: id.into(),
//!     kind: IssueKind::Tone,
//!     severity,
//!     title: String::new(),
//!     description: String::new(),
//!     suggestion: String::new(),
//!     section_id: "sec-1".into(),
//!     range: TextRange::new(start, end).unwrap(),
//! };
//! let a = issue("1", 0, 12, Severity::Moderate);
//! let b = issue("2", 9, 16, Severity::Critical);
//!
//! let rendered = render_section("The cat sat. The cat ran.", &[&a, &b], None);
//! assert_eq!(rendered.segments.len(), 4);
//! assert_eq!(rendered.segments[1].issue_ids, vec!["1", "2"]);
//! assert_eq!(rendered.segments[1].style, Some(Severity::Critical));
//! ```

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::Serialize;

use crate::models::{Issue, Severity};
use crate::range::{char_len, TextRange};

/// A maximal run of characters sharing one active issue set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Section-local character range.
    pub range: TextRange,
    pub text: String,
    /// Ids of every issue covering this run, in input order.
    pub issue_ids: Vec<String>,
    /// Highest severity among the active issues.
    pub style: Option<Severity>,
    pub selected: bool,
}

impl Segment {
    pub fn is_highlighted(&self) -> bool {
        !self.issue_ids.is_empty()
    }
}

/// A zero-width issue rendered as a clickable caret.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMarker {
    /// Section-local offset the caret sits before.
    pub at: usize,
    pub issue_id: String,
    pub severity: Severity,
    pub selected: bool,
}

/// Segments and markers interleaved in document order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fragment<'a> {
    Text(&'a Segment),
    Marker(&'a PointMarker),
}

/// Rendered form of one section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedSection {
    pub segments: Vec<Segment>,
    pub markers: Vec<PointMarker>,
}

/// Partition `text` by the ranges of `issues`.
///
/// `issues` are expected to be anchored to this section (section-local
/// ranges). Ranges reaching past the text are clamped rather than
/// rejected; validation belongs to
/// [`verify_references`](crate::annotations::verify_references). A
/// non-empty range lying wholly past the text is skipped, so it never
/// turns into a point marker.
pub fn render_section(text: &str, issues: &[&Issue], selected: Option<&str>) -> RenderedSection {
    let len = char_len(text);
    let clamped: Vec<(TextRange, &Issue)> = issues
        .iter()
        .map(|issue| (issue.range.clamp_to(len), *issue))
        .filter(|(range, issue)| range.is_point() == issue.range.is_point())
        .collect();

    let mut cuts: BTreeSet<usize> = BTreeSet::new();
    cuts.insert(0);
    cuts.insert(len);
    for (range, _) in &clamped {
        cuts.insert(range.start());
        cuts.insert(range.end());
    }
    let cuts: Vec<usize> = cuts.into_iter().collect();

    // Byte offsets of each cut so slicing is a single pass over the text.
    let mut byte_cuts = Vec::with_capacity(cuts.len());
    let mut chars = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let mut position = 0usize;
    let mut current = chars.next().unwrap_or(text.len());
    for &cut in &cuts {
        while position < cut {
            current = chars.next().unwrap_or(text.len());
            position += 1;
        }
        byte_cuts.push(current);
    }

    let mut segments = Vec::with_capacity(cuts.len().saturating_sub(1).max(1));
    if cuts.len() == 1 {
        segments.push(Segment {
            range: TextRange::point(0),
            text: String::new(),
            issue_ids: Vec::new(),
            style: None,
            selected: false,
        });
    }
    for w in 0..cuts.len().saturating_sub(1) {
        let span = TextRange::with_len(cuts[w], cuts[w + 1] - cuts[w]);
        let active: Vec<&Issue> = clamped
            .iter()
            .filter(|(range, _)| !range.is_point() && range.contains_range(&span))
            .map(|(_, issue)| *issue)
            .collect();
        segments.push(Segment {
            range: span,
            text: text[byte_cuts[w]..byte_cuts[w + 1]].to_string(),
            issue_ids: active.iter().map(|i| i.id.clone()).collect(),
            style: active.iter().map(|i| i.severity).max(),
            selected: selected.is_some_and(|id| active.iter().any(|i| i.id == id)),
        });
    }

    let mut markers: Vec<PointMarker> = clamped
        .iter()
        .filter(|(range, _)| range.is_point())
        .map(|(range, issue)| PointMarker {
            at: range.start(),
            issue_id: issue.id.clone(),
            severity: issue.severity,
            selected: selected == Some(issue.id.as_str()),
        })
        .collect();
    markers.sort_by_key(|m| m.at);

    RenderedSection { segments, markers }
}

impl RenderedSection {
    /// Concatenated segment text. Equals the input text.
    pub fn plain_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Segments and markers in document order. A marker at offset `n`
    /// comes before the segment starting at `n`.
    pub fn fragments(&self) -> Vec<Fragment<'_>> {
        let mut out = Vec::with_capacity(self.segments.len() + self.markers.len());
        let mut markers = self.markers.iter().peekable();
        for segment in &self.segments {
            while let Some(marker) = markers.next_if(|m| m.at <= segment.range.start()) {
                out.push(Fragment::Marker(marker));
            }
            out.push(Fragment::Text(segment));
        }
        out.extend(markers.map(Fragment::Marker));
        out
    }

    /// Ids of every issue that received a span or marker.
    pub fn issue_ids(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .flat_map(|s| s.issue_ids.iter().map(String::as_str))
            .chain(self.markers.iter().map(|m| m.issue_id.as_str()))
            .collect()
    }

    /// HTML markup with escaped text.
    ///
    /// Highlighted runs become
    /// `<span class="issue-highlight severity-critical" data-issue-ids="1 2">`;
    /// point issues become `<span class="issue-point" data-issue-ids="3">`
    /// carets. A selected run or caret also gets the `selected` class.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for fragment in self.fragments() {
            match fragment {
                Fragment::Text(segment) => match segment.style {
                    None => html.push_str(&escape_html(&segment.text)),
                    Some(severity) => {
                        let _ = write!(
                            html,
                            r#"<span class="issue-highlight severity-{}{}" data-issue-ids="{}">{}</span>"#,
                            severity,
                            if segment.selected { " selected" } else { "" },
                            escape_html(&segment.issue_ids.join(" ")),
                            escape_html(&segment.text)
                        );
                    }
                },
                Fragment::Marker(marker) => {
                    let _ = write!(
                        html,
                        r#"<span class="issue-point severity-{}{}" data-issue-ids="{}">&#8248;</span>"#,
                        marker.severity,
                        if marker.selected { " selected" } else { "" },
                        escape_html(&marker.issue_id)
                    );
                }
            }
        }
        html
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
