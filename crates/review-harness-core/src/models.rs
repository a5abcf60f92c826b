//! Core data models shared by every component.
//!
//! There is exactly one definition of each of [`Document`], [`Section`],
//! [`Issue`] and [`Analysis`]; the renderer, resolver, conversation log and
//! application session all consume these.
//!
//! Documents are immutable snapshots. Text and section tables live behind
//! `Arc`, so cloning a [`Document`] is cheap and an update is a
//! replacement, never an in-place edit visible to other readers.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::range::{char_len, TextRange};

/// A titled, ordered chunk of document text with a stable id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Character offset of `content` inside the owning document.
    pub offset: usize,
}

impl Section {
    /// Length of `content` in characters.
    pub fn len(&self) -> usize {
        char_len(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// The section's span in document-global coordinates.
    pub fn global_range(&self) -> TextRange {
        TextRange::with_len(self.offset, self.len())
    }
}

/// One display page. Pages partition the same content as sections but
/// independently of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Character offset of the page's first character inside the document.
    pub offset: usize,
    pub text: String,
}

/// Upload metadata carried alongside the text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    /// MIME type reported by ingestion (e.g. `text/plain`).
    pub content_type: String,
    pub uploaded_at: DateTime<Utc>,
    /// Size of the raw upload in bytes.
    pub file_size: u64,
}

impl Default for DocumentMeta {
    fn default() -> Self {
        Self {
            content_type: "text/plain".to_string(),
            uploaded_at: Utc::now(),
            file_size: 0,
        }
    }
}

/// An immutable document snapshot.
///
/// `analysis == None` means "not yet analyzed" or "analysis pending"; the
/// application session tracks which of the two applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: Arc<str>,
    /// SHA-256 of `content`, hex encoded.
    pub content_hash: String,
    pub meta: DocumentMeta,
    pub sections: Arc<[Section]>,
    pub pages: Arc<[Page]>,
    pub analysis: Option<Arc<Analysis>>,
}

impl Document {
    /// Length of the content in characters.
    pub fn len(&self) -> usize {
        char_len(&self.content)
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn is_analyzed(&self) -> bool {
        self.analysis.is_some()
    }
}

/// Category of an editorial finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Tone,
    Logic,
    Repetition,
    Transition,
    Argument,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Tone => "tone",
            IssueKind::Logic => "logic",
            IssueKind::Repetition => "repetition",
            IssueKind::Transition => "transition",
            IssueKind::Argument => "argument",
        };
        f.write_str(s)
    }
}

/// Issue severity. Ordered `Minor < Moderate < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Minor => "minor",
            Severity::Moderate => "moderate",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// A range-anchored finding with severity and remediation text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub suggestion: String,
    pub section_id: String,
    /// Section-local character range.
    pub range: TextRange,
}

/// Output of the external analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Issues in the order the service produced them.
    pub issues: Vec<Issue>,
    pub overall_score: f64,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default = "default_complete", alias = "processing_complete")]
    pub complete: bool,
}

fn default_complete() -> bool {
    true
}

/// Author of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A pointer from a message to a navigable document location.
///
/// Serialized as `{"kind": "page", "target": 2}`. Page targets are
/// zero-based and may be out of range; the resolver clamps them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "lowercase")]
pub enum Reference {
    Page(i64),
    Section(String),
    Issue(String),
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Page(n) => write!(f, "page:{}", n.saturating_add(1)),
            Reference::Section(id) => write!(f, "section:{}", id),
            Reference::Issue(id) => write!(f, "issue:{}", id),
        }
    }
}

/// Parses the [`Display`](fmt::Display) form: `page:N` (1-based),
/// `section:ID` or `issue:ID`.
impl FromStr for Reference {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (kind, target) = s
            .split_once(':')
            .ok_or_else(|| format!("expected kind:target, got '{}'", s))?;
        let target = target.trim();
        if target.is_empty() {
            return Err(format!("missing target in '{}'", s));
        }
        match kind.trim().to_lowercase().as_str() {
            "page" => target
                .parse::<i64>()
                .map(|n| Reference::Page(n.saturating_sub(1)))
                .map_err(|_| format!("invalid page number '{}'", target)),
            "section" => Ok(Reference::Section(target.to_string())),
            "issue" => Ok(Reference::Issue(target.to_string())),
            other => Err(format!("unknown reference kind '{}'", other)),
        }
    }
}

/// An immutable entry in the conversation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    /// Position in the log, starting at 0.
    pub seq: u64,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub references: Vec<Reference>,
    /// For assistant replies, the user message being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
}

/// Output of the external response generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}
