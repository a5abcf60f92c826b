//! Plain-text ingestion.
//!
//! Turns an uploaded UTF-8 file into the `(title, content, pages)` triple
//! the core's [`build_document`] expects, plus upload metadata. Binary
//! formats (PDF, DOCX) are not extracted here.
//!
//! - **Title**: the file name without its extension.
//! - **Pages**: split on form feed (`\x0c`) when the text contains one;
//!   otherwise the document is a single page.
//! - **Sections**: Markdown-style headings (`# Title`) start a new section
//!   via [`heading_sectioning`]; text without headings becomes one
//!   "Document" section.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::Path;

use review_harness_core::document::{
    build_document_with_meta, SectionSpec, Sectioning, DEFAULT_SECTION_TITLE,
};
use review_harness_core::models::{Document, DocumentMeta};

/// Page separator recognized in plain text.
const FORM_FEED: char = '\x0c';

/// Output of ingestion, before sectioning.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub title: String,
    pub content: String,
    pub pages: Option<Vec<String>>,
    pub meta: DocumentMeta,
}

/// Read a text file from disk.
pub fn ingest_file(path: &Path) -> Result<Ingested> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let content = String::from_utf8(bytes)
        .with_context(|| format!("Document is not valid UTF-8: {}", path.display()))?;

    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Untitled".to_string());

    let content_type = match path.extension().and_then(|e| e.to_str()) {
        Some("md") | Some("markdown") => "text/markdown",
        _ => "text/plain",
    };

    Ok(ingest_text(&title, &content, content_type))
}

/// Ingest text already in memory.
pub fn ingest_text(title: &str, content: &str, content_type: &str) -> Ingested {
    let pages = if content.contains(FORM_FEED) {
        Some(
            content
                .split(FORM_FEED)
                .map(|p| p.to_string())
                .collect::<Vec<_>>(),
        )
    } else {
        None
    };

    Ingested {
        title: title.to_string(),
        content: content.to_string(),
        pages,
        meta: DocumentMeta {
            content_type: content_type.to_string(),
            uploaded_at: Utc::now(),
            file_size: content.len() as u64,
        },
    }
}

/// Derive section lengths from heading lines.
///
/// A heading is a line whose first non-space characters are one or more
/// `#` followed by a space. Text before the first heading becomes a
/// leading "Document" section. Lengths always sum to the content length.
pub fn heading_sectioning(content: &str) -> Sectioning {
    let mut specs: Vec<SectionSpec> = Vec::new();
    let mut current_title: Option<String> = None;
    let mut current_len: i64 = 0;

    for line in content.split_inclusive('\n') {
        let mut line_len = line.chars().count() as i64;
        if let Some(title) = heading_title(line) {
            if current_len > 0 || current_title.is_some() {
                // Page breaks in front of a heading stay with the previous
                // section so the heading starts its page.
                let breaks = line.chars().take_while(|c| *c == FORM_FEED).count() as i64;
                specs.push(SectionSpec::new(
                    current_title
                        .take()
                        .unwrap_or_else(|| DEFAULT_SECTION_TITLE.to_string()),
                    current_len + breaks,
                ));
                line_len -= breaks;
            }
            current_title = Some(title);
            current_len = 0;
        }
        current_len += line_len;
    }

    if specs.is_empty() && current_title.is_none() {
        return Sectioning::default();
    }
    specs.push(SectionSpec::new(
        current_title.unwrap_or_else(|| DEFAULT_SECTION_TITLE.to_string()),
        current_len,
    ));
    Sectioning::Lengths(specs)
}

fn heading_title(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Build a document from ingested text with heading-based sections.
pub fn into_document(ingested: Ingested) -> Result<Document> {
    let sectioning = heading_sectioning(&ingested.content);
    build_document_with_meta(
        &ingested.title,
        &ingested.content,
        sectioning,
        ingested.pages,
        ingested.meta,
    )
    .with_context(|| format!("Failed to build document '{}'", ingested.title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_no_headings_single_section() {
        assert_eq!(heading_sectioning("just text\nmore"), Sectioning::default());
    }

    #[test]
    fn test_headings_split_sections() {
        let text = "Preface line\n# Intro\nHello.\n## Body\nWorld.\n";
        let Sectioning::Lengths(specs) = heading_sectioning(text) else {
            panic!("expected lengths");
        };
        let titles: Vec<&str> = specs.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Document", "Intro", "Body"]);
        let total: i64 = specs.iter().map(|s| s.length).sum();
        assert_eq!(total, text.chars().count() as i64);
        assert_eq!(specs[0].length, "Preface line\n".len() as i64);
    }

    #[test]
    fn test_hashtag_is_not_heading() {
        assert!(heading_title("#hashtag").is_none());
        assert!(heading_title("####### seven").is_none());
        assert_eq!(heading_title("  ## Spaced  \n").as_deref(), Some("Spaced"));
    }

    #[test]
    fn test_form_feed_pages() {
        let ingested = ingest_text("t", "one\x0ctwo\x0cthree", "text/plain");
        assert_eq!(
            ingested.pages,
            Some(vec!["one".to_string(), "two".to_string(), "three".to_string()])
        );
        let doc = into_document(ingested).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages[1].offset, 4);
    }

    #[test]
    fn test_heading_after_page_break_starts_its_page() {
        let ingested = ingest_text("t", "# One\nfirst\n\x0c# Two\nsecond\n", "text/plain");
        let doc = into_document(ingested).unwrap();
        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[0].content, "# One\nfirst\n\x0c");
        assert_eq!(doc.sections[1].offset, doc.pages[1].offset);
        assert_eq!(doc.sections[1].title, "Two");
    }

    #[test]
    fn test_ingest_file_title_and_type() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("My Essay.md");
        fs::write(&path, "# Thesis\nCats are great.\n").unwrap();
        let ingested = ingest_file(&path).unwrap();
        assert_eq!(ingested.title, "My Essay");
        assert_eq!(ingested.meta.content_type, "text/markdown");
        let doc = into_document(ingested).unwrap();
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].title, "Thesis");
    }

    #[test]
    fn test_rejects_binary() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blob.bin");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(ingest_file(&path).is_err());
    }
}
