//! Whole-document rendering and export.
//!
//! Renders every section of a document through the highlight renderer and
//! serializes the result in one of three formats:
//!
//! | Format | Function | Use |
//! |--------|----------|-----|
//! | `json` | [`render_document_json`] | machine consumers, UI front ends |
//! | `text` | [`render_document_text`] | terminals and diffs |
//! | `html` | [`render_document_html`] | static preview |
//!
//! The annotated text format wraps each highlighted run as
//! `[[text]]{1,2}` (issue ids, `*` marking the selected one) and places a
//! point issue as `^id` before the character it sits in front of.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

use review_harness_core::annotations::issues_for_section;
use review_harness_core::highlight::{escape_html, render_section, Fragment, RenderedSection};
use review_harness_core::models::{Analysis, Document, Issue};

/// One section with its rendering.
#[derive(Debug, Serialize)]
pub struct ExportSection<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub offset: usize,
    #[serde(flatten)]
    pub rendered: RenderedSection,
}

#[derive(Debug, Serialize)]
struct ExportData<'a> {
    id: &'a str,
    title: &'a str,
    content_hash: &'a str,
    page_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<&'a Analysis>,
    sections: Vec<ExportSection<'a>>,
}

/// Render every section of `document` in order.
pub fn render_document<'a>(document: &'a Document, selected: Option<&str>) -> Vec<ExportSection<'a>> {
    document
        .sections
        .iter()
        .map(|section| {
            let issues: Vec<&Issue> = match document.analysis.as_deref() {
                Some(analysis) => issues_for_section(analysis, &section.id),
                None => Vec::new(),
            };
            ExportSection {
                id: &section.id,
                title: &section.title,
                offset: section.offset,
                rendered: render_section(&section.content, &issues, selected),
            }
        })
        .collect()
}

pub fn render_document_json(document: &Document, selected: Option<&str>) -> Result<String> {
    let data = ExportData {
        id: &document.id,
        title: &document.title,
        content_hash: &document.content_hash,
        page_count: document.page_count(),
        analysis: document.analysis.as_deref(),
        sections: render_document(document, selected),
    };
    Ok(serde_json::to_string_pretty(&data)?)
}

pub fn render_document_text(document: &Document, selected: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {}", document.title);
    if let Some(analysis) = document.analysis.as_deref() {
        let _ = writeln!(
            out,
            "Score: {:.1}  Issues: {}",
            analysis.overall_score,
            analysis.issues.len()
        );
    }

    for section in render_document(document, selected) {
        let _ = writeln!(out, "\n## {} [{}]", section.title, section.id);
        for fragment in section.rendered.fragments() {
            match fragment {
                Fragment::Text(segment) if segment.is_highlighted() => {
                    let ids: Vec<String> = segment
                        .issue_ids
                        .iter()
                        .map(|id| match selected {
                            Some(s) if s == id => format!("*{}", id),
                            _ => id.clone(),
                        })
                        .collect();
                    let _ = write!(out, "[[{}]]{{{}}}", segment.text, ids.join(","));
                }
                Fragment::Text(segment) => out.push_str(&segment.text),
                Fragment::Marker(marker) => {
                    let _ = write!(out, "^{}", marker.issue_id);
                }
            }
        }
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

pub fn render_document_html(document: &Document, selected: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<article data-document-id=\"{}\">", escape_html(&document.id));
    let _ = writeln!(out, "<h1>{}</h1>", escape_html(&document.title));
    for section in render_document(document, selected) {
        let _ = writeln!(
            out,
            "<section id=\"{}\" data-offset=\"{}\">\n<h2>{}</h2>\n<div class=\"section-text\">{}</div>\n</section>",
            escape_html(section.id),
            section.offset,
            escape_html(section.title),
            section.rendered.to_html()
        );
    }
    out.push_str("</article>\n");
    out
}

/// Render in the named format (`text`, `html` or `json`).
pub fn render_as(document: &Document, format: &str, selected: Option<&str>) -> Result<String> {
    match format {
        "text" => Ok(render_document_text(document, selected)),
        "html" => Ok(render_document_html(document, selected)),
        "json" => render_document_json(document, selected),
        other => bail!("Unknown format: '{}'. Must be text, html, or json.", other),
    }
}

/// Write to `output`, or to stdout when it is `None`.
pub fn write_output(rendered: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, rendered)?;
            eprintln!("Wrote {} bytes to {}", rendered.len(), path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_harness_core::document::{attach_analysis, build_document, SectionSpec, Sectioning};
    use review_harness_core::models::{IssueKind, Severity};
    use review_harness_core::range::TextRange;

    fn issue(id: &str, section: &str, start: usize, end: usize, severity: Severity) -> Issue {
        Issue {
            id: id.to_string(),
            kind: IssueKind::Logic,
            severity,
            title: format!("Issue {}", id),
            description: String::new(),
            suggestion: String::new(),
            section_id: section.to_string(),
            range: TextRange::new(start, end).unwrap(),
        }
    }

    fn analyzed() -> Document {
        let content = "The cat sat. The cat ran.Second part.";
        let doc = build_document(
            "Cats",
            content,
            Sectioning::Lengths(vec![SectionSpec::new("One", 25), SectionSpec::new("Two", 12)]),
            None,
        )
        .unwrap();
        let analysis = Analysis {
            issues: vec![
                issue("1", "sec-1", 0, 12, Severity::Moderate),
                issue("2", "sec-1", 9, 16, Severity::Critical),
                issue("3", "sec-2", 6, 6, Severity::Minor),
            ],
            overall_score: 6.0,
            strengths: Vec::new(),
            suggestions: Vec::new(),
            complete: true,
        };
        attach_analysis(&doc, analysis).unwrap()
    }

    #[test]
    fn test_annotated_text() {
        let text = render_document_text(&analyzed(), Some("2"));
        assert!(text.starts_with("# Cats\nScore: 6.0  Issues: 3\n"));
        assert!(text.contains(
            "[[The cat s]]{1}[[at.]]{1,*2}[[ The]]{*2} cat ran.\n"
        ));
        assert!(text.contains("Second^3 part."));
    }

    #[test]
    fn test_unanalyzed_text_is_plain() {
        let doc = build_document("Plain", "no issues here", Sectioning::default(), None).unwrap();
        let text = render_document_text(&doc, None);
        assert_eq!(text, "# Plain\n\n## Document [sec-1]\nno issues here\n");
    }

    #[test]
    fn test_json_has_sections_and_segments() {
        let json = render_document_json(&analyzed(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Cats");
        let sections = value["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0]["segments"].as_array().unwrap().len(), 4);
        assert_eq!(sections[1]["markers"][0]["issue_id"], "3");
        assert_eq!(value["analysis"]["issues"][0]["type"], "logic");
    }

    #[test]
    fn test_html_escapes_title() {
        let doc = build_document("<b>Bold</b>", "x", Sectioning::default(), None).unwrap();
        let html = render_document_html(&doc, None);
        assert!(html.contains("<h1>&lt;b&gt;Bold&lt;/b&gt;</h1>"));
    }

    #[test]
    fn test_render_as_rejects_unknown_format() {
        assert!(render_as(&analyzed(), "pdf", None).is_err());
        assert!(render_as(&analyzed(), "html", None).unwrap().contains("issue-highlight"));
    }
}
