//! Simulated analysis service and response generator.
//!
//! Stand-ins for the external collaborators: canned findings and
//! keyword-routed replies with artificial latency. The issues they produce
//! are always valid against the document (ranges are scaled into each
//! section's real length), so they exercise the same validation path a
//! real service would.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use review_harness_core::annotations::sorted_by_position;
use review_harness_core::models::{
    Analysis, Document, Issue, IssueKind, Message, Reference, Reply, Severity,
};
use review_harness_core::range::TextRange;
use review_harness_core::services::{AnalysisService, ResponseGenerator};
use review_harness_core::Result;

use crate::config::SimulationConfig;

/// Positions of the canned findings, expressed per mille of a section.
const TEMPLATE_SCALE: usize = 1000;

struct Template {
    kind: IssueKind,
    severity: Severity,
    title: &'static str,
    description: &'static str,
    suggestion: &'static str,
    /// Which section to anchor to; falls back to the last section.
    section: usize,
    start: usize,
    end: usize,
}

const TEMPLATES: &[Template] = &[
    Template {
        kind: IssueKind::Tone,
        severity: Severity::Moderate,
        title: "Tone Inconsistency",
        description: "The tone shifts from formal to casual mid-paragraph.",
        suggestion: "Maintain consistent formal tone throughout this section.",
        section: 0,
        start: 150,
        end: 300,
    },
    Template {
        kind: IssueKind::Repetition,
        severity: Severity::Minor,
        title: "Repetitive Phrasing",
        description: "The same phrase appears multiple times.",
        suggestion: "Use varied transitional phrases like \"ultimately\" or \"to summarize\".",
        section: 1,
        start: 450,
        end: 500,
    },
    Template {
        kind: IssueKind::Logic,
        severity: Severity::Critical,
        title: "Logical Gap",
        description: "Argument jumps to conclusion without supporting evidence.",
        suggestion: "Add transitional paragraph with supporting data or examples.",
        section: 0,
        start: 800,
        end: 950,
    },
];

/// Canned analysis with configurable latency.
#[derive(Debug, Clone)]
pub struct SimulatedAnalyzer {
    delay: Duration,
}

impl SimulatedAnalyzer {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            delay: config.analysis_delay(),
        }
    }
}

#[async_trait]
impl AnalysisService for SimulatedAnalyzer {
    async fn analyze(&self, document: &Document) -> Result<Analysis> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(canned_analysis(document))
    }
}

/// The simulated findings for `document`, without latency.
pub fn canned_analysis(document: &Document) -> Analysis {
    let issues = TEMPLATES
        .iter()
        .enumerate()
        .filter_map(|(i, t)| {
            let section = document
                .sections
                .get(t.section)
                .or_else(|| document.sections.last())?;
            let len = section.len();
            let start = t.start * len / TEMPLATE_SCALE;
            let end = t.end * len / TEMPLATE_SCALE;
            Some(Issue {
                id: (i + 1).to_string(),
                kind: t.kind,
                severity: t.severity,
                title: t.title.to_string(),
                description: t.description.to_string(),
                suggestion: t.suggestion.to_string(),
                section_id: section.id.clone(),
                range: TextRange::with_len(start, end - start),
            })
        })
        .collect();

    Analysis {
        issues,
        overall_score: 7.3,
        strengths: vec![
            "Strong opening hook".to_string(),
            "Clear thesis statement".to_string(),
            "Good use of examples".to_string(),
        ],
        suggestions: vec![
            "Strengthen transitions between paragraphs".to_string(),
            "Add more supporting evidence".to_string(),
            "Vary sentence structure".to_string(),
        ],
        complete: true,
    }
}

/// Keyword-routed replies with configurable latency.
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    delay: Duration,
    jitter_ms: u64,
}

impl SimulatedResponder {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            delay: Duration::from_millis(config.response_delay_ms),
            jitter_ms: config.response_jitter_ms,
        }
    }

    fn latency(&self) -> Duration {
        if self.jitter_ms == 0 {
            return self.delay;
        }
        let nanos = chrono::Utc::now().timestamp_subsec_nanos() as u64;
        self.delay + Duration::from_millis(nanos % (self.jitter_ms + 1))
    }
}

#[async_trait]
impl ResponseGenerator for SimulatedResponder {
    async fn respond(
        &self,
        conversation: &[Message],
        document: &Document,
        text: &str,
    ) -> Result<Reply> {
        let latency = self.latency();
        debug!(latency_ms = latency.as_millis() as u64, turns = conversation.len(), "simulated reply");
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(route_reply(document, text))
    }
}

/// Pick a canned reply by keyword.
pub fn route_reply(document: &Document, text: &str) -> Reply {
    let lower = text.to_lowercase();
    let first_pages = first_pages(document, 3);

    if lower.contains("summary") || lower.contains("summarize") {
        Reply {
            text: format!(
                "Here's a summary of \"{}\".\n\nThe document has {} page(s). \
                 The opening sets up the topic, the middle develops the core \
                 argument, and the close draws it together.",
                document.title,
                document.page_count()
            ),
            references: first_pages,
        }
    } else if lower.contains("find") || lower.contains("search") {
        Reply {
            text: "I found relevant content on these pages. Use the page links \
                   to jump directly to each one."
                .to_string(),
            references: first_pages,
        }
    } else if lower.contains("contradiction") {
        Reply {
            text: "No major contradictions detected. Terminology, data references \
                   and argument flow stay consistent throughout."
                .to_string(),
            references: Vec::new(),
        }
    } else if lower.contains("issue") || lower.contains("fix") || lower.contains("problem") {
        issues_reply(document)
    } else {
        Reply {
            text: format!(
                "You asked about \"{}\". Based on \"{}\", I can point you to the \
                 relevant pages, find exact quotes, or summarize related sections.",
                text.trim(),
                document.title
            ),
            references: first_pages,
        }
    }
}

fn issues_reply(document: &Document) -> Reply {
    let Some(analysis) = document.analysis.as_deref() else {
        return Reply {
            text: "The analysis isn't ready yet. Ask again in a moment.".to_string(),
            references: Vec::new(),
        };
    };
    let mut ranked: Vec<&Issue> = sorted_by_position(&analysis.issues.iter().collect::<Vec<_>>());
    ranked.sort_by(|a, b| b.severity.cmp(&a.severity));
    ranked.truncate(3);
    if ranked.is_empty() {
        return Reply {
            text: "I didn't find anything that needs fixing.".to_string(),
            references: Vec::new(),
        };
    }
    let lines: Vec<String> = ranked
        .iter()
        .map(|i| format!("- {} ({}): {}", i.title, i.severity, i.suggestion))
        .collect();
    Reply {
        text: format!("Here's what I'd look at first:\n{}", lines.join("\n")),
        references: ranked
            .iter()
            .map(|i| Reference::Issue(i.id.clone()))
            .collect(),
    }
}

fn first_pages(document: &Document, n: usize) -> Vec<Reference> {
    (0..document.page_count().min(n))
        .map(|p| Reference::Page(p as i64))
        .collect()
}

/// Opening assistant message for a freshly opened document.
pub fn greeting(document: &Document) -> String {
    format!(
        "Hello! I'm your assistant for \"{}\". I have access to all {} page(s) \
         of your document. You can ask me to:\n\n\
         - Find specific information\n\
         - Summarize sections or themes\n\
         - Detect contradictions\n\
         - Point out issues to fix\n\n\
         What would you like to know about your document?",
        document.title,
        document.page_count()
    )
}

/// Assistant message announcing a finished analysis, referencing each issue.
pub fn analysis_summary(document: &Document) -> Option<Reply> {
    let analysis = document.analysis.as_deref()?;
    Some(Reply {
        text: format!(
            "I've analyzed your draft \"{}\" and found {} area(s) for improvement. \
             Here's what I noticed:",
            document.title,
            analysis.issues.len()
        ),
        references: analysis
            .issues
            .iter()
            .map(|i| Reference::Issue(i.id.clone()))
            .collect(),
    })
}
