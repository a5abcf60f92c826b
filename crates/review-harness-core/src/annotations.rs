//! Issue queries over an [`Analysis`].
//!
//! All queries preserve insertion order (the order the analysis service
//! produced the issues). Callers that need positional order sort
//! explicitly with [`sorted_by_position`].

use std::collections::{HashMap, HashSet};

use crate::error::{ReviewError, Result};
use crate::models::{Analysis, Document, Issue, Severity};

/// Issues anchored to `section_id`, in insertion order.
pub fn issues_for_section<'a>(analysis: &'a Analysis, section_id: &str) -> Vec<&'a Issue> {
    analysis
        .issues
        .iter()
        .filter(|i| i.section_id == section_id)
        .collect()
}

/// Look up an issue by id. `None` means not found.
pub fn issue_by_id<'a>(analysis: &'a Analysis, id: &str) -> Option<&'a Issue> {
    analysis.issues.iter().find(|i| i.id == id)
}

/// Issues at or above `min`, in insertion order.
pub fn issues_at_least(analysis: &Analysis, min: Severity) -> Vec<&Issue> {
    analysis
        .issues
        .iter()
        .filter(|i| i.severity >= min)
        .collect()
}

/// Number of issues per section id. Sections without issues are absent.
pub fn issue_counts(analysis: &Analysis) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for issue in &analysis.issues {
        *counts.entry(issue.section_id.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Sort by `(start, end)`; ties keep insertion order.
pub fn sorted_by_position<'a>(issues: &[&'a Issue]) -> Vec<&'a Issue> {
    let mut sorted = issues.to_vec();
    sorted.sort_by_key(|i| (i.range.start(), i.range.end()));
    sorted
}

/// The most severe issue, earliest in insertion order among equals.
pub fn most_severe(analysis: &Analysis) -> Option<&Issue> {
    analysis
        .issues
        .iter()
        .reduce(|best, i| if i.severity > best.severity { i } else { best })
}

/// Check that every issue is consistent with `document`.
///
/// # Errors
///
/// - [`ReviewError::DuplicateIssue`] if two issues share an id.
/// - [`ReviewError::DanglingReference`] if an issue names a section that
///   does not exist.
/// - [`ReviewError::OutOfRange`] if an issue's range ends past its section.
pub fn verify_references(analysis: &Analysis, document: &Document) -> Result<()> {
    let mut seen = HashSet::new();
    for issue in &analysis.issues {
        if !seen.insert(issue.id.as_str()) {
            return Err(ReviewError::DuplicateIssue(issue.id.clone()));
        }
        let section = document
            .section(&issue.section_id)
            .ok_or_else(|| ReviewError::dangling("section", issue.section_id.clone()))?;
        let len = section.len();
        if issue.range.end() > len {
            return Err(ReviewError::OutOfRange {
                offset: issue.range.end(),
                len,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{build_document, SectionSpec, Sectioning};
    use crate::models::IssueKind;
    use crate::range::TextRange;

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

    fn analysis(issues: Vec<Issue>) -> Analysis {
        Analysis {
            issues,
            overall_score: 7.3,
            strengths: Vec::new(),
            suggestions: Vec::new(),
            complete: true,
        }
    }

    fn doc() -> Document {
        build_document(
            "T",
            "0123456789abcdefghij",
            Sectioning::Lengths(vec![SectionSpec::new("A", 10), SectionSpec::new("B", 10)]),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_issues_for_section_keeps_insertion_order() {
        let a = analysis(vec![
            issue("3", "sec-1", 8, 9, Severity::Minor),
            issue("1", "sec-2", 0, 2, Severity::Minor),
            issue("2", "sec-1", 1, 4, Severity::Critical),
        ]);
        let ids: Vec<&str> = issues_for_section(&a, "sec-1")
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["3", "2"]);

        let positional: Vec<&str> = sorted_by_position(&issues_for_section(&a, "sec-1"))
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(positional, vec!["2", "3"]);
    }

    #[test]
    fn test_issue_by_id() {
        let a = analysis(vec![issue("7", "sec-1", 0, 1, Severity::Minor)]);
        assert_eq!(issue_by_id(&a, "7").map(|i| i.range.end()), Some(1));
        assert!(issue_by_id(&a, "8").is_none());
    }

    #[test]
    fn test_severity_filter_and_counts() {
        let a = analysis(vec![
            issue("1", "sec-1", 0, 1, Severity::Minor),
            issue("2", "sec-1", 0, 1, Severity::Moderate),
            issue("3", "sec-2", 0, 1, Severity::Critical),
        ]);
        let ids: Vec<&str> = issues_at_least(&a, Severity::Moderate)
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
        let counts = issue_counts(&a);
        assert_eq!(counts.get("sec-1"), Some(&2));
        assert_eq!(counts.get("sec-2"), Some(&1));
        assert_eq!(most_severe(&a).map(|i| i.id.as_str()), Some("3"));
    }

    #[test]
    fn test_dangling_section_is_reported() {
        let a = analysis(vec![issue("1", "sec-9", 0, 1, Severity::Minor)]);
        assert_eq!(
            verify_references(&a, &doc()),
            Err(ReviewError::DanglingReference {
                kind: "section",
                target: "sec-9".to_string()
            })
        );
    }

    #[test]
    fn test_range_past_section_is_reported() {
        let a = analysis(vec![issue("1", "sec-2", 5, 11, Severity::Minor)]);
        assert_eq!(
            verify_references(&a, &doc()),
            Err(ReviewError::OutOfRange { offset: 11, len: 10 })
        );
    }

    #[test]
    fn test_duplicate_ids_are_reported() {
        let a = analysis(vec![
            issue("1", "sec-1", 0, 1, Severity::Minor),
            issue("1", "sec-2", 0, 1, Severity::Minor),
        ]);
        assert_eq!(
            verify_references(&a, &doc()),
            Err(ReviewError::DuplicateIssue("1".to_string()))
        );
    }

    #[test]
    fn test_point_issue_at_section_end_is_valid() {
        let a = analysis(vec![issue("1", "sec-1", 10, 10, Severity::Minor)]);
        verify_references(&a, &doc()).unwrap();
    }
}
