//! Prompt-ready renderings of analysis issues
//!
//! Three text variants for different LLM consumers: a compact one for inline
//! assistants, a verbose one for chat assistants, and a generic markdown
//! report. All three are total over any issue list, including the empty one.

use crate::analysis::issue::AnalysisIssue;

/// Compact markdown for inline assistants.
///
/// Issues are re-sorted by severity (errors first, then warnings, then info;
/// ties keep input order) and rendered one bullet per issue.
pub fn format_for_cursor(issues: &[AnalysisIssue]) -> String {
    let mut output = String::from("## Analysis Issues\n");

    let mut sorted: Vec<&AnalysisIssue> = issues.iter().collect();
    sorted.sort_by_key(|issue| issue.severity.rank());

    if !sorted.is_empty() {
        output.push('\n');
    }
    for issue in sorted {
        output.push_str(&format!(
            "- **{}**: {} (`{}:{}`)\n",
            issue.severity, issue.description, issue.file, issue.line
        ));
    }
    output
}

/// Verbose markdown for chat assistants.
///
/// One sub-section per issue with explicit Context / Issue / Suggestion
/// parts. Input order is preserved; for any non-empty input the result is
/// longer than the compact rendering of the same issues.
pub fn format_for_chatgpt(issues: &[AnalysisIssue]) -> String {
    let mut output = String::from("## Code Review Request\n");

    if !issues.is_empty() {
        output.push_str(
            "\nStatic analysis of this workspace produced the findings below. \
             For each one, explain the root cause and propose a concrete fix.\n",
        );
    }
    for (index, issue) in issues.iter().enumerate() {
        output.push_str(&format!(
            "\n### Finding {}: {} ({})\n",
            index + 1,
            issue.category,
            issue.severity
        ));
        output.push_str(&format!(
            "\n**Context:** `{}`, line {}. Category: {}. Severity: {}.\n",
            issue.file, issue.line, issue.category, issue.severity
        ));
        output.push_str(&format!("\n**Issue:** {}\n", issue.description));
        output.push_str(&format!("\n**Suggestion:** {}\n", issue.suggestion));
    }
    output
}

/// Plain markdown report listing every field of every issue.
///
/// Input order is preserved; issues are separated by a blank line.
pub fn format_generic(issues: &[AnalysisIssue]) -> String {
    let mut output = String::from("## Analysis Report\n");

    for issue in issues {
        output.push('\n');
        output.push_str(&format!("**Severity:** {}\n", issue.severity));
        output.push_str(&format!("**Category:** {}\n", issue.category));
        output.push_str(&format!("**File:** {}\n", issue.file));
        output.push_str(&format!("**Line:** {}\n", issue.line));
        output.push_str(&format!("**Description:** {}\n", issue.description));
        output.push_str(&format!("**Suggestion:** {}\n", issue.suggestion));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::issue::Severity;

    fn issue(severity: Severity, description: &str) -> AnalysisIssue {
        AnalysisIssue {
            severity,
            category: "general".to_string(),
            description: description.to_string(),
            file: "src/app.ts".to_string(),
            line: 10,
            suggestion: "Fix it.".to_string(),
        }
    }

    #[test]
    fn test_cursor_orders_errors_before_warnings() {
        let issues = vec![
            issue(Severity::Warning, "late warning"),
            issue(Severity::Error, "early error"),
        ];
        let output = format_for_cursor(&issues);
        let error_at = output.find("early error").unwrap();
        let warning_at = output.find("late warning").unwrap();
        assert!(error_at < warning_at);
    }

    #[test]
    fn test_cursor_contains_every_description() {
        let issues = vec![
            issue(Severity::Info, "first"),
            issue(Severity::Error, "second"),
            issue(Severity::Warning, "third"),
        ];
        let output = format_for_cursor(&issues);
        for text in ["first", "second", "third"] {
            assert!(output.contains(text), "missing '{}' in: {}", text, output);
        }
    }

    #[test]
    fn test_cursor_sort_is_stable_within_severity() {
        let issues = vec![
            issue(Severity::Error, "alpha"),
            issue(Severity::Error, "beta"),
        ];
        let output = format_for_cursor(&issues);
        assert!(output.find("alpha").unwrap() < output.find("beta").unwrap());
    }

    #[test]
    fn test_cursor_includes_file_and_line() {
        let output = format_for_cursor(&[issue(Severity::Error, "oops")]);
        assert!(output.contains("src/app.ts:10"));
    }

    #[test]
    fn test_chatgpt_has_context_issue_suggestion_sections() {
        let output = format_for_chatgpt(&[issue(Severity::Warning, "something off")]);
        assert!(output.contains("## Code Review Request"));
        assert!(output.contains("### Finding 1"));
        assert!(output.contains("**Context:**"));
        assert!(output.contains("**Issue:** something off"));
        assert!(output.contains("**Suggestion:** Fix it."));
    }

    #[test]
    fn test_chatgpt_preserves_input_order() {
        let issues = vec![
            issue(Severity::Warning, "comes first"),
            issue(Severity::Error, "comes second"),
        ];
        let output = format_for_chatgpt(&issues);
        assert!(output.find("comes first").unwrap() < output.find("comes second").unwrap());
    }

    #[test]
    fn test_chatgpt_longer_than_cursor_for_any_nonempty_input() {
        let minimal = AnalysisIssue {
            severity: Severity::Info,
            category: String::new(),
            description: String::new(),
            file: String::new(),
            line: 0,
            suggestion: String::new(),
        };
        let inputs = vec![
            vec![minimal],
            vec![issue(Severity::Error, "a")],
            vec![
                issue(Severity::Error, "one"),
                issue(Severity::Warning, "two"),
                issue(Severity::Info, "three"),
            ],
        ];
        for issues in inputs {
            let verbose = format_for_chatgpt(&issues);
            let compact = format_for_cursor(&issues);
            assert!(
                verbose.len() > compact.len(),
                "expected verbose ({}) > compact ({})",
                verbose.len(),
                compact.len()
            );
        }
    }

    #[test]
    fn test_generic_lists_every_field() {
        let output = format_generic(&[issue(Severity::Error, "broken thing")]);
        assert!(output.contains("**Severity:** error"));
        assert!(output.contains("**Category:** general"));
        assert!(output.contains("**File:** src/app.ts"));
        assert!(output.contains("**Line:** 10"));
        assert!(output.contains("**Description:** broken thing"));
        assert!(output.contains("**Suggestion:** Fix it."));
    }

    #[test]
    fn test_generic_separates_issues_with_blank_line() {
        let issues = vec![
            issue(Severity::Error, "first"),
            issue(Severity::Warning, "second"),
        ];
        let output = format_generic(&issues);
        assert!(output.contains("Fix it.\n\n**Severity:** warning"));
    }

    #[test]
    fn test_empty_input_yields_header_only() {
        assert_eq!(format_for_cursor(&[]), "## Analysis Issues\n");
        assert_eq!(format_for_chatgpt(&[]), "## Code Review Request\n");
        assert_eq!(format_generic(&[]), "## Analysis Report\n");
    }
}
