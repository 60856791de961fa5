//! Workspace scanning
//!
//! Walks a source tree, extracts a function inventory with regex heuristics,
//! and raises findings for things worth a reviewer's attention. This is a
//! line-oriented approximation, not a parser; spans and parameter lists are
//! best-effort and complexity is a branch-keyword count.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::analysis::issue::{AnalysisIssue, CodeAnalysis, RawFunction, Severity};
use crate::filter::FileFilter;
use crate::planning::service::PlanningContext;

/// Directories never worth descending into, before user excludes apply.
const SKIP_DIRS: [&str; 8] = [
    ".git",
    ".shadow",
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    "__pycache__",
];

/// Functions longer than this raise a complexity warning.
const LONG_FUNCTION_LINES: u32 = 60;

/// Everything one scan produced.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub root: PathBuf,
    pub scanned_at: DateTime<Utc>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub languages: Vec<String>,
    pub analysis: CodeAnalysis,
    pub issues: Vec<AnalysisIssue>,
}

impl ScanReport {
    /// Workspace facts for the planning prompt.
    pub fn planning_context(&self) -> PlanningContext {
        let workspace_name = self
            .root
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("workspace")
            .to_string();
        PlanningContext {
            workspace_name,
            root: self.root.clone(),
            file_count: self.files_scanned,
            languages: self.languages.clone(),
        }
    }
}

/// Scans a workspace for functions and review findings.
pub struct WorkspaceScanner {
    filter: FileFilter,
    /// Function-start patterns; group 1 is the name, group 2 the raw
    /// parameter list when the form has one.
    function_patterns: Vec<Regex>,
    branch_pattern: Option<Regex>,
    debug_pattern: Option<Regex>,
    marker_pattern: Option<Regex>,
}

impl WorkspaceScanner {
    pub fn new(filter: FileFilter) -> Self {
        let patterns = [
            // Rust
            r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)\s*\(([^)]*)",
            // JavaScript/TypeScript declarations
            r"^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)\s*\(([^)]*)",
            // Class methods with an access modifier
            r"^\s*(?:public|private|protected)\s+(?:static\s+)?(?:async\s+)?(\w+)\s*\(([^)]*)",
            // Arrow functions bound to a binding
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\(([^)]*)\)\s*(?::[^=]*)?=>",
            r"^\s*(?:export\s+)?(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?(\w+)\s*=>",
            // Python and Ruby
            r"^\s*(?:async\s+)?def\s+(\w+)\s*(?:\(([^)]*))?",
            // Go, with or without a receiver
            r"^\s*func\s+(?:\([^)]*\)\s+)?(\w+)\s*\(([^)]*)",
        ];
        let function_patterns = patterns
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect();

        Self {
            filter,
            function_patterns,
            branch_pattern: Regex::new(
                r"\b(?:if|elif|for|while|match|switch|case|when|catch|except|loop)\b",
            )
            .ok(),
            debug_pattern: Regex::new(
                r"(?:console\.(?:log|debug|trace)|dbg!|System\.out\.println)\s*\(",
            )
            .ok(),
            marker_pattern: Regex::new(r"(?://|#|/\*|\*)\s*(?i)(TODO|FIXME|HACK)\b[:\s]*(.*)").ok(),
        }
    }

    /// Walk `root` and build the report. Unreadable files and walk errors are
    /// skipped, not fatal.
    pub fn scan(&self, root: &Path) -> Result<ScanReport> {
        if !root.is_dir() {
            return Err(anyhow!("Workspace {} is not a directory", root.display()));
        }

        let mut functions = Vec::new();
        let mut issues = Vec::new();
        let mut languages: BTreeSet<&'static str> = BTreeSet::new();
        let mut files_scanned = 0;
        let mut files_skipped = 0;

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            // Depth 0 is the root itself; it must survive even when its own
            // name would be skipped (tempdirs are dot-prefixed).
            .filter_entry(|e| e.depth() == 0 || !self.should_skip(e))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let ext = match path.extension().and_then(|e| e.to_str()) {
                Some(ext) => ext.to_lowercase(),
                None => continue,
            };
            let language = match language_name(&ext) {
                Some(language) => language,
                None => continue,
            };

            let relative = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();
            if self.filter.is_excluded(&relative) {
                files_skipped += 1;
                continue;
            }

            let content = match fs::read_to_string(path) {
                Ok(content) => content,
                Err(_) => {
                    files_skipped += 1;
                    continue;
                }
            };

            files_scanned += 1;
            languages.insert(language);
            self.scan_content(&relative, &content, &ext, &mut functions, &mut issues);
        }

        log::info!(
            "scanned {} files ({} skipped): {} functions, {} issues",
            files_scanned,
            files_skipped,
            functions.len(),
            issues.len()
        );

        Ok(ScanReport {
            root: root.to_path_buf(),
            scanned_at: Utc::now(),
            files_scanned,
            files_skipped,
            languages: languages.into_iter().map(String::from).collect(),
            analysis: CodeAnalysis {
                functions: Some(functions),
            },
            issues,
        })
    }

    fn scan_content(
        &self,
        file: &str,
        content: &str,
        ext: &str,
        functions: &mut Vec<RawFunction>,
        issues: &mut Vec<AnalysisIssue>,
    ) {
        let lines: Vec<&str> = content.lines().collect();
        let indent_based = matches!(ext, "py" | "rb");

        let mut i = 0;
        while i < lines.len() {
            let Some((name, raw_params)) = self.match_function_start(lines[i]) else {
                i += 1;
                continue;
            };

            let end = if indent_based {
                find_indent_end(&lines, i)
            } else {
                find_brace_end(&lines, i)
            };
            let span = (end - i + 1) as u32;

            if span > LONG_FUNCTION_LINES {
                issues.push(AnalysisIssue {
                    severity: Severity::Warning,
                    category: "complexity".to_string(),
                    description: format!("Function `{}` spans {} lines", name, span),
                    file: file.to_string(),
                    line: (i + 1) as u32,
                    suggestion: "Split it into smaller functions with one responsibility each."
                        .to_string(),
                });
            }

            functions.push(RawFunction {
                name,
                file: file.to_string(),
                start_line: (i + 1) as u32,
                end_line: (end + 1) as u32,
                lines: span,
                complexity: Some(self.complexity_label(&lines[i..=end]).to_string()),
                parameters: Some(parse_parameters(&raw_params)),
                return_type: extract_return_type(lines[i]),
            });
            i = end + 1;
        }

        for (index, line) in lines.iter().enumerate() {
            let line_number = (index + 1) as u32;

            // One finding per conflict; the ======= and >>>>>>> lines belong
            // to the same conflict.
            if line.starts_with("<<<<<<<") {
                issues.push(AnalysisIssue {
                    severity: Severity::Error,
                    category: "correctness".to_string(),
                    description: "Unresolved merge conflict marker".to_string(),
                    file: file.to_string(),
                    line: line_number,
                    suggestion: "Resolve the conflict and remove the marker lines.".to_string(),
                });
            }

            if let Some(found) = self.debug_pattern.as_ref().and_then(|p| p.find(line)) {
                let call = found.as_str().trim_end_matches('(').trim_end();
                issues.push(AnalysisIssue {
                    severity: Severity::Warning,
                    category: "code-hygiene".to_string(),
                    description: format!("Leftover debug print `{}`", call),
                    file: file.to_string(),
                    line: line_number,
                    suggestion: "Remove it or route it through the project logger.".to_string(),
                });
            }

            if let Some(caps) = self.marker_pattern.as_ref().and_then(|p| p.captures(line)) {
                let kind = caps
                    .get(1)
                    .map(|m| m.as_str().to_uppercase())
                    .unwrap_or_else(|| "TODO".to_string());
                let text = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                let description = if text.is_empty() {
                    format!("{} comment", kind)
                } else {
                    format!("{} comment: {}", kind, text)
                };
                issues.push(AnalysisIssue {
                    severity: Severity::Info,
                    category: "maintainability".to_string(),
                    description,
                    file: file.to_string(),
                    line: line_number,
                    suggestion: "Resolve it or track it in the issue tracker.".to_string(),
                });
            }
        }
    }

    fn match_function_start(&self, line: &str) -> Option<(String, String)> {
        for pattern in &self.function_patterns {
            if let Some(caps) = pattern.captures(line) {
                if let Some(name) = caps.get(1) {
                    let params = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                    return Some((name.as_str().to_string(), params.to_string()));
                }
            }
        }
        None
    }

    fn complexity_label(&self, body: &[&str]) -> &'static str {
        let Some(pattern) = &self.branch_pattern else {
            return "unknown";
        };

        let mut branches = 0;
        for line in body {
            branches += pattern.find_iter(line).count();
            branches += line.matches("&&").count();
            branches += line.matches("||").count();
        }
        match branches {
            0..=3 => "low",
            4..=8 => "moderate",
            _ => "high",
        }
    }

    fn should_skip(&self, entry: &walkdir::DirEntry) -> bool {
        entry
            .file_name()
            .to_str()
            .map(|name| SKIP_DIRS.contains(&name) || name.starts_with('.'))
            .unwrap_or(false)
    }
}

/// Span end for brace-delimited bodies: the line where the opening depth
/// returns to zero. Single-line declarations and expression-bodied arrows
/// end where they start.
fn find_brace_end(lines: &[&str], start: usize) -> usize {
    let mut depth = 0i32;
    let mut seen_open = false;

    for (offset, line) in lines[start..].iter().enumerate() {
        for ch in line.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    seen_open = true;
                }
                '}' => {
                    depth -= 1;
                    if seen_open && depth <= 0 {
                        return start + offset;
                    }
                }
                _ => {}
            }
        }
        if offset == 0 && !seen_open && (line.contains("=>") || line.trim_end().ends_with(';')) {
            return start;
        }
    }
    lines.len() - 1
}

/// Span end for indentation-delimited bodies: the last non-blank line
/// indented past the definition.
fn find_indent_end(lines: &[&str], start: usize) -> usize {
    let base_indent = indent_of(lines[start]);
    let mut end = start;

    for (offset, line) in lines[start + 1..].iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line) <= base_indent {
            return end;
        }
        end = start + 1 + offset;
    }
    end
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Parameter names from a raw parameter list, with type annotations,
/// defaults and receiver arguments stripped.
fn parse_parameters(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|p| {
            let p = p.trim();
            let p = p.split(':').next().unwrap_or(p).trim();
            let p = p.split('=').next().unwrap_or(p).trim();
            let p = p.trim_start_matches('&').trim_start_matches("mut ").trim();
            if p.is_empty() || p == "self" || p == "cls" {
                None
            } else {
                Some(p.to_string())
            }
        })
        .collect()
}

/// Declared return type when the signature line spells one out, either
/// arrow style (`-> T`) or annotation style (`): T`).
fn extract_return_type(line: &str) -> Option<String> {
    let tail = if let Some(idx) = line.find("->") {
        &line[idx + 2..]
    } else if let Some(idx) = line.find("):") {
        &line[idx + 2..]
    } else {
        return None;
    };

    let tail = tail
        .trim()
        .trim_end_matches('{')
        .trim()
        .trim_end_matches(':')
        .trim();
    if tail.is_empty() {
        None
    } else {
        Some(tail.to_string())
    }
}

fn language_name(ext: &str) -> Option<&'static str> {
    let name = match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "py" => "python",
        "rb" => "ruby",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "cs" => "csharp",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "php" => "php",
        "swift" => "swift",
        "scala" => "scala",
        "lua" => "lua",
        "ex" | "exs" => "elixir",
        "vue" => "vue",
        "svelte" => "svelte",
        _ => return None,
    };
    Some(name)
}
