//! Analysis data model
//!
//! Issue records produced by the workspace scan and the raw function
//! inventory consumed by the planning service.

use serde::{Deserialize, Serialize};

/// Finding severity. Display order is error, then warning, then info.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    /// Sort rank: lower sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Error => 0,
            Severity::Warning => 1,
            Severity::Info => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single finding from the workspace scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisIssue {
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub file: String,
    pub line: u32,
    pub suggestion: String,
}

/// Raw function record as produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFunction {
    pub name: String,
    pub file: String,
    pub start_line: u32,
    pub end_line: u32,
    pub lines: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
}

/// Analyzer output handed to the planning service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub functions: Option<Vec<RawFunction>>,
}
