//! Analysis results and their renderings
//!
//! The issue/function data model, prompt-ready formatters, and the
//! hierarchical view used by the `tree` command.

pub mod formatter;
pub mod issue;
pub mod tree;

pub use issue::{AnalysisIssue, CodeAnalysis, RawFunction, Severity};
pub use tree::{AnalysisData, AnalysisTreeProvider, TreeNode};
