//! Workspace traversal and heuristic static analysis.

pub mod scanner;

pub use scanner::{ScanReport, WorkspaceScanner};
