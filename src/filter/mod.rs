//! Workspace file filtering
//!
//! Glob-based exclusion of files from analysis runs.

pub mod exclude;

pub use exclude::{FileFilter, should_exclude_file};
