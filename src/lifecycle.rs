//! Activation lifecycle
//!
//! Resources registered during activation are torn down in registration
//! order on shutdown. A failing disposable never blocks the ones after it;
//! failures are collected and handed back for logging.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::planning::service::SHADOW_DIR;

/// A resource that needs explicit teardown on shutdown.
pub trait Disposable {
    fn name(&self) -> &str;
    fn dispose(&mut self) -> Result<()>;
}

/// One teardown failure: which disposable, and why.
#[derive(Debug)]
pub struct DisposalFailure {
    pub name: String,
    pub error: anyhow::Error,
}

/// Owns every registered disposable.
#[derive(Default)]
pub struct Disposables {
    items: Vec<Box<dyn Disposable>>,
}

impl Disposables {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn register(&mut self, item: Box<dyn Disposable>) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Dispose everything in registration order, leaving the registry empty.
    /// Failures are captured rather than propagated, so every item gets its
    /// dispose call even when an earlier one fails.
    pub fn dispose_all(&mut self) -> Vec<DisposalFailure> {
        let mut failures = Vec::new();
        for mut item in self.items.drain(..) {
            if let Err(error) = item.dispose() {
                failures.push(DisposalFailure {
                    name: item.name().to_string(),
                    error,
                });
            }
        }
        failures
    }
}

/// Removes temp files an interrupted save may have left in the workspace
/// shadow directory.
pub struct ShadowSweeper {
    shadow_dir: PathBuf,
}

impl ShadowSweeper {
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            shadow_dir: workspace_root.join(SHADOW_DIR),
        }
    }
}

impl Disposable for ShadowSweeper {
    fn name(&self) -> &str {
        "shadow-sweeper"
    }

    fn dispose(&mut self) -> Result<()> {
        if !self.shadow_dir.exists() {
            return Ok(());
        }

        let mut removed = 0;
        for entry in fs::read_dir(&self.shadow_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("tmp") {
                if let Err(e) = fs::remove_file(&path) {
                    log::warn!("failed to remove stale temp file {}: {}", path.display(), e);
                } else {
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            log::debug!(
                "removed {} stale temp files from {}",
                removed,
                self.shadow_dir.display()
            );
        }
        Ok(())
    }
}
