//! Persisted run results.
//!
//! Each run is written once as `sync_results_<YYYYmmdd_HHMMSS>_<run>.json`,
//! where `<run>` is the first eight characters of the run id. Files are
//! read back for display and audit only.

use crate::error::StoreResult;
use crate::files::{read_json, write_json_atomic};
use chrono::{DateTime, Utc};
use fleetsync_model::SyncResult;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const PREFIX: &str = "sync_results_";
const EXTENSION: &str = "json";

/// Headline numbers of one persisted run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    /// File the run was read from.
    pub path: PathBuf,
    /// Run identifier.
    pub run_id: String,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Whether writes were intercepted.
    pub dry_run: bool,
    /// Items processed.
    pub total_items: usize,
    /// Records created.
    pub created: usize,
    /// Records updated.
    pub updated: usize,
    /// Items skipped.
    pub skipped: usize,
    /// Items that failed.
    pub errors: usize,
    /// Whether the run was cancelled.
    pub cancelled: bool,
}

impl ResultSummary {
    fn new(path: PathBuf, result: &SyncResult) -> Self {
        Self {
            path,
            run_id: result.run_id.clone(),
            timestamp: result.timestamp,
            dry_run: result.dry_run,
            total_items: result.total_items,
            created: result.created,
            updated: result.updated,
            skipped: result.skipped,
            errors: result.errors,
            cancelled: result.cancelled,
        }
    }
}

/// Directory of persisted run results.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Creates a store over `dir`. The directory must exist before saving.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the result files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name used for a result.
    pub fn file_name(result: &SyncResult) -> String {
        let short: String = result.run_id.chars().take(8).collect();
        format!(
            "{PREFIX}{}_{short}.{EXTENSION}",
            result.timestamp.format("%Y%m%d_%H%M%S")
        )
    }

    /// Writes a result and returns the file written.
    pub fn save(&self, result: &SyncResult) -> StoreResult<PathBuf> {
        let path = self.dir.join(Self::file_name(result));
        write_json_atomic(&path, result)?;
        info!(path = %path.display(), run_id = %result.run_id, "saved sync result");
        Ok(path)
    }

    /// Reads one result file.
    pub fn load(&self, path: &Path) -> StoreResult<SyncResult> {
        read_json(path)
    }

    /// Finds a run by id, newest file first.
    pub fn find(&self, run_id: &str) -> StoreResult<Option<SyncResult>> {
        for path in self.paths()? {
            if let Ok(result) = self.load(&path) {
                if result.run_id == run_id {
                    return Ok(Some(result));
                }
            }
        }
        Ok(None)
    }

    /// Summaries of up to `limit` runs, newest first. Unreadable files are
    /// skipped with a warning.
    pub fn list(&self, limit: usize) -> StoreResult<Vec<ResultSummary>> {
        let mut summaries = Vec::new();
        for path in self.paths()? {
            if summaries.len() >= limit {
                break;
            }
            match self.load(&path) {
                Ok(result) => summaries.push(ResultSummary::new(path, &result)),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable result"),
            }
        }
        Ok(summaries)
    }

    /// Result file paths, newest first.
    fn paths(&self) -> StoreResult<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| is_result_file(path))
            .collect();
        // Timestamps in the name sort lexically.
        paths.sort();
        paths.reverse();
        Ok(paths)
    }
}

fn is_result_file(path: &Path) -> bool {
    let name_ok = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(PREFIX));
    name_ok && path.extension().is_some_and(|e| e == EXTENSION)
}
