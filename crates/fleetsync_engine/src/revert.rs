//! Reverting a prior run.

use crate::adapter::DestinationAdapter;
use crate::error::{EngineResult, SyncError};
use crate::executor::with_throttle_retry;
use fleetsync_model::{Endpoint, ErrorKind, RevertLog};
use serde::Serialize;
use tracing::{debug, error, info};

/// A delete that failed during revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertFailure {
    /// Record that could not be deleted.
    pub destination_id: String,
    /// Its endpoint.
    pub endpoint: Endpoint,
    /// Error category.
    pub error: ErrorKind,
    /// Error message.
    pub message: String,
}

/// Outcome of reverting one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    /// Run reverted.
    pub run_id: String,
    /// Entries found for the run.
    pub requested: usize,
    /// Records deleted.
    pub deleted: Vec<String>,
    /// Records that were already gone.
    pub already_absent: Vec<String>,
    /// Deletes that failed. Their entries stay in the log.
    pub failed: Vec<RevertFailure>,
    /// True when the deletes were intercepted.
    pub dry_run: bool,
}

impl RevertReport {
    fn new(run_id: &str, requested: usize, dry_run: bool) -> Self {
        Self {
            run_id: run_id.to_string(),
            requested,
            deleted: Vec::new(),
            already_absent: Vec::new(),
            failed: Vec::new(),
            dry_run,
        }
    }

    /// Returns true if every entry was consumed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn consumed(&self) -> Vec<String> {
        self.deleted
            .iter()
            .chain(&self.already_absent)
            .cloned()
            .collect()
    }
}

/// Deletes every record the log holds for `run_id`.
///
/// A record that no longer exists counts as reverted. Other failures are
/// reported and keep their entry for a later attempt; they never stop the
/// remaining deletes. Consumed entries are removed from `log` unless
/// `dry_run` is set, in which case `destination` is expected to intercept
/// the deletes.
///
/// An authentication failure stops the revert. Entries consumed before it
/// are still removed.
pub fn revert_run<D: DestinationAdapter>(
    destination: &D,
    log: &mut RevertLog,
    run_id: &str,
    dry_run: bool,
    max_throttle_retries: u32,
) -> EngineResult<RevertReport> {
    let entries = log.entries_for(run_id);
    let mut report = RevertReport::new(run_id, entries.len(), dry_run);
    info!(run_id, entries = entries.len(), dry_run, "revert started");

    for entry in &entries {
        let id = &entry.destination_id;
        let result = with_throttle_retry(max_throttle_retries, || {
            destination.delete(entry.endpoint, id)
        });
        match result {
            Ok(()) => report.deleted.push(id.clone()),
            Err(SyncError::NotFound { .. }) => {
                debug!(run_id, destination_id = %id, "already absent");
                report.already_absent.push(id.clone());
            }
            Err(err) if err.is_fatal() => {
                if !dry_run {
                    log.remove(run_id, &report.consumed());
                }
                return Err(err);
            }
            Err(err) => {
                error!(
                    run_id,
                    destination_id = %id,
                    endpoint = %entry.endpoint,
                    error = %err,
                    "revert delete failed"
                );
                report.failed.push(RevertFailure {
                    destination_id: id.clone(),
                    endpoint: entry.endpoint,
                    error: err.kind(),
                    message: err.to_string(),
                });
            }
        }
    }

    if !dry_run {
        log.remove(run_id, &report.consumed());
    }
    info!(
        run_id,
        deleted = report.deleted.len(),
        already_absent = report.already_absent.len(),
        failed = report.failed.len(),
        "revert finished"
    );
    Ok(report)
}
