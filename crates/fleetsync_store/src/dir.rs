//! Data directory management.
//!
//! Layout of the local store:
//!
//! ```text
//! <data_dir>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ revert_log.json   # Records created by live runs, not yet reverted
//! └─ results/          # One JSON file per run
//! ```
//!
//! The LOCK file ensures only one process syncs or reverts out of a data
//! directory at a time. It is held for the lifetime of [`DataDir`].

use crate::error::{StoreError, StoreResult};
use crate::files::{read_json, write_json_atomic};
use crate::results::ResultStore;
use fleetsync_model::RevertLog;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// File names within the data directory.
const LOCK_FILE: &str = "LOCK";
const REVERT_LOG_FILE: &str = "revert_log.json";
const RESULTS_DIR: &str = "results";

/// An opened data directory.
///
/// # Thread Safety
///
/// The `DataDir` holds an exclusive lock on the directory. Only one
/// `DataDir` instance can exist per directory at a time.
#[derive(Debug)]
pub struct DataDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl DataDir {
    /// Opens a data directory, creating it and its `results/` directory if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists and is not a directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> StoreResult<Self> {
        if path.exists() && !path.is_dir() {
            return Err(StoreError::NotADirectory(path.to_path_buf()));
        }
        fs::create_dir_all(path.join(RESULTS_DIR))?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        // Non-blocking: a second sync against the same directory fails fast.
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.to_path_buf()));
        }

        debug!(path = %path.display(), "opened data directory");
        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the data directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the revert log.
    #[must_use]
    pub fn revert_log_path(&self) -> PathBuf {
        self.path.join(REVERT_LOG_FILE)
    }

    /// Returns the path to the results directory.
    #[must_use]
    pub fn results_dir(&self) -> PathBuf {
        self.path.join(RESULTS_DIR)
    }

    /// Returns the run result store.
    #[must_use]
    pub fn results(&self) -> ResultStore {
        ResultStore::new(self.results_dir())
    }

    /// Loads the revert log. A missing or empty file is an empty log.
    pub fn load_revert_log(&self) -> StoreResult<RevertLog> {
        let path = self.revert_log_path();
        if !path.exists() || fs::metadata(&path)?.len() == 0 {
            return Ok(RevertLog::new());
        }
        read_json(&path)
    }

    /// Saves the revert log atomically.
    pub fn save_revert_log(&self, log: &RevertLog) -> StoreResult<()> {
        write_json_atomic(&self.revert_log_path(), log)?;
        debug!(entries = log.len(), "saved revert log");
        Ok(())
    }

    /// The most recent run that still has entries in the revert log.
    pub fn latest_unreverted_run(&self) -> StoreResult<Option<String>> {
        Ok(self.load_revert_log()?.latest_run().map(str::to_string))
    }
}
