//! JSON files: source exports and destination snapshots.

use crate::error::{StoreError, StoreResult};
use fleetsync_engine::{EngineResult, SourceAdapter};
use fleetsync_model::{DestinationRecord, SourceRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Registry exports come either as a bare array or wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "devices", alias = "endpoints", alias = "assets")]
        records: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_records(self) -> Vec<T> {
        match self {
            Listing::Bare(records) | Listing::Wrapped { records } => records,
        }
    }
}

/// Reads a JSON listing from `path`.
pub(crate) fn read_listing<T: DeserializeOwned>(path: &Path) -> StoreResult<Vec<T>> {
    let data = fs::read(path)?;
    let listing: Listing<T> =
        serde_json::from_slice(&data).map_err(|e| StoreError::json(path, e))?;
    Ok(listing.into_records())
}

/// Reads a JSON document from `path`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let data = fs::read(path)?;
    serde_json::from_slice(&data).map_err(|e| StoreError::json(path, e))
}

/// Writes `value` as pretty JSON, atomically.
///
/// The document goes to `<path>.tmp` first, is synced, then renamed over
/// `path`.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;
    let mut temp = path.as_os_str().to_owned();
    temp.push(".tmp");
    let temp = PathBuf::from(temp);

    let mut file = File::create(&temp)?;
    file.write_all(&data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, path)?;
    sync_parent(path)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> StoreResult<()> {
    Ok(())
}

/// Source adapter over a registry export on disk.
///
/// The file holds an array of device records, or an object carrying that
/// array under `records`, `devices`, `endpoints` or `assets`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    /// Creates a source reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path read by this source.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads all records.
    pub fn load(&self) -> StoreResult<Vec<SourceRecord>> {
        let records: Vec<SourceRecord> = read_listing(&self.path)?;
        debug!(path = %self.path.display(), records = records.len(), "read source file");
        Ok(records)
    }
}

impl SourceAdapter for JsonFileSource {
    fn fetch(&self) -> EngineResult<Vec<SourceRecord>> {
        Ok(self.load()?)
    }
}

/// Reads a destination snapshot file.
pub fn load_snapshot(path: &Path) -> StoreResult<Vec<DestinationRecord>> {
    let records: Vec<DestinationRecord> = read_listing(path)?;
    debug!(path = %path.display(), records = records.len(), "read snapshot file");
    Ok(records)
}

/// Writes a destination snapshot file.
pub fn save_snapshot(path: &Path, records: &[DestinationRecord]) -> StoreResult<()> {
    write_json_atomic(path, records)
}
