//! # Fleetsync Store
//!
//! Local persistence for fleetsync.
//!
//! This crate provides:
//! - A locked data directory holding the revert log and run results
//! - A source adapter over registry exports on disk
//! - Destination snapshot files for offline planning
//! - Atomic JSON writes (temp file, fsync, rename)
//!
//! ## Example
//!
//! ```rust,no_run
//! use fleetsync_store::DataDir;
//! use std::path::Path;
//!
//! let dir = DataDir::open(Path::new("./fleetsync-data"))?;
//! if let Some(run_id) = dir.latest_unreverted_run()? {
//!     println!("last live run: {run_id}");
//! }
//! for summary in dir.results().list(10)? {
//!     println!("{} created={}", summary.run_id, summary.created);
//! }
//! # Ok::<(), fleetsync_store::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod dir;
mod error;
mod files;
mod results;

pub use dir::DataDir;
pub use error::{StoreError, StoreResult};
pub use files::{load_snapshot, save_snapshot, JsonFileSource};
pub use results::{ResultStore, ResultSummary};
