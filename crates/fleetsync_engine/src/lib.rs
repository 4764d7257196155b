//! # Fleetsync Engine
//!
//! Reconciliation core: turns source registry records into CMDB writes.
//!
//! This crate provides:
//! - Rule-based device classification
//! - Mapping onto the destination schema
//! - Hostname/serial matching against a destination snapshot
//! - Per-field diffing and action decisions
//! - Adaptive, per-API rate limiting
//! - Two-layer dry-run interception
//! - Sequential sync execution with a revert log
//! - An HTTP destination adapter over a pluggable transport
//!
//! ## Pipeline
//!
//! ```text
//! SourceRecord -> classify -> map -> match -> diff -> SyncItem
//!                                                      |
//!                         DryRunGuard -> RateLimitedDestination -> adapter
//!                         DryRunGuard -> HttpDestination -> VerbGuard -> RateLimitedClient
//! ```
//!
//! ## Example
//!
//! ```rust
//! use fleetsync_engine::{
//!     CancelToken, DryRunSwitch, EngineConfig, MemoryDestination, RateLimitConfig, RunOptions,
//!     SyncExecutor,
//! };
//! use fleetsync_model::{RevertLog, SourceRecord};
//!
//! let config = EngineConfig::new().with_destination_limits(RateLimitConfig::unthrottled());
//! let executor = SyncExecutor::with_config(MemoryDestination::new(), DryRunSwitch::new(false), config);
//!
//! let records = vec![SourceRecord::new("1", "ws-001").with_kind("Laptop")];
//! let items = executor.plan(&records)?;
//!
//! let mut log = RevertLog::new();
//! let result = executor.execute(&items, &RunOptions::new(), &CancelToken::new(), &mut log)?;
//! assert_eq!(result.created, 1);
//! assert_eq!(log.len(), 1);
//! # Ok::<(), fleetsync_engine::SyncError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod classifier;
mod config;
mod diff;
mod error;
mod executor;
mod guard;
mod http;
mod limiter;
mod mapper;
mod matcher;
mod plan;
mod revert;

pub use adapter::{DestinationAdapter, DestinationCall, MemoryDestination, SourceAdapter};
pub use classifier::{classify, classify_with_rule, is_hypervisor_serial};
pub use config::{EngineConfig, HttpDestinationConfig, RateLimitConfig};
pub use diff::diff;
pub use error::{EngineResult, SyncError};
pub use executor::{CancelToken, HttpStack, RunOptions, Selection, SyncExecutor};
pub use guard::{DryRunGuard, DryRunSwitch, VerbGuard, DRY_RUN_ID_PREFIX};
pub use http::{
    classify_status, HttpClient, HttpDestination, HttpMethod, HttpRequest, HttpResponse,
    GENERIC_COLLECTION,
};
pub use limiter::{
    AdaptiveRateLimiter, CallOutcome, LimiterPhase, LimiterStats, RateLimitedClient,
    RateLimitedDestination, RateLimitedSource,
};
pub use mapper::{endpoint_for, map_record};
pub use matcher::Matcher;
pub use plan::{build_plan, PlanSummary};
pub use revert::{revert_run, RevertFailure, RevertReport};
