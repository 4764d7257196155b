//! # Fleetsync Model
//!
//! Data model for reconciling a fleet device registry with a CMDB.
//!
//! This crate provides:
//! - `SourceRecord` for devices reported by the source registry
//! - `DestinationRecord` for assets currently stored in the CMDB
//! - `AttrValue` attribute trees shaped like the destination schema
//! - Sync plan types (`SyncItem`, `MatchResult`, `FieldVerdict`, `SyncAction`)
//! - Run ledger types (`SyncResult`, `ItemOutcome`)
//! - Revert log types (`RevertEntry`, `RevertLog`)
//!
//! This is a pure model crate with no I/O operations. Every type is
//! serde-serializable so results and logs can be persisted as JSON.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod classification;
mod destination;
mod item;
mod result;
mod revert;
mod source;
mod value;

pub use classification::{Classification, Endpoint, ParseEndpointError};
pub use destination::DestinationRecord;
pub use item::{
    FieldVerdict, MappedAttributes, MatchMethod, MatchResult, SyncAction, SyncItem, VerdictKind,
};
pub use result::{ErrorKind, ItemOutcome, OutcomeStatus, SyncResult};
pub use revert::{RevertEntry, RevertLog};
pub use source::{MemoryModule, NetworkAdapter, OsInfo, Processor, SourceRecord};
pub use value::{lookup_path, AttrValue, Attributes};
