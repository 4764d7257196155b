//! # Fleetsync Testkit
//!
//! Test utilities for fleetsync.
//!
//! This crate provides:
//! - Sample fleets, destination snapshots and temporary data directories
//! - Property-based test generators using proptest
//! - A recording HTTP transport for wire-level assertions
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fleetsync_testkit::prelude::*;
//!
//! #[test]
//! fn plans_the_sample_fleet() {
//!     let dest = MemoryDestination::new();
//!     let executor = memory_executor(&dest);
//!     let items = executor.plan(&sample_fleet()).unwrap();
//!     assert_eq!(items.len(), 6);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recording;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recording::*;
    pub use fleetsync_engine::MemoryDestination;
}

pub use fixtures::*;
pub use generators::*;
pub use recording::*;
