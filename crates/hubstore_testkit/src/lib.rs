//! # Hubstore Testkit
//!
//! Test utilities for the Hubstore block file.
//!
//! This crate provides:
//! - Temporary block files and tables with deterministic sample blocks
//! - Property-based test generators using proptest
//! - On-disk crash simulation and a recovery harness
//! - Stress helpers for readers racing an appender
//!
//! ## Usage
//!
//! ```rust
//! use hubstore_testkit::prelude::*;
//!
//! let test = TestBlockFile::with_segment_size(64);
//! for n in 0..8 {
//!     sample_block(n).append_to(&test, n).unwrap();
//! }
//! let test = test.reopen();
//! assert_eq!(test.blocks().unwrap(), 8);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::{CrashPoint, CrashRecoveryHarness, CrashRecoveryResult};
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
