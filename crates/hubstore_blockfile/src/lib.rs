//! # Hubstore Block File
//!
//! Append-only storage for immutable per-block data.
//!
//! Block hashes, bodies, transactions, receipts and interchain metadata are
//! kept outside the key-value state database, one [`Table`] per column.
//! Each table is an index file plus numbered, size-capped data segments.
//! The [`BlockFile`] ties the five tables together under one row counter
//! and one directory lock.
//!
//! ## Design Principles
//!
//! - Write once, read by offset, truncate only from the tail
//! - Crash recovery by repair: shrink to the largest consistent state
//! - Multi-column atomicity by cutting every table to the shortest one
//! - No checksums, compression or encryption; payloads are opaque bytes
//!
//! ## Example
//!
//! ```rust
//! use hubstore_blockfile::{BlockFile, TableKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let blockfile = BlockFile::open(dir.path()).unwrap();
//!
//! blockfile
//!     .append_block(0, b"hash0", b"body0", b"receipts0", b"txs0", b"meta0")
//!     .unwrap();
//! assert_eq!(blockfile.blocks().unwrap(), 1);
//! assert_eq!(blockfile.get(TableKind::Hashes, 1).unwrap().as_ref(), b"hash0");
//!
//! blockfile.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod blockfile;
mod config;
mod error;
mod file;
mod index;
mod lock;
mod schema;
mod table;
mod verify;

pub use blockfile::{BlockFile, TableStats};
pub use config::{BlockFileConfig, DEFAULT_MAX_SEGMENT_SIZE};
pub use error::{BlockFileError, BlockFileResult};
pub use file::{index_file_name, segment_file_name};
pub use index::{IndexEntry, INDEX_ENTRY_SIZE};
pub use lock::{DirLock, LOCK_FILE};
pub use schema::TableKind;
pub use table::Table;
pub use verify::{verify_dir, verify_table, TableReport, VerifyReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
