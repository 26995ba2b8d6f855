//! Error types for block file operations.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for block file operations.
pub type BlockFileResult<T> = Result<T, BlockFileError>;

/// Errors that can occur while operating on a table or a block file.
#[derive(Debug, Error)]
pub enum BlockFileError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The table or block file has been closed.
    #[error("block file is closed")]
    Closed,

    /// The requested item lies outside `[item_offset, items)`.
    #[error("out of bounds: item {item}, offset {offset}, items {items}")]
    OutOfBounds {
        /// The requested item.
        item: u64,
        /// Number of items pruned from the head of the table.
        offset: u64,
        /// Number of items in the table.
        items: u64,
    },

    /// An append was attempted with a number other than the next expected one.
    #[error("appending unexpected item: want {expected}, have {got}")]
    Sequence {
        /// The next number the table or block file accepts.
        expected: u64,
        /// The number that was supplied.
        got: u64,
    },

    /// The repository root is a symbolic link.
    #[error("symbolic link datadir is not supported: {}", path.display())]
    SymlinkUnsupported {
        /// The offending path.
        path: PathBuf,
    },

    /// Another process or handle holds the directory lock.
    #[error("block file locked: {}", path.display())]
    Locked {
        /// Path of the lock file.
        path: PathBuf,
    },

    /// The index references a segment that has no open handle.
    #[error("missing data file {filenum} in table {table}")]
    MissingDataFile {
        /// Table name.
        table: String,
        /// Segment id.
        filenum: u32,
    },

    /// A table name outside the fixed schema.
    #[error("unknown table: {name}")]
    UnknownTable {
        /// The name that was looked up.
        name: String,
    },

    /// An item too large to be addressed by a 32-bit offset.
    #[error("item too large: {size} bytes")]
    ItemTooLarge {
        /// Size of the rejected item.
        size: usize,
    },

    /// The table has used every segment id the index format can store.
    #[error("segment id space exhausted in table {table}")]
    SegmentLimit {
        /// Table name.
        table: String,
    },

    /// The repository root does not exist and creation was disabled.
    #[error("block file directory does not exist: {}", path.display())]
    MissingDirectory {
        /// The missing path.
        path: PathBuf,
    },

    /// Several independent failures, e.g. while closing every table.
    #[error("{}", Errors(.0))]
    Multiple(Vec<BlockFileError>),
}

impl BlockFileError {
    /// Collapses a list of errors into one, or `None` if the list is empty.
    pub(crate) fn from_many(mut errors: Vec<BlockFileError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::Multiple(errors)),
        }
    }

    /// Returns true if this error reports a closed table or block file.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Returns true if this error reports an out-of-bounds read.
    #[must_use]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Self::OutOfBounds { .. })
    }
}

struct Errors<'a>(&'a [BlockFileError]);

impl fmt::Display for Errors<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{err}")?;
        }
        f.write_str("]")
    }
}
