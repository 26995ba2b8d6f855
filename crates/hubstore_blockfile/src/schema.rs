//! The fixed set of block file tables.

use crate::error::BlockFileError;
use std::fmt;
use std::str::FromStr;

/// One column of per-block data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// Canonical block hashes.
    Hashes,
    /// Block bodies.
    Bodies,
    /// Block transactions.
    Transactions,
    /// Transaction receipts.
    Receipts,
    /// Interchain metadata.
    Interchain,
}

impl TableKind {
    /// Every table, in the order `append_block` writes them.
    pub const ALL: [TableKind; 5] = [
        TableKind::Hashes,
        TableKind::Bodies,
        TableKind::Transactions,
        TableKind::Receipts,
        TableKind::Interchain,
    ];

    /// Returns the on-disk table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TableKind::Hashes => "hashes",
            TableKind::Bodies => "bodies",
            TableKind::Transactions => "transactions",
            TableKind::Receipts => "receipts",
            TableKind::Interchain => "interchain",
        }
    }

    pub(crate) const fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TableKind {
    type Err = BlockFileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| BlockFileError::UnknownTable {
                name: s.to_string(),
            })
    }
}
