//! The multi-table block file.
//!
//! ```text
//! <repo_root>/
//! ├─ FLOCK                    # advisory process lock
//! ├─ hashes.ridx / hashes.NNNN.rdat
//! ├─ bodies.ridx / bodies.NNNN.rdat
//! ├─ transactions.ridx / ...
//! ├─ receipts.ridx / ...
//! └─ interchain.ridx / ...
//! ```
//!
//! A block is one row across all five tables. Rows are written column by
//! column, so a crash can leave the tables at different lengths. Opening
//! the block file, and any failed append, cuts every table back to the
//! shortest one; that is the only cross-table atomicity mechanism.

use crate::config::BlockFileConfig;
use crate::error::{BlockFileError, BlockFileResult};
use crate::lock::DirLock;
use crate::schema::TableKind;
use crate::table::Table;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, error, info};

/// Per-table statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStats {
    /// Table name.
    pub name: String,
    /// Number of items.
    pub items: u64,
    /// Id of the head segment.
    pub head_id: u32,
    /// Bytes written to the head segment.
    pub head_bytes: u32,
    /// Total bytes on disk, index included.
    pub size: u64,
}

/// Append-only storage for immutable per-block data.
///
/// Block numbers passed to [`BlockFile::append_block`] are the zero-based
/// row to write; [`BlockFile::get`] takes one-based block numbers.
///
/// Readers may run concurrently with each other and with one writer.
/// Writers (`append_block`, `truncate_blocks`) must be serialized by the
/// caller.
///
/// # Example
///
/// ```no_run
/// use hubstore_blockfile::{BlockFile, TableKind};
/// use std::path::Path;
///
/// let blockfile = BlockFile::open(Path::new("data/blockfile"))?;
/// blockfile.append_block(0, b"hash", b"body", b"receipts", b"txs", b"meta")?;
/// assert_eq!(blockfile.get(TableKind::Hashes, 1)?.as_ref(), b"hash");
/// blockfile.close()?;
/// # Ok::<(), hubstore_blockfile::BlockFileError>(())
/// ```
pub struct BlockFile {
    path: PathBuf,
    blocks: AtomicU64,
    tables: Vec<Table>,
    lock: Mutex<Option<DirLock>>,
    closed: AtomicBool,
}

impl BlockFile {
    /// Opens or creates a block file with the default configuration.
    ///
    /// # Errors
    ///
    /// See [`BlockFile::open_with_config`].
    pub fn open(root: &Path) -> BlockFileResult<Self> {
        Self::open_with_config(root, BlockFileConfig::default())
    }

    /// Opens or creates a block file.
    ///
    /// # Errors
    ///
    /// - [`BlockFileError::SymlinkUnsupported`] if `root` is a symbolic link
    /// - [`BlockFileError::MissingDirectory`] if `root` is missing and
    ///   creation is disabled
    /// - [`BlockFileError::Locked`] if the directory is already open
    /// - any error from opening or repairing a table
    pub fn open_with_config(root: &Path, config: BlockFileConfig) -> BlockFileResult<Self> {
        match fs::symlink_metadata(root) {
            Ok(meta) if meta.file_type().is_symlink() => {
                error!(path = %root.display(), "Symbolic link is not supported");
                return Err(BlockFileError::SymlinkUnsupported {
                    path: root.to_path_buf(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !config.create_if_missing {
                    return Err(BlockFileError::MissingDirectory {
                        path: root.to_path_buf(),
                    });
                }
            }
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(root)?;

        let lock = DirLock::acquire(root)?;
        let mut tables = Vec::with_capacity(TableKind::ALL.len());
        for kind in TableKind::ALL {
            match Table::open(root, kind.name(), config.max_segment_size) {
                Ok(table) => tables.push(table),
                Err(err) => {
                    abandon(&tables, lock);
                    return Err(err);
                }
            }
        }

        let blockfile = Self {
            path: root.to_path_buf(),
            blocks: AtomicU64::new(0),
            tables,
            lock: Mutex::new(Some(lock)),
            closed: AtomicBool::new(false),
        };
        if let Err(err) = blockfile.repair() {
            if let Err(close_err) = blockfile.close() {
                error!(error = %close_err, "Failed to close block file after repair failure");
            }
            return Err(err);
        }

        debug!(path = %root.display(), blocks = blockfile.blocks.load(Ordering::SeqCst), "Block file opened");
        Ok(blockfile)
    }

    /// Cuts every table back to the shortest one.
    fn repair(&self) -> BlockFileResult<()> {
        let min = self.tables.iter().map(Table::items).min().unwrap_or(0);
        for table in &self.tables {
            table.truncate(min)?;
        }
        self.blocks.store(min, Ordering::SeqCst);
        Ok(())
    }

    fn table(&self, kind: TableKind) -> &Table {
        &self.tables[kind.position()]
    }

    fn ensure_open(&self) -> BlockFileResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BlockFileError::Closed);
        }
        Ok(())
    }

    /// Returns the number of blocks stored.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Closed`] after [`BlockFile::close`].
    pub fn blocks(&self) -> BlockFileResult<u64> {
        self.ensure_open()?;
        Ok(self.blocks.load(Ordering::SeqCst))
    }

    /// Reads one column of block `number` (one-based).
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::OutOfBounds`] for block 0 or any block not
    /// yet stored, and [`BlockFileError::Closed`] after close.
    pub fn get(&self, kind: TableKind, number: u64) -> BlockFileResult<Bytes> {
        self.ensure_open()?;
        // Block 0 wraps to u64::MAX and is rejected as out of bounds.
        self.table(kind).retrieve(number.wrapping_sub(1))
    }

    /// Reads one column of block `number`, naming the table by string.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::UnknownTable`] for a name outside the
    /// schema, otherwise as [`BlockFile::get`].
    pub fn get_by_name(&self, table: &str, number: u64) -> BlockFileResult<Bytes> {
        self.get(table.parse()?, number)
    }

    /// Appends block `number` to every table.
    ///
    /// On the first failing column the block file is repaired, dropping the
    /// columns already written, and the failing column's error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Sequence`] if `number` is not the current
    /// block count, [`BlockFileError::Closed`] after close, or the first
    /// table error.
    pub fn append_block(
        &self,
        number: u64,
        hash: &[u8],
        body: &[u8],
        receipts: &[u8],
        transactions: &[u8],
        interchain_metas: &[u8],
    ) -> BlockFileResult<()> {
        self.ensure_open()?;
        let blocks = self.blocks.load(Ordering::SeqCst);
        if blocks != number {
            return Err(BlockFileError::Sequence {
                expected: blocks,
                got: number,
            });
        }

        let columns = [
            (TableKind::Hashes, hash),
            (TableKind::Bodies, body),
            (TableKind::Transactions, transactions),
            (TableKind::Receipts, receipts),
            (TableKind::Interchain, interchain_metas),
        ];
        for (kind, data) in columns {
            if let Err(err) = self.table(kind).append(number, data) {
                error!(table = %kind, number, error = %err, "Failed to append block column");
                if let Err(repair_err) = self.repair() {
                    error!(error = %repair_err, "Failed to repair blockfile");
                }
                info!(number, error = %err, "Append block failed");
                return Err(err);
            }
        }

        self.blocks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Rolls the block file back to `blocks` blocks.
    ///
    /// A no-op if no more than `blocks` blocks are stored.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Closed`] after close, or the first table
    /// error.
    pub fn truncate_blocks(&self, blocks: u64) -> BlockFileResult<()> {
        self.ensure_open()?;
        if self.blocks.load(Ordering::SeqCst) <= blocks {
            return Ok(());
        }
        for table in &self.tables {
            table.truncate(blocks)?;
        }
        self.blocks.store(blocks, Ordering::SeqCst);
        Ok(())
    }

    /// Flushes every table to disk.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Closed`] after close, or the first sync
    /// failure.
    pub fn sync(&self) -> BlockFileResult<()> {
        self.ensure_open()?;
        for table in &self.tables {
            table.sync()?;
        }
        Ok(())
    }

    /// Returns statistics for every table, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Closed`] after close, or an I/O error.
    pub fn stats(&self) -> BlockFileResult<Vec<TableStats>> {
        self.ensure_open()?;
        self.tables
            .iter()
            .map(|table| {
                Ok(TableStats {
                    name: table.name().to_string(),
                    items: table.items(),
                    head_id: table.head_id(),
                    head_bytes: table.head_bytes(),
                    size: table.size()?,
                })
            })
            .collect()
    }

    /// Returns the repository root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes every table and releases the directory lock.
    ///
    /// Safe to call more than once; later calls do nothing.
    ///
    /// # Errors
    ///
    /// Returns the failures encountered while closing tables or releasing
    /// the lock. Every table is closed regardless.
    pub fn close(&self) -> BlockFileResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut errors = Vec::new();
        for table in &self.tables {
            if let Err(err) = table.close() {
                errors.push(err);
            }
        }
        if let Some(lock) = self.lock.lock().take() {
            if let Err(err) = lock.release() {
                errors.push(err);
            }
        }
        BlockFileError::from_many(errors).map_or(Ok(()), Err)
    }
}

/// Closes tables opened so far and drops the lock after a failed open.
fn abandon(tables: &[Table], lock: DirLock) {
    for table in tables {
        if let Err(err) = table.close() {
            error!(table = table.name(), error = %err, "Failed to close table");
        }
    }
    if let Err(err) = lock.release() {
        error!(error = %err, "Failed to release block file lock");
    }
}

impl std::fmt::Debug for BlockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFile")
            .field("path", &self.path)
            .field("blocks", &self.blocks.load(Ordering::SeqCst))
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}
