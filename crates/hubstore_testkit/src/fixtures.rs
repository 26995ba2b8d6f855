//! Test fixtures and block file helpers.
//!
//! Provides temporary block files and tables that clean up after
//! themselves, plus deterministic block payloads.

use hubstore_blockfile::{BlockFile, BlockFileConfig, BlockFileResult, Table, TableKind};
use std::path::Path;
use tempfile::TempDir;

/// The five columns of one block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockData {
    /// Canonical block hash.
    pub hash: Vec<u8>,
    /// Block body.
    pub body: Vec<u8>,
    /// Transaction receipts.
    pub receipts: Vec<u8>,
    /// Block transactions.
    pub transactions: Vec<u8>,
    /// Interchain metadata.
    pub interchain_metas: Vec<u8>,
}

impl BlockData {
    /// Appends this block as row `number`.
    pub fn append_to(&self, blockfile: &BlockFile, number: u64) -> BlockFileResult<()> {
        blockfile.append_block(
            number,
            &self.hash,
            &self.body,
            &self.receipts,
            &self.transactions,
            &self.interchain_metas,
        )
    }

    /// Returns the payload for one column.
    #[must_use]
    pub fn column(&self, kind: TableKind) -> &[u8] {
        match kind {
            TableKind::Hashes => &self.hash,
            TableKind::Bodies => &self.body,
            TableKind::Transactions => &self.transactions,
            TableKind::Receipts => &self.receipts,
            TableKind::Interchain => &self.interchain_metas,
        }
    }

    /// Returns true if every column of one-based block `block` matches.
    pub fn is_stored(&self, blockfile: &BlockFile, block: u64) -> BlockFileResult<bool> {
        for kind in TableKind::ALL {
            if blockfile.get(kind, block)?.as_ref() != self.column(kind) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// A deterministic block for row `n`, with columns of varying size.
#[must_use]
pub fn sample_block(n: u64) -> BlockData {
    let seed = n.to_be_bytes();
    BlockData {
        hash: seed.iter().cycle().take(32).copied().collect(),
        body: format!("body-{n}").repeat((n % 4 + 1) as usize).into_bytes(),
        receipts: format!("receipts-{n}").into_bytes(),
        transactions: vec![(n % 251) as u8; (n % 17) as usize],
        interchain_metas: format!("{{\"ibtps\":{}}}", n % 3).into_bytes(),
    }
}

/// A payload of `size` copies of `byte`.
#[must_use]
pub fn chunk(size: usize, byte: u8) -> Vec<u8> {
    vec![byte; size]
}

/// A block file in a temporary directory.
pub struct TestBlockFile {
    /// The block file instance.
    pub blockfile: BlockFile,
    config: BlockFileConfig,
    temp_dir: TempDir,
}

impl TestBlockFile {
    /// Opens a block file with the default configuration.
    pub fn new() -> Self {
        Self::with_config(BlockFileConfig::default())
    }

    /// Opens a block file with the given configuration.
    pub fn with_config(config: BlockFileConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let blockfile = BlockFile::open_with_config(temp_dir.path(), config.clone())
            .expect("Failed to open block file");
        Self {
            blockfile,
            config,
            temp_dir,
        }
    }

    /// Opens a block file whose segments hold at most `size` bytes.
    pub fn with_segment_size(size: u32) -> Self {
        Self::with_config(BlockFileConfig::new().max_segment_size(size))
    }

    /// Returns the directory holding the block file.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the configuration the block file was opened with.
    pub fn config(&self) -> &BlockFileConfig {
        &self.config
    }

    /// Closes and reopens the block file, running repair again.
    pub fn reopen(self) -> Self {
        let Self {
            blockfile,
            config,
            temp_dir,
        } = self;
        blockfile.close().expect("Failed to close block file");
        drop(blockfile);
        let blockfile = BlockFile::open_with_config(temp_dir.path(), config.clone())
            .expect("Failed to reopen block file");
        Self {
            blockfile,
            config,
            temp_dir,
        }
    }

    /// Closes the block file and hands back its directory, e.g. to
    /// simulate a crash on the files before reopening.
    pub fn into_dir(self) -> (TempDir, BlockFileConfig) {
        let Self {
            blockfile,
            config,
            temp_dir,
        } = self;
        blockfile.close().expect("Failed to close block file");
        (temp_dir, config)
    }

    /// Reopens a block file from a directory returned by [`Self::into_dir`].
    pub fn from_dir(temp_dir: TempDir, config: BlockFileConfig) -> BlockFileResult<Self> {
        let blockfile = BlockFile::open_with_config(temp_dir.path(), config.clone())?;
        Ok(Self {
            blockfile,
            config,
            temp_dir,
        })
    }
}

impl Default for TestBlockFile {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestBlockFile {
    type Target = BlockFile;

    fn deref(&self) -> &Self::Target {
        &self.blockfile
    }
}

/// A single table in a temporary directory.
pub struct TestTable {
    /// The table instance.
    pub table: Table,
    name: String,
    max_segment_size: u32,
    temp_dir: TempDir,
}

impl TestTable {
    /// Opens table `name` with the given segment cap.
    pub fn new(name: &str, max_segment_size: u32) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let table =
            Table::open(temp_dir.path(), name, max_segment_size).expect("Failed to open table");
        Self {
            table,
            name: name.to_string(),
            max_segment_size,
            temp_dir,
        }
    }

    /// Returns the directory holding the table.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes and reopens the table, running repair again.
    pub fn reopen(self) -> BlockFileResult<Self> {
        self.table.close()?;
        let table = Table::open(self.temp_dir.path(), &self.name, self.max_segment_size)?;
        Ok(Self { table, ..self })
    }
}

impl std::ops::Deref for TestTable {
    type Target = Table;

    fn deref(&self) -> &Self::Target {
        &self.table
    }
}

/// Runs a test with a temporary block file.
///
/// # Example
///
/// ```rust
/// use hubstore_testkit::{sample_block, with_temp_blockfile};
///
/// with_temp_blockfile(|blockfile| {
///     sample_block(0).append_to(blockfile, 0).unwrap();
///     assert_eq!(blockfile.blocks().unwrap(), 1);
/// });
/// ```
pub fn with_temp_blockfile<F, R>(f: F) -> R
where
    F: FnOnce(&BlockFile) -> R,
{
    let test = TestBlockFile::new();
    f(&test.blockfile)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a block file holding `blocks` sample blocks.
    pub fn populated_blockfile(blocks: u64, max_segment_size: u32) -> TestBlockFile {
        let test = TestBlockFile::with_segment_size(max_segment_size);
        for n in 0..blocks {
            sample_block(n)
                .append_to(&test, n)
                .expect("Failed to append block");
        }
        test
    }
}
