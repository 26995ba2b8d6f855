//! Crash recovery testing for the block file.
//!
//! A crash in the middle of an append leaves the files in one of a few
//! shapes: the index got ahead of the data, the data got ahead of the
//! index, an index entry was only partly written, or only some of the five
//! columns received the new block. The helpers here produce those shapes
//! directly on disk so that reopening can be checked against them.
//!
//! ## Usage
//!
//! ```rust
//! use hubstore_testkit::crash::CrashRecoveryHarness;
//!
//! let mut harness = CrashRecoveryHarness::new().unwrap();
//! harness.run_all();
//! assert!(harness.all_passed(), "{}", harness.summary());
//! ```

use crate::fixtures::sample_block;
use hubstore_blockfile::{
    index_file_name, segment_file_name, verify_dir, BlockFile, BlockFileConfig, BlockFileResult,
    IndexEntry, Table, TableKind, INDEX_ENTRY_SIZE,
};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use tempfile::TempDir;

/// Shapes a table can be left in by a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashPoint {
    /// The index entry reached disk, the data bytes did not.
    DataLost,
    /// The data bytes reached disk, the index entry did not.
    IndexEntryLost,
    /// The index entry was cut short.
    TornIndexEntry,
    /// The head segment lost its contents.
    HeadSegmentEmptied,
    /// Only the first `columns` tables received the next block.
    PartialBlock {
        /// Number of tables, in append order, that got the row.
        columns: usize,
    },
}

impl CrashPoint {
    /// Every crash shape, with partial blocks for one to four columns.
    #[must_use]
    pub fn all() -> Vec<Self> {
        let mut points = vec![
            Self::DataLost,
            Self::IndexEntryLost,
            Self::TornIndexEntry,
            Self::HeadSegmentEmptied,
        ];
        points.extend((1..TableKind::ALL.len()).map(|columns| Self::PartialBlock { columns }));
        points
    }

    /// Returns true if recovery must keep every complete block.
    #[must_use]
    pub fn keeps_all_blocks(self) -> bool {
        !matches!(self, Self::HeadSegmentEmptied)
    }

    /// Applies this crash shape to table `kind` under `root`.
    ///
    /// The block file must not be open. [`CrashPoint::PartialBlock`]
    /// ignores `kind`.
    pub fn apply(
        self,
        root: &Path,
        kind: TableKind,
        config: &BlockFileConfig,
    ) -> BlockFileResult<()> {
        let name = kind.name();
        match self {
            Self::DataLost => append_dangling_index_entry(root, name, 16)?,
            Self::IndexEntryLost => {
                let head = last_index_entry(root, name)?.filenum;
                grow_segment(root, name, head, &[0xEE; 24])?;
            }
            Self::TornIndexEntry => append_torn_index_bytes(root, name, &[0, 0, 0])?,
            Self::HeadSegmentEmptied => {
                let head = last_index_entry(root, name)?.filenum;
                set_segment_len(root, name, head, 0)?;
            }
            Self::PartialBlock { columns } => {
                append_partial_block(root, config.max_segment_size, columns)?;
            }
        }
        Ok(())
    }
}

/// Reads the last complete entry of a table's index.
pub fn last_index_entry(root: &Path, table: &str) -> io::Result<IndexEntry> {
    let index = fs::read(root.join(index_file_name(table)))?;
    index
        .chunks_exact(INDEX_ENTRY_SIZE)
        .last()
        .and_then(|chunk| <&[u8; INDEX_ENTRY_SIZE]>::try_from(chunk).ok())
        .map(IndexEntry::decode)
        .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "index is empty"))
}

/// Appends an index entry whose end offset lies `extra` bytes past the
/// head segment.
pub fn append_dangling_index_entry(root: &Path, table: &str, extra: u32) -> io::Result<()> {
    let last = last_index_entry(root, table)?;
    let entry = IndexEntry::new(last.filenum, last.offset + extra);
    append_to(&root.join(index_file_name(table)), &entry.encode())
}

/// Appends raw bytes to a table's index.
pub fn append_torn_index_bytes(root: &Path, table: &str, bytes: &[u8]) -> io::Result<()> {
    append_to(&root.join(index_file_name(table)), bytes)
}

/// Appends bytes that no index entry covers to a segment.
pub fn grow_segment(root: &Path, table: &str, filenum: u32, bytes: &[u8]) -> io::Result<()> {
    append_to(&root.join(segment_file_name(table, filenum)), bytes)
}

/// Sets a segment's length, cutting or zero-extending it.
pub fn set_segment_len(root: &Path, table: &str, filenum: u32, len: u64) -> io::Result<()> {
    OpenOptions::new()
        .write(true)
        .open(root.join(segment_file_name(table, filenum)))?
        .set_len(len)
}

/// Appends the next sample block to only the first `columns` tables.
pub fn append_partial_block(
    root: &Path,
    max_segment_size: u32,
    columns: usize,
) -> BlockFileResult<()> {
    for kind in TableKind::ALL.into_iter().take(columns) {
        let table = Table::open(root, kind.name(), max_segment_size)?;
        let item = table.items();
        table.append(item, sample_block(item).column(kind))?;
        table.close()?;
    }
    Ok(())
}

fn append_to(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Result of a crash recovery test.
#[derive(Debug, Clone)]
pub struct CrashRecoveryResult {
    /// Whether the test passed.
    pub passed: bool,
    /// Description of what was tested.
    pub description: String,
    /// Blocks stored before the crash.
    pub expected_blocks: u64,
    /// Blocks found after recovery.
    pub actual_blocks: u64,
    /// Any error message.
    pub error: Option<String>,
}

impl CrashRecoveryResult {
    /// Creates a passing result.
    pub fn pass(description: &str, expected: u64, actual: u64) -> Self {
        Self {
            passed: true,
            description: description.to_string(),
            expected_blocks: expected,
            actual_blocks: actual,
            error: None,
        }
    }

    /// Creates a failing result.
    pub fn fail(description: &str, expected: u64, actual: u64, error: &str) -> Self {
        Self {
            passed: false,
            description: description.to_string(),
            expected_blocks: expected,
            actual_blocks: actual,
            error: Some(error.to_string()),
        }
    }
}

/// Test harness for crash recovery scenarios.
///
/// Each run populates a fresh directory with sample blocks, applies a
/// [`CrashPoint`], reopens, and checks that the surviving blocks are intact,
/// the directory verifies clean, and appending resumes.
pub struct CrashRecoveryHarness {
    temp_dir: TempDir,
    config: BlockFileConfig,
    runs: usize,
    /// Results of crash recovery tests.
    pub results: Vec<CrashRecoveryResult>,
}

impl CrashRecoveryHarness {
    /// Blocks written before each simulated crash.
    pub const BLOCKS: u64 = 12;

    /// Creates a harness whose small segments rotate every few blocks.
    pub fn new() -> io::Result<Self> {
        Self::with_config(BlockFileConfig::new().max_segment_size(64))
    }

    /// Creates a harness with the given configuration.
    pub fn with_config(config: BlockFileConfig) -> io::Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            config,
            runs: 0,
            results: Vec::new(),
        })
    }

    /// Simulates one crash and checks recovery.
    pub fn run(&mut self, point: CrashPoint, kind: TableKind) -> CrashRecoveryResult {
        let description = match point {
            CrashPoint::PartialBlock { .. } => format!("{point:?}"),
            _ => format!("{point:?} on {kind}"),
        };
        let root = self.temp_dir.path().join(format!("run-{}", self.runs));
        self.runs += 1;

        let result = self
            .try_run(&root, point, kind, &description)
            .unwrap_or_else(|e| {
                CrashRecoveryResult::fail(&description, Self::BLOCKS, 0, &e.to_string())
            });
        self.results.push(result.clone());
        result
    }

    fn try_run(
        &self,
        root: &Path,
        point: CrashPoint,
        kind: TableKind,
        description: &str,
    ) -> BlockFileResult<CrashRecoveryResult> {
        let expected = Self::BLOCKS;
        let blockfile = BlockFile::open_with_config(root, self.config.clone())?;
        for n in 0..expected {
            sample_block(n).append_to(&blockfile, n)?;
        }
        blockfile.close()?;
        drop(blockfile);

        point.apply(root, kind, &self.config)?;

        let blockfile = BlockFile::open_with_config(root, self.config.clone())?;
        let actual = blockfile.blocks()?;
        if actual > expected || (point.keeps_all_blocks() && actual != expected) {
            return Ok(CrashRecoveryResult::fail(
                description,
                expected,
                actual,
                "Unexpected block count after recovery",
            ));
        }
        for n in 0..actual {
            if !sample_block(n).is_stored(&blockfile, n + 1)? {
                return Ok(CrashRecoveryResult::fail(
                    description,
                    expected,
                    actual,
                    &format!("Block {} differs after recovery", n + 1),
                ));
            }
        }

        sample_block(actual).append_to(&blockfile, actual)?;
        blockfile.close()?;
        drop(blockfile);

        let report = verify_dir(root)?;
        if !report.is_ok() {
            return Ok(CrashRecoveryResult::fail(
                description,
                expected,
                actual,
                &format!("Verification failed: {report:?}"),
            ));
        }
        Ok(CrashRecoveryResult::pass(description, expected, actual))
    }

    /// Runs every crash point against every table.
    pub fn run_all(&mut self) -> Vec<CrashRecoveryResult> {
        self.results.clear();
        for point in CrashPoint::all() {
            match point {
                CrashPoint::PartialBlock { .. } => {
                    self.run(point, TableKind::Hashes);
                }
                _ => {
                    for kind in TableKind::ALL {
                        self.run(point, kind);
                    }
                }
            }
        }
        self.results.clone()
    }

    /// Returns a summary of test results.
    pub fn summary(&self) -> String {
        let passed = self.results.iter().filter(|r| r.passed).count();
        let mut summary = format!(
            "\n=== Crash Recovery Summary ===\nPassed: {passed}/{}\n\n",
            self.results.len()
        );
        for result in &self.results {
            let status = if result.passed { "ok" } else { "FAILED" };
            summary.push_str(&format!(
                "[{status}] {}\n  Expected: {} blocks, Actual: {} blocks\n",
                result.description, result.expected_blocks, result.actual_blocks
            ));
            if let Some(error) = &result.error {
                summary.push_str(&format!("  Error: {error}\n"));
            }
        }
        summary
    }

    /// Returns whether all tests passed.
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }
}
