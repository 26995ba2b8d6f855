//! Read-only consistency checks.
//!
//! Verification inspects the files as they are on disk. It neither takes
//! the directory lock nor repairs anything, so it can look at a directory
//! left behind by a crash before the next open rewrites it.

use crate::error::BlockFileResult;
use crate::file;
use crate::index::{IndexEntry, INDEX_ENTRY_SIZE};
use crate::schema::TableKind;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

/// Verification result for one table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    /// Table name.
    pub name: String,
    /// Items according to the index.
    pub items: u64,
    /// Earliest segment id.
    pub tail_id: u32,
    /// Head segment id.
    pub head_id: u32,
    /// Bytes across all segments.
    pub data_bytes: u64,
    /// Problems found.
    pub findings: Vec<String>,
}

impl TableReport {
    /// Returns true if nothing was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty()
    }
}

/// Verification result for a whole block file directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    /// Directory that was checked.
    pub path: String,
    /// Per-table results, in append order.
    pub tables: Vec<TableReport>,
    /// Problems spanning several tables.
    pub findings: Vec<String>,
}

impl VerifyReport {
    /// Returns true if no table and no cross-table check found anything.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.findings.is_empty() && self.tables.iter().all(TableReport::is_ok)
    }
}

/// Checks one table's index against its segments.
///
/// # Errors
///
/// Returns an error only if a file exists but cannot be read.
pub fn verify_table(root: &Path, name: &str) -> BlockFileResult<TableReport> {
    let mut report = TableReport {
        name: name.to_string(),
        ..TableReport::default()
    };

    let index = match fs::read(root.join(file::index_file_name(name))) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            report.findings.push("index file missing".to_string());
            return Ok(report);
        }
        Err(e) => return Err(e.into()),
    };

    if index.len() % INDEX_ENTRY_SIZE != 0 {
        report.findings.push(format!(
            "index holds {} bytes, not a multiple of {INDEX_ENTRY_SIZE}",
            index.len()
        ));
    }
    let entries: Vec<IndexEntry> = index
        .chunks_exact(INDEX_ENTRY_SIZE)
        .filter_map(|chunk| <&[u8; INDEX_ENTRY_SIZE]>::try_from(chunk).ok())
        .map(IndexEntry::decode)
        .collect();
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        report.findings.push("index has no sentinel entry".to_string());
        return Ok(report);
    };

    report.tail_id = first.filenum;
    report.head_id = last.filenum;
    report.items = u64::from(first.offset) + entries.len() as u64 - 1;

    // Highest offset the index expects in each segment.
    let mut expected: BTreeMap<u32, u32> = BTreeMap::new();
    let mut prev = *first;
    for (n, entry) in entries.iter().enumerate().skip(1) {
        if entry.filenum < prev.filenum {
            report.findings.push(format!(
                "entry {n} steps back from segment {} to {}",
                prev.filenum, entry.filenum
            ));
        } else if entry.filenum == prev.filenum && n > 1 && entry.offset < prev.offset {
            report.findings.push(format!(
                "entry {n} offset {} precedes {}",
                entry.offset, prev.offset
            ));
        }
        let max = expected.entry(entry.filenum).or_insert(0);
        *max = (*max).max(entry.offset);
        prev = *entry;
    }

    for filenum in report.tail_id..=report.head_id {
        let path = root.join(file::segment_file_name(name, filenum));
        let len = match fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                report.findings.push(format!("segment {filenum} missing"));
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        report.data_bytes += len;

        let indexed = u64::from(expected.get(&filenum).copied().unwrap_or(0));
        if filenum == report.head_id {
            if len != u64::from(last.offset) {
                report.findings.push(format!(
                    "head segment {filenum} holds {len} bytes, index expects {}",
                    last.offset
                ));
            }
        } else if len < indexed {
            report.findings.push(format!(
                "segment {filenum} holds {len} bytes, index expects at least {indexed}"
            ));
        }
    }

    Ok(report)
}

/// Checks every table in `root` and that they agree on the row count.
///
/// # Errors
///
/// Returns an error only if a file exists but cannot be read.
pub fn verify_dir(root: &Path) -> BlockFileResult<VerifyReport> {
    let mut report = VerifyReport {
        path: root.display().to_string(),
        ..VerifyReport::default()
    };
    for kind in TableKind::ALL {
        report.tables.push(verify_table(root, kind.name())?);
    }

    let counts: Vec<u64> = report.tables.iter().map(|t| t.items).collect();
    if counts.windows(2).any(|pair| pair[0] != pair[1]) {
        let listing: Vec<String> = report
            .tables
            .iter()
            .map(|t| format!("{}={}", t.name, t.items))
            .collect();
        report.findings.push(format!(
            "tables disagree on row count: {}",
            listing.join(", ")
        ));
    }
    Ok(report)
}
