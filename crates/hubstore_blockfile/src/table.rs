//! A single append-only column of block data.
//!
//! ```text
//! <dir>/
//! ├─ <name>.ridx        # index: (items + 1) six-byte entries
//! ├─ <name>.0000.rdat   # segment 0 (read-only once rotated)
//! ├─ <name>.0001.rdat
//! └─ <name>.NNNN.rdat   # head segment, the only writable one
//! ```
//!
//! Item bytes never straddle two segments: when an append would push the
//! head past `max_segment_size`, a new head is created first.
//!
//! # Concurrency
//!
//! `items`, `head_id` and `head_bytes` are atomics so the common paths can
//! read them without locking. The map of open file handles sits behind a
//! reader-writer lock. Reads and ordinary appends hold it shared; rotation,
//! truncation and close hold it exclusively. Appends must be serialized by
//! the caller.

use crate::error::{BlockFileError, BlockFileResult};
use crate::file::{self, OpenMode};
use crate::index::{IndexEntry, INDEX_ENTRY_SIZE};
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tracing::{debug, warn};

const ENTRY_SIZE: u64 = INDEX_ENTRY_SIZE as u64;

/// Where a table's files live.
#[derive(Debug, Clone)]
struct Layout {
    dir: PathBuf,
    name: String,
}

impl Layout {
    fn index_path(&self) -> PathBuf {
        self.dir.join(file::index_file_name(&self.name))
    }

    fn segment_path(&self, filenum: u32) -> PathBuf {
        self.dir.join(file::segment_file_name(&self.name, filenum))
    }

    /// Returns the open handle for `filenum`, opening it in `mode` if needed.
    fn open_segment<'a>(
        &self,
        segments: &'a mut BTreeMap<u32, File>,
        filenum: u32,
        mode: OpenMode,
    ) -> io::Result<&'a File> {
        match segments.entry(filenum) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = file::open(&self.segment_path(filenum), mode)?;
                Ok(entry.insert(file))
            }
        }
    }

    /// Closes every handle above `filenum`, deleting the files if `remove`.
    fn release_after(
        &self,
        segments: &mut BTreeMap<u32, File>,
        filenum: u32,
        remove: bool,
    ) -> io::Result<()> {
        let released = segments.split_off(&filenum.saturating_add(1));
        for (num, handle) in released {
            drop(handle);
            if remove {
                match fs::remove_file(self.segment_path(num)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn missing(&self, filenum: u32) -> BlockFileError {
        BlockFileError::MissingDataFile {
            table: self.name.clone(),
            filenum,
        }
    }
}

/// Handles guarded by the table lock. `index` is `None` once closed.
#[derive(Debug, Default)]
struct TableFiles {
    index: Option<File>,
    segments: BTreeMap<u32, File>,
}

fn read_entry(index: &File, n: u64) -> io::Result<IndexEntry> {
    let mut buf = [0u8; INDEX_ENTRY_SIZE];
    file::read_exact_at(index, &mut buf, IndexEntry::position(n))?;
    Ok(IndexEntry::decode(&buf))
}

/// Returns `(start, end, filenum)` for the item at relative position `item`.
fn bounds(index: &File, item: u64) -> io::Result<(u32, u32, u32)> {
    let end = read_entry(index, item + 1)?;
    if item == 0 {
        return Ok((0, end.offset, end.filenum));
    }
    let start = read_entry(index, item)?;
    if start.filenum != end.filenum {
        // The item opened a fresh segment.
        return Ok((0, end.offset, end.filenum));
    }
    Ok((start.offset, end.offset, end.filenum))
}

/// One column of the block file: an index plus size-capped data segments.
pub struct Table {
    layout: Layout,
    max_segment_size: u32,

    items: AtomicU64,
    head_id: AtomicU32,
    head_bytes: AtomicU32,
    tail_id: AtomicU32,
    item_offset: AtomicU32,

    files: RwLock<TableFiles>,
}

impl Table {
    /// Opens or creates the table `name` inside `dir`.
    ///
    /// Creates `dir` if needed, writes the sentinel index entry for a new
    /// table, and repairs any state left behind by a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or files cannot be created, opened
    /// or repaired.
    pub fn open(dir: &Path, name: &str, max_segment_size: u32) -> BlockFileResult<Self> {
        fs::create_dir_all(dir)?;
        let layout = Layout {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        };
        let index = file::open(&layout.index_path(), OpenMode::Append)?;

        let mut table = Self {
            layout,
            max_segment_size,
            items: AtomicU64::new(0),
            head_id: AtomicU32::new(0),
            head_bytes: AtomicU32::new(0),
            tail_id: AtomicU32::new(0),
            item_offset: AtomicU32::new(0),
            files: RwLock::new(TableFiles {
                index: Some(index),
                segments: BTreeMap::new(),
            }),
        };
        table.repair()?;
        Ok(table)
    }

    /// Reconciles the index with the head segment.
    ///
    /// Whichever side is longer is cut back until the last index entry and
    /// the head segment length agree. Every step shrinks one of the two
    /// files, so the loop terminates.
    fn repair(&mut self) -> BlockFileResult<()> {
        let layout = &self.layout;
        let files = self.files.get_mut();
        let index = files.index.as_ref().ok_or(BlockFileError::Closed)?;

        let mut index_size = file::len(index)?;
        let torn = index_size % ENTRY_SIZE;
        if torn != 0 {
            warn!(table = %layout.name, size = index_size, "Truncating torn index entry");
            index_size -= torn;
            index.set_len(index_size)?;
        }
        if index_size == 0 {
            file::write_all_at(index, &IndexEntry::default().encode(), 0)?;
            index_size = ENTRY_SIZE;
        }

        // Entry zero records the earliest segment and the pruned item count.
        let first = read_entry(index, 0)?;
        let mut last = read_entry(index, index_size / ENTRY_SIZE - 1)?;

        let segments = &mut files.segments;
        let head = layout.open_segment(segments, last.filenum, OpenMode::Append)?;
        let mut content_size = file::len(head)?;
        let mut content_exp = u64::from(last.offset);

        while content_exp != content_size {
            let head = segments
                .get(&last.filenum)
                .ok_or_else(|| layout.missing(last.filenum))?;
            if content_exp < content_size {
                warn!(
                    table = %layout.name,
                    indexed = content_exp,
                    stored = content_size,
                    "Truncating dangling head"
                );
                head.set_len(content_exp)?;
                content_size = content_exp;
                continue;
            }

            warn!(
                table = %layout.name,
                indexed = content_exp,
                stored = content_size,
                "Truncating dangling indexes"
            );
            if index_size == ENTRY_SIZE {
                // Only the sentinel is left and it bounds no bytes.
                content_exp = 0;
                continue;
            }
            index_size -= ENTRY_SIZE;
            index.set_len(index_size)?;
            let new_last = read_entry(index, index_size / ENTRY_SIZE - 1)?;

            // We might have slipped back into an earlier segment.
            if new_last.filenum != last.filenum {
                segments.remove(&last.filenum);
                let head = layout.open_segment(segments, new_last.filenum, OpenMode::Append)?;
                content_size = file::len(head)?;
            }
            last = new_last;
            content_exp = u64::from(last.offset);
        }

        index.sync_all()?;
        segments
            .get(&last.filenum)
            .ok_or_else(|| layout.missing(last.filenum))?
            .sync_all()?;

        let items = u64::from(first.offset) + index_size / ENTRY_SIZE - 1;
        // content_size equals an offset read from the index, so it fits.
        let head_bytes = u32::try_from(content_size).unwrap_or(u32::MAX);

        *self.items.get_mut() = items;
        *self.head_bytes.get_mut() = head_bytes;
        *self.head_id.get_mut() = last.filenum;
        *self.tail_id.get_mut() = first.filenum;
        *self.item_offset.get_mut() = first.offset;

        // Reopen everything: history read-only, head read-write.
        segments.clear();
        for filenum in first.filenum..last.filenum {
            layout.open_segment(segments, filenum, OpenMode::ReadOnly)?;
        }
        layout.open_segment(segments, last.filenum, OpenMode::Append)?;

        debug!(table = %layout.name, items, size = head_bytes, "Table opened");
        Ok(())
    }

    /// Appends `blob` as item number `item`.
    ///
    /// # Errors
    ///
    /// - [`BlockFileError::Sequence`] if `item` is not the next item number
    /// - [`BlockFileError::Closed`] if the table is closed
    /// - [`BlockFileError::ItemTooLarge`] if `blob` exceeds `u32::MAX` bytes
    /// - I/O errors from rotation or either write
    pub fn append(&self, item: u64, blob: &[u8]) -> BlockFileResult<()> {
        let len = u32::try_from(blob.len())
            .map_err(|_| BlockFileError::ItemTooLarge { size: blob.len() })?;

        let mut files = self.files.read();
        if files.index.is_none() {
            return Err(BlockFileError::Closed);
        }
        let items = self.items.load(Ordering::SeqCst);
        if items != item {
            return Err(BlockFileError::Sequence {
                expected: items,
                got: item,
            });
        }

        let head_bytes = self.head_bytes.load(Ordering::SeqCst);
        let overflows = head_bytes
            .checked_add(len)
            .map_or(true, |total| total > self.max_segment_size);
        if overflows {
            drop(files);
            self.rotate()?;
            files = self.files.read();
        }

        let index = files.index.as_ref().ok_or(BlockFileError::Closed)?;
        let head_id = self.head_id.load(Ordering::SeqCst);
        let head = files
            .segments
            .get(&head_id)
            .ok_or_else(|| self.layout.missing(head_id))?;
        let head_bytes = self.head_bytes.load(Ordering::SeqCst);
        let new_offset = head_bytes
            .checked_add(len)
            .ok_or(BlockFileError::ItemTooLarge { size: blob.len() })?;

        file::write_all_at(head, blob, u64::from(head_bytes))?;

        let entry = IndexEntry::new(head_id, new_offset);
        let position = IndexEntry::position(item - u64::from(self.item_offset()) + 1);
        if let Err(err) = file::write_all_at(index, &entry.encode(), position) {
            // Drop the unindexed bytes so the head stays in step with the index.
            if let Err(trim) = head.set_len(u64::from(head_bytes)) {
                warn!(table = %self.layout.name, error = %trim, "Failed to trim unindexed data");
            }
            return Err(err.into());
        }

        self.head_bytes.store(new_offset, Ordering::SeqCst);
        self.items.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    /// Closes the full head and starts segment `head_id + 1`.
    fn rotate(&self) -> BlockFileResult<()> {
        let mut files = self.files.write();
        if files.index.is_none() {
            return Err(BlockFileError::Closed);
        }
        let head_id = self.head_id.load(Ordering::SeqCst);
        let next_id = head_id + 1;
        if next_id > u32::from(u16::MAX) {
            return Err(BlockFileError::SegmentLimit {
                table: self.layout.name.clone(),
            });
        }

        let segments = &mut files.segments;
        // A leftover file with this id belongs to discarded history.
        segments.remove(&next_id);
        self.layout
            .open_segment(segments, next_id, OpenMode::Truncated)?;

        segments.remove(&head_id);
        self.layout
            .open_segment(segments, head_id, OpenMode::ReadOnly)?;

        self.head_bytes.store(0, Ordering::SeqCst);
        self.head_id.store(next_id, Ordering::SeqCst);
        debug!(table = %self.layout.name, segment = next_id, "Rotated head segment");
        Ok(())
    }

    /// Reads item number `item`.
    ///
    /// # Errors
    ///
    /// - [`BlockFileError::OutOfBounds`] if `item` is outside `[item_offset, items)`
    /// - [`BlockFileError::Closed`] if the table is closed
    /// - [`BlockFileError::MissingDataFile`] if the item's segment is not open
    pub fn retrieve(&self, item: u64) -> BlockFileResult<Bytes> {
        let files = self.files.read();
        let index = files.index.as_ref().ok_or(BlockFileError::Closed)?;

        let items = self.items.load(Ordering::SeqCst);
        let offset = u64::from(self.item_offset());
        if item >= items || item < offset {
            return Err(BlockFileError::OutOfBounds {
                item,
                offset,
                items,
            });
        }

        let (start, end, filenum) = bounds(index, item - offset)?;
        let data_file = files
            .segments
            .get(&filenum)
            .ok_or_else(|| self.layout.missing(filenum))?;
        let len = end.checked_sub(start).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("index entries out of order at item {item}"),
            )
        })?;

        let mut blob = vec![0u8; len as usize];
        file::read_exact_at(data_file, &mut blob, u64::from(start))?;
        Ok(Bytes::from(blob))
    }

    /// Discards every item at or above `items`.
    ///
    /// A no-op if the table holds `items` or fewer. Segments past the new
    /// head are deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is closed, `items` falls below the
    /// pruned head, or an I/O operation fails.
    pub fn truncate(&self, items: u64) -> BlockFileResult<()> {
        let mut files = self.files.write();
        let TableFiles { index, segments } = &mut *files;
        let index = index.as_ref().ok_or(BlockFileError::Closed)?;

        let existing = self.items.load(Ordering::SeqCst);
        if existing <= items {
            return Ok(());
        }
        let offset = u64::from(self.item_offset());
        if items < offset {
            return Err(BlockFileError::OutOfBounds {
                item: items,
                offset,
                items: existing,
            });
        }

        warn!(table = %self.layout.name, items = existing, limit = items, "Truncating table");

        let entries = items - offset + 1;
        index.set_len(IndexEntry::position(entries))?;
        let expected = read_entry(index, entries - 1)?;

        if expected.filenum != self.head_id.load(Ordering::SeqCst) {
            // The target is read-only right now; reopen it for writing.
            segments.remove(&expected.filenum);
            self.layout
                .open_segment(segments, expected.filenum, OpenMode::Append)?;
            self.layout
                .release_after(segments, expected.filenum, true)?;
            self.head_id.store(expected.filenum, Ordering::SeqCst);
        }

        segments
            .get(&expected.filenum)
            .ok_or_else(|| self.layout.missing(expected.filenum))?
            .set_len(u64::from(expected.offset))?;

        self.items.store(items, Ordering::SeqCst);
        self.head_bytes.store(expected.offset, Ordering::SeqCst);
        Ok(())
    }

    /// Flushes the index and the head segment to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is closed or a sync fails.
    pub fn sync(&self) -> BlockFileResult<()> {
        let files = self.files.read();
        let index = files.index.as_ref().ok_or(BlockFileError::Closed)?;
        index.sync_all()?;
        let head_id = self.head_id.load(Ordering::SeqCst);
        if let Some(head) = files.segments.get(&head_id) {
            head.sync_all()?;
        }
        Ok(())
    }

    /// Returns the total size of the index and all open segments in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is closed or a file cannot be stat'ed.
    pub fn size(&self) -> BlockFileResult<u64> {
        let files = self.files.read();
        let index = files.index.as_ref().ok_or(BlockFileError::Closed)?;
        let mut total = file::len(index)?;
        for segment in files.segments.values() {
            total += file::len(segment)?;
        }
        Ok(total)
    }

    /// Closes the index and every segment handle.
    ///
    /// The index and head are synced first; their failures are reported
    /// after every handle has been released.
    ///
    /// # Errors
    ///
    /// Returns [`BlockFileError::Closed`] if already closed, or the sync
    /// failures encountered while closing.
    pub fn close(&self) -> BlockFileResult<()> {
        let mut files = self.files.write();
        let index = files.index.take().ok_or(BlockFileError::Closed)?;
        let segments = std::mem::take(&mut files.segments);
        let head_id = self.head_id.load(Ordering::SeqCst);

        let mut errors = Vec::new();
        if let Err(e) = index.sync_all() {
            errors.push(BlockFileError::from(e));
        }
        if let Some(head) = segments.get(&head_id) {
            if let Err(e) = head.sync_all() {
                errors.push(BlockFileError::from(e));
            }
        }
        drop(index);
        drop(segments);

        BlockFileError::from_many(errors).map_or(Ok(()), Err)
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.layout.name
    }

    /// Returns the number of items, including pruned ones.
    #[must_use]
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::SeqCst)
    }

    /// Returns the id of the writable head segment.
    #[must_use]
    pub fn head_id(&self) -> u32 {
        self.head_id.load(Ordering::SeqCst)
    }

    /// Returns the number of bytes written to the head segment.
    #[must_use]
    pub fn head_bytes(&self) -> u32 {
        self.head_bytes.load(Ordering::SeqCst)
    }

    /// Returns the id of the earliest segment still present.
    #[must_use]
    pub fn tail_id(&self) -> u32 {
        self.tail_id.load(Ordering::SeqCst)
    }

    /// Returns the number of items pruned from the head of the table.
    #[must_use]
    pub fn item_offset(&self) -> u32 {
        self.item_offset.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn force_items(&self, items: u64) {
        self.items.store(items, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn force_head_id(&self, head_id: u32) {
        self.head_id.store(head_id, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.layout.name)
            .field("items", &self.items())
            .field("head_id", &self.head_id())
            .field("head_bytes", &self.head_bytes())
            .finish_non_exhaustive()
    }
}
