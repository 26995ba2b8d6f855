//! File naming, open modes, and positional I/O for table files.
//!
//! All table I/O goes through explicit offsets so that concurrent readers
//! never race with the appender over a shared file cursor.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// How a table file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    /// Read-write, created if missing, existing content kept.
    Append,
    /// Read-write, created if missing, existing content discarded.
    Truncated,
    /// Read-only. The file must exist.
    ReadOnly,
}

/// Opens `path` in the given mode.
pub(crate) fn open(path: &Path, mode: OpenMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        OpenMode::Append => options.read(true).write(true).create(true).truncate(false),
        OpenMode::Truncated => options.read(true).write(true).create(true).truncate(true),
        OpenMode::ReadOnly => options.read(true),
    };
    options.open(path)
}

/// Name of a table's index file, e.g. `hashes.ridx`.
#[must_use]
pub fn index_file_name(table: &str) -> String {
    format!("{table}.ridx")
}

/// Name of a table's segment file, e.g. `hashes.0003.rdat`.
#[must_use]
pub fn segment_file_name(table: &str, filenum: u32) -> String {
    format!("{table}.{filenum:04}.rdat")
}

/// Returns the current length of `file`.
pub(crate) fn len(file: &File) -> io::Result<u64> {
    Ok(file.metadata()?.len())
}

/// Reads exactly `buf.len()` bytes at `offset`.
#[cfg(unix)]
pub(crate) fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

/// Reads exactly `buf.len()` bytes at `offset`.
#[cfg(windows)]
pub(crate) fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "failed to fill whole buffer",
                ))
            }
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Writes all of `buf` at `offset`.
#[cfg(unix)]
pub(crate) fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

/// Writes all of `buf` at `offset`.
#[cfg(windows)]
pub(crate) fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "failed to write whole buffer",
                ))
            }
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_names() {
        assert_eq!(index_file_name("hashes"), "hashes.ridx");
        assert_eq!(segment_file_name("bodies", 0), "bodies.0000.rdat");
        assert_eq!(segment_file_name("bodies", 12), "bodies.0012.rdat");
    }

    #[test]
    fn append_mode_keeps_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.rdat");

        let file = open(&path, OpenMode::Append).unwrap();
        write_all_at(&file, b"hello", 0).unwrap();
        drop(file);

        let file = open(&path, OpenMode::Append).unwrap();
        assert_eq!(len(&file).unwrap(), 5);
    }

    #[test]
    fn truncated_mode_discards_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.rdat");

        let file = open(&path, OpenMode::Append).unwrap();
        write_all_at(&file, b"hello", 0).unwrap();
        drop(file);

        let file = open(&path, OpenMode::Truncated).unwrap();
        assert_eq!(len(&file).unwrap(), 0);
    }

    #[test]
    fn read_only_requires_existing_file() {
        let dir = tempdir().unwrap();
        let result = open(&dir.path().join("missing.rdat"), OpenMode::ReadOnly);
        assert!(result.is_err());
    }

    #[test]
    fn positional_read_write() {
        let dir = tempdir().unwrap();
        let file = open(&dir.path().join("data.rdat"), OpenMode::Append).unwrap();

        write_all_at(&file, b"hello", 0).unwrap();
        write_all_at(&file, b" world", 5).unwrap();

        let mut buf = [0u8; 5];
        read_exact_at(&file, &mut buf, 6).unwrap();
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let file = open(&dir.path().join("data.rdat"), OpenMode::Append).unwrap();
        write_all_at(&file, b"abc", 0).unwrap();

        let mut buf = [0u8; 4];
        assert!(read_exact_at(&file, &mut buf, 0).is_err());
    }
}
