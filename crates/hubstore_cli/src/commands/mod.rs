//! CLI command implementations.

pub mod get;
pub mod inspect;
pub mod truncate;
pub mod verify;

use hubstore_blockfile::{
    index_file_name, BlockFile, BlockFileConfig, BlockFileError, TableKind,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A command needs `--path`.
    #[error("block file path required for {0}")]
    MissingPath(&'static str),

    /// `--format` named something other than text or json.
    #[error("unknown output format '{0}', expected text or json")]
    UnknownFormat(String),

    /// `--path` names a directory holding no block file.
    #[error("no block file found at {}", .0.display())]
    NotABlockFile(PathBuf),

    /// The verifier found problems.
    #[error("verification failed with {0} finding(s)")]
    VerifyFailed(usize),

    /// The block file refused an operation.
    #[error(transparent)]
    BlockFile(#[from] BlockFileError),

    /// JSON output could not be produced.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Opens an existing block file for a maintenance command.
///
/// Never creates anything: a missing directory, or one without a hashes
/// index, is an error.
pub fn open_existing(path: &Path) -> CliResult<BlockFile> {
    let config = BlockFileConfig::new().create_if_missing(false);
    if path.is_dir() && !path.join(index_file_name(TableKind::Hashes.name())).exists() {
        return Err(CliError::NotABlockFile(path.to_path_buf()));
    }
    Ok(BlockFile::open_with_config(path, config)?)
}

/// Output formats shared by the reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable text.
    Text,
    /// Pretty-printed JSON.
    Json,
}

impl Format {
    /// Parses a `--format` argument.
    pub fn parse(format: &str) -> CliResult<Self> {
        match format {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CliError::UnknownFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubstore_testkit::scenarios::populated_blockfile;
    use tempfile::tempdir;

    #[test]
    fn open_existing_refuses_missing_directory() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("no-such-store");

        let err = open_existing(&root).unwrap_err();
        assert!(matches!(
            err,
            CliError::BlockFile(BlockFileError::MissingDirectory { .. })
        ));
        assert!(!root.exists());
    }

    #[test]
    fn open_existing_refuses_empty_directory() {
        let dir = tempdir().unwrap();

        let err = open_existing(dir.path()).unwrap_err();
        assert!(matches!(err, CliError::NotABlockFile(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn open_existing_opens_store() {
        let (dir, _) = populated_blockfile(3, 64).into_dir();
        let blockfile = open_existing(dir.path()).unwrap();
        assert_eq!(blockfile.blocks().unwrap(), 3);
        blockfile.close().unwrap();
    }

    #[test]
    fn parse_format() {
        assert_eq!(Format::parse("text").unwrap(), Format::Text);
        assert_eq!(Format::parse("json").unwrap(), Format::Json);
        assert!(matches!(
            Format::parse("yaml"),
            Err(CliError::UnknownFormat(f)) if f == "yaml"
        ));
    }
}
