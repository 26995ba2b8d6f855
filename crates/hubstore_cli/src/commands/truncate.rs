//! Truncate command implementation.

use super::{open_existing, CliResult};
use hubstore_blockfile::BlockFile;
use std::path::Path;
use tracing::info;

/// Rolls the block file back to `blocks` blocks and reports the change.
pub fn run(path: &Path, blocks: u64) -> CliResult<()> {
    let (before, after) = truncate(path, blocks)?;
    if before == after {
        println!("Nothing to do: {before} blocks stored");
    } else {
        println!("Truncated from {before} to {after} blocks");
    }
    Ok(())
}

/// Truncates and returns the block counts before and after.
pub fn truncate(path: &Path, blocks: u64) -> CliResult<(u64, u64)> {
    let blockfile = open_existing(path)?;
    let result = roll_back(&blockfile, blocks);
    blockfile.close()?;
    let (before, after) = result?;
    info!(path = %path.display(), before, after, "Truncated block file");
    Ok((before, after))
}

fn roll_back(blockfile: &BlockFile, blocks: u64) -> CliResult<(u64, u64)> {
    let before = blockfile.blocks()?;
    blockfile.truncate_blocks(blocks)?;
    blockfile.sync()?;
    Ok((before, blockfile.blocks()?))
}
