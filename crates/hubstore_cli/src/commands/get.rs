//! Get command implementation.

use super::{open_existing, CliResult};
use std::path::Path;

/// Prints column `table` of block `number` as lowercase hex.
pub fn run(path: &Path, table: &str, number: u64) -> CliResult<()> {
    println!("{}", fetch(path, table, number)?);
    Ok(())
}

/// Reads column `table` of block `number` and hex-encodes it.
pub fn fetch(path: &Path, table: &str, number: u64) -> CliResult<String> {
    let blockfile = open_existing(path)?;
    let data = blockfile.get_by_name(table, number);
    blockfile.close()?;
    Ok(hex_encode(&data?))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
