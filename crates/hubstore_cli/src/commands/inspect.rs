//! Inspect command implementation.

use super::{open_existing, CliResult, Format};
use hubstore_blockfile::{BlockFile, TableStats};
use serde::Serialize;
use std::path::Path;

/// Block file inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Repository root.
    pub path: String,
    /// Blocks stored.
    pub blocks: u64,
    /// Bytes across every index and segment.
    pub total_size: u64,
    /// Per-table statistics, in append order.
    pub tables: Vec<TableStats>,
}

/// Opens the block file at `path` and gathers its statistics.
///
/// Opening repairs the directory if a crash left it inconsistent.
pub fn collect(path: &Path) -> CliResult<InspectResult> {
    let blockfile = open_existing(path)?;
    let result = gather(&blockfile);
    blockfile.close()?;
    result
}

fn gather(blockfile: &BlockFile) -> CliResult<InspectResult> {
    let tables = blockfile.stats()?;
    Ok(InspectResult {
        path: blockfile.path().display().to_string(),
        blocks: blockfile.blocks()?,
        total_size: tables.iter().map(|t| t.size).sum(),
        tables,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let format = Format::parse(format)?;
    let result = collect(path)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Hubstore Block File Inspection");
    println!("==============================");
    println!();
    println!("Path:       {}", result.path);
    println!("Blocks:     {}", result.blocks);
    println!("Total size: {}", format_size(result.total_size));
    println!();
    println!(
        "{:<14} {:>10} {:>6} {:>12} {:>12}",
        "Table", "Items", "Head", "Head bytes", "Size"
    );
    for table in &result.tables {
        println!(
            "{:<14} {:>10} {:>6} {:>12} {:>12}",
            table.name,
            table.items,
            table.head_id,
            table.head_bytes,
            format_size(table.size)
        );
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
