//! Verify command implementation.

use super::{CliError, CliResult, Format};
use hubstore_blockfile::{verify_dir, VerifyReport};
use std::path::Path;

/// Runs the verify command.
///
/// Reads the files as they are. Neither locks nor repairs, so it is safe
/// on a directory another process has open.
pub fn run(path: &Path, format: &str) -> CliResult<()> {
    let format = Format::parse(format)?;
    let report = verify_dir(path)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => print_text_output(&report),
    }

    let findings = count_findings(&report);
    if findings == 0 {
        Ok(())
    } else {
        Err(CliError::VerifyFailed(findings))
    }
}

fn count_findings(report: &VerifyReport) -> usize {
    report.findings.len()
        + report
            .tables
            .iter()
            .map(|t| t.findings.len())
            .sum::<usize>()
}

fn print_text_output(report: &VerifyReport) {
    println!("Verifying block file at {}", report.path);
    println!();
    for table in &report.tables {
        let status = if table.is_ok() { "ok" } else { "FAILED" };
        println!(
            "[{status}] {}: {} items in segments {}..={} ({} bytes)",
            table.name, table.items, table.tail_id, table.head_id, table.data_bytes
        );
        for finding in &table.findings {
            println!("    - {finding}");
        }
    }
    for finding in &report.findings {
        println!("  - {finding}");
    }

    println!();
    if report.is_ok() {
        println!("Block file verification passed");
    } else {
        println!("Block file verification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hubstore_testkit::crash::append_torn_index_bytes;
    use hubstore_testkit::scenarios::populated_blockfile;

    #[test]
    fn healthy_directory_passes() {
        let (dir, _) = populated_blockfile(5, 64).into_dir();
        run(dir.path(), "text").unwrap();
        run(dir.path(), "json").unwrap();
    }

    #[test]
    fn findings_fail_the_command() {
        let (dir, _) = populated_blockfile(5, 64).into_dir();
        append_torn_index_bytes(dir.path(), "bodies", &[0, 1]).unwrap();

        let err = run(dir.path(), "text").unwrap_err();
        assert!(matches!(err, CliError::VerifyFailed(1)));
    }

    #[test]
    fn works_while_open() {
        let test = populated_blockfile(3, 64);
        run(test.path(), "text").unwrap();
    }
}
