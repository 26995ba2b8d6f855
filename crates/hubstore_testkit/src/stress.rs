//! Stress tests for the block file.
//!
//! Exercise sequential appends and concurrent readers racing a single
//! appender across segment rotations.

use crate::fixtures::sample_block;
use hubstore_blockfile::{BlockFile, TableKind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let secs = duration.as_secs_f64();
        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second: if secs > 0.0 { total as f64 / secs } else { 0.0 },
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Operations: {} ({} failed)", self.total_ops, self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Blocks appended by the writer.
    pub blocks: u64,
    /// Concurrent reader threads.
    pub readers: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            blocks: 2_000,
            readers: 4,
        }
    }
}

/// Appends `config.blocks` sample blocks after the current head.
pub fn stress_sequential_appends(blockfile: &BlockFile, config: &StressConfig) -> StressTestResult {
    let start = Instant::now();
    let (mut successful, mut failed) = (0, 0);

    let first = blockfile.blocks().unwrap_or(0);
    for n in first..first + config.blocks {
        match sample_block(n).append_to(blockfile, n) {
            Ok(()) => successful += 1,
            Err(_) => failed += 1,
        }
    }
    StressTestResult::new(successful, failed, start.elapsed())
}

/// Appends blocks on one thread while readers fetch every visible block.
///
/// A read counts as failed if it errors or returns bytes other than what
/// was appended for that row. Readers only ask for rows the block count
/// already covers.
pub fn stress_readers_during_appends(
    blockfile: Arc<BlockFile>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let done = Arc::new(AtomicBool::new(false));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));

    let readers: Vec<_> = (0..config.readers)
        .map(|reader| {
            let blockfile = Arc::clone(&blockfile);
            let done = Arc::clone(&done);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                let kind = TableKind::ALL[reader % TableKind::ALL.len()];
                while !done.load(Ordering::SeqCst) {
                    let Ok(blocks) = blockfile.blocks() else {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    };
                    for block in 1..=blocks {
                        let expected = sample_block(block - 1);
                        match blockfile.get(kind, block) {
                            Ok(data) if data.as_ref() == expected.column(kind) => {
                                successful.fetch_add(1, Ordering::Relaxed);
                            }
                            _ => {
                                failed.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            })
        })
        .collect();

    let writes = stress_sequential_appends(&blockfile, config);
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        if reader.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed) + writes.successful_ops,
        failed.load(Ordering::Relaxed) + writes.failed_ops,
        start.elapsed(),
    )
}
