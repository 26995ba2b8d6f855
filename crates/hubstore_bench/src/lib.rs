//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use hubstore_blockfile::{BlockFile, BlockFileConfig};
use rand::Rng;
use tempfile::TempDir;

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Column payloads for one block, roughly shaped like real chain data.
pub struct BlockPayload {
    /// 32-byte hash.
    pub hash: Vec<u8>,
    /// Block body.
    pub body: Vec<u8>,
    /// Receipts.
    pub receipts: Vec<u8>,
    /// Transactions.
    pub transactions: Vec<u8>,
    /// Interchain metadata.
    pub interchain_metas: Vec<u8>,
}

impl BlockPayload {
    /// Random payload whose body and transactions total about `size` bytes.
    pub fn random(size: usize) -> Self {
        Self {
            hash: random_data(32),
            body: random_data(size / 4),
            receipts: random_data(size / 4),
            transactions: random_data(size / 2),
            interchain_metas: random_data(64),
        }
    }

    /// Appends this payload as block `number`.
    pub fn append_to(&self, blockfile: &BlockFile, number: u64) {
        blockfile
            .append_block(
                number,
                &self.hash,
                &self.body,
                &self.receipts,
                &self.transactions,
                &self.interchain_metas,
            )
            .expect("append_block failed");
    }
}

/// Opens a block file in a fresh temporary directory holding `blocks`
/// blocks of `payload`.
pub fn populated(
    blocks: u64,
    payload: &BlockPayload,
    max_segment_size: u32,
) -> (TempDir, BlockFile) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = BlockFileConfig::new().max_segment_size(max_segment_size);
    let blockfile =
        BlockFile::open_with_config(dir.path(), config).expect("Failed to open block file");
    for number in 0..blocks {
        payload.append_to(&blockfile, number);
    }
    (dir, blockfile)
}
