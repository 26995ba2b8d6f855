//! Property-based test generators using proptest.
//!
//! Strategies for block payloads and for sequences of block file
//! operations that can be replayed against a simple in-memory model.

use crate::fixtures::BlockData;
use hubstore_blockfile::TableKind;
use proptest::prelude::*;

/// Strategy for one column payload of at most `max_len` bytes.
pub fn payload_strategy(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Strategy for a 32-byte block hash.
pub fn hash_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 32)
}

/// Strategy for a whole block with small columns.
pub fn block_strategy() -> impl Strategy<Value = BlockData> {
    (
        hash_strategy(),
        payload_strategy(96),
        payload_strategy(48),
        payload_strategy(64),
        payload_strategy(16),
    )
        .prop_map(
            |(hash, body, receipts, transactions, interchain_metas)| BlockData {
                hash,
                body,
                receipts,
                transactions,
                interchain_metas,
            },
        )
}

/// Strategy for a segment cap small enough to force frequent rotation.
pub fn segment_size_strategy() -> impl Strategy<Value = u32> {
    16u32..512
}

/// Strategy for a table kind.
pub fn table_kind_strategy() -> impl Strategy<Value = TableKind> {
    prop::sample::select(TableKind::ALL.to_vec())
}

/// One step applied to a block file.
#[derive(Debug, Clone)]
pub enum BlockOp {
    /// Append the next block.
    Append(BlockData),
    /// Truncate to the given fraction of the current rows.
    Truncate(prop::sample::Index),
    /// Close and reopen.
    Reopen,
}

/// Strategy for a single operation, weighted toward appends.
pub fn block_op_strategy() -> impl Strategy<Value = BlockOp> {
    prop_oneof![
        6 => block_strategy().prop_map(BlockOp::Append),
        1 => any::<prop::sample::Index>().prop_map(BlockOp::Truncate),
        1 => Just(BlockOp::Reopen),
    ]
}

/// Strategy for a sequence of operations.
pub fn block_op_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<BlockOp>> {
    prop::collection::vec(block_op_strategy(), 1..=max_len)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 128,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// A configuration for quick tests. Every case touches the filesystem.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 24,
            max_shrink_iters: 100,
        }
    }

    /// A configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
