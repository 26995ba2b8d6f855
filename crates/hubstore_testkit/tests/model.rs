//! Property tests replaying random operation sequences against a model.

use hubstore_blockfile::{BlockFileError, TableKind};
use hubstore_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn blockfile_matches_model(
        cap in segment_size_strategy(),
        ops in block_op_sequence_strategy(40),
    ) {
        let mut test = TestBlockFile::with_segment_size(cap);
        let mut model: Vec<BlockData> = Vec::new();

        for op in ops {
            match op {
                BlockOp::Append(block) => {
                    let number = model.len() as u64;
                    block.append_to(&test, number).unwrap();
                    model.push(block);
                }
                BlockOp::Truncate(cut) => {
                    let keep = if model.is_empty() { 0 } else { cut.index(model.len() + 1) };
                    test.truncate_blocks(keep as u64).unwrap();
                    model.truncate(keep);
                }
                BlockOp::Reopen => test = test.reopen(),
            }
            prop_assert_eq!(test.blocks().unwrap(), model.len() as u64);
        }

        for (n, block) in model.iter().enumerate() {
            prop_assert!(block.is_stored(&test, n as u64 + 1).unwrap());
        }
        let past = model.len() as u64 + 1;
        prop_assert!(test.get(TableKind::Bodies, past).unwrap_err().is_out_of_bounds());
        prop_assert!(test.get(TableKind::Bodies, 0).unwrap_err().is_out_of_bounds());
    }

    #[test]
    fn table_rejects_out_of_sequence_items(
        payloads in prop::collection::vec(payload_strategy(40), 1..20),
        skip in 1u64..5,
    ) {
        let test = TestTable::new("bodies", 64);
        for (item, payload) in payloads.iter().enumerate() {
            test.append(item as u64, payload).unwrap();
        }
        let items = payloads.len() as u64;

        let ahead = test.append(items + skip, b"x");
        let is_sequence_error = matches!(ahead, Err(BlockFileError::Sequence { .. }));
        prop_assert!(is_sequence_error);
        let behind = test.append(items - 1, b"x");
        let is_sequence_error = matches!(behind, Err(BlockFileError::Sequence { .. }));
        prop_assert!(is_sequence_error);
        prop_assert!(test.retrieve(items).unwrap_err().is_out_of_bounds());
        prop_assert_eq!(test.items(), items);
    }

    #[test]
    fn no_item_spans_segments(
        cap in segment_size_strategy(),
        payloads in prop::collection::vec(payload_strategy(64), 1..40),
    ) {
        let test = TestTable::new("transactions", cap);
        for (item, payload) in payloads.iter().enumerate() {
            test.append(item as u64, payload).unwrap();
            prop_assert!(test.head_bytes() as usize >= payload.len());
        }
        let test = test.reopen().unwrap();
        for (item, payload) in payloads.iter().enumerate() {
            let got = test.retrieve(item as u64).unwrap();
            prop_assert_eq!(got.as_ref(), payload.as_slice());
        }
    }
}
