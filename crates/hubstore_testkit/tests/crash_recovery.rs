//! Recovery from crash-shaped files on disk.

use hubstore_blockfile::{segment_file_name, verify_dir, Table, TableKind};
use hubstore_testkit::crash::{
    append_dangling_index_entry, append_partial_block, grow_segment, set_segment_len,
    CrashPoint, CrashRecoveryHarness,
};
use hubstore_testkit::prelude::*;
use std::fs;

#[test]
fn dangling_index_entry_is_dropped() {
    let test = TestTable::new("bodies", 1_000);
    for item in 0..5 {
        test.append(item, &chunk(10, item as u8)).unwrap();
    }
    append_dangling_index_entry(test.path(), "bodies", 10).unwrap();

    let test = test.reopen().unwrap();
    assert_eq!(test.items(), 5);
    assert_eq!(test.head_bytes(), 50);
    assert_eq!(test.retrieve(4).unwrap().as_ref(), chunk(10, 4));
}

#[test]
fn segment_longer_than_index_is_cut() {
    let test = TestTable::new("receipts", 1_000);
    for item in 0..3 {
        test.append(item, &chunk(7, 1)).unwrap();
    }
    grow_segment(test.path(), "receipts", 0, &[0xAB; 40]).unwrap();

    let test = test.reopen().unwrap();
    assert_eq!(test.items(), 3);
    assert_eq!(test.head_bytes(), 21);
    let len = fs::metadata(test.path().join(segment_file_name("receipts", 0)))
        .unwrap()
        .len();
    assert_eq!(len, 21);
}

#[test]
fn emptied_head_steps_back_a_segment() {
    let test = TestTable::new("hashes", 32);
    for item in 0..6 {
        test.append(item, &chunk(15, item as u8)).unwrap();
    }
    // Two items per segment: 0000, 0001, 0002.
    assert_eq!(test.head_id(), 2);
    set_segment_len(test.path(), "hashes", 2, 0).unwrap();

    let test = test.reopen().unwrap();
    assert_eq!(test.items(), 4);
    assert_eq!(test.head_id(), 1);
    assert_eq!(test.head_bytes(), 30);
    assert_eq!(test.retrieve(3).unwrap().as_ref(), chunk(15, 3));

    test.append(4, &chunk(15, 9)).unwrap();
    assert_eq!(test.retrieve(4).unwrap().as_ref(), chunk(15, 9));
}

#[test]
fn partial_block_is_rolled_back_on_open() {
    let (dir, config) = scenarios::populated_blockfile(6, 64).into_dir();
    append_partial_block(dir.path(), config.max_segment_size, 3).unwrap();
    assert!(!verify_dir(dir.path()).unwrap().is_ok());

    let test = TestBlockFile::from_dir(dir, config).unwrap();
    assert_eq!(test.blocks().unwrap(), 6);
    for stats in test.stats().unwrap() {
        assert_eq!(stats.items, 6, "{}", stats.name);
    }
    sample_block(6).append_to(&test, 6).unwrap();
    assert!(sample_block(6).is_stored(&test, 7).unwrap());
}

#[test]
fn single_table_ahead_by_many_rows() {
    let (dir, config) = scenarios::populated_blockfile(4, 64).into_dir();
    let table = Table::open(dir.path(), TableKind::Transactions.name(), 64).unwrap();
    for item in 4..10 {
        table.append(item, &chunk(9, 0)).unwrap();
    }
    table.close().unwrap();

    let test = TestBlockFile::from_dir(dir, config).unwrap();
    assert_eq!(test.blocks().unwrap(), 4);
    assert!(test.get(TableKind::Transactions, 5).unwrap_err().is_out_of_bounds());
}

#[test]
fn every_crash_point_recovers() {
    let mut harness = CrashRecoveryHarness::new().unwrap();
    harness.run_all();
    assert!(harness.all_passed(), "{}", harness.summary());
}

#[test]
fn torn_index_with_large_segments() {
    let config = hubstore_blockfile::BlockFileConfig::new().max_segment_size(1 << 20);
    let mut harness = CrashRecoveryHarness::with_config(config).unwrap();
    for kind in TableKind::ALL {
        let result = harness.run(CrashPoint::TornIndexEntry, kind);
        assert!(result.passed, "{result:?}");
        assert_eq!(result.actual_blocks, CrashRecoveryHarness::BLOCKS);
    }
}
