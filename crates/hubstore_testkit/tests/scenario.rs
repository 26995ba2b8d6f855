//! End-to-end scenarios across the block file API.

use hubstore_blockfile::{verify_dir, BlockFile, BlockFileError, TableKind};
use hubstore_testkit::prelude::*;

#[test]
fn append_get_truncate_close() {
    let dir = tempfile::tempdir().unwrap();
    let blockfile = BlockFile::open(dir.path()).unwrap();

    blockfile
        .append_block(0, b"hash0", b"body0", b"receipts0", b"txs0", b"meta0")
        .unwrap();
    assert_eq!(blockfile.blocks().unwrap(), 1);
    assert_eq!(
        blockfile.get_by_name("hashes", 1).unwrap().as_ref(),
        b"hash0"
    );

    blockfile
        .append_block(1, b"hash1", b"body1", b"receipts1", b"txs1", b"meta1")
        .unwrap();
    assert_eq!(blockfile.blocks().unwrap(), 2);
    assert_eq!(
        blockfile.get(TableKind::Interchain, 2).unwrap().as_ref(),
        b"meta1"
    );

    blockfile.truncate_blocks(1).unwrap();
    assert_eq!(blockfile.blocks().unwrap(), 1);
    assert!(matches!(
        blockfile.get_by_name("hashes", 2),
        Err(BlockFileError::OutOfBounds { .. })
    ));

    blockfile.close().unwrap();
    assert!(blockfile.blocks().unwrap_err().is_closed());
    assert!(blockfile.get(TableKind::Hashes, 1).unwrap_err().is_closed());
    assert!(blockfile
        .append_block(1, b"h", b"b", b"r", b"t", b"m")
        .unwrap_err()
        .is_closed());
    assert!(blockfile.truncate_blocks(0).unwrap_err().is_closed());
    blockfile.close().unwrap();
}

#[test]
fn many_blocks_across_rotations() {
    let test = scenarios::populated_blockfile(150, 200);
    let stats = test.stats().unwrap();
    assert!(stats.iter().all(|s| s.items == 150));
    assert!(stats.iter().any(|s| s.head_id > 0));

    let test = test.reopen();
    for n in 0..150 {
        assert!(sample_block(n).is_stored(&test, n + 1).unwrap(), "block {n}");
    }

    test.truncate_blocks(37).unwrap();
    let test = test.reopen();
    assert_eq!(test.blocks().unwrap(), 37);
    sample_block(37).append_to(&test, 37).unwrap();
    assert!(sample_block(37).is_stored(&test, 38).unwrap());
}

#[test]
fn truncate_to_zero_and_rebuild() {
    let test = scenarios::populated_blockfile(20, 64);
    test.truncate_blocks(0).unwrap();
    assert_eq!(test.blocks().unwrap(), 0);
    assert!(test.get(TableKind::Hashes, 1).unwrap_err().is_out_of_bounds());

    for n in 0..5 {
        sample_block(n + 100).append_to(&test, n).unwrap();
    }
    let test = test.reopen();
    assert_eq!(test.blocks().unwrap(), 5);
    assert!(sample_block(104).is_stored(&test, 5).unwrap());
}

#[test]
fn closed_directory_verifies() {
    let (dir, _) = scenarios::populated_blockfile(40, 128).into_dir();
    let report = verify_dir(dir.path()).unwrap();
    assert!(report.is_ok(), "{report:?}");
    assert!(report.tables.iter().all(|t| t.items == 40));
}

#[test]
fn lock_released_by_close() {
    let test = TestBlockFile::new();
    assert!(matches!(
        BlockFile::open(test.path()),
        Err(BlockFileError::Locked { .. })
    ));

    let (dir, config) = test.into_dir();
    let test = TestBlockFile::from_dir(dir, config).unwrap();
    assert_eq!(test.blocks().unwrap(), 0);
}
