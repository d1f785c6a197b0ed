use std::time::Duration;

use shared_types::Timestamp;
use tempfile::TempDir;

use super::*;
use crate::ports::{ServingStore, TransientStore};
use crate::testing::make_record;

fn serving(dir: &TempDir) -> RocksDbServingStore {
    RocksDbServingStore::open(RocksDbConfig::for_testing(dir.path().join("serving"))).unwrap()
}

fn transient(dir: &TempDir) -> RocksDbTransientStore {
    RocksDbTransientStore::open(RocksDbConfig::for_testing(dir.path().join("transient"))).unwrap()
}

#[test]
fn test_transient_commit_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = transient(&dir);
        store.append(&make_record(1, 1, 100)).unwrap();
        store.append(&make_record(2, 2, 100)).unwrap();
        store.begin_extraction().unwrap().rollback();
    }

    let store = transient(&dir);
    assert_eq!(store.pending_count().unwrap(), 2);

    store.append(&make_record(3, 3, 100)).unwrap();
    let extraction = store.begin_extraction().unwrap();
    let ids: Vec<u8> = extraction.records().iter().map(|r| r.node_id.0[0]).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    extraction.commit().unwrap();

    assert_eq!(store.pending_count().unwrap(), 0);
}

#[test]
fn test_transient_contention() {
    let dir = TempDir::new().unwrap();
    let store = transient(&dir);

    let open = store.begin_extraction().unwrap();
    assert!(store.begin_extraction().err().unwrap().is_transient());
    drop(open);
    assert!(store.begin_extraction().is_ok());
}

#[test]
fn test_corrupted_entry_is_skipped_and_removed() {
    let dir = TempDir::new().unwrap();
    let store = transient(&dir);
    store.append(&make_record(1, 1, 100)).unwrap();
    store.put_raw(1_000, b"\xffnot a record");
    store.append(&make_record(3, 3, 100)).unwrap();
    assert_eq!(store.pending_count().unwrap(), 3);

    let extraction = store.begin_extraction().unwrap();
    let ids: Vec<u8> = extraction.records().iter().map(|r| r.node_id.0[0]).collect();
    assert_eq!(ids, vec![1, 3]);
    extraction.commit().unwrap();

    assert_eq!(store.pending_count().unwrap(), 0);
}

#[test]
fn test_batch_of_only_corrupted_entries_is_cleared() {
    let dir = TempDir::new().unwrap();
    let store = transient(&dir);
    store.put_raw(7, b"");
    store.put_raw(8, &[0u8; 3]);

    let extraction = store.begin_extraction().unwrap();
    assert!(extraction.records().is_empty());
    extraction.commit().unwrap();

    assert_eq!(store.pending_count().unwrap(), 0);
}

#[test]
fn test_serving_upsert_moves_index_entry() {
    let dir = TempDir::new().unwrap();
    let store = serving(&dir);
    let old = make_record(1, 1, 1_000);
    let refreshed = make_record(1, 1, 9_000);

    store.upsert_batch(&[old.clone()]).unwrap();
    store.upsert_batch(&[refreshed.clone()]).unwrap();

    // A stale index entry at 1_000 would evict the refreshed record.
    let removed = store
        .delete_older_than(Duration::from_secs(1_000), Timestamp::new(5_000))
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(store.len().unwrap(), 1);
    assert_eq!(store.get(&old.node_id).unwrap().unwrap().last_seen, refreshed.last_seen);
}

#[test]
fn test_serving_eviction_boundary() {
    let dir = TempDir::new().unwrap();
    let store = serving(&dir);
    let now = Timestamp::new(100_000);
    let retention = Duration::from_secs(600);

    let stale = make_record(1, 1, 100_000 - 601);
    let edge = make_record(2, 2, 100_000 - 600);
    let fresh = make_record(3, 3, 100_000 - 599);
    store.upsert_batch(&[stale.clone(), edge.clone(), fresh.clone()]).unwrap();

    assert_eq!(store.delete_older_than(retention, now).unwrap(), 1);
    assert!(store.get(&stale.node_id).unwrap().is_none());
    assert!(store.get(&edge.node_id).unwrap().is_some());
    assert!(store.get(&fresh.node_id).unwrap().is_some());
}

#[test]
fn test_serving_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let record = make_record(7, 7, 1_234);
    {
        let store = serving(&dir);
        store.upsert_batch(&[record.clone()]).unwrap();
    }

    let store = serving(&dir);
    assert_eq!(store.all().unwrap(), vec![record]);
}
