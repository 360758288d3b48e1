//! Integration tests for the feed store.

use logpull_core::{
    CoreError, DescriptorRecord, ErrorKind, FeedStore, StoreConfig,
};
use proptest::prelude::*;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

const HELLO_SHA256: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

fn record(n: usize) -> DescriptorRecord {
    DescriptorRecord::new(format!("/data/{n}.log"), "0".repeat(64))
}

fn fast_config() -> StoreConfig {
    StoreConfig::new().sync_on_commit(false)
}

#[test]
fn append_file_records_checksum_of_content() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("hello.txt");
    fs::write(&file, b"hello").unwrap();

    let store = FeedStore::open(&dir.path().join("store"), fast_config()).unwrap();
    let descriptor = store
        .append_file_to_feed("nightly", file.to_str().unwrap())
        .unwrap();

    assert_eq!(descriptor.id, 1);
    assert_eq!(descriptor.sha256, HELLO_SHA256);
    assert_eq!(descriptor.file_name(), "hello.txt");
    assert_eq!(store.get_by_id("nightly", 1).unwrap(), descriptor);
}

#[test]
fn relative_path_is_rejected_without_a_record() {
    let store = FeedStore::in_memory().unwrap();
    store.append_record("f", record(1)).unwrap();
    let before = store.read_feed("f", 0).unwrap();

    let err = store
        .append_file_to_feed("f", "relative/path")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    assert_eq!(store.read_feed("f", 0).unwrap(), before);
    assert!(store.read_feed("never", 0).unwrap().files.is_empty());
}

#[test]
fn unreadable_file_is_io_error_without_a_record() {
    let dir = tempdir().unwrap();
    let store = FeedStore::in_memory().unwrap();
    let missing = dir.path().join("absent.bin");

    let err = store
        .append_file_to_feed("f", missing.to_str().unwrap())
        .unwrap_err();
    assert!(matches!(err, CoreError::Io(_)));
    assert_eq!(store.high_water_mark("f").unwrap(), 0);
}

#[test]
fn cursor_walk_reaches_an_empty_page() {
    let store = FeedStore::in_memory().unwrap();
    for n in 1..=5 {
        store.append_record("f", record(n)).unwrap();
    }

    let first = store.read_feed("f", 0).unwrap();
    assert_eq!(first.files.len(), 5);
    assert_eq!(first.next, 6);

    let second = store.read_feed("f", first.next).unwrap();
    assert!(second.files.is_empty());
    assert_eq!(second.next, first.next);

    store.append_record("f", record(6)).unwrap();
    let third = store.read_feed("f", first.next).unwrap();
    assert_eq!(third.files.len(), 1);
    assert_eq!(third.files[0].id, 6);
    assert_eq!(third.next, 7);
}

#[test]
fn feeds_survive_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store");

    {
        let store = FeedStore::open(&path, StoreConfig::default()).unwrap();
        for n in 1..=3 {
            store.append_record("a", record(n)).unwrap();
        }
        store.append_record("b", record(9)).unwrap();
        store.close();
    }

    let store = FeedStore::open(&path, StoreConfig::default()).unwrap();
    let page = store.read_feed("a", 2).unwrap();
    assert_eq!(page.files.iter().map(|d| d.id).collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(page.next, 4);
    assert_eq!(page.files[1].file_path, "/data/3.log");

    assert_eq!(store.append_record("a", record(4)).unwrap().id, 4);
    assert_eq!(store.feeds().unwrap().len(), 2);
}

#[test]
fn second_open_of_a_directory_is_locked_out() {
    let dir = tempdir().unwrap();
    let _store = FeedStore::open(dir.path(), fast_config()).unwrap();
    assert!(matches!(
        FeedStore::open(dir.path(), fast_config()),
        Err(CoreError::StoreLocked)
    ));
}

#[test]
fn missing_directory_without_create_fails() {
    let dir = tempdir().unwrap();
    let config = StoreConfig::new().create_if_missing(false);
    assert!(FeedStore::open(&dir.path().join("nope"), config).is_err());
}

#[test]
fn concurrent_appends_get_contiguous_ids() {
    let dir = tempdir().unwrap();
    let store = Arc::new(FeedStore::open(dir.path(), fast_config()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                (0..20)
                    .map(|n| store.append_record("shared", record(t * 100 + n)).unwrap().id)
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=160).collect::<Vec<u64>>());

    let page = store.read_feed("shared", 0).unwrap();
    assert_eq!(page.files.len(), 160);
    assert_eq!(page.next, 161);
    assert!(page.files.windows(2).all(|w| w[0].id + 1 == w[1].id));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn kth_append_gets_id_k(count in 0usize..40) {
        let store = FeedStore::in_memory().unwrap();
        for k in 1..=count {
            let descriptor = store.append_record("p", record(k)).unwrap();
            prop_assert_eq!(descriptor.id, k as u64);
        }
        prop_assert_eq!(store.read_feed("p", 0).unwrap().next, count as u64 + 1);
    }

    #[test]
    fn reads_are_idempotent_and_bounded_below(count in 0usize..30, since in 0u64..40) {
        let store = FeedStore::in_memory().unwrap();
        for k in 1..=count {
            store.append_record("p", record(k)).unwrap();
        }

        let first = store.read_feed("p", since).unwrap();
        let second = store.read_feed("p", since).unwrap();
        prop_assert_eq!(&first, &second);

        let expected: Vec<u64> = (since.max(1)..=count as u64).collect();
        let ids: Vec<u64> = first.files.iter().map(|d| d.id).collect();
        prop_assert_eq!(ids, expected);
        prop_assert_eq!(first.next, count as u64 + 1);
    }
}
