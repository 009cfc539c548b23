//! Tests for the Store implementations

use std::sync::Arc;

use httpkv::{BucketStore, Engine, KvError, Store, BUCKET_NAME};
use tempfile::TempDir;

use super::{get, open_engine};

#[test]
fn test_bucket_store_uses_main_bucket() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(temp.path()));
    let store = BucketStore::open(Arc::clone(&engine)).unwrap();

    store.write(b"foo", b"bar").unwrap();

    assert_eq!(get(&engine, BUCKET_NAME, b"foo"), Some(b"bar".to_vec()));
    assert_eq!(store.read(b"foo").unwrap(), Some(b"bar".to_vec()));
    assert_eq!(store.read(b"nope").unwrap(), None);
}

#[test]
fn test_bucket_store_reopen_keeps_data() {
    let temp = TempDir::new().unwrap();

    {
        let engine = Arc::new(open_engine(temp.path()));
        let store = BucketStore::open(Arc::clone(&engine)).unwrap();
        store.write(b"k", b"v").unwrap();
        engine.close().unwrap();
    }

    let engine = Arc::new(Engine::open_path(temp.path()).unwrap());
    let store = BucketStore::open(engine).unwrap();
    assert_eq!(store.read(b"k").unwrap(), Some(b"v".to_vec()));
}

#[test]
fn test_bucket_store_after_close() {
    let temp = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(temp.path()));
    let store = BucketStore::open(Arc::clone(&engine)).unwrap();

    engine.close().unwrap();

    assert!(matches!(store.write(b"k", b"v"), Err(KvError::Closed)));
    assert!(matches!(store.read(b"k"), Err(KvError::Closed)));
}
