//! Operation-level tests for the disk store

use crate::config::{DiskStoreConfig, DiskStoreConfigBuilder};
use crate::errors::CacheError;
use crate::paths;
use crate::store::{DiskStore, Ttl};
use crate::value::Value;
use indexmap::IndexMap;
use std::time::Duration;
use tempfile::TempDir;

fn store_at(dir: &TempDir) -> DiskStore {
    DiskStore::new(DiskStoreConfig {
        path: dir.path().to_path_buf(),
        ..DiskStoreConfig::default()
    })
    .unwrap()
}

fn store_with(dir: &TempDir, configure: impl FnOnce(DiskStoreConfigBuilder) -> DiskStoreConfigBuilder) -> DiskStore {
    let builder = DiskStoreConfigBuilder::new().with_path(dir.path());
    DiskStore::new(configure(builder).build()).unwrap()
}

#[tokio::test]
async fn set_then_get_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    let value = Value::Object(IndexMap::from([
        ("name".to_string(), Value::from("disk store")),
        ("count".to_string(), Value::Int(42)),
        ("tags".to_string(), Value::Array(vec![Value::from("a"), Value::from("b")])),
    ]));
    store.set("config", value.clone(), None).await.unwrap();
    assert_eq!(store.get("config").await.unwrap(), Some(value));
}

#[tokio::test]
async fn get_missing_key_is_a_miss() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);
    assert_eq!(store.get("never set").await.unwrap(), None);
}

#[tokio::test]
async fn overwrites_are_last_writer_wins() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store.set("key", Value::from("first"), None).await.unwrap();
    store.set("key", Value::from("second"), None).await.unwrap();
    assert_eq!(store.get("key").await.unwrap(), Some(Value::from("second")));
}

#[tokio::test]
async fn zero_ttl_expires_immediately() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .set("gone", Value::from("x"), Some(Duration::ZERO))
        .await
        .unwrap();
    assert_eq!(store.get("gone").await.unwrap(), None);
}

#[tokio::test]
async fn default_ttl_from_config_applies() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, |b| b.with_ttl(Duration::from_millis(80)));

    store.set("short lived", Value::Int(1), None).await.unwrap();
    assert_eq!(store.get("short lived").await.unwrap(), Some(Value::Int(1)));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.get("short lived").await.unwrap(), None);
}

#[tokio::test]
async fn max_duration_ttl_never_expires() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, |b| b.with_ttl(Duration::from_millis(80)));

    store
        .set("pinned", Value::Int(7), Some(Duration::MAX))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.get("pinned").await.unwrap(), Some(Value::Int(7)));
    assert_eq!(store.ttl("pinned").await.unwrap(), Ttl::Forever);
}

#[tokio::test]
async fn ttl_reports_remaining_time() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .set("timed", Value::Int(1), Some(Duration::from_secs(60)))
        .await
        .unwrap();
    let Ttl::Remaining(remaining) = store.ttl("timed").await.unwrap() else {
        panic!("expected a finite remaining ttl");
    };
    assert!(remaining <= Duration::from_secs(60));
    assert!(remaining > Duration::from_secs(55));

    store.set("forever", Value::Int(2), None).await.unwrap();
    assert_eq!(store.ttl("forever").await.unwrap(), Ttl::Forever);

    assert_eq!(store.ttl("absent").await.unwrap(), Ttl::Missing);
}

#[tokio::test]
async fn expired_entries_are_lazily_deleted() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .set("stale", Value::from("x"), Some(Duration::ZERO))
        .await
        .unwrap();
    let document = paths::document_path(&store.entry_base("stale"), false);
    assert!(document.exists());

    assert_eq!(store.get("stale").await.unwrap(), None);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!document.exists());
}

#[tokio::test]
async fn hash_collisions_miss_without_deleting() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, |b| b.with_subdirs(false));

    store.set("alpha", Value::from("alpha value"), None).await.unwrap();

    // force a collision: beta's slot holds a document whose stored key is
    // still "alpha"
    let alpha_document = paths::document_path(&store.entry_base("alpha"), false);
    let beta_document = paths::document_path(&store.entry_base("beta"), false);
    std::fs::copy(&alpha_document, &beta_document).unwrap();

    assert_eq!(store.get("beta").await.unwrap(), None);
    assert!(beta_document.exists());
    assert_eq!(
        store.get("alpha").await.unwrap(),
        Some(Value::from("alpha value"))
    );
}

#[tokio::test]
async fn deleting_missing_keys_is_a_noop() {
    let temp_dir = TempDir::new().unwrap();
    let sharded = store_at(&temp_dir);
    sharded.del("never set").await.unwrap();

    let flat_dir = TempDir::new().unwrap();
    let flat = store_with(&flat_dir, |b| b.with_subdirs(false));
    flat.del("never set").await.unwrap();
}

#[tokio::test]
async fn delete_removes_document_and_blobs() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, |b| b.with_subdirs(false));

    let value = Value::Array(vec![
        Value::Bytes(vec![1u8; 4096]),
        Value::Bytes(vec![2u8; 4096]),
    ]);
    store.set("blobby", value, None).await.unwrap();

    let base = store.entry_base("blobby");
    assert!(paths::document_path(&base, false).exists());
    assert!(paths::blob_path(&base, 0, false).exists());
    assert!(paths::blob_path(&base, 1, false).exists());

    store.del("blobby").await.unwrap();
    assert!(!paths::document_path(&base, false).exists());
    assert!(!paths::blob_path(&base, 0, false).exists());
    assert!(!paths::blob_path(&base, 1, false).exists());
    assert_eq!(store.get("blobby").await.unwrap(), None);
}

#[tokio::test]
async fn large_values_write_external_blobs() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    let payload = vec![0xabu8; 10_000];
    store
        .set("big", Value::Bytes(payload.clone()), None)
        .await
        .unwrap();
    assert!(paths::blob_path(&store.entry_base("big"), 0, false).exists());
    assert_eq!(
        store.get("big").await.unwrap(),
        Some(Value::Bytes(payload))
    );
}

#[tokio::test]
async fn bulk_operations_fan_out() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .mset(
            vec![
                ("k1".to_string(), Value::from("v1")),
                ("k2".to_string(), Value::from("v2")),
            ],
            None,
        )
        .await
        .unwrap();
    assert_eq!(
        store.mget(&["k1", "k2", "k3"]).await.unwrap(),
        vec![Some(Value::from("v1")), Some(Value::from("v2")), None]
    );

    store.set("k3", Value::from("v3"), None).await.unwrap();
    store.mdel(&["k1", "k2"]).await.unwrap();
    assert_eq!(
        store.mget(&["k1", "k2", "k3"]).await.unwrap(),
        vec![None, None, Some(Value::from("v3"))]
    );
}

#[tokio::test]
async fn mset_applies_the_shared_ttl() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .mset(
            vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Int(2)),
            ],
            Some(Duration::from_millis(80)),
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(store.mget(&["a", "b"]).await.unwrap(), vec![None, None]);
}

#[tokio::test]
async fn reset_removes_only_cache_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store.set("one", Value::from("1"), None).await.unwrap();
    store
        .set("two", Value::Bytes(vec![5u8; 8192]), None)
        .await
        .unwrap();

    // unrelated content sharing the root must survive a reset
    let foreign_file = temp_dir.path().join("notes.json");
    std::fs::write(&foreign_file, b"{}").unwrap();
    let foreign_dir = temp_dir.path().join("backups");
    std::fs::create_dir(&foreign_dir).unwrap();
    std::fs::write(foreign_dir.join("dump.bin"), b"data").unwrap();

    store.reset().await.unwrap();

    assert!(temp_dir.path().exists());
    assert!(foreign_file.exists());
    assert!(foreign_dir.join("dump.bin").exists());
    for entry in std::fs::read_dir(temp_dir.path()).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(
            !name.to_string_lossy().starts_with(paths::FILE_PREFIX),
            "reset left {name:?} behind"
        );
    }
    assert_eq!(store.get("one").await.unwrap(), None);
    assert_eq!(store.get("two").await.unwrap(), None);
}

#[tokio::test]
async fn size_reflects_cache_files() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);
    assert_eq!(store.size().await.unwrap(), 0);

    store
        .set("payload", Value::Bytes(vec![1u8; 4096]), None)
        .await
        .unwrap();
    let size = store.size().await.unwrap();
    assert!(size >= 4096, "size {size} should cover the blob");

    store.reset().await.unwrap();
    assert_eq!(store.size().await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_instances_agree_on_one_value() {
    let temp_dir = TempDir::new().unwrap();
    let written: Vec<Value> = (0..4).map(|i| Value::from(format!("value-{i}"))).collect();

    let stores: Vec<DiskStore> = (0..4).map(|_| store_at(&temp_dir)).collect();
    futures::future::try_join_all(stores.iter().zip(written.iter()).map(|(store, value)| {
        let store = store.clone();
        let value = value.clone();
        async move { store.set("shared", value, None).await }
    }))
    .await
    .unwrap();

    let observed = futures::future::try_join_all(
        stores.iter().map(|store| store.get("shared")),
    )
    .await
    .unwrap();

    let first = observed[0].clone().expect("no value survived the race");
    assert!(written.contains(&first), "observed a value nobody wrote");
    for value in observed {
        assert_eq!(value.as_ref(), Some(&first));
    }
}

#[tokio::test]
async fn keys_is_unsupported() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);
    assert!(matches!(
        store.keys().await,
        Err(CacheError::UnsupportedOperation { operation: "keys", .. })
    ));
}

#[tokio::test]
async fn zip_store_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(&temp_dir, |b| b.with_zip(true));

    let value = Value::Object(IndexMap::from([
        ("blob".to_string(), Value::Bytes(vec![9u8; 6000])),
        ("text".to_string(), Value::from("compressed värde")),
    ]));
    store.set("zipped", value.clone(), None).await.unwrap();

    let base = store.entry_base("zipped");
    assert!(paths::document_path(&base, true).exists());
    assert!(paths::blob_path(&base, 0, true).exists());
    assert_eq!(store.get("zipped").await.unwrap(), Some(value));

    store.del("zipped").await.unwrap();
    assert_eq!(store.get("zipped").await.unwrap(), None);
}

#[tokio::test]
async fn corrupt_documents_error_instead_of_missing() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store.set("entry", Value::Int(1), None).await.unwrap();
    let document = paths::document_path(&store.entry_base("entry"), false);
    std::fs::write(&document, b"{ not json").unwrap();

    assert!(matches!(
        store.get("entry").await,
        Err(CacheError::Serialization { .. })
    ));
}

#[tokio::test]
async fn missing_blobs_are_corruption() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store
        .set("entry", Value::Bytes(vec![3u8; 2048]), None)
        .await
        .unwrap();
    let blob = paths::blob_path(&store.entry_base("entry"), 0, false);
    std::fs::remove_file(&blob).unwrap();

    assert!(matches!(
        store.get("entry").await,
        Err(CacheError::Corruption { .. })
    ));
}

#[tokio::test]
async fn operations_leave_no_lock_markers_behind() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_at(&temp_dir);

    store.set("key", Value::Int(1), None).await.unwrap();
    let _ = store.get("key").await.unwrap();
    let _ = store.ttl("key").await.unwrap();
    store.del("key").await.unwrap();

    assert!(!paths::lock_path(&store.entry_base("key")).exists());
}
