//! Integration test: filesystem-backed store survives reopen

use solvault_store::{keys, AutoLock, Batch, Store};
use tempfile::TempDir;

#[tokio::test]
async fn values_persist_across_reopen() {
    let tmp = TempDir::new().unwrap();

    {
        let store = Store::open_fs(tmp.path()).await.unwrap();
        store.put(keys::AUTH, b"{\"hash\":\"00\"}".to_vec()).await.unwrap();
        store.set_auto_lock(AutoLock::try_from(60).unwrap()).await.unwrap();
    }

    let store = Store::open_fs(tmp.path()).await.unwrap();
    assert_eq!(
        store.get(keys::AUTH).await.unwrap(),
        Some(b"{\"hash\":\"00\"}".to_vec())
    );
    assert_eq!(store.auto_lock().await.unwrap().minutes(), 60);
}

#[tokio::test]
async fn batch_commit_on_disk() {
    let tmp = TempDir::new().unwrap();
    let store = Store::open_fs(tmp.path()).await.unwrap();

    let batch = Batch::new()
        .put(keys::WALLETS, b"blob")
        .put(keys::ENCRYPTED, b"true")
        .put_json(keys::AUTO_LOCK, &5u32)
        .unwrap();
    store.commit(batch).await.unwrap();

    assert!(tmp.path().join(keys::WALLETS).exists());
    assert!(!tmp.path().join(keys::JOURNAL).exists());
    assert_eq!(store.get(keys::ENCRYPTED).await.unwrap(), Some(b"true".to_vec()));
}
