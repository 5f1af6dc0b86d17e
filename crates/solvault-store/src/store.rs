use std::path::Path;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use opendal::Operator;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use solvault_core::{VaultError, VaultResult};

use crate::keys;

/// Key/value facade over an OpenDAL operator.
///
/// Reads go straight to the operator. Every write, delete, and batch commit
/// holds `writer` so at most one mutation is in flight.
pub struct Store {
    op: Operator,
    writer: Mutex<()>,
}

/// A set of puts and deletes applied together by [`Store::commit`].
#[derive(Default)]
pub struct Batch {
    entries: Vec<JournalEntry>,
}

/// Pre-images of the keys a commit is about to touch.
#[derive(Serialize, Deserialize)]
struct Journal {
    undo: Vec<JournalEntry>,
}

#[derive(Serialize, Deserialize)]
struct JournalEntry {
    key: String,
    /// base64 value; `None` deletes the key
    value: Option<String>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(mut self, key: &str, value: impl AsRef<[u8]>) -> Self {
        self.entries.push(JournalEntry {
            key: key.to_string(),
            value: Some(B64.encode(value.as_ref())),
        });
        self
    }

    pub fn put_json<T: Serialize>(self, key: &str, value: &T) -> VaultResult<Self> {
        let bytes = serde_json::to_vec(value).with_context(|| format!("serializing {key}"))?;
        Ok(self.put(key, bytes))
    }

    pub fn delete(mut self, key: &str) -> Self {
        self.entries.push(JournalEntry {
            key: key.to_string(),
            value: None,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store {
    /// Wrap an operator and replay any journal left by an interrupted commit.
    pub async fn open(op: Operator) -> VaultResult<Self> {
        let store = Self {
            op,
            writer: Mutex::new(()),
        };
        store.recover().await?;
        Ok(store)
    }

    /// Filesystem-backed store rooted at `dir`.
    ///
    /// Writes land in a temp dir first and are renamed into place.
    pub async fn open_fs(dir: &Path) -> VaultResult<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating data dir: {}", dir.display()))?;
        let tmp = dir.join(".tmp");
        std::fs::create_dir_all(&tmp)
            .with_context(|| format!("creating temp dir: {}", tmp.display()))?;

        let builder = opendal::services::Fs::default()
            .root(&dir.to_string_lossy())
            .atomic_write_dir(&tmp.to_string_lossy());
        let op = Operator::new(builder)
            .context("creating OpenDAL fs operator")?
            .finish();
        Self::open(op).await
    }

    /// In-memory store (tests, ephemeral sessions).
    pub async fn memory() -> VaultResult<Self> {
        let op = Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish();
        Self::open(op).await
    }

    pub async fn get(&self, key: &str) -> VaultResult<Option<Vec<u8>>> {
        match self.op.read(key).await {
            Ok(buf) => Ok(Some(buf.to_vec())),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_error(e, "reading", key)),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> VaultResult<Option<T>> {
        match self.get(key).await? {
            None => Ok(None),
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes)
                    .with_context(|| format!("parsing stored {key}"))
                    .map_err(|e| VaultError::Storage(format!("{e:#}")))?;
                Ok(Some(value))
            }
        }
    }

    pub async fn put(&self, key: &str, value: impl Into<Vec<u8>>) -> VaultResult<()> {
        let _guard = self.writer.lock().await;
        self.write_raw(key, value.into()).await
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> VaultResult<()> {
        let bytes = serde_json::to_vec(value).with_context(|| format!("serializing {key}"))?;
        self.put(key, bytes).await
    }

    pub async fn delete(&self, key: &str) -> VaultResult<()> {
        let _guard = self.writer.lock().await;
        self.delete_raw(key).await
    }

    /// Apply every entry of `batch` or none of them.
    ///
    /// The pre-image of every touched key goes to the journal first. If an
    /// entry fails to apply, the pre-images are restored before the error is
    /// returned. A journal that survives (crash, or a failed restore) is rolled
    /// back by the next `commit` or [`Store::open`].
    pub async fn commit(&self, batch: Batch) -> VaultResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let _guard = self.writer.lock().await;
        self.roll_back_journal().await?;

        let mut undo = Vec::with_capacity(batch.len());
        for entry in &batch.entries {
            let previous = self.get(&entry.key).await?;
            undo.push(JournalEntry {
                key: entry.key.clone(),
                value: previous.map(|bytes| B64.encode(bytes)),
            });
        }
        let journal = Journal { undo };
        let raw = serde_json::to_vec(&journal).context("serializing journal")?;
        self.write_raw(keys::JOURNAL, raw).await?;

        if let Err(e) = self.apply(&batch.entries).await {
            warn!(error = %e, entries = batch.len(), "commit failed, restoring previous values");
            match self.apply(journal.undo.iter().rev()).await {
                Ok(()) => self.delete_raw(keys::JOURNAL).await?,
                Err(undo_err) => {
                    warn!(error = %undo_err, "restore failed, journal kept for the next commit");
                }
            }
            return Err(e);
        }
        self.delete_raw(keys::JOURNAL).await?;

        debug!(entries = batch.len(), "batch committed");
        Ok(())
    }

    async fn recover(&self) -> VaultResult<()> {
        let _guard = self.writer.lock().await;
        self.roll_back_journal().await
    }

    /// Restore the pre-images of an unfinished commit. Caller holds `writer`.
    async fn roll_back_journal(&self) -> VaultResult<()> {
        let Some(raw) = self.get(keys::JOURNAL).await? else {
            return Ok(());
        };

        match serde_json::from_slice::<Journal>(&raw) {
            Ok(journal) => {
                warn!(entries = journal.undo.len(), "rolling back unfinished commit");
                self.apply(journal.undo.iter().rev()).await?;
            }
            Err(e) => {
                // A torn journal means nothing was applied yet.
                warn!(error = %e, "discarding unreadable journal");
            }
        }
        self.delete_raw(keys::JOURNAL).await
    }

    async fn apply<'a>(
        &self,
        entries: impl IntoIterator<Item = &'a JournalEntry>,
    ) -> VaultResult<()> {
        for entry in entries {
            match &entry.value {
                Some(encoded) => {
                    let bytes = B64
                        .decode(encoded)
                        .with_context(|| format!("decoding journal entry {}", entry.key))?;
                    self.write_raw(&entry.key, bytes).await?;
                }
                None => self.delete_raw(&entry.key).await?,
            }
        }
        Ok(())
    }

    async fn write_raw(&self, key: &str, value: Vec<u8>) -> VaultResult<()> {
        self.op
            .write(key, value)
            .await
            .map(|_| ())
            .map_err(|e| storage_error(e, "writing", key))
    }

    async fn delete_raw(&self, key: &str) -> VaultResult<()> {
        self.op
            .delete(key)
            .await
            .map_err(|e| storage_error(e, "deleting", key))
    }
}

fn storage_error(e: opendal::Error, action: &str, key: &str) -> VaultError {
    VaultError::Storage(format!("{action} {key}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_operator() -> Operator {
        Operator::new(opendal::services::Memory::default())
            .expect("memory operator")
            .finish()
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = Store::memory().await.unwrap();

        assert_eq!(store.get("auth").await.unwrap(), None);
        store.put("auth", b"abc".to_vec()).await.unwrap();
        assert_eq!(store.get("auth").await.unwrap(), Some(b"abc".to_vec()));

        store.delete("auth").await.unwrap();
        assert_eq!(store.get("auth").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let store = Store::memory().await.unwrap();
        store.put_json("auto_lock", &15i64).await.unwrap();
        assert_eq!(store.get_json::<i64>("auto_lock").await.unwrap(), Some(15));

        store.put("auto_lock", b"not json".to_vec()).await.unwrap();
        let err = store.get_json::<i64>("auto_lock").await.unwrap_err();
        assert!(matches!(err, VaultError::Storage(_)));
    }

    #[tokio::test]
    async fn test_commit_applies_all_and_clears_journal() {
        let store = Store::memory().await.unwrap();
        store.put("encrypted", b"false".to_vec()).await.unwrap();

        let batch = Batch::new()
            .put("auth", b"new-auth")
            .put("wallets", b"new-blob")
            .delete("encrypted");
        store.commit(batch).await.unwrap();

        assert_eq!(store.get("auth").await.unwrap(), Some(b"new-auth".to_vec()));
        assert_eq!(store.get("wallets").await.unwrap(), Some(b"new-blob".to_vec()));
        assert_eq!(store.get("encrypted").await.unwrap(), None);
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }

    fn undo_journal(previous: &[(&str, Option<&str>)]) -> Vec<u8> {
        let journal = Journal {
            undo: previous
                .iter()
                .map(|(key, value)| JournalEntry {
                    key: key.to_string(),
                    value: value.map(|v| B64.encode(v.as_bytes())),
                })
                .collect(),
        };
        serde_json::to_vec(&journal).unwrap()
    }

    #[tokio::test]
    async fn test_open_rolls_back_interrupted_commit() {
        let op = memory_operator();
        op.write("auth", b"old-auth".to_vec()).await.unwrap();
        op.write("wallets", b"old-blob".to_vec()).await.unwrap();

        // Crash after the first two entries of a three-entry batch landed.
        op.write(
            keys::JOURNAL,
            undo_journal(&[
                ("auth", Some("old-auth")),
                ("encrypted", None),
                ("wallets", Some("old-blob")),
            ]),
        )
        .await
        .unwrap();
        op.write("auth", b"new-auth".to_vec()).await.unwrap();
        op.write("encrypted", b"true".to_vec()).await.unwrap();

        let store = Store::open(op).await.unwrap();
        assert_eq!(store.get("auth").await.unwrap(), Some(b"old-auth".to_vec()));
        assert_eq!(store.get("wallets").await.unwrap(), Some(b"old-blob".to_vec()));
        assert_eq!(store.get("encrypted").await.unwrap(), None);
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_entry_restores_earlier_entries() {
        let store = Store::memory().await.unwrap();
        store.put("auth", b"old-auth".to_vec()).await.unwrap();
        store.put("wallets", b"old-blob".to_vec()).await.unwrap();

        let mut batch = Batch::new().put("auth", b"new-auth");
        batch.entries.push(JournalEntry {
            key: "wallets".into(),
            value: Some("*not base64*".into()),
        });
        assert!(store.commit(batch).await.is_err());

        assert_eq!(store.get("auth").await.unwrap(), Some(b"old-auth".to_vec()));
        assert_eq!(store.get("wallets").await.unwrap(), Some(b"old-blob".to_vec()));
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_rolls_back_leftover_journal_first() {
        let store = Store::memory().await.unwrap();
        store.put("auth", b"old-auth".to_vec()).await.unwrap();
        store.put("wallets", b"old-blob".to_vec()).await.unwrap();

        // A previous commit on this store applied `auth` and could not restore it.
        store
            .op
            .write(
                keys::JOURNAL,
                undo_journal(&[("auth", Some("old-auth")), ("wallets", Some("old-blob"))]),
            )
            .await
            .unwrap();
        store.op.write("auth", b"new-auth".to_vec()).await.unwrap();

        store
            .commit(Batch::new().put("wallets", b"old-blob-2"))
            .await
            .unwrap();

        assert_eq!(store.get("auth").await.unwrap(), Some(b"old-auth".to_vec()));
        assert_eq!(store.get("wallets").await.unwrap(), Some(b"old-blob-2".to_vec()));
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_open_discards_torn_journal() {
        let op = memory_operator();
        op.write("auth", b"old-auth".to_vec()).await.unwrap();
        op.write(keys::JOURNAL, b"{\"entries\":[{\"key\":".to_vec())
            .await
            .unwrap();

        let store = Store::open(op).await.unwrap();
        assert_eq!(store.get("auth").await.unwrap(), Some(b"old-auth".to_vec()));
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = Store::memory().await.unwrap();
        store.commit(Batch::new()).await.unwrap();
        assert_eq!(store.get(keys::JOURNAL).await.unwrap(), None);
    }
}
