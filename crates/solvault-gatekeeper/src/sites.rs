//! Connected-site registry, persisted under `connected_sites` as
//! `{origin: {connected_at, public_key}}`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use solvault_core::VaultResult;
use solvault_store::{keys, Store};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedSite {
    pub connected_at: u64,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

pub type SiteMap = BTreeMap<String, ConnectedSite>;

pub struct SiteRegistry {
    store: Arc<Store>,
    /// serializes read-modify-write of the map
    writer: Mutex<()>,
}

impl SiteRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            writer: Mutex::new(()),
        }
    }

    pub async fn all(&self) -> VaultResult<SiteMap> {
        Ok(self
            .store
            .get_json::<SiteMap>(keys::CONNECTED_SITES)
            .await?
            .unwrap_or_default())
    }

    pub async fn get(&self, origin: &str) -> VaultResult<Option<ConnectedSite>> {
        Ok(self.all().await?.remove(origin))
    }

    pub async fn connect(&self, origin: &str, site: ConnectedSite) -> VaultResult<()> {
        let _writer = self.writer.lock().await;
        let mut sites = self.all().await?;
        sites.insert(origin.to_string(), site);
        self.store.put_json(keys::CONNECTED_SITES, &sites).await
    }

    /// Returns whether the origin was connected.
    pub async fn disconnect(&self, origin: &str) -> VaultResult<bool> {
        let _writer = self.writer.lock().await;
        let mut sites = self.all().await?;
        if sites.remove(origin).is_none() {
            return Ok(false);
        }
        self.store.put_json(keys::CONNECTED_SITES, &sites).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(pk: &str) -> ConnectedSite {
        ConnectedSite {
            connected_at: 1,
            public_key: pk.into(),
            favicon: None,
        }
    }

    #[tokio::test]
    async fn test_connect_disconnect() {
        let store = Arc::new(Store::memory().await.unwrap());
        let sites = SiteRegistry::new(store.clone());

        sites.connect("https://a.example", site("A")).await.unwrap();
        sites.connect("https://b.example", site("B")).await.unwrap();
        assert_eq!(sites.get("https://a.example").await.unwrap(), Some(site("A")));

        assert!(sites.disconnect("https://a.example").await.unwrap());
        assert!(!sites.disconnect("https://a.example").await.unwrap());
        assert_eq!(sites.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stored_shape() {
        let store = Arc::new(Store::memory().await.unwrap());
        let sites = SiteRegistry::new(store.clone());
        sites.connect("https://a.example", site("A")).await.unwrap();

        let raw: serde_json::Value = store.get_json(keys::CONNECTED_SITES).await.unwrap().unwrap();
        assert_eq!(raw["https://a.example"]["public_key"], "A");
        assert_eq!(raw["https://a.example"]["connected_at"], 1);
        assert!(raw["https://a.example"].get("favicon").is_none());
    }
}
