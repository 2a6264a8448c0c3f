// Network configuration store. One network is current at any time; every
// mutation runs under the current-id lock so store actions apply one at a
// time, completely or not at all.

use dashmap::DashMap;
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ServiceError;

pub const DEFAULT_NETWORK_ID: &str = "mainnet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfiguration {
    pub id: String,
    pub name: String,
    pub url: String,
    pub chain_id: u32,
}

lazy_static! {
    static ref DEFAULT_NETWORKS: Vec<NetworkConfiguration> = vec![
        NetworkConfiguration {
            id: "mainnet".to_string(),
            name: "Mainnet".to_string(),
            url: "https://api.hiro.so".to_string(),
            chain_id: 1,
        },
        NetworkConfiguration {
            id: "testnet".to_string(),
            name: "Testnet".to_string(),
            url: "https://api.testnet.hiro.so".to_string(),
            chain_id: 2_147_483_648,
        },
        NetworkConfiguration {
            id: "devnet".to_string(),
            name: "Devnet".to_string(),
            url: "http://localhost:3999".to_string(),
            chain_id: 2_147_483_648,
        },
    ];
}

pub struct NetworkStore {
    networks: DashMap<String, NetworkConfiguration>,
    current_id: RwLock<String>,
}

impl NetworkStore {
    pub fn with_defaults(mainnet_url_override: Option<&str>) -> Self {
        let networks = DashMap::new();
        for preset in DEFAULT_NETWORKS.iter() {
            let mut config = preset.clone();
            if config.id == DEFAULT_NETWORK_ID {
                if let Some(url) = mainnet_url_override {
                    config.url = url.to_string();
                }
            }
            networks.insert(config.id.clone(), config);
        }
        Self {
            networks,
            current_id: RwLock::new(DEFAULT_NETWORK_ID.to_string()),
        }
    }

    pub async fn add_network(&self, config: NetworkConfiguration) {
        let _guard = self.current_id.write().await;
        info!("[NETWORKS] Adding network {}", config.id);
        self.networks.insert(config.id.clone(), config);
    }

    pub async fn change_network(&self, id: &str) -> Result<NetworkConfiguration, ServiceError> {
        let mut current = self.current_id.write().await;
        let config = self
            .networks
            .get(id)
            .map(|entry| entry.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("Network {} not found", id)))?;
        *current = id.to_string();
        info!("[NETWORKS] Current network is now {}", id);
        Ok(config)
    }

    pub async fn remove_network(&self, id: &str) -> Result<(), ServiceError> {
        if id == DEFAULT_NETWORK_ID {
            return Err(ServiceError::InvalidRequest(
                "The default network cannot be removed".to_string(),
            ));
        }
        let mut current = self.current_id.write().await;
        self.networks
            .remove(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Network {} not found", id)))?;
        if *current == id {
            *current = DEFAULT_NETWORK_ID.to_string();
            info!("[NETWORKS] Removed current network {}, falling back to {}", id, DEFAULT_NETWORK_ID);
        } else {
            info!("[NETWORKS] Removed network {}", id);
        }
        Ok(())
    }

    pub async fn current(&self) -> NetworkConfiguration {
        let current = self.current_id.read().await;
        self.networks
            .get(&*current)
            .map(|entry| entry.clone())
            // the default preset is always seeded
            .unwrap_or_else(|| DEFAULT_NETWORKS[0].clone())
    }

    pub async fn current_id(&self) -> String {
        self.current_id.read().await.clone()
    }

    pub async fn list(&self) -> Vec<NetworkConfiguration> {
        let mut networks: Vec<_> = self.networks.iter().map(|entry| entry.value().clone()).collect();
        networks.sort_by(|a, b| a.id.cmp(&b.id));
        networks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn custom(id: &str) -> NetworkConfiguration {
        NetworkConfiguration {
            id: id.to_string(),
            name: id.to_string(),
            url: format!("https://{}.example.com", id),
            chain_id: 2_147_483_648,
        }
    }

    #[tokio::test]
    async fn defaults_are_seeded_with_mainnet_current() {
        let store = NetworkStore::with_defaults(None);
        assert_eq!(store.current_id().await, "mainnet");
        assert_eq!(store.current().await.id, "mainnet");
        assert_eq!(store.list().await.len(), 3);
    }

    #[tokio::test]
    async fn add_then_change_selects_the_new_network() {
        let store = NetworkStore::with_defaults(None);
        store.add_network(custom("local")).await;
        let changed = store.change_network("local").await.unwrap();
        assert_eq!(changed.id, "local");
        assert_eq!(store.current().await.id, "local");
    }

    #[tokio::test]
    async fn adding_an_existing_id_replaces_it() {
        let store = NetworkStore::with_defaults(None);
        store.add_network(custom("local")).await;
        let mut replacement = custom("local");
        replacement.url = "https://other.example.com".to_string();
        store.add_network(replacement.clone()).await;
        let listed = store.list().await;
        let found = listed.iter().find(|n| n.id == "local").unwrap();
        assert_eq!(found.url, replacement.url);
    }

    #[tokio::test]
    async fn changing_to_an_unknown_network_is_refused() {
        let store = NetworkStore::with_defaults(None);
        assert!(store.change_network("nope").await.is_err());
        assert_eq!(store.current_id().await, "mainnet");
    }

    #[tokio::test]
    async fn removing_the_current_network_falls_back_to_the_default() {
        let store = NetworkStore::with_defaults(None);
        store.add_network(custom("local")).await;
        store.change_network("local").await.unwrap();
        store.remove_network("local").await.unwrap();
        assert_eq!(store.current_id().await, "mainnet");
        assert!(store.list().await.iter().all(|n| n.id != "local"));
    }

    #[tokio::test]
    async fn the_default_network_cannot_be_removed() {
        let store = NetworkStore::with_defaults(None);
        assert!(store.remove_network(DEFAULT_NETWORK_ID).await.is_err());
        assert_eq!(store.current().await.id, "mainnet");
    }

    #[tokio::test]
    async fn mainnet_url_override_applies_at_seed_time() {
        let store = NetworkStore::with_defaults(Some("https://stacks.internal:3999"));
        assert_eq!(store.current().await.url, "https://stacks.internal:3999");
    }
}
