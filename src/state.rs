// Service configuration and shared state.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bitcoin::Network;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::analytics::AnalyticsBus;
use crate::chain_api::ChainApiClient;
use crate::flow::RequestFlow;
use crate::networks::NetworkStore;
use crate::types::{Account, PendingRequest};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub redis_url: String,
    pub stacks_api_url: Option<String>,
    pub bitcoin_api_url: String,
    pub bitcoin_network: Network,
    pub request_ttl: Duration,
    pub sweep_interval: Duration,
    pub upstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        let network_str = std::env::var("BITCOIN_NETWORK").unwrap_or_else(|_| "mainnet".to_string());
        let bitcoin_network = match network_str.as_str() {
            "testnet" => Network::Testnet,
            "signet" => Network::Signet,
            "regtest" => Network::Regtest,
            _ => Network::Bitcoin,
        };

        Self {
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3009),
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            stacks_api_url: std::env::var("STACKS_API_URL").ok(),
            bitcoin_api_url: std::env::var("BITCOIN_API_URL")
                .unwrap_or_else(|_| "https://mempool.space/api".to_string()),
            bitcoin_network,
            request_ttl: Duration::from_millis(
                std::env::var("REQUEST_TTL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1_800_000),
            ),
            sweep_interval: Duration::from_millis(
                std::env::var("REQUEST_SWEEP_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60_000),
            ),
            upstream_timeout: Duration::from_millis(
                std::env::var("UPSTREAM_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5_000),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub total_requests: u64,
    pub total_broadcast: u64,
    pub total_failed: u64,
    pub total_rejected: u64,
    pub total_expired: u64,
    pub start_time: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            total_requests: 0,
            total_broadcast: 0,
            total_failed: 0,
            total_rejected: 0,
            total_expired: 0,
            start_time: current_timestamp(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub chain: ChainApiClient,
    pub requests: Arc<DashMap<String, PendingRequest>>,
    pub flows: Arc<DashMap<String, RequestFlow>>,
    pub accounts: Arc<DashMap<String, Account>>,
    pub current_account_address: Arc<RwLock<Option<String>>>,
    pub networks: Arc<NetworkStore>,
    pub analytics: AnalyticsBus,
    pub metrics: Arc<RwLock<Metrics>>,
    pub config: Config,
}

impl AppState {
    pub async fn selected_account(&self) -> Option<Account> {
        let address = self.current_account_address.read().await.clone()?;
        self.accounts.get(&address).map(|entry| entry.clone())
    }
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn generate_request_id() -> String {
    use rand::Rng;
    let random_bytes: Vec<u8> = (0..6).map(|_| rand::thread_rng().gen()).collect();
    format!("req_{}_{}", current_timestamp(), hex::encode(random_bytes))
}
