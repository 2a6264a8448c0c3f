// Chain-indexer access. Every read is an async snapshot fetch; Redis holds
// short-lived copies of the hot lookups. A fetch that was superseded by a
// newer one for the same key is discarded, never merged.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::error::ServiceError;
use crate::money;
use crate::networks::NetworkConfiguration;
use crate::nonce::{AccountNonces, TransactionSummary};
use crate::types::{
    AssetBalance, ContractLookup, FeeCalculation, FeeEstimate, FeeEstimation, FeeType, FtMetadata,
};

// ============================================================================
// LATEST-WINS FETCH TRACKING
// ============================================================================

#[derive(Default)]
pub struct LatestWins {
    generations: DashMap<String, u64>,
}

impl LatestWins {
    pub fn begin(&self, key: &str) -> u64 {
        let mut entry = self.generations.entry(key.to_string()).or_insert(0);
        *entry += 1;
        *entry
    }

    pub fn is_current(&self, key: &str, token: u64) -> bool {
        self.generations
            .get(key)
            .map(|generation| *generation == token)
            .unwrap_or(false)
    }
}

// ============================================================================
// RESPONSE SHAPES
// ============================================================================

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct StxBalanceResponse {
    balance: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
struct BtcTxoStats {
    funded_txo_sum: u64,
    spent_txo_sum: u64,
}

#[derive(Debug, Deserialize)]
struct BtcAddressResponse {
    chain_stats: BtcTxoStats,
}

#[derive(Debug, Deserialize)]
struct FeeQuote {
    fee: u64,
}

#[derive(Debug, Deserialize)]
struct FeeEstimationResponse {
    estimations: Vec<FeeQuote>,
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Clone)]
pub struct ChainApiClient {
    http: reqwest::Client,
    redis: ConnectionManager,
    latest: Arc<LatestWins>,
    bitcoin_api_url: String,
    timeout: Duration,
}

impl ChainApiClient {
    pub fn new(redis: ConnectionManager, bitcoin_api_url: String, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            redis,
            latest: Arc::new(LatestWins::default()),
            bitcoin_api_url,
            timeout,
        }
    }

    // The snapshot may be stale relative to very recent mempool entries;
    // callers reconcile it against pending transactions. Unavailable is a
    // normal answer here, not an error.
    pub async fn account_nonces(
        &self,
        network: &NetworkConfiguration,
        address: &str,
    ) -> Result<Option<AccountNonces>, ServiceError> {
        let key = format!("nonces:{}:{}", network.id, address);
        let token = self.latest.begin(&key);
        let url = format!("{}/extended/v1/address/{}/nonces", network.url, address);

        let snapshot = match self.http.get(&url).timeout(self.timeout).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<AccountNonces>().await {
                Ok(snapshot) => Some(snapshot),
                Err(e) => {
                    warn!("[NONCE] Invalid nonce snapshot for {}: {}", address, e);
                    None
                }
            },
            Ok(resp) => {
                warn!("[NONCE] Nonce lookup for {} returned {}", address, resp.status());
                None
            }
            Err(e) => {
                warn!("[NONCE] Nonce lookup failed for {}: {}", address, e);
                None
            }
        };

        if !self.latest.is_current(&key, token) {
            return Err(ServiceError::Superseded);
        }
        Ok(snapshot)
    }

    pub async fn stx_balance(
        &self,
        network: &NetworkConfiguration,
        address: &str,
    ) -> Result<AssetBalance, ServiceError> {
        let cache_key = format!("balance:{}:{}", network.id, address);

        let mut redis_conn = self.redis.clone();
        if let Ok(Some(json)) = redis_conn.get::<_, Option<String>>(&cache_key).await {
            if let Ok(balance) = serde_json::from_str::<AssetBalance>(&json) {
                return Ok(balance);
            }
        }

        let token = self.latest.begin(&cache_key);
        let url = format!("{}/extended/v1/address/{}/stx", network.url, address);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Balance fetch failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "Balance fetch for {} returned {}",
                address,
                resp.status()
            )));
        }
        let raw: StxBalanceResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Invalid balance response: {}", e)))?;

        let total = Decimal::from_str(&raw.balance)
            .map_err(|_| ServiceError::Upstream("Non-numeric balance".to_string()))?;
        let locked = Decimal::from_str(&raw.locked)
            .map_err(|_| ServiceError::Upstream("Non-numeric locked balance".to_string()))?;
        let balance = AssetBalance {
            available: total - locked,
            total,
            symbol: "STX".to_string(),
            decimals: money::STX_DECIMALS,
        };

        if !self.latest.is_current(&cache_key, token) {
            return Err(ServiceError::Superseded);
        }
        let json = serde_json::to_string(&balance)
            .map_err(|e| ServiceError::Other(e.to_string()))?;
        let _: Result<(), _> = redis_conn.set_ex(&cache_key, json, 30).await;
        Ok(balance)
    }

    pub async fn btc_balance(&self, address: &str) -> Result<AssetBalance, ServiceError> {
        let key = format!("btc-balance:{}", address);
        let token = self.latest.begin(&key);
        let url = format!("{}/address/{}", self.bitcoin_api_url, address);
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("BTC balance fetch failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "BTC balance fetch for {} returned {}",
                address,
                resp.status()
            )));
        }
        let raw: BtcAddressResponse = resp
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Invalid BTC balance response: {}", e)))?;

        if !self.latest.is_current(&key, token) {
            return Err(ServiceError::Superseded);
        }
        let available =
            Decimal::from(raw.chain_stats.funded_txo_sum) - Decimal::from(raw.chain_stats.spent_txo_sum);
        Ok(AssetBalance {
            available,
            total: available,
            symbol: "BTC".to_string(),
            decimals: money::BTC_DECIMALS,
        })
    }

    pub async fn mempool_transactions(
        &self,
        network: &NetworkConfiguration,
        address: &str,
    ) -> Result<Vec<TransactionSummary>, ServiceError> {
        let key = format!("mempool:{}:{}", network.id, address);
        let token = self.latest.begin(&key);
        let url = format!(
            "{}/extended/v1/tx/mempool?sender_address={}",
            network.url, address
        );
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Mempool fetch failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "Mempool fetch for {} returned {}",
                address,
                resp.status()
            )));
        }
        let page: Paginated<TransactionSummary> = resp
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Invalid mempool response: {}", e)))?;

        if !self.latest.is_current(&key, token) {
            return Err(ServiceError::Superseded);
        }
        Ok(page.results)
    }

    pub async fn confirmed_transactions(
        &self,
        network: &NetworkConfiguration,
        address: &str,
    ) -> Result<Vec<TransactionSummary>, ServiceError> {
        let key = format!("confirmed:{}:{}", network.id, address);
        let token = self.latest.begin(&key);
        let url = format!(
            "{}/extended/v1/address/{}/transactions",
            network.url, address
        );
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Transaction history fetch failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "Transaction history for {} returned {}",
                address,
                resp.status()
            )));
        }
        let page: Paginated<TransactionSummary> = resp
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Invalid history response: {}", e)))?;

        if !self.latest.is_current(&key, token) {
            return Err(ServiceError::Superseded);
        }
        Ok(page.results)
    }

    // Estimation failure falls back to static tiers so manual entry stays
    // open instead of blocking the review screen.
    pub async fn fee_estimation(
        &self,
        network: &NetworkConfiguration,
        estimated_len: usize,
        payload_hex: &str,
    ) -> FeeEstimation {
        let url = format!("{}/v2/fees/transaction", network.url);
        let body = serde_json::json!({
            "estimated_len": estimated_len,
            "transaction_payload": payload_hex,
        });

        match self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.json::<FeeEstimationResponse>().await {
                Ok(raw) if raw.estimations.len() >= 3 => FeeEstimation {
                    estimates: vec![
                        FeeEstimate {
                            fee: Decimal::from(raw.estimations[0].fee),
                            tier: FeeType::Low,
                        },
                        FeeEstimate {
                            fee: Decimal::from(raw.estimations[1].fee),
                            tier: FeeType::Middle,
                        },
                        FeeEstimate {
                            fee: Decimal::from(raw.estimations[2].fee),
                            tier: FeeType::High,
                        },
                    ],
                    calculation: FeeCalculation::Api,
                },
                Ok(_) => {
                    warn!("[FEES] Estimation response was incomplete, using defaults");
                    default_fee_estimation()
                }
                Err(e) => {
                    warn!("[FEES] Invalid estimation response: {}, using defaults", e);
                    default_fee_estimation()
                }
            },
            Ok(resp) => {
                warn!("[FEES] Estimation returned {}, using defaults", resp.status());
                default_fee_estimation()
            }
            Err(e) => {
                warn!("[FEES] Estimation unavailable: {}, using defaults", e);
                default_fee_estimation()
            }
        }
    }

    pub async fn contract_interface(
        &self,
        network: &NetworkConfiguration,
        contract_address: &str,
        contract_name: &str,
    ) -> Result<ContractLookup, ServiceError> {
        let cache_key = format!(
            "contract:{}:{}.{}",
            network.id, contract_address, contract_name
        );

        let mut redis_conn = self.redis.clone();
        if let Ok(Some(cached)) = redis_conn.get::<_, Option<String>>(&cache_key).await {
            return Ok(match cached.as_str() {
                "deployed" => ContractLookup::Deployed,
                _ => ContractLookup::NotFound,
            });
        }

        let url = format!(
            "{}/v2/contracts/interface/{}/{}",
            network.url, contract_address, contract_name
        );
        let resp = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Contract lookup failed: {}", e)))?;

        let lookup = if resp.status().is_success() {
            ContractLookup::Deployed
        } else if resp.status() == reqwest::StatusCode::NOT_FOUND {
            ContractLookup::NotFound
        } else {
            return Err(ServiceError::Upstream(format!(
                "Contract lookup for {}.{} returned {}",
                contract_address,
                contract_name,
                resp.status()
            )));
        };

        let cached = match lookup {
            ContractLookup::Deployed => "deployed",
            ContractLookup::NotFound => "not_found",
        };
        let _: Result<(), _> = redis_conn.set_ex(&cache_key, cached, 300).await;
        Ok(lookup)
    }

    pub async fn ft_metadata(
        &self,
        network: &NetworkConfiguration,
        contract_id: &str,
    ) -> Result<Option<FtMetadata>, ServiceError> {
        let cache_key = format!("ft-meta:{}:{}", network.id, contract_id);

        let mut redis_conn = self.redis.clone();
        if let Ok(Some(json)) = redis_conn.get::<_, Option<String>>(&cache_key).await {
            if let Ok(metadata) = serde_json::from_str::<FtMetadata>(&json) {
                return Ok(Some(metadata));
            }
        }

        let url = format!("{}/metadata/v1/ft/{}", network.url, contract_id);
        let resp = match self.http.get(&url).timeout(self.timeout).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("[ASSETS] Metadata fetch for {} failed: {}", contract_id, e);
                return Ok(None);
            }
        };
        if !resp.status().is_success() {
            return Ok(None);
        }
        let metadata: FtMetadata = match resp.json().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("[ASSETS] Invalid metadata for {}: {}", contract_id, e);
                return Ok(None);
            }
        };

        if let Ok(json) = serde_json::to_string(&metadata) {
            let _: Result<(), _> = redis_conn.set_ex(&cache_key, json, 3600).await;
        }
        Ok(Some(metadata))
    }

    pub async fn broadcast_transaction(
        &self,
        network: &NetworkConfiguration,
        serialized_tx: &str,
    ) -> Result<String, ServiceError> {
        let url = format!("{}/v2/transactions", network.url);
        let body = serde_json::json!({ "tx": serialized_tx });
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ServiceError::Broadcast(e.to_string()))?;

        if resp.status().is_success() {
            let value: serde_json::Value = resp
                .json()
                .await
                .map_err(|e| ServiceError::Broadcast(format!("Invalid broadcast response: {}", e)))?;
            let txid = value
                .as_str()
                .map(|s| s.to_string())
                .or_else(|| value.get("txid").and_then(|t| t.as_str()).map(|s| s.to_string()))
                .ok_or_else(|| {
                    ServiceError::Broadcast("No transaction id in broadcast response".to_string())
                })?;
            Ok(txid)
        } else {
            let message = resp
                .text()
                .await
                .unwrap_or_else(|_| "Broadcast rejected".to_string());
            Err(ServiceError::Broadcast(message))
        }
    }
}

pub fn default_fee_estimation() -> FeeEstimation {
    FeeEstimation {
        estimates: vec![
            FeeEstimate {
                fee: Decimal::from(2_500u64),
                tier: FeeType::Low,
            },
            FeeEstimate {
                fee: Decimal::from(3_000u64),
                tier: FeeType::Middle,
            },
            FeeEstimate {
                fee: Decimal::from(7_500u64),
                tier: FeeType::High,
            },
        ],
        calculation: FeeCalculation::DefaultSimulated,
    }
}
