//! Starknet JSON-RPC adapter
//!
//! Implements [`PoolChain`] with two methods of the node API:
//!
//! - `starknet_call` for the pool's view functions
//! - `starknet_getEvents` for the deposit history, filtered by the pool
//!   address and the deposit event selector

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use sha3::{Digest, Keccak256};
use shade_config::ShadeConfig;
use shade_privacy::Felt;
use tracing::debug;

use crate::chain::{DepositEvent, EventPage, PoolChain, PoolStats};
use crate::error::ChainError;

/// Position of the commitment in a deposit event's key list; key 0 is the
/// event selector
const COMMITMENT_KEY_INDEX: usize = 1;

/// `starknet_keccak`: keccak256 truncated to its low 250 bits
pub fn selector(name: &str) -> Felt {
    let mut digest = Keccak256::digest(name.as_bytes());
    digest[0] &= 0x03;
    Felt::from_be_bytes_mod_order(&digest)
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct StarknetRpcConfig {
    /// Cache key for this deployment
    pub network: String,
    pub rpc_url: String,
    pub pool_address: Felt,
    pub deposit_event: String,
    pub request_timeout: Duration,
}

impl StarknetRpcConfig {
    /// Settings for `config.default_network`
    pub fn from_config(config: &ShadeConfig) -> Result<Self> {
        let network = config.active_network()?;
        let pool_address = Felt::parse(&network.pool_address)
            .with_context(|| format!("Invalid pool address: {}", network.pool_address))?;

        Ok(Self {
            network: config.default_network.clone(),
            rpc_url: network.rpc_url.clone(),
            pool_address,
            deposit_event: network.deposit_event.clone(),
            request_timeout: config.rpc_timeout(),
        })
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawEventsPage {
    events: Vec<RawEvent>,
    #[serde(default)]
    continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    keys: Vec<Felt>,
    #[serde(default)]
    block_number: Option<u64>,
    #[serde(default)]
    transaction_hash: Option<Felt>,
}

impl TryFrom<RawEvent> for DepositEvent {
    type Error = ChainError;

    fn try_from(raw: RawEvent) -> Result<Self, ChainError> {
        let commitment = raw
            .keys
            .into_iter()
            .nth(COMMITMENT_KEY_INDEX)
            .ok_or_else(|| ChainError::InvalidResponse("deposit event has no commitment key".into()))?;

        Ok(DepositEvent {
            block_number: raw.block_number,
            commitment,
            transaction_hash: raw.transaction_hash,
        })
    }
}

fn felt_to_u64(value: &Felt, field: &str) -> Result<u64, ChainError> {
    value
        .as_biguint()
        .to_u64()
        .ok_or_else(|| ChainError::InvalidResponse(format!("{field} does not fit in u64: {value}")))
}

/// u256 is returned as a `(low, high)` pair of 128-bit limbs
fn felts_to_u256(low: &Felt, high: &Felt) -> BigUint {
    (high.as_biguint() << 128u32) + low.as_biguint()
}

/// `(u64, u64, u256, u256)` flattened to six felts
pub(crate) fn decode_pool_stats(result: &[Felt]) -> Result<PoolStats, ChainError> {
    let [deposits, withdrawals, dep_low, dep_high, wd_low, wd_high] = result else {
        return Err(ChainError::InvalidResponse(format!(
            "get_pp_stats returned {} felts, expected 6",
            result.len()
        )));
    };

    Ok(PoolStats {
        total_deposits: felt_to_u64(deposits, "total_deposits")?,
        total_withdrawals: felt_to_u64(withdrawals, "total_withdrawals")?,
        total_volume_deposited: felts_to_u256(dep_low, dep_high),
        total_volume_withdrawn: felts_to_u256(wd_low, wd_high),
    })
}

// ============================================================================
// Client
// ============================================================================

pub struct StarknetRpc {
    config: StarknetRpcConfig,
    client: reqwest::Client,
    deposit_key: Felt,
    next_id: AtomicU64,
}

impl StarknetRpc {
    pub fn new(config: StarknetRpcConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        let deposit_key = selector(&config.deposit_event);

        Ok(Self {
            config,
            client,
            deposit_key,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &StarknetRpcConfig {
        &self.config
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ChainError> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self.client.post(&self.config.rpc_url).json(&body).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ChainError::Rpc(format!("{method} returned {status}: {text}")));
        }

        let parsed: RpcResponse<T> = response.json().await?;
        if let Some(error) = parsed.error {
            return Err(ChainError::Rpc(format!(
                "{method} failed ({}): {}",
                error.code, error.message
            )));
        }
        parsed
            .result
            .ok_or_else(|| ChainError::InvalidResponse(format!("{method} response has no result")))
    }

    /// Call a view function of the pool with no arguments
    pub async fn call(&self, function: &str) -> Result<Vec<Felt>, ChainError> {
        let params = json!({
            "request": {
                "contract_address": self.config.pool_address,
                "entry_point_selector": selector(function),
                "calldata": [],
            },
            "block_id": "latest",
        });
        self.request("starknet_call", params).await
    }
}

impl PoolChain for StarknetRpc {
    fn network(&self) -> &str {
        &self.config.network
    }

    async fn deposit_root(&self) -> Result<Felt, ChainError> {
        self.call("get_global_deposit_root")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::InvalidResponse("get_global_deposit_root returned nothing".into()))
    }

    async fn pool_stats(&self) -> Result<PoolStats, ChainError> {
        decode_pool_stats(&self.call("get_pp_stats").await?)
    }

    async fn deposit_events(
        &self,
        from_block: u64,
        chunk_size: u64,
        continuation_token: Option<String>,
    ) -> Result<EventPage, ChainError> {
        let mut filter = json!({
            "from_block": { "block_number": from_block },
            "to_block": "latest",
            "address": self.config.pool_address,
            "keys": [[self.deposit_key]],
            "chunk_size": chunk_size,
        });
        if let Some(token) = continuation_token {
            filter["continuation_token"] = Value::String(token);
        }

        let raw: RawEventsPage = self
            .request("starknet_getEvents", json!({ "filter": filter }))
            .await?;
        debug!(
            network = %self.config.network,
            events = raw.events.len(),
            more = raw.continuation_token.is_some(),
            "starknet_getEvents"
        );

        Ok(EventPage {
            events: raw
                .events
                .into_iter()
                .map(DepositEvent::try_from)
                .collect::<Result<_, _>>()?,
            continuation_token: raw.continuation_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matches_known_entry_point() {
        assert_eq!(
            selector("transfer").to_hex(),
            "0x83afd3f4caedc6eebf44246fe54e38c95e3179a5ec9ea81740eca5b482d12e"
        );
    }

    #[test]
    fn test_selector_fits_250_bits() {
        for name in ["DepositExecuted", "get_pp_stats", "get_global_deposit_root"] {
            assert!(selector(name).as_biguint().bits() <= 250, "{name}");
        }
    }

    #[test]
    fn test_decode_pool_stats() {
        let felts: Vec<Felt> = [12u64, 3, 5, 1, 7, 0].into_iter().map(Felt::from).collect();
        let stats = decode_pool_stats(&felts).unwrap();

        assert_eq!(stats.total_deposits, 12);
        assert_eq!(stats.total_withdrawals, 3);
        assert_eq!(stats.total_volume_deposited, (BigUint::from(1u8) << 128u32) + 5u8);
        assert_eq!(stats.total_volume_withdrawn, BigUint::from(7u8));
    }

    #[test]
    fn test_decode_pool_stats_rejects_short_result() {
        let felts = vec![Felt::one(); 4];
        assert!(matches!(
            decode_pool_stats(&felts),
            Err(ChainError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_event_takes_second_key() {
        let raw: RawEvent = serde_json::from_value(json!({
            "from_address": "0x1",
            "keys": ["0xabc", "0x2a"],
            "data": [],
            "block_number": 9,
            "transaction_hash": "0x77",
        }))
        .unwrap();

        let event = DepositEvent::try_from(raw).unwrap();
        assert_eq!(event.commitment, Felt::from(42u64));
        assert_eq!(event.block_number, Some(9));
        assert_eq!(event.transaction_hash, Some(Felt::from(0x77u64)));
    }

    #[test]
    fn test_event_without_commitment_is_invalid() {
        let raw: RawEvent = serde_json::from_value(json!({ "keys": ["0xabc"] })).unwrap();
        assert!(DepositEvent::try_from(raw).is_err());
    }

    #[test]
    fn test_config_from_shade_config() {
        let config = ShadeConfig::default();
        let rpc = StarknetRpcConfig::from_config(&config).unwrap();
        assert_eq!(rpc.network, "devnet");
        assert_eq!(rpc.pool_address, Felt::zero());
        assert_eq!(rpc.deposit_event, "DepositExecuted");
    }
}
