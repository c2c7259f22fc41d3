//! Read-only view of the privacy pool contract.
//!
//! [`PoolChain`] is the port the fallback resolver depends on; the
//! production adapter is [`crate::starknet_rpc::StarknetRpc`].

use std::future::Future;
use std::sync::Arc;

use num_bigint::BigUint;
use shade_privacy::Felt;
use tracing::debug;

use crate::error::ChainError;

/// One deposit-executed event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    /// `None` while the block is still pending
    pub block_number: Option<u64>,
    pub commitment: Felt,
    pub transaction_hash: Option<Felt>,
}

/// One page of the event query
#[derive(Debug, Clone, Default)]
pub struct EventPage {
    pub events: Vec<DepositEvent>,
    /// Present when more pages follow
    pub continuation_token: Option<String>,
}

/// Result of `get_pp_stats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub total_deposits: u64,
    pub total_withdrawals: u64,
    pub total_volume_deposited: BigUint,
    pub total_volume_withdrawn: BigUint,
}

pub trait PoolChain: Send + Sync {
    /// Name of the network, used as the cache key
    fn network(&self) -> &str;

    /// `get_global_deposit_root`
    fn deposit_root(&self) -> impl Future<Output = Result<Felt, ChainError>> + Send;

    /// `get_pp_stats`
    fn pool_stats(&self) -> impl Future<Output = Result<PoolStats, ChainError>> + Send;

    /// One page of deposit events starting at `from_block`
    fn deposit_events(
        &self,
        from_block: u64,
        chunk_size: u64,
        continuation_token: Option<String>,
    ) -> impl Future<Output = Result<EventPage, ChainError>> + Send;
}

impl<T: PoolChain> PoolChain for Arc<T> {
    fn network(&self) -> &str {
        (**self).network()
    }

    fn deposit_root(&self) -> impl Future<Output = Result<Felt, ChainError>> + Send {
        (**self).deposit_root()
    }

    fn pool_stats(&self) -> impl Future<Output = Result<PoolStats, ChainError>> + Send {
        (**self).pool_stats()
    }

    fn deposit_events(
        &self,
        from_block: u64,
        chunk_size: u64,
        continuation_token: Option<String>,
    ) -> impl Future<Output = Result<EventPage, ChainError>> + Send {
        (**self).deposit_events(from_block, chunk_size, continuation_token)
    }
}

/// Every deposit commitment in tree order.
///
/// Pages are fetched one after another since each needs the previous
/// continuation token. The event query may hand back pages newest first, so
/// the result is stable-sorted by block number; pending events sort last.
pub async fn collect_deposit_commitments<C: PoolChain>(
    chain: &C,
    from_block: u64,
    chunk_size: u64,
) -> Result<Vec<Felt>, ChainError> {
    let mut events = Vec::new();
    let mut continuation_token = None;
    let mut pages = 0usize;

    loop {
        let page = chain
            .deposit_events(from_block, chunk_size, continuation_token.take())
            .await?;
        pages += 1;
        debug!(
            network = chain.network(),
            page = pages,
            events = page.events.len(),
            "Fetched deposit event page"
        );
        events.extend(page.events);

        match page.continuation_token {
            Some(token) => continuation_token = Some(token),
            None => break,
        }
    }

    events.sort_by_key(|e| e.block_number.unwrap_or(u64::MAX));
    Ok(events.into_iter().map(|e| e.commitment).collect())
}
