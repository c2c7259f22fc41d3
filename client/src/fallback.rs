//! Two-tier Merkle proof resolution
//!
//! ```text
//!   resolve(commitment)
//!        │
//!        ├─► coordinator lookup ──── ok + verifies ──────────────┐
//!        │        │ error / not found / bad proof                │
//!        │        ▼                                              │
//!        │   get_pp_stats ─► cache slot (len == count?) ─ hit ─┐ │
//!        │                          │ miss                     │ │
//!        │                          ▼                          │ │
//!        │              paginate deposit events, sort          │ │
//!        │                          │                          │ │
//!        │                          ▼                          ▼ │
//!        │               locate leaf, build proof (blocking)     │
//!        │                          │                            │
//!        └──────────────────────────┴──► compare with on-chain root
//! ```
//!
//! A root mismatch is reported, never fatal: the contract checks the root
//! again when the proof is submitted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result as AnyResult;
use serde::Serialize;
use shade_config::ShadeConfig;
use shade_privacy::{
    DEFAULT_TREE_DEPTH, Felt, MerkleProof, TreeHasher, compute_root, default_hasher,
    get_merkle_proof, verify_merkle_proof,
};
use tracing::{debug, info, warn};

use crate::cache::CommitmentCache;
use crate::chain::{PoolChain, collect_deposit_commitments};
use crate::coordinator::ProofCoordinator;
use crate::error::ResolveError;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Block the pool was deployed at
    pub from_block: u64,
    /// Events per page
    pub chunk_size: u64,
    pub tree_depth: usize,
    /// Deadline for the whole local reconstruction
    pub slow_path_timeout: Option<Duration>,
    pub deposit_poll_interval: Duration,
    pub deposit_poll_attempts: u32,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            chunk_size: 1_000,
            tree_depth: DEFAULT_TREE_DEPTH,
            slow_path_timeout: None,
            deposit_poll_interval: Duration::from_secs(2),
            deposit_poll_attempts: 30,
        }
    }
}

impl FallbackConfig {
    pub fn from_config(config: &ShadeConfig) -> AnyResult<Self> {
        let network = config.active_network()?;
        Ok(Self {
            from_block: network.from_block,
            chunk_size: config.fallback.chunk_size,
            tree_depth: config.fallback.tree_depth,
            slow_path_timeout: config.slow_path_timeout(),
            deposit_poll_interval: config.deposit_poll_interval(),
            deposit_poll_attempts: config.fallback.deposit_poll_attempts,
        })
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum ProofSource {
    Coordinator,
    LocalReconstruction { cache_hit: bool },
}

/// Outcome of comparing a proof's root with `get_global_deposit_root`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RootConsistency {
    Matches,
    Stale { local: Felt, on_chain: Felt },
    /// The on-chain root could not be read
    Unavailable,
}

impl RootConsistency {
    pub fn is_stale(&self) -> bool {
        matches!(self, RootConsistency::Stale { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedProof {
    pub proof: MerkleProof,
    pub source: ProofSource,
    pub consistency: RootConsistency,
}

// ============================================================================
// Resolver
// ============================================================================

pub struct MerkleProofResolver<C, P> {
    chain: C,
    coordinator: P,
    cache: Arc<CommitmentCache>,
    hasher: Arc<TreeHasher>,
    config: FallbackConfig,
}

impl<C: PoolChain, P: ProofCoordinator> MerkleProofResolver<C, P> {
    pub fn new(chain: C, coordinator: P, config: FallbackConfig) -> Self {
        Self {
            chain,
            coordinator,
            cache: Arc::new(CommitmentCache::new()),
            hasher: default_hasher(),
            config,
        }
    }

    /// Share a cache with other resolvers
    pub fn with_cache(mut self, cache: Arc<CommitmentCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Hash with a non-default tree domain
    pub fn with_hasher(mut self, hasher: Arc<TreeHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn cache(&self) -> &Arc<CommitmentCache> {
        &self.cache
    }

    pub fn chain(&self) -> &C {
        &self.chain
    }

    pub fn config(&self) -> &FallbackConfig {
        &self.config
    }

    /// Inclusion proof for `commitment`, fast path first
    pub async fn resolve(&self, commitment: &Felt) -> Result<ResolvedProof, ResolveError> {
        if self.coordinator.is_enabled() {
            match self.coordinator.lookup(commitment).await {
                Ok(Some(proof)) if self.accept(commitment, &proof) => {
                    info!(leaf_index = proof.leaf_index, "Proof served by coordinator");
                    let consistency = self.check_root(&proof.root).await;
                    return Ok(ResolvedProof {
                        proof,
                        source: ProofSource::Coordinator,
                        consistency,
                    });
                }
                Ok(Some(_)) => {
                    warn!(%commitment, "Coordinator proof does not verify, falling back to local reconstruction");
                }
                Ok(None) => {
                    info!(%commitment, "Coordinator has no proof, falling back to local reconstruction");
                }
                Err(e) => {
                    warn!(error = %e, "Coordinator unavailable, falling back to local reconstruction");
                }
            }
        }

        self.resolve_local(commitment).await
    }

    /// Rebuild the tree from chain history, bounded by `slow_path_timeout`
    pub async fn resolve_local(&self, commitment: &Felt) -> Result<ResolvedProof, ResolveError> {
        match self.config.slow_path_timeout {
            Some(limit) => tokio::time::timeout(limit, self.reconstruct(commitment))
                .await
                .map_err(|_| ResolveError::Timeout(limit))?,
            None => self.reconstruct(commitment).await,
        }
    }

    /// Root of the locally rebuilt tree, checked against the chain
    pub async fn local_root(&self) -> Result<(Felt, RootConsistency), ResolveError> {
        let (commitments, _) = self.commitments().await?;
        let hasher = self.hasher.clone();
        let depth = self.config.tree_depth;

        let root = tokio::task::spawn_blocking(move || compute_root(&hasher, &commitments, depth))
            .await
            .map_err(|e| ResolveError::Worker(e.to_string()))??;
        let consistency = self.check_root(&root).await;
        Ok((root, consistency))
    }

    /// Drop the cached list for this resolver's network.
    ///
    /// Call after your own deposit confirms: an unchanged count cannot tell
    /// "no new deposits" apart from "my deposit is not visible yet".
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate(self.chain.network()).await;
    }

    /// Poll `get_pp_stats` until at least `expected` deposits are counted,
    /// then invalidate the cache so the next resolution sees them
    pub async fn wait_for_deposit_count(&self, expected: u64) -> Result<u64, ResolveError> {
        let interval = self.config.deposit_poll_interval;
        let attempts = self.config.deposit_poll_attempts.max(1);

        for attempt in 1..=attempts {
            let stats = self.chain.pool_stats().await?;
            if stats.total_deposits >= expected {
                self.invalidate_cache().await;
                return Ok(stats.total_deposits);
            }
            debug!(
                attempt,
                seen = stats.total_deposits,
                expected,
                "Waiting for deposit to be counted"
            );
            if attempt < attempts {
                tokio::time::sleep(interval).await;
            }
        }

        Err(ResolveError::Timeout(interval * attempts))
    }

    fn accept(&self, commitment: &Felt, proof: &MerkleProof) -> bool {
        proof.leaf == *commitment && verify_merkle_proof(&self.hasher, proof)
    }

    async fn reconstruct(&self, commitment: &Felt) -> Result<ResolvedProof, ResolveError> {
        let (commitments, cache_hit) = self.commitments().await?;

        let leaf_index = commitments
            .iter()
            .position(|c| c == commitment)
            .ok_or_else(|| ResolveError::NotFound {
                commitment: commitment.clone(),
                deposits: commitments.len() as u64,
            })? as u64;

        let hasher = self.hasher.clone();
        let depth = self.config.tree_depth;
        let proof = tokio::task::spawn_blocking(move || {
            get_merkle_proof(&hasher, leaf_index, &commitments, depth)
        })
        .await
        .map_err(|e| ResolveError::Worker(e.to_string()))??;

        info!(leaf_index, cache_hit, "Proof rebuilt from chain history");
        let consistency = self.check_root(&proof.root).await;

        Ok(ResolvedProof {
            proof,
            source: ProofSource::LocalReconstruction { cache_hit },
            consistency,
        })
    }

    /// Ordered commitment list, from the cache when the count still matches
    async fn commitments(&self) -> Result<(Arc<Vec<Felt>>, bool), ResolveError> {
        let network = self.chain.network();
        let mut slot = self.cache.lock(network).await;
        let stats = self.chain.pool_stats().await?;

        if let Some(cached) = slot.cached() {
            if cached.len() as u64 == stats.total_deposits {
                debug!(network, deposits = stats.total_deposits, "Commitment cache hit");
                return Ok((cached.clone(), true));
            }
        }

        info!(
            network,
            deposits = stats.total_deposits,
            "Fetching deposit history"
        );
        let fetched = Arc::new(
            collect_deposit_commitments(&self.chain, self.config.from_block, self.config.chunk_size)
                .await?,
        );

        if fetched.len() as u64 == stats.total_deposits {
            slot.store(fetched.clone());
        } else {
            warn!(
                network,
                events = fetched.len(),
                counted = stats.total_deposits,
                "Deposit events and counter disagree, not caching"
            );
        }

        Ok((fetched, false))
    }

    async fn check_root(&self, local: &Felt) -> RootConsistency {
        match self.chain.deposit_root().await {
            Ok(on_chain) if on_chain == *local => RootConsistency::Matches,
            Ok(on_chain) => {
                warn!(
                    local = %local,
                    on_chain = %on_chain,
                    "Local deposit root differs from on-chain root; proof may be stale"
                );
                RootConsistency::Stale {
                    local: local.clone(),
                    on_chain,
                }
            }
            Err(e) => {
                warn!(error = %e, "Could not read on-chain deposit root");
                RootConsistency::Unavailable
            }
        }
    }
}
