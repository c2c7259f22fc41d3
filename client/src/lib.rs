//! Shade Client
//!
//! Resolves Merkle inclusion proofs for pool deposits. The proof
//! coordinator is asked first; if it fails, the tree is rebuilt locally from
//! the pool's deposit events.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  MerkleProofResolver                      │
//! │                                                           │
//! │   ProofCoordinator ──► fast path (HTTP, 5s)               │
//! │   PoolChain        ──► slow path (stats, events, root)    │
//! │   CommitmentCache  ──► per-network list, count-validated  │
//! └───────────────────────────────────────────────────────────┘
//!            │                              │
//!            ▼                              ▼
//!    CoordinatorClient               StarknetRpc (JSON-RPC)
//! ```

pub mod cache;
pub mod chain;
pub mod coordinator;
pub mod error;
pub mod fallback;
pub mod starknet_rpc;

pub use cache::CommitmentCache;
pub use chain::{DepositEvent, EventPage, PoolChain, PoolStats, collect_deposit_commitments};
pub use coordinator::{
    AnyCoordinator, CoordinatorClient, CoordinatorClientConfig, CoordinatorProofResponse,
    NoCoordinator, ProofCoordinator,
};
pub use error::{ChainError, ResolveError};
pub use fallback::{FallbackConfig, MerkleProofResolver, ProofSource, ResolvedProof, RootConsistency};
pub use starknet_rpc::{StarknetRpc, StarknetRpcConfig, selector};
