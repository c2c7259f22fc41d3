use std::time::Duration;

use shade_privacy::{Felt, PrivacyError};
use thiserror::Error;

/// Failure talking to the chain
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    #[error("rpc request timed out")]
    Timeout,
}

impl From<reqwest::Error> for ChainError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChainError::Timeout
        } else if e.is_decode() {
            ChainError::InvalidResponse(e.to_string())
        } else {
            ChainError::Rpc(e.to_string())
        }
    }
}

/// Why no inclusion proof could be produced
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Bad input or a tree the primitives reject
    #[error(transparent)]
    Validation(#[from] PrivacyError),

    /// The commitment is not among the indexed deposits yet
    #[error("commitment {commitment} not found among {deposits} deposits")]
    NotFound { commitment: Felt, deposits: u64 },

    /// Both the coordinator and the chain were unreachable
    #[error("proof sources unreachable: {0}")]
    Connectivity(#[from] ChainError),

    #[error("gave up after {0:?}")]
    Timeout(Duration),

    #[error("proof worker failed: {0}")]
    Worker(String),
}

impl ResolveError {
    /// Worth trying again later without changing the input
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ResolveError::NotFound { .. } | ResolveError::Connectivity(_) | ResolveError::Timeout(_)
        )
    }
}
