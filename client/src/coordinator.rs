//! Proof Coordinator Client
//!
//! The coordinator indexes deposits off-chain and serves inclusion proofs
//! directly. It is the fast path; anything it gets wrong is caught by the
//! resolver and handed to local reconstruction.
//!
//! ```text
//! GET {base}/api/privacy/proof/{commitment}
//!   -> { found, siblings[], path_indices[], root | current_root, leaf_index }
//! ```

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use shade_config::ShadeConfig;
use shade_privacy::{Felt, MerkleProof, PrivacyError, get_leaf_index};
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorClientConfig {
    /// Base URL (e.g., "http://localhost:3000")
    pub base_url: String,
    /// Whole-request timeout (default: 5 seconds)
    pub timeout: Duration,
}

impl Default for CoordinatorClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl CoordinatorClientConfig {
    /// `None` when no coordinator URL is configured
    pub fn from_config(config: &ShadeConfig) -> Option<Self> {
        config.coordinator.url.as_ref().map(|url| Self {
            base_url: url.clone(),
            timeout: config.coordinator_timeout(),
        })
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoordinatorProofResponse {
    pub found: bool,
    #[serde(default)]
    pub siblings: Vec<String>,
    #[serde(default)]
    pub path_indices: Vec<u8>,
    /// Older coordinators call this `current_root`
    #[serde(default, alias = "current_root")]
    pub root: Option<String>,
    #[serde(default)]
    pub leaf_index: Option<u64>,
}

impl CoordinatorProofResponse {
    /// Shape-check the response and turn it into a proof for `commitment`.
    ///
    /// `Ok(None)` when the coordinator has not indexed the commitment.
    pub fn into_proof(self, commitment: &Felt) -> Result<Option<MerkleProof>, PrivacyError> {
        if !self.found {
            return Ok(None);
        }

        if self.siblings.len() != self.path_indices.len() {
            return Err(PrivacyError::MalformedProof(format!(
                "{} siblings but {} path indices",
                self.siblings.len(),
                self.path_indices.len()
            )));
        }
        if self.path_indices.len() > 64 {
            return Err(PrivacyError::MalformedProof(format!(
                "path of length {} is too deep",
                self.path_indices.len()
            )));
        }
        if self.path_indices.iter().any(|bit| *bit > 1) {
            return Err(PrivacyError::MalformedProof("path index is not 0 or 1".into()));
        }

        let root = self
            .root
            .as_deref()
            .ok_or_else(|| PrivacyError::MalformedProof("response has no root".into()))
            .and_then(Felt::parse)?;
        let path_elements = self
            .siblings
            .iter()
            .map(|s| Felt::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let leaf_index = get_leaf_index(&self.path_indices);
        if let Some(claimed) = self.leaf_index {
            if claimed != leaf_index {
                return Err(PrivacyError::MalformedProof(format!(
                    "leaf_index {claimed} disagrees with path bits ({leaf_index})"
                )));
            }
        }

        Ok(Some(MerkleProof {
            leaf: commitment.clone(),
            leaf_index,
            path_elements,
            path_indices: self.path_indices,
            root,
        }))
    }
}

// ============================================================================
// Port
// ============================================================================

pub trait ProofCoordinator: Send + Sync {
    /// `Ok(None)` when the coordinator does not know the commitment
    fn lookup(&self, commitment: &Felt) -> impl Future<Output = Result<Option<MerkleProof>>> + Send;

    /// Whether lookups should be attempted at all
    fn is_enabled(&self) -> bool {
        true
    }
}

/// No fast path; every request goes to local reconstruction
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoordinator;

impl ProofCoordinator for NoCoordinator {
    async fn lookup(&self, _commitment: &Felt) -> Result<Option<MerkleProof>> {
        Ok(None)
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

// ============================================================================
// HTTP Client
// ============================================================================

pub struct CoordinatorClient {
    config: CoordinatorClientConfig,
    client: reqwest::Client,
}

impl CoordinatorClient {
    pub fn new(config: CoordinatorClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &CoordinatorClientConfig {
        &self.config
    }

    fn proof_url(&self, commitment: &Felt) -> String {
        format!(
            "{}/api/privacy/proof/{}",
            self.config.base_url.trim_end_matches('/'),
            commitment.to_hex()
        )
    }

    /// Raw coordinator response
    pub async fn fetch(&self, commitment: &Felt) -> Result<CoordinatorProofResponse> {
        let url = self.proof_url(commitment);
        debug!(%url, "Requesting proof from coordinator");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to connect to proof coordinator")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Proof coordinator returned {}: {}", status, body));
        }

        response
            .json()
            .await
            .context("Failed to parse coordinator response")
    }
}

impl ProofCoordinator for CoordinatorClient {
    async fn lookup(&self, commitment: &Felt) -> Result<Option<MerkleProof>> {
        let response = self.fetch(commitment).await?;
        response
            .into_proof(commitment)
            .context("Malformed coordinator proof")
    }
}

/// Either a real coordinator or none, picked at runtime from config
pub enum AnyCoordinator {
    Http(CoordinatorClient),
    Disabled(NoCoordinator),
}

impl AnyCoordinator {
    pub fn from_config(config: &ShadeConfig) -> Result<Self> {
        match CoordinatorClientConfig::from_config(config) {
            Some(client_config) => Ok(Self::Http(CoordinatorClient::new(client_config)?)),
            None => Ok(Self::Disabled(NoCoordinator)),
        }
    }
}

impl ProofCoordinator for AnyCoordinator {
    async fn lookup(&self, commitment: &Felt) -> Result<Option<MerkleProof>> {
        match self {
            Self::Http(client) => client.lookup(commitment).await,
            Self::Disabled(none) => none.lookup(commitment).await,
        }
    }

    fn is_enabled(&self) -> bool {
        match self {
            Self::Http(client) => client.is_enabled(),
            Self::Disabled(none) => none.is_enabled(),
        }
    }
}
