//! Nullifiers and View Tags
//!
//! A nullifier is published when a note is spent. It is deterministic in the
//! note's secret and leaf position, so a second spend produces the same value
//! and the on-chain nullifier set rejects it.
//!
//! ```text
//! nullifier        = Poseidon(secret, leaf_index)
//! scoped nullifier = Poseidon(scope_domain, secret, leaf_index)
//! ```
//!
//! View tags are a one-byte pre-filter letting a recipient skip most outputs
//! that are not theirs without attempting decryption.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use crate::curve::{Point, Scalar};
use crate::encryption::{recipient_shared_secret, sender_shared_secret};
use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::poseidon::{poseidon_hash, short_string};

static DOMAIN_WITHDRAWAL: LazyLock<Felt> = LazyLock::new(|| short_string("shade.nf.withdraw"));
static DOMAIN_STEALTH: LazyLock<Felt> = LazyLock::new(|| short_string("shade.nf.stealth"));
static DOMAIN_VIEW_TAG: LazyLock<Felt> = LazyLock::new(|| short_string("shade.view_tag"));

/// A nullifier (spent marker)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nullifier(pub Felt);

impl Nullifier {
    pub fn as_felt(&self) -> &Felt {
        &self.0
    }
}

impl fmt::Display for Nullifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Poseidon(secret, leaf_index)`
pub fn derive_nullifier(secret: &Felt, leaf_index: u64) -> Nullifier {
    Nullifier(poseidon_hash(&[secret.clone(), Felt::from(leaf_index)]))
}

/// Feature the nullifier is spent in. Different scopes never collide, so a
/// withdrawal and a stealth payment of the same note are uncorrelated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullifierScope {
    Withdrawal,
    StealthPayment,
}

impl NullifierScope {
    pub fn domain(self) -> &'static Felt {
        match self {
            NullifierScope::Withdrawal => &DOMAIN_WITHDRAWAL,
            NullifierScope::StealthPayment => &DOMAIN_STEALTH,
        }
    }
}

pub fn derive_scoped_nullifier(scope: NullifierScope, secret: &Felt, leaf_index: u64) -> Nullifier {
    Nullifier(poseidon_hash(&[
        scope.domain().clone(),
        secret.clone(),
        Felt::from(leaf_index),
    ]))
}

/// Local mirror of the spent-nullifier set
#[derive(Debug, Default, Clone)]
pub struct NullifierSet {
    spent: HashSet<Nullifier>,
}

impl NullifierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a spend; a repeated nullifier is a double spend
    pub fn insert(&mut self, nullifier: Nullifier) -> Result<()> {
        if self.spent.contains(&nullifier) {
            return Err(PrivacyError::DoubleSpend(nullifier.to_string()));
        }
        self.spent.insert(nullifier);
        Ok(())
    }

    pub fn contains(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains(nullifier)
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}

// ============================================================================
// View tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewTag(pub u8);

/// Low byte of `Poseidon(DOMAIN_VIEW_TAG, shared)`
pub fn view_tag(shared: &Felt) -> ViewTag {
    let digest = poseidon_hash(&[DOMAIN_VIEW_TAG.clone(), shared.clone()]);
    ViewTag(digest.to_be_bytes()[31])
}

pub fn sender_view_tag(r: &Scalar, public_key: &Point) -> ViewTag {
    view_tag(&sender_shared_secret(r, public_key))
}

pub fn recipient_view_tag(secret: &Scalar, c1: &Point) -> ViewTag {
    view_tag(&recipient_shared_secret(secret, c1))
}

/// Probabilistic: a match only means "worth trying to decrypt"
pub fn matches_view_tag(secret: &Scalar, c1: &Point, tag: ViewTag) -> bool {
    recipient_view_tag(secret, c1) == tag
}
