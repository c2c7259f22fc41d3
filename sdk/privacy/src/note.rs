//! Privacy Notes
//!
//! A note is the wallet's record of one fixed-denomination deposit.
//!
//! ```text
//! C    = value * G + blinding * H
//! leaf = Poseidon(DOMAIN_NOTE, C.x, C.y, Poseidon(nullifier_secret))
//! ```
//!
//! The leaf is what goes into the pool's Merkle tree. Only `spent` ever
//! changes after the note is created, and only from false to true.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::commitment::Commitment;
use crate::curve::Scalar;
use crate::denomination::Denomination;
use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::nullifier::{Nullifier, NullifierScope, derive_nullifier, derive_scoped_nullifier};
use crate::poseidon::{poseidon_hash, short_string};

static DOMAIN_NOTE: LazyLock<Felt> = LazyLock::new(|| short_string("shade.note"));

/// Secret material chosen before a deposit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSecrets {
    pub nullifier_secret: Felt,
    pub blinding: Scalar,
}

impl NoteSecrets {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            nullifier_secret: Scalar::random(rng).to_felt(),
            blinding: Scalar::random(rng),
        }
    }

    /// Deterministic secrets for the `index`-th note of a wallet seed, so
    /// notes can be recovered from the seed alone
    pub fn from_seed(seed: &[u8], index: u64) -> Self {
        let mut material = seed.to_vec();
        material.extend_from_slice(&index.to_le_bytes());
        Self {
            nullifier_secret: Scalar::from_seed("shade note nullifier v1", &material).to_felt(),
            blinding: Scalar::from_seed("shade note blinding v1", &material),
        }
    }

    pub fn pedersen_commitment(&self, denomination: Denomination) -> Commitment {
        Commitment::commit_amount(denomination.value(), &self.blinding)
    }

    /// Merkle leaf for a deposit of `denomination`
    pub fn commitment(&self, denomination: Denomination) -> Felt {
        note_leaf(&self.pedersen_commitment(denomination), &self.nullifier_secret)
    }

    /// Record the confirmed deposit
    pub fn into_note(
        self,
        denomination: Denomination,
        leaf_index: u64,
        deposit_tx_hash: Option<Felt>,
    ) -> PrivacyNote {
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        PrivacyNote::new(self, denomination, leaf_index, deposit_tx_hash, created_at)
    }
}

/// `Poseidon(DOMAIN_NOTE, C.x, C.y, Poseidon(nullifier_secret))`
pub fn note_leaf(commitment: &Commitment, nullifier_secret: &Felt) -> Felt {
    let (x, y) = commitment.to_coordinates();
    let secret_hash = poseidon_hash(std::slice::from_ref(nullifier_secret));
    poseidon_hash(&[DOMAIN_NOTE.clone(), x, y, secret_hash])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacyNote {
    denomination: Denomination,
    commitment: Felt,
    nullifier_secret: Felt,
    blinding: Scalar,
    leaf_index: u64,
    deposit_tx_hash: Option<Felt>,
    created_at: u64,
    spent: bool,
}

impl PrivacyNote {
    pub fn new(
        secrets: NoteSecrets,
        denomination: Denomination,
        leaf_index: u64,
        deposit_tx_hash: Option<Felt>,
        created_at: u64,
    ) -> Self {
        let commitment = secrets.commitment(denomination);
        Self {
            denomination,
            commitment,
            nullifier_secret: secrets.nullifier_secret,
            blinding: secrets.blinding,
            leaf_index,
            deposit_tx_hash,
            created_at,
            spent: false,
        }
    }

    pub fn denomination(&self) -> Denomination {
        self.denomination
    }

    pub fn value(&self) -> u128 {
        self.denomination.value()
    }

    /// The Merkle leaf
    pub fn commitment(&self) -> &Felt {
        &self.commitment
    }

    pub fn nullifier_secret(&self) -> &Felt {
        &self.nullifier_secret
    }

    pub fn blinding(&self) -> &Scalar {
        &self.blinding
    }

    pub fn leaf_index(&self) -> u64 {
        self.leaf_index
    }

    pub fn deposit_tx_hash(&self) -> Option<&Felt> {
        self.deposit_tx_hash.as_ref()
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    pub fn nullifier(&self) -> Nullifier {
        derive_nullifier(&self.nullifier_secret, self.leaf_index)
    }

    pub fn scoped_nullifier(&self, scope: NullifierScope) -> Nullifier {
        derive_scoped_nullifier(scope, &self.nullifier_secret, self.leaf_index)
    }

    pub fn pedersen_commitment(&self) -> Commitment {
        Commitment::commit_amount(self.value(), &self.blinding)
    }

    /// Recompute the leaf from the secrets and compare
    pub fn is_consistent(&self) -> bool {
        note_leaf(&self.pedersen_commitment(), &self.nullifier_secret) == self.commitment
    }

    pub fn mark_spent(&mut self) -> Result<()> {
        if self.spent {
            return Err(PrivacyError::NoteAlreadySpent);
        }
        self.spent = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_note_commitment_deterministic() {
        let secrets = NoteSecrets::from_seed(b"wallet seed", 0);
        assert_eq!(
            secrets.commitment(Denomination::One),
            secrets.commitment(Denomination::One)
        );
        assert_ne!(
            secrets.commitment(Denomination::One),
            secrets.commitment(Denomination::Ten),
            "denomination must be bound into the leaf"
        );
    }

    #[test]
    fn test_seed_recovery() {
        let a = NoteSecrets::from_seed(b"wallet seed", 3);
        let b = NoteSecrets::from_seed(b"wallet seed", 3);
        let c = NoteSecrets::from_seed(b"wallet seed", 4);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_note_lifecycle() {
        let mut rng = StdRng::seed_from_u64(42);
        let secrets = NoteSecrets::random(&mut rng);
        let leaf = secrets.commitment(Denomination::Tenth);
        let mut note = secrets.into_note(Denomination::Tenth, 17, Some(Felt::from(0xabcu64)));

        assert_eq!(note.commitment(), &leaf);
        assert_eq!(note.leaf_index(), 17);
        assert!(note.is_consistent());
        assert!(!note.is_spent());
        assert_eq!(note.nullifier(), derive_nullifier(note.nullifier_secret(), 17));

        note.mark_spent().unwrap();
        assert!(note.is_spent());
        assert_eq!(note.mark_spent(), Err(PrivacyError::NoteAlreadySpent));
    }

    #[test]
    fn test_scoped_nullifiers_differ() {
        let note = NoteSecrets::from_seed(b"s", 0).into_note(Denomination::One, 0, None);
        assert_ne!(
            note.scoped_nullifier(NullifierScope::Withdrawal),
            note.scoped_nullifier(NullifierScope::StealthPayment)
        );
    }

    #[test]
    fn test_note_serde_roundtrip() {
        let note = PrivacyNote::new(
            NoteSecrets::from_seed(b"serde", 1),
            Denomination::Hundred,
            5,
            None,
            1_700_000_000,
        );
        let json = serde_json::to_string(&note).unwrap();
        assert!(json.contains("\"leafIndex\":5"));
        let back: PrivacyNote = serde_json::from_str(&json).unwrap();
        assert_eq!(back, note);
    }
}
