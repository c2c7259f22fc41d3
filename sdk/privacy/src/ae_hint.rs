//! Authenticated-Encryption Hints
//!
//! Side-car to an ElGamal ciphertext that lets the recipient recover the
//! amount in O(1) instead of solving a discrete log.
//!
//! ```text
//! shared   = Poseidon(x, y)            of r * PK = sk * C1
//! enc_key  = Poseidon(shared, nonce, DOMAIN_ENC)
//! enc      = amount XOR low128(enc_key)
//! mac_key  = Poseidon(shared, nonce, DOMAIN_MAC)
//! mac      = Poseidon(mac_key, enc, nonce)
//! ```
//!
//! The nonce is `Poseidon(DOMAIN_NONCE, r)`; `r` is fresh per ciphertext, so
//! the key stream is never reused.

use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::commitment::generator_h;
use crate::curve::{Point, Scalar};
use crate::encryption::{
    Ciphertext, decrypt_point, encrypt, recipient_shared_secret, sender_shared_secret,
};
use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::nullifier::{ViewTag, view_tag};
use crate::poseidon::{poseidon_hash, short_string};

static DOMAIN_ENC: LazyLock<Felt> = LazyLock::new(|| short_string("shade.ae.enc"));
static DOMAIN_MAC: LazyLock<Felt> = LazyLock::new(|| short_string("shade.ae.mac"));
static DOMAIN_NONCE: LazyLock<Felt> = LazyLock::new(|| short_string("shade.ae.nonce"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AeHint {
    pub encrypted_amount: Felt,
    pub nonce: Felt,
    pub mac: Felt,
}

/// Nonce bound to the encryption randomness
pub fn derive_hint_nonce(r: &Scalar) -> Felt {
    poseidon_hash(&[DOMAIN_NONCE.clone(), r.to_felt()])
}

fn keystream(shared: &Felt, nonce: &Felt) -> u128 {
    poseidon_hash(&[shared.clone(), nonce.clone(), DOMAIN_ENC.clone()]).low_u128()
}

fn compute_mac(shared: &Felt, encrypted_amount: &Felt, nonce: &Felt) -> Felt {
    let mac_key = poseidon_hash(&[shared.clone(), nonce.clone(), DOMAIN_MAC.clone()]);
    poseidon_hash(&[mac_key, encrypted_amount.clone(), nonce.clone()])
}

/// Build a hint from an already agreed shared secret and an explicit nonce
pub fn create_ae_hint_with_nonce(amount: u128, shared: &Felt, nonce: Felt) -> AeHint {
    let encrypted_amount = Felt::from(amount ^ keystream(shared, &nonce));
    let mac = compute_mac(shared, &encrypted_amount, &nonce);
    AeHint {
        encrypted_amount,
        nonce,
        mac,
    }
}

/// Sender side: hint for the ciphertext encrypted under `r` to `public_key`
pub fn create_ae_hint(amount: u128, r: &Scalar, public_key: &Point) -> AeHint {
    let shared = sender_shared_secret(r, public_key);
    create_ae_hint_with_nonce(amount, &shared, derive_hint_nonce(r))
}

pub fn verify_ae_hint_mac(hint: &AeHint, shared: &Felt) -> bool {
    compute_mac(shared, &hint.encrypted_amount, &hint.nonce) == hint.mac
}

/// Recipient side. A MAC mismatch is an integrity failure, never a soft miss.
pub fn decrypt_ae_hint(hint: &AeHint, c1: &Point, secret: &Scalar) -> Result<u128> {
    let shared = recipient_shared_secret(secret, c1);
    if !verify_ae_hint_mac(hint, &shared) {
        return Err(PrivacyError::IntegrityFailure);
    }
    // the masked amount is 128 bits wide by construction
    if !(hint.encrypted_amount.as_biguint() >> 128usize).is_zero() {
        return Err(PrivacyError::IntegrityFailure);
    }
    Ok(hint.encrypted_amount.low_u128() ^ keystream(&shared, &hint.nonce))
}

/// Hint decryption plus one scalar multiplication checking
/// `C2 - sk * C1 == amount * H`, so tampering with either point is caught.
pub fn decrypt_with_hint(ciphertext: &Ciphertext, hint: &AeHint, secret: &Scalar) -> Result<u128> {
    let amount = decrypt_ae_hint(hint, &ciphertext.c1, secret)?;
    if decrypt_point(ciphertext, secret) != generator_h().mul_u128(amount) {
        return Err(PrivacyError::IntegrityFailure);
    }
    Ok(amount)
}

/// Everything a sender publishes about an encrypted amount
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAmount {
    pub ciphertext: Ciphertext,
    pub hint: AeHint,
    pub view_tag: ViewTag,
}

/// Encrypt `amount` to `public_key` with randomness `r`
pub fn encrypt_amount(amount: u128, public_key: &Point, r: &Scalar) -> EncryptedAmount {
    let ciphertext = encrypt(amount, public_key, r);
    let shared = sender_shared_secret(r, public_key);
    let hint = create_ae_hint_with_nonce(amount, &shared, derive_hint_nonce(r));
    EncryptedAmount {
        ciphertext,
        hint,
        view_tag: view_tag(&shared),
    }
}

impl EncryptedAmount {
    /// Scan with a view key: `Ok(None)` when the view tag says this output
    /// is not ours, an integrity error when it claims to be but fails.
    pub fn try_open(&self, secret: &Scalar) -> Result<Option<u128>> {
        let shared = recipient_shared_secret(secret, &self.ciphertext.c1);
        if view_tag(&shared) != self.view_tag {
            return Ok(None);
        }
        decrypt_with_hint(&self.ciphertext, &self.hint, secret).map(Some)
    }
}
