//! ElGamal Amount Encryption
//!
//! Additively homomorphic ElGamal over the STARK curve, with the amount
//! encoded on the Pedersen generator `H`:
//!
//! ```text
//! C1 = r * G
//! C2 = amount * H + r * PK
//! ```
//!
//! Recovering `amount` from `amount * H` is a discrete log, so decryption
//! here is a diagnostic path only. Production decryption goes through the
//! AE hint (see [`crate::ae_hint`]).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::commitment::generator_h;
use crate::curve::{Point, Scalar};
use crate::denomination::Denomination;
use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::poseidon::poseidon_hash;

/// Default bound for [`decrypt_bounded`] when callers have no better estimate
pub const DEFAULT_DLOG_BOUND: u64 = 1 << 20;

/// ElGamal key pair, `PK = sk * G`
#[derive(Debug, Clone)]
pub struct ElGamalKeypair {
    secret: Scalar,
    public: Point,
}

impl ElGamalKeypair {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::from_secret(Scalar::random(rng))
    }

    pub fn from_secret(secret: Scalar) -> Self {
        let public = Point::generator().mul_scalar(&secret);
        Self { secret, public }
    }

    /// Deterministic key pair from wallet seed material
    pub fn from_seed(seed: &[u8]) -> Self {
        Self::from_secret(Scalar::from_seed("shade elgamal key v1", seed))
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> &Point {
        &self.public
    }
}

/// An ElGamal ciphertext `(C1, C2)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    pub c1: Point,
    pub c2: Point,
}

impl Ciphertext {
    /// Encryption of zero with zero randomness, the additive identity
    pub fn zero() -> Self {
        Self {
            c1: Point::Infinity,
            c2: Point::Infinity,
        }
    }

    /// Enc(a) + Enc(b) = Enc(a + b)
    pub fn add(&self, other: &Ciphertext) -> Ciphertext {
        Ciphertext {
            c1: self.c1.add_point(&other.c1),
            c2: self.c2.add_point(&other.c2),
        }
    }

    /// Enc(a) - Enc(b) = Enc(a - b)
    pub fn sub(&self, other: &Ciphertext) -> Ciphertext {
        Ciphertext {
            c1: self.c1.sub_point(&other.c1),
            c2: self.c2.sub_point(&other.c2),
        }
    }

    /// Fresh randomness without changing the plaintext (adds Enc(0; r'))
    pub fn rerandomize(&self, public_key: &Point, r: &Scalar) -> Ciphertext {
        self.add(&encrypt(0, public_key, r))
    }

    /// Both components lie on the curve
    pub fn is_valid(&self) -> bool {
        self.c1.is_on_curve() && self.c2.is_on_curve()
    }
}

pub fn encrypt(amount: u128, public_key: &Point, r: &Scalar) -> Ciphertext {
    let c1 = Point::generator().mul_scalar(r);
    let masked = generator_h().mul_u128(amount);
    let c2 = masked.add_point(&public_key.mul_scalar(r));
    Ciphertext { c1, c2 }
}

/// `C2 - sk * C1 = amount * H`
pub fn decrypt_point(ciphertext: &Ciphertext, secret: &Scalar) -> Point {
    ciphertext.c2.sub_point(&ciphertext.c1.mul_scalar(secret))
}

/// Diagnostic decryption: only zero and the fixed denominations are tried.
pub fn decrypt(ciphertext: &Ciphertext, secret: &Scalar) -> Result<u128> {
    let target = decrypt_point(ciphertext, secret);
    if target.is_infinity() {
        return Ok(0);
    }

    Denomination::ALL
        .into_iter()
        .map(Denomination::value)
        .find(|value| generator_h().mul_u128(*value) == target)
        .ok_or(PrivacyError::DiscreteLogNotFound(Denomination::ALL.len() as u64 + 1))
}

/// Baby-step giant-step over `[0, bound)`. O(sqrt(bound)) time and memory.
pub fn decrypt_bounded(ciphertext: &Ciphertext, secret: &Scalar, bound: u64) -> Result<u64> {
    let target = decrypt_point(ciphertext, secret);
    let h = generator_h();

    let mut m = bound.isqrt();
    if m * m < bound {
        m += 1;
    }
    let m = m.max(1);

    let mut baby_steps = HashMap::with_capacity(m as usize);
    let mut current = Point::Infinity;
    for j in 0..m {
        baby_steps.entry(current.clone()).or_insert(j);
        current = current.add_point(h);
    }

    let giant_step = h.mul_u128(u128::from(m)).negate();
    let mut gamma = target;
    for i in 0..m {
        if let Some(j) = baby_steps.get(&gamma) {
            let value = i * m + j;
            if value < bound {
                return Ok(value);
            }
        }
        gamma = gamma.add_point(&giant_step);
    }

    Err(PrivacyError::DiscreteLogNotFound(bound))
}

// ============================================================================
// Shared secrets
// ============================================================================

/// `Poseidon(x, y)` of the Diffie-Hellman point
pub fn shared_secret(point: &Point) -> Felt {
    let (x, y) = point.to_coordinates();
    poseidon_hash(&[x, y])
}

/// Sender side: `r * PK`
pub fn sender_shared_secret(r: &Scalar, public_key: &Point) -> Felt {
    shared_secret(&public_key.mul_scalar(r))
}

/// Recipient side: `sk * C1` (equal to `r * PK`)
pub fn recipient_shared_secret(secret: &Scalar, c1: &Point) -> Felt {
    shared_secret(&c1.mul_scalar(secret))
}
