//! Pedersen Commitments
//!
//! ```text
//! C = value * G + blinding * H
//! ```
//!
//! `H` is a nothing-up-my-sleeve generator from try-and-increment
//! hash-to-curve, so nobody knows log_G(H). It was derived once from
//! [`GENERATOR_H_DOMAIN`] and is stored as constant coordinates. Commitments are additively
//! homomorphic: `commit(v1, b1) + commit(v2, b2) = commit(v1 + v2, b1 + b2)`.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};
use std::sync::LazyLock;

use crate::curve::{Point, Scalar, curve_rhs, parse_constant};
use crate::field::{Felt, legendre_symbol, sqrt_mod};
use crate::poseidon::poseidon_hash;

/// Attempts before hash-to-curve gives up. Half of all x are valid, so
/// running out is a 2^-256 event.
pub const HASH_TO_CURVE_ATTEMPTS: u64 = 256;

/// Domain tag from which `H` is derived
pub const GENERATOR_H_DOMAIN: &str = "shade.pedersen.h";

/// `hash_to_curve(short_string(GENERATOR_H_DOMAIN))`, found at counter 0
const GEN_H_X_HEX: &str = "61a116331d4f41422c6843e0876948178d8458e94f99ef5736c380d998dabde";
const GEN_H_Y_HEX: &str = "2512cccf7c5119e9abd85e9dc1c2dc828dddcb5219be037d8c9dc3ebe125e02";

/// Second generator H
pub static GENERATOR_H: LazyLock<Point> = LazyLock::new(|| Point::Affine {
    x: Felt::new(parse_constant(GEN_H_X_HEX)),
    y: Felt::new(parse_constant(GEN_H_Y_HEX)),
});

/// Try-and-increment: `x = Poseidon(domain, i)` until `x^3 + x + beta` is a
/// square, then take the canonical root `y <= (p - 1) / 2`.
pub fn hash_to_curve(domain: &Felt) -> Option<Point> {
    (0..HASH_TO_CURVE_ATTEMPTS).find_map(|counter| {
        let x = poseidon_hash(&[domain.clone(), Felt::from(counter)]);
        let rhs = curve_rhs(&x);
        if legendre_symbol(&rhs) != 1 {
            return None;
        }
        let y = sqrt_mod(&rhs)?;
        let y = if y.is_lower_half() { y } else { -y };
        Some(Point::Affine { x, y })
    })
}

pub fn generator_h() -> &'static Point {
    &GENERATOR_H
}

/// A Pedersen commitment (a curve point)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(Point);

impl Commitment {
    /// C = value * G + blinding * H
    pub fn commit(value: &Scalar, blinding: &Scalar) -> Self {
        let vg = Point::generator().mul_scalar(value);
        let bh = GENERATOR_H.mul_scalar(blinding);
        Self(vg.add_point(&bh))
    }

    pub fn commit_amount(amount: u128, blinding: &Scalar) -> Self {
        Self::commit(&Scalar::from(amount), blinding)
    }

    /// Wrap a point received from outside; it must lie on the curve
    pub fn from_point(point: Point) -> crate::Result<Self> {
        if !point.is_on_curve() {
            return Err(crate::PrivacyError::InvalidPoint);
        }
        Ok(Self(point))
    }

    pub fn point(&self) -> &Point {
        &self.0
    }

    pub fn into_point(self) -> Point {
        self.0
    }

    /// Coordinates with the identity as `(0, 0)`
    pub fn to_coordinates(&self) -> (Felt, Felt) {
        self.0.to_coordinates()
    }
}

impl Add<&Commitment> for &Commitment {
    type Output = Commitment;

    fn add(self, rhs: &Commitment) -> Commitment {
        Commitment(self.0.add_point(&rhs.0))
    }
}

impl Sub<&Commitment> for &Commitment {
    type Output = Commitment;

    fn sub(self, rhs: &Commitment) -> Commitment {
        Commitment(self.0.sub_point(&rhs.0))
    }
}

/// Check that `(value, blinding)` opens `commitment`
pub fn verify_opening(commitment: &Commitment, value: &Scalar, blinding: &Scalar) -> bool {
    Commitment::commit(value, blinding) == *commitment
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poseidon::short_string;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn test_generator_h_on_curve() {
        let h = generator_h();
        assert!(h.is_on_curve());
        assert!(!h.is_infinity());
        assert_ne!(*h, Point::generator());
    }

    #[test]
    fn test_generator_h_reproducible() {
        let derived = hash_to_curve(&short_string(GENERATOR_H_DOMAIN)).unwrap();
        assert_eq!(derived, *generator_h());
    }

    #[test]
    fn test_hash_to_curve_canonical_y() {
        let point = hash_to_curve(&short_string("some other domain")).unwrap();
        match point {
            Point::Affine { ref y, .. } => assert!(y.is_lower_half()),
            Point::Infinity => panic!("hash-to-curve returned the identity"),
        }
        assert!(point.is_on_curve());
    }

    #[test]
    fn test_commitment_deterministic() {
        let blinding = Scalar::from(42u64);
        let c1 = Commitment::commit_amount(100, &blinding);
        let c2 = Commitment::commit_amount(100, &blinding);
        assert_eq!(c1, c2, "same inputs should produce same commitment");
    }

    #[test]
    fn test_commitment_hiding() {
        let mut rng = StdRng::seed_from_u64(7);
        let c1 = Commitment::commit_amount(100, &Scalar::random(&mut rng));
        let c2 = Commitment::commit_amount(100, &Scalar::random(&mut rng));
        assert_ne!(c1, c2, "different blindings should produce different commitments");
    }

    #[test]
    fn test_commitment_binding() {
        let blinding = Scalar::from(9u64);
        let c1 = Commitment::commit_amount(100, &blinding);
        let c2 = Commitment::commit_amount(200, &blinding);
        assert_ne!(c1, c2, "different values should produce different commitments");
    }

    #[test]
    fn test_verify_opening() {
        let value = Scalar::from(1000u64);
        let blinding = Scalar::from(31337u64);
        let c = Commitment::commit(&value, &blinding);
        assert!(verify_opening(&c, &value, &blinding));
        assert!(!verify_opening(&c, &Scalar::from(1001u64), &blinding));
        assert!(!verify_opening(&c, &value, &Scalar::from(31338u64)));
    }

    #[test]
    fn test_homomorphic_add_sub() {
        let (v1, b1) = (Scalar::from(30u64), Scalar::from(11u64));
        let (v2, b2) = (Scalar::from(12u64), Scalar::from(5u64));
        let c1 = Commitment::commit(&v1, &b1);
        let c2 = Commitment::commit(&v2, &b2);

        assert_eq!(&c1 + &c2, Commitment::commit(&v1.add(&v2), &b1.add(&b2)));
        assert_eq!(&c1 - &c2, Commitment::commit(&v1.sub(&v2), &b1.sub(&b2)));
    }

    #[test]
    fn test_deserialize_rejects_off_curve() {
        let c = Commitment::commit_amount(5, &Scalar::from(3u64));
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(serde_json::from_str::<Commitment>(&json).unwrap(), c);

        let bogus = r#"{"type":"affine","x":"0x1","y":"0x1"}"#;
        assert!(serde_json::from_str::<Commitment>(bogus).is_err());
    }

    #[test]
    fn test_from_point_rejects_off_curve() {
        let bogus = Point::Affine {
            x: Felt::from(1u64),
            y: Felt::from(1u64),
        };
        assert!(Commitment::from_point(bogus).is_err());
    }
}
