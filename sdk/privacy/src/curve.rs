//! STARK Curve
//!
//! Short Weierstrass curve over the STARK prime field:
//!
//! ```text
//! y^2 = x^3 + alpha * x + beta   (mod p),   alpha = 1
//! ```
//!
//! Points are a tagged variant so the identity can never be confused with a
//! coordinate pair. The legacy `(0, 0)` encoding of the identity only exists
//! at the coordinate boundary ([`Point::from_coordinates`] /
//! [`Point::to_coordinates`]).

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::sync::LazyLock;

use crate::error::{PrivacyError, Result};
use crate::field::{Felt, mod_reduce};

const BETA_HEX: &str = "6f21413efbe40de150e596d72f7a8c5609ad26c15c915c1f4cdfcb99cee9e89";
const ORDER_HEX: &str = "800000000000010ffffffffffffffffb781126dcae7b2321e66a241adc64d2f";
const GEN_X_HEX: &str = "1ef15c18599971b7beced415a40f0c7deacfd9b0d1819e03d723d8bc943cfca";
const GEN_Y_HEX: &str = "5668060aa49730b7be4801df46ec62de53ecd11abe43a32873000c36e8dc1f";

pub(crate) fn parse_constant(hex: &str) -> BigUint {
    BigUint::parse_bytes(hex.as_bytes(), 16).expect("Invalid curve constant")
}

/// Curve coefficient beta
pub static CURVE_BETA: LazyLock<Felt> = LazyLock::new(|| Felt::new(parse_constant(BETA_HEX)));

/// Order N of the generator subgroup (the whole curve group)
pub static CURVE_ORDER: LazyLock<BigUint> = LazyLock::new(|| parse_constant(ORDER_HEX));

/// Standard STARK curve generator G
pub static GENERATOR: LazyLock<Point> = LazyLock::new(|| Point::Affine {
    x: Felt::new(parse_constant(GEN_X_HEX)),
    y: Felt::new(parse_constant(GEN_Y_HEX)),
});

/// Right-hand side of the curve equation, x^3 + x + beta
pub(crate) fn curve_rhs(x: &Felt) -> Felt {
    &(&(x.square() * x) + x) + &*CURVE_BETA
}

// ============================================================================
// Scalar
// ============================================================================

/// Integer modulo the curve order. Private keys, blinding factors and
/// encryption randomness are all scalars.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Scalar(BigUint);

impl Scalar {
    pub fn new(value: BigUint) -> Self {
        Self(value % &*CURVE_ORDER)
    }

    /// Signed constructor; `-k` maps to `N - k`
    pub fn from_signed(value: &BigInt) -> Self {
        Self(mod_reduce(value, &CURVE_ORDER))
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    /// Uniform non-zero scalar. 512 bits are reduced to keep the bias negligible.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        loop {
            let mut wide = [0u8; 64];
            rng.fill_bytes(&mut wide);
            let scalar = Self::new(BigUint::from_bytes_be(&wide));
            if !scalar.is_zero() {
                return scalar;
            }
        }
    }

    /// Deterministic scalar from seed material (blake3 XOF, wide reduction)
    pub fn from_seed(context: &str, seed: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(context);
        hasher.update(seed);
        let mut wide = [0u8; 64];
        hasher.finalize_xof().fill(&mut wide);
        Self::new(BigUint::from_bytes_be(&wide))
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The same integer as a field element (N < p, so this is lossless)
    pub fn to_felt(&self) -> Felt {
        Felt::new(self.0.clone())
    }

    pub fn add(&self, other: &Scalar) -> Scalar {
        Self::new(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &Scalar) -> Scalar {
        self.add(&other.negate())
    }

    pub fn mul(&self, other: &Scalar) -> Scalar {
        Self::new(&self.0 * &other.0)
    }

    pub fn negate(&self) -> Scalar {
        if self.is_zero() {
            Self::zero()
        } else {
            Self(&*CURVE_ORDER - &self.0)
        }
    }

    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Self::new(BigUint::from(value))
    }
}

impl From<u128> for Scalar {
    fn from(value: u128) -> Self {
        Self::new(BigUint::from(value))
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // scalars are usually secret
        write!(f, "Scalar(..)")
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let digits = s
            .strip_prefix("0x")
            .ok_or_else(|| de::Error::custom("scalar must be 0x-prefixed hex"))?;
        let value = BigUint::parse_bytes(digits.as_bytes(), 16)
            .ok_or_else(|| de::Error::custom(format!("invalid scalar {s:?}")))?;
        if value >= *CURVE_ORDER {
            return Err(de::Error::custom("scalar exceeds curve order"));
        }
        Ok(Scalar(value))
    }
}

// ============================================================================
// Point
// ============================================================================

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", try_from = "UncheckedPoint")]
pub enum Point {
    Infinity,
    Affine { x: Felt, y: Felt },
}

/// Wire shape of [`Point`] before the curve check
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum UncheckedPoint {
    Infinity,
    Affine { x: Felt, y: Felt },
}

impl TryFrom<UncheckedPoint> for Point {
    type Error = PrivacyError;

    fn try_from(raw: UncheckedPoint) -> Result<Point> {
        let point = match raw {
            UncheckedPoint::Infinity => Point::Infinity,
            UncheckedPoint::Affine { x, y } => Point::Affine { x, y },
        };
        if !point.is_on_curve() {
            return Err(PrivacyError::InvalidPoint);
        }
        Ok(point)
    }
}

impl Point {
    pub fn generator() -> Point {
        GENERATOR.clone()
    }

    /// Validate coordinates received from outside. `(0, 0)` is the identity.
    pub fn from_coordinates(x: Felt, y: Felt) -> Result<Point> {
        if x.is_zero() && y.is_zero() {
            return Ok(Point::Infinity);
        }
        let point = Point::Affine { x, y };
        if !point.is_on_curve() {
            return Err(PrivacyError::InvalidPoint);
        }
        Ok(point)
    }

    /// Coordinate pair with the identity encoded as `(0, 0)`
    pub fn to_coordinates(&self) -> (Felt, Felt) {
        match self {
            Point::Infinity => (Felt::zero(), Felt::zero()),
            Point::Affine { x, y } => (x.clone(), y.clone()),
        }
    }

    pub fn is_infinity(&self) -> bool {
        matches!(self, Point::Infinity)
    }

    pub fn is_on_curve(&self) -> bool {
        match self {
            Point::Infinity => true,
            Point::Affine { x, y } => y.square() == curve_rhs(x),
        }
    }

    pub fn negate(&self) -> Point {
        match self {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => Point::Affine {
                x: x.clone(),
                y: -y,
            },
        }
    }

    pub fn double(&self) -> Point {
        let Point::Affine { x, y } = self else {
            return Point::Infinity;
        };
        // vertical tangent
        let Some(inv) = y.double().inverse() else {
            return Point::Infinity;
        };

        let numerator = &(x.square() * Felt::from(3u64)) + &Felt::one();
        let lambda = numerator * inv;
        let x3 = &(lambda.square() - x) - x;
        let y3 = &(&lambda * &(x - &x3)) - y;
        Point::Affine { x: x3, y: y3 }
    }

    /// Full affine addition law
    pub fn add_point(&self, other: &Point) -> Point {
        let (x1, y1, x2, y2) = match (self, other) {
            (Point::Infinity, q) => return q.clone(),
            (p, Point::Infinity) => return p.clone(),
            (Point::Affine { x: x1, y: y1 }, Point::Affine { x: x2, y: y2 }) => (x1, y1, x2, y2),
        };

        if x1 == x2 {
            return if y1 == y2 {
                self.double()
            } else {
                Point::Infinity
            };
        }

        let Some(inv) = (x2 - x1).inverse() else {
            return Point::Infinity;
        };
        let lambda = (y2 - y1) * inv;
        let x3 = &(lambda.square() - x1) - x2;
        let y3 = &(&lambda * &(x1 - &x3)) - y1;
        Point::Affine { x: x3, y: y3 }
    }

    pub fn sub_point(&self, other: &Point) -> Point {
        self.add_point(&other.negate())
    }

    /// Double-and-add scalar multiplication (scalar already reduced mod N)
    pub fn mul_scalar(&self, k: &Scalar) -> Point {
        if k.is_zero() || self.is_infinity() {
            return Point::Infinity;
        }

        let base = Jacobian::from_affine(self);
        let mut acc = Jacobian::infinity();
        let bits = k.as_biguint().bits();
        for i in (0..bits).rev() {
            acc = acc.double();
            if k.as_biguint().bit(i) {
                acc = acc.add(&base);
            }
        }
        acc.to_affine()
    }

    /// Signed scalar multiplication; negative scalars negate the point
    pub fn mul_signed(&self, k: &BigInt) -> Point {
        let (sign, magnitude) = k.clone().into_parts();
        let product = self.mul_scalar(&Scalar::new(magnitude));
        if sign == Sign::Minus {
            product.negate()
        } else {
            product
        }
    }

    pub fn mul_u128(&self, k: u128) -> Point {
        self.mul_scalar(&Scalar::from(k))
    }
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Point::Infinity => write!(f, "Point(inf)"),
            Point::Affine { x, y } => write!(f, "Point({x}, {y})"),
        }
    }
}

impl Add<&Point> for &Point {
    type Output = Point;

    fn add(self, rhs: &Point) -> Point {
        self.add_point(rhs)
    }
}

impl Sub<&Point> for &Point {
    type Output = Point;

    fn sub(self, rhs: &Point) -> Point {
        self.sub_point(rhs)
    }
}

impl Neg for &Point {
    type Output = Point;

    fn neg(self) -> Point {
        self.negate()
    }
}

impl Mul<&Scalar> for &Point {
    type Output = Point;

    fn mul(self, rhs: &Scalar) -> Point {
        self.mul_scalar(rhs)
    }
}

// ============================================================================
// Jacobian coordinates (internal, one inversion per scalar multiplication)
// ============================================================================

/// (X, Y, Z) represents the affine point (X / Z^2, Y / Z^3); Z = 0 is the identity.
struct Jacobian {
    x: Felt,
    y: Felt,
    z: Felt,
}

impl Jacobian {
    fn infinity() -> Self {
        Self {
            x: Felt::one(),
            y: Felt::one(),
            z: Felt::zero(),
        }
    }

    fn from_affine(point: &Point) -> Self {
        match point {
            Point::Infinity => Self::infinity(),
            Point::Affine { x, y } => Self {
                x: x.clone(),
                y: y.clone(),
                z: Felt::one(),
            },
        }
    }

    fn is_infinity(&self) -> bool {
        self.z.is_zero()
    }

    fn to_affine(&self) -> Point {
        let Some(z_inv) = self.z.inverse() else {
            return Point::Infinity;
        };
        let z_inv2 = z_inv.square();
        Point::Affine {
            x: &self.x * &z_inv2,
            y: &(&self.y * &z_inv2) * &z_inv,
        }
    }

    fn double(&self) -> Self {
        if self.is_infinity() || self.y.is_zero() {
            return Self::infinity();
        }

        let xx = self.x.square();
        let yy = self.y.square();
        let yyyy = yy.square();
        let zz = self.z.square();

        let s = (&self.x * &yy) * Felt::from(4u64);
        // alpha = 1
        let m = &(&xx * &Felt::from(3u64)) + &zz.square();
        let x3 = &m.square() - &s.double();
        let y3 = &(&m * &(&s - &x3)) - &(yyyy * Felt::from(8u64));
        let z3 = (&self.y * &self.z).double();

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }

    fn add(&self, other: &Jacobian) -> Self {
        if self.is_infinity() {
            return Self {
                x: other.x.clone(),
                y: other.y.clone(),
                z: other.z.clone(),
            };
        }
        if other.is_infinity() {
            return Self {
                x: self.x.clone(),
                y: self.y.clone(),
                z: self.z.clone(),
            };
        }

        let z1z1 = self.z.square();
        let z2z2 = other.z.square();
        let u1 = &self.x * &z2z2;
        let u2 = &other.x * &z1z1;
        let s1 = &(&self.y * &other.z) * &z2z2;
        let s2 = &(&other.y * &self.z) * &z1z1;

        if u1 == u2 {
            return if s1 == s2 {
                self.double()
            } else {
                Self::infinity()
            };
        }

        let h = &u2 - &u1;
        let r = &s2 - &s1;
        let hh = h.square();
        let hhh = &h * &hh;
        let v = &u1 * &hh;

        let x3 = &(&r.square() - &hhh) - &v.double();
        let y3 = &(&r * &(&v - &x3)) - &(&s1 * &hhh);
        let z3 = &(&self.z * &other.z) * &h;

        Self {
            x: x3,
            y: y3,
            z: z3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generator_on_curve() {
        assert!(Point::generator().is_on_curve());
        assert!(Point::Infinity.is_on_curve());
    }

    #[test]
    fn test_add_inverse_is_identity() {
        let g = Point::generator();
        assert_eq!(g.add_point(&g.negate()), Point::Infinity);
        assert_eq!(&g - &g, Point::Infinity);
    }

    #[test]
    fn test_identity_cases() {
        let g = Point::generator();
        assert_eq!(Point::Infinity.add_point(&g), g);
        assert_eq!(g.add_point(&Point::Infinity), g);
        assert_eq!(Point::Infinity.double(), Point::Infinity);
    }

    #[test]
    fn test_double_matches_add() {
        let g = Point::generator();
        let doubled = g.double();
        assert_eq!(g.add_point(&g), doubled);
        assert!(doubled.is_on_curve());
        assert_eq!(g.mul_scalar(&Scalar::from(2u64)), doubled);
    }

    #[test]
    fn test_scalar_mul_small() {
        let g = Point::generator();
        let three = g.add_point(&g).add_point(&g);
        assert_eq!(g.mul_u128(3), three);
        assert_eq!(g.mul_u128(1), g);
        assert_eq!(g.mul_scalar(&Scalar::zero()), Point::Infinity);
    }

    #[test]
    fn test_scalar_mul_distributes() {
        let g = Point::generator();
        let a = Scalar::from(0xdead_beef_u64);
        let b = Scalar::from(0x1234_5678_9abc_u64);
        let lhs = g.mul_scalar(&a.add(&b));
        let rhs = g.mul_scalar(&a).add_point(&g.mul_scalar(&b));
        assert_eq!(lhs, rhs);
        assert!(lhs.is_on_curve());
    }

    #[test]
    fn test_order_minus_one_is_negation() {
        let g = Point::generator();
        let n_minus_one = Scalar::new(&*CURVE_ORDER - 1u32);
        assert_eq!(g.mul_scalar(&n_minus_one), g.negate());
    }

    #[test]
    fn test_negative_scalar() {
        let g = Point::generator();
        let neg = g.mul_signed(&BigInt::from(-5));
        assert_eq!(neg, g.mul_u128(5).negate());
        assert_eq!(neg.add_point(&g.mul_u128(5)), Point::Infinity);
        assert_eq!(
            g.mul_scalar(&Scalar::from_signed(&BigInt::from(-5))),
            neg
        );
    }

    #[test]
    fn test_from_coordinates() {
        let (x, y) = Point::generator().to_coordinates();
        assert_eq!(Point::from_coordinates(x.clone(), y).unwrap(), Point::generator());
        assert_eq!(
            Point::from_coordinates(x.clone(), Felt::from(1u64)),
            Err(PrivacyError::InvalidPoint)
        );
        assert_eq!(
            Point::from_coordinates(Felt::zero(), Felt::zero()).unwrap(),
            Point::Infinity
        );
        assert_eq!(
            Point::Infinity.to_coordinates(),
            (Felt::zero(), Felt::zero())
        );
    }

    #[test]
    fn test_scalar_ops() {
        let a = Scalar::from(5u64);
        let b = Scalar::from(7u64);
        assert_eq!(a.sub(&b).add(&b), a);
        assert_eq!(a.negate().add(&a), Scalar::zero());
        assert_eq!(a.mul(&b), Scalar::from(35u64));
    }

    #[test]
    fn test_scalar_from_seed_deterministic() {
        let a = Scalar::from_seed("shade test", b"seed");
        let b = Scalar::from_seed("shade test", b"seed");
        let c = Scalar::from_seed("shade test", b"other");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_scalar_serde() {
        let s = Scalar::from(0xabcu64);
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"0xabc\"");
        let back: Scalar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_point_serde() {
        let g = Point::generator();
        let json = serde_json::to_string(&g).unwrap();
        let back: Point = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);

        let json = serde_json::to_string(&Point::Infinity).unwrap();
        assert_eq!(json, r#"{"type":"infinity"}"#);
    }

    #[test]
    fn test_point_deserialize_rejects_off_curve() {
        let json = r#"{"type":"affine","x":"0x1","y":"0x1"}"#;
        let err = serde_json::from_str::<Point>(json).unwrap_err();
        assert!(err.to_string().contains("not on the STARK curve"), "{err}");

        // (0, 0) is only the identity at the coordinate boundary
        let json = r#"{"type":"affine","x":"0x0","y":"0x0"}"#;
        assert!(serde_json::from_str::<Point>(json).is_err());
    }
}
