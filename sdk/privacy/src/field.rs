//! STARK Prime Field
//!
//! Elements of GF(p) with
//!
//! ```text
//! p = 2^251 + 17 * 2^192 + 1
//! ```
//!
//! [`Felt`] is always stored reduced. Its textual form is the on-chain one:
//! `0x`-prefixed, lowercase, unpadded hex (`0x0` for zero).

use num_bigint::{BigInt, BigUint, Sign};
use num_traits::{One, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{PrivacyError, Result};

/// The STARK prime
pub static STARK_PRIME: LazyLock<BigUint> = LazyLock::new(|| {
    (BigUint::one() << 251usize) + (BigUint::from(17u32) << 192usize) + BigUint::one()
});

/// (p - 1) / 2, the Euler criterion exponent and the canonical-root bound
static HALF_PRIME: LazyLock<BigUint> = LazyLock::new(|| (&*STARK_PRIME - 1u32) >> 1usize);

/// Precomputed Tonelli-Shanks decomposition p - 1 = q * 2^s and a non-residue
struct TonelliShanks {
    s: u64,
    q: BigUint,
    non_residue: BigUint,
}

static TONELLI_SHANKS: LazyLock<TonelliShanks> = LazyLock::new(|| {
    let p_minus_one = &*STARK_PRIME - 1u32;
    let s = p_minus_one.trailing_zeros().unwrap_or(0);
    let q = &p_minus_one >> s;

    let mut candidate = BigUint::from(2u32);
    while legendre(&candidate) != -1 {
        candidate += 1u32;
    }

    TonelliShanks {
        s,
        q,
        non_residue: candidate,
    }
});

// ============================================================================
// Modular helpers
// ============================================================================

/// Canonical non-negative residue of a signed integer
pub fn mod_reduce(a: &BigInt, m: &BigUint) -> BigUint {
    let modulus = BigInt::from(m.clone());
    let mut r = a % &modulus;
    if r.sign() == Sign::Minus {
        r += &modulus;
    }
    r.into_parts().1
}

/// Modular inverse via the extended Euclidean algorithm.
///
/// `None` when `a` shares a factor with `m` (in particular for zero).
pub fn mod_inverse(a: &BigUint, m: &BigUint) -> Option<BigUint> {
    if m.is_zero() {
        return None;
    }
    a.modinv(m)
}

/// Square-and-multiply modular exponentiation
pub fn mod_pow(base: &BigUint, exp: &BigUint, m: &BigUint) -> BigUint {
    if m.is_zero() {
        return BigUint::zero();
    }
    base.modpow(exp, m)
}

fn legendre(a: &BigUint) -> i8 {
    let a = a % &*STARK_PRIME;
    if a.is_zero() {
        return 0;
    }
    if a.modpow(&HALF_PRIME, &STARK_PRIME).is_one() {
        1
    } else {
        -1
    }
}

/// Legendre symbol (a | p): 1 for non-zero squares, -1 for non-squares, 0 for zero
pub fn legendre_symbol(a: &Felt) -> i8 {
    legendre(&a.0)
}

/// Square root in GF(p) by Tonelli-Shanks. Returns either root; callers
/// that need a canonical one use [`Felt::is_lower_half`].
pub fn sqrt_mod(a: &Felt) -> Option<Felt> {
    if a.is_zero() {
        return Some(Felt::zero());
    }
    if legendre(&a.0) != 1 {
        return None;
    }

    let p = &*STARK_PRIME;
    let ts = &*TONELLI_SHANKS;

    let mut m = ts.s;
    let mut c = ts.non_residue.modpow(&ts.q, p);
    let mut t = a.0.modpow(&ts.q, p);
    let mut r = a.0.modpow(&((&ts.q + 1u32) >> 1usize), p);

    while !t.is_one() {
        // least i with t^(2^i) == 1
        let mut i = 0u64;
        let mut t2i = t.clone();
        while !t2i.is_one() {
            t2i = &t2i * &t2i % p;
            i += 1;
            if i == m {
                return None;
            }
        }

        let mut b = c.clone();
        for _ in 0..(m - i - 1) {
            b = &b * &b % p;
        }

        m = i;
        c = &b * &b % p;
        t = t * &c % p;
        r = r * &b % p;
    }

    Some(Felt(r))
}

// ============================================================================
// Felt
// ============================================================================

/// A field element of GF(p), always reduced
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Felt(BigUint);

impl Felt {
    /// Reduce an arbitrary integer into the field
    pub fn new(value: BigUint) -> Self {
        if value < *STARK_PRIME {
            Self(value)
        } else {
            Self(value % &*STARK_PRIME)
        }
    }

    /// Strict constructor: rejects values `>= p`
    pub fn try_new(value: BigUint) -> Result<Self> {
        if value >= *STARK_PRIME {
            return Err(PrivacyError::InvalidFelt(format!(
                "0x{value:x} is not below the field modulus"
            )));
        }
        Ok(Self(value))
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn one() -> Self {
        Self(BigUint::one())
    }

    pub fn from_signed(value: &BigInt) -> Self {
        Self(mod_reduce(value, &STARK_PRIME))
    }

    pub fn from_be_bytes_mod_order(bytes: &[u8]) -> Self {
        Self::new(BigUint::from_bytes_be(bytes))
    }

    /// 32-byte big-endian encoding (left padded)
    pub fn to_be_bytes(&self) -> [u8; 32] {
        let bytes = self.0.to_bytes_be();
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        out
    }

    /// Parse `0x`-prefixed hex or plain decimal. Values `>= p` are rejected.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let value = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(digits) => {
                if digits.is_empty() {
                    return Err(PrivacyError::InvalidFelt(format!("empty hex literal {s:?}")));
                }
                BigUint::parse_bytes(digits.as_bytes(), 16)
            }
            None => BigUint::parse_bytes(s.as_bytes(), 10),
        }
        .ok_or_else(|| PrivacyError::InvalidFelt(format!("cannot parse {s:?}")))?;

        Self::try_new(value)
    }

    /// Wire form: `0x` + lowercase unpadded hex
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn bit(&self, i: u64) -> bool {
        self.0.bit(i)
    }

    /// The low 128 bits of the canonical representative
    pub fn low_u128(&self) -> u128 {
        self.0
            .iter_u64_digits()
            .take(2)
            .enumerate()
            .fold(0u128, |acc, (i, digit)| acc | (u128::from(digit) << (64 * i)))
    }

    /// True for the canonical square root, `self <= (p - 1) / 2`
    pub fn is_lower_half(&self) -> bool {
        self.0 <= *HALF_PRIME
    }

    pub fn square(&self) -> Self {
        self * self
    }

    pub fn pow(&self, exp: &BigUint) -> Self {
        Self(mod_pow(&self.0, exp, &STARK_PRIME))
    }

    /// Multiplicative inverse, `None` for zero
    pub fn inverse(&self) -> Option<Self> {
        mod_inverse(&self.0, &STARK_PRIME).map(Self)
    }

    pub fn sqrt(&self) -> Option<Self> {
        sqrt_mod(self)
    }

    pub fn double(&self) -> Self {
        self + self
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u128> for Felt {
    fn from(value: u128) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<u8> for Felt {
    fn from(value: u8) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for Felt {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt(0x{:x})", self.0)
    }
}

impl Serialize for Felt {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Felt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Felt::parse(&s).map_err(de::Error::custom)
    }
}

// ============================================================================
// Arithmetic
// ============================================================================

impl Add<&Felt> for &Felt {
    type Output = Felt;

    fn add(self, rhs: &Felt) -> Felt {
        Felt::new(&self.0 + &rhs.0)
    }
}

impl Sub<&Felt> for &Felt {
    type Output = Felt;

    fn sub(self, rhs: &Felt) -> Felt {
        if self.0 >= rhs.0 {
            Felt(&self.0 - &rhs.0)
        } else {
            Felt(&*STARK_PRIME - &rhs.0 + &self.0)
        }
    }
}

impl Mul<&Felt> for &Felt {
    type Output = Felt;

    fn mul(self, rhs: &Felt) -> Felt {
        Felt::new(&self.0 * &rhs.0)
    }
}

impl Neg for &Felt {
    type Output = Felt;

    fn neg(self) -> Felt {
        if self.is_zero() {
            Felt::zero()
        } else {
            Felt(&*STARK_PRIME - &self.0)
        }
    }
}

impl Neg for Felt {
    type Output = Felt;

    fn neg(self) -> Felt {
        -&self
    }
}

macro_rules! forward_owned_binop {
    ($($trait:ident, $method:ident);*) => {$(
        impl $trait<Felt> for Felt {
            type Output = Felt;

            fn $method(self, rhs: Felt) -> Felt {
                (&self).$method(&rhs)
            }
        }

        impl $trait<&Felt> for Felt {
            type Output = Felt;

            fn $method(self, rhs: &Felt) -> Felt {
                (&self).$method(rhs)
            }
        }
    )*};
}

forward_owned_binop!(Add, add; Sub, sub; Mul, mul);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_value() {
        let expected = BigUint::parse_bytes(
            b"3618502788666131213697322783095070105623107215331596699973092056135872020481",
            10,
        )
        .unwrap();
        assert_eq!(*STARK_PRIME, expected);
    }

    #[test]
    fn test_mod_reduce_negative() {
        let m = BigUint::from(7u32);
        assert_eq!(mod_reduce(&BigInt::from(-3), &m), BigUint::from(4u32));
        assert_eq!(mod_reduce(&BigInt::from(-14), &m), BigUint::zero());
        assert_eq!(mod_reduce(&BigInt::from(10), &m), BigUint::from(3u32));
    }

    #[test]
    fn test_mod_inverse() {
        let m = BigUint::from(11u32);
        let inv = mod_inverse(&BigUint::from(3u32), &m).unwrap();
        assert_eq!(inv, BigUint::from(4u32));
        assert!(mod_inverse(&BigUint::zero(), &m).is_none());
        assert!(mod_inverse(&BigUint::from(4u32), &BigUint::from(8u32)).is_none());
    }

    #[test]
    fn test_felt_inverse() {
        let a = Felt::from(123456789u64);
        let inv = a.inverse().unwrap();
        assert_eq!(&a * &inv, Felt::one());
        assert!(Felt::zero().inverse().is_none());
    }

    #[test]
    fn test_sub_wraps() {
        let a = Felt::from(1u64);
        let b = Felt::from(2u64);
        let diff = &a - &b;
        assert_eq!(diff, -Felt::one());
        assert_eq!(&diff + &b, a);
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(Felt::zero().to_hex(), "0x0");
        assert_eq!(Felt::from(255u64).to_hex(), "0xff");
        assert_eq!(Felt::parse("0xFF").unwrap(), Felt::from(255u64));
        assert_eq!(Felt::parse("255").unwrap(), Felt::from(255u64));
    }

    #[test]
    fn test_parse_rejects_modulus() {
        let p_hex = format!("0x{:x}", *STARK_PRIME);
        assert!(Felt::parse(&p_hex).is_err());
        assert!(Felt::parse("0x").is_err());
        assert!(Felt::parse("0xzz").is_err());
        assert!(Felt::parse("-1").is_err());
    }

    #[test]
    fn test_new_reduces() {
        let p_plus_two = &*STARK_PRIME + 2u32;
        assert_eq!(Felt::new(p_plus_two), Felt::from(2u64));
    }

    #[test]
    fn test_serde_hex() {
        let felt = Felt::from(0xabcdu64);
        let json = serde_json::to_string(&felt).unwrap();
        assert_eq!(json, "\"0xabcd\"");
        let back: Felt = serde_json::from_str(&json).unwrap();
        assert_eq!(back, felt);
    }

    #[test]
    fn test_legendre_and_sqrt() {
        let four = Felt::from(4u64);
        assert_eq!(legendre_symbol(&four), 1);
        let root = sqrt_mod(&four).unwrap();
        assert_eq!(root.square(), four);

        let x = Felt::from(987654321u64);
        let sq = x.square();
        let root = sqrt_mod(&sq).unwrap();
        assert!(root == x || root == -&x);

        // 3 generates the multiplicative group, so it is not a square
        assert_eq!(legendre_symbol(&Felt::from(3u64)), -1);
        assert!(sqrt_mod(&Felt::from(3u64)).is_none());
        assert_eq!(legendre_symbol(&Felt::zero()), 0);
    }

    #[test]
    fn test_low_u128() {
        let value = (BigUint::one() << 200usize) + BigUint::from(u128::MAX);
        let felt = Felt::new(value);
        assert_eq!(felt.low_u128(), u128::MAX);
        assert_eq!(Felt::from(42u64).low_u128(), 42);
    }

    #[test]
    fn test_be_bytes() {
        let felt = Felt::from(0x0102u64);
        let bytes = felt.to_be_bytes();
        assert_eq!(bytes[30], 0x01);
        assert_eq!(bytes[31], 0x02);
        assert_eq!(Felt::from_be_bytes_mod_order(&bytes), felt);
    }
}
