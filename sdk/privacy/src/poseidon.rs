//! Poseidon over the STARK field
//!
//! Starknet's Poseidon: the Hades permutation with the published Cairo
//! round constants, provided by `starknet-crypto`.
//!
//! ```text
//! width 3 (rate 2, capacity 1), 8 full rounds, 83 partial rounds, x^3 S-box
//! MDS = [[3, 1, 1], [1, -1, 1], [1, 1, -2]]
//! ```
//!
//! Two entry points match the two Cairo builtins:
//!
//! - [`poseidon_hash_pair`] is `hades([x, y, 2])[0]`
//! - [`poseidon_hash`] is the sponge over a span, padded with a single 1

use starknet_crypto::Felt as StarkFelt;

use crate::field::Felt;

pub(crate) fn to_stark(felt: &Felt) -> StarkFelt {
    StarkFelt::from_bytes_be(&felt.to_be_bytes())
}

pub(crate) fn from_stark(felt: StarkFelt) -> Felt {
    Felt::from_be_bytes_mod_order(&felt.to_bytes_be())
}

/// Hash a sequence of field elements to one field element
/// (`poseidon_hash_span` in Cairo)
pub fn poseidon_hash(inputs: &[Felt]) -> Felt {
    let inputs: Vec<StarkFelt> = inputs.iter().map(to_stark).collect();
    from_stark(starknet_crypto::poseidon_hash_many(&inputs))
}

/// Two-to-one hash (`hades_permutation(x, y, 2).0` in Cairo)
pub fn poseidon_hash_pair(left: &Felt, right: &Felt) -> Felt {
    from_stark(starknet_crypto::poseidon_hash(to_stark(left), to_stark(right)))
}

/// Cairo short-string encoding: up to 31 ASCII bytes read big-endian.
/// Used for domain tags.
pub fn short_string(tag: &str) -> Felt {
    debug_assert!(tag.len() <= 31, "short string too long: {tag}");
    Felt::from_be_bytes_mod_order(tag.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn felt(hex: &str) -> Felt {
        Felt::parse(hex).unwrap()
    }

    #[test]
    fn test_field_conversion() {
        let felt = Felt::from(0x1234_5678_9abc_def0_u64);
        assert_eq!(from_stark(to_stark(&felt)), felt);

        let big = -Felt::one();
        assert_eq!(from_stark(to_stark(&big)), big);
    }

    #[test]
    fn test_pair_matches_starknet() {
        assert_eq!(
            poseidon_hash_pair(&Felt::from(1u64), &Felt::from(2u64)),
            felt("0x5d44a3decb2b2e0cc71071f7b802f45dd792d064f0fc7316c46514f70f9891a")
        );
    }

    #[test]
    fn test_span_matches_starknet() {
        assert_eq!(
            poseidon_hash(&[Felt::from(1u64), Felt::from(2u64)]),
            felt("0x371cb6995ea5e7effcd2e174de264b5b407027a75a231a70c2c8d196107f0e7")
        );
        assert_eq!(
            poseidon_hash(&[Felt::from(7u64)]),
            felt("0x647ec7114541c9ec11e29d532f000b42f601e3d2529a08ad2073fc6121c3d53")
        );
    }

    #[test]
    fn test_pair_and_span_differ() {
        let (a, b) = (Felt::from(1u64), Felt::from(2u64));
        assert_ne!(poseidon_hash_pair(&a, &b), poseidon_hash(&[a, b]));
    }

    #[test]
    fn test_poseidon_order_sensitive() {
        let a = poseidon_hash_pair(&Felt::from(1u64), &Felt::from(2u64));
        let b = poseidon_hash_pair(&Felt::from(2u64), &Felt::from(1u64));
        assert_ne!(a, b);
    }

    #[test]
    fn test_poseidon_arity_matters() {
        let one = poseidon_hash(&[Felt::from(7u64)]);
        let two = poseidon_hash(&[Felt::from(7u64), Felt::zero()]);
        let three = poseidon_hash(&[Felt::from(7u64), Felt::zero(), Felt::zero()]);
        assert_ne!(one, two);
        assert_ne!(one, three);
        assert_ne!(two, three);
    }

    #[test]
    fn test_short_string() {
        assert_eq!(short_string("A"), Felt::from(0x41u64));
        assert_eq!(short_string("AB"), Felt::from(0x4142u64));
        assert_eq!(short_string(""), Felt::zero());
    }
}
