//! Shade Privacy SDK
//!
//! Cryptographic primitives for a fixed-denomination privacy pool on a
//! STARK-curve chain.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Deposit / Withdraw                       │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │  Nullifiers  │  │ Commitments  │  │  ElGamal + AE hint    │  │
//! │  │  (spent)     │  │  (Pedersen)  │  │  (amount, view tag)   │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! │         │                 │                     │               │
//! │         ▼                 ▼                     ▼               │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │         LeanIMT (Poseidon, domain separated)            │    │
//! │  │  • fixed-depth proofs for the prover                    │    │
//! │  │  • sparse proofs and hex wire format for the contract   │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              │                                  │
//! │                 field / curve / Poseidon                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod ae_hint;
pub mod commitment;
pub mod curve;
pub mod denomination;
pub mod encryption;
pub mod error;
pub mod field;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod poseidon;
pub mod proof_format;

pub use ae_hint::{
    AeHint, EncryptedAmount, create_ae_hint, decrypt_ae_hint, decrypt_with_hint, encrypt_amount,
    verify_ae_hint_mac,
};
pub use commitment::{Commitment, generator_h, hash_to_curve, verify_opening};
pub use curve::{CURVE_ORDER, Point, Scalar};
pub use denomination::{
    Denomination, MAX_SPLIT_DEPOSITS, fixed_denomination_to_value, split_into_denominations,
    value_to_fixed_denomination,
};
pub use encryption::{Ciphertext, ElGamalKeypair, decrypt, decrypt_bounded, decrypt_point, encrypt};
pub use error::{ErrorKind, PrivacyError, Result};
pub use field::{Felt, STARK_PRIME};
pub use merkle::{
    DEFAULT_TREE_DEPTH, HashDomain, LeanImtState, MerkleProof, MerkleTree, RootHistory,
    TreeHasher, compute_root, compute_root_from_proof, default_hasher, get_leaf_index,
    get_merkle_proof, get_merkle_proofs, verify_merkle_proof,
};
pub use note::{NoteSecrets, PrivacyNote, note_leaf};
pub use nullifier::{
    Nullifier, NullifierScope, NullifierSet, ViewTag, derive_nullifier, derive_scoped_nullifier,
    matches_view_tag,
};
pub use poseidon::{poseidon_hash, poseidon_hash_pair};
pub use proof_format::{
    ContractMerkleProof, SparseMerkleProof, SparseSibling, contract_format_to_proof,
    get_sparse_proof, proof_to_contract_format, regular_to_sparse_proof, sparse_to_regular_proof,
};
