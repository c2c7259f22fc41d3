//! Error types for the privacy primitives.
//!
//! Predicates (`verify_merkle_proof`, `verify_opening`, ...) return `bool`.
//! Everything that can reject its input returns [`PrivacyError`].

use thiserror::Error;

/// Coarse classification used by callers deciding whether to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something malformed or out of range. Fatal.
    Validation,
    /// Authenticated data did not authenticate. Fatal, never retry.
    Integrity,
    /// A bounded search came up empty.
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrivacyError {
    #[error("leaf index {index} out of bounds for tree with {size} leaves")]
    LeafIndexOutOfBounds { index: u64, size: u64 },

    #[error("unsupported tree depth {0}, expected 1..={max}", max = crate::merkle::MAX_TREE_DEPTH)]
    InvalidDepth(usize),

    #[error("tree of depth {depth} is full")]
    TreeFull { depth: usize },

    #[error("{count} leaves exceed the capacity {capacity} of the tree")]
    TooManyLeaves { count: usize, capacity: u64 },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("invalid field element: {0}")]
    InvalidFelt(String),

    #[error("point is not on the STARK curve")]
    InvalidPoint,

    #[error("amount {0} is not a supported denomination")]
    UnsupportedDenomination(u128),

    #[error("amount {amount} needs more than {max} deposits")]
    TooManyDeposits { amount: u128, max: u128 },

    #[error("AE hint integrity check failed")]
    IntegrityFailure,

    #[error("discrete log not found after {0} candidates")]
    DiscreteLogNotFound(u64),

    #[error("note has already been spent")]
    NoteAlreadySpent,

    #[error("nullifier {0} has already been spent")]
    DoubleSpend(String),
}

impl PrivacyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::IntegrityFailure | Self::DoubleSpend(_) => ErrorKind::Integrity,
            Self::DiscreteLogNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }
}

pub type Result<T> = std::result::Result<T, PrivacyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PrivacyError::LeafIndexOutOfBounds { index: 5, size: 3 };
        assert_eq!(
            err.to_string(),
            "leaf index 5 out of bounds for tree with 3 leaves"
        );

        let err = PrivacyError::InvalidDepth(0);
        assert_eq!(err.to_string(), "unsupported tree depth 0, expected 1..=32");

        let err = PrivacyError::TooManyDeposits { amount: 7, max: 256 };
        assert_eq!(err.to_string(), "amount 7 needs more than 256 deposits");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(PrivacyError::IntegrityFailure.kind(), ErrorKind::Integrity);
        assert_eq!(
            PrivacyError::DiscreteLogNotFound(10).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            PrivacyError::MalformedProof("x".into()).kind(),
            ErrorKind::Validation
        );
    }
}
