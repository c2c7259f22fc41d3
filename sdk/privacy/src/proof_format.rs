//! Proof Encodings
//!
//! Two bridges around [`MerkleProof`]:
//!
//! * the sparse / dynamic-depth form stored on-chain, which carries only
//!   `ceil(log2(size))` siblings and marks empty subtrees instead of
//!   carrying their zero hash;
//! * the contract wire form, with every felt as `0x` lowercase hex.

use serde::{Deserialize, Serialize};

use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::merkle::{MerkleProof, TreeHasher, check_depth, get_leaf_index, get_merkle_proof};

// ============================================================================
// Sparse proofs
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SparseSibling {
    /// The zero hash of this level
    Zero,
    Node(Felt),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparseMerkleProof {
    pub leaf: Felt,
    pub leaf_index: u64,
    /// Tree size the proof was taken at
    pub size: u64,
    pub siblings: Vec<SparseSibling>,
    pub root: Felt,
}

/// `ceil(log2(size))`, zero for trees of at most one leaf
pub fn dynamic_depth(size: u64) -> usize {
    if size <= 1 {
        0
    } else {
        (u64::BITS - (size - 1).leading_zeros()) as usize
    }
}

/// Sparse proof for `leaves[leaf_index]`. The root is the fixed-depth root.
pub fn get_sparse_proof(
    hasher: &TreeHasher,
    leaf_index: u64,
    leaves: &[Felt],
    depth: usize,
) -> Result<SparseMerkleProof> {
    let full = get_merkle_proof(hasher, leaf_index, leaves, depth)?;
    let size = leaves.len() as u64;

    let siblings = full
        .path_elements
        .into_iter()
        .take(dynamic_depth(size))
        .enumerate()
        .map(|(level, sibling)| {
            if sibling == *hasher.zero_hash(level) {
                SparseSibling::Zero
            } else {
                SparseSibling::Node(sibling)
            }
        })
        .collect();

    Ok(SparseMerkleProof {
        leaf: full.leaf,
        leaf_index,
        size,
        siblings,
        root: full.root,
    })
}

/// Expand to a fixed-depth proof. Missing levels and `Zero` markers become
/// zero hashes; direction bits come from the bits of `leaf_index`.
pub fn sparse_to_regular_proof(
    hasher: &TreeHasher,
    sparse: &SparseMerkleProof,
    depth: usize,
) -> Result<MerkleProof> {
    check_depth(depth)?;

    let carried = sparse.siblings.len();
    if carried > depth {
        return Err(PrivacyError::MalformedProof(format!(
            "{carried} siblings do not fit a tree of depth {depth}"
        )));
    }
    // above the carried levels the leaf's ancestors are always left children
    if sparse.leaf_index >> carried != 0 {
        return Err(PrivacyError::MalformedProof(format!(
            "leaf index {} needs more than {carried} levels",
            sparse.leaf_index
        )));
    }
    if sparse.leaf_index >= sparse.size {
        return Err(PrivacyError::LeafIndexOutOfBounds {
            index: sparse.leaf_index,
            size: sparse.size,
        });
    }

    let path_elements = (0..depth)
        .map(|level| match sparse.siblings.get(level) {
            Some(SparseSibling::Node(felt)) => felt.clone(),
            Some(SparseSibling::Zero) | None => hasher.zero_hash(level).clone(),
        })
        .collect();
    let path_indices = (0..depth)
        .map(|level| ((sparse.leaf_index >> level) & 1) as u8)
        .collect();

    Ok(MerkleProof {
        leaf: sparse.leaf.clone(),
        leaf_index: sparse.leaf_index,
        path_elements,
        path_indices,
        root: sparse.root.clone(),
    })
}

/// Compress a fixed-depth proof taken from a tree of `size` leaves
pub fn regular_to_sparse_proof(
    hasher: &TreeHasher,
    proof: &MerkleProof,
    size: u64,
) -> Result<SparseMerkleProof> {
    let carried = dynamic_depth(size);
    if carried > proof.path_elements.len() {
        return Err(PrivacyError::MalformedProof(format!(
            "proof of depth {} cannot hold {size} leaves",
            proof.path_elements.len()
        )));
    }
    if let Some(level) = (carried..proof.path_elements.len())
        .find(|&level| proof.path_elements[level] != *hasher.zero_hash(level))
    {
        return Err(PrivacyError::MalformedProof(format!(
            "non-empty sibling at level {level} above dynamic depth {carried}"
        )));
    }

    let siblings = proof.path_elements[..carried]
        .iter()
        .enumerate()
        .map(|(level, sibling)| {
            if sibling == hasher.zero_hash(level) {
                SparseSibling::Zero
            } else {
                SparseSibling::Node(sibling.clone())
            }
        })
        .collect();

    Ok(SparseMerkleProof {
        leaf: proof.leaf.clone(),
        leaf_index: proof.leaf_index,
        size,
        siblings,
        root: proof.root.clone(),
    })
}

// ============================================================================
// Contract wire format
// ============================================================================

/// Proof as submitted to the pool contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractMerkleProof {
    pub leaf: String,
    pub path_elements: Vec<String>,
    pub path_indices: Vec<u8>,
    pub root: String,
}

pub fn proof_to_contract_format(proof: &MerkleProof) -> ContractMerkleProof {
    ContractMerkleProof {
        leaf: proof.leaf.to_hex(),
        path_elements: proof.path_elements.iter().map(Felt::to_hex).collect(),
        path_indices: proof.path_indices.clone(),
        root: proof.root.to_hex(),
    }
}

fn parse_hex_felt(field: &str, value: &str) -> Result<Felt> {
    if !value.starts_with("0x") {
        return Err(PrivacyError::MalformedProof(format!(
            "{field} {value:?} is not 0x-prefixed hex"
        )));
    }
    Felt::parse(value).map_err(|e| PrivacyError::MalformedProof(format!("{field}: {e}")))
}

/// Strict parse: hex felts below p, equal-length paths, 0/1 direction bits.
/// The leaf index is recovered from the direction bits.
pub fn contract_format_to_proof(contract: &ContractMerkleProof) -> Result<MerkleProof> {
    if contract.path_elements.len() != contract.path_indices.len() {
        return Err(PrivacyError::MalformedProof(format!(
            "{} path elements but {} path indices",
            contract.path_elements.len(),
            contract.path_indices.len()
        )));
    }
    if contract.path_indices.len() > 64 {
        return Err(PrivacyError::MalformedProof(format!(
            "path of length {} is too deep",
            contract.path_indices.len()
        )));
    }
    if let Some(bit) = contract.path_indices.iter().find(|b| **b > 1) {
        return Err(PrivacyError::MalformedProof(format!(
            "path index {bit} is not 0 or 1"
        )));
    }

    let path_elements = contract
        .path_elements
        .iter()
        .map(|e| parse_hex_felt("path element", e))
        .collect::<Result<Vec<_>>>()?;

    Ok(MerkleProof {
        leaf: parse_hex_felt("leaf", &contract.leaf)?,
        leaf_index: get_leaf_index(&contract.path_indices),
        path_elements,
        path_indices: contract.path_indices.clone(),
        root: parse_hex_felt("root", &contract.root)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::STARK_PRIME;
    use crate::merkle::{default_hasher, verify_merkle_proof};

    fn leaves(n: u64) -> Vec<Felt> {
        (0..n).map(|i| Felt::from(0xc0ffee + i)).collect()
    }

    #[test]
    fn test_dynamic_depth() {
        assert_eq!(dynamic_depth(0), 0);
        assert_eq!(dynamic_depth(1), 0);
        assert_eq!(dynamic_depth(2), 1);
        assert_eq!(dynamic_depth(3), 2);
        assert_eq!(dynamic_depth(4), 2);
        assert_eq!(dynamic_depth(5), 3);
        assert_eq!(dynamic_depth(1 << 20), 20);
    }

    #[test]
    fn test_sparse_roundtrip() {
        let hasher = default_hasher();
        let leaves = leaves(5);
        for index in 0..5 {
            let regular = get_merkle_proof(&hasher, index, &leaves, 8).unwrap();
            let sparse = get_sparse_proof(&hasher, index, &leaves, 8).unwrap();
            assert_eq!(sparse.siblings.len(), 3);

            let expanded = sparse_to_regular_proof(&hasher, &sparse, 8).unwrap();
            assert_eq!(expanded, regular);
            assert!(verify_merkle_proof(&hasher, &expanded));

            let compressed = regular_to_sparse_proof(&hasher, &regular, 5).unwrap();
            assert_eq!(compressed, sparse);
        }
    }

    #[test]
    fn test_sparse_marks_empty_subtrees() {
        let hasher = default_hasher();
        let sparse = get_sparse_proof(&hasher, 4, &leaves(5), 8).unwrap();
        // leaf 4 has no right neighbour and no populated right subtree
        assert_eq!(sparse.siblings[0], SparseSibling::Zero);
        assert_eq!(sparse.siblings[1], SparseSibling::Zero);
        assert!(matches!(sparse.siblings[2], SparseSibling::Node(_)));
    }

    #[test]
    fn test_sparse_single_leaf() {
        let hasher = default_hasher();
        let sparse = get_sparse_proof(&hasher, 0, &leaves(1), 4).unwrap();
        assert!(sparse.siblings.is_empty());
        let regular = sparse_to_regular_proof(&hasher, &sparse, 4).unwrap();
        assert!(verify_merkle_proof(&hasher, &regular));
    }

    #[test]
    fn test_sparse_rejects_inconsistent_index() {
        let hasher = default_hasher();
        let mut sparse = get_sparse_proof(&hasher, 1, &leaves(2), 4).unwrap();
        sparse.leaf_index = 3;
        assert!(matches!(
            sparse_to_regular_proof(&hasher, &sparse, 4),
            Err(PrivacyError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_contract_roundtrip() {
        let hasher = default_hasher();
        let proof = get_merkle_proof(&hasher, 2, &leaves(3), 6).unwrap();
        let contract = proof_to_contract_format(&proof);
        assert!(contract.leaf.starts_with("0x"));
        assert_eq!(contract_format_to_proof(&contract).unwrap(), proof);
    }

    #[test]
    fn test_contract_json_shape() {
        let hasher = default_hasher();
        let proof = get_merkle_proof(&hasher, 0, &leaves(1), 2).unwrap();
        let json = serde_json::to_value(proof_to_contract_format(&proof)).unwrap();
        assert!(json.get("pathElements").is_some());
        assert!(json.get("pathIndices").is_some());
        assert_eq!(json["pathIndices"], serde_json::json!([0, 0]));
    }

    #[test]
    fn test_contract_rejects_out_of_field() {
        let hasher = default_hasher();
        let proof = get_merkle_proof(&hasher, 0, &leaves(2), 2).unwrap();
        let mut contract = proof_to_contract_format(&proof);
        contract.root = format!("0x{:x}", *STARK_PRIME);
        assert!(contract_format_to_proof(&contract).is_err());
    }

    #[test]
    fn test_contract_rejects_bad_shape() {
        let hasher = default_hasher();
        let proof = get_merkle_proof(&hasher, 0, &leaves(2), 2).unwrap();

        let mut contract = proof_to_contract_format(&proof);
        contract.path_indices.push(0);
        assert!(contract_format_to_proof(&contract).is_err());

        let mut contract = proof_to_contract_format(&proof);
        contract.path_indices[0] = 7;
        assert!(contract_format_to_proof(&contract).is_err());

        let mut contract = proof_to_contract_format(&proof);
        contract.leaf = "1234".into();
        assert!(contract_format_to_proof(&contract).is_err());
    }
}
