use shade_privacy::{
    Felt, MerkleTree, PrivacyError, compute_root, contract_format_to_proof, default_hasher,
    get_leaf_index, get_merkle_proof, get_merkle_proofs, get_sparse_proof,
    proof_to_contract_format, sparse_to_regular_proof, verify_merkle_proof,
};

fn felts(values: &[u64]) -> Vec<Felt> {
    values.iter().map(|v| Felt::from(*v)).collect()
}

#[test]
fn two_leaves_depth_four() {
    let hasher = default_hasher();
    let leaves = felts(&[1, 2]);

    let proof = get_merkle_proof(&hasher, 0, &leaves, 4).unwrap();
    assert_eq!(proof.leaf, Felt::from(1u64));
    assert_eq!(proof.path_elements.len(), 4);
    assert!(verify_merkle_proof(&hasher, &proof));

    let proof = get_merkle_proof(&hasher, 1, &leaves, 4).unwrap();
    assert_eq!(proof.leaf, Felt::from(2u64));
    assert!(verify_merkle_proof(&hasher, &proof));
}

#[test]
fn three_leaves_each_verifies() {
    let hasher = default_hasher();
    let leaves = felts(&[10, 20, 30]);

    for (i, leaf) in leaves.iter().enumerate() {
        let proof = get_merkle_proof(&hasher, i as u64, &leaves, 4).unwrap();
        assert_eq!(&proof.leaf, leaf);
        assert!(verify_merkle_proof(&hasher, &proof), "index {i} failed");
    }
}

#[test]
fn index_past_end_is_rejected() {
    let hasher = default_hasher();
    let result = get_merkle_proof(&hasher, 5, &felts(&[1, 2]), 20);
    assert_eq!(
        result,
        Err(PrivacyError::LeafIndexOutOfBounds { index: 5, size: 2 })
    );
}

#[test]
fn every_index_verifies_and_shares_root() {
    let hasher = default_hasher();
    for n in 1..=17u64 {
        let leaves: Vec<Felt> = (0..n).map(|i| Felt::from(i * 31 + 5)).collect();
        let expected_root = compute_root(&hasher, &leaves, 6).unwrap();
        let indices: Vec<u64> = (0..n).collect();

        for proof in get_merkle_proofs(&hasher, &indices, &leaves, 6).unwrap() {
            assert!(verify_merkle_proof(&hasher, &proof));
            assert_eq!(proof.root, expected_root);
            assert_eq!(get_leaf_index(&proof.path_indices), proof.leaf_index);
        }
    }
}

#[test]
fn different_sequences_have_different_roots() {
    let hasher = default_hasher();
    let a = compute_root(&hasher, &felts(&[1, 2, 3]), 8).unwrap();
    let b = compute_root(&hasher, &felts(&[1, 3, 2]), 8).unwrap();
    let c = compute_root(&hasher, &felts(&[1, 2]), 8).unwrap();
    let d = compute_root(&hasher, &felts(&[1, 2, 3, 0]), 8).unwrap();

    assert_ne!(a, b, "order must matter");
    assert_ne!(a, c, "length must matter");
    // an explicit zero leaf is indistinguishable from an empty slot
    assert_eq!(a, d);
}

#[test]
fn tampering_breaks_verification() {
    let hasher = default_hasher();
    let leaves = felts(&[4, 8, 15, 16, 23, 42]);
    let proof = get_merkle_proof(&hasher, 3, &leaves, 5).unwrap();
    assert!(verify_merkle_proof(&hasher, &proof));

    let mut bad_leaf = proof.clone();
    bad_leaf.leaf = &bad_leaf.leaf + &Felt::one();
    assert!(!verify_merkle_proof(&hasher, &bad_leaf));

    for level in 0..proof.path_elements.len() {
        let mut bad_sibling = proof.clone();
        bad_sibling.path_elements[level] = &bad_sibling.path_elements[level] + &Felt::one();
        assert!(!verify_merkle_proof(&hasher, &bad_sibling), "sibling {level}");

        let mut bad_bit = proof.clone();
        bad_bit.path_indices[level] ^= 1;
        assert!(!verify_merkle_proof(&hasher, &bad_bit), "bit {level}");
    }
}

#[test]
fn contract_format_roundtrip_for_all_indices() {
    let hasher = default_hasher();
    let leaves: Vec<Felt> = (0..9u64).map(|i| Felt::from(i + 100)).collect();
    for i in 0..9 {
        let proof = get_merkle_proof(&hasher, i, &leaves, 20).unwrap();
        let contract = proof_to_contract_format(&proof);
        assert_eq!(contract_format_to_proof(&contract).unwrap(), proof);
    }
}

#[test]
fn sparse_and_regular_agree() {
    let hasher = default_hasher();
    let leaves: Vec<Felt> = (0..11u64).map(|i| Felt::from(i * i + 1)).collect();
    for i in 0..11 {
        let sparse = get_sparse_proof(&hasher, i, &leaves, 20).unwrap();
        assert_eq!(sparse.siblings.len(), 4);
        let regular = sparse_to_regular_proof(&hasher, &sparse, 20).unwrap();
        assert_eq!(regular, get_merkle_proof(&hasher, i, &leaves, 20).unwrap());
    }
}

#[test]
fn incremental_tree_matches_batch_proofs() {
    let mut tree = MerkleTree::new(20).unwrap();
    let leaves = felts(&[7, 14, 21, 28, 35]);
    for leaf in &leaves {
        tree.insert(leaf.clone()).unwrap();
    }

    let hasher = default_hasher();
    assert_eq!(tree.root(), &compute_root(&hasher, &leaves, 20).unwrap());
    for i in 0..leaves.len() as u64 {
        assert_eq!(
            tree.proof(i).unwrap(),
            get_merkle_proof(&hasher, i, &leaves, 20).unwrap()
        );
    }
}
