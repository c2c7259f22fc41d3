//! Lean Incremental Merkle Tree
//!
//! Append-only binary tree of deposit commitments. Leaf `i` is the `i`-th
//! deposit; empty positions hold `EMPTY_LEAF = 0` and empty subtrees hash up
//! through precomputed zero hashes.
//!
//! ```text
//!                    Root (level depth)
//!                   /    \
//!                 H01    H23
//!                /  \   /   \
//!               L0  L1 L2   z0      z0 = EMPTY_LEAF, z(i+1) = h(zi, zi)
//! ```
//!
//! The node hash is `h(l, r) = Poseidon(DOMAIN, l, r)`. The undomained
//! `Poseidon(l, r)` variant is kept as [`HashDomain::Legacy`] for reading
//! trees built before domain separation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, LazyLock};

use crate::error::{PrivacyError, Result};
use crate::field::Felt;
use crate::poseidon::{poseidon_hash, poseidon_hash_pair, short_string};
use crate::proof_format::{SparseMerkleProof, get_sparse_proof};

/// Default tree depth (2^20 deposits)
pub const DEFAULT_TREE_DEPTH: usize = 20;

/// Deepest supported tree
pub const MAX_TREE_DEPTH: usize = 32;

/// Domain tag for node hashing
pub const DEFAULT_TREE_DOMAIN: &str = "shade.lean_imt";

/// Roots remembered by [`MerkleTree`]
pub const ROOT_HISTORY_SIZE: usize = 32;

pub fn empty_leaf() -> Felt {
    Felt::zero()
}

/// Node hash variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashDomain {
    /// Two-to-one `hades(l, r, 2)[0]`
    Legacy,
    /// `Poseidon(tag, l, r)`
    Separated(Felt),
}

impl Default for HashDomain {
    fn default() -> Self {
        HashDomain::Separated(short_string(DEFAULT_TREE_DOMAIN))
    }
}

/// Poseidon node hasher with precomputed zero hashes for every level
#[derive(Debug, Clone)]
pub struct TreeHasher {
    domain: HashDomain,
    /// zero_hashes[i] is the root of an empty subtree of height i
    zero_hashes: Vec<Felt>,
}

static DEFAULT_HASHER: LazyLock<Arc<TreeHasher>> =
    LazyLock::new(|| Arc::new(TreeHasher::new(HashDomain::default())));

/// Process-wide hasher for the default domain
pub fn default_hasher() -> Arc<TreeHasher> {
    Arc::clone(&DEFAULT_HASHER)
}

impl TreeHasher {
    pub fn new(domain: HashDomain) -> Self {
        let mut hasher = Self {
            domain,
            zero_hashes: Vec::with_capacity(MAX_TREE_DEPTH + 1),
        };

        let mut current = empty_leaf();
        for _ in 0..MAX_TREE_DEPTH {
            let next = hasher.hash_pair(&current, &current);
            hasher.zero_hashes.push(current);
            current = next;
        }
        hasher.zero_hashes.push(current);

        hasher
    }

    pub fn legacy() -> Self {
        Self::new(HashDomain::Legacy)
    }

    pub fn domain(&self) -> &HashDomain {
        &self.domain
    }

    /// Hash two children to get the parent
    pub fn hash_pair(&self, left: &Felt, right: &Felt) -> Felt {
        match &self.domain {
            HashDomain::Legacy => poseidon_hash_pair(left, right),
            HashDomain::Separated(tag) => poseidon_hash(&[tag.clone(), left.clone(), right.clone()]),
        }
    }

    /// Root of an empty subtree of height `level` (`level <= MAX_TREE_DEPTH`)
    pub fn zero_hash(&self, level: usize) -> &Felt {
        &self.zero_hashes[level]
    }

    pub fn zero_hashes(&self) -> &[Felt] {
        &self.zero_hashes
    }
}

impl Default for TreeHasher {
    fn default() -> Self {
        Self::new(HashDomain::default())
    }
}

pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if depth == 0 || depth > MAX_TREE_DEPTH {
        return Err(PrivacyError::InvalidDepth(depth));
    }
    Ok(())
}

/// Number of leaves a tree of `depth` holds
pub fn capacity(depth: usize) -> u64 {
    1u64 << depth
}

// ============================================================================
// Incremental state
// ============================================================================

/// O(depth) append-only tree state. `rightmost_path[i]` is the most recent
/// left child seen at level `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeanImtState {
    pub depth: usize,
    pub root: Felt,
    pub size: u64,
    pub rightmost_path: Vec<Felt>,
}

impl LeanImtState {
    /// Empty tree: root is the zero hash of height `depth`
    pub fn new(hasher: &TreeHasher, depth: usize) -> Result<Self> {
        check_depth(depth)?;
        Ok(Self {
            depth,
            root: hasher.zero_hash(depth).clone(),
            size: 0,
            rightmost_path: hasher.zero_hashes()[..depth].to_vec(),
        })
    }

    /// Append a leaf and return its index
    pub fn insert(&mut self, hasher: &TreeHasher, leaf: Felt) -> Result<u64> {
        let index = self.size;
        if index >= capacity(self.depth) {
            return Err(PrivacyError::TreeFull { depth: self.depth });
        }

        let mut current = leaf;
        let mut position = index;
        for level in 0..self.depth {
            current = if position & 1 == 0 {
                self.rightmost_path[level] = current.clone();
                hasher.hash_pair(&current, hasher.zero_hash(level))
            } else {
                hasher.hash_pair(&self.rightmost_path[level], &current)
            };
            position >>= 1;
        }

        self.root = current;
        self.size += 1;
        Ok(index)
    }
}

// ============================================================================
// Proofs
// ============================================================================

/// Fixed-depth inclusion proof. `path_indices[i] == 1` means the node at
/// level `i` is a right child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub leaf: Felt,
    pub leaf_index: u64,
    pub path_elements: Vec<Felt>,
    pub path_indices: Vec<u8>,
    pub root: Felt,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }

    pub fn verify(&self, hasher: &TreeHasher) -> bool {
        verify_merkle_proof(hasher, self)
    }
}

fn check_leaves(leaves: &[Felt], depth: usize) -> Result<()> {
    check_depth(depth)?;
    if leaves.len() as u64 > capacity(depth) {
        return Err(PrivacyError::TooManyLeaves {
            count: leaves.len(),
            capacity: capacity(depth),
        });
    }
    Ok(())
}

/// Every populated level of the tree, bottom-up. Only the non-empty prefix of
/// each level is materialised; the rest is implied by the zero hashes.
fn build_levels(hasher: &TreeHasher, leaves: &[Felt], depth: usize) -> Vec<Vec<Felt>> {
    let mut levels = Vec::with_capacity(depth + 1);
    levels.push(leaves.to_vec());

    for level in 0..depth {
        let next: Vec<Felt> = levels[level]
            .chunks(2)
            .map(|pair| {
                let right = pair.get(1).unwrap_or_else(|| hasher.zero_hash(level));
                hasher.hash_pair(&pair[0], right)
            })
            .collect();
        levels.push(next);
    }

    levels
}

fn root_of(hasher: &TreeHasher, levels: &[Vec<Felt>], depth: usize) -> Felt {
    levels[depth]
        .first()
        .cloned()
        .unwrap_or_else(|| hasher.zero_hash(depth).clone())
}

fn proof_from_levels(
    hasher: &TreeHasher,
    levels: &[Vec<Felt>],
    leaf_index: u64,
    depth: usize,
) -> MerkleProof {
    let mut path_elements = Vec::with_capacity(depth);
    let mut path_indices = Vec::with_capacity(depth);

    for level in 0..depth {
        let position = leaf_index >> level;
        let sibling = levels[level]
            .get((position ^ 1) as usize)
            .cloned()
            .unwrap_or_else(|| hasher.zero_hash(level).clone());
        path_elements.push(sibling);
        path_indices.push((position & 1) as u8);
    }

    MerkleProof {
        leaf: levels[0][leaf_index as usize].clone(),
        leaf_index,
        path_elements,
        path_indices,
        root: root_of(hasher, levels, depth),
    }
}

/// Root of the tree holding `leaves` in order
pub fn compute_root(hasher: &TreeHasher, leaves: &[Felt], depth: usize) -> Result<Felt> {
    check_leaves(leaves, depth)?;
    Ok(root_of(hasher, &build_levels(hasher, leaves, depth), depth))
}

/// Inclusion proof for `leaves[leaf_index]`
pub fn get_merkle_proof(
    hasher: &TreeHasher,
    leaf_index: u64,
    leaves: &[Felt],
    depth: usize,
) -> Result<MerkleProof> {
    check_leaves(leaves, depth)?;
    if leaf_index >= leaves.len() as u64 {
        return Err(PrivacyError::LeafIndexOutOfBounds {
            index: leaf_index,
            size: leaves.len() as u64,
        });
    }

    let levels = build_levels(hasher, leaves, depth);
    Ok(proof_from_levels(hasher, &levels, leaf_index, depth))
}

/// Proofs for several leaves against one snapshot; they all share a root
pub fn get_merkle_proofs(
    hasher: &TreeHasher,
    indices: &[u64],
    leaves: &[Felt],
    depth: usize,
) -> Result<Vec<MerkleProof>> {
    check_leaves(leaves, depth)?;
    if let Some(&index) = indices.iter().find(|&&i| i >= leaves.len() as u64) {
        return Err(PrivacyError::LeafIndexOutOfBounds {
            index,
            size: leaves.len() as u64,
        });
    }

    let levels = build_levels(hasher, leaves, depth);
    Ok(indices
        .iter()
        .map(|&index| proof_from_levels(hasher, &levels, index, depth))
        .collect())
}

/// Fold the leaf up the path
pub fn compute_root_from_proof(hasher: &TreeHasher, proof: &MerkleProof) -> Result<Felt> {
    if proof.path_elements.len() != proof.path_indices.len() {
        return Err(PrivacyError::MalformedProof(format!(
            "{} path elements but {} path indices",
            proof.path_elements.len(),
            proof.path_indices.len()
        )));
    }

    let mut current = proof.leaf.clone();
    for (sibling, bit) in proof.path_elements.iter().zip(&proof.path_indices) {
        current = match bit {
            0 => hasher.hash_pair(&current, sibling),
            1 => hasher.hash_pair(sibling, &current),
            other => {
                return Err(PrivacyError::MalformedProof(format!(
                    "path index {other} is not 0 or 1"
                )));
            }
        };
    }
    Ok(current)
}

/// Pure predicate; any malformed shape is simply `false`
pub fn verify_merkle_proof(hasher: &TreeHasher, proof: &MerkleProof) -> bool {
    if proof.path_indices.len() > 64 || get_leaf_index(&proof.path_indices) != proof.leaf_index {
        return false;
    }
    compute_root_from_proof(hasher, proof).is_ok_and(|root| root == proof.root)
}

/// Recover the leaf index from the direction bits (bit i = level i)
pub fn get_leaf_index(path_indices: &[u8]) -> u64 {
    path_indices
        .iter()
        .take(64)
        .enumerate()
        .filter(|(_, bit)| **bit != 0)
        .fold(0u64, |acc, (i, _)| acc | (1u64 << i))
}

// ============================================================================
// Tree
// ============================================================================

/// Ordered leaf list plus incremental state
#[derive(Debug, Clone)]
pub struct MerkleTree {
    hasher: Arc<TreeHasher>,
    state: LeanImtState,
    leaves: Vec<Felt>,
    history: RootHistory,
}

impl MerkleTree {
    /// Empty tree with the default domain
    pub fn new(depth: usize) -> Result<Self> {
        Self::with_hasher(default_hasher(), depth)
    }

    pub fn with_hasher(hasher: Arc<TreeHasher>, depth: usize) -> Result<Self> {
        let state = LeanImtState::new(&hasher, depth)?;
        let mut history = RootHistory::new(ROOT_HISTORY_SIZE);
        history.push(state.root.clone());
        Ok(Self {
            hasher,
            state,
            leaves: Vec::new(),
            history,
        })
    }

    /// Rebuild from an ordered leaf list (e.g. replayed deposit events)
    pub fn from_leaves(hasher: Arc<TreeHasher>, leaves: &[Felt], depth: usize) -> Result<Self> {
        check_leaves(leaves, depth)?;
        let mut tree = Self::with_hasher(hasher, depth)?;
        for leaf in leaves {
            tree.insert(leaf.clone())?;
        }
        Ok(tree)
    }

    /// Append a leaf and return its position
    pub fn insert(&mut self, leaf: Felt) -> Result<u64> {
        let index = self.state.insert(&self.hasher, leaf.clone())?;
        self.leaves.push(leaf);
        self.history.push(self.state.root.clone());
        Ok(index)
    }

    pub fn root(&self) -> &Felt {
        &self.state.root
    }

    pub fn len(&self) -> u64 {
        self.state.size
    }

    pub fn is_empty(&self) -> bool {
        self.state.size == 0
    }

    pub fn depth(&self) -> usize {
        self.state.depth
    }

    pub fn leaves(&self) -> &[Felt] {
        &self.leaves
    }

    pub fn state(&self) -> &LeanImtState {
        &self.state
    }

    pub fn hasher(&self) -> &TreeHasher {
        &self.hasher
    }

    /// Position of the first leaf equal to `leaf`
    pub fn index_of(&self, leaf: &Felt) -> Option<u64> {
        self.leaves.iter().position(|l| l == leaf).map(|i| i as u64)
    }

    pub fn proof(&self, leaf_index: u64) -> Result<MerkleProof> {
        get_merkle_proof(&self.hasher, leaf_index, &self.leaves, self.state.depth)
    }

    pub fn proofs(&self, indices: &[u64]) -> Result<Vec<MerkleProof>> {
        get_merkle_proofs(&self.hasher, indices, &self.leaves, self.state.depth)
    }

    pub fn sparse_proof(&self, leaf_index: u64) -> Result<SparseMerkleProof> {
        get_sparse_proof(&self.hasher, leaf_index, &self.leaves, self.state.depth)
    }

    /// Current or recent root
    pub fn is_known_root(&self, root: &Felt) -> bool {
        self.history.is_valid(root)
    }
}

/// Recent roots, most recent first. Lets a proof built against a slightly
/// stale snapshot still be recognised.
#[derive(Debug, Clone, Default)]
pub struct RootHistory {
    roots: VecDeque<Felt>,
    max_size: usize,
}

impl RootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn push(&mut self, root: Felt) {
        self.roots.push_front(root);
        self.roots.truncate(self.max_size);
    }

    pub fn is_valid(&self, root: &Felt) -> bool {
        self.roots.contains(root)
    }

    pub fn current(&self) -> Option<&Felt> {
        self.roots.front()
    }
}
