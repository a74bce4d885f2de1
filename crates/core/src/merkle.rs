//! Binary merkle tree for settlement claim batches.
//!
//! Leaves commit to the claimant's authorities and amount; interior nodes
//! use a distinct hash prefix so a leaf can never be replayed as a node.
//! The same construction runs on-chain when a claim is verified; this
//! client-side copy exists to build proofs and to pre-check them before
//! spending a submission.

use sha2::{Digest, Sha256};

use crate::PublicKey;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash a claim leaf: prefix || stake_authority || withdraw_authority ||
/// claim_amount LE || leaf_index LE.
pub fn claim_leaf(
    stake_authority: &PublicKey,
    withdraw_authority: &PublicKey,
    claim_amount: u64,
    leaf_index: u64,
) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(stake_authority);
    hasher.update(withdraw_authority);
    hasher.update(claim_amount.to_le_bytes());
    hasher.update(leaf_index.to_le_bytes());
    hasher.finalize().into()
}

/// Hash an interior node from its left and right children.
pub fn hash_pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Sibling path proving a leaf's inclusion under a committed root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub siblings: Vec<[u8; 32]>,
    pub leaf_index: u64,
}

/// Full tree, layer 0 = leaves. An odd node is paired with itself.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    layers: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    pub fn from_leaves(leaves: &[[u8; 32]]) -> Self {
        let mut layers = vec![leaves.to_vec()];
        while layers.last().map(|l| l.len() > 1).unwrap_or(false) {
            let current = layers.last().expect("non-empty");
            let mut next = Vec::with_capacity(current.len().div_ceil(2));
            for pair in current.chunks(2) {
                let left = &pair[0];
                let right = pair.get(1).unwrap_or(left);
                next.push(hash_pair(left, right));
            }
            layers.push(next);
        }
        Self { layers }
    }

    pub fn leaf_count(&self) -> usize {
        self.layers.first().map(|l| l.len()).unwrap_or(0)
    }

    pub fn root(&self) -> Option<[u8; 32]> {
        self.layers.last().and_then(|l| l.first().copied())
    }

    /// Sibling path for the leaf at `index`, or None when out of range.
    pub fn proof(&self, index: usize) -> Option<MerkleProof> {
        if index >= self.leaf_count() {
            return None;
        }
        let mut siblings = Vec::new();
        let mut position = index;
        for layer in &self.layers[..self.layers.len() - 1] {
            let sibling_index = position ^ 1;
            let sibling = layer.get(sibling_index).unwrap_or(&layer[position]);
            siblings.push(*sibling);
            position /= 2;
        }
        Some(MerkleProof {
            siblings,
            leaf_index: index as u64,
        })
    }

    /// Recompute the path from `leaf` and compare against `root`.
    pub fn verify(root: &[u8; 32], leaf: &[u8; 32], proof: &MerkleProof) -> bool {
        let mut hash = *leaf;
        let mut position = proof.leaf_index;
        for sibling in &proof.siblings {
            hash = if position % 2 == 0 {
                hash_pair(&hash, sibling)
            } else {
                hash_pair(sibling, &hash)
            };
            position /= 2;
        }
        hash == *root
    }
}
