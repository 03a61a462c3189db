// src/proof.rs
//! Path-proof verifier
//!
//! The assertion tree is never stored. A claim that node `Y` descends from
//! node `X` is checked by folding `X` with the inner hashes of every node on
//! the path and comparing the result with `Y`. Each fold step is the same
//! composition used by [`crate::hashing::node_hash`].

use crate::hashing::hash_pair;
use crate::types::Hash;

/// Fold `base` with each proof element in order
///
/// An empty proof returns `base` unchanged.
pub fn calculate_path(base: &Hash, proof: &[Hash]) -> Hash {
    proof.iter().fold(*base, |node, element| hash_pair(&node, element))
}

/// Whether two proofs leave their shared base through different children
///
/// Both proofs must be non-empty; an empty proof never proves divergence.
pub fn diverges_immediately(left: &[Hash], right: &[Hash]) -> bool {
    match (left.first(), right.first()) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}
