// src/rollup/mod.rs
//! Rollup module: the dispute ledger of an optimistic rollup
//!
//! The ledger keeps only the frontier of the assertion tree, the staker
//! registry, the challenge registry and the confirmed pointers. Tree
//! relationships are proved on demand by path folding. Each subsystem lives
//! in its own file and operates on the shared [`RollupState`]:
//! - staking: placing, moving and recovering stake, pruning leaves
//! - assertion: extending a leaf with its four children
//! - challenge: opening a challenge between disagreeing stakers
//! - confirmation: advancing the latest confirmed node

mod assertion;
mod challenge;
mod confirmation;
mod optimistic_rollup;
mod staking;

pub use optimistic_rollup::*;
