// src/error.rs
//! Error types for the rollup ledger
//!
//! Every failure is a synchronous, typed result of the call that raised it.
//! Operations validate completely before mutating, so an error never leaves
//! the ledger partially updated.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors returned by rollup operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RollupError {
    // Proof errors
    /// A path proof does not reach a current leaf
    #[error("invalid path proof")]
    InvalidProof,

    /// The reconstructed node is not a current leaf
    #[error("invalid leaf")]
    InvalidLeaf,

    /// A mooted-stake proof does not show a conflicting branch
    #[error("invalid conflict proof")]
    InvalidConflictProof,

    /// A challenge party's node does not lead to its staked location
    #[error("challenge {0} proof error")]
    ChallengeProofError(ChallengeSide),

    /// The pruned leaf is not on a branch conflicting with the confirmed node
    #[error("prune conflict")]
    PruneConflict,

    /// The asserter's location does not lead to the extended leaf
    #[error("invalid staker location proof")]
    InvalidStakerProof,

    // Precondition errors
    #[error("invalid stake amount")]
    InvalidStakeAmount,

    #[error("staker already exists")]
    DuplicateStaker,

    #[error("staker not found")]
    StakerNotFound,

    #[error("proof must be non-zero length")]
    EmptyProof,

    #[error("machine is errored or halted")]
    MachineNotRunnable,

    #[error("tried to execute too many steps")]
    TooManySteps,

    #[error("not within time bounds")]
    OutOfTimeBounds,

    #[error("imported messages without reading them")]
    ImportedWithoutRead,

    #[error("tried to import more messages than exist in pending inbox")]
    ImportExceedsAvailable,

    #[error("previous node deadline has already passed")]
    DeadlineAlreadyPassed,

    #[error("node is not passed deadline")]
    DeadlineNotPassed,

    #[error("node is not passed deadline")]
    NodeNotPastDeadline,

    #[error("{0} already in challenge")]
    AlreadyInChallenge(ChallengeSide),

    #[error("child types must be ordered")]
    UnorderedChildTypes,

    #[error("unknown {0}")]
    UnknownStaker(ChallengeSide),

    #[error("{0} staked after deadline")]
    StakedAfterDeadline(ChallengeSide),

    #[error("there must be at least one staker")]
    NoActiveStakers,

    #[error("at least one active staker disagrees")]
    StakerDisagrees,

    #[error("confirmation has no node opportunities")]
    EmptyConfirmation,

    #[error("confirmation does not start from the latest confirmed node")]
    StaleLatestConfirmed,

    #[error("staker addresses and proofs differ in length")]
    MismatchedStakerProofs,

    // Host errors
    #[error("rollup contract not found")]
    UnknownRollup,

    #[error("invalid instruction: {0}")]
    InvalidInstruction(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Which party of a challenge an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeSide {
    Asserter,
    Challenger,
}

impl std::fmt::Display for ChallengeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChallengeSide::Asserter => write!(f, "asserter"),
            ChallengeSide::Challenger => write!(f, "challenger"),
        }
    }
}

impl RollupError {
    /// Stable numeric code for hosts that surface custom program errors
    pub fn code(&self) -> u32 {
        match self {
            RollupError::InvalidProof => 100,
            RollupError::InvalidLeaf => 101,
            RollupError::InvalidConflictProof => 102,
            RollupError::ChallengeProofError(_) => 103,
            RollupError::PruneConflict => 104,
            RollupError::InvalidStakerProof => 105,
            RollupError::InvalidStakeAmount => 200,
            RollupError::DuplicateStaker => 201,
            RollupError::StakerNotFound => 202,
            RollupError::EmptyProof => 203,
            RollupError::MachineNotRunnable => 204,
            RollupError::TooManySteps => 205,
            RollupError::OutOfTimeBounds => 206,
            RollupError::ImportedWithoutRead => 207,
            RollupError::ImportExceedsAvailable => 208,
            RollupError::DeadlineAlreadyPassed => 209,
            RollupError::DeadlineNotPassed => 210,
            RollupError::NodeNotPastDeadline => 211,
            RollupError::AlreadyInChallenge(_) => 212,
            RollupError::UnorderedChildTypes => 213,
            RollupError::UnknownStaker(_) => 214,
            RollupError::StakedAfterDeadline(_) => 215,
            RollupError::NoActiveStakers => 216,
            RollupError::StakerDisagrees => 217,
            RollupError::EmptyConfirmation => 218,
            RollupError::StaleLatestConfirmed => 219,
            RollupError::MismatchedStakerProofs => 220,
            RollupError::UnknownRollup => 300,
            RollupError::InvalidInstruction(_) => 301,
            RollupError::Config(_) => 302,
        }
    }

    /// Whether the caller supplied a path proof that did not check out
    pub fn is_proof_error(&self) -> bool {
        matches!(
            self,
            RollupError::InvalidProof
                | RollupError::InvalidLeaf
                | RollupError::InvalidConflictProof
                | RollupError::ChallengeProofError(_)
                | RollupError::PruneConflict
                | RollupError::InvalidStakerProof
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_party() {
        assert_eq!(
            RollupError::UnknownStaker(ChallengeSide::Challenger).to_string(),
            "unknown challenger"
        );
        assert_eq!(
            RollupError::ChallengeProofError(ChallengeSide::Asserter).to_string(),
            "challenge asserter proof error"
        );
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let errors = vec![
            RollupError::InvalidProof,
            RollupError::InvalidLeaf,
            RollupError::InvalidConflictProof,
            RollupError::PruneConflict,
            RollupError::InvalidStakeAmount,
            RollupError::DuplicateStaker,
            RollupError::StakerNotFound,
            RollupError::TooManySteps,
            RollupError::DeadlineNotPassed,
            RollupError::NodeNotPastDeadline,
            RollupError::UnorderedChildTypes,
            RollupError::UnknownRollup,
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_proof_error_category() {
        assert!(RollupError::PruneConflict.is_proof_error());
        assert!(!RollupError::DuplicateStaker.is_proof_error());
    }
}
