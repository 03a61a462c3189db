// src/events.rs
//! Domain events published by rollup operations
//!
//! Events are fire-and-forget. Each one is appended to the emitting
//! instance's per-block log and handed to the configured event sink.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::protocol::{AssertionClaim, AssertionParams};
use crate::types::{Address, BlockHeight, ChildType, Hash, TimeTicks};

/// Event emitted by a rollup instance
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum RollupEvent {
    /// A rollup instance was created by a factory
    RollupCreated { rollup: Address, owner: Address },

    StakeCreated { staker: Address, node_hash: Hash },

    StakeRefunded { staker: Address },

    StakeMoved { staker: Address, location: Hash },

    /// A leaf was extended with four children
    Asserted {
        prev_leaf_hash: Hash,
        params: AssertionParams,
        claim: AssertionClaim,
        max_inbox_top: Hash,
        max_inbox_count: u128,
    },

    Pruned { leaf: Hash },

    Confirmed { node_hash: Hash },

    /// Log accumulators of every valid node just confirmed
    ConfirmedAssertion { logs_acc_hash: Vec<Hash> },

    ChallengeInitiated { challenge: Address, deadline: TimeTicks },

    ChallengeStarted {
        asserter: Address,
        challenger: Address,
        challenge_type: ChildType,
        challenge_contract: Address,
    },
}

impl RollupEvent {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            RollupEvent::RollupCreated { .. } => "RollupCreated",
            RollupEvent::StakeCreated { .. } => "StakeCreated",
            RollupEvent::StakeRefunded { .. } => "StakeRefunded",
            RollupEvent::StakeMoved { .. } => "StakeMoved",
            RollupEvent::Asserted { .. } => "Asserted",
            RollupEvent::Pruned { .. } => "Pruned",
            RollupEvent::Confirmed { .. } => "Confirmed",
            RollupEvent::ConfirmedAssertion { .. } => "ConfirmedAssertion",
            RollupEvent::ChallengeInitiated { .. } => "ChallengeInitiated",
            RollupEvent::ChallengeStarted { .. } => "ChallengeStarted",
        }
    }
}

/// An event together with where and when it happened
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct EventRecord {
    pub block: BlockHeight,
    pub rollup: Address,
    pub event: RollupEvent,
}
