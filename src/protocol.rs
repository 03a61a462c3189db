// src/protocol.rs
//! Validator protocol data
//!
//! Structured arguments of the rollup operations: the machine state an
//! assertion starts from, the assertion parameters and claim, confirmation
//! opportunities, prune requests and challenge requests. Each type knows how
//! to hash itself into the identifiers the ledger compares.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::hashing::{self, PackedEncoder};
use crate::types::{Address, BlockHeight, ChildType, Hash, TimeTicks};

/// Protocol-level state of the machine at a node
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct VmProtoData {
    /// Hash of the machine
    pub machine_hash: Hash,

    /// Top of the inbox consumed so far
    pub inbox_top: Hash,

    /// Number of messages consumed so far
    pub inbox_count: u128,
}

impl VmProtoData {
    /// Initial proto data of a machine with an empty inbox
    pub fn initial(machine_hash: Hash) -> Self {
        Self {
            machine_hash,
            inbox_top: hashing::empty_tuple_hash(),
            inbox_count: 0,
        }
    }

    pub fn hash(&self) -> Hash {
        PackedEncoder::new()
            .bytes32(&self.machine_hash)
            .bytes32(&self.inbox_top)
            .uint256(self.inbox_count)
            .finish()
    }
}

/// Inclusive block range an assertion may be made in
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct TimeBounds {
    pub start_block: BlockHeight,
    pub end_block: BlockHeight,
}

impl TimeBounds {
    pub fn new(start_block: u64, end_block: u64) -> Self {
        Self {
            start_block: BlockHeight(start_block),
            end_block: BlockHeight(end_block),
        }
    }

    pub fn contains(&self, height: BlockHeight) -> bool {
        self.start_block <= height && height <= self.end_block
    }
}

/// Hash of the preconditions an execution starts from
pub fn execution_precondition_hash(machine_hash: &Hash, bounds: &TimeBounds, inbox_hash: &Hash) -> Hash {
    PackedEncoder::new()
        .bytes32(machine_hash)
        .uint256(u128::from(bounds.start_block.0))
        .uint256(u128::from(bounds.end_block.0))
        .bytes32(inbox_hash)
        .finish()
}

/// Parameters chosen by the asserter
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AssertionParams {
    /// Execution steps claimed
    pub num_steps: u64,

    /// Blocks the assertion is valid in
    pub time_bounds: TimeBounds,

    /// Messages pulled from the pending inbox
    pub imported_message_count: u128,
}

/// Summary of an execution
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ExecutionAssertionStub {
    pub after_hash: Hash,
    pub did_inbox_insn: bool,
    pub num_gas: u64,
    pub first_message_hash: Hash,
    pub last_message_hash: Hash,
    pub first_log_hash: Hash,
    pub last_log_hash: Hash,
}

impl ExecutionAssertionStub {
    pub fn hash(&self) -> Hash {
        PackedEncoder::new()
            .bytes32(&self.after_hash)
            .boolean(self.did_inbox_insn)
            .uint64(self.num_gas)
            .bytes32(&self.first_message_hash)
            .bytes32(&self.last_message_hash)
            .bytes32(&self.first_log_hash)
            .bytes32(&self.last_log_hash)
            .finish()
    }
}

/// What the asserter claims happened
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AssertionClaim {
    /// Inbox top after importing
    pub after_inbox_top: Hash,

    /// Hash of the imported message slice
    pub imported_messages_slice: Hash,

    pub assertion_stub: ExecutionAssertionStub,
}

/// Fields that, together with the before-state, rebuild the leaf being extended
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct PrevNode {
    pub prev_prev_leaf: Hash,
    pub data_hash: Hash,
    pub deadline: TimeTicks,
    pub child_type: ChildType,
}

impl PrevNode {
    /// Fields rebuilding the genesis node
    pub fn genesis() -> Self {
        Self {
            prev_prev_leaf: Hash::zero(),
            data_hash: Hash::zero(),
            deadline: TimeTicks::zero(),
            child_type: ChildType::InvalidPendingTop,
        }
    }

    /// Fields rebuilding `child`, a node created under `parent`
    pub fn from_child(parent: Hash, child: &ChildNode) -> Self {
        Self {
            prev_prev_leaf: parent,
            data_hash: child.data_hash,
            deadline: child.deadline,
            child_type: child.child_type,
        }
    }

    /// Identifier of the node described, given its proto-state hash
    pub fn node_hash(&self, proto_state_hash: &Hash) -> Hash {
        hashing::node_hash(
            &self.prev_prev_leaf,
            proto_state_hash,
            self.deadline,
            &self.data_hash,
            self.child_type,
        )
    }
}

/// Arguments of a disputable assertion
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct AssertionRequest {
    pub prev: PrevNode,
    pub before_state: VmProtoData,
    pub params: AssertionParams,
    pub claim: AssertionClaim,

    /// Path from the asserter's current location to the extended leaf
    pub staker_proof: Vec<Hash>,
}

/// A node created by an assertion
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChildNode {
    pub hash: Hash,

    /// Path-proof element leading from the parent to this node
    pub inner: Hash,

    pub proto_state_hash: Hash,
    pub deadline: TimeTicks,
    pub data_hash: Hash,
    pub child_type: ChildType,
}

impl ChildNode {
    pub fn new(parent: &Hash, proto_state_hash: Hash, deadline: TimeTicks, data_hash: Hash, child_type: ChildType) -> Self {
        let inner = hashing::node_inner_hash(&proto_state_hash, deadline, &data_hash, child_type);
        Self {
            hash: hashing::hash_pair(parent, &inner),
            inner,
            proto_state_hash,
            deadline,
            data_hash,
            child_type,
        }
    }
}

/// The four mutually exclusive children of an asserted leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionOutcome {
    pub prev_leaf: Hash,
    pub valid: ChildNode,
    pub invalid_pending_top: ChildNode,
    pub invalid_messages: ChildNode,
    pub invalid_execution: ChildNode,
}

impl AssertionOutcome {
    pub fn children(&self) -> [&ChildNode; 4] {
        [
            &self.valid,
            &self.invalid_pending_top,
            &self.invalid_messages,
            &self.invalid_execution,
        ]
    }

    pub fn child(&self, child_type: ChildType) -> &ChildNode {
        match child_type {
            ChildType::Valid => &self.valid,
            ChildType::InvalidPendingTop => &self.invalid_pending_top,
            ChildType::InvalidMessages => &self.invalid_messages,
            ChildType::InvalidExecution => &self.invalid_execution,
        }
    }
}

/// One step of a confirmation walk
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub enum NodeOpportunity {
    /// Confirm the valid child
    Valid {
        deadline: TimeTicks,
        proto_state_hash: Hash,
        /// Hashes of the messages sent by the assertion
        messages: Vec<Hash>,
        logs_acc: Hash,
    },
    /// Confirm an invalid child whose challenge was never answered
    Invalid {
        deadline: TimeTicks,
        proto_state_hash: Hash,
        challenge_node_data: Hash,
    },
}

impl NodeOpportunity {
    pub fn deadline(&self) -> TimeTicks {
        match self {
            NodeOpportunity::Valid { deadline, .. } | NodeOpportunity::Invalid { deadline, .. } => *deadline,
        }
    }

    pub fn proto_state_hash(&self) -> Hash {
        match self {
            NodeOpportunity::Valid { proto_state_hash, .. }
            | NodeOpportunity::Invalid { proto_state_hash, .. } => *proto_state_hash,
        }
    }
}

/// Arguments of a confirmation walk
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ConfirmOpportunity {
    pub nodes: Vec<NodeOpportunity>,
    pub current_latest_confirmed: Hash,
    pub staker_addresses: Vec<Address>,
    pub staker_proofs: Vec<Vec<Hash>>,
}

/// One leaf to prune
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct PruneParams {
    /// Last node shared by the leaf and the confirmed path
    pub ancestor_hash: Hash,
    pub leaf_proof: Vec<Hash>,
    pub anc_proof: Vec<Hash>,
}

/// Arguments opening a challenge between two stakers
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChallengeRequest {
    pub asserter: Address,
    pub challenger: Address,

    /// Node both parties branch from
    pub prev_node: Hash,
    pub disputable_deadline: TimeTicks,

    pub asserter_position: ChildType,
    pub challenger_position: ChildType,
    pub asserter_proto_hash: Hash,
    pub challenger_proto_hash: Hash,
    pub asserter_proof: Vec<Hash>,
    pub challenger_proof: Vec<Hash>,
    pub asserter_data_hash: Hash,
    pub challenger_data_hash: Hash,

    /// Ticks the challenge stays open for
    pub challenge_period: TimeTicks,
}
