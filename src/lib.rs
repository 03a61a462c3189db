// src/lib.rs
//! Optimistic rollup dispute ledger
//!
//! This crate keeps the authoritative state of one or more optimistic
//! rollup instances:
//! - the frontier of the assertion tree and the confirmed pointers
//! - the staker registry and the bonds backing each claim
//! - the opening of challenges between disagreeing stakers
//! - the confirmation walk advancing the latest confirmed node
//!
//! Hosts supply the block height, the pending inbox, an event sink and a
//! stake transfer capability through [`Environment`].

pub mod config;
pub mod environment;
pub mod error;
pub mod events;
pub mod factory;
pub mod hashing;
pub mod instruction;
pub mod proof;
pub mod protocol;
pub mod rollup;
pub mod types;

pub use config::{ChainParams, ConfigError, RollupConfig};
pub use environment::{
    ChainSource, CollectingSink, Environment, EventSink, InboxSource, LogSink, ManualChain, MemoryInbox,
    NullTransfer, StakeTransfer,
};
pub use error::{ChallengeSide, RollupError};
pub use events::{EventRecord, RollupEvent};
pub use factory::RollupFactory;
pub use instruction::{process_instruction, InstructionOutput, RollupInstruction};
pub use protocol::{
    AssertionClaim, AssertionOutcome, AssertionParams, AssertionRequest, ChallengeRequest, ChildNode,
    ConfirmOpportunity, ExecutionAssertionStub, NodeOpportunity, PrevNode, PruneParams, TimeBounds,
    VmProtoData,
};
pub use rollup::{ChallengeRecord, Rollup, RollupState, Staker};
pub use types::{Address, BlockHeight, ChildType, Hash, MachineStatus, TimeTicks, TICKS_PER_BLOCK};
