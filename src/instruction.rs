// src/instruction.rs
//! Instruction entry point
//!
//! Every rollup operation has a borsh-encoded instruction, so hosts that
//! receive calls as raw bytes can dispatch them without knowing the
//! operation signatures.

use borsh::{BorshDeserialize, BorshSerialize};
use log::debug;

use crate::error::RollupError;
use crate::protocol::{AssertionOutcome, AssertionRequest, ChallengeRequest, ConfirmOpportunity, PruneParams};
use crate::rollup::Rollup;
use crate::types::{Address, Hash, TimeTicks};

/// Operations accepted by a rollup instance
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum RollupInstruction {
    /// Bond stake on a node between the latest confirmed node and a leaf
    PlaceStake {
        stake_amount: u128,
        /// Latest confirmed node to the staked location
        proof1: Vec<Hash>,
        /// Staked location to a leaf
        proof2: Vec<Hash>,
    },

    /// Refund the caller, staked on an ancestor of the latest confirmed node
    RecoverStakeConfirmed { proof: Vec<Hash> },

    /// Refund a staker left behind the latest confirmed node
    RecoverStakeOld { staker: Address, proof: Vec<Hash> },

    /// Refund a staker on a branch conflicting with the confirmed path
    RecoverStakeMooted {
        node_hash: Hash,
        staker: Address,
        latest_confirmed_proof: Vec<Hash>,
        staker_proof: Vec<Hash>,
    },

    /// Refund a staker once the deadline of its next node has passed
    RecoverStakePassedDeadline {
        staker: Address,
        deadline_ticks: TimeTicks,
        proof: Vec<Hash>,
    },

    MoveStake { proof1: Vec<Hash>, proof2: Vec<Hash> },

    /// Prune superseded leaves; the batch is applied entirely or not at all
    PruneLeaves { batch: Vec<PruneParams> },

    MakeAssertion(AssertionRequest),

    Confirm(ConfirmOpportunity),

    StartChallenge(ChallengeRequest),
}

/// Value produced by a processed instruction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstructionOutput {
    /// The operation only changed state
    Done,
    Asserted(AssertionOutcome),
    Confirmed(Hash),
    ChallengeStarted(Address),
}

impl RollupInstruction {
    /// Encode the instruction
    pub fn pack(&self) -> Result<Vec<u8>, RollupError> {
        self.try_to_vec()
            .map_err(|err| RollupError::InvalidInstruction(err.to_string()))
    }

    /// Decode an instruction
    pub fn unpack(input: &[u8]) -> Result<Self, RollupError> {
        Self::try_from_slice(input).map_err(|err| RollupError::InvalidInstruction(err.to_string()))
    }

    /// Operation name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            RollupInstruction::PlaceStake { .. } => "PlaceStake",
            RollupInstruction::RecoverStakeConfirmed { .. } => "RecoverStakeConfirmed",
            RollupInstruction::RecoverStakeOld { .. } => "RecoverStakeOld",
            RollupInstruction::RecoverStakeMooted { .. } => "RecoverStakeMooted",
            RollupInstruction::RecoverStakePassedDeadline { .. } => "RecoverStakePassedDeadline",
            RollupInstruction::MoveStake { .. } => "MoveStake",
            RollupInstruction::PruneLeaves { .. } => "PruneLeaves",
            RollupInstruction::MakeAssertion(_) => "MakeAssertion",
            RollupInstruction::Confirm(_) => "Confirm",
            RollupInstruction::StartChallenge(_) => "StartChallenge",
        }
    }
}

/// Decode `instruction_data` and apply it to `rollup` on behalf of `caller`
pub fn process_instruction(
    rollup: &Rollup,
    caller: &Address,
    instruction_data: &[u8],
) -> Result<InstructionOutput, RollupError> {
    let instruction = RollupInstruction::unpack(instruction_data)?;
    debug!("Processing {} from {} on {}", instruction.name(), caller, rollup.address());

    match instruction {
        RollupInstruction::PlaceStake {
            stake_amount,
            proof1,
            proof2,
        } => rollup.place_stake(caller, stake_amount, &proof1, &proof2)?,
        RollupInstruction::RecoverStakeConfirmed { proof } => rollup.recover_stake_confirmed(caller, &proof)?,
        RollupInstruction::RecoverStakeOld { staker, proof } => rollup.recover_stake_old(caller, &staker, &proof)?,
        RollupInstruction::RecoverStakeMooted {
            node_hash,
            staker,
            latest_confirmed_proof,
            staker_proof,
        } => rollup.recover_stake_mooted(caller, &node_hash, &staker, &latest_confirmed_proof, &staker_proof)?,
        RollupInstruction::RecoverStakePassedDeadline {
            staker,
            deadline_ticks,
            proof,
        } => rollup.recover_stake_passed_deadline(caller, &staker, deadline_ticks, &proof)?,
        RollupInstruction::MoveStake { proof1, proof2 } => rollup.move_stake(caller, &proof1, &proof2)?,
        RollupInstruction::PruneLeaves { batch } => rollup.prune_leaves(caller, &batch)?,
        RollupInstruction::MakeAssertion(request) => {
            return rollup.make_assertion(caller, &request).map(InstructionOutput::Asserted)
        }
        RollupInstruction::Confirm(opportunity) => {
            return rollup.confirm(caller, &opportunity).map(InstructionOutput::Confirmed)
        }
        RollupInstruction::StartChallenge(request) => {
            return rollup
                .start_challenge(caller, &request)
                .map(InstructionOutput::ChallengeStarted)
        }
    }
    Ok(InstructionOutput::Done)
}
