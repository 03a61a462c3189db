// src/rollup/assertion.rs
//! Assertion subsystem
//!
//! A disputable assertion extends one leaf of the assertion tree with four
//! mutually exclusive children: the valid outcome and one invalid outcome
//! per thing that can be disputed (pending inbox top, imported messages,
//! execution). Exactly one of them can ever be confirmed.

use log::{debug, info};

use super::optimistic_rollup::{Call, Rollup, RollupState};
use crate::error::RollupError;
use crate::events::RollupEvent;
use crate::hashing::{
    challenge_node_data_hash, empty_tuple_hash, execution_data_hash, hash_pair,
    inbox_top_challenge_data_hash, message_challenge_data_hash, PackedEncoder,
};
use crate::proof::calculate_path;
use crate::protocol::{execution_precondition_hash, AssertionOutcome, AssertionRequest, ChildNode};
use crate::types::{Address, ChildType, TimeTicks, TICKS_PER_BLOCK};

impl RollupState {
    pub(crate) fn make_assertion(
        &mut self,
        call: &mut Call<'_>,
        request: &AssertionRequest,
    ) -> Result<AssertionOutcome, RollupError> {
        let AssertionRequest {
            prev,
            before_state,
            params,
            claim,
            staker_proof,
        } = request;
        let stub = &claim.assertion_stub;

        let proto_hash_before = before_state.hash();
        let prev_leaf = prev.node_hash(&proto_hash_before);
        if !self.leaves.contains(&prev_leaf) {
            return Err(RollupError::InvalidLeaf);
        }
        if !self.machine_status.is_runnable() {
            return Err(RollupError::MachineNotRunnable);
        }
        if params.num_steps > self.params.max_execution_steps {
            return Err(RollupError::TooManySteps);
        }
        if !params.time_bounds.contains(call.block) {
            return Err(RollupError::OutOfTimeBounds);
        }
        if params.imported_message_count != 0 && !stub.did_inbox_insn {
            return Err(RollupError::ImportedWithoutRead);
        }

        // Inbox snapshot for this call
        let pending_count = call.env.inbox.pending_count(&call.rollup);
        let pending_top = if pending_count == 0 {
            empty_tuple_hash()
        } else {
            call.env.inbox.pending_top_hash(&call.rollup)
        };
        let available = pending_count.saturating_sub(before_state.inbox_count);
        if params.imported_message_count > available {
            return Err(RollupError::ImportExceedsAvailable);
        }

        let mut deadline = call.now_ticks().add(self.params.grace_period);
        if deadline < prev.deadline {
            return Err(RollupError::DeadlineAlreadyPassed);
        }

        let location = self.staker_location(&call.caller)?;
        if calculate_path(&location, staker_proof) != prev_leaf {
            return Err(RollupError::InvalidStakerProof);
        }

        let check_ticks = self.params.check_ticks(stub.num_gas);
        deadline = deadline.add(check_ticks);
        let inbox_count_after = before_state.inbox_count + params.imported_message_count;
        let message_period = self.params.grace_period.add(TimeTicks(TICKS_PER_BLOCK));

        let invalid_pending_top = {
            let challenge = inbox_top_challenge_data_hash(
                &claim.after_inbox_top,
                &pending_top,
                pending_count.saturating_sub(inbox_count_after),
            );
            ChildNode::new(
                &prev_leaf,
                proto_hash_before,
                deadline,
                challenge_node_data_hash(&challenge, message_period),
                ChildType::InvalidPendingTop,
            )
        };

        let invalid_messages = {
            let challenge = message_challenge_data_hash(
                &before_state.inbox_top,
                &claim.after_inbox_top,
                &empty_tuple_hash(),
                &claim.imported_messages_slice,
                params.imported_message_count,
            );
            ChildNode::new(
                &prev_leaf,
                proto_hash_before,
                deadline,
                challenge_node_data_hash(&challenge, message_period),
                ChildType::InvalidMessages,
            )
        };

        let invalid_execution = {
            let precondition = execution_precondition_hash(
                &before_state.machine_hash,
                &params.time_bounds,
                &claim.imported_messages_slice,
            );
            let challenge = execution_data_hash(params.num_steps, &precondition, &stub.hash());
            ChildNode::new(
                &prev_leaf,
                proto_hash_before,
                deadline,
                challenge_node_data_hash(&challenge, self.params.grace_period.add(check_ticks)),
                ChildType::InvalidExecution,
            )
        };

        let valid = {
            let proto_state_hash = PackedEncoder::new()
                .bytes32(&stub.after_hash)
                .bytes32(&claim.after_inbox_top)
                .uint256(inbox_count_after)
                .finish();
            ChildNode::new(
                &prev_leaf,
                proto_state_hash,
                deadline,
                hash_pair(&stub.last_message_hash, &stub.last_log_hash),
                ChildType::Valid,
            )
        };

        let outcome = AssertionOutcome {
            prev_leaf,
            valid,
            invalid_pending_top,
            invalid_messages,
            invalid_execution,
        };

        // Children go in before the parent comes out
        for child in outcome.children() {
            debug!("Leaf added: {} ({:?})", child.hash, child.child_type);
            self.leaves.insert(child.hash);
        }
        self.leaves.remove(&prev_leaf);

        call.emit(RollupEvent::Asserted {
            prev_leaf_hash: prev_leaf,
            params: params.clone(),
            claim: claim.clone(),
            max_inbox_top: before_state.inbox_top,
            max_inbox_count: before_state.inbox_count,
        });

        self.staker_mut(&call.caller)?.location = outcome.valid.hash;
        self.next_confirmed = Some(outcome.valid.hash);
        call.emit(RollupEvent::StakeMoved {
            staker: call.caller,
            location: outcome.valid.hash,
        });

        info!(
            "Assertion made: staker {}, prev leaf {}, valid child {}, deadline {}",
            call.caller, prev_leaf, outcome.valid.hash, deadline
        );
        Ok(outcome)
    }
}

impl Rollup {
    /// Extend a leaf with the four outcomes of a disputable assertion
    ///
    /// The caller's stake moves to the valid child.
    pub fn make_assertion(
        &self,
        caller: &Address,
        request: &AssertionRequest,
    ) -> Result<AssertionOutcome, RollupError> {
        self.execute(caller, "make_assertion", |state, call| state.make_assertion(call, request))
    }
}
