// src/rollup/confirmation.rs
//! Confirmation subsystem
//!
//! Advances the latest confirmed node by folding a sequence of confirmation
//! opportunities forward from it. Every named staker must agree with the
//! result by proving its location descends from the new confirmed node.

use log::{debug, info};

use super::optimistic_rollup::{Call, Rollup, RollupState};
use crate::error::RollupError;
use crate::events::RollupEvent;
use crate::hashing::{hash_pair, node_hash};
use crate::proof::calculate_path;
use crate::protocol::{ConfirmOpportunity, NodeOpportunity};
use crate::types::{Address, ChildType, Hash};

/// Result of folding a list of opportunities
struct ConfirmWalk {
    node: Hash,
    logs_acc: Vec<Hash>,
}

/// Fold `nodes` forward from `start`
fn walk(start: Hash, nodes: &[NodeOpportunity]) -> ConfirmWalk {
    let proto_state_hash = nodes.first().map(NodeOpportunity::proto_state_hash).unwrap_or_default();
    let mut node = start;
    let mut last_message = Hash::zero();
    let mut logs_acc = Vec::new();

    for opportunity in nodes {
        let (data_hash, child_type) = match opportunity {
            NodeOpportunity::Valid {
                messages,
                logs_acc: acc,
                ..
            } => {
                if let Some(last) = messages.last() {
                    last_message = *last;
                }
                logs_acc.push(*acc);
                (hash_pair(&last_message, acc), ChildType::Valid)
            }
            NodeOpportunity::Invalid {
                challenge_node_data, ..
            } => (*challenge_node_data, ChildType::MAX_INVALID),
        };
        node = node_hash(&node, &proto_state_hash, opportunity.deadline(), &data_hash, child_type);
        debug!("Confirmation step: {:?} -> {}", child_type, node);
    }

    ConfirmWalk { node, logs_acc }
}

impl RollupState {
    pub(crate) fn confirm(&mut self, call: &mut Call<'_>, opportunity: &ConfirmOpportunity) -> Result<Hash, RollupError> {
        let last = opportunity.nodes.last().ok_or(RollupError::EmptyConfirmation)?;
        if opportunity.current_latest_confirmed != self.last_confirmed {
            return Err(RollupError::StaleLatestConfirmed);
        }
        if opportunity.staker_addresses.len() != opportunity.staker_proofs.len() {
            return Err(RollupError::MismatchedStakerProofs);
        }
        if call.now_ticks() < last.deadline() {
            return Err(RollupError::DeadlineNotPassed);
        }

        let ConfirmWalk { node, logs_acc } = walk(opportunity.current_latest_confirmed, &opportunity.nodes);

        for (staker, proof) in opportunity.staker_addresses.iter().zip(&opportunity.staker_proofs) {
            let location = self.staker_location(staker)?;
            if calculate_path(&node, proof) != location {
                return Err(RollupError::StakerDisagrees);
            }
        }
        if opportunity.staker_addresses.is_empty() {
            return Err(RollupError::NoActiveStakers);
        }

        self.last_confirmed = node;
        call.emit(RollupEvent::Confirmed { node_hash: node });
        call.emit(RollupEvent::ConfirmedAssertion { logs_acc_hash: logs_acc });

        info!(
            "Node confirmed: {} after {} opportunities, {} stakers agreeing",
            node,
            opportunity.nodes.len(),
            opportunity.staker_addresses.len()
        );
        Ok(node)
    }
}

impl Rollup {
    /// Advance the latest confirmed node
    ///
    /// Returns the new latest confirmed node.
    pub fn confirm(&self, caller: &Address, opportunity: &ConfirmOpportunity) -> Result<Hash, RollupError> {
        self.execute(caller, "confirm", |state, call| state.confirm(call, opportunity))
    }
}
