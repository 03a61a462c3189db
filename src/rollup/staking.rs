// src/rollup/staking.rs
//! Staking subsystem
//!
//! Placing, moving and recovering stake, and pruning superseded leaves.
//! Every location a staker claims is authenticated by folding a path proof
//! onto a stored identifier; nothing a caller asserts about the tree is
//! trusted without one.

use log::info;
use std::collections::HashSet;

use super::optimistic_rollup::{Call, Rollup, RollupState, Staker};
use crate::error::RollupError;
use crate::events::RollupEvent;
use crate::proof::{calculate_path, diverges_immediately};
use crate::protocol::PruneParams;
use crate::types::{Address, Hash, TimeTicks};

impl RollupState {
    pub(crate) fn place_stake(
        &mut self,
        call: &mut Call<'_>,
        stake_amount: u128,
        proof1: &[Hash],
        proof2: &[Hash],
    ) -> Result<(), RollupError> {
        let location = calculate_path(&self.last_confirmed, proof1);
        let leaf = calculate_path(&location, proof2);
        if !self.leaves.contains(&leaf) {
            return Err(RollupError::InvalidProof);
        }
        if stake_amount != self.params.stake_requirement {
            return Err(RollupError::InvalidStakeAmount);
        }
        if self.stakers.contains_key(&call.caller) {
            return Err(RollupError::DuplicateStaker);
        }

        self.stakers.insert(
            call.caller,
            Staker {
                location,
                creation_height: call.block,
                in_challenge: false,
                stake_amount,
            },
        );
        call.emit(RollupEvent::StakeCreated {
            staker: call.caller,
            node_hash: location,
        });

        info!("Stake placed: staker {}, location {}, amount {}", call.caller, location, stake_amount);
        Ok(())
    }

    /// Refund `staker` if its location leads to the latest confirmed node
    fn recover_confirmed(
        &mut self,
        call: &mut Call<'_>,
        staker: &Address,
        proof: &[Hash],
    ) -> Result<(), RollupError> {
        let location = self.staker_location(staker)?;
        if calculate_path(&location, proof) != self.last_confirmed {
            return Err(RollupError::InvalidProof);
        }
        self.refund_staker(call, staker);
        Ok(())
    }

    pub(crate) fn recover_stake_confirmed(
        &mut self,
        call: &mut Call<'_>,
        proof: &[Hash],
    ) -> Result<(), RollupError> {
        let caller = call.caller;
        self.recover_confirmed(call, &caller, proof)?;
        info!("Stake recovered after confirmation: staker {}", caller);
        Ok(())
    }

    pub(crate) fn recover_stake_old(
        &mut self,
        call: &mut Call<'_>,
        staker: &Address,
        proof: &[Hash],
    ) -> Result<(), RollupError> {
        if proof.is_empty() {
            return Err(RollupError::EmptyProof);
        }
        self.recover_confirmed(call, staker, proof)?;
        info!("Old stake recovered: staker {}", staker);
        Ok(())
    }

    pub(crate) fn recover_stake_mooted(
        &mut self,
        call: &mut Call<'_>,
        node_hash: &Hash,
        staker: &Address,
        latest_confirmed_proof: &[Hash],
        staker_proof: &[Hash],
    ) -> Result<(), RollupError> {
        let location = self.staker_location(staker)?;
        if !diverges_immediately(latest_confirmed_proof, staker_proof)
            || calculate_path(node_hash, latest_confirmed_proof) == self.last_confirmed
            || calculate_path(node_hash, staker_proof) != location
        {
            return Err(RollupError::InvalidConflictProof);
        }
        self.refund_staker(call, staker);
        info!("Mooted stake recovered: staker {}, conflict at {}", staker, node_hash);
        Ok(())
    }

    pub(crate) fn recover_stake_passed_deadline(
        &mut self,
        call: &mut Call<'_>,
        staker: &Address,
        deadline_ticks: TimeTicks,
        proof: &[Hash],
    ) -> Result<(), RollupError> {
        let location = self.staker_location(staker)?;
        if !self.leaves.contains(&calculate_path(&location, proof)) {
            return Err(RollupError::InvalidLeaf);
        }
        if call.now_ticks() < deadline_ticks {
            return Err(RollupError::NodeNotPastDeadline);
        }
        self.refund_staker(call, staker);
        info!("Stake recovered past deadline: staker {}, deadline {}", staker, deadline_ticks);
        Ok(())
    }

    pub(crate) fn move_stake(
        &mut self,
        call: &mut Call<'_>,
        proof1: &[Hash],
        proof2: &[Hash],
    ) -> Result<(), RollupError> {
        let location = self.staker_location(&call.caller)?;
        let new_location = calculate_path(&location, proof1);
        if !self.leaves.contains(&calculate_path(&new_location, proof2)) {
            return Err(RollupError::InvalidProof);
        }

        self.staker_mut(&call.caller)?.location = new_location;
        call.emit(RollupEvent::StakeMoved {
            staker: call.caller,
            location: new_location,
        });

        info!("Stake moved: staker {}, location {}", call.caller, new_location);
        Ok(())
    }

    /// Check one prune against `leaves` and return the leaf it removes
    fn check_prune(&self, leaves: &HashSet<Hash>, prune: &PruneParams) -> Result<Hash, RollupError> {
        let leaf = calculate_path(&prune.ancestor_hash, &prune.leaf_proof);
        if !leaves.contains(&leaf) {
            return Err(RollupError::InvalidLeaf);
        }
        if !diverges_immediately(&prune.leaf_proof, &prune.anc_proof)
            || calculate_path(&prune.ancestor_hash, &prune.anc_proof) != self.last_confirmed
        {
            return Err(RollupError::PruneConflict);
        }
        Ok(leaf)
    }

    /// Prune every leaf in `batch`, or none of them
    pub(crate) fn prune_leaves(&mut self, call: &mut Call<'_>, batch: &[PruneParams]) -> Result<(), RollupError> {
        let mut remaining = self.leaves.clone();
        let mut pruned = Vec::with_capacity(batch.len());
        for prune in batch {
            let leaf = self.check_prune(&remaining, prune)?;
            remaining.remove(&leaf);
            pruned.push(leaf);
        }

        self.leaves = remaining;
        for leaf in pruned {
            info!("Leaf pruned: {}", leaf);
            call.emit(RollupEvent::Pruned { leaf });
        }
        Ok(())
    }
}

impl Rollup {
    /// Bond the required stake on a node between the latest confirmed node and a leaf
    ///
    /// `proof1` leads from the latest confirmed node to the staked location,
    /// `proof2` from that location to a current leaf.
    pub fn place_stake(
        &self,
        caller: &Address,
        stake_amount: u128,
        proof1: &[Hash],
        proof2: &[Hash],
    ) -> Result<(), RollupError> {
        self.execute(caller, "place_stake", |state, call| {
            state.place_stake(call, stake_amount, proof1, proof2)
        })
    }

    /// Refund the caller, whose location leads to the latest confirmed node
    pub fn recover_stake_confirmed(&self, caller: &Address, proof: &[Hash]) -> Result<(), RollupError> {
        self.execute(caller, "recover_stake_confirmed", |state, call| {
            state.recover_stake_confirmed(call, proof)
        })
    }

    /// Refund any staker left strictly behind the latest confirmed node
    pub fn recover_stake_old(&self, caller: &Address, staker: &Address, proof: &[Hash]) -> Result<(), RollupError> {
        self.execute(caller, "recover_stake_old", |state, call| {
            state.recover_stake_old(call, staker, proof)
        })
    }

    /// Refund a staker whose branch splits off from the confirmed path at `node_hash`
    pub fn recover_stake_mooted(
        &self,
        caller: &Address,
        node_hash: &Hash,
        staker: &Address,
        latest_confirmed_proof: &[Hash],
        staker_proof: &[Hash],
    ) -> Result<(), RollupError> {
        self.execute(caller, "recover_stake_mooted", |state, call| {
            state.recover_stake_mooted(call, node_hash, staker, latest_confirmed_proof, staker_proof)
        })
    }

    /// Refund a staker once the deadline of its next node has passed
    pub fn recover_stake_passed_deadline(
        &self,
        caller: &Address,
        staker: &Address,
        deadline_ticks: TimeTicks,
        proof: &[Hash],
    ) -> Result<(), RollupError> {
        self.execute(caller, "recover_stake_passed_deadline", |state, call| {
            state.recover_stake_passed_deadline(call, staker, deadline_ticks, proof)
        })
    }

    /// Move the caller's stake forward towards a leaf
    pub fn move_stake(&self, caller: &Address, proof1: &[Hash], proof2: &[Hash]) -> Result<(), RollupError> {
        self.execute(caller, "move_stake", |state, call| state.move_stake(call, proof1, proof2))
    }

    pub fn prune_leaf(
        &self,
        caller: &Address,
        from: &Hash,
        leaf_proof: &[Hash],
        anc_proof: &[Hash],
    ) -> Result<(), RollupError> {
        let prune = PruneParams {
            ancestor_hash: *from,
            leaf_proof: leaf_proof.to_vec(),
            anc_proof: anc_proof.to_vec(),
        };
        self.prune_leaves(caller, std::slice::from_ref(&prune))
    }

    pub fn prune_leaves(&self, caller: &Address, batch: &[PruneParams]) -> Result<(), RollupError> {
        self.execute(caller, "prune_leaves", |state, call| state.prune_leaves(call, batch))
    }
}

#[cfg(test)]
mod tests {
    use super::super::optimistic_rollup::test_support::*;
    use super::*;
    use crate::types::BlockHeight;

    #[test]
    fn test_place_stake_on_genesis() {
        let h = harness();
        let genesis = h.rollup.last_confirmed();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();

        let staker = h.rollup.staker(&actor(1)).unwrap();
        assert_eq!(staker.location, genesis);
        assert_eq!(staker.creation_height, BlockHeight(10));
        assert!(!staker.in_challenge);
        assert_eq!(staker.stake_amount, STAKE);
        assert_eq!(h.sink.event_names(), vec!["StakeCreated"]);
    }

    #[test]
    fn test_place_stake_rules() {
        let h = harness();
        assert_eq!(
            h.rollup.place_stake(&actor(1), STAKE - 1, &[], &[]),
            Err(RollupError::InvalidStakeAmount)
        );
        assert_eq!(
            h.rollup.place_stake(&actor(1), STAKE, &[Hash([1; 32])], &[]),
            Err(RollupError::InvalidProof)
        );
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        assert_eq!(
            h.rollup.place_stake(&actor(1), STAKE, &[], &[]),
            Err(RollupError::DuplicateStaker)
        );
    }

    #[test]
    fn test_recover_confirmed_only_once() {
        let h = harness();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        h.rollup.recover_stake_confirmed(&actor(1), &[]).unwrap();
        assert!(!h.rollup.is_staked(&actor(1)));
        assert_eq!(
            h.rollup.recover_stake_confirmed(&actor(1), &[]),
            Err(RollupError::StakerNotFound)
        );
        assert_eq!(h.sink.event_names(), vec!["StakeCreated", "StakeRefunded"]);
    }

    #[test]
    fn test_recover_confirmed_wrong_proof() {
        let h = harness();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        assert_eq!(
            h.rollup.recover_stake_confirmed(&actor(1), &[Hash([3; 32])]),
            Err(RollupError::InvalidProof)
        );
        assert!(h.rollup.is_staked(&actor(1)));
    }

    #[test]
    fn test_recover_old_requires_proof() {
        let h = harness();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        assert_eq!(
            h.rollup.recover_stake_old(&actor(2), &actor(1), &[]),
            Err(RollupError::EmptyProof)
        );
        assert_eq!(
            h.rollup.recover_stake_old(&actor(2), &actor(9), &[Hash([1; 32])]),
            Err(RollupError::StakerNotFound)
        );
    }

    #[test]
    fn test_recover_passed_deadline_waits() {
        let h = harness();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        assert_eq!(
            h.rollup.recover_stake_passed_deadline(&actor(2), &actor(1), TimeTicks(12_000), &[]),
            Err(RollupError::NodeNotPastDeadline)
        );
        assert_eq!(
            h.rollup.recover_stake_passed_deadline(&actor(2), &actor(1), TimeTicks(1), &[Hash([5; 32])]),
            Err(RollupError::InvalidLeaf)
        );
        h.chain.advance_to(12);
        h.rollup
            .recover_stake_passed_deadline(&actor(2), &actor(1), TimeTicks(12_000), &[])
            .unwrap();
        assert!(!h.rollup.is_staked(&actor(1)));
    }

    #[test]
    fn test_move_stake_unknown_staker() {
        let h = harness();
        assert_eq!(h.rollup.move_stake(&actor(4), &[], &[]), Err(RollupError::StakerNotFound));
    }

    const CONFIRMED_STEP: Hash = Hash([0xc1; 32]);
    const STAKER_STEP: Hash = Hash([0x5a; 32]);

    /// Stake actor 1 one step off genesis, away from the confirmed step
    fn mooted_staker(h: &Harness) -> Hash {
        let genesis = h.rollup.last_confirmed();
        h.rollup.place_stake(&actor(1), STAKE, &[], &[]).unwrap();
        h.rollup.lock_state().staker_mut(&actor(1)).unwrap().location = calculate_path(&genesis, &[STAKER_STEP]);
        genesis
    }

    #[test]
    fn test_mooted_requires_distinct_first_steps() {
        let h = harness();
        let genesis = mooted_staker(&h);
        assert_eq!(
            h.rollup.recover_stake_mooted(&actor(2), &genesis, &actor(1), &[STAKER_STEP], &[STAKER_STEP]),
            Err(RollupError::InvalidConflictProof)
        );
        assert!(h.rollup.is_staked(&actor(1)));
    }

    #[test]
    fn test_mooted_rejects_proof_onto_latest_confirmed() {
        let h = harness();
        let genesis = mooted_staker(&h);
        h.rollup.lock_state().last_confirmed = calculate_path(&genesis, &[CONFIRMED_STEP]);
        assert_eq!(
            h.rollup.recover_stake_mooted(&actor(2), &genesis, &actor(1), &[CONFIRMED_STEP], &[STAKER_STEP]),
            Err(RollupError::InvalidConflictProof)
        );
        assert!(h.rollup.is_staked(&actor(1)));
    }

    #[test]
    fn test_mooted_requires_staker_location() {
        let h = harness();
        let genesis = mooted_staker(&h);
        assert_eq!(
            h.rollup.recover_stake_mooted(&actor(2), &genesis, &actor(1), &[CONFIRMED_STEP], &[Hash([7; 32])]),
            Err(RollupError::InvalidConflictProof)
        );
        h.rollup
            .recover_stake_mooted(&actor(2), &genesis, &actor(1), &[CONFIRMED_STEP], &[STAKER_STEP])
            .unwrap();
        assert!(!h.rollup.is_staked(&actor(1)));
        assert_eq!(h.sink.event_names(), vec!["StakeCreated", "StakeRefunded"]);
    }

    /// Frontier holding one stale leaf beside a confirmed sibling
    fn stale_leaf(h: &Harness) -> (Hash, Hash) {
        let genesis = h.rollup.last_confirmed();
        let leaf = calculate_path(&genesis, &[STAKER_STEP]);
        let mut state = h.rollup.lock_state();
        state.leaves.insert(leaf);
        state.last_confirmed = calculate_path(&genesis, &[CONFIRMED_STEP]);
        (genesis, leaf)
    }

    #[test]
    fn test_prune_rejects_shared_first_step() {
        let h = harness();
        let (genesis, leaf) = stale_leaf(&h);
        assert_eq!(
            h.rollup.prune_leaf(&actor(1), &genesis, &[STAKER_STEP], &[STAKER_STEP]),
            Err(RollupError::PruneConflict)
        );
        assert!(h.rollup.is_leaf(&leaf));
    }

    #[test]
    fn test_prune_requires_path_to_latest_confirmed() {
        let h = harness();
        let (genesis, leaf) = stale_leaf(&h);
        assert_eq!(
            h.rollup.prune_leaf(&actor(1), &genesis, &[STAKER_STEP], &[Hash([7; 32])]),
            Err(RollupError::PruneConflict)
        );
        assert!(h.rollup.is_leaf(&leaf));

        h.rollup.prune_leaf(&actor(1), &genesis, &[STAKER_STEP], &[CONFIRMED_STEP]).unwrap();
        assert!(!h.rollup.is_leaf(&leaf));
        assert_eq!(h.sink.event_names(), vec!["Pruned"]);
    }

    #[test]
    fn test_prune_requires_divergent_proofs() {
        let h = harness();
        let genesis = h.rollup.last_confirmed();
        assert_eq!(
            h.rollup.prune_leaf(&actor(1), &genesis, &[], &[]),
            Err(RollupError::PruneConflict)
        );
        assert_eq!(
            h.rollup.prune_leaf(&actor(1), &genesis, &[Hash([1; 32])], &[]),
            Err(RollupError::InvalidLeaf)
        );
        assert!(h.rollup.is_leaf(&genesis));
    }
}
