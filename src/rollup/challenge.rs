// src/rollup/challenge.rs
//! Challenge subsystem
//!
//! Opens a challenge between two stakers who are proven to back different
//! children of the same node. Only the opening is handled here; the
//! interactive game that settles a challenge runs elsewhere.

use log::info;

use super::optimistic_rollup::{Call, ChallengeRecord, Rollup, RollupState};
use crate::error::{ChallengeSide, RollupError};
use crate::events::RollupEvent;
use crate::hashing::{derive_address, node_hash};
use crate::proof::calculate_path;
use crate::protocol::ChallengeRequest;
use crate::types::{Address, TimeTicks};

impl RollupState {
    /// Check that `staker` exists and staked no later than `deadline`
    fn check_challenge_party(
        &self,
        staker: &Address,
        deadline: TimeTicks,
        side: ChallengeSide,
    ) -> Result<(), RollupError> {
        let record = self.stakers.get(staker).ok_or(RollupError::UnknownStaker(side))?;
        if TimeTicks::from_blocks(record.creation_height) > deadline {
            return Err(RollupError::StakedAfterDeadline(side));
        }
        Ok(())
    }

    /// Check that one party's node folds to its recorded location
    fn check_challenge_position(&self, request: &ChallengeRequest, side: ChallengeSide) -> Result<(), RollupError> {
        let (staker, proto_hash, data_hash, position, proof) = match side {
            ChallengeSide::Asserter => (
                &request.asserter,
                &request.asserter_proto_hash,
                &request.asserter_data_hash,
                request.asserter_position,
                &request.asserter_proof,
            ),
            ChallengeSide::Challenger => (
                &request.challenger,
                &request.challenger_proto_hash,
                &request.challenger_data_hash,
                request.challenger_position,
                &request.challenger_proof,
            ),
        };
        let node = node_hash(
            &request.prev_node,
            proto_hash,
            request.disputable_deadline,
            data_hash,
            position,
        );
        if calculate_path(&node, proof) != self.staker_location(staker)? {
            return Err(RollupError::ChallengeProofError(side));
        }
        Ok(())
    }

    pub(crate) fn start_challenge(
        &mut self,
        call: &mut Call<'_>,
        request: &ChallengeRequest,
    ) -> Result<Address, RollupError> {
        let deadline = request.disputable_deadline;
        self.check_challenge_party(&request.asserter, deadline, ChallengeSide::Asserter)?;
        self.check_challenge_party(&request.challenger, deadline, ChallengeSide::Challenger)?;

        for (staker, side) in [
            (&request.asserter, ChallengeSide::Asserter),
            (&request.challenger, ChallengeSide::Challenger),
        ] {
            if self.stakers.get(staker).map_or(false, |record| record.in_challenge) {
                return Err(RollupError::AlreadyInChallenge(side));
            }
        }

        if request.asserter_position <= request.challenger_position {
            return Err(RollupError::UnorderedChildTypes);
        }

        self.check_challenge_position(request, ChallengeSide::Asserter)?;
        self.check_challenge_position(request, ChallengeSide::Challenger)?;

        self.staker_mut(&request.asserter)?.in_challenge = true;
        self.staker_mut(&request.challenger)?.in_challenge = true;

        let challenge = derive_address(&self.contract_address, self.challenge_nonce);
        self.challenge_nonce += 1;
        let record = ChallengeRecord {
            deadline: call.now_ticks().add(request.challenge_period),
            challenger_data_hash: request.challenger_data_hash,
            asserter: request.asserter,
            challenger: request.challenger,
            challenge_type: request.asserter_position,
        };
        let challenge_deadline = record.deadline;
        self.challenges.insert(challenge, record);

        call.emit(RollupEvent::ChallengeInitiated {
            challenge,
            deadline: challenge_deadline,
        });
        call.emit(RollupEvent::ChallengeStarted {
            asserter: request.asserter,
            challenger: request.challenger,
            challenge_type: request.asserter_position,
            challenge_contract: challenge,
        });

        info!(
            "Challenge started: {} between asserter {} and challenger {}, deadline {}",
            challenge, request.asserter, request.challenger, challenge_deadline
        );
        Ok(challenge)
    }
}

impl Rollup {
    /// Open a challenge between two stakers on sibling branches
    ///
    /// Returns the address of the new challenge record.
    pub fn start_challenge(&self, caller: &Address, request: &ChallengeRequest) -> Result<Address, RollupError> {
        self.execute(caller, "start_challenge", |state, call| state.start_challenge(call, request))
    }
}
