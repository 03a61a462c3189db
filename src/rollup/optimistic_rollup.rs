// src/rollup/optimistic_rollup.rs
//! Optimistic rollup state store
//!
//! This module holds the mutable aggregate of one rollup instance and the
//! handle callers use to mutate it. Every public operation takes the
//! instance lock for its full duration, snapshots the block height once,
//! validates, mutates, and finally records and publishes its events.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::{ChainParams, RollupConfig};
use crate::environment::Environment;
use crate::error::RollupError;
use crate::events::{EventRecord, RollupEvent};
use crate::hashing::genesis_node_hash;
use crate::protocol::VmProtoData;
use crate::types::{Address, BlockHeight, ChildType, Hash, MachineStatus, TimeTicks};

/// A bonded claim on a node of the assertion tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staker {
    /// Node the staker backs
    pub location: Hash,

    /// Block the stake was placed in
    pub creation_height: BlockHeight,

    /// Whether the staker is in an open challenge
    pub in_challenge: bool,

    /// Amount bonded
    pub stake_amount: u128,
}

/// An open challenge between two stakers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    /// Tick after which the challenge times out
    pub deadline: TimeTicks,

    /// Data hash of the challenger's node
    pub challenger_data_hash: Hash,

    pub asserter: Address,
    pub challenger: Address,

    /// Branch the asserter backs
    pub challenge_type: ChildType,
}

/// Mutable aggregate of one rollup instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupState {
    /// Hash of the initial machine
    pub(crate) init_vm_hash: Hash,

    pub(crate) machine_status: MachineStatus,

    pub(crate) params: ChainParams,

    pub(crate) owner: Address,

    /// Block the instance was created in
    pub(crate) creation: BlockHeight,

    pub(crate) contract_address: Address,

    /// Frontier of the assertion tree
    pub(crate) leaves: HashSet<Hash>,

    pub(crate) stakers: HashMap<Address, Staker>,

    pub(crate) challenges: HashMap<Address, ChallengeRecord>,

    pub(crate) last_confirmed: Hash,

    /// Valid child of the most recent assertion
    pub(crate) next_confirmed: Option<Hash>,

    /// Challenges created so far; seeds challenge addresses
    pub(crate) challenge_nonce: u64,

    /// Append-only event log, by block
    pub(crate) events: BTreeMap<BlockHeight, Vec<RollupEvent>>,
}

impl RollupState {
    /// Genesis state of a new instance
    pub fn new(contract_address: Address, config: &RollupConfig, creation: BlockHeight) -> Self {
        let proto = VmProtoData::initial(config.vm_state);
        let genesis = genesis_node_hash(&proto.hash());

        let mut leaves = HashSet::new();
        leaves.insert(genesis);

        Self {
            init_vm_hash: config.vm_state,
            machine_status: MachineStatus::Extensive,
            params: config.params.clone(),
            owner: config.owner,
            creation,
            contract_address,
            leaves,
            stakers: HashMap::new(),
            challenges: HashMap::new(),
            last_confirmed: genesis,
            next_confirmed: None,
            challenge_nonce: 0,
            events: BTreeMap::new(),
        }
    }

    pub fn last_confirmed(&self) -> Hash {
        self.last_confirmed
    }

    pub fn next_confirmed(&self) -> Option<Hash> {
        self.next_confirmed
    }

    pub fn is_leaf(&self, node: &Hash) -> bool {
        self.leaves.contains(node)
    }

    /// Current frontier, sorted
    pub fn leaves(&self) -> Vec<Hash> {
        let mut leaves: Vec<Hash> = self.leaves.iter().copied().collect();
        leaves.sort();
        leaves
    }

    pub fn staker(&self, address: &Address) -> Option<&Staker> {
        self.stakers.get(address)
    }

    pub fn challenge(&self, address: &Address) -> Option<&ChallengeRecord> {
        self.challenges.get(address)
    }

    pub fn machine_status(&self) -> MachineStatus {
        self.machine_status
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn creation(&self) -> BlockHeight {
        self.creation
    }

    pub fn init_vm_hash(&self) -> Hash {
        self.init_vm_hash
    }

    pub fn events_at(&self, block: BlockHeight) -> &[RollupEvent] {
        self.events.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn staker_mut(&mut self, address: &Address) -> Result<&mut Staker, RollupError> {
        self.stakers.get_mut(address).ok_or(RollupError::StakerNotFound)
    }

    pub(crate) fn staker_location(&self, address: &Address) -> Result<Hash, RollupError> {
        self.stakers
            .get(address)
            .map(|staker| staker.location)
            .ok_or(RollupError::StakerNotFound)
    }

    /// Hand a staker's bond back, then delete its record
    pub(crate) fn refund_staker(&mut self, call: &mut Call<'_>, address: &Address) {
        let Some(amount) = self.stakers.get(address).map(|staker| staker.stake_amount) else {
            return;
        };
        // The record stays in place until the host has moved the value.
        call.env.transfers.refund(&self.contract_address, address, amount);
        self.stakers.remove(address);
        call.emit(RollupEvent::StakeRefunded { staker: *address });
    }
}

/// Context of one locked call
pub(crate) struct Call<'a> {
    pub caller: Address,
    pub block: BlockHeight,
    pub rollup: Address,
    pub env: &'a Environment,
    events: Vec<RollupEvent>,
}

impl<'a> Call<'a> {
    fn new(caller: Address, rollup: Address, env: &'a Environment) -> Self {
        Self {
            caller,
            block: env.chain.current_block_height(),
            rollup,
            env,
            events: Vec::new(),
        }
    }

    /// Current time in ticks
    pub fn now_ticks(&self) -> TimeTicks {
        TimeTicks::from_blocks(self.block)
    }

    /// Queue an event for publication once the call succeeds
    pub fn emit(&mut self, event: RollupEvent) {
        self.events.push(event);
    }
}

/// Handle to a rollup instance
///
/// All mutation goes through `&self` methods that serialize on one lock.
pub struct Rollup {
    address: Address,
    state: Mutex<RollupState>,
    env: Environment,
}

impl Rollup {
    /// Create an instance at `address` with genesis state built from `config`
    pub fn new(address: Address, config: RollupConfig, env: Environment) -> Result<Self, RollupError> {
        config.params.validate()?;
        let creation = env.chain.current_block_height();
        let state = RollupState::new(address, &config, creation);

        info!(
            "Rollup created: address {}, owner {}, genesis {}",
            address, config.owner, state.last_confirmed
        );

        Ok(Self {
            address,
            state: Mutex::new(state),
            env,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub(crate) fn lock_state(&self) -> MutexGuard<'_, RollupState> {
        // Operations never leave the state half-updated, so a poisoned lock
        // still guards a consistent value.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `op` under the instance lock and publish its events on success
    pub(crate) fn execute<T>(
        &self,
        caller: &Address,
        operation: &'static str,
        op: impl FnOnce(&mut RollupState, &mut Call<'_>) -> Result<T, RollupError>,
    ) -> Result<T, RollupError> {
        let mut state = self.lock_state();
        let mut call = Call::new(*caller, self.address, &self.env);

        match op(&mut state, &mut call) {
            Ok(value) => {
                let block = call.block;
                let mut records = Vec::with_capacity(call.events.len());
                for event in call.events {
                    debug!("{} emitted {} at block {}", operation, event.name(), block);
                    state.events.entry(block).or_default().push(event.clone());
                    records.push(EventRecord {
                        block,
                        rollup: self.address,
                        event,
                    });
                }
                // Sinks run without the instance lock and may call back in.
                drop(state);
                for record in records {
                    self.env.events.publish(record);
                }
                Ok(value)
            }
            Err(err) => {
                warn!("{} rejected for {} at block {}: {}", operation, caller, call.block, err);
                Err(err)
            }
        }
    }

    pub fn last_confirmed(&self) -> Hash {
        self.lock_state().last_confirmed()
    }

    pub fn next_confirmed(&self) -> Option<Hash> {
        self.lock_state().next_confirmed()
    }

    pub fn is_leaf(&self, node: &Hash) -> bool {
        self.lock_state().is_leaf(node)
    }

    pub fn leaves(&self) -> Vec<Hash> {
        self.lock_state().leaves()
    }

    pub fn staker(&self, address: &Address) -> Option<Staker> {
        self.lock_state().staker(address).cloned()
    }

    pub fn is_staked(&self, address: &Address) -> bool {
        self.lock_state().staker(address).is_some()
    }

    pub fn challenge(&self, address: &Address) -> Option<ChallengeRecord> {
        self.lock_state().challenge(address).cloned()
    }

    pub fn machine_status(&self) -> MachineStatus {
        self.lock_state().machine_status()
    }

    pub fn params(&self) -> ChainParams {
        self.lock_state().params().clone()
    }

    pub fn events_at(&self, block: BlockHeight) -> Vec<RollupEvent> {
        self.lock_state().events_at(block).to_vec()
    }

    /// Consistent copy of the whole state
    pub fn snapshot(&self) -> RollupState {
        self.lock_state().clone()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::environment::{CollectingSink, EventSink, ManualChain, MemoryInbox, NullTransfer, StakeTransfer};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Arc;

    #[test]
    fn test_genesis_state() {
        let h = harness();
        let genesis = genesis_node_hash(&VmProtoData::initial(Hash([0x42; 32])).hash());
        assert_eq!(h.rollup.last_confirmed(), genesis);
        assert_eq!(h.rollup.leaves(), vec![genesis]);
        assert_eq!(h.rollup.next_confirmed(), None);
        assert_eq!(h.rollup.machine_status(), MachineStatus::Extensive);

        let snapshot = h.rollup.snapshot();
        assert_eq!(snapshot.creation(), BlockHeight(10));
        assert_eq!(snapshot.owner(), Address([0xee; 20]));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let h = harness();
        let mut config = RollupConfig::default();
        config.params.arb_gas_speed_limit_per_tick = 0;
        let env = h.rollup.env.clone();
        assert!(matches!(
            Rollup::new(actor(1), config, env),
            Err(RollupError::Config(_))
        ));
    }

    #[test]
    fn test_failed_call_publishes_nothing() {
        let h = harness();
        let result = h.rollup.execute(&actor(1), "noop", |_, call| {
            call.emit(RollupEvent::Pruned { leaf: Hash::zero() });
            Err::<(), _>(RollupError::InvalidProof)
        });
        assert_eq!(result, Err(RollupError::InvalidProof));
        assert!(h.sink.records().is_empty());
        assert!(h.rollup.events_at(BlockHeight(10)).is_empty());
    }

    #[test]
    fn test_successful_call_logs_and_publishes() {
        let h = harness();
        h.rollup
            .execute(&actor(1), "noop", |_, call| {
                call.emit(RollupEvent::Pruned { leaf: Hash::zero() });
                Ok(())
            })
            .unwrap();
        let records = h.sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block, BlockHeight(10));
        assert_eq!(records[0].rollup, h.rollup.address());
        assert_eq!(h.rollup.events_at(BlockHeight(10)).len(), 1);
    }

    struct FailingTransfer;

    impl StakeTransfer for FailingTransfer {
        fn refund(&self, _rollup: &Address, _staker: &Address, _amount: u128) {
            panic!("transfer failed");
        }
    }

    #[test]
    fn test_failed_refund_keeps_staker() {
        let chain = Arc::new(ManualChain::new(10));
        let sink = Arc::new(CollectingSink::new());
        let env = Environment::new(chain, Arc::new(MemoryInbox::new()), sink.clone(), Arc::new(FailingTransfer));
        let rollup = Rollup::new(actor(0xaa), RollupConfig::default(), env).unwrap();
        let stake = rollup.params().stake_requirement;
        rollup.place_stake(&actor(1), stake, &[], &[]).unwrap();

        let result = panic::catch_unwind(AssertUnwindSafe(|| rollup.recover_stake_confirmed(&actor(1), &[])));
        assert!(result.is_err());
        assert!(rollup.is_staked(&actor(1)));
        assert_eq!(sink.event_names(), vec!["StakeCreated"]);
    }

    /// Sink that reads the rollup back while handling each record
    #[derive(Default)]
    struct ReadingSink {
        rollup: Mutex<Option<Arc<Rollup>>>,
        seen_leaves: Mutex<Vec<usize>>,
    }

    impl EventSink for ReadingSink {
        fn publish(&self, _record: EventRecord) {
            let rollup = self.rollup.lock().unwrap().clone();
            if let Some(rollup) = rollup {
                self.seen_leaves.lock().unwrap().push(rollup.leaves().len());
            }
        }
    }

    #[test]
    fn test_sink_may_read_rollup() {
        let sink = Arc::new(ReadingSink::default());
        let env = Environment::new(
            Arc::new(ManualChain::new(10)),
            Arc::new(MemoryInbox::new()),
            sink.clone(),
            Arc::new(NullTransfer),
        );
        let rollup = Arc::new(Rollup::new(actor(0xaa), RollupConfig::default(), env).unwrap());
        *sink.rollup.lock().unwrap() = Some(rollup.clone());

        let stake = rollup.params().stake_requirement;
        rollup.place_stake(&actor(1), stake, &[], &[]).unwrap();
        assert_eq!(*sink.seen_leaves.lock().unwrap(), vec![1]);
        sink.rollup.lock().unwrap().take();
    }

    #[test]
    fn test_snapshot_serializes_to_json() {
        let h = harness();
        let snapshot = h.rollup.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: RollupState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, snapshot);
    }
}
