// src/environment.rs
//! External capabilities the ledger depends on
//!
//! The core only ever asks the host for the current block height, the
//! state of the pending inbox, somewhere to publish events and someone to
//! move refunded stake. In-memory implementations are provided for hosts
//! that simulate a chain and for tests.

use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::events::EventRecord;
use crate::hashing::{empty_tuple_hash, hash_pair};
use crate::types::{Address, BlockHeight, Hash};

/// Source of the current block height
///
/// Heights must never decrease across calls.
pub trait ChainSource: Send + Sync {
    fn current_block_height(&self) -> BlockHeight;
}

/// Read access to the externally maintained pending inbox
pub trait InboxSource: Send + Sync {
    /// Messages delivered to `rollup` so far
    fn pending_count(&self, rollup: &Address) -> u128;

    /// Accumulated hash of those messages
    fn pending_top_hash(&self, rollup: &Address) -> Hash;
}

/// Receiver of published events
///
/// Records are published after the instance lock is released, so a sink may
/// read the rollup that emitted them. Records of concurrent calls may
/// interleave; each carries its block height.
pub trait EventSink: Send + Sync {
    fn publish(&self, record: EventRecord);
}

/// Moves stake value back to a staker
pub trait StakeTransfer: Send + Sync {
    fn refund(&self, rollup: &Address, staker: &Address, amount: u128);
}

/// Capabilities handed to every rollup instance
#[derive(Clone)]
pub struct Environment {
    pub chain: Arc<dyn ChainSource>,
    pub inbox: Arc<dyn InboxSource>,
    pub events: Arc<dyn EventSink>,
    pub transfers: Arc<dyn StakeTransfer>,
}

impl Environment {
    pub fn new(
        chain: Arc<dyn ChainSource>,
        inbox: Arc<dyn InboxSource>,
        events: Arc<dyn EventSink>,
        transfers: Arc<dyn StakeTransfer>,
    ) -> Self {
        Self {
            chain,
            inbox,
            events,
            transfers,
        }
    }
}

/// Chain whose height is advanced by hand
#[derive(Debug, Default)]
pub struct ManualChain {
    height: AtomicU64,
}

impl ManualChain {
    pub fn new(height: u64) -> Self {
        Self {
            height: AtomicU64::new(height),
        }
    }

    /// Move forward `blocks` blocks, returning the new height
    pub fn advance(&self, blocks: u64) -> BlockHeight {
        BlockHeight(self.height.fetch_add(blocks, Ordering::SeqCst) + blocks)
    }

    /// Move forward to `height`; lower heights are ignored
    pub fn advance_to(&self, height: u64) -> BlockHeight {
        let previous = self.height.fetch_max(height, Ordering::SeqCst);
        BlockHeight(previous.max(height))
    }
}

impl ChainSource for ManualChain {
    fn current_block_height(&self) -> BlockHeight {
        BlockHeight(self.height.load(Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
struct PendingInbox {
    count: u128,
    top: Hash,
}

/// Pending inbox kept in memory
#[derive(Debug, Default)]
pub struct MemoryInbox {
    inboxes: Mutex<HashMap<Address, PendingInbox>>,
}

impl MemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the pending inbox of `rollup`
    pub fn deliver_message(&self, rollup: &Address, message_hash: Hash) {
        let mut inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        let inbox = inboxes.entry(*rollup).or_insert_with(|| PendingInbox {
            count: 0,
            top: empty_tuple_hash(),
        });
        inbox.top = hash_pair(&inbox.top, &message_hash);
        inbox.count += 1;
        debug!("Message delivered to {}: count {}, top {}", rollup, inbox.count, inbox.top);
    }
}

impl InboxSource for MemoryInbox {
    fn pending_count(&self, rollup: &Address) -> u128 {
        let inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        inboxes.get(rollup).map_or(0, |inbox| inbox.count)
    }

    fn pending_top_hash(&self, rollup: &Address) -> Hash {
        let inboxes = self.inboxes.lock().unwrap_or_else(PoisonError::into_inner);
        inboxes.get(rollup).map_or_else(empty_tuple_hash, |inbox| inbox.top)
    }
}

/// Sink that keeps every record
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EventRecord>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EventRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Names of the collected events, in publication order
    pub fn event_names(&self) -> Vec<&'static str> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|record| record.event.name())
            .collect()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, record: EventRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record);
    }
}

/// Sink that writes every record to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, record: EventRecord) {
        info!("[{} @ {}] {:?}", record.rollup, record.block, record.event);
    }
}

/// Transfer capability that moves nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransfer;

impl StakeTransfer for NullTransfer {
    fn refund(&self, rollup: &Address, staker: &Address, amount: u128) {
        debug!("Refund of {} to {} on {} not transferred", amount, staker, rollup);
    }
}
