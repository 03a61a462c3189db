// src/factory.rs
//! Rollup factory
//!
//! Creates rollup instances at fresh addresses and keeps a registry of the
//! instances it created.

use log::info;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::RollupConfig;
use crate::environment::Environment;
use crate::error::RollupError;
use crate::events::RollupEvent;
use crate::hashing::derive_address;
use crate::rollup::Rollup;
use crate::types::Address;

#[derive(Default)]
struct Registry {
    rollups: HashMap<Address, Arc<Rollup>>,
    nonce: u64,
}

/// Creator and registry of rollup instances
pub struct RollupFactory {
    address: Address,
    env: Environment,
    registry: Mutex<Registry>,
}

impl RollupFactory {
    /// Create a factory; every instance it creates shares `env`
    pub fn new(address: Address, env: Environment) -> Self {
        Self {
            address,
            env,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Create and register a new rollup instance
    pub fn create_rollup(&self, config: RollupConfig) -> Result<Arc<Rollup>, RollupError> {
        let mut registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        let address = derive_address(&self.address, registry.nonce);
        let owner = config.owner;

        let rollup = Arc::new(Rollup::new(address, config, self.env.clone())?);
        registry.nonce += 1;
        registry.rollups.insert(address, rollup.clone());

        rollup.execute(&self.address, "create_rollup", |_, call| {
            call.emit(RollupEvent::RollupCreated { rollup: address, owner });
            Ok(())
        })?;

        info!("Factory {} created rollup {} for owner {}", self.address, address, owner);
        Ok(rollup)
    }

    /// Look up an instance created by this factory
    pub fn rollup(&self, address: &Address) -> Option<Arc<Rollup>> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.rollups.get(address).cloned()
    }

    pub fn require_rollup(&self, address: &Address) -> Result<Arc<Rollup>, RollupError> {
        self.rollup(address).ok_or(RollupError::UnknownRollup)
    }

    /// Addresses of every instance, in no particular order
    pub fn rollups(&self) -> Vec<Address> {
        let registry = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        registry.rollups.keys().copied().collect()
    }
}
