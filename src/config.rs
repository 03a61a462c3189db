// src/config.rs
//! Rollup configuration
//!
//! Chain parameters are fixed when a rollup is created and never change.
//! Configurations can be built in code or loaded from JSON.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

use crate::types::{Address, Hash, TimeTicks, TICKS_PER_BLOCK};

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(String),

    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("gas speed limit per tick must be non-zero")]
    ZeroSpeedLimit,

    #[error("stake requirement must be non-zero")]
    ZeroStakeRequirement,
}

/// Immutable parameters of a rollup instance
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct ChainParams {
    /// Exact stake every staker must bond
    pub stake_requirement: u128,

    /// Ticks added to every node deadline
    pub grace_period: TimeTicks,

    /// Most execution steps one assertion may claim
    pub max_execution_steps: u64,

    /// Gas that can be checked per tick
    pub arb_gas_speed_limit_per_tick: u64,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            stake_requirement: 1_000_000_000_000_000_000,
            // Roughly one hour of 13 second blocks
            grace_period: TimeTicks(277 * TICKS_PER_BLOCK),
            max_execution_steps: 1_000_000_000,
            arb_gas_speed_limit_per_tick: 200_000,
        }
    }
}

impl ChainParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arb_gas_speed_limit_per_tick == 0 {
            return Err(ConfigError::ZeroSpeedLimit);
        }
        if self.stake_requirement == 0 {
            return Err(ConfigError::ZeroStakeRequirement);
        }
        Ok(())
    }

    /// Ticks needed to check `num_gas` gas, rounded up
    pub fn check_ticks(&self, num_gas: u64) -> TimeTicks {
        TimeTicks(u128::from(num_gas.div_ceil(self.arb_gas_speed_limit_per_tick)))
    }
}

/// Everything needed to instantiate a rollup
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Hash of the initial machine
    pub vm_state: Hash,

    pub params: ChainParams,

    pub owner: Address,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            vm_state: Hash::zero(),
            params: ChainParams::default(),
            owner: Address::zero(),
        }
    }
}

impl RollupConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: RollupConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.params.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: RollupConfig = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.params.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
