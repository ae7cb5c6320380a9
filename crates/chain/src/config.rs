use std::{fs, path::Path};

use anyhow::{ensure, Context};
use ream_consensus::{
    constants::{DEFAULT_SECONDS_PER_SLOT, DOMAIN_BEACON_ATTESTER},
    primitives::{DomainType, UnixSeconds},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 256;
pub const DEFAULT_PARTICIPATION_HISTORY: usize = 8;

/// Runtime configuration of the chain service. Fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ChainConfig {
    pub genesis_time: UnixSeconds,
    pub seconds_per_slot: u64,
    pub domain_beacon_attester: DomainType,

    /// Buffered events per notification channel before lagging subscribers skip ahead
    pub notification_capacity: usize,

    /// Number of recent epochs whose participation stays queryable
    pub participation_history: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            genesis_time: 0,
            seconds_per_slot: DEFAULT_SECONDS_PER_SLOT,
            domain_beacon_attester: DOMAIN_BEACON_ATTESTER,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            participation_history: DEFAULT_PARTICIPATION_HISTORY,
        }
    }
}

impl ChainConfig {
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("failed to parse chain config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path)
            .with_context(|| format!("failed to read chain config from {}", path.display()))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.seconds_per_slot > 0, "SECONDS_PER_SLOT must be positive");
        ensure!(
            self.notification_capacity > 0,
            "NOTIFICATION_CAPACITY must be positive"
        );
        ensure!(
            self.participation_history > 0,
            "PARTICIPATION_HISTORY must be positive"
        );
        Ok(())
    }
}
