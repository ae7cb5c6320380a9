use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ream_chain::ChainConfig;
use ream_consensus::primitives::UnixSeconds;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the node
    #[command(name = "node")]
    Node(NodeCommand),
}

#[derive(Debug, Parser)]
pub struct NodeCommand {
    /// Verbosity level
    #[arg(short, long, default_value_t = 3)]
    pub verbosity: u8,

    /// Chain config YAML file
    #[arg(long, env = "REAM_CHAIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Genesis time of the interop chain, defaults to now
    #[arg(long)]
    pub genesis_time: Option<UnixSeconds>,

    #[arg(long)]
    pub seconds_per_slot: Option<u64>,

    /// Validators in the interop genesis state
    #[arg(long, default_value_t = 64)]
    pub interop_validators: u64,
}

impl NodeCommand {
    /// The config file, if any, with command line flags taking precedence.
    pub fn chain_config(&self) -> anyhow::Result<ChainConfig> {
        let mut config = match &self.config {
            Some(path) => ChainConfig::from_yaml_file(path)?,
            None => ChainConfig::default(),
        };
        if let Some(genesis_time) = self.genesis_time {
            config.genesis_time = genesis_time;
        }
        if let Some(seconds_per_slot) = self.seconds_per_slot {
            config.seconds_per_slot = seconds_per_slot;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbosity {
            0 => "off",
            1 => "error",
            2 => "warn",
            3 => "info",
            4 => "debug",
            _ => "trace",
        }
    }
}
