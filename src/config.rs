//! Configuration module
//!
//! Loads the pipeline configuration from a TOML file, applies `.env` and
//! environment overrides, and validates the result before anything touches
//! the network.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::programs::enrollment::EnrollmentProgram;
use crate::submit_engine::SubmitOptions;
use crate::tx_builder::TxPipelineError;
use crate::types::Commitment;

pub const ENV_RPC_URL: &str = "PIPELINE_RPC_URL";
pub const ENV_WS_URL: &str = "PIPELINE_WS_URL";
pub const ENV_KEYPAIR: &str = "PIPELINE_KEYPAIR";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

impl From<ConfigError> for TxPipelineError {
    fn from(err: ConfigError) -> Self {
        TxPipelineError::Configuration(err.to_string())
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub wallet: WalletConfig,

    #[serde(default)]
    pub enrollment: EnrollmentConfig,

    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    /// Cluster name used in explorer links
    #[serde(default = "default_cluster")]
    pub cluster: String,

    #[serde(default)]
    pub commitment: Commitment,

    #[serde(default)]
    pub skip_preflight: bool,

    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    #[serde(default = "default_block_height_poll_interval")]
    pub block_height_poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Path to keypair file
    #[serde(default = "default_keypair_path")]
    pub keypair_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrollmentConfig {
    #[serde(default = "default_enrollment_program")]
    pub program_id: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_mpl_core_program")]
    pub mpl_core_program: String,

    /// Handle passed to the initialize instruction
    #[serde(default)]
    pub github: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_mint")]
    pub mint: String,

    #[serde(default = "default_recipient")]
    pub recipient: String,

    /// Base units of the mint
    #[serde(default = "default_amount")]
    pub amount: u64,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.devnet.solana.com".to_string() }
fn default_ws_url() -> String { "wss://api.devnet.solana.com".to_string() }
fn default_cluster() -> String { "devnet".to_string() }
fn default_confirmation_timeout() -> u64 { 90 }
fn default_block_height_poll_interval() -> u64 { 2_000 }
fn default_keypair_path() -> String { "dev-wallet.json".to_string() }
fn default_enrollment_program() -> String { "TRBZyQHB3m68FGeVsqTK39Wm4xejadjVhP5MAZaKWDM".to_string() }
fn default_collection() -> String { "5ebsp5RChCGK7ssRZMVMufgVZhd2kFbNaotcZ5UvytN2".to_string() }
fn default_mpl_core_program() -> String { "CoREENxT6tW1HoK8ypY1SxRMZTcVPm7R94rH4PZNhX7d".to_string() }
fn default_mint() -> String { "8S3RYiYWqsiyThvTzEzfWqfQqWa1x76PF1fprJVphEUc".to_string() }
fn default_recipient() -> String { "EfDWrJMpg3ExKSYQZWnCKQrZMFAa3xmuJGzmkiKNov63".to_string() }
fn default_amount() -> u64 { 5_000_000 }

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            ws_url: default_ws_url(),
            cluster: default_cluster(),
            commitment: Commitment::default(),
            skip_preflight: false,
            confirmation_timeout_secs: default_confirmation_timeout(),
            block_height_poll_interval_ms: default_block_height_poll_interval(),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            program_id: default_enrollment_program(),
            collection: default_collection(),
            mpl_core_program: default_mpl_core_program(),
            github: String::new(),
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            mint: default_mint(),
            recipient: default_recipient(),
            amount: default_amount(),
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration with `.env` and environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Defaults plus `.env` and environment overrides, for runs without a file
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Override endpoints and keypair path from `lookup`
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.network.rpc_url = url;
        }
        if let Some(url) = lookup(ENV_WS_URL) {
            self.network.ws_url = url;
        }
        if let Some(path) = lookup(ENV_KEYPAIR) {
            self.wallet.keypair_path = path;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_url("network.rpc_url", &self.network.rpc_url, &["http://", "https://"])?;
        check_url("network.ws_url", &self.network.ws_url, &["ws://", "wss://"])?;

        if self.network.cluster.trim().is_empty() {
            return Err(ConfigError::invalid("network.cluster", "must not be empty"));
        }
        if self.network.confirmation_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "network.confirmation_timeout_secs",
                "must be greater than zero",
            ));
        }
        if self.network.block_height_poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "network.block_height_poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.wallet.keypair_path.trim().is_empty() {
            return Err(ConfigError::invalid("wallet.keypair_path", "must not be empty"));
        }

        self.enrollment_program()?;
        parse_pubkey("transfer.mint", &self.transfer.mint)?;
        parse_pubkey("transfer.recipient", &self.transfer.recipient)?;
        Ok(())
    }

    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            commitment: self.network.commitment,
            skip_preflight: self.network.skip_preflight,
            confirmation_timeout: Duration::from_secs(self.network.confirmation_timeout_secs),
            block_height_poll_interval: Duration::from_millis(
                self.network.block_height_poll_interval_ms,
            ),
        }
    }

    pub fn enrollment_program(&self) -> Result<EnrollmentProgram, ConfigError> {
        Ok(EnrollmentProgram {
            program_id: parse_pubkey("enrollment.program_id", &self.enrollment.program_id)?,
            collection: parse_pubkey("enrollment.collection", &self.enrollment.collection)?,
            mpl_core_program: parse_pubkey(
                "enrollment.mpl_core_program",
                &self.enrollment.mpl_core_program,
            )?,
        })
    }

    /// `(mint, recipient)` of the transfer section
    pub fn transfer_accounts(&self) -> Result<(Pubkey, Pubkey), ConfigError> {
        Ok((
            parse_pubkey("transfer.mint", &self.transfer.mint)?,
            parse_pubkey("transfer.recipient", &self.transfer.recipient)?,
        ))
    }

    pub fn explorer_url(&self, signature: &impl std::fmt::Display) -> String {
        format!(
            "https://explorer.solana.com/tx/{}?cluster={}",
            signature, self.network.cluster
        )
    }
}

fn check_url(field: &'static str, url: &str, schemes: &[&str]) -> Result<(), ConfigError> {
    let rest = schemes
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .ok_or_else(|| {
            ConfigError::invalid(field, format!("{:?} must start with one of {:?}", url, schemes))
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(ConfigError::invalid(field, format!("{:?} has no host", url)));
    }
    Ok(())
}

fn parse_pubkey(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value)
        .map_err(|e| ConfigError::invalid(field, format!("{:?} is not a public key: {}", value, e)))
}
