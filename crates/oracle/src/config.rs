//! Oracle configuration, read from the environment (optionally seeded from a `.env` file).

use crate::relay::CursorCommit;
use alloy::primitives::Address;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 12;
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_STATE_FILE: &str = "last_scanned_block.json";
pub const DEFAULT_MINT_GAS_LIMIT: u64 = 200_000;
pub const DEFAULT_RECEIPT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RECEIPT_POLL_INTERVAL_MS: u64 = 500;

/// Largest accepted duration settings.
pub const MAX_SCAN_INTERVAL_SECS: u64 = 86_400;
pub const MAX_RECEIPT_TIMEOUT_SECS: u64 = 3_600;
pub const MAX_RECEIPT_POLL_INTERVAL_MS: u64 = 60_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Signing key material; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

/// Oracle configuration.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// HTTP RPC URL of the chain the deposits happen on.
    pub source_rpc_url: String,
    /// HTTP RPC URL of the chain mints are submitted to.
    pub dest_rpc_url: String,
    /// Bridge contract emitting `AssetDeposited`.
    pub source_contract: Address,
    /// Bridge contract exposing `mint` and `processedTransactions`.
    pub dest_contract: Address,
    pub signer_key: SecretKey,
    /// Blocks that must be built on top of a block before it is scanned.
    pub required_confirmations: u64,
    pub scan_interval: Duration,
    /// Cursor file location.
    pub state_file: PathBuf,
    pub mint_gas_limit: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
    pub cursor_commit: CursorCommit,
}

impl OracleConfig {
    /// Load from the process environment, after applying `.env` if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &'static str| -> Option<String> {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));

        let source_rpc_url = require("SOURCE_CHAIN_RPC")?;
        let dest_rpc_url = require("DEST_CHAIN_RPC")?;
        let source_contract = parse_var(
            "SOURCE_BRIDGE_CONTRACT_ADDRESS",
            &require("SOURCE_BRIDGE_CONTRACT_ADDRESS")?,
        )?;
        let dest_contract = parse_var(
            "DEST_BRIDGE_CONTRACT_ADDRESS",
            &require("DEST_BRIDGE_CONTRACT_ADDRESS")?,
        )?;
        let signer_key = SecretKey::new(require("ORACLE_PRIVATE_KEY")?);

        let or_default = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            get(var).map_or(Ok(default), |v| parse_var(var, &v))
        };
        let in_range = |var: &'static str, default: u64, max: u64| -> Result<u64, ConfigError> {
            let value = or_default(var, default)?;
            if value == 0 || value > max {
                return Err(ConfigError::Invalid {
                    var,
                    reason: format!("must be between 1 and {max}, got {value}"),
                });
            }
            Ok(value)
        };
        let required_confirmations =
            or_default("REQUIRED_CONFIRMATIONS", DEFAULT_REQUIRED_CONFIRMATIONS)?;
        let scan_interval_secs = in_range(
            "SCAN_INTERVAL_SECONDS",
            DEFAULT_SCAN_INTERVAL_SECS,
            MAX_SCAN_INTERVAL_SECS,
        )?;
        let mint_gas_limit = or_default("MINT_GAS_LIMIT", DEFAULT_MINT_GAS_LIMIT)?;
        let receipt_timeout_secs = in_range(
            "RECEIPT_TIMEOUT_SECONDS",
            DEFAULT_RECEIPT_TIMEOUT_SECS,
            MAX_RECEIPT_TIMEOUT_SECS,
        )?;
        let receipt_poll_ms = in_range(
            "RECEIPT_POLL_INTERVAL_MS",
            DEFAULT_RECEIPT_POLL_INTERVAL_MS,
            MAX_RECEIPT_POLL_INTERVAL_MS,
        )?;
        let cursor_commit = match get("CURSOR_COMMIT") {
            Some(v) => parse_var("CURSOR_COMMIT", &v)?,
            None => CursorCommit::default(),
        };

        Ok(Self {
            source_rpc_url,
            dest_rpc_url,
            source_contract,
            dest_contract,
            signer_key,
            required_confirmations,
            scan_interval: Duration::from_secs(scan_interval_secs),
            state_file: get("STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_FILE)),
            mint_gas_limit,
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(receipt_poll_ms),
            cursor_commit,
        })
    }
}

fn parse_var<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        var,
        reason: e.to_string(),
    })
}
