use std::{fmt, fs, path::Path, str::FromStr, time::Duration};

use alloy_primitives::Address;
use serde::Deserialize;
use tracing::info;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "ticketing.toml";

/// How a mint resolves the payment it attaches when the event is missing from the cached list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MintPricePolicy {
    /// Read the event record directly and refuse to submit if it does not exist.
    #[default]
    Resolve,
    /// Attach a zero payment and let the registry decide.
    ZeroFallback,
}

impl FromStr for MintPricePolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resolve" => Ok(Self::Resolve),
            "zero-fallback" | "zero" => Ok(Self::ZeroFallback),
            _ => Err(ConfigError::InvalidValue {
                field: "mint_price_policy",
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for MintPricePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolve => f.write_str("resolve"),
            Self::ZeroFallback => f.write_str("zero-fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub rpc_url: String,
    pub registry_address: Option<String>,
    pub chain_id: u64,
    pub sender: Option<String>,
    pub receipt_poll_interval_ms: u64,
    pub mint_price_policy: MintPricePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            registry_address: None,
            chain_id: 31337,
            sender: None,
            receipt_poll_interval_ms: 500,
            mint_price_policy: MintPricePolicy::Resolve,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSettings {
    pub rpc_url: Url,
    pub registry_address: Option<Address>,
    pub chain_id: u64,
    pub sender: Option<Address>,
    pub receipt_poll_interval: Duration,
    pub mint_price_policy: MintPricePolicy,
}

/// Loads defaults, then the config file, then environment overrides.
///
/// An explicitly given `path` must exist; the default `ticketing.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) => Settings::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            Settings::from_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Settings::default(),
    };
    settings.apply_env_overrides(|name| std::env::var(name).ok())?;
    Ok(settings)
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("config: loaded {}", path.display());
        Ok(settings)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| names.iter().rev().find_map(|name| lookup(name));

        if let Some(v) = first(&["EVENT_TICKET_RPC_URL", "APP__RPC_URL"]) {
            self.rpc_url = v;
        }
        if let Some(v) = first(&["EVENT_TICKET_ADDRESS", "APP__REGISTRY_ADDRESS"]) {
            self.registry_address = Some(v);
        }
        if let Some(v) = first(&["EVENT_TICKET_CHAIN_ID", "APP__CHAIN_ID"]) {
            self.chain_id = v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "chain_id",
                value: v.clone(),
            })?;
        }
        if let Some(v) = first(&["EVENT_TICKET_SENDER", "APP__SENDER"]) {
            self.sender = Some(v);
        }
        if let Some(v) = lookup("APP__RECEIPT_POLL_INTERVAL_MS") {
            self.receipt_poll_interval_ms =
                v.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    field: "receipt_poll_interval_ms",
                    value: v.clone(),
                })?;
        }
        if let Some(v) = lookup("APP__MINT_PRICE_POLICY") {
            self.mint_price_policy = v.parse()?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<ValidatedSettings, ConfigError> {
        let rpc_url = Url::parse(self.rpc_url.trim()).map_err(|err| ConfigError::InvalidRpcUrl {
            value: self.rpc_url.clone(),
            reason: err.to_string(),
        })?;
        if !matches!(rpc_url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidRpcUrl {
                value: self.rpc_url.clone(),
                reason: "scheme must be http or https".into(),
            });
        }
        if self.chain_id == 0 {
            return Err(ConfigError::ZeroChainId);
        }
        if self.receipt_poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }

        Ok(ValidatedSettings {
            rpc_url,
            registry_address: parse_optional_address("registry", self.registry_address.as_deref())?,
            chain_id: self.chain_id,
            sender: parse_optional_address("sender", self.sender.as_deref())?,
            receipt_poll_interval: Duration::from_millis(self.receipt_poll_interval_ms),
            mint_price_policy: self.mint_price_policy,
        })
    }
}

fn parse_optional_address(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<Address>, ConfigError> {
    let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    Address::from_str(value)
        .map(Some)
        .map_err(|_| ConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
