use std::path::PathBuf;

use shared::error::RegistryError;
use thiserror::Error;

/// Client-side rejection of a command before anything is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Fill out the form with a future event date.")]
    MissingNameOrDate,
    #[error("Provide a ticket supply greater than zero.")]
    InvalidTicketSupply,
    #[error("Set a ticket price in ETH.")]
    InvalidPrice,
    #[error("Select an event before minting.")]
    MissingEvent,
    #[error("Connect a wallet or enter a recipient address.")]
    MissingRecipient,
    #[error("Enter a valid recipient address.")]
    InvalidRecipient,
    #[error("Selected event was not found on the registry.")]
    UnknownEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("another transaction is still in flight")]
    Busy,
    #[error("{0}")]
    Registry(#[from] RegistryError),
}

impl CommandError {
    /// Message shown to the user; registry failures without a message use `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Registry(err) => err.detail().unwrap_or_else(|| fallback.to_string()),
            other => other.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid rpc url '{value}': {reason}")]
    InvalidRpcUrl { value: String, reason: String },
    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
    #[error("invalid value for {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
    #[error("chain id must be greater than zero")]
    ZeroChainId,
    #[error("receipt poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("connected node reports chain id {actual}, expected {expected}")]
    ChainMismatch { expected: u64, actual: u64 },
}
