use thiserror::Error;

/// Failure of a read or write call against the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("registry contract address is not configured")]
    NotConfigured,
    #[error("registry transport error: {0}")]
    Transport(String),
    #[error("{}", .0.as_deref().unwrap_or("transaction was rejected by the signer"))]
    Rejected(Option<String>),
    #[error("{}", .0.as_deref().unwrap_or("transaction reverted"))]
    Reverted(Option<String>),
    #[error("failed to decode registry response: {0}")]
    Decode(String),
}

impl RegistryError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// The message reported by the signer, registry or transport, if there is one.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::Transport(message) => Some(message.clone()),
            Self::Rejected(message) | Self::Reverted(message) => message.clone(),
            Self::NotConfigured | Self::Decode(_) => Some(self.to_string()),
        }
    }
}
