//! Error types for the provider abstraction layer.

use thiserror::Error;

/// Errors that can occur during provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// VM id is unknown to the provider being queried.
    #[error("VM {0} not found")]
    VmNotFound(String),

    /// Provider name was never registered (failed its probe or never probed).
    #[error("Provider {0} not found or not available")]
    ProviderNotFound(String),

    /// No provider is active.
    #[error("No VM provider available")]
    NoProviderAvailable,

    /// A specific backend could not be reached or located.
    #[error("Backend not available: {0}")]
    BackendUnavailable(String),

    /// The external tool ran but produced no usable VM identity.
    #[error("Failed to create VM: {0}")]
    CreationFailed(String),

    /// A subprocess or file operation failed.
    #[error("External tool failed: {0}")]
    ExternalTool(String),

    /// Composition document could not be serialized.
    #[error("Compose file error: {0}")]
    Compose(String),
}

/// Coarse error category, used by callers that branch on failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BackendUnavailable,
    CreationFailed,
    ExternalToolFailure,
}

impl ProviderError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::VmNotFound(_) | Self::ProviderNotFound(_) => ErrorKind::NotFound,
            Self::NoProviderAvailable | Self::BackendUnavailable(_) => {
                ErrorKind::BackendUnavailable
            }
            Self::CreationFailed(_) => ErrorKind::CreationFailed,
            Self::ExternalTool(_) | Self::Compose(_) => ErrorKind::ExternalToolFailure,
        }
    }

    /// True for unknown VM ids and unknown provider names.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        Self::ExternalTool(e.to_string())
    }
}

impl From<serde_yaml::Error> for ProviderError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Compose(e.to_string())
    }
}

/// Result type alias for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;
