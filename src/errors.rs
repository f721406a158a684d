//! Typed error hierarchy for zkguard.
//!
//! - `AdapterError` - failures reported by the inference, proof and chain adapters
//! - `OrchestratorError` - run-level rejections
//! - `ConfigError` - configuration file loading
//! - `ManifestError` - deployed-address manifest I/O

use std::path::PathBuf;

use thiserror::Error;

/// The error category an adapter failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterErrorKind {
    Unavailable,
    Failure,
    UserDeclined,
}

/// Errors from an external-service adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The external service or a required artifact is absent.
    #[error("{0}")]
    Unavailable(String),

    /// The service is present but the call failed.
    #[error("{0}")]
    Failure(String),

    /// An external actor (wallet) refused to approve the call.
    #[error("User declined: {0}")]
    UserDeclined(String),
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            Self::Unavailable(_) => AdapterErrorKind::Unavailable,
            Self::Failure(_) => AdapterErrorKind::Failure,
            Self::UserDeclined(_) => AdapterErrorKind::UserDeclined,
        }
    }

    /// Classify a reqwest error: transport problems mean the service is unavailable,
    /// anything after a response arrived is a failure.
    pub fn from_http(context: &str, err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unavailable(format!("{}: {}", context, err))
        } else {
            Self::Failure(format!("{}: {}", context, err))
        }
    }
}

/// Errors from the orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("A pipeline run is already in progress")]
    ConcurrencyRejected,
}

/// Errors while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the deployed-address manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize manifest for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write manifest at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
