//! Error types for node identity collection and activation.
//!
//! Proof failures keep their original `ProofError` reachable through
//! `ActivateError::proof_cause` and the `source()` chain, so callers can
//! tell a missing system value from an unreadable serial-number file.

use std::path::PathBuf;
use thiserror::Error;

use nodeinit_core::Proof;

/// Errors raised while resolving a single proof.
#[derive(Debug, Error)]
pub enum ProofError {
    /// The system exposed no usable value for this proof
    #[error("Proof value not found: {0}")]
    ValueNotFound(Proof),

    /// The proof kind is not one this agent knows how to resolve
    #[error("Proof type not supported: {0}")]
    TypeNotSupported(Proof),

    /// The serial-number file could not be read
    #[error("Failed to read serial number file {}: {source}", .path.display())]
    SerialNumberFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that can occur while collecting or activating.
#[derive(Debug, Error)]
pub enum ActivateError {
    /// A configured proof failed to resolve
    #[error("Fingerprint {index} ({proof}) failed: {source}")]
    Proof {
        index: usize,
        proof: Proof,
        #[source]
        source: ProofError,
    },

    /// The AMI backend failed; passed through untouched
    #[error(transparent)]
    Ami(anyhow::Error),

    /// The activation submitter rejected the record
    #[error("Activation submission failed: {0}")]
    Submit(anyhow::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] nodeinit_core::Error),

    /// No AMI backend is registered for the configured engine kind
    #[error("Unsupported engine backend: {0}")]
    UnsupportedBackend(String),

    /// The AMI backend exists but could not be opened
    #[error("Engine backend {kind} failed to initialize: {source}")]
    Backend {
        kind: String,
        #[source]
        source: anyhow::Error,
    },

    /// Lifecycle misuse
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The blocking collection task panicked or was cancelled
    #[error("Collection task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ActivateError {
    /// The proof failure at the root of this error, if any.
    pub fn proof_cause(&self) -> Option<&ProofError> {
        match self {
            ActivateError::Proof { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether retrying without a configuration change can ever succeed.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            ActivateError::Proof {
                source: ProofError::TypeNotSupported(_),
                ..
            } | ActivateError::Config(_)
                | ActivateError::UnsupportedBackend(_)
                | ActivateError::Backend { .. }
                | ActivateError::InvalidState(_)
        )
    }
}

/// Result type for identity operations.
pub type ActivateResult<T> = Result<T, ActivateError>;
