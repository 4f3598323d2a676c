//! Error types for Flotilla.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.
//! The taxonomy distinguishes invocation-fatal errors (analysis) from per-stack
//! errors (dispatch) and best-effort errors (build/publish).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Flotilla operations.
pub type Result<T> = std::result::Result<T, FlotillaError>;

/// Main error type for Flotilla.
#[derive(Error, Debug)]
pub enum FlotillaError {
    // Analysis errors abort the whole invocation: acting on a partial
    // analysis is unsafe.
    #[error("Stack analysis failed: {reason}")]
    Analysis { reason: String },

    // Dispatch errors are fatal to the owning stack's task only.
    #[error("Stack {stack_name} has no running instances to deploy to")]
    NoRunningInstances { stack_name: String },

    #[error("Command {command} failed on stack {stack_name} (deployment {deployment_id})")]
    CommandFailed { stack_name: String, deployment_id: String, command: String },

    #[error("Deadline exceeded waiting on deployment {deployment_id} for stack {stack_name}")]
    DeadlineExceeded { stack_name: String, deployment_id: String },

    // Build/publish errors are logged and the invocation continues; the
    // fingerprint comparison will mark the artifact stale again next run.
    #[error("Failed to build cookbook {cookbook}: {reason}")]
    Build { cookbook: String, reason: String },

    #[error("Failed to publish {artifact_key}: {reason}")]
    Publish { artifact_key: String, reason: String },

    // Collaborator errors
    #[error("Fleet service error: {reason}")]
    Remote { reason: String },

    #[error("Artifact store error: {reason}")]
    Store { reason: String },

    #[error("Fingerprint lookup failed for {path:?}: {reason}")]
    Fingerprint { path: PathBuf, reason: String },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Deploy task panicked: {reason}")]
    TaskPanicked { reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FlotillaError {
    /// Create an Analysis error from any error type.
    pub fn analysis(err: impl std::fmt::Display) -> Self {
        Self::Analysis { reason: err.to_string() }
    }
}
