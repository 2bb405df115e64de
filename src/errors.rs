//! Typed error hierarchy for the review gate.
//!
//! Expected validation failures (missing stage fields, failing layers,
//! unknown notification channels) are reported as values on the relevant
//! result types. `GateError` is reserved for conditions that abort a single
//! request: rejected ids, missing records, storage failures, and defects such
//! as an unimplemented stage contract.

use thiserror::Error;

/// Errors surfaced by the gate library.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid request ID: {id:?}")]
    InvalidRequestId { id: String },

    #[error("Review request not found: {id}")]
    RequestNotFound { id: String },

    #[error("Review request {id} is not pending (status: {status})")]
    RequestNotPending { id: String, status: String },

    #[error("No executor found for stage: {stage_id}")]
    NoExecutor { stage_id: String },

    #[error("Stage {stage_id} does not implement execute()")]
    UnimplementedStage { stage_id: String },

    #[error("No reviewer configured for human review")]
    MissingReviewer,

    #[error("Storage error at {path}: {source}")]
    Storage {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize {what}: {source}")]
    Serialization {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GateError {
    /// True for errors caused by caller input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequestId { .. }
                | Self::RequestNotFound { .. }
                | Self::RequestNotPending { .. }
                | Self::NoExecutor { .. }
                | Self::MissingReviewer
        )
    }
}

pub type GateResult<T> = std::result::Result<T, GateError>;
