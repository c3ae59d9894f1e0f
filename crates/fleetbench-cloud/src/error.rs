//! Lifecycle controller error types

use crate::model::WorkerId;
use thiserror::Error;

/// Errors raised while provisioning workers and collecting their results
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Provisioning request '{name}' was rejected: {reason}")]
    ProvisioningRejected { name: String, reason: String },

    #[error("Operation failed after {attempts} attempts: {label} (last error: {last_error})")]
    RetryExhausted {
        label: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Output '{key}' not found on stack '{stack}'")]
    OutputNotFound { stack: String, key: String },

    #[error("Malformed result from worker {worker_id}: {value:?}")]
    MalformedResult { worker_id: String, value: String },

    #[error("Stack '{name}' is not complete (status: {status})")]
    StackNotComplete { name: String, status: String },

    #[error("Expected {expected} workers but the group reports {}", .workers.len())]
    WorkerCountMismatch {
        expected: usize,
        /// Members the group did report
        workers: Vec<WorkerId>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    ApiError(String),
}

impl CloudError {
    /// Whether the error means the addressed resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
