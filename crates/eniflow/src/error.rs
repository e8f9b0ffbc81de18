//! Reconciler error types

use eniflow_cloud::{
    ConflictCode, ErrorClass, InterfaceStatus, InvalidAttachmentId, InvariantViolation,
    ProviderError,
};
use std::time::Duration;
use thiserror::Error;

/// Reconciliation errors
///
/// Every provider-derived variant names the entity it concerns and keeps the
/// provider's last message, so "still converging" can be told apart from
/// "will never converge".
#[derive(Error, Debug)]
pub enum EniError {
    #[error("{entity} not found: {message}")]
    NotFound { entity: String, message: String },

    #[error("{entity} rejected {operation} ({code}): {message}")]
    Conflict {
        entity: String,
        operation: &'static str,
        code: ConflictCode,
        message: String,
    },

    #[error("{operation} on {entity} failed transiently: {message}")]
    Transient {
        entity: String,
        operation: &'static str,
        message: String,
    },

    #[error("timed out after {waited:?} waiting for {entity} to {target}; last observed: {last_observed}")]
    Timeout {
        entity: String,
        target: String,
        waited: Duration,
        last_observed: String,
    },

    #[error("{operation} on {entity} failed: {source}")]
    Fatal {
        entity: String,
        operation: &'static str,
        #[source]
        source: ProviderError,
    },

    #[error("{entity} reached {observed} while waiting for it to become {expected}")]
    UnexpectedState {
        entity: String,
        expected: InterfaceStatus,
        observed: InterfaceStatus,
    },

    #[error(transparent)]
    InvalidId(#[from] InvalidAttachmentId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider returned an inconsistent snapshot: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl EniError {
    /// Classify a provider error once, at the call site that received it
    pub fn from_provider(
        entity: impl Into<String>,
        operation: &'static str,
        err: ProviderError,
    ) -> Self {
        let entity = entity.into();
        match err.class() {
            ErrorClass::NotFound => EniError::NotFound {
                entity,
                message: err.to_string(),
            },
            ErrorClass::Conflict(code) => EniError::Conflict {
                entity,
                operation,
                code,
                message: err.message,
            },
            ErrorClass::Transient => EniError::Transient {
                entity,
                operation,
                message: err.to_string(),
            },
            ErrorClass::Fatal => EniError::Fatal {
                entity,
                operation,
                source: err,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, EniError::NotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EniError::Timeout { .. })
    }

    /// Whether re-invoking the same reconciliation later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EniError::Conflict { .. } | EniError::Transient { .. } | EniError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EniError>;
