//! Provider error classification
//!
//! Maps a [`ProviderError`] onto the four outcomes the reconciler knows how
//! to act on. Conflict codes form a closed allowlist; anything unrecognised
//! is fatal.

use crate::error::{ProviderError, TRANSPORT_ERROR_CODE};
use serde::{Deserialize, Serialize};

const NOT_FOUND_CODES: &[&str] = &[
    "InvalidEniId.NotFound",
    "InvalidNetworkInterfaceId.NotFound",
    "InvalidInstanceId.NotFound",
    "InvalidEcsId.NotFound",
    "NotFound",
];

const TRANSIENT_CODES: &[&str] = &[
    TRANSPORT_ERROR_CODE,
    "ServiceUnavailable",
    "InternalError",
    "Throttling",
    "Throttling.User",
    "RequestTimeout",
];

/// Known "entity is busy or in an incompatible state" errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConflictCode {
    /// The interface is the instance's primary interface and cannot be detached
    DetachPrimaryEniNotAllowed,
    /// The interface type does not allow the operation
    InvalidEniType,
    /// The interface is mid-transition
    InvalidEniState,
    /// The instance is mid-transition
    InvalidEcsState,
    /// Another task is running against the same entity
    TaskConflict,
}

impl ConflictCode {
    pub const ALL: [ConflictCode; 5] = [
        ConflictCode::DetachPrimaryEniNotAllowed,
        ConflictCode::InvalidEniType,
        ConflictCode::InvalidEniState,
        ConflictCode::InvalidEcsState,
        ConflictCode::TaskConflict,
    ];

    /// The provider's wire code
    pub fn as_code(&self) -> &'static str {
        match self {
            ConflictCode::DetachPrimaryEniNotAllowed => {
                "InvalidOperation.DetachPrimaryEniNotAllowed"
            }
            ConflictCode::InvalidEniType => "InvalidOperation.InvalidEniType",
            ConflictCode::InvalidEniState => "InvalidOperation.InvalidEniState",
            ConflictCode::InvalidEcsState => "InvalidOperation.InvalidEcsState",
            ConflictCode::TaskConflict => "TaskConflict",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_code() == code)
    }
}

impl std::fmt::Display for ConflictCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Outcome class of a failed provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The referenced entity does not exist
    NotFound,
    /// The entity exists but cannot accept the mutation right now
    Conflict(ConflictCode),
    /// Infrastructure blip; the identical request may be retried
    Transient,
    /// Anything else; never retried
    Fatal,
}

impl ErrorClass {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ErrorClass::NotFound)
    }

    /// Whether this is a conflict contained in `allowed`
    pub fn is_conflict_in(&self, allowed: &[ConflictCode]) -> bool {
        match self {
            ErrorClass::Conflict(code) => allowed.contains(code),
            _ => false,
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::NotFound => write!(f, "not-found"),
            ErrorClass::Conflict(code) => write!(f, "conflict({})", code),
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// Classify a provider error.
///
/// Codes take precedence over HTTP status: a conflict code returned with a
/// 5xx status is still a conflict.
pub fn classify(err: &ProviderError) -> ErrorClass {
    let code = err.code.as_str();

    if let Some(conflict) = ConflictCode::from_code(code) {
        return ErrorClass::Conflict(conflict);
    }
    if NOT_FOUND_CODES.contains(&code) {
        return ErrorClass::NotFound;
    }
    if TRANSIENT_CODES.contains(&code) {
        return ErrorClass::Transient;
    }

    match err.http_status {
        Some(404) => ErrorClass::NotFound,
        Some(status) if (500..600).contains(&status) => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

impl ProviderError {
    /// Shorthand for [`classify`]
    pub fn class(&self) -> ErrorClass {
        classify(self)
    }
}
