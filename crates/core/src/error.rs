//! Domain error model.
//!
//! Every failure carries a stable machine-readable [`ErrorCode`] alongside a
//! human-readable message, so callers can branch on the code and surface the
//! message verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Stable error codes surfaced across the domain boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidId,
    InvalidAmount,
    InvalidNumber,
    InvalidCounterparty,
    InvalidSource,
    InvalidReason,
    InvalidMethod,
    InvalidTarget,
    InvalidState,
    InvalidStrategy,
    InvalidAllocations,
    NoUnallocated,
    NoRemaining,
    ExceedsOutstanding,
    ExceedsUnallocated,
    ExceedsRemaining,
    AlreadyAllocated,
    HasPayments,
    HasAllocations,
    HasApplications,
    OptimisticLockFailed,
    TrialBalanceImbalanced,
    NotFound,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidId => "INVALID_ID",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InvalidNumber => "INVALID_NUMBER",
            ErrorCode::InvalidCounterparty => "INVALID_COUNTERPARTY",
            ErrorCode::InvalidSource => "INVALID_SOURCE",
            ErrorCode::InvalidReason => "INVALID_REASON",
            ErrorCode::InvalidMethod => "INVALID_METHOD",
            ErrorCode::InvalidTarget => "INVALID_TARGET",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidStrategy => "INVALID_STRATEGY",
            ErrorCode::InvalidAllocations => "INVALID_ALLOCATIONS",
            ErrorCode::NoUnallocated => "NO_UNALLOCATED",
            ErrorCode::NoRemaining => "NO_REMAINING",
            ErrorCode::ExceedsOutstanding => "EXCEEDS_OUTSTANDING",
            ErrorCode::ExceedsUnallocated => "EXCEEDS_UNALLOCATED",
            ErrorCode::ExceedsRemaining => "EXCEEDS_REMAINING",
            ErrorCode::AlreadyAllocated => "ALREADY_ALLOCATED",
            ErrorCode::HasPayments => "HAS_PAYMENTS",
            ErrorCode::HasAllocations => "HAS_ALLOCATIONS",
            ErrorCode::HasApplications => "HAS_APPLICATIONS",
            ErrorCode::OptimisticLockFailed => "OPTIMISTIC_LOCK_FAILED",
            ErrorCode::TrialBalanceImbalanced => "TRIAL_BALANCE_IMBALANCED",
            ErrorCode::NotFound => "NOT_FOUND",
        }
    }
}

impl core::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic business/domain failures (validation,
/// state machines, arithmetic bounds, conflicts). Infrastructure concerns
/// belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation before any mutation.
    #[error("{code}: {message}")]
    Validation { code: ErrorCode, message: String },

    /// An operation was attempted against an aggregate whose status forbids it.
    #[error("{code}: {message}")]
    State { code: ErrorCode, message: String },

    /// An amount exceeded an arithmetic bound (outstanding/unallocated/remaining).
    #[error("{code}: {message}")]
    Bound { code: ErrorCode, message: String },

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("{code}: {message}")]
    Conflict { code: ErrorCode, message: String },

    /// A step of a multi-target reconciliation failed after earlier steps may
    /// already have mutated aggregates. The caller must discard the whole
    /// in-memory mutation set; no compensation is attempted here.
    #[error("reconciliation step for target {target_number} failed: {source}")]
    ReconciliationStep {
        target_number: String,
        #[source]
        source: Box<DomainError>,
    },

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,
}

impl DomainError {
    pub fn validation(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Validation {
            code,
            message: message.into(),
        }
    }

    pub fn state(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::State {
            code,
            message: message.into(),
        }
    }

    pub fn bound(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Bound {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn step(target_number: impl Into<String>, source: DomainError) -> Self {
        Self::ReconciliationStep {
            target_number: target_number.into(),
            source: Box::new(source),
        }
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Stable code for this error. Wrapped reconciliation errors report the
    /// code of the underlying failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Validation { code, .. }
            | DomainError::State { code, .. }
            | DomainError::Bound { code, .. }
            | DomainError::Conflict { code, .. } => *code,
            DomainError::ReconciliationStep { source, .. } => source.code(),
            DomainError::NotFound => ErrorCode::NotFound,
        }
    }
}
