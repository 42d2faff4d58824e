//! `finflow-audit` — ledger consistency auditor.
//!
//! The trial balance check aggregates amounts across every financial
//! entity class of a tenant, verifies per-entity arithmetic invariants and
//! classifies what it finds; the balance guard turns an unbalanced ledger
//! into a veto on further financial operations.

pub mod service;
pub mod trial_balance;

pub use service::{BalanceCheckError, TrialBalanceAuditLogRepository, TrialBalanceService};
pub use trial_balance::{
    BalanceDiscrepancy, BalanceGate, DiscrepancyKind, EntityClass, Severity, TrialBalanceAuditLog,
    TrialBalanceOptions, TrialBalanceResult, TrialBalanceStatus,
};
