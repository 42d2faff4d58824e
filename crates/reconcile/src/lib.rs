//! `finflow-reconcile` — allocation strategies and the reconciliation
//! orchestrator.
//!
//! A strategy is a pure function from (amount, ordered targets) to an
//! allocation plan; the orchestrator validates the voucher, filters
//! eligible obligations, runs the strategy and applies the plan to both
//! sides, collecting the emitted domain events for the caller to dispatch.

pub mod service;
pub mod strategy;

pub use service::{
    PaymentReconciliation, ReceiptReconciliation, ReconciliationService,
};
pub use strategy::{
    AllocationPlan, AllocationStrategy, AllocationTarget, ManualAllocation, PlannedAllocation,
};
