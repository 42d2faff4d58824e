//! Trial balance auditor service and pre-operation balance guard.
//!
//! The auditor is read-only: it pulls per-tenant sums and counts from the
//! repositories and, when consistency validation is enabled, iterates
//! every entity to verify its class invariant. It never mutates aggregates
//! and is safe to run concurrently with reconciliation as long as the
//! persistence layer serves read-consistent snapshots.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use finflow_core::{DomainError, DomainResult, ErrorCode, Money, TenantId, UserId};
use finflow_memos::{CreditMemoRepository, DebitMemoRepository};
use finflow_obligations::{PayableRepository, ReceivableRepository};
use finflow_vouchers::{PaymentVoucherRepository, ReceiptVoucherRepository};

use crate::trial_balance::{
    BalanceDiscrepancy, BalanceGate, DiscrepancyKind, EntityClass, TrialBalanceAuditLog,
    TrialBalanceOptions, TrialBalanceResult, TrialBalanceStatus,
};

/// Persistence for trial balance audit log entries (consumed interface).
///
/// Saving is best-effort from the auditor's point of view: a failure must
/// never hide the computed result from the caller.
pub trait TrialBalanceAuditLogRepository: Send + Sync {
    fn save(&self, log: &TrialBalanceAuditLog) -> DomainResult<()>;

    fn find_latest_for_tenant(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> DomainResult<Vec<TrialBalanceAuditLog>>;
}

/// Error surface of the balance guard.
#[derive(Debug, Error)]
pub enum BalanceCheckError {
    /// The ledger is imbalanced and the triggering operation must be
    /// refused. Carries the discrepancy list for diagnostics.
    #[error("TRIAL_BALANCE_IMBALANCED: cannot perform operation: {message}")]
    Imbalanced {
        message: String,
        discrepancies: Vec<BalanceDiscrepancy>,
    },

    /// The check itself failed (repository error).
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl BalanceCheckError {
    pub fn code(&self) -> ErrorCode {
        match self {
            BalanceCheckError::Imbalanced { .. } => ErrorCode::TrialBalanceImbalanced,
            BalanceCheckError::Domain(e) => e.code(),
        }
    }
}

/// Ledger consistency auditor for one tenant's financial entities.
pub struct TrialBalanceService {
    receivables: Arc<dyn ReceivableRepository>,
    payables: Arc<dyn PayableRepository>,
    receipts: Arc<dyn ReceiptVoucherRepository>,
    payments: Arc<dyn PaymentVoucherRepository>,
    credit_memos: Arc<dyn CreditMemoRepository>,
    debit_memos: Arc<dyn DebitMemoRepository>,
    audit_log: Option<Arc<dyn TrialBalanceAuditLogRepository>>,
}

impl TrialBalanceService {
    pub fn new(
        receivables: Arc<dyn ReceivableRepository>,
        payables: Arc<dyn PayableRepository>,
        receipts: Arc<dyn ReceiptVoucherRepository>,
        payments: Arc<dyn PaymentVoucherRepository>,
        credit_memos: Arc<dyn CreditMemoRepository>,
        debit_memos: Arc<dyn DebitMemoRepository>,
    ) -> Self {
        Self {
            receivables,
            payables,
            receipts,
            payments,
            credit_memos,
            debit_memos,
            audit_log: None,
        }
    }

    pub fn with_audit_log(mut self, repo: Arc<dyn TrialBalanceAuditLogRepository>) -> Self {
        self.audit_log = Some(repo);
        self
    }

    /// Run a trial balance check for the tenant.
    ///
    /// For each enabled entity class: pull the aggregate sum and count,
    /// then (if the matching validation toggle is on) iterate every entity
    /// and verify its arithmetic invariant. A violation is recorded only
    /// when the difference is nonzero: Critical beyond the tolerance,
    /// Warning at or below it.
    pub fn perform_trial_balance_check(
        &self,
        tenant_id: TenantId,
        checked_by: Option<UserId>,
        opts: &TrialBalanceOptions,
    ) -> DomainResult<TrialBalanceResult> {
        let started = Instant::now();
        let mut result = TrialBalanceResult::new(tenant_id, checked_by);
        result.period_start = opts.period_start;
        result.period_end = opts.period_end;

        let mut debits = Money::ZERO;
        let mut credits = Money::ZERO;

        if opts.check_receivables {
            let total = self.receivables.sum_outstanding_for_tenant(tenant_id)?;
            result.total_receivables = total;
            result.receivable_count = self.receivables.count_for_tenant(tenant_id)?;
            debits += total;

            if opts.validate_internal_consistency {
                for r in self.receivables.find_all_for_tenant(tenant_id)? {
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::ReceivableAmountMismatch,
                        EntityClass::Receivable,
                        r.id_typed().0,
                        r.number(),
                        r.total() - r.paid(),
                        r.outstanding(),
                    );
                }
            }
        }

        if opts.check_payables {
            let total = self.payables.sum_outstanding_for_tenant(tenant_id)?;
            result.total_payables = total;
            result.payable_count = self.payables.count_for_tenant(tenant_id)?;
            credits += total;

            if opts.validate_internal_consistency {
                for p in self.payables.find_all_for_tenant(tenant_id)? {
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::PayableAmountMismatch,
                        EntityClass::Payable,
                        p.id_typed().0,
                        p.number(),
                        p.total() - p.paid(),
                        p.outstanding(),
                    );
                }
            }
        }

        if opts.check_receipts {
            let total = self.receipts.sum_unallocated_for_tenant(tenant_id)?;
            result.total_receipts = total;
            result.receipt_count = self.receipts.count_for_tenant(tenant_id)?;
            credits += total;

            if opts.validate_voucher_allocations {
                for v in self.receipts.find_all_for_tenant(tenant_id)? {
                    let alloc_sum: Money = v.allocations().iter().map(|a| a.amount).sum();
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::VoucherAllocationMismatch,
                        EntityClass::ReceiptVoucher,
                        v.id_typed().0,
                        v.number(),
                        v.allocated(),
                        alloc_sum,
                    );
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::VoucherAllocationMismatch,
                        EntityClass::ReceiptVoucher,
                        v.id_typed().0,
                        v.number(),
                        v.amount(),
                        v.allocated() + v.unallocated(),
                    );
                }
            }
        }

        if opts.check_payments {
            let total = self.payments.sum_unallocated_for_tenant(tenant_id)?;
            result.total_payments = total;
            result.payment_count = self.payments.count_for_tenant(tenant_id)?;
            debits += total;

            if opts.validate_voucher_allocations {
                for v in self.payments.find_all_for_tenant(tenant_id)? {
                    let alloc_sum: Money = v.allocations().iter().map(|a| a.amount).sum();
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::VoucherAllocationMismatch,
                        EntityClass::PaymentVoucher,
                        v.id_typed().0,
                        v.number(),
                        v.allocated(),
                        alloc_sum,
                    );
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::VoucherAllocationMismatch,
                        EntityClass::PaymentVoucher,
                        v.id_typed().0,
                        v.number(),
                        v.amount(),
                        v.allocated() + v.unallocated(),
                    );
                }
            }
        }

        if opts.check_credit_memos {
            let total = self.credit_memos.sum_remaining_for_tenant(tenant_id)?;
            result.total_credit_memos = total;
            result.credit_memo_count = self.credit_memos.count_for_tenant(tenant_id)?;
            credits += total;

            if opts.validate_memo_applications {
                for m in self.credit_memos.find_all_for_tenant(tenant_id)? {
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::CreditMemoImbalance,
                        EntityClass::CreditMemo,
                        m.id_typed().0,
                        m.number(),
                        m.total() - m.applied(),
                        m.remaining(),
                    );
                    // Applications must never exceed the total credit.
                    if m.applied() > m.total() {
                        result.add_discrepancy(BalanceDiscrepancy::new(
                            DiscrepancyKind::CreditMemoImbalance,
                            EntityClass::CreditMemo,
                            m.id_typed().0,
                            m.number(),
                            m.total(),
                            m.applied(),
                            opts.tolerance,
                        ));
                    }
                }
            }
        }

        if opts.check_debit_memos {
            let total = self.debit_memos.sum_remaining_for_tenant(tenant_id)?;
            result.total_debit_memos = total;
            result.debit_memo_count = self.debit_memos.count_for_tenant(tenant_id)?;
            debits += total;

            if opts.validate_memo_applications {
                for m in self.debit_memos.find_all_for_tenant(tenant_id)? {
                    record_mismatch(
                        &mut result,
                        opts.tolerance,
                        DiscrepancyKind::DebitMemoImbalance,
                        EntityClass::DebitMemo,
                        m.id_typed().0,
                        m.number(),
                        m.total() - m.applied(),
                        m.remaining(),
                    );
                    if m.applied() > m.total() {
                        result.add_discrepancy(BalanceDiscrepancy::new(
                            DiscrepancyKind::DebitMemoImbalance,
                            EntityClass::DebitMemo,
                            m.id_typed().0,
                            m.number(),
                            m.total(),
                            m.applied(),
                            opts.tolerance,
                        ));
                    }
                }
            }
        }

        result.set_totals(debits, credits);
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.status = if result.discrepancies.is_empty() {
            TrialBalanceStatus::Balanced
        } else {
            TrialBalanceStatus::Unbalanced
        };

        info!(
            tenant = %tenant_id,
            status = ?result.status,
            discrepancies = result.discrepancy_count(),
            net = %result.net_balance,
            "trial balance check completed"
        );

        // Audit logging is best-effort: a persistence failure must not hide
        // the computed result from the caller.
        if let Some(repo) = &self.audit_log {
            let log = TrialBalanceAuditLog::from_result(&result);
            if let Err(err) = repo.save(&log) {
                warn!(tenant = %tenant_id, error = %err, "failed to save trial balance audit log");
                result.notes = if result.notes.is_empty() {
                    format!("warning: failed to save audit log: {err}")
                } else {
                    format!("warning: failed to save audit log: {err}. {}", result.notes)
                };
            }
        }

        Ok(result)
    }

    /// Fast pre-operation check: sums and counts only, consistency
    /// iteration skipped. Returns the Allowed/Blocked verdict.
    pub fn check_balance_before_operation(
        &self,
        tenant_id: TenantId,
    ) -> DomainResult<BalanceGate> {
        debug!(tenant = %tenant_id, "running pre-operation balance check");
        let result =
            self.perform_trial_balance_check(tenant_id, None, &TrialBalanceOptions::fast())?;

        if result.is_balanced() {
            Ok(BalanceGate::allowed())
        } else {
            Ok(BalanceGate::blocked(result.discrepancies))
        }
    }

    /// Hard gate: turns a blocked verdict into an error that calling
    /// workflows must surface, refusing the triggering operation.
    pub fn enforce_balance_check(&self, tenant_id: TenantId) -> Result<(), BalanceCheckError> {
        let gate = self.check_balance_before_operation(tenant_id)?;

        if gate.allowed {
            Ok(())
        } else {
            Err(BalanceCheckError::Imbalanced {
                message: gate.message,
                discrepancies: gate.discrepancies,
            })
        }
    }

    /// Most recent audit log entries, newest first.
    pub fn latest_audit_logs(
        &self,
        tenant_id: TenantId,
        limit: usize,
    ) -> DomainResult<Vec<TrialBalanceAuditLog>> {
        match &self.audit_log {
            Some(repo) => repo.find_latest_for_tenant(tenant_id, limit),
            None => Err(DomainError::not_found()),
        }
    }
}

/// Record a discrepancy only when the invariant is actually violated:
/// an exact match is not a finding. Severity falls out of the tolerance.
#[allow(clippy::too_many_arguments)]
fn record_mismatch(
    result: &mut TrialBalanceResult,
    tolerance: Money,
    kind: DiscrepancyKind,
    entity_class: EntityClass,
    entity_id: finflow_core::AggregateId,
    entity_number: &str,
    expected: Money,
    actual: Money,
) {
    if expected == actual {
        return;
    }
    result.add_discrepancy(BalanceDiscrepancy::new(
        kind,
        entity_class,
        entity_id,
        entity_number,
        expected,
        actual,
        tolerance,
    ));
}
