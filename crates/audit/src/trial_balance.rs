//! Trial balance domain types: discrepancies, check options, results,
//! audit log entries and the pre-operation balance gate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{AggregateId, Money, TenantId, UserId};

/// Result status of a trial balance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialBalanceStatus {
    Balanced,
    Unbalanced,
}

impl TrialBalanceStatus {
    pub fn is_balanced(&self) -> bool {
        matches!(self, TrialBalanceStatus::Balanced)
    }
}

/// Entity class a discrepancy belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityClass {
    Receivable,
    Payable,
    ReceiptVoucher,
    PaymentVoucher,
    CreditMemo,
    DebitMemo,
}

/// What kind of arithmetic invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// Receivable paid + outstanding doesn't equal total.
    ReceivableAmountMismatch,
    /// Payable paid + outstanding doesn't equal total.
    PayableAmountMismatch,
    /// Voucher allocation records or totals don't add up.
    VoucherAllocationMismatch,
    /// Credit memo applications don't add up or exceed the total credit.
    CreditMemoImbalance,
    /// Debit memo applications don't add up or exceed the total debit.
    DebitMemoImbalance,
}

impl DiscrepancyKind {
    pub fn description(&self) -> &'static str {
        match self {
            DiscrepancyKind::ReceivableAmountMismatch => {
                "receivable paid + outstanding doesn't equal total amount"
            }
            DiscrepancyKind::PayableAmountMismatch => {
                "payable paid + outstanding doesn't equal total amount"
            }
            DiscrepancyKind::VoucherAllocationMismatch => {
                "voucher allocated amount doesn't match its allocations"
            }
            DiscrepancyKind::CreditMemoImbalance => {
                "credit memo applied amount is inconsistent with total credit"
            }
            DiscrepancyKind::DebitMemoImbalance => {
                "debit memo applied amount is inconsistent with total debit"
            }
        }
    }
}

/// Discrepancy severity, classified by magnitude against the tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
}

/// A detected violation of an arithmetic invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDiscrepancy {
    pub id: AggregateId,
    pub kind: DiscrepancyKind,
    pub entity_class: EntityClass,
    pub entity_id: AggregateId,
    /// Business number of the entity, for diagnostics.
    pub entity_number: String,
    pub expected: Money,
    pub actual: Money,
    /// expected - actual.
    pub difference: Money,
    pub description: String,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
}

impl BalanceDiscrepancy {
    /// Build a discrepancy; severity is Critical when the absolute
    /// difference exceeds `tolerance`, Warning otherwise.
    pub fn new(
        kind: DiscrepancyKind,
        entity_class: EntityClass,
        entity_id: AggregateId,
        entity_number: impl Into<String>,
        expected: Money,
        actual: Money,
        tolerance: Money,
    ) -> Self {
        let difference = expected - actual;
        let severity = if difference.abs() > tolerance {
            Severity::Critical
        } else {
            Severity::Warning
        };

        Self {
            id: AggregateId::new(),
            kind,
            entity_class,
            entity_id,
            entity_number: entity_number.into(),
            expected,
            actual,
            difference,
            description: kind.description().to_string(),
            severity,
            detected_at: Utc::now(),
        }
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

/// Configuration for a trial balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceOptions {
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,

    pub check_receivables: bool,
    pub check_payables: bool,
    pub check_receipts: bool,
    pub check_payments: bool,
    pub check_credit_memos: bool,
    pub check_debit_memos: bool,

    /// Verify paid + outstanding == total per obligation.
    pub validate_internal_consistency: bool,
    /// Verify voucher totals and the literal sum of allocation records.
    pub validate_voucher_allocations: bool,
    /// Verify memo application arithmetic.
    pub validate_memo_applications: bool,

    /// Severity threshold for discrepancies (default 0.01).
    pub tolerance: Money,
}

impl Default for TrialBalanceOptions {
    fn default() -> Self {
        Self {
            period_start: None,
            period_end: None,
            check_receivables: true,
            check_payables: true,
            check_receipts: true,
            check_payments: true,
            check_credit_memos: true,
            check_debit_memos: true,
            validate_internal_consistency: true,
            validate_voucher_allocations: true,
            validate_memo_applications: true,
            tolerance: Money::new(Decimal::new(1, 2)),
        }
    }
}

impl TrialBalanceOptions {
    /// Fast variant used by the pre-operation guard: sums and counts only,
    /// per-entity consistency iteration skipped.
    pub fn fast() -> Self {
        Self {
            validate_internal_consistency: false,
            validate_voucher_allocations: false,
            validate_memo_applications: false,
            ..Self::default()
        }
    }
}

/// Result of a trial balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceResult {
    pub id: AggregateId,
    pub tenant_id: TenantId,
    pub checked_at: DateTime<Utc>,
    /// User who initiated the check; None for system-initiated guards.
    pub checked_by: Option<UserId>,
    pub status: TrialBalanceStatus,
    pub total_debits: Money,
    pub total_credits: Money,
    /// Debits - credits; zero for a clean ledger.
    pub net_balance: Money,

    pub total_receivables: Money,
    pub total_payables: Money,
    pub total_receipts: Money,
    pub total_payments: Money,
    pub total_credit_memos: Money,
    pub total_debit_memos: Money,

    pub receivable_count: u64,
    pub payable_count: u64,
    pub receipt_count: u64,
    pub payment_count: u64,
    pub credit_memo_count: u64,
    pub debit_memo_count: u64,

    pub discrepancies: Vec<BalanceDiscrepancy>,
    pub critical_count: usize,
    pub warning_count: usize,

    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,

    pub duration_ms: u64,
    pub notes: String,
}

impl TrialBalanceResult {
    pub fn new(tenant_id: TenantId, checked_by: Option<UserId>) -> Self {
        Self {
            id: AggregateId::new(),
            tenant_id,
            checked_at: Utc::now(),
            checked_by,
            status: TrialBalanceStatus::Balanced,
            total_debits: Money::ZERO,
            total_credits: Money::ZERO,
            net_balance: Money::ZERO,
            total_receivables: Money::ZERO,
            total_payables: Money::ZERO,
            total_receipts: Money::ZERO,
            total_payments: Money::ZERO,
            total_credit_memos: Money::ZERO,
            total_debit_memos: Money::ZERO,
            receivable_count: 0,
            payable_count: 0,
            receipt_count: 0,
            payment_count: 0,
            credit_memo_count: 0,
            debit_memo_count: 0,
            discrepancies: Vec::new(),
            critical_count: 0,
            warning_count: 0,
            period_start: None,
            period_end: None,
            duration_ms: 0,
            notes: String::new(),
        }
    }

    /// Record a discrepancy; any discrepancy marks the result Unbalanced.
    pub fn add_discrepancy(&mut self, discrepancy: BalanceDiscrepancy) {
        match discrepancy.severity {
            Severity::Critical => self.critical_count += 1,
            Severity::Warning => self.warning_count += 1,
        }
        self.discrepancies.push(discrepancy);
        self.status = TrialBalanceStatus::Unbalanced;
    }

    pub fn set_totals(&mut self, debits: Money, credits: Money) {
        self.total_debits = debits;
        self.total_credits = credits;
        self.net_balance = debits - credits;
    }

    pub fn discrepancy_count(&self) -> usize {
        self.discrepancies.len()
    }

    /// Clean result: no discrepancies and a zero net balance.
    pub fn is_balanced(&self) -> bool {
        self.status.is_balanced() && self.discrepancies.is_empty() && self.net_balance.is_zero()
    }

    pub fn has_critical_discrepancies(&self) -> bool {
        self.critical_count > 0
    }

    pub fn critical_discrepancies(&self) -> Vec<&BalanceDiscrepancy> {
        self.discrepancies
            .iter()
            .filter(|d| d.is_critical())
            .collect()
    }
}

/// Audit log entry persisted after each trial balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialBalanceAuditLog {
    pub id: AggregateId,
    pub tenant_id: TenantId,
    pub checked_at: DateTime<Utc>,
    pub checked_by: Option<UserId>,
    pub status: TrialBalanceStatus,
    pub total_debits: Money,
    pub total_credits: Money,
    pub net_balance: Money,
    pub discrepancy_count: usize,
    pub critical_count: usize,
    pub warning_count: usize,
    pub duration_ms: u64,
    pub period_start: Option<DateTime<Utc>>,
    pub period_end: Option<DateTime<Utc>>,
    pub notes: String,
    /// Serialized discrepancies, kept for later diagnostics.
    pub details_json: String,
}

impl TrialBalanceAuditLog {
    pub fn from_result(result: &TrialBalanceResult) -> Self {
        Self {
            id: AggregateId::new(),
            tenant_id: result.tenant_id,
            checked_at: result.checked_at,
            checked_by: result.checked_by,
            status: result.status,
            total_debits: result.total_debits,
            total_credits: result.total_credits,
            net_balance: result.net_balance,
            discrepancy_count: result.discrepancy_count(),
            critical_count: result.critical_count,
            warning_count: result.warning_count,
            duration_ms: result.duration_ms,
            period_start: result.period_start,
            period_end: result.period_end,
            notes: result.notes.clone(),
            details_json: serde_json::to_string(&result.discrepancies).unwrap_or_default(),
        }
    }
}

/// Verdict of a pre-operation balance check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceGate {
    pub allowed: bool,
    pub status: TrialBalanceStatus,
    pub message: String,
    pub discrepancies: Vec<BalanceDiscrepancy>,
}

impl BalanceGate {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            status: TrialBalanceStatus::Balanced,
            message: "trial balance is balanced, operation allowed".to_string(),
            discrepancies: Vec::new(),
        }
    }

    pub fn blocked(discrepancies: Vec<BalanceDiscrepancy>) -> Self {
        Self {
            allowed: false,
            status: TrialBalanceStatus::Unbalanced,
            message: "trial balance check failed, operation blocked due to balance discrepancies"
                .to_string(),
            discrepancies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn discrepancy(expected: Money, actual: Money) -> BalanceDiscrepancy {
        BalanceDiscrepancy::new(
            DiscrepancyKind::ReceivableAmountMismatch,
            EntityClass::Receivable,
            AggregateId::new(),
            "AR-001",
            expected,
            actual,
            Money::new(dec!(0.01)),
        )
    }

    #[test]
    fn severity_classifies_by_tolerance() {
        let critical = discrepancy(Money::new(dec!(700)), Money::new(dec!(800)));
        assert_eq!(critical.severity, Severity::Critical);
        assert_eq!(critical.difference, Money::new(dec!(-100)));

        let warning = discrepancy(Money::new(dec!(100.005)), Money::new(dec!(100)));
        assert_eq!(warning.severity, Severity::Warning);
    }

    #[test]
    fn any_discrepancy_marks_result_unbalanced() {
        let mut result = TrialBalanceResult::new(TenantId::new(), None);
        assert!(result.is_balanced());

        result.add_discrepancy(discrepancy(Money::new(dec!(1)), Money::new(dec!(2))));
        assert_eq!(result.status, TrialBalanceStatus::Unbalanced);
        assert!(!result.is_balanced());
        assert_eq!(result.critical_count, 1);
    }

    #[test]
    fn nonzero_net_balance_is_not_clean_even_without_discrepancies() {
        let mut result = TrialBalanceResult::new(TenantId::new(), None);
        result.set_totals(Money::new(dec!(100)), Money::new(dec!(90)));
        assert_eq!(result.net_balance, Money::new(dec!(10)));
        assert_eq!(result.status, TrialBalanceStatus::Balanced);
        assert!(!result.is_balanced());
    }

    #[test]
    fn audit_log_serializes_discrepancy_details() {
        let mut result = TrialBalanceResult::new(TenantId::new(), Some(UserId::new()));
        result.add_discrepancy(discrepancy(Money::new(dec!(1)), Money::new(dec!(2))));

        let log = TrialBalanceAuditLog::from_result(&result);
        assert_eq!(log.discrepancy_count, 1);
        assert!(log.details_json.contains("AR-001"));
    }
}
