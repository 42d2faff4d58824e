use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, ErrorCode, Money, PartyId, TenantId,
};
use finflow_events::Event;

use crate::receivable::{PaymentRecord, ReversalOutcome};

/// Payable identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayableId(pub AggregateId);

impl PayableId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PayableId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payable status lifecycle. Mirrors the receivable side: Pending/Partial
/// accept payments, everything else is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayableStatus {
    Pending,
    Partial,
    Paid,
    Reversed,
    Cancelled,
}

impl PayableStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PayableStatus::Paid | PayableStatus::Reversed | PayableStatus::Cancelled
        )
    }

    pub fn can_apply_payment(&self) -> bool {
        matches!(self, PayableStatus::Pending | PayableStatus::Partial)
    }
}

/// Source document that created the payable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayableSource {
    PurchaseOrder,
    PurchaseReturn,
    Manual,
}

/// Command payload: issue a payable from a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuePayable {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub source: PayableSource,
    pub source_id: AggregateId,
    pub source_number: String,
    pub total: Money,
    pub due_date: Option<DateTime<Utc>>,
}

/// Aggregate root: Payable (money owed to a supplier).
///
/// Invariant: `paid + outstanding == total` with exact decimal equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payable {
    id: PayableId,
    tenant_id: TenantId,
    number: String,
    supplier_id: PartyId,
    supplier_name: String,
    source: PayableSource,
    source_id: AggregateId,
    source_number: String,
    total: Money,
    paid: Money,
    outstanding: Money,
    status: PayableStatus,
    due_date: Option<DateTime<Utc>>,
    payment_records: Vec<PaymentRecord>,
    remark: String,
    paid_at: Option<DateTime<Utc>>,
    reversed_at: Option<DateTime<Utc>>,
    reversal_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl Payable {
    pub fn issue(cmd: IssuePayable) -> DomainResult<(Self, PayableEvent)> {
        if cmd.number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "payable number cannot be empty",
            ));
        }
        if cmd.number.len() > 50 {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "payable number cannot exceed 50 characters",
            ));
        }
        if cmd.supplier_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "supplier name cannot be empty",
            ));
        }
        if cmd.source_number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidSource,
                "source number cannot be empty",
            ));
        }
        if !cmd.total.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "total amount must be positive",
            ));
        }

        let now = Utc::now();
        let payable = Self {
            id: cmd.payable_id,
            tenant_id: cmd.tenant_id,
            number: cmd.number.clone(),
            supplier_id: cmd.supplier_id,
            supplier_name: cmd.supplier_name,
            source: cmd.source,
            source_id: cmd.source_id,
            source_number: cmd.source_number,
            total: cmd.total,
            paid: Money::ZERO,
            outstanding: cmd.total,
            status: PayableStatus::Pending,
            due_date: cmd.due_date,
            payment_records: Vec::new(),
            remark: String::new(),
            paid_at: None,
            reversed_at: None,
            reversal_reason: None,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let event = PayableEvent::Created(PayableCreated {
            tenant_id: cmd.tenant_id,
            payable_id: cmd.payable_id,
            number: cmd.number,
            supplier_id: cmd.supplier_id,
            total: cmd.total,
            due_date: cmd.due_date,
            occurred_at: now,
        });

        Ok((payable, event))
    }

    /// Apply a payment from a payment voucher.
    pub fn apply_payment(
        &mut self,
        amount: Money,
        voucher_id: AggregateId,
        remark: impl Into<String>,
    ) -> DomainResult<PayableEvent> {
        if !self.status.can_apply_payment() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot apply payment to payable in {:?} status", self.status),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "payment amount must be positive",
            ));
        }
        if amount > self.outstanding {
            return Err(DomainError::bound(
                ErrorCode::ExceedsOutstanding,
                format!(
                    "payment amount {} exceeds outstanding amount {}",
                    amount, self.outstanding
                ),
            ));
        }

        self.payment_records
            .push(PaymentRecord::new(voucher_id, amount, remark.into()));

        self.paid += amount;
        self.outstanding = self.total - self.paid;

        let event = if self.outstanding.is_zero() {
            let now = Utc::now();
            self.status = PayableStatus::Paid;
            self.paid_at = Some(now);
            PayableEvent::Paid(PayablePaid {
                tenant_id: self.tenant_id,
                payable_id: self.id,
                number: self.number.clone(),
                amount,
                total: self.total,
                voucher_id,
                occurred_at: now,
            })
        } else {
            self.status = PayableStatus::Partial;
            PayableEvent::PartiallyPaid(PayablePartiallyPaid {
                tenant_id: self.tenant_id,
                payable_id: self.id,
                number: self.number.clone(),
                amount,
                paid: self.paid,
                outstanding: self.outstanding,
                voucher_id,
                occurred_at: Utc::now(),
            })
        };

        self.touch();
        Ok(event)
    }

    /// Reverse the payable (e.g. due to a purchase return).
    pub fn reverse(
        &mut self,
        reason: impl Into<String>,
    ) -> DomainResult<(ReversalOutcome, PayableEvent)> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot reverse payable in {:?} status", self.status),
            ));
        }
        let reason = reason.into();
        if reason.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidReason,
                "reversal reason is required",
            ));
        }

        let now = Utc::now();
        let previous_status = self.status;

        let mut reversed_count = 0;
        let mut compensation_ids = Vec::with_capacity(self.payment_records.len());
        for record in &mut self.payment_records {
            if record.is_active() {
                record.mark_reversed(&reason);
                reversed_count += 1;
                compensation_ids.push(AggregateId::new());
            }
        }

        let outcome = ReversalOutcome {
            refund_required: self.paid.is_positive(),
            refund_amount: self.paid,
            outstanding_waived: self.outstanding,
            reversed_payment_count: reversed_count,
            compensation_record_ids: compensation_ids,
        };

        self.status = PayableStatus::Reversed;
        self.reversed_at = Some(now);
        self.reversal_reason = Some(reason.clone());
        self.outstanding = Money::ZERO;
        self.touch();

        let event = PayableEvent::Reversed(PayableReversed {
            tenant_id: self.tenant_id,
            payable_id: self.id,
            number: self.number.clone(),
            previous_status,
            refund_amount: outcome.refund_amount,
            outstanding_waived: outcome.outstanding_waived,
            reason,
            occurred_at: now,
        });

        Ok((outcome, event))
    }

    /// Cancel the payable. Only allowed before any payment.
    pub fn cancel(&mut self, reason: impl Into<String>) -> DomainResult<PayableEvent> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot cancel payable in {:?} status", self.status),
            ));
        }
        if self.status == PayableStatus::Partial || self.paid.is_positive() {
            return Err(DomainError::state(
                ErrorCode::HasPayments,
                "cannot cancel payable with existing payments",
            ));
        }
        let reason = reason.into();
        if reason.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidReason,
                "cancel reason is required",
            ));
        }

        let now = Utc::now();
        self.status = PayableStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason.clone());
        self.outstanding = Money::ZERO;
        self.touch();

        Ok(PayableEvent::Cancelled(PayableCancelled {
            tenant_id: self.tenant_id,
            payable_id: self.id,
            number: self.number.clone(),
            reason,
            occurred_at: now,
        }))
    }

    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot modify due date of payable in terminal state",
            ));
        }
        self.due_date = due_date;
        self.touch();
        Ok(())
    }

    pub fn set_remark(&mut self, remark: impl Into<String>) {
        self.remark = remark.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn id_typed(&self) -> PayableId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn supplier_id(&self) -> PartyId {
        self.supplier_id
    }

    pub fn supplier_name(&self) -> &str {
        &self.supplier_name
    }

    pub fn source(&self) -> PayableSource {
        self.source
    }

    pub fn source_id(&self) -> AggregateId {
        self.source_id
    }

    pub fn source_number(&self) -> &str {
        &self.source_number
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn paid(&self) -> Money {
        self.paid
    }

    pub fn outstanding(&self) -> Money {
        self.outstanding
    }

    pub fn status(&self) -> PayableStatus {
        self.status
    }

    pub fn due_date(&self) -> Option<DateTime<Utc>> {
        self.due_date
    }

    pub fn payment_records(&self) -> &[PaymentRecord] {
        &self.payment_records
    }

    pub fn remark(&self) -> &str {
        &self.remark
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_overdue(&self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match self.due_date {
            Some(due) => Utc::now() > due,
            None => false,
        }
    }

    pub fn payment_count(&self) -> usize {
        self.payment_records.len()
    }

    pub fn paid_percentage(&self) -> Decimal {
        if self.total.is_zero() {
            return Decimal::from(100);
        }
        (self.paid.amount() / self.total.amount() * Decimal::from(100)).round_dp(2)
    }
}

impl AggregateRoot for Payable {
    type Id = PayableId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a payable; the repository hydration seam.
/// Taken verbatim on rehydration, audited for drift by the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableState {
    pub id: PayableId,
    pub tenant_id: TenantId,
    pub number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub source: PayableSource,
    pub source_id: AggregateId,
    pub source_number: String,
    pub total: Money,
    pub paid: Money,
    pub outstanding: Money,
    pub status: PayableStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub payment_records: Vec<PaymentRecord>,
    pub remark: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Payable {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: PayableState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            supplier_id: state.supplier_id,
            supplier_name: state.supplier_name,
            source: state.source,
            source_id: state.source_id,
            source_number: state.source_number,
            total: state.total,
            paid: state.paid,
            outstanding: state.outstanding,
            status: state.status,
            due_date: state.due_date,
            payment_records: state.payment_records,
            remark: state.remark,
            paid_at: state.paid_at,
            reversed_at: state.reversed_at,
            reversal_reason: state.reversal_reason,
            cancelled_at: state.cancelled_at,
            cancel_reason: state.cancel_reason,
            created_at: state.created_at,
            updated_at: state.updated_at,
            version: state.version,
        }
    }

    /// Snapshot the aggregate for persistence.
    pub fn state(&self) -> PayableState {
        PayableState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name.clone(),
            source: self.source,
            source_id: self.source_id,
            source_number: self.source_number.clone(),
            total: self.total,
            paid: self.paid,
            outstanding: self.outstanding,
            status: self.status,
            due_date: self.due_date,
            payment_records: self.payment_records.clone(),
            remark: self.remark.clone(),
            paid_at: self.paid_at,
            reversed_at: self.reversed_at,
            reversal_reason: self.reversal_reason.clone(),
            cancelled_at: self.cancelled_at,
            cancel_reason: self.cancel_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableCreated {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub supplier_id: PartyId,
    pub total: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayablePartiallyPaid {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub amount: Money,
    pub paid: Money,
    pub outstanding: Money,
    pub voucher_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayablePaid {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub amount: Money,
    pub total: Money,
    pub voucher_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableReversed {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub previous_status: PayableStatus,
    pub refund_amount: Money,
    pub outstanding_waived: Money,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableCancelled {
    pub tenant_id: TenantId,
    pub payable_id: PayableId,
    pub number: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayableEvent {
    Created(PayableCreated),
    PartiallyPaid(PayablePartiallyPaid),
    Paid(PayablePaid),
    Reversed(PayableReversed),
    Cancelled(PayableCancelled),
}

impl Event for PayableEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PayableEvent::Created(_) => "finance.payable.created",
            PayableEvent::PartiallyPaid(_) => "finance.payable.partially_paid",
            PayableEvent::Paid(_) => "finance.payable.paid",
            PayableEvent::Reversed(_) => "finance.payable.reversed",
            PayableEvent::Cancelled(_) => "finance.payable.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PayableEvent::Created(e) => e.occurred_at,
            PayableEvent::PartiallyPaid(e) => e.occurred_at,
            PayableEvent::Paid(e) => e.occurred_at,
            PayableEvent::Reversed(e) => e.occurred_at,
            PayableEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn issue_cmd(total: Money) -> IssuePayable {
        IssuePayable {
            tenant_id: TenantId::new(),
            payable_id: PayableId::new(AggregateId::new()),
            number: "AP-2026-00001".to_string(),
            supplier_id: PartyId::new(),
            supplier_name: "Northwind Supply".to_string(),
            source: PayableSource::PurchaseOrder,
            source_id: AggregateId::new(),
            source_number: "PO-2026-00017".to_string(),
            total,
            due_date: None,
        }
    }

    fn issued(total: Money) -> Payable {
        Payable::issue(issue_cmd(total)).unwrap().0
    }

    #[test]
    fn issue_starts_pending() {
        let (ap, event) = Payable::issue(issue_cmd(Money::new(dec!(750)))).unwrap();
        assert_eq!(ap.status(), PayableStatus::Pending);
        assert_eq!(ap.outstanding(), Money::new(dec!(750)));
        assert!(matches!(event, PayableEvent::Created(_)));
    }

    #[test]
    fn payments_settle_the_payable() {
        let mut ap = issued(Money::new(dec!(1000)));
        ap.apply_payment(Money::new(dec!(400)), AggregateId::new(), "")
            .unwrap();
        assert_eq!(ap.status(), PayableStatus::Partial);
        assert_eq!(ap.paid() + ap.outstanding(), ap.total());

        let event = ap
            .apply_payment(Money::new(dec!(600)), AggregateId::new(), "")
            .unwrap();
        assert_eq!(ap.status(), PayableStatus::Paid);
        assert!(matches!(event, PayableEvent::Paid(_)));
    }

    #[test]
    fn overpayment_is_rejected() {
        let mut ap = issued(Money::new(dec!(100)));
        let err = ap
            .apply_payment(Money::new(dec!(150)), AggregateId::new(), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsOutstanding);
        assert_eq!(ap.paid(), Money::ZERO);
    }

    #[test]
    fn reverse_waives_outstanding_and_flags_refund() {
        let mut ap = issued(Money::new(dec!(800)));
        ap.apply_payment(Money::new(dec!(300)), AggregateId::new(), "")
            .unwrap();
        let (outcome, _) = ap.reverse("purchase return PR-003").unwrap();

        assert_eq!(ap.status(), PayableStatus::Reversed);
        assert!(outcome.refund_required);
        assert_eq!(outcome.refund_amount, Money::new(dec!(300)));
        assert_eq!(outcome.outstanding_waived, Money::new(dec!(500)));
        assert_eq!(outcome.compensation_record_ids.len(), 1);
    }

    #[test]
    fn cancel_only_before_payments() {
        let mut ap = issued(Money::new(dec!(100)));
        ap.apply_payment(Money::new(dec!(1)), AggregateId::new(), "")
            .unwrap();
        assert_eq!(ap.cancel("typo").unwrap_err().code(), ErrorCode::HasPayments);

        let mut fresh = issued(Money::new(dec!(100)));
        let event = fresh.cancel("typo").unwrap();
        assert_eq!(fresh.status(), PayableStatus::Cancelled);
        assert!(fresh.outstanding().is_zero());
        assert!(matches!(event, PayableEvent::Cancelled(_)));
    }
}
