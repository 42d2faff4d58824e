use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ErrorCode, Money, PartyId,
    TenantId,
};
use finflow_events::Event;

/// Receivable identifier (tenant-scoped via `tenant_id` fields in events).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceivableId(pub AggregateId);

impl ReceivableId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReceivableId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Receivable status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    /// Unpaid, full amount outstanding.
    Pending,
    /// Partially paid, 0 < outstanding < total.
    Partial,
    /// Fully paid, outstanding = 0.
    Paid,
    /// Reversed (e.g. sales return).
    Reversed,
    /// Cancelled before any payment.
    Cancelled,
}

impl ReceivableStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReceivableStatus::Paid | ReceivableStatus::Reversed | ReceivableStatus::Cancelled
        )
    }

    pub fn can_apply_payment(&self) -> bool {
        matches!(self, ReceivableStatus::Pending | ReceivableStatus::Partial)
    }
}

/// Source document that created the receivable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableSource {
    SalesOrder,
    SalesReturn,
    Manual,
}

/// Status of a single payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Active,
    Reversed,
}

/// A payment applied to an obligation (value within the aggregate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: AggregateId,
    /// The voucher the cash came from.
    pub voucher_id: AggregateId,
    pub amount: Money,
    pub applied_at: DateTime<Utc>,
    pub remark: String,
    pub status: PaymentRecordStatus,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
}

impl PaymentRecord {
    pub(crate) fn new(voucher_id: AggregateId, amount: Money, remark: String) -> Self {
        Self {
            id: AggregateId::new(),
            voucher_id,
            amount,
            applied_at: Utc::now(),
            remark,
            status: PaymentRecordStatus::Active,
            reversed_at: None,
            reversal_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PaymentRecordStatus::Active
    }

    pub fn is_reversed(&self) -> bool {
        self.status == PaymentRecordStatus::Reversed
    }

    pub(crate) fn mark_reversed(&mut self, reason: &str) {
        self.status = PaymentRecordStatus::Reversed;
        self.reversed_at = Some(Utc::now());
        self.reversal_reason = Some(reason.to_string());
    }
}

impl Entity for PaymentRecord {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Result of reversing a receivable.
///
/// The compensation record IDs are a handoff to the external refund /
/// payment-gateway integration: one fresh ID per reversed payment, for it
/// to attach actual compensation records to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReversalOutcome {
    /// True if money was already collected and must be refunded or credited.
    pub refund_required: bool,
    /// Amount to refund (the paid amount at reversal time).
    pub refund_amount: Money,
    /// Outstanding amount waived by the reversal (never collected).
    pub outstanding_waived: Money,
    pub reversed_payment_count: usize,
    pub compensation_record_ids: Vec<AggregateId>,
}

/// Command payload: issue a receivable from a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueReceivable {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub source: ReceivableSource,
    pub source_id: AggregateId,
    pub source_number: String,
    pub total: Money,
    pub due_date: Option<DateTime<Utc>>,
}

/// Aggregate root: Receivable (money owed by a customer).
///
/// Invariant: `paid + outstanding == total` at all times, with exact
/// decimal equality. Mutations go through `apply_payment` / `reverse` /
/// `cancel`; receivables are never physically deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receivable {
    id: ReceivableId,
    tenant_id: TenantId,
    number: String,
    customer_id: PartyId,
    customer_name: String,
    source: ReceivableSource,
    source_id: AggregateId,
    source_number: String,
    total: Money,
    paid: Money,
    outstanding: Money,
    status: ReceivableStatus,
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

impl Receivable {
    /// Issue a new receivable. Returns the aggregate and its Created event.
    pub fn issue(cmd: IssueReceivable) -> DomainResult<(Self, ReceivableEvent)> {
        if cmd.number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "receivable number cannot be empty",
            ));
        }
        if cmd.number.len() > 50 {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "receivable number cannot exceed 50 characters",
            ));
        }
        if cmd.customer_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "customer name cannot be empty",
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
        let receivable = Self {
            id: cmd.receivable_id,
            tenant_id: cmd.tenant_id,
            number: cmd.number.clone(),
            customer_id: cmd.customer_id,
            customer_name: cmd.customer_name,
            source: cmd.source,
            source_id: cmd.source_id,
            source_number: cmd.source_number,
            total: cmd.total,
            paid: Money::ZERO,
            outstanding: cmd.total,
            status: ReceivableStatus::Pending,
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

        let event = ReceivableEvent::Created(ReceivableCreated {
            tenant_id: cmd.tenant_id,
            receivable_id: cmd.receivable_id,
            number: cmd.number,
            customer_id: cmd.customer_id,
            total: cmd.total,
            due_date: cmd.due_date,
            occurred_at: now,
        });

        Ok((receivable, event))
    }

    /// Apply a payment from a voucher.
    ///
    /// Fails with INVALID_STATE in terminal states, INVALID_AMOUNT for
    /// non-positive amounts and EXCEEDS_OUTSTANDING when the amount is
    /// larger than what is still owed. On success, paid and outstanding
    /// move by exactly `amount`.
    pub fn apply_payment(
        &mut self,
        amount: Money,
        voucher_id: AggregateId,
        remark: impl Into<String>,
    ) -> DomainResult<ReceivableEvent> {
        if !self.status.can_apply_payment() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot apply payment to receivable in {:?} status", self.status),
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
            self.status = ReceivableStatus::Paid;
            self.paid_at = Some(now);
            ReceivableEvent::Paid(ReceivablePaid {
                tenant_id: self.tenant_id,
                receivable_id: self.id,
                number: self.number.clone(),
                amount,
                total: self.total,
                voucher_id,
                occurred_at: now,
            })
        } else {
            self.status = ReceivableStatus::Partial;
            ReceivableEvent::PartiallyPaid(ReceivablePartiallyPaid {
                tenant_id: self.tenant_id,
                receivable_id: self.id,
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

    /// Reverse the receivable (e.g. due to a sales return).
    ///
    /// Marks every active payment record reversed and generates one
    /// compensation record ID per reversed payment for the external refund
    /// integration. The outstanding amount is waived.
    pub fn reverse(
        &mut self,
        reason: impl Into<String>,
    ) -> DomainResult<(ReversalOutcome, ReceivableEvent)> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot reverse receivable in {:?} status", self.status),
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

        self.status = ReceivableStatus::Reversed;
        self.reversed_at = Some(now);
        self.reversal_reason = Some(reason.clone());
        self.outstanding = Money::ZERO;
        self.touch();

        let event = ReceivableEvent::Reversed(ReceivableReversed {
            tenant_id: self.tenant_id,
            receivable_id: self.id,
            number: self.number.clone(),
            previous_status,
            refund_amount: outcome.refund_amount,
            outstanding_waived: outcome.outstanding_waived,
            reason,
            occurred_at: now,
        });

        Ok((outcome, event))
    }

    /// Cancel the receivable. Only allowed before any payment.
    pub fn cancel(&mut self, reason: impl Into<String>) -> DomainResult<ReceivableEvent> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot cancel receivable in {:?} status", self.status),
            ));
        }
        if self.status == ReceivableStatus::Partial || self.paid.is_positive() {
            return Err(DomainError::state(
                ErrorCode::HasPayments,
                "cannot cancel receivable with existing payments",
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
        self.status = ReceivableStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancel_reason = Some(reason.clone());
        self.outstanding = Money::ZERO;
        self.touch();

        Ok(ReceivableEvent::Cancelled(ReceivableCancelled {
            tenant_id: self.tenant_id,
            receivable_id: self.id,
            number: self.number.clone(),
            reason,
            occurred_at: now,
        }))
    }

    /// Update the due date. Rejected in terminal states.
    pub fn set_due_date(&mut self, due_date: Option<DateTime<Utc>>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot modify due date of receivable in terminal state",
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

    pub fn id_typed(&self) -> ReceivableId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn customer_id(&self) -> PartyId {
        self.customer_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn source(&self) -> ReceivableSource {
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

    pub fn status(&self) -> ReceivableStatus {
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

    /// Days past due; 0 when not overdue.
    pub fn days_overdue(&self) -> i64 {
        if !self.is_overdue() {
            return 0;
        }
        match self.due_date {
            Some(due) => (Utc::now() - due).num_days(),
            None => 0,
        }
    }

    pub fn payment_count(&self) -> usize {
        self.payment_records.len()
    }

    /// Percentage of the total that has been paid (0-100, two decimals).
    pub fn paid_percentage(&self) -> Decimal {
        if self.total.is_zero() {
            return Decimal::from(100);
        }
        (self.paid.amount() / self.total.amount() * Decimal::from(100)).round_dp(2)
    }
}

impl AggregateRoot for Receivable {
    type Id = ReceivableId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a receivable; the repository hydration seam.
///
/// `rehydrate` performs no validation: persisted state is taken verbatim,
/// and the trial balance auditor detects rows whose amounts have drifted
/// out of the `paid + outstanding == total` invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableState {
    pub id: ReceivableId,
    pub tenant_id: TenantId,
    pub number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub source: ReceivableSource,
    pub source_id: AggregateId,
    pub source_number: String,
    pub total: Money,
    pub paid: Money,
    pub outstanding: Money,
    pub status: ReceivableStatus,
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

impl Receivable {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: ReceivableState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            customer_id: state.customer_id,
            customer_name: state.customer_name,
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
    pub fn state(&self) -> ReceivableState {
        ReceivableState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
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

/// Event: receivable issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableCreated {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub customer_id: PartyId,
    pub total: Money,
    pub due_date: Option<DateTime<Utc>>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: a payment settled part of the receivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivablePartiallyPaid {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub amount: Money,
    pub paid: Money,
    pub outstanding: Money,
    pub voucher_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: the receivable was settled in full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivablePaid {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub amount: Money,
    pub total: Money,
    pub voucher_id: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: receivable reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableReversed {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub previous_status: ReceivableStatus,
    pub refund_amount: Money,
    pub outstanding_waived: Money,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: receivable cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableCancelled {
    pub tenant_id: TenantId,
    pub receivable_id: ReceivableId,
    pub number: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceivableEvent {
    Created(ReceivableCreated),
    PartiallyPaid(ReceivablePartiallyPaid),
    Paid(ReceivablePaid),
    Reversed(ReceivableReversed),
    Cancelled(ReceivableCancelled),
}

impl Event for ReceivableEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReceivableEvent::Created(_) => "finance.receivable.created",
            ReceivableEvent::PartiallyPaid(_) => "finance.receivable.partially_paid",
            ReceivableEvent::Paid(_) => "finance.receivable.paid",
            ReceivableEvent::Reversed(_) => "finance.receivable.reversed",
            ReceivableEvent::Cancelled(_) => "finance.receivable.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReceivableEvent::Created(e) => e.occurred_at,
            ReceivableEvent::PartiallyPaid(e) => e.occurred_at,
            ReceivableEvent::Paid(e) => e.occurred_at,
            ReceivableEvent::Reversed(e) => e.occurred_at,
            ReceivableEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn issue_cmd(total: Money) -> IssueReceivable {
        IssueReceivable {
            tenant_id: TenantId::new(),
            receivable_id: ReceivableId::new(AggregateId::new()),
            number: "AR-2026-00001".to_string(),
            customer_id: PartyId::new(),
            customer_name: "Acme Retail".to_string(),
            source: ReceivableSource::SalesOrder,
            source_id: AggregateId::new(),
            source_number: "SO-2026-00042".to_string(),
            total,
            due_date: None,
        }
    }

    fn issued(total: Money) -> Receivable {
        Receivable::issue(issue_cmd(total)).unwrap().0
    }

    #[test]
    fn issue_starts_pending_and_fully_outstanding() {
        let (ar, event) = Receivable::issue(issue_cmd(Money::new(dec!(1000)))).unwrap();
        assert_eq!(ar.status(), ReceivableStatus::Pending);
        assert_eq!(ar.total(), Money::new(dec!(1000)));
        assert_eq!(ar.paid(), Money::ZERO);
        assert_eq!(ar.outstanding(), Money::new(dec!(1000)));
        match event {
            ReceivableEvent::Created(e) => assert_eq!(e.total, Money::new(dec!(1000))),
            other => panic!("expected Created event, got {other:?}"),
        }
    }

    #[test]
    fn issue_rejects_empty_number_and_non_positive_total() {
        let mut cmd = issue_cmd(Money::new(dec!(100)));
        cmd.number = String::new();
        assert_eq!(
            Receivable::issue(cmd).unwrap_err().code(),
            ErrorCode::InvalidNumber
        );

        let cmd = issue_cmd(Money::ZERO);
        assert_eq!(
            Receivable::issue(cmd).unwrap_err().code(),
            ErrorCode::InvalidAmount
        );
    }

    #[test]
    fn partial_payment_moves_to_partial_and_keeps_invariant() {
        let mut ar = issued(Money::new(dec!(1000)));
        let event = ar
            .apply_payment(Money::new(dec!(300)), AggregateId::new(), "first payment")
            .unwrap();

        assert_eq!(ar.status(), ReceivableStatus::Partial);
        assert_eq!(ar.paid(), Money::new(dec!(300)));
        assert_eq!(ar.outstanding(), Money::new(dec!(700)));
        assert_eq!(ar.paid() + ar.outstanding(), ar.total());
        assert_eq!(ar.payment_count(), 1);
        match event {
            ReceivableEvent::PartiallyPaid(e) => {
                assert_eq!(e.amount, Money::new(dec!(300)));
                assert_eq!(e.outstanding, Money::new(dec!(700)));
            }
            other => panic!("expected PartiallyPaid event, got {other:?}"),
        }
    }

    #[test]
    fn full_payment_transitions_to_paid() {
        let mut ar = issued(Money::new(dec!(500)));
        ar.apply_payment(Money::new(dec!(200)), AggregateId::new(), "")
            .unwrap();
        let event = ar
            .apply_payment(Money::new(dec!(300)), AggregateId::new(), "")
            .unwrap();

        assert_eq!(ar.status(), ReceivableStatus::Paid);
        assert!(ar.outstanding().is_zero());
        assert!(ar.paid_at().is_some());
        assert!(matches!(event, ReceivableEvent::Paid(_)));
    }

    #[test]
    fn overpayment_is_rejected_before_mutation() {
        let mut ar = issued(Money::new(dec!(100)));
        let err = ar
            .apply_payment(Money::new(dec!(100.01)), AggregateId::new(), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsOutstanding);
        assert_eq!(ar.paid(), Money::ZERO);
        assert_eq!(ar.payment_count(), 0);
    }

    #[test]
    fn payment_on_cancelled_receivable_is_invalid_state() {
        let mut ar = issued(Money::new(dec!(100)));
        ar.cancel("duplicate entry").unwrap();
        let err = ar
            .apply_payment(Money::new(dec!(10)), AggregateId::new(), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn cancel_with_payments_is_rejected() {
        let mut ar = issued(Money::new(dec!(100)));
        ar.apply_payment(Money::new(dec!(40)), AggregateId::new(), "")
            .unwrap();
        let err = ar.cancel("mistake").unwrap_err();
        assert_eq!(err.code(), ErrorCode::HasPayments);
    }

    #[test]
    fn reverse_marks_payments_and_generates_compensation_ids() {
        let mut ar = issued(Money::new(dec!(1000)));
        ar.apply_payment(Money::new(dec!(300)), AggregateId::new(), "")
            .unwrap();
        ar.apply_payment(Money::new(dec!(200)), AggregateId::new(), "")
            .unwrap();

        let (outcome, event) = ar.reverse("sales return SR-001").unwrap();

        assert_eq!(ar.status(), ReceivableStatus::Reversed);
        assert!(ar.outstanding().is_zero());
        assert!(outcome.refund_required);
        assert_eq!(outcome.refund_amount, Money::new(dec!(500)));
        assert_eq!(outcome.outstanding_waived, Money::new(dec!(500)));
        assert_eq!(outcome.reversed_payment_count, 2);
        assert_eq!(outcome.compensation_record_ids.len(), 2);
        assert!(ar.payment_records().iter().all(PaymentRecord::is_reversed));
        match event {
            ReceivableEvent::Reversed(e) => {
                assert_eq!(e.previous_status, ReceivableStatus::Partial);
            }
            other => panic!("expected Reversed event, got {other:?}"),
        }
    }

    #[test]
    fn reverse_without_payments_requires_no_refund() {
        let mut ar = issued(Money::new(dec!(250)));
        let (outcome, _) = ar.reverse("cancelled order").unwrap();
        assert!(!outcome.refund_required);
        assert_eq!(outcome.refund_amount, Money::ZERO);
        assert_eq!(outcome.outstanding_waived, Money::new(dec!(250)));
        assert_eq!(outcome.reversed_payment_count, 0);
    }

    #[test]
    fn reverse_in_terminal_state_is_rejected() {
        let mut ar = issued(Money::new(dec!(100)));
        ar.reverse("first").unwrap();
        let err = ar.reverse("second").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn reverse_requires_a_reason() {
        let mut ar = issued(Money::new(dec!(100)));
        let err = ar.reverse("").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidReason);
    }

    #[test]
    fn version_increments_per_mutation() {
        let mut ar = issued(Money::new(dec!(100)));
        let v0 = ar.version();
        ar.apply_payment(Money::new(dec!(10)), AggregateId::new(), "")
            .unwrap();
        assert_eq!(ar.version(), v0 + 1);
        ar.set_remark("note");
        assert_eq!(ar.version(), v0 + 2);
    }

    proptest! {
        /// Property: any sequence of in-bounds payments preserves
        /// `paid + outstanding == total` exactly.
        #[test]
        fn payments_preserve_amount_invariant(
            cents in prop::collection::vec(1i64..100_000i64, 1..12)
        ) {
            let total: i64 = cents.iter().sum();
            let mut ar = issued(Money::new(Decimal::new(total, 2)));

            for c in cents {
                ar.apply_payment(Money::new(Decimal::new(c, 2)), AggregateId::new(), "")
                    .unwrap();
                prop_assert_eq!(ar.paid() + ar.outstanding(), ar.total());
            }

            prop_assert_eq!(ar.status(), ReceivableStatus::Paid);
            prop_assert!(ar.outstanding().is_zero());
        }
    }
}
