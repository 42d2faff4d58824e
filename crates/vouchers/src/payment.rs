use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ErrorCode, Money, PartyId,
    TenantId, UserId,
};
use finflow_events::Event;
use finflow_obligations::PayableId;

use crate::receipt::{PaymentMethod, VoucherStatus};

/// Payment voucher identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentVoucherId(pub AggregateId);

impl PaymentVoucherId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentVoucherId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Allocation of part of a payment voucher to a payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayableAllocation {
    pub id: AggregateId,
    pub voucher_id: PaymentVoucherId,
    pub payable_id: PayableId,
    pub payable_number: String,
    pub amount: Money,
    pub allocated_at: DateTime<Utc>,
    pub remark: String,
}

impl Entity for PayableAllocation {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command payload: open a payment voucher for cash paid out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPaymentVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub paid_at: DateTime<Utc>,
}

/// Aggregate root: PaymentVoucher (cash paid to a supplier).
///
/// Invariant: `allocated + unallocated == amount`. Status lifecycle and
/// allocation rules mirror the receipt voucher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentVoucher {
    id: PaymentVoucherId,
    tenant_id: TenantId,
    number: String,
    supplier_id: PartyId,
    supplier_name: String,
    amount: Money,
    allocated: Money,
    unallocated: Money,
    method: PaymentMethod,
    payment_reference: String,
    status: VoucherStatus,
    paid_at: DateTime<Utc>,
    allocations: Vec<PayableAllocation>,
    remark: String,
    confirmed_at: Option<DateTime<Utc>>,
    confirmed_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    cancelled_by: Option<UserId>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl PaymentVoucher {
    pub fn open(cmd: OpenPaymentVoucher) -> DomainResult<(Self, PaymentVoucherEvent)> {
        if cmd.number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "voucher number cannot be empty",
            ));
        }
        if cmd.number.len() > 50 {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "voucher number cannot exceed 50 characters",
            ));
        }
        if cmd.supplier_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "supplier name cannot be empty",
            ));
        }
        if !cmd.amount.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "amount must be positive",
            ));
        }

        let now = Utc::now();
        let voucher = Self {
            id: cmd.voucher_id,
            tenant_id: cmd.tenant_id,
            number: cmd.number.clone(),
            supplier_id: cmd.supplier_id,
            supplier_name: cmd.supplier_name,
            amount: cmd.amount,
            allocated: Money::ZERO,
            unallocated: cmd.amount,
            method: cmd.method,
            payment_reference: String::new(),
            status: VoucherStatus::Draft,
            paid_at: cmd.paid_at,
            allocations: Vec::new(),
            remark: String::new(),
            confirmed_at: None,
            confirmed_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let event = PaymentVoucherEvent::Created(PaymentVoucherCreated {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            number: cmd.number,
            supplier_id: cmd.supplier_id,
            amount: cmd.amount,
            method: cmd.method,
            occurred_at: now,
        });

        Ok((voucher, event))
    }

    pub fn confirm(&mut self, confirmed_by: UserId) -> DomainResult<PaymentVoucherEvent> {
        if !self.status.can_confirm() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot confirm voucher in {:?} status", self.status),
            ));
        }

        let now = Utc::now();
        self.status = VoucherStatus::Confirmed;
        self.confirmed_at = Some(now);
        self.confirmed_by = Some(confirmed_by);
        self.touch();

        Ok(PaymentVoucherEvent::Confirmed(PaymentVoucherConfirmed {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            amount: self.amount,
            confirmed_by,
            occurred_at: now,
        }))
    }

    /// Allocate part or all of the payment to a payable. Same rules as
    /// the receipt side: Confirmed only, one allocation per payable, never
    /// beyond the unallocated amount.
    pub fn allocate_to_payable(
        &mut self,
        payable_id: PayableId,
        payable_number: impl Into<String>,
        amount: Money,
        remark: impl Into<String>,
    ) -> DomainResult<(PayableAllocation, Vec<PaymentVoucherEvent>)> {
        if !self.status.can_allocate() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!(
                    "cannot allocate voucher in {:?} status, must be confirmed",
                    self.status
                ),
            ));
        }
        let payable_number = payable_number.into();
        if payable_number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidTarget,
                "payable number is required",
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "allocation amount must be positive",
            ));
        }
        if amount > self.unallocated {
            return Err(DomainError::bound(
                ErrorCode::ExceedsUnallocated,
                format!(
                    "allocation amount {} exceeds unallocated amount {}",
                    amount, self.unallocated
                ),
            ));
        }
        if self.allocations.iter().any(|a| a.payable_id == payable_id) {
            return Err(DomainError::conflict(
                ErrorCode::AlreadyAllocated,
                format!("already allocated to payable {payable_number}"),
            ));
        }

        let now = Utc::now();
        let allocation = PayableAllocation {
            id: AggregateId::new(),
            voucher_id: self.id,
            payable_id,
            payable_number,
            amount,
            allocated_at: now,
            remark: remark.into(),
        };
        self.allocations.push(allocation.clone());

        self.allocated += amount;
        self.unallocated = self.amount - self.allocated;

        let mut events = vec![PaymentVoucherEvent::Allocated(PaymentVoucherAllocated {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            payable_id,
            amount,
            unallocated: self.unallocated,
            occurred_at: now,
        })];

        if self.unallocated.is_zero() {
            self.status = VoucherStatus::Allocated;
            events.push(PaymentVoucherEvent::FullyAllocated(
                PaymentVoucherFullyAllocated {
                    tenant_id: self.tenant_id,
                    voucher_id: self.id,
                    number: self.number.clone(),
                    amount: self.amount,
                    occurred_at: now,
                },
            ));
        }

        self.touch();
        Ok((allocation, events))
    }

    pub fn cancel(
        &mut self,
        cancelled_by: UserId,
        reason: impl Into<String>,
    ) -> DomainResult<PaymentVoucherEvent> {
        if !self.status.can_cancel() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot cancel voucher in {:?} status", self.status),
            ));
        }
        if self.allocated.is_positive() {
            return Err(DomainError::state(
                ErrorCode::HasAllocations,
                "cannot cancel voucher with existing allocations",
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
        let previous_status = self.status;
        self.status = VoucherStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancelled_by = Some(cancelled_by);
        self.cancel_reason = Some(reason.clone());
        self.touch();

        Ok(PaymentVoucherEvent::Cancelled(PaymentVoucherCancelled {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            previous_status,
            reason,
            occurred_at: now,
        }))
    }

    pub fn set_payment_reference(&mut self, reference: impl Into<String>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot modify voucher in terminal state",
            ));
        }
        let reference = reference.into();
        if reference.len() > 100 {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "payment reference cannot exceed 100 characters",
            ));
        }
        self.payment_reference = reference;
        self.touch();
        Ok(())
    }

    pub fn set_remark(&mut self, remark: impl Into<String>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot modify voucher in terminal state",
            ));
        }
        self.remark = remark.into();
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn id_typed(&self) -> PaymentVoucherId {
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

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn allocated(&self) -> Money {
        self.allocated
    }

    pub fn unallocated(&self) -> Money {
        self.unallocated
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn payment_reference(&self) -> &str {
        &self.payment_reference
    }

    pub fn status(&self) -> VoucherStatus {
        self.status
    }

    pub fn paid_at(&self) -> DateTime<Utc> {
        self.paid_at
    }

    pub fn allocations(&self) -> &[PayableAllocation] {
        &self.allocations
    }

    pub fn remark(&self) -> &str {
        &self.remark
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_fully_allocated(&self) -> bool {
        self.unallocated.is_zero()
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.len()
    }

    pub fn allocated_percentage(&self) -> Decimal {
        if self.amount.is_zero() {
            return Decimal::from(100);
        }
        (self.allocated.amount() / self.amount.amount() * Decimal::from(100)).round_dp(2)
    }

    pub fn allocation_for_payable(&self, payable_id: PayableId) -> Option<&PayableAllocation> {
        self.allocations.iter().find(|a| a.payable_id == payable_id)
    }
}

impl AggregateRoot for PaymentVoucher {
    type Id = PaymentVoucherId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a payment voucher; the repository hydration seam.
/// Taken verbatim on rehydration, audited for drift by the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherState {
    pub id: PaymentVoucherId,
    pub tenant_id: TenantId,
    pub number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub amount: Money,
    pub allocated: Money,
    pub unallocated: Money,
    pub method: PaymentMethod,
    pub payment_reference: String,
    pub status: VoucherStatus,
    pub paid_at: DateTime<Utc>,
    pub allocations: Vec<PayableAllocation>,
    pub remark: String,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub confirmed_by: Option<UserId>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<UserId>,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl PaymentVoucher {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: PaymentVoucherState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            supplier_id: state.supplier_id,
            supplier_name: state.supplier_name,
            amount: state.amount,
            allocated: state.allocated,
            unallocated: state.unallocated,
            method: state.method,
            payment_reference: state.payment_reference,
            status: state.status,
            paid_at: state.paid_at,
            allocations: state.allocations,
            remark: state.remark,
            confirmed_at: state.confirmed_at,
            confirmed_by: state.confirmed_by,
            cancelled_at: state.cancelled_at,
            cancelled_by: state.cancelled_by,
            cancel_reason: state.cancel_reason,
            created_at: state.created_at,
            updated_at: state.updated_at,
            version: state.version,
        }
    }

    /// Snapshot the aggregate for persistence.
    pub fn state(&self) -> PaymentVoucherState {
        PaymentVoucherState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name.clone(),
            amount: self.amount,
            allocated: self.allocated,
            unallocated: self.unallocated,
            method: self.method,
            payment_reference: self.payment_reference.clone(),
            status: self.status,
            paid_at: self.paid_at,
            allocations: self.allocations.clone(),
            remark: self.remark.clone(),
            confirmed_at: self.confirmed_at,
            confirmed_by: self.confirmed_by,
            cancelled_at: self.cancelled_at,
            cancelled_by: self.cancelled_by,
            cancel_reason: self.cancel_reason.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherCreated {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub supplier_id: PartyId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherConfirmed {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub amount: Money,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherAllocated {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub payable_id: PayableId,
    pub amount: Money,
    pub unallocated: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherFullyAllocated {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVoucherCancelled {
    pub tenant_id: TenantId,
    pub voucher_id: PaymentVoucherId,
    pub number: String,
    pub previous_status: VoucherStatus,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentVoucherEvent {
    Created(PaymentVoucherCreated),
    Confirmed(PaymentVoucherConfirmed),
    Allocated(PaymentVoucherAllocated),
    FullyAllocated(PaymentVoucherFullyAllocated),
    Cancelled(PaymentVoucherCancelled),
}

impl Event for PaymentVoucherEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentVoucherEvent::Created(_) => "finance.payment_voucher.created",
            PaymentVoucherEvent::Confirmed(_) => "finance.payment_voucher.confirmed",
            PaymentVoucherEvent::Allocated(_) => "finance.payment_voucher.allocated",
            PaymentVoucherEvent::FullyAllocated(_) => "finance.payment_voucher.fully_allocated",
            PaymentVoucherEvent::Cancelled(_) => "finance.payment_voucher.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentVoucherEvent::Created(e) => e.occurred_at,
            PaymentVoucherEvent::Confirmed(e) => e.occurred_at,
            PaymentVoucherEvent::Allocated(e) => e.occurred_at,
            PaymentVoucherEvent::FullyAllocated(e) => e.occurred_at,
            PaymentVoucherEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_cmd(amount: Money) -> OpenPaymentVoucher {
        OpenPaymentVoucher {
            tenant_id: TenantId::new(),
            voucher_id: PaymentVoucherId::new(AggregateId::new()),
            number: "PV-2026-00001".to_string(),
            supplier_id: PartyId::new(),
            supplier_name: "Northwind Supply".to_string(),
            amount,
            method: PaymentMethod::BankTransfer,
            paid_at: Utc::now(),
        }
    }

    fn confirmed(amount: Money) -> PaymentVoucher {
        let (mut pv, _) = PaymentVoucher::open(open_cmd(amount)).unwrap();
        pv.confirm(UserId::new()).unwrap();
        pv
    }

    fn payable_id() -> PayableId {
        PayableId::new(AggregateId::new())
    }

    #[test]
    fn allocation_keeps_invariant_and_tracks_status() {
        let mut pv = confirmed(Money::new(dec!(2000)));
        pv.allocate_to_payable(payable_id(), "AP-001", Money::new(dec!(1200)), "")
            .unwrap();
        assert_eq!(pv.allocated() + pv.unallocated(), pv.amount());
        assert_eq!(pv.status(), VoucherStatus::Confirmed);

        let (_, events) = pv
            .allocate_to_payable(payable_id(), "AP-002", Money::new(dec!(800)), "")
            .unwrap();
        assert_eq!(pv.status(), VoucherStatus::Allocated);
        assert!(matches!(
            events.last(),
            Some(PaymentVoucherEvent::FullyAllocated(_))
        ));
    }

    #[test]
    fn duplicate_target_and_overallocation_are_rejected() {
        let mut pv = confirmed(Money::new(dec!(500)));
        let target = payable_id();
        pv.allocate_to_payable(target, "AP-001", Money::new(dec!(100)), "")
            .unwrap();

        let err = pv
            .allocate_to_payable(target, "AP-001", Money::new(dec!(50)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyAllocated);

        let err = pv
            .allocate_to_payable(payable_id(), "AP-002", Money::new(dec!(401)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsUnallocated);
    }

    #[test]
    fn cancel_rules_match_receipt_side() {
        let mut pv = confirmed(Money::new(dec!(100)));
        pv.allocate_to_payable(payable_id(), "AP-001", Money::new(dec!(10)), "")
            .unwrap();
        assert_eq!(
            pv.cancel(UserId::new(), "dup").unwrap_err().code(),
            ErrorCode::HasAllocations
        );

        let mut clean = confirmed(Money::new(dec!(100)));
        clean.cancel(UserId::new(), "dup").unwrap();
        assert_eq!(clean.status(), VoucherStatus::Cancelled);
    }
}
