use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ErrorCode, Money, PartyId,
    TenantId, UserId,
};
use finflow_events::Event;
use finflow_obligations::ReceivableId;

/// Receipt voucher identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReceiptVoucherId(pub AggregateId);

impl ReceiptVoucherId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReceiptVoucherId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Voucher status lifecycle, shared by receipt and payment vouchers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    /// Not yet confirmed; cannot receive allocations.
    Draft,
    /// Confirmed; allocations allowed.
    Confirmed,
    /// Fully allocated (unallocated reached zero).
    Allocated,
    Cancelled,
}

impl VoucherStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, VoucherStatus::Allocated | VoucherStatus::Cancelled)
    }

    pub fn can_allocate(&self) -> bool {
        matches!(self, VoucherStatus::Confirmed)
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, VoucherStatus::Draft)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, VoucherStatus::Draft | VoucherStatus::Confirmed)
    }
}

/// How the cash moved. Data only; gateway integration is external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Wechat,
    Alipay,
    Check,
    /// Customer balance (prepaid).
    Balance,
    Other,
}

/// Allocation of part of a receipt voucher to a receivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivableAllocation {
    pub id: AggregateId,
    pub voucher_id: ReceiptVoucherId,
    pub receivable_id: ReceivableId,
    /// Denormalized for display.
    pub receivable_number: String,
    pub amount: Money,
    pub allocated_at: DateTime<Utc>,
    pub remark: String,
}

impl Entity for ReceivableAllocation {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command payload: open a receipt voucher for cash received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReceiptVoucher {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub received_at: DateTime<Utc>,
}

/// Aggregate root: ReceiptVoucher (cash received from a customer).
///
/// Invariant: `allocated + unallocated == amount` at all times. Only
/// confirmed vouchers accept allocations; reaching zero unallocated
/// transitions the voucher to `Allocated`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptVoucher {
    id: ReceiptVoucherId,
    tenant_id: TenantId,
    number: String,
    customer_id: PartyId,
    customer_name: String,
    amount: Money,
    allocated: Money,
    unallocated: Money,
    method: PaymentMethod,
    payment_reference: String,
    status: VoucherStatus,
    received_at: DateTime<Utc>,
    allocations: Vec<ReceivableAllocation>,
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

impl ReceiptVoucher {
    /// Open a new receipt voucher in Draft status, fully unallocated.
    pub fn open(cmd: OpenReceiptVoucher) -> DomainResult<(Self, ReceiptVoucherEvent)> {
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
        if cmd.customer_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "customer name cannot be empty",
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
            customer_id: cmd.customer_id,
            customer_name: cmd.customer_name,
            amount: cmd.amount,
            allocated: Money::ZERO,
            unallocated: cmd.amount,
            method: cmd.method,
            payment_reference: String::new(),
            status: VoucherStatus::Draft,
            received_at: cmd.received_at,
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

        let event = ReceiptVoucherEvent::Created(ReceiptVoucherCreated {
            tenant_id: cmd.tenant_id,
            voucher_id: cmd.voucher_id,
            number: cmd.number,
            customer_id: cmd.customer_id,
            amount: cmd.amount,
            method: cmd.method,
            occurred_at: now,
        });

        Ok((voucher, event))
    }

    /// Confirm the voucher, allowing allocations.
    pub fn confirm(&mut self, confirmed_by: UserId) -> DomainResult<ReceiptVoucherEvent> {
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

        Ok(ReceiptVoucherEvent::Confirmed(ReceiptVoucherConfirmed {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            amount: self.amount,
            confirmed_by,
            occurred_at: now,
        }))
    }

    /// Allocate part or all of the receipt to a receivable.
    ///
    /// Fails with INVALID_STATE unless Confirmed, EXCEEDS_UNALLOCATED when
    /// the amount is larger than the remaining unallocated cash, and
    /// ALREADY_ALLOCATED if this voucher already allocated to the same
    /// receivable. Returns the allocation record plus the emitted events —
    /// `Allocated`, and additionally `FullyAllocated` when unallocated
    /// reaches zero.
    pub fn allocate_to_receivable(
        &mut self,
        receivable_id: ReceivableId,
        receivable_number: impl Into<String>,
        amount: Money,
        remark: impl Into<String>,
    ) -> DomainResult<(ReceivableAllocation, Vec<ReceiptVoucherEvent>)> {
        if !self.status.can_allocate() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!(
                    "cannot allocate voucher in {:?} status, must be confirmed",
                    self.status
                ),
            ));
        }
        let receivable_number = receivable_number.into();
        if receivable_number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidTarget,
                "receivable number is required",
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
        if self
            .allocations
            .iter()
            .any(|a| a.receivable_id == receivable_id)
        {
            return Err(DomainError::conflict(
                ErrorCode::AlreadyAllocated,
                format!("already allocated to receivable {receivable_number}"),
            ));
        }

        let now = Utc::now();
        let allocation = ReceivableAllocation {
            id: AggregateId::new(),
            voucher_id: self.id,
            receivable_id,
            receivable_number,
            amount,
            allocated_at: now,
            remark: remark.into(),
        };
        self.allocations.push(allocation.clone());

        self.allocated += amount;
        self.unallocated = self.amount - self.allocated;

        let mut events = vec![ReceiptVoucherEvent::Allocated(ReceiptVoucherAllocated {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            receivable_id,
            amount,
            unallocated: self.unallocated,
            occurred_at: now,
        })];

        if self.unallocated.is_zero() {
            self.status = VoucherStatus::Allocated;
            events.push(ReceiptVoucherEvent::FullyAllocated(
                ReceiptVoucherFullyAllocated {
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

    /// Cancel the voucher. Only drafts and confirmed vouchers without
    /// allocations can be cancelled.
    pub fn cancel(
        &mut self,
        cancelled_by: UserId,
        reason: impl Into<String>,
    ) -> DomainResult<ReceiptVoucherEvent> {
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

        Ok(ReceiptVoucherEvent::Cancelled(ReceiptVoucherCancelled {
            tenant_id: self.tenant_id,
            voucher_id: self.id,
            number: self.number.clone(),
            previous_status,
            reason,
            occurred_at: now,
        }))
    }

    /// Set the external payment reference (bank transaction, check number).
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

    pub fn id_typed(&self) -> ReceiptVoucherId {
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

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn allocations(&self) -> &[ReceivableAllocation] {
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

    /// Percentage of the amount that has been allocated (0-100, two decimals).
    pub fn allocated_percentage(&self) -> Decimal {
        if self.amount.is_zero() {
            return Decimal::from(100);
        }
        (self.allocated.amount() / self.amount.amount() * Decimal::from(100)).round_dp(2)
    }

    pub fn allocation_for_receivable(
        &self,
        receivable_id: ReceivableId,
    ) -> Option<&ReceivableAllocation> {
        self.allocations
            .iter()
            .find(|a| a.receivable_id == receivable_id)
    }
}

impl AggregateRoot for ReceiptVoucher {
    type Id = ReceiptVoucherId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a receipt voucher; the repository hydration seam.
/// Taken verbatim on rehydration, audited for drift by the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVoucherState {
    pub id: ReceiptVoucherId,
    pub tenant_id: TenantId,
    pub number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub amount: Money,
    pub allocated: Money,
    pub unallocated: Money,
    pub method: PaymentMethod,
    pub payment_reference: String,
    pub status: VoucherStatus,
    pub received_at: DateTime<Utc>,
    pub allocations: Vec<ReceivableAllocation>,
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

impl ReceiptVoucher {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: ReceiptVoucherState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            customer_id: state.customer_id,
            customer_name: state.customer_name,
            amount: state.amount,
            allocated: state.allocated,
            unallocated: state.unallocated,
            method: state.method,
            payment_reference: state.payment_reference,
            status: state.status,
            received_at: state.received_at,
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
    pub fn state(&self) -> ReceiptVoucherState {
        ReceiptVoucherState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
            amount: self.amount,
            allocated: self.allocated,
            unallocated: self.unallocated,
            method: self.method,
            payment_reference: self.payment_reference.clone(),
            status: self.status,
            received_at: self.received_at,
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
pub struct ReceiptVoucherCreated {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub customer_id: PartyId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVoucherConfirmed {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub amount: Money,
    pub confirmed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVoucherAllocated {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub receivable_id: ReceivableId,
    pub amount: Money,
    pub unallocated: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVoucherFullyAllocated {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptVoucherCancelled {
    pub tenant_id: TenantId,
    pub voucher_id: ReceiptVoucherId,
    pub number: String,
    pub previous_status: VoucherStatus,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptVoucherEvent {
    Created(ReceiptVoucherCreated),
    Confirmed(ReceiptVoucherConfirmed),
    Allocated(ReceiptVoucherAllocated),
    FullyAllocated(ReceiptVoucherFullyAllocated),
    Cancelled(ReceiptVoucherCancelled),
}

impl Event for ReceiptVoucherEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReceiptVoucherEvent::Created(_) => "finance.receipt_voucher.created",
            ReceiptVoucherEvent::Confirmed(_) => "finance.receipt_voucher.confirmed",
            ReceiptVoucherEvent::Allocated(_) => "finance.receipt_voucher.allocated",
            ReceiptVoucherEvent::FullyAllocated(_) => "finance.receipt_voucher.fully_allocated",
            ReceiptVoucherEvent::Cancelled(_) => "finance.receipt_voucher.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReceiptVoucherEvent::Created(e) => e.occurred_at,
            ReceiptVoucherEvent::Confirmed(e) => e.occurred_at,
            ReceiptVoucherEvent::Allocated(e) => e.occurred_at,
            ReceiptVoucherEvent::FullyAllocated(e) => e.occurred_at,
            ReceiptVoucherEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_cmd(amount: Money) -> OpenReceiptVoucher {
        OpenReceiptVoucher {
            tenant_id: TenantId::new(),
            voucher_id: ReceiptVoucherId::new(AggregateId::new()),
            number: "RV-2026-00001".to_string(),
            customer_id: PartyId::new(),
            customer_name: "Acme Retail".to_string(),
            amount,
            method: PaymentMethod::BankTransfer,
            received_at: Utc::now(),
        }
    }

    fn confirmed(amount: Money) -> ReceiptVoucher {
        let (mut rv, _) = ReceiptVoucher::open(open_cmd(amount)).unwrap();
        rv.confirm(UserId::new()).unwrap();
        rv
    }

    fn receivable_id() -> ReceivableId {
        ReceivableId::new(AggregateId::new())
    }

    #[test]
    fn open_starts_draft_and_fully_unallocated() {
        let (rv, event) = ReceiptVoucher::open(open_cmd(Money::new(dec!(2500)))).unwrap();
        assert_eq!(rv.status(), VoucherStatus::Draft);
        assert_eq!(rv.unallocated(), Money::new(dec!(2500)));
        assert_eq!(rv.allocated(), Money::ZERO);
        assert!(matches!(event, ReceiptVoucherEvent::Created(_)));
    }

    #[test]
    fn draft_voucher_rejects_allocations() {
        let (mut rv, _) = ReceiptVoucher::open(open_cmd(Money::new(dec!(100)))).unwrap();
        let err = rv
            .allocate_to_receivable(receivable_id(), "AR-001", Money::new(dec!(50)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn allocation_moves_amounts_and_keeps_invariant() {
        let mut rv = confirmed(Money::new(dec!(1000)));
        let (allocation, events) = rv
            .allocate_to_receivable(receivable_id(), "AR-001", Money::new(dec!(400)), "")
            .unwrap();

        assert_eq!(allocation.amount, Money::new(dec!(400)));
        assert_eq!(rv.allocated(), Money::new(dec!(400)));
        assert_eq!(rv.unallocated(), Money::new(dec!(600)));
        assert_eq!(rv.allocated() + rv.unallocated(), rv.amount());
        assert_eq!(rv.status(), VoucherStatus::Confirmed);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ReceiptVoucherEvent::Allocated(_)));
    }

    #[test]
    fn full_allocation_transitions_and_emits_fully_allocated() {
        let mut rv = confirmed(Money::new(dec!(500)));
        rv.allocate_to_receivable(receivable_id(), "AR-001", Money::new(dec!(200)), "")
            .unwrap();
        let (_, events) = rv
            .allocate_to_receivable(receivable_id(), "AR-002", Money::new(dec!(300)), "")
            .unwrap();

        assert_eq!(rv.status(), VoucherStatus::Allocated);
        assert!(rv.is_fully_allocated());
        assert_eq!(events.len(), 2);
        assert!(matches!(events[1], ReceiptVoucherEvent::FullyAllocated(_)));
    }

    #[test]
    fn duplicate_allocation_to_same_receivable_is_rejected() {
        let mut rv = confirmed(Money::new(dec!(1000)));
        let target = receivable_id();
        rv.allocate_to_receivable(target, "AR-001", Money::new(dec!(100)), "")
            .unwrap();
        let err = rv
            .allocate_to_receivable(target, "AR-001", Money::new(dec!(100)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyAllocated);
    }

    #[test]
    fn allocation_beyond_unallocated_is_rejected() {
        let mut rv = confirmed(Money::new(dec!(100)));
        let err = rv
            .allocate_to_receivable(receivable_id(), "AR-001", Money::new(dec!(100.01)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsUnallocated);
        assert_eq!(rv.allocated(), Money::ZERO);
    }

    #[test]
    fn cancel_with_allocations_is_rejected() {
        let mut rv = confirmed(Money::new(dec!(100)));
        rv.allocate_to_receivable(receivable_id(), "AR-001", Money::new(dec!(10)), "")
            .unwrap();
        let err = rv.cancel(UserId::new(), "oops").unwrap_err();
        assert_eq!(err.code(), ErrorCode::HasAllocations);
    }

    #[test]
    fn cancel_clean_voucher() {
        let mut rv = confirmed(Money::new(dec!(100)));
        let event = rv.cancel(UserId::new(), "entered twice").unwrap();
        assert_eq!(rv.status(), VoucherStatus::Cancelled);
        match event {
            ReceiptVoucherEvent::Cancelled(e) => {
                assert_eq!(e.previous_status, VoucherStatus::Confirmed);
            }
            other => panic!("expected Cancelled event, got {other:?}"),
        }
    }

    #[test]
    fn confirm_twice_is_invalid_state() {
        let mut rv = confirmed(Money::new(dec!(100)));
        let err = rv.confirm(UserId::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }
}
