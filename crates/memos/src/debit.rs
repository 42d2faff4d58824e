use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ErrorCode, Money, PartyId,
    TenantId,
};
use finflow_events::Event;
use finflow_obligations::PayableId;

/// Debit memo identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DebitMemoId(pub AggregateId);

impl DebitMemoId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DebitMemoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Debit memo status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebitMemoStatus {
    Pending,
    Partial,
    Applied,
    Voided,
    Refunded,
}

impl DebitMemoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DebitMemoStatus::Applied | DebitMemoStatus::Voided | DebitMemoStatus::Refunded
        )
    }

    pub fn can_apply(&self) -> bool {
        matches!(self, DebitMemoStatus::Pending | DebitMemoStatus::Partial)
    }
}

/// Line item in a debit memo, derived from a purchase return item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoItem {
    pub id: AggregateId,
    pub return_item_id: AggregateId,
    pub product_id: AggregateId,
    pub product_name: String,
    pub product_code: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    pub amount: Money,
    pub unit: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for DebitMemoItem {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An application of debit to a payable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoApplication {
    pub id: AggregateId,
    pub memo_id: DebitMemoId,
    pub payable_id: PayableId,
    pub amount: Money,
    pub applied_at: DateTime<Utc>,
    pub remark: String,
}

impl Entity for DebitMemoApplication {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command payload: open a debit memo from a completed purchase return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDebitMemo {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub purchase_return_id: AggregateId,
    pub purchase_return_number: String,
    pub purchase_order_id: AggregateId,
    pub purchase_order_number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub total: Money,
    pub reason: String,
}

/// Aggregate root: DebitMemo (supplier debit arising from a purchase return).
///
/// Invariant: `applied + remaining == total`. Mirrors the credit memo
/// lifecycle on the payable side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitMemo {
    id: DebitMemoId,
    tenant_id: TenantId,
    number: String,
    purchase_return_id: AggregateId,
    purchase_return_number: String,
    purchase_order_id: AggregateId,
    purchase_order_number: String,
    supplier_id: PartyId,
    supplier_name: String,
    original_payable_id: Option<PayableId>,
    items: Vec<DebitMemoItem>,
    total: Money,
    applied: Money,
    remaining: Money,
    status: DebitMemoStatus,
    applications: Vec<DebitMemoApplication>,
    reason: String,
    remark: String,
    applied_at: Option<DateTime<Utc>>,
    voided_at: Option<DateTime<Utc>>,
    void_reason: Option<String>,
    refunded_at: Option<DateTime<Utc>>,
    refund_method: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

impl DebitMemo {
    pub fn open(cmd: OpenDebitMemo) -> DomainResult<(Self, DebitMemoEvent)> {
        if cmd.number.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "memo number cannot be empty",
            ));
        }
        if cmd.number.len() > 50 {
            return Err(DomainError::validation(
                ErrorCode::InvalidNumber,
                "memo number cannot exceed 50 characters",
            ));
        }
        if cmd.supplier_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "supplier name cannot be empty",
            ));
        }
        if !cmd.total.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "total debit must be positive",
            ));
        }

        let now = Utc::now();
        let memo = Self {
            id: cmd.memo_id,
            tenant_id: cmd.tenant_id,
            number: cmd.number.clone(),
            purchase_return_id: cmd.purchase_return_id,
            purchase_return_number: cmd.purchase_return_number,
            purchase_order_id: cmd.purchase_order_id,
            purchase_order_number: cmd.purchase_order_number,
            supplier_id: cmd.supplier_id,
            supplier_name: cmd.supplier_name,
            original_payable_id: None,
            items: Vec::new(),
            total: cmd.total,
            applied: Money::ZERO,
            remaining: cmd.total,
            status: DebitMemoStatus::Pending,
            applications: Vec::new(),
            reason: cmd.reason,
            remark: String::new(),
            applied_at: None,
            voided_at: None,
            void_reason: None,
            refunded_at: None,
            refund_method: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };

        let event = DebitMemoEvent::Created(DebitMemoCreated {
            tenant_id: cmd.tenant_id,
            memo_id: cmd.memo_id,
            number: cmd.number,
            supplier_id: cmd.supplier_id,
            total: cmd.total,
            occurred_at: now,
        });

        Ok((memo, event))
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_item(
        &mut self,
        return_item_id: AggregateId,
        product_id: AggregateId,
        product_name: impl Into<String>,
        product_code: impl Into<String>,
        unit: impl Into<String>,
        quantity: Decimal,
        unit_price: Money,
        reason: impl Into<String>,
    ) -> DomainResult<DebitMemoItem> {
        if self.status != DebitMemoStatus::Pending {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot add items to a non-pending debit memo",
            ));
        }

        let amount = Money::new(quantity * unit_price.amount());
        let item = DebitMemoItem {
            id: AggregateId::new(),
            return_item_id,
            product_id,
            product_name: product_name.into(),
            product_code: product_code.into(),
            quantity,
            unit_price,
            amount,
            unit: unit.into(),
            reason: reason.into(),
            created_at: Utc::now(),
        };
        self.items.push(item.clone());
        self.touch();

        Ok(item)
    }

    pub fn set_original_payable(&mut self, payable_id: PayableId) {
        self.original_payable_id = Some(payable_id);
        self.touch();
    }

    /// Apply debit to a specific payable.
    pub fn apply_to_payable(
        &mut self,
        payable_id: PayableId,
        amount: Money,
        remark: impl Into<String>,
    ) -> DomainResult<DebitMemoEvent> {
        if !self.status.can_apply() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot apply debit memo in {:?} status", self.status),
            ));
        }
        if !amount.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "application amount must be positive",
            ));
        }
        if amount > self.remaining {
            return Err(DomainError::bound(
                ErrorCode::ExceedsRemaining,
                format!(
                    "application amount {} exceeds remaining debit {}",
                    amount, self.remaining
                ),
            ));
        }

        self.applications.push(DebitMemoApplication {
            id: AggregateId::new(),
            memo_id: self.id,
            payable_id,
            amount,
            applied_at: Utc::now(),
            remark: remark.into(),
        });

        self.applied += amount;
        self.remaining = self.total - self.applied;

        let event = if self.remaining.is_zero() {
            let now = Utc::now();
            self.status = DebitMemoStatus::Applied;
            self.applied_at = Some(now);
            DebitMemoEvent::Applied(DebitMemoApplied {
                tenant_id: self.tenant_id,
                memo_id: self.id,
                number: self.number.clone(),
                total: self.total,
                occurred_at: now,
            })
        } else {
            self.status = DebitMemoStatus::Partial;
            DebitMemoEvent::PartiallyApplied(DebitMemoPartiallyApplied {
                tenant_id: self.tenant_id,
                memo_id: self.id,
                number: self.number.clone(),
                amount,
                applied: self.applied,
                remaining: self.remaining,
                payable_id,
                occurred_at: Utc::now(),
            })
        };

        self.touch();
        Ok(event)
    }

    pub fn void(&mut self, reason: impl Into<String>) -> DomainResult<DebitMemoEvent> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot void debit memo in {:?} status", self.status),
            ));
        }
        if self.applied.is_positive() {
            return Err(DomainError::state(
                ErrorCode::HasApplications,
                "cannot void debit memo with existing applications",
            ));
        }
        let reason = reason.into();
        if reason.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidReason,
                "void reason is required",
            ));
        }

        let now = Utc::now();
        self.status = DebitMemoStatus::Voided;
        self.voided_at = Some(now);
        self.void_reason = Some(reason.clone());
        self.remaining = Money::ZERO;
        self.touch();

        Ok(DebitMemoEvent::Voided(DebitMemoVoided {
            tenant_id: self.tenant_id,
            memo_id: self.id,
            number: self.number.clone(),
            reason,
            occurred_at: now,
        }))
    }

    /// Collect the remaining debit from the supplier instead of applying it.
    pub fn refund(&mut self, method: impl Into<String>) -> DomainResult<DebitMemoEvent> {
        if !self.status.can_apply() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot refund debit memo in {:?} status", self.status),
            ));
        }
        if !self.remaining.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::NoRemaining,
                "no remaining debit to refund",
            ));
        }
        let method = method.into();
        if method.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidMethod,
                "refund method is required",
            ));
        }

        let refund_amount = self.remaining;
        let now = Utc::now();
        self.status = DebitMemoStatus::Refunded;
        self.refunded_at = Some(now);
        self.refund_method = Some(method.clone());
        self.applied = self.total;
        self.remaining = Money::ZERO;
        self.touch();

        Ok(DebitMemoEvent::Refunded(DebitMemoRefunded {
            tenant_id: self.tenant_id,
            memo_id: self.id,
            number: self.number.clone(),
            refund_amount,
            method,
            occurred_at: now,
        }))
    }

    pub fn set_remark(&mut self, remark: impl Into<String>) {
        self.remark = remark.into();
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
        self.version += 1;
    }

    pub fn id_typed(&self) -> DebitMemoId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn purchase_return_id(&self) -> AggregateId {
        self.purchase_return_id
    }

    pub fn purchase_order_id(&self) -> AggregateId {
        self.purchase_order_id
    }

    pub fn supplier_id(&self) -> PartyId {
        self.supplier_id
    }

    pub fn supplier_name(&self) -> &str {
        &self.supplier_name
    }

    pub fn original_payable_id(&self) -> Option<PayableId> {
        self.original_payable_id
    }

    pub fn items(&self) -> &[DebitMemoItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn applied(&self) -> Money {
        self.applied
    }

    pub fn remaining(&self) -> Money {
        self.remaining
    }

    pub fn status(&self) -> DebitMemoStatus {
        self.status
    }

    pub fn applications(&self) -> &[DebitMemoApplication] {
        &self.applications
    }

    pub fn reason(&self) -> &str {
        &self.reason
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

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn application_count(&self) -> usize {
        self.applications.len()
    }

    pub fn applied_percentage(&self) -> Decimal {
        if self.total.is_zero() {
            return Decimal::from(100);
        }
        (self.applied.amount() / self.total.amount() * Decimal::from(100)).round_dp(2)
    }
}

impl AggregateRoot for DebitMemo {
    type Id = DebitMemoId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a debit memo; the repository hydration seam.
/// Taken verbatim on rehydration, audited for drift by the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoState {
    pub id: DebitMemoId,
    pub tenant_id: TenantId,
    pub number: String,
    pub purchase_return_id: AggregateId,
    pub purchase_return_number: String,
    pub purchase_order_id: AggregateId,
    pub purchase_order_number: String,
    pub supplier_id: PartyId,
    pub supplier_name: String,
    pub original_payable_id: Option<PayableId>,
    pub items: Vec<DebitMemoItem>,
    pub total: Money,
    pub applied: Money,
    pub remaining: Money,
    pub status: DebitMemoStatus,
    pub applications: Vec<DebitMemoApplication>,
    pub reason: String,
    pub remark: String,
    pub applied_at: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub void_reason: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub refund_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl DebitMemo {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: DebitMemoState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            purchase_return_id: state.purchase_return_id,
            purchase_return_number: state.purchase_return_number,
            purchase_order_id: state.purchase_order_id,
            purchase_order_number: state.purchase_order_number,
            supplier_id: state.supplier_id,
            supplier_name: state.supplier_name,
            original_payable_id: state.original_payable_id,
            items: state.items,
            total: state.total,
            applied: state.applied,
            remaining: state.remaining,
            status: state.status,
            applications: state.applications,
            reason: state.reason,
            remark: state.remark,
            applied_at: state.applied_at,
            voided_at: state.voided_at,
            void_reason: state.void_reason,
            refunded_at: state.refunded_at,
            refund_method: state.refund_method,
            created_at: state.created_at,
            updated_at: state.updated_at,
            version: state.version,
        }
    }

    /// Snapshot the aggregate for persistence.
    pub fn state(&self) -> DebitMemoState {
        DebitMemoState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            purchase_return_id: self.purchase_return_id,
            purchase_return_number: self.purchase_return_number.clone(),
            purchase_order_id: self.purchase_order_id,
            purchase_order_number: self.purchase_order_number.clone(),
            supplier_id: self.supplier_id,
            supplier_name: self.supplier_name.clone(),
            original_payable_id: self.original_payable_id,
            items: self.items.clone(),
            total: self.total,
            applied: self.applied,
            remaining: self.remaining,
            status: self.status,
            applications: self.applications.clone(),
            reason: self.reason.clone(),
            remark: self.remark.clone(),
            applied_at: self.applied_at,
            voided_at: self.voided_at,
            void_reason: self.void_reason.clone(),
            refunded_at: self.refunded_at,
            refund_method: self.refund_method.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoCreated {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub supplier_id: PartyId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoPartiallyApplied {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub amount: Money,
    pub applied: Money,
    pub remaining: Money,
    pub payable_id: PayableId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoApplied {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoVoided {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebitMemoRefunded {
    pub tenant_id: TenantId,
    pub memo_id: DebitMemoId,
    pub number: String,
    pub refund_amount: Money,
    pub method: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitMemoEvent {
    Created(DebitMemoCreated),
    PartiallyApplied(DebitMemoPartiallyApplied),
    Applied(DebitMemoApplied),
    Voided(DebitMemoVoided),
    Refunded(DebitMemoRefunded),
}

impl Event for DebitMemoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DebitMemoEvent::Created(_) => "finance.debit_memo.created",
            DebitMemoEvent::PartiallyApplied(_) => "finance.debit_memo.partially_applied",
            DebitMemoEvent::Applied(_) => "finance.debit_memo.applied",
            DebitMemoEvent::Voided(_) => "finance.debit_memo.voided",
            DebitMemoEvent::Refunded(_) => "finance.debit_memo.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DebitMemoEvent::Created(e) => e.occurred_at,
            DebitMemoEvent::PartiallyApplied(e) => e.occurred_at,
            DebitMemoEvent::Applied(e) => e.occurred_at,
            DebitMemoEvent::Voided(e) => e.occurred_at,
            DebitMemoEvent::Refunded(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_cmd(total: Money) -> OpenDebitMemo {
        OpenDebitMemo {
            tenant_id: TenantId::new(),
            memo_id: DebitMemoId::new(AggregateId::new()),
            number: "DM-2026-00001".to_string(),
            purchase_return_id: AggregateId::new(),
            purchase_return_number: "PR-2026-00002".to_string(),
            purchase_order_id: AggregateId::new(),
            purchase_order_number: "PO-2026-00017".to_string(),
            supplier_id: PartyId::new(),
            supplier_name: "Northwind Supply".to_string(),
            total,
            reason: "short shipment".to_string(),
        }
    }

    fn opened(total: Money) -> DebitMemo {
        DebitMemo::open(open_cmd(total)).unwrap().0
    }

    fn payable_id() -> PayableId {
        PayableId::new(AggregateId::new())
    }

    #[test]
    fn applications_track_invariant_and_status() {
        let mut dm = opened(Money::new(dec!(400)));
        dm.apply_to_payable(payable_id(), Money::new(dec!(150)), "")
            .unwrap();
        assert_eq!(dm.status(), DebitMemoStatus::Partial);
        assert_eq!(dm.applied() + dm.remaining(), dm.total());

        let event = dm
            .apply_to_payable(payable_id(), Money::new(dec!(250)), "")
            .unwrap();
        assert_eq!(dm.status(), DebitMemoStatus::Applied);
        assert!(matches!(event, DebitMemoEvent::Applied(_)));
    }

    #[test]
    fn over_application_is_rejected() {
        let mut dm = opened(Money::new(dec!(100)));
        let err = dm
            .apply_to_payable(payable_id(), Money::new(dec!(101)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsRemaining);
    }

    #[test]
    fn void_and_refund_lifecycle() {
        let mut dm = opened(Money::new(dec!(100)));
        dm.apply_to_payable(payable_id(), Money::new(dec!(30)), "")
            .unwrap();
        assert_eq!(
            dm.void("wrong supplier").unwrap_err().code(),
            ErrorCode::HasApplications
        );

        let event = dm.refund("offset_next_order").unwrap();
        assert_eq!(dm.status(), DebitMemoStatus::Refunded);
        assert_eq!(dm.applied(), dm.total());
        match event {
            DebitMemoEvent::Refunded(e) => assert_eq!(e.refund_amount, Money::new(dec!(70))),
            other => panic!("expected Refunded event, got {other:?}"),
        }
    }
}
