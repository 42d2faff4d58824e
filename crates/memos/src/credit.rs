use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use finflow_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, Entity, ErrorCode, Money, PartyId,
    TenantId,
};
use finflow_events::Event;
use finflow_obligations::ReceivableId;

/// Credit memo identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CreditMemoId(pub AggregateId);

impl CreditMemoId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for CreditMemoId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Memo status lifecycle, shared by credit and debit memos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditMemoStatus {
    /// Created, waiting to be applied.
    Pending,
    /// Partially applied.
    Partial,
    /// Fully applied (remaining = 0).
    Applied,
    Voided,
    /// Remaining credit refunded to the counterparty instead of applied.
    Refunded,
}

impl CreditMemoStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CreditMemoStatus::Applied | CreditMemoStatus::Voided | CreditMemoStatus::Refunded
        )
    }

    pub fn can_apply(&self) -> bool {
        matches!(self, CreditMemoStatus::Pending | CreditMemoStatus::Partial)
    }
}

/// Line item in a memo, derived from a return item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoItem {
    pub id: AggregateId,
    pub return_item_id: AggregateId,
    pub product_id: AggregateId,
    pub product_name: String,
    pub product_code: String,
    pub quantity: Decimal,
    pub unit_price: Money,
    /// quantity × unit price.
    pub amount: Money,
    pub unit: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for CreditMemoItem {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// An application of credit to a receivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoApplication {
    pub id: AggregateId,
    pub memo_id: CreditMemoId,
    pub receivable_id: ReceivableId,
    pub amount: Money,
    pub applied_at: DateTime<Utc>,
    pub remark: String,
}

impl Entity for CreditMemoApplication {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Command payload: open a credit memo from a completed sales return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenCreditMemo {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub sales_return_id: AggregateId,
    pub sales_return_number: String,
    pub sales_order_id: AggregateId,
    pub sales_order_number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub total: Money,
    pub reason: String,
}

/// Aggregate root: CreditMemo (customer credit arising from a return).
///
/// Invariant: `applied + remaining == total` at all times.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditMemo {
    id: CreditMemoId,
    tenant_id: TenantId,
    number: String,
    sales_return_id: AggregateId,
    sales_return_number: String,
    sales_order_id: AggregateId,
    sales_order_number: String,
    customer_id: PartyId,
    customer_name: String,
    original_receivable_id: Option<ReceivableId>,
    items: Vec<CreditMemoItem>,
    total: Money,
    applied: Money,
    remaining: Money,
    status: CreditMemoStatus,
    applications: Vec<CreditMemoApplication>,
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

impl CreditMemo {
    pub fn open(cmd: OpenCreditMemo) -> DomainResult<(Self, CreditMemoEvent)> {
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
        if cmd.customer_name.is_empty() {
            return Err(DomainError::validation(
                ErrorCode::InvalidCounterparty,
                "customer name cannot be empty",
            ));
        }
        if !cmd.total.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "total credit must be positive",
            ));
        }

        let now = Utc::now();
        let memo = Self {
            id: cmd.memo_id,
            tenant_id: cmd.tenant_id,
            number: cmd.number.clone(),
            sales_return_id: cmd.sales_return_id,
            sales_return_number: cmd.sales_return_number,
            sales_order_id: cmd.sales_order_id,
            sales_order_number: cmd.sales_order_number,
            customer_id: cmd.customer_id,
            customer_name: cmd.customer_name,
            original_receivable_id: None,
            items: Vec::new(),
            total: cmd.total,
            applied: Money::ZERO,
            remaining: cmd.total,
            status: CreditMemoStatus::Pending,
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

        let event = CreditMemoEvent::Created(CreditMemoCreated {
            tenant_id: cmd.tenant_id,
            memo_id: cmd.memo_id,
            number: cmd.number,
            customer_id: cmd.customer_id,
            total: cmd.total,
            occurred_at: now,
        });

        Ok((memo, event))
    }

    /// Add a line item. Only allowed while still pending.
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
    ) -> DomainResult<CreditMemoItem> {
        if self.status != CreditMemoStatus::Pending {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                "cannot add items to a non-pending credit memo",
            ));
        }

        let amount = Money::new(quantity * unit_price.amount());
        let item = CreditMemoItem {
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

    /// Link this credit memo to the receivable it offsets.
    pub fn set_original_receivable(&mut self, receivable_id: ReceivableId) {
        self.original_receivable_id = Some(receivable_id);
        self.touch();
    }

    /// Apply credit to a specific receivable.
    ///
    /// Fails with EXCEEDS_REMAINING when the amount is larger than the
    /// remaining credit. Emits `Applied` when the memo is exhausted,
    /// `PartiallyApplied` otherwise.
    pub fn apply_to_receivable(
        &mut self,
        receivable_id: ReceivableId,
        amount: Money,
        remark: impl Into<String>,
    ) -> DomainResult<CreditMemoEvent> {
        if !self.status.can_apply() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot apply credit memo in {:?} status", self.status),
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
                    "application amount {} exceeds remaining credit {}",
                    amount, self.remaining
                ),
            ));
        }

        self.applications.push(CreditMemoApplication {
            id: AggregateId::new(),
            memo_id: self.id,
            receivable_id,
            amount,
            applied_at: Utc::now(),
            remark: remark.into(),
        });

        self.applied += amount;
        self.remaining = self.total - self.applied;

        let event = if self.remaining.is_zero() {
            let now = Utc::now();
            self.status = CreditMemoStatus::Applied;
            self.applied_at = Some(now);
            CreditMemoEvent::Applied(CreditMemoApplied {
                tenant_id: self.tenant_id,
                memo_id: self.id,
                number: self.number.clone(),
                total: self.total,
                occurred_at: now,
            })
        } else {
            self.status = CreditMemoStatus::Partial;
            CreditMemoEvent::PartiallyApplied(CreditMemoPartiallyApplied {
                tenant_id: self.tenant_id,
                memo_id: self.id,
                number: self.number.clone(),
                amount,
                applied: self.applied,
                remaining: self.remaining,
                receivable_id,
                occurred_at: Utc::now(),
            })
        };

        self.touch();
        Ok(event)
    }

    /// Void the credit memo. Only allowed before any application.
    pub fn void(&mut self, reason: impl Into<String>) -> DomainResult<CreditMemoEvent> {
        if self.status.is_terminal() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot void credit memo in {:?} status", self.status),
            ));
        }
        if self.applied.is_positive() {
            return Err(DomainError::state(
                ErrorCode::HasApplications,
                "cannot void credit memo with existing applications",
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
        self.status = CreditMemoStatus::Voided;
        self.voided_at = Some(now);
        self.void_reason = Some(reason.clone());
        self.remaining = Money::ZERO;
        self.touch();

        Ok(CreditMemoEvent::Voided(CreditMemoVoided {
            tenant_id: self.tenant_id,
            memo_id: self.id,
            number: self.number.clone(),
            reason,
            occurred_at: now,
        }))
    }

    /// Refund the remaining credit to the customer instead of applying it.
    /// The full total is then considered handled.
    pub fn refund(&mut self, method: impl Into<String>) -> DomainResult<CreditMemoEvent> {
        if !self.status.can_apply() {
            return Err(DomainError::state(
                ErrorCode::InvalidState,
                format!("cannot refund credit memo in {:?} status", self.status),
            ));
        }
        if !self.remaining.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::NoRemaining,
                "no remaining credit to refund",
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
        self.status = CreditMemoStatus::Refunded;
        self.refunded_at = Some(now);
        self.refund_method = Some(method.clone());
        self.applied = self.total;
        self.remaining = Money::ZERO;
        self.touch();

        Ok(CreditMemoEvent::Refunded(CreditMemoRefunded {
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

    pub fn id_typed(&self) -> CreditMemoId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn sales_return_id(&self) -> AggregateId {
        self.sales_return_id
    }

    pub fn sales_order_id(&self) -> AggregateId {
        self.sales_order_id
    }

    pub fn customer_id(&self) -> PartyId {
        self.customer_id
    }

    pub fn customer_name(&self) -> &str {
        &self.customer_name
    }

    pub fn original_receivable_id(&self) -> Option<ReceivableId> {
        self.original_receivable_id
    }

    pub fn items(&self) -> &[CreditMemoItem] {
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

    pub fn status(&self) -> CreditMemoStatus {
        self.status
    }

    pub fn applications(&self) -> &[CreditMemoApplication] {
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

    /// Percentage of the total that has been applied (0-100, two decimals).
    pub fn applied_percentage(&self) -> Decimal {
        if self.total.is_zero() {
            return Decimal::from(100);
        }
        (self.applied.amount() / self.total.amount() * Decimal::from(100)).round_dp(2)
    }
}

impl AggregateRoot for CreditMemo {
    type Id = CreditMemoId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Persisted snapshot of a credit memo; the repository hydration seam.
/// Taken verbatim on rehydration, audited for drift by the trial balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoState {
    pub id: CreditMemoId,
    pub tenant_id: TenantId,
    pub number: String,
    pub sales_return_id: AggregateId,
    pub sales_return_number: String,
    pub sales_order_id: AggregateId,
    pub sales_order_number: String,
    pub customer_id: PartyId,
    pub customer_name: String,
    pub original_receivable_id: Option<ReceivableId>,
    pub items: Vec<CreditMemoItem>,
    pub total: Money,
    pub applied: Money,
    pub remaining: Money,
    pub status: CreditMemoStatus,
    pub applications: Vec<CreditMemoApplication>,
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

impl CreditMemo {
    /// Rebuild the aggregate from persisted state.
    pub fn rehydrate(state: CreditMemoState) -> Self {
        Self {
            id: state.id,
            tenant_id: state.tenant_id,
            number: state.number,
            sales_return_id: state.sales_return_id,
            sales_return_number: state.sales_return_number,
            sales_order_id: state.sales_order_id,
            sales_order_number: state.sales_order_number,
            customer_id: state.customer_id,
            customer_name: state.customer_name,
            original_receivable_id: state.original_receivable_id,
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
    pub fn state(&self) -> CreditMemoState {
        CreditMemoState {
            id: self.id,
            tenant_id: self.tenant_id,
            number: self.number.clone(),
            sales_return_id: self.sales_return_id,
            sales_return_number: self.sales_return_number.clone(),
            sales_order_id: self.sales_order_id,
            sales_order_number: self.sales_order_number.clone(),
            customer_id: self.customer_id,
            customer_name: self.customer_name.clone(),
            original_receivable_id: self.original_receivable_id,
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
pub struct CreditMemoCreated {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub customer_id: PartyId,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoPartiallyApplied {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub amount: Money,
    pub applied: Money,
    pub remaining: Money,
    pub receivable_id: ReceivableId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoApplied {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoVoided {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditMemoRefunded {
    pub tenant_id: TenantId,
    pub memo_id: CreditMemoId,
    pub number: String,
    pub refund_amount: Money,
    pub method: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditMemoEvent {
    Created(CreditMemoCreated),
    PartiallyApplied(CreditMemoPartiallyApplied),
    Applied(CreditMemoApplied),
    Voided(CreditMemoVoided),
    Refunded(CreditMemoRefunded),
}

impl Event for CreditMemoEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CreditMemoEvent::Created(_) => "finance.credit_memo.created",
            CreditMemoEvent::PartiallyApplied(_) => "finance.credit_memo.partially_applied",
            CreditMemoEvent::Applied(_) => "finance.credit_memo.applied",
            CreditMemoEvent::Voided(_) => "finance.credit_memo.voided",
            CreditMemoEvent::Refunded(_) => "finance.credit_memo.refunded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CreditMemoEvent::Created(e) => e.occurred_at,
            CreditMemoEvent::PartiallyApplied(e) => e.occurred_at,
            CreditMemoEvent::Applied(e) => e.occurred_at,
            CreditMemoEvent::Voided(e) => e.occurred_at,
            CreditMemoEvent::Refunded(e) => e.occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_cmd(total: Money) -> OpenCreditMemo {
        OpenCreditMemo {
            tenant_id: TenantId::new(),
            memo_id: CreditMemoId::new(AggregateId::new()),
            number: "CM-2026-00001".to_string(),
            sales_return_id: AggregateId::new(),
            sales_return_number: "SR-2026-00003".to_string(),
            sales_order_id: AggregateId::new(),
            sales_order_number: "SO-2026-00042".to_string(),
            customer_id: PartyId::new(),
            customer_name: "Acme Retail".to_string(),
            total,
            reason: "damaged goods".to_string(),
        }
    }

    fn opened(total: Money) -> CreditMemo {
        CreditMemo::open(open_cmd(total)).unwrap().0
    }

    fn receivable_id() -> ReceivableId {
        ReceivableId::new(AggregateId::new())
    }

    #[test]
    fn open_starts_pending_with_full_remaining() {
        let (cm, event) = CreditMemo::open(open_cmd(Money::new(dec!(300)))).unwrap();
        assert_eq!(cm.status(), CreditMemoStatus::Pending);
        assert_eq!(cm.remaining(), Money::new(dec!(300)));
        assert_eq!(cm.applied(), Money::ZERO);
        assert!(matches!(event, CreditMemoEvent::Created(_)));
    }

    #[test]
    fn partial_application_keeps_invariant() {
        let mut cm = opened(Money::new(dec!(300)));
        let event = cm
            .apply_to_receivable(receivable_id(), Money::new(dec!(100)), "")
            .unwrap();

        assert_eq!(cm.status(), CreditMemoStatus::Partial);
        assert_eq!(cm.applied() + cm.remaining(), cm.total());
        assert_eq!(cm.application_count(), 1);
        assert!(matches!(event, CreditMemoEvent::PartiallyApplied(_)));
    }

    #[test]
    fn full_application_is_terminal() {
        let mut cm = opened(Money::new(dec!(300)));
        cm.apply_to_receivable(receivable_id(), Money::new(dec!(300)), "")
            .unwrap();
        assert_eq!(cm.status(), CreditMemoStatus::Applied);

        let err = cm
            .apply_to_receivable(receivable_id(), Money::new(dec!(1)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn application_beyond_remaining_is_rejected() {
        let mut cm = opened(Money::new(dec!(100)));
        let err = cm
            .apply_to_receivable(receivable_id(), Money::new(dec!(100.50)), "")
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ExceedsRemaining);
        assert_eq!(cm.applied(), Money::ZERO);
    }

    #[test]
    fn void_only_before_applications() {
        let mut cm = opened(Money::new(dec!(100)));
        cm.apply_to_receivable(receivable_id(), Money::new(dec!(10)), "")
            .unwrap();
        assert_eq!(
            cm.void("created in error").unwrap_err().code(),
            ErrorCode::HasApplications
        );

        let mut fresh = opened(Money::new(dec!(100)));
        fresh.void("created in error").unwrap();
        assert_eq!(fresh.status(), CreditMemoStatus::Voided);
        assert!(fresh.remaining().is_zero());
    }

    #[test]
    fn refund_consumes_the_remaining_credit() {
        let mut cm = opened(Money::new(dec!(250)));
        cm.apply_to_receivable(receivable_id(), Money::new(dec!(50)), "")
            .unwrap();

        let event = cm.refund("bank_transfer").unwrap();
        assert_eq!(cm.status(), CreditMemoStatus::Refunded);
        assert_eq!(cm.applied(), cm.total());
        assert!(cm.remaining().is_zero());
        match event {
            CreditMemoEvent::Refunded(e) => assert_eq!(e.refund_amount, Money::new(dec!(200))),
            other => panic!("expected Refunded event, got {other:?}"),
        }
    }

    #[test]
    fn refund_requires_remaining_and_method() {
        let mut cm = opened(Money::new(dec!(100)));
        assert_eq!(
            cm.refund("").unwrap_err().code(),
            ErrorCode::InvalidMethod
        );

        cm.apply_to_receivable(receivable_id(), Money::new(dec!(100)), "")
            .unwrap();
        // Fully applied memos are terminal.
        assert_eq!(
            cm.refund("cash").unwrap_err().code(),
            ErrorCode::InvalidState
        );
    }

    #[test]
    fn add_item_computes_amount() {
        let mut cm = opened(Money::new(dec!(100)));
        let item = cm
            .add_item(
                AggregateId::new(),
                AggregateId::new(),
                "Widget",
                "W-100",
                "pcs",
                dec!(3),
                Money::new(dec!(12.50)),
                "scratched",
            )
            .unwrap();
        assert_eq!(item.amount, Money::new(dec!(37.50)));
        assert_eq!(cm.item_count(), 1);
    }
}
