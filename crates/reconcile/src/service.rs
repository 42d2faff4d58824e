//! Reconciliation orchestrator.
//!
//! Coordinates the allocation of receipt/payment vouchers to
//! receivables/payables through an [`AllocationStrategy`]:
//!
//! 1. the voucher must be confirmed and hold unallocated cash,
//! 2. eligible targets are filtered (same counterparty, payable status,
//!    positive outstanding),
//! 3. the strategy computes a plan,
//! 4. the plan is applied to the voucher and each target, in plan order,
//!    moving both sides by exactly the same amount per step.
//!
//! A mid-loop failure aborts with a wrapped error naming the offending
//! target. Earlier steps are NOT compensated: the voucher and targets
//! mutate in process, and the caller's transaction boundary must discard
//! the whole in-memory mutation set on error.

use tracing::{debug, info};

use finflow_core::{DomainError, DomainResult, ErrorCode, Money};
use finflow_obligations::{
    Payable, PayableEvent, PayableId, Receivable, ReceivableEvent, ReceivableId,
};
use finflow_vouchers::{
    PayableAllocation, PaymentVoucher, PaymentVoucherEvent, ReceiptVoucher, ReceiptVoucherEvent,
    ReceivableAllocation,
};

use crate::strategy::{AllocationPlan, AllocationStrategy, AllocationTarget, ManualAllocation};

/// Outcome of reconciling a receipt voucher against receivables.
///
/// Carries the applied allocation records plus every domain event the
/// mutations produced (explicit outbox); the caller persists the
/// aggregates and dispatches the events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptReconciliation {
    pub allocations: Vec<ReceivableAllocation>,
    pub total_allocated: Money,
    pub remaining_unallocated: Money,
    pub fully_reconciled: bool,
    pub fully_paid: Vec<ReceivableId>,
    pub partially_paid: Vec<ReceivableId>,
    pub voucher_events: Vec<ReceiptVoucherEvent>,
    pub receivable_events: Vec<ReceivableEvent>,
}

/// Outcome of reconciling a payment voucher against payables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReconciliation {
    pub allocations: Vec<PayableAllocation>,
    pub total_allocated: Money,
    pub remaining_unallocated: Money,
    pub fully_reconciled: bool,
    pub fully_paid: Vec<PayableId>,
    pub partially_paid: Vec<PayableId>,
    pub voucher_events: Vec<PaymentVoucherEvent>,
    pub payable_events: Vec<PayableEvent>,
}

/// Domain service coordinating voucher-to-obligation allocation.
#[derive(Debug, Clone)]
pub struct ReconciliationService {
    default_strategy: AllocationStrategy,
}

impl Default for ReconciliationService {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationService {
    pub fn new() -> Self {
        Self {
            default_strategy: AllocationStrategy::Fifo,
        }
    }

    /// Override the strategy used when callers do not pick one explicitly.
    pub fn with_default_strategy(default_strategy: AllocationStrategy) -> Self {
        Self { default_strategy }
    }

    pub fn default_strategy(&self) -> &AllocationStrategy {
        &self.default_strategy
    }

    /// Reconcile a receipt voucher to receivables using the given strategy.
    pub fn reconcile_receipt(
        &self,
        voucher: &mut ReceiptVoucher,
        receivables: &mut [Receivable],
        strategy: &AllocationStrategy,
    ) -> DomainResult<ReceiptReconciliation> {
        validate_receipt_voucher(voucher)?;
        strategy.ensure_valid()?;

        let targets = eligible_receivable_targets(voucher, receivables);
        if targets.is_empty() {
            return Ok(ReceiptReconciliation {
                allocations: Vec::new(),
                total_allocated: Money::ZERO,
                remaining_unallocated: voucher.unallocated(),
                fully_reconciled: false,
                fully_paid: Vec::new(),
                partially_paid: Vec::new(),
                voucher_events: Vec::new(),
                receivable_events: Vec::new(),
            });
        }

        let plan = strategy.allocate(voucher.unallocated(), &targets)?;
        debug!(
            voucher = voucher.number(),
            strategy = strategy.name(),
            steps = plan.allocations.len(),
            "computed receipt allocation plan"
        );

        let mut allocations = Vec::with_capacity(plan.allocations.len());
        let mut voucher_events = Vec::new();
        let mut receivable_events = Vec::new();

        for planned in &plan.allocations {
            let Some(receivable) = receivables
                .iter_mut()
                .find(|r| r.id_typed().0 == planned.target_id)
            else {
                continue;
            };
            let number = receivable.number().to_string();

            let (allocation, mut events) = voucher
                .allocate_to_receivable(
                    receivable.id_typed(),
                    number.clone(),
                    planned.amount,
                    format!("reconciled via {} strategy", strategy.name()),
                )
                .map_err(|e| DomainError::step(number.clone(), e))?;
            allocations.push(allocation);
            voucher_events.append(&mut events);

            let event = receivable
                .apply_payment(
                    planned.amount,
                    voucher.id_typed().0,
                    format!("payment from receipt voucher {}", voucher.number()),
                )
                .map_err(|e| DomainError::step(number, e))?;
            receivable_events.push(event);
        }

        info!(
            voucher = voucher.number(),
            strategy = strategy.name(),
            total = %plan.total_allocated,
            remaining = %plan.remaining,
            "reconciled receipt voucher"
        );

        Ok(ReceiptReconciliation {
            allocations,
            total_allocated: plan.total_allocated,
            remaining_unallocated: plan.remaining,
            fully_reconciled: plan.fully_reconciled,
            fully_paid: plan.fully_paid.into_iter().map(ReceivableId::new).collect(),
            partially_paid: plan
                .partially_paid
                .into_iter()
                .map(ReceivableId::new)
                .collect(),
            voucher_events,
            receivable_events,
        })
    }

    /// Reconcile a payment voucher to payables using the given strategy.
    pub fn reconcile_payment(
        &self,
        voucher: &mut PaymentVoucher,
        payables: &mut [Payable],
        strategy: &AllocationStrategy,
    ) -> DomainResult<PaymentReconciliation> {
        validate_payment_voucher(voucher)?;
        strategy.ensure_valid()?;

        let targets = eligible_payable_targets(voucher, payables);
        if targets.is_empty() {
            return Ok(PaymentReconciliation {
                allocations: Vec::new(),
                total_allocated: Money::ZERO,
                remaining_unallocated: voucher.unallocated(),
                fully_reconciled: false,
                fully_paid: Vec::new(),
                partially_paid: Vec::new(),
                voucher_events: Vec::new(),
                payable_events: Vec::new(),
            });
        }

        let plan = strategy.allocate(voucher.unallocated(), &targets)?;
        debug!(
            voucher = voucher.number(),
            strategy = strategy.name(),
            steps = plan.allocations.len(),
            "computed payment allocation plan"
        );

        let mut allocations = Vec::with_capacity(plan.allocations.len());
        let mut voucher_events = Vec::new();
        let mut payable_events = Vec::new();

        for planned in &plan.allocations {
            let Some(payable) = payables
                .iter_mut()
                .find(|p| p.id_typed().0 == planned.target_id)
            else {
                continue;
            };
            let number = payable.number().to_string();

            let (allocation, mut events) = voucher
                .allocate_to_payable(
                    payable.id_typed(),
                    number.clone(),
                    planned.amount,
                    format!("reconciled via {} strategy", strategy.name()),
                )
                .map_err(|e| DomainError::step(number.clone(), e))?;
            allocations.push(allocation);
            voucher_events.append(&mut events);

            let event = payable
                .apply_payment(
                    planned.amount,
                    voucher.id_typed().0,
                    format!("payment from payment voucher {}", voucher.number()),
                )
                .map_err(|e| DomainError::step(number, e))?;
            payable_events.push(event);
        }

        info!(
            voucher = voucher.number(),
            strategy = strategy.name(),
            total = %plan.total_allocated,
            remaining = %plan.remaining,
            "reconciled payment voucher"
        );

        Ok(PaymentReconciliation {
            allocations,
            total_allocated: plan.total_allocated,
            remaining_unallocated: plan.remaining,
            fully_reconciled: plan.fully_reconciled,
            fully_paid: plan.fully_paid.into_iter().map(PayableId::new).collect(),
            partially_paid: plan.partially_paid.into_iter().map(PayableId::new).collect(),
            voucher_events,
            payable_events,
        })
    }

    /// Compute the plan for a receipt voucher without applying it.
    pub fn preview_reconcile_receipt(
        &self,
        voucher: &ReceiptVoucher,
        receivables: &[Receivable],
        strategy: &AllocationStrategy,
    ) -> DomainResult<AllocationPlan> {
        if !voucher.unallocated().is_positive() {
            return Err(DomainError::validation(
                ErrorCode::NoUnallocated,
                "receipt voucher has no unallocated amount",
            ));
        }
        strategy.ensure_valid()?;

        let targets: Vec<AllocationTarget> = receivables
            .iter()
            .filter(|r| {
                r.customer_id() == voucher.customer_id()
                    && r.status().can_apply_payment()
                    && r.outstanding().is_positive()
            })
            .map(receivable_target)
            .collect();

        strategy.allocate(voucher.unallocated(), &targets)
    }

    /// Compute the plan for a payment voucher without applying it.
    pub fn preview_reconcile_payment(
        &self,
        voucher: &PaymentVoucher,
        payables: &[Payable],
        strategy: &AllocationStrategy,
    ) -> DomainResult<AllocationPlan> {
        if !voucher.unallocated().is_positive() {
            return Err(DomainError::validation(
                ErrorCode::NoUnallocated,
                "payment voucher has no unallocated amount",
            ));
        }
        strategy.ensure_valid()?;

        let targets: Vec<AllocationTarget> = payables
            .iter()
            .filter(|p| {
                p.supplier_id() == voucher.supplier_id()
                    && p.status().can_apply_payment()
                    && p.outstanding().is_positive()
            })
            .map(payable_target)
            .collect();

        strategy.allocate(voucher.unallocated(), &targets)
    }

    /// Reconcile a receipt voucher oldest-first (FIFO).
    pub fn auto_reconcile_receipt(
        &self,
        voucher: &mut ReceiptVoucher,
        receivables: &mut [Receivable],
    ) -> DomainResult<ReceiptReconciliation> {
        self.reconcile_receipt(voucher, receivables, &AllocationStrategy::Fifo)
    }

    /// Reconcile a receipt voucher with caller-chosen allocations.
    pub fn manual_reconcile_receipt(
        &self,
        voucher: &mut ReceiptVoucher,
        receivables: &mut [Receivable],
        requests: Vec<ManualAllocation>,
    ) -> DomainResult<ReceiptReconciliation> {
        self.reconcile_receipt(voucher, receivables, &AllocationStrategy::manual(requests))
    }

    /// Reconcile a payment voucher oldest-first (FIFO).
    pub fn auto_reconcile_payment(
        &self,
        voucher: &mut PaymentVoucher,
        payables: &mut [Payable],
    ) -> DomainResult<PaymentReconciliation> {
        self.reconcile_payment(voucher, payables, &AllocationStrategy::Fifo)
    }

    /// Reconcile a payment voucher with caller-chosen allocations.
    pub fn manual_reconcile_payment(
        &self,
        voucher: &mut PaymentVoucher,
        payables: &mut [Payable],
        requests: Vec<ManualAllocation>,
    ) -> DomainResult<PaymentReconciliation> {
        self.reconcile_payment(voucher, payables, &AllocationStrategy::manual(requests))
    }
}

fn validate_receipt_voucher(voucher: &ReceiptVoucher) -> DomainResult<()> {
    if !voucher.status().can_allocate() {
        return Err(DomainError::state(
            ErrorCode::InvalidState,
            format!(
                "cannot allocate voucher in {:?} status, must be confirmed",
                voucher.status()
            ),
        ));
    }
    if !voucher.unallocated().is_positive() {
        return Err(DomainError::validation(
            ErrorCode::NoUnallocated,
            "receipt voucher has no unallocated amount",
        ));
    }
    Ok(())
}

fn validate_payment_voucher(voucher: &PaymentVoucher) -> DomainResult<()> {
    if !voucher.status().can_allocate() {
        return Err(DomainError::state(
            ErrorCode::InvalidState,
            format!(
                "cannot allocate voucher in {:?} status, must be confirmed",
                voucher.status()
            ),
        ));
    }
    if !voucher.unallocated().is_positive() {
        return Err(DomainError::validation(
            ErrorCode::NoUnallocated,
            "payment voucher has no unallocated amount",
        ));
    }
    Ok(())
}

fn receivable_target(r: &Receivable) -> AllocationTarget {
    AllocationTarget {
        id: r.id_typed().0,
        number: r.number().to_string(),
        outstanding: r.outstanding(),
        due_date: r.due_date(),
        created_at: r.created_at(),
    }
}

fn payable_target(p: &Payable) -> AllocationTarget {
    AllocationTarget {
        id: p.id_typed().0,
        number: p.number().to_string(),
        outstanding: p.outstanding(),
        due_date: p.due_date(),
        created_at: p.created_at(),
    }
}

/// Obligations of a different counterparty, in a non-payable status or
/// without outstanding amount are silently excluded.
fn eligible_receivable_targets(
    voucher: &ReceiptVoucher,
    receivables: &[Receivable],
) -> Vec<AllocationTarget> {
    receivables
        .iter()
        .filter(|r| {
            r.customer_id() == voucher.customer_id()
                && r.status().can_apply_payment()
                && r.outstanding().is_positive()
        })
        .map(receivable_target)
        .collect()
}

fn eligible_payable_targets(voucher: &PaymentVoucher, payables: &[Payable]) -> Vec<AllocationTarget> {
    payables
        .iter()
        .filter(|p| {
            p.supplier_id() == voucher.supplier_id()
                && p.status().can_apply_payment()
                && p.outstanding().is_positive()
        })
        .map(payable_target)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use finflow_core::{AggregateId, PartyId, TenantId, UserId};
    use finflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use finflow_obligations::{
        IssuePayable, IssueReceivable, PayableSource, PayableStatus, ReceivableSource,
        ReceivableStatus,
    };
    use finflow_vouchers::{OpenPaymentVoucher, OpenReceiptVoucher, PaymentMethod, VoucherStatus};
    use finflow_vouchers::{PaymentVoucherId, ReceiptVoucherId};

    fn receivable(
        tenant: TenantId,
        customer: PartyId,
        number: &str,
        total: Money,
        due_in_days: i64,
    ) -> Receivable {
        Receivable::issue(IssueReceivable {
            tenant_id: tenant,
            receivable_id: ReceivableId::new(AggregateId::new()),
            number: number.to_string(),
            customer_id: customer,
            customer_name: "Acme Retail".to_string(),
            source: ReceivableSource::SalesOrder,
            source_id: AggregateId::new(),
            source_number: "SO-001".to_string(),
            total,
            due_date: Some(Utc::now() + Duration::days(due_in_days)),
        })
        .unwrap()
        .0
    }

    fn payable(
        tenant: TenantId,
        supplier: PartyId,
        number: &str,
        total: Money,
        due_in_days: i64,
    ) -> Payable {
        Payable::issue(IssuePayable {
            tenant_id: tenant,
            payable_id: PayableId::new(AggregateId::new()),
            number: number.to_string(),
            supplier_id: supplier,
            supplier_name: "Northwind Supply".to_string(),
            source: PayableSource::PurchaseOrder,
            source_id: AggregateId::new(),
            source_number: "PO-001".to_string(),
            total,
            due_date: Some(Utc::now() + Duration::days(due_in_days)),
        })
        .unwrap()
        .0
    }

    fn receipt_voucher(tenant: TenantId, customer: PartyId, amount: Money) -> ReceiptVoucher {
        let (mut rv, _) = ReceiptVoucher::open(OpenReceiptVoucher {
            tenant_id: tenant,
            voucher_id: ReceiptVoucherId::new(AggregateId::new()),
            number: "RV-001".to_string(),
            customer_id: customer,
            customer_name: "Acme Retail".to_string(),
            amount,
            method: PaymentMethod::BankTransfer,
            received_at: Utc::now(),
        })
        .unwrap();
        rv.confirm(UserId::new()).unwrap();
        rv
    }

    fn payment_voucher(tenant: TenantId, supplier: PartyId, amount: Money) -> PaymentVoucher {
        let (mut pv, _) = PaymentVoucher::open(OpenPaymentVoucher {
            tenant_id: tenant,
            voucher_id: PaymentVoucherId::new(AggregateId::new()),
            number: "PV-001".to_string(),
            supplier_id: supplier,
            supplier_name: "Northwind Supply".to_string(),
            amount,
            method: PaymentMethod::BankTransfer,
            paid_at: Utc::now(),
        })
        .unwrap();
        pv.confirm(UserId::new()).unwrap();
        pv
    }

    #[test]
    fn fifo_settles_receivables_oldest_first_and_exhausts_voucher() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(2500)));
        let mut receivables = vec![
            receivable(tenant, customer, "AR-002", Money::new(dec!(1200)), 14),
            receivable(tenant, customer, "AR-001", Money::new(dec!(1000)), 7),
            receivable(tenant, customer, "AR-003", Money::new(dec!(800)), 21),
        ];

        let outcome = service
            .auto_reconcile_receipt(&mut voucher, &mut receivables)
            .unwrap();

        let numbers: Vec<&str> = outcome
            .allocations
            .iter()
            .map(|a| a.receivable_number.as_str())
            .collect();
        assert_eq!(numbers, ["AR-001", "AR-002", "AR-003"]);
        assert_eq!(outcome.allocations[2].amount, Money::new(dec!(300)));
        assert!(outcome.fully_reconciled);
        assert_eq!(outcome.remaining_unallocated, Money::ZERO);

        // Voucher side: fully allocated, terminal status, invariant holds.
        assert_eq!(voucher.status(), VoucherStatus::Allocated);
        assert_eq!(voucher.allocated() + voucher.unallocated(), voucher.amount());

        // Obligation side: two settled in full, the third partially (300/800).
        let ar3 = receivables.iter().find(|r| r.number() == "AR-003").unwrap();
        assert_eq!(ar3.status(), ReceivableStatus::Partial);
        assert_eq!(ar3.paid(), Money::new(dec!(300)));
        assert_eq!(ar3.outstanding(), Money::new(dec!(500)));
        for r in &receivables {
            assert_eq!(r.paid() + r.outstanding(), r.total());
        }

        // Outbox: one Allocated per step plus the FullyAllocated transition,
        // Paid/PartiallyPaid per target.
        assert_eq!(outcome.voucher_events.len(), 4);
        assert!(matches!(
            outcome.voucher_events.last(),
            Some(ReceiptVoucherEvent::FullyAllocated(_))
        ));
        assert_eq!(outcome.receivable_events.len(), 3);
        assert_eq!(outcome.fully_paid.len(), 2);
        assert_eq!(outcome.partially_paid.len(), 1);
    }

    #[test]
    fn manual_reconcile_follows_request_order() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(1500)));
        let mut receivables = vec![
            receivable(tenant, customer, "AR-001", Money::new(dec!(1000)), 7),
            receivable(tenant, customer, "AR-002", Money::new(dec!(1000)), 14),
        ];
        let requests = vec![
            ManualAllocation {
                target_id: receivables[1].id_typed().0,
                amount: Money::new(dec!(800)),
            },
            ManualAllocation {
                target_id: receivables[0].id_typed().0,
                amount: Money::new(dec!(700)),
            },
        ];

        let outcome = service
            .manual_reconcile_receipt(&mut voucher, &mut receivables, requests)
            .unwrap();

        let numbers: Vec<&str> = outcome
            .allocations
            .iter()
            .map(|a| a.receivable_number.as_str())
            .collect();
        assert_eq!(numbers, ["AR-002", "AR-001"]);
        assert!(outcome.fully_reconciled);
        assert_eq!(voucher.status(), VoucherStatus::Allocated);
    }

    #[test]
    fn over_request_leaves_payment_voucher_confirmed() {
        let tenant = TenantId::new();
        let supplier = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = payment_voucher(tenant, supplier, Money::new(dec!(2000)));
        let mut payables = vec![payable(tenant, supplier, "AP-001", Money::new(dec!(1000)), 7)];

        let outcome = service
            .auto_reconcile_payment(&mut voucher, &mut payables)
            .unwrap();

        assert_eq!(outcome.total_allocated, Money::new(dec!(1000)));
        assert_eq!(outcome.remaining_unallocated, Money::new(dec!(1000)));
        assert!(!outcome.fully_reconciled);
        assert_eq!(voucher.status(), VoucherStatus::Confirmed);
        assert_eq!(payables[0].status(), PayableStatus::Paid);
    }

    #[test]
    fn other_counterparties_are_silently_excluded() {
        let tenant = TenantId::new();
        let customer_a = PartyId::new();
        let customer_b = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer_a, Money::new(dec!(500)));
        let mut receivables = vec![receivable(
            tenant,
            customer_b,
            "AR-OTHER",
            Money::new(dec!(500)),
            7,
        )];

        let outcome = service
            .auto_reconcile_receipt(&mut voucher, &mut receivables)
            .unwrap();

        assert!(outcome.allocations.is_empty());
        assert!(!outcome.fully_reconciled);
        assert_eq!(outcome.remaining_unallocated, Money::new(dec!(500)));
        assert_eq!(receivables[0].paid(), Money::ZERO);
        assert_eq!(voucher.allocated(), Money::ZERO);
    }

    #[test]
    fn draft_voucher_is_rejected() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let (mut draft, _) = ReceiptVoucher::open(OpenReceiptVoucher {
            tenant_id: tenant,
            voucher_id: ReceiptVoucherId::new(AggregateId::new()),
            number: "RV-DRAFT".to_string(),
            customer_id: customer,
            customer_name: "Acme Retail".to_string(),
            amount: Money::new(dec!(100)),
            method: PaymentMethod::Cash,
            received_at: Utc::now(),
        })
        .unwrap();
        let mut receivables = vec![receivable(tenant, customer, "AR-001", Money::new(dec!(100)), 7)];

        let err = service
            .auto_reconcile_receipt(&mut draft, &mut receivables)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidState);
    }

    #[test]
    fn exhausted_voucher_is_rejected() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(100)));
        let mut receivables = vec![receivable(tenant, customer, "AR-001", Money::new(dec!(100)), 7)];
        service
            .auto_reconcile_receipt(&mut voucher, &mut receivables)
            .unwrap();

        let mut more = vec![receivable(tenant, customer, "AR-002", Money::new(dec!(50)), 7)];
        let err = service
            .auto_reconcile_receipt(&mut voucher, &mut more)
            .unwrap_err();
        // Fully allocated vouchers fail the status check first.
        assert_eq!(err.code(), ErrorCode::InvalidState);

        // Previews skip the status check and report the empty pool instead.
        let err = service
            .preview_reconcile_receipt(&voucher, &more, &AllocationStrategy::Fifo)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoUnallocated);
    }

    #[test]
    fn manual_without_requests_is_invalid_allocations() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(100)));
        let mut receivables = vec![receivable(tenant, customer, "AR-001", Money::new(dec!(100)), 7)];

        let err = service
            .manual_reconcile_receipt(&mut voucher, &mut receivables, Vec::new())
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAllocations);
    }

    #[test]
    fn preview_computes_the_plan_without_mutating() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let voucher = receipt_voucher(tenant, customer, Money::new(dec!(1500)));
        let receivables = vec![
            receivable(tenant, customer, "AR-001", Money::new(dec!(1000)), 7),
            receivable(tenant, customer, "AR-002", Money::new(dec!(1000)), 14),
        ];
        let voucher_before = voucher.clone();
        let receivables_before = receivables.clone();

        let plan = service
            .preview_reconcile_receipt(&voucher, &receivables, &AllocationStrategy::Fifo)
            .unwrap();

        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.total_allocated, Money::new(dec!(1500)));
        assert_eq!(voucher, voucher_before);
        assert_eq!(receivables, receivables_before);
    }

    #[test]
    fn step_failure_names_the_offending_target() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(1000)));
        let mut receivables = vec![receivable(tenant, customer, "AR-001", Money::new(dec!(600)), 7)];

        // Pre-existing allocation to the same receivable forces the voucher
        // step to fail mid-application.
        voucher
            .allocate_to_receivable(
                receivables[0].id_typed(),
                "AR-001",
                Money::new(dec!(100)),
                "earlier manual allocation",
            )
            .unwrap();

        let err = service
            .auto_reconcile_receipt(&mut voucher, &mut receivables)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyAllocated);
        assert!(err.to_string().contains("AR-001"));
    }

    #[test]
    fn outbox_events_flow_through_the_bus() {
        let tenant = TenantId::new();
        let customer = PartyId::new();
        let service = ReconciliationService::new();

        let mut voucher = receipt_voucher(tenant, customer, Money::new(dec!(1000)));
        let mut receivables = vec![
            receivable(tenant, customer, "AR-001", Money::new(dec!(600)), 7),
            receivable(tenant, customer, "AR-002", Money::new(dec!(900)), 14),
        ];

        let outcome = service
            .auto_reconcile_receipt(&mut voucher, &mut receivables)
            .unwrap();

        let bus: InMemoryEventBus<EventEnvelope<ReceivableEvent>> = InMemoryEventBus::new();
        let subscription = bus.subscribe();

        for (seq, event) in outcome.receivable_events.iter().enumerate() {
            bus.publish(EventEnvelope::new(
                uuid::Uuid::now_v7(),
                tenant,
                AggregateId::new(),
                "finance.receivable",
                seq as u64,
                event.clone(),
            ))
            .unwrap();
        }

        let mut received = 0;
        while subscription.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, outcome.receivable_events.len());
    }

    #[test]
    fn default_strategy_is_fifo() {
        let service = ReconciliationService::new();
        assert_eq!(service.default_strategy(), &AllocationStrategy::Fifo);

        let manual = ReconciliationService::with_default_strategy(AllocationStrategy::manual(
            vec![ManualAllocation {
                target_id: AggregateId::new(),
                amount: Money::ZERO,
            }],
        ));
        assert_eq!(manual.default_strategy().name(), "MANUAL");
    }
}
