//! Allocation strategies: pure functions from (amount, targets) to a plan.
//!
//! Strategies never mutate caller state. FIFO settles the oldest
//! obligations first (by due date, then creation time); Manual follows a
//! caller-supplied request order.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use finflow_core::{AggregateId, DomainError, DomainResult, ErrorCode, Money};

/// A read-only projection of an obligation, used as strategy input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationTarget {
    pub id: AggregateId,
    /// Business number, for display and error messages.
    pub number: String,
    pub outstanding: Money,
    /// Due date drives FIFO ordering; targets without one sort last.
    pub due_date: Option<DateTime<Utc>>,
    /// Fallback ordering for targets without a due date, and tie-breaker.
    pub created_at: DateTime<Utc>,
}

/// One entry of a manual allocation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualAllocation {
    pub target_id: AggregateId,
    /// Zero means "allocate as much as cash and outstanding allow".
    pub amount: Money,
}

/// One entry of a computed allocation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAllocation {
    pub target_id: AggregateId,
    pub target_number: String,
    pub amount: Money,
}

/// Complete output of a strategy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPlan {
    /// Ordered allocations to make.
    pub allocations: Vec<PlannedAllocation>,
    pub total_allocated: Money,
    /// Amount left unallocated after the plan.
    pub remaining: Money,
    /// True if the whole input amount was allocated.
    pub fully_reconciled: bool,
    /// Targets that the plan satisfies in full.
    pub fully_paid: Vec<AggregateId>,
    /// Targets that the plan satisfies only partially.
    pub partially_paid: Vec<AggregateId>,
}

impl AllocationPlan {
    /// Plan that allocates nothing (e.g. no eligible targets).
    fn unallocated(amount: Money) -> Self {
        Self {
            allocations: Vec::new(),
            total_allocated: Money::ZERO,
            remaining: amount,
            fully_reconciled: false,
            fully_paid: Vec::new(),
            partially_paid: Vec::new(),
        }
    }
}

/// Closed set of reconciliation strategies.
///
/// Dispatch is a match on the variant; the algorithm stays swappable
/// without open-ended dynamic dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStrategy {
    /// Oldest obligation first, by due date then creation time.
    Fifo,
    /// Caller-supplied `(target, amount)` pairs, processed in order.
    Manual(Vec<ManualAllocation>),
}

impl AllocationStrategy {
    pub fn manual(requests: Vec<ManualAllocation>) -> Self {
        Self::Manual(requests)
    }

    /// Strategy name for remarks and logs.
    pub fn name(&self) -> &'static str {
        match self {
            AllocationStrategy::Fifo => "FIFO",
            AllocationStrategy::Manual(_) => "MANUAL",
        }
    }

    /// Manual requires at least one allocation request.
    pub fn ensure_valid(&self) -> DomainResult<()> {
        match self {
            AllocationStrategy::Manual(requests) if requests.is_empty() => {
                Err(DomainError::validation(
                    ErrorCode::InvalidAllocations,
                    "manual strategy requires allocation requests",
                ))
            }
            _ => Ok(()),
        }
    }

    /// Compute how to distribute `amount` across `targets`.
    ///
    /// `amount` must be positive. An empty target list yields an empty plan
    /// with everything remaining, not an error. Targets with non-positive
    /// outstanding are skipped. Inputs are never mutated.
    pub fn allocate(
        &self,
        amount: Money,
        targets: &[AllocationTarget],
    ) -> DomainResult<AllocationPlan> {
        if !amount.is_positive() {
            return Err(DomainError::validation(
                ErrorCode::InvalidAmount,
                "allocation amount must be positive",
            ));
        }
        self.ensure_valid()?;

        if targets.is_empty() {
            return Ok(AllocationPlan::unallocated(amount));
        }

        match self {
            AllocationStrategy::Fifo => Ok(allocate_fifo(amount, targets)),
            AllocationStrategy::Manual(requests) => Ok(allocate_manual(amount, targets, requests)),
        }
    }
}

/// FIFO order: due-bearing targets first, ascending by due date; equal due
/// dates and the no-due-date group fall back to creation time.
fn fifo_order(a: &AllocationTarget, b: &AllocationTarget) -> Ordering {
    match (a.due_date, b.due_date) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.created_at.cmp(&b.created_at)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.created_at.cmp(&b.created_at),
    }
}

fn allocate_fifo(amount: Money, targets: &[AllocationTarget]) -> AllocationPlan {
    let mut sorted: Vec<&AllocationTarget> = targets.iter().collect();
    sorted.sort_by(|a, b| fifo_order(a, b));

    let mut plan = AllocationPlan::unallocated(amount);
    let mut remaining = amount;

    for target in sorted {
        if remaining.is_zero() {
            break;
        }
        if !target.outstanding.is_positive() {
            continue;
        }

        let alloc = remaining.min(target.outstanding);

        plan.allocations.push(PlannedAllocation {
            target_id: target.id,
            target_number: target.number.clone(),
            amount: alloc,
        });
        plan.total_allocated += alloc;
        remaining -= alloc;

        if alloc >= target.outstanding {
            plan.fully_paid.push(target.id);
        } else {
            plan.partially_paid.push(target.id);
        }
    }

    plan.remaining = remaining;
    plan.fully_reconciled = remaining.is_zero();
    plan
}

fn allocate_manual(
    amount: Money,
    targets: &[AllocationTarget],
    requests: &[ManualAllocation],
) -> AllocationPlan {
    // Working copies track per-target consumption across the request
    // sequence, so two requests against the same target cannot
    // double-allocate from the same pool.
    let mut working: HashMap<AggregateId, (String, Money)> = targets
        .iter()
        .map(|t| (t.id, (t.number.clone(), t.outstanding)))
        .collect();

    let mut plan = AllocationPlan::unallocated(amount);
    let mut remaining = amount;

    for request in requests {
        if remaining.is_zero() {
            break;
        }

        // Unknown targets are skipped, not an error.
        let Some((number, outstanding)) = working.get_mut(&request.target_id) else {
            continue;
        };
        if !outstanding.is_positive() {
            continue;
        }

        let alloc = if request.amount.is_zero() {
            remaining.min(*outstanding)
        } else {
            request.amount.min(remaining).min(*outstanding)
        };
        if !alloc.is_positive() {
            continue;
        }

        plan.allocations.push(PlannedAllocation {
            target_id: request.target_id,
            target_number: number.clone(),
            amount: alloc,
        });
        plan.total_allocated += alloc;
        remaining -= alloc;

        if alloc >= *outstanding {
            plan.fully_paid.push(request.target_id);
        } else {
            plan.partially_paid.push(request.target_id);
        }

        *outstanding -= alloc;
    }

    plan.remaining = remaining;
    plan.fully_reconciled = remaining.is_zero();
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn target(
        number: &str,
        outstanding: Money,
        due_in_days: Option<i64>,
        created_days_ago: i64,
    ) -> AllocationTarget {
        let now = Utc::now();
        AllocationTarget {
            id: AggregateId::new(),
            number: number.to_string(),
            outstanding,
            due_date: due_in_days.map(|d| now + Duration::days(d)),
            created_at: now - Duration::days(created_days_ago),
        }
    }

    #[test]
    fn fifo_settles_oldest_due_date_first() {
        // Given out of order on purpose.
        let targets = vec![
            target("AR-002", Money::new(dec!(1200)), Some(14), 3),
            target("AR-003", Money::new(dec!(800)), Some(21), 2),
            target("AR-001", Money::new(dec!(1000)), Some(7), 1),
        ];

        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(2500)), &targets)
            .unwrap();

        let numbers: Vec<&str> = plan
            .allocations
            .iter()
            .map(|a| a.target_number.as_str())
            .collect();
        assert_eq!(numbers, ["AR-001", "AR-002", "AR-003"]);
        assert_eq!(plan.allocations[0].amount, Money::new(dec!(1000)));
        assert_eq!(plan.allocations[1].amount, Money::new(dec!(1200)));
        assert_eq!(plan.allocations[2].amount, Money::new(dec!(300)));
        assert!(plan.fully_reconciled);
        assert_eq!(plan.remaining, Money::ZERO);
        assert_eq!(plan.fully_paid.len(), 2);
        assert_eq!(plan.partially_paid.len(), 1);
    }

    #[test]
    fn fifo_targets_with_due_date_precede_undated_ones() {
        // The undated target is far older but still sorts after any dated one.
        let undated = target("AR-OLD", Money::new(dec!(100)), None, 400);
        let dated = target("AR-NEW", Money::new(dec!(100)), Some(30), 1);

        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(100)), &[undated, dated])
            .unwrap();

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].target_number, "AR-NEW");
    }

    #[test]
    fn fifo_undated_targets_order_by_creation_time() {
        let older = target("AR-A", Money::new(dec!(50)), None, 10);
        let newer = target("AR-B", Money::new(dec!(50)), None, 1);

        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(60)), &[newer, older])
            .unwrap();

        let numbers: Vec<&str> = plan
            .allocations
            .iter()
            .map(|a| a.target_number.as_str())
            .collect();
        assert_eq!(numbers, ["AR-A", "AR-B"]);
    }

    #[test]
    fn fifo_equal_due_dates_tie_break_on_creation_time() {
        let now = Utc::now();
        let due = now + Duration::days(7);
        let mut first = target("AR-FIRST", Money::new(dec!(40)), None, 9);
        first.due_date = Some(due);
        let mut second = target("AR-SECOND", Money::new(dec!(40)), None, 2);
        second.due_date = Some(due);

        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(50)), &[second, first])
            .unwrap();

        assert_eq!(plan.allocations[0].target_number, "AR-FIRST");
        assert_eq!(plan.allocations[1].target_number, "AR-SECOND");
    }

    #[test]
    fn fifo_skips_exhausted_targets() {
        let targets = vec![
            target("AR-ZERO", Money::ZERO, Some(1), 1),
            target("AR-LIVE", Money::new(dec!(100)), Some(2), 1),
        ];
        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(50)), &targets)
            .unwrap();
        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].target_number, "AR-LIVE");
    }

    #[test]
    fn empty_targets_yield_empty_plan_not_error() {
        let plan = AllocationStrategy::Fifo
            .allocate(Money::new(dec!(100)), &[])
            .unwrap();
        assert!(plan.allocations.is_empty());
        assert_eq!(plan.remaining, Money::new(dec!(100)));
        assert!(!plan.fully_reconciled);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let err = AllocationStrategy::Fifo
            .allocate(Money::ZERO, &[])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAmount);
    }

    #[test]
    fn manual_follows_request_order_ignoring_due_dates() {
        let t1 = target("AR-001", Money::new(dec!(1000)), Some(7), 2);
        let t2 = target("AR-002", Money::new(dec!(1000)), Some(14), 1);
        let requests = vec![
            ManualAllocation {
                target_id: t2.id,
                amount: Money::new(dec!(800)),
            },
            ManualAllocation {
                target_id: t1.id,
                amount: Money::new(dec!(700)),
            },
        ];

        let plan = AllocationStrategy::manual(requests)
            .allocate(Money::new(dec!(1500)), &[t1, t2])
            .unwrap();

        let numbers: Vec<&str> = plan
            .allocations
            .iter()
            .map(|a| a.target_number.as_str())
            .collect();
        assert_eq!(numbers, ["AR-002", "AR-001"]);
        assert_eq!(plan.allocations[0].amount, Money::new(dec!(800)));
        assert_eq!(plan.allocations[1].amount, Money::new(dec!(700)));
        assert!(plan.fully_reconciled);
    }

    #[test]
    fn manual_zero_amount_means_as_much_as_possible() {
        let t = target("AR-001", Money::new(dec!(600)), None, 1);
        let requests = vec![ManualAllocation {
            target_id: t.id,
            amount: Money::ZERO,
        }];

        let plan = AllocationStrategy::manual(requests)
            .allocate(Money::new(dec!(1000)), &[t])
            .unwrap();

        assert_eq!(plan.total_allocated, Money::new(dec!(600)));
        assert_eq!(plan.remaining, Money::new(dec!(400)));
        assert!(!plan.fully_reconciled);
    }

    #[test]
    fn manual_caps_at_requested_cash_and_outstanding() {
        let t = target("AR-001", Money::new(dec!(300)), None, 1);
        let requests = vec![ManualAllocation {
            target_id: t.id,
            amount: Money::new(dec!(500)),
        }];

        // Outstanding is the binding constraint here.
        let plan = AllocationStrategy::manual(requests.clone())
            .allocate(Money::new(dec!(1000)), &[t.clone()])
            .unwrap();
        assert_eq!(plan.total_allocated, Money::new(dec!(300)));

        // Remaining cash is the binding constraint here.
        let plan = AllocationStrategy::manual(requests)
            .allocate(Money::new(dec!(200)), &[t])
            .unwrap();
        assert_eq!(plan.total_allocated, Money::new(dec!(200)));
    }

    #[test]
    fn manual_skips_unknown_targets() {
        let t = target("AR-001", Money::new(dec!(100)), None, 1);
        let requests = vec![
            ManualAllocation {
                target_id: AggregateId::new(),
                amount: Money::new(dec!(50)),
            },
            ManualAllocation {
                target_id: t.id,
                amount: Money::new(dec!(50)),
            },
        ];

        let plan = AllocationStrategy::manual(requests)
            .allocate(Money::new(dec!(100)), &[t])
            .unwrap();

        assert_eq!(plan.allocations.len(), 1);
        assert_eq!(plan.allocations[0].target_number, "AR-001");
    }

    #[test]
    fn manual_tracks_consumption_across_repeated_requests() {
        let t = target("AR-001", Money::new(dec!(100)), None, 1);
        let requests = vec![
            ManualAllocation {
                target_id: t.id,
                amount: Money::new(dec!(60)),
            },
            ManualAllocation {
                target_id: t.id,
                amount: Money::new(dec!(60)),
            },
        ];

        let plan = AllocationStrategy::manual(requests)
            .allocate(Money::new(dec!(500)), &[t])
            .unwrap();

        // Second request only gets what the working copy still allows.
        assert_eq!(plan.allocations.len(), 2);
        assert_eq!(plan.allocations[0].amount, Money::new(dec!(60)));
        assert_eq!(plan.allocations[1].amount, Money::new(dec!(40)));
        assert_eq!(plan.total_allocated, Money::new(dec!(100)));
    }

    #[test]
    fn manual_without_requests_is_invalid() {
        let err = AllocationStrategy::manual(Vec::new())
            .allocate(Money::new(dec!(100)), &[])
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidAllocations);
    }

    #[test]
    fn strategies_do_not_mutate_inputs() {
        let targets = vec![
            target("AR-001", Money::new(dec!(100)), Some(7), 1),
            target("AR-002", Money::new(dec!(200)), Some(14), 2),
        ];
        let before = targets.clone();
        AllocationStrategy::Fifo
            .allocate(Money::new(dec!(150)), &targets)
            .unwrap();
        assert_eq!(targets, before);
    }

    proptest! {
        /// Property: FIFO allocates exactly
        /// `min(amount, sum(outstanding))`, never more, never less.
        #[test]
        fn fifo_conserves_cash(
            amount_cents in 1i64..5_000_000i64,
            outstandings in prop::collection::vec(1i64..1_000_000i64, 0..10)
        ) {
            let targets: Vec<AllocationTarget> = outstandings
                .iter()
                .enumerate()
                .map(|(i, &o)| target(
                    &format!("AR-{i:03}"),
                    Money::new(Decimal::new(o, 2)),
                    Some(i as i64),
                    i as i64,
                ))
                .collect();

            let amount = Money::new(Decimal::new(amount_cents, 2));
            let plan = AllocationStrategy::Fifo.allocate(amount, &targets).unwrap();

            let total_outstanding: Money = targets.iter().map(|t| t.outstanding).sum();
            let expected = amount.min(total_outstanding);

            prop_assert_eq!(plan.total_allocated, expected);
            prop_assert_eq!(plan.total_allocated + plan.remaining, amount);
            let entry_sum: Money = plan.allocations.iter().map(|a| a.amount).sum();
            prop_assert_eq!(entry_sum, plan.total_allocated);
        }
    }
}
