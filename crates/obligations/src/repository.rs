//! Persistence interfaces for obligations (consumed, not implemented here).
//!
//! Implementations live in the surrounding system. `save_with_lock` is the
//! optimistic-locking contract: the expected version goes in, the new
//! version comes out, and a mismatch surfaces as OPTIMISTIC_LOCK_FAILED so
//! the caller can retry with freshly reloaded state.

use finflow_core::{DomainResult, ExpectedVersion, Money, PartyId, TenantId};

use crate::payable::{Payable, PayableId};
use crate::receivable::{Receivable, ReceivableId};

pub trait ReceivableRepository: Send + Sync {
    fn find_by_id(&self, tenant_id: TenantId, id: ReceivableId) -> DomainResult<Option<Receivable>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<Receivable>>;

    /// Open (pending or partial) receivables for one customer.
    fn find_outstanding_for_customer(
        &self,
        tenant_id: TenantId,
        customer_id: PartyId,
    ) -> DomainResult<Vec<Receivable>>;

    fn sum_outstanding_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, receivable: &Receivable) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(
        &self,
        receivable: &Receivable,
        expected: ExpectedVersion,
    ) -> DomainResult<u64>;
}

pub trait PayableRepository: Send + Sync {
    fn find_by_id(&self, tenant_id: TenantId, id: PayableId) -> DomainResult<Option<Payable>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<Payable>>;

    /// Open (pending or partial) payables for one supplier.
    fn find_outstanding_for_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: PartyId,
    ) -> DomainResult<Vec<Payable>>;

    fn sum_outstanding_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, payable: &Payable) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(&self, payable: &Payable, expected: ExpectedVersion) -> DomainResult<u64>;
}
