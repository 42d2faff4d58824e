//! Persistence interfaces for memos (consumed, not implemented here).

use finflow_core::{DomainResult, ExpectedVersion, Money, PartyId, TenantId};

use crate::credit::{CreditMemo, CreditMemoId};
use crate::debit::{DebitMemo, DebitMemoId};

pub trait CreditMemoRepository: Send + Sync {
    fn find_by_id(&self, tenant_id: TenantId, id: CreditMemoId) -> DomainResult<Option<CreditMemo>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<CreditMemo>>;

    /// Applicable (pending or partial) memos for one customer.
    fn find_applicable_for_customer(
        &self,
        tenant_id: TenantId,
        customer_id: PartyId,
    ) -> DomainResult<Vec<CreditMemo>>;

    fn sum_remaining_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, memo: &CreditMemo) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(&self, memo: &CreditMemo, expected: ExpectedVersion) -> DomainResult<u64>;
}

pub trait DebitMemoRepository: Send + Sync {
    fn find_by_id(&self, tenant_id: TenantId, id: DebitMemoId) -> DomainResult<Option<DebitMemo>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<DebitMemo>>;

    /// Applicable (pending or partial) memos for one supplier.
    fn find_applicable_for_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: PartyId,
    ) -> DomainResult<Vec<DebitMemo>>;

    fn sum_remaining_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, memo: &DebitMemo) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(&self, memo: &DebitMemo, expected: ExpectedVersion) -> DomainResult<u64>;
}
