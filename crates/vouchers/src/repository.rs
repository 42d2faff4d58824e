//! Persistence interfaces for vouchers (consumed, not implemented here).

use finflow_core::{DomainResult, ExpectedVersion, Money, PartyId, TenantId};

use crate::payment::{PaymentVoucher, PaymentVoucherId};
use crate::receipt::{ReceiptVoucher, ReceiptVoucherId};

pub trait ReceiptVoucherRepository: Send + Sync {
    fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: ReceiptVoucherId,
    ) -> DomainResult<Option<ReceiptVoucher>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<ReceiptVoucher>>;

    /// Confirmed vouchers with unallocated cash for one customer.
    fn find_unallocated_for_customer(
        &self,
        tenant_id: TenantId,
        customer_id: PartyId,
    ) -> DomainResult<Vec<ReceiptVoucher>>;

    fn sum_unallocated_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, voucher: &ReceiptVoucher) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(
        &self,
        voucher: &ReceiptVoucher,
        expected: ExpectedVersion,
    ) -> DomainResult<u64>;
}

pub trait PaymentVoucherRepository: Send + Sync {
    fn find_by_id(
        &self,
        tenant_id: TenantId,
        id: PaymentVoucherId,
    ) -> DomainResult<Option<PaymentVoucher>>;

    fn find_all_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Vec<PaymentVoucher>>;

    /// Confirmed vouchers with unallocated cash for one supplier.
    fn find_unallocated_for_supplier(
        &self,
        tenant_id: TenantId,
        supplier_id: PartyId,
    ) -> DomainResult<Vec<PaymentVoucher>>;

    fn sum_unallocated_for_tenant(&self, tenant_id: TenantId) -> DomainResult<Money>;

    fn count_for_tenant(&self, tenant_id: TenantId) -> DomainResult<u64>;

    fn save(&self, voucher: &PaymentVoucher) -> DomainResult<()>;

    /// Compare-and-swap save. Returns the newly persisted version.
    fn save_with_lock(
        &self,
        voucher: &PaymentVoucher,
        expected: ExpectedVersion,
    ) -> DomainResult<u64>;
}
