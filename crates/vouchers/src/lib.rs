//! `finflow-vouchers` — cash voucher aggregates.
//!
//! A `ReceiptVoucher` records cash received from a customer, a
//! `PaymentVoucher` cash paid to a supplier. Both hold the
//! `allocated + unallocated == amount` invariant and return their domain
//! events from each mutating call.

pub mod payment;
pub mod receipt;
pub mod repository;

pub use payment::{
    OpenPaymentVoucher, PayableAllocation, PaymentVoucher, PaymentVoucherEvent, PaymentVoucherId,
    PaymentVoucherState,
};
pub use receipt::{
    OpenReceiptVoucher, PaymentMethod, ReceiptVoucher, ReceiptVoucherEvent, ReceiptVoucherId,
    ReceiptVoucherState, ReceivableAllocation, VoucherStatus,
};
pub use repository::{PaymentVoucherRepository, ReceiptVoucherRepository};
