//! `finflow-obligations` — monetary obligation aggregates.
//!
//! A `Receivable` tracks money owed by a customer, a `Payable` money owed
//! to a supplier. Both hold the `paid + outstanding == total` invariant
//! through every mutation and return their domain events from each
//! mutating call (explicit outbox).

pub mod payable;
pub mod receivable;
pub mod repository;

pub use payable::{
    IssuePayable, Payable, PayableEvent, PayableId, PayableSource, PayableState, PayableStatus,
};
pub use receivable::{
    IssueReceivable, PaymentRecord, PaymentRecordStatus, Receivable, ReceivableEvent,
    ReceivableId, ReceivableSource, ReceivableState, ReceivableStatus, ReversalOutcome,
};
pub use repository::{PayableRepository, ReceivableRepository};
