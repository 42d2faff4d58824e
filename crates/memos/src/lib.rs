//! `finflow-memos` — credit/debit adjustment memo aggregates.
//!
//! A `CreditMemo` offsets receivables after a sales return, a `DebitMemo`
//! offsets payables after a purchase return. Both hold the
//! `applied + remaining == total` invariant and return their domain events
//! from each mutating call.

pub mod credit;
pub mod debit;
pub mod repository;

pub use credit::{
    CreditMemo, CreditMemoApplication, CreditMemoEvent, CreditMemoId, CreditMemoItem,
    CreditMemoState, CreditMemoStatus, OpenCreditMemo,
};
pub use debit::{
    DebitMemo, DebitMemoApplication, DebitMemoEvent, DebitMemoId, DebitMemoItem, DebitMemoState,
    DebitMemoStatus, OpenDebitMemo,
};
pub use repository::{CreditMemoRepository, DebitMemoRepository};
