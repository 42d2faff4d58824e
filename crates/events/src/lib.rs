//! Domain event plumbing: the `Event` contract, tenant-scoped envelopes and
//! a transport-agnostic bus abstraction.
//!
//! Aggregates in this workspace do **not** hold internal event queues.
//! Every mutating operation returns the event(s) it produced; the caller
//! owns dispatch (an explicit outbox).

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::InMemoryEventBus;
pub use tenant::TenantScoped;
