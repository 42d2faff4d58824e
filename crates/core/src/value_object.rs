//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** - two value
/// objects with the same attribute values are equal. `Money` is the
/// canonical example: `Money(100)` equals any other `Money(100)` regardless
/// of where it came from.
///
/// The trait requires `Clone + PartialEq + Debug` so values stay cheap to
/// copy, comparable, and debuggable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
