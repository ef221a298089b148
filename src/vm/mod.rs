//! Views of generic VM containers shared by the compiler structures.

mod growable;

pub use growable::GrowableArray;

pub(crate) use growable::{GrowableArrayDataFields, GrowableArrayFields};
