//! Small building blocks shared by the views.
//!
//! - [`BitSet`] - Visited-set tracking for graph walks
//! - [`TryOnce`] - Fallible initialize-once cell used for per-target tables and edge caches
//! - [`escape_replay`] - Token escaping for replay data

mod bitset;
mod escape;
mod lazy;

pub use bitset::{BitSet, BitSetIter};
pub use escape::escape_replay;
pub use lazy::TryOnce;
