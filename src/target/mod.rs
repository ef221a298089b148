//! The debug target: its memory and its type database.
//!
//! A [`Target`] pairs the two external collaborators the walker consumes. It is handed to
//! [`crate::Session::target_initialized`] once the debugger has attached to a process,
//! core or memory image, and everything the session resolves afterwards is scoped to it.
//!
//! # Key Components
//!
//! - [`Address`] - Opaque handle into the target's address space
//! - [`RemoteMemory`] / [`MemoryImage`] - Byte-level memory access
//! - [`TypeLayout`] / [`LayoutDatabase`] - Struct names, offsets and dynamic types
//! - [`io`] - Endian-aware primitive decoding

mod address;
pub mod io;
mod layout;
mod memory;
mod physical;

use std::sync::Arc;

pub use address::Address;
pub use layout::{
    FieldInfo, FieldKind, LayoutDatabase, LayoutDatabaseBuilder, TypeHandle, TypeLayout,
};
pub use memory::{
    read_pointer_array, MemoryImage, RemoteMemory, SegmentBuilder, MAX_ARRAY_LENGTH,
    MAX_C_STRING_LENGTH,
};
pub use physical::Physical;

/// An attached debug target.
///
/// Cloning is cheap; both collaborators are shared.
#[derive(Clone)]
pub struct Target {
    memory: Arc<dyn RemoteMemory>,
    layout: Arc<dyn TypeLayout>,
}

impl Target {
    /// Pairs a memory accessor with the type database describing it.
    pub fn new(memory: Arc<dyn RemoteMemory>, layout: Arc<dyn TypeLayout>) -> Self {
        Target { memory, layout }
    }

    /// The target's memory.
    #[must_use]
    pub fn memory(&self) -> &dyn RemoteMemory {
        self.memory.as_ref()
    }

    /// The target's type database.
    #[must_use]
    pub fn layout(&self) -> &dyn TypeLayout {
        self.layout.as_ref()
    }

    /// Size of a pointer in the target.
    #[must_use]
    pub fn address_size(&self) -> usize {
        self.memory.address_size()
    }

    /// The same memory described by another type database.
    #[cfg(test)]
    pub(crate) fn with_layout(&self, layout: Arc<dyn TypeLayout>) -> Target {
        Target {
            memory: self.memory.clone(),
            layout,
        }
    }
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("address_size", &self.memory.address_size())
            .field("big_endian", &self.memory.is_big_endian())
            .finish_non_exhaustive()
    }
}
