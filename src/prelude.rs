//! # optoscope Prelude
//!
//! The types needed to attach to a target, walk the compiler's structures and run the dump
//! commands. Import this module to get all of them at once.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all optoscope operations
pub use crate::Error;

/// The result type used throughout optoscope
pub use crate::Result;

// ================================================================================================
// Target and Session
// ================================================================================================

/// The attached target and its collaborators
pub use crate::target::{
    Address, FieldKind, LayoutDatabase, MemoryImage, RemoteMemory, SegmentBuilder, Target,
    TypeHandle, TypeLayout,
};

/// Per-target state
pub use crate::session::{FieldDescriptor, Session};

// ================================================================================================
// Compiler Structures
// ================================================================================================

/// Graph nodes and what hangs off them
pub use crate::opto::{
    Block, BlockList, Compile, InlineTree, JvmState, Node, NodeKind, NodeList, NodeRc, PhaseCfg,
};

/// Compile environment
pub use crate::ci::{CiEnv, CiMethod, CompileTask, CompilerThread};

/// VM metadata
pub use crate::oops::{Method, Symbol};

// ================================================================================================
// Commands
// ================================================================================================

/// Dump commands
pub use crate::commands::{run, DumpCommand};
