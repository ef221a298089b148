//! Views of the C2 compiler's intermediate representation.
//!
//! The sea-of-nodes graph is reached through [`Compile::root`] or directly through
//! [`crate::Session::node_at`]. Every node is a shared [`NodeRc`] whose behavior is chosen
//! by its [`NodeKind`]; edges are resolved lazily through the session, so walking a
//! graph only ever reads the nodes it visits.
//!
//! # Key Components
//!
//! - [`Node`] - Edges, breadth-first collection and line dumps
//! - [`NodeKind`] - Dispatch tag mirroring the node class hierarchy
//! - [`JvmState`] - Inlined frame chains recorded at safepoints
//! - [`InlineTree`] - Inlining decisions of a compilation
//! - [`PhaseCfg`] / [`Block`] - Scheduled basic blocks
//! - [`Compile`] - The compilation itself

mod block;
mod cfg;
mod compile;
mod inline_tree;
mod jvms;
mod kind;
mod node;
mod node_list;
mod spec;

pub use block::{Block, BlockArray, BlockList};
pub use cfg::PhaseCfg;
pub use compile::Compile;
pub use inline_tree::InlineTree;
pub use jvms::JvmState;
pub use kind::NodeKind;
pub use node::{Node, NodeRc, MAX_NODE_INDEX};
pub use node_list::{NodeArray, NodeList};

pub(crate) use block::{BlockArrayFields, BlockFields, BlockListFields};
pub(crate) use cfg::PhaseCfgFields;
pub(crate) use compile::CompileFields;
pub(crate) use inline_tree::InlineTreeFields;
pub(crate) use jvms::JvmStateFields;
pub(crate) use node::NodeFields;
pub(crate) use node_list::{NodeArrayFields, NodeListFields};
pub(crate) use spec::{
    CallJavaFields, CallRuntimeFields, CallStaticJavaFields, MachCallJavaFields,
    MachCallRuntimeFields, MachCallStaticJavaFields, MachIfFields, MachSafePointFields,
    ProjFields, SafePointFields,
};
