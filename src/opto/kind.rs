//! Node kinds the walker gives specialized behavior.
//!
//! C2 has several hundred node classes, but only a few dozen carry state the walker
//! renders. [`NodeKind`] names those classes and mirrors their inheritance, so a dynamic
//! type that has no kind of its own (say `AddINode`) is handled as its nearest ancestor
//! that does (here plain `Node`).
//!
//! # Examples
//!
//! ```rust
//! use optoscope::NodeKind;
//!
//! let kind: NodeKind = "MachCallStaticJavaNode".parse().unwrap();
//! assert!(kind.is_a(NodeKind::MachSafePoint));
//! assert!(!kind.is_a(NodeKind::SafePoint));
//! assert_eq!(kind.to_string(), "MachCallStaticJavaNode");
//! ```

use strum::{Display, EnumCount, EnumIter, EnumString, IntoStaticStr};

use crate::target::{TypeHandle, TypeLayout};

/// A node class with specialized behavior, named as in the target.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    EnumCount,
    IntoStaticStr,
)]
pub enum NodeKind {
    /// Generic node with only the base layout
    #[strum(serialize = "Node")]
    Node,
    /// Root of the graph
    #[strum(serialize = "RootNode")]
    Root,
    /// Start of the method
    #[strum(serialize = "StartNode")]
    Start,
    /// Node producing a tuple of values
    #[strum(serialize = "MultiNode")]
    Multi,
    /// Projection out of a tuple
    #[strum(serialize = "ProjNode")]
    Proj,
    /// Exception dispatch projection
    #[strum(serialize = "CatchProjNode")]
    CatchProj,
    /// Jump table projection
    #[strum(serialize = "JumpProjNode")]
    JumpProj,
    /// Control merge
    #[strum(serialize = "RegionNode")]
    Region,
    /// Loop head
    #[strum(serialize = "LoopNode")]
    Loop,
    /// Node carrying a type
    #[strum(serialize = "TypeNode")]
    Type,
    /// Value merge
    #[strum(serialize = "PhiNode")]
    Phi,
    /// Halts execution
    #[strum(serialize = "HaltNode")]
    Halt,
    /// Safepoint with debug info
    #[strum(serialize = "SafePointNode")]
    SafePoint,
    /// Any call
    #[strum(serialize = "CallNode")]
    Call,
    /// Call to a Java method
    #[strum(serialize = "CallJavaNode")]
    CallJava,
    /// Statically bound Java call
    #[strum(serialize = "CallStaticJavaNode")]
    CallStaticJava,
    /// Virtual or interface Java call
    #[strum(serialize = "CallDynamicJavaNode")]
    CallDynamicJava,
    /// Call into the runtime
    #[strum(serialize = "CallRuntimeNode")]
    CallRuntime,
    /// Runtime call without safepoint
    #[strum(serialize = "CallLeafNode")]
    CallLeaf,
    /// Matched machine node
    #[strum(serialize = "MachNode")]
    Mach,
    /// Machine conditional branch
    #[strum(serialize = "MachIfNode")]
    MachIf,
    /// Machine return
    #[strum(serialize = "MachReturnNode")]
    MachReturn,
    /// Machine safepoint
    #[strum(serialize = "MachSafePointNode")]
    MachSafePoint,
    /// Machine call
    #[strum(serialize = "MachCallNode")]
    MachCall,
    /// Machine call to a Java method
    #[strum(serialize = "MachCallJavaNode")]
    MachCallJava,
    /// Machine statically bound Java call
    #[strum(serialize = "MachCallStaticJavaNode")]
    MachCallStaticJava,
    /// Machine virtual Java call
    #[strum(serialize = "MachCallDynamicJavaNode")]
    MachCallDynamicJava,
    /// Machine runtime call
    #[strum(serialize = "MachCallRuntimeNode")]
    MachCallRuntime,
    /// Machine runtime call without safepoint
    #[strum(serialize = "MachCallLeafNode")]
    MachCallLeaf,
    /// Register allocator spill copy
    #[strum(serialize = "MachSpillCopyNode")]
    MachSpillCopy,
    /// Machine projection
    #[strum(serialize = "MachProjNode")]
    MachProj,
}

impl NodeKind {
    /// The direct superclass of this kind's class.
    #[must_use]
    pub const fn parent(self) -> Option<NodeKind> {
        use NodeKind::*;
        Some(match self {
            Node => return None,
            Root => Loop,
            Start => Multi,
            Multi => Node,
            Proj => Node,
            CatchProj => Proj,
            JumpProj => Proj,
            Region => Node,
            Loop => Region,
            Type => Node,
            Phi => Type,
            Halt => Node,
            SafePoint => Multi,
            Call => SafePoint,
            CallJava => Call,
            CallStaticJava => CallJava,
            CallDynamicJava => CallJava,
            CallRuntime => Call,
            CallLeaf => CallRuntime,
            Mach => Node,
            MachIf => Mach,
            MachReturn => Mach,
            MachSafePoint => MachReturn,
            MachCall => MachSafePoint,
            MachCallJava => MachCall,
            MachCallStaticJava => MachCallJava,
            MachCallDynamicJava => MachCallJava,
            MachCallRuntime => MachCall,
            MachCallLeaf => MachCallRuntime,
            MachSpillCopy => Mach,
            MachProj => Proj,
        })
    }

    /// Returns `true` if this kind is `other` or derives from it.
    #[must_use]
    pub fn is_a(self, other: NodeKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == other {
                return true;
            }
            current = kind.parent();
        }
        false
    }

    /// Name of the class in the target.
    #[must_use]
    pub fn type_name(self) -> &'static str {
        self.into()
    }

    /// Parses a class name into its kind, if it has one.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        name.parse().ok()
    }

    /// The kind of the nearest class in `ty`'s superclass chain that has one.
    ///
    /// Falls back to [`NodeKind::Node`] when no ancestor has a kind.
    pub(crate) fn nearest(layout: &dyn TypeLayout, ty: &TypeHandle) -> NodeKind {
        let mut current = Some(ty.clone());
        // Bounded in case the database reports a cyclic hierarchy
        for _ in 0..64 {
            let Some(candidate) = current else {
                break;
            };
            if let Some(kind) = NodeKind::from_type_name(candidate.name()) {
                return kind;
            }
            current = layout.superclass(&candidate);
        }
        NodeKind::Node
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::target::LayoutDatabase;

    #[test]
    fn hierarchy_is_rooted_at_node() {
        for kind in NodeKind::iter() {
            assert!(kind.is_a(NodeKind::Node), "{kind} does not reach Node");
        }
        assert_eq!(NodeKind::iter().count(), NodeKind::COUNT);
    }

    #[test]
    fn names_round_trip() {
        for kind in NodeKind::iter() {
            assert_eq!(NodeKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(NodeKind::from_type_name("AddINode"), None);
    }

    #[test]
    fn family_relations() {
        assert!(NodeKind::CallLeaf.is_a(NodeKind::SafePoint));
        assert!(NodeKind::MachProj.is_a(NodeKind::Proj));
        assert!(NodeKind::Root.is_a(NodeKind::Region));
        assert!(!NodeKind::MachCall.is_a(NodeKind::Call));
        assert!(!NodeKind::Node.is_a(NodeKind::Proj));
    }

    #[test]
    fn nearest_ancestor_kind() {
        let layout = LayoutDatabase::builder()
            .add_type("Node", None, 0x30)
            .add_type("ProjNode", Some("Node"), 0x38)
            .add_type("CProjNode", Some("ProjNode"), 0x38)
            .add_type("IfTrueNode", Some("CProjNode"), 0x38)
            .add_type("AddNode", Some("Node"), 0x30)
            .build()
            .unwrap();

        let if_true = layout.lookup_type("IfTrueNode").unwrap();
        assert_eq!(NodeKind::nearest(&layout, &if_true), NodeKind::Proj);
        let add = layout.lookup_type("AddNode").unwrap();
        assert_eq!(NodeKind::nearest(&layout, &add), NodeKind::Node);
    }
}
