//! Typed view of a sea-of-nodes graph node.
//!
//! A [`Node`] holds the address of a C2 node object, the [`NodeKind`] its dynamic type
//! was resolved to and two lazily materialized edge arrays. Everything else is read from
//! the target on demand. Nodes are obtained through [`crate::Session::node_at`], which
//! guarantees a single shared [`NodeRc`] per address.
//!
//! Edges are kept as raw addresses. Resolving them goes back through the session, so
//! the identity of the node at the other end always comes from the identity cache and
//! wrappers never own each other, even though the graph itself is cyclic.
//!
//! # Examples
//!
//! ```rust,no_run
//! use optoscope::{Address, Session};
//!
//! # fn walk(session: &Session, root: Address) -> optoscope::Result<()> {
//! let root = session.node_at(root)?.expect("root is never null");
//! for input in root.inputs(session)?.into_iter().flatten() {
//!     println!("{} {}", input.idx(session)?, input.name());
//! }
//! root.dump(session, 3, &mut std::io::stdout())?;
//! # Ok(())
//! # }
//! ```

use std::{fmt::Write as _, io, sync::Arc};

use crate::{
    opto::NodeKind,
    session::Session,
    target::{read_pointer_array, Address},
    utils::{BitSet, TryOnce},
    Error, Result,
};

/// Largest `_idx` accepted during walks; far above any real compilation's node count.
pub const MAX_NODE_INDEX: u32 = 1 << 24;

field_table! {
    /// Members of the `Node` base class
    pub(crate) struct NodeFields = "Node" {
        inputs: Address("_in"),
        outputs: Address("_out"),
        cnt: CInt("_cnt"),
        max: CInt("_max"),
        outcnt: CInt("_outcnt"),
        outmax: CInt("_outmax"),
        idx: CInt("_idx"),
    }
}

/// Shared handle to a node; one per address per target.
pub type NodeRc = Arc<Node>;

/// A view of one node object in the target.
pub struct Node {
    address: Address,
    kind: NodeKind,
    /// Most derived type name, absent when the type could not be identified
    type_name: Option<String>,
    /// First machine word, recorded for unidentified nodes only
    first_word: Option<Address>,
    inputs: TryOnce<Vec<Address>>,
    outputs: TryOnce<Vec<Address>>,
}

impl Node {
    pub(crate) fn identified(address: Address, kind: NodeKind, type_name: &str) -> Self {
        Node {
            address,
            kind,
            type_name: Some(type_name.to_string()),
            first_word: None,
            inputs: TryOnce::new(),
            outputs: TryOnce::new(),
        }
    }

    pub(crate) fn unknown(address: Address, first_word: Address) -> Self {
        Node {
            address,
            kind: NodeKind::Node,
            type_name: None,
            first_word: Some(first_word),
            inputs: TryOnce::new(),
            outputs: TryOnce::new(),
        }
    }

    /// Address of the node object.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Kind the node's dynamic type was resolved to.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Most derived type name, if the dynamic type was identified.
    #[must_use]
    pub fn type_name(&self) -> Option<&str> {
        self.type_name.as_deref()
    }

    /// Returns `true` if the dynamic type could not be identified.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.type_name.is_none()
    }

    /// Short display name: the type name without its `Node` suffix.
    ///
    /// Unidentified nodes are named `UnknownNode<first word>`. The word is whatever the
    /// object starts with, usually a vtable pointer, and is for display only.
    #[must_use]
    pub fn name(&self) -> String {
        match (&self.type_name, self.first_word) {
            (Some(name), _) => match name.strip_suffix("Node") {
                Some(short) if !short.is_empty() => short.to_string(),
                _ => name.clone(),
            },
            (None, word) => format!("UnknownNode<{}>", word.unwrap_or_default()),
        }
    }

    /// Number of required inputs (`_cnt`).
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn req(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        state
            .node_fields()?
            .cnt
            .read_int::<u32>(state.memory(), self.address)
            .map(|cnt| cnt as usize)
    }

    /// Number of input slots, required plus precedence (`_max`).
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn len(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        state
            .node_fields()?
            .max
            .read_int::<u32>(state.memory(), self.address)
            .map(|max| max as usize)
    }

    /// Number of outputs (`_outcnt`).
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn outcnt(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        state
            .node_fields()?
            .outcnt
            .read_int::<u32>(state.memory(), self.address)
            .map(|cnt| cnt as usize)
    }

    /// Capacity of the output array (`_outmax`).
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn outmax(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        state
            .node_fields()?
            .outmax
            .read_int::<u32>(state.memory(), self.address)
            .map(|max| max as usize)
    }

    /// Dense index of the node within its compilation (`_idx`).
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn idx(&self, session: &Session) -> Result<u32> {
        let state = session.state()?;
        state
            .node_fields()?
            .idx
            .read_int::<u32>(state.memory(), self.address)
    }

    /// Addresses of all input slots, read once and cached on this wrapper.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`Error::Malformed`] if the counts are inconsistent.
    pub fn input_addresses(&self, session: &Session) -> Result<&[Address]> {
        self.inputs
            .get_or_try_init(|| {
                let state = session.state()?;
                let fields = state.node_fields()?;
                let memory = state.memory();

                let req = fields.cnt.read_int::<u32>(memory, self.address)?;
                let len = fields.max.read_int::<u32>(memory, self.address)?;
                if req > len {
                    return Err(malformed_error!(
                        "node at {} has {} required inputs but only {} slots",
                        self.address,
                        req,
                        len
                    ));
                }

                let base = fields.inputs.read_address(memory, self.address)?;
                read_pointer_array(memory, base, len as usize)
            })
            .map(Vec::as_slice)
    }

    /// Addresses of all outputs, read once and cached on this wrapper.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`Error::Malformed`] if the counts are inconsistent.
    pub fn output_addresses(&self, session: &Session) -> Result<&[Address]> {
        self.outputs
            .get_or_try_init(|| {
                let state = session.state()?;
                let fields = state.node_fields()?;
                let memory = state.memory();

                let count = fields.outcnt.read_int::<u32>(memory, self.address)?;
                let base = fields.outputs.read_address(memory, self.address)?;
                read_pointer_array(memory, base, count as usize)
            })
            .map(Vec::as_slice)
    }

    /// Input slot `index`, resolved through the identity cache.
    ///
    /// # Errors
    ///
    /// [`Error::EdgeIndex`] past [`Node::len`], layout and memory errors otherwise.
    pub fn input(&self, session: &Session, index: usize) -> Result<Option<NodeRc>> {
        let inputs = self.input_addresses(session)?;
        let Some(address) = inputs.get(index) else {
            return Err(Error::EdgeIndex {
                index,
                count: inputs.len(),
            });
        };
        session.node_at(*address)
    }

    /// Output slot `index`, resolved through the identity cache.
    ///
    /// # Errors
    ///
    /// [`Error::EdgeIndex`] past [`Node::outcnt`], layout and memory errors otherwise.
    pub fn output(&self, session: &Session, index: usize) -> Result<Option<NodeRc>> {
        let outputs = self.output_addresses(session)?;
        let Some(address) = outputs.get(index) else {
            return Err(Error::EdgeIndex {
                index,
                count: outputs.len(),
            });
        };
        session.node_at(*address)
    }

    /// All input slots, required and precedence, in order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn inputs(&self, session: &Session) -> Result<Vec<Option<NodeRc>>> {
        self.input_addresses(session)?
            .iter()
            .map(|address| session.node_at(*address))
            .collect()
    }

    /// All outputs in order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn outputs(&self, session: &Session) -> Result<Vec<Option<NodeRc>>> {
        self.output_addresses(session)?
            .iter()
            .map(|address| session.node_at(*address))
            .collect()
    }

    /// Collects the nodes within `|depth|` hops, breadth first.
    ///
    /// Positive depths follow inputs (all slots, including precedence edges), negative
    /// depths follow outputs. The result starts with this node and holds each node at
    /// most once; visited nodes are tracked by `_idx`.
    ///
    /// # Errors
    ///
    /// Layout and memory errors of any node on the way.
    pub fn collect(&self, session: &Session, depth: i32) -> Result<Vec<NodeRc>> {
        let Some(start) = session.node_at(self.address)? else {
            return Ok(Vec::new());
        };

        let mut visited = BitSet::new(256);
        visited.insert(start.visit_index(session)?);
        let mut order = vec![start];

        let mut level_start = 0;
        for _ in 0..depth.unsigned_abs() {
            let level_end = order.len();
            if level_start == level_end {
                break;
            }

            for position in level_start..level_end {
                let current = Arc::clone(&order[position]);
                let edges = if depth > 0 {
                    current.input_addresses(session)?
                } else {
                    current.output_addresses(session)?
                };

                for address in edges {
                    let Some(next) = session.node_at(*address)? else {
                        continue;
                    };
                    if visited.insert(next.visit_index(session)?) {
                        order.push(next);
                    }
                }
            }
            level_start = level_end;
        }

        Ok(order)
    }

    /// `_idx` as a bit position, bounded so a garbage index cannot size the visited set.
    fn visit_index(&self, session: &Session) -> Result<usize> {
        let idx = self.idx(session)?;
        if idx > MAX_NODE_INDEX {
            return Err(malformed_error!(
                "node at {} has index {}, limit is {}",
                self.address,
                idx,
                MAX_NODE_INDEX
            ));
        }
        Ok(idx as usize)
    }

    /// Writes the nodes within `|depth|` hops, one line each.
    ///
    /// Input walks (`depth > 0`) are printed in reverse collection order so that the
    /// farthest definitions come first; output walks print in collection order.
    ///
    /// # Errors
    ///
    /// Walk errors, and [`Error::Io`] if writing fails.
    pub fn dump(&self, session: &Session, depth: i32, out: &mut dyn io::Write) -> Result<()> {
        let nodes = self.collect(session, depth)?;
        if depth > 0 {
            for node in nodes.iter().rev() {
                node.dump_line(session, out)?;
            }
        } else {
            for node in &nodes {
                node.dump_line(session, out)?;
            }
        }
        Ok(())
    }

    /// Writes this node's line.
    ///
    /// # Errors
    ///
    /// Walk errors, and [`Error::Io`] if writing fails.
    pub fn dump_line(&self, session: &Session, out: &mut dyn io::Write) -> Result<()> {
        let line = self.format_line(session)?;
        writeln!(out, "{line}")?;
        Ok(())
    }

    /// Formats this node's line without the trailing newline.
    ///
    /// The layout is ` <idx>\t<name>\t=== <inputs> [| <precedence>] [[ <outputs> ]]<spec>`.
    /// Absent required inputs and outputs print as `_`; absent precedence slots are
    /// skipped, and the `|` marker only appears when a precedence edge is present.
    ///
    /// # Errors
    ///
    /// Walk errors of this node and its neighbors.
    pub fn format_line(&self, session: &Session) -> Result<String> {
        let mut line = String::new();

        write!(line, " {}\t{}\t=== ", self.idx(session)?, self.name())?;

        let req = self.req(session)?;
        let inputs = self.input_addresses(session)?;
        let (required, precedence) = inputs.split_at(req.min(inputs.len()));
        for address in required {
            write_edge(session, &mut line, *address)?;
            line.push(' ');
        }

        let mut any_precedence = false;
        for address in precedence.iter().filter(|address| !address.is_null()) {
            if !any_precedence {
                line.push_str("| ");
                any_precedence = true;
            }
            write_edge(session, &mut line, *address)?;
            line.push(' ');
        }

        line.push_str("[[");
        for address in self.output_addresses(session)? {
            line.push(' ');
            write_edge(session, &mut line, *address)?;
        }
        line.push_str(" ]]");

        line.push_str(&self.dump_spec(session)?);
        Ok(line)
    }
}

fn write_edge(session: &Session, line: &mut String, address: Address) -> Result<()> {
    match session.node_at(address)? {
        Some(node) => write!(line, "{}", node.idx(session)?)?,
        None => line.push('_'),
    }
    Ok(())
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.address)
            .field("kind", &self.kind)
            .field("name", &self.name())
            .finish()
    }
}
