//! Debug session state.
//!
//! A [`Session`] is the context threaded through every operation of the walker. It owns
//! everything that is valid for exactly one attached target:
//!
//! - memoized [`FieldDescriptor`]s keyed by `(type, field)`
//! - the typed per-struct field tables, each resolved once
//! - the constructor table mapping node type names to [`NodeKind`]s
//! - the identity cache guaranteeing one [`NodeRc`] per node address
//!
//! Nothing can be resolved before [`Session::target_initialized`] has been called. Calling
//! it again (for example after re-attaching to another process or core) swaps in a fresh
//! state, so all of the above is rebuilt lazily against the new target.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use optoscope::{Address, LayoutDatabase, MemoryImage, Session, Target};
//!
//! # fn layout() -> LayoutDatabase { unimplemented!() }
//! let memory = Arc::new(MemoryImage::new(8));
//! let session = Session::new();
//! session.target_initialized(Target::new(memory, Arc::new(layout())))?;
//!
//! if let Some(root) = session.node_at(Address::new(0x7f00_0000_1000))? {
//!     root.dump(&session, 2, &mut std::io::stdout())?;
//! }
//! # Ok::<(), optoscope::Error>(())
//! ```

mod field;
mod tables;

use std::{collections::HashMap, sync::Arc, sync::RwLock};

use dashmap::DashMap;
use log::{debug, trace};

pub use field::{FieldDescriptor, FieldRequest};
pub(crate) use tables::LayoutTables;

use crate::{
    opto::{Node, NodeKind, NodeRc},
    target::{Address, RemoteMemory, Target, TypeHandle, TypeLayout},
    utils::TryOnce,
    Error, Result,
};

/// Static base type of every node of the sea-of-nodes graph.
pub(crate) const NODE_BASE_TYPE: &str = "Node";

/// Everything resolved against one attached target.
pub struct TargetState {
    target: Target,
    descriptors: DashMap<(String, String), FieldDescriptor>,
    tables: LayoutTables,
    constructors: TryOnce<HashMap<String, NodeKind>>,
    nodes: DashMap<Address, NodeRc>,
}

impl TargetState {
    fn new(target: Target) -> Self {
        TargetState {
            target,
            descriptors: DashMap::new(),
            tables: LayoutTables::default(),
            constructors: TryOnce::new(),
            nodes: DashMap::new(),
        }
    }

    /// The attached target.
    #[must_use]
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The target's memory.
    #[must_use]
    pub fn memory(&self) -> &dyn RemoteMemory {
        self.target.memory()
    }

    /// The target's type database.
    #[must_use]
    pub fn layout(&self) -> &dyn TypeLayout {
        self.target.layout()
    }

    /// Looks up a struct that must exist in the target.
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] if the type database does not know `name`.
    pub fn require_type(&self, name: &str) -> Result<TypeHandle> {
        self.layout()
            .lookup_type(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    /// Resolves `type_name::field` with the requested decode kind, memoizing the result.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors if the struct or member is missing or of another kind.
    pub fn resolve_field(
        &self,
        type_name: &str,
        field: &str,
        request: FieldRequest,
    ) -> Result<FieldDescriptor> {
        let key = (type_name.to_string(), field.to_string());
        if let Some(descriptor) = self.descriptors.get(&key) {
            return check_request(type_name, field, *descriptor, request);
        }

        let ty = self.require_type(type_name)?;
        let descriptor: FieldDescriptor = request.lookup(self.layout(), &ty, field)?.into();
        trace!(
            "resolved {}::{} at offset {:#x} ({})",
            type_name,
            field,
            descriptor.offset,
            descriptor.kind
        );

        let stored = *self.descriptors.entry(key).or_insert(descriptor);
        Ok(stored)
    }

    /// Number of memoized field descriptors.
    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Number of node wrappers in the identity cache.
    #[must_use]
    pub fn cached_node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The constructor table, built on first use by enumerating all node types.
    pub(crate) fn constructors(&self) -> Result<&HashMap<String, NodeKind>> {
        self.constructors.get_or_try_init(|| {
            let layout = self.layout();
            let base = self.require_type(NODE_BASE_TYPE)?;

            let table: HashMap<String, NodeKind> = layout
                .types()
                .into_iter()
                .filter(|ty| layout.is_subtype(ty, &base))
                .map(|ty| {
                    let kind = NodeKind::nearest(layout, &ty);
                    (ty.name().to_string(), kind)
                })
                .collect();

            debug!("constructor table holds {} node types", table.len());
            Ok(table)
        })
    }

    /// Maps an identified dynamic node type to its kind.
    fn kind_for(&self, ty: &TypeHandle) -> Result<NodeKind> {
        if let Some(kind) = self.constructors()?.get(ty.name()) {
            return Ok(*kind);
        }
        Ok(NodeKind::nearest(self.layout(), ty))
    }

    fn node_at(&self, address: Address) -> Result<Option<NodeRc>> {
        let Some(address) = address.non_null() else {
            return Ok(None);
        };

        if let Some(node) = self.nodes.get(&address) {
            return Ok(Some(Arc::clone(node.value())));
        }

        let node = self.construct_node(address)?;
        let cached = self
            .nodes
            .entry(address)
            .or_insert_with(|| Arc::new(node))
            .value()
            .clone();
        Ok(Some(cached))
    }

    fn construct_node(&self, address: Address) -> Result<Node> {
        let base = self.require_type(NODE_BASE_TYPE)?;
        match self
            .layout()
            .find_dynamic_type(self.memory(), address, &base)?
        {
            Some(ty) => {
                let kind = self.kind_for(&ty)?;
                trace!("node at {} is {} ({})", address, ty.name(), kind);
                Ok(Node::identified(address, kind, ty.name()))
            }
            None => {
                let first_word = self.memory().read_pointer(address)?;
                debug!(
                    "node at {} has no known dynamic type, first word {}",
                    address, first_word
                );
                Ok(Node::unknown(address, first_word))
            }
        }
    }
}

fn check_request(
    type_name: &str,
    field: &str,
    descriptor: FieldDescriptor,
    request: FieldRequest,
) -> Result<FieldDescriptor> {
    if request.accepts(descriptor.kind) {
        Ok(descriptor)
    } else {
        Err(Error::WrongFieldKind {
            type_name: type_name.to_string(),
            field: field.to_string(),
            expected: request.to_string(),
            found: descriptor.kind.to_string(),
        })
    }
}

/// A debug session over at most one attached target at a time.
///
/// The session is `Send + Sync`. Walks are expected to run one at a time, but the
/// initialize-once tables and the identity cache tolerate concurrent first use.
#[derive(Default)]
pub struct Session {
    state: RwLock<Option<Arc<TargetState>>>,
}

impl Session {
    /// Creates a session that is not yet attached to a target.
    #[must_use]
    pub fn new() -> Self {
        Session {
            state: RwLock::new(None),
        }
    }

    /// Creates a session already initialized for `target`.
    #[must_use]
    pub fn attach(target: Target) -> Self {
        debug!("attaching session to {:?}", target);
        Session {
            state: RwLock::new(Some(Arc::new(TargetState::new(target)))),
        }
    }

    /// Signals that `target` has been attached and its type database is populated.
    ///
    /// Any state resolved against a previous target is dropped: memoized descriptors,
    /// field tables, the constructor table and the identity cache all start empty.
    /// Wrappers obtained earlier remain usable but read through the new target.
    ///
    /// # Errors
    ///
    /// [`Error::LockError`] if the session state is poisoned.
    pub fn target_initialized(&self, target: Target) -> Result<()> {
        let mut state = write_lock!(self.state);
        if state.is_some() {
            debug!("re-initializing session for {:?}", target);
        } else {
            debug!("initializing session for {:?}", target);
        }
        *state = Some(Arc::new(TargetState::new(target)));
        Ok(())
    }

    /// Returns `true` once a target has been initialized.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.state.read().is_ok_and(|state| state.is_some())
    }

    /// The state of the current target.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before [`Session::target_initialized`] has been called.
    pub fn state(&self) -> Result<Arc<TargetState>> {
        let state = read_lock!(self.state);
        state.clone().ok_or(Error::NotInitialized)
    }

    /// Resolves `type_name::field`; see [`TargetState::resolve_field`].
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before initialization, layout mismatch errors otherwise.
    pub fn resolve_field(
        &self,
        type_name: &str,
        field: &str,
        request: FieldRequest,
    ) -> Result<FieldDescriptor> {
        self.state()?.resolve_field(type_name, field, request)
    }

    /// Resolves the node at `address`.
    ///
    /// A null address yields `Ok(None)`. Otherwise the identity cache is consulted
    /// first; a miss probes the dynamic type of the object, builds a wrapper of the
    /// matching [`NodeKind`] and caches it. Objects whose type cannot be identified get a
    /// generic wrapper named `UnknownNode<first word>` that still navigates through the
    /// base `Node` layout.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`], layout mismatch errors if the target has no `Node`
    /// type, and memory read failures while probing the object.
    pub fn node_at(&self, address: Address) -> Result<Option<NodeRc>> {
        if address.is_null() {
            return Ok(None);
        }
        self.state()?.node_at(address)
    }

    /// Number of node wrappers in the identity cache of the current target.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] before initialization.
    pub fn cached_node_count(&self) -> Result<usize> {
        Ok(self.state()?.cached_node_count())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
