//! Synthetic targets laid out in memory.
//!
//! [`SyntheticTarget`] lays out C2 compiler structures (nodes, JVM states, inlining trees,
//! basic blocks, compilations and the VM metadata behind method names) in a single
//! arena segment, together with a 64-bit [`LayoutDatabase`] describing them. It is meant
//! for tests, benchmarks and fuzzing, and for experimenting with the walker without a
//! real process at hand.
//!
//! Objects are bump-allocated and zero-filled, so every pointer member starts out null
//! and every count at zero. Polymorphic objects get the vtable registered for their type
//! as their first word, which is what [`crate::TypeLayout::find_dynamic_type`] keys on.
//!
//! # Examples
//!
//! ```rust
//! use optoscope::synthetic::SyntheticTarget;
//!
//! let mut target = SyntheticTarget::new()?;
//! let region = target.node("RegionNode", 5)?;
//! let phi = target.node("PhiNode", 6)?;
//! target.set_inputs(phi, &[region], &[])?;
//! target.set_outputs(region, &[phi])?;
//!
//! let session = target.session()?;
//! let phi = session.node_at(phi)?.unwrap();
//! assert_eq!(phi.format_line(&session)?, " 6\tPhi\t=== 5 [[ ]]");
//! # Ok::<(), optoscope::Error>(())
//! ```

use std::{collections::HashMap, sync::Arc};

use crate::{
    session::Session,
    target::{
        Address, FieldInfo, FieldKind, LayoutDatabase, MemoryImage, SegmentBuilder, Target,
        TypeHandle, TypeLayout,
    },
    Error, Result,
};

/// First address of the arena.
pub const ARENA_BASE: Address = Address::new(0x7f00_0000_0000);

/// Default arena size in bytes.
pub const DEFAULT_ARENA_SIZE: usize = 1 << 20;

/// Vtable addresses are assigned from here; they are never mapped.
const VTABLE_BASE: u64 = 0x7e00_0000_0000;

const POINTER_SIZE: usize = 8;

const U2: FieldKind = FieldKind::CInt {
    width: 2,
    signed: false,
};
const U4: FieldKind = FieldKind::CInt {
    width: 4,
    signed: false,
};
const S4: FieldKind = FieldKind::CInt {
    width: 4,
    signed: true,
};
const PTR: FieldKind = FieldKind::Address;
const EMBEDDED: FieldKind = FieldKind::Embedded;

/// One struct of the synthetic layout: name, superclass, size, and whether its objects
/// start with a vtable.
type TypeSpec = (&'static str, Option<&'static str>, u64, bool);

#[rustfmt::skip]
const TYPES: &[TypeSpec] = &[
    ("Node",                    None,                           0x40, true),
    ("MultiNode",               Some("Node"),                   0x40, true),
    ("StartNode",               Some("MultiNode"),              0x48, true),
    ("ProjNode",                Some("Node"),                   0x48, true),
    ("CProjNode",               Some("ProjNode"),               0x48, true),
    ("IfTrueNode",              Some("CProjNode"),              0x48, true),
    ("IfFalseNode",             Some("CProjNode"),              0x48, true),
    ("CatchProjNode",           Some("CProjNode"),              0x50, true),
    ("JumpProjNode",            Some("CProjNode"),              0x50, true),
    ("MachProjNode",            Some("ProjNode"),               0x48, true),
    ("RegionNode",              Some("Node"),                   0x40, true),
    ("LoopNode",                Some("RegionNode"),             0x40, true),
    ("RootNode",                Some("LoopNode"),               0x40, true),
    ("TypeNode",                Some("Node"),                   0x48, true),
    ("PhiNode",                 Some("TypeNode"),               0x50, true),
    ("HaltNode",                Some("Node"),                   0x40, true),
    ("ReturnNode",              Some("Node"),                   0x40, true),
    ("AddNode",                 Some("Node"),                   0x40, true),
    ("AddINode",                Some("AddNode"),                0x40, true),
    ("SafePointNode",           Some("MultiNode"),              0x50, true),
    ("CallNode",                Some("SafePointNode"),          0x50, true),
    ("CallJavaNode",            Some("CallNode"),               0x60, true),
    ("CallStaticJavaNode",      Some("CallJavaNode"),           0x68, true),
    ("CallDynamicJavaNode",     Some("CallJavaNode"),           0x68, true),
    ("CallRuntimeNode",         Some("CallNode"),               0x58, true),
    ("CallLeafNode",            Some("CallRuntimeNode"),        0x58, true),
    ("MachNode",                Some("Node"),                   0x40, true),
    ("MachBranchNode",          Some("MachNode"),               0x40, true),
    ("MachIfNode",              Some("MachBranchNode"),         0x48, true),
    ("MachReturnNode",          Some("MachNode"),               0x48, true),
    ("MachSafePointNode",       Some("MachReturnNode"),         0x58, true),
    ("MachCallNode",            Some("MachSafePointNode"),      0x58, true),
    ("MachCallJavaNode",        Some("MachCallNode"),           0x68, true),
    ("MachCallStaticJavaNode",  Some("MachCallJavaNode"),       0x70, true),
    ("MachCallDynamicJavaNode", Some("MachCallJavaNode"),       0x68, true),
    ("MachCallRuntimeNode",     Some("MachCallNode"),           0x60, true),
    ("MachCallLeafNode",        Some("MachCallRuntimeNode"),    0x60, true),
    ("MachSpillCopyNode",       Some("MachNode"),               0x48, true),
    ("JVMState",                None,                           0x30, false),
    ("ciBaseObject",            None,                           0x10, true),
    ("ciMetadata",              Some("ciBaseObject"),           0x18, true),
    ("ciMethod",                Some("ciMetadata"),             0x40, true),
    ("ciEnv",                   None,                           0x20, false),
    ("CompileTask",             None,                           0x20, false),
    ("Thread",                  None,                           0x80, true),
    ("JavaThread",              Some("Thread"),                 0x80, true),
    ("CompilerThread",          Some("JavaThread"),             0x88, true),
    ("Metadata",                None,                           0x08, true),
    ("Method",                  Some("Metadata"),               0x10, true),
    ("ConstMethod",             Some("Metadata"),               0x28, true),
    ("ConstantPool",            Some("Metadata"),               0x50, true),
    ("Klass",                   Some("Metadata"),               0x20, true),
    ("InstanceKlass",           Some("Klass"),                  0x20, true),
    ("Symbol",                  None,                           0x08, false),
    ("InlineTree",              None,                           0x48, false),
    ("GrowableArrayBase",       None,                           0x08, false),
    ("GrowableArrayView<int>",  Some("GrowableArrayBase"),      0x10, false),
    ("GrowableArray<int>",      Some("GrowableArrayView<int>"), 0x18, false),
    ("Node_Array",              None,                           0x18, false),
    ("Node_List",               Some("Node_Array"),             0x20, false),
    ("Block_Array",             None,                           0x18, false),
    ("Block_List",              Some("Block_Array"),            0x20, false),
    ("CFGElement",              None,                           0x10, false),
    ("Block",                   Some("CFGElement"),             0x80, false),
    ("Phase",                   None,                           0x10, false),
    ("PhaseCFG",                Some("Phase"),                  0x48, false),
    ("Compile",                 None,                           0x30, false),
];

#[rustfmt::skip]
const FIELDS: &[(&str, &str, u64, FieldKind)] = &[
    ("Node",                   "_in",              0x08, PTR),
    ("Node",                   "_out",             0x10, PTR),
    ("Node",                   "_cnt",             0x18, U4),
    ("Node",                   "_max",             0x1C, U4),
    ("Node",                   "_outcnt",          0x20, U4),
    ("Node",                   "_outmax",          0x24, U4),
    ("Node",                   "_idx",             0x28, U4),
    ("ProjNode",               "_con",             0x40, U4),
    ("SafePointNode",          "_jvms",            0x40, PTR),
    ("CallJavaNode",           "_method",          0x50, PTR),
    ("CallJavaNode",           "_bci",             0x58, S4),
    ("CallStaticJavaNode",     "_name",            0x60, PTR),
    ("CallRuntimeNode",        "_name",            0x50, PTR),
    ("MachIfNode",             "_prob",            0x40, FieldKind::Float),
    ("MachIfNode",             "_fcnt",            0x44, FieldKind::Float),
    ("MachSafePointNode",      "_jvms",            0x48, PTR),
    ("MachCallJavaNode",       "_method",          0x58, PTR),
    ("MachCallJavaNode",       "_bci",             0x60, S4),
    ("MachCallStaticJavaNode", "_name",            0x68, PTR),
    ("MachCallRuntimeNode",    "_name",            0x58, PTR),
    ("JVMState",               "_depth",           0x00, U4),
    ("JVMState",               "_locoff",          0x04, U4),
    ("JVMState",               "_stkoff",          0x08, U4),
    ("JVMState",               "_monoff",          0x0C, U4),
    ("JVMState",               "_scloff",          0x10, U4),
    ("JVMState",               "_endoff",          0x14, U4),
    ("JVMState",               "_sp",              0x18, S4),
    ("JVMState",               "_bci",             0x1C, S4),
    ("JVMState",               "_method",          0x20, PTR),
    ("JVMState",               "_caller",          0x28, PTR),
    ("ciMetadata",             "_metadata",        0x10, PTR),
    ("ciEnv",                  "_compiler_data",   0x10, PTR),
    ("ciEnv",                  "_task",            0x18, PTR),
    ("CompileTask",            "_compile_id",      0x08, U4),
    ("CompileTask",            "_comp_level",      0x0C, S4),
    ("CompileTask",            "_osr_bci",         0x10, S4),
    ("CompileTask",            "_method",          0x18, PTR),
    ("CompilerThread",         "_env",             0x80, PTR),
    ("Method",                 "_constMethod",     0x08, PTR),
    ("ConstMethod",            "_constants",       0x08, PTR),
    ("ConstMethod",            "_name_index",      0x20, U2),
    ("ConstMethod",            "_signature_index", 0x22, U2),
    ("ConstantPool",           "_pool_holder",     0x18, PTR),
    ("Klass",                  "_name",            0x10, PTR),
    ("Symbol",                 "_length",          0x04, U2),
    ("Symbol",                 "_body",            0x06, EMBEDDED),
    ("InlineTree",             "_caller_jvms",     0x08, PTR),
    ("InlineTree",             "_method",          0x10, PTR),
    ("InlineTree",             "_caller_tree",     0x18, PTR),
    ("InlineTree",             "_subtrees",        0x28, EMBEDDED),
    ("GrowableArrayBase",      "_len",             0x00, S4),
    ("GrowableArrayBase",      "_max",             0x04, S4),
    ("GrowableArrayView<int>", "_data",            0x08, PTR),
    ("Node_Array",             "_max",             0x08, U4),
    ("Node_Array",             "_nodes",           0x10, PTR),
    ("Node_List",              "_cnt",             0x18, U4),
    ("Block_Array",            "_size",            0x08, U4),
    ("Block_Array",            "_blocks",          0x10, PTR),
    ("Block_List",             "_cnt",             0x18, U4),
    ("CFGElement",             "_freq",            0x08, FieldKind::Double),
    ("Block",                  "_nodes",           0x10, EMBEDDED),
    ("Block",                  "_succs",           0x30, EMBEDDED),
    ("Block",                  "_num_succs",       0x48, U4),
    ("Block",                  "_pre_order",       0x4C, U4),
    ("Block",                  "_dom_depth",       0x50, U4),
    ("Block",                  "_idom",            0x58, PTR),
    ("PhaseCFG",               "_number_of_blocks", 0x10, U4),
    ("PhaseCFG",               "_blocks",          0x18, EMBEDDED),
    ("PhaseCFG",               "_root_block",      0x38, PTR),
    ("Compile",                "_method",          0x08, PTR),
    ("Compile",                "_compile_id",      0x10, U4),
    ("Compile",                "_entry_bci",       0x14, S4),
    ("Compile",                "_root",            0x18, PTR),
    ("Compile",                "_cfg",             0x20, PTR),
    ("Compile",                "_ilt",             0x28, PTR),
];

/// Vtable address assigned to the type at `position` of the type list.
fn vtable_at(position: usize) -> Address {
    Address::new(VTABLE_BASE + (position as u64) * 0x100)
}

/// Builds the 64-bit layout database used by [`SyntheticTarget`].
///
/// # Errors
///
/// Propagates validation errors of the database builder.
pub fn standard_layout() -> Result<LayoutDatabase> {
    let mut builder = LayoutDatabase::builder();
    for (position, (name, superclass, size, polymorphic)) in TYPES.iter().enumerate() {
        builder = builder.add_type(name, *superclass, *size);
        if *polymorphic {
            builder = builder.add_vtable(vtable_at(position), name);
        }
    }
    for (owner, field, offset, kind) in FIELDS {
        builder = builder.add_field(owner, field, *offset, *kind);
    }
    builder.build()
}

/// Lays out synthetic compiler structures in memory.
#[derive(Debug, Clone)]
pub struct SyntheticTarget {
    layout: Arc<LayoutDatabase>,
    arena: SegmentBuilder,
    capacity: usize,
    used: usize,
    vtables: HashMap<&'static str, Address>,
    klasses: HashMap<String, Address>,
    /// Depth and end offset of every JVM state created so far
    frames: HashMap<Address, (u32, u32)>,
}

impl SyntheticTarget {
    /// Creates an empty target with an arena of [`DEFAULT_ARENA_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// Propagates layout database validation errors.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_ARENA_SIZE)
    }

    /// Creates an empty target with an arena of `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Propagates layout database validation errors.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let vtables = TYPES
            .iter()
            .enumerate()
            .filter(|(_, spec)| spec.3)
            .map(|(position, spec)| (spec.0, vtable_at(position)))
            .collect();

        Ok(SyntheticTarget {
            layout: Arc::new(standard_layout()?),
            arena: SegmentBuilder::new(ARENA_BASE, capacity, POINTER_SIZE),
            capacity,
            used: 0,
            vtables,
            klasses: HashMap::new(),
            frames: HashMap::new(),
        })
    }

    /// The layout database describing the arena.
    #[must_use]
    pub fn layout(&self) -> &Arc<LayoutDatabase> {
        &self.layout
    }

    /// Vtable address of `type_name`, if its objects have one.
    #[must_use]
    pub fn vtable(&self, type_name: &str) -> Option<Address> {
        self.vtables.get(type_name).copied()
    }

    /// Number of arena bytes in use.
    #[must_use]
    pub fn used(&self) -> usize {
        self.used
    }

    /// Snapshot of the arena as a target.
    ///
    /// Later writes to the builder are not visible through the returned target.
    ///
    /// # Errors
    ///
    /// Propagates segment installation errors.
    pub fn target(&self) -> Result<Target> {
        let image = MemoryImage::new(POINTER_SIZE);
        self.arena.clone().install(&image)?;
        Ok(Target::new(Arc::new(image), self.layout.clone()))
    }

    /// A session attached to a snapshot of the arena.
    ///
    /// # Errors
    ///
    /// Propagates segment installation errors.
    pub fn session(&self) -> Result<Session> {
        Ok(Session::attach(self.target()?))
    }

    /// Reserves `size` zeroed bytes, aligned to 16.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] once the arena is exhausted.
    pub fn alloc(&mut self, size: usize) -> Result<Address> {
        let start = self.used.next_multiple_of(16);
        let end = start
            .checked_add(size.max(1))
            .filter(|end| *end <= self.capacity)
            .ok_or(Error::OutOfBounds {
                address: ARENA_BASE.plus_offset(start as u64),
                len: size,
            })?;
        self.used = end;
        Ok(ARENA_BASE.plus_offset(start as u64))
    }

    /// Allocates a zeroed object of `type_name`, with its vtable if it has one.
    ///
    /// # Errors
    ///
    /// [`Error::TypeNotFound`] for unknown types, [`Error::OutOfBounds`] if the arena is
    /// exhausted.
    pub fn object(&mut self, type_name: &str) -> Result<Address> {
        let ty = self.require_type(type_name)?;
        let object = self.alloc(ty.size() as usize)?;
        if let Some(vtable) = self.vtable(type_name) {
            self.arena.write_pointer(object, vtable)?;
        }
        Ok(object)
    }

    /// Allocates a node of `type_name` with index `idx` and no edges.
    ///
    /// # Errors
    ///
    /// See [`SyntheticTarget::object`].
    pub fn node(&mut self, type_name: &str, idx: u32) -> Result<Address> {
        let node = self.object(type_name)?;
        self.set_int(node, "Node", "_idx", i64::from(idx))?;
        Ok(node)
    }

    /// Allocates a node whose first word matches no known vtable.
    ///
    /// # Errors
    ///
    /// See [`SyntheticTarget::object`].
    pub fn unknown_node(&mut self, idx: u32, first_word: Address) -> Result<Address> {
        let size = self.require_type("Node")?.size() as usize;
        let node = self.alloc(size)?;
        self.arena.write_pointer(node, first_word)?;
        self.set_int(node, "Node", "_idx", i64::from(idx))?;
        Ok(node)
    }

    /// Sets the input array of `node`: `required` inputs followed by `precedence` edges.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn set_inputs(
        &mut self,
        node: Address,
        required: &[Address],
        precedence: &[Address],
    ) -> Result<()> {
        let slots: Vec<Address> = required.iter().chain(precedence).copied().collect();
        let array = self.pointer_array(&slots)?;
        self.set_pointer(node, "Node", "_in", array)?;
        self.set_int(node, "Node", "_cnt", required.len() as i64)?;
        self.set_int(node, "Node", "_max", slots.len() as i64)
    }

    /// Sets the output array of `node`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn set_outputs(&mut self, node: Address, outputs: &[Address]) -> Result<()> {
        let array = self.pointer_array(outputs)?;
        self.set_pointer(node, "Node", "_out", array)?;
        self.set_int(node, "Node", "_outcnt", outputs.len() as i64)?;
        self.set_int(node, "Node", "_outmax", outputs.len() as i64)
    }

    /// Writes the pointer member `type_name::field` of `object`.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors, or [`Error::OutOfBounds`] outside the arena.
    pub fn set_pointer(
        &mut self,
        object: Address,
        type_name: &str,
        field: &str,
        value: Address,
    ) -> Result<()> {
        let ty = self.require_type(type_name)?;
        let info = self.layout.address_field(&ty, field)?;
        self.arena.write_pointer(object.plus_offset(info.offset), value)
    }

    /// Writes the integer member `type_name::field` of `object`, truncated to its width.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors, or [`Error::OutOfBounds`] outside the arena.
    pub fn set_int(
        &mut self,
        object: Address,
        type_name: &str,
        field: &str,
        value: i64,
    ) -> Result<()> {
        let ty = self.require_type(type_name)?;
        let info = self.layout.c_int_field(&ty, field)?;
        match info.kind {
            FieldKind::CInt { width, .. } => {
                self.arena
                    .write_c_int(object.plus_offset(info.offset), width, value)
            }
            other => Err(malformed_error!("{}::{} is {}", type_name, field, other)),
        }
    }

    /// Writes the float member `type_name::field` of `object`.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors, or [`Error::OutOfBounds`] outside the arena.
    pub fn set_float(
        &mut self,
        object: Address,
        type_name: &str,
        field: &str,
        value: f32,
    ) -> Result<()> {
        let ty = self.require_type(type_name)?;
        let info = self.layout.float_field(&ty, field)?;
        self.arena.write(object.plus_offset(info.offset), value)
    }

    /// Writes the double member `type_name::field` of `object`.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors, or [`Error::OutOfBounds`] outside the arena.
    pub fn set_double(
        &mut self,
        object: Address,
        type_name: &str,
        field: &str,
        value: f64,
    ) -> Result<()> {
        let ty = self.require_type(type_name)?;
        let info = self.layout.double_field(&ty, field)?;
        self.arena.write(object.plus_offset(info.offset), value)
    }

    /// Overwrites arena bytes at `at`, bypassing the layout.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] outside the arena.
    pub fn write_bytes(&mut self, at: Address, bytes: &[u8]) -> Result<()> {
        self.arena.write_bytes(at, bytes)
    }

    /// Stores a NUL-terminated string.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn c_string(&mut self, value: &str) -> Result<Address> {
        let address = self.alloc(value.len() + 1)?;
        self.arena.write_bytes(address, value.as_bytes())?;
        Ok(address)
    }

    /// Stores a `Symbol`.
    ///
    /// # Errors
    ///
    /// [`Error::Malformed`] for strings longer than a symbol can hold, arena exhaustion.
    pub fn symbol(&mut self, value: &str) -> Result<Address> {
        let length = u16::try_from(value.len())
            .map_err(|_| malformed_error!("symbol of {} bytes is too long", value.len()))?;
        let header = self.require_type("Symbol")?.size() as usize;
        let symbol = self.alloc(header + value.len())?;
        self.set_int(symbol, "Symbol", "_length", i64::from(length))?;

        let body = self.member("Symbol", "_body")?;
        self.arena
            .write_bytes(symbol.plus_offset(body.offset), value.as_bytes())?;
        Ok(symbol)
    }

    /// The class named `name`, created on first use.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn klass(&mut self, name: &str) -> Result<Address> {
        if let Some(klass) = self.klasses.get(name) {
            return Ok(*klass);
        }
        let symbol = self.symbol(name)?;
        let klass = self.object("InstanceKlass")?;
        self.set_pointer(klass, "Klass", "_name", symbol)?;
        self.klasses.insert(name.to_string(), klass);
        Ok(klass)
    }

    /// Creates a VM `Method` with its `ConstMethod` and constant pool.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn method(&mut self, holder: &str, name: &str, signature: &str) -> Result<Address> {
        const NAME_INDEX: u16 = 1;
        const SIGNATURE_INDEX: u16 = 2;

        let klass = self.klass(holder)?;
        let name = self.symbol(name)?;
        let signature = self.symbol(signature)?;

        let header = self.require_type("ConstantPool")?.size();
        let pool = self.alloc(header as usize + 3 * POINTER_SIZE)?;
        if let Some(vtable) = self.vtable("ConstantPool") {
            self.arena.write_pointer(pool, vtable)?;
        }
        self.set_pointer(pool, "ConstantPool", "_pool_holder", klass)?;
        for (index, symbol) in [(NAME_INDEX, name), (SIGNATURE_INDEX, signature)] {
            let slot = pool.plus_offset(header + u64::from(index) * POINTER_SIZE as u64);
            self.arena.write_pointer(slot, symbol)?;
        }

        let const_method = self.object("ConstMethod")?;
        self.set_pointer(const_method, "ConstMethod", "_constants", pool)?;
        self.set_int(
            const_method,
            "ConstMethod",
            "_name_index",
            i64::from(NAME_INDEX),
        )?;
        self.set_int(
            const_method,
            "ConstMethod",
            "_signature_index",
            i64::from(SIGNATURE_INDEX),
        )?;

        let method = self.object("Method")?;
        self.set_pointer(method, "Method", "_constMethod", const_method)?;
        Ok(method)
    }

    /// Creates a `ciMethod` mirror of a fresh VM method.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn ci_method(&mut self, holder: &str, name: &str, signature: &str) -> Result<Address> {
        let method = self.method(holder, name, signature)?;
        let mirror = self.object("ciMethod")?;
        self.set_pointer(mirror, "ciMetadata", "_metadata", method)?;
        Ok(mirror)
    }

    /// Creates a `JVMState` for `method` (a `ciMethod`, `None` for a runtime stub) at
    /// `bci`, called from `caller`.
    ///
    /// The depth is one more than the caller's; the frame's slot offsets start where
    /// the caller's end.
    ///
    /// # Errors
    ///
    /// [`Error::Malformed`] if `caller` was not created by this builder, arena exhaustion.
    pub fn jvms(
        &mut self,
        method: Option<Address>,
        bci: i32,
        caller: Option<Address>,
    ) -> Result<Address> {
        let (depth, locoff) = match caller {
            Some(caller) => {
                let (depth, endoff) = self.frames.get(&caller).copied().ok_or_else(|| {
                    malformed_error!("{} is not a JVM state of this target", caller)
                })?;
                (depth + 1, endoff)
            }
            None => (1, 5),
        };
        let stkoff = locoff + 2;
        let monoff = stkoff + 1;
        let endoff = monoff;

        let jvms = self.object("JVMState")?;
        for (field, value) in [
            ("_depth", depth),
            ("_locoff", locoff),
            ("_stkoff", stkoff),
            ("_monoff", monoff),
            ("_scloff", monoff),
            ("_endoff", endoff),
        ] {
            self.set_int(jvms, "JVMState", field, i64::from(value))?;
        }
        self.set_int(jvms, "JVMState", "_sp", 1)?;
        self.set_int(jvms, "JVMState", "_bci", i64::from(bci))?;
        self.set_pointer(jvms, "JVMState", "_method", method.unwrap_or_default())?;
        self.set_pointer(jvms, "JVMState", "_caller", caller.unwrap_or_default())?;

        self.frames.insert(jvms, (depth, endoff));
        Ok(jvms)
    }

    /// Creates a standalone `GrowableArray` holding `elements`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn growable_array(&mut self, elements: &[Address]) -> Result<Address> {
        let array = self.object("GrowableArray<int>")?;
        self.fill_growable_array(array, elements)?;
        Ok(array)
    }

    /// Creates an `InlineTree` node without subtrees.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn inline_tree(
        &mut self,
        method: Option<Address>,
        caller_jvms: Option<Address>,
        caller_tree: Option<Address>,
    ) -> Result<Address> {
        let tree = self.object("InlineTree")?;
        self.set_pointer(tree, "InlineTree", "_method", method.unwrap_or_default())?;
        self.set_pointer(
            tree,
            "InlineTree",
            "_caller_jvms",
            caller_jvms.unwrap_or_default(),
        )?;
        self.set_pointer(
            tree,
            "InlineTree",
            "_caller_tree",
            caller_tree.unwrap_or_default(),
        )?;
        Ok(tree)
    }

    /// Sets the subtree list of `tree`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn set_subtrees(&mut self, tree: Address, subtrees: &[Address]) -> Result<()> {
        let header = tree.plus_offset(self.member("InlineTree", "_subtrees")?.offset);
        self.fill_growable_array(header, subtrees)
    }

    /// Creates a standalone `Node_List` of capacity `max` holding `nodes`.
    ///
    /// # Errors
    ///
    /// [`Error::Malformed`] if `max` is smaller than the node count, arena exhaustion.
    pub fn node_list(&mut self, nodes: &[Address], max: usize) -> Result<Address> {
        let list = self.object("Node_List")?;
        self.fill_node_list(list, nodes, max)?;
        Ok(list)
    }

    /// Creates a `Block` with pre-order number `pre_order` scheduling `nodes`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn block(&mut self, pre_order: u32, freq: f64, nodes: &[Address]) -> Result<Address> {
        let block = self.object("Block")?;
        self.set_int(block, "Block", "_pre_order", i64::from(pre_order))?;
        self.set_double(block, "Block", "_freq", freq)?;
        let list = block.plus_offset(self.member("Block", "_nodes")?.offset);
        self.fill_node_list(list, nodes, nodes.len())?;
        Ok(block)
    }

    /// Sets the successors of `block`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn set_successors(&mut self, block: Address, successors: &[Address]) -> Result<()> {
        let array = block.plus_offset(self.member("Block", "_succs")?.offset);
        self.fill_block_array(array, successors)?;
        self.set_int(block, "Block", "_num_succs", successors.len() as i64)
    }

    /// Sets the immediate dominator and dominator depth of `block`.
    ///
    /// # Errors
    ///
    /// Layout mismatch errors.
    pub fn set_idom(&mut self, block: Address, idom: Address, dom_depth: u32) -> Result<()> {
        self.set_pointer(block, "Block", "_idom", idom)?;
        self.set_int(block, "Block", "_dom_depth", i64::from(dom_depth))
    }

    /// Creates a `PhaseCFG` over `blocks`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn cfg(&mut self, blocks: &[Address], root_block: Option<Address>) -> Result<Address> {
        let cfg = self.object("PhaseCFG")?;
        self.set_int(cfg, "PhaseCFG", "_number_of_blocks", blocks.len() as i64)?;
        self.set_pointer(cfg, "PhaseCFG", "_root_block", root_block.unwrap_or_default())?;

        let list = cfg.plus_offset(self.member("PhaseCFG", "_blocks")?.offset);
        self.fill_block_array(list, blocks)?;
        self.set_int(list, "Block_List", "_cnt", blocks.len() as i64)?;
        Ok(cfg)
    }

    /// Creates a `Compile`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn compile(
        &mut self,
        method: Option<Address>,
        compile_id: u32,
        entry_bci: i32,
        root: Option<Address>,
        cfg: Option<Address>,
        ilt: Option<Address>,
    ) -> Result<Address> {
        let compile = self.object("Compile")?;
        self.set_pointer(compile, "Compile", "_method", method.unwrap_or_default())?;
        self.set_int(compile, "Compile", "_compile_id", i64::from(compile_id))?;
        self.set_int(compile, "Compile", "_entry_bci", i64::from(entry_bci))?;
        self.set_pointer(compile, "Compile", "_root", root.unwrap_or_default())?;
        self.set_pointer(compile, "Compile", "_cfg", cfg.unwrap_or_default())?;
        self.set_pointer(compile, "Compile", "_ilt", ilt.unwrap_or_default())?;
        Ok(compile)
    }

    /// Creates a `CompileTask` for the VM method `method`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn compile_task(
        &mut self,
        method: Address,
        compile_id: u32,
        comp_level: i32,
        osr_bci: i32,
    ) -> Result<Address> {
        let task = self.object("CompileTask")?;
        self.set_pointer(task, "CompileTask", "_method", method)?;
        self.set_int(task, "CompileTask", "_compile_id", i64::from(compile_id))?;
        self.set_int(task, "CompileTask", "_comp_level", i64::from(comp_level))?;
        self.set_int(task, "CompileTask", "_osr_bci", i64::from(osr_bci))?;
        Ok(task)
    }

    /// Creates a `ciEnv`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn ci_env(&mut self, compile: Option<Address>, task: Option<Address>) -> Result<Address> {
        let env = self.object("ciEnv")?;
        self.set_pointer(env, "ciEnv", "_compiler_data", compile.unwrap_or_default())?;
        self.set_pointer(env, "ciEnv", "_task", task.unwrap_or_default())?;
        Ok(env)
    }

    /// Creates a `CompilerThread`, idle if `env` is `None`.
    ///
    /// # Errors
    ///
    /// Arena exhaustion.
    pub fn compiler_thread(&mut self, env: Option<Address>) -> Result<Address> {
        let thread = self.object("CompilerThread")?;
        self.set_pointer(thread, "CompilerThread", "_env", env.unwrap_or_default())?;
        Ok(thread)
    }

    fn require_type(&self, name: &str) -> Result<TypeHandle> {
        self.layout
            .lookup_type(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    fn member(&self, type_name: &str, field: &str) -> Result<FieldInfo> {
        let ty = self.require_type(type_name)?;
        self.layout
            .field(&ty, field)
            .ok_or_else(|| Error::FieldNotFound {
                type_name: type_name.to_string(),
                field: field.to_string(),
            })
    }

    /// Allocates and fills a pointer array; an empty array is the null pointer.
    fn pointer_array(&mut self, elements: &[Address]) -> Result<Address> {
        if elements.is_empty() {
            return Ok(Address::NULL);
        }
        let array = self.alloc(elements.len() * POINTER_SIZE)?;
        for (index, element) in elements.iter().enumerate() {
            self.arena
                .write_pointer(array.plus_offset((index * POINTER_SIZE) as u64), *element)?;
        }
        Ok(array)
    }

    fn fill_growable_array(&mut self, header: Address, elements: &[Address]) -> Result<()> {
        let data = self.pointer_array(elements)?;
        self.set_int(header, "GrowableArrayBase", "_len", elements.len() as i64)?;
        self.set_int(header, "GrowableArrayBase", "_max", elements.len() as i64)?;
        self.set_pointer(header, "GrowableArrayView<int>", "_data", data)
    }

    fn fill_node_list(&mut self, list: Address, nodes: &[Address], max: usize) -> Result<()> {
        if max < nodes.len() {
            return Err(malformed_error!(
                "Node_List of capacity {} cannot hold {} nodes",
                max,
                nodes.len()
            ));
        }
        let mut slots = nodes.to_vec();
        slots.resize(max, Address::NULL);
        let data = self.pointer_array(&slots)?;
        self.set_pointer(list, "Node_Array", "_nodes", data)?;
        self.set_int(list, "Node_Array", "_max", max as i64)?;
        self.set_int(list, "Node_List", "_cnt", nodes.len() as i64)
    }

    fn fill_block_array(&mut self, array: Address, blocks: &[Address]) -> Result<()> {
        let data = self.pointer_array(blocks)?;
        self.set_pointer(array, "Block_Array", "_blocks", data)?;
        self.set_int(array, "Block_Array", "_size", blocks.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_layout_is_consistent() {
        let layout = standard_layout().unwrap();
        assert_eq!(layout.len(), TYPES.len());

        let node = layout.lookup_type("Node").unwrap();
        let call = layout.lookup_type("MachCallStaticJavaNode").unwrap();
        assert!(layout.is_subtype(&call, &node));
        assert_eq!(layout.field(&call, "_idx").unwrap().offset, 0x28);

        let block = layout.lookup_type("Block").unwrap();
        assert_eq!(layout.double_field(&block, "_freq").unwrap().offset, 0x08);
    }

    #[test]
    fn objects_carry_their_vtable() {
        let mut target = SyntheticTarget::new().unwrap();
        let node = target.node("CallLeafNode", 3).unwrap();
        let tree = target.object("InlineTree").unwrap();
        let image = target.target().unwrap();

        let vtable = image.memory().read_pointer(node).unwrap();
        assert_eq!(Some(vtable), target.vtable("CallLeafNode"));
        assert!(image.memory().read_pointer(tree).unwrap().is_null());
        assert_eq!(node.value() % 16, 0);
    }

    #[test]
    fn arena_exhaustion() {
        let mut target = SyntheticTarget::with_capacity(0x100).unwrap();
        assert!(target.alloc(0x80).is_ok());
        assert!(matches!(
            target.alloc(0x100),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn snapshots_are_independent() {
        let mut target = SyntheticTarget::new().unwrap();
        let node = target.node("AddINode", 1).unwrap();
        let before = target.target().unwrap();
        target.set_int(node, "Node", "_idx", 9).unwrap();
        let after = target.target().unwrap();

        let idx = Address::new(node.value() + 0x28);
        assert_eq!(before.memory().read_c_int(idx, 4, false).unwrap(), 1);
        assert_eq!(after.memory().read_c_int(idx, 4, false).unwrap(), 9);
    }

    #[test]
    fn unknown_caller_frame() {
        let mut target = SyntheticTarget::new().unwrap();
        assert!(target.jvms(None, 0, Some(Address::new(0x10))).is_err());
    }
}
