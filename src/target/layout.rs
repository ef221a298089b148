//! Type layout registry of a debug target.
//!
//! The walker knows the *names* of the C++ structs and members it reads (`Node::_in`,
//! `JVMState::_caller`, ...) but never their offsets. Offsets, sizes, the superclass
//! relation and the mapping from a live object to its most derived type all come from a
//! [`TypeLayout`], which models the type database a debugger builds from the target's
//! exported VM structs.
//!
//! [`LayoutDatabase`] is a simple in-memory registry assembled with
//! [`LayoutDatabaseBuilder`]. It identifies the dynamic type of an object by its first
//! machine word, which for polymorphic C++ classes is the vtable pointer.
//!
//! # Examples
//!
//! ```rust
//! use optoscope::{Address, FieldKind, LayoutDatabase, TypeLayout};
//!
//! let layout = LayoutDatabase::builder()
//!     .add_type("Node", None, 0x38)
//!     .add_type("AddNode", Some("Node"), 0x38)
//!     .add_field("Node", "_idx", 0x28, FieldKind::CInt { width: 4, signed: false })
//!     .add_vtable(Address::new(0x7f00_0010_0000), "AddNode")
//!     .build()?;
//!
//! let add = layout.lookup_type("AddNode").unwrap();
//! let node = layout.lookup_type("Node").unwrap();
//! assert!(layout.is_subtype(&add, &node));
//! assert_eq!(layout.c_int_field(&add, "_idx")?.offset, 0x28);
//! # Ok::<(), optoscope::Error>(())
//! ```

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::Arc,
};

use crate::{
    target::{memory::RemoteMemory, Address},
    Error, Result,
};

/// Upper bound on superclass chain length; deeper chains indicate a cycle.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// How the bytes of a struct member are decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// A pointer-sized address
    Address,
    /// A C integer of `width` bytes
    CInt {
        /// Width in bytes: 1, 2, 4 or 8
        width: u8,
        /// Whether the value is sign-extended
        signed: bool,
    },
    /// A 32-bit IEEE float
    Float,
    /// A 64-bit IEEE double
    Double,
    /// A struct stored inline; its address is the owner's address plus the offset
    Embedded,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Address => write!(f, "address"),
            FieldKind::CInt { width, signed } => write!(
                f,
                "{width}-byte {} integer",
                if *signed { "signed" } else { "unsigned" }
            ),
            FieldKind::Float => write!(f, "float"),
            FieldKind::Double => write!(f, "double"),
            FieldKind::Embedded => write!(f, "embedded struct"),
        }
    }
}

/// A struct known to the type database.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    name: Arc<str>,
    size: u64,
}

impl TypeHandle {
    /// Creates a handle for the struct `name` of `size` bytes.
    pub fn new(name: impl Into<Arc<str>>, size: u64) -> Self {
        TypeHandle {
            name: name.into(),
            size,
        }
    }

    /// Name of the struct as spelled in the target.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size of the struct in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Location and decode kind of one struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    /// Byte offset from the start of the owning struct
    pub offset: u64,
    /// How the member is decoded
    pub kind: FieldKind,
}

/// Queries against the type database of a target.
///
/// Only the lookups are required; the typed field accessors are derived and turn a
/// missing member or a member of another kind into the matching layout-mismatch error.
pub trait TypeLayout: Send + Sync {
    /// Looks up a struct by name.
    fn lookup_type(&self, name: &str) -> Option<TypeHandle>;

    /// Looks up a member of `ty`, including members inherited from its superclasses.
    fn field(&self, ty: &TypeHandle, name: &str) -> Option<FieldInfo>;

    /// Direct superclass of `ty`, if any.
    fn superclass(&self, ty: &TypeHandle) -> Option<TypeHandle>;

    /// Every struct known to the database.
    fn types(&self) -> Vec<TypeHandle>;

    /// Determines the most derived type of the object at `address`, which is statically
    /// known to be a `base`.
    ///
    /// Returns `Ok(None)` if the object's type cannot be identified.
    ///
    /// # Errors
    ///
    /// Propagates failures of the memory reads needed to probe the object.
    fn find_dynamic_type(
        &self,
        memory: &dyn RemoteMemory,
        address: Address,
        base: &TypeHandle,
    ) -> Result<Option<TypeHandle>>;

    /// Returns `true` if `ty` is `base` or derives from it.
    fn is_subtype(&self, ty: &TypeHandle, base: &TypeHandle) -> bool {
        let mut current = Some(ty.clone());
        for _ in 0..MAX_HIERARCHY_DEPTH {
            match current {
                Some(candidate) if candidate.name() == base.name() => return true,
                Some(candidate) => current = self.superclass(&candidate),
                None => return false,
            }
        }
        false
    }

    /// Looks up a member that must decode as an address.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] or [`Error::WrongFieldKind`].
    fn address_field(&self, ty: &TypeHandle, name: &str) -> Result<FieldInfo> {
        expect_field(self, ty, name, "address", |kind| {
            matches!(kind, FieldKind::Address)
        })
    }

    /// Looks up a member that must decode as a C integer of any width.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] or [`Error::WrongFieldKind`].
    fn c_int_field(&self, ty: &TypeHandle, name: &str) -> Result<FieldInfo> {
        expect_field(self, ty, name, "C integer", |kind| {
            matches!(kind, FieldKind::CInt { .. })
        })
    }

    /// Looks up a member that must decode as a double.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] or [`Error::WrongFieldKind`].
    fn double_field(&self, ty: &TypeHandle, name: &str) -> Result<FieldInfo> {
        expect_field(self, ty, name, "double", |kind| {
            matches!(kind, FieldKind::Double)
        })
    }

    /// Looks up a member that must decode as a float.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] or [`Error::WrongFieldKind`].
    fn float_field(&self, ty: &TypeHandle, name: &str) -> Result<FieldInfo> {
        expect_field(self, ty, name, "float", |kind| matches!(kind, FieldKind::Float))
    }

    /// Looks up a member that is a struct stored inline.
    ///
    /// # Errors
    ///
    /// [`Error::FieldNotFound`] or [`Error::WrongFieldKind`].
    fn embedded_field(&self, ty: &TypeHandle, name: &str) -> Result<FieldInfo> {
        expect_field(self, ty, name, "embedded struct", |kind| {
            matches!(kind, FieldKind::Embedded)
        })
    }
}

fn expect_field<L: TypeLayout + ?Sized>(
    layout: &L,
    ty: &TypeHandle,
    name: &str,
    expected: &str,
    accepts: impl Fn(FieldKind) -> bool,
) -> Result<FieldInfo> {
    let Some(info) = layout.field(ty, name) else {
        return Err(Error::FieldNotFound {
            type_name: ty.name().to_string(),
            field: name.to_string(),
        });
    };

    if accepts(info.kind) {
        Ok(info)
    } else {
        Err(Error::WrongFieldKind {
            type_name: ty.name().to_string(),
            field: name.to_string(),
            expected: expected.to_string(),
            found: info.kind.to_string(),
        })
    }
}

#[derive(Debug)]
struct TypeRecord {
    handle: TypeHandle,
    superclass: Option<String>,
    fields: HashMap<String, FieldInfo>,
}

/// An in-memory type database.
///
/// Types are kept in name order so that [`TypeLayout::types`] is deterministic.
#[derive(Debug)]
pub struct LayoutDatabase {
    types: BTreeMap<String, TypeRecord>,
    vtables: HashMap<Address, String>,
}

impl LayoutDatabase {
    /// Starts assembling a new database.
    #[must_use]
    pub fn builder() -> LayoutDatabaseBuilder {
        LayoutDatabaseBuilder::default()
    }

    /// Number of types in the database.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if the database holds no types.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Type whose objects start with the vtable pointer `vtable`.
    #[must_use]
    pub fn type_for_vtable(&self, vtable: Address) -> Option<TypeHandle> {
        let name = self.vtables.get(&vtable)?;
        self.lookup_type(name)
    }
}

impl TypeLayout for LayoutDatabase {
    fn lookup_type(&self, name: &str) -> Option<TypeHandle> {
        self.types.get(name).map(|record| record.handle.clone())
    }

    fn field(&self, ty: &TypeHandle, name: &str) -> Option<FieldInfo> {
        let mut current = self.types.get(ty.name());
        for _ in 0..MAX_HIERARCHY_DEPTH {
            let record = current?;
            if let Some(info) = record.fields.get(name) {
                return Some(*info);
            }
            current = record
                .superclass
                .as_deref()
                .and_then(|parent| self.types.get(parent));
        }
        None
    }

    fn superclass(&self, ty: &TypeHandle) -> Option<TypeHandle> {
        let parent = self.types.get(ty.name())?.superclass.as_deref()?;
        self.lookup_type(parent)
    }

    fn types(&self) -> Vec<TypeHandle> {
        self.types
            .values()
            .map(|record| record.handle.clone())
            .collect()
    }

    fn find_dynamic_type(
        &self,
        memory: &dyn RemoteMemory,
        address: Address,
        base: &TypeHandle,
    ) -> Result<Option<TypeHandle>> {
        let vtable = memory.read_pointer(address)?;
        Ok(self
            .type_for_vtable(vtable)
            .filter(|ty| self.is_subtype(ty, base)))
    }
}

/// Assembles a [`LayoutDatabase`].
///
/// Declarations may appear in any order; consistency is checked by
/// [`LayoutDatabaseBuilder::build`].
#[derive(Debug, Default)]
pub struct LayoutDatabaseBuilder {
    types: Vec<(String, Option<String>, u64)>,
    fields: Vec<(String, String, FieldInfo)>,
    vtables: Vec<(Address, String)>,
}

impl LayoutDatabaseBuilder {
    /// Declares the struct `name` of `size` bytes deriving from `superclass`.
    #[must_use]
    pub fn add_type(mut self, name: &str, superclass: Option<&str>, size: u64) -> Self {
        self.types
            .push((name.to_string(), superclass.map(str::to_string), size));
        self
    }

    /// Declares the member `field` of `owner` at `offset`.
    #[must_use]
    pub fn add_field(mut self, owner: &str, field: &str, offset: u64, kind: FieldKind) -> Self {
        self.fields.push((
            owner.to_string(),
            field.to_string(),
            FieldInfo { offset, kind },
        ));
        self
    }

    /// Declares that objects whose first word is `vtable` are of type `name`.
    #[must_use]
    pub fn add_vtable(mut self, vtable: Address, name: &str) -> Self {
        self.vtables.push((vtable, name.to_string()));
        self
    }

    /// Validates the declarations and builds the database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeNotFound`] if a superclass, field owner or vtable refers to an
    /// undeclared type, and [`Error::Malformed`] for duplicate types or a cyclic hierarchy.
    pub fn build(self) -> Result<LayoutDatabase> {
        let mut types = BTreeMap::new();
        for (name, superclass, size) in self.types {
            let record = TypeRecord {
                handle: TypeHandle::new(name.as_str(), size),
                superclass,
                fields: HashMap::new(),
            };
            if types.insert(name.clone(), record).is_some() {
                return Err(malformed_error!("type '{}' declared twice", name));
            }
        }

        for record in types.values() {
            if let Some(parent) = &record.superclass {
                if !types.contains_key(parent) {
                    return Err(Error::TypeNotFound(parent.clone()));
                }
            }
        }

        for name in types.keys() {
            let mut current = Some(name);
            let mut depth = 0;
            while let Some(ty) = current {
                depth += 1;
                if depth > MAX_HIERARCHY_DEPTH {
                    return Err(malformed_error!("cyclic superclass chain at '{}'", name));
                }
                current = types.get(ty).and_then(|record| record.superclass.as_ref());
            }
        }

        for (owner, field, info) in self.fields {
            let Some(record) = types.get_mut(&owner) else {
                return Err(Error::TypeNotFound(owner));
            };
            record.fields.insert(field, info);
        }

        let mut vtables = HashMap::new();
        for (vtable, name) in self.vtables {
            if !types.contains_key(&name) {
                return Err(Error::TypeNotFound(name));
            }
            vtables.insert(vtable, name);
        }

        Ok(LayoutDatabase { types, vtables })
    }
}
