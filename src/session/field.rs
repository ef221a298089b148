//! Resolved field descriptors.
//!
//! A [`FieldDescriptor`] is the product of one successful layout lookup: the byte offset
//! of a member within its struct and the way its bytes are decoded. Descriptors are
//! resolved once per target and then used for every instance of the owning type.

use crate::{
    target::{Address, FieldInfo, FieldKind, RemoteMemory, TypeHandle, TypeLayout},
    Result,
};

/// The decode kind a caller requires of a member.
///
/// The request is checked against the [`FieldKind`] recorded by the type database when
/// the field is resolved. [`FieldRequest::CInt`] accepts integers of any width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRequest {
    /// A pointer-sized address
    Address,
    /// A C integer of any width and signedness
    CInt,
    /// A 64-bit double
    Double,
    /// A 32-bit float
    Float,
    /// A struct stored inline
    Embedded,
}

impl FieldRequest {
    /// Performs the typed layout lookup matching this request.
    pub(crate) fn lookup(
        self,
        layout: &dyn TypeLayout,
        ty: &TypeHandle,
        field: &str,
    ) -> Result<FieldInfo> {
        match self {
            FieldRequest::Address => layout.address_field(ty, field),
            FieldRequest::CInt => layout.c_int_field(ty, field),
            FieldRequest::Double => layout.double_field(ty, field),
            FieldRequest::Float => layout.float_field(ty, field),
            FieldRequest::Embedded => layout.embedded_field(ty, field),
        }
    }

    /// Returns `true` if a member of `kind` satisfies this request.
    #[must_use]
    pub fn accepts(self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FieldRequest::Address, FieldKind::Address)
                | (FieldRequest::CInt, FieldKind::CInt { .. })
                | (FieldRequest::Double, FieldKind::Double)
                | (FieldRequest::Float, FieldKind::Float)
                | (FieldRequest::Embedded, FieldKind::Embedded)
        )
    }
}

impl std::fmt::Display for FieldRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldRequest::Address => "address",
            FieldRequest::CInt => "C integer",
            FieldRequest::Double => "double",
            FieldRequest::Float => "float",
            FieldRequest::Embedded => "embedded struct",
        };
        f.write_str(name)
    }
}

/// Offset and decode kind of one struct member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Byte offset from the start of the owning struct
    pub offset: u64,
    /// How the member is decoded
    pub kind: FieldKind,
}

impl From<FieldInfo> for FieldDescriptor {
    fn from(info: FieldInfo) -> Self {
        FieldDescriptor {
            offset: info.offset,
            kind: info.kind,
        }
    }
}

impl FieldDescriptor {
    /// Address of this member within the object at `base`.
    ///
    /// For [`FieldKind::Embedded`] members this is the address of the embedded struct.
    #[must_use]
    pub fn address_in(&self, base: Address) -> Address {
        base.plus_offset(self.offset)
    }

    /// Reads the member as a pointer.
    ///
    /// # Errors
    ///
    /// Propagates memory read failures.
    pub fn read_address(&self, memory: &dyn RemoteMemory, base: Address) -> Result<Address> {
        memory.read_pointer(self.address_in(base))
    }

    /// Reads the member as an integer, sign- or zero-extended according to its kind.
    ///
    /// # Errors
    ///
    /// Propagates memory read failures; a non-integer descriptor is reported as
    /// [`crate::Error::Malformed`].
    pub fn read_c_int(&self, memory: &dyn RemoteMemory, base: Address) -> Result<i64> {
        match self.kind {
            FieldKind::CInt { width, signed } => {
                memory.read_c_int(self.address_in(base), width, signed)
            }
            other => Err(malformed_error!("read of a {} member as an integer", other)),
        }
    }

    /// Reads the member as an integer and checks that it fits `T`.
    ///
    /// # Errors
    ///
    /// Propagates memory read failures; out of range values are reported as
    /// [`crate::Error::Malformed`].
    pub fn read_int<T: TryFrom<i64>>(&self, memory: &dyn RemoteMemory, base: Address) -> Result<T> {
        let value = self.read_c_int(memory, base)?;
        T::try_from(value).map_err(|_| {
            malformed_error!(
                "value {} at {} is out of range for {}",
                value,
                self.address_in(base),
                std::any::type_name::<T>()
            )
        })
    }

    /// Reads the member as a float.
    ///
    /// # Errors
    ///
    /// Propagates memory read failures.
    pub fn read_f32(&self, memory: &dyn RemoteMemory, base: Address) -> Result<f32> {
        memory.read_f32(self.address_in(base))
    }

    /// Reads the member as a double.
    ///
    /// # Errors
    ///
    /// Propagates memory read failures.
    pub fn read_f64(&self, memory: &dyn RemoteMemory, base: Address) -> Result<f64> {
        memory.read_f64(self.address_in(base))
    }
}
