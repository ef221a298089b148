//! Opaque handles into the address space of a debug target.
//!
//! An [`Address`] is nothing but a machine-word sized integer that refers to memory of
//! the target process or memory image. It carries no lifetime and no knowledge of what it
//! points to; meaning is attached by the views in [`crate::opto`], [`crate::ci`] and
//! [`crate::oops`] that wrap it.

use std::fmt;

/// An address in the target's address space.
///
/// Addresses are immutable and cheap to copy. The zero address is the target's null
/// pointer and never resolves to a view.
///
/// # Examples
///
/// ```rust
/// use optoscope::Address;
///
/// let base = Address::new(0x7f00_0000_1000);
/// assert_eq!(base.plus_offset(0x18).value(), 0x7f00_0000_1018);
/// assert!(Address::NULL.is_null());
/// assert_eq!(format!("{base}"), "0x00007f0000001000");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u64);

impl Address {
    /// The target's null pointer.
    pub const NULL: Address = Address(0);

    /// Creates an address from its raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Address(value)
    }

    /// Returns the raw value of this address.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Returns `true` for the null address.
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the address `offset` bytes past this one.
    ///
    /// Arithmetic wraps: addresses decoded from garbage memory must not abort the walker
    /// before the read itself reports the problem.
    #[must_use]
    pub const fn plus_offset(self, offset: u64) -> Self {
        Address(self.0.wrapping_add(offset))
    }

    /// Converts a null address into `None`.
    #[must_use]
    pub const fn non_null(self) -> Option<Address> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address(0x{:x})", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
