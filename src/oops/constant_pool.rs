use crate::{
    oops::{Klass, Symbol},
    session::Session,
    target::Address,
    Result,
};

field_table! {
    /// Members of `ConstantPool`
    pub(crate) struct ConstantPoolFields = "ConstantPool" {
        pool_holder: Address("_pool_holder"),
    }
}

/// A view of a VM `ConstantPool`.
///
/// The pool's entries are pointer-sized slots laid out directly after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantPool {
    address: Address,
}

impl ConstantPool {
    /// Wraps the pool at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| ConstantPool { address })
    }

    /// The class owning the pool.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn pool_holder(&self, session: &Session) -> Result<Option<Klass>> {
        let state = session.state()?;
        let holder = state
            .constant_pool_fields()?
            .pool_holder
            .read_address(state.memory(), self.address)?;
        Ok(Klass::new(holder))
    }

    /// Address of entry `index`.
    ///
    /// # Errors
    ///
    /// [`crate::Error::TypeNotFound`] if the pool's header size is unknown.
    pub fn entry_address(&self, session: &Session, index: u16) -> Result<Address> {
        let state = session.state()?;
        let header = state.require_type(ConstantPoolFields::TYPE_NAME)?.size();
        let slot = state.target().address_size() as u64;
        Ok(self
            .address
            .plus_offset(header)
            .plus_offset(u64::from(index) * slot))
    }

    /// The symbol stored in entry `index`.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; an empty slot is malformed.
    pub fn symbol_at(&self, session: &Session, index: u16) -> Result<Symbol> {
        let state = session.state()?;
        let slot = self.entry_address(session, index)?;
        let symbol = state.memory().read_pointer(slot)?;
        Symbol::new(symbol).ok_or_else(|| {
            malformed_error!(
                "constant pool entry {} at {} holds no symbol",
                index,
                self.address
            )
        })
    }
}
