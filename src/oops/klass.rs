use crate::{oops::Symbol, session::Session, target::Address, Result};

field_table! {
    /// Members of `Klass`
    pub(crate) struct KlassFields = "Klass" {
        name: Address("_name"),
    }
}

/// A view of a VM `Klass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Klass {
    address: Address,
}

impl Klass {
    /// Wraps the class at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| Klass { address })
    }

    /// Symbol holding the class name.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn name(&self, session: &Session) -> Result<Option<Symbol>> {
        let state = session.state()?;
        let name = state
            .klass_fields()?
            .name
            .read_address(state.memory(), self.address)?;
        Ok(Symbol::new(name))
    }

    /// Class name in internal form, `?` if the class has no name.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn name_string(&self, session: &Session) -> Result<String> {
        match self.name(session)? {
            Some(symbol) => symbol.as_string(session),
            None => Ok("?".to_string()),
        }
    }
}
