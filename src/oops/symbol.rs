use crate::{session::Session, target::Address, Result};

field_table! {
    /// Members of `Symbol`
    pub(crate) struct SymbolFields = "Symbol" {
        length: CInt("_length"),
        body: Embedded("_body"),
    }
}

/// A view of a VM `Symbol`, a length-prefixed byte string stored inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol {
    address: Address,
}

impl Symbol {
    /// Wraps the symbol at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| Symbol { address })
    }

    /// Length of the symbol in bytes.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn length(&self, session: &Session) -> Result<u16> {
        let state = session.state()?;
        state
            .symbol_fields()?
            .length
            .read_int::<u16>(state.memory(), self.address)
    }

    /// Raw bytes of the symbol, in modified UTF-8.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn as_bytes(&self, session: &Session) -> Result<Vec<u8>> {
        let state = session.state()?;
        let fields = state.symbol_fields()?;
        let length = fields.length.read_int::<u16>(state.memory(), self.address)?;

        let mut bytes = vec![0u8; usize::from(length)];
        if !bytes.is_empty() {
            state
                .memory()
                .read_bytes(fields.body.address_in(self.address), &mut bytes)?;
        }
        Ok(bytes)
    }

    /// The symbol as a string; invalid sequences are replaced.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn as_string(&self, session: &Session) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.as_bytes(session)?).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Fixture;

    #[test]
    fn symbols() {
        let mut fixture = Fixture::new();
        let empty = fixture.symbol("").unwrap();
        let name = fixture.symbol("<init>").unwrap();
        let session = fixture.session();

        let name = Symbol::new(name).unwrap();
        assert_eq!(name.length(&session).unwrap(), 6);
        assert_eq!(name.as_string(&session).unwrap(), "<init>");
        assert_eq!(Symbol::new(empty).unwrap().as_string(&session).unwrap(), "");
        assert!(Symbol::new(Address::NULL).is_none());
    }
}
