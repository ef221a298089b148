use crate::{
    session::Session,
    target::{read_pointer_array, Address},
    Result,
};

field_table! {
    /// Members of `GrowableArrayBase`
    pub(crate) struct GrowableArrayFields = "GrowableArrayBase" {
        len: CInt("_len"),
        max: CInt("_max"),
    }
}

field_table! {
    /// Data pointer of `GrowableArrayView`; the offset does not depend on the element type
    pub(crate) struct GrowableArrayDataFields = "GrowableArrayView<int>" {
        data: Address("_data"),
    }
}

/// A view of a `GrowableArray<T*>`.
///
/// The view is positioned at the array header, which is usually embedded in its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GrowableArray {
    address: Address,
}

impl GrowableArray {
    /// Wraps the array header at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| GrowableArray { address })
    }

    /// Address of the header.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of elements in use.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; [`crate::Error::Malformed`] if `_len` is negative or
    /// exceeds the capacity.
    pub fn len(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let fields = state.growable_array_fields()?;
        let memory = state.memory();

        let len = fields.len.read_int::<u32>(memory, self.address)?;
        let max = fields.max.read_int::<u32>(memory, self.address)?;
        if len > max {
            return Err(malformed_error!(
                "GrowableArray at {} holds {} elements but only {} slots",
                self.address,
                len,
                max
            ));
        }
        Ok(len as usize)
    }

    /// Returns `true` if no element is in use.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn is_empty(&self, session: &Session) -> Result<bool> {
        Ok(self.len(session)? == 0)
    }

    /// Allocated capacity.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn max(&self, session: &Session) -> Result<usize> {
        let state = session.state()?;
        let max = state
            .growable_array_fields()?
            .max
            .read_int::<u32>(state.memory(), self.address)?;
        Ok(max as usize)
    }

    /// The pointer elements in use, in order.
    ///
    /// # Errors
    ///
    /// Layout and memory errors, and those of [`GrowableArray::len`].
    pub fn addresses(&self, session: &Session) -> Result<Vec<Address>> {
        let len = self.len(session)?;
        let state = session.state()?;
        let data = state
            .growable_array_data_fields()?
            .data
            .read_address(state.memory(), self.address)?;
        read_pointer_array(state.memory(), data, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Fixture;

    #[test]
    fn elements_in_order() {
        let mut fixture = Fixture::new();
        let a = fixture.object("Symbol").unwrap();
        let b = fixture.object("Symbol").unwrap();
        let array = fixture.growable_array(&[a, b, Address::NULL]).unwrap();
        let empty = fixture.growable_array(&[]).unwrap();
        let session = fixture.session();

        let array = GrowableArray::new(array).unwrap();
        assert_eq!(array.len(&session).unwrap(), 3);
        assert_eq!(
            array.addresses(&session).unwrap(),
            vec![a, b, Address::NULL]
        );

        let empty = GrowableArray::new(empty).unwrap();
        assert!(empty.is_empty(&session).unwrap());
        assert!(empty.addresses(&session).unwrap().is_empty());
    }

    #[test]
    fn length_past_capacity_is_malformed() {
        let mut fixture = Fixture::new();
        let array = fixture.growable_array(&[Address::NULL]).unwrap();
        fixture.set_int(array, "GrowableArrayBase", "_len", 9).unwrap();
        let session = fixture.session();

        let array = GrowableArray::new(array).unwrap();
        assert!(matches!(
            array.len(&session),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(array.addresses(&session).is_err());
    }

    #[test]
    fn negative_length_is_malformed() {
        let mut fixture = Fixture::new();
        let array = fixture.growable_array(&[Address::NULL]).unwrap();
        fixture.set_int(array, "GrowableArrayBase", "_len", -1).unwrap();
        let session = fixture.session();

        let array = GrowableArray::new(array).unwrap();
        assert!(matches!(
            array.len(&session),
            Err(crate::Error::Malformed { .. })
        ));
        assert!(array.is_empty(&session).is_err());
    }
}
