use crate::{
    oops::{ConstantPool, Klass},
    session::Session,
    target::Address,
    Result,
};

field_table! {
    /// Members of `Method`
    pub(crate) struct MethodFields = "Method" {
        const_method: Address("_constMethod"),
    }
}

field_table! {
    /// Members of `ConstMethod`
    pub(crate) struct ConstMethodFields = "ConstMethod" {
        constants: Address("_constants"),
        name_index: CInt("_name_index"),
        signature_index: CInt("_signature_index"),
    }
}

/// A view of a VM `Method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Method {
    address: Address,
}

impl Method {
    /// Wraps the method at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| Method { address })
    }

    /// Address of the method.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The immutable part of the method.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; a method without one is malformed.
    pub fn const_method(&self, session: &Session) -> Result<ConstMethod> {
        let state = session.state()?;
        let address = state
            .method_fields()?
            .const_method
            .read_address(state.memory(), self.address)?;
        ConstMethod::new(address)
            .ok_or_else(|| malformed_error!("Method at {} has no ConstMethod", self.address))
    }

    /// The constant pool of the declaring class.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn constants(&self, session: &Session) -> Result<ConstantPool> {
        self.const_method(session)?.constants(session)
    }

    /// The declaring class.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn holder(&self, session: &Session) -> Result<Option<Klass>> {
        self.constants(session)?.pool_holder(session)
    }

    /// Name of the declaring class in internal form, `?` if unknown.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn holder_name(&self, session: &Session) -> Result<String> {
        match self.holder(session)? {
            Some(holder) => holder.name_string(session),
            None => Ok("?".to_string()),
        }
    }

    /// Name of the method.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn name(&self, session: &Session) -> Result<String> {
        let const_method = self.const_method(session)?;
        let index = const_method.name_index(session)?;
        const_method
            .constants(session)?
            .symbol_at(session, index)?
            .as_string(session)
    }

    /// Signature of the method.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn signature(&self, session: &Session) -> Result<String> {
        let const_method = self.const_method(session)?;
        let index = const_method.signature_index(session)?;
        const_method
            .constants(session)?
            .symbol_at(session, index)?
            .as_string(session)
    }

    /// `holder::name`.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn short_name(&self, session: &Session) -> Result<String> {
        Ok(format!(
            "{}::{}",
            self.holder_name(session)?,
            self.name(session)?
        ))
    }
}

/// A view of a VM `ConstMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstMethod {
    address: Address,
}

impl ConstMethod {
    /// Wraps the const method at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| ConstMethod { address })
    }

    /// The constant pool holding this method's names.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; a missing pool is malformed.
    pub fn constants(&self, session: &Session) -> Result<ConstantPool> {
        let state = session.state()?;
        let address = state
            .const_method_fields()?
            .constants
            .read_address(state.memory(), self.address)?;
        ConstantPool::new(address)
            .ok_or_else(|| malformed_error!("ConstMethod at {} has no constants", self.address))
    }

    /// Constant pool index of the name.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn name_index(&self, session: &Session) -> Result<u16> {
        let state = session.state()?;
        state
            .const_method_fields()?
            .name_index
            .read_int::<u16>(state.memory(), self.address)
    }

    /// Constant pool index of the signature.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn signature_index(&self, session: &Session) -> Result<u16> {
        let state = session.state()?;
        state
            .const_method_fields()?
            .signature_index
            .read_int::<u16>(state.memory(), self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::Fixture;

    #[test]
    fn names_through_the_constant_pool() {
        let mut fixture = Fixture::new();
        let method = fixture
            .method("java/util/HashMap", "putVal", "(ILjava/lang/Object;)V")
            .unwrap();
        let session = fixture.session();

        let method = Method::new(method).unwrap();
        assert_eq!(method.name(&session).unwrap(), "putVal");
        assert_eq!(
            method.signature(&session).unwrap(),
            "(ILjava/lang/Object;)V"
        );
        assert_eq!(method.holder_name(&session).unwrap(), "java/util/HashMap");
        assert_eq!(
            method.short_name(&session).unwrap(),
            "java/util/HashMap::putVal"
        );
    }
}
