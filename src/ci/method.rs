use crate::{oops::Method, session::Session, target::Address, Result};

field_table! {
    /// Members of `ciMetadata`
    pub(crate) struct CiMetadataFields = "ciMetadata" {
        metadata: Address("_metadata"),
    }
}

/// A view of a compiler interface `ciMethod`.
///
/// Names are read through the VM `Method` the mirror was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CiMethod {
    address: Address,
}

impl CiMethod {
    /// Wraps the mirror at `address`; `None` for null.
    #[must_use]
    pub fn new(address: Address) -> Option<Self> {
        address.non_null().map(|address| CiMethod { address })
    }

    /// Address of the mirror.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The VM method this mirror stands for.
    ///
    /// # Errors
    ///
    /// Layout and memory errors; a mirror without a method is malformed.
    pub fn method(&self, session: &Session) -> Result<Method> {
        let state = session.state()?;
        let metadata = state
            .ci_metadata_fields()?
            .metadata
            .read_address(state.memory(), self.address)?;
        Method::new(metadata)
            .ok_or_else(|| malformed_error!("ciMethod at {} has no Method", self.address))
    }

    /// Name of the holder class, in internal form.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn holder_name(&self, session: &Session) -> Result<String> {
        self.method(session)?.holder_name(session)
    }

    /// Name of the method.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn name(&self, session: &Session) -> Result<String> {
        self.method(session)?.name(session)
    }

    /// Signature of the method.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn signature(&self, session: &Session) -> Result<String> {
        self.method(session)?.signature(session)
    }

    /// `holder::name`.
    ///
    /// # Errors
    ///
    /// Layout and memory errors.
    pub fn short_name(&self, session: &Session) -> Result<String> {
        self.method(session)?.short_name(session)
    }
}
