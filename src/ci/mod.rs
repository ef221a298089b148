//! Views of the compiler interface: the environment a compiler thread works in, the
//! task it compiles and the `ci` mirrors of VM metadata the compiler reasons about.

mod env;
mod method;

pub use env::{CiEnv, CompileTask, CompilerThread};
pub use method::CiMethod;

pub(crate) use env::{CiEnvFields, CompileTaskFields, CompilerThreadFields};
pub(crate) use method::CiMetadataFields;
