//! Views of VM metadata: methods, constant pools, classes and symbols.
//!
//! These are only walked as far as needed to print method and class names; a
//! [`Method`]'s name and signature are symbols referenced by index from the constant pool
//! of its declaring class.

mod constant_pool;
mod klass;
mod method;
mod symbol;

pub use constant_pool::ConstantPool;
pub use klass::Klass;
pub use method::{ConstMethod, Method};
pub use symbol::Symbol;

pub(crate) use constant_pool::ConstantPoolFields;
pub(crate) use klass::KlassFields;
pub(crate) use method::{ConstMethodFields, MethodFields};
pub(crate) use symbol::SymbolFields;
