use thiserror::Error;

use crate::target::Address;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can report.
///
/// Errors fall into a handful of categories. Each of them is fatal for the walk that
/// produced it: a layout mismatch means every further offset is suspect, and a failed
/// read against a suspended process or a memory image is not transient.
///
/// # Error Categories
///
/// ## Layout Mismatch
/// - [`Error::TypeNotFound`] - A struct the walker depends on is absent from the target
/// - [`Error::FieldNotFound`] - A struct is present but lacks an expected member
/// - [`Error::WrongFieldKind`] - A member exists but decodes differently than expected
///
/// ## Session State
/// - [`Error::NotInitialized`] - Layout access before the target was initialized
/// - [`Error::LockError`] - Thread synchronization failure
///
/// ## Memory Access
/// - [`Error::UnmappedAddress`] - The address is not backed by any readable memory
/// - [`Error::OutOfBounds`] - A read straddles the end of a mapped region
/// - [`Error::Malformed`] - Memory contents are inconsistent with the expected structure
/// - [`Error::EdgeIndex`] - An edge slot past the end of a node's edge array
/// - [`Error::Io`] - I/O failure while mapping a memory image or writing a dump
///
/// An unidentifiable dynamic node type is *not* an error; see
/// [`crate::Session::node_at`].
///
/// # Examples
///
/// ```rust,no_run
/// use optoscope::{Address, Error, Session};
///
/// let session = Session::new();
/// match session.node_at(Address::new(0x7f00_0000_1000)) {
///     Ok(Some(node)) => println!("node {}", node.name()),
///     Ok(None) => println!("null"),
///     Err(Error::NotInitialized) => eprintln!("attach to a target first"),
///     Err(e) if e.is_layout_mismatch() => eprintln!("unsupported target: {e}"),
///     Err(e) => eprintln!("walk failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // Layout mismatch
    /// The target's type database has no struct of the requested name.
    ///
    /// This signals an unsupported or incompatible target binary.
    #[error("Type '{0}' is not present in the target type database")]
    TypeNotFound(String),

    /// The struct exists but has no member of the requested name.
    #[error("Type '{type_name}' has no field '{field}'")]
    FieldNotFound {
        /// Name of the struct that was searched
        type_name: String,
        /// Name of the missing member
        field: String,
    },

    /// The member exists but its recorded decode kind differs from the one requested.
    #[error("Field '{type_name}::{field}' is {found}, expected {expected}")]
    WrongFieldKind {
        /// Name of the struct owning the member
        type_name: String,
        /// Name of the member
        field: String,
        /// The decode kind the caller asked for
        expected: String,
        /// The decode kind recorded by the type database
        found: String,
    },

    // Session state
    /// Layout information was requested before the target was initialized.
    ///
    /// Field offsets are only meaningful once the type database of an attached target has
    /// been handed to [`crate::Session::target_initialized`].
    #[error("Target type database has not been initialized")]
    NotInitialized,

    /// Failed to lock target.
    ///
    /// This error occurs when a mutex or rwlock guarding session state has been
    /// poisoned by a panicking thread.
    #[error("Failed to lock target")]
    LockError,

    // Memory access
    /// The address is not backed by any readable memory of the target.
    #[error("Address {0} is not mapped")]
    UnmappedAddress(Address),

    /// A read starting inside a mapped region runs past its end.
    #[error("Read of {len} bytes at {address} exceeds the mapped region")]
    OutOfBounds {
        /// Start of the attempted read
        address: Address,
        /// Length of the attempted read
        len: usize,
    },

    /// Memory contents are inconsistent with the structure being decoded.
    ///
    /// Typical causes are a resumed target, a freed compilation arena or a layout that
    /// matches by name but not by content. The error records where it was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An edge slot beyond the end of a node's input or output array was requested.
    #[error("Edge index {index} is out of range for {count} slots")]
    EdgeIndex {
        /// Requested slot
        index: usize,
        /// Number of slots available
        count: usize,
    },

    /// I/O error while mapping a memory image or writing a dump.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for errors that mean the target's layout does not match what the
    /// walker expects.
    ///
    /// These errors are fatal for the whole session: every further offset depends on the
    /// same type database.
    #[must_use]
    pub fn is_layout_mismatch(&self) -> bool {
        matches!(
            self,
            Error::TypeNotFound(_) | Error::FieldNotFound { .. } | Error::WrongFieldKind { .. }
        )
    }
}

impl From<std::fmt::Error> for Error {
    fn from(error: std::fmt::Error) -> Self {
        Error::Error(error.to_string())
    }
}
