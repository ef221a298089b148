// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'target/physical.rs' uses mmap to map a memory image into the process

//! # optoscope
//!
//! Out-of-process inspection of the HotSpot C2 ("opto") compiler's data structures.
//!
//! `optoscope` reads the ideal graph, the scheduled basic blocks, the inlining tree and the
//! compile environment of a running or crashed JVM from a memory image, without executing
//! any code in the target. Every struct is located through the target's type database, so
//! the same walker works against any HotSpot build that exports its layout.
//!
//! ## Features
//!
//! - **Typed views** - Nodes, JVM states, blocks, inline trees and compile tasks read
//!   through field descriptors resolved once per target
//! - **Node identity** - One shared [`NodeRc`] per node address, so graph walks can compare
//!   by pointer
//! - **Dynamic dispatch** - The concrete node kind is recovered from the vtable and falls
//!   back to the nearest known ancestor
//! - **Graph walks** - Breadth-first collection over inputs or outputs with cycle handling
//! - **Dumps** - Node lines, CFG listings, inline tree printing and replay data
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use optoscope::prelude::*;
//!
//! # fn attach() -> Target { unimplemented!() }
//! # fn compiler_threads() -> Vec<Address> { Vec::new() }
//! let session = Session::new();
//! session.target_initialized(attach())?;
//!
//! run(&session, DumpCommand::Ideal, &compiler_threads(), &mut std::io::stdout())?;
//! # Ok::<(), optoscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`target`] - Remote memory, the type database and primitive decoding
//! - [`session`] - Per-target state: field descriptors, field tables, node identity
//! - [`opto`] - Nodes, JVM states, inline trees, node lists, blocks, the CFG and `Compile`
//! - [`ci`] - The compile environment, compile tasks and compiler threads
//! - [`oops`] - Just enough VM metadata to name methods
//! - [`vm`] - Runtime containers shared by the above
//! - [`commands`] - The dump commands, and the boundary where walk errors are reported
//! - [`synthetic`] - Hand-built targets for tests, benchmarks and documentation
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Reading garbage memory is never
//! fatal: a node walk over a stale pointer ends in [`Error::Malformed`],
//! [`Error::UnmappedAddress`] or [`Error::OutOfBounds`], and a type database that does not
//! match the target ends in one of the layout-mismatch errors.
//!
//! ```rust,no_run
//! use optoscope::{Address, Error, Session};
//!
//! # fn session() -> Session { Session::new() }
//! match session().node_at(Address::new(0x7f00_0000_1000)) {
//!     Ok(Some(node)) => println!("found {}", node.name()),
//!     Ok(None) => println!("null"),
//!     Err(Error::NotInitialized) => println!("attach first"),
//!     Err(e) if e.is_layout_mismatch() => println!("wrong type database: {e}"),
//!     Err(e) => println!("unreadable: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use optoscope::prelude::*;
///
/// let session = Session::new();
/// assert!(!session.is_initialized());
/// ```
pub mod prelude;

pub mod ci;
pub mod commands;
pub mod oops;
pub mod opto;
pub mod session;
pub mod synthetic;
pub mod target;
pub mod utils;
pub mod vm;

/// `optoscope` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `optoscope` Error type
///
/// The main error type for all operations of this crate. See [`Error`] for the layout
/// mismatch, memory and malformed-structure variants.
pub use error::Error;

pub use commands::DumpCommand;
pub use opto::{InlineTree, JvmState, Node, NodeKind, NodeRc};
pub use session::{FieldDescriptor, Session};
pub use target::{
    Address, FieldKind, LayoutDatabase, MemoryImage, RemoteMemory, SegmentBuilder, Target,
    TypeLayout,
};
