//! Memory-mapped file storage for memory image segments.
//!
//! [`Physical`] maps a raw dump of a region of target memory read-only into the walker's
//! address space. [`crate::MemoryImage::map_file`] wraps it as a segment so that large
//! arenas can be walked without reading them into memory upfront.

use std::{fs, path::Path};

use memmap2::Mmap;

use crate::{Error::Error, Result};

/// A read-only memory mapping of a file on disk.
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped file data
    data: Mmap,
}

impl Physical {
    /// Maps the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Io`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path)?;
        Self::from_std_file(file)
    }

    /// Maps an already opened file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if memory mapping fails.
    #[allow(clippy::needless_pass_by_value)]
    pub fn from_std_file(file: fs::File) -> Result<Physical> {
        // SAFETY: the mapping is read-only; a dump file truncated underneath a running
        // walk is outside what this backend supports.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|error| Error(error.to_string()))?;

        Ok(Physical { data: mmap })
    }

    /// The complete mapped contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Length of the mapping in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
