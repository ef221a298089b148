//! Remote memory access and the in-memory image backend.
//!
//! The walker never dereferences target pointers itself. Every byte it looks at goes
//! through the [`RemoteMemory`] trait, which models the debugger's memory accessor: given
//! an address, read `N` bytes. Pointer, C integer and floating point readers are derived
//! from that single primitive and honor the target's pointer width and byte order.
//!
//! # Key Components
//!
//! - [`RemoteMemory`] - Trait implemented by every memory source
//! - [`MemoryImage`] - Sparse set of memory segments, owned or memory-mapped
//! - [`SegmentBuilder`] - Lays out a synthetic segment value by value
//!
//! # Examples
//!
//! ```rust
//! use optoscope::{Address, MemoryImage, RemoteMemory, SegmentBuilder};
//!
//! let image = MemoryImage::new(8);
//! let mut segment = SegmentBuilder::new(Address::new(0x1000), 0x100, 8);
//! segment.write_pointer(Address::new(0x1008), Address::new(0x1040))?;
//! segment.write_c_int(Address::new(0x1010), 4, 17)?;
//! segment.install(&image)?;
//!
//! assert_eq!(image.read_pointer(Address::new(0x1008))?, Address::new(0x1040));
//! assert_eq!(image.read_c_int(Address::new(0x1010), 4, false)?, 17);
//! assert!(image.read_pointer(Address::new(0x9000)).is_err());
//! # Ok::<(), optoscope::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`MemoryImage`] keeps its segments in a lock-free ordered map and can be shared between
//! threads. Segments are expected to be added while the image is being assembled, before
//! any walk starts.

use std::{ops::Bound, path::Path};

use crossbeam_skiplist::SkipMap;

use crate::{
    target::{
        io::{decode, decode_c_int, encode, RemoteIO},
        physical::Physical,
        Address,
    },
    Error::{OutOfBounds, UnmappedAddress},
    Result,
};

/// Read access to the memory of a debug target.
///
/// Implementations only have to provide [`RemoteMemory::read_bytes`] and the pointer
/// width; all typed readers are derived. Reads are blocking and may fail at any time if
/// the target is not in the expected state. Such failures are reported, never masked.
pub trait RemoteMemory: Send + Sync {
    /// Fills `out` with the bytes starting at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if any byte of the range is not readable.
    fn read_bytes(&self, address: Address, out: &mut [u8]) -> Result<()>;

    /// Size of a pointer in the target, in bytes.
    fn address_size(&self) -> usize;

    /// Byte order of the target. Defaults to little-endian.
    fn is_big_endian(&self) -> bool {
        false
    }

    /// Reads a pointer-sized value at `address`.
    ///
    /// # Errors
    ///
    /// Propagates read failures and rejects pointer widths other than 4 and 8.
    fn read_pointer(&self, address: Address) -> Result<Address> {
        let mut buffer = [0u8; 8];
        let size = self.address_size();
        let Some(slice) = buffer.get_mut(..size) else {
            return Err(malformed_error!("unsupported pointer width {}", size));
        };
        self.read_bytes(address, slice)?;
        let value = match size {
            4 => u64::from(decode::<u32>(slice, self.is_big_endian())?),
            8 => decode::<u64>(slice, self.is_big_endian())?,
            _ => return Err(malformed_error!("unsupported pointer width {}", size)),
        };
        Ok(Address::new(value))
    }

    /// Reads a C integer of `width` bytes at `address`.
    ///
    /// # Errors
    ///
    /// Propagates read failures and rejects widths other than 1, 2, 4 and 8.
    fn read_c_int(&self, address: Address, width: u8, signed: bool) -> Result<i64> {
        let mut buffer = [0u8; 8];
        let Some(slice) = buffer.get_mut(..usize::from(width)) else {
            return Err(malformed_error!("unsupported C integer width {}", width));
        };
        self.read_bytes(address, slice)?;
        decode_c_int(slice, width, signed, self.is_big_endian())
    }

    /// Reads a 32-bit IEEE float at `address`.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn read_f32(&self, address: Address) -> Result<f32> {
        let mut buffer = [0u8; 4];
        self.read_bytes(address, &mut buffer)?;
        decode::<f32>(&buffer, self.is_big_endian())
    }

    /// Reads a 64-bit IEEE double at `address`.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    fn read_f64(&self, address: Address) -> Result<f64> {
        let mut buffer = [0u8; 8];
        self.read_bytes(address, &mut buffer)?;
        decode::<f64>(&buffer, self.is_big_endian())
    }

    /// Reads a NUL-terminated string of at most [`MAX_C_STRING_LENGTH`] bytes.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Propagates read failures; a missing terminator is [`crate::Error::Malformed`].
    fn read_c_string(&self, address: Address) -> Result<String> {
        let mut bytes = Vec::new();
        let mut byte = [0u8; 1];
        for offset in 0..MAX_C_STRING_LENGTH as u64 {
            self.read_bytes(address.plus_offset(offset), &mut byte)?;
            if byte[0] == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(byte[0]);
        }
        Err(malformed_error!("unterminated string at {}", address))
    }
}

/// Upper bound on element counts read from the target.
///
/// Counts are read from memory that may be stale or garbage; anything larger is reported
/// as malformed instead of being allocated.
pub const MAX_ARRAY_LENGTH: usize = 1 << 20;

/// Upper bound on the length of C strings read from the target.
pub const MAX_C_STRING_LENGTH: usize = 4096;

/// Reads `count` consecutive pointers starting at `base`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `count` exceeds [`MAX_ARRAY_LENGTH`] or a
/// non-empty array has a null base, and propagates read failures.
pub fn read_pointer_array(
    memory: &dyn RemoteMemory,
    base: Address,
    count: usize,
) -> Result<Vec<Address>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if count > MAX_ARRAY_LENGTH {
        return Err(malformed_error!(
            "array of {} elements at {} exceeds the sanity limit",
            count,
            base
        ));
    }
    if base.is_null() {
        return Err(malformed_error!("array of {} elements has a null base", count));
    }

    let size = memory.address_size();
    let mut buffer = vec![0u8; count * size];
    memory.read_bytes(base, &mut buffer)?;

    let big_endian = memory.is_big_endian();
    buffer
        .chunks_exact(size)
        .map(|chunk| {
            let value = match size {
                4 => u64::from(decode::<u32>(chunk, big_endian)?),
                8 => decode::<u64>(chunk, big_endian)?,
                _ => return Err(malformed_error!("unsupported pointer width {}", size)),
            };
            Ok(Address::new(value))
        })
        .collect()
}

/// Backing storage of one segment.
enum SegmentData {
    /// Bytes owned by the image
    Owned(Vec<u8>),
    /// Bytes of a memory-mapped file
    Mapped(Physical),
}

impl SegmentData {
    fn bytes(&self) -> &[u8] {
        match self {
            SegmentData::Owned(data) => data,
            SegmentData::Mapped(physical) => physical.data(),
        }
    }
}

/// A sparse memory image assembled from independent segments.
///
/// Each segment covers `[base, base + len)`. Reads must lie entirely within one segment;
/// a read that starts in a segment and runs past its end fails with
/// [`crate::Error::OutOfBounds`], a read that starts outside every segment fails with
/// [`crate::Error::UnmappedAddress`].
pub struct MemoryImage {
    /// Segments keyed by base address
    segments: SkipMap<u64, SegmentData>,
    /// Pointer width of the imaged target
    address_size: usize,
    /// Byte order of the imaged target
    big_endian: bool,
}

impl MemoryImage {
    /// Creates an empty little-endian image for a target with `address_size`-byte pointers.
    #[must_use]
    pub fn new(address_size: usize) -> Self {
        MemoryImage {
            segments: SkipMap::new(),
            address_size,
            big_endian: false,
        }
    }

    /// Switches the image to big-endian decoding.
    #[must_use]
    pub fn with_big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    /// Adds a segment of owned bytes at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Error`] if the segment is empty or overlaps an existing one.
    pub fn add_segment(&self, base: Address, data: Vec<u8>) -> Result<()> {
        self.insert(base, SegmentData::Owned(data))
    }

    /// Maps the file at `path` read-only and exposes its contents at `base`.
    ///
    /// This is how raw memory dumps of a region (for example a compiler arena saved by an
    /// external tool) are attached without reading them into memory.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the file cannot be opened, or the errors of
    /// [`MemoryImage::add_segment`].
    pub fn map_file(&self, base: Address, path: impl AsRef<Path>) -> Result<()> {
        let physical = Physical::new(path)?;
        self.insert(base, SegmentData::Mapped(physical))
    }

    /// Number of segments in the image.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Returns `true` if `address` lies within a segment.
    #[must_use]
    pub fn is_mapped(&self, address: Address) -> bool {
        self.locate(address).is_some()
    }

    fn insert(&self, base: Address, data: SegmentData) -> Result<()> {
        let len = data.bytes().len() as u64;
        if len == 0 {
            return Err(crate::Error::Error(format!("Empty segment at {base}")));
        }
        let Some(end) = base.value().checked_add(len) else {
            return Err(crate::Error::Error(format!(
                "Segment at {base} wraps the address space"
            )));
        };

        if self.locate(base).is_some() {
            return Err(crate::Error::Error(format!(
                "Segment at {base} overlaps an existing segment"
            )));
        }
        if let Some(next) = self
            .segments
            .lower_bound(Bound::Excluded(&base.value()))
        {
            if *next.key() < end {
                return Err(crate::Error::Error(format!(
                    "Segment at {base} overlaps the segment at {}",
                    Address::new(*next.key())
                )));
            }
        }

        self.segments.insert(base.value(), data);
        Ok(())
    }

    /// Finds the segment containing `address` and the offset of `address` within it.
    fn locate(
        &self,
        address: Address,
    ) -> Option<(crossbeam_skiplist::map::Entry<'_, u64, SegmentData>, usize)> {
        let entry = self
            .segments
            .upper_bound(Bound::Included(&address.value()))?;
        let offset = usize::try_from(address.value() - *entry.key()).ok()?;
        if offset < entry.value().bytes().len() {
            Some((entry, offset))
        } else {
            None
        }
    }
}

impl RemoteMemory for MemoryImage {
    fn read_bytes(&self, address: Address, out: &mut [u8]) -> Result<()> {
        let Some((entry, offset)) = self.locate(address) else {
            return Err(UnmappedAddress(address));
        };

        let data = entry.value().bytes();
        let Some(end) = offset.checked_add(out.len()) else {
            return Err(OutOfBounds {
                address,
                len: out.len(),
            });
        };
        let Some(source) = data.get(offset..end) else {
            return Err(OutOfBounds {
                address,
                len: out.len(),
            });
        };

        out.copy_from_slice(source);
        Ok(())
    }

    fn address_size(&self) -> usize {
        self.address_size
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }
}

/// Writes typed values into a zero-filled buffer that becomes one [`MemoryImage`] segment.
///
/// Addresses passed to the writers are absolute target addresses; the builder translates
/// them into offsets within its buffer.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    base: Address,
    data: Vec<u8>,
    address_size: usize,
    big_endian: bool,
}

impl SegmentBuilder {
    /// Creates a zero-filled segment of `size` bytes starting at `base`.
    #[must_use]
    pub fn new(base: Address, size: usize, address_size: usize) -> Self {
        SegmentBuilder {
            base,
            data: vec![0u8; size],
            address_size,
            big_endian: false,
        }
    }

    /// Switches the builder to big-endian encoding.
    #[must_use]
    pub fn with_big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    /// First address of the segment.
    #[must_use]
    pub fn base(&self) -> Address {
        self.base
    }

    /// Copies `bytes` into the segment at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range is not inside the segment.
    pub fn write_bytes(&mut self, at: Address, bytes: &[u8]) -> Result<()> {
        let out_of_bounds = OutOfBounds {
            address: at,
            len: bytes.len(),
        };
        let Some(offset) = at.value().checked_sub(self.base.value()) else {
            return Err(out_of_bounds);
        };
        let Ok(offset) = usize::try_from(offset) else {
            return Err(out_of_bounds);
        };
        let Some(target) = offset
            .checked_add(bytes.len())
            .and_then(|end| self.data.get_mut(offset..end))
        else {
            return Err(out_of_bounds);
        };

        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Writes a primitive value at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit.
    pub fn write<T: RemoteIO>(&mut self, at: Address, value: T) -> Result<()> {
        let bytes = encode(value, self.big_endian);
        self.write_bytes(at, &bytes)
    }

    /// Writes a pointer with the target's pointer width at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the pointer does not fit, or
    /// [`crate::Error::Malformed`] if the value does not fit the pointer width.
    pub fn write_pointer(&mut self, at: Address, value: Address) -> Result<()> {
        match self.address_size {
            4 => {
                let Ok(narrow) = u32::try_from(value.value()) else {
                    return Err(malformed_error!("{} does not fit a 32-bit pointer", value));
                };
                self.write(at, narrow)
            }
            8 => self.write(at, value.value()),
            size => Err(malformed_error!("unsupported pointer width {}", size)),
        }
    }

    /// Writes the low `width` bytes of `value` at `at`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the value does not fit, or
    /// [`crate::Error::Malformed`] for unsupported widths.
    pub fn write_c_int(&mut self, at: Address, width: u8, value: i64) -> Result<()> {
        // Truncation to the field width is the point of this writer
        match width {
            1 => self.write(at, value as u8),
            2 => self.write(at, value as u16),
            4 => self.write(at, value as u32),
            8 => self.write(at, value as u64),
            _ => Err(malformed_error!("unsupported C integer width {}", width)),
        }
    }

    /// Adds the finished segment to `image`.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`MemoryImage::add_segment`].
    pub fn install(self, image: &MemoryImage) -> Result<()> {
        image.add_segment(self.base, self.data)
    }
}
