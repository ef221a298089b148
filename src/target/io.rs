//! Endian-aware decoding of primitive values read from a target.
//!
//! Remote memory hands out raw bytes. This module turns them into integers and floating
//! point values with the byte order of the target, and performs the inverse for code that
//! lays out synthetic memory images. All functions are bounds checked and never panic on
//! short input.
//!
//! # Examples
//!
//! ```rust
//! use optoscope::target::io::{decode, encode};
//!
//! let bytes = encode(0x1234_5678_u32, false);
//! assert_eq!(bytes, vec![0x78, 0x56, 0x34, 0x12]);
//! assert_eq!(decode::<u32>(&bytes, false)?, 0x1234_5678);
//! assert_eq!(decode::<u32>(&bytes, true)?, 0x7856_3412);
//! # Ok::<(), optoscope::Error>(())
//! ```

use crate::Result;

/// Trait for primitive types that can be decoded from target memory.
///
/// Each implementation defines a `Bytes` associated type that represents the fixed-size
/// byte array required for that particular type (e.g., `[u8; 4]` for `u32`).
pub trait RemoteIO: Sized + Copy {
    /// Fixed-size byte array holding one encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_remote_io {
    ($($ty:ty),* $(,)?) => {
        $(
            impl RemoteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_remote_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Decodes a `T` from the start of `data`.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if `data` is shorter than `T`.
pub fn decode<T: RemoteIO>(data: &[u8], big_endian: bool) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(slice) = data.get(..type_len) else {
        return Err(malformed_error!(
            "need {} bytes to decode, have {}",
            type_len,
            data.len()
        ));
    };

    let Ok(bytes) = T::Bytes::try_from(slice) else {
        return Err(malformed_error!("cannot convert {} bytes", type_len));
    };

    Ok(if big_endian {
        T::from_be_bytes(bytes)
    } else {
        T::from_le_bytes(bytes)
    })
}

/// Decodes a C integer of `width` bytes, sign- or zero-extending it to 64 bits.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for widths other than 1, 2, 4 and 8, or when
/// `data` is too short.
pub fn decode_c_int(data: &[u8], width: u8, signed: bool, big_endian: bool) -> Result<i64> {
    let value = match (width, signed) {
        (1, true) => i64::from(decode::<i8>(data, big_endian)?),
        (1, false) => i64::from(decode::<u8>(data, big_endian)?),
        (2, true) => i64::from(decode::<i16>(data, big_endian)?),
        (2, false) => i64::from(decode::<u16>(data, big_endian)?),
        (4, true) => i64::from(decode::<i32>(data, big_endian)?),
        (4, false) => i64::from(decode::<u32>(data, big_endian)?),
        (8, true) => decode::<i64>(data, big_endian)?,
        // Reinterpretation: 64-bit unsigned fields keep their bit pattern
        (8, false) => decode::<u64>(data, big_endian)? as i64,
        _ => return Err(malformed_error!("unsupported C integer width {}", width)),
    };
    Ok(value)
}

/// Encodes `value` with the requested byte order.
pub fn encode<T: RemoteIO>(value: T, big_endian: bool) -> Vec<u8> {
    if big_endian {
        value.to_be_bytes().as_ref().to_vec()
    } else {
        value.to_le_bytes().as_ref().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_little_and_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(decode::<u16>(&data, false).unwrap(), 0x0201);
        assert_eq!(decode::<u16>(&data, true).unwrap(), 0x0102);
        assert_eq!(decode::<u64>(&data, false).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn decode_short_buffer_fails() {
        let data = [0x01, 0x02];
        assert!(decode::<u32>(&data, false).is_err());
    }

    #[test]
    fn c_int_sign_extension() {
        let data = [0xFF, 0xFF, 0xFF, 0xFF];
        assert_eq!(decode_c_int(&data, 4, true, false).unwrap(), -1);
        assert_eq!(decode_c_int(&data, 4, false, false).unwrap(), 0xFFFF_FFFF);
        assert_eq!(decode_c_int(&data, 1, true, false).unwrap(), -1);
        assert_eq!(decode_c_int(&data, 2, false, false).unwrap(), 0xFFFF);
        assert!(decode_c_int(&data, 3, false, false).is_err());
    }

    #[test]
    fn floating_point_roundtrip() {
        let bytes = encode(0.75_f64, false);
        assert_eq!(decode::<f64>(&bytes, false).unwrap(), 0.75);
        let bytes = encode(-2.5_f32, true);
        assert_eq!(decode::<f32>(&bytes, true).unwrap(), -2.5);
    }
}
