//! 7-bit variable-length integers
//!
//! Little-endian groups of 7 bits; the high bit of each byte is the
//! continuation flag.
//!
//! ```text
//! 300 = 0b1_0010_1100  ->  [0xAC, 0x02]
//! ```
//!
//! Integers of 16 bits or more may be written in this form instead of their
//! fixed width when that is shorter: at most 7, 21 or 49 significant bits for
//! 16, 32 or 64-bit values respectively.

use graphbin_core::{Error, Result};
use std::io::{Read, Write};

/// Maximum encoded length of a u32
pub const MAX_LEN_U32: usize = 5;

/// Maximum encoded length of a u64
pub const MAX_LEN_U64: usize = 10;

/// Write a u32 as a 7-bit varint
pub fn write_u32<W: Write + ?Sized>(w: &mut W, value: u32) -> Result<()> {
    write_u64(w, value as u64)
}

/// Write a u64 as a 7-bit varint
pub fn write_u64<W: Write + ?Sized>(w: &mut W, mut value: u64) -> Result<()> {
    let mut buf = [0u8; MAX_LEN_U64];
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf[len] = byte;
            len += 1;
            break;
        }
        buf[len] = byte | 0x80;
        len += 1;
    }
    w.write_all(&buf[..len])?;
    Ok(())
}

/// Read a 7-bit varint into a u32
pub fn read_u32<R: Read + ?Sized>(r: &mut R) -> Result<u32> {
    let value = read_with_limit(r, MAX_LEN_U32)?;
    u32::try_from(value).map_err(|_| Error::invalid_stream("7-bit encoded u32 overflows"))
}

/// Read a 7-bit varint into a u64
pub fn read_u64<R: Read + ?Sized>(r: &mut R) -> Result<u64> {
    read_with_limit(r, MAX_LEN_U64)
}

fn read_with_limit<R: Read + ?Sized>(r: &mut R, max_len: usize) -> Result<u64> {
    let mut result: u64 = 0;
    for i in 0..max_len {
        let mut byte = [0u8; 1];
        r.read_exact(&mut byte).map_err(Error::from_read)?;
        let group = (byte[0] & 0x7F) as u64;
        let shift = 7 * i as u32;
        if shift == 63 && group > 1 {
            return Err(Error::invalid_stream("7-bit encoded integer overflows"));
        }
        result |= group << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(result);
        }
    }
    Err(Error::invalid_stream("7-bit encoded integer is too long"))
}

/// Encoded length of a value
pub fn encoded_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    (bits.max(1) + 6) / 7
}

/// Significant-bit threshold for dynamic-width encoding of a given width
pub fn compact_threshold(width: u32) -> Option<u32> {
    match width {
        16 => Some(7),
        32 => Some(21),
        64 => Some(49),
        _ => None,
    }
}

/// Whether `raw` (two's complement, truncated to `width`) is shorter as a varint
pub fn fits_compact(raw: u64, width: u32) -> bool {
    match compact_threshold(width) {
        Some(bits) => raw >> bits == 0,
        None => false,
    }
}
