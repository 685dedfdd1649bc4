//! Payload codec for built-in types
//!
//! # Binary Format
//!
//! ```text
//! Bool, I8, U8                 1 byte
//! I16/U16, I32/U32/F32/Char    2 / 4 bytes
//! I64/U64/F64/IntPtr/UIntPtr   8 bytes
//! String                       7-bit byte length + UTF-8
//! Decimal                      4 x u32 (lo, mid, hi, flags)
//! DateTime                     kind(1) + ticks(8)
//! DateTimeOffset               ticks(8) + offset minutes(2)
//! TimeSpan                     ticks(8)
//! Guid                         16 raw bytes
//! Version                      4 x i32, -1 for absent parts
//! Uri                          absolute(1) + string
//! BitArray                     7-bit bit count + ceil(n/32) x i32 words
//! BitVector32                  i32
//! BitVector32.Section          mask i16 + offset i16
//! StringBuilder                7-bit capacity + string
//! DBNull, Object               no payload
//! ```
//!
//! Integers of 16 bits and wider can alternatively be written as 7-bit
//! varints of their two's complement bits (see [`compact_bits`]).

use crate::io::{char_from_u32, BinaryReader, BinaryWriter};
use crate::varint;
use graphbin_core::{
    BitVectorSection, DateTime, DateTimeKind, DateTimeOffset, Decimal, Error, KnownType, Result,
    StringBuilder, TimeSpan, Uri, Value, Version,
};
use std::io::{Read, Write};
use uuid::Uuid;

fn mismatch(known: KnownType, value: &Value) -> Error {
    Error::InvalidOperation(format!(
        "value of type {} cannot be written as {}",
        value.type_name(),
        known
    ))
}

/// Write the fixed-width payload of a built-in value
pub fn write_known<W: Write>(
    w: &mut BinaryWriter<W>,
    known: KnownType,
    value: &Value,
) -> Result<()> {
    match (known, value) {
        (KnownType::Bool, Value::Bool(v)) => w.write_bool(*v),
        (KnownType::I8, Value::I8(v)) => w.write_i8(*v),
        (KnownType::U8, Value::U8(v)) => w.write_u8(*v),
        (KnownType::I16, Value::I16(v)) => w.write_i16(*v),
        (KnownType::U16, Value::U16(v)) => w.write_u16(*v),
        (KnownType::I32, Value::I32(v)) => w.write_i32(*v),
        (KnownType::U32, Value::U32(v)) => w.write_u32(*v),
        (KnownType::I64, Value::I64(v)) | (KnownType::IntPtr, Value::IntPtr(v)) => w.write_i64(*v),
        (KnownType::U64, Value::U64(v)) | (KnownType::UIntPtr, Value::UIntPtr(v)) => {
            w.write_u64(*v)
        }
        (KnownType::Char, Value::Char(v)) => w.write_char(*v),
        (KnownType::String, Value::String(v)) => w.write_string(v),
        (KnownType::F32, Value::F32(v)) => w.write_f32(*v),
        (KnownType::F64, Value::F64(v)) => w.write_f64(*v),
        (KnownType::Decimal, Value::Decimal(d)) => {
            for part in d.parts() {
                w.write_u32(part)?;
            }
            Ok(())
        }
        (KnownType::DateTime, Value::DateTime(dt)) => {
            w.write_u8(dt.kind() as u8)?;
            w.write_i64(dt.ticks())
        }
        (KnownType::DateTimeOffset, Value::DateTimeOffset(dto)) => {
            w.write_i64(dto.ticks)?;
            w.write_i16(dto.offset_minutes)
        }
        (KnownType::TimeSpan, Value::TimeSpan(ts)) => w.write_i64(ts.ticks),
        (KnownType::Guid, Value::Guid(g)) => w.write_bytes(&g.to_bytes_le()),
        (KnownType::Version, Value::Version(v)) => {
            w.write_i32(v.major)?;
            w.write_i32(v.minor)?;
            w.write_i32(v.build)?;
            w.write_i32(v.revision)
        }
        (KnownType::Uri, Value::Uri(u)) => {
            w.write_bool(u.absolute)?;
            w.write_string(&u.text)
        }
        (KnownType::BitArray, Value::BitArray(bits)) => {
            w.write_len(bits.len())?;
            for chunk in bits.chunks(32) {
                let word = chunk
                    .iter()
                    .enumerate()
                    .fold(0u32, |acc, (i, &b)| acc | ((b as u32) << i));
                w.write_i32(word as i32)?;
            }
            Ok(())
        }
        (KnownType::BitVector32, Value::BitVector32(v)) => w.write_i32(*v),
        (KnownType::BitVector32Section, Value::BitVector32Section(s)) => {
            w.write_i16(s.mask)?;
            w.write_i16(s.offset)
        }
        (KnownType::StringBuilder, Value::StringBuilder(sb)) => {
            w.write_7bit(sb.capacity.max(0) as u32)?;
            w.write_string(&sb.text)
        }
        (KnownType::DbNull, Value::DbNull) => Ok(()),
        (known, value) => Err(mismatch(known, value)),
    }
}

/// Read the fixed-width payload of a built-in value
///
/// `Object` has no payload here; plain objects are created by the caller.
pub fn read_known<R: Read>(r: &mut BinaryReader<R>, known: KnownType) -> Result<Value> {
    let value = match known {
        KnownType::Bool => Value::Bool(r.read_bool()?),
        KnownType::I8 => Value::I8(r.read_i8()?),
        KnownType::U8 => Value::U8(r.read_u8()?),
        KnownType::I16 => Value::I16(r.read_i16()?),
        KnownType::U16 => Value::U16(r.read_u16()?),
        KnownType::I32 => Value::I32(r.read_i32()?),
        KnownType::U32 => Value::U32(r.read_u32()?),
        KnownType::I64 => Value::I64(r.read_i64()?),
        KnownType::U64 => Value::U64(r.read_u64()?),
        KnownType::IntPtr => Value::IntPtr(r.read_i64()?),
        KnownType::UIntPtr => Value::UIntPtr(r.read_u64()?),
        KnownType::Char => Value::Char(r.read_char()?),
        KnownType::String => Value::String(r.read_string()?),
        KnownType::F32 => Value::F32(r.read_f32()?),
        KnownType::F64 => Value::F64(r.read_f64()?),
        KnownType::Decimal => {
            let (lo, mid, hi, flags) = (r.read_u32()?, r.read_u32()?, r.read_u32()?, r.read_u32()?);
            Value::Decimal(
                Decimal::from_parts(lo, mid, hi, flags)
                    .ok_or_else(|| Error::invalid_stream("invalid decimal flags"))?,
            )
        }
        KnownType::DateTime => {
            let kind = match r.read_u8()? {
                0 => DateTimeKind::Unspecified,
                1 => DateTimeKind::Utc,
                2 => DateTimeKind::Local,
                k => return Err(Error::invalid_stream(format!("invalid DateTime kind {}", k))),
            };
            let ticks = r.read_i64()?;
            Value::DateTime(
                DateTime::from_ticks(ticks, kind)
                    .ok_or_else(|| Error::invalid_stream("DateTime ticks out of range"))?,
            )
        }
        KnownType::DateTimeOffset => {
            let ticks = r.read_i64()?;
            let offset_minutes = r.read_i16()?;
            Value::DateTimeOffset(DateTimeOffset {
                ticks,
                offset_minutes,
            })
        }
        KnownType::TimeSpan => Value::TimeSpan(TimeSpan::from_ticks(r.read_i64()?)),
        KnownType::Guid => {
            let mut bytes = [0u8; 16];
            r.read_exact(&mut bytes)?;
            Value::Guid(Uuid::from_bytes_le(bytes))
        }
        KnownType::Version => Value::Version(Version {
            major: r.read_i32()?,
            minor: r.read_i32()?,
            build: r.read_i32()?,
            revision: r.read_i32()?,
        }),
        KnownType::Uri => {
            let absolute = r.read_bool()?;
            Value::Uri(Uri {
                text: r.read_string()?,
                absolute,
            })
        }
        KnownType::BitArray => {
            let len = r.read_len()?;
            let words = len / 32 + usize::from(len % 32 != 0);
            let mut bits = Vec::with_capacity(len.min(64 * 1024));
            for word_index in 0..words {
                let word = r.read_i32()? as u32;
                let in_word = (len - word_index * 32).min(32);
                bits.extend((0..in_word).map(|i| word & (1 << i) != 0));
            }
            Value::BitArray(bits)
        }
        KnownType::BitVector32 => Value::BitVector32(r.read_i32()?),
        KnownType::BitVector32Section => Value::BitVector32Section(BitVectorSection {
            mask: r.read_i16()?,
            offset: r.read_i16()?,
        }),
        KnownType::StringBuilder => {
            let capacity = i32::try_from(r.read_7bit()?)
                .map_err(|_| Error::invalid_stream("StringBuilder capacity out of range"))?;
            Value::StringBuilder(StringBuilder {
                text: r.read_string()?,
                capacity,
            })
        }
        KnownType::DbNull => Value::DbNull,
        KnownType::Object => {
            return Err(Error::InvalidOperation(
                "plain objects have no payload".to_string(),
            ))
        }
    };
    Ok(value)
}

/// Two's complement bits and width of a value eligible for dynamic-width encoding
pub fn compact_bits(value: &Value) -> Option<(u64, u32)> {
    match *value {
        Value::I16(v) => Some((v as u16 as u64, 16)),
        Value::U16(v) => Some((v as u64, 16)),
        Value::I32(v) => Some((v as u32 as u64, 32)),
        Value::U32(v) => Some((v as u64, 32)),
        Value::Char(v) => Some((v as u32 as u64, 32)),
        Value::I64(v) | Value::IntPtr(v) => Some((v as u64, 64)),
        Value::U64(v) | Value::UIntPtr(v) => Some((v, 64)),
        _ => None,
    }
}

/// Whether the value is shorter as a varint than at its fixed width
pub fn prefers_compact(value: &Value) -> bool {
    compact_bits(value).map_or(false, |(raw, width)| varint::fits_compact(raw, width))
}

/// Write an integer value as a varint of its two's complement bits
pub fn write_compact<W: Write>(w: &mut BinaryWriter<W>, value: &Value) -> Result<()> {
    let (raw, _) = compact_bits(value).ok_or_else(|| {
        Error::InvalidOperation(format!("{} has no compact form", value.type_name()))
    })?;
    w.write_7bit_u64(raw)
}

/// Read a varint-encoded integer of the given known type
pub fn read_compact<R: Read>(r: &mut BinaryReader<R>, known: KnownType) -> Result<Value> {
    let raw = r.read_7bit_u64()?;
    let width = known
        .dynamic_width()
        .ok_or_else(|| Error::invalid_stream(format!("{} has no compact form", known)))?;
    if width < 64 && raw >> width != 0 {
        return Err(Error::invalid_stream(format!(
            "compact value {:#x} exceeds {} bits",
            raw, width
        )));
    }
    let value = match known {
        KnownType::I16 => Value::I16(raw as u16 as i16),
        KnownType::U16 => Value::U16(raw as u16),
        KnownType::I32 => Value::I32(raw as u32 as i32),
        KnownType::U32 => Value::U32(raw as u32),
        KnownType::Char => Value::Char(char_from_u32(raw as u32)?),
        KnownType::I64 => Value::I64(raw as i64),
        KnownType::U64 => Value::U64(raw),
        KnownType::IntPtr => Value::IntPtr(raw as i64),
        KnownType::UIntPtr => Value::UIntPtr(raw),
        other => return Err(Error::invalid_stream(format!("{} has no compact form", other))),
    };
    Ok(value)
}
