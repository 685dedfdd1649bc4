//! Little-endian binary reader and writer
//!
//! Thin wrappers over `std::io` streams using `byteorder`. All integers are
//! little-endian; strings are a 7-bit byte length followed by UTF-8. Reader
//! errors caused by truncated input surface as `InvalidStream`.

use crate::data_types::DataTypes;
use crate::varint;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use graphbin_core::{Error, Result};
use std::io::{Read, Write};

/// Upper bound for a single length-prefixed allocation made up front
const PREALLOCATE_LIMIT: usize = 64 * 1024;

/// Binary writer over any `Write` sink
pub struct BinaryWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> BinaryWriter<W> {
    /// Wrap a sink
    pub fn new(inner: W) -> Self {
        BinaryWriter { inner, written: 0 }
    }

    /// Unwrap the sink
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.written
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.inner.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Write a byte
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        self.inner.write_u8(v)?;
        self.written += 1;
        Ok(())
    }

    /// Write a bool as one byte
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Write an i8
    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        self.write_u8(v as u8)
    }

    /// Write an i16
    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        self.inner.write_i16::<LittleEndian>(v)?;
        self.written += 2;
        Ok(())
    }

    /// Write a u16
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        self.inner.write_u16::<LittleEndian>(v)?;
        self.written += 2;
        Ok(())
    }

    /// Write an i32
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        self.inner.write_i32::<LittleEndian>(v)?;
        self.written += 4;
        Ok(())
    }

    /// Write a u32
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        self.inner.write_u32::<LittleEndian>(v)?;
        self.written += 4;
        Ok(())
    }

    /// Write an i64
    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        self.inner.write_i64::<LittleEndian>(v)?;
        self.written += 8;
        Ok(())
    }

    /// Write a u64
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        self.inner.write_u64::<LittleEndian>(v)?;
        self.written += 8;
        Ok(())
    }

    /// Write an f32
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        self.inner.write_f32::<LittleEndian>(v)?;
        self.written += 4;
        Ok(())
    }

    /// Write an f64
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        self.inner.write_f64::<LittleEndian>(v)?;
        self.written += 8;
        Ok(())
    }

    /// Write a char as its u32 scalar value
    pub fn write_char(&mut self, v: char) -> Result<()> {
        self.write_u32(v as u32)
    }

    /// Write a 7-bit encoded u32
    pub fn write_7bit(&mut self, v: u32) -> Result<()> {
        self.write_7bit_u64(v as u64)
    }

    /// Write a 7-bit encoded u64
    pub fn write_7bit_u64(&mut self, v: u64) -> Result<()> {
        varint::write_u64(&mut self.inner, v)?;
        self.written += varint::encoded_len(v) as u64;
        Ok(())
    }

    /// Write a 7-bit encoded length
    pub fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len)
            .map_err(|_| Error::InvalidOperation(format!("length {} exceeds u32", len)))?;
        self.write_7bit(len)
    }

    /// Write a length-prefixed UTF-8 string
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_len(s.len())?;
        self.write_bytes(s.as_bytes())
    }

    /// Write a type tag
    pub fn write_data_types(&mut self, dt: DataTypes) -> Result<()> {
        self.write_7bit(dt.bits() as u32)
    }
}

/// Binary reader over any `Read` source
pub struct BinaryReader<R: Read> {
    inner: R,
}

impl<R: Read> BinaryReader<R> {
    /// Wrap a source
    pub fn new(inner: R) -> Self {
        BinaryReader { inner }
    }

    /// Unwrap the source
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Read exactly `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(len.min(PREALLOCATE_LIMIT));
        let read = (&mut self.inner)
            .take(len as u64)
            .read_to_end(&mut buf)
            .map_err(Error::from_read)?;
        if read != len {
            return Err(Error::invalid_stream(format!(
                "expected {} bytes, stream ended after {}",
                len, read
            )));
        }
        Ok(buf)
    }

    /// Fill a fixed buffer
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(Error::from_read)
    }

    /// Read a byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.inner.read_u8().map_err(Error::from_read)
    }

    /// Read a bool; any value other than 0 and 1 is invalid
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(Error::invalid_stream(format!("invalid bool byte {}", b))),
        }
    }

    /// Read an i8
    pub fn read_i8(&mut self) -> Result<i8> {
        self.inner.read_i8().map_err(Error::from_read)
    }

    /// Read an i16
    pub fn read_i16(&mut self) -> Result<i16> {
        self.inner
            .read_i16::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read a u16
    pub fn read_u16(&mut self) -> Result<u16> {
        self.inner
            .read_u16::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read an i32
    pub fn read_i32(&mut self) -> Result<i32> {
        self.inner
            .read_i32::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read a u32
    pub fn read_u32(&mut self) -> Result<u32> {
        self.inner
            .read_u32::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read an i64
    pub fn read_i64(&mut self) -> Result<i64> {
        self.inner
            .read_i64::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read a u64
    pub fn read_u64(&mut self) -> Result<u64> {
        self.inner
            .read_u64::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read an f32
    pub fn read_f32(&mut self) -> Result<f32> {
        self.inner
            .read_f32::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read an f64
    pub fn read_f64(&mut self) -> Result<f64> {
        self.inner
            .read_f64::<LittleEndian>()
            .map_err(Error::from_read)
    }

    /// Read a char from its u32 scalar value
    pub fn read_char(&mut self) -> Result<char> {
        let raw = self.read_u32()?;
        char_from_u32(raw)
    }

    /// Read a 7-bit encoded u32
    pub fn read_7bit(&mut self) -> Result<u32> {
        varint::read_u32(&mut self.inner)
    }

    /// Read a 7-bit encoded u64
    pub fn read_7bit_u64(&mut self) -> Result<u64> {
        varint::read_u64(&mut self.inner)
    }

    /// Read a 7-bit encoded length
    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_7bit()? as usize)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_len()?;
        self.read_string_of(len)
    }

    /// Read a UTF-8 string of a known byte length
    pub fn read_string_of(&mut self, len: usize) -> Result<String> {
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| Error::invalid_stream("string is not valid UTF-8"))
    }

    /// Read and validate a type tag
    pub fn read_data_types(&mut self) -> Result<DataTypes> {
        let raw = self.read_7bit()?;
        let bits = u16::try_from(raw)
            .map_err(|_| Error::invalid_stream(format!("type tag {:#x} out of range", raw)))?;
        DataTypes::from_bits(bits)
    }
}

/// Convert a stored scalar value to a char
pub fn char_from_u32(raw: u32) -> Result<char> {
    char::from_u32(raw)
        .ok_or_else(|| Error::invalid_stream(format!("invalid char scalar {:#x}", raw)))
}
