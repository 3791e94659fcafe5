//! Byte-order aware primitive readers and writers for grid headers.

use std::io::Read;

use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FormatError, GridResult};

/// Endianness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Endianness {
    /// Little Endian
    LittleEndian,
    /// Big Endian
    BigEndian,
}

impl Endianness {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::BigEndian
        } else {
            Endianness::LittleEndian
        }
    }

    /// The other byte order.
    pub const fn swapped(self) -> Self {
        match self {
            Endianness::LittleEndian => Endianness::BigEndian,
            Endianness::BigEndian => Endianness::LittleEndian,
        }
    }
}

impl Default for Endianness {
    fn default() -> Self {
        Self::native()
    }
}

pub(crate) struct EndianAwareReader<R: Read> {
    reader: R,
    endianness: Endianness,
}

impl<R: Read> EndianAwareReader<R> {
    pub(crate) fn new(reader: R, endianness: Endianness) -> Self {
        Self { reader, endianness }
    }

    pub(crate) fn read_i16(&mut self) -> GridResult<i16> {
        match self.endianness {
            Endianness::LittleEndian => Ok(self.reader.read_i16::<LittleEndian>()?),
            Endianness::BigEndian => Ok(self.reader.read_i16::<BigEndian>()?),
        }
    }

    pub(crate) fn read_i32(&mut self) -> GridResult<i32> {
        match self.endianness {
            Endianness::LittleEndian => Ok(self.reader.read_i32::<LittleEndian>()?),
            Endianness::BigEndian => Ok(self.reader.read_i32::<BigEndian>()?),
        }
    }

    pub(crate) fn read_u32(&mut self) -> GridResult<u32> {
        match self.endianness {
            Endianness::LittleEndian => Ok(self.reader.read_u32::<LittleEndian>()?),
            Endianness::BigEndian => Ok(self.reader.read_u32::<BigEndian>()?),
        }
    }

    pub(crate) fn read_f64(&mut self) -> GridResult<f64> {
        match self.endianness {
            Endianness::LittleEndian => Ok(self.reader.read_f64::<LittleEndian>()?),
            Endianness::BigEndian => Ok(self.reader.read_f64::<BigEndian>()?),
        }
    }

    /// Read a NUL-padded text field of exactly `len` bytes.
    pub(crate) fn read_fixed_str(&mut self, len: usize) -> GridResult<String> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let end = buf.iter().position(|b| *b == 0).unwrap_or(len);
        String::from_utf8(buf[..end].to_vec())
            .map_err(|_| FormatError::UnrecognizedHeader("non UTF-8 text field".into()).into())
    }

    /// Read `len` bytes verbatim.
    pub(crate) fn read_bytes(&mut self, len: usize) -> GridResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn skip(&mut self, len: u64) -> GridResult<()> {
        let copied = std::io::copy(&mut (&mut self.reader).take(len), &mut std::io::sink())?;
        if copied != len {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        Ok(())
    }
}

/// Serializes header fields into an in-memory buffer in a fixed byte order.
pub(crate) struct EndianAwareWriter {
    buf: BytesMut,
    endianness: Endianness,
}

impl EndianAwareWriter {
    pub(crate) fn with_capacity(capacity: usize, endianness: Endianness) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            endianness,
        }
    }

    pub(crate) fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub(crate) fn put_i16(&mut self, v: i16) {
        match self.endianness {
            Endianness::LittleEndian => self.buf.put_i16_le(v),
            Endianness::BigEndian => self.buf.put_i16(v),
        }
    }

    pub(crate) fn put_i32(&mut self, v: i32) {
        match self.endianness {
            Endianness::LittleEndian => self.buf.put_i32_le(v),
            Endianness::BigEndian => self.buf.put_i32(v),
        }
    }

    pub(crate) fn put_u32(&mut self, v: u32) {
        match self.endianness {
            Endianness::LittleEndian => self.buf.put_u32_le(v),
            Endianness::BigEndian => self.buf.put_u32(v),
        }
    }

    pub(crate) fn put_f64(&mut self, v: f64) {
        match self.endianness {
            Endianness::LittleEndian => self.buf.put_f64_le(v),
            Endianness::BigEndian => self.buf.put_f64(v),
        }
    }

    pub(crate) fn put_slice(&mut self, v: &[u8]) {
        self.buf.put_slice(v);
    }

    /// Write `s` truncated or NUL-padded to exactly `len` bytes, keeping a terminating NUL.
    pub(crate) fn put_fixed_str(&mut self, s: &str, len: usize) {
        let mut end = s.len().min(len.saturating_sub(1));
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        self.buf.put_slice(&s.as_bytes()[..end]);
        self.buf.put_bytes(0, len - end);
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn freeze(self) -> Bytes {
        self.buf.freeze()
    }
}
