//! The byte-level serializer seam consumed by the core.
//!
//! The namespace reads and writes actor addresses exclusively through
//! these primitive interfaces; serialization of arbitrary user types
//! lives behind the same seam but outside this crate. The in-tree
//! binary implementation uses network byte order.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors surfaced while decoding wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Input ended before the expected value.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Unknown frame operation tag.
    #[error("invalid operation tag {0}")]
    InvalidOperation(u8),

    /// A string field was not valid UTF-8.
    #[error("invalid string encoding")]
    InvalidString,
}

/// Primitive value sink.
pub trait Serializer {
    /// Write a boolean as a single byte.
    fn write_bool(&mut self, value: bool);
    /// Write an unsigned byte.
    fn write_u8(&mut self, value: u8);
    /// Write a 16-bit unsigned integer.
    fn write_u16(&mut self, value: u16);
    /// Write a 32-bit unsigned integer.
    fn write_u32(&mut self, value: u32);
    /// Write a 64-bit unsigned integer.
    fn write_u64(&mut self, value: u64);
    /// Write a 64-bit float.
    fn write_f64(&mut self, value: f64);
    /// Write a length-prefixed UTF-8 string.
    fn write_str(&mut self, value: &str);
    /// Write a fixed-size byte array verbatim.
    fn write_raw(&mut self, bytes: &[u8]);
}

/// Primitive value source.
pub trait Deserializer {
    /// Read a boolean.
    fn read_bool(&mut self) -> Result<bool, WireError>;
    /// Read an unsigned byte.
    fn read_u8(&mut self) -> Result<u8, WireError>;
    /// Read a 16-bit unsigned integer.
    fn read_u16(&mut self) -> Result<u16, WireError>;
    /// Read a 32-bit unsigned integer.
    fn read_u32(&mut self) -> Result<u32, WireError>;
    /// Read a 64-bit unsigned integer.
    fn read_u64(&mut self) -> Result<u64, WireError>;
    /// Read a 64-bit float.
    fn read_f64(&mut self) -> Result<f64, WireError>;
    /// Read a length-prefixed UTF-8 string.
    fn read_str(&mut self) -> Result<String, WireError>;
    /// Fill `buf` with the next `buf.len()` bytes.
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), WireError>;
}

/// Serializer writing into a growable buffer.
pub struct BinarySerializer {
    buf: BytesMut,
}

impl BinarySerializer {
    /// Create an empty serializer.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Finish and take the written bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl Default for BinarySerializer {
    fn default() -> Self {
        Self::new()
    }
}

impl Serializer for BinarySerializer {
    fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    fn write_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    fn write_f64(&mut self, value: f64) {
        self.buf.put_f64(value);
    }

    fn write_str(&mut self, value: &str) {
        self.buf.put_u32(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }
}

/// Deserializer reading from a shared byte buffer.
pub struct BinaryDeserializer {
    buf: Bytes,
}

impl BinaryDeserializer {
    /// Read from `bytes`.
    pub fn new(bytes: Bytes) -> Self {
        Self { buf: bytes }
    }

    /// Read from a byte slice (copies once).
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            buf: Bytes::copy_from_slice(bytes),
        }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, n: usize) -> Result<(), WireError> {
        if self.buf.remaining() < n {
            return Err(WireError::UnexpectedEof);
        }
        Ok(())
    }
}

impl Deserializer for BinaryDeserializer {
    fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u8(&mut self) -> Result<u8, WireError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_u16(&mut self) -> Result<u16, WireError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    fn read_u32(&mut self) -> Result<u32, WireError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn read_u64(&mut self) -> Result<u64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    fn read_f64(&mut self) -> Result<f64, WireError> {
        self.ensure(8)?;
        Ok(self.buf.get_f64())
    }

    fn read_str(&mut self) -> Result<String, WireError> {
        let len = self.read_u32()? as usize;
        self.ensure(len)?;
        let bytes = self.buf.copy_to_bytes(len);
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidString)
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> Result<(), WireError> {
        self.ensure(buf.len())?;
        self.buf.copy_to_slice(buf);
        Ok(())
    }
}
