//! Binary encoding primitives.
//!
//! Every integer is big-endian. Layout of a payload:
//!
//! ```text
//! header   := "ASDL" version:u8
//! int      := i64
//! float    := f64 (IEEE bits as u64)
//! bool     := u8 (0 or 1)
//! string   := len:u64 bytes
//! span     := first:i64 last:i64
//! sequence := count:u64 element*
//! optional := present:bool [value]
//! ```
//!
//! Node layout, symbol references and symbol tables are the generated
//! serializer's business; this module only moves primitives.

use crate::error::DecodeError;
use crate::span::Span;

pub const MAGIC: [u8; 4] = *b"ASDL";

/// Bumped whenever the generated node layout changes incompatibly.
pub const FORMAT_VERSION: u8 = 1;

#[derive(Debug, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_header(&mut self) {
        self.buf.extend_from_slice(&MAGIC);
        self.buf.push(FORMAT_VERSION);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(u8::from(value));
    }

    /// Sequence counts and string lengths.
    pub fn write_len(&mut self, len: usize) {
        self.write_u64(len as u64);
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_len(value.len());
        self.buf.extend_from_slice(value.as_bytes());
    }

    pub fn write_span(&mut self, span: Span) {
        self.write_i64(i64::from(span.start));
        self.write_i64(i64::from(span.end));
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[derive(Debug)]
pub struct BinaryReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BinaryReader { bytes, pos: 0 }
    }

    /// Byte offset of the next read.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.pos.checked_add(N);
        let chunk = end
            .and_then(|end| self.bytes.get(self.pos..end))
            .ok_or(DecodeError::Truncated { offset: self.pos })?;
        let mut out = [0; N];
        out.copy_from_slice(chunk);
        self.pos += N;
        Ok(out)
    }

    pub fn read_header(&mut self) -> Result<(), DecodeError> {
        let magic: [u8; 4] = self.take().map_err(|_| DecodeError::BadMagic)?;
        if magic != MAGIC {
            return Err(DecodeError::BadMagic);
        }
        let found = self.read_u8()?;
        if found != FORMAT_VERSION {
            return Err(DecodeError::VersionMismatch {
                expected: FORMAT_VERSION,
                found,
            });
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let [byte] = self.take::<1>()?;
        Ok(byte)
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.take()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.take()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            byte => Err(DecodeError::InvalidBool { byte }),
        }
    }

    /// A sequence count or string length.
    ///
    /// Counts larger than the remaining input are rejected up front so a
    /// corrupt length cannot drive a huge allocation.
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        let len = self.read_u64()?;
        let len = usize::try_from(len).map_err(|_| DecodeError::LengthOverflow { len })?;
        if len > self.bytes.len() - self.pos {
            return Err(DecodeError::Truncated { offset: self.pos });
        }
        Ok(len)
    }

    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let start = self.pos;
        let bytes = &self.bytes[start..start + len];
        self.pos += len;
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(DecodeError::InvalidUtf8 { offset: start }),
        }
    }

    pub fn read_span(&mut self) -> Result<Span, DecodeError> {
        let first = self.read_i64()?;
        let last = self.read_i64()?;
        Ok(Span::try_from_wire(first, last)?)
    }

    /// Fail if anything follows the root node.
    pub fn finish(&self) -> Result<(), DecodeError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { count }),
        }
    }
}
