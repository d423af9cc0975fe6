//! Deterministic binary codec shared by the P-chain and C-chain atomic types.
//!
//! Integers are big-endian. Every top-level payload starts with a `u16`
//! codec version. Slices and byte strings carry a `u32` length prefix,
//! strings a `u16` one, and interface values a `u32` type id.

use bytes::Buf;
use bytes::BufMut;
use bytes::BytesMut;

pub const CODEC_VERSION: u16 = 0;

/// Upper bound on a single marshalled payload.
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of input: wanted {wanted} bytes, {remaining} remaining")]
    UnexpectedEof { wanted: usize, remaining: usize },

    #[error("unknown codec version {0}")]
    UnknownVersion(u16),

    #[error("unknown type id {type_id} for {context}")]
    UnknownTypeId { type_id: u32, context: &'static str },

    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),

    #[error("payload of {0} bytes exceeds maximum size")]
    TooLarge(usize),

    #[error("invalid utf-8 string")]
    InvalidString,

    #[error("invalid value: {0}")]
    Invalid(String),
}

/// Types with a canonical binary encoding.
pub trait Pack {
    fn pack(&self, packer: &mut Packer);
}

/// Types decodable from their canonical binary encoding.
pub trait Unpack: Sized {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError>;
}

#[derive(Debug, Default)]
pub struct Packer {
    buf: BytesMut,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.put_u16(v);
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32(v);
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64(v);
    }

    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64(v);
    }

    pub fn put_fixed(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    pub fn put_len(&mut self, len: usize) {
        // lengths are bounded by MAX_PAYLOAD_SIZE long before u32::MAX
        self.put_u32(len as u32);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.put_len(bytes.len());
        self.put_fixed(bytes);
    }

    pub fn put_str(&mut self, s: &str) {
        self.put_u16(s.len() as u16);
        self.put_fixed(s.as_bytes());
    }

    pub fn put_slice<T: Pack>(&mut self, items: &[T]) {
        self.put_len(items.len());
        for item in items {
            item.pack(self);
        }
    }

    pub fn put<T: Pack>(&mut self, item: &T) {
        item.pack(self);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

#[derive(Debug)]
pub struct Unpacker<'a> {
    buf: &'a [u8],
    consumed: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, consumed: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn need(&self, wanted: usize) -> Result<(), CodecError> {
        let remaining = self.remaining();
        if wanted > remaining {
            return Err(CodecError::UnexpectedEof { wanted, remaining });
        }
        Ok(())
    }

    fn advanced<T>(&mut self, n: usize, v: T) -> T {
        self.consumed += n;
        v
    }

    pub fn get_u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        let v = self.buf.get_u8();
        Ok(self.advanced(1, v))
    }

    pub fn get_u16(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        let v = self.buf.get_u16();
        Ok(self.advanced(2, v))
    }

    pub fn get_u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        let v = self.buf.get_u32();
        Ok(self.advanced(4, v))
    }

    pub fn get_u64(&mut self) -> Result<u64, CodecError> {
        self.need(8)?;
        let v = self.buf.get_u64();
        Ok(self.advanced(8, v))
    }

    pub fn get_i64(&mut self) -> Result<i64, CodecError> {
        self.need(8)?;
        let v = self.buf.get_i64();
        Ok(self.advanced(8, v))
    }

    pub fn get_fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(self.advanced(N, out))
    }

    pub fn get_raw(&mut self, n: usize) -> Result<Vec<u8>, CodecError> {
        self.need(n)?;
        let out = self.buf[..n].to_vec();
        self.buf.advance(n);
        Ok(self.advanced(n, out))
    }

    pub fn get_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.get_u32()? as usize;
        self.get_raw(len)
    }

    pub fn get_string(&mut self) -> Result<String, CodecError> {
        let len = usize::from(self.get_u16()?);
        let raw = self.get_raw(len)?;
        String::from_utf8(raw).map_err(|_| CodecError::InvalidString)
    }

    /// Reads a length-prefixed slice. A declared length larger than the
    /// remaining input is rejected before anything is allocated.
    pub fn get_vec<T: Unpack>(&mut self) -> Result<Vec<T>, CodecError> {
        let len = self.get_u32()? as usize;
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof {
                wanted: len,
                remaining: self.remaining(),
            });
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(T::unpack(self)?);
        }
        Ok(out)
    }

    pub fn get<T: Unpack>(&mut self) -> Result<T, CodecError> {
        T::unpack(self)
    }

    pub fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

/// Registry of codec versions for one chain.
///
/// Marshalling prefixes the payload with the version; unmarshalling reads
/// the prefix and rejects versions that were never registered.
#[derive(Debug, Clone)]
pub struct CodecManager {
    versions: Vec<u16>,
    max_size: usize,
}

impl Default for CodecManager {
    fn default() -> Self {
        Self {
            versions: vec![CODEC_VERSION],
            max_size: MAX_PAYLOAD_SIZE,
        }
    }
}

impl CodecManager {
    pub fn register(&mut self, version: u16) {
        if !self.versions.contains(&version) {
            self.versions.push(version);
        }
    }

    fn check_version(&self, version: u16) -> Result<(), CodecError> {
        if self.versions.contains(&version) {
            Ok(())
        } else {
            Err(CodecError::UnknownVersion(version))
        }
    }

    pub fn marshal<T: Pack>(&self, version: u16, value: &T) -> Result<Vec<u8>, CodecError> {
        self.check_version(version)?;
        let mut packer = Packer::new();
        packer.put_u16(version);
        value.pack(&mut packer);
        if packer.len() > self.max_size {
            return Err(CodecError::TooLarge(packer.len()));
        }
        Ok(packer.into_bytes())
    }

    /// Decodes a versioned payload, requiring every byte to be consumed.
    pub fn unmarshal<T: Unpack>(&self, bytes: &[u8]) -> Result<(T, u16), CodecError> {
        if bytes.len() > self.max_size {
            return Err(CodecError::TooLarge(bytes.len()));
        }
        let mut unpacker = Unpacker::new(bytes);
        let version = unpacker.get_u16()?;
        self.check_version(version)?;
        let value = T::unpack(&mut unpacker)?;
        unpacker.finish()?;
        Ok((value, version))
    }
}

impl Pack for u32 {
    fn pack(&self, packer: &mut Packer) {
        packer.put_u32(*self);
    }
}

impl Unpack for u32 {
    fn unpack(unpacker: &mut Unpacker<'_>) -> Result<Self, CodecError> {
        unpacker.get_u32()
    }
}
