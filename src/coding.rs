// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::io::{Read, Write};

/// Error during serialization
#[derive(Debug)]
pub enum EncodeError {
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for EncodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "EncodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
            }
        )
    }
}

impl From<std::io::Error> for EncodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Error during deserialization
#[derive(Debug)]
pub enum DecodeError {
    /// I/O error
    Io(std::io::Error),

    /// String field is not valid UTF-8
    Utf8(std::str::Utf8Error),

    /// Invalid or inconsistent header field
    InvalidHeader(&'static str),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DecodeError({})",
            match self {
                Self::Io(e) => e.to_string(),
                e => format!("{e:?}"),
            }
        )
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<std::str::Utf8Error> for DecodeError {
    fn from(value: std::str::Utf8Error) -> Self {
        Self::Utf8(value)
    }
}

/// Trait to serialize stuff
pub trait Encode {
    /// Serializes into writer.
    fn encode_into<W: Write>(&self, writer: &mut W) -> Result<(), EncodeError>;

    /// Serializes into vector.
    #[allow(clippy::expect_used)]
    fn encode_into_vec(&self) -> Vec<u8> {
        let mut v = vec![];
        self.encode_into(&mut v).expect("cannot fail");
        v
    }
}

/// Trait to deserialize stuff
pub trait Decode {
    /// Deserializes from reader.
    fn decode_from<R: Read>(reader: &mut R) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// Cursor over an in-memory container slice.
///
/// Wraps the varint/byteorder reads all decoders need and maps their
/// I/O errors (truncation, mostly) into [`DecodeError`], so decoders
/// can use `?` without conflating parse failures with file I/O.
pub(crate) struct SliceReader<'a> {
    inner: std::io::Cursor<&'a [u8]>,
}

impl<'a> SliceReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            inner: std::io::Cursor::new(bytes),
        }
    }

    /// Current byte offset into the slice.
    pub fn position(&self) -> usize {
        // NOTE: Truncation is OK, the slice length fit a usize to begin with
        #[allow(clippy::cast_possible_truncation)]
        let position = self.inner.position() as usize;

        position
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        let len = self.inner.get_ref().len() as u64;

        // NOTE: Truncation is OK, the slice length fit a usize to begin with
        #[allow(clippy::cast_possible_truncation)]
        let remaining = len.saturating_sub(self.inner.position()) as usize;

        remaining
    }

    pub fn uvarint(&mut self) -> Result<u64, DecodeError> {
        use varint_rs::VarintReader;

        self.inner.read_u64_varint().map_err(DecodeError::Io)
    }

    /// Reads an unsigned varint that is used as an in-memory count.
    pub fn count(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let value = self.uvarint()?;
        usize::try_from(value).map_err(|_| DecodeError::InvalidHeader(field))
    }

    /// Reads a zig-zag signed varint.
    pub fn ivarint(&mut self) -> Result<i64, DecodeError> {
        use varint_rs::VarintReader;

        self.inner.read_i64_varint().map_err(DecodeError::Io)
    }

    pub fn u32_le(&mut self) -> Result<u32, DecodeError> {
        use byteorder::{LittleEndian, ReadBytesExt};

        self.inner.read_u32::<LittleEndian>().map_err(DecodeError::Io)
    }

    pub fn u64_le(&mut self) -> Result<u64, DecodeError> {
        use byteorder::{LittleEndian, ReadBytesExt};

        self.inner.read_u64::<LittleEndian>().map_err(DecodeError::Io)
    }

    /// Reads exactly `len` bytes, rejecting lengths past the slice end
    /// before allocating.
    pub fn exact(&mut self, len: usize, field: &'static str) -> Result<Vec<u8>, DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::InvalidHeader(field));
        }

        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).map_err(DecodeError::Io)?;
        Ok(buf)
    }

    /// Reads a 4-byte magic.
    pub fn magic(&mut self, field: &'static str) -> Result<[u8; 4], DecodeError> {
        let bytes = self.exact(4, field)?;

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes);
        Ok(magic)
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.count(field)?;
        let bytes = self.exact(len, field)?;
        String::from_utf8(bytes).map_err(|e| DecodeError::Utf8(e.utf8_error()))
    }
}
