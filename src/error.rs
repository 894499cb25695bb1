// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::coding::{DecodeError, EncodeError};

/// Represents errors that can occur in the archival engine
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// Serialization failed
    Encode(EncodeError),

    /// Deserialization failed (malformed container structure)
    Decode(DecodeError),

    /// Underlying compressor reported corruption
    Decompress,

    /// Container magic does not match any known format
    UnsupportedMagic([u8; 4]),

    /// Container version is newer than supported (container name, version)
    UnsupportedVersion((&'static str, u32)),

    /// Template CSV unreadable or contains a malformed pattern
    Template(String),

    /// Caller violated a contract (e.g. out-of-bounds decode range)
    Usage(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IoError: {e}"),
            Self::Encode(e) => write!(f, "FormatError: {e}"),
            Self::Decode(e) => write!(f, "FormatError: {e}"),
            Self::Decompress => write!(f, "CodecFailure: decompression failed"),
            Self::UnsupportedMagic(magic) => {
                write!(f, "UnsupportedMagic: {magic:?}")
            }
            Self::UnsupportedVersion((container, version)) => {
                write!(f, "VersionError: {container} v{version} is not supported")
            }
            Self::Template(msg) => write!(f, "TemplateError: {msg}"),
            Self::Usage(msg) => write!(f, "UsageError: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EncodeError> for Error {
    fn from(value: EncodeError) -> Self {
        Self::Encode(value)
    }
}

impl From<DecodeError> for Error {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

/// Crate result
pub type Result<T> = std::result::Result<T, Error>;
