// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! On-disk container formats.
//!
//! Every container starts with a 4-byte magic and a u32 version;
//! readers dispatch purely on the magic at offset 0 and refuse anything
//! they do not recognize.

pub mod block_bloom;
pub mod cold;
pub mod hot;
pub mod odc2;
pub mod pf1;
pub mod pfq1;
pub mod tpf3;

use crate::file::{sniff_magic, TPF3_MAGIC, USCC_MAGIC, USCH_MAGIC};

/// Top-level container family, as determined by the magic.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ContainerKind {
    /// Self-describing hot-lite-full container
    HotLiteFull,

    /// Hot queryable container
    Hot,

    /// Cold archival bundle
    Cold,
}

impl std::fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::HotLiteFull => "hot-lite-full",
                Self::Hot => "hot",
                Self::Cold => "cold",
            }
        )
    }
}

/// Detects the container family from the magic at offset 0.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedMagic`] for anything unknown
/// rather than guessing.
pub fn detect(bytes: &[u8]) -> crate::Result<ContainerKind> {
    let magic = sniff_magic(bytes).ok_or(crate::Error::UnsupportedMagic([0u8; 4]))?;

    match magic {
        TPF3_MAGIC => Ok(ContainerKind::HotLiteFull),
        USCH_MAGIC => Ok(ContainerKind::Hot),
        USCC_MAGIC => Ok(ContainerKind::Cold),
        magic => Err(crate::Error::UnsupportedMagic(magic)),
    }
}

/// Detects the container family and routes to its decoder.
///
/// Returns the decoded lines together with the detected family, so
/// callers can report which decoder ran.
pub fn decode_auto(bytes: &[u8]) -> crate::Result<(Vec<String>, ContainerKind)> {
    let kind = detect(bytes)?;

    let lines = match kind {
        ContainerKind::HotLiteFull => tpf3::decode(bytes)?,
        ContainerKind::Hot => hot::decode(bytes)?,
        ContainerKind::Cold => cold::decode(bytes)?,
    };

    Ok((lines, kind))
}
