// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! General byte compressor.
//!
//! A thin wrapper over zstd that the packet and block layers build on.
//! Every call is an independent one-shot stream; nothing is shared
//! between invocations, so callers may compress from multiple contexts
//! without coordination.

use std::io::{Cursor, Read, Write};

/// Maximum number of sample blocks fed into dictionary training.
pub const MAX_TRAINING_SAMPLES: usize = 256;

/// Default trained dictionary size in bytes.
pub const DEFAULT_DICT_SIZE: usize = 8_192;

/// Compresses a byte stream.
///
/// Higher levels compress stronger (and slower).
pub fn compress(bytes: &[u8], level: i32) -> crate::Result<Vec<u8>> {
    Ok(zstd::stream::encode_all(Cursor::new(bytes), level)?)
}

/// Decompresses a byte stream previously created by [`compress`].
///
/// # Errors
///
/// Returns [`crate::Error::Decompress`] if the stream is corrupt.
pub fn decompress(bytes: &[u8]) -> crate::Result<Vec<u8>> {
    zstd::stream::decode_all(Cursor::new(bytes)).map_err(|e| {
        log::debug!("decompression failed: {e}");
        crate::Error::Decompress
    })
}

/// Compresses a byte stream using a trained dictionary.
///
/// An empty dictionary degrades to [`compress`].
pub fn compress_with_dict(bytes: &[u8], dict: &[u8], level: i32) -> crate::Result<Vec<u8>> {
    if dict.is_empty() {
        return compress(bytes, level);
    }

    let mut encoder = zstd::stream::write::Encoder::with_dictionary(Vec::new(), level, dict)?;
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

/// Decompresses a byte stream previously created by [`compress_with_dict`].
///
/// An empty dictionary degrades to [`decompress`].
///
/// # Errors
///
/// Returns [`crate::Error::Decompress`] if the stream is corrupt or the
/// dictionary does not match.
pub fn decompress_with_dict(bytes: &[u8], dict: &[u8]) -> crate::Result<Vec<u8>> {
    if dict.is_empty() {
        return decompress(bytes);
    }

    let mut decoder = zstd::stream::read::Decoder::with_dictionary(Cursor::new(bytes), dict)
        .map_err(|e| {
            log::debug!("decoder setup failed: {e}");
            crate::Error::Decompress
        })?;

    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|e| {
        log::debug!("dictionary decompression failed: {e}");
        crate::Error::Decompress
    })?;

    Ok(out)
}

/// Trains a shared dictionary from sample blocks.
///
/// At most [`MAX_TRAINING_SAMPLES`] samples are used. Training on empty
/// input returns an empty dictionary; so does a corpus the trainer
/// rejects (too small or too uniform), in which case compression simply
/// degrades to plain mode.
#[must_use]
pub fn train_dict(samples: &[Vec<u8>], target_size: usize) -> Vec<u8> {
    let samples = samples.get(..samples.len().min(MAX_TRAINING_SAMPLES)).unwrap_or(samples);

    if samples.is_empty() || samples.iter().all(Vec::is_empty) {
        return Vec::new();
    }

    match zstd::dict::from_samples(samples, target_size) {
        Ok(dict) => dict,
        Err(e) => {
            log::debug!("dictionary training rejected corpus: {e}");
            Vec::new()
        }
    }
}
