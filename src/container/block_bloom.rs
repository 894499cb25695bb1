// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Trailing block-bloom footer.
//!
//! One bloom filter per block over the tokenized content of all its
//! packets, so a keyword query can select blocks before touching any
//! block body:
//!
//! ```text
//! "BB01" | u32 block_count | u32 bits | u32 k | block_count × bitmap
//! ```
//!
//! Every bitmap is `bits / 8` bytes; the parameters are declared once
//! in the footer header.

use crate::{
    coding::{DecodeError, SliceReader},
    file::BLOCK_BLOOM_MAGIC,
    filter::BloomFilter,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Per-block keyword pre-screen.
#[derive(Debug)]
pub struct BlockBloomFooter {
    /// Bits per block filter
    pub bits: usize,

    /// Hash functions per filter
    pub k: usize,

    filters: Vec<BloomFilter>,
}

impl BlockBloomFooter {
    /// Creates an empty footer with fixed parameters.
    #[must_use]
    pub fn new(bits: usize, k: usize) -> Self {
        Self {
            bits,
            k,
            filters: Vec::new(),
        }
    }

    /// Appends the filter for the next block, fed with its tokens.
    pub fn push_block<S: AsRef<str>>(&mut self, tokens: &[S]) {
        let mut filter = BloomFilter::with_params(self.bits, self.k);
        for token in tokens {
            filter.insert(token.as_ref().as_bytes());
        }
        self.filters.push(filter);
    }

    /// Number of per-block filters.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.filters.len()
    }

    /// Serializes the footer.
    pub fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        let block_count = u32::try_from(self.filters.len())
            .map_err(|_| crate::Error::Usage("too many blocks for footer".to_owned()))?;

        writer.write_all(&BLOCK_BLOOM_MAGIC)?;
        writer.write_u32::<LittleEndian>(block_count)?;
        writer.write_u32::<LittleEndian>(self.bits as u32)?;
        writer.write_u32::<LittleEndian>(self.k as u32)?;

        for filter in &self.filters {
            writer.write_all(filter.bytes())?;
        }

        Ok(())
    }

    /// Parses a footer from the trailing container region.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        let mut reader = SliceReader::new(bytes);

        let magic = reader.magic("BlockBloom")?;
        if magic != BLOCK_BLOOM_MAGIC {
            return Err(DecodeError::InvalidHeader("BlockBloom").into());
        }

        let block_count = reader.u32_le()? as usize;
        let bits = reader.u32_le()? as usize;
        let k = reader.u32_le()? as usize;

        let bitmap_len = BloomFilter::byte_len(bits);

        let mut filters = Vec::new();
        for _ in 0..block_count {
            let bitmap = reader.exact(bitmap_len, "BlockBloom")?;
            filters.push(BloomFilter::from_bytes(bits, k, bitmap));
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::InvalidHeader("BlockBloom").into());
        }

        Ok(Self { bits, k, filters })
    }

    /// Block IDs whose filter reports every token as maybe-present.
    #[must_use]
    pub fn candidate_blocks(&self, tokens: &[String]) -> Vec<usize> {
        self.filters
            .iter()
            .enumerate()
            .filter(|(_, filter)| {
                tokens.iter().all(|token| filter.contains(token.as_bytes()))
            })
            .map(|(idx, _)| idx)
            .collect()
    }
}
