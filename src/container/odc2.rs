// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Indexed block container.
//!
//! Packets are concatenated in groups into blocks, every block is
//! compressed with one shared trained dictionary, and a block table
//! addresses the blocks so any packet range can be decoded without
//! touching unrelated blocks:
//!
//! ```text
//! "ODC2" | u32 version | u32 group_size | u32 packet_count
//!        | u32 block_count | u32 dict_len | dict
//!        | block_count × { u64 offset, u64 length, u32 first_packet_index }
//!        | block bodies
//!        | optional "BB01" footer
//! ```
//!
//! Block offsets are relative to the start of the body region. A block
//! body decompresses to `group_size` (or fewer, in the last block)
//! packets, each prefixed with its u32 length.

use super::block_bloom::BlockBloomFooter;
use crate::{
    coding::{DecodeError, SliceReader},
    compression,
    file::{ODC2_MAGIC, ODC2_VERSION},
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Block grouping and compression parameters.
#[derive(Clone, Debug)]
pub struct Odc2Options {
    /// Packets per block
    pub group_size: u32,

    /// Compression level for block bodies
    pub level: i32,

    /// Trained dictionary target size in bytes
    pub dict_target_size: usize,

    /// Bits per block-bloom filter (only used when a footer is built)
    pub bloom_bits: usize,

    /// Hash functions per block-bloom filter
    pub bloom_k: usize,
}

impl Default for Odc2Options {
    fn default() -> Self {
        Self {
            group_size: 4,
            level: 10,
            dict_target_size: compression::DEFAULT_DICT_SIZE,
            bloom_bits: 8_192,
            bloom_k: 4,
        }
    }
}

/// One block table entry.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockEntry {
    /// Byte offset of the block body, relative to the body region
    pub offset: u64,

    /// Compressed byte length of the block body
    pub length: u64,

    /// Archive-wide index of the block's first packet
    pub first_packet_index: u32,
}

/// Encodes a packet sequence into an indexed block container.
///
/// `packet_tokens`, when given, must hold one token list per packet and
/// enables the trailing block-bloom footer.
pub fn encode_packets(
    packets: &[Vec<u8>],
    packet_tokens: Option<&[Vec<String>]>,
    opts: &Odc2Options,
) -> crate::Result<Vec<u8>> {
    let group_size = opts.group_size.max(1);

    let packet_count = u32::try_from(packets.len())
        .map_err(|_| crate::Error::Usage("too many packets for one container".to_owned()))?;

    if let Some(tokens) = packet_tokens {
        if tokens.len() != packets.len() {
            return Err(crate::Error::Usage(format!(
                "packet/token count mismatch: {} vs {}",
                packets.len(),
                tokens.len(),
            )));
        }
    }

    let dict = compression::train_dict(packets, opts.dict_target_size);

    let mut entries: Vec<BlockEntry> = Vec::new();
    let mut bodies = Vec::new();
    let mut footer = packet_tokens.map(|_| BlockBloomFooter::new(opts.bloom_bits, opts.bloom_k));

    for (block_idx, chunk) in packets.chunks(group_size as usize).enumerate() {
        let mut raw = Vec::new();
        for packet in chunk {
            let len = u32::try_from(packet.len())
                .map_err(|_| crate::Error::Usage("packet exceeds u32 length".to_owned()))?;
            raw.write_u32::<LittleEndian>(len)?;
            raw.write_all(packet)?;
        }

        let compressed = compression::compress_with_dict(&raw, &dict, opts.level)?;

        entries.push(BlockEntry {
            offset: bodies.len() as u64,
            length: compressed.len() as u64,
            first_packet_index: block_idx as u32 * group_size,
        });
        bodies.write_all(&compressed)?;

        if let (Some(footer), Some(tokens)) = (footer.as_mut(), packet_tokens) {
            let block_tokens: Vec<&str> = tokens
                .iter()
                .skip(block_idx * group_size as usize)
                .take(group_size as usize)
                .flat_map(|packet_tokens| packet_tokens.iter().map(String::as_str))
                .collect();
            footer.push_block(&block_tokens);
        }
    }

    let block_count = u32::try_from(entries.len())
        .map_err(|_| crate::Error::Usage("too many blocks for one container".to_owned()))?;
    let dict_len = u32::try_from(dict.len())
        .map_err(|_| crate::Error::Usage("dictionary exceeds u32 length".to_owned()))?;

    let mut out = Vec::new();
    out.write_all(&ODC2_MAGIC)?;
    out.write_u32::<LittleEndian>(ODC2_VERSION)?;
    out.write_u32::<LittleEndian>(group_size)?;
    out.write_u32::<LittleEndian>(packet_count)?;
    out.write_u32::<LittleEndian>(block_count)?;
    out.write_u32::<LittleEndian>(dict_len)?;
    out.write_all(&dict)?;

    for entry in &entries {
        out.write_u64::<LittleEndian>(entry.offset)?;
        out.write_u64::<LittleEndian>(entry.length)?;
        out.write_u32::<LittleEndian>(entry.first_packet_index)?;
    }

    out.write_all(&bodies)?;

    if let Some(footer) = footer {
        footer.encode_into(&mut out)?;
    }

    log::debug!(
        "odc2: {} packets -> {} blocks, dict {} bytes, {} bytes total",
        packets.len(),
        entries.len(),
        dict.len(),
        out.len(),
    );

    Ok(out)
}

/// Parsed view over an indexed block container.
///
/// Holds the decoded header, dictionary, and block table; block bodies
/// stay untouched until asked for.
#[derive(Debug)]
pub struct Odc2View<'a> {
    /// Packets per block
    pub group_size: u32,

    /// Total packet count
    pub packet_count: u32,

    dict: Vec<u8>,
    entries: Vec<BlockEntry>,
    body: &'a [u8],
    footer: Option<BlockBloomFooter>,
}

impl<'a> Odc2View<'a> {
    /// Parses the container header, block table, and optional footer.
    pub fn parse(bytes: &'a [u8]) -> crate::Result<Self> {
        let mut reader = SliceReader::new(bytes);

        let magic = reader.magic("Odc2")?;
        if magic != ODC2_MAGIC {
            return Err(crate::Error::UnsupportedMagic(magic));
        }

        let version = reader.u32_le()?;
        if version > ODC2_VERSION {
            return Err(crate::Error::UnsupportedVersion(("ODC2", version)));
        }

        let group_size = reader.u32_le()?;
        if group_size == 0 {
            return Err(DecodeError::InvalidHeader("Odc2").into());
        }

        let packet_count = reader.u32_le()?;
        let block_count = reader.u32_le()?;

        if u64::from(block_count) != u64::from(packet_count).div_ceil(u64::from(group_size)) {
            return Err(DecodeError::InvalidHeader("Odc2").into());
        }

        let dict_len = reader.u32_le()? as usize;
        let dict = reader.exact(dict_len, "Odc2")?;

        let mut entries = Vec::new();
        let mut expected_offset = 0u64;
        for block_idx in 0..block_count {
            let entry = BlockEntry {
                offset: reader.u64_le()?,
                length: reader.u64_le()?,
                first_packet_index: reader.u32_le()?,
            };

            // Contiguous bodies, strictly monotonic packet coverage
            if entry.offset != expected_offset
                || u64::from(entry.first_packet_index)
                    != u64::from(block_idx) * u64::from(group_size)
            {
                return Err(DecodeError::InvalidHeader("Odc2Table").into());
            }
            expected_offset = expected_offset
                .checked_add(entry.length)
                .ok_or(DecodeError::InvalidHeader("Odc2Table"))?;

            entries.push(entry);
        }

        let body_len = usize::try_from(expected_offset)
            .map_err(|_| DecodeError::InvalidHeader("Odc2Table"))?;

        let body_start = reader.position();
        let body = bytes
            .get(body_start..body_start + body_len)
            .ok_or(DecodeError::InvalidHeader("Odc2"))?;

        let trailer = bytes.get(body_start + body_len..).unwrap_or_default();
        let footer = if trailer.is_empty() {
            None
        } else {
            Some(BlockBloomFooter::parse(trailer)?)
        };

        if let Some(footer) = &footer {
            if footer.block_count() != entries.len() {
                return Err(DecodeError::InvalidHeader("BlockBloom").into());
            }
        }

        Ok(Self {
            group_size,
            packet_count,
            dict,
            entries,
            body,
            footer,
        })
    }

    /// Number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.entries.len()
    }

    /// The block table.
    #[must_use]
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }

    /// The trailing keyword pre-screen, if the encoder wrote one.
    #[must_use]
    pub fn footer(&self) -> Option<&BlockBloomFooter> {
        self.footer.as_ref()
    }

    /// Decompresses one block into its packets.
    pub fn decode_block(&self, block_idx: usize) -> crate::Result<Vec<Vec<u8>>> {
        let entry = self
            .entries
            .get(block_idx)
            .ok_or_else(|| crate::Error::Usage(format!("block {block_idx} out of bounds")))?;

        let start = usize::try_from(entry.offset)
            .map_err(|_| DecodeError::InvalidHeader("Odc2Table"))?;
        let len =
            usize::try_from(entry.length).map_err(|_| DecodeError::InvalidHeader("Odc2Table"))?;

        let compressed = self
            .body
            .get(start..start + len)
            .ok_or(DecodeError::InvalidHeader("Odc2Table"))?;

        let raw = compression::decompress_with_dict(compressed, &self.dict)?;

        let expected = (self.packet_count as usize)
            .saturating_sub(entry.first_packet_index as usize)
            .min(self.group_size as usize);

        let mut reader = SliceReader::new(&raw);
        let mut packets = Vec::with_capacity(expected);

        while reader.remaining() > 0 {
            let len = reader.u32_le()? as usize;
            packets.push(reader.exact(len, "Odc2Block")?);
        }

        if packets.len() != expected {
            return Err(DecodeError::InvalidHeader("Odc2Block").into());
        }

        Ok(packets)
    }

    /// Block IDs covering the packet range `[start, end)`.
    pub fn blocks_for_range(&self, start: usize, end: usize) -> crate::Result<Vec<usize>> {
        if start > end || end > self.packet_count as usize {
            return Err(crate::Error::Usage(format!(
                "packet range [{start}, {end}) out of bounds (packet count {})",
                self.packet_count,
            )));
        }

        if start == end {
            return Ok(Vec::new());
        }

        let first = self
            .entries
            .partition_point(|entry| (entry.first_packet_index as usize) <= start)
            .saturating_sub(1);
        let last = self
            .entries
            .partition_point(|entry| (entry.first_packet_index as usize) < end)
            .saturating_sub(1);

        Ok((first..=last).collect())
    }

    /// Decodes the packet range `[start, end)`.
    ///
    /// Only covering blocks are materialized; the result is byte-equal
    /// to the encoder's packet slice.
    pub fn decode_packet_range(&self, start: usize, end: usize) -> crate::Result<Vec<Vec<u8>>> {
        let mut out = Vec::with_capacity(end.saturating_sub(start));

        for block_idx in self.blocks_for_range(start, end)? {
            let first = self
                .entries
                .get(block_idx)
                .map(|entry| entry.first_packet_index as usize)
                .unwrap_or_default();

            for (offset, packet) in self.decode_block(block_idx)?.into_iter().enumerate() {
                let packet_idx = first + offset;
                if packet_idx >= start && packet_idx < end {
                    out.push(packet);
                }
            }
        }

        Ok(out)
    }

    /// Decodes every packet in order.
    pub fn decode_all_packets(&self) -> crate::Result<Vec<Vec<u8>>> {
        self.decode_packet_range(0, self.packet_count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sample_packets(n: usize) -> Vec<Vec<u8>> {
        (0..n)
            .map(|i| format!("packet payload {i} with some shared structure").into_bytes())
            .collect()
    }

    #[test]
    fn odc2_roundtrip_all() -> crate::Result<()> {
        let packets = sample_packets(11);
        let blob = encode_packets(&packets, None, &Odc2Options::default())?;

        let view = Odc2View::parse(&blob)?;
        assert_eq!(4, view.group_size);
        assert_eq!(11, view.packet_count);
        assert_eq!(3, view.block_count());

        assert_eq!(packets, view.decode_all_packets()?);

        Ok(())
    }

    #[test]
    fn odc2_selective_range() -> crate::Result<()> {
        let packets = sample_packets(40);
        let blob = encode_packets(&packets, None, &Odc2Options::default())?;

        let view = Odc2View::parse(&blob)?;

        assert_eq!(packets[3..12], *view.decode_packet_range(3, 12)?);

        // [3, 12) with group_size 4 covers blocks 0..=2 only
        assert_eq!(vec![0, 1, 2], view.blocks_for_range(3, 12)?);
        assert!(view.blocks_for_range(3, 12)?.len() <= 4);

        Ok(())
    }

    #[test]
    fn odc2_empty_range() -> crate::Result<()> {
        let packets = sample_packets(8);
        let blob = encode_packets(&packets, None, &Odc2Options::default())?;

        let view = Odc2View::parse(&blob)?;
        assert!(view.decode_packet_range(5, 5)?.is_empty());

        Ok(())
    }

    #[test]
    fn odc2_range_out_of_bounds() -> crate::Result<()> {
        let packets = sample_packets(8);
        let blob = encode_packets(&packets, None, &Odc2Options::default())?;

        let view = Odc2View::parse(&blob)?;
        assert!(matches!(
            view.decode_packet_range(0, 9),
            Err(crate::Error::Usage(_))
        ));
        assert!(matches!(
            view.decode_packet_range(6, 3),
            Err(crate::Error::Usage(_))
        ));

        Ok(())
    }

    #[test]
    fn odc2_footer_prescreen() -> crate::Result<()> {
        let packets = sample_packets(8);
        let tokens: Vec<Vec<String>> = (0..8)
            .map(|i| vec![format!("token{i}"), "shared".to_owned()])
            .collect();

        let blob = encode_packets(&packets, Some(&tokens), &Odc2Options::default())?;
        let view = Odc2View::parse(&blob)?;

        let footer = view.footer().expect("footer should exist");
        assert_eq!(2, footer.block_count());

        // token6 lives in packet 6, which is in block 1
        assert_eq!(vec![1], footer.candidate_blocks(&["token6".to_owned()]));
        assert_eq!(
            vec![0, 1],
            footer.candidate_blocks(&["shared".to_owned()]),
        );

        Ok(())
    }

    #[test]
    fn odc2_empty_packet_list() -> crate::Result<()> {
        let blob = encode_packets(&[], None, &Odc2Options::default())?;

        let view = Odc2View::parse(&blob)?;
        assert_eq!(0, view.packet_count);
        assert!(view.decode_all_packets()?.is_empty());

        Ok(())
    }

    #[test]
    fn odc2_rejects_truncated_body() -> crate::Result<()> {
        let packets = sample_packets(4);
        let blob = encode_packets(&packets, None, &Odc2Options::default())?;

        // The block table promises more body bytes than remain
        assert!(Odc2View::parse(&blob[..blob.len() - 1]).is_err());

        Ok(())
    }
}
