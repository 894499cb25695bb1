// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Query blob.
//!
//! A sequence of packets, each carrying a bloom filter over the
//! tokenized text of its lines, the set of event IDs it contains, and
//! the packet itself (compressed):
//!
//! ```text
//! "PFQ1" | u32 version | bloom_bits | bloom_k
//!        | packet_count | [bloom_len | bloom | eid_count | eids…
//!                          | comp_len | compressed packet…]
//! ```
//!
//! Bloom parameters are fixed per archive and declared once in the
//! header. Packets group input rows, so even an archive without any
//! template coverage still yields at least one packet and stays
//! queryable.

use crate::{
    coding::{DecodeError, SliceReader},
    compression,
    file::{PFQ1_MAGIC, PFQ1_VERSION},
    filter::BloomFilter,
    packet,
    query::tokenize,
    row::Row,
    template::TemplateBank,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

/// Bloom sizing for the query blob.
#[derive(Clone, Debug)]
pub struct Pfq1Options {
    /// Bits per packet filter
    pub bloom_bits: usize,

    /// Hash functions per filter
    pub bloom_k: usize,

    /// Compression level for the embedded packets
    pub level: i32,
}

impl Default for Pfq1Options {
    fn default() -> Self {
        Self {
            bloom_bits: 4_096,
            bloom_k: 4,
            level: 10,
        }
    }
}

/// Builds the query blob for a factored archive.
///
/// `rows` and `lines` describe the same input, element for element.
pub fn build(
    rows: &[Row],
    lines: &[String],
    packet_rows: usize,
    opts: &Pfq1Options,
) -> crate::Result<Vec<u8>> {
    if rows.len() != lines.len() {
        return Err(crate::Error::Usage(format!(
            "row/line count mismatch: {} vs {}",
            rows.len(),
            lines.len(),
        )));
    }

    let packet_rows = packet_rows.max(1);

    let mut out = Vec::new();
    out.write_all(&PFQ1_MAGIC)?;
    out.write_u32::<LittleEndian>(PFQ1_VERSION)?;
    out.write_u64_varint(opts.bloom_bits as u64)?;
    out.write_u64_varint(opts.bloom_k as u64)?;

    let packet_count = rows.len().div_ceil(packet_rows);
    out.write_u64_varint(packet_count as u64)?;

    for (row_chunk, line_chunk) in rows.chunks(packet_rows).zip(lines.chunks(packet_rows)) {
        let mut bloom = BloomFilter::with_params(opts.bloom_bits, opts.bloom_k);
        for line in line_chunk {
            for token in tokenize(line) {
                bloom.insert(token.as_bytes());
            }
        }

        let mut event_ids: Vec<u32> = row_chunk
            .iter()
            .filter_map(|row| match row {
                Row::Event { template_id, .. } => Some(*template_id),
                Row::Unknown { .. } => None,
            })
            .collect();
        event_ids.sort_unstable();
        event_ids.dedup();

        let compressed = compression::compress(&packet::encode_packet(row_chunk), opts.level)?;

        out.write_u64_varint(bloom.bytes().len() as u64)?;
        out.write_all(bloom.bytes())?;

        out.write_u64_varint(event_ids.len() as u64)?;
        for id in event_ids {
            out.write_u64_varint(u64::from(id))?;
        }

        out.write_u64_varint(compressed.len() as u64)?;
        out.write_all(&compressed)?;
    }

    Ok(out)
}

/// One parsed query packet.
#[derive(Debug)]
pub struct Pfq1Packet {
    bloom: BloomFilter,

    /// Distinct event IDs present in this packet
    pub event_ids: Vec<u32>,

    /// Compressed row-mask packet
    compressed: Vec<u8>,
}

impl Pfq1Packet {
    /// Returns `true` if the packet may contain every given token.
    #[must_use]
    pub fn may_contain_all(&self, tokens: &[String]) -> bool {
        tokens.iter().all(|token| self.bloom.contains(token.as_bytes()))
    }

    /// Decompresses and renders this packet's lines.
    pub fn decode_lines(&self, bank: &TemplateBank) -> crate::Result<Vec<String>> {
        let raw = compression::decompress(&self.compressed)?;
        packet::decode_packet(&raw, bank)
    }
}

/// Parsed query blob.
#[derive(Debug)]
pub struct Pfq1Index {
    /// Bits per packet filter
    pub bloom_bits: usize,

    /// Hash functions per filter
    pub bloom_k: usize,

    /// Packets in archive order
    pub packets: Vec<Pfq1Packet>,
}

impl Pfq1Index {
    /// Parses a query blob.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        let mut reader = SliceReader::new(bytes);

        let magic = reader.magic("Pfq1")?;
        if magic != PFQ1_MAGIC {
            return Err(DecodeError::InvalidHeader("Pfq1").into());
        }

        let version = reader.u32_le()?;
        if version > PFQ1_VERSION {
            return Err(crate::Error::UnsupportedVersion(("PFQ1", version)));
        }

        let bloom_bits = reader.count("Pfq1")?;
        let bloom_k = reader.count("Pfq1")?;
        let expected_bloom_len = BloomFilter::byte_len(bloom_bits);

        let packet_count = reader.count("Pfq1")?;

        let mut packets = Vec::new();
        for _ in 0..packet_count {
            let bloom_len = reader.count("Pfq1")?;
            if bloom_len != expected_bloom_len {
                return Err(DecodeError::InvalidHeader("Pfq1Bloom").into());
            }
            let bloom =
                BloomFilter::from_bytes(bloom_bits, bloom_k, reader.exact(bloom_len, "Pfq1")?);

            let eid_count = reader.count("Pfq1")?;
            let mut event_ids = Vec::new();
            for _ in 0..eid_count {
                event_ids.push(
                    u32::try_from(reader.uvarint()?)
                        .map_err(|_| DecodeError::InvalidHeader("Pfq1"))?,
                );
            }

            let comp_len = reader.count("Pfq1")?;
            let compressed = reader.exact(comp_len, "Pfq1")?;

            packets.push(Pfq1Packet {
                bloom,
                event_ids,
                compressed,
            });
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::InvalidHeader("Pfq1").into());
        }

        Ok(Self {
            bloom_bits,
            bloom_k,
            packets,
        })
    }
}
