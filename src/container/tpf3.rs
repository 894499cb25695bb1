// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Hot-lite-full container.
//!
//! Fully self-describing: the template bank rides inside the container
//! as CSV text, so decoding needs no sidecar file.
//!
//! ```text
//! "TPF3" | u32 version | tpl_len | tpl_csv
//!        | packet_count | [len | compressed packet…]
//! ```
//!
//! Lengths are unsigned varints; each packet is a row-mask packet
//! compressed with the plain general byte compressor.

use crate::{
    coding::{DecodeError, SliceReader},
    compression,
    file::{TPF3_MAGIC, TPF3_VERSION},
    packet,
    row::Row,
    template::TemplateBank,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

/// Encodes factored rows into a self-describing container.
pub fn encode(
    rows: &[Row],
    bank: &TemplateBank,
    packet_rows: usize,
    level: i32,
) -> crate::Result<Vec<u8>> {
    let packet_rows = packet_rows.max(1);
    let csv = bank.to_csv_string();

    let mut out = Vec::new();
    out.write_all(&TPF3_MAGIC)?;
    out.write_u32::<LittleEndian>(TPF3_VERSION)?;
    out.write_u64_varint(csv.len() as u64)?;
    out.write_all(csv.as_bytes())?;

    let packet_count = rows.len().div_ceil(packet_rows);
    out.write_u64_varint(packet_count as u64)?;

    for chunk in rows.chunks(packet_rows) {
        let compressed = compression::compress(&packet::encode_packet(chunk), level)?;
        out.write_u64_varint(compressed.len() as u64)?;
        out.write_all(&compressed)?;
    }

    log::debug!(
        "tpf3: {} rows -> {} packets, {} bytes",
        rows.len(),
        packet_count,
        out.len(),
    );

    Ok(out)
}

/// Decodes a container back into its original lines.
pub fn decode(bytes: &[u8]) -> crate::Result<Vec<String>> {
    let mut reader = SliceReader::new(bytes);

    let magic = reader.magic("Tpf3")?;
    if magic != TPF3_MAGIC {
        return Err(crate::Error::UnsupportedMagic(magic));
    }

    let version = reader.u32_le()?;
    if version > TPF3_VERSION {
        return Err(crate::Error::UnsupportedVersion(("TPF3", version)));
    }

    let csv = reader.string("Tpf3")?;
    let bank = TemplateBank::from_csv_str(&csv)?;

    let packet_count = reader.count("Tpf3")?;

    let mut lines = Vec::new();
    for _ in 0..packet_count {
        let len = reader.count("Tpf3")?;
        let compressed = reader.exact(len, "Tpf3")?;

        let raw = compression::decompress(&compressed)?;
        lines.extend(packet::decode_packet(&raw, &bank)?);
    }

    if reader.remaining() != 0 {
        return Err(DecodeError::InvalidHeader("Tpf3").into());
    }

    Ok(lines)
}
