// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Cold archival bundle.
//!
//! Wraps an indexed block container together with the template bank
//! (as CSV text), so cold archives decode without a sidecar file:
//!
//! ```text
//! "USCC" | u32 version | tpl_len | tpl_csv | odc2 container
//! ```

use super::odc2::{self, Odc2Options, Odc2View};
use crate::{
    coding::{DecodeError, SliceReader},
    file::{USCC_MAGIC, USCC_VERSION},
    packet,
    query::tokenize_unique,
    row::Row,
    template::TemplateBank,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

/// Encodes factored rows into a cold bundle.
pub fn encode(
    rows: &[Row],
    lines: &[String],
    bank: &TemplateBank,
    packet_rows: usize,
    opts: &Odc2Options,
) -> crate::Result<Vec<u8>> {
    if rows.len() != lines.len() {
        return Err(crate::Error::Usage(format!(
            "row/line count mismatch: {} vs {}",
            rows.len(),
            lines.len(),
        )));
    }

    let packet_rows = packet_rows.max(1);

    let packets: Vec<Vec<u8>> = rows
        .chunks(packet_rows)
        .map(packet::encode_packet)
        .collect();

    let packet_tokens: Vec<Vec<String>> = lines
        .chunks(packet_rows)
        .map(|chunk| {
            let text = chunk.join("\n");
            tokenize_unique(&text)
        })
        .collect();

    let odc2_blob = odc2::encode_packets(&packets, Some(&packet_tokens), opts)?;

    let csv = bank.to_csv_string();

    let mut out = Vec::with_capacity(odc2_blob.len() + csv.len() + 16);
    out.write_all(&USCC_MAGIC)?;
    out.write_u32::<LittleEndian>(USCC_VERSION)?;
    out.write_u64_varint(csv.len() as u64)?;
    out.write_all(csv.as_bytes())?;
    out.write_all(&odc2_blob)?;

    Ok(out)
}

/// Splits a cold bundle into its bank and the inner block container.
pub fn parse(bytes: &[u8]) -> crate::Result<(TemplateBank, &[u8])> {
    let mut reader = SliceReader::new(bytes);

    let magic = reader.magic("Uscc")?;
    if magic != USCC_MAGIC {
        return Err(crate::Error::UnsupportedMagic(magic));
    }

    let version = reader.u32_le()?;
    if version > USCC_VERSION {
        return Err(crate::Error::UnsupportedVersion(("USCC", version)));
    }

    let csv = reader.string("Uscc")?;
    let bank = TemplateBank::from_csv_str(&csv)?;

    let odc2_blob = bytes
        .get(reader.position()..)
        .ok_or(DecodeError::InvalidHeader("Uscc"))?;

    Ok((bank, odc2_blob))
}

/// Decodes a cold bundle back into its original lines.
pub fn decode(bytes: &[u8]) -> crate::Result<Vec<String>> {
    let (bank, odc2_blob) = parse(bytes)?;

    let view = Odc2View::parse(odc2_blob)?;

    let mut lines = Vec::new();
    for raw in view.decode_all_packets()? {
        lines.extend(packet::decode_packet(&raw, &bank)?);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::parse_lines_rows;
    use test_log::test;

    fn bank() -> crate::Result<TemplateBank> {
        TemplateBank::from_templates(&[
            (0, "Receiving block <*> src: <*> dest: <*>"),
            (1, "PacketResponder <*> terminating"),
        ])
    }

    fn sample_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| match i % 3 {
                0 => format!("Receiving block blk_{i} src: /10.0.0.1:{i} dest: /10.0.0.2:{i}"),
                1 => format!("PacketResponder {i} terminating"),
                _ => format!("stray line {i}"),
            })
            .collect()
    }

    #[test]
    fn uscc_roundtrip() -> crate::Result<()> {
        let bank = bank()?;
        let lines = sample_lines(120);
        let rows = parse_lines_rows(&lines, &bank);

        let blob = encode(&rows, &lines, &bank, 10, &Odc2Options::default())?;

        assert_eq!(lines, decode(&blob)?);

        Ok(())
    }

    #[test]
    fn uscc_embeds_bank_and_footer() -> crate::Result<()> {
        let bank = bank()?;
        let lines = sample_lines(60);
        let rows = parse_lines_rows(&lines, &bank);

        let blob = encode(&rows, &lines, &bank, 10, &Odc2Options::default())?;

        let (parsed_bank, odc2_blob) = parse(&blob)?;
        assert_eq!(2, parsed_bank.len());

        let view = Odc2View::parse(odc2_blob)?;
        assert!(view.footer().is_some());

        Ok(())
    }

    #[test]
    fn uscc_rejects_wrong_magic() {
        assert!(matches!(
            parse(b"USCX\x01\x00\x00\x00"),
            Err(crate::Error::UnsupportedMagic(_))
        ));
    }
}
