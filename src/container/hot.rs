// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Hot queryable container.
//!
//! Concatenates the recall blob and the query blob with u32 length
//! prefixes:
//!
//! ```text
//! "USCH" | u32 version | u32 len(pf1) | pf1 | u32 len(pfq1) | pfq1
//! ```

use super::{pf1::Pf1Index, pfq1::Pfq1Index};
use crate::{
    coding::{DecodeError, SliceReader},
    file::{USCH_MAGIC, USCH_VERSION},
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Assembles a hot container from its two blobs.
pub fn encode(pf1: &[u8], pfq1: &[u8]) -> crate::Result<Vec<u8>> {
    let pf1_len = u32::try_from(pf1.len())
        .map_err(|_| crate::Error::Usage("recall blob exceeds u32 length".to_owned()))?;
    let pfq1_len = u32::try_from(pfq1.len())
        .map_err(|_| crate::Error::Usage("query blob exceeds u32 length".to_owned()))?;

    let mut out = Vec::with_capacity(pf1.len() + pfq1.len() + 16);
    out.write_all(&USCH_MAGIC)?;
    out.write_u32::<LittleEndian>(USCH_VERSION)?;
    out.write_u32::<LittleEndian>(pf1_len)?;
    out.write_all(pf1)?;
    out.write_u32::<LittleEndian>(pfq1_len)?;
    out.write_all(pfq1)?;

    Ok(out)
}

/// Splits a hot container into its recall and query blob slices.
pub fn split(bytes: &[u8]) -> crate::Result<(&[u8], &[u8])> {
    let mut reader = SliceReader::new(bytes);

    let magic = reader.magic("Usch")?;
    if magic != USCH_MAGIC {
        return Err(crate::Error::UnsupportedMagic(magic));
    }

    let version = reader.u32_le()?;
    if version > USCH_VERSION {
        return Err(crate::Error::UnsupportedVersion(("USCH", version)));
    }

    let pf1_len = reader.u32_le()? as usize;
    let pf1_start = reader.position();
    let pf1 = bytes
        .get(pf1_start..pf1_start + pf1_len)
        .ok_or(DecodeError::InvalidHeader("Usch"))?;

    let mut reader = SliceReader::new(
        bytes
            .get(pf1_start + pf1_len..)
            .ok_or(DecodeError::InvalidHeader("Usch"))?,
    );
    let pfq1_len = reader.u32_le()? as usize;
    let pfq1_start = pf1_start + pf1_len + reader.position();
    let pfq1 = bytes
        .get(pfq1_start..pfq1_start + pfq1_len)
        .ok_or(DecodeError::InvalidHeader("Usch"))?;

    if pfq1_start + pfq1_len != bytes.len() {
        return Err(DecodeError::InvalidHeader("Usch").into());
    }

    Ok((pf1, pfq1))
}

/// Decodes a hot container back into its original lines.
///
/// The bank comes from the recall blob; the lines come from the query
/// blob's embedded packets, in archive order.
pub fn decode(bytes: &[u8]) -> crate::Result<Vec<String>> {
    let (pf1, pfq1) = split(bytes)?;

    let recall = Pf1Index::parse(pf1)?;
    let query = Pfq1Index::parse(pfq1)?;

    let mut lines = Vec::new();
    for packet in &query.packets {
        lines.extend(packet.decode_lines(recall.bank())?);
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        container::{pf1, pfq1::{self, Pfq1Options}},
        row::parse_lines_rows,
        template::TemplateBank,
    };
    use test_log::test;

    #[test]
    fn usch_roundtrip() -> crate::Result<()> {
        let bank = TemplateBank::from_templates(&[(0, "Deleting block <*> file <*>")])?;

        let lines: Vec<String> = (0..60)
            .map(|i| {
                if i % 5 == 0 {
                    format!("noise row {i}")
                } else {
                    format!("Deleting block blk_{i} file /hadoop/data{i}")
                }
            })
            .collect();

        let rows = parse_lines_rows(&lines, &bank);

        let pf1_blob = pf1::build(&rows, &bank, 3)?;
        let pfq1_blob = pfq1::build(&rows, &lines, 25, &Pfq1Options::default())?;

        let container = encode(&pf1_blob, &pfq1_blob)?;

        let (pf1_out, pfq1_out) = split(&container)?;
        assert_eq!(pf1_blob, pf1_out);
        assert_eq!(pfq1_blob, pfq1_out);

        assert_eq!(lines, decode(&container)?);

        Ok(())
    }

    #[test]
    fn usch_rejects_truncation() -> crate::Result<()> {
        let bank = TemplateBank::from_templates::<&str>(&[])?;
        let lines = vec!["one line".to_owned()];
        let rows = parse_lines_rows(&lines, &bank);

        let pf1_blob = pf1::build(&rows, &bank, 3)?;
        let pfq1_blob = pfq1::build(&rows, &lines, 25, &Pfq1Options::default())?;
        let container = encode(&pf1_blob, &pfq1_blob)?;

        assert!(split(&container[..container.len() - 1]).is_err());

        Ok(())
    }
}
