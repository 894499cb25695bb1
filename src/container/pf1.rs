// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Recall blob.
//!
//! Maps each event ID to its occurrences (line position + slot values),
//! one independently compressed entry per event, so recalling one
//! event's lines touches only that entry:
//!
//! ```text
//! "TPF1" | u32 version
//!        | tpl_count | [eid | tpl_len | tpl_text…]
//!        | entry_count | [eid | comp_len | compressed entry…]
//! ```
//!
//! An entry decompresses to `occurrence_count | [line_pos | arity ×
//! (len | bytes)…]`. The blob also carries the full template list; the
//! enclosing hot container uses it as its bank.

use crate::{
    coding::{DecodeError, SliceReader},
    compression,
    file::{PF1_MAGIC, PF1_VERSION},
    row::Row,
    template::TemplateBank,
};
use byteorder::{LittleEndian, WriteBytesExt};
use rustc_hash::FxHashMap;
use std::io::Write;
use varint_rs::VarintWriter;

/// Builds the recall blob for a factored archive.
pub fn build(rows: &[Row], bank: &TemplateBank, level: i32) -> crate::Result<Vec<u8>> {
    // Occurrences per event ID, in line order
    let mut occurrences: FxHashMap<u32, Vec<(u64, &[String])>> = FxHashMap::default();

    for (pos, row) in rows.iter().enumerate() {
        if let Row::Event { template_id, slots } = row {
            occurrences
                .entry(*template_id)
                .or_default()
                .push((pos as u64, slots.as_slice()));
        }
    }

    let mut out = Vec::new();
    out.write_all(&PF1_MAGIC)?;
    out.write_u32::<LittleEndian>(PF1_VERSION)?;

    out.write_u64_varint(bank.len() as u64)?;
    for template in bank.iter() {
        out.write_u64_varint(u64::from(template.id))?;
        out.write_u64_varint(template.pattern.len() as u64)?;
        out.write_all(template.pattern.as_bytes())?;
    }

    // Entries follow bank order so identical inputs serialize identically
    let entry_ids: Vec<u32> = bank
        .iter()
        .map(|template| template.id)
        .filter(|id| occurrences.contains_key(id))
        .collect();

    out.write_u64_varint(entry_ids.len() as u64)?;

    for id in entry_ids {
        let Some(entries) = occurrences.get(&id) else {
            continue;
        };

        let mut payload = Vec::new();
        payload.write_u64_varint(entries.len() as u64)?;

        for (pos, slots) in entries {
            payload.write_u64_varint(*pos)?;
            for slot in *slots {
                payload.write_u64_varint(slot.len() as u64)?;
                payload.write_all(slot.as_bytes())?;
            }
        }

        let compressed = compression::compress(&payload, level)?;

        out.write_u64_varint(u64::from(id))?;
        out.write_u64_varint(compressed.len() as u64)?;
        out.write_all(&compressed)?;
    }

    Ok(out)
}

/// Parsed recall blob.
///
/// Entries stay compressed until [`Pf1Index::recall`] asks for them.
#[derive(Debug)]
pub struct Pf1Index {
    bank: TemplateBank,
    entries: FxHashMap<u32, Vec<u8>>,
}

impl Pf1Index {
    /// Parses a recall blob.
    pub fn parse(bytes: &[u8]) -> crate::Result<Self> {
        let mut reader = SliceReader::new(bytes);

        let magic = reader.magic("Pf1")?;
        if magic != PF1_MAGIC {
            return Err(DecodeError::InvalidHeader("Pf1").into());
        }

        let version = reader.u32_le()?;
        if version > PF1_VERSION {
            return Err(crate::Error::UnsupportedVersion(("TPF1", version)));
        }

        let template_count = reader.count("Pf1")?;
        let mut templates = Vec::new();
        for _ in 0..template_count {
            let id = u32::try_from(reader.uvarint()?)
                .map_err(|_| DecodeError::InvalidHeader("Pf1"))?;
            let pattern = reader.string("Pf1")?;
            templates.push((id, pattern));
        }

        let bank = TemplateBank::from_templates(&templates)?;

        let entry_count = reader.count("Pf1")?;
        let mut entries = FxHashMap::default();
        for _ in 0..entry_count {
            let id = u32::try_from(reader.uvarint()?)
                .map_err(|_| DecodeError::InvalidHeader("Pf1"))?;
            let len = reader.count("Pf1")?;
            entries.insert(id, reader.exact(len, "Pf1")?);
        }

        if reader.remaining() != 0 {
            return Err(DecodeError::InvalidHeader("Pf1").into());
        }

        Ok(Self { bank, entries })
    }

    /// The archive's template bank.
    #[must_use]
    pub fn bank(&self) -> &TemplateBank {
        &self.bank
    }

    /// Returns `true` if the event occurred at least once.
    #[must_use]
    pub fn has_event(&self, event_id: u32) -> bool {
        self.entries.contains_key(&event_id)
    }

    /// Recalls up to `limit` rendered lines of one event.
    ///
    /// Lines come back in input order, each paired with its original
    /// line position. Only this event's entry is decompressed.
    pub fn recall(&self, event_id: u32, limit: usize) -> crate::Result<Vec<(u64, String)>> {
        let Some(compressed) = self.entries.get(&event_id) else {
            return Ok(Vec::new());
        };

        let template = self.bank.get(event_id).ok_or_else(|| {
            crate::Error::Template(format!("recall entry for unknown template ID {event_id}"))
        })?;

        let payload = compression::decompress(compressed)?;
        let mut reader = SliceReader::new(&payload);

        let occurrence_count = reader.count("Pf1Entry")?;

        let mut hits = Vec::new();
        for _ in 0..occurrence_count {
            if hits.len() >= limit {
                break;
            }

            let pos = reader.uvarint()?;

            let mut slots = Vec::with_capacity(template.arity);
            for _ in 0..template.arity {
                slots.push(reader.string("Pf1Entry")?);
            }

            hits.push((pos, template.render(&slots)));
        }

        Ok(hits)
    }
}
