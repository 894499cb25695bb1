// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Row-mask packet codec.
//!
//! A packet encodes one group of factored rows:
//!
//! ```text
//! "H1M2" | u32 version | row_count | rowmask_len | rowmask_bytes
//!        | inner_len | inner_payload
//! ```
//!
//! The row-mask carries one bit per input row (bit i set = row i is an
//! event), little-bit-endian. The inner payload stores the event
//! channels and the embedded unknown lines:
//!
//! ```text
//! event_count | template_id_count | [tid zig-zag delta…]
//!   | per_slot_count | [slot channel…]
//!   | unknown_count | [line_len | line_bytes…]
//! ```
//!
//! Each slot channel is `len_count | [len…] | concatenated bytes`;
//! channel j holds the slot-j values of every event whose arity exceeds
//! j, in event order. All integers are unsigned varints unless noted.

use crate::{
    coding::{DecodeError, SliceReader},
    file::{H1M2_MAGIC, H1M2_VERSION},
    row::Row,
    template::TemplateBank,
};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;
use varint_rs::VarintWriter;

fn pack_rowmask(rows: &[Row]) -> Vec<u8> {
    let mut mask = vec![0u8; rows.len().div_ceil(8)];

    for (idx, row) in rows.iter().enumerate() {
        if row.is_event() {
            if let Some(byte) = mask.get_mut(idx / 8) {
                *byte |= 1 << (idx % 8);
            }
        }
    }

    mask
}

fn write_string<W: Write>(writer: &mut W, s: &str) -> std::io::Result<()> {
    writer.write_u64_varint(s.len() as u64)?;
    writer.write_all(s.as_bytes())
}

fn write_inner<W: Write>(writer: &mut W, rows: &[Row]) -> std::io::Result<()> {
    let events: Vec<(u32, &[String])> = rows
        .iter()
        .filter_map(|row| match row {
            Row::Event { template_id, slots } => Some((*template_id, slots.as_slice())),
            Row::Unknown { .. } => None,
        })
        .collect();

    writer.write_u64_varint(events.len() as u64)?;
    writer.write_u64_varint(events.len() as u64)?;

    // Template-ID channel, zig-zag deltas against the running prior
    let mut prior = 0i64;
    for (template_id, _) in &events {
        writer.write_i64_varint(i64::from(*template_id) - prior)?;
        prior = i64::from(*template_id);
    }

    let per_slot_count = events.iter().map(|(_, slots)| slots.len()).max().unwrap_or(0);
    writer.write_u64_varint(per_slot_count as u64)?;

    for slot_idx in 0..per_slot_count {
        let values: Vec<&String> = events
            .iter()
            .filter_map(|(_, slots)| slots.get(slot_idx))
            .collect();

        writer.write_u64_varint(values.len() as u64)?;
        for value in &values {
            writer.write_u64_varint(value.len() as u64)?;
        }
        for value in &values {
            writer.write_all(value.as_bytes())?;
        }
    }

    let unknown: Vec<&str> = rows
        .iter()
        .filter_map(|row| match row {
            Row::Unknown { line } => Some(line.as_str()),
            Row::Event { .. } => None,
        })
        .collect();

    writer.write_u64_varint(unknown.len() as u64)?;
    for line in unknown {
        write_string(writer, line)?;
    }

    Ok(())
}

/// Encodes one group of factored rows into a packet byte string.
#[must_use]
#[allow(clippy::expect_used)]
pub fn encode_packet(rows: &[Row]) -> Vec<u8> {
    let rowmask = pack_rowmask(rows);

    let mut inner = Vec::new();
    write_inner(&mut inner, rows).expect("cannot fail");

    let mut out = Vec::with_capacity(inner.len() + rowmask.len() + 16);
    out.write_all(&H1M2_MAGIC).expect("cannot fail");
    out.write_u32::<LittleEndian>(H1M2_VERSION).expect("cannot fail");
    out.write_u64_varint(rows.len() as u64).expect("cannot fail");
    out.write_u64_varint(rowmask.len() as u64).expect("cannot fail");
    out.write_all(&rowmask).expect("cannot fail");
    out.write_u64_varint(inner.len() as u64).expect("cannot fail");
    out.write_all(&inner).expect("cannot fail");

    out
}

/// Decodes a packet back into its original lines.
///
/// Walks the row-mask bit by bit, pulling from the event channels or the
/// unknown channel accordingly, and renders events through the bank.
/// Byte-exact inverse of [`encode_packet`] composed with rendering.
///
/// # Errors
///
/// Magic mismatch and channel/row-count inconsistencies surface as
/// [`crate::Error::Decode`]; a version above the supported one as
/// [`crate::Error::UnsupportedVersion`]; a template ID the bank does not
/// know as [`crate::Error::Template`].
pub fn decode_packet(bytes: &[u8], bank: &TemplateBank) -> crate::Result<Vec<String>> {
    let mut reader = SliceReader::new(bytes);

    let magic = reader.magic("Packet")?;
    if magic != H1M2_MAGIC {
        return Err(DecodeError::InvalidHeader("Packet").into());
    }

    let version = reader.u32_le()?;
    if version > H1M2_VERSION {
        return Err(crate::Error::UnsupportedVersion(("H1M2", version)));
    }

    let row_count = reader.count("Packet")?;

    let rowmask_len = reader.count("Packet")?;
    if rowmask_len != row_count.div_ceil(8) {
        return Err(DecodeError::InvalidHeader("PacketRowMask").into());
    }
    let rowmask = reader.exact(rowmask_len, "PacketRowMask")?;

    let event_bits = rowmask.iter().map(|b| b.count_ones() as usize).sum::<usize>();
    if event_bits > row_count {
        return Err(DecodeError::InvalidHeader("PacketRowMask").into());
    }

    let inner_len = reader.count("Packet")?;
    if inner_len != reader.remaining() {
        return Err(DecodeError::InvalidHeader("Packet").into());
    }

    // Inner payload
    let event_count = reader.count("PacketChannel")?;
    if event_count != event_bits {
        return Err(DecodeError::InvalidHeader("PacketChannel").into());
    }

    let template_id_count = reader.count("PacketChannel")?;
    if template_id_count != event_count {
        return Err(DecodeError::InvalidHeader("PacketChannel").into());
    }

    let mut template_ids = Vec::new();
    let mut prior = 0i64;
    for _ in 0..event_count {
        let id = prior
            .checked_add(reader.ivarint()?)
            .ok_or(DecodeError::InvalidHeader("PacketChannel"))?;
        prior = id;

        template_ids
            .push(u32::try_from(id).map_err(|_| DecodeError::InvalidHeader("PacketChannel"))?);
    }

    let arities: Vec<usize> = template_ids
        .iter()
        .map(|id| {
            bank.get(*id)
                .map(|template| template.arity)
                .ok_or_else(|| crate::Error::Template(format!("unknown template ID {id}")))
        })
        .collect::<crate::Result<_>>()?;

    let per_slot_count = reader.count("PacketChannel")?;
    if per_slot_count != arities.iter().copied().max().unwrap_or(0) {
        return Err(DecodeError::InvalidHeader("PacketChannel").into());
    }

    let mut channels: Vec<Vec<String>> = Vec::new();
    for slot_idx in 0..per_slot_count {
        let expected = arities.iter().filter(|arity| **arity > slot_idx).count();

        let len_count = reader.count("PacketChannel")?;
        if len_count != expected {
            return Err(DecodeError::InvalidHeader("PacketChannel").into());
        }

        let mut lens = Vec::new();
        for _ in 0..len_count {
            lens.push(reader.count("PacketChannel")?);
        }

        let mut values = Vec::new();
        for len in lens {
            let bytes = reader.exact(len, "PacketChannel")?;
            values.push(
                String::from_utf8(bytes)
                    .map_err(|e| crate::Error::from(DecodeError::Utf8(e.utf8_error())))?,
            );
        }
        channels.push(values);
    }

    let unknown_count = reader.count("PacketChannel")?;
    if unknown_count != row_count - event_count {
        return Err(DecodeError::InvalidHeader("PacketChannel").into());
    }

    let mut unknown = Vec::new();
    for _ in 0..unknown_count {
        unknown.push(reader.string("PacketChannel")?);
    }

    if reader.remaining() != 0 {
        return Err(DecodeError::InvalidHeader("Packet").into());
    }

    // Reassemble input ordering by walking the mask
    let mut lines = Vec::with_capacity(row_count);
    let mut event_cursor = 0usize;
    let mut channel_cursors = vec![0usize; per_slot_count];
    let mut unknown_cursor = 0usize;

    for row_idx in 0..row_count {
        let is_event = rowmask
            .get(row_idx / 8)
            .is_some_and(|byte| byte & (1 << (row_idx % 8)) != 0);

        if is_event {
            let (Some(template_id), Some(arity)) = (
                template_ids.get(event_cursor),
                arities.get(event_cursor).copied(),
            ) else {
                return Err(DecodeError::InvalidHeader("PacketChannel").into());
            };

            let mut slots = Vec::with_capacity(arity);
            for slot_idx in 0..arity {
                let (Some(channel), Some(cursor)) = (
                    channels.get(slot_idx),
                    channel_cursors.get_mut(slot_idx),
                ) else {
                    return Err(DecodeError::InvalidHeader("PacketChannel").into());
                };

                let Some(value) = channel.get(*cursor) else {
                    return Err(DecodeError::InvalidHeader("PacketChannel").into());
                };
                *cursor += 1;

                slots.push(value.clone());
            }

            // NOTE: ID resolution already validated above
            let Some(template) = bank.get(*template_id) else {
                return Err(DecodeError::InvalidHeader("PacketChannel").into());
            };

            lines.push(template.render(&slots));
            event_cursor += 1;
        } else {
            let Some(line) = unknown.get(unknown_cursor) else {
                return Err(DecodeError::InvalidHeader("PacketChannel").into());
            };
            unknown_cursor += 1;

            lines.push(line.clone());
        }
    }

    Ok(lines)
}
