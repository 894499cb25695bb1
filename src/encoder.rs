// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Per-mode encode pipelines.
//!
//! Every encode walks the same one-way stages: load (or mine) the
//! templates, factor the rows, build the packets and blobs, then commit
//! the finished container atomically. A failure at any stage aborts
//! without leaving a partial file behind.

use crate::{
    container::{
        cold,
        hot,
        odc2::Odc2Options,
        pf1,
        pfq1::{self, Pfq1Options},
        tpf3,
    },
    file,
    row::parse_lines_rows,
    template::{miner::DrainMiner, TemplateBank},
};
use std::path::Path;

/// Target container family of an encode.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EncodeMode {
    /// Hot queryable container (recall + query blobs)
    Hot,

    /// Self-describing container, optimized for lossless reconstruction
    HotLiteFull,

    /// Cold archival bundle (dictionary-compressed block store)
    Cold,
}

impl std::str::FromStr for EncodeMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // `hot-lite` and `cold-oracle` are historical aliases
        match s {
            "hot" => Ok(Self::Hot),
            "hot-lite" | "hot-lite-full" => Ok(Self::HotLiteFull),
            "cold" | "cold-oracle" => Ok(Self::Cold),
            other => Err(crate::Error::Usage(format!("unknown mode {other:?}"))),
        }
    }
}

impl std::fmt::Display for EncodeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Hot => "hot",
                Self::HotLiteFull => "hot-lite-full",
                Self::Cold => "cold",
            }
        )
    }
}

/// Tuning knobs shared by all encode modes.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Input rows per packet
    pub packet_rows: usize,

    /// Compression level
    pub level: i32,

    /// Packets per block (cold mode)
    pub group_size: u32,

    /// Trained dictionary target size in bytes (cold mode)
    pub dict_target_size: usize,

    /// Bits per bloom filter (hot query blob and cold footer)
    pub bloom_bits: usize,

    /// Hash functions per bloom filter
    pub bloom_k: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            packet_rows: 25,
            level: 10,
            group_size: 4,
            dict_target_size: crate::compression::DEFAULT_DICT_SIZE,
            bloom_bits: 4_096,
            bloom_k: 4,
        }
    }
}

/// Encodes raw lines into a container of the given mode.
///
/// The bank must already be built (loaded from CSV or mined); it is
/// immutable from here on.
pub fn encode_lines(
    lines: &[String],
    bank: &TemplateBank,
    mode: EncodeMode,
    opts: &EncodeOptions,
) -> crate::Result<Vec<u8>> {
    log::debug!("encode: templates loaded ({})", bank.len());

    let rows = parse_lines_rows(lines, bank);

    let event_count = rows.iter().filter(|row| row.is_event()).count();
    log::debug!(
        "encode: rows factored ({} events, {} unknown)",
        event_count,
        rows.len() - event_count,
    );

    match mode {
        EncodeMode::HotLiteFull => tpf3::encode(&rows, bank, opts.packet_rows, opts.level),

        EncodeMode::Hot => {
            let pf1_blob = pf1::build(&rows, bank, opts.level)?;
            let pfq1_blob = pfq1::build(
                &rows,
                lines,
                opts.packet_rows,
                &Pfq1Options {
                    bloom_bits: opts.bloom_bits,
                    bloom_k: opts.bloom_k,
                    level: opts.level,
                },
            )?;
            hot::encode(&pf1_blob, &pfq1_blob)
        }

        EncodeMode::Cold => cold::encode(
            &rows,
            lines,
            bank,
            opts.packet_rows,
            &Odc2Options {
                group_size: opts.group_size,
                level: opts.level,
                dict_target_size: opts.dict_target_size,
                bloom_bits: opts.bloom_bits.max(8_192),
                bloom_k: opts.bloom_k,
            },
        ),
    }
}

/// Mines a template bank from the input lines.
///
/// Used when no template CSV is supplied; one miner per encode session.
pub fn mine_bank(lines: &[String]) -> crate::Result<TemplateBank> {
    let mut miner = DrainMiner::default();

    for line in lines {
        miner.observe(line);
    }

    let bank = miner.snapshot()?;
    log::debug!("mined {} templates from {} lines", bank.len(), lines.len());

    Ok(bank)
}

/// Encodes raw lines and commits the container atomically.
///
/// The container is fully built in memory first; the file appears only
/// on success.
pub fn encode_to_path(
    lines: &[String],
    bank: &TemplateBank,
    mode: EncodeMode,
    opts: &EncodeOptions,
    path: &Path,
) -> crate::Result<()> {
    let blob = encode_lines(lines, bank, mode, opts)?;
    file::write_atomic(path, &blob)?;

    log::debug!("encode: container written ({} bytes)", blob.len());

    Ok(())
}

/// Reads up to `limit` lines from a log file.
///
/// Decoding is lossy for invalid UTF-8; each line is stripped of its
/// one trailing newline.
pub fn read_log_lines(path: &Path, limit: usize) -> crate::Result<Vec<String>> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);

    let mut lines: Vec<String> = text.split('\n').map(str::to_owned).collect();

    // A trailing newline yields one empty tail piece, which is not a line
    if lines.last().is_some_and(String::is_empty) {
        lines.pop();
    }

    lines.truncate(limit);
    Ok(lines)
}

/// Joins decoded lines back into file content.
///
/// The decoder's one documented liberty: output always ends with exactly
/// one trailing newline, so inputs that already ended with one
/// round-trip byte-exact and inputs without one gain a single `\n`.
#[must_use]
pub fn render_output(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
