// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A log-oriented archival and keyword query engine.
//!
//! Line-structured logs are factored into recurring templates plus
//! per-line slot values, packed into self-describing binary containers,
//! and queried by keyword without full decompression.
//!
//! The pipeline, bottom up:
//!
//! 1. a dictionary-trainable byte compressor ([`compression`])
//! 2. template mining and row factorization ([`template`], [`row`])
//! 3. the row-mask packet codec ([`packet`])
//! 4. magic-versioned containers ([`container`])
//! 5. the keyword query router ([`query`])
//!
//! Decoding a whole container reproduces the original lines exactly;
//! the only liberty the decoder takes is ending its output with exactly
//! one trailing newline.
//!
//! # Example usage
//!
//! ```
//! use usc::{encode_lines, mine_bank, EncodeMode, EncodeOptions};
//! use usc::query::{query_hot, CancellationToken};
//!
//! let lines: Vec<String> = (0..100)
//!     .map(|i| format!("Served block blk_{i} to /10.0.0.{}", i % 8))
//!     .collect();
//!
//! // Mine templates in-process (or load them from a template CSV)
//! let bank = mine_bank(&lines)?;
//!
//! // Build a hot (queryable) archive
//! let archive = encode_lines(&lines, &bank, EncodeMode::Hot, &EncodeOptions::default())?;
//!
//! // Keyword search without full decompression
//! let outcome = query_hot(&archive, "blk_42", 10, &CancellationToken::new())?;
//! assert!(!outcome.hits.is_empty());
//!
//! // Lossless reconstruction
//! let decoded = usc::container::hot::decode(&archive)?;
//! assert_eq!(lines, decoded);
//! #
//! # Ok::<(), usc::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::option_if_let_else)]

mod coding;
pub mod compression;
pub mod container;
mod encoder;
mod error;

#[doc(hidden)]
pub mod file;

mod filter;
pub mod packet;
pub mod query;
mod row;
pub mod template;

pub use coding::{Decode, DecodeError, Encode, EncodeError};
pub use encoder::{
    encode_lines, encode_to_path, mine_bank, read_log_lines, render_output, EncodeMode,
    EncodeOptions,
};
pub use error::{Error, Result};
pub use filter::BloomFilter;
pub use row::{parse_lines, parse_lines_rows, Row};
pub use template::{Template, TemplateBank};
