// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI for encoding, decoding and querying log archives

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};
use usc::query::CancellationToken;
use usc::{EncodeMode, EncodeOptions, Error, TemplateBank};

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

fn init_tracing(quiet: bool, verbose: u8) {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (the library uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("USC_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("INTERNAL ERROR: setting default tracing subscriber failed");
        std::process::exit(1);
    }
}

/// Coerces a numeric flag that may arrive as an arbitrary string.
///
/// Unparsable values fall back to the given default, with a warning.
fn coerce<T: FromStr + Copy + std::fmt::Display>(
    flag: &str,
    value: Option<&String>,
    default: T,
) -> T {
    match value {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("--{flag}={raw:?} is not numeric, using default {default}");
            default
        }),
    }
}

/// CLI for encoding, decoding and querying log archives
#[derive(Parser, Debug)]
#[command(name = "usc")]
#[command(about = "Log archival and keyword query engine")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a log file into an archive container
    Encode {
        /// Target mode: hot, hot-lite, hot-lite-full, cold, cold-oracle
        #[arg(long)]
        mode: String,

        /// Input log file
        #[arg(long)]
        log: PathBuf,

        /// Template CSV (mined in-process when omitted)
        #[arg(long)]
        tpl: Option<PathBuf>,

        /// Number of input lines to read
        #[arg(long)]
        lines: Option<String>,

        /// Output container file
        #[arg(long)]
        out: PathBuf,

        /// Input rows per packet
        #[arg(long = "packet-events")]
        packet_events: Option<String>,

        /// Compression level
        #[arg(long = "zstd")]
        zstd_level: Option<String>,

        /// Alias for --packet-events
        #[arg(long = "chunk-lines")]
        chunk_lines: Option<String>,
    },

    /// Decode an archive container back into its log lines
    Decode {
        /// Container mode: hot, hot-lite-full, cold
        #[arg(long)]
        mode: String,

        /// Input container file
        #[arg(long)]
        input: PathBuf,

        /// Output log file
        #[arg(long)]
        out: PathBuf,
    },

    /// Decode any archive container, dispatching on its magic
    DecodeAuto {
        /// Input container file
        #[arg(long = "in")]
        input: PathBuf,

        /// Output log file
        #[arg(long)]
        out: PathBuf,
    },

    /// Keyword query over an archive
    Query {
        /// Container mode: hot, hot-lite-full
        #[arg(long)]
        mode: String,

        /// Archive file
        #[arg(long)]
        hot: PathBuf,

        /// Query string
        #[arg(long)]
        q: String,

        /// Maximum number of hits
        #[arg(long)]
        limit: Option<String>,
    },
}

fn run(command: &Command) -> Result<(), Error> {
    match command {
        Command::Encode {
            mode,
            log,
            tpl,
            lines,
            out,
            packet_events,
            zstd_level,
            chunk_lines,
        } => {
            let mode: EncodeMode = mode.parse()?;

            let line_limit = coerce("lines", lines.as_ref(), usize::MAX);
            let packet_rows = coerce(
                "packet-events",
                packet_events.as_ref().or(chunk_lines.as_ref()),
                25,
            );
            let level = coerce("zstd", zstd_level.as_ref(), 10);

            let raw_lines = usc::read_log_lines(log, line_limit)?;

            let bank = match tpl {
                Some(path) => TemplateBank::from_csv(path)?,
                None => usc::mine_bank(&raw_lines)?,
            };

            let opts = EncodeOptions {
                packet_rows,
                level,
                ..EncodeOptions::default()
            };

            usc::encode_to_path(&raw_lines, &bank, mode, &opts, out)?;
            info!("encoded {} -> {} ({mode})", log.display(), out.display());

            Ok(())
        }

        Command::Decode { mode, input, out } => {
            let mode: EncodeMode = mode.parse()?;
            let blob = std::fs::read(input)?;

            let lines = match mode {
                EncodeMode::HotLiteFull => usc::container::tpf3::decode(&blob)?,
                EncodeMode::Hot => usc::container::hot::decode(&blob)?,
                EncodeMode::Cold => usc::container::cold::decode(&blob)?,
            };

            std::fs::write(out, usc::render_output(&lines))?;
            info!("decoded {} lines -> {}", lines.len(), out.display());

            Ok(())
        }

        Command::DecodeAuto { input, out } => {
            let blob = std::fs::read(input)?;

            let (lines, kind) = usc::container::decode_auto(&blob)?;

            std::fs::write(out, usc::render_output(&lines))?;
            println!("decoded ({kind}): {} -> {}", input.display(), out.display());

            Ok(())
        }

        Command::Query {
            mode,
            hot,
            q,
            limit,
        } => {
            let mode: EncodeMode = mode.parse()?;
            let limit = coerce("limit", limit.as_ref(), 50);

            let blob = std::fs::read(hot)?;
            let cancel = CancellationToken::new();

            let outcome = match mode {
                EncodeMode::Hot => usc::query::query_hot(&blob, q, limit, &cancel)?,
                EncodeMode::HotLiteFull => {
                    usc::query::query_hot_lite_full(&blob, q, limit, &cancel)?
                }
                EncodeMode::Cold => usc::query::query_cold(&blob, q, limit, &cancel)?,
            };

            for hit in &outcome.hits {
                println!("{hit}");
            }
            eprintln!("mode={} hits={}", outcome.mode, outcome.hits.len());

            Ok(())
        }
    }
}

fn main() {
    let args = ToolArgs::parse();

    init_tracing(args.quiet, args.verbose);

    if let Err(e) = run(&args.command) {
        error!("{e}");
        eprintln!("{e}");

        let code = match e {
            Error::Usage(_) => 2,
            _ => 1,
        };
        std::process::exit(code);
    }
}
