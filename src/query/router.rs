// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{line_matches_all, tokenize_unique, CancellationToken, QueryMode, QueryOutcome};
use crate::{
    container::{
        cold,
        hot,
        odc2::Odc2View,
        pf1::Pf1Index,
        pfq1::Pfq1Index,
        tpf3,
    },
    packet,
    template::TemplateBank,
};

/// Candidate templates retained by the FAST path.
const MAX_CANDIDATES: usize = 32;

/// Scores every template by the number of query tokens its text
/// contains, case-folded, and keeps the best-scoring candidates.
///
/// Score-descending, event-ID-ascending for ties; only templates with
/// score > 0 qualify.
fn candidate_event_ids(bank: &TemplateBank, tokens: &[String], max_candidates: usize) -> Vec<u32> {
    let mut scored: Vec<(usize, u32)> = bank
        .iter()
        .filter_map(|template| {
            let text = template.pattern.to_lowercase();
            let score = tokens
                .iter()
                .filter(|token| text.contains(token.as_str()))
                .count();

            (score > 0).then_some((score, template.id))
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    scored.truncate(max_candidates);

    scored.into_iter().map(|(_, id)| id).collect()
}

/// Template-routed FAST path: candidates → selective recall → verify.
fn query_fast(
    recall: &Pf1Index,
    tokens: &[String],
    limit: usize,
    cancel: &CancellationToken,
) -> crate::Result<QueryOutcome> {
    let candidates = candidate_event_ids(recall.bank(), tokens, MAX_CANDIDATES);

    let mut hits = Vec::new();
    let mut cancelled = false;

    'candidates: for event_id in &candidates {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        for (_, line) in recall.recall(*event_id, limit)? {
            if line_matches_all(&line, tokens) {
                hits.push(line);
                if hits.len() >= limit {
                    break 'candidates;
                }
            }
        }
    }

    Ok(QueryOutcome {
        hits,
        mode: QueryMode::Fast,
        cancelled,
        candidates,
    })
}

/// Bloom-screened fallback: probe each packet's filter, decode only the
/// survivors, verify on the rendered lines.
fn query_pfq1(
    query_index: &Pfq1Index,
    bank: &TemplateBank,
    tokens: &[String],
    limit: usize,
    cancel: &CancellationToken,
) -> crate::Result<QueryOutcome> {
    let mut hits = Vec::new();
    let mut cancelled = false;

    'packets: for pfq1_packet in &query_index.packets {
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        if !pfq1_packet.may_contain_all(tokens) {
            continue;
        }

        for line in pfq1_packet.decode_lines(bank)? {
            if line_matches_all(&line, tokens) {
                hits.push(line);
                if hits.len() >= limit {
                    break 'packets;
                }
            }
        }
    }

    Ok(QueryOutcome {
        hits,
        mode: QueryMode::Pfq1,
        cancelled,
        candidates: Vec::new(),
    })
}

/// Queries a hot container.
///
/// Runs the FAST path first; zero hits route to the PFQ1 fallback. The
/// outcome reports which path produced the hits. Hits within one packet
/// preserve line order; hits across packets preserve packet order.
pub fn query_hot(
    container: &[u8],
    query: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> crate::Result<QueryOutcome> {
    let (pf1_blob, pfq1_blob) = hot::split(container)?;
    let recall = Pf1Index::parse(pf1_blob)?;

    let tokens = tokenize_unique(query);
    if tokens.is_empty() {
        return Ok(QueryOutcome {
            hits: Vec::new(),
            mode: QueryMode::Fast,
            cancelled: false,
            candidates: Vec::new(),
        });
    }

    let fast = query_fast(&recall, &tokens, limit, cancel)?;
    if !fast.hits.is_empty() || fast.cancelled {
        log::debug!("query routed FAST: {} hits", fast.hits.len());
        return Ok(fast);
    }

    let query_index = Pfq1Index::parse(pfq1_blob)?;
    let outcome = query_pfq1(&query_index, recall.bank(), &tokens, limit, cancel)?;
    log::debug!("query routed PFQ1: {} hits", outcome.hits.len());

    Ok(outcome)
}

/// Queries a self-describing hot-lite-full container.
///
/// No query index exists, so this is the exhaustive path: full decode
/// plus substring verification.
pub fn query_hot_lite_full(
    container: &[u8],
    query: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> crate::Result<QueryOutcome> {
    let tokens = tokenize_unique(query);

    let mut hits = Vec::new();
    let mut cancelled = false;

    if !tokens.is_empty() {
        for line in tpf3::decode(container)? {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            if line_matches_all(&line, &tokens) {
                hits.push(line);
                if hits.len() >= limit {
                    break;
                }
            }
        }
    }

    Ok(QueryOutcome {
        hits,
        mode: QueryMode::Scan,
        cancelled,
        candidates: Vec::new(),
    })
}

/// Queries a cold bundle.
///
/// The trailing block-bloom footer picks candidate blocks first; only
/// those blocks are materialized and scanned. Without a footer every
/// block is scanned.
pub fn query_cold(
    container: &[u8],
    query: &str,
    limit: usize,
    cancel: &CancellationToken,
) -> crate::Result<QueryOutcome> {
    let (bank, odc2_blob) = cold::parse(container)?;
    let view = Odc2View::parse(odc2_blob)?;

    let tokens = tokenize_unique(query);

    let mut hits = Vec::new();
    let mut cancelled = false;

    if !tokens.is_empty() {
        let blocks: Vec<usize> = match view.footer() {
            Some(footer) => footer.candidate_blocks(&tokens),
            None => (0..view.block_count()).collect(),
        };

        log::debug!(
            "cold query: {} of {} blocks selected",
            blocks.len(),
            view.block_count(),
        );

        'blocks: for block_idx in blocks {
            for raw in view.decode_block(block_idx)? {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break 'blocks;
                }

                for line in packet::decode_packet(&raw, &bank)? {
                    if line_matches_all(&line, &tokens) {
                        hits.push(line);
                        if hits.len() >= limit {
                            break 'blocks;
                        }
                    }
                }
            }
        }
    }

    Ok(QueryOutcome {
        hits,
        mode: QueryMode::Pfq1,
        cancelled,
        candidates: Vec::new(),
    })
}
