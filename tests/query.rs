// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod common;

use common::{hdfs_bank, hdfs_lines};
use test_log::test;
use usc::query::{
    query_cold, query_hot, query_hot_lite_full, tokenize, CancellationToken, QueryMode,
};
use usc::{encode_lines, EncodeMode, EncodeOptions, TemplateBank};

fn hot_archive(lines: &[String]) -> usc::Result<Vec<u8>> {
    let bank = hdfs_bank()?;
    encode_lines(lines, &bank, EncodeMode::Hot, &EncodeOptions::default())
}

#[test]
fn fast_path_for_template_keyword() -> usc::Result<()> {
    let lines = hdfs_lines(2_000, 31);
    let archive = hot_archive(&lines)?;

    let outcome = query_hot(&archive, "Exception", 50, &CancellationToken::new())?;

    assert_eq!(QueryMode::Fast, outcome.mode);
    assert!(!outcome.hits.is_empty());
    assert!(outcome.hits.len() <= 50);

    for hit in &outcome.hits {
        assert!(
            hit.to_lowercase().contains("exception"),
            "hit must contain the keyword: {hit}",
        );
    }

    Ok(())
}

#[test]
fn fallback_path_for_unknown_line_keyword() -> usc::Result<()> {
    let mut lines = hdfs_lines(1_000, 32);
    lines.push("thermal sensor FROBNICATOR-9 went offline".to_owned());

    let archive = hot_archive(&lines)?;

    // The token exists only in an unknown line, not in any template text
    let outcome = query_hot(&archive, "frobnicator-9", 50, &CancellationToken::new())?;

    assert_eq!(QueryMode::Pfq1, outcome.mode);
    assert_eq!(
        vec!["thermal sensor FROBNICATOR-9 went offline".to_owned()],
        outcome.hits,
    );

    Ok(())
}

#[test]
fn unknown_only_archive_is_queryable() -> usc::Result<()> {
    // Zero template coverage: an empty bank turns every line unknown
    let bank = TemplateBank::from_templates::<&str>(&[])?;
    let lines: Vec<String> = (0..1_000)
        .map(|i| format!("free-form diagnostic {i} spindle={}", i * 3))
        .collect();

    let archive = encode_lines(&lines, &bank, EncodeMode::Hot, &EncodeOptions::default())?;

    let outcome = query_hot(&archive, "spindle=999", 10, &CancellationToken::new())?;

    assert_eq!(QueryMode::Pfq1, outcome.mode);

    // "spindle=999" tokenizes to {spindle, 999}; two lines carry both
    assert_eq!(
        vec![
            "free-form diagnostic 333 spindle=999".to_owned(),
            "free-form diagnostic 999 spindle=2997".to_owned(),
        ],
        outcome.hits,
    );

    Ok(())
}

#[test]
fn query_never_misses_matching_lines() -> usc::Result<()> {
    let lines = hdfs_lines(1_500, 33);
    let archive = hot_archive(&lines)?;

    let query = "Verification succeeded";
    let tokens = tokenize(query);

    let expected: Vec<&String> = lines
        .iter()
        .filter(|line| {
            let lowered = line.to_lowercase();
            tokens.iter().all(|token| lowered.contains(token))
        })
        .collect();
    assert!(!expected.is_empty());

    let outcome = query_hot(&archive, query, usize::MAX, &CancellationToken::new())?;

    for line in expected {
        assert!(outcome.hits.contains(line), "missing hit: {line}");
    }

    Ok(())
}

#[test]
fn exhaustive_scan_over_hot_lite_full() -> usc::Result<()> {
    let bank = hdfs_bank()?;
    let lines = hdfs_lines(1_000, 34);

    let archive = encode_lines(&lines, &bank, EncodeMode::HotLiteFull, &EncodeOptions::default())?;

    let outcome = query_hot_lite_full(&archive, "Deleting block", 20, &CancellationToken::new())?;

    assert_eq!(QueryMode::Scan, outcome.mode);
    assert!(!outcome.hits.is_empty());

    for hit in &outcome.hits {
        assert!(hit.contains("Deleting block"));
    }

    Ok(())
}

#[test]
fn cold_query_uses_block_prescreen() -> usc::Result<()> {
    let bank = hdfs_bank()?;
    let mut lines = hdfs_lines(800, 35);
    lines.push("singular beacon event QUASAR-42 detected".to_owned());

    let archive = encode_lines(&lines, &bank, EncodeMode::Cold, &EncodeOptions::default())?;

    let outcome = query_cold(&archive, "quasar-42", 10, &CancellationToken::new())?;

    assert_eq!(
        vec!["singular beacon event QUASAR-42 detected".to_owned()],
        outcome.hits,
    );

    Ok(())
}

#[test]
fn hits_preserve_archive_order() -> usc::Result<()> {
    let lines = hdfs_lines(1_200, 36);
    let archive = hot_archive(&lines)?;

    let outcome = query_hot(&archive, "Served block", usize::MAX, &CancellationToken::new())?;
    assert!(!outcome.hits.is_empty());

    // Each hit must appear in input order
    let mut last_pos = 0;
    for hit in &outcome.hits {
        let pos = lines
            .iter()
            .skip(last_pos)
            .position(|line| line == hit)
            .map(|offset| last_pos + offset);

        let Some(pos) = pos else {
            panic!("hit out of order or not in input: {hit}");
        };
        last_pos = pos + 1;
    }

    Ok(())
}

#[test]
fn cancelled_query_returns_partial_flagged() -> usc::Result<()> {
    let lines = hdfs_lines(1_000, 37);
    let archive = hot_archive(&lines)?;

    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = query_hot(&archive, "block", usize::MAX, &cancel)?;
    assert!(outcome.cancelled);

    Ok(())
}

#[test]
fn router_reports_candidates_for_observability() -> usc::Result<()> {
    let lines = hdfs_lines(600, 38);
    let archive = hot_archive(&lines)?;

    let outcome = query_hot(&archive, "terminating", 10, &CancellationToken::new())?;

    assert_eq!(QueryMode::Fast, outcome.mode);
    assert!(outcome.candidates.contains(&2));

    Ok(())
}
