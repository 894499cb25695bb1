// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use criterion::{criterion_group, criterion_main, Criterion};
use usc::packet::{decode_packet, encode_packet};
use usc::query::tokenize;
use usc::{parse_lines_rows, BloomFilter, TemplateBank};

fn bank() -> TemplateBank {
    TemplateBank::from_templates(&[
        (1, "Receiving block <*> src: <*> dest: <*>"),
        (2, "PacketResponder <*> for block <*> terminating"),
        (3, "Verification succeeded for <*>"),
    ])
    .expect("bank should build")
}

fn sample_lines(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 4 {
            0 => format!("Receiving block blk_{i} src: /10.251.1.{}:54106 dest: /10.251.2.{}:50010", i % 200, i % 200),
            1 => format!("PacketResponder {} for block blk_{i} terminating", i % 3),
            2 => format!("Verification succeeded for blk_{i}"),
            _ => format!("unmatched datanode chatter #{i}"),
        })
        .collect()
}

fn packet_codec(c: &mut Criterion) {
    let bank = bank();
    let lines = sample_lines(50);
    let rows = parse_lines_rows(&lines, &bank);
    let packet = encode_packet(&rows);

    c.bench_function("packet encode 50 rows", |b| {
        b.iter(|| encode_packet(&rows));
    });

    c.bench_function("packet decode 50 rows", |b| {
        b.iter(|| decode_packet(&packet, &bank).expect("should decode"));
    });
}

fn row_factorization(c: &mut Criterion) {
    let bank = bank();
    let lines = sample_lines(1_000);

    c.bench_function("factor 1000 lines", |b| {
        b.iter(|| parse_lines_rows(&lines, &bank));
    });
}

fn bloom_probe(c: &mut Criterion) {
    let lines = sample_lines(50);

    let mut filter = BloomFilter::with_params(4_096, 4);
    for line in &lines {
        for token in tokenize(line) {
            filter.insert(token.as_bytes());
        }
    }

    c.bench_function("bloom probe", |b| {
        b.iter(|| filter.contains(b"terminating"));
    });
}

criterion_group!(benches, packet_codec, row_factorization, bloom_probe);
criterion_main!(benches);
