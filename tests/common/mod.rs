// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use rand::{rngs::StdRng, Rng, SeedableRng};
use usc::TemplateBank;

/// Template bank resembling an HDFS datanode log.
pub fn hdfs_bank() -> usc::Result<TemplateBank> {
    TemplateBank::from_templates(&[
        (1, "Receiving block <*> src: <*> dest: <*>"),
        (2, "PacketResponder <*> for block <*> terminating"),
        (3, "Verification succeeded for <*>"),
        (4, "Served block <*> to <*>"),
        (5, "Deleting block <*> file <*>"),
        (6, "Exception in receiveBlock for block <*> java.io.IOException: <*>"),
    ])
}

/// Deterministic synthetic log in the shape of the bank above, with a
/// sprinkling of lines no template covers.
pub fn hdfs_lines(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|i| {
            let blk = format!("blk_{}", rng.random_range(1_000_000..9_999_999u64));
            let ip = format!(
                "/10.251.{}.{}:{}",
                rng.random_range(0..255u16),
                rng.random_range(0..255u16),
                rng.random_range(50_000..59_999u32),
            );

            match i % 11 {
                0 | 1 => format!("Receiving block {blk} src: {ip} dest: {ip}"),
                2 | 3 => format!("PacketResponder {} for block {blk} terminating", i % 3),
                4 | 5 => format!("Verification succeeded for {blk}"),
                6 => format!("Served block {blk} to {ip}"),
                7 => format!("Deleting block {blk} file /hadoop/dfs/data/subdir{}", i % 7),
                8 => format!(
                    "Exception in receiveBlock for block {blk} java.io.IOException: Connection reset by peer"
                ),
                _ => format!("spurious datanode chatter #{i} code={}", rng.random_range(0..99u8)),
            }
        })
        .collect()
}
