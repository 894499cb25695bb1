// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod common;

use common::{hdfs_bank, hdfs_lines};
use test_log::test;
use usc::container::{self, ContainerKind};
use usc::{encode_lines, EncodeMode, EncodeOptions};

#[test]
fn auto_dispatch_matches_mode_specific_decoders() -> usc::Result<()> {
    let bank = hdfs_bank()?;
    let lines = hdfs_lines(600, 41);
    let opts = EncodeOptions::default();

    let cases = [
        (EncodeMode::HotLiteFull, ContainerKind::HotLiteFull),
        (EncodeMode::Hot, ContainerKind::Hot),
        (EncodeMode::Cold, ContainerKind::Cold),
    ];

    for (mode, expected_kind) in cases {
        let archive = encode_lines(&lines, &bank, mode, &opts)?;

        let specific = match mode {
            EncodeMode::HotLiteFull => container::tpf3::decode(&archive)?,
            EncodeMode::Hot => container::hot::decode(&archive)?,
            EncodeMode::Cold => container::cold::decode(&archive)?,
        };

        let (auto, kind) = container::decode_auto(&archive)?;

        assert_eq!(expected_kind, kind);
        assert_eq!(specific, auto);
        assert_eq!(lines, auto);
    }

    Ok(())
}

#[test]
fn auto_dispatch_rejects_unknown_magic() {
    // 4 bytes matching no known magic
    let garbage = [0x7F, 0x45, 0x4C, 0x46];

    assert!(matches!(
        container::decode_auto(&garbage),
        Err(usc::Error::UnsupportedMagic(_))
    ));

    assert!(matches!(
        container::decode_auto(b""),
        Err(usc::Error::UnsupportedMagic(_))
    ));
}

#[test]
fn detection_uses_magic_only() -> usc::Result<()> {
    let bank = hdfs_bank()?;
    let lines = hdfs_lines(50, 42);

    let archive = encode_lines(&lines, &bank, EncodeMode::Cold, &EncodeOptions::default())?;

    // Same payload behind a foreign magic must be refused, not guessed
    let mut forged = archive;
    forged[..4].copy_from_slice(b"ZZZZ");

    assert!(matches!(
        container::decode_auto(&forged),
        Err(usc::Error::UnsupportedMagic(_))
    ));

    Ok(())
}
