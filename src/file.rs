// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{io::Write, path::Path};

/// Magic of the self-describing hot-lite-full container
pub const TPF3_MAGIC: [u8; 4] = *b"TPF3";

/// Magic of the hot queryable container
pub const USCH_MAGIC: [u8; 4] = *b"USCH";

/// Magic of the cold archival bundle
pub const USCC_MAGIC: [u8; 4] = *b"USCC";

/// Magic of the indexed block container
pub const ODC2_MAGIC: [u8; 4] = *b"ODC2";

/// Magic of the recall blob inside a hot container
pub const PF1_MAGIC: [u8; 4] = *b"TPF1";

/// Magic of the query blob inside a hot container
pub const PFQ1_MAGIC: [u8; 4] = *b"PFQ1";

/// Magic of the row-mask packet wrapper
pub const H1M2_MAGIC: [u8; 4] = *b"H1M2";

/// Magic of the trailing block-bloom footer
pub const BLOCK_BLOOM_MAGIC: [u8; 4] = *b"BB01";

/// Current hot-lite-full container version
pub const TPF3_VERSION: u32 = 1;

/// Current hot container version
pub const USCH_VERSION: u32 = 1;

/// Current cold bundle version
pub const USCC_VERSION: u32 = 1;

/// Current block container version
pub const ODC2_VERSION: u32 = 1;

/// Current recall blob version
pub const PF1_VERSION: u32 = 0;

/// Current query blob version
pub const PFQ1_VERSION: u32 = 1;

/// Current packet wrapper version
pub const H1M2_VERSION: u32 = 1;

/// Reads the 4-byte magic at offset 0.
///
/// Detection dispatches purely on these bytes; shorter inputs have no magic.
#[must_use]
pub fn sniff_magic(bytes: &[u8]) -> Option<[u8; 4]> {
    let head = bytes.get(0..4)?;

    let mut magic = [0u8; 4];
    magic.copy_from_slice(head);
    Some(magic)
}

/// Atomically writes a container file.
///
/// The content is staged in a temporary file next to the target and
/// committed with a rename, so a failed encode never leaves a partial
/// container behind.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let folder = path.parent().filter(|p| !p.as_os_str().is_empty());

    let mut temp_file = match folder {
        Some(folder) => tempfile::NamedTempFile::new_in(folder)?,
        None => tempfile::NamedTempFile::new_in(".")?,
    };
    temp_file.write_all(content)?;
    temp_file.flush()?;
    temp_file.as_file_mut().sync_all()?;
    temp_file.persist(path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn atomic_write() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        let path = dir.path().join("archive.bin");
        write_atomic(&path, b"content")?;
        assert_eq!(b"content", &*std::fs::read(&path)?);

        write_atomic(&path, b"newcontent")?;
        assert_eq!(b"newcontent", &*std::fs::read(&path)?);

        Ok(())
    }

    #[test]
    fn magic_sniffing() {
        assert_eq!(Some(TPF3_MAGIC), sniff_magic(b"TPF3 and then some"));
        assert_eq!(Some(USCH_MAGIC), sniff_magic(b"USCH"));
        assert_eq!(None, sniff_magic(b"TPF"));
        assert_eq!(None, sniff_magic(b""));
    }
}
