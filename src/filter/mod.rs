// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bit_array;

pub use bit_array::BitArray;

fn hash64(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh3::xxh3_64(bytes)
}

fn secondary_hash(h1: u64) -> u64 {
    // Taken from https://github.com/tomtomwombat/fastbloom
    h1.wrapping_shr(32).wrapping_mul(0x51_7c_c1_b7_27_22_0a_95)
}

/// A keyword bloom filter with fixed parameters.
///
/// One filter exists per query packet (and per cold block); every filter
/// of an archive shares the same `(m, k)` parameters, which are declared
/// once in the enclosing container. The filter uses double hashing
/// instead of `k` independent hash functions.
///
/// Will never produce a false negative.
#[derive(Debug, Eq, PartialEq)]
pub struct BloomFilter {
    /// Raw bytes exposed as bit array
    inner: BitArray,

    /// Bit count
    m: usize,

    /// Number of hash functions
    k: usize,
}

impl BloomFilter {
    /// Creates an empty filter with `m` bits and `k` hash functions.
    ///
    /// `m` is rounded up to the next full byte.
    #[must_use]
    pub fn with_params(m: usize, k: usize) -> Self {
        let bytes = m.div_ceil(8).max(1);

        Self {
            inner: BitArray::with_capacity(bytes),
            m: bytes * 8,
            k: k.max(1),
        }
    }

    /// Restores a filter from its raw bitmap.
    #[must_use]
    pub fn from_bytes(m: usize, k: usize, bytes: Vec<u8>) -> Self {
        Self {
            inner: BitArray::from_bytes(bytes),
            m,
            k,
        }
    }

    /// Size of the bitmap in bytes for the given bit count.
    #[must_use]
    pub fn byte_len(m: usize) -> usize {
        m.div_ceil(8).max(1)
    }

    /// Returns the raw bitmap.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.inner.bytes()
    }

    /// Adds a key to the filter.
    pub fn insert(&mut self, key: &[u8]) {
        let mut h1 = hash64(key);
        let mut h2 = secondary_hash(h1);

        for i in 1..=(self.k as u64) {
            let idx = h1 % (self.m as u64);

            // NOTE: Filters are tiny, way below 4 GiB
            #[allow(clippy::cast_possible_truncation)]
            self.inner.enable_bit(idx as usize);

            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_mul(i);
        }
    }

    /// Returns `true` if the key may be contained.
    ///
    /// Will never have a false negative.
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        let mut h1 = hash64(key);
        let mut h2 = secondary_hash(h1);

        for i in 1..=(self.k as u64) {
            let idx = h1 % (self.m as u64);

            #[allow(clippy::cast_possible_truncation)]
            if !self.inner.get(idx as usize) {
                return false;
            }

            h1 = h1.wrapping_add(h2);
            h2 = h2.wrapping_mul(i);
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bloom_basic() {
        let mut filter = BloomFilter::with_params(1_024, 4);

        let keys = [
            b"block" as &[u8],
            b"terminating",
            b"exception",
            b"10.251.43.210",
            b"blk_-1608999687919862906",
        ];

        for key in &keys {
            filter.insert(key);
        }

        for key in &keys {
            assert!(filter.contains(key));
        }

        assert!(!filter.contains(b"mapreduce"));
        assert!(!filter.contains(b"zookeeper"));
    }

    #[test]
    fn bloom_bitmap_roundtrip() {
        let mut filter = BloomFilter::with_params(512, 3);
        filter.insert(b"receiving");
        filter.insert(b"src");

        let copy = BloomFilter::from_bytes(512, 3, filter.bytes().to_vec());
        assert!(copy.contains(b"receiving"));
        assert!(copy.contains(b"src"));
        assert!(!copy.contains(b"dest"));
    }

    #[test]
    fn bloom_no_false_negatives() {
        let mut filter = BloomFilter::with_params(4_096, 4);

        let keys: Vec<String> = (0..1_000).map(|_| nanoid::nanoid!()).collect();

        for key in &keys {
            filter.insert(key.as_bytes());
        }

        for key in &keys {
            assert!(filter.contains(key.as_bytes()));
        }
    }

    #[test]
    fn bloom_fpr_reasonable() {
        let item_count = 1_000;

        let mut filter = BloomFilter::with_params(item_count * 10, 4);

        for key in (0..item_count).map(|_| nanoid::nanoid!()) {
            filter.insert(key.as_bytes());
        }

        let mut false_positives = 0;

        for key in (0..item_count).map(|_| nanoid::nanoid!()) {
            if filter.contains(key.as_bytes()) {
                false_positives += 1;
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let fpr = false_positives as f32 / item_count as f32;
        assert!(fpr < 0.05);
    }
}
