#![allow(dead_code)]

use std::hash::{BuildHasherDefault, Hasher};

use stashtable::StashTable;

/// Run the test against tables of different shapes: tight, power-of-two, and
/// roomy relative to the default workloads.
pub fn with_table<K, V>(test: impl Fn(&dyn Fn() -> StashTable<K, V>)) {
    for capacity in [5, 64, 1024] {
        test(&move || StashTable::with_capacity(capacity));
    }
}

pub fn threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get().min(8))
        .unwrap_or(4)
}

/// Hashes an integer key to itself, giving tests full control over bucket
/// placement: with capacity 8, keys 0, 8, 16, 24 all collide in bucket 0.
#[derive(Default)]
pub struct IdentityHasher(u64);

pub type Identity = BuildHasherDefault<IdentityHasher>;

impl Hasher for IdentityHasher {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0 << 8) | byte as u64;
        }
    }

    fn write_u8(&mut self, n: u8) {
        self.0 = n as u64;
    }

    fn write_u32(&mut self, n: u32) {
        self.0 = n as u64;
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }

    fn write_usize(&mut self, n: usize) {
        self.0 = n as u64;
    }
}
