//! Deterministic randomness for reproducible, re-executable training
//!
//! Every random decision in the engine (bagging, feature sampling, local
//! sampling, bucket assignment) is derived from a seeded hash of the values
//! it concerns. Re-running a partition therefore yields identical output.

use std::num::Wrapping;

/// Seeded BLAKE3 hasher over length-prefixed parts.
#[derive(Clone)]
pub struct StableHasher {
    inner: blake3::Hasher,
}

impl StableHasher {
    pub fn new(seed: u64) -> Self {
        let mut inner = blake3::Hasher::new();
        inner.update(&seed.to_le_bytes());
        Self { inner }
    }

    pub fn str(mut self, part: &str) -> Self {
        self.bytes(part.as_bytes());
        self
    }

    pub fn u64(mut self, part: u64) -> Self {
        self.bytes(&part.to_le_bytes());
        self
    }

    fn bytes(&mut self, part: &[u8]) {
        self.inner.update(&(part.len() as u64).to_le_bytes());
        self.inner.update(part);
    }

    pub fn finish(&self) -> u64 {
        let digest = self.inner.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(head)
    }
}

/// Lets `Hash` values feed the same digest, e.g. shuffle keys.
///
/// Integers are written little-endian so the result does not depend on the
/// host platform.
impl std::hash::Hasher for StableHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.bytes(bytes);
    }

    fn write_u8(&mut self, i: u8) {
        self.bytes(&[i]);
    }

    fn write_u16(&mut self, i: u16) {
        self.bytes(&i.to_le_bytes());
    }

    fn write_u32(&mut self, i: u32) {
        self.bytes(&i.to_le_bytes());
    }

    fn write_u64(&mut self, i: u64) {
        self.bytes(&i.to_le_bytes());
    }

    fn write_u128(&mut self, i: u128) {
        self.bytes(&i.to_le_bytes());
    }

    fn write_usize(&mut self, i: usize) {
        self.write_u64(i as u64);
    }

    fn write_i8(&mut self, i: i8) {
        self.write_u8(i as u8);
    }

    fn write_i16(&mut self, i: i16) {
        self.write_u16(i as u16);
    }

    fn write_i32(&mut self, i: i32) {
        self.write_u32(i as u32);
    }

    fn write_i64(&mut self, i: i64) {
        self.write_u64(i as u64);
    }

    fn write_i128(&mut self, i: i128) {
        self.write_u128(i as u128);
    }

    fn write_isize(&mut self, i: isize) {
        self.write_u64(i as i64 as u64);
    }

    fn finish(&self) -> u64 {
        StableHasher::finish(self)
    }
}

/// Map a hash onto `[0, 1)` using its top 53 bits.
pub fn unit_interval(hash: u64) -> f64 {
    (hash >> 11) as f64 / (1u64 << 53) as f64
}

/// Linear congruential generator for short deterministic draw sequences
/// Uses Knuth's MMIX constants
#[derive(Clone, Debug)]
pub struct LcgRng {
    state: Wrapping<u64>,
}

impl LcgRng {
    const MULTIPLIER: u64 = 6364136223846793005;
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self {
            state: Wrapping(seed),
        }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state * Wrapping(Self::MULTIPLIER) + Wrapping(Self::INCREMENT);
        // Low bits of an LCG are weak; fold the high half down.
        let x = self.state.0;
        x ^ (x >> 33)
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_unit(&mut self) -> f64 {
        unit_interval(self.next_u64())
    }

    /// Uniform value in `[0, max)`; zero when `max == 0`.
    pub fn next_below(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        self.next_u64() % max
    }

    /// Poisson draw with mean `lambda` by CDF inversion.
    pub fn next_poisson(&mut self, lambda: f64) -> u32 {
        if lambda <= 0.0 {
            return 0;
        }
        let u = self.next_unit();
        let mut k = 0u32;
        let mut p = (-lambda).exp();
        let mut cdf = p;
        while u > cdf && k < 1_000 {
            k += 1;
            p *= lambda / k as f64;
            cdf += p;
        }
        k
    }
}
