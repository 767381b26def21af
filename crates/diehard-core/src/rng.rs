//! George Marsaglia's multiply-with-carry generator.
//!
//! Non-cryptographic. Fast enough to run on every allocation and free, which
//! is the point: it only has to be unpredictable to an attacker without
//! knowledge of the heap's current state, not to a cryptanalyst.

/// Per-heap state for the MWC recurrence.
#[derive(Debug, Clone, Copy)]
pub struct Mwc {
    z: u32,
    w: u32,
}

impl Mwc {
    /// Builds a generator from explicit seed words. Exposed for
    /// reproducible, seeded tests; production callers should use
    /// [`Mwc::from_entropy`].
    #[must_use]
    pub const fn new(seed_z: u32, seed_w: u32) -> Self {
        Self {
            z: if seed_z == 0 { 1 } else { seed_z },
            w: if seed_w == 0 { 1 } else { seed_w },
        }
    }

    /// Seeds from a non-cryptographic entropy source: nanosecond-resolution
    /// wall clock jitter mixed with a stack address. Never uses a
    /// second-granularity clock, which would make successive heaps
    /// correlated within the same process startup.
    #[must_use]
    pub fn from_entropy() -> Self {
        let sample = entropy_sample();
        Self::new((sample >> 32) as u32, sample as u32)
    }

    /// Advances the generator and returns the next 32-bit word.
    pub fn next(&mut self) -> u32 {
        self.z = 36969u32.wrapping_mul(self.z & 0xFFFF).wrapping_add(self.z >> 16);
        self.w = 18000u32.wrapping_mul(self.w & 0xFFFF).wrapping_add(self.w >> 16);
        (self.z << 16).wrapping_add(self.w)
    }

    /// Draws a uniformly distributed index in `[0, capacity)` for a
    /// power-of-two `capacity`, by masking rather than computing a modulus.
    pub fn next_index(&mut self, capacity: usize) -> usize {
        debug_assert!(capacity.is_power_of_two());
        (self.next() as usize) & (capacity - 1)
    }
}

fn entropy_sample() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    let stack_marker = 0u8;
    let addr = std::ptr::from_ref(&stack_marker) as u64;
    nanos ^ addr.rotate_left(17)
}

#[cfg(test)]
mod tests {
    use super::Mwc;

    #[test]
    fn deterministic_sequence_from_fixed_seed() {
        let mut a = Mwc::new(12345, 65435);
        let mut b = Mwc::new(12345, 65435);
        for _ in 0..64 {
            assert_eq!(a.next(), b.next());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = Mwc::new(1, 1);
        let mut b = Mwc::new(2, 2);
        let seq_a: Vec<u32> = (0..16).map(|_| a.next()).collect();
        let seq_b: Vec<u32> = (0..16).map(|_| b.next()).collect();
        assert_ne!(seq_a, seq_b);
    }

    #[test]
    fn next_index_stays_in_bounds() {
        let mut rng = Mwc::from_entropy();
        for _ in 0..1000 {
            let idx = rng.next_index(128);
            assert!(idx < 128);
        }
    }

    #[test]
    fn zero_seed_is_rejected() {
        let mut rng = Mwc::new(0, 0);
        // A zero/zero state would stay fixed at zero forever; the
        // constructor must avoid it.
        assert_ne!(rng.next(), 0);
    }
}
