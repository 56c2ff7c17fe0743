// Session-scoped pseudo-random number generator for remote play.
//
// Every `Remote` session owns one `SessionRng`. It draws the 16-bit entity
// ids handed to peers that join a lobby and the per-match RNG seed the host
// broadcasts once all mission supplies are in. The generator is xoshiro256++
// expanded from a single `u64` seed with SplitMix64.
//
// Two sessions seeded identically produce identical entity ids, which the
// integration tests rely on to script multi-peer lobbies. Only integer
// arithmetic is used so the output stream is the same on every platform.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ generator owned by one remote session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRng {
    s: [u64; 4],
}

impl SessionRng {
    /// Seed a generator. The seed is spread across the 256-bit state with
    /// SplitMix64, so small or sequential seeds are fine.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s = [0u64; 4];
        for word in &mut s {
            *word = splitmix64(&mut sm);
        }
        Self { s }
    }

    pub fn next_u64(&mut self) -> u64 {
        let [s0, s1, s2, s3] = self.s;
        let out = s0.wrapping_add(s3).rotate_left(23).wrapping_add(s0);

        let shifted = s1 << 17;
        let mut next = [s0, s1, s2 ^ s0, s3 ^ s1];
        next[1] ^= next[2];
        next[0] ^= next[3];
        next[2] ^= shifted;
        next[3] = next[3].rotate_left(45);
        self.s = next;

        out
    }

    /// Upper half of the next `u64`; the high bits are the strongest.
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform integer in `[low, high)` without modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_u32(&mut self, low: u32, high: u32) -> u32 {
        assert!(low < high, "range_u32: empty range {low}..{high}");
        let span = u64::from(high - low);
        // Reject the short tail of the u64 space that would bias low values.
        let zone = u64::MAX - (u64::MAX % span);
        loop {
            let draw = self.next_u64();
            if draw < zone {
                return low + (draw % span) as u32;
            }
        }
    }

    /// Uniform `u16` in `[low, high)`.
    pub fn range_u16(&mut self, low: u16, high: u16) -> u16 {
        self.range_u32(u32::from(low), u32::from(high)) as u16
    }
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SessionRng::new(7);
        let mut b = SessionRng::new(7);
        for _ in 0..500 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SessionRng::new(1);
        let mut b = SessionRng::new(2);
        let first_a: Vec<u64> = (0..4).map(|_| a.next_u64()).collect();
        let first_b: Vec<u64> = (0..4).map(|_| b.next_u64()).collect();
        assert_ne!(first_a, first_b);
    }

    #[test]
    fn range_u32_stays_in_bounds() {
        let mut rng = SessionRng::new(99);
        for _ in 0..10_000 {
            let v = rng.range_u32(10, 32_001);
            assert!((10..32_001).contains(&v), "out of range: {v}");
        }
    }

    #[test]
    fn range_u16_reaches_both_ends_of_small_range() {
        let mut rng = SessionRng::new(3);
        let mut seen = [false; 3];
        for _ in 0..1_000 {
            let v = rng.range_u16(5, 8);
            seen[usize::from(v - 5)] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    #[should_panic(expected = "empty range")]
    fn range_u32_rejects_empty_range() {
        SessionRng::new(0).range_u32(4, 4);
    }

    #[test]
    fn serde_roundtrip_continues_stream() {
        let mut rng = SessionRng::new(42);
        for _ in 0..17 {
            rng.next_u32();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: SessionRng = serde_json::from_str(&json).unwrap();
        assert_eq!(rng, restored);
        for _ in 0..50 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
