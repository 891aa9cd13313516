//! Deterministic entropy source for simulation runs.
//!
//! Every random decision in a run flows from a single 64-bit seed:
//!
//! ```text
//! seed ──splitmix64──► SimRng(root) ──derive(tick, None)──────► scheduler stream
//!                                   └─derive(tick, agent_id)──► per-turn agent stream
//! ```
//!
//! The root generator is never advanced by the engine; every consumer gets
//! its own derived stream, so adding a consumer never shifts another
//! consumer's draws.

use rand::RngCore;
use thiserror::Error;

/// Golden ratio increment used by splitmix64 and tick mixing.
const GOLDEN_GAMMA: u64 = 0x9e3779b97f4a7c15;

/// Multiplier applied to the agent-id hash before mixing.
const AGENT_MIX: u64 = 0x517cc1b727220a95;

/// 2^53 as f64, the denominator for 53-bit floats.
const TWO_POW_53: f64 = 9_007_199_254_740_992.0;

/// Errors raised by sampling helpers on invalid input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RngError {
    /// `next_int` called with `min > max`
    #[error("Invalid range: min {min} > max {max}")]
    InvalidRange { min: i64, max: i64 },

    /// Sampling from an empty sequence
    #[error("Cannot sample from an empty sequence")]
    Empty,

    /// Weighted sampling with a total weight that is not positive
    #[error("Total weight must be positive, got {0}")]
    NonPositiveWeight(f64),
}

/// One splitmix64 step: advances `state` and returns a mixed output.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(GOLDEN_GAMMA);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Rolling `h * 31 + byte` hash over the UTF-8 bytes of an agent id.
pub fn agent_hash(agent_id: &str) -> u64 {
    agent_id
        .bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64))
}

/// Seeded xorshift128+ generator.
///
/// Two runs built from the same seed produce the same sequence on every
/// platform. Not cryptographically secure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRng {
    s0: u64,
    s1: u64,
}

impl SimRng {
    /// Creates a generator by expanding `seed` into 128 bits of state.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        let mut s0 = splitmix64(&mut sm);
        let s1 = splitmix64(&mut sm);
        // xorshift128+ must never hold an all-zero state
        if s0 == 0 && s1 == 0 {
            s0 = GOLDEN_GAMMA;
        }
        Self { s0, s1 }
    }

    /// Returns the raw 128-bit state as (low, high) words.
    pub fn state(&self) -> (u64, u64) {
        (self.s0, self.s1)
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.s0;
        let y = self.s1;
        self.s0 = y;
        x ^= x << 23;
        self.s1 = x ^ y ^ (x >> 17) ^ (y >> 26);
        self.s1.wrapping_add(y)
    }

    /// Uniform u32 taken from the low bits of the next output.
    pub fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    /// Uniform f64 in `[0, 1)` built from the top 53 bits.
    pub fn next_float(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / TWO_POW_53
    }

    /// Uniform integer in the inclusive range `[min, max]`.
    pub fn next_int(&mut self, min: i64, max: i64) -> Result<i64, RngError> {
        if min > max {
            return Err(RngError::InvalidRange { min, max });
        }
        let span = (max as i128 - min as i128 + 1) as f64;
        let offset = (self.next_float() * span).floor() as i128;
        // Float rounding on very wide spans can land one past the end
        Ok((min as i128 + offset).min(max as i128) as i64)
    }

    /// Uniform index into a collection of `len` elements.
    fn index(&mut self, len: usize) -> usize {
        ((self.next_float() * len as f64) as usize).min(len - 1)
    }

    /// Picks one element uniformly.
    pub fn pick_one<'a, T>(&mut self, items: &'a [T]) -> Result<&'a T, RngError> {
        if items.is_empty() {
            return Err(RngError::Empty);
        }
        let idx = self.index(items.len());
        Ok(&items[idx])
    }

    /// Picks one item with probability proportional to its weight.
    ///
    /// Returns the index of the chosen item. Draws exactly one float.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Result<usize, RngError> {
        if weights.is_empty() {
            return Err(RngError::Empty);
        }
        let total: f64 = weights.iter().sum();
        if !(total > 0.0) {
            return Err(RngError::NonPositiveWeight(total));
        }
        let mut remaining = self.next_float() * total;
        for (idx, &w) in weights.iter().enumerate() {
            remaining -= w;
            if remaining < 0.0 {
                return Ok(idx);
            }
        }
        Ok(weights.len() - 1)
    }

    /// Picks one `(item, weight)` pair proportionally to weight.
    pub fn weighted_pick<'a, T>(&mut self, items: &'a [(T, f64)]) -> Result<&'a T, RngError> {
        let weights: Vec<f64> = items.iter().map(|(_, w)| *w).collect();
        let idx = self.weighted_index(&weights)?;
        Ok(&items[idx].0)
    }

    /// In-place Fisher–Yates shuffle.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.index(i + 1);
            items.swap(i, j);
        }
    }

    /// Bernoulli trial with success probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_float() < p
    }

    /// Fair coin flip.
    pub fn next_bool(&mut self) -> bool {
        self.chance(0.5)
    }

    /// Derives an independent child stream for `(tick, agent_id)`.
    ///
    /// Takes `&self`: the parent's state is untouched, so deriving the same
    /// key twice always yields identical children.
    pub fn derive(&self, tick: u64, agent_id: Option<&str>) -> SimRng {
        let mut seed = self.s0 ^ tick.wrapping_mul(GOLDEN_GAMMA);
        if let Some(id) = agent_id {
            seed ^= agent_hash(id).rotate_left(29).wrapping_mul(AGENT_MIX);
        }
        SimRng::new(seed)
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        SimRng::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        SimRng::next_u64(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = SimRng::next_u64(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);

        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seed_different_sequence() {
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(43);

        let xs: Vec<u64> = (0..8).map(|_| a.next_u64()).collect();
        let ys: Vec<u64> = (0..8).map(|_| b.next_u64()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_zero_seed_is_usable() {
        let mut rng = SimRng::new(0);
        assert_ne!(rng.state(), (0, 0));
        assert_ne!(rng.next_u64(), rng.next_u64());
    }

    #[test]
    fn test_next_float_in_unit_interval() {
        let mut rng = SimRng::new(7);
        for _ in 0..10_000 {
            let x = rng.next_float();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_next_int_rejects_inverted_range() {
        let mut rng = SimRng::new(1);
        assert_eq!(
            rng.next_int(5, 4),
            Err(RngError::InvalidRange { min: 5, max: 4 })
        );
    }

    #[test]
    fn test_next_int_degenerate_range() {
        let mut rng = SimRng::new(1);
        assert_eq!(rng.next_int(9, 9), Ok(9));
    }

    #[test]
    fn test_next_int_extreme_range() {
        let mut rng = SimRng::new(3);
        for _ in 0..1000 {
            let v = rng.next_int(i64::MIN, i64::MAX).unwrap();
            assert!(v >= i64::MIN && v <= i64::MAX);
        }
    }

    #[test]
    fn test_pick_one_empty() {
        let mut rng = SimRng::new(1);
        let empty: [u8; 0] = [];
        assert_eq!(rng.pick_one(&empty), Err(RngError::Empty));
    }

    #[test]
    fn test_pick_one_covers_all_elements() {
        let mut rng = SimRng::new(11);
        let items = ["a", "b", "c"];
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..200 {
            seen.insert(*rng.pick_one(&items).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_weighted_pick_errors() {
        let mut rng = SimRng::new(1);
        let empty: Vec<(u8, f64)> = vec![];
        assert_eq!(rng.weighted_pick(&empty), Err(RngError::Empty));

        let zero = vec![("a", 0.0), ("b", 0.0)];
        assert_eq!(rng.weighted_pick(&zero), Err(RngError::NonPositiveWeight(0.0)));
    }

    #[test]
    fn test_weighted_pick_skips_zero_weight() {
        let mut rng = SimRng::new(5);
        let items = vec![("never", 0.0), ("always", 1.0)];
        for _ in 0..500 {
            assert_eq!(*rng.weighted_pick(&items).unwrap(), "always");
        }
    }

    #[test]
    fn test_weighted_pick_is_proportional() {
        let mut rng = SimRng::new(99);
        let items = vec![("light", 1.0), ("heavy", 9.0)];
        let heavy = (0..10_000)
            .filter(|_| *rng.weighted_pick(&items).unwrap() == "heavy")
            .count();
        // Expect ~9000
        assert!(heavy > 8700 && heavy < 9300, "heavy picked {} times", heavy);
    }

    #[test]
    fn test_shuffle_deterministic() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b: Vec<u32> = (0..20).collect();
        SimRng::new(42).shuffle(&mut a);
        SimRng::new(42).shuffle(&mut b);
        assert_eq!(a, b);

        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = SimRng::new(8);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_derive_does_not_mutate_parent() {
        let root = SimRng::new(42);
        let before = root.state();
        let _child = root.derive(3, Some("trader-0"));
        assert_eq!(root.state(), before);
    }

    #[test]
    fn test_derive_separates_agents_and_ticks() {
        let root = SimRng::new(42);
        let mut a = root.derive(1, Some("trader-0"));
        let mut b = root.derive(1, Some("trader-1"));
        let mut c = root.derive(2, Some("trader-0"));
        let mut d = root.derive(1, None);

        let xs = [a.next_u64(), b.next_u64(), c.next_u64(), d.next_u64()];
        let unique: std::collections::BTreeSet<_> = xs.iter().collect();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_agent_hash_rolling() {
        assert_eq!(agent_hash(""), 0);
        assert_eq!(agent_hash("a"), 97);
        assert_eq!(agent_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn test_rand_distr_interop() {
        use rand_distr::{Distribution, Normal};

        let normal = Normal::new(0.0, 1.0).unwrap();
        let mut a = SimRng::new(42);
        let mut b = SimRng::new(42);
        assert_eq!(normal.sample(&mut a), normal.sample(&mut b));
    }

    proptest! {
        #[test]
        fn derive_is_reproducible(
            seed in any::<u64>(),
            tick in 0u64..100_000,
            agent in "[a-z_]{0,12}-[0-9]{1,3}",
            draws in 1usize..64,
        ) {
            let mut first = SimRng::new(seed).derive(tick, Some(&agent));
            let mut second = SimRng::new(seed).derive(tick, Some(&agent));
            for _ in 0..draws {
                prop_assert_eq!(first.next_u64(), second.next_u64());
            }
        }

        #[test]
        fn next_int_stays_in_range(
            seed in any::<u64>(),
            a in -1_000_000i64..1_000_000,
            b in -1_000_000i64..1_000_000,
        ) {
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            let mut rng = SimRng::new(seed);
            for _ in 0..32 {
                let v = rng.next_int(min, max).unwrap();
                prop_assert!(v >= min && v <= max);
            }
        }

        #[test]
        fn next_int_fails_when_inverted(
            seed in any::<u64>(),
            min in -1000i64..1000,
            gap in 1i64..1000,
        ) {
            let mut rng = SimRng::new(seed);
            prop_assert!(rng.next_int(min, min - gap).is_err());
        }
    }
}
