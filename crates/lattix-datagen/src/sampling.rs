//! Seeded randomness shared by every stage of a run.
//!
//! A run owns exactly one [`DatasetRng`]. Stages that need randomness take
//! it as `&mut DatasetRng`; parallel work derives independent child streams
//! with [`child_rng`] so results do not depend on scheduling.

use rand::prelude::*;
use rand_xorshift::XorShiftRng;

/// Random source threaded through a pipeline run.
pub type DatasetRng = XorShiftRng;

/// Create the run-wide random source.
pub fn seeded_rng(seed: u64) -> DatasetRng {
    XorShiftRng::seed_from_u64(seed)
}

/// Derive an independent stream for work item `index` under `seed`.
pub fn child_rng(seed: u64, index: usize) -> DatasetRng {
    XorShiftRng::seed_from_u64(seed ^ splitmix64(index as u64))
}

fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Choose `k` of `n` positions uniformly without replacement, returned in
/// ascending order.
///
/// # Complexity
/// O(k log k)
pub fn sample_sorted(rng: &mut DatasetRng, n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut picked = rand::seq::index::sample(rng, n, k).into_vec();
    picked.sort_unstable();
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let a: Vec<u32> = (0..8).map(|_| seeded_rng(7).gen()).collect();
        let mut r1 = seeded_rng(7);
        let mut r2 = seeded_rng(7);
        let b: Vec<u32> = (0..8).map(|_| r1.gen()).collect();
        let c: Vec<u32> = (0..8).map(|_| r2.gen()).collect();
        assert_eq!(b, c);
        assert!(a.iter().all(|&x| x == a[0]));
    }

    #[test]
    fn test_child_streams_differ() {
        let x: u64 = child_rng(1, 0).gen();
        let y: u64 = child_rng(1, 1).gen();
        assert_ne!(x, y);
        let again: u64 = child_rng(1, 0).gen();
        assert_eq!(x, again);
    }

    #[test]
    fn test_sample_sorted() {
        let mut rng = seeded_rng(42);
        let picked = sample_sorted(&mut rng, 100, 20);
        assert_eq!(picked.len(), 20);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        assert!(picked.iter().all(|&i| i < 100));

        // k > n: everything
        assert_eq!(sample_sorted(&mut rng, 3, 10), vec![0, 1, 2]);
    }
}
