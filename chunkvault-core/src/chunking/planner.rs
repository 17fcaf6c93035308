//! Chunk-size planning.
//!
//! Picks the chunk count whose average size sits closest to the target while
//! staying inside `(min, max)`, then spreads the rounding remainder over the
//! leading entries so the plan sums to the data size.

use serde::{Deserialize, Serialize};

/// Ordered payload sizes, one per forthcoming data chunk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizePlan(Vec<u64>);

impl SizePlan {
    pub fn sizes(&self) -> &[u64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn into_sizes(self) -> Vec<u64> {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    More,
    Fewer,
}

impl Direction {
    fn step(self, n: u64) -> u64 {
        match self {
            Direction::More => n + 1,
            Direction::Fewer => n - 1,
        }
    }
}

/// Plan chunk sizes for `data_size` bytes.
///
/// Below `min` the plan is the single nominal entry `[min]`; the chunk that
/// actually gets written will be shorter. Otherwise the entries sum to
/// `data_size` exactly and every entry is at least 1.
pub fn plan(data_size: u64, min: u64, target: u64, max: u64) -> SizePlan {
    if data_size < min {
        return SizePlan(vec![min]);
    }
    if data_size <= target {
        return SizePlan(vec![data_size]);
    }
    let n = chunk_count(data_size, min, target, max);
    SizePlan(distribute(data_size, n))
}

fn average(data_size: u64, n: u64) -> f64 {
    data_size as f64 / n as f64
}

fn margin(data_size: u64, target: u64, n: u64) -> f64 {
    (target as f64 - average(data_size, n)).abs()
}

fn chunk_count(data_size: u64, min: u64, target: u64, max: u64) -> u64 {
    let (lo, hi) = (min as f64, max as f64);
    let inside = |n: u64| {
        let avg = average(data_size, n);
        avg > lo && avg < hi
    };

    let mut n = 1u64;
    let mut last: Option<Direction> = None;
    let mut reversals = 0u32;

    loop {
        let avg = average(data_size, n);
        let dir = if avg >= hi {
            Direction::More
        } else if avg <= lo {
            Direction::Fewer
        } else {
            let here = margin(data_size, target, n);
            let more = (inside(n + 1) && margin(data_size, target, n + 1) < here)
                .then(|| margin(data_size, target, n + 1));
            let fewer = (n > 1 && inside(n - 1) && margin(data_size, target, n - 1) < here)
                .then(|| margin(data_size, target, n - 1));
            match (more, fewer) {
                (None, None) => return n,
                (Some(_), None) => Direction::More,
                (None, Some(_)) => Direction::Fewer,
                (Some(m), Some(f)) => {
                    if m <= f {
                        Direction::More
                    } else {
                        Direction::Fewer
                    }
                }
            }
        };

        if dir == Direction::Fewer && n == 1 {
            return 1;
        }

        if let Some(prev) = last {
            if prev != dir {
                reversals += 1;
                if reversals >= 2 {
                    // oscillating between n and its neighbour: keep the closer one
                    let other = dir.step(n);
                    return if margin(data_size, target, other) < margin(data_size, target, n) {
                        other
                    } else {
                        n
                    };
                }
            }
        }
        last = Some(dir);
        n = dir.step(n);
    }
}

fn distribute(data_size: u64, n: u64) -> Vec<u64> {
    let base = (data_size + n / 2) / n;
    let remainder = data_size as i128 - (base as i128) * (n as i128);
    let mut sizes = vec![base; n as usize];
    let adjust = remainder.unsigned_abs() as usize;
    for size in sizes.iter_mut().take(adjust) {
        if remainder > 0 {
            *size += 1;
        } else {
            *size -= 1;
        }
    }
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u64 = 1_000_000 - 4;
    const TGT: u64 = 1_500_000 - 4;
    const MAX: u64 = 2_000_000 - 4;

    #[test]
    fn below_min_returns_nominal_min() {
        assert_eq!(plan(500_000, MIN, TGT, MAX).sizes(), &[999_996]);
        assert_eq!(plan(0, MIN, TGT, MAX).sizes(), &[MIN]);
    }

    #[test]
    fn exactly_target_is_one_chunk() {
        assert_eq!(plan(TGT, MIN, TGT, MAX).sizes(), &[TGT]);
        assert_eq!(plan(MIN, MIN, TGT, MAX).sizes(), &[MIN]);
    }

    #[test]
    fn between_target_and_max_stays_single() {
        // two chunks would average ~0.9M, below min
        let p = plan(1_800_000, MIN, TGT, MAX);
        assert_eq!(p.sizes(), &[1_800_000]);
    }

    #[test]
    fn large_input_lands_near_target() {
        let data = 10_000_000;
        let p = plan(data, MIN, TGT, MAX);
        assert_eq!(p.total(), data);
        // 7 chunks average 1_428_571; 6 would be 1_666_666
        assert_eq!(p.len(), 7);
        for s in p.sizes() {
            assert!(*s > MIN && *s < MAX);
        }
    }

    #[test]
    fn remainder_is_front_loaded() {
        let p = plan(10_000_000, MIN, TGT, MAX);
        let sizes = p.sizes();
        assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
        assert!(sizes[0] - sizes[sizes.len() - 1] <= 1);
    }

    #[test]
    fn negative_remainder_is_distributed() {
        // 19 / 4 rounds to 5 per chunk, four chunks overshoot by one
        assert_eq!(distribute(19, 4), vec![4, 5, 5, 5]);
        assert_eq!(distribute(21, 4), vec![6, 5, 5, 5]);
    }

    #[test]
    fn narrow_bounds_settle_on_closest_count() {
        // no count puts the average strictly inside (10, 12)
        let p = plan(25, 10, 11, 12);
        assert_eq!(p.sizes(), &[12, 13]);
    }

    #[test]
    fn oscillation_picks_smaller_margin() {
        // target 10 with (min 9, max 11): 2 chunks avg 12.5, 3 chunks avg 8.33
        assert_eq!(chunk_count(25, 9, 10, 11), 3);
    }
}
