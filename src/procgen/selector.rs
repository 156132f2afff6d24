//! Random selection helpers layered over any [`rand::Rng`].
//!
//! Every random decision made while generating a layout goes through these
//! methods on the single seeded generator, so a seed fully determines the
//! arena.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error("tried to pick {requested} items from a list of {available}")]
    NotEnoughItems { requested: usize, available: usize },
}

/// Weighted and uniform picks, ranges and coin flips.
pub trait Selector: Rng {
    /// Uniformly choose one element.
    fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        items.choose(self)
    }

    /// Choose one element with probability proportional to its weight.
    ///
    /// Returns `None` for an empty list or when no weight is positive.
    fn pick_weighted<'a, T>(&mut self, items: &'a [(T, f32)]) -> Option<&'a T> {
        let index = WeightedIndex::new(items.iter().map(|(_, w)| w.max(0.0))).ok()?;
        Some(&items[index.sample(self)].0)
    }

    /// Choose `n` distinct elements in random order.
    fn pick_n<T: Clone>(&mut self, items: &[T], n: usize) -> Result<Vec<T>, SelectError> {
        if n > items.len() {
            return Err(SelectError::NotEnoughItems {
                requested: n,
                available: items.len(),
            });
        }

        Ok(items.choose_multiple(self, n).cloned().collect())
    }

    /// Uniform integer in `[lo, hi]`, bounds in either order.
    fn range_int(&mut self, lo: i32, hi: i32) -> i32 {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.gen_range(lo..=hi)
    }

    /// Uniform real in `[lo, hi)`; returns `lo` when the bounds coincide.
    fn range_float(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.gen::<f32>()
    }

    /// `true` with probability `p`, short-circuiting at the extremes.
    fn probability(&mut self, p: f32) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.gen::<f32>() < p
    }
}

impl<R: Rng + ?Sized> Selector for R {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn pick_from_empty_is_none() {
        let mut rng = StdRng::seed_from_u64(1);
        let empty: [u32; 0] = [];
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.pick(&[7]), Some(&7));
    }

    #[test]
    fn pick_n_rejects_oversized_requests() {
        let mut rng = StdRng::seed_from_u64(2);
        let items = [1, 2, 3];
        assert_eq!(
            rng.pick_n(&items, 4),
            Err(SelectError::NotEnoughItems {
                requested: 4,
                available: 3
            })
        );

        let mut picked = rng.pick_n(&items, 3).unwrap();
        picked.sort();
        assert_eq!(picked, vec![1, 2, 3]);
    }

    #[test]
    fn weighted_pick_follows_weights() {
        let mut rng = StdRng::seed_from_u64(3);
        let items = [("red", 0.7), ("green", 0.1), ("blue", 0.2)];
        let mut red = 0;
        for _ in 0..2000 {
            if *rng.pick_weighted(&items).unwrap() == "red" {
                red += 1;
            }
        }
        assert!(red > 1200 && red < 1600, "red picked {red} times");

        assert!(rng.pick_weighted(&[("none", 0.0)]).is_none());
    }

    #[test]
    fn ranges_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..500 {
            let i = rng.range_int(4, 1);
            assert!((1..=4).contains(&i));
            let f = rng.range_float(0.375, 0.625);
            assert!((0.375..0.625).contains(&f));
        }
        assert_eq!(rng.range_float(2.0, 2.0), 2.0);
    }

    #[test]
    fn probability_extremes_are_fixed() {
        let mut rng = StdRng::seed_from_u64(5);
        assert!(!rng.probability(0.0));
        assert!(rng.probability(1.0));
    }
}
