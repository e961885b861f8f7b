//! Piece randomiser: uniform draws or a shuffled bag behind one interface.

use crate::config::RandType;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RandomizerError {
    #[error("empty piece catalogue")]
    EmptyCatalogue,
}

/// Produces the stream of next piece indices.
///
/// `peek` always equals the next `next` result; the pending draw is held
/// until consumed so the preview and the spawn agree.
#[derive(Debug)]
pub struct Randomizer {
    policy: RandType,
    catalogue_len: usize,
    /// Effective bag size: min(configured, catalogue length); full catalogue when 0.
    bag_size: usize,
    bag: Vec<usize>,
    pending: Option<usize>,
    rng: StdRng,
}

impl Randomizer {
    /// Seeded once at startup from entropy.
    pub fn new(
        policy: RandType,
        catalogue_len: usize,
        bag_size: usize,
    ) -> Result<Self, RandomizerError> {
        Self::with_rng(policy, catalogue_len, bag_size, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn with_seed(
        policy: RandType,
        catalogue_len: usize,
        bag_size: usize,
        seed: u64,
    ) -> Result<Self, RandomizerError> {
        Self::with_rng(policy, catalogue_len, bag_size, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        policy: RandType,
        catalogue_len: usize,
        bag_size: usize,
        rng: StdRng,
    ) -> Result<Self, RandomizerError> {
        if catalogue_len == 0 {
            return Err(RandomizerError::EmptyCatalogue);
        }
        let bag_size = if bag_size == 0 {
            catalogue_len
        } else {
            bag_size.min(catalogue_len)
        };
        Ok(Self {
            policy,
            catalogue_len,
            bag_size,
            bag: Vec::with_capacity(bag_size),
            pending: None,
            rng,
        })
    }

    /// Next piece index, consuming the pending peek if any.
    pub fn next(&mut self) -> usize {
        self.pending.take().unwrap_or_else(|| self.draw())
    }

    /// The index the next `next` call will return.
    pub fn peek(&mut self) -> usize {
        if self.pending.is_none() {
            let drawn = self.draw();
            self.pending = Some(drawn);
        }
        self.pending.unwrap()
    }

    /// Clears the bag and any pending draw; the RNG itself is not re-seeded.
    pub fn reset(&mut self) {
        self.bag.clear();
        self.pending = None;
    }

    fn draw(&mut self) -> usize {
        match self.policy {
            RandType::Simple => self.rng.gen_range(0..self.catalogue_len),
            RandType::Bag => {
                if self.bag.is_empty() {
                    self.bag.extend(0..self.bag_size);
                    self.bag.shuffle(&mut self.rng);
                }
                // Draw from the back; the bag is a shuffled permutation.
                self.bag.pop().unwrap_or(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_empty_catalogue_rejected() {
        assert!(matches!(
            Randomizer::with_seed(RandType::Simple, 0, 0, 1),
            Err(RandomizerError::EmptyCatalogue)
        ));
    }

    #[test]
    fn test_peek_matches_next() {
        let mut r = Randomizer::with_seed(RandType::Bag, 7, 0, 42).unwrap();
        for _ in 0..50 {
            let peeked = r.peek();
            assert_eq!(r.peek(), peeked);
            assert_eq!(r.next(), peeked);
        }
    }

    #[test]
    fn test_full_bag_is_permutation() {
        let mut r = Randomizer::with_seed(RandType::Bag, 7, 7, 7).unwrap();
        for _ in 0..3 {
            let drawn: HashSet<usize> = (0..7).map(|_| r.next()).collect();
            assert_eq!(drawn, (0..7).collect());
        }
    }

    #[test]
    fn test_partial_bag_no_repeats_within_window() {
        let mut r = Randomizer::with_seed(RandType::Bag, 7, 4, 3).unwrap();
        for _ in 0..5 {
            let window: Vec<usize> = (0..4).map(|_| r.next()).collect();
            let unique: HashSet<usize> = window.iter().copied().collect();
            assert_eq!(unique.len(), 4);
            assert!(window.iter().all(|&i| i < 7));
        }
    }

    #[test]
    fn test_bag_size_clamped_to_catalogue() {
        let mut r = Randomizer::with_seed(RandType::Bag, 3, 10, 1).unwrap();
        let drawn: HashSet<usize> = (0..3).map(|_| r.next()).collect();
        assert_eq!(drawn, (0..3).collect());
    }

    #[test]
    fn test_simple_stays_in_range() {
        let mut r = Randomizer::with_seed(RandType::Simple, 5, 0, 9).unwrap();
        for _ in 0..200 {
            assert!(r.next() < 5);
        }
    }

    #[test]
    fn test_reset_clears_bag_and_pending() {
        let mut r = Randomizer::with_seed(RandType::Bag, 7, 7, 11).unwrap();
        let _ = r.peek();
        let _ = r.next();
        let _ = r.next();
        r.reset();
        let drawn: HashSet<usize> = (0..7).map(|_| r.next()).collect();
        assert_eq!(drawn, (0..7).collect());
    }
}
