//! Selection operators
//!
//! This module provides tournament selection over per-member scores, plus the
//! score vectors the generational loop feeds it.

use rand::seq::index::sample;
use rand::Rng;

use crate::error::OperatorError;
use crate::operators::traits::SelectionOperator;

/// Tournament selection operator
///
/// Samples `tournament_size` distinct members and keeps the best. Each later
/// entrant replaces the current winner unless the winner's score is strictly
/// greater, so for binary tournaments ties go to the second draw.
#[derive(Clone, Debug)]
pub struct TournamentSelection {
    /// Tournament size (number of individuals competing)
    pub tournament_size: usize,
}

impl Default for TournamentSelection {
    fn default() -> Self {
        Self::binary()
    }
}

impl TournamentSelection {
    /// Create a new tournament selection with the given size
    pub fn new(tournament_size: usize) -> Self {
        assert!(tournament_size >= 1, "Tournament size must be at least 1");
        Self { tournament_size }
    }

    /// Create binary tournament selection (size = 2)
    pub fn binary() -> Self {
        Self::new(2)
    }
}

impl SelectionOperator for TournamentSelection {
    fn select<R: Rng + ?Sized>(&self, scores: &[f64], rng: &mut R) -> Result<usize, OperatorError> {
        if scores.is_empty() {
            return Err(OperatorError::SelectionFailed(
                "cannot select from an empty pool".to_string(),
            ));
        }

        let tournament_size = self.tournament_size.min(scores.len());
        let entrants = sample(rng, scores.len(), tournament_size);

        let mut entrants = entrants.iter();
        let first = entrants.next().ok_or_else(|| {
            OperatorError::SelectionFailed("tournament drew no entrants".to_string())
        })?;
        Ok(entrants.fold(first, |best, candidate| {
            if scores[best] > scores[candidate] {
                best
            } else {
                candidate
            }
        }))
    }
}

/// Scores for a pool stored best-first: earlier position, higher score
pub fn positional_scores(len: usize) -> Vec<f64> {
    (0..len).map(|i| -(i as f64)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_tournament_prefers_higher_score() {
        let mut rng = StdRng::seed_from_u64(42);
        let scores = vec![1.0, 5.0, 2.0, 10.0, 3.0];
        let selection = TournamentSelection::new(3);

        let mut counts = [0usize; 5];
        for _ in 0..1000 {
            counts[selection.select(&scores, &mut rng).unwrap()] += 1;
        }
        assert!(counts[3] > counts[0]);
        assert!(counts[3] > counts[2]);
    }

    #[test]
    fn test_binary_never_picks_worst_of_two() {
        let mut rng = StdRng::seed_from_u64(1);
        let scores = vec![0.0, 1.0];
        let selection = TournamentSelection::binary();
        for _ in 0..50 {
            assert_eq!(selection.select(&scores, &mut rng).unwrap(), 1);
        }
    }

    #[test]
    fn test_positional_scores_prefer_lower_index() {
        let mut rng = StdRng::seed_from_u64(7);
        let scores = positional_scores(6);
        let selection = TournamentSelection::binary();

        let mut counts = [0usize; 6];
        for _ in 0..2000 {
            counts[selection.select(&scores, &mut rng).unwrap()] += 1;
        }
        // The last position can never win a binary tournament
        assert_eq!(counts[5], 0);
        assert!(counts[0] > counts[4]);
    }

    #[test]
    fn test_ties_are_not_biased_to_one_index() {
        let mut rng = StdRng::seed_from_u64(3);
        let scores = vec![1.0; 4];
        let selection = TournamentSelection::binary();

        let mut counts = [0usize; 4];
        for _ in 0..2000 {
            counts[selection.select(&scores, &mut rng).unwrap()] += 1;
        }
        assert!(counts.iter().all(|&c| c > 300));
    }

    #[test]
    fn test_single_member_pool() {
        let mut rng = StdRng::seed_from_u64(1);
        let selection = TournamentSelection::binary();
        assert_eq!(selection.select(&[3.0], &mut rng).unwrap(), 0);
    }

    #[test]
    fn test_empty_pool_fails() {
        let mut rng = StdRng::seed_from_u64(1);
        let selection = TournamentSelection::binary();
        assert!(selection.select(&[], &mut rng).is_err());
    }

    #[test]
    fn test_select_many() {
        let mut rng = StdRng::seed_from_u64(9);
        let selection = TournamentSelection::binary();
        let picks = selection.select_many(&[1.0, 2.0, 3.0], 5, &mut rng).unwrap();
        assert_eq!(picks.len(), 5);
        assert!(picks.iter().all(|&i| i < 3));
    }
}
