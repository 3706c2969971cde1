//! Logic Gate (flip rule).
//!
//! Evaluated once per prime after the chain has settled. It compares the
//! rank-1 candidate ("winner") with the lowest-gap candidate in the Messy
//! band ("messy low"):
//!
//! ```text
//! flip         = gap(messy_low) < gap(winner)
//! result_rank1 = if flip { messy_low } else { winner }
//! ```

use crate::score::{CandidateScore, RateBand, Ranking};

/// The flip decision. Pure in its two arguments.
pub fn flip(winner: &CandidateScore, messy_low: &CandidateScore) -> bool {
    messy_low.gap() < winner.gap()
}

/// Lowest-gap Messy candidate, with enumeration position as tie-break.
/// Returns its 1-based rank alongside it.
pub fn messy_low(ranking: &Ranking) -> Option<(usize, &CandidateScore)> {
    ranking
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.band == RateBand::Messy)
        .min_by_key(|(_, entry)| (entry.gap(), entry.candidate.position))
        .map(|(i, entry)| (i + 1, entry))
}

/// Apply the gate to `ranking`. Returns whether it flipped.
///
/// Without a Messy candidate the gate is a no-op.
pub fn apply_gate(ranking: &mut Ranking) -> bool {
    let Some(winner) = ranking.winner() else {
        return false;
    };
    let Some((rank, low)) = messy_low(ranking) else {
        return false;
    };
    if !flip(winner, low) {
        return false;
    }
    ranking.promote(rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::Candidate;

    fn entry(position: usize, gap: u64, band: RateBand, score: f64) -> CandidateScore {
        CandidateScore {
            candidate: Candidate::new(position, 1_000, 1_000 + gap),
            rate: 0.0,
            band,
            score,
            fallback: false,
        }
    }

    #[test]
    fn worked_example_flips_on_smaller_messy_gap() {
        let winner = entry(2, 6, RateBand::Clean, 1.0);
        let low = entry(1, 4, RateBand::Messy, 2.0);
        assert!(flip(&winner, &low));

        let mut ranking = Ranking::new(vec![winner, low]);
        assert!(apply_gate(&mut ranking));
        assert_eq!(ranking.winner().map(CandidateScore::gap), Some(4));
    }

    #[test]
    fn no_flip_when_messy_gap_is_not_smaller() {
        let winner = entry(1, 4, RateBand::Clean, 1.0);
        let low = entry(2, 4, RateBand::Messy, 2.0);
        assert!(!flip(&winner, &low));

        let mut ranking = Ranking::new(vec![winner, entry(3, 8, RateBand::Messy, 3.0)]);
        let before = ranking.clone();
        assert!(!apply_gate(&mut ranking));
        assert_eq!(ranking, before);
    }

    #[test]
    fn no_messy_candidate_is_a_no_op() {
        let mut ranking = Ranking::new(vec![
            entry(2, 6, RateBand::Clean, 1.0),
            entry(1, 2, RateBand::Neutral, 2.0),
        ]);
        assert!(messy_low(&ranking).is_none());
        assert!(!apply_gate(&mut ranking));
        assert_eq!(ranking.winner().map(CandidateScore::gap), Some(6));
    }

    #[test]
    fn messy_low_picks_smallest_gap_regardless_of_rank() {
        let ranking = Ranking::new(vec![
            entry(3, 10, RateBand::Neutral, 1.0),
            entry(4, 12, RateBand::Messy, 2.0),
            entry(2, 8, RateBand::Messy, 3.0),
        ]);
        let (rank, low) = messy_low(&ranking).unwrap();
        assert_eq!(rank, 3);
        assert_eq!(low.gap(), 8);
    }

    #[test]
    fn decision_is_pure() {
        let winner = entry(1, 6, RateBand::Clean, 1.0);
        let low = entry(2, 4, RateBand::Messy, 2.0);
        let first = flip(&winner, &low);
        for _ in 0..10 {
            assert_eq!(flip(&winner, &low), first);
        }
    }

    #[test]
    fn messy_winner_never_flips_to_itself() {
        let mut ranking = Ranking::new(vec![
            entry(1, 2, RateBand::Messy, 1.0),
            entry(2, 6, RateBand::Clean, 2.0),
        ]);
        assert!(!apply_gate(&mut ranking));
    }
}
