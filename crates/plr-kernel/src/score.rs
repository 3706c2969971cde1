//! Scorer.
//!
//! `score = (rate(S_candidate) + offset) × weight(gap)`; lower is cleaner.
//! Ranking is ascending by score, ties broken by gap and then by
//! enumeration position, so the order over distinct candidates is total.

use crate::config::{EngineConfiguration, GapWeight};
use crate::enumerate::Candidate;
use crate::gap::GapBucketing;
use crate::residue::{RateLookup, ResidueClassTable};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Position of a candidate's rate relative to the Clean/Messy thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBand {
    Clean,
    Neutral,
    Messy,
}

impl RateBand {
    /// Strictly below `clean` is Clean, strictly above `messy` is Messy.
    pub fn classify(rate: f64, clean: f64, messy: f64) -> Self {
        if rate < clean {
            RateBand::Clean
        } else if rate > messy {
            RateBand::Messy
        } else {
            RateBand::Neutral
        }
    }
}

impl fmt::Display for RateBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateBand::Clean => write!(f, "clean"),
            RateBand::Neutral => write!(f, "neutral"),
            RateBand::Messy => write!(f, "messy"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CandidateScore {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub rate: f64,
    pub band: RateBand,
    pub score: f64,
    /// The rate came from the missing-class fallback.
    pub fallback: bool,
}

impl CandidateScore {
    pub fn gap(&self) -> u64 {
        self.candidate.gap
    }

    pub fn value(&self) -> u64 {
        self.candidate.value
    }

    fn sort_key(&self) -> (u64, usize) {
        (self.candidate.gap, self.candidate.position)
    }
}

impl Ord for CandidateScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.sort_key().cmp(&other.sort_key()))
    }
}

impl PartialOrd for CandidateScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for CandidateScore {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CandidateScore {}

/// Candidates in rank order; rank 1 is the prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ranking {
    entries: Vec<CandidateScore>,
}

impl Ranking {
    /// Sort `scores` into the natural ascending order.
    pub fn new(mut scores: Vec<CandidateScore>) -> Self {
        scores.sort();
        Self { entries: scores }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn winner(&self) -> Option<&CandidateScore> {
        self.entries.first()
    }

    /// 1-based.
    pub fn at_rank(&self, rank: usize) -> Option<&CandidateScore> {
        rank.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// 1-based rank of the candidate with this value.
    pub fn rank_of(&self, value: u64) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.candidate.value == value)
            .map(|i| i + 1)
    }

    /// Move the entry at `rank` to rank 1; the rest keep their relative order.
    pub fn promote(&mut self, rank: usize) -> bool {
        match rank.checked_sub(1) {
            Some(i) if i < self.entries.len() => {
                self.entries[..=i].rotate_right(1);
                true
            }
            _ => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateScore> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[CandidateScore] {
        &self.entries
    }
}

/// Scores candidates against one frozen table.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'t> {
    table: &'t ResidueClassTable,
    offset: f64,
    weight: GapWeight,
    bucketing: Option<GapBucketing>,
    clean_threshold: f64,
    messy_threshold: f64,
}

impl<'t> Scorer<'t> {
    pub fn new(table: &'t ResidueClassTable, config: &EngineConfiguration) -> Self {
        Self {
            table,
            offset: config.offset,
            weight: config.gap_weight,
            bucketing: config.gap_conditioned.then_some(config.gap_category),
            clean_threshold: config.clean_threshold,
            messy_threshold: config.messy_threshold,
        }
    }

    pub fn lookup(&self, candidate: &Candidate) -> RateLookup {
        let residue = candidate.anchor.residue(self.table.modulus);
        match &self.bucketing {
            Some(bucketing) => self
                .table
                .gap_rate(residue, bucketing.categorize(candidate.gap)),
            None => self.table.rate(residue),
        }
    }

    pub fn score(&self, candidate: Candidate) -> CandidateScore {
        let lookup = self.lookup(&candidate);
        CandidateScore {
            candidate,
            rate: lookup.rate,
            band: RateBand::classify(lookup.rate, self.clean_threshold, self.messy_threshold),
            score: (lookup.rate + self.offset) * self.weight.apply(candidate.gap),
            fallback: lookup.fallback,
        }
    }

    pub fn rank(&self, candidates: &[Candidate]) -> Ranking {
        Ranking::new(candidates.iter().map(|&c| self.score(c)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::residue::ClassStats;
    use std::collections::BTreeMap;

    fn table_mod6(rates: &[(u64, f64)]) -> ResidueClassTable {
        let classes = rates
            .iter()
            .map(|&(residue, rate)| {
                (
                    residue,
                    ClassStats {
                        anchors: 20,
                        failures: (rate * 20.0).round() as u64,
                        rate,
                        substituted: false,
                    },
                )
            })
            .collect();
        ResidueClassTable {
            modulus: 6,
            fallback_rate: 0.1,
            classes,
            gap_classes: BTreeMap::new(),
            substitutions: Vec::new(),
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn worked_example_lower_score_wins() {
        // 43 + 47 = 90 ≡ 0 (mod 6); 43 + 45 = 88 ≡ 4 (mod 6).
        let table = table_mod6(&[(0, 0.05), (4, 0.9)]);
        let config = EngineConfiguration::default();
        let scorer = Scorer::new(&table, &config);

        let clean = scorer.score(Candidate::new(2, 43, 47));
        let messy = scorer.score(Candidate::new(1, 43, 45));
        assert!(close(clean.score, 4.2), "{}", clean.score);
        assert!(close(messy.score, 3.8), "{}", messy.score);

        let ranking = scorer.rank(&[Candidate::new(1, 43, 45), Candidate::new(2, 43, 47)]);
        assert_eq!(ranking.winner().map(CandidateScore::value), Some(45));
        assert_eq!(ranking.rank_of(47), Some(2));
    }

    #[test]
    fn scoring_is_deterministic() {
        let table = table_mod6(&[(0, 0.05), (2, 0.3), (4, 0.9)]);
        let config = EngineConfiguration::default();
        let scorer = Scorer::new(&table, &config);
        let candidate = Candidate::new(3, 97, 103);
        let a = scorer.score(candidate);
        let b = scorer.score(candidate);
        assert_eq!(a.score.to_bits(), b.score.to_bits());
        assert_eq!(a.band, b.band);
    }

    #[test]
    fn bands_follow_strict_thresholds() {
        assert_eq!(RateBand::classify(0.0299, 0.03, 0.20), RateBand::Clean);
        assert_eq!(RateBand::classify(0.03, 0.03, 0.20), RateBand::Neutral);
        assert_eq!(RateBand::classify(0.20, 0.03, 0.20), RateBand::Neutral);
        assert_eq!(RateBand::classify(0.2001, 0.03, 0.20), RateBand::Messy);
    }

    #[test]
    fn absent_class_scores_with_fallback() {
        let table = table_mod6(&[(0, 0.05)]);
        let config = EngineConfiguration::default();
        let scored = Scorer::new(&table, &config).score(Candidate::new(1, 7, 11));
        // 18 ≡ 0 is present; 7 + 13 = 20 ≡ 2 is not.
        assert!(!scored.fallback);
        let missing = Scorer::new(&table, &config).score(Candidate::new(2, 7, 13));
        assert!(missing.fallback);
        assert_eq!(missing.rate, 0.1);
    }

    #[test]
    fn equal_scores_break_on_gap_then_position() {
        let table = table_mod6(&[]);
        let mut config = EngineConfiguration::default();
        config.gap_weight = GapWeight::Linear;
        config.offset = 0.0;
        // Every rate is the 0.1 fallback: scores differ only via gap.
        let scorer = Scorer::new(&table, &config);
        let mut a = scorer.score(Candidate::new(1, 11, 13));
        let mut b = scorer.score(Candidate::new(2, 11, 17));
        a.score = 1.0;
        b.score = 1.0;
        let ranking = Ranking::new(vec![b, a]);
        assert_eq!(ranking.winner().map(CandidateScore::gap), Some(2));

        let mut c = a;
        c.candidate.position = 5;
        let ranking = Ranking::new(vec![c, a]);
        assert_eq!(ranking.winner().map(|s| s.candidate.position), Some(1));
        assert_ne!(a, c);
    }

    #[test]
    fn promote_rotates_to_front() {
        let table = table_mod6(&[(0, 0.05), (2, 0.3), (4, 0.9)]);
        let config = EngineConfiguration::default();
        let scorer = Scorer::new(&table, &config);
        let candidates: Vec<Candidate> = [13, 17, 19, 23]
            .iter()
            .enumerate()
            .map(|(i, &v)| Candidate::new(i + 1, 11, v))
            .collect();
        let mut ranking = scorer.rank(&candidates);
        let before: Vec<u64> = ranking.iter().map(CandidateScore::value).collect();
        assert!(ranking.promote(3));
        let after: Vec<u64> = ranking.iter().map(CandidateScore::value).collect();
        assert_eq!(after, vec![before[2], before[0], before[1], before[3]]);
        assert!(!ranking.promote(0));
        assert!(!ranking.promote(5));
    }
}
