//! Correction Chain.
//!
//! Rank-targeted override rules applied in priority order after scoring.
//! A rule reads only the already-computed scores and their ranks; it never
//! re-scores. The first rule whose predicate holds promotes its target to
//! rank 1 and ends the pass, so at most one rule fires per prime.

use crate::error::PlrError;
use crate::score::{RateBand, Ranking};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MESSY_RANK_PREFIX: &str = "messy_rank_";

/// One override rule, identified in configuration by its string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CorrectionRule {
    /// `messy_rank_<k>`: the winner sits in a Clean class while the rank-k
    /// candidate sits in a Messy one. The winner is distrusted and rank k
    /// is promoted.
    MessyAtRank(usize),
}

impl CorrectionRule {
    /// The deepest rank this rule inspects.
    pub fn inspected_rank(&self) -> usize {
        match *self {
            CorrectionRule::MessyAtRank(k) => k,
        }
    }

    /// The rank to promote when the predicate holds, or `None`.
    ///
    /// A ranking too short for the rule never matches.
    pub fn target(&self, ranking: &Ranking) -> Option<usize> {
        match *self {
            CorrectionRule::MessyAtRank(k) => {
                let winner = ranking.winner()?;
                let candidate = ranking.at_rank(k)?;
                (winner.band == RateBand::Clean && candidate.band == RateBand::Messy).then_some(k)
            }
        }
    }
}

impl fmt::Display for CorrectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionRule::MessyAtRank(k) => write!(f, "{MESSY_RANK_PREFIX}{k}"),
        }
    }
}

impl FromStr for CorrectionRule {
    type Err = PlrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix(MESSY_RANK_PREFIX)
            .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|digits| digits.parse::<usize>().ok())
            .filter(|&k| k >= 2)
            .map(CorrectionRule::MessyAtRank)
            .ok_or_else(|| PlrError::UnknownRule(s.to_string()))
    }
}

impl From<CorrectionRule> for String {
    fn from(rule: CorrectionRule) -> Self {
        rule.to_string()
    }
}

impl TryFrom<String> for CorrectionRule {
    type Error = PlrError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Ordered, validated rule list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionChain {
    rules: Vec<CorrectionRule>,
}

impl CorrectionChain {
    /// Parse rule identifiers, keeping their order. Duplicates are rejected.
    pub fn parse<S: AsRef<str>>(ids: &[S]) -> Result<Self, PlrError> {
        let mut rules: Vec<CorrectionRule> = Vec::with_capacity(ids.len());
        for id in ids {
            let rule: CorrectionRule = id.as_ref().parse()?;
            if rules.contains(&rule) {
                return Err(PlrError::Config(format!(
                    "correction rule `{rule}` is listed twice"
                )));
            }
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[CorrectionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn max_inspected_rank(&self) -> Option<usize> {
        self.rules.iter().map(CorrectionRule::inspected_rank).max()
    }

    /// Run the chain over `ranking`, returning the rule that fired.
    pub fn apply(&self, ranking: &mut Ranking) -> Option<CorrectionRule> {
        let (rule, rank) = self
            .rules
            .iter()
            .find_map(|rule| rule.target(ranking).map(|rank| (*rule, rank)))?;
        ranking.promote(rank);
        Some(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enumerate::Candidate;
    use crate::score::CandidateScore;

    /// Scores are assigned in order, so input order is rank order.
    fn ranking(bands: &[RateBand]) -> Ranking {
        Ranking::new(
            bands
                .iter()
                .enumerate()
                .map(|(i, &band)| CandidateScore {
                    candidate: Candidate::new(i + 1, 101, 103 + 2 * i as u64),
                    rate: 0.0,
                    band,
                    score: i as f64,
                    fallback: false,
                })
                .collect(),
        )
    }

    fn values(ranking: &Ranking) -> Vec<u64> {
        ranking.iter().map(CandidateScore::value).collect()
    }

    fn full_chain() -> CorrectionChain {
        CorrectionChain::parse(&["messy_rank_2", "messy_rank_3", "messy_rank_4"]).unwrap()
    }

    use RateBand::{Clean, Messy, Neutral};

    #[test]
    fn rule_ids_parse_and_print() {
        let rule: CorrectionRule = "messy_rank_3".parse().unwrap();
        assert_eq!(rule, CorrectionRule::MessyAtRank(3));
        assert_eq!(rule.to_string(), "messy_rank_3");

        for bad in ["messy_rank_1", "messy_rank_", "messy_rank_x", "messy_rank_+2", "flip"] {
            assert!(
                matches!(bad.parse::<CorrectionRule>(), Err(PlrError::UnknownRule(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn duplicate_rules_are_rejected() {
        let err = CorrectionChain::parse(&["messy_rank_2", "messy_rank_2"]).unwrap_err();
        assert!(matches!(err, PlrError::Config(_)));
    }

    #[test]
    fn rank_two_signature_promotes_rank_two() {
        let mut r = ranking(&[Clean, Messy, Neutral, Messy]);
        let fired = full_chain().apply(&mut r);
        assert_eq!(fired, Some(CorrectionRule::MessyAtRank(2)));
        assert_eq!(values(&r), vec![105, 103, 107, 109]);
    }

    #[test]
    fn at_most_one_rule_fires() {
        // Ranks 3 and 4 both match; only rank 3 (earlier in the chain) fires.
        let mut r = ranking(&[Clean, Neutral, Messy, Messy]);
        let fired = full_chain().apply(&mut r);
        assert_eq!(fired, Some(CorrectionRule::MessyAtRank(3)));
        assert_eq!(values(&r), vec![107, 103, 105, 109]);
    }

    #[test]
    fn configured_order_is_priority_order() {
        let chain = CorrectionChain::parse(&["messy_rank_4", "messy_rank_3"]).unwrap();
        let mut r = ranking(&[Clean, Neutral, Messy, Messy]);
        assert_eq!(chain.apply(&mut r), Some(CorrectionRule::MessyAtRank(4)));
        assert_eq!(r.winner().map(CandidateScore::value), Some(109));
    }

    #[test]
    fn pass_through_is_idempotent() {
        let mut r = ranking(&[Neutral, Messy, Messy, Clean]);
        let before = r.clone();
        assert_eq!(full_chain().apply(&mut r), None);
        assert_eq!(r, before);
        assert_eq!(full_chain().apply(&mut r), None);
        assert_eq!(r, before);
    }

    #[test]
    fn a_fired_chain_does_not_fire_again() {
        let mut r = ranking(&[Clean, Messy, Clean]);
        assert!(full_chain().apply(&mut r).is_some());
        let settled = r.clone();
        assert_eq!(full_chain().apply(&mut r), None);
        assert_eq!(r, settled);
    }

    #[test]
    fn short_rankings_skip_deep_rules() {
        let chain = CorrectionChain::parse(&["messy_rank_4", "messy_rank_2"]).unwrap();
        let mut r = ranking(&[Clean, Messy]);
        assert_eq!(chain.apply(&mut r), Some(CorrectionRule::MessyAtRank(2)));

        let mut r = ranking(&[Clean, Neutral]);
        assert_eq!(chain.apply(&mut r), None);
    }

    #[test]
    fn empty_chain_is_a_no_op() {
        let mut r = ranking(&[Clean, Messy]);
        assert_eq!(CorrectionChain::default().apply(&mut r), None);
        assert_eq!(values(&r), vec![103, 105]);
    }
}
