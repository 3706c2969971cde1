//! Evaluator.
//!
//! Runs the pipeline over every evaluable prime and compares rank 1 with
//! the true next prime. The evaluable range is cut into shards; each shard
//! folds into its own `Tally` and tallies combine by summation, so the
//! result does not depend on shard size, thread count, or merge order.

use crate::config::EngineConfiguration;
use crate::enumerate::candidate_pool;
use crate::error::PlrError;
use crate::pipeline::{Pipeline, Prediction};
use plr_corpus::{Anchor, AnchorClass, PrimeSequence};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;

/// Outcome × ground-truth class of the true anchor `p_n + p_{n+1}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub correct_clean: u64,
    pub correct_messy: u64,
    pub incorrect_clean: u64,
    pub incorrect_messy: u64,
}

impl ConfusionMatrix {
    pub fn record(&mut self, correct: bool, class: AnchorClass) {
        let cell = match (correct, class) {
            (true, AnchorClass::Clean) => &mut self.correct_clean,
            (true, AnchorClass::Messy) => &mut self.correct_messy,
            (false, AnchorClass::Clean) => &mut self.incorrect_clean,
            (false, AnchorClass::Messy) => &mut self.incorrect_messy,
        };
        *cell += 1;
    }

    pub fn merge(&mut self, other: &ConfusionMatrix) {
        self.correct_clean += other.correct_clean;
        self.correct_messy += other.correct_messy;
        self.incorrect_clean += other.incorrect_clean;
        self.incorrect_messy += other.incorrect_messy;
    }

    pub fn total(&self) -> u64 {
        self.correct_clean + self.correct_messy + self.incorrect_clean + self.incorrect_messy
    }
}

/// Mergeable counters for a shard (or the whole run).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    pub total: u64,
    pub correct: u64,
    pub baseline_correct: u64,
    pub uncovered: u64,
    /// Pool sizes summed over covered primes.
    pub candidates: u64,
    pub single_candidate_pools: u64,
    pub flips: u64,
    pub fallback_lookups: u64,
    pub overrides: BTreeMap<String, u64>,
    pub truth_rank: BTreeMap<usize, u64>,
    pub confusion: ConfusionMatrix,
}

impl Tally {
    /// Fold one prediction in. `truth` is the real next prime.
    pub fn record(&mut self, prediction: &Prediction, truth: u64, class: AnchorClass) {
        let Some(rank) = prediction.scored.rank_of(truth) else {
            self.uncovered += 1;
            return;
        };
        let correct = prediction.predicted == truth;
        let pool = prediction.scored.len() as u64;
        self.total += 1;
        self.candidates += pool;
        self.single_candidate_pools += u64::from(pool == 1);
        self.fallback_lookups += prediction.fallback_lookups;
        self.correct += u64::from(correct);
        self.baseline_correct += u64::from(prediction.baseline == truth);
        self.flips += u64::from(prediction.flipped);
        if let Some(rule) = prediction.applied_rule {
            *self.overrides.entry(rule.to_string()).or_default() += 1;
        }
        *self.truth_rank.entry(rank).or_default() += 1;
        self.confusion.record(correct, class);
    }

    /// Sum of counts; associative and commutative.
    pub fn merge(mut self, other: Tally) -> Tally {
        self.total += other.total;
        self.correct += other.correct;
        self.baseline_correct += other.baseline_correct;
        self.uncovered += other.uncovered;
        self.candidates += other.candidates;
        self.single_candidate_pools += other.single_candidate_pools;
        self.flips += other.flips;
        self.fallback_lookups += other.fallback_lookups;
        for (rule, count) in other.overrides {
            *self.overrides.entry(rule).or_default() += count;
        }
        for (rank, count) in other.truth_rank {
            *self.truth_rank.entry(rank).or_default() += count;
        }
        self.confusion.merge(&other.confusion);
        self
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub start: usize,
    pub end: usize,
    pub total: u64,
    pub correct: u64,
    pub accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub baseline_correct: u64,
    pub baseline_accuracy: f64,
    /// Expected accuracy of a uniform pick from each covered pool:
    /// `total / candidates`.
    pub random_accuracy: f64,
    pub overrides: BTreeMap<String, u64>,
    pub flips: u64,
    /// Rank of the true successor in the Scorer ranking → count.
    pub truth_rank: BTreeMap<usize, u64>,
    /// Primes whose true successor was outside the candidate pool.
    pub uncovered: u64,
    pub candidates: u64,
    /// Covered primes whose pool held only the true successor.
    pub single_candidate_pools: u64,
    pub fallback_lookups: u64,
    pub table_digest: String,
    pub configuration: EngineConfiguration,
}

impl EvaluationResult {
    fn from_tally(tally: Tally, range: Range<usize>, pipeline: &Pipeline) -> Self {
        Self {
            start: range.start,
            end: range.end,
            total: tally.total,
            correct: tally.correct,
            accuracy: ratio(tally.correct, tally.total),
            confusion_matrix: tally.confusion,
            baseline_correct: tally.baseline_correct,
            baseline_accuracy: ratio(tally.baseline_correct, tally.total),
            random_accuracy: ratio(tally.total, tally.candidates),
            overrides: tally.overrides,
            flips: tally.flips,
            truth_rank: tally.truth_rank,
            uncovered: tally.uncovered,
            candidates: tally.candidates,
            single_candidate_pools: tally.single_candidate_pools,
            fallback_lookups: tally.fallback_lookups,
            table_digest: pipeline.tables().digest.clone(),
            configuration: pipeline.config().clone(),
        }
    }
}

pub struct Evaluator<'a> {
    pipeline: &'a Pipeline,
    corpus: &'a PrimeSequence,
}

impl<'a> Evaluator<'a> {
    pub fn new(pipeline: &'a Pipeline, corpus: &'a PrimeSequence) -> Self {
        Self { pipeline, corpus }
    }

    /// Evaluate shards in parallel on the rayon pool.
    pub fn run(&self) -> Result<EvaluationResult, PlrError> {
        self.run_with(|shards| {
            shards
                .into_par_iter()
                .map(|shard| self.evaluate_shard(shard))
                .collect()
        })
    }

    /// Same shards, one thread.
    pub fn run_sequential(&self) -> Result<EvaluationResult, PlrError> {
        self.run_with(|shards| {
            shards
                .into_iter()
                .map(|shard| self.evaluate_shard(shard))
                .collect()
        })
    }

    fn run_with(
        &self,
        evaluate: impl FnOnce(Vec<Range<usize>>) -> Vec<Result<Tally, PlrError>>,
    ) -> Result<EvaluationResult, PlrError> {
        let range = self.pipeline.evaluable_range(self.corpus)?;
        let shards = shard_ranges(range.clone(), self.pipeline.config().shard_size);
        tracing::info!(
            start = range.start,
            end = range.end,
            shards = shards.len(),
            digest = %self.pipeline.tables().digest,
            "evaluating"
        );

        // Shard results come back in shard order, so the reported error is
        // the first by index regardless of scheduling.
        let tally = evaluate(shards)
            .into_iter()
            .try_fold(Tally::default(), |acc, shard| shard.map(|t| acc.merge(t)))?;

        let result = EvaluationResult::from_tally(tally, range, self.pipeline);
        tracing::info!(
            total = result.total,
            correct = result.correct,
            accuracy = result.accuracy,
            baseline_accuracy = result.baseline_accuracy,
            random_accuracy = result.random_accuracy,
            flips = result.flips,
            uncovered = result.uncovered,
            "evaluation finished"
        );
        Ok(result)
    }

    /// A prime whose true successor is missing from its pool is counted as
    /// uncovered and skipped; short pools never abort the run.
    fn evaluate_shard(&self, shard: Range<usize>) -> Result<Tally, PlrError> {
        let config = self.pipeline.config();
        let mut tally = Tally::default();
        for index in shard.clone() {
            let truth = self.corpus.get(index + 1).ok_or(PlrError::IndexOutOfRange {
                index,
                start: 0,
                end: self.corpus.len().saturating_sub(1),
            })?;
            let pool = candidate_pool(
                self.corpus,
                index,
                config.candidate_pool,
                config.open_pool_filter,
            )?;
            if !pool.iter().any(|candidate| candidate.value == truth) {
                tracing::trace!(index, truth, pool = pool.len(), "successor outside pool");
                tally.uncovered += 1;
                continue;
            }
            let prediction = self.pipeline.predict_from_pool(self.corpus, index, &pool)?;
            let class = Anchor::new(prediction.reference, truth)
                .signature(self.corpus, config.signature_search_limit)
                .class;
            tally.record(&prediction, truth, class);
        }
        tracing::debug!(
            start = shard.start,
            end = shard.end,
            total = tally.total,
            correct = tally.correct,
            uncovered = tally.uncovered,
            "shard evaluated"
        );
        Ok(tally)
    }
}

/// Consecutive `size`-wide slices of `range`; the last may be shorter.
pub fn shard_ranges(range: Range<usize>, size: usize) -> Vec<Range<usize>> {
    let size = size.max(1);
    range
        .clone()
        .step_by(size)
        .map(|start| start..(start + size).min(range.end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CandidatePool, OpenPoolFilter, Preset};
    use crate::pipeline::Engine;

    fn primes_below(limit: u64) -> PrimeSequence {
        let primes = (2..limit).filter(|&n| plr_corpus::is_prime_u64(n)).collect();
        PrimeSequence::new(primes).expect("ordered")
    }

    fn pipeline_for(config: EngineConfiguration, corpus: &PrimeSequence) -> Pipeline {
        let engine = Engine::new(config).expect("valid configuration");
        let tables = engine.train(corpus).expect("tables");
        engine.pipeline(tables).expect("pipeline")
    }

    #[test]
    fn shard_ranges_cover_exactly() {
        assert_eq!(shard_ranges(3..10, 3), vec![3..6, 6..9, 9..10]);
        assert_eq!(shard_ranges(0..4, 10), vec![0..4]);
        assert!(shard_ranges(5..5, 2).is_empty());
    }

    #[test]
    fn confusion_cells_sum_to_total() {
        let corpus = primes_below(8_000);
        let pipeline = pipeline_for(EngineConfiguration::default(), &corpus);
        let result = Evaluator::new(&pipeline, &corpus).run().unwrap();
        assert_eq!(result.confusion_matrix.total(), result.total);
        assert_eq!(
            result.confusion_matrix.correct_clean + result.confusion_matrix.correct_messy,
            result.correct
        );
        assert_eq!(result.truth_rank.values().sum::<u64>(), result.total);
        assert_eq!(result.uncovered, 0);
        assert_eq!(result.total as usize, result.end - result.start);
        assert_eq!(result.candidates, 10 * result.total);
        assert_eq!(result.random_accuracy, 0.1);
        assert!((0.0..=1.0).contains(&result.accuracy));
        assert_eq!(result.table_digest, pipeline.tables().digest);
    }

    #[test]
    fn totals_are_invariant_to_shard_size() {
        let corpus = primes_below(6_000);
        let reference = {
            let mut config = EngineConfiguration::default();
            config.shard_size = 1_000_000;
            let pipeline = pipeline_for(config, &corpus);
            Evaluator::new(&pipeline, &corpus).run_sequential().unwrap()
        };
        for shard_size in [1, 7, 64, 333] {
            let mut config = EngineConfiguration::default();
            config.shard_size = shard_size;
            let pipeline = pipeline_for(config, &corpus);
            let mut result = Evaluator::new(&pipeline, &corpus).run().unwrap();
            result.configuration.shard_size = reference.configuration.shard_size;
            assert_eq!(result, reference, "shard_size {shard_size}");
        }
    }

    #[test]
    fn merge_is_order_independent() {
        let corpus = primes_below(4_000);
        let pipeline = pipeline_for(EngineConfiguration::default(), &corpus);
        let evaluator = Evaluator::new(&pipeline, &corpus);
        let range = pipeline.evaluable_range(&corpus).unwrap();
        let tallies: Vec<Tally> = shard_ranges(range, 50)
            .into_iter()
            .map(|shard| evaluator.evaluate_shard(shard).unwrap())
            .collect();

        let forward = tallies
            .iter()
            .cloned()
            .fold(Tally::default(), Tally::merge);
        let backward = tallies
            .iter()
            .rev()
            .cloned()
            .fold(Tally::default(), Tally::merge);
        let (left, right) = tallies.split_at(tallies.len() / 2);
        let grouped = left
            .iter()
            .cloned()
            .fold(Tally::default(), Tally::merge)
            .merge(right.iter().cloned().fold(Tally::default(), Tally::merge));
        assert_eq!(forward, backward);
        assert_eq!(forward, grouped);
    }

    #[test]
    fn baseline_preset_matches_its_own_baseline() {
        let corpus = primes_below(5_000);
        let pipeline = pipeline_for(EngineConfiguration::preset(Preset::Baseline), &corpus);
        let result = Evaluator::new(&pipeline, &corpus).run().unwrap();
        assert_eq!(result.correct, result.baseline_correct);
        assert_eq!(result.flips, 0);
        assert!(result.overrides.is_empty());
    }

    #[test]
    fn open_pool_counts_uncovered_primes() {
        let corpus = primes_below(5_000);
        let mut config = EngineConfiguration::preset(Preset::Flip);
        config.candidate_pool = CandidatePool::Open(8);
        config.open_pool_filter = OpenPoolFilter::Integers;
        let pipeline = pipeline_for(config, &corpus);
        let result = Evaluator::new(&pipeline, &corpus).run().unwrap();

        let range = result.start..result.end;
        let expected_uncovered = range
            .clone()
            .filter(|&i| corpus.as_slice()[i + 1] - corpus.as_slice()[i] > 8)
            .count() as u64;
        assert!(expected_uncovered > 0);
        assert_eq!(result.uncovered, expected_uncovered);
        assert_eq!(result.total + result.uncovered, range.len() as u64);
        assert_eq!(result.candidates, 8 * result.total);
        assert_eq!(result.random_accuracy, 0.125);
        assert_eq!(result.single_candidate_pools, 0);
    }

    #[test]
    fn short_prime_windows_are_counted_not_fatal() {
        let corpus = primes_below(5_000);
        let primes = corpus.as_slice();
        let window = 8;
        let mut config = EngineConfiguration::preset(Preset::Flip);
        config.candidate_pool = CandidatePool::Open(window);
        let pipeline = pipeline_for(config, &corpus);
        let result = Evaluator::new(&pipeline, &corpus).run_sequential().unwrap();

        let range = result.start..result.end;
        let pool_size = |i: usize| {
            primes[i + 1..]
                .iter()
                .take_while(|&&q| q <= primes[i] + window as u64)
                .count() as u64
        };
        let covered: Vec<usize> = range
            .clone()
            .filter(|&i| primes[i + 1] - primes[i] <= window as u64)
            .collect();
        let singles = covered.iter().filter(|&&i| pool_size(i) == 1).count() as u64;

        // 113 -> 127 leaves an empty window; 31 -> 37 a window holding only 37.
        assert!(result.uncovered > 0);
        assert!(singles > 0);
        assert_eq!(result.total, covered.len() as u64);
        assert_eq!(result.total + result.uncovered, range.len() as u64);
        assert_eq!(result.single_candidate_pools, singles);
        assert_eq!(
            result.candidates,
            covered.iter().map(|&i| pool_size(i)).sum::<u64>()
        );
        assert_eq!(
            result.random_accuracy,
            result.total as f64 / result.candidates as f64
        );
        assert!(result.correct >= singles);

        let index = primes.iter().position(|&p| p == 31).unwrap();
        assert!(matches!(
            pipeline.predict(&corpus, index),
            Err(PlrError::InsufficientCandidates { count: 1, .. })
        ));
    }
}
