//! One configurable pipeline: enumerate → score → chain → gate.
//!
//! `Engine` validates a configuration before anything touches the corpus
//! and trains the residue tables. `Pipeline` pairs a validated engine with
//! frozen tables and predicts one prime at a time.

use crate::chain::{CorrectionChain, CorrectionRule};
use crate::config::{CandidatePool, EngineConfiguration};
use crate::enumerate::{Candidate, enumerate_candidates};
use crate::error::PlrError;
use crate::gate::apply_gate;
use crate::residue::{ResidueClassTable, ResidueTableBuilder, ResidueTables};
use crate::score::{Ranking, Scorer};
use plr_corpus::PrimeSequence;
use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfiguration,
    chain: CorrectionChain,
}

impl Engine {
    /// Fail-fast validation of everything that does not need the corpus.
    pub fn new(config: EngineConfiguration) -> Result<Self, PlrError> {
        config.validate_fields()?;
        let chain = CorrectionChain::parse(config.correction_chain.as_slice())?;
        if let (CandidatePool::Closed(k), Some(deepest)) =
            (config.candidate_pool, chain.max_inspected_rank())
            && deepest > k
        {
            return Err(PlrError::Config(format!(
                "correction chain inspects rank {deepest} but the closed pool holds {k} candidates"
            )));
        }
        tracing::debug!(
            chain = ?chain.rules(),
            flip_gate = config.flip_gate.is_enabled(),
            pool = ?config.candidate_pool,
            "engine configured"
        );
        Ok(Self { config, chain })
    }

    pub fn config(&self) -> &EngineConfiguration {
        &self.config
    }

    pub fn chain(&self) -> &CorrectionChain {
        &self.chain
    }

    pub fn table_builder(&self) -> ResidueTableBuilder {
        ResidueTableBuilder {
            moduli: self.config.moduli.clone(),
            gap_category: self
                .config
                .gap_conditioned
                .then_some(self.config.gap_category),
            missing_class: self.config.missing_class,
            signature_search_limit: self.config.signature_search_limit,
        }
    }

    /// Build the frozen tables from the configured training slice.
    pub fn train(&self, corpus: &PrimeSequence) -> Result<ResidueTables, PlrError> {
        let slice = self.config.training.resolve(corpus.len());
        self.table_builder().build(corpus, slice)
    }

    /// Pair the engine with tables, checking they can serve it.
    pub fn pipeline(self, tables: ResidueTables) -> Result<Pipeline, PlrError> {
        let modulus = self.config.scoring_modulus;
        let Some(table) = tables.table(modulus) else {
            return Err(PlrError::TableMismatch(format!(
                "no table for scoring modulus {modulus} (tables hold {:?})",
                tables.tables.keys().collect::<Vec<_>>()
            )));
        };
        if self.config.gap_conditioned {
            if tables.gap_category != Some(self.config.gap_category) {
                return Err(PlrError::TableMismatch(format!(
                    "scoring is gap-conditioned with {:?} but tables were built with {:?}",
                    self.config.gap_category, tables.gap_category
                )));
            }
            if !table.is_gap_conditioned() {
                return Err(PlrError::TableMismatch(format!(
                    "table for modulus {modulus} has no residue × gap cells"
                )));
            }
        }
        Ok(Pipeline {
            engine: self,
            tables,
        })
    }
}

/// The per-prime trace of one pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub index: usize,
    pub reference: u64,
    /// The true next prime, when the corpus holds it.
    pub successor: Option<u64>,
    /// Scorer ranking, before any override.
    pub scored: Ranking,
    /// Rank 1 of `scored`.
    pub baseline: u64,
    pub applied_rule: Option<CorrectionRule>,
    pub flipped: bool,
    pub ranking: Ranking,
    pub predicted: u64,
    pub fallback_lookups: u64,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    engine: Engine,
    tables: ResidueTables,
}

impl Pipeline {
    pub fn config(&self) -> &EngineConfiguration {
        &self.engine.config
    }

    pub fn chain(&self) -> &CorrectionChain {
        &self.engine.chain
    }

    pub fn tables(&self) -> &ResidueTables {
        &self.tables
    }

    fn scoring_table(&self) -> Result<&ResidueClassTable, PlrError> {
        let modulus = self.engine.config.scoring_modulus;
        self.tables
            .table(modulus)
            .ok_or_else(|| PlrError::TableMismatch(format!("no table for modulus {modulus}")))
    }

    pub fn scorer(&self) -> Result<Scorer<'_>, PlrError> {
        Ok(Scorer::new(self.scoring_table()?, &self.engine.config))
    }

    /// Indices of the evaluation slice whose true successor (and, for a
    /// closed pool, all K candidates) lie inside the corpus.
    pub fn evaluable_range(&self, corpus: &PrimeSequence) -> Result<Range<usize>, PlrError> {
        let requested = self.engine.config.evaluation.resolve(corpus.len());
        let needed = match self.engine.config.candidate_pool {
            CandidatePool::Closed(k) => k,
            CandidatePool::Open(_) => 1,
        };
        let limit = corpus.len().saturating_sub(needed);
        let range = requested.start.min(limit)..requested.end.min(limit);
        if range.is_empty() {
            return Err(PlrError::EmptySlice {
                stage: "evaluation",
                start: requested.start,
                end: requested.end,
                len: corpus.len(),
            });
        }
        if range != requested {
            tracing::info!(
                requested_start = requested.start,
                requested_end = requested.end,
                start = range.start,
                end = range.end,
                "evaluation range clamped to primes with complete candidate sets"
            );
        }
        Ok(range)
    }

    /// Trace one prime. Needs at least two candidates.
    pub fn predict(&self, corpus: &PrimeSequence, index: usize) -> Result<Prediction, PlrError> {
        let config = &self.engine.config;
        let candidates =
            enumerate_candidates(corpus, index, config.candidate_pool, config.open_pool_filter)?;
        self.predict_from_pool(corpus, index, &candidates)
    }

    /// Run scorer, chain and gate over an already enumerated pool. A single
    /// candidate passes through both overrides untouched; an empty pool is
    /// `InsufficientCandidates`.
    pub fn predict_from_pool(
        &self,
        corpus: &PrimeSequence,
        index: usize,
        candidates: &[Candidate],
    ) -> Result<Prediction, PlrError> {
        let config = &self.engine.config;
        let scorer = self.scorer()?;
        let reference = corpus.get(index).ok_or(PlrError::IndexOutOfRange {
            index,
            start: 0,
            end: corpus.len(),
        })?;

        let scored = scorer.rank(candidates);
        let fallback_lookups = scored.iter().filter(|entry| entry.fallback).count() as u64;
        let mut ranking = scored.clone();
        let applied_rule = self.engine.chain.apply(&mut ranking);
        let flipped = config.flip_gate.is_enabled() && apply_gate(&mut ranking);

        let winner_of = |ranking: &Ranking| {
            ranking
                .winner()
                .map(|entry| entry.value())
                .ok_or(PlrError::InsufficientCandidates {
                    index,
                    prime: reference,
                    count: 0,
                })
        };
        let baseline = winner_of(&scored)?;
        let predicted = winner_of(&ranking)?;

        Ok(Prediction {
            index,
            reference,
            successor: corpus.get(index + 1),
            scored,
            baseline,
            applied_rule,
            flipped,
            ranking,
            predicted,
            fallback_lookups,
        })
    }
}
