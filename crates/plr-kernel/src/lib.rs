//! # PLR Kernel
//!
//! Deterministic next-prime candidate ranking. Given a prime `p_n` of an
//! ordered corpus, rank the nearby candidates by how "clean" the anchor
//! `S = p_n + q` looks in trained residue statistics, apply rank-targeted
//! corrections and a final flip rule, and measure how often rank 1 is the
//! true next prime.
//!
//! The named engine versions of the experiments this grew out of are one
//! pipeline under different configurations (see [`Preset`]).
//!
//! ## Architecture
//!
//! ```text
//! ResidueTableBuilder   ← training pass; a barrier, then read-only
//!     │  ResidueTables (digest-stamped)
//! enumerate_candidates  ← closed pool (next K primes) or open pool (next N)
//!     │
//! Scorer                ← (rate + offset) × weight(gap), ascending
//!     │  Ranking
//! CorrectionChain       ← first matching messy_rank_<k> promotes rank k
//!     │
//! apply_gate            ← flip to the lowest-gap Messy candidate if closer
//!     │  Prediction
//! Evaluator             ← rayon shards → Tally::merge → EvaluationResult
//! ```

pub mod chain;
pub mod config;
pub mod digest;
pub mod enumerate;
pub mod error;
pub mod evaluate;
pub mod gap;
pub mod gate;
pub mod pipeline;
pub mod residue;
pub mod score;

pub use chain::{CorrectionChain, CorrectionRule};
pub use config::{
    CandidatePool, CorpusSlice, DEFAULT_CONFIG_PATH, EngineConfiguration, GapWeight, MAX_MODULUS,
    MissingClassPolicy, OpenPoolFilter, Preset, Toggle,
};
pub use digest::content_digest;
pub use enumerate::{Candidate, candidate_pool, enumerate_candidates};
pub use error::PlrError;
pub use evaluate::{ConfusionMatrix, EvaluationResult, Evaluator, Tally};
pub use gap::{GapBands, GapBucketing, GapCategory};
pub use gate::{apply_gate, flip, messy_low};
pub use pipeline::{Engine, Pipeline, Prediction};
pub use residue::{
    ClassStats, RateLookup, ResidueClassTable, ResidueTableBuilder, ResidueTables, Substitution,
    TrainingSummary,
};
pub use score::{CandidateScore, RateBand, Ranking, Scorer};
