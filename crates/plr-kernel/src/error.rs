//! Error types for kernel operations.
//!
//! Per-prime anomalies never surface here: they degrade to fallback rates
//! or no-op rules. Everything in `PlrError` aborts the run.

use plr_corpus::CorpusError;

#[derive(Debug, thiserror::Error)]
pub enum PlrError {
    /// The configuration is unusable; raised before any corpus scan.
    #[error("configuration error: {0}")]
    Config(String),

    /// A correction-chain identifier did not parse.
    #[error("unknown correction rule `{0}` (expected `messy_rank_<k>` with k >= 2)")]
    UnknownRule(String),

    /// Fewer than two candidates means rank-1 vs rank-2 logic is undefined.
    #[error(
        "prime {prime} at index {index} has {count} enumerable candidate(s); at least 2 are required"
    )]
    InsufficientCandidates {
        index: usize,
        prime: u64,
        count: usize,
    },

    /// The requested index has no complete candidate set in the corpus.
    #[error("index {index} is outside the evaluable range {start}..{end}")]
    IndexOutOfRange {
        index: usize,
        start: usize,
        end: usize,
    },

    /// A training or evaluation slice selects no primes.
    #[error("{stage} slice {start}..{end} is empty for a corpus of {len} primes")]
    EmptySlice {
        stage: &'static str,
        start: usize,
        end: usize,
        len: usize,
    },

    /// Tables handed to a pipeline cannot serve its configuration.
    #[error("residue tables do not match configuration: {0}")]
    TableMismatch(String),

    #[error("table digest mismatch: recorded {recorded}, computed {computed}")]
    DigestMismatch { recorded: String, computed: String },

    #[error(transparent)]
    Corpus(#[from] CorpusError),

    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("invalid json at {path}: {source}")]
    ParseJson {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid toml at {path}: {source}")]
    ParseToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("serialization error: {0}")]
    Serialize(String),
}
