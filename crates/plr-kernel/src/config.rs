//! Engine configuration.
//!
//! The named engine versions of the source experiments (baseline,
//! chained signature, internal flip) are presets over one configuration,
//! not separate code paths. Every field has a default, so an empty TOML
//! document is a valid configuration.

use crate::error::PlrError;
use crate::gap::GapBucketing;
use plr_corpus::DEFAULT_SIGNATURE_SEARCH_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "plr.toml";
pub const DEFAULT_SHARD_SIZE: usize = 65_536;
pub const DEFAULT_CLOSED_POOL: usize = 10;
/// Largest accepted modulus (the primorial 2·3·5·7·11). Residue tables are
/// dense over `0..m`.
pub const MAX_MODULUS: u64 = 2310;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfiguration {
    /// Moduli to build residue tables for.
    pub moduli: Vec<u64>,
    /// The table that drives scoring and Clean/Messy banding.
    pub scoring_modulus: u64,
    /// Score against the residue × gap table instead of the residue table.
    pub gap_conditioned: bool,
    pub offset: f64,
    pub gap_weight: GapWeight,
    /// A candidate whose rate is strictly below this is Clean.
    pub clean_threshold: f64,
    /// A candidate whose rate is strictly above this is Messy.
    pub messy_threshold: f64,
    pub open_pool_filter: OpenPoolFilter,
    /// Rule identifiers in priority order.
    pub correction_chain: Vec<String>,
    pub flip_gate: Toggle,
    pub signature_search_limit: u64,
    pub shard_size: usize,
    pub missing_class: MissingClassPolicy,
    pub gap_category: GapBucketing,
    pub candidate_pool: CandidatePool,
    pub training: CorpusSlice,
    pub evaluation: CorpusSlice,
}

impl Default for EngineConfiguration {
    fn default() -> Self {
        Self {
            moduli: vec![6, 30, 210],
            scoring_modulus: 6,
            gap_conditioned: false,
            offset: 1.0,
            gap_weight: GapWeight::Linear,
            clean_threshold: 0.03,
            messy_threshold: 0.20,
            open_pool_filter: OpenPoolFilter::Primes,
            correction_chain: default_chain(),
            flip_gate: Toggle::Enabled,
            signature_search_limit: DEFAULT_SIGNATURE_SEARCH_LIMIT,
            shard_size: DEFAULT_SHARD_SIZE,
            missing_class: MissingClassPolicy::GlobalMean,
            gap_category: GapBucketing::default(),
            candidate_pool: CandidatePool::Closed(DEFAULT_CLOSED_POOL),
            training: CorpusSlice::default(),
            evaluation: CorpusSlice::default(),
        }
    }
}

fn default_chain() -> Vec<String> {
    ["messy_rank_2", "messy_rank_3", "messy_rank_4"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl EngineConfiguration {
    pub fn preset(preset: Preset) -> Self {
        let mut config = Self::default();
        config.apply_preset(preset);
        config
    }

    /// Overwrite the chain and gate selection with a preset's.
    pub fn apply_preset(&mut self, preset: Preset) {
        let (chain, gate) = match preset {
            Preset::Baseline => (Vec::new(), Toggle::Disabled),
            Preset::Chained => (default_chain(), Toggle::Disabled),
            Preset::Flip => (Vec::new(), Toggle::Enabled),
            Preset::Full => (default_chain(), Toggle::Enabled),
        };
        self.correction_chain = chain;
        self.flip_gate = gate;
    }

    pub fn from_toml_str(text: &str) -> Result<Self, PlrError> {
        toml::from_str(text).map_err(|source| PlrError::ParseToml {
            path: "<inline>".to_string(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlrError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PlrError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&text).map_err(|source| PlrError::ParseToml {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn to_toml_string(&self) -> Result<String, PlrError> {
        toml::to_string_pretty(self).map_err(|e| PlrError::Serialize(e.to_string()))
    }

    /// Structural checks that do not need the rule list parsed.
    pub(crate) fn validate_fields(&self) -> Result<(), PlrError> {
        let fail = |msg: String| Err(PlrError::Config(msg));

        if self.moduli.is_empty() {
            return fail("moduli must not be empty".into());
        }
        check_moduli(&self.moduli)?;
        if !self.moduli.contains(&self.scoring_modulus) {
            return fail(format!(
                "scoring_modulus {} is not one of moduli {:?}",
                self.scoring_modulus, self.moduli
            ));
        }
        if !self.offset.is_finite() || self.offset < 0.0 {
            return fail(format!(
                "offset must be finite and non-negative, got {}",
                self.offset
            ));
        }
        for (name, value) in [
            ("clean_threshold", self.clean_threshold),
            ("messy_threshold", self.messy_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return fail(format!("{name} must lie in [0, 1], got {value}"));
            }
        }
        if self.clean_threshold > self.messy_threshold {
            return fail(format!(
                "clean_threshold {} exceeds messy_threshold {}",
                self.clean_threshold, self.messy_threshold
            ));
        }
        if let MissingClassPolicy::Fixed(rate) = self.missing_class
            && !(0.0..=1.0).contains(&rate)
        {
            return fail(format!("fixed fallback rate must lie in [0, 1], got {rate}"));
        }
        match self.candidate_pool {
            CandidatePool::Closed(k) if k < 2 => {
                return fail(format!("closed candidate pool needs K >= 2, got {k}"));
            }
            CandidatePool::Open(n) if n < 2 => {
                return fail(format!("open candidate pool needs N >= 2, got {n}"));
            }
            _ => {}
        }
        if self.signature_search_limit == 0 {
            return fail("signature_search_limit must be at least 1".into());
        }
        if self.shard_size == 0 {
            return fail("shard_size must be at least 1".into());
        }
        self.gap_category.validate().map_err(PlrError::Config)
    }
}

pub(crate) fn check_moduli(moduli: &[u64]) -> Result<(), PlrError> {
    match moduli.iter().find(|&&m| m == 0 || m > MAX_MODULUS) {
        Some(m) => Err(PlrError::Config(format!(
            "modulus must lie in 1..={MAX_MODULUS}, got {m}"
        ))),
        None => Ok(()),
    }
}

/// Named rule/gate selections matching the source engine versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// Scorer ranking only.
    Baseline,
    /// Scorer plus the rank 2–4 signature chain.
    Chained,
    /// Scorer plus the flip gate.
    Flip,
    /// Chain and gate.
    Full,
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preset::Baseline => write!(f, "baseline"),
            Preset::Chained => write!(f, "chained"),
            Preset::Flip => write!(f, "flip"),
            Preset::Full => write!(f, "full"),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "baseline" => Ok(Preset::Baseline),
            "chained" => Ok(Preset::Chained),
            "flip" => Ok(Preset::Flip),
            "full" => Ok(Preset::Full),
            other => Err(format!(
                "unknown preset `{other}` (expected baseline, chained, flip, full)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidatePool {
    /// The next K primes.
    Closed(usize),
    /// The next N integers (optionally filtered to primes).
    Open(usize),
}

impl CandidatePool {
    pub fn size(&self) -> usize {
        match *self {
            CandidatePool::Closed(k) => k,
            CandidatePool::Open(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenPoolFilter {
    #[default]
    Primes,
    Integers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Toggle {
    #[default]
    Enabled,
    Disabled,
}

impl Toggle {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Toggle::Enabled)
    }
}

/// Monotone transform of the gap used as the score multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapWeight {
    #[default]
    Linear,
    Sqrt,
    Log1p,
}

impl GapWeight {
    pub fn apply(&self, gap: u64) -> f64 {
        let gap = gap as f64;
        match self {
            GapWeight::Linear => gap,
            GapWeight::Sqrt => gap.sqrt(),
            GapWeight::Log1p => gap.ln_1p(),
        }
    }
}

/// Rate assigned to residue classes with zero training observations.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingClassPolicy {
    /// Failures over anchors across the whole training slice.
    #[default]
    GlobalMean,
    /// The worst rate among observed classes of the same table.
    MaxObserved,
    Fixed(f64),
}

/// `[start, start + count)` of the corpus; `count` absent means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusSlice {
    pub start: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl CorpusSlice {
    /// Clamp to a corpus of `len` positions.
    pub fn resolve(&self, len: usize) -> Range<usize> {
        let start = self.start.min(len);
        let end = match self.count {
            Some(count) => start.saturating_add(count).min(len),
            None => len,
        };
        start..end
    }
}
