//! Residue Statistics Builder.
//!
//! Scans consecutive-prime pairs of a training slice, classifies each
//! anchor with its stability signature, and partitions anchors by
//! `S mod m` (optionally also by gap category). The failure rate of a class
//! is its Messy count over its anchor count.
//!
//! The build is a barrier: `ResidueTables` is only handed out complete and
//! is read-only afterwards. Classes with no observations receive the
//! configured fallback rate; each substitution is recorded on the table and
//! logged, never absorbed silently.

use crate::config::{MissingClassPolicy, check_moduli};
use crate::digest::content_digest;
use crate::error::PlrError;
use crate::gap::{GapBucketing, GapCategory};
use plr_corpus::{Anchor, PrimeSequence};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::ops::Range;
use std::path::Path;

/// Counts and derived rate for one residue (or residue × gap) class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub anchors: u64,
    pub failures: u64,
    pub rate: f64,
    /// True when `rate` is the fallback, not an observation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub substituted: bool,
}

/// A data-quality event: a class with no training observations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Substitution {
    pub residue: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_category: Option<GapCategory>,
    pub rate: f64,
}

/// Result of a rate lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLookup {
    pub rate: f64,
    /// The class was unobserved or absent and the fallback rate was used.
    pub fallback: bool,
}

/// Failure rates for one modulus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueClassTable {
    pub modulus: u64,
    pub fallback_rate: f64,
    /// Every residue `0..modulus` has an entry.
    pub classes: BTreeMap<u64, ClassStats>,
    /// Residue × gap-category cells; empty unless built gap-conditioned.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub gap_classes: BTreeMap<u64, BTreeMap<GapCategory, ClassStats>>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

impl ResidueClassTable {
    pub fn rate(&self, residue: u64) -> RateLookup {
        match self.classes.get(&(residue % self.modulus)) {
            Some(stats) => RateLookup {
                rate: stats.rate,
                fallback: stats.substituted,
            },
            None => self.fallback(),
        }
    }

    pub fn gap_rate(&self, residue: u64, category: GapCategory) -> RateLookup {
        self.gap_classes
            .get(&(residue % self.modulus))
            .and_then(|cells| cells.get(&category))
            .map(|stats| RateLookup {
                rate: stats.rate,
                fallback: stats.substituted,
            })
            .unwrap_or_else(|| self.fallback())
    }

    pub fn is_gap_conditioned(&self) -> bool {
        !self.gap_classes.is_empty()
    }

    fn fallback(&self) -> RateLookup {
        RateLookup {
            rate: self.fallback_rate,
            fallback: true,
        }
    }
}

/// Aggregate facts about the training pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub start: usize,
    pub end: usize,
    pub pairs: u64,
    pub messy: u64,
    /// Anchors whose completing-distance search hit the bound.
    pub unresolved: u64,
    pub global_rate: f64,
}

/// The frozen output of a training pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueTables {
    pub digest: String,
    pub training: TrainingSummary,
    /// Present when gap-conditioned cells were built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap_category: Option<GapBucketing>,
    pub tables: BTreeMap<u64, ResidueClassTable>,
}

#[derive(Serialize)]
struct DigestMaterial<'a> {
    training: &'a TrainingSummary,
    gap_category: &'a Option<GapBucketing>,
    tables: &'a BTreeMap<u64, ResidueClassTable>,
}

impl ResidueTables {
    pub fn table(&self, modulus: u64) -> Option<&ResidueClassTable> {
        self.tables.get(&modulus)
    }

    pub fn compute_digest(&self) -> Result<String, PlrError> {
        content_digest(&DigestMaterial {
            training: &self.training,
            gap_category: &self.gap_category,
            tables: &self.tables,
        })
    }

    pub fn verify_digest(&self) -> Result<(), PlrError> {
        let computed = self.compute_digest()?;
        if computed != self.digest {
            return Err(PlrError::DigestMismatch {
                recorded: self.digest.clone(),
                computed,
            });
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, PlrError> {
        serde_json::to_string_pretty(self).map_err(|e| PlrError::Serialize(e.to_string()))
    }

    /// Load tables written by `write_to_path`, rejecting edited content.
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, PlrError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| PlrError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let tables: Self = serde_json::from_str(&text).map_err(|source| PlrError::ParseJson {
            path: path.display().to_string(),
            source,
        })?;
        tables.verify_digest()?;
        Ok(tables)
    }

    /// Atomic write: temp file, fsync, rename.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<(), PlrError> {
        let path = path.as_ref();
        let io_err = |p: &Path, e: std::io::Error| PlrError::Io {
            path: p.display().to_string(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let json = self.to_json_pretty()?;
        let tmp_path = path.with_extension(format!("tmp.{}", std::process::id()));
        let write_result = (|| -> Result<(), PlrError> {
            let file = File::create(&tmp_path).map_err(|e| io_err(&tmp_path, e))?;
            let mut writer = BufWriter::new(file);
            writeln!(writer, "{json}").map_err(|e| io_err(&tmp_path, e))?;
            writer.flush().map_err(|e| io_err(&tmp_path, e))?;
            let file = writer
                .into_inner()
                .map_err(|e| io_err(&tmp_path, e.into_error()))?;
            file.sync_all().map_err(|e| io_err(&tmp_path, e))
        })();

        if let Err(error) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(error);
        }
        fs::rename(&tmp_path, path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_err(path, e)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ClassCount {
    anchors: u64,
    failures: u64,
}

impl ClassCount {
    fn add(&mut self, messy: bool) {
        self.anchors += 1;
        self.failures += u64::from(messy);
    }

    fn merge(&mut self, other: ClassCount) {
        self.anchors += other.anchors;
        self.failures += other.failures;
    }

    fn rate(&self) -> f64 {
        self.failures as f64 / self.anchors as f64
    }
}

/// Mergeable partial counts; one per rayon split.
#[derive(Debug, Clone, Default)]
struct TableCounts {
    pairs: u64,
    messy: u64,
    unresolved: u64,
    residue: BTreeMap<(u64, u64), ClassCount>,
    residue_gap: BTreeMap<(u64, u64, GapCategory), ClassCount>,
}

impl TableCounts {
    fn merge(mut self, other: TableCounts) -> TableCounts {
        self.pairs += other.pairs;
        self.messy += other.messy;
        self.unresolved += other.unresolved;
        for (key, count) in other.residue {
            self.residue.entry(key).or_default().merge(count);
        }
        for (key, count) in other.residue_gap {
            self.residue_gap.entry(key).or_default().merge(count);
        }
        self
    }
}

/// Builds `ResidueTables` from a training slice.
#[derive(Debug, Clone)]
pub struct ResidueTableBuilder {
    pub moduli: Vec<u64>,
    /// Build residue × gap cells with this bucketing.
    pub gap_category: Option<GapBucketing>,
    pub missing_class: MissingClassPolicy,
    pub signature_search_limit: u64,
}

impl ResidueTableBuilder {
    /// Scan pairs `(p_i, p_{i+1})` for `i` in `slice`.
    pub fn build(
        &self,
        corpus: &PrimeSequence,
        slice: Range<usize>,
    ) -> Result<ResidueTables, PlrError> {
        check_moduli(&self.moduli)?;
        let end = slice.end.min(corpus.len().saturating_sub(1));
        let start = slice.start.min(end);
        if start >= end {
            return Err(PlrError::EmptySlice {
                stage: "training",
                start: slice.start,
                end: slice.end,
                len: corpus.len(),
            });
        }
        tracing::info!(
            start,
            end,
            moduli = ?self.moduli,
            gap_conditioned = self.gap_category.is_some(),
            "building residue tables"
        );

        let primes = corpus.as_slice();
        let counts = (start..end)
            .into_par_iter()
            .fold(TableCounts::default, |mut counts, i| {
                let anchor = Anchor::new(primes[i], primes[i + 1]);
                let signature = anchor.signature(corpus, self.signature_search_limit);
                let messy = signature.is_messy();
                counts.pairs += 1;
                counts.messy += u64::from(messy);
                counts.unresolved += u64::from(!signature.is_resolved());
                for &m in &self.moduli {
                    let residue = anchor.residue(m);
                    counts.residue.entry((m, residue)).or_default().add(messy);
                    if let Some(bucketing) = &self.gap_category {
                        let category = bucketing.categorize(anchor.gap());
                        counts
                            .residue_gap
                            .entry((m, residue, category))
                            .or_default()
                            .add(messy);
                    }
                }
                counts
            })
            .reduce(TableCounts::default, TableCounts::merge);

        self.finish(counts, start, end)
    }

    fn finish(&self, counts: TableCounts, start: usize, end: usize) -> Result<ResidueTables, PlrError> {
        let global_rate = counts.messy as f64 / counts.pairs as f64;
        if counts.unresolved > 0 {
            tracing::warn!(
                unresolved = counts.unresolved,
                limit = self.signature_search_limit,
                "anchor signature search hit its bound; those anchors count as clean"
            );
        }

        let mut tables = BTreeMap::new();
        for &modulus in &self.moduli {
            let table = self.finish_table(modulus, &counts, global_rate);
            tables.insert(modulus, table);
        }

        let mut built = ResidueTables {
            digest: String::new(),
            training: TrainingSummary {
                start,
                end,
                pairs: counts.pairs,
                messy: counts.messy,
                unresolved: counts.unresolved,
                global_rate,
            },
            gap_category: self.gap_category,
            tables,
        };
        built.digest = built.compute_digest()?;
        tracing::info!(
            pairs = counts.pairs,
            messy = counts.messy,
            global_rate,
            digest = %built.digest,
            "residue tables frozen"
        );
        Ok(built)
    }

    fn finish_table(&self, modulus: u64, counts: &TableCounts, global_rate: f64) -> ResidueClassTable {
        let observed: BTreeMap<u64, ClassCount> = counts
            .residue
            .range((modulus, 0)..(modulus, modulus))
            .map(|(&(_, residue), &count)| (residue, count))
            .collect();

        let fallback_rate = match self.missing_class {
            MissingClassPolicy::GlobalMean => global_rate,
            MissingClassPolicy::MaxObserved => observed
                .values()
                .map(ClassCount::rate)
                .fold(0.0, f64::max),
            MissingClassPolicy::Fixed(rate) => rate,
        };

        let mut substitutions = Vec::new();
        let mut classes = BTreeMap::new();
        for residue in 0..modulus {
            let stats = match observed.get(&residue) {
                Some(count) => observed_stats(*count),
                None => {
                    substitutions.push(Substitution {
                        residue,
                        gap_category: None,
                        rate: fallback_rate,
                    });
                    substituted_stats(fallback_rate)
                }
            };
            classes.insert(residue, stats);
        }

        let mut gap_classes: BTreeMap<u64, BTreeMap<GapCategory, ClassStats>> = BTreeMap::new();
        if let Some(bucketing) = &self.gap_category {
            for (&(_, residue, category), &count) in counts
                .residue_gap
                .range((modulus, 0, GapCategory::Small)..(modulus + 1, 0, GapCategory::Small))
            {
                gap_classes
                    .entry(residue)
                    .or_default()
                    .insert(category, observed_stats(count));
            }
            // Closed category sets get every cell; exact gaps stay sparse
            // and miss to the fallback at lookup time.
            if let Some(categories) = bucketing.fixed_categories() {
                for residue in 0..modulus {
                    let cells = gap_classes.entry(residue).or_default();
                    for category in categories {
                        cells.entry(category).or_insert_with(|| {
                            substitutions.push(Substitution {
                                residue,
                                gap_category: Some(category),
                                rate: fallback_rate,
                            });
                            substituted_stats(fallback_rate)
                        });
                    }
                }
            }
        }

        if !substitutions.is_empty() {
            tracing::warn!(
                modulus,
                substituted = substitutions.len(),
                fallback_rate,
                policy = ?self.missing_class,
                "residue classes without training observations received the fallback rate"
            );
            for substitution in &substitutions {
                tracing::debug!(
                    modulus,
                    residue = substitution.residue,
                    gap_category = ?substitution.gap_category,
                    rate = substitution.rate,
                    "fallback rate substituted"
                );
            }
        }

        ResidueClassTable {
            modulus,
            fallback_rate,
            classes,
            gap_classes,
            substitutions,
        }
    }
}

fn observed_stats(count: ClassCount) -> ClassStats {
    ClassStats {
        anchors: count.anchors,
        failures: count.failures,
        rate: count.rate(),
        substituted: false,
    }
}

fn substituted_stats(rate: f64) -> ClassStats {
    ClassStats {
        anchors: 0,
        failures: 0,
        rate,
        substituted: true,
    }
}
