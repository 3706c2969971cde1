//! Anchors and their stability signature.
//!
//! An anchor is the sum `S = p_n + q` of a reference prime and its true (or
//! hypothetical) successor. Its signature is the minimal distance `k` at
//! which `S - k` or `S + k` is prime; the anchor is Messy when that distance
//! is composite.

use crate::primality::{PrimalitySource, is_prime_u64};
use serde::{Deserialize, Serialize};

/// Moduli whose residues are reported for every anchor.
pub const ANCHOR_MODULI: [u64; 3] = [6, 30, 210];

/// Search bound for the minimal completing distance.
pub const DEFAULT_SIGNATURE_SEARCH_LIMIT: u64 = 2000;

/// `S = low + high`, computed on demand and never stored as mutable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor {
    pub low: u64,
    pub high: u64,
    pub sum: u64,
}

impl Anchor {
    pub fn new(low: u64, high: u64) -> Self {
        Self {
            low,
            high,
            sum: low.saturating_add(high),
        }
    }

    pub fn gap(&self) -> u64 {
        self.high.saturating_sub(self.low)
    }

    pub fn residue(&self, modulus: u64) -> u64 {
        self.sum % modulus
    }

    /// Residues modulo 6, 30 and 210, as `(modulus, residue)` pairs.
    pub fn residues(&self) -> [(u64, u64); 3] {
        ANCHOR_MODULI.map(|m| (m, self.residue(m)))
    }

    pub fn signature(&self, oracle: &impl PrimalitySource, limit: u64) -> AnchorSignature {
        AnchorSignature::of(self.sum, oracle, limit)
    }
}

/// Clean/Messy classification of an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorClass {
    Clean,
    Messy,
}

impl std::fmt::Display for AnchorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnchorClass::Clean => write!(f, "clean"),
            AnchorClass::Messy => write!(f, "messy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorSignature {
    /// Minimal completing distance; `None` when the search bound was hit.
    pub k_min: Option<u64>,
    pub class: AnchorClass,
}

impl AnchorSignature {
    pub fn of(sum: u64, oracle: &impl PrimalitySource, limit: u64) -> Self {
        let k_min = minimal_completing_distance(sum, oracle, limit);
        let class = match k_min {
            Some(k) if k > 1 && !is_prime_u64(k) => AnchorClass::Messy,
            _ => AnchorClass::Clean,
        };
        Self { k_min, class }
    }

    pub fn is_messy(&self) -> bool {
        self.class == AnchorClass::Messy
    }

    pub fn is_resolved(&self) -> bool {
        self.k_min.is_some()
    }
}

/// Smallest `d` in `1..=limit` with `S - d > 1` prime or `S + d` prime.
pub fn minimal_completing_distance(
    sum: u64,
    oracle: &impl PrimalitySource,
    limit: u64,
) -> Option<u64> {
    (1..=limit).find(|&d| {
        let lower = sum.checked_sub(d).is_some_and(|q| q > 1 && oracle.is_prime(q));
        lower || sum.checked_add(d).is_some_and(|q| oracle.is_prime(q))
    })
}
