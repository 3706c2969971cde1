//! Gap categories: the secondary key of residue × gap tables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of the distance between a reference prime and a candidate.
///
/// Serialized as a plain string (`small`, `medium`, `large`, `exact:<gap>`)
/// so it can key JSON objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum GapCategory {
    Small,
    Medium,
    Large,
    Exact(u64),
}

impl fmt::Display for GapCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GapCategory::Small => write!(f, "small"),
            GapCategory::Medium => write!(f, "medium"),
            GapCategory::Large => write!(f, "large"),
            GapCategory::Exact(gap) => write!(f, "exact:{gap}"),
        }
    }
}

impl FromStr for GapCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(GapCategory::Small),
            "medium" => Ok(GapCategory::Medium),
            "large" => Ok(GapCategory::Large),
            other => other
                .strip_prefix("exact:")
                .and_then(|gap| gap.parse().ok())
                .map(GapCategory::Exact)
                .ok_or_else(|| format!("unknown gap category `{other}`")),
        }
    }
}

impl From<GapCategory> for String {
    fn from(category: GapCategory) -> Self {
        category.to_string()
    }
}

impl TryFrom<String> for GapCategory {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// How raw gaps map onto categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapBucketing {
    /// One category per gap value.
    Exact,
    Banded(GapBands),
}

/// `gap < small_below` is Small, `gap >= large_from` is Large, Medium between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GapBands {
    pub small_below: u64,
    pub large_from: u64,
}

impl Default for GapBands {
    fn default() -> Self {
        Self {
            small_below: 18,
            large_from: 22,
        }
    }
}

impl Default for GapBucketing {
    fn default() -> Self {
        GapBucketing::Banded(GapBands::default())
    }
}

impl GapBucketing {
    pub fn categorize(&self, gap: u64) -> GapCategory {
        match *self {
            GapBucketing::Exact => GapCategory::Exact(gap),
            GapBucketing::Banded(GapBands {
                small_below,
                large_from,
            }) => {
                if gap < small_below {
                    GapCategory::Small
                } else if gap >= large_from {
                    GapCategory::Large
                } else {
                    GapCategory::Medium
                }
            }
        }
    }

    /// The closed set of categories, when there is one.
    pub fn fixed_categories(&self) -> Option<[GapCategory; 3]> {
        match self {
            GapBucketing::Exact => None,
            GapBucketing::Banded(_) => Some([
                GapCategory::Small,
                GapCategory::Medium,
                GapCategory::Large,
            ]),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            GapBucketing::Banded(GapBands {
                small_below,
                large_from,
            }) if small_below > large_from => Err(format!(
                "gap bands are inverted: small_below {small_below} > large_from {large_from}"
            )),
            _ => Ok(()),
        }
    }
}
