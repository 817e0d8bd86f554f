//! Defines `VariableDefinition` and the closed set of variable kinds that
//! decide which aggregation path a variable takes.

use crate::model::{Domain, SourceKind};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One bin of a binned distribution: `[lower, upper)` in the variable's units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianBin {
    /// The bin-component variable holding this bin's count.
    pub variable: String,
    pub lower: f64,
    /// `f64::INFINITY` for an open-ended top bin.
    pub upper: f64,
}

impl MedianBin {
    #[inline(always)]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Ordered bins plus the survey design factor shared by all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianRange {
    pub bins: Vec<MedianBin>,
    pub design_factor: f64,
}

impl MedianRange {
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bin_variables(&self) -> impl Iterator<Item = &str> {
        self.bins.iter().map(|b| b.variable.as_str())
    }

    /// Lower boundary of the open-ended top bin.
    pub fn top_lower(&self) -> Option<f64> {
        self.bins.last().map(|b| b.lower)
    }
}

/// Named combination functions for special-composite variables.
///
/// Each takes exactly two constituents, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialFunction {
    /// Per-capita and mean values: `sum(numerator) / sum(denominator)`.
    #[serde(alias = "percapinc", alias = "mean")]
    Ratio,
    /// A share whose numerator is a subset of its denominator.
    Proportion,
    /// `a - b`.
    Difference,
}

impl SpecialFunction {
    pub fn arity(&self) -> usize {
        2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialDefinition {
    pub base_variables: Vec<String>,
    pub function: SpecialFunction,
}

/// The aggregation path of a variable, resolved once at catalog load.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableKind {
    /// A denominator other variables are expressed against.
    Base,
    /// A plain sum of raw fields with a percentage of its base.
    Derived,
    /// Estimated from the distribution of its bin-component variables.
    Median(MedianRange),
    /// A custom formula over other variables.
    Special(SpecialDefinition),
    /// A single profile field whose percentage comes from the source.
    ProfileOnly,
}

impl VariableKind {
    pub fn tag(&self) -> &'static str {
        match self {
            VariableKind::Base => "base",
            VariableKind::Derived => "derived",
            VariableKind::Median(_) => "median",
            VariableKind::Special(_) => "special",
            VariableKind::ProfileOnly => "profile_only",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub id: String,
    /// Raw source field identifiers, without the `E`/`M` suffix.
    pub fields: SmallVec<[String; 4]>,
    pub source: SourceKind,
    /// `None` means the variable has no base and no percentage.
    pub base: Option<String>,
    pub rounding: i32,
    pub domain: Domain,
    /// Variable whose (e, m) are published as this variable's (p, z).
    pub percent_from: Option<String>,
    pub kind: VariableKind,
}

impl VariableDefinition {
    pub fn is_base(&self) -> bool {
        matches!(self.kind, VariableKind::Base)
    }

    pub fn is_median(&self) -> bool {
        matches!(self.kind, VariableKind::Median(_))
    }

    pub fn has_sampling_error(&self) -> bool {
        self.source.is_sampled()
    }
}
