//! Reference tables mapping fine geographies onto coarse ones.
use crate::compute::ComputationError;
use crate::model::{GeoType, Membership};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// One fine unit's membership in one coarse unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrosswalkEntry {
    pub fine_type: GeoType,
    pub fine_geoid: String,
    pub coarse_type: GeoType,
    pub coarse_geoid: String,
    /// Subsets the fine unit belongs to (flood plains, park access).
    #[serde(default)]
    pub memberships: BTreeSet<Membership>,
}

/// Share of a 2010 tract's population that falls in a 2020 tract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioEntry {
    pub from_geoid: String,
    pub to_geoid: String,
    pub ratio: f64,
}

/// Loaded once per run and shared read-only by every aggregator.
#[derive(Debug, Clone, Default)]
pub struct GeographyReference {
    crosswalk: Vec<CrosswalkEntry>,
    ratios: Vec<RatioEntry>,
}

impl GeographyReference {
    /// Checks every ratio lies in [0, 1], then rescales so that neither the
    /// fragments of one source tract nor those feeding one destination
    /// tract sum above 1.
    pub fn new(crosswalk: Vec<CrosswalkEntry>, mut ratios: Vec<RatioEntry>) -> Result<Self, ComputationError> {
        for entry in &ratios {
            if !(entry.ratio.is_finite() && (0.0..=1.0).contains(&entry.ratio)) {
                return Err(ComputationError::InvalidRatio {
                    from: entry.from_geoid.clone(),
                    to: entry.to_geoid.clone(),
                    ratio: entry.ratio,
                });
            }
        }
        let sources = normalize(&mut ratios, |e| &e.from_geoid);
        let destinations = normalize(&mut ratios, |e| &e.to_geoid);
        if sources + destinations > 0 {
            warn!(sources, destinations, "reapportionment ratios summed above 1 and were rescaled");
        }
        Ok(Self { crosswalk, ratios })
    }

    /// Reads `crosswalk.json` and `ratio.json` from `dir`; either may be absent.
    pub fn load_dir(dir: &Path) -> Result<Self, ComputationError> {
        let crosswalk = read_optional(&dir.join("crosswalk.json"))?.unwrap_or_default();
        let ratios = read_optional(&dir.join("ratio.json"))?.unwrap_or_default();
        let reference = Self::new(crosswalk, ratios)?;
        debug!(crosswalk = reference.crosswalk.len(), ratios = reference.ratios.len(), "geography reference loaded");
        Ok(reference)
    }

    pub fn from_json(crosswalk: &str, ratios: &str) -> Result<Self, ComputationError> {
        let err = |path: &str, e: serde_json::Error| ComputationError::Reference { path: path.to_string(), msg: e.to_string() };
        let crosswalk = serde_json::from_str(crosswalk).map_err(|e| err("<crosswalk>", e))?;
        let ratios = serde_json::from_str(ratios).map_err(|e| err("<ratio>", e))?;
        Self::new(crosswalk, ratios)
    }

    /// Distinct `(fine, coarse)` pairs between two levels, optionally limited
    /// to fine units with `membership`.
    pub fn pairs(&self, fine: GeoType, coarse: GeoType, membership: Option<Membership>) -> Vec<(&str, &str)> {
        let set: BTreeSet<(&str, &str)> = self
            .crosswalk
            .iter()
            .filter(|e| e.fine_type == fine && e.coarse_type == coarse)
            .filter(|e| membership.map_or(true, |m| e.memberships.contains(&m)))
            .map(|e| (e.fine_geoid.as_str(), e.coarse_geoid.as_str()))
            .collect();
        set.into_iter().collect()
    }

    pub fn ratios(&self) -> &[RatioEntry] {
        &self.ratios
    }
}

/// Scales down every group of ratios (grouped by `key`) whose sum exceeds 1.
/// Returns the number of groups rescaled.
fn normalize(ratios: &mut [RatioEntry], key: impl Fn(&RatioEntry) -> &String) -> usize {
    let mut totals: HashMap<String, f64> = HashMap::new();
    for entry in ratios.iter() {
        *totals.entry(key(entry).clone()).or_insert(0.0) += entry.ratio;
    }
    for entry in ratios.iter_mut() {
        let total = totals.get(key(entry)).copied().unwrap_or(0.0);
        if total > 1.0 + 1e-9 {
            entry.ratio /= total;
        }
    }
    totals.values().filter(|t| **t > 1.0 + 1e-9).count()
}

fn read_optional<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, ComputationError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| ComputationError::Reference { path: path.display().to_string(), msg: e.to_string() })?;
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| ComputationError::Reference { path: path.display().to_string(), msg: e.to_string() })
}
