use super::types::{Domain, GeoType};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Hierarchical identifier parts as the data source reports them.
///
/// Which parts are present depends on the geography requested; the geoid is
/// assembled by [`crate::geography::geoid::census_geoid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoParts {
    pub state: Option<String>,
    pub county: Option<String>,
    pub place: Option<String>,
    pub tract: Option<String>,
    pub block_group: Option<String>,
    pub block: Option<String>,
}

/// One raw source field for one geography.
///
/// Values are as reported, sentinel codes included. Profile tables also
/// report a percentage and its margin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawField {
    pub estimate: Option<f64>,
    pub moe: Option<f64>,
    pub percent: Option<f64>,
    pub percent_moe: Option<f64>,
}

impl RawField {
    pub fn new(estimate: f64, moe: f64) -> Self {
        Self { estimate: Some(estimate), moe: Some(moe), ..Default::default() }
    }

    pub fn count(estimate: f64) -> Self {
        Self { estimate: Some(estimate), ..Default::default() }
    }
}

/// A raw row: one geography, one entry per requested field (request order).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub parts: GeoParts,
    pub fields: SmallVec<[RawField; 4]>,
}

/// What the data source returns for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObservationTable {
    pub geotype: Option<GeoType>,
    pub rows: Vec<Observation>,
}

/// The unit of aggregation at every stage: one (geography, variable) pair.
///
/// `m` is `None` for full-count sources and for any value that could not be
/// bounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRecord {
    pub geoid: String,
    pub variable: String,
    pub geotype: GeoType,
    pub e: Option<f64>,
    pub m: Option<f64>,
}

impl IndicatorRecord {
    pub fn new(geoid: impl Into<String>, variable: impl Into<String>, geotype: GeoType, e: Option<f64>, m: Option<f64>) -> Self {
        Self { geoid: geoid.into(), variable: variable.into(), geotype, e, m }
    }
}

/// Percentage and percentage margin taken straight from a source (profile
/// tables, percent companions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentPair {
    pub p: Option<f64>,
    pub z: Option<f64>,
}

/// The published row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    pub geoid: String,
    pub geotype: GeoType,
    pub variable: String,
    pub domain: Domain,
    pub c: Option<f64>,
    pub e: Option<f64>,
    pub m: Option<f64>,
    pub p: Option<f64>,
    pub z: Option<f64>,
}

impl DerivedRecord {
    pub fn from_indicator(record: &IndicatorRecord, domain: Domain) -> Self {
        Self {
            geoid: record.geoid.clone(),
            geotype: record.geotype,
            variable: record.variable.clone(),
            domain,
            c: None,
            e: record.e,
            m: record.m,
            p: None,
            z: None,
        }
    }
}
