use crate::model::GeoType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputationError {
    #[error("Structural mismatch for '{variable}': expected {expected} fields, got {actual}")]
    Shape { variable: String, expected: usize, actual: usize },
    #[error("Geography '{geotype}' needs identifier part '{part}'")]
    MissingGeoPart { geotype: GeoType, part: &'static str },
    #[error("Geography '{0}' is never fetched directly; it is built by aggregation")]
    NotFetchable(GeoType),
    #[error("Reapportionment ratio {ratio} from '{from}' to '{to}' is outside [0, 1]")]
    InvalidRatio { from: String, to: String, ratio: f64 },
    #[error("Special composite '{variable}' expected {expected} constituents, got {actual}")]
    Arity { variable: String, expected: usize, actual: usize },
    #[error("Median bins and counts disagree: {bins} bins, {counts} counts")]
    BinCount { bins: usize, counts: usize },
    #[error("Cannot read reference data '{path}': {msg}")]
    Reference { path: String, msg: String },
}
