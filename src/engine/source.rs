use super::error::SourceError;
use crate::model::{GeoType, ObservationTable, SourceKind};

/// One request for raw fields at one geography level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRequest<'a> {
    pub variable: &'a str,
    /// Field identifiers without the estimate/margin suffix; rows must list
    /// values in this order.
    pub fields: &'a [String],
    pub source: SourceKind,
    pub geotype: GeoType,
    pub year: &'a str,
}

/// Client for the remote statistics API. Implementations must be callable
/// from several worker threads at once.
pub trait DataSource: Send + Sync {
    fn fetch(&self, request: &FetchRequest<'_>) -> Result<ObservationTable, SourceError>;
}
