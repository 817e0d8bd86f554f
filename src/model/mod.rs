//! Shared value types flowing between the aggregation stages.
pub mod record;
pub mod types;

pub use record::{DerivedRecord, GeoParts, IndicatorRecord, Observation, ObservationTable, PercentPair, RawField};
pub use types::{Domain, GeoType, Membership, SourceKind, Vintage};
