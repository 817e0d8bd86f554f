//! Geography identifiers, crosswalk reference data and vertical aggregation.
pub mod aggregate;
pub mod crosswalk;
pub mod geoid;
pub mod registry;

pub use self::aggregate::{reapportion_moe, Aggregator};
pub use self::crosswalk::{CrosswalkEntry, GeographyReference, RatioEntry};
pub use self::registry::{route, AggregationStrategy, Route};
