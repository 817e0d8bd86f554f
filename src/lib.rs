//! Small-area statistics engine: aggregates census estimates and their
//! margins of error from fetched geographies up to neighborhood and
//! district levels, then derives coefficients of variation and percentages.

pub mod catalog;
pub mod compute;
pub mod display;
pub mod engine;
pub mod geography;
pub mod model;

#[cfg(feature = "python")]
mod bindings;

#[cfg(test)]
pub(crate) mod testutil;

pub use catalog::{Catalog, VariableDefinition, VariableKind};
pub use engine::{Calculator, DataSource, EngineConfig, EngineError};
pub use geography::GeographyReference;
pub use model::{DerivedRecord, GeoType, IndicatorRecord, Vintage};
