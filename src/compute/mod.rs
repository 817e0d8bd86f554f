//! Pure numeric stages. Nothing here performs IO or touches the cache.
pub mod cleaner;
pub mod derived;
pub mod error;
pub mod horizontal;
pub mod kernel;
pub mod median;
pub mod rounding;
pub mod special;

pub use self::cleaner::{clean, CleaningContext};
pub use self::error::ComputationError;
pub use self::median::MedianEstimate;
