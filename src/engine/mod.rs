//! Orchestration: the calculator, its result cache, worker pool, retry
//! policy and the data-source seam.
pub mod calculator;
pub mod config;
pub mod error;
pub mod pool;
pub mod retry;
pub mod source;
pub mod store;

pub use self::calculator::{BatchReport, Calculator, UnitOutcome};
pub use self::config::EngineConfig;
pub use self::error::{EngineError, SourceError, StoreError};
pub use self::pool::WorkerPool;
pub use self::retry::RetryPolicy;
pub use self::source::{DataSource, FetchRequest};
pub use self::store::{CacheKey, FileStore, MemoryStore, ResultStore};
