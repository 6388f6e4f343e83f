// src/exec/mod.rs

//! Cached execution of pipeline batches.
//!
//! - [`cache`] holds the content-addressed result cache.
//! - [`executor`] owns the batch loop that consults the cache before running
//!   each step.
//! - [`observer`] is the optional progress-reporting hook.

pub mod cache;
pub mod executor;
pub mod observer;

pub use cache::{Cache, CacheEntry, CacheKey, CacheStats};
pub use executor::{CachedExecutor, Results, RunRecord};
pub use observer::{ExecutionObserver, LoggingObserver, PipelineEvent, StepEvent};
