// src/exec/executor.rs

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::{PipekitError, Result};
use crate::exec::cache::{Cache, CacheEntry, CacheKey, CacheStats};
use crate::exec::observer::{ExecutionObserver, LoggingObserver, PipelineEvent, StepEvent};
use crate::fingerprint::Fingerprint;
use crate::pipeline::Pipeline;
use crate::task::{RunConfig, Unit};

/// Outcome of one pipeline in a batch.
#[derive(Clone)]
pub struct RunRecord<V> {
    /// Value produced by the last step.
    pub output: V,
    /// Sum of step times; cache hits contribute their recorded time.
    pub elapsed: Duration,
    /// The units that formed the pipeline, in order.
    pub units: Vec<Unit<V>>,
    /// Steps that actually ran.
    pub executed_steps: usize,
    /// Steps served from the cache.
    pub cached_steps: usize,
}

impl<V> RunRecord<V> {
    pub fn task_names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }
}

impl<V: fmt::Debug> fmt::Debug for RunRecord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRecord")
            .field("output", &self.output)
            .field("elapsed", &self.elapsed)
            .field("tasks", &self.task_names())
            .field("executed_steps", &self.executed_steps)
            .field("cached_steps", &self.cached_steps)
            .finish()
    }
}

/// Records keyed by the pipeline's position in the batch.
pub type Results<V> = BTreeMap<usize, RunRecord<V>>;

/// Runs batches of pipelines, executing each (unit, input) pair at most once.
///
/// Before a step runs, the executor fingerprints the current value and looks
/// up `(unit identity, fingerprint)` in its cache. On a hit the stored output
/// and time are reused and the task is not called. On a miss the task runs,
/// is timed, and the result is stored. Pipelines sharing a prefix therefore
/// only pay for the prefix once.
///
/// The cache outlives a single [`run`](Self::run): calling `run` again, or
/// moving the cache into a new executor with [`with_cache`](Self::with_cache),
/// skips everything already computed.
pub struct CachedExecutor<V> {
    cache: Cache<V>,
    results: Results<V>,
    stats: CacheStats,
    observer: Option<Box<dyn ExecutionObserver>>,
}

impl<V> CachedExecutor<V>
where
    V: Clone + Serialize,
{
    pub fn new() -> Self {
        Self::with_cache(Cache::new())
    }

    /// Start from a pre-populated cache.
    pub fn with_cache(cache: Cache<V>) -> Self {
        Self {
            cache,
            results: Results::new(),
            stats: CacheStats::default(),
            observer: None,
        }
    }

    /// Attach (or detach) a [`LoggingObserver`].
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.observer = if verbose {
            Some(Box::new(LoggingObserver))
        } else {
            None
        };
        self
    }

    pub fn with_observer(mut self, observer: impl ExecutionObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Run every pipeline against `input`, in order.
    ///
    /// Results from a previous call are discarded first. If a task fails the
    /// batch stops with [`PipekitError::TaskExecution`]; records of the
    /// pipelines that finished before it stay available via
    /// [`results`](Self::results).
    pub fn run(&mut self, pipelines: &[Pipeline<V>], input: V) -> Result<&Results<V>> {
        self.run_with_config(pipelines, input, &RunConfig::new())
    }

    /// [`run`](Self::run) with a run configuration passed to every task.
    ///
    /// The configuration is part of each cache key: entries written under
    /// one configuration are never served under another.
    pub fn run_with_config(
        &mut self,
        pipelines: &[Pipeline<V>],
        input: V,
        config: &RunConfig,
    ) -> Result<&Results<V>> {
        self.results.clear();
        let total = pipelines.len();
        let started = Instant::now();
        let run_config = Fingerprint::of(config)?;

        if total == 0 {
            warn!("no pipelines to run");
        }
        if !config.is_empty() {
            debug!(keys = config.len(), "running with run configuration");
        }

        for (index, pipeline) in pipelines.iter().enumerate() {
            let record =
                self.run_pipeline(index, total, pipeline, input.clone(), config, run_config)?;
            self.results.insert(index, record);
        }

        info!(
            pipelines = total,
            hits = self.stats.hits,
            misses = self.stats.misses,
            cached_entries = self.cache.len(),
            wall_time = ?started.elapsed(),
            "batch finished"
        );

        Ok(&self.results)
    }

    fn run_pipeline(
        &mut self,
        index: usize,
        total: usize,
        pipeline: &Pipeline<V>,
        input: V,
        config: &RunConfig,
        run_config: Fingerprint,
    ) -> Result<RunRecord<V>> {
        let mut current = input;
        let mut elapsed = Duration::ZERO;
        let mut executed_steps = 0;
        let mut cached_steps = 0;

        for (step, unit) in pipeline.units().iter().enumerate() {
            let key = CacheKey {
                unit: unit.id(),
                input: Fingerprint::of(&current)?,
                run_config,
            };

            let (output, step_elapsed, cache_hit) = match self.cache.get(&key) {
                Some(entry) => {
                    self.stats.hits += 1;
                    (entry.output.clone(), entry.elapsed, true)
                }
                None => {
                    self.stats.misses += 1;
                    debug!(pipeline = index, step, task = %unit.name(), "executing step");
                    let start = Instant::now();
                    let output = unit.run_with_config(current, config).map_err(|source| {
                        PipekitError::TaskExecution {
                            task: unit.name().to_string(),
                            pipeline: index,
                            source,
                        }
                    })?;
                    let step_elapsed = start.elapsed();
                    self.cache.insert(
                        key,
                        CacheEntry {
                            output: output.clone(),
                            elapsed: step_elapsed,
                        },
                    );
                    (output, step_elapsed, false)
                }
            };

            if cache_hit {
                cached_steps += 1;
            } else {
                executed_steps += 1;
            }
            elapsed += step_elapsed;
            current = output;

            if let Some(observer) = self.observer.as_mut() {
                observer.on_step(&StepEvent {
                    pipeline: index,
                    step,
                    task: unit.name(),
                    cache_hit,
                    elapsed: step_elapsed,
                });
            }
        }

        if let Some(observer) = self.observer.as_mut() {
            let tasks = pipeline.names();
            observer.on_pipeline_complete(&PipelineEvent {
                index,
                total,
                tasks: &tasks,
                elapsed,
                executed_steps,
                cached_steps,
            });
        }

        Ok(RunRecord {
            output: current,
            elapsed,
            units: pipeline.units().to_vec(),
            executed_steps,
            cached_steps,
        })
    }

    pub fn results(&self) -> &Results<V> {
        &self.results
    }

    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }

    /// Give up the executor, keeping its cache for a later one.
    pub fn into_cache(self) -> Cache<V> {
        self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Hit/miss counters accumulated over every `run` on this executor.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl<V> Default for CachedExecutor<V>
where
    V: Clone + Serialize,
{
    fn default() -> Self {
        Self::new()
    }
}
