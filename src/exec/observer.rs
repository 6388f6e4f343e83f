// src/exec/observer.rs

use std::time::Duration;

use tracing::{debug, info};

/// One step of one pipeline has finished (executed or served from cache).
#[derive(Debug, Clone)]
pub struct StepEvent<'a> {
    pub pipeline: usize,
    pub step: usize,
    pub task: &'a str,
    pub cache_hit: bool,
    pub elapsed: Duration,
}

/// A whole pipeline has finished.
#[derive(Debug, Clone)]
pub struct PipelineEvent<'a> {
    pub index: usize,
    pub total: usize,
    pub tasks: &'a [&'a str],
    pub elapsed: Duration,
    pub executed_steps: usize,
    pub cached_steps: usize,
}

/// Progress hook for [`CachedExecutor`](super::CachedExecutor).
///
/// Purely informational: the executor behaves the same with or without an
/// observer attached.
pub trait ExecutionObserver {
    fn on_step(&mut self, _event: &StepEvent<'_>) {}

    fn on_pipeline_complete(&mut self, _event: &PipelineEvent<'_>) {}
}

/// Reports progress through `tracing`.
///
/// Steps are logged at `debug`, completed pipelines at `info`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl ExecutionObserver for LoggingObserver {
    fn on_step(&mut self, event: &StepEvent<'_>) {
        debug!(
            pipeline = event.pipeline,
            step = event.step,
            task = %event.task,
            cache_hit = event.cache_hit,
            elapsed = ?event.elapsed,
            "step finished"
        );
    }

    fn on_pipeline_complete(&mut self, event: &PipelineEvent<'_>) {
        info!(
            pipeline = event.index + 1,
            total = event.total,
            tasks = %event.tasks.join(" -> "),
            elapsed = ?event.elapsed,
            executed = event.executed_steps,
            cached = event.cached_steps,
            "pipeline completed"
        );
    }
}
