#![allow(dead_code)]

pub use pipekit_test_utils::init_tracing;

use pipekit::spec::TaskSpec;
use pipekit_test_utils::tasks::{CallLog, tag_type};

/// `Source: source -> a`, `T1: a -> b`, `T2: {a, b} -> b`,
/// `Sink1: b -> sink`, `Sink2: b -> sink`, all in type form.
pub fn fan_out_specs(log: &CallLog) -> Vec<TaskSpec<String>> {
    vec![
        TaskSpec::of_type(tag_type("Source", &["source"], &["a"], log)),
        TaskSpec::of_type(tag_type("T1", &["a"], &["b"], log)),
        TaskSpec::of_type(tag_type("T2", &["a", "b"], &["b"], log)),
        TaskSpec::of_type(tag_type("Sink1", &["b"], &["sink"], log)),
        TaskSpec::of_type(tag_type("Sink2", &["b"], &["sink"], log)),
    ]
}

pub fn names(pipelines: &[pipekit::Pipeline<String>]) -> Vec<Vec<String>> {
    pipelines
        .iter()
        .map(|p| p.names().into_iter().map(str::to_string).collect())
        .collect()
}
