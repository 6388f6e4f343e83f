// tests/synthesis.rs
mod common;
use crate::common::{fan_out_specs, init_tracing, names};

use std::error::Error;
use std::sync::Arc;

use pipekit::errors::PipekitError;
use pipekit::pipeline::Pipeline;
use pipekit::spec::{TaskSpec, resolve};
use pipekit::task::{Task, Unit};
use pipekit::tree::{build_tree, enumerate};
use pipekit::synthesize;
use pipekit_test_utils::tasks::{CallLog, TagTask, tag_type};

type TestResult = Result<(), Box<dyn Error>>;

fn expect(chains: &[&[&str]]) -> Vec<Vec<String>> {
    chains
        .iter()
        .map(|c| c.iter().map(|s| s.to_string()).collect())
        .collect()
}

#[test]
fn fan_out_yields_every_chain_in_depth_first_order() -> TestResult {
    init_tracing();
    let log = CallLog::new();
    let pipelines = synthesize(fan_out_specs(&log), None)?;

    assert_eq!(
        names(&pipelines),
        expect(&[
            &["Source", "T1", "T2", "Sink1"],
            &["Source", "T1", "T2", "Sink2"],
            &["Source", "T1", "Sink1"],
            &["Source", "T1", "Sink2"],
            &["Source", "T2", "Sink1"],
            &["Source", "T2", "Sink2"],
        ])
    );
    // Synthesis alone never runs anything.
    assert_eq!(log.count(), 0);
    Ok(())
}

#[test]
fn max_depth_bounds_chain_length() -> TestResult {
    init_tracing();
    let log = CallLog::new();

    assert_eq!(synthesize(fan_out_specs(&log), Some(4))?.len(), 6);

    let three = synthesize(fan_out_specs(&log), Some(3))?;
    assert_eq!(
        names(&three),
        expect(&[
            &["Source", "T1", "Sink1"],
            &["Source", "T1", "Sink2"],
            &["Source", "T2", "Sink1"],
            &["Source", "T2", "Sink2"],
        ])
    );

    assert!(synthesize(fan_out_specs(&log), Some(2))?.is_empty());
    Ok(())
}

#[test]
fn single_unit_source_and_sink_is_a_chain_of_one() -> TestResult {
    let log = CallLog::new();
    let pipelines = synthesize(
        vec![TaskSpec::of_type(tag_type("both", &["source"], &["sink"], &log))],
        None,
    )?;
    assert_eq!(names(&pipelines), expect(&[&["both"]]));
    Ok(())
}

#[test]
fn missing_source_is_an_error() {
    let log = CallLog::new();
    let result = synthesize(
        vec![
            TaskSpec::of_type(tag_type("mid", &["a"], &["b"], &log)),
            TaskSpec::of_type(tag_type("end", &["b"], &["sink"], &log)),
        ],
        None,
    );
    assert!(matches!(result, Err(PipekitError::NoSourceUnits)));
}

#[test]
fn missing_sink_yields_no_chains_and_keeps_dead_ends() -> TestResult {
    let log = CallLog::new();
    let units = resolve(vec![
        TaskSpec::of_type(tag_type("start", &["source"], &["a"], &log)),
        TaskSpec::of_type(tag_type("stuck", &["a"], &["z"], &log)),
    ])?;
    let tree = build_tree(&units, None)?;

    assert_eq!(enumerate(&tree).count(), 0);
    assert_eq!(tree.dead_ends(), 1);
    assert_eq!(tree.render(), "root\n  start\n    stuck (dead end)\n");
    Ok(())
}

#[test]
fn self_feeding_type_appears_once_per_path_and_only_longest_chain_is_emitted() -> TestResult {
    let log = CallLog::new();
    let pipelines = synthesize(
        vec![
            TaskSpec::of_type(tag_type("loop", &["source", "x"], &["x", "sink"], &log)),
            TaskSpec::of_type(tag_type("other", &["x"], &["x", "sink"], &log)),
        ],
        None,
    )?;
    // `loop` alone also ends at a sink, but `other` extends it.
    assert_eq!(names(&pipelines), expect(&[&["loop", "other"]]));
    Ok(())
}

#[test]
fn type_form_places_distinct_instances() -> TestResult {
    let log = CallLog::new();
    let pipelines = synthesize(fan_out_specs(&log), None)?;

    // Sink1 sits under three different parents.
    let sink_ids: Vec<_> = pipelines
        .iter()
        .filter_map(|p| p.units().last())
        .filter(|u| u.name() == "Sink1")
        .map(|u| u.id())
        .collect();
    assert_eq!(sink_ids.len(), 3);
    assert_ne!(sink_ids[0], sink_ids[1]);
    assert_ne!(sink_ids[1], sink_ids[2]);

    // The shared prefix is the same placement in every chain.
    let source_ids: Vec<_> = pipelines.iter().map(|p| p.units()[0].id()).collect();
    assert!(source_ids.iter().all(|id| *id == source_ids[0]));
    Ok(())
}

#[test]
fn instance_form_shares_one_identity_everywhere() -> TestResult {
    let log = CallLog::new();
    let pipelines = synthesize(
        vec![
            TaskSpec::of_type(tag_type("Source", &["source"], &["a"], &log)),
            TaskSpec::of_type(tag_type("T1", &["a"], &["b"], &log)),
            TaskSpec::of_type(tag_type("T2", &["a", "b"], &["b"], &log)),
            TaskSpec::instance("Sink1", TagTask::new("Sink1", &["b"], &["sink"], &log)),
        ],
        None,
    )?;

    let sink_ids: Vec<_> = pipelines
        .iter()
        .filter_map(|p| p.units().last())
        .map(|u| u.id())
        .collect();
    assert_eq!(sink_ids.len(), 3);
    assert!(sink_ids.iter().all(|id| *id == sink_ids[0]));
    Ok(())
}

#[test]
fn chain_form_is_placed_as_one_step() -> TestResult {
    let log = CallLog::new();
    let parse: Arc<dyn Task<String>> =
        Arc::new(TagTask::new("parse", &["raw"], &["parsed"], &log));
    let check: Arc<dyn Task<String>> =
        Arc::new(TagTask::new("check", &["parsed"], &["checked"], &log));
    let prep = Pipeline::new(vec![Unit::new("parse", parse), Unit::new("check", check)]);

    let pipelines = synthesize(
        vec![
            TaskSpec::of_type(tag_type("read", &["source"], &["raw"], &log)),
            TaskSpec::chain("prep", prep),
            TaskSpec::of_type(tag_type("write", &["checked"], &["sink"], &log)),
        ],
        None,
    )?;

    assert_eq!(names(&pipelines), expect(&[&["read", "prep", "write"]]));
    assert_eq!(pipelines[0].run("in".to_string())?, "in>read>parse>check>write");
    Ok(())
}

#[test]
fn enumeration_can_be_repeated() -> TestResult {
    let log = CallLog::new();
    let units = resolve(fan_out_specs(&log))?;
    let tree = build_tree(&units, None)?;

    let first: Vec<_> = enumerate(&tree).collect();
    let second: Vec<_> = enumerate(&tree).collect();
    assert_eq!(names(&first), names(&second));
    Ok(())
}
