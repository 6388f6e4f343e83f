// tests/chain_properties.rs

use std::collections::{BTreeSet, HashSet};

use proptest::prelude::*;
use pipekit::errors::PipekitError;
use pipekit::spec::TaskSpec;
use pipekit::synthesize;
use pipekit_test_utils::tasks::{CallLog, tag_type};

const TAGS: &[&str] = &["source", "a", "b", "c", "sink"];

fn tag_set() -> impl Strategy<Value = BTreeSet<&'static str>> {
    proptest::collection::btree_set(proptest::sample::select(TAGS), 1..3)
}

// Up to five tasks with random, non-empty type declarations.
fn declarations() -> impl Strategy<Value = Vec<(BTreeSet<&'static str>, BTreeSet<&'static str>)>> {
    proptest::collection::vec((tag_set(), tag_set()), 1..=5)
}

fn specs_for(
    decls: &[(BTreeSet<&'static str>, BTreeSet<&'static str>)],
    log: &CallLog,
) -> Vec<TaskSpec<String>> {
    decls
        .iter()
        .enumerate()
        .map(|(i, (input, output))| {
            let input: Vec<&str> = input.iter().copied().collect();
            let output: Vec<&str> = output.iter().copied().collect();
            TaskSpec::of_type(tag_type(&format!("task_{i}"), &input, &output, log))
        })
        .collect()
}

proptest! {
    #[test]
    fn every_chain_is_valid_and_acyclic(
        decls in declarations(),
        max_depth in proptest::option::of(1usize..5),
    ) {
        let log = CallLog::new();
        let has_source = decls.iter().any(|(input, _)| input.contains("source"));

        let pipelines = match synthesize(specs_for(&decls, &log), max_depth) {
            Ok(p) => p,
            Err(PipekitError::NoSourceUnits) => {
                prop_assert!(!has_source);
                return Ok(());
            }
            Err(e) => return Err(TestCaseError::fail(format!("unexpected error: {e}"))),
        };
        prop_assert!(has_source);

        let mut seen = HashSet::new();
        let chains: Vec<Vec<_>> = pipelines
            .iter()
            .map(|p| p.units().iter().map(|u| u.id()).collect())
            .collect();
        for pipeline in &pipelines {
            let units = pipeline.units();
            prop_assert!(!units.is_empty());
            prop_assert!(units[0].input_types().accepts_source());
            prop_assert!(units[units.len() - 1].output_types().produces_sink());
            prop_assert!(pipeline.is_connected());

            let names: HashSet<&str> = units.iter().map(|u| u.name()).collect();
            prop_assert_eq!(names.len(), units.len(), "task repeated in {}", pipeline);

            if let Some(max) = max_depth {
                prop_assert!(units.len() <= max);
            }

            let ids: Vec<_> = units.iter().map(|u| u.id()).collect();
            prop_assert!(seen.insert(ids), "chain emitted twice: {}", pipeline);
        }
        // A chain that ends at a sink is not emitted when a longer chain
        // through the same placements reaches a sink too.
        for (i, shorter) in chains.iter().enumerate() {
            for (j, longer) in chains.iter().enumerate() {
                if i != j && longer.len() > shorter.len() {
                    prop_assert!(!longer.starts_with(shorter), "{} is extended", pipelines[i]);
                }
            }
        }
        prop_assert_eq!(log.count(), 0);
    }
}
