// src/lib.rs

pub mod cli;
pub mod command;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fingerprint;
pub mod graph;
pub mod logging;
pub mod pipeline;
pub mod spec;
pub mod task;
pub mod tree;

use std::fs;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::command::specs_from_config;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;

pub use crate::errors::PipekitError;
pub use crate::exec::{Cache, CachedExecutor, ExecutionObserver, Results, RunRecord};
pub use crate::fingerprint::Fingerprint;
pub use crate::pipeline::Pipeline;
pub use crate::spec::{FnTaskType, Params, PlaceableUnit, TaskSpec, TaskType, resolve};
pub use crate::task::{RunConfig, SINK, SOURCE, Task, TypeSet, Unit, UnitId};
pub use crate::tree::{Tree, build_tree, enumerate};

/// Resolve `specs`, build the tree and collect every pipeline.
///
/// Shorthand for [`resolve`] + [`build_tree`] + [`enumerate`].
pub fn synthesize<V: 'static>(
    specs: Vec<TaskSpec<V>>,
    max_depth: Option<usize>,
) -> errors::Result<Vec<Pipeline<V>>> {
    let units = resolve(specs)?;
    let tree = build_tree(&units, max_depth)?;
    Ok(tree.pipelines().collect())
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task resolution and tree synthesis
/// - pipeline enumeration
/// - cached execution and result printing
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading config '{}'", args.config))?;

    let max_depth = args.max_depth.or(cfg.config.max_depth);
    if max_depth == Some(0) {
        return Err(PipekitError::ConfigError("--max-depth must be >= 1".to_string()).into());
    }
    let verbose = args.verbose || cfg.config.verbose;
    let run_config = run_config(&cfg, &args);

    let units = resolve(specs_from_config(&cfg)?)?;
    let tree = build_tree(&units, max_depth)?;
    let pipelines: Vec<Pipeline<String>> = tree.pipelines().collect();
    info!(pipelines = pipelines.len(), "enumerated pipelines");

    if args.dry_run {
        print_dry_run(&cfg, &run_config, &tree, &pipelines);
        return Ok(());
    }

    let input = read_input(&args)?;
    debug!(input_bytes = input.len(), "read pipeline input");

    let mut executor = CachedExecutor::new().verbose(verbose);
    let results = executor.run_with_config(&pipelines, input, &run_config)?;
    print_results(results);

    Ok(())
}

/// `[run]` from the config file, with `--set` entries layered on top.
fn run_config(cfg: &ConfigFile, args: &CliArgs) -> RunConfig {
    let mut run_config = cfg.run.clone();
    for (key, value) in &args.run_settings {
        run_config.insert(key.clone(), toml::Value::String(value.clone()));
    }
    run_config
}

fn read_input(args: &CliArgs) -> Result<String> {
    if let Some(path) = &args.input_file {
        return fs::read_to_string(path)
            .with_context(|| format!("reading input file '{}'", path.display()));
    }
    Ok(args.input.clone().unwrap_or_default())
}

/// Dry-run output: tasks, the synthesized tree, and the pipelines it yields.
fn print_dry_run(
    cfg: &ConfigFile,
    run_config: &RunConfig,
    tree: &Tree<String>,
    pipelines: &[Pipeline<String>],
) {
    println!("pipekit dry-run");
    match cfg.config.max_depth {
        Some(depth) => println!("  config.max_depth = {depth}"),
        None => println!("  config.max_depth = unbounded"),
    }
    println!("  config.verbose = {}", cfg.config.verbose);
    for (key, value) in run_config.iter() {
        println!("  run.{key} = {value}");
    }
    println!();

    println!("tasks ({}):", cfg.task.len());
    for (name, task) in cfg.task.iter() {
        println!("  - {name}");
        if let Some(cmd) = &task.cmd {
            println!("      cmd: {cmd}");
            println!("      input_types: {:?}", task.input_types);
            println!("      output_types: {:?}", task.output_types);
        }
        if let Some(chain) = &task.chain {
            println!("      chain: {}", chain.join(" -> "));
        }
        if task.shared {
            println!("      shared: true");
        }
        if let Some(params) = &task.params {
            let keys: Vec<&str> = params.keys().map(|k| k.as_str()).collect();
            println!("      params: {keys:?}");
        }
    }
    println!();

    println!("tree:");
    for line in tree.render().lines() {
        println!("  {line}");
    }
    println!();

    println!("pipelines ({}):", pipelines.len());
    for (index, pipeline) in pipelines.iter().enumerate() {
        println!("  [{index}] {pipeline}");
    }
}

fn print_results(results: &Results<String>) {
    for (index, record) in results.iter() {
        println!(
            "== [{index}] {} ({:?}, {} executed, {} cached)",
            record.task_names().join(" -> "),
            record.elapsed,
            record.executed_steps,
            record.cached_steps,
        );
        print!("{}", record.output);
        if !record.output.ends_with('\n') {
            println!();
        }
    }
}
