// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::spec::Params;
use crate::task::RunConfig;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// max_depth = 5
/// verbose = true
///
/// [task.load]
/// cmd = "cat input.csv"
/// input_types = ["source"]
/// output_types = ["csv"]
/// shared = true
///
/// [task.scale]
/// cmd = "awk -F, '{ print $1 * ENVIRON[\"PIPEKIT_PARAM_FACTOR\"] }'"
/// input_types = ["csv"]
/// output_types = ["numbers"]
/// params = { factor = 2 }
///
/// [task.prep]
/// chain = ["load", "scale"]
///
/// [run]
/// mode = "fast"
/// ```
///
/// This is the raw, unvalidated shape. Convert it with
/// `ConfigFile::try_from(raw)` (see `config::validate`).
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Run configuration from `[run]`, exported to every command as
    /// `PIPEKIT_RUN_<KEY>`.
    #[serde(default)]
    pub run: RunConfig,

    /// All tasks from `[task.<name>]`, keyed by task name.
    ///
    /// Tasks are supplied to the synthesizer in key order.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>`, so holders can rely on:
/// - at least one task,
/// - every task being exactly one of the command or chain forms,
/// - chain members referring to existing command tasks.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub run: RunConfig,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            run: raw.run,
            task: raw.task,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks in one pipeline. Unbounded when absent.
    #[serde(default)]
    pub max_depth: Option<usize>,

    /// Report per-pipeline progress while executing.
    #[serde(default)]
    pub verbose: bool,
}

/// `[task.<name>]` section.
///
/// A task is either a command (`cmd`, with its own `input_types` and
/// `output_types`) or a chain of other command tasks (`chain`), whose types
/// are derived from its first and last member.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Shell command; receives the input on stdin and writes the output to
    /// stdout.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Names of command tasks to run in sequence as one composite step.
    #[serde(default)]
    pub chain: Option<Vec<String>>,

    #[serde(default)]
    pub input_types: Vec<String>,

    #[serde(default)]
    pub output_types: Vec<String>,

    /// Reuse one instance everywhere the task is placed, so every placement
    /// shares cache entries. Defaults to a fresh instance per placement.
    #[serde(default)]
    pub shared: bool,

    /// Parameters exported to the command as `PIPEKIT_PARAM_<KEY>`.
    #[serde(default)]
    pub params: Option<Params>,
}

impl TaskConfig {
    pub fn is_command(&self) -> bool {
        self.cmd.is_some()
    }

    pub fn is_chain(&self) -> bool {
        self.chain.is_some()
    }
}
