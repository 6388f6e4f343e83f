// src/command.rs

//! Shell-command tasks for the `pipekit` binary.
//!
//! A command task receives the current value on stdin and produces the next
//! value on stdout. The process must exit successfully; anything else is a
//! task failure.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, anyhow, bail};
use tracing::{debug, trace};

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{PipekitError, Result};
use crate::pipeline::Pipeline;
use crate::spec::{Params, TaskSpec, TaskType};
use crate::task::{RunConfig, Task, TypeSet, Unit};

/// Prefix of the environment variables that carry task params.
pub const PARAM_ENV_PREFIX: &str = "PIPEKIT_PARAM_";

/// Prefix of the environment variables that carry the run configuration.
pub const RUN_ENV_PREFIX: &str = "PIPEKIT_RUN_";

/// One configured shell command.
#[derive(Debug, Clone)]
pub struct CommandTask {
    name: String,
    cmd: String,
    input_types: TypeSet,
    output_types: TypeSet,
    env: Vec<(String, String)>,
}

impl CommandTask {
    pub fn new(
        name: impl Into<String>,
        cmd: impl Into<String>,
        input_types: TypeSet,
        output_types: TypeSet,
    ) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            input_types,
            output_types,
            env: Vec::new(),
        }
    }

    /// Export `params` to the child as `PIPEKIT_PARAM_<KEY>`.
    pub fn with_params(mut self, params: &Params) -> Self {
        self.env = params
            .iter()
            .map(|(key, value)| (env_name(PARAM_ENV_PREFIX, key), env_value(value)))
            .collect();
        self
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    fn shell_command(&self) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        }
    }
}

impl Task<String> for CommandTask {
    fn input_types(&self) -> TypeSet {
        self.input_types.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output_types.clone()
    }

    fn run(&self, input: String) -> anyhow::Result<String> {
        self.execute(input, &[])
    }

    /// Run configuration entries are exported as `PIPEKIT_RUN_<KEY>`.
    fn run_with_config(&self, input: String, config: &RunConfig) -> anyhow::Result<String> {
        let run_env: Vec<(String, String)> = config
            .iter()
            .map(|(key, value)| (env_name(RUN_ENV_PREFIX, key), env_value(value)))
            .collect();
        self.execute(input, &run_env)
    }
}

impl CommandTask {
    fn execute(&self, input: String, run_env: &[(String, String)]) -> anyhow::Result<String> {
        debug!(task = %self.name, cmd = %self.cmd, input_bytes = input.len(), "spawning command");

        let mut child = self
            .shell_command()
            .envs(self.env.iter().chain(run_env).map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning process for task '{}'", self.name))?;

        // Feed stdin from another thread so a command that writes before it
        // finishes reading cannot deadlock against us.
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin of task '{}' was not captured", self.name))?;
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .with_context(|| format!("waiting for process of task '{}'", self.name))?;

        match writer.join() {
            Ok(Ok(())) => {}
            // The command may legitimately exit without reading its input.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                trace!(task = %self.name, "command closed stdin early");
            }
            Ok(Err(e)) => {
                return Err(e).with_context(|| format!("writing stdin of task '{}'", self.name));
            }
            Err(_) => bail!("stdin writer for task '{}' panicked", self.name),
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(task = %self.name, "stderr: {}", line);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            bail!(
                "command exited with status {code}{}",
                stderr_suffix(stderr.trim())
            );
        }

        String::from_utf8(output.stdout)
            .with_context(|| format!("stdout of task '{}' is not valid UTF-8", self.name))
    }
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

fn env_name(prefix: &str, key: &str) -> String {
    let key: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{prefix}{key}")
}

fn env_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The constructor for a `[task.<name>]` command entry.
#[derive(Debug, Clone)]
pub struct CommandTaskType {
    name: String,
    cmd: String,
    input_types: TypeSet,
    output_types: TypeSet,
}

impl CommandTaskType {
    pub fn from_config(name: &str, task: &TaskConfig) -> Result<Self> {
        let cmd = task.cmd.clone().ok_or_else(|| {
            PipekitError::InvalidSpecification(format!("task '{name}' has no `cmd`"))
        })?;
        Ok(Self {
            name: name.to_string(),
            cmd,
            input_types: task.input_types.iter().cloned().collect(),
            output_types: task.output_types.iter().cloned().collect(),
        })
    }

    fn build(&self, params: &Params) -> CommandTask {
        CommandTask::new(
            self.name.as_str(),
            self.cmd.as_str(),
            self.input_types.clone(),
            self.output_types.clone(),
        )
        .with_params(params)
    }
}

impl TaskType<String> for CommandTaskType {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> TypeSet {
        self.input_types.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output_types.clone()
    }

    fn instantiate(&self, params: &Params) -> anyhow::Result<Arc<dyn Task<String>>> {
        Ok(Arc::new(self.build(params)))
    }
}

/// Turn a validated config into task specifications, in task-name order.
///
/// - `cmd` without params: a fresh instance per placement.
/// - `cmd` with `params`: a configured instance per placement.
/// - `cmd` with `shared = true`: one instance everywhere.
/// - `chain`: its members built once and placed as one composite unit.
pub fn specs_from_config(cfg: &ConfigFile) -> Result<Vec<TaskSpec<String>>> {
    let mut specs = Vec::with_capacity(cfg.task.len());

    for (name, task) in cfg.task.iter() {
        let spec = if let Some(members) = &task.chain {
            TaskSpec::chain(name.as_str(), chain_pipeline(cfg, name, members)?)
        } else {
            let task_type = CommandTaskType::from_config(name, task)?;
            let params = task.params.clone().unwrap_or_default();
            if task.shared {
                TaskSpec::instance(name.as_str(), task_type.build(&params))
            } else if params.is_empty() {
                TaskSpec::of_type(task_type)
            } else {
                TaskSpec::configured(task_type, params)
            }
        };
        debug!(task = %name, "built task specification from config");
        specs.push(spec);
    }

    Ok(specs)
}

fn chain_pipeline(cfg: &ConfigFile, name: &str, members: &[String]) -> Result<Pipeline<String>> {
    let mut units = Vec::with_capacity(members.len());
    for member in members {
        let member_cfg = cfg.task.get(member).ok_or_else(|| {
            PipekitError::ConfigError(format!(
                "chain '{name}' refers to unknown task '{member}'"
            ))
        })?;
        let task_type = CommandTaskType::from_config(member, member_cfg)?;
        let params = member_cfg.params.clone().unwrap_or_default();
        let task: Arc<dyn Task<String>> = Arc::new(task_type.build(&params));
        units.push(Unit::new(member.as_str(), task));
    }
    Ok(Pipeline::new(units))
}
