//! In-memory tasks for exercising synthesis and execution without spawning
//! processes.

use std::sync::{Arc, Mutex};

use pipekit::spec::{FnTaskType, Params};
use pipekit::task::{RunConfig, Task, TypeSet};

/// Shared record of which tasks ran, in order.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str) {
        self.calls.lock().expect("call log poisoned").push(name.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().expect("call log poisoned").len()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.calls
            .lock()
            .expect("call log poisoned")
            .iter()
            .filter(|c| c.as_str() == name)
            .count()
    }
}

/// Appends `">name"` to its input and logs the call.
///
/// Under a run configuration with a `mode` key the tag becomes
/// `">name@mode"`.
pub struct TagTask {
    name: String,
    input: TypeSet,
    output: TypeSet,
    log: CallLog,
}

impl TagTask {
    pub fn new(name: &str, input: &[&str], output: &[&str], log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            input: input.iter().copied().collect(),
            output: output.iter().copied().collect(),
            log: log.clone(),
        }
    }
}

impl Task<String> for TagTask {
    fn input_types(&self) -> TypeSet {
        self.input.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output.clone()
    }

    fn run(&self, input: String) -> anyhow::Result<String> {
        self.log.record(&self.name);
        Ok(format!("{input}>{}", self.name))
    }

    fn run_with_config(&self, input: String, config: &RunConfig) -> anyhow::Result<String> {
        match config.get("mode").and_then(|v| v.as_str()) {
            Some(mode) => {
                self.log.record(&self.name);
                Ok(format!("{input}>{}@{mode}", self.name))
            }
            None => self.run(input),
        }
    }
}

/// Logs the call and hands its input on unchanged.
pub struct PassTask {
    name: String,
    input: TypeSet,
    output: TypeSet,
    log: CallLog,
}

impl PassTask {
    pub fn new(name: &str, input: &[&str], output: &[&str], log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            input: input.iter().copied().collect(),
            output: output.iter().copied().collect(),
            log: log.clone(),
        }
    }
}

impl Task<String> for PassTask {
    fn input_types(&self) -> TypeSet {
        self.input.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output.clone()
    }

    fn run(&self, input: String) -> anyhow::Result<String> {
        self.log.record(&self.name);
        Ok(input)
    }
}

/// Always fails with `"<name> refused <input>"`.
pub struct FailingTask {
    name: String,
    input: TypeSet,
    output: TypeSet,
}

impl FailingTask {
    pub fn new(name: &str, input: &[&str], output: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            input: input.iter().copied().collect(),
            output: output.iter().copied().collect(),
        }
    }
}

impl Task<String> for FailingTask {
    fn input_types(&self) -> TypeSet {
        self.input.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output.clone()
    }

    fn run(&self, input: String) -> anyhow::Result<String> {
        anyhow::bail!("{} refused {input}", self.name)
    }
}

/// A task type whose instances are [`TagTask`]s sharing `log`.
///
/// A `suffix` param, when present, is appended to the tag so configured
/// instances are distinguishable in outputs.
pub fn tag_type(
    name: &str,
    input: &[&str],
    output: &[&str],
    log: &CallLog,
) -> FnTaskType<String> {
    let task_name = name.to_string();
    let task_input: Vec<String> = input.iter().map(|s| s.to_string()).collect();
    let task_output: Vec<String> = output.iter().map(|s| s.to_string()).collect();
    let log = log.clone();

    FnTaskType::new(
        name,
        task_input.clone(),
        task_output.clone(),
        move |params: &Params| {
            let tag = match params.get("suffix").and_then(|v| v.as_str()) {
                Some(suffix) => format!("{task_name}:{suffix}"),
                None => task_name.clone(),
            };
            let input: Vec<&str> = task_input.iter().map(String::as_str).collect();
            let output: Vec<&str> = task_output.iter().map(String::as_str).collect();
            Ok(Arc::new(TagTask::new(&tag, &input, &output, &log)) as Arc<dyn Task<String>>)
        },
    )
}
