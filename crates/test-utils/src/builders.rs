use std::collections::BTreeMap;

use pipekit::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use pipekit::spec::Params;
use pipekit::task::RunConfig;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                run: RunConfig::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.config.max_depth = Some(depth);
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.config.verbose = verbose;
        self
    }

    /// One `[run]` entry.
    pub fn run_setting(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.config.run.insert(key.to_string(), value.into());
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    /// A command task.
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    /// A chain of existing command tasks.
    pub fn chain(members: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                chain: Some(members.iter().map(|m| m.to_string()).collect()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn input(mut self, tag: &str) -> Self {
        self.task.input_types.push(tag.to_string());
        self
    }

    pub fn output(mut self, tag: &str) -> Self {
        self.task.output_types.push(tag.to_string());
        self
    }

    pub fn shared(mut self) -> Self {
        self.task.shared = true;
        self
    }

    pub fn param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.task
            .params
            .get_or_insert_with(Params::new)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}
