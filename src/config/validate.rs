// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, TaskConfig};
use crate::errors::{PipekitError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipekitError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task_form(name, task)?;
    }
    validate_chain_members(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipekitError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.max_depth == Some(0) {
        return Err(PipekitError::ConfigError(
            "[config].max_depth must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

/// Each task must be exactly one recognized form.
fn validate_task_form(name: &str, task: &TaskConfig) -> Result<()> {
    match (&task.cmd, &task.chain) {
        (Some(_), Some(_)) => Err(PipekitError::InvalidSpecification(format!(
            "task '{name}' sets both `cmd` and `chain`"
        ))),
        (None, None) => Err(PipekitError::InvalidSpecification(format!(
            "task '{name}' sets neither `cmd` nor `chain`"
        ))),
        (Some(cmd), None) => {
            if cmd.trim().is_empty() {
                return Err(PipekitError::InvalidSpecification(format!(
                    "task '{name}' has an empty `cmd`"
                )));
            }
            if task.input_types.is_empty() && task.output_types.is_empty() {
                return Err(PipekitError::InvalidSpecification(format!(
                    "task '{name}' declares neither `input_types` nor `output_types`"
                )));
            }
            Ok(())
        }
        (None, Some(members)) => {
            if members.is_empty() {
                return Err(PipekitError::InvalidSpecification(format!(
                    "chain '{name}' has no members"
                )));
            }
            if !task.input_types.is_empty() || !task.output_types.is_empty() {
                return Err(PipekitError::InvalidSpecification(format!(
                    "chain '{name}' must not declare types; they come from its members"
                )));
            }
            if task.params.is_some() || task.shared {
                return Err(PipekitError::InvalidSpecification(format!(
                    "chain '{name}' does not accept `params` or `shared`"
                )));
            }
            Ok(())
        }
    }
}

fn validate_chain_members(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let Some(members) = &task.chain else { continue };
        for member in members {
            match cfg.task.get(member) {
                None => {
                    return Err(PipekitError::ConfigError(format!(
                        "chain '{name}' refers to unknown task '{member}'"
                    )));
                }
                Some(t) if !t.is_command() => {
                    return Err(PipekitError::ConfigError(format!(
                        "chain '{name}' refers to '{member}', which is not a command task"
                    )));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}
