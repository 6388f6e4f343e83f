// src/spec.rs

//! Task specification resolver.
//!
//! Users describe tasks in one of four forms ([`TaskSpec`]). [`resolve`]
//! turns a list of them into [`PlaceableUnit`]s: uniform records carrying the
//! effective type sets and a factory that decides, per tree position, whether
//! a fresh instance or a shared one is placed.
//!
//! | Form | What a placement gets |
//! |---|---|
//! | [`TaskSpec::Type`] | a new instance with a new identity |
//! | [`TaskSpec::Instance`] | the same unit, same identity everywhere |
//! | [`TaskSpec::Configured`] | a new instance built with the given params |
//! | [`TaskSpec::Chain`] | the pre-built chain as one shared composite unit |

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{PipekitError, Result};
use crate::pipeline::Pipeline;
use crate::task::{Task, TypeSet, Unit};

/// Configuration handed to a task type when instantiating it.
pub type Params = toml::Table;

/// A constructor for tasks, the equivalent of a task "class".
///
/// The declared type sets are known before any instance exists, which is
/// what lets the synthesizer plan placements without building anything.
pub trait TaskType<V>: Send + Sync {
    fn name(&self) -> &str;

    fn input_types(&self) -> TypeSet;

    fn output_types(&self) -> TypeSet;

    /// Build a new instance. `params` is empty for the plain type form.
    fn instantiate(&self, params: &Params) -> anyhow::Result<Arc<dyn Task<V>>>;
}

type Constructor<V> = dyn Fn(&Params) -> anyhow::Result<Arc<dyn Task<V>>> + Send + Sync;

/// A [`TaskType`] backed by a closure.
pub struct FnTaskType<V> {
    name: String,
    input_types: TypeSet,
    output_types: TypeSet,
    constructor: Box<Constructor<V>>,
}

impl<V> FnTaskType<V> {
    pub fn new<I, O, F>(
        name: impl Into<String>,
        input_types: I,
        output_types: O,
        constructor: F,
    ) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
        O: IntoIterator,
        O::Item: Into<String>,
        F: Fn(&Params) -> anyhow::Result<Arc<dyn Task<V>>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            input_types: input_types.into_iter().collect(),
            output_types: output_types.into_iter().collect(),
            constructor: Box::new(constructor),
        }
    }
}

impl<V> TaskType<V> for FnTaskType<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_types(&self) -> TypeSet {
        self.input_types.clone()
    }

    fn output_types(&self) -> TypeSet {
        self.output_types.clone()
    }

    fn instantiate(&self, params: &Params) -> anyhow::Result<Arc<dyn Task<V>>> {
        (self.constructor)(params)
    }
}

/// One user-supplied task descriptor.
pub enum TaskSpec<V> {
    /// Instantiate a fresh task at every placement.
    Type(Arc<dyn TaskType<V>>),
    /// Reuse one pre-built task at every placement.
    Instance { name: String, task: Arc<dyn Task<V>> },
    /// Instantiate a fresh task with the given params at every placement.
    Configured {
        task_type: Arc<dyn TaskType<V>>,
        params: Params,
    },
    /// Place a pre-built chain as one composite unit.
    Chain { name: String, pipeline: Pipeline<V> },
}

impl<V> TaskSpec<V> {
    pub fn of_type(task_type: impl TaskType<V> + 'static) -> Self {
        TaskSpec::Type(Arc::new(task_type))
    }

    pub fn instance(name: impl Into<String>, task: impl Task<V> + 'static) -> Self {
        TaskSpec::Instance {
            name: name.into(),
            task: Arc::new(task),
        }
    }

    pub fn configured(task_type: impl TaskType<V> + 'static, params: Params) -> Self {
        TaskSpec::Configured {
            task_type: Arc::new(task_type),
            params,
        }
    }

    pub fn chain(name: impl Into<String>, pipeline: Pipeline<V>) -> Self {
        TaskSpec::Chain {
            name: name.into(),
            pipeline,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            TaskSpec::Type(t) => t.name(),
            TaskSpec::Instance { name, .. } => name,
            TaskSpec::Configured { task_type, .. } => task_type.name(),
            TaskSpec::Chain { name, .. } => name,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TaskSpec::Type(_) => "type",
            TaskSpec::Instance { .. } => "instance",
            TaskSpec::Configured { .. } => "configured",
            TaskSpec::Chain { .. } => "chain",
        }
    }
}

/// Position of a placeable unit in the resolved list.
///
/// This is the identity the cycle guard compares: a spec appears at most once
/// on any root-to-leaf path, whatever its instance identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpecId(pub usize);

enum UnitFactory<V> {
    Fresh(Arc<dyn TaskType<V>>),
    Configured(Arc<dyn TaskType<V>>, Params),
    Shared(Unit<V>),
}

/// A resolved specification, ready to be placed in the synthesis tree.
pub struct PlaceableUnit<V> {
    id: SpecId,
    name: String,
    input_types: TypeSet,
    output_types: TypeSet,
    factory: UnitFactory<V>,
}

impl<V> PlaceableUnit<V> {
    pub fn id(&self) -> SpecId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_types(&self) -> &TypeSet {
        &self.input_types
    }

    pub fn output_types(&self) -> &TypeSet {
        &self.output_types
    }

    /// True if every placement shares one identity.
    pub fn is_shared(&self) -> bool {
        matches!(self.factory, UnitFactory::Shared(_))
    }

    /// Produce the unit for one tree position.
    pub fn instantiate(&self) -> Result<Unit<V>> {
        let task = match &self.factory {
            UnitFactory::Shared(unit) => return Ok(unit.clone()),
            UnitFactory::Fresh(task_type) => task_type.instantiate(&Params::new()),
            UnitFactory::Configured(task_type, params) => task_type.instantiate(params),
        }
        .map_err(|e| {
            PipekitError::InvalidSpecification(format!(
                "task '{}' could not be instantiated: {e:#}",
                self.name
            ))
        })?;

        Ok(Unit::with_types(
            self.name.as_str(),
            task,
            self.input_types.clone(),
            self.output_types.clone(),
        ))
    }
}

impl<V> fmt::Debug for PlaceableUnit<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaceableUnit")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input_types", &self.input_types)
            .field("output_types", &self.output_types)
            .field("shared", &self.is_shared())
            .finish()
    }
}

/// Normalize a list of task specifications.
///
/// Fails with [`PipekitError::InvalidSpecification`] when:
/// - two specs share a name,
/// - a spec declares neither input nor output types,
/// - a chain is empty or its steps do not connect.
pub fn resolve<V: 'static>(specs: Vec<TaskSpec<V>>) -> Result<Vec<PlaceableUnit<V>>> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut units = Vec::with_capacity(specs.len());

    for (index, spec) in specs.into_iter().enumerate() {
        let name = spec.name().to_string();
        if !seen.insert(name.clone()) {
            return Err(PipekitError::InvalidSpecification(format!(
                "task '{name}' is specified more than once"
            )));
        }

        let kind = spec.kind();
        let (input_types, output_types, factory) = match spec {
            TaskSpec::Type(task_type) => (
                task_type.input_types(),
                task_type.output_types(),
                UnitFactory::Fresh(task_type),
            ),
            TaskSpec::Configured { task_type, params } => (
                task_type.input_types(),
                task_type.output_types(),
                UnitFactory::Configured(task_type, params),
            ),
            TaskSpec::Instance { name, task } => {
                let unit = Unit::new(name, task);
                (
                    unit.input_types().clone(),
                    unit.output_types().clone(),
                    UnitFactory::Shared(unit),
                )
            }
            TaskSpec::Chain { name, pipeline } => {
                if pipeline.is_empty() {
                    return Err(PipekitError::InvalidSpecification(format!(
                        "chain '{name}' has no steps"
                    )));
                }
                if !pipeline.is_connected() {
                    return Err(PipekitError::InvalidSpecification(format!(
                        "chain '{name}' has adjacent steps with no common type: {pipeline}"
                    )));
                }
                let task: Arc<dyn Task<V>> = Arc::new(pipeline);
                let unit = Unit::new(name, task);
                (
                    unit.input_types().clone(),
                    unit.output_types().clone(),
                    UnitFactory::Shared(unit),
                )
            }
        };

        if input_types.is_empty() && output_types.is_empty() {
            return Err(PipekitError::InvalidSpecification(format!(
                "task '{name}' declares neither input_types nor output_types"
            )));
        }
        if input_types.is_empty() || output_types.is_empty() {
            warn!(
                task = %name,
                %input_types,
                %output_types,
                "task declares an empty type set and can never be part of a chain"
            );
        }

        debug!(task = %name, kind, %input_types, %output_types, "resolved task specification");

        units.push(PlaceableUnit {
            id: SpecId(index),
            name,
            input_types,
            output_types,
            factory,
        });
    }

    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Identity {
        input: TypeSet,
        output: TypeSet,
    }

    impl Task<i64> for Identity {
        fn input_types(&self) -> TypeSet {
            self.input.clone()
        }

        fn output_types(&self) -> TypeSet {
            self.output.clone()
        }

        fn run(&self, input: i64) -> anyhow::Result<i64> {
            Ok(input)
        }
    }

    fn identity_type(name: &str, input: &[&str], output: &[&str]) -> FnTaskType<i64> {
        let task_input: TypeSet = input.iter().copied().collect();
        let task_output: TypeSet = output.iter().copied().collect();
        FnTaskType::new(
            name,
            input.iter().map(|s| s.to_string()),
            output.iter().map(|s| s.to_string()),
            move |_| {
                Ok(Arc::new(Identity {
                    input: task_input.clone(),
                    output: task_output.clone(),
                }) as Arc<dyn Task<i64>>)
            },
        )
    }

    #[test]
    fn type_form_yields_fresh_identity_per_placement() -> Result<()> {
        let units = resolve(vec![TaskSpec::of_type(identity_type("t", &["source"], &["sink"]))])?;
        let a = units[0].instantiate()?;
        let b = units[0].instantiate()?;
        assert_ne!(a.id(), b.id());
        assert!(!units[0].is_shared());
        Ok(())
    }

    #[test]
    fn instance_form_shares_identity() -> Result<()> {
        let task = Identity {
            input: ["source"].into_iter().collect(),
            output: ["sink"].into_iter().collect(),
        };
        let units = resolve(vec![TaskSpec::instance("shared", task)])?;
        let a = units[0].instantiate()?;
        let b = units[0].instantiate()?;
        assert_eq!(a.id(), b.id());
        assert!(units[0].is_shared());
        Ok(())
    }

    #[test]
    fn configured_form_passes_params_to_constructor() -> Result<()> {
        let task_type = FnTaskType::new("scaled", ["source"], ["sink"], |params: &Params| {
            let factor = params
                .get("factor")
                .and_then(|v| v.as_integer())
                .ok_or_else(|| anyhow::anyhow!("missing factor"))?;
            Ok(Arc::new(Identity {
                input: ["source"].into_iter().collect(),
                output: [format!("x{factor}"), "sink".to_string()].into_iter().collect(),
            }) as Arc<dyn Task<i64>>)
        });

        let mut params = Params::new();
        params.insert("factor".into(), toml::Value::Integer(3));
        let units = resolve(vec![TaskSpec::configured(task_type, params)])?;

        let a = units[0].instantiate()?;
        let b = units[0].instantiate()?;
        assert_ne!(a.id(), b.id());
        assert!(a.task().output_types().contains("x3"));
        Ok(())
    }

    #[test]
    fn failing_constructor_is_an_invalid_specification() -> Result<()> {
        let task_type = FnTaskType::new("broken", ["source"], ["sink"], |_: &Params| {
            Err(anyhow::anyhow!("no params"))
        });
        let units: Vec<PlaceableUnit<i64>> = resolve(vec![TaskSpec::of_type(task_type)])?;
        match units[0].instantiate() {
            Err(PipekitError::InvalidSpecification(msg)) => assert!(msg.contains("broken")),
            other => panic!("expected InvalidSpecification, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn chain_form_uses_first_input_and_last_output() -> Result<()> {
        let first = Unit::new(
            "first",
            Arc::new(Identity {
                input: ["source"].into_iter().collect(),
                output: ["mid"].into_iter().collect(),
            }) as Arc<dyn Task<i64>>,
        );
        let last = Unit::new(
            "last",
            Arc::new(Identity {
                input: ["mid"].into_iter().collect(),
                output: ["done"].into_iter().collect(),
            }) as Arc<dyn Task<i64>>,
        );

        let units = resolve(vec![TaskSpec::chain("both", Pipeline::new(vec![first, last]))])?;
        assert!(units[0].input_types().accepts_source());
        assert!(units[0].output_types().contains("done"));
        assert!(units[0].is_shared());
        Ok(())
    }

    #[test]
    fn rejects_empty_type_declarations() {
        let result = resolve(vec![TaskSpec::of_type(identity_type("empty", &[], &[]))]);
        assert!(matches!(result, Err(PipekitError::InvalidSpecification(_))));
    }

    #[test]
    fn rejects_empty_and_disconnected_chains() {
        let empty = resolve(vec![TaskSpec::<i64>::chain("empty", Pipeline::new(vec![]))]);
        assert!(matches!(empty, Err(PipekitError::InvalidSpecification(_))));

        let a = Unit::new(
            "a",
            Arc::new(Identity {
                input: ["source"].into_iter().collect(),
                output: ["x"].into_iter().collect(),
            }) as Arc<dyn Task<i64>>,
        );
        let b = Unit::new(
            "b",
            Arc::new(Identity {
                input: ["y"].into_iter().collect(),
                output: ["sink"].into_iter().collect(),
            }) as Arc<dyn Task<i64>>,
        );
        let broken = resolve(vec![TaskSpec::chain("broken", Pipeline::new(vec![a, b]))]);
        assert!(matches!(broken, Err(PipekitError::InvalidSpecification(_))));
    }

    #[test]
    fn rejects_duplicate_names() {
        let result = resolve(vec![
            TaskSpec::of_type(identity_type("dup", &["source"], &["sink"])),
            TaskSpec::of_type(identity_type("dup", &["source"], &["sink"])),
        ]);
        match result {
            Err(PipekitError::InvalidSpecification(msg)) => assert!(msg.contains("dup")),
            other => panic!("expected InvalidSpecification, got {other:?}"),
        }
    }
}
