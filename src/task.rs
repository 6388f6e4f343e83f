// src/task.rs

//! The task collaborator interface and the unit model built on top of it.
//!
//! A [`Task`] only has to declare which symbolic types it accepts and
//! produces, and how to turn one value into another. Everything else
//! (placement, identity, caching) is handled by the rest of the crate through
//! [`Unit`], which pairs a task with a stable [`UnitId`].

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Tag accepted by units that may start a chain.
pub const SOURCE: &str = "source";

/// Tag produced by units that may end a chain.
pub const SINK: &str = "sink";

/// Per-run settings handed to every task of a batch.
///
/// Empty unless the caller supplies one; part of every cache key.
pub type RunConfig = toml::Table;

/// A set of symbolic type tags.
///
/// Backed by a `BTreeSet` so iteration and rendering are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSet(BTreeSet<String>);

impl TypeSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    /// True if the two sets share at least one tag.
    pub fn intersects(&self, other: &TypeSet) -> bool {
        // Iterate the smaller side.
        let (small, large) = if self.0.len() <= other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        small.iter().any(|tag| large.contains(tag))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn accepts_source(&self) -> bool {
        self.contains(SOURCE)
    }

    pub fn produces_sink(&self) -> bool {
        self.contains(SINK)
    }
}

impl<S: Into<String>> FromIterator<S> for TypeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, tag) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{tag}")?;
        }
        write!(f, "}}")
    }
}

/// A processing step.
///
/// Implementations own their logic entirely; the crate only reads the
/// declared type sets and calls `run`. Tasks that need mutable state must
/// use interior mutability, since a shared instance can sit at several tree
/// positions at once.
pub trait Task<V>: Send + Sync {
    /// Tags this task accepts as input.
    fn input_types(&self) -> TypeSet;

    /// Tags this task produces.
    fn output_types(&self) -> TypeSet;

    /// Transform one value into the next.
    fn run(&self, input: V) -> anyhow::Result<V>;

    /// Like [`run`](Self::run), with the batch's run configuration.
    ///
    /// Tasks that ignore run configuration need not override this.
    fn run_with_config(&self, input: V, config: &RunConfig) -> anyhow::Result<V> {
        let _ = config;
        self.run(input)
    }
}

static NEXT_UNIT_ID: AtomicU64 = AtomicU64::new(1);

/// Cache identity of a placed unit.
///
/// Two units share an id only if they were cloned from the same [`Unit`];
/// every call to [`Unit::new`] / [`Unit::with_types`] allocates a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(u64);

impl UnitId {
    fn next() -> Self {
        UnitId(NEXT_UNIT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named task instance with an identity.
///
/// Cloning a `Unit` keeps its identity, which is how shared instances end up
/// with shared cache entries.
pub struct Unit<V> {
    id: UnitId,
    name: Arc<str>,
    task: Arc<dyn Task<V>>,
    input_types: TypeSet,
    output_types: TypeSet,
}

impl<V> Unit<V> {
    /// Wrap a task, taking the type sets it declares.
    pub fn new(name: impl Into<Arc<str>>, task: Arc<dyn Task<V>>) -> Self {
        let input_types = task.input_types();
        let output_types = task.output_types();
        Self::with_types(name, task, input_types, output_types)
    }

    /// Wrap a task with explicitly given type sets.
    pub fn with_types(
        name: impl Into<Arc<str>>,
        task: Arc<dyn Task<V>>,
        input_types: TypeSet,
        output_types: TypeSet,
    ) -> Self {
        Self {
            id: UnitId::next(),
            name: name.into(),
            task,
            input_types,
            output_types,
        }
    }

    pub fn id(&self) -> UnitId {
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

    pub fn task(&self) -> &Arc<dyn Task<V>> {
        &self.task
    }

    /// True if `next` can directly follow this unit in a chain.
    pub fn feeds(&self, next: &Unit<V>) -> bool {
        self.output_types.intersects(&next.input_types)
    }

    pub fn run(&self, input: V) -> anyhow::Result<V> {
        self.task.run(input)
    }

    pub fn run_with_config(&self, input: V, config: &RunConfig) -> anyhow::Result<V> {
        if config.is_empty() {
            return self.task.run(input);
        }
        self.task.run_with_config(input, config)
    }
}

impl<V> Clone for Unit<V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            name: Arc::clone(&self.name),
            task: Arc::clone(&self.task),
            input_types: self.input_types.clone(),
            output_types: self.output_types.clone(),
        }
    }
}

impl<V> fmt::Debug for Unit<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input_types", &self.input_types)
            .field("output_types", &self.output_types)
            .finish()
    }
}
