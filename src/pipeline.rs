// src/pipeline.rs

use std::fmt;

use crate::task::{RunConfig, Task, TypeSet, Unit};

/// An ordered chain of units, one root-to-sink path of the synthesis tree.
///
/// A pipeline is also a [`Task`] in its own right, so a pre-built chain can be
/// placed in another tree as a single composite step. Its effective input
/// types are those of its first unit and its output types those of its last.
pub struct Pipeline<V> {
    units: Vec<Unit<V>>,
}

impl<V> Pipeline<V> {
    pub fn new(units: Vec<Unit<V>>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[Unit<V>] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    /// True if every adjacent pair shares at least one type tag.
    pub fn is_connected(&self) -> bool {
        self.units.windows(2).all(|pair| pair[0].feeds(&pair[1]))
    }

    /// True if the chain is connected, starts at a source and ends at a sink.
    pub fn is_complete(&self) -> bool {
        match (self.units.first(), self.units.last()) {
            (Some(first), Some(last)) => {
                first.input_types().accepts_source()
                    && last.output_types().produces_sink()
                    && self.is_connected()
            }
            _ => false,
        }
    }

    /// Run every unit in order, without caching.
    pub fn run(&self, mut input: V) -> anyhow::Result<V> {
        for unit in &self.units {
            input = unit.run(input)?;
        }
        Ok(input)
    }
}

impl<V> Clone for Pipeline<V> {
    fn clone(&self) -> Self {
        Self {
            units: self.units.clone(),
        }
    }
}

impl<V> Task<V> for Pipeline<V> {
    fn input_types(&self) -> TypeSet {
        self.units
            .first()
            .map(|u| u.input_types().clone())
            .unwrap_or_default()
    }

    fn output_types(&self) -> TypeSet {
        self.units
            .last()
            .map(|u| u.output_types().clone())
            .unwrap_or_default()
    }

    fn run(&self, input: V) -> anyhow::Result<V> {
        Pipeline::run(self, input)
    }

    fn run_with_config(&self, mut input: V, config: &RunConfig) -> anyhow::Result<V> {
        for unit in &self.units {
            input = unit.run_with_config(input, config)?;
        }
        Ok(input)
    }
}

impl<V> fmt::Display for Pipeline<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" -> "))
    }
}

impl<V> fmt::Debug for Pipeline<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.names())
            .finish()
    }
}
