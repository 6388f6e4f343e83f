// src/tree.rs

//! Tree synthesis and pipeline enumeration.
//!
//! [`build_tree`] expands every source unit breadth-first, attaching each
//! type-compatible successor that is not already on the current path. Nodes
//! live in an arena and link to their parent, so the path guard walks parent
//! links instead of carrying copied histories around.
//!
//! [`Tree::pipelines`] then walks the arena depth-first and yields one
//! [`Pipeline`] per complete chain: a node whose unit produces `"sink"` and
//! below which no longer chain reaches a sink. Subtrees that never reach a
//! sink are skipped.

use std::collections::VecDeque;
use std::fmt::Write as _;

use tracing::{debug, info};

use crate::errors::{PipekitError, Result};
use crate::graph::CompatibilityGraph;
use crate::pipeline::Pipeline;
use crate::spec::{PlaceableUnit, SpecId};
use crate::task::Unit;

/// Index of a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// One placement of a unit in a chain-in-progress.
pub struct TreeNode<V> {
    /// `None` only for the synthetic root.
    unit: Option<Unit<V>>,
    spec: Option<SpecId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    depth: usize,
}

impl<V> TreeNode<V> {
    pub fn unit(&self) -> Option<&Unit<V>> {
        self.unit.as_ref()
    }

    pub fn spec(&self) -> Option<SpecId> {
        self.spec
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Number of units from the root down to and including this node.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_root(&self) -> bool {
        self.unit.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// True if a chain may end here.
    pub fn is_sink(&self) -> bool {
        self.unit
            .as_ref()
            .is_some_and(|u| u.output_types().produces_sink())
    }

    /// A leaf that cannot end a chain.
    pub fn is_dead_end(&self) -> bool {
        !self.is_root() && self.is_leaf() && !self.is_sink()
    }
}

/// Arena-backed synthesis tree. Node 0 is the synthetic root.
pub struct Tree<V> {
    nodes: Vec<TreeNode<V>>,
    /// Per node: some sink lies at or below it.
    viable: Vec<bool>,
    max_depth: Option<usize>,
}

impl<V> Tree<V> {
    fn with_root(max_depth: Option<usize>) -> Self {
        Self {
            nodes: vec![TreeNode {
                unit: None,
                spec: None,
                parent: None,
                children: Vec::new(),
                depth: 0,
            }],
            viable: Vec::new(),
            max_depth,
        }
    }

    fn attach(&mut self, parent: NodeId, spec: SpecId, unit: Unit<V>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let depth = self.nodes[parent.0].depth + 1;
        self.nodes.push(TreeNode {
            unit: Some(unit),
            spec: Some(spec),
            parent: Some(parent),
            children: Vec::new(),
            depth,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &TreeNode<V> {
        &self.nodes[id.0]
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// True if some chain through `id` can still end at a sink.
    pub fn reaches_sink(&self, id: NodeId) -> bool {
        self.viable.get(id.0).copied().unwrap_or(false)
    }

    /// True if a pipeline ends at `id`: the node is a sink and no descendant
    /// sink extends it.
    pub fn ends_pipeline(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.0];
        node.is_sink() && !node.children.iter().any(|&c| self.reaches_sink(c))
    }

    /// Children are always attached after their parent, so one reverse pass
    /// sees every child before its parent.
    fn mark_viable(&mut self) {
        let mut viable = vec![false; self.nodes.len()];
        for (index, node) in self.nodes.iter().enumerate().rev() {
            viable[index] = node.is_sink() || node.children.iter().any(|c| viable[c.0]);
        }
        self.viable = viable;
    }

    /// True if `spec` already occupies `id` or one of its ancestors.
    fn on_path(&self, id: NodeId, spec: SpecId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if node.spec == Some(spec) {
                return true;
            }
            cursor = node.parent;
        }
        false
    }

    /// Units from the first placement below the root down to `id`.
    pub fn path(&self, id: NodeId) -> Vec<&Unit<V>> {
        let mut units = Vec::with_capacity(self.nodes[id.0].depth);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = &self.nodes[current.0];
            if let Some(unit) = &node.unit {
                units.push(unit);
            }
            cursor = node.parent;
        }
        units.reverse();
        units
    }

    /// Number of dead-end leaves.
    pub fn dead_ends(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_dead_end()).count()
    }

    /// Lazily enumerate every pipeline in the tree.
    ///
    /// The iterator borrows the tree, so calling this again restarts the
    /// enumeration from the root.
    pub fn pipelines(&self) -> Pipelines<'_, V> {
        Pipelines {
            tree: self,
            stack: vec![self.root()],
        }
    }

    /// Indented text rendering, one node per line.
    pub fn render(&self) -> String {
        let mut out = String::from("root\n");
        let mut stack: Vec<NodeId> = self.nodes[0].children.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id.0];
            let name = node.unit.as_ref().map(|u| u.name()).unwrap_or("?");
            let marker = if node.is_sink() {
                " [sink]"
            } else if node.is_dead_end() {
                " (dead end)"
            } else {
                ""
            };
            let _ = writeln!(out, "{}{name}{marker}", "  ".repeat(node.depth));
            stack.extend(node.children.iter().rev().copied());
        }

        out
    }
}

/// Build the synthesis tree for `units`.
///
/// `max_depth` bounds the number of units on any path; `None` means
/// unbounded (the path guard alone keeps the tree finite).
pub fn build_tree<V>(units: &[PlaceableUnit<V>], max_depth: Option<usize>) -> Result<Tree<V>> {
    let graph = CompatibilityGraph::from_units(units);
    if graph.sources().is_empty() {
        return Err(PipekitError::NoSourceUnits);
    }
    if graph.has_cycles() {
        debug!("type declarations contain cycles; relying on the path guard");
    }

    let mut tree = Tree::with_root(max_depth);
    let within_depth = |depth: usize| max_depth.is_none_or(|max| depth <= max);

    let mut frontier: VecDeque<NodeId> = VecDeque::new();
    if within_depth(1) {
        for &spec in graph.sources() {
            let unit = units[spec.0].instantiate()?;
            let id = tree.attach(tree.root(), spec, unit);
            frontier.push_back(id);
        }
    }

    while let Some(id) = frontier.pop_front() {
        let (spec, depth) = {
            let node = tree.node(id);
            (node.spec, node.depth)
        };
        let Some(spec) = spec else { continue };

        if !within_depth(depth + 1) {
            debug!(node = id.0, depth, "reached max depth; not expanding");
            continue;
        }

        for next in graph.successors(spec) {
            if tree.on_path(id, next) {
                continue;
            }
            let unit = units[next.0].instantiate()?;
            let child = tree.attach(id, next, unit);
            frontier.push_back(child);
        }

        if tree.node(id).is_dead_end() {
            debug!(
                node = id.0,
                task = tree.node(id).unit().map(|u| u.name()).unwrap_or_default(),
                "dead end: no sink and no compatible successor"
            );
        }
    }

    tree.mark_viable();

    info!(
        nodes = tree.len(),
        dead_ends = tree.dead_ends(),
        max_depth = ?max_depth,
        "synthesized task tree"
    );

    Ok(tree)
}

/// Iterator over the pipelines of a [`Tree`], in depth-first order.
pub struct Pipelines<'a, V> {
    tree: &'a Tree<V>,
    stack: Vec<NodeId>,
}

impl<V> Iterator for Pipelines<'_, V> {
    type Item = Pipeline<V>;

    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.tree;
        while let Some(id) = self.stack.pop() {
            let node = tree.node(id);
            let viable = node.children.iter().rev().copied().filter(|&c| tree.reaches_sink(c));
            self.stack.extend(viable);

            if tree.ends_pipeline(id) {
                let units = tree.path(id).into_iter().cloned().collect();
                return Some(Pipeline::new(units));
            }
        }
        None
    }
}

/// Enumerate every pipeline of `tree`.
pub fn enumerate<V>(tree: &Tree<V>) -> Pipelines<'_, V> {
    tree.pipelines()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::spec::{TaskSpec, resolve};
    use crate::task::{Task, TypeSet};

    struct Declared {
        input: TypeSet,
        output: TypeSet,
    }

    impl Task<u32> for Declared {
        fn input_types(&self) -> TypeSet {
            self.input.clone()
        }

        fn output_types(&self) -> TypeSet {
            self.output.clone()
        }

        fn run(&self, input: u32) -> anyhow::Result<u32> {
            Ok(input + 1)
        }
    }

    fn spec(name: &str, input: &[&str], output: &[&str]) -> TaskSpec<u32> {
        TaskSpec::Instance {
            name: name.to_string(),
            task: Arc::new(Declared {
                input: input.iter().copied().collect(),
                output: output.iter().copied().collect(),
            }),
        }
    }

    fn names(pipelines: &[Pipeline<u32>]) -> Vec<Vec<String>> {
        pipelines
            .iter()
            .map(|p| p.names().into_iter().map(String::from).collect())
            .collect()
    }

    #[test]
    fn no_source_is_an_error() -> Result<()> {
        let units = resolve(vec![spec("t", &["a"], &["sink"])])?;
        assert!(matches!(build_tree(&units, None), Err(PipekitError::NoSourceUnits)));
        Ok(())
    }

    #[test]
    fn unreachable_sink_yields_empty_enumeration() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a"]),
            spec("save", &["b"], &["sink"]),
        ])?;
        let tree = build_tree(&units, None)?;

        assert!(!tree.is_empty());
        assert_eq!(tree.dead_ends(), 1);
        assert_eq!(tree.pipelines().count(), 0);
        Ok(())
    }

    #[test]
    fn extended_sink_nodes_only_end_the_longer_chain() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a", "sink"]),
            spec("more", &["a"], &["sink"]),
        ])?;
        let tree = build_tree(&units, None)?;
        let pipelines: Vec<_> = tree.pipelines().collect();

        assert_eq!(names(&pipelines), vec![vec!["load".to_string(), "more".into()]]);
        Ok(())
    }

    #[test]
    fn sink_with_only_dead_end_children_ends_a_chain() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a", "sink"]),
            spec("stray", &["a"], &["zzz"]),
        ])?;
        let tree = build_tree(&units, None)?;

        assert_eq!(tree.dead_ends(), 1);
        assert!(tree.ends_pipeline(tree.node(tree.root()).children()[0]));
        let pipelines: Vec<_> = tree.pipelines().collect();
        assert_eq!(names(&pipelines), vec![vec!["load".to_string()]]);
        Ok(())
    }

    #[test]
    fn max_depth_cut_turns_an_extended_sink_into_a_chain_end() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a", "sink"]),
            spec("more", &["a"], &["sink"]),
        ])?;
        let pipelines: Vec<_> = build_tree(&units, Some(1))?.pipelines().collect();
        assert_eq!(names(&pipelines), vec![vec!["load".to_string()]]);
        Ok(())
    }

    #[test]
    fn max_depth_limits_path_length() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a"]),
            spec("step", &["a"], &["b"]),
            spec("save", &["a", "b"], &["sink"]),
        ])?;

        let unbounded: Vec<_> = build_tree(&units, None)?.pipelines().collect();
        assert_eq!(unbounded.len(), 2);

        let shallow: Vec<_> = build_tree(&units, Some(2))?.pipelines().collect();
        assert_eq!(names(&shallow), vec![vec!["load".to_string(), "save".into()]]);

        assert_eq!(build_tree(&units, Some(1))?.pipelines().count(), 0);
        assert!(build_tree(&units, Some(0))?.is_empty());
        Ok(())
    }

    #[test]
    fn self_compatible_unit_appears_once_per_path() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a"]),
            spec("loop", &["a"], &["a", "sink"]),
        ])?;
        let tree = build_tree(&units, None)?;
        let pipelines: Vec<_> = tree.pipelines().collect();
        assert_eq!(names(&pipelines), vec![vec!["load".to_string(), "loop".into()]]);
        Ok(())
    }

    #[test]
    fn enumeration_is_restartable() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a"]),
            spec("save", &["a"], &["sink"]),
        ])?;
        let tree = build_tree(&units, None)?;

        let first: Vec<_> = enumerate(&tree).collect();
        let second: Vec<_> = enumerate(&tree).collect();
        assert_eq!(names(&first), names(&second));
        assert_eq!(first.len(), 1);
        Ok(())
    }

    #[test]
    fn render_marks_sinks_and_dead_ends() -> Result<()> {
        let units = resolve(vec![
            spec("load", &["source"], &["a"]),
            spec("save", &["a"], &["sink"]),
            spec("stray", &["a"], &["zzz"]),
        ])?;
        let rendered = build_tree(&units, None)?.render();
        assert_eq!(
            rendered,
            "root\n  load\n    save [sink]\n    stray (dead end)\n"
        );
        Ok(())
    }
}
