// src/graph.rs

use petgraph::algo::is_cyclic_directed;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::spec::{PlaceableUnit, SpecId};

/// Precomputed type-compatibility relation between placeable units.
///
/// Edge direction: `a -> b` when some output type of `a` is an input type of
/// `b`, i.e. `b` may directly follow `a` in a chain. Self-loops are kept;
/// the tree synthesizer's path guard is what stops them from recursing.
#[derive(Debug, Clone)]
pub struct CompatibilityGraph {
    graph: DiGraphMap<SpecId, ()>,
    sources: Vec<SpecId>,
}

impl CompatibilityGraph {
    pub fn from_units<V>(units: &[PlaceableUnit<V>]) -> Self {
        let mut graph: DiGraphMap<SpecId, ()> = DiGraphMap::new();

        for unit in units {
            graph.add_node(unit.id());
        }

        for from in units {
            for to in units {
                if from.output_types().intersects(to.input_types()) {
                    graph.add_edge(from.id(), to.id(), ());
                }
            }
        }

        let sources: Vec<SpecId> = units
            .iter()
            .filter(|u| u.input_types().accepts_source())
            .map(|u| u.id())
            .collect();

        debug!(
            units = graph.node_count(),
            edges = graph.edge_count(),
            sources = sources.len(),
            "built type-compatibility graph"
        );

        Self { graph, sources }
    }

    /// Units that may start a chain, in supplied order.
    pub fn sources(&self) -> &[SpecId] {
        &self.sources
    }

    /// Units that may directly follow `id`, in supplied order.
    pub fn successors(&self, id: SpecId) -> Vec<SpecId> {
        let mut next: Vec<SpecId> = self.graph.neighbors(id).collect();
        next.sort();
        next
    }

    /// True if type declarations alone would allow unbounded chains.
    pub fn has_cycles(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }
}
