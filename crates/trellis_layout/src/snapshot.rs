// SPDX-License-Identifier: MIT OR Apache-2.0
//! Owned copy of the graph structure a layout works on.

use indexmap::IndexMap;
use serde_json::Value;
use trellis_graph::{EntityId, Graph};

/// Node as seen by a layout
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    /// Node id
    pub id: EntityId,
    /// Captured property values, keyed by property name
    pub properties: IndexMap<String, Value>,
}

impl SnapshotNode {
    /// Captured property as a number
    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }
}

/// Edge as seen by a layout
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEdge {
    /// Edge id
    pub id: EntityId,
    /// Source node id
    pub source: EntityId,
    /// Target node id
    pub target: EntityId,
    /// Directed flag
    pub directed: bool,
}

/// Nodes and edges copied out of a [`Graph`].
///
/// Edge endpoints are resolved through [`Graph::find_node`], so they name
/// nodes by the node's own id. Edges whose endpoints are not in the node set
/// are left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    /// Nodes in graph order, keyed by id
    pub nodes: IndexMap<EntityId, SnapshotNode>,
    /// Edges in graph order
    pub edges: Vec<SnapshotEdge>,
    /// Graph version the snapshot was taken at
    pub version: u64,
}

impl GraphSnapshot {
    /// Copy structure plus the listed node properties
    pub fn capture(graph: &dyn Graph, properties: &[&str]) -> Self {
        let nodes: IndexMap<EntityId, SnapshotNode> = graph
            .get_nodes()
            .iter()
            .map(|node| {
                let captured = properties
                    .iter()
                    .filter_map(|key| {
                        node.property_value(key)
                            .map(|value| ((*key).to_string(), value))
                    })
                    .collect();
                (
                    node.id(),
                    SnapshotNode {
                        id: node.id(),
                        properties: captured,
                    },
                )
            })
            .collect();
        let resolve = |id: EntityId| -> Option<EntityId> {
            if nodes.contains_key(&id) {
                return Some(id);
            }
            graph
                .find_node(&id)
                .map(|node| node.id())
                .filter(|found| nodes.contains_key(found))
        };
        let edges = graph
            .get_edges()
            .iter()
            .filter_map(|edge| {
                Some(SnapshotEdge {
                    id: edge.id(),
                    source: resolve(edge.source_id())?,
                    target: resolve(edge.target_id())?,
                    directed: edge.is_directed(),
                })
            })
            .collect();
        Self {
            nodes,
            edges,
            version: graph.version(),
        }
    }

    /// Number of edges touching each node (self-loops count once)
    pub fn degrees(&self) -> IndexMap<EntityId, usize> {
        let mut degrees: IndexMap<EntityId, usize> =
            self.nodes.keys().map(|id| (id.clone(), 0)).collect();
        for edge in &self.edges {
            if let Some(degree) = degrees.get_mut(&edge.source) {
                *degree += 1;
            }
            if edge.source != edge.target {
                if let Some(degree) = degrees.get_mut(&edge.target) {
                    *degree += 1;
                }
            }
        }
        degrees
    }
}
