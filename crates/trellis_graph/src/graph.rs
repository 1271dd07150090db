// SPDX-License-Identifier: MIT OR Apache-2.0
//! The backend-agnostic graph interface.

use crate::entity::{EdgeRef, NodeRef};
use crate::events::{GraphListener, ListenerId};
use crate::id::EntityId;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Physical storage behind a [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphKind {
    /// Individual node and edge objects in hash maps
    Row,
    /// Handles over pluggable per-field accessors
    Tabular,
    /// Handles over an immutable columnar table with override layers
    Columnar,
}

/// A versioned container of nodes and edges.
///
/// `version` grows with every structural mutation. `get_nodes`/`get_edges`
/// return the same `Arc` until the version moves.
pub trait Graph: Send + Sync + fmt::Debug {
    /// Storage backend
    fn kind(&self) -> GraphKind;

    /// Current version
    fn version(&self) -> u64;

    /// All nodes, cached per version
    fn get_nodes(&self) -> Arc<[NodeRef]>;

    /// All edges, cached per version
    fn get_edges(&self) -> Arc<[EdgeRef]>;

    /// Node by id
    fn find_node(&self, id: &EntityId) -> Option<NodeRef>;

    /// Edge by id
    fn find_edge(&self, id: &EntityId) -> Option<EdgeRef>;

    /// Number of nodes
    fn node_count(&self) -> usize {
        self.get_nodes().len()
    }

    /// Number of edges
    fn edge_count(&self) -> usize {
        self.get_edges().len()
    }

    /// Edges attached to a node; empty when the node is unknown
    fn connected_edges(&self, node_id: &EntityId) -> Vec<EdgeRef> {
        self.find_node(node_id)
            .map(|node| {
                node.connected_edge_ids()
                    .iter()
                    .filter_map(|edge_id| self.find_edge(edge_id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Subscribe to change notifications
    fn add_listener(&self, listener: GraphListener) -> ListenerId;

    /// Unsubscribe
    fn remove_listener(&self, id: ListenerId) -> bool;

    /// Release backend resources; the graph is empty afterwards
    fn destroy(&mut self);

    /// Downcast support for consumers that need a specific backend
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
