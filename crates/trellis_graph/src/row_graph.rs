// SPDX-License-Identifier: MIT OR Apache-2.0
//! Row-oriented graph: nodes and edges as individual objects.
//!
//! Edges are registered on both endpoint nodes so connectivity lookups never
//! scan the edge map.

use crate::cache::{Cache, VersionCounter};
use crate::edge::Edge;
use crate::entity::{EdgeInterface, EdgeLink, EdgeRef, Incidence, NodeInterface, NodeRef};
use crate::events::{GraphEvent, GraphEvents, GraphListener, ListenerId};
use crate::graph::{Graph, GraphKind};
use crate::id::EntityId;
use crate::node::Node;
use indexmap::IndexMap;
use std::any::Any;
use std::sync::Arc;

/// Graph that owns its nodes and edges as objects in hash maps
#[derive(Debug)]
pub struct RowGraph {
    nodes: IndexMap<EntityId, Arc<Node>>,
    edges: IndexMap<EntityId, Arc<Edge>>,
    version: Arc<VersionCounter>,
    node_list: Cache<(), Arc<[NodeRef]>>,
    edge_list: Cache<(), Arc<[EdgeRef]>>,
    events: GraphEvents,
}

impl RowGraph {
    /// Create an empty graph at version 0
    pub fn new() -> Self {
        Self::with_version(0)
    }

    /// Create an empty graph starting at `version`
    pub fn with_version(version: u64) -> Self {
        Self {
            nodes: IndexMap::new(),
            edges: IndexMap::new(),
            version: Arc::new(VersionCounter::new(version)),
            node_list: Cache::new(),
            edge_list: Cache::new(),
            events: GraphEvents::new(),
        }
    }

    /// Build a graph from node and edge lists; edges with missing endpoints
    /// are dropped
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        edges: impl IntoIterator<Item = Edge>,
    ) -> Self {
        let mut graph = Self::new();
        graph.batch_add_nodes(nodes);
        graph.batch_add_edges(edges);
        graph
    }

    /// Add a node.
    ///
    /// An id that is already present has its record replaced while keeping
    /// its edges.
    pub fn add_node(&mut self, node: Node) -> Arc<Node> {
        let id = node.id();
        if let Some(existing) = self.nodes.get(&id) {
            tracing::debug!("Node {} already present, replacing its record", id);
            let existing = Arc::clone(existing);
            existing.replace_record(&node);
            self.touch(GraphEvent::NodeUpdated(id));
            return existing;
        }

        let node = Arc::new(node);
        node.attach(Arc::clone(&self.version));
        self.nodes.insert(id.clone(), Arc::clone(&node));
        self.touch(GraphEvent::NodeAdded(id));
        node
    }

    /// Add many nodes; returns how many were added or replaced
    pub fn batch_add_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) -> usize {
        nodes.into_iter().map(|node| self.add_node(node)).count()
    }

    /// Add an edge.
    ///
    /// The edge is dropped with a warning when either endpoint is missing.
    /// An edge id that is already present replaces the old edge.
    pub fn add_edge(&mut self, edge: Edge) -> Option<Arc<Edge>> {
        let source_id = edge.source_id();
        let target_id = edge.target_id();
        let (Some(source), Some(target)) = (
            self.nodes.get(&source_id).cloned(),
            self.nodes.get(&target_id).cloned(),
        ) else {
            tracing::warn!(
                "Dropping edge {}: endpoint {} or {} not found",
                edge.id(),
                source_id,
                target_id
            );
            return None;
        };

        let id = edge.id();
        if self.edges.contains_key(&id) {
            self.remove_edge(&id);
        }

        let edge = Arc::new(edge);
        if edge.is_self_loop() {
            source.add_link(EdgeLink {
                edge_id: id.clone(),
                other_id: source_id.clone(),
                incidence: Incidence::SelfLoop,
            });
            edge.attach(Arc::clone(&self.version), vec![Arc::downgrade(&source)]);
        } else {
            source.add_link(EdgeLink {
                edge_id: id.clone(),
                other_id: target_id.clone(),
                incidence: Incidence::Outgoing,
            });
            target.add_link(EdgeLink {
                edge_id: id.clone(),
                other_id: source_id,
                incidence: Incidence::Incoming,
            });
            edge.attach(
                Arc::clone(&self.version),
                vec![Arc::downgrade(&source), Arc::downgrade(&target)],
            );
        }
        self.edges.insert(id.clone(), Arc::clone(&edge));
        self.touch(GraphEvent::EdgeAdded(id));
        Some(edge)
    }

    /// Add many edges; edges with missing endpoints are skipped and the rest
    /// still land. Returns how many were added.
    pub fn batch_add_edges(&mut self, edges: impl IntoIterator<Item = Edge>) -> usize {
        edges
            .into_iter()
            .filter_map(|edge| self.add_edge(edge))
            .count()
    }

    /// Remove a node and every edge touching it
    pub fn remove_node(&mut self, id: &EntityId) -> Option<Arc<Node>> {
        let node = Arc::clone(self.nodes.get(id)?);
        // Edges go first so none of them outlives its endpoint.
        for edge_id in node.connected_edge_ids() {
            self.remove_edge(&edge_id);
        }
        self.nodes.shift_remove(id);
        node.detach();
        self.touch(GraphEvent::NodeRemoved(id.clone()));
        Some(node)
    }

    /// Remove an edge and unregister it from its endpoints
    pub fn remove_edge(&mut self, id: &EntityId) -> Option<Arc<Edge>> {
        let edge = self.edges.shift_remove(id)?;
        for node_id in [edge.source_id(), edge.target_id()] {
            if let Some(node) = self.nodes.get(&node_id) {
                node.remove_link(id);
            }
        }
        edge.detach();
        self.touch(GraphEvent::EdgeRemoved(id.clone()));
        Some(edge)
    }

    /// Replace the record of an existing node, keeping its edges.
    /// Returns `false` when the node is unknown.
    pub fn update_node(&mut self, node: Node) -> bool {
        let id = node.id();
        let Some(existing) = self.nodes.get(&id) else {
            return false;
        };
        existing.replace_record(&node);
        self.touch(GraphEvent::NodeUpdated(id));
        true
    }

    /// Replace an existing edge. Returns `false` when the edge is unknown or
    /// the new endpoints do not resolve, leaving the old edge in place.
    pub fn update_edge(&mut self, edge: Edge) -> bool {
        let id = edge.id();
        if !self.edges.contains_key(&id) {
            return false;
        }
        if !self.nodes.contains_key(&edge.source_id()) || !self.nodes.contains_key(&edge.target_id())
        {
            tracing::warn!("Ignoring update of edge {}: endpoint not found", id);
            return false;
        }
        self.transaction(|graph| {
            graph.remove_edge(&id);
            graph.add_edge(edge);
            graph.touch(GraphEvent::EdgeUpdated(id));
        });
        true
    }

    /// Concrete node by id
    pub fn node(&self, id: &EntityId) -> Option<&Arc<Node>> {
        self.nodes.get(id)
    }

    /// Concrete edge by id
    pub fn edge(&self, id: &EntityId) -> Option<&Arc<Edge>> {
        self.edges.get(id)
    }

    /// Concrete nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Node>> {
        self.nodes.values()
    }

    /// Concrete edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Arc<Edge>> {
        self.edges.values()
    }

    /// Run `apply` between transaction start/end notifications.
    ///
    /// This only brackets events so listeners can defer work; nothing is
    /// rolled back if `apply` leaves the graph half-updated.
    pub fn transaction<R>(&mut self, apply: impl FnOnce(&mut Self) -> R) -> R {
        self.events.emit(&GraphEvent::TransactionStart);
        let result = apply(self);
        self.events.emit(&GraphEvent::TransactionEnd);
        result
    }

    fn touch(&self, event: GraphEvent) {
        self.version.bump();
        self.events.emit(&event);
    }
}

impl Default for RowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph for RowGraph {
    fn kind(&self) -> GraphKind {
        GraphKind::Row
    }

    fn version(&self) -> u64 {
        self.version.current()
    }

    fn get_nodes(&self) -> Arc<[NodeRef]> {
        self.node_list.get_or_update(
            (),
            || {
                self.nodes
                    .values()
                    .map(|node| Arc::clone(node) as NodeRef)
                    .collect()
            },
            self.version(),
        )
    }

    fn get_edges(&self) -> Arc<[EdgeRef]> {
        self.edge_list.get_or_update(
            (),
            || {
                self.edges
                    .values()
                    .map(|edge| Arc::clone(edge) as EdgeRef)
                    .collect()
            },
            self.version(),
        )
    }

    fn find_node(&self, id: &EntityId) -> Option<NodeRef> {
        self.nodes.get(id).map(|node| Arc::clone(node) as NodeRef)
    }

    fn find_edge(&self, id: &EntityId) -> Option<EdgeRef> {
        self.edges.get(id).map(|edge| Arc::clone(edge) as EdgeRef)
    }

    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn add_listener(&self, listener: GraphListener) -> ListenerId {
        self.events.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    fn destroy(&mut self) {
        for edge in self.edges.values() {
            edge.detach();
        }
        for node in self.nodes.values() {
            node.detach();
        }
        self.edges.clear();
        self.nodes.clear();
        self.node_list.clear();
        self.edge_list.clear();
        self.version.bump();
        self.events.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::InteractionState;
    use parking_lot::Mutex;
    use serde_json::json;

    fn sample() -> RowGraph {
        RowGraph::from_parts(
            [Node::new("a"), Node::new("b"), Node::new("c")],
            [
                Edge::new("ab", "a", "b").with_directed(true),
                Edge::new("bc", "b", "c").with_directed(true),
            ],
        )
    }

    #[test]
    fn test_add_edge_registers_on_endpoints() {
        let mut graph = sample();
        graph.add_node(Node::new("n"));
        graph.add_edge(Edge::new("na", "n", "a"));

        let n = graph.find_node(&EntityId::from("n")).unwrap();
        assert_eq!(n.connected_edge_ids(), vec![EntityId::from("na")]);
        let a = graph.find_node(&EntityId::from("a")).unwrap();
        assert_eq!(a.degree(), 2);
        assert_eq!(a.in_degree(), 1);

        graph.remove_node(&EntityId::from("n"));
        assert!(graph.find_edge(&EntityId::from("na")).is_none());
        assert!(graph
            .get_edges()
            .iter()
            .all(|edge| edge.id() != EntityId::from("na")));
        assert_eq!(a.degree(), 1);
    }

    #[test]
    fn test_missing_endpoint_drops_only_that_edge() {
        let mut graph = RowGraph::new();
        graph.batch_add_nodes([Node::new(1), Node::new(2)]);
        let added = graph.batch_add_edges([
            Edge::new(10, 1, 2),
            Edge::new(11, 1, 99),
            Edge::new(12, 2, 1),
        ]);
        assert_eq!(added, 2);
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.find_edge(&EntityId::from(11)).is_none());
    }

    #[test]
    fn test_version_bumps_per_mutation() {
        let mut graph = RowGraph::new();
        let mut last = graph.version();
        graph.add_node(Node::new("a"));
        assert!(graph.version() > last);
        last = graph.version();
        graph.add_node(Node::new("b"));
        assert!(graph.version() > last);
        last = graph.version();
        graph.add_edge(Edge::new("ab", "a", "b"));
        assert!(graph.version() > last);
        last = graph.version();
        graph.update_node(Node::new("a").with_property("label", "A"));
        assert!(graph.version() > last);
        last = graph.version();
        graph.remove_edge(&EntityId::from("ab"));
        assert!(graph.version() > last);
    }

    #[test]
    fn test_lists_are_reference_stable() {
        let mut graph = sample();
        let first = graph.get_nodes();
        let second = graph.get_nodes();
        assert!(Arc::ptr_eq(&first, &second));
        let edges = graph.get_edges();
        assert!(Arc::ptr_eq(&edges, &graph.get_edges()));

        graph.add_node(Node::new("d"));
        let third = graph.get_nodes();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.len(), 4);
    }

    #[test]
    fn test_handle_mutation_bumps_version() {
        let graph = sample();
        let before = graph.version();
        let node = graph.find_node(&EntityId::from("a")).unwrap();
        node.set_state(InteractionState::Selected);
        assert_eq!(graph.version(), before + 1);
        node.set_data_property("label", json!("A"));
        assert_eq!(graph.version(), before + 2);
        let edge = graph.find_edge(&EntityId::from("ab")).unwrap();
        edge.set_state(InteractionState::Hover);
        assert_eq!(graph.version(), before + 3);
    }

    #[test]
    fn test_removed_node_no_longer_bumps() {
        let mut graph = sample();
        let node = graph.remove_node(&EntityId::from("c")).unwrap();
        let before = graph.version();
        node.set_state(InteractionState::Hover);
        assert_eq!(graph.version(), before);
    }

    #[test]
    fn test_update_keeps_connectivity() {
        let mut graph = sample();
        assert!(graph.update_node(Node::new("b").with_property("weight", 4)));
        let b = graph.find_node(&EntityId::from("b")).unwrap();
        assert_eq!(b.property_value("weight"), Some(json!(4)));
        assert_eq!(b.degree(), 2);
        assert!(!graph.update_node(Node::new("zz")));
    }

    #[test]
    fn test_update_edge_rewires() {
        let mut graph = sample();
        assert!(graph.update_edge(Edge::new("ab", "a", "c")));
        let b = graph.find_node(&EntityId::from("b")).unwrap();
        let c = graph.find_node(&EntityId::from("c")).unwrap();
        assert_eq!(b.connected_edge_ids(), vec![EntityId::from("bc")]);
        assert_eq!(c.degree(), 2);
        assert!(!graph.update_edge(Edge::new("ab", "a", "missing")));
    }

    #[test]
    fn test_duplicate_node_keeps_edges() {
        let mut graph = sample();
        graph.add_node(Node::new("b").with_property("label", "B"));
        assert_eq!(graph.node_count(), 3);
        let b = graph.find_node(&EntityId::from("b")).unwrap();
        assert_eq!(b.degree(), 2);
        assert_eq!(b.property_value("label"), Some(json!("B")));
    }

    #[test]
    fn test_self_loop_counts_once() {
        let mut graph = RowGraph::new();
        graph.add_node(Node::new("a"));
        graph.add_edge(Edge::new("aa", "a", "a"));
        let a = graph.find_node(&EntityId::from("a")).unwrap();
        assert_eq!(a.degree(), 1);
        assert_eq!(a.in_degree(), 1);
        assert_eq!(a.out_degree(), 1);
        graph.remove_node(&EntityId::from("a"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_transaction_brackets_events() {
        let mut graph = RowGraph::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        graph.add_listener(Arc::new(move |event: &GraphEvent| sink.lock().push(event.clone())));

        graph.transaction(|graph| {
            graph.add_node(Node::new("a"));
            graph.add_node(Node::new("b"));
        });

        assert_eq!(
            *seen.lock(),
            vec![
                GraphEvent::TransactionStart,
                GraphEvent::NodeAdded(EntityId::from("a")),
                GraphEvent::NodeAdded(EntityId::from("b")),
                GraphEvent::TransactionEnd,
            ]
        );
    }

    #[test]
    fn test_destroy_releases_everything() {
        let mut graph = sample();
        let a = graph.node(&EntityId::from("a")).cloned().unwrap();
        graph.destroy();
        assert_eq!(graph.node_count(), 0);
        assert!(graph.get_edges().is_empty());
        assert!(!a.is_registered());
    }
}
