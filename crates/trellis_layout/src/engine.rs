// SPDX-License-Identifier: MIT OR Apache-2.0
//! Orchestration of one graph and one layout.
//!
//! The engine is the only place that feeds a graph into a layout. Rendering
//! code reads positions and the visible node/edge set through it, so chains
//! collapsed by a layout disappear without the reader knowing about them.

use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::{LayoutEvent, LayoutListenerId, LayoutState};
use crate::settings::LayoutSettings;
use serde_json::Value;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trellis_graph::{EdgeRef, EntityId, Graph, NodeRef};

/// An edge as it should be drawn, with endpoints remapped by the layout
#[derive(Debug, Clone)]
pub struct VisibleEdge {
    /// Underlying edge
    pub edge: EdgeRef,
    /// Drawn source node
    pub source: EntityId,
    /// Drawn target node
    pub target: EntityId,
}

/// Owns a [`Graph`] and the [`GraphLayout`] that positions it
#[derive(Debug)]
pub struct GraphEngine {
    graph: Box<dyn Graph>,
    layout: Box<dyn GraphLayout>,
    started: bool,
    synced_version: u64,
    listeners: Vec<LayoutListenerId>,
}

impl GraphEngine {
    /// Pair a graph with a layout. Nothing is computed until [`run`](Self::run).
    pub fn new(graph: Box<dyn Graph>, layout: Box<dyn GraphLayout>) -> Self {
        let synced_version = graph.version();
        Self {
            graph,
            layout,
            started: false,
            synced_version,
            listeners: Vec::new(),
        }
    }

    /// Pair a graph with the layout described by `settings`
    pub fn from_settings(graph: Box<dyn Graph>, settings: &LayoutSettings) -> Self {
        Self::new(graph, settings.build())
    }

    /// The graph being laid out
    pub fn graph(&self) -> &dyn Graph {
        self.graph.as_ref()
    }

    /// Concrete graph backend, for mutation. Call [`sync`](Self::sync)
    /// afterwards to relayout.
    pub fn graph_as_mut<G: Graph + 'static>(&mut self) -> Option<&mut G> {
        self.graph.as_any_mut().downcast_mut::<G>()
    }

    /// The active layout
    pub fn layout(&self) -> &dyn GraphLayout {
        self.layout.as_ref()
    }

    /// The active layout as a concrete type
    pub fn layout_as<L: GraphLayout + 'static>(&self) -> Option<&L> {
        self.layout.as_any().downcast_ref::<L>()
    }

    /// The active layout as a concrete type, mutably
    pub fn layout_as_mut<L: GraphLayout + 'static>(&mut self) -> Option<&mut L> {
        self.layout.as_any_mut().downcast_mut::<L>()
    }

    /// First-time initialization: seed the layout and start it
    pub fn run(&mut self) {
        tracing::debug!(
            layout = self.layout.name(),
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "Running layout"
        );
        self.synced_version = self.graph.version();
        self.layout.initialize_graph(self.graph.as_ref());
        self.started = true;
        self.layout.start();
    }

    /// Apply a props patch; returns whether the layout recomputed.
    ///
    /// A rejected patch moves the layout into the error state instead of
    /// returning the error.
    pub fn set_props(&mut self, props: &Value) -> bool {
        match self.layout.set_props(props) {
            Ok(true) => {
                if self.started {
                    self.layout.update_graph(self.graph.as_ref());
                    self.layout.update();
                }
                true
            }
            Ok(false) => false,
            Err(error) => {
                self.layout.lifecycle_mut().notify_error(error);
                false
            }
        }
    }

    /// Relayout if the graph changed since the layout last saw it
    pub fn sync(&mut self) -> bool {
        let version = self.graph.version();
        if !self.started || version == self.synced_version {
            return false;
        }
        tracing::debug!(from = self.synced_version, to = version, "Graph changed, updating layout");
        self.synced_version = version;
        self.layout.update_graph(self.graph.as_ref());
        self.layout.update();
        true
    }

    /// Replace the graph, returning the previous one
    pub fn set_graph(&mut self, graph: Box<dyn Graph>) -> Box<dyn Graph> {
        let previous = std::mem::replace(&mut self.graph, graph);
        self.synced_version = self.graph.version();
        if self.started {
            self.layout.update_graph(self.graph.as_ref());
            self.layout.update();
        }
        previous
    }

    /// Drain asynchronous layout results; returns whether anything arrived
    pub fn poll(&mut self) -> bool {
        self.layout.poll()
    }

    /// Poll until the layout settles. Returns immediately when nothing was
    /// started.
    pub fn block_until_settled(&mut self, poll_interval: Duration) -> LayoutState {
        loop {
            self.poll();
            let state = self.layout.state();
            if state.is_settled() || state == LayoutState::Init {
                return state;
            }
            thread::sleep(poll_interval);
        }
    }

    /// Nodes the layout wants drawn
    pub fn visible_nodes(&self) -> Vec<NodeRef> {
        self.graph
            .get_nodes()
            .iter()
            .filter(|node| !self.layout.should_skip_node(&node.id()))
            .cloned()
            .collect()
    }

    /// Edges the layout wants drawn, with remapped endpoints. Edges folded
    /// into a self-loop by the remapping are dropped.
    pub fn visible_edges(&self) -> Vec<VisibleEdge> {
        self.graph
            .get_edges()
            .iter()
            .filter_map(|edge| {
                let original_source = self.node_id_of(edge.source_id());
                let original_target = self.node_id_of(edge.target_id());
                let source = self.layout.map_node_id(&original_source);
                let target = self.layout.map_node_id(&original_target);
                let folded = source == target && original_source != original_target;
                if folded
                    || self.layout.should_skip_node(&source)
                    || self.layout.should_skip_node(&target)
                {
                    return None;
                }
                Some(VisibleEdge {
                    edge: Arc::clone(edge),
                    source,
                    target,
                })
            })
            .collect()
    }

    /// The id a graph node goes by, for an id that may be spelled as its
    /// numeric or string twin
    fn node_id_of(&self, id: EntityId) -> EntityId {
        match self.graph.find_node(&id) {
            Some(node) => node.id(),
            None => id,
        }
    }

    /// Position of a node
    pub fn node_position(&self, node: &EntityId) -> NodePosition {
        self.layout.node_position(node)
    }

    /// Geometry of an edge
    pub fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        self.layout.edge_position(edge)
    }

    /// Pin a node
    pub fn lock_node_position(&mut self, node: &EntityId, point: Point) {
        self.layout.lock_node_position(node, point);
    }

    /// Release a pinned node
    pub fn unlock_node_position(&mut self, node: &EntityId) {
        self.layout.unlock_node_position(node);
    }

    /// Current layout state
    pub fn layout_state(&self) -> LayoutState {
        self.layout.state()
    }

    /// Layout transition counter
    pub fn layout_version(&self) -> u64 {
        self.layout.version()
    }

    /// Message of the last layout failure, if the layout is in error
    pub fn layout_error(&self) -> Option<&str> {
        self.layout.lifecycle().last_error()
    }

    /// Subscribe to layout events. Removed again by [`clear`](Self::clear).
    pub fn on_layout_event(
        &mut self,
        listener: impl Fn(&LayoutEvent) + Send + Sync + 'static,
    ) -> LayoutListenerId {
        let id = self.layout.lifecycle_mut().add_listener(Arc::new(listener));
        self.listeners.push(id);
        id
    }

    /// Stop the layout and drop every listener registered through the engine
    pub fn clear(&mut self) {
        self.layout.stop();
        let lifecycle = self.layout.lifecycle_mut();
        for id in self.listeners.drain(..) {
            lifecycle.remove_listener(id);
        }
    }
}

impl Drop for GraphEngine {
    fn drop(&mut self) {
        self.layout.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::{DagLayout, DagLayoutOptions};
    use crate::force::{ForceLayout, ForceLayoutOptions};
    use crate::snapshot::tests::directed_graph;
    use parking_lot::Mutex;
    use serde_json::json;
    use trellis_graph::{ColumnTable, ColumnarGraph, Edge, Node, RowGraph};

    fn broken_chain() -> RowGraph {
        directed_graph(
            &["A", "B", "C", "D", "E", "F"],
            &[
                ("ab", "A", "B"),
                ("bc", "B", "C"),
                ("cd", "C", "D"),
                ("de", "D", "E"),
                ("df", "D", "F"),
            ],
        )
    }

    fn dag_engine(graph: RowGraph, collapse: bool) -> GraphEngine {
        let settings = LayoutSettings::Dag(DagLayoutOptions {
            collapse_linear_chains: collapse,
            ..DagLayoutOptions::default()
        });
        let mut engine = GraphEngine::from_settings(Box::new(graph), &settings);
        engine.run();
        engine
    }

    fn ids(nodes: &[NodeRef]) -> Vec<String> {
        nodes.iter().map(|node| node.id().to_string()).collect()
    }

    #[test]
    fn test_collapsed_chains_are_invisible() {
        let mut engine = dag_engine(broken_chain(), true);
        assert_eq!(engine.layout_state(), LayoutState::Done);
        assert_eq!(ids(&engine.visible_nodes()), ["A", "D", "E", "F"]);

        let edges = engine.visible_edges();
        let drawn: Vec<(String, String, String)> = edges
            .iter()
            .map(|visible| {
                (
                    visible.edge.id().to_string(),
                    visible.source.to_string(),
                    visible.target.to_string(),
                )
            })
            .collect();
        assert_eq!(drawn.len(), 3);
        assert!(drawn.contains(&("cd".into(), "A".into(), "D".into())));

        let chain = engine
            .layout_as::<DagLayout>()
            .map(|dag| dag.collapsed_chains()[0].clone())
            .unwrap();
        assert!(engine.layout_as_mut::<DagLayout>().unwrap().toggle_collapsed_chain(&chain));
        assert_eq!(engine.visible_nodes().len(), 6);
        assert_eq!(engine.visible_edges().len(), 5);
        assert!(engine.layout_as::<ForceLayout>().is_none());
    }

    #[test]
    fn test_props_decide_recompute() {
        let mut engine = dag_engine(broken_chain(), false);
        let version = engine.layout_version();

        assert!(!engine.set_props(&json!({"orientation": "topToBottom"})));
        assert_eq!(engine.layout_version(), version);

        assert!(engine.set_props(&json!({"orientation": "leftToRight"})));
        assert!(engine.layout_version() > version);
        assert_eq!(engine.layout_state(), LayoutState::Done);

        let before = engine.node_position(&"A".into());
        assert!(!engine.set_props(&json!({"layering": "spiral"})));
        assert_eq!(engine.layout_state(), LayoutState::Error);
        assert!(engine.layout_error().is_some());
        assert_eq!(engine.node_position(&"A".into()), before);
    }

    #[test]
    fn test_sync_follows_graph_version() {
        let mut engine = dag_engine(directed_graph(&["a", "b"], &[("ab", "a", "b")]), false);
        assert!(!engine.sync());

        let graph = engine.graph_as_mut::<RowGraph>().unwrap();
        graph.add_node(Node::new("c"));
        graph.add_edge(Edge::new("bc", "b", "c").with_directed(true));
        assert!(engine.sync());
        assert!(!engine.sync());
        assert!(engine.node_position(&"c".into()).is_known());
        assert!(engine.edge_position(&"bc".into()).is_some());
    }

    #[test]
    fn test_set_graph_relayouts() {
        let mut engine = dag_engine(directed_graph(&["a", "b"], &[("ab", "a", "b")]), false);
        let previous = engine.set_graph(Box::new(broken_chain()));
        assert_eq!(previous.node_count(), 2);
        assert_eq!(engine.graph().node_count(), 6);
        assert!(engine.node_position(&"F".into()).is_known());
        assert_eq!(engine.node_position(&"a".into()), NodePosition::Pending);
    }

    #[test]
    fn test_listeners_are_cleared() {
        let graph = directed_graph(&["a", "b"], &[("ab", "a", "b")]);
        let mut engine = GraphEngine::new(Box::new(graph), Box::new(DagLayout::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.on_layout_event(move |event| sink.lock().push(format!("{:?}", event)));

        engine.run();
        assert_eq!(*seen.lock(), ["Start", "Done"]);

        engine.clear();
        assert_eq!(engine.layout().lifecycle().listener_count(), 0);
        engine.set_props(&json!({"nodeSize": 12}));
        assert_eq!(seen.lock().len(), 2);
    }

    #[test]
    fn test_background_force_settles() {
        let graph = RowGraph::from_parts(
            [Node::new("a"), Node::new("b"), Node::new("c")],
            [Edge::new("ab", "a", "b"), Edge::new("bc", "b", "c")],
        );
        let mut engine = GraphEngine::new(
            Box::new(graph),
            Box::new(ForceLayout::new(ForceLayoutOptions::default())),
        );
        assert_eq!(
            engine.block_until_settled(Duration::from_millis(1)),
            LayoutState::Init
        );

        engine.run();
        let state = engine.block_until_settled(Duration::from_millis(1));
        assert_eq!(state, LayoutState::Done);
        let a = engine.node_position(&"a".into()).point().unwrap();
        let edge = engine.edge_position(&"ab".into()).unwrap();
        assert_eq!(edge.source(), a);
    }

    #[test]
    fn test_locks_pass_through() {
        let mut engine = dag_engine(directed_graph(&["a", "b"], &[("ab", "a", "b")]), false);
        engine.lock_node_position(&"a".into(), [7.0, 8.0]);
        assert_eq!(engine.node_position(&"a".into()), NodePosition::Known([7.0, 8.0]));
        engine.unlock_node_position(&"a".into());
        assert_ne!(engine.node_position(&"a".into()), NodePosition::Known([7.0, 8.0]));
    }

    #[test]
    fn test_string_endpoints_on_integer_nodes() {
        let nodes = ColumnTable::builder()
            .column("id", vec![1i64, 2])
            .build()
            .unwrap();
        let edges = ColumnTable::builder()
            .column("id", vec!["e"])
            .column("sourceId", vec!["1"])
            .column("targetId", vec!["2"])
            .column("directed", vec![true])
            .build()
            .unwrap();
        let graph = ColumnarGraph::from_tables(nodes, edges, 1).unwrap();
        let mut engine = GraphEngine::from_settings(Box::new(graph), &LayoutSettings::default());
        engine.run();

        let edges = engine.visible_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, EntityId::from(1));
        assert_eq!(edges[0].target, EntityId::from(2));
        let start = engine.node_position(&EntityId::from(1)).point().unwrap();
        let end = engine.node_position(&EntityId::from(2)).point().unwrap();
        assert_ne!(start, end);
        assert_eq!(engine.edge_position(&"e".into()).unwrap().source(), start);
    }
}
