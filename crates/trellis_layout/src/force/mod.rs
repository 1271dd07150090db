// SPDX-License-Identifier: MIT OR Apache-2.0
//! Force-directed layout.
//!
//! By default the simulation runs on a background thread and positions
//! arrive through [`GraphLayout::poll`]. Starting a new run cancels the one
//! in flight, and messages from any other run are ignored.

pub mod columns;
pub mod simulation;
pub mod worker;

pub use columns::{EdgeColumns, EdgeUpdateTable, NodeColumns, NodeUpdateTable};
pub use simulation::{alpha_decay, ForceSettings, SimNode, Simulation, ALPHA_MIN, VELOCITY_DECAY};
pub use worker::{
    simulate, spawn_simulation, CancelToken, MessageKind, SimulationEdge, SimulationHandle,
    SimulationMessage, SimulationRequest, WorkerCommand,
};

use crate::error::{LayoutError, Result};
use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::LayoutLifecycle;
use crate::props::merge_props;
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use tokio::sync::mpsc::error::TryRecvError;
use trellis_graph::{EntityId, Graph};
use uuid::Uuid;

/// Alpha changes smaller than this do not warrant a new run
pub const ALPHA_RECOMPUTE_THRESHOLD: f64 = 0.05;

/// Where collision radii come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionRadius {
    /// Same radius for every node
    Fixed(f64),
    /// Numeric node property; nodes without it get no radius
    Property(String),
}

/// Options for [`ForceLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceLayoutOptions {
    /// Starting alpha for `start` and `update`
    pub alpha: f64,
    /// Starting alpha for `resume`
    pub resume_alpha: f64,
    /// Many-body strength; negative repels
    pub n_body_strength: f64,
    /// Distance below which many-body force is softened
    pub n_body_distance_min: f64,
    /// Distance beyond which many-body force is ignored
    pub n_body_distance_max: f64,
    /// Rest length of edge springs
    pub link_distance: f64,
    /// Collision avoidance, off when `None`
    pub collision_radius: Option<CollisionRadius>,
    /// Run on a background thread
    pub run_in_background: bool,
}

impl Default for ForceLayoutOptions {
    fn default() -> Self {
        let settings = ForceSettings::default();
        Self {
            alpha: settings.alpha,
            resume_alpha: 0.1,
            n_body_strength: settings.n_body_strength,
            n_body_distance_min: settings.distance_min,
            n_body_distance_max: settings.distance_max,
            link_distance: settings.link_distance,
            collision_radius: None,
            run_in_background: true,
        }
    }
}

impl ForceLayoutOptions {
    fn settings(&self, alpha: f64) -> ForceSettings {
        ForceSettings {
            alpha,
            n_body_strength: self.n_body_strength,
            distance_min: self.n_body_distance_min,
            distance_max: self.n_body_distance_max,
            link_distance: self.link_distance,
            collide: self.collision_radius.is_some(),
        }
    }

    fn radius_property(&self) -> Option<&str> {
        match &self.collision_radius {
            Some(CollisionRadius::Property(key)) => Some(key),
            _ => None,
        }
    }
}

/// Force-directed layout with an optional background worker
#[derive(Debug, Default)]
pub struct ForceLayout {
    options: ForceLayoutOptions,
    lifecycle: LayoutLifecycle,
    snapshot: GraphSnapshot,
    edge_index: HashMap<EntityId, usize>,
    positions: HashMap<EntityId, Point>,
    edges: HashMap<EntityId, EdgePosition>,
    locked: HashMap<EntityId, Point>,
    handle: Option<SimulationHandle>,
}

impl ForceLayout {
    /// Layout with the given options
    pub fn new(options: ForceLayoutOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options
    pub fn options(&self) -> &ForceLayoutOptions {
        &self.options
    }

    /// Id of the background run in flight
    pub fn current_run(&self) -> Option<Uuid> {
        self.handle.as_ref().map(SimulationHandle::run)
    }

    /// Graph structure the layout works on
    pub(crate) fn snapshot(&self) -> &GraphSnapshot {
        &self.snapshot
    }

    fn capture(&mut self, graph: &dyn Graph) {
        let properties: Vec<&str> = self.options.radius_property().into_iter().collect();
        self.snapshot = GraphSnapshot::capture(graph, &properties);
        self.edge_index = self
            .snapshot
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| (edge.id.clone(), i))
            .collect();
        let nodes = &self.snapshot.nodes;
        self.positions.retain(|id, _| nodes.contains_key(id));
        self.locked.retain(|id, _| nodes.contains_key(id));
        let edge_index = &self.edge_index;
        self.edges.retain(|id, _| edge_index.contains_key(id));
    }

    fn request(&self, alpha: f64) -> SimulationRequest {
        let nodes: Vec<SimNode> = self
            .snapshot
            .nodes
            .keys()
            .map(|id| {
                let mut node = SimNode::new(id.clone());
                if let Some(point) = self.positions.get(id) {
                    node = node.at(*point);
                }
                if let Some(point) = self.locked.get(id) {
                    node.pin(*point);
                }
                node
            })
            .collect();
        let radii = self.options.collision_radius.as_ref().map(|radius| {
            self.snapshot
                .nodes
                .values()
                .map(|node| match radius {
                    CollisionRadius::Fixed(value) => *value,
                    CollisionRadius::Property(key) => node.number(key).unwrap_or(0.0),
                })
                .collect()
        });
        SimulationRequest {
            nodes: NodeUpdateTable::from_nodes(&nodes),
            radii,
            edges: self
                .snapshot
                .edges
                .iter()
                .map(|edge| SimulationEdge {
                    id: edge.id.clone(),
                    source: edge.source.clone(),
                    target: edge.target.clone(),
                })
                .collect(),
            options: self.options.settings(alpha),
        }
    }

    fn launch(&mut self, alpha: f64) {
        self.cancel_run();
        let request = self.request(alpha);
        if self.options.run_in_background {
            self.lifecycle.notify_start(true);
            self.handle = Some(spawn_simulation(request));
            return;
        }

        self.lifecycle.notify_start(false);
        let mut messages = Vec::new();
        simulate(Uuid::nil(), request, &CancelToken::new(), Vec::new, |message| {
            if message.kind == MessageKind::End {
                messages.push(message);
            }
            true
        });
        for message in &messages {
            self.apply(message);
        }
        self.lifecycle.notify_done();
    }

    fn cancel_run(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.cancel();
            tracing::debug!(run = %handle.run(), "Cancelled force simulation");
        }
    }

    fn apply(&mut self, message: &SimulationMessage) {
        if let Some(nodes) = &message.nodes {
            for (id, point, _) in nodes.rows() {
                self.positions.insert(id.clone(), point);
            }
        }
        if let Some(edges) = &message.edges {
            for (id, source, target, bends) in edges.rows() {
                self.edges
                    .insert(id.clone(), EdgePosition::spline(source, target, bends.to_vec()));
            }
        }
    }
}

impl GraphLayout for ForceLayout {
    fn name(&self) -> &'static str {
        "force"
    }

    fn lifecycle(&self) -> &LayoutLifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut LayoutLifecycle {
        &mut self.lifecycle
    }

    fn props(&self) -> Value {
        serde_json::to_value(&self.options).unwrap_or(Value::Null)
    }

    fn set_props(&mut self, props: &Value) -> Result<bool> {
        let (options, changes) = merge_props(&self.options, props)?;
        self.options = options;
        Ok(changes.iter().any(|change| match change.key.as_str() {
            "alpha" | "resumeAlpha" => !matches!(
                change.numeric_delta(),
                Some(delta) if delta < ALPHA_RECOMPUTE_THRESHOLD
            ),
            _ => true,
        }))
    }

    fn initialize_graph(&mut self, graph: &dyn Graph) {
        self.capture(graph);
    }

    fn update_graph(&mut self, graph: &dyn Graph) {
        self.capture(graph);
    }

    fn start(&mut self) {
        self.launch(self.options.alpha);
    }

    fn update(&mut self) {
        self.launch(self.options.alpha);
    }

    fn resume(&mut self) {
        self.launch(self.options.resume_alpha);
    }

    fn stop(&mut self) {
        self.cancel_run();
        if self.lifecycle.state().is_running() {
            self.lifecycle.notify_done();
        }
    }

    fn poll(&mut self) -> bool {
        let Some(mut handle) = self.handle.take() else {
            return false;
        };
        let mut moved = false;
        loop {
            match handle.try_recv() {
                Ok(message) => {
                    if message.run != handle.run() {
                        continue;
                    }
                    self.apply(&message);
                    moved = true;
                    match message.kind {
                        MessageKind::Tick { .. } => self.lifecycle.notify_changed(),
                        MessageKind::End => {
                            self.lifecycle.notify_done();
                            return true;
                        }
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.lifecycle.notify_error(LayoutError::WorkerGone);
                    return moved;
                }
            }
        }
        self.handle = Some(handle);
        moved
    }

    fn node_position(&self, node: &EntityId) -> NodePosition {
        match self.locked.get(node).or_else(|| self.positions.get(node)) {
            Some(point) => NodePosition::Known(*point),
            None => NodePosition::Pending,
        }
    }

    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        let snapshot_edge = &self.snapshot.edges[*self.edge_index.get(edge)?];
        let pinned = self.locked.contains_key(&snapshot_edge.source)
            || self.locked.contains_key(&snapshot_edge.target);
        if !pinned {
            if let Some(position) = self.edges.get(edge) {
                return Some(position.clone());
            }
        }
        Some(EdgePosition::line(
            self.node_position(&snapshot_edge.source).point()?,
            self.node_position(&snapshot_edge.target).point()?,
        ))
    }

    fn lock_node_position(&mut self, node: &EntityId, point: Point) {
        self.locked.insert(node.clone(), point);
        if let Some(handle) = &self.handle {
            handle.send(WorkerCommand::Lock {
                id: node.clone(),
                point,
            });
        }
    }

    fn unlock_node_position(&mut self, node: &EntityId) {
        if let Some(point) = self.locked.remove(node) {
            self.positions.insert(node.clone(), point);
        }
        if let Some(handle) = &self.handle {
            handle.send(WorkerCommand::Unlock { id: node.clone() });
        }
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
    use crate::lifecycle::LayoutState;
    use serde_json::json;
    use trellis_graph::{Edge, Node, RowGraph};

    fn pair() -> RowGraph {
        RowGraph::from_parts(
            [Node::new("a"), Node::new("b")],
            [Edge::new("ab", "a", "b")],
        )
    }

    fn settle(layout: &mut ForceLayout) {
        while !layout.state().is_settled() {
            layout.poll();
            std::thread::yield_now();
        }
    }

    #[test]
    fn test_background_run_settles() {
        let mut layout = ForceLayout::default();
        layout.initialize_graph(&pair());
        layout.start();
        assert_eq!(layout.state(), LayoutState::Start);
        assert!(layout.current_run().is_some());

        settle(&mut layout);
        assert_eq!(layout.state(), LayoutState::Done);
        assert!(layout.current_run().is_none());
        assert!(layout.node_position(&"a".into()).is_known());
        let edge = layout.edge_position(&"ab".into()).unwrap();
        assert_eq!(Some(edge.source()), layout.node_position(&"a".into()).point());
    }

    #[test]
    fn test_foreground_run_and_preserved_positions() {
        let mut layout = ForceLayout::new(ForceLayoutOptions {
            run_in_background: false,
            ..ForceLayoutOptions::default()
        });
        let mut graph = pair();
        layout.initialize_graph(&graph);
        layout.start();
        assert_eq!(layout.state(), LayoutState::Done);
        let a = layout.node_position(&"a".into());
        assert!(a.is_known());

        graph.add_node(Node::new("c"));
        layout.update_graph(&graph);
        assert_eq!(layout.node_position(&"a".into()), a);
        assert_eq!(layout.node_position(&"c".into()), NodePosition::Pending);

        graph.remove_node(&"a".into());
        layout.update_graph(&graph);
        assert_eq!(layout.node_position(&"a".into()), NodePosition::Pending);
    }

    #[test]
    fn test_new_start_supersedes_old_run() {
        let mut layout = ForceLayout::default();
        layout.initialize_graph(&pair());
        layout.start();
        let first = layout.current_run();
        layout.start();
        let second = layout.current_run();
        assert_ne!(first, second);

        layout.stop();
        assert!(layout.current_run().is_none());
        assert_eq!(layout.state(), LayoutState::Done);
        assert!(!layout.poll());
    }

    #[test]
    fn test_locks_apply_at_once() {
        let mut layout = ForceLayout::default();
        layout.initialize_graph(&pair());
        layout.start();
        layout.lock_node_position(&"a".into(), [40.0, 40.0]);
        assert_eq!(layout.node_position(&"a".into()), NodePosition::Known([40.0, 40.0]));
        settle(&mut layout);
        assert_eq!(layout.node_position(&"a".into()), NodePosition::Known([40.0, 40.0]));
        assert_eq!(
            layout.edge_position(&"ab".into()).unwrap().source(),
            [40.0, 40.0]
        );

        layout.unlock_node_position(&"a".into());
        assert_eq!(layout.node_position(&"a".into()), NodePosition::Known([40.0, 40.0]));
    }

    #[test]
    fn test_small_alpha_changes_do_not_recompute() {
        let mut layout = ForceLayout::default();
        assert!(!layout.set_props(&json!({"alpha": 0.32})).unwrap());
        assert!(!layout.set_props(&json!({"alpha": 0.32})).unwrap());
        assert!(layout.set_props(&json!({"alpha": 0.5})).unwrap());
        assert!(!layout.set_props(&json!({"resumeAlpha": 0.12})).unwrap());
        assert!(layout.set_props(&json!({"linkDistance": 31})).unwrap());
        assert!(layout
            .set_props(&json!({"collisionRadius": {"fixed": 8.0}}))
            .unwrap());
        assert_eq!(
            layout.options().collision_radius,
            Some(CollisionRadius::Fixed(8.0))
        );
    }
}
