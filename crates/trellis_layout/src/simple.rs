// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pass-through layout reading coordinates from node properties.

use crate::error::Result;
use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::LayoutLifecycle;
use crate::props::{any_change, merge_props};
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use trellis_graph::{EntityId, Graph};

/// Options for [`SimpleLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimpleLayoutOptions {
    /// Property holding the x coordinate
    pub x_property: String,
    /// Property holding the y coordinate
    pub y_property: String,
}

impl Default for SimpleLayoutOptions {
    fn default() -> Self {
        Self {
            x_property: "x".into(),
            y_property: "y".into(),
        }
    }
}

/// Places nodes where their properties say; edges are straight lines
#[derive(Debug, Default)]
pub struct SimpleLayout {
    options: SimpleLayoutOptions,
    lifecycle: LayoutLifecycle,
    snapshot: GraphSnapshot,
    positions: HashMap<EntityId, Point>,
    locked: HashMap<EntityId, Point>,
}

impl SimpleLayout {
    /// Layout with the given options
    pub fn new(options: SimpleLayoutOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options
    pub fn options(&self) -> &SimpleLayoutOptions {
        &self.options
    }

    fn capture(&mut self, graph: &dyn Graph) {
        self.snapshot = GraphSnapshot::capture(
            graph,
            &[
                self.options.x_property.as_str(),
                self.options.y_property.as_str(),
            ],
        );
    }

    fn compute(&mut self) {
        self.lifecycle.notify_start(false);
        let (x_key, y_key) = (&self.options.x_property, &self.options.y_property);
        self.positions = self
            .snapshot
            .nodes
            .values()
            .filter_map(|node| Some((node.id.clone(), [node.number(x_key)?, node.number(y_key)?])))
            .collect();
        self.lifecycle.notify_done();
    }
}

impl GraphLayout for SimpleLayout {
    fn name(&self) -> &'static str {
        "simple"
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
        Ok(any_change(&changes))
    }

    fn initialize_graph(&mut self, graph: &dyn Graph) {
        self.capture(graph);
    }

    fn update_graph(&mut self, graph: &dyn Graph) {
        self.capture(graph);
    }

    fn start(&mut self) {
        self.compute();
    }

    fn update(&mut self) {
        self.compute();
    }

    fn stop(&mut self) {}

    fn node_position(&self, node: &EntityId) -> NodePosition {
        if let Some(point) = self.locked.get(node) {
            return NodePosition::Known(*point);
        }
        match self.positions.get(node) {
            Some(point) => NodePosition::Known(*point),
            None => NodePosition::Pending,
        }
    }

    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        let edge = self.snapshot.edges.iter().find(|candidate| &candidate.id == edge)?;
        Some(EdgePosition::line(
            self.node_position(&edge.source).point()?,
            self.node_position(&edge.target).point()?,
        ))
    }

    fn lock_node_position(&mut self, node: &EntityId, point: Point) {
        self.locked.insert(node.clone(), point);
    }

    fn unlock_node_position(&mut self, node: &EntityId) {
        self.locked.remove(node);
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

    fn graph() -> RowGraph {
        RowGraph::from_parts(
            [
                Node::new("a").with_property("x", 1.0).with_property("y", 2.0),
                Node::new("b").with_property("x", 5).with_property("y", -1),
                Node::new("c"),
            ],
            [Edge::new("ab", "a", "b"), Edge::new("ac", "a", "c")],
        )
    }

    #[test]
    fn test_reads_properties() {
        let mut layout = SimpleLayout::default();
        layout.initialize_graph(&graph());
        layout.start();
        assert_eq!(layout.state(), LayoutState::Done);
        assert_eq!(layout.node_position(&"a".into()), NodePosition::Known([1.0, 2.0]));
        assert_eq!(layout.node_position(&"b".into()), NodePosition::Known([5.0, -1.0]));
        assert_eq!(layout.node_position(&"c".into()), NodePosition::Pending);
        assert_eq!(
            layout.edge_position(&"ab".into()),
            Some(EdgePosition::line([1.0, 2.0], [5.0, -1.0]))
        );
        assert_eq!(layout.edge_position(&"ac".into()), None);
    }

    #[test]
    fn test_lock_overrides() {
        let mut layout = SimpleLayout::default();
        layout.initialize_graph(&graph());
        layout.start();
        layout.lock_node_position(&"c".into(), [0.0, 0.0]);
        assert!(layout.edge_position(&"ac".into()).is_some());
        layout.unlock_node_position(&"c".into());
        assert_eq!(layout.node_position(&"c".into()), NodePosition::Pending);
    }

    #[test]
    fn test_set_props() {
        let mut layout = SimpleLayout::default();
        assert!(!layout.set_props(&json!({"xProperty": "x"})).unwrap());
        assert!(layout.set_props(&json!({"xProperty": "left"})).unwrap());
        assert_eq!(layout.options().x_property, "left");
    }
}
