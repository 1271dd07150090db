// SPDX-License-Identifier: MIT OR Apache-2.0
//! Force layout that fans out parallel edges.

use crate::error::Result;
use crate::force::{ForceLayout, ForceLayoutOptions};
use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::LayoutLifecycle;
use crate::props::merge_props;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use trellis_graph::{EntityId, Graph};

/// Options for [`MultiEdgeForceLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MultiEdgeForceOptions {
    /// Force options; the simulation always runs in the foreground
    #[serde(flatten)]
    pub force: ForceLayoutOptions,
    /// Distance between neighboring parallel edges at their midpoint
    pub multi_edge_spacing: f64,
}

impl Default for MultiEdgeForceOptions {
    fn default() -> Self {
        Self {
            force: ForceLayoutOptions {
                run_in_background: false,
                ..ForceLayoutOptions::default()
            },
            multi_edge_spacing: 20.0,
        }
    }
}

/// Place of an edge within its bundle
#[derive(Debug, Clone, Copy, PartialEq)]
struct Lane {
    /// Signed offset in units of spacing
    offset: f64,
    /// Whether the edge runs against the bundle's canonical direction
    reversed: bool,
}

/// Synchronous force layout where edges sharing an unordered node pair are
/// drawn as separate curves
#[derive(Debug)]
pub struct MultiEdgeForceLayout {
    options: MultiEdgeForceOptions,
    force: ForceLayout,
    lanes: HashMap<EntityId, Lane>,
}

impl Default for MultiEdgeForceLayout {
    fn default() -> Self {
        Self::new(MultiEdgeForceOptions::default())
    }
}

impl MultiEdgeForceLayout {
    /// Layout with the given options
    pub fn new(mut options: MultiEdgeForceOptions) -> Self {
        options.force.run_in_background = false;
        Self {
            force: ForceLayout::new(options.force.clone()),
            options,
            lanes: HashMap::new(),
        }
    }

    /// Current options
    pub fn options(&self) -> &MultiEdgeForceOptions {
        &self.options
    }

    fn assign_lanes(&mut self) {
        let mut bundles: HashMap<(EntityId, EntityId), Vec<(EntityId, bool)>> = HashMap::new();
        for edge in &self.force.snapshot().edges {
            let reversed = edge.source > edge.target;
            let key = if reversed {
                (edge.target.clone(), edge.source.clone())
            } else {
                (edge.source.clone(), edge.target.clone())
            };
            bundles.entry(key).or_default().push((edge.id.clone(), reversed));
        }
        self.lanes.clear();
        for members in bundles.into_values() {
            let middle = (members.len() as f64 - 1.0) / 2.0;
            for (i, (id, reversed)) in members.into_iter().enumerate() {
                let lane = Lane {
                    offset: i as f64 - middle,
                    reversed,
                };
                self.lanes.insert(id, lane);
            }
        }
    }
}

impl GraphLayout for MultiEdgeForceLayout {
    fn name(&self) -> &'static str {
        "multi-edge-force"
    }

    fn lifecycle(&self) -> &LayoutLifecycle {
        self.force.lifecycle()
    }

    fn lifecycle_mut(&mut self) -> &mut LayoutLifecycle {
        self.force.lifecycle_mut()
    }

    fn props(&self) -> Value {
        serde_json::to_value(&self.options).unwrap_or(Value::Null)
    }

    fn set_props(&mut self, props: &Value) -> Result<bool> {
        let (mut options, changes) = merge_props(&self.options, props)?;
        options.force.run_in_background = false;
        let force_patch = serde_json::to_value(&options.force)?;
        let force_recompute = self.force.set_props(&force_patch)?;
        let spacing_changed = changes
            .iter()
            .any(|change| change.key == "multiEdgeSpacing");
        self.options = options;
        Ok(force_recompute || spacing_changed)
    }

    fn initialize_graph(&mut self, graph: &dyn Graph) {
        self.force.initialize_graph(graph);
        self.assign_lanes();
    }

    fn update_graph(&mut self, graph: &dyn Graph) {
        self.force.update_graph(graph);
        self.assign_lanes();
    }

    fn start(&mut self) {
        self.force.start();
    }

    fn update(&mut self) {
        self.force.update();
    }

    fn resume(&mut self) {
        self.force.resume();
    }

    fn stop(&mut self) {
        self.force.stop();
    }

    fn poll(&mut self) -> bool {
        self.force.poll()
    }

    fn node_position(&self, node: &EntityId) -> NodePosition {
        self.force.node_position(node)
    }

    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        let straight = self.force.edge_position(edge)?;
        let Some(lane) = self.lanes.get(edge) else {
            return Some(straight);
        };
        let (start, end) = (straight.source(), straight.target());
        let (mut dx, mut dy) = (end[0] - start[0], end[1] - start[1]);
        if lane.reversed {
            dx = -dx;
            dy = -dy;
        }
        let length = (dx * dx + dy * dy).sqrt();
        if lane.offset == 0.0 || length == 0.0 {
            return Some(EdgePosition::line(start, end));
        }
        let shift = lane.offset * self.options.multi_edge_spacing / length;
        let control = [
            (start[0] + end[0]) / 2.0 - dy * shift,
            (start[1] + end[1]) / 2.0 + dx * shift,
        ];
        Some(EdgePosition::spline(start, end, vec![control]))
    }

    fn lock_node_position(&mut self, node: &EntityId, point: Point) {
        self.force.lock_node_position(node, point);
    }

    fn unlock_node_position(&mut self, node: &EntityId) {
        self.force.unlock_node_position(node);
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
            [Node::new("a"), Node::new("b"), Node::new("c")],
            [
                Edge::new("ab1", "a", "b"),
                Edge::new("ab2", "a", "b"),
                Edge::new("ba", "b", "a"),
                Edge::new("bc", "b", "c"),
            ],
        )
    }

    fn laid_out() -> MultiEdgeForceLayout {
        let mut layout = MultiEdgeForceLayout::default();
        layout.initialize_graph(&graph());
        layout.start();
        layout
    }

    #[test]
    fn test_runs_synchronously() {
        let layout = laid_out();
        assert_eq!(layout.state(), LayoutState::Done);
        assert!(layout.node_position(&"c".into()).is_known());
    }

    #[test]
    fn test_parallel_edges_fan_out() {
        let layout = laid_out();
        let single = layout.edge_position(&"bc".into()).unwrap();
        assert!(!single.is_spline());

        let middle = layout.edge_position(&"ab2".into()).unwrap();
        assert!(!middle.is_spline());
        let first = layout.edge_position(&"ab1".into()).unwrap();
        let third = layout.edge_position(&"ba".into()).unwrap();
        assert!(first.is_spline() && third.is_spline());

        let mid = |edge: &EdgePosition| {
            let (s, t) = (edge.source(), edge.target());
            [(s[0] + t[0]) / 2.0, (s[1] + t[1]) / 2.0]
        };
        let (p, q) = (first.control_points()[0], third.control_points()[0]);
        let centre = mid(&first);
        let spread = ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2)).sqrt();
        assert!((spread - 40.0).abs() < 1e-6);
        assert!(((p[0] + q[0]) / 2.0 - centre[0]).abs() < 1e-6);
    }

    #[test]
    fn test_props_stay_foreground() {
        let mut layout = MultiEdgeForceLayout::default();
        assert!(!layout.set_props(&json!({"multiEdgeSpacing": 20})).unwrap());
        assert!(layout.set_props(&json!({"multiEdgeSpacing": 30})).unwrap());
        assert!(layout.set_props(&json!({"linkDistance": 50})).unwrap());
        assert!(!layout.set_props(&json!({"runInBackground": true})).unwrap());
        assert!(!layout.options().force.run_in_background);
    }
}
