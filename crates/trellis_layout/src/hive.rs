// SPDX-License-Identifier: MIT OR Apache-2.0
//! Hive plot: nodes on radial axes grouped by a property.

use crate::error::Result;
use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::LayoutLifecycle;
use crate::props::{any_change, merge_props};
use crate::snapshot::GraphSnapshot;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, TAU};
use trellis_graph::{EntityId, Graph};

/// Options for [`HivePlotLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HivePlotOptions {
    /// Property whose value picks a node's axis
    pub axis_property: String,
    /// Radius of the first slot on each axis
    pub inner_radius: f64,
    /// Radius of the last slot on each axis
    pub outer_radius: f64,
}

impl Default for HivePlotOptions {
    fn default() -> Self {
        Self {
            axis_property: "group".into(),
            inner_radius: 50.0,
            outer_radius: 300.0,
        }
    }
}

/// Polar placement of a node
#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    angle: f64,
    radius: f64,
}

impl Slot {
    fn point(self) -> Point {
        [self.radius * self.angle.cos(), self.radius * self.angle.sin()]
    }
}

/// Radial layout with one axis per distinct property value.
///
/// Axes are spaced evenly in order of first appearance. Along an axis,
/// nodes are sorted by degree, lowest innermost.
#[derive(Debug, Default)]
pub struct HivePlotLayout {
    options: HivePlotOptions,
    lifecycle: LayoutLifecycle,
    snapshot: GraphSnapshot,
    edge_index: HashMap<EntityId, usize>,
    slots: HashMap<EntityId, Slot>,
    axes: Vec<String>,
    locked: HashMap<EntityId, Point>,
}

impl HivePlotLayout {
    /// Layout with the given options
    pub fn new(options: HivePlotOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options
    pub fn options(&self) -> &HivePlotOptions {
        &self.options
    }

    /// Axis labels, in angular order
    pub fn axes(&self) -> &[String] {
        &self.axes
    }

    fn capture(&mut self, graph: &dyn Graph) {
        self.snapshot = GraphSnapshot::capture(graph, &[self.options.axis_property.as_str()]);
        self.edge_index = self
            .snapshot
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| (edge.id.clone(), i))
            .collect();
    }

    fn compute(&mut self) {
        self.lifecycle.notify_start(false);
        let degrees = self.snapshot.degrees();
        let mut axes: IndexMap<String, Vec<(EntityId, usize)>> = IndexMap::new();
        for node in self.snapshot.nodes.values() {
            let label = match node.properties.get(&self.options.axis_property) {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let degree = degrees.get(&node.id).copied().unwrap_or(0);
            axes.entry(label).or_default().push((node.id.clone(), degree));
        }

        let (inner, outer) = (self.options.inner_radius, self.options.outer_radius);
        let step = TAU / axes.len().max(1) as f64;
        self.slots.clear();
        for (axis, members) in axes.values_mut().enumerate() {
            members.sort_by_key(|(_, degree)| *degree);
            let last = members.len().saturating_sub(1).max(1) as f64;
            for (i, (id, _)) in members.iter().enumerate() {
                let slot = Slot {
                    angle: axis as f64 * step - FRAC_PI_2,
                    radius: inner + (outer - inner) * i as f64 / last,
                };
                self.slots.insert(id.clone(), slot);
            }
        }
        self.axes = axes.into_keys().collect();
        tracing::debug!(axes = self.axes.len(), nodes = self.slots.len(), "Placed hive plot");
        self.lifecycle.notify_done();
    }
}

impl GraphLayout for HivePlotLayout {
    fn name(&self) -> &'static str {
        "hive"
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
        match self.slots.get(node) {
            Some(slot) => NodePosition::Known(slot.point()),
            None => NodePosition::Pending,
        }
    }

    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        let edge = &self.snapshot.edges[*self.edge_index.get(edge)?];
        let start = self.node_position(&edge.source).point()?;
        let end = self.node_position(&edge.target).point()?;
        let (Some(a), Some(b)) = (self.slots.get(&edge.source), self.slots.get(&edge.target)) else {
            return Some(EdgePosition::line(start, end));
        };
        let (sin, cos) = (a.angle.sin() + b.angle.sin(), a.angle.cos() + b.angle.cos());
        let angle = if sin.abs() < 1e-9 && cos.abs() < 1e-9 {
            a.angle + FRAC_PI_2
        } else {
            sin.atan2(cos)
        };
        let control = Slot {
            angle,
            radius: (a.radius + b.radius) / 2.0,
        };
        Some(EdgePosition::spline(start, end, vec![control.point()]))
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
