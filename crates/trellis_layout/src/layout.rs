// SPDX-License-Identifier: MIT OR Apache-2.0
//! The contract every layout implements.

use crate::error::Result;
use crate::lifecycle::{LayoutLifecycle, LayoutState};
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use trellis_graph::{EntityId, Graph};

/// A 2D point
pub type Point = [f64; 2];

/// Where a node sits, if anywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodePosition {
    /// Computed or locked coordinates
    Known(Point),
    /// Not computed yet
    Pending,
    /// Hidden by a layout transform such as chain collapsing
    Hidden,
}

impl NodePosition {
    /// Coordinates, when known
    pub fn point(&self) -> Option<Point> {
        match self {
            Self::Known(point) => Some(*point),
            Self::Pending | Self::Hidden => None,
        }
    }

    /// Whether coordinates are known
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Whether the node is hidden
    pub fn is_hidden(&self) -> bool {
        matches!(self, Self::Hidden)
    }
}

/// Geometry of an edge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgePosition {
    /// Straight segment
    Line {
        /// Start point
        source: Point,
        /// End point
        target: Point,
    },
    /// Curve through ordered control points
    #[serde(rename_all = "camelCase")]
    Spline {
        /// Start point
        source: Point,
        /// End point
        target: Point,
        /// Interior control points, in order
        control_points: Vec<Point>,
    },
}

impl EdgePosition {
    /// Straight segment
    pub fn line(source: Point, target: Point) -> Self {
        Self::Line { source, target }
    }

    /// Curve, or a line when there are no control points
    pub fn spline(source: Point, target: Point, control_points: Vec<Point>) -> Self {
        if control_points.is_empty() {
            return Self::line(source, target);
        }
        Self::Spline {
            source,
            target,
            control_points,
        }
    }

    /// Start point
    pub fn source(&self) -> Point {
        match self {
            Self::Line { source, .. } | Self::Spline { source, .. } => *source,
        }
    }

    /// End point
    pub fn target(&self) -> Point {
        match self {
            Self::Line { target, .. } | Self::Spline { target, .. } => *target,
        }
    }

    /// Interior control points (empty for lines)
    pub fn control_points(&self) -> &[Point] {
        match self {
            Self::Line { .. } => &[],
            Self::Spline { control_points, .. } => control_points,
        }
    }

    /// Whether this is a curve
    pub fn is_spline(&self) -> bool {
        matches!(self, Self::Spline { .. })
    }
}

/// Lifecycle contract shared by every layout.
///
/// Only [`GraphEngine`](crate::GraphEngine) feeds graphs to a layout.
/// Computation failures never escape: they move the layout to
/// [`LayoutState::Error`] and keep the last good positions.
pub trait GraphLayout: Send + fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Lifecycle state holder
    fn lifecycle(&self) -> &LayoutLifecycle;

    /// Mutable lifecycle state holder
    fn lifecycle_mut(&mut self) -> &mut LayoutLifecycle;

    /// Current state
    fn state(&self) -> LayoutState {
        self.lifecycle().state()
    }

    /// Transition counter, independent of the graph version
    fn version(&self) -> u64 {
        self.lifecycle().version()
    }

    /// Current options as JSON
    fn props(&self) -> Value;

    /// Merge a partial options object; returns whether a recompute is
    /// warranted
    fn set_props(&mut self, props: &Value) -> Result<bool>;

    /// First-time setup for a graph
    fn initialize_graph(&mut self, graph: &dyn Graph);

    /// Re-seed from new graph data, keeping positions of surviving ids
    fn update_graph(&mut self, graph: &dyn Graph);

    /// Compute from scratch
    fn start(&mut self);

    /// Recompute after a graph or props change
    fn update(&mut self);

    /// Continue after a pause or a small change
    fn resume(&mut self) {
        self.update();
    }

    /// Abort any computation in flight
    fn stop(&mut self);

    /// Drain results from background work; returns whether positions moved
    fn poll(&mut self) -> bool {
        false
    }

    /// Position of a node
    fn node_position(&self, node: &EntityId) -> NodePosition;

    /// Geometry of an edge, when both ends are placed
    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition>;

    /// Pin a node at `point`, effective immediately
    fn lock_node_position(&mut self, node: &EntityId, point: Point);

    /// Release a pinned node
    fn unlock_node_position(&mut self, node: &EntityId);

    /// Whether a node is left out of the visible set
    fn should_skip_node(&self, _node: &EntityId) -> bool {
        false
    }

    /// Node an edge endpoint is drawn to
    fn map_node_id(&self, node: &EntityId) -> EntityId {
        node.clone()
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
