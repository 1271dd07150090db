// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered layout for directed acyclic graphs.
//!
//! Linear chains can be collapsed into their first member. Collapsed
//! members are left out of the pipeline and edges touching them are
//! rewired to the representative, so the rest of the drawing stays intact.

pub mod chains;
pub mod sugiyama;

pub use chains::{find_chains, Chain, ChainAnnotation, ChainSet};
pub use sugiyama::{
    solve, Coord, Decross, Layering, Orientation, SolvedLayout, SugiyamaConfig, OPT_LAYER_LIMIT,
};

use crate::error::{LayoutError, Result};
use crate::layout::{EdgePosition, GraphLayout, NodePosition, Point};
use crate::lifecycle::{LayoutLifecycle, LayoutState};
use crate::props::{any_change, merge_props};
use crate::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use trellis_graph::{EntityId, Graph};

/// A size given either as one number or as `[width, height]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Extent {
    /// Same value on both axes
    Uniform(f64),
    /// Width and height
    Sized([f64; 2]),
}

impl Extent {
    /// As `[width, height]`
    pub fn size(self) -> [f64; 2] {
        match self {
            Self::Uniform(value) => [value, value],
            Self::Sized(size) => size,
        }
    }
}

/// Options for [`DagLayout`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DagLayoutOptions {
    /// Node footprint
    pub node_size: Extent,
    /// Space between neighboring nodes and layers
    pub gap: Extent,
    /// Layer assignment
    pub layering: Layering,
    /// Crossing reduction
    pub decross: Decross,
    /// Coordinate assignment
    pub coord: Coord,
    /// Direction ranks grow in
    pub orientation: Orientation,
    /// Center the drawing on the origin
    pub center: bool,
    /// Collapse state of newly discovered chains
    pub collapse_linear_chains: bool,
}

impl Default for DagLayoutOptions {
    fn default() -> Self {
        let pipeline = SugiyamaConfig::default();
        Self {
            node_size: Extent::Sized(pipeline.node_size),
            gap: Extent::Sized(pipeline.gap),
            layering: pipeline.layering,
            decross: pipeline.decross,
            coord: pipeline.coord,
            orientation: pipeline.orientation,
            center: pipeline.center,
            collapse_linear_chains: false,
        }
    }
}

impl DagLayoutOptions {
    fn pipeline(&self) -> SugiyamaConfig {
        SugiyamaConfig {
            layering: self.layering,
            decross: self.decross,
            coord: self.coord,
            orientation: self.orientation,
            node_size: self.node_size.size(),
            gap: self.gap.size(),
            center: self.center,
        }
    }
}

/// Sugiyama-style layout with chain collapsing.
///
/// Needs directed, acyclic input; anything else moves the layout to
/// [`LayoutState::Error`] and keeps the previous drawing.
#[derive(Debug, Default)]
pub struct DagLayout {
    options: DagLayoutOptions,
    lifecycle: LayoutLifecycle,
    snapshot: GraphSnapshot,
    edge_index: HashMap<EntityId, usize>,
    chains: ChainSet,
    solved: Option<SolvedLayout>,
    locked: HashMap<EntityId, Point>,
}

impl DagLayout {
    /// Layout with the given options
    pub fn new(options: DagLayoutOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Current options
    pub fn options(&self) -> &DagLayoutOptions {
        &self.options
    }

    /// Chains of the current graph
    pub fn chains(&self) -> &[Chain] {
        self.chains.chains()
    }

    /// Flip one chain and redraw; returns `false` for unknown chain ids
    pub fn toggle_collapsed_chain(&mut self, chain_id: &str) -> bool {
        let Some(collapsed) = self.chains.toggle(chain_id) else {
            return false;
        };
        tracing::debug!(chain = chain_id, collapsed, "Toggled chain");
        self.redraw();
        true
    }

    /// Collapse exactly the listed chains and redraw
    pub fn set_collapsed_chains(&mut self, chain_ids: &[String]) {
        self.chains.set_collapsed(chain_ids);
        self.redraw();
    }

    /// Ids of collapsed chains
    pub fn collapsed_chains(&self) -> Vec<String> {
        self.chains.collapsed_ids()
    }

    /// Chain metadata for a node of the current graph
    pub fn chain_annotation(&self, node: &EntityId) -> Option<ChainAnnotation> {
        self.snapshot
            .nodes
            .contains_key(node)
            .then(|| self.chains.annotation(node))
    }

    /// Layer of a laid-out node
    pub fn rank(&self, node: &EntityId) -> Option<usize> {
        self.solved.as_ref()?.ranks.get(node).copied()
    }

    fn capture(&mut self, graph: &dyn Graph) {
        self.snapshot = GraphSnapshot::capture(graph, &[]);
        self.edge_index = self
            .snapshot
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| (edge.id.clone(), i))
            .collect();
        self.chains
            .rebuild(&self.snapshot, self.options.collapse_linear_chains);
    }

    fn redraw(&mut self) {
        if self.lifecycle.state() != LayoutState::Init {
            self.compute();
        }
    }

    fn compute(&mut self) {
        self.lifecycle.notify_start(false);
        match self.run_pipeline() {
            Ok(solved) => {
                self.solved = Some(solved);
                self.lifecycle.notify_done();
            }
            Err(err) => self.lifecycle.notify_error(err),
        }
    }

    fn run_pipeline(&self) -> Result<SolvedLayout> {
        if let Some(edge) = self.snapshot.edges.iter().find(|edge| !edge.directed) {
            return Err(LayoutError::UndirectedEdge(edge.id.clone()));
        }
        let nodes: Vec<EntityId> = self
            .snapshot
            .nodes
            .keys()
            .filter(|id| !self.chains.should_skip(id))
            .cloned()
            .collect();
        let edges: Vec<(EntityId, EntityId)> = self
            .snapshot
            .edges
            .iter()
            .filter_map(|edge| self.mapped_ends(&edge.source, &edge.target))
            .collect();
        let solved = solve(&nodes, &edges, &self.options.pipeline())?;
        tracing::debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            collapsed = self.chains.collapsed_ids().len(),
            "Solved layered layout"
        );
        Ok(solved)
    }

    /// Endpoints after chain remapping; `None` when the edge folds into a
    /// collapsed chain
    fn mapped_ends(&self, source: &EntityId, target: &EntityId) -> Option<(EntityId, EntityId)> {
        let (mapped_source, mapped_target) = (self.chains.map(source), self.chains.map(target));
        if mapped_source == mapped_target && source != target {
            return None;
        }
        Some((mapped_source, mapped_target))
    }
}

impl GraphLayout for DagLayout {
    fn name(&self) -> &'static str {
        "dag"
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
        if changes
            .iter()
            .any(|change| change.key == "collapseLinearChains")
        {
            self.chains.reset(options.collapse_linear_chains);
        }
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
        if self.chains.should_skip(node) {
            return NodePosition::Hidden;
        }
        if let Some(point) = self.locked.get(node) {
            return NodePosition::Known(*point);
        }
        match self.solved.as_ref().and_then(|solved| solved.nodes.get(node)) {
            Some(point) => NodePosition::Known(*point),
            None => NodePosition::Pending,
        }
    }

    fn edge_position(&self, edge: &EntityId) -> Option<EdgePosition> {
        let edge = &self.snapshot.edges[*self.edge_index.get(edge)?];
        let (source, target) = self.mapped_ends(&edge.source, &edge.target)?;
        let start = self.node_position(&source).point()?;
        let end = self.node_position(&target).point()?;
        let bends = self
            .solved
            .as_ref()
            .and_then(|solved| solved.edges.get(&(source, target)))
            .cloned()
            .unwrap_or_default();
        Some(EdgePosition::spline(start, end, bends))
    }

    fn lock_node_position(&mut self, node: &EntityId, point: Point) {
        self.locked.insert(node.clone(), point);
    }

    fn unlock_node_position(&mut self, node: &EntityId) {
        self.locked.remove(node);
    }

    fn should_skip_node(&self, node: &EntityId) -> bool {
        self.chains.should_skip(node)
    }

    fn map_node_id(&self, node: &EntityId) -> EntityId {
        self.chains.map(node)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
