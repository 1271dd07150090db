// SPDX-License-Identifier: MIT OR Apache-2.0
//! Capability contracts shared by every node and edge, whatever the backend.
//!
//! Handles are shared (`Arc`) and mutate through `&self`; a write made through
//! one handle is visible to every other handle of the same entity.

use crate::error::GraphError;
use crate::id::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Property bag attached to nodes and edges
pub type PropertyMap = Map<String, Value>;

/// Shared node handle
pub type NodeRef = Arc<dyn NodeInterface>;

/// Shared edge handle
pub type EdgeRef = Arc<dyn EdgeInterface>;

/// Interaction state of a node or an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionState {
    /// Idle
    #[default]
    Default,
    /// Under the pointer
    Hover,
    /// Being dragged
    Dragging,
    /// Part of the selection
    Selected,
}

impl InteractionState {
    /// Lowercase name, as used in columnar `state` columns
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Hover => "hover",
            Self::Dragging => "dragging",
            Self::Selected => "selected",
        }
    }
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionState {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "hover" => Ok(Self::Hover),
            "dragging" => Ok(Self::Dragging),
            "selected" => Ok(Self::Selected),
            _ => Err(GraphError::UnknownState(s.to_string())),
        }
    }
}

/// How an edge touches a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Incidence {
    /// The node is the edge's source
    Outgoing,
    /// The node is the edge's target
    Incoming,
    /// The edge starts and ends on the node
    SelfLoop,
}

impl Incidence {
    /// Incidence of an edge relative to `node`, if the edge touches it
    pub fn of(node: &EntityId, source: &EntityId, target: &EntityId) -> Option<Self> {
        match (source == node, target == node) {
            (true, true) => Some(Self::SelfLoop),
            (true, false) => Some(Self::Outgoing),
            (false, true) => Some(Self::Incoming),
            (false, false) => None,
        }
    }

    fn counts_out(self) -> bool {
        matches!(self, Self::Outgoing | Self::SelfLoop)
    }

    fn counts_in(self) -> bool {
        matches!(self, Self::Incoming | Self::SelfLoop)
    }
}

/// One edge attached to a node, as seen from that node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeLink {
    /// Edge id
    pub edge_id: EntityId,
    /// Node on the other end (the node itself for self-loops)
    pub other_id: EntityId,
    /// Direction relative to the node
    pub incidence: Incidence,
}

/// Number of outgoing links (self-loops included)
pub fn out_degree_of(links: &[EdgeLink]) -> usize {
    links.iter().filter(|l| l.incidence.counts_out()).count()
}

/// Number of incoming links (self-loops included)
pub fn in_degree_of(links: &[EdgeLink]) -> usize {
    links.iter().filter(|l| l.incidence.counts_in()).count()
}

/// Capabilities every node exposes
pub trait NodeInterface: Send + Sync + fmt::Debug {
    /// Stable identifier
    fn id(&self) -> EntityId;

    /// Current interaction state
    fn state(&self) -> InteractionState;

    /// Change the interaction state
    fn set_state(&self, state: InteractionState);

    /// Whether the node can be selected
    fn is_selectable(&self) -> bool;

    /// Whether hovering the node highlights its edges
    fn should_highlight_connected_edges(&self) -> bool;

    /// Look up a property; `None` when the key is unknown
    fn property_value(&self, key: &str) -> Option<Value>;

    /// Snapshot of the whole property bag, overrides applied
    fn data(&self) -> PropertyMap;

    /// Replace the property bag
    fn set_data(&self, data: PropertyMap);

    /// Set a single property
    fn set_data_property(&self, key: &str, value: Value);

    /// Edges attached to this node
    fn links(&self) -> Vec<EdgeLink>;

    /// Ids of the edges attached to this node
    fn connected_edge_ids(&self) -> Vec<EntityId> {
        self.links().into_iter().map(|l| l.edge_id).collect()
    }

    /// Ids of the nodes on the other end of each attached edge, deduplicated
    fn sibling_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = Vec::new();
        for link in self.links() {
            if !ids.contains(&link.other_id) {
                ids.push(link.other_id);
            }
        }
        ids
    }

    /// Number of edges whose target is this node
    fn in_degree(&self) -> usize {
        in_degree_of(&self.links())
    }

    /// Number of edges whose source is this node
    fn out_degree(&self) -> usize {
        out_degree_of(&self.links())
    }

    /// Number of attached edges
    fn degree(&self) -> usize {
        self.links().len()
    }
}

/// Capabilities every edge exposes
pub trait EdgeInterface: Send + Sync + fmt::Debug {
    /// Stable identifier
    fn id(&self) -> EntityId;

    /// Source node id
    fn source_id(&self) -> EntityId;

    /// Target node id
    fn target_id(&self) -> EntityId;

    /// Whether the edge has a direction
    fn is_directed(&self) -> bool;

    /// Current interaction state
    fn state(&self) -> InteractionState;

    /// Change the interaction state
    fn set_state(&self, state: InteractionState);

    /// Look up a property; `None` when the key is unknown
    fn property_value(&self, key: &str) -> Option<Value>;

    /// Snapshot of the whole property bag, overrides applied
    fn data(&self) -> PropertyMap;

    /// Replace the property bag
    fn set_data(&self, data: PropertyMap);

    /// Set a single property
    fn set_data_property(&self, key: &str, value: Value);

    /// Ids of the endpoint nodes that resolved inside the owning graph
    fn connected_node_ids(&self) -> Vec<EntityId>;
}
