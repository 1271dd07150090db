// SPDX-License-Identifier: MIT OR Apache-2.0
//! Row-oriented node objects.

use crate::cache::VersionCounter;
use crate::entity::{EdgeLink, InteractionState, NodeInterface, PropertyMap};
use crate::id::EntityId;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// A node stored as an individual object.
///
/// Once registered in a [`RowGraph`](crate::RowGraph), every mutation made
/// through the node bumps the graph's version.
#[derive(Debug)]
pub struct Node {
    id: EntityId,
    inner: RwLock<NodeInner>,
}

#[derive(Debug)]
struct NodeInner {
    state: InteractionState,
    selectable: bool,
    highlight_connected_edges: bool,
    data: PropertyMap,
    /// Attached edges keyed by edge id
    links: IndexMap<EntityId, EdgeLink>,
    owner: Option<Arc<VersionCounter>>,
}

impl Node {
    /// Create a node with an empty property bag
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            inner: RwLock::new(NodeInner {
                state: InteractionState::Default,
                selectable: false,
                highlight_connected_edges: false,
                data: PropertyMap::new(),
                links: IndexMap::new(),
                owner: None,
            }),
        }
    }

    /// Set the initial interaction state
    pub fn with_state(self, state: InteractionState) -> Self {
        self.inner.write().state = state;
        self
    }

    /// Set the selectable flag
    pub fn with_selectable(self, selectable: bool) -> Self {
        self.inner.write().selectable = selectable;
        self
    }

    /// Set the highlight-connected-edges flag
    pub fn with_highlight_connected_edges(self, highlight: bool) -> Self {
        self.inner.write().highlight_connected_edges = highlight;
        self
    }

    /// Set the property bag
    pub fn with_data(self, data: PropertyMap) -> Self {
        self.inner.write().data = data;
        self
    }

    /// Set one property
    pub fn with_property(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inner.write().data.insert(key.into(), value.into());
        self
    }

    /// Whether the node currently belongs to a graph
    pub fn is_registered(&self) -> bool {
        self.inner.read().owner.is_some()
    }

    pub(crate) fn attach(&self, owner: Arc<VersionCounter>) {
        self.inner.write().owner = Some(owner);
    }

    pub(crate) fn detach(&self) {
        let mut inner = self.inner.write();
        inner.owner = None;
        inner.links.clear();
    }

    pub(crate) fn add_link(&self, link: EdgeLink) {
        self.inner.write().links.insert(link.edge_id.clone(), link);
    }

    pub(crate) fn remove_link(&self, edge_id: &EntityId) {
        self.inner.write().links.shift_remove(edge_id);
    }

    /// Copy state, flags and data from `record`, keeping connectivity
    pub(crate) fn replace_record(&self, record: &Node) {
        let source = record.inner.read();
        let mut inner = self.inner.write();
        inner.state = source.state;
        inner.selectable = source.selectable;
        inner.highlight_connected_edges = source.highlight_connected_edges;
        inner.data = source.data.clone();
    }

    fn mutate(&self, apply: impl FnOnce(&mut NodeInner)) {
        let owner = {
            let mut inner = self.inner.write();
            apply(&mut inner);
            inner.owner.clone()
        };
        if let Some(owner) = owner {
            owner.bump();
        }
    }
}

impl NodeInterface for Node {
    fn id(&self) -> EntityId {
        self.id.clone()
    }

    fn state(&self) -> InteractionState {
        self.inner.read().state
    }

    fn set_state(&self, state: InteractionState) {
        self.mutate(|inner| inner.state = state);
    }

    fn is_selectable(&self) -> bool {
        self.inner.read().selectable
    }

    fn should_highlight_connected_edges(&self) -> bool {
        self.inner.read().highlight_connected_edges
    }

    fn property_value(&self, key: &str) -> Option<Value> {
        self.inner.read().data.get(key).cloned()
    }

    fn data(&self) -> PropertyMap {
        self.inner.read().data.clone()
    }

    fn set_data(&self, data: PropertyMap) {
        self.mutate(|inner| inner.data = data);
    }

    fn set_data_property(&self, key: &str, value: Value) {
        self.mutate(|inner| {
            inner.data.insert(key.to_string(), value);
        });
    }

    fn links(&self) -> Vec<EdgeLink> {
        self.inner.read().links.values().cloned().collect()
    }

    fn degree(&self) -> usize {
        self.inner.read().links.len()
    }
}
