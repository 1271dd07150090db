// SPDX-License-Identifier: MIT OR Apache-2.0
//! Row-oriented edge objects.

use crate::cache::VersionCounter;
use crate::entity::{EdgeInterface, InteractionState, NodeInterface, PropertyMap};
use crate::id::EntityId;
use crate::node::Node;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// An edge stored as an individual object
#[derive(Debug)]
pub struct Edge {
    id: EntityId,
    source_id: EntityId,
    target_id: EntityId,
    directed: bool,
    inner: RwLock<EdgeInner>,
}

#[derive(Debug)]
struct EdgeInner {
    state: InteractionState,
    data: PropertyMap,
    /// Endpoints resolved when the edge was registered (at most two)
    nodes: Vec<Weak<Node>>,
    owner: Option<Arc<VersionCounter>>,
}

impl Edge {
    /// Create an undirected edge between two node ids
    pub fn new(
        id: impl Into<EntityId>,
        source_id: impl Into<EntityId>,
        target_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            directed: false,
            inner: RwLock::new(EdgeInner {
                state: InteractionState::Default,
                data: PropertyMap::new(),
                nodes: Vec::new(),
                owner: None,
            }),
        }
    }

    /// Set the directed flag
    pub fn with_directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    /// Set the initial interaction state
    pub fn with_state(self, state: InteractionState) -> Self {
        self.inner.write().state = state;
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

    /// Whether the edge starts and ends on the same node
    pub fn is_self_loop(&self) -> bool {
        self.source_id == self.target_id
    }

    pub(crate) fn attach(&self, owner: Arc<VersionCounter>, nodes: Vec<Weak<Node>>) {
        let mut inner = self.inner.write();
        inner.owner = Some(owner);
        inner.nodes = nodes;
    }

    pub(crate) fn detach(&self) {
        let mut inner = self.inner.write();
        inner.owner = None;
        inner.nodes.clear();
    }

    fn mutate(&self, apply: impl FnOnce(&mut EdgeInner)) {
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

impl EdgeInterface for Edge {
    fn id(&self) -> EntityId {
        self.id.clone()
    }

    fn source_id(&self) -> EntityId {
        self.source_id.clone()
    }

    fn target_id(&self) -> EntityId {
        self.target_id.clone()
    }

    fn is_directed(&self) -> bool {
        self.directed
    }

    fn state(&self) -> InteractionState {
        self.inner.read().state
    }

    fn set_state(&self, state: InteractionState) {
        self.mutate(|inner| inner.state = state);
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

    fn connected_node_ids(&self) -> Vec<EntityId> {
        self.inner
            .read()
            .nodes
            .iter()
            .filter_map(Weak::upgrade)
            .map(|node| node.id())
            .collect()
    }
}
