// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tabular graph: entity views over a pluggable accessor bundle.
//!
//! A [`TabularSource`] exposes nodes and edges as opaque [`Handle`]s plus
//! per-field accessors. [`TabularGraph`] wraps any source and materializes
//! its views lazily, once per source version.

use crate::cache::Cache;
use crate::entity::{EdgeInterface, EdgeLink, EdgeRef, Incidence, InteractionState, NodeInterface, NodeRef, PropertyMap};
use crate::events::{GraphEvent, GraphEvents, GraphListener, ListenerId};
use crate::graph::{Graph, GraphKind};
use crate::id::EntityId;
use crate::overlay::{Handle, Overlay, PropertyOverlay};
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Accessor bundle shared by tabular and columnar backends.
///
/// Write accessors return `false` when the source cannot store the value in
/// place; the graph then records it in an overlay instead.
pub trait TabularSource: Send + Sync + fmt::Debug {
    /// Source version; views are rebuilt when it moves
    fn version(&self) -> u64;

    /// Node handles in iteration order
    fn node_handles(&self) -> Vec<Handle>;

    /// Edge handles in iteration order
    fn edge_handles(&self) -> Vec<Handle>;

    /// Node id
    fn node_id(&self, handle: Handle) -> EntityId;

    /// Node interaction state
    fn node_state(&self, _handle: Handle) -> InteractionState {
        InteractionState::Default
    }

    /// Node selectable flag
    fn node_selectable(&self, _handle: Handle) -> bool {
        false
    }

    /// Node highlight-connected-edges flag
    fn node_highlight_connected_edges(&self, _handle: Handle) -> bool {
        false
    }

    /// One node property
    fn node_property(&self, handle: Handle, key: &str) -> Option<Value> {
        self.node_data(handle).get(key).cloned()
    }

    /// Full node property bag
    fn node_data(&self, handle: Handle) -> PropertyMap;

    /// Edge id
    fn edge_id(&self, handle: Handle) -> EntityId;

    /// Edge source node id
    fn edge_source_id(&self, handle: Handle) -> EntityId;

    /// Edge target node id
    fn edge_target_id(&self, handle: Handle) -> EntityId;

    /// Edge directed flag
    fn edge_directed(&self, _handle: Handle) -> bool {
        false
    }

    /// Edge interaction state
    fn edge_state(&self, _handle: Handle) -> InteractionState {
        InteractionState::Default
    }

    /// One edge property
    fn edge_property(&self, handle: Handle, key: &str) -> Option<Value> {
        self.edge_data(handle).get(key).cloned()
    }

    /// Full edge property bag
    fn edge_data(&self, handle: Handle) -> PropertyMap;

    /// Store a node state in place
    fn write_node_state(&self, _handle: Handle, _state: InteractionState) -> bool {
        false
    }

    /// Store a node property in place
    fn write_node_property(&self, _handle: Handle, _key: &str, _value: &Value) -> bool {
        false
    }

    /// Replace a node property bag in place
    fn write_node_data(&self, _handle: Handle, _data: &PropertyMap) -> bool {
        false
    }

    /// Store an edge state in place
    fn write_edge_state(&self, _handle: Handle, _state: InteractionState) -> bool {
        false
    }

    /// Store an edge property in place
    fn write_edge_property(&self, _handle: Handle, _key: &str, _value: &Value) -> bool {
        false
    }

    /// Replace an edge property bag in place
    fn write_edge_data(&self, _handle: Handle, _data: &PropertyMap) -> bool {
        false
    }
}

/// Mutations a source refused to store, keyed by entity id so they survive
/// row reordering
#[derive(Debug, Default)]
struct TabularOverlay {
    node_state: Overlay<InteractionState, EntityId>,
    node_props: PropertyOverlay<EntityId>,
    edge_state: Overlay<InteractionState, EntityId>,
    edge_props: PropertyOverlay<EntityId>,
}

/// Node view over a source handle
#[derive(Debug)]
pub struct TabularNode {
    handle: Handle,
    id: EntityId,
    source: Arc<dyn TabularSource>,
    overlay: Arc<TabularOverlay>,
    links: Vec<EdgeLink>,
}

impl TabularNode {
    /// Handle of the underlying row
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl NodeInterface for TabularNode {
    fn id(&self) -> EntityId {
        self.id.clone()
    }

    fn state(&self) -> InteractionState {
        self.overlay
            .node_state
            .get_or(&self.id, || self.source.node_state(self.handle))
    }

    fn set_state(&self, state: InteractionState) {
        if !self.source.write_node_state(self.handle, state) {
            self.overlay.node_state.set(self.id.clone(), state);
        }
    }

    fn is_selectable(&self) -> bool {
        self.source.node_selectable(self.handle)
    }

    fn should_highlight_connected_edges(&self) -> bool {
        self.source.node_highlight_connected_edges(self.handle)
    }

    fn property_value(&self, key: &str) -> Option<Value> {
        self.overlay
            .node_props
            .property(&self.id, key, || self.source.node_property(self.handle, key))
    }

    fn data(&self) -> PropertyMap {
        self.overlay
            .node_props
            .data(&self.id, || self.source.node_data(self.handle))
    }

    fn set_data(&self, data: PropertyMap) {
        if !self.source.write_node_data(self.handle, &data) {
            self.overlay.node_props.replace(&self.id, data);
        }
    }

    fn set_data_property(&self, key: &str, value: Value) {
        if !self.source.write_node_property(self.handle, key, &value) {
            self.overlay.node_props.set_property(&self.id, key, value);
        }
    }

    fn links(&self) -> Vec<EdgeLink> {
        self.links.clone()
    }
}

/// Edge view over a source handle
#[derive(Debug)]
pub struct TabularEdge {
    handle: Handle,
    id: EntityId,
    source_id: EntityId,
    target_id: EntityId,
    source: Arc<dyn TabularSource>,
    overlay: Arc<TabularOverlay>,
    resolved: Vec<EntityId>,
}

impl TabularEdge {
    /// Handle of the underlying row
    pub fn handle(&self) -> Handle {
        self.handle
    }
}

impl EdgeInterface for TabularEdge {
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
        self.source.edge_directed(self.handle)
    }

    fn state(&self) -> InteractionState {
        self.overlay
            .edge_state
            .get_or(&self.id, || self.source.edge_state(self.handle))
    }

    fn set_state(&self, state: InteractionState) {
        if !self.source.write_edge_state(self.handle, state) {
            self.overlay.edge_state.set(self.id.clone(), state);
        }
    }

    fn property_value(&self, key: &str) -> Option<Value> {
        self.overlay
            .edge_props
            .property(&self.id, key, || self.source.edge_property(self.handle, key))
    }

    fn data(&self) -> PropertyMap {
        self.overlay
            .edge_props
            .data(&self.id, || self.source.edge_data(self.handle))
    }

    fn set_data(&self, data: PropertyMap) {
        if !self.source.write_edge_data(self.handle, &data) {
            self.overlay.edge_props.replace(&self.id, data);
        }
    }

    fn set_data_property(&self, key: &str, value: Value) {
        if !self.source.write_edge_property(self.handle, key, &value) {
            self.overlay.edge_props.set_property(&self.id, key, value);
        }
    }

    fn connected_node_ids(&self) -> Vec<EntityId> {
        self.resolved.clone()
    }
}

/// Views and indices materialized for one source version
#[derive(Debug)]
struct Snapshot {
    nodes: Arc<[NodeRef]>,
    edges: Arc<[EdgeRef]>,
    node_index: HashMap<EntityId, usize>,
    edge_index: HashMap<EntityId, usize>,
}

impl Snapshot {
    fn build(
        source: &Arc<dyn TabularSource>,
        overlay: &Arc<TabularOverlay>,
        coerce_ids: bool,
    ) -> Self {
        let node_handles = source.node_handles();
        let node_ids: Vec<EntityId> = node_handles
            .iter()
            .map(|&handle| source.node_id(handle))
            .collect();
        let mut node_index = HashMap::with_capacity(node_handles.len());
        for (position, id) in node_ids.iter().enumerate() {
            node_index.entry(id.clone()).or_insert(position);
        }
        let resolve = |id: &EntityId| -> Option<usize> {
            if let Some(&position) = node_index.get(id) {
                return Some(position);
            }
            if !coerce_ids {
                return None;
            }
            id.alternate()
                .and_then(|twin| node_index.get(&twin).copied())
        };

        let mut links: Vec<Vec<EdgeLink>> = vec![Vec::new(); node_handles.len()];
        let mut edges: Vec<EdgeRef> = Vec::new();
        let mut edge_index = HashMap::new();
        let mut dangling = 0usize;
        for handle in source.edge_handles() {
            let id = source.edge_id(handle);
            let source_id = source.edge_source_id(handle);
            let target_id = source.edge_target_id(handle);

            // Links and resolved ends carry the node's own id, not the edge's spelling.
            let mut resolved = Vec::with_capacity(2);
            match (resolve(&source_id), resolve(&target_id)) {
                (Some(s), Some(t)) => {
                    if s == t {
                        links[s].push(EdgeLink {
                            edge_id: id.clone(),
                            other_id: node_ids[s].clone(),
                            incidence: Incidence::SelfLoop,
                        });
                        resolved.push(node_ids[s].clone());
                    } else {
                        links[s].push(EdgeLink {
                            edge_id: id.clone(),
                            other_id: node_ids[t].clone(),
                            incidence: Incidence::Outgoing,
                        });
                        links[t].push(EdgeLink {
                            edge_id: id.clone(),
                            other_id: node_ids[s].clone(),
                            incidence: Incidence::Incoming,
                        });
                        resolved.push(node_ids[s].clone());
                        resolved.push(node_ids[t].clone());
                    }
                }
                _ => dangling += 1,
            }

            edge_index.entry(id.clone()).or_insert(edges.len());
            edges.push(Arc::new(TabularEdge {
                handle,
                id,
                source_id,
                target_id,
                source: Arc::clone(source),
                overlay: Arc::clone(overlay),
                resolved,
            }));
        }
        if dangling > 0 {
            tracing::warn!("{} edges reference missing nodes and add no connectivity", dangling);
        }

        let nodes: Vec<NodeRef> = node_handles
            .into_iter()
            .zip(node_ids)
            .zip(links)
            .map(|((handle, id), links)| {
                Arc::new(TabularNode {
                    handle,
                    id,
                    source: Arc::clone(source),
                    overlay: Arc::clone(overlay),
                    links,
                }) as NodeRef
            })
            .collect();

        Self {
            nodes: nodes.into(),
            edges: edges.into(),
            node_index,
            edge_index,
        }
    }
}

/// Graph over a [`TabularSource`]
pub struct TabularGraph {
    source: Arc<dyn TabularSource>,
    kind: GraphKind,
    overlay: Arc<TabularOverlay>,
    snapshot: Cache<(), Arc<Snapshot>>,
    events: GraphEvents,
}

impl TabularGraph {
    /// Wrap a source
    pub fn new(source: Arc<dyn TabularSource>) -> Self {
        Self::with_kind(source, GraphKind::Tabular)
    }

    pub(crate) fn with_kind(source: Arc<dyn TabularSource>, kind: GraphKind) -> Self {
        Self {
            source,
            kind,
            overlay: Arc::new(TabularOverlay::default()),
            snapshot: Cache::new(),
            events: GraphEvents::new(),
        }
    }

    /// The wrapped source
    pub fn source(&self) -> &Arc<dyn TabularSource> {
        &self.source
    }

    /// Bring the views up to date with the source version.
    ///
    /// Returns `true` when the views were rebuilt.
    pub fn sync(&self) -> bool {
        let version = self.source.version();
        let coerce_ids = self.kind == GraphKind::Columnar;
        let rebuilt = self.snapshot.set(
            (),
            || Arc::new(Snapshot::build(&self.source, &self.overlay, coerce_ids)),
            version,
        );
        if rebuilt {
            tracing::debug!("Tabular graph synced to source version {}", version);
            self.events.emit(&GraphEvent::Synced { version });
        }
        rebuilt
    }

    fn current(&self) -> Arc<Snapshot> {
        self.sync();
        match self.snapshot.get(&()) {
            Some(snapshot) => snapshot,
            // Only reachable after destroy() raced a reader; serve an empty view.
            None => Arc::new(Snapshot {
                nodes: Arc::from(Vec::new()),
                edges: Arc::from(Vec::new()),
                node_index: HashMap::new(),
                edge_index: HashMap::new(),
            }),
        }
    }

    pub(crate) fn find_node_exact(&self, id: &EntityId) -> Option<NodeRef> {
        let snapshot = self.current();
        snapshot
            .node_index
            .get(id)
            .map(|&position| Arc::clone(&snapshot.nodes[position]))
    }

    pub(crate) fn find_edge_exact(&self, id: &EntityId) -> Option<EdgeRef> {
        let snapshot = self.current();
        snapshot
            .edge_index
            .get(id)
            .map(|&position| Arc::clone(&snapshot.edges[position]))
    }
}

impl fmt::Debug for TabularGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularGraph")
            .field("kind", &self.kind)
            .field("version", &self.source.version())
            .finish()
    }
}

impl Graph for TabularGraph {
    fn kind(&self) -> GraphKind {
        self.kind
    }

    fn version(&self) -> u64 {
        self.source.version()
    }

    fn get_nodes(&self) -> Arc<[NodeRef]> {
        Arc::clone(&self.current().nodes)
    }

    fn get_edges(&self) -> Arc<[EdgeRef]> {
        Arc::clone(&self.current().edges)
    }

    fn find_node(&self, id: &EntityId) -> Option<NodeRef> {
        self.find_node_exact(id)
    }

    fn find_edge(&self, id: &EntityId) -> Option<EdgeRef> {
        self.find_edge_exact(id)
    }

    fn add_listener(&self, listener: GraphListener) -> ListenerId {
        self.events.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    fn destroy(&mut self) {
        self.snapshot.clear();
        self.overlay.node_state.clear();
        self.overlay.node_props.clear();
        self.overlay.edge_state.clear();
        self.overlay.edge_props.clear();
        self.events.clear();
        self.source = Arc::new(EmptySource);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Source left behind by `destroy`
#[derive(Debug)]
struct EmptySource;

impl TabularSource for EmptySource {
    fn version(&self) -> u64 {
        0
    }

    fn node_handles(&self) -> Vec<Handle> {
        Vec::new()
    }

    fn edge_handles(&self) -> Vec<Handle> {
        Vec::new()
    }

    fn node_id(&self, handle: Handle) -> EntityId {
        EntityId::from(handle as i64)
    }

    fn node_data(&self, _handle: Handle) -> PropertyMap {
        PropertyMap::new()
    }

    fn edge_id(&self, handle: Handle) -> EntityId {
        EntityId::from(handle as i64)
    }

    fn edge_source_id(&self, handle: Handle) -> EntityId {
        EntityId::from(handle as i64)
    }

    fn edge_target_id(&self, handle: Handle) -> EntityId {
        EntityId::from(handle as i64)
    }

    fn edge_data(&self, _handle: Handle) -> PropertyMap {
        PropertyMap::new()
    }
}
