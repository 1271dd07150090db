// SPDX-License-Identifier: MIT OR Apache-2.0
//! Columnar graph over immutable node and edge tables.
//!
//! Node tables carry `id`, `state`, `selectable`, `highlightConnectedEdges`
//! and `data` columns; edge tables carry `id`, `sourceId`, `targetId`,
//! `directed`, `state` and `data`. Only the id columns are required.
//! `data` holds serialized JSON objects, parsed on first property access.

use crate::entity::{EdgeRef, InteractionState, NodeRef, PropertyMap};
use crate::error::{GraphError, Result};
use crate::events::{GraphListener, ListenerId};
use crate::graph::{Graph, GraphKind};
use crate::id::EntityId;
use crate::overlay::{Handle, Overlay, PropertyOverlay};
use crate::table::{Column, ColumnTable};
use crate::tabular::{TabularGraph, TabularSource};
use serde_json::Value;
use std::any::Any;
use std::sync::{Arc, OnceLock};

const ID_TYPES: &[&str] = &["int", "utf8", "id"];

/// [`TabularSource`] over a node table and an edge table.
///
/// Tables are never written; mutations are recorded in overlays that shadow
/// the column values.
#[derive(Debug)]
pub struct ColumnarSource {
    nodes: ColumnTable,
    edges: ColumnTable,
    version: u64,
    node_ids: Vec<EntityId>,
    edge_ids: Vec<EntityId>,
    edge_source_ids: Vec<EntityId>,
    edge_target_ids: Vec<EntityId>,
    node_blobs: Vec<OnceLock<PropertyMap>>,
    edge_blobs: Vec<OnceLock<PropertyMap>>,
    node_state: Overlay<InteractionState>,
    node_selectable: Overlay<bool>,
    node_highlight: Overlay<bool>,
    node_props: PropertyOverlay,
    edge_state: Overlay<InteractionState>,
    edge_props: PropertyOverlay,
}

impl ColumnarSource {
    /// Validate the tables and index their id columns
    pub fn new(nodes: ColumnTable, edges: ColumnTable, version: u64) -> Result<Self> {
        nodes.expect_type("id", ID_TYPES)?;
        nodes.expect_type("state", &["utf8"])?;
        nodes.expect_type("selectable", &["bool"])?;
        nodes.expect_type("highlightConnectedEdges", &["bool"])?;
        nodes.expect_type("data", &["utf8"])?;
        for column in ["id", "sourceId", "targetId"] {
            edges.expect_type(column, ID_TYPES)?;
        }
        edges.expect_type("directed", &["bool"])?;
        edges.expect_type("state", &["utf8"])?;
        edges.expect_type("data", &["utf8"])?;

        let node_ids = id_column(&nodes, "id")?;
        let edge_ids = id_column(&edges, "id")?;
        let edge_source_ids = id_column(&edges, "sourceId")?;
        let edge_target_ids = id_column(&edges, "targetId")?;

        Ok(Self {
            node_blobs: (0..nodes.len()).map(|_| OnceLock::new()).collect(),
            edge_blobs: (0..edges.len()).map(|_| OnceLock::new()).collect(),
            nodes,
            edges,
            version,
            node_ids,
            edge_ids,
            edge_source_ids,
            edge_target_ids,
            node_state: Overlay::new(),
            node_selectable: Overlay::new(),
            node_highlight: Overlay::new(),
            node_props: PropertyOverlay::new(),
            edge_state: Overlay::new(),
            edge_props: PropertyOverlay::new(),
        })
    }

    /// Node table
    pub fn node_table(&self) -> &ColumnTable {
        &self.nodes
    }

    /// Edge table
    pub fn edge_table(&self) -> &ColumnTable {
        &self.edges
    }

    /// Override the selectable flag of a node
    pub fn set_node_selectable(&self, handle: Handle, selectable: bool) {
        self.node_selectable.set(handle, selectable);
    }

    /// Override the highlight-connected-edges flag of a node
    pub fn set_node_highlight_connected_edges(&self, handle: Handle, highlight: bool) {
        self.node_highlight.set(handle, highlight);
    }

    /// Number of `data` blobs parsed so far
    pub fn parsed_blobs(&self) -> usize {
        self.node_blobs
            .iter()
            .chain(&self.edge_blobs)
            .filter(|blob| blob.get().is_some())
            .count()
    }

    fn node_blob(&self, handle: Handle) -> Option<&PropertyMap> {
        let cell = self.node_blobs.get(handle)?;
        Some(cell.get_or_init(|| parse_blob(self.nodes.column("data"), handle)))
    }

    fn edge_blob(&self, handle: Handle) -> Option<&PropertyMap> {
        let cell = self.edge_blobs.get(handle)?;
        Some(cell.get_or_init(|| parse_blob(self.edges.column("data"), handle)))
    }
}

fn id_column(table: &ColumnTable, name: &str) -> Result<Vec<EntityId>> {
    if table.is_empty() && table.column(name).is_none() {
        return Ok(Vec::new());
    }
    let column = table.require(name)?;
    (0..table.len())
        .map(|row| column.entity_id(row).ok_or(GraphError::MissingId(row)))
        .collect()
}

fn parse_blob(column: Option<&Column>, row: usize) -> PropertyMap {
    let Some(text) = column.and_then(|column| column.str(row)) else {
        return PropertyMap::new();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!("Row {} data is not a JSON object: {}", row, other);
            PropertyMap::new()
        }
        Err(err) => {
            tracing::warn!("Row {} has malformed data: {}", row, err);
            PropertyMap::new()
        }
    }
}

fn parse_state(column: Option<&Column>, row: usize) -> InteractionState {
    column
        .and_then(|column| column.str(row))
        .and_then(|name| match name.parse::<InteractionState>() {
            Ok(state) => Some(state),
            Err(err) => {
                tracing::warn!("Row {}: {}", row, err);
                None
            }
        })
        .unwrap_or_default()
}

impl TabularSource for ColumnarSource {
    fn version(&self) -> u64 {
        self.version
    }

    fn node_handles(&self) -> Vec<Handle> {
        (0..self.nodes.len()).collect()
    }

    fn edge_handles(&self) -> Vec<Handle> {
        (0..self.edges.len()).collect()
    }

    fn node_id(&self, handle: Handle) -> EntityId {
        self.node_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn node_state(&self, handle: Handle) -> InteractionState {
        self.node_state
            .get_or(&handle, || parse_state(self.nodes.column("state"), handle))
    }

    fn node_selectable(&self, handle: Handle) -> bool {
        self.node_selectable.get_or(&handle, || {
            self.nodes
                .column("selectable")
                .and_then(|column| column.bool(handle))
                .unwrap_or(false)
        })
    }

    fn node_highlight_connected_edges(&self, handle: Handle) -> bool {
        self.node_highlight.get_or(&handle, || {
            self.nodes
                .column("highlightConnectedEdges")
                .and_then(|column| column.bool(handle))
                .unwrap_or(false)
        })
    }

    fn node_property(&self, handle: Handle, key: &str) -> Option<Value> {
        self.node_props.property(&handle, key, || {
            self.node_blob(handle).and_then(|blob| blob.get(key).cloned())
        })
    }

    fn node_data(&self, handle: Handle) -> PropertyMap {
        self.node_props
            .data(&handle, || self.node_blob(handle).cloned().unwrap_or_default())
    }

    fn edge_id(&self, handle: Handle) -> EntityId {
        self.edge_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_source_id(&self, handle: Handle) -> EntityId {
        self.edge_source_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_target_id(&self, handle: Handle) -> EntityId {
        self.edge_target_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_directed(&self, handle: Handle) -> bool {
        self.edges
            .column("directed")
            .and_then(|column| column.bool(handle))
            .unwrap_or(false)
    }

    fn edge_state(&self, handle: Handle) -> InteractionState {
        self.edge_state
            .get_or(&handle, || parse_state(self.edges.column("state"), handle))
    }

    fn edge_property(&self, handle: Handle, key: &str) -> Option<Value> {
        self.edge_props.property(&handle, key, || {
            self.edge_blob(handle).and_then(|blob| blob.get(key).cloned())
        })
    }

    fn edge_data(&self, handle: Handle) -> PropertyMap {
        self.edge_props
            .data(&handle, || self.edge_blob(handle).cloned().unwrap_or_default())
    }

    fn write_node_state(&self, handle: Handle, state: InteractionState) -> bool {
        self.node_state.set(handle, state);
        true
    }

    fn write_node_property(&self, handle: Handle, key: &str, value: &Value) -> bool {
        self.node_props.set_property(&handle, key, value.clone());
        true
    }

    fn write_node_data(&self, handle: Handle, data: &PropertyMap) -> bool {
        self.node_props.replace(&handle, data.clone());
        true
    }

    fn write_edge_state(&self, handle: Handle, state: InteractionState) -> bool {
        self.edge_state.set(handle, state);
        true
    }

    fn write_edge_property(&self, handle: Handle, key: &str, value: &Value) -> bool {
        self.edge_props.set_property(&handle, key, value.clone());
        true
    }

    fn write_edge_data(&self, handle: Handle, data: &PropertyMap) -> bool {
        self.edge_props.replace(&handle, data.clone());
        true
    }
}

/// Graph over a [`ColumnarSource`].
///
/// Id lookups try the exact id first, then its numeric or string twin, so
/// `7` and `"7"` find the same node.
#[derive(Debug)]
pub struct ColumnarGraph {
    source: Arc<ColumnarSource>,
    inner: TabularGraph,
}

impl ColumnarGraph {
    /// Wrap a source
    pub fn new(source: ColumnarSource) -> Self {
        let source = Arc::new(source);
        let inner = TabularGraph::with_kind(
            Arc::clone(&source) as Arc<dyn TabularSource>,
            GraphKind::Columnar,
        );
        Self { source, inner }
    }

    /// Build from node and edge tables
    pub fn from_tables(nodes: ColumnTable, edges: ColumnTable, version: u64) -> Result<Self> {
        Ok(Self::new(ColumnarSource::new(nodes, edges, version)?))
    }

    /// The underlying source
    pub fn source(&self) -> &ColumnarSource {
        &self.source
    }
}

impl Graph for ColumnarGraph {
    fn kind(&self) -> GraphKind {
        GraphKind::Columnar
    }

    fn version(&self) -> u64 {
        self.inner.version()
    }

    fn get_nodes(&self) -> Arc<[NodeRef]> {
        self.inner.get_nodes()
    }

    fn get_edges(&self) -> Arc<[EdgeRef]> {
        self.inner.get_edges()
    }

    fn find_node(&self, id: &EntityId) -> Option<NodeRef> {
        self.inner.find_node_exact(id).or_else(|| {
            id.alternate()
                .and_then(|twin| self.inner.find_node_exact(&twin))
        })
    }

    fn find_edge(&self, id: &EntityId) -> Option<EdgeRef> {
        self.inner.find_edge_exact(id).or_else(|| {
            id.alternate()
                .and_then(|twin| self.inner.find_edge_exact(&twin))
        })
    }

    fn add_listener(&self, listener: GraphListener) -> ListenerId {
        self.inner.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_listener(id)
    }

    fn destroy(&mut self) {
        self.inner.destroy();
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
    use crate::entity::{EdgeInterface, NodeInterface};
    use serde_json::json;

    fn graph() -> ColumnarGraph {
        let nodes = ColumnTable::builder()
            .column("id", vec![1i64, 2, 3])
            .column("state", vec![Some("hover".to_string()), None, None])
            .column("selectable", vec![true, false, true])
            .column(
                "data",
                vec![
                    Some(r#"{"label":"one","weight":2}"#.to_string()),
                    Some("{not json".to_string()),
                    None,
                ],
            )
            .build()
            .unwrap();
        let edges = ColumnTable::builder()
            .column("id", vec!["e1", "e2"])
            .column("sourceId", vec![1i64, 2])
            .column("targetId", vec![2i64, 3])
            .column("directed", vec![true, true])
            .build()
            .unwrap();
        ColumnarGraph::from_tables(nodes, edges, 1).unwrap()
    }

    #[test]
    fn test_dual_id_lookup() {
        let graph = graph();
        assert!(graph.find_node(&EntityId::from(2)).is_some());
        let twin = graph.find_node(&EntityId::from("2")).unwrap();
        assert_eq!(twin.id(), EntityId::from(2));
        assert!(graph.find_node(&EntityId::from("02")).is_none());
        assert!(graph.find_edge(&EntityId::from("e1")).is_some());
    }

    #[test]
    fn test_lazy_blob_parsing() {
        let graph = graph();
        let nodes = graph.get_nodes();
        assert_eq!(graph.source().parsed_blobs(), 0);
        assert_eq!(nodes[0].property_value("label"), Some(json!("one")));
        assert_eq!(graph.source().parsed_blobs(), 1);
        assert_eq!(nodes[0].property_value("weight"), Some(json!(2)));
        assert_eq!(graph.source().parsed_blobs(), 1);
        // Malformed blobs behave as empty bags.
        assert!(nodes[1].data().is_empty());
    }

    #[test]
    fn test_overrides_shadow_columns() {
        let graph = graph();
        let version = graph.version();
        let node = graph.find_node(&EntityId::from(1)).unwrap();
        assert_eq!(node.state(), InteractionState::Hover);
        assert!(node.is_selectable());
        node.set_state(InteractionState::Selected);
        node.set_data_property("label", json!("uno"));
        graph.source().set_node_selectable(0, false);

        let again = graph.find_node(&EntityId::from("1")).unwrap();
        assert_eq!(again.state(), InteractionState::Selected);
        assert_eq!(again.property_value("label"), Some(json!("uno")));
        assert_eq!(again.property_value("weight"), Some(json!(2)));
        assert!(!again.is_selectable());
        assert_eq!(graph.version(), version);
    }

    #[test]
    fn test_connectivity() {
        let graph = graph();
        let middle = graph.find_node(&EntityId::from(2)).unwrap();
        assert_eq!(middle.degree(), 2);
        assert_eq!(middle.sibling_ids(), vec![EntityId::from(1), EntityId::from(3)]);
        let edge = graph.find_edge(&EntityId::from("e2")).unwrap();
        assert!(edge.is_directed());
        assert_eq!(edge.connected_node_ids().len(), 2);
    }

    #[test]
    fn test_string_endpoints_reach_integer_nodes() {
        let nodes = ColumnTable::builder()
            .column("id", vec![1i64, 2])
            .build()
            .unwrap();
        let edges = ColumnTable::builder()
            .column("id", vec!["e"])
            .column("sourceId", vec!["1"])
            .column("targetId", vec!["2"])
            .column("directed", vec![true])
            .build()
            .unwrap();
        let graph = ColumnarGraph::from_tables(nodes, edges, 1).unwrap();

        let first = graph.find_node(&EntityId::from("1")).unwrap();
        assert_eq!(first.degree(), 1);
        assert_eq!(first.out_degree(), 1);
        assert_eq!(first.sibling_ids(), vec![EntityId::from(2)]);
        let edge = graph.find_edge(&EntityId::from("e")).unwrap();
        assert_eq!(
            edge.connected_node_ids(),
            vec![EntityId::from(1), EntityId::from(2)]
        );
        assert_eq!(edge.source_id(), EntityId::from("1"));
    }

    #[test]
    fn test_rejects_bad_tables() {
        let nodes = ColumnTable::builder()
            .column("id", vec![true])
            .build()
            .unwrap();
        let err = ColumnarSource::new(nodes, ColumnTable::default(), 0).unwrap_err();
        assert!(matches!(err, GraphError::ColumnType { .. }));

        let nodes = ColumnTable::builder()
            .column("id", vec![Some(1i64), None])
            .build()
            .unwrap();
        let err = ColumnarSource::new(nodes, ColumnTable::default(), 0).unwrap_err();
        assert!(matches!(err, GraphError::MissingId(1)));
    }
}
