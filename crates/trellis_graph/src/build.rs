// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph construction from external input and conversion between backends.

use crate::column_arrays::{record_data, ColumnArrays, ColumnArraysSource};
use crate::columnar::ColumnarGraph;
use crate::edge::Edge;
use crate::entity::{EdgeInterface, InteractionState, NodeInterface, PropertyMap};
use crate::error::Result;
use crate::graph::{Graph, GraphKind};
use crate::id::EntityId;
use crate::node::Node;
use crate::row_graph::RowGraph;
use crate::table::{Column, ColumnTable};
use crate::tabular::TabularGraph;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One node of row-oriented input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Node id
    pub id: EntityId,
    /// Display label, stored as the `label` property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Interaction state
    #[serde(default)]
    pub state: InteractionState,
    /// Selectable flag
    #[serde(default)]
    pub selectable: bool,
    /// Highlight-connected-edges flag
    #[serde(default)]
    pub highlight_connected_edges: bool,
    /// Weight, stored as the `weight` property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Extra properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<PropertyMap>,
}

impl NodeRecord {
    /// Record with only an id
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            label: None,
            state: InteractionState::Default,
            selectable: false,
            highlight_connected_edges: false,
            weight: None,
            attributes: None,
        }
    }

    fn into_node(self) -> Node {
        let data = record_data(self.label, self.weight, self.attributes.as_ref());
        Node::new(self.id)
            .with_state(self.state)
            .with_selectable(self.selectable)
            .with_highlight_connected_edges(self.highlight_connected_edges)
            .with_data(data)
    }
}

/// One edge of row-oriented input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Edge id
    pub id: EntityId,
    /// Source node id
    pub source_id: EntityId,
    /// Target node id
    pub target_id: EntityId,
    /// Display label, stored as the `label` property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Interaction state
    #[serde(default)]
    pub state: InteractionState,
    /// Directed flag
    #[serde(default)]
    pub directed: bool,
    /// Weight, stored as the `weight` property
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Extra properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<PropertyMap>,
}

impl EdgeRecord {
    /// Undirected record between two nodes
    pub fn new(
        id: impl Into<EntityId>,
        source_id: impl Into<EntityId>,
        target_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: None,
            state: InteractionState::Default,
            directed: false,
            weight: None,
            attributes: None,
        }
    }

    /// Set the directed flag
    pub fn directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    fn into_edge(self) -> Edge {
        let data = record_data(self.label, self.weight, self.attributes.as_ref());
        Edge::new(self.id, self.source_id, self.target_id)
            .with_directed(self.directed)
            .with_state(self.state)
            .with_data(data)
    }
}

/// Row-oriented input: arrays of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RowGraphInput {
    /// Starting graph version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    /// Nodes
    pub nodes: Vec<NodeRecord>,
    /// Edges
    pub edges: Vec<EdgeRecord>,
}

/// Column-oriented input: parallel arrays per field
pub type ColumnGraphInput = ColumnArrays;

/// Columnar-table input
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnarTableInput {
    /// Graph version
    pub version: Option<u64>,
    /// Node table
    pub nodes: ColumnTable,
    /// Edge table
    pub edges: ColumnTable,
}

/// Any accepted input shape
#[derive(Debug, Clone, PartialEq)]
pub enum GraphInput {
    /// Arrays of records, built into a [`RowGraph`]
    Rows(RowGraphInput),
    /// Parallel arrays, built into a [`TabularGraph`]
    Columns(ColumnGraphInput),
    /// Columnar tables, built into a [`ColumnarGraph`]
    Tables(ColumnarTableInput),
}

impl From<RowGraphInput> for GraphInput {
    fn from(input: RowGraphInput) -> Self {
        Self::Rows(input)
    }
}

impl From<ColumnGraphInput> for GraphInput {
    fn from(input: ColumnGraphInput) -> Self {
        Self::Columns(input)
    }
}

impl From<ColumnarTableInput> for GraphInput {
    fn from(input: ColumnarTableInput) -> Self {
        Self::Tables(input)
    }
}

/// Build the backend matching the input shape
pub fn create_graph(input: impl Into<GraphInput>) -> Result<Box<dyn Graph>> {
    Ok(match input.into() {
        GraphInput::Rows(input) => Box::new(build_row_graph(input)),
        GraphInput::Columns(input) => Box::new(build_tabular_graph(input)?),
        GraphInput::Tables(input) => Box::new(build_columnar_graph(input)?),
    })
}

/// Build a row-oriented graph; edges with missing endpoints are dropped
pub fn build_row_graph(input: RowGraphInput) -> RowGraph {
    let mut graph = RowGraph::with_version(input.version.unwrap_or(0));
    let nodes = graph.batch_add_nodes(input.nodes.into_iter().map(NodeRecord::into_node));
    let edge_total = input.edges.len();
    let edges = graph.batch_add_edges(input.edges.into_iter().map(EdgeRecord::into_edge));
    if edges < edge_total {
        tracing::warn!("Dropped {} of {} edges", edge_total - edges, edge_total);
    }
    tracing::debug!("Built row graph with {} nodes and {} edges", nodes, edges);
    graph
}

/// Build a tabular graph over parallel arrays
pub fn build_tabular_graph(input: ColumnGraphInput) -> Result<TabularGraph> {
    Ok(TabularGraph::new(Arc::new(ColumnArraysSource::new(input)?)))
}

/// Build a columnar graph over node and edge tables
pub fn build_columnar_graph(input: ColumnarTableInput) -> Result<ColumnarGraph> {
    ColumnarGraph::from_tables(input.nodes, input.edges, input.version.unwrap_or(0))
}

/// Copy any graph into a row-oriented one.
///
/// Edges whose endpoints do not resolve are dropped.
pub fn to_row_graph(graph: &dyn Graph) -> RowGraph {
    let mut row = RowGraph::with_version(graph.version());
    row.batch_add_nodes(graph.get_nodes().iter().map(|node| {
        Node::new(node.id())
            .with_state(node.state())
            .with_selectable(node.is_selectable())
            .with_highlight_connected_edges(node.should_highlight_connected_edges())
            .with_data(node.data())
    }));
    row.batch_add_edges(graph.get_edges().iter().map(|edge| {
        Edge::new(edge.id(), edge.source_id(), edge.target_id())
            .with_directed(edge.is_directed())
            .with_state(edge.state())
            .with_data(edge.data())
    }));
    row
}

/// Return `graph` untouched when it is row-oriented, else a row copy
pub fn ensure_row_graph(graph: Box<dyn Graph>) -> Box<dyn Graph> {
    if graph.kind() == GraphKind::Row {
        return graph;
    }
    tracing::debug!("Converting {:?} graph to row-oriented storage", graph.kind());
    Box::new(to_row_graph(graph.as_ref()))
}

/// Copy any graph into columnar tables.
///
/// Each id column is integer when all its ids are integers and string when
/// all are strings. Columns mixing both use the id column kind, which keeps
/// every value as written.
pub fn to_columnar_graph(graph: &dyn Graph) -> Result<ColumnarGraph> {
    let nodes = graph.get_nodes();
    let edges = graph.get_edges();

    let id_column = |ids: Vec<EntityId>| -> Column {
        if ids.iter().all(|id| id.as_int().is_some()) {
            Column::Int(ids.iter().map(EntityId::as_int).collect())
        } else if ids.iter().all(|id| id.as_str().is_some()) {
            Column::Utf8(ids.iter().map(|id| id.as_str().map(str::to_string)).collect())
        } else {
            Column::from(ids)
        }
    };
    let data_column = |bags: Vec<PropertyMap>| -> Column {
        Column::Utf8(
            bags.into_iter()
                .map(|bag| (!bag.is_empty()).then(|| Value::Object(bag).to_string()))
                .collect(),
        )
    };

    let node_table = ColumnTable::builder()
        .rows(nodes.len())
        .column("id", id_column(nodes.iter().map(|node| node.id()).collect()))
        .column(
            "state",
            nodes
                .iter()
                .map(|node| Some(node.state().as_str().to_string()))
                .collect::<Vec<_>>(),
        )
        .column(
            "selectable",
            nodes.iter().map(|node| node.is_selectable()).collect::<Vec<_>>(),
        )
        .column(
            "highlightConnectedEdges",
            nodes
                .iter()
                .map(|node| node.should_highlight_connected_edges())
                .collect::<Vec<_>>(),
        )
        .column("data", data_column(nodes.iter().map(|node| node.data()).collect()))
        .build()?;

    let edge_table = ColumnTable::builder()
        .rows(edges.len())
        .column("id", id_column(edges.iter().map(|edge| edge.id()).collect()))
        .column(
            "sourceId",
            id_column(edges.iter().map(|edge| edge.source_id()).collect()),
        )
        .column(
            "targetId",
            id_column(edges.iter().map(|edge| edge.target_id()).collect()),
        )
        .column(
            "directed",
            edges.iter().map(|edge| edge.is_directed()).collect::<Vec<_>>(),
        )
        .column(
            "state",
            edges
                .iter()
                .map(|edge| Some(edge.state().as_str().to_string()))
                .collect::<Vec<_>>(),
        )
        .column("data", data_column(edges.iter().map(|edge| edge.data()).collect()))
        .build()?;

    ColumnarGraph::from_tables(node_table, edge_table, graph.version())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> RowGraphInput {
        serde_json::from_value(json!({
            "version": 4,
            "nodes": [
                {"id": "a", "label": "Alpha", "state": "selected", "selectable": true},
                {"id": "b", "weight": 2.5, "highlightConnectedEdges": true,
                 "attributes": {"group": 1, "tags": ["x"]}},
                {"id": "c"}
            ],
            "edges": [
                {"id": "ab", "sourceId": "a", "targetId": "b", "directed": true, "label": "ab"},
                {"id": "bc", "sourceId": "b", "targetId": "c", "state": "hover"},
                {"id": "bz", "sourceId": "b", "targetId": "z"}
            ]
        }))
        .unwrap()
    }

    fn assert_same(left: &dyn Graph, right: &dyn Graph) {
        assert_eq!(left.node_count(), right.node_count());
        assert_eq!(left.edge_count(), right.edge_count());
        for node in left.get_nodes().iter() {
            let other = right.find_node(&node.id()).unwrap();
            assert_eq!(node.state(), other.state());
            assert_eq!(node.is_selectable(), other.is_selectable());
            assert_eq!(
                node.should_highlight_connected_edges(),
                other.should_highlight_connected_edges()
            );
            assert_eq!(node.data(), other.data());
        }
        for edge in left.get_edges().iter() {
            let other = right.find_edge(&edge.id()).unwrap();
            assert_eq!(edge.source_id(), other.source_id());
            assert_eq!(edge.target_id(), other.target_id());
            assert_eq!(edge.is_directed(), other.is_directed());
            assert_eq!(edge.state(), other.state());
            assert_eq!(edge.data(), other.data());
        }
    }

    #[test]
    fn test_row_input_semantics() {
        let graph = build_row_graph(input());
        assert_eq!(graph.node_count(), 3);
        // The edge to the missing node is dropped.
        assert_eq!(graph.edge_count(), 2);
        assert!(graph.version() > 4);

        let a = graph.find_node(&EntityId::from("a")).unwrap();
        assert_eq!(a.property_value("label"), Some(json!("Alpha")));
        assert_eq!(a.state(), InteractionState::Selected);
        let b = graph.find_node(&EntityId::from("b")).unwrap();
        assert_eq!(b.property_value("weight"), Some(json!(2.5)));
        assert_eq!(b.property_value("group"), Some(json!(1)));
        assert!(b.should_highlight_connected_edges());
    }

    #[test]
    fn test_row_columnar_round_trip() {
        let row = build_row_graph(input());
        let columnar = to_columnar_graph(&row).unwrap();
        assert_eq!(columnar.kind(), GraphKind::Columnar);
        assert_same(&row, &columnar);

        let back = to_row_graph(&columnar);
        assert_same(&row, &back);
        assert_same(&back, &row);
    }

    #[test]
    fn test_integer_ids_stay_integers() {
        let mut row = RowGraph::new();
        row.batch_add_nodes([Node::new(1), Node::new(2)]);
        row.add_edge(Edge::new(10, 1, 2));
        let columnar = to_columnar_graph(&row).unwrap();
        assert_eq!(
            columnar.source().node_table().require("id").unwrap().type_name(),
            "int"
        );
        assert_eq!(columnar.find_node(&EntityId::from(1)).unwrap().degree(), 1);
    }

    #[test]
    fn test_mixed_ids_round_trip() {
        let mut row = RowGraph::new();
        row.batch_add_nodes([Node::new(1), Node::new("a")]);
        row.add_edge(Edge::new("e", 1, "a").with_directed(true));

        let columnar = to_columnar_graph(&row).unwrap();
        let table = columnar.source().node_table();
        assert_eq!(table.require("id").unwrap().type_name(), "id");
        assert_eq!(
            columnar.source().edge_table().require("id").unwrap().type_name(),
            "utf8"
        );
        assert_eq!(columnar.find_node(&EntityId::from(1)).unwrap().degree(), 1);

        let back = to_row_graph(&columnar);
        let ids: Vec<EntityId> = back.get_nodes().iter().map(|node| node.id()).collect();
        assert_eq!(ids, vec![EntityId::from(1), EntityId::from("a")]);
        assert!(back.find_node(&EntityId::from(1)).is_some());
        assert!(back.find_node(&EntityId::from("1")).is_none());
        let edge = back.find_edge(&EntityId::from("e")).unwrap();
        assert_eq!(edge.source_id(), EntityId::from(1));
        assert_eq!(edge.target_id(), EntityId::from("a"));
        assert_same(&row, &back);
    }

    #[test]
    fn test_create_graph_dispatch() {
        let rows = create_graph(input()).unwrap();
        assert_eq!(rows.kind(), GraphKind::Row);

        let columns = create_graph(ColumnArrays {
            node_ids: vec!["a".into(), "b".into()],
            edge_ids: vec!["ab".into()],
            edge_source_ids: vec!["a".into()],
            edge_target_ids: vec!["b".into()],
            ..ColumnArrays::default()
        })
        .unwrap();
        assert_eq!(columns.kind(), GraphKind::Tabular);
        assert_eq!(columns.edge_count(), 1);

        let tables: ColumnarTableInput = serde_json::from_value(json!({
            "version": 2,
            "nodes": {"columns": {"id": [1, 2], "data": ["{\"label\":\"one\"}", null]}},
            "edges": {"columns": {"id": ["e"], "sourceId": [1], "targetId": [2]}}
        }))
        .unwrap();
        let columnar = create_graph(tables).unwrap();
        assert_eq!(columnar.kind(), GraphKind::Columnar);
        assert_eq!(columnar.version(), 2);
        let one = columnar.find_node(&EntityId::from("1")).unwrap();
        assert_eq!(one.property_value("label"), Some(json!("one")));
    }

    #[test]
    fn test_ensure_row_graph_keeps_row_graphs() {
        let row: Box<dyn Graph> = Box::new(build_row_graph(input()));
        let version = row.version();
        let same = ensure_row_graph(row);
        assert_eq!(same.version(), version);
        assert!(same.as_any().downcast_ref::<RowGraph>().is_some());

        let tabular = create_graph(ColumnArrays {
            node_ids: vec![1.into()],
            ..ColumnArrays::default()
        })
        .unwrap();
        let converted = ensure_row_graph(tabular);
        assert_eq!(converted.kind(), GraphKind::Row);
        assert_eq!(converted.node_count(), 1);
    }
}
