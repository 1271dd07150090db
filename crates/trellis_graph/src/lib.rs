// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data model for Trellis.
//!
//! One [`Graph`] interface over three storage backends:
//! - [`RowGraph`]: individual node and edge objects in hash maps
//! - [`TabularGraph`]: entity views over a pluggable [`TabularSource`]
//! - [`ColumnarGraph`]: immutable column tables with override layers
//!
//! ## Versioning
//!
//! Every graph carries a monotonic version. Derived lists are memoized in a
//! [`Cache`] keyed by that version, so `get_nodes`/`get_edges` return the
//! same `Arc` until something changes.

pub mod build;
pub mod cache;
pub mod column_arrays;
pub mod columnar;
pub mod edge;
pub mod entity;
pub mod error;
pub mod events;
pub mod graph;
pub mod id;
pub mod node;
pub mod overlay;
pub mod row_graph;
pub mod table;
pub mod tabular;

pub use build::{
    build_columnar_graph, build_row_graph, build_tabular_graph, create_graph, ensure_row_graph,
    to_columnar_graph, to_row_graph, ColumnGraphInput, ColumnarTableInput, EdgeRecord,
    GraphInput, NodeRecord, RowGraphInput,
};
pub use cache::{Cache, VersionCounter};
pub use column_arrays::{ColumnArrays, ColumnArraysSource};
pub use columnar::{ColumnarGraph, ColumnarSource};
pub use edge::Edge;
pub use entity::{
    EdgeInterface, EdgeLink, EdgeRef, Incidence, InteractionState, NodeInterface, NodeRef,
    PropertyMap,
};
pub use error::{GraphError, Result};
pub use events::{GraphEvent, GraphEvents, GraphListener, ListenerId};
pub use graph::{Graph, GraphKind};
pub use id::EntityId;
pub use node::Node;
pub use overlay::{Handle, Overlay, PropertyOverlay};
pub use row_graph::RowGraph;
pub use table::{Column, ColumnTable, ColumnTableBuilder};
pub use tabular::{TabularEdge, TabularGraph, TabularNode, TabularSource};
