// SPDX-License-Identifier: MIT OR Apache-2.0
//! Column-oriented input: one parallel array per field.
//!
//! Optional arrays may be shorter than the id array (or empty); missing
//! entries take the field's default.

use crate::entity::{InteractionState, PropertyMap};
use crate::error::{GraphError, Result};
use crate::id::EntityId;
use crate::overlay::Handle;
use crate::tabular::TabularSource;
use crate::cache::VersionCounter;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Nodes and edges as parallel arrays
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnArrays {
    /// Graph version carried by the input
    pub version: Option<u64>,
    /// Node ids; defines the node count
    pub node_ids: Vec<EntityId>,
    /// Node labels
    pub node_labels: Vec<Option<String>>,
    /// Node interaction states
    pub node_states: Vec<Option<InteractionState>>,
    /// Node selectable flags
    pub node_selectable: Vec<Option<bool>>,
    /// Node highlight-connected-edges flags
    pub node_highlight_connected_edges: Vec<Option<bool>>,
    /// Node weights
    pub node_weights: Vec<Option<f64>>,
    /// Extra node attributes
    pub node_attributes: Vec<Option<PropertyMap>>,
    /// Edge ids; defines the edge count
    pub edge_ids: Vec<EntityId>,
    /// Edge source node ids
    pub edge_source_ids: Vec<EntityId>,
    /// Edge target node ids
    pub edge_target_ids: Vec<EntityId>,
    /// Edge labels
    pub edge_labels: Vec<Option<String>>,
    /// Edge interaction states
    pub edge_states: Vec<Option<InteractionState>>,
    /// Edge directed flags
    pub edge_directed: Vec<Option<bool>>,
    /// Edge weights
    pub edge_weights: Vec<Option<f64>>,
    /// Extra edge attributes
    pub edge_attributes: Vec<Option<PropertyMap>>,
}

impl ColumnArrays {
    /// Check that every optional array fits the id arrays and that edge
    /// endpoints are complete
    pub fn validate(&self) -> Result<()> {
        let nodes = self.node_ids.len();
        let edges = self.edge_ids.len();
        check_exact("edgeSourceIds", self.edge_source_ids.len(), edges)?;
        check_exact("edgeTargetIds", self.edge_target_ids.len(), edges)?;
        check_at_most("nodeLabels", self.node_labels.len(), nodes)?;
        check_at_most("nodeStates", self.node_states.len(), nodes)?;
        check_at_most("nodeSelectable", self.node_selectable.len(), nodes)?;
        check_at_most(
            "nodeHighlightConnectedEdges",
            self.node_highlight_connected_edges.len(),
            nodes,
        )?;
        check_at_most("nodeWeights", self.node_weights.len(), nodes)?;
        check_at_most("nodeAttributes", self.node_attributes.len(), nodes)?;
        check_at_most("edgeLabels", self.edge_labels.len(), edges)?;
        check_at_most("edgeStates", self.edge_states.len(), edges)?;
        check_at_most("edgeDirected", self.edge_directed.len(), edges)?;
        check_at_most("edgeWeights", self.edge_weights.len(), edges)?;
        check_at_most("edgeAttributes", self.edge_attributes.len(), edges)?;
        Ok(())
    }

    fn node_data(&self, handle: Handle) -> PropertyMap {
        record_data(
            cell(&self.node_labels, handle),
            cell(&self.node_weights, handle),
            self.node_attributes.get(handle).and_then(Option::as_ref),
        )
    }

    fn edge_data(&self, handle: Handle) -> PropertyMap {
        record_data(
            cell(&self.edge_labels, handle),
            cell(&self.edge_weights, handle),
            self.edge_attributes.get(handle).and_then(Option::as_ref),
        )
    }
}

fn check_exact(column: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(GraphError::ColumnLength {
            column: column.to_string(),
            found,
            expected,
        });
    }
    Ok(())
}

fn check_at_most(column: &str, found: usize, expected: usize) -> Result<()> {
    if found > expected {
        return Err(GraphError::ColumnLength {
            column: column.to_string(),
            found,
            expected,
        });
    }
    Ok(())
}

fn cell<T: Clone>(column: &[Option<T>], handle: Handle) -> Option<T> {
    column.get(handle).cloned().flatten()
}

fn set_cell<T>(column: &mut Vec<Option<T>>, handle: Handle, value: Option<T>) {
    if column.len() <= handle {
        column.resize_with(handle + 1, || None);
    }
    column[handle] = value;
}

/// Property bag of one record: `label` and `weight` first, attributes on top
pub(crate) fn record_data(
    label: Option<String>,
    weight: Option<f64>,
    attributes: Option<&PropertyMap>,
) -> PropertyMap {
    let mut data = PropertyMap::new();
    if let Some(label) = label {
        data.insert("label".into(), Value::String(label));
    }
    if let Some(weight) = weight.and_then(serde_json::Number::from_f64) {
        data.insert("weight".into(), Value::Number(weight));
    }
    if let Some(attributes) = attributes {
        data.extend(attributes.clone());
    }
    data
}

/// Mutable [`TabularSource`] over [`ColumnArrays`].
///
/// Writes land in the arrays in place without moving the version;
/// [`replace`](Self::replace) swaps the arrays and bumps it.
#[derive(Debug)]
pub struct ColumnArraysSource {
    arrays: RwLock<ColumnArrays>,
    version: VersionCounter,
}

impl ColumnArraysSource {
    /// Wrap validated arrays
    pub fn new(arrays: ColumnArrays) -> Result<Self> {
        arrays.validate()?;
        let version = arrays.version.unwrap_or(0);
        Ok(Self {
            arrays: RwLock::new(arrays),
            version: VersionCounter::new(version),
        })
    }

    /// Swap in new arrays and bump the version
    pub fn replace(&self, arrays: ColumnArrays) -> Result<u64> {
        arrays.validate()?;
        *self.arrays.write() = arrays;
        Ok(self.version.bump())
    }

    /// Copy of the current arrays
    pub fn arrays(&self) -> ColumnArrays {
        self.arrays.read().clone()
    }

    fn write_attribute(
        attributes: &mut Vec<Option<PropertyMap>>,
        handle: Handle,
        key: &str,
        value: &Value,
    ) {
        let mut map = cell(attributes, handle).unwrap_or_default();
        map.insert(key.to_string(), value.clone());
        set_cell(attributes, handle, Some(map));
    }
}

impl TabularSource for ColumnArraysSource {
    fn version(&self) -> u64 {
        self.version.current()
    }

    fn node_handles(&self) -> Vec<Handle> {
        (0..self.arrays.read().node_ids.len()).collect()
    }

    fn edge_handles(&self) -> Vec<Handle> {
        (0..self.arrays.read().edge_ids.len()).collect()
    }

    fn node_id(&self, handle: Handle) -> EntityId {
        self.arrays
            .read()
            .node_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn node_state(&self, handle: Handle) -> InteractionState {
        cell(&self.arrays.read().node_states, handle).unwrap_or_default()
    }

    fn node_selectable(&self, handle: Handle) -> bool {
        cell(&self.arrays.read().node_selectable, handle).unwrap_or(false)
    }

    fn node_highlight_connected_edges(&self, handle: Handle) -> bool {
        cell(&self.arrays.read().node_highlight_connected_edges, handle).unwrap_or(false)
    }

    fn node_data(&self, handle: Handle) -> PropertyMap {
        self.arrays.read().node_data(handle)
    }

    fn edge_id(&self, handle: Handle) -> EntityId {
        self.arrays
            .read()
            .edge_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_source_id(&self, handle: Handle) -> EntityId {
        self.arrays
            .read()
            .edge_source_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_target_id(&self, handle: Handle) -> EntityId {
        self.arrays
            .read()
            .edge_target_ids
            .get(handle)
            .cloned()
            .unwrap_or_else(|| EntityId::from(handle as i64))
    }

    fn edge_directed(&self, handle: Handle) -> bool {
        cell(&self.arrays.read().edge_directed, handle).unwrap_or(false)
    }

    fn edge_state(&self, handle: Handle) -> InteractionState {
        cell(&self.arrays.read().edge_states, handle).unwrap_or_default()
    }

    fn edge_data(&self, handle: Handle) -> PropertyMap {
        self.arrays.read().edge_data(handle)
    }

    fn write_node_state(&self, handle: Handle, state: InteractionState) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.node_ids.len() {
            return false;
        }
        set_cell(&mut arrays.node_states, handle, Some(state));
        true
    }

    fn write_node_property(&self, handle: Handle, key: &str, value: &Value) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.node_ids.len() {
            return false;
        }
        Self::write_attribute(&mut arrays.node_attributes, handle, key, value);
        true
    }

    fn write_node_data(&self, handle: Handle, data: &PropertyMap) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.node_ids.len() {
            return false;
        }
        if handle < arrays.node_labels.len() {
            arrays.node_labels[handle] = None;
        }
        if handle < arrays.node_weights.len() {
            arrays.node_weights[handle] = None;
        }
        set_cell(&mut arrays.node_attributes, handle, Some(data.clone()));
        true
    }

    fn write_edge_state(&self, handle: Handle, state: InteractionState) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.edge_ids.len() {
            return false;
        }
        set_cell(&mut arrays.edge_states, handle, Some(state));
        true
    }

    fn write_edge_property(&self, handle: Handle, key: &str, value: &Value) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.edge_ids.len() {
            return false;
        }
        Self::write_attribute(&mut arrays.edge_attributes, handle, key, value);
        true
    }

    fn write_edge_data(&self, handle: Handle, data: &PropertyMap) -> bool {
        let mut arrays = self.arrays.write();
        if handle >= arrays.edge_ids.len() {
            return false;
        }
        if handle < arrays.edge_labels.len() {
            arrays.edge_labels[handle] = None;
        }
        if handle < arrays.edge_weights.len() {
            arrays.edge_weights[handle] = None;
        }
        set_cell(&mut arrays.edge_attributes, handle, Some(data.clone()));
        true
    }
}
