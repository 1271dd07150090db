// SPDX-License-Identifier: MIT OR Apache-2.0
//! Column tables carried by simulation messages.
//!
//! One id column plus parallel numeric columns. The vectors are moved
//! through the channel, never copied. `NaN` in a pin column means "not
//! pinned"; `NaN` in a position column means "not placed yet".

use super::simulation::SimNode;
use crate::layout::Point;
use serde::Serialize;
use trellis_graph::EntityId;

/// Node columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeColumns {
    /// Node ids
    pub id: Vec<EntityId>,
    /// x positions
    pub x: Vec<f64>,
    /// y positions
    pub y: Vec<f64>,
    /// Pinned x
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fx: Option<Vec<f64>>,
    /// Pinned y
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fy: Option<Vec<f64>>,
    /// x velocities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vx: Option<Vec<f64>>,
    /// y velocities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vy: Option<Vec<f64>>,
}

/// Node positions as a column table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeUpdateTable {
    /// Row count
    pub length: usize,
    /// Columns, each `length` long
    pub columns: NodeColumns,
}

impl NodeUpdateTable {
    /// Table with pin and velocity columns for the given nodes
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a SimNode>) -> Self {
        let mut columns = NodeColumns {
            fx: Some(Vec::new()),
            fy: Some(Vec::new()),
            vx: Some(Vec::new()),
            vy: Some(Vec::new()),
            ..NodeColumns::default()
        };
        for node in nodes {
            columns.id.push(node.id.clone());
            columns.x.push(node.x);
            columns.y.push(node.y);
            push(&mut columns.fx, node.fx.unwrap_or(f64::NAN));
            push(&mut columns.fy, node.fy.unwrap_or(f64::NAN));
            push(&mut columns.vx, node.vx);
            push(&mut columns.vy, node.vy);
        }
        Self {
            length: columns.id.len(),
            columns,
        }
    }

    /// Rows as `(id, position, pin)`
    pub fn rows(&self) -> impl Iterator<Item = (&EntityId, Point, Option<Point>)> + '_ {
        let columns = &self.columns;
        columns.id.iter().enumerate().map(move |(i, id)| {
            let pin = match (cell(&columns.fx, i), cell(&columns.fy, i)) {
                (Some(fx), Some(fy)) => Some([fx, fy]),
                _ => None,
            };
            (id, [columns.x[i], columns.y[i]], pin)
        })
    }

    /// Unpack into simulation nodes
    pub fn to_sim_nodes(&self) -> Vec<SimNode> {
        self.rows()
            .enumerate()
            .map(|(i, (id, [x, y], _))| SimNode {
                id: id.clone(),
                x,
                y,
                vx: cell(&self.columns.vx, i).unwrap_or(0.0),
                vy: cell(&self.columns.vy, i).unwrap_or(0.0),
                fx: cell(&self.columns.fx, i),
                fy: cell(&self.columns.fy, i),
                radius: 0.0,
            })
            .collect()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Edge columns
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeColumns {
    /// Edge ids
    pub id: Vec<EntityId>,
    /// Start x
    pub source_x: Vec<f64>,
    /// Start y
    pub source_y: Vec<f64>,
    /// End x
    pub target_x: Vec<f64>,
    /// End y
    pub target_y: Vec<f64>,
    /// Interior points per edge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_points: Option<Vec<Vec<Point>>>,
}

/// Edge endpoints as a column table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgeUpdateTable {
    /// Row count
    pub length: usize,
    /// Columns, each `length` long
    pub columns: EdgeColumns,
}

impl EdgeUpdateTable {
    /// Append a straight edge
    pub fn push(&mut self, id: EntityId, source: Point, target: Point) {
        let columns = &mut self.columns;
        columns.id.push(id);
        columns.source_x.push(source[0]);
        columns.source_y.push(source[1]);
        columns.target_x.push(target[0]);
        columns.target_y.push(target[1]);
        if let Some(points) = &mut columns.control_points {
            points.push(Vec::new());
        }
        self.length += 1;
    }

    /// Rows as `(id, source, target, control points)`
    pub fn rows(&self) -> impl Iterator<Item = (&EntityId, Point, Point, &[Point])> + '_ {
        let columns = &self.columns;
        columns.id.iter().enumerate().map(move |(i, id)| {
            let bends = columns
                .control_points
                .as_ref()
                .and_then(|points| points.get(i))
                .map_or(&[][..], Vec::as_slice);
            (
                id,
                [columns.source_x[i], columns.source_y[i]],
                [columns.target_x[i], columns.target_y[i]],
                bends,
            )
        })
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

fn push(column: &mut Option<Vec<f64>>, value: f64) {
    if let Some(values) = column {
        values.push(value);
    }
}

/// Finite value of an optional column
fn cell(column: &Option<Vec<f64>>, row: usize) -> Option<f64> {
    column
        .as_ref()
        .and_then(|values| values.get(row).copied())
        .filter(|value| !value.is_nan())
}
