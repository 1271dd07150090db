// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised while building or converting graphs.

use crate::id::EntityId;

/// Error when constructing a graph from external data
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A required column is absent from a columnar table
    #[error("Missing column: {0}")]
    MissingColumn(String),

    /// A column has the wrong element type
    #[error("Column {column} has type {found}, expected {expected}")]
    ColumnType {
        /// Column name
        column: String,
        /// Type found in the table
        found: &'static str,
        /// Type the backend needs
        expected: &'static str,
    },

    /// Parallel columns disagree on their length
    #[error("Column {column} has {found} rows, expected {expected}")]
    ColumnLength {
        /// Column name
        column: String,
        /// Rows in this column
        found: usize,
        /// Rows in the table
        expected: usize,
    },

    /// A row has no usable identifier
    #[error("Row {0} has no id")]
    MissingId(usize),

    /// Two records share an identifier
    #[error("Duplicate id: {0}")]
    DuplicateId(EntityId),

    /// Unknown interaction state name
    #[error("Unknown interaction state: {0}")]
    UnknownState(String),

    /// JSON (de)serialization failure
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
