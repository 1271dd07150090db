// SPDX-License-Identifier: MIT OR Apache-2.0
//! Immutable columnar tables.

use crate::error::{GraphError, Result};
use crate::id::EntityId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// One immutable, nullable column
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// 64-bit integers
    Int(Arc<[Option<i64>]>),
    /// 64-bit floats
    Float(Arc<[Option<f64>]>),
    /// Booleans
    Bool(Arc<[Option<bool>]>),
    /// UTF-8 strings
    Utf8(Arc<[Option<String>]>),
    /// Identifiers that mix integers and strings, each kept as written
    Id(Arc<[Option<EntityId>]>),
}

impl Column {
    /// Number of rows
    pub fn len(&self) -> usize {
        match self {
            Self::Int(values) => values.len(),
            Self::Float(values) => values.len(),
            Self::Bool(values) => values.len(),
            Self::Utf8(values) => values.len(),
            Self::Id(values) => values.len(),
        }
    }

    /// Whether the column has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Utf8(_) => "utf8",
            Self::Id(_) => "id",
        }
    }

    /// Cell as JSON; `None` for nulls and out-of-range rows
    pub fn value(&self, row: usize) -> Option<Value> {
        match self {
            Self::Int(values) => values.get(row).copied().flatten().map(Value::from),
            Self::Float(values) => values
                .get(row)
                .copied()
                .flatten()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            Self::Bool(values) => values.get(row).copied().flatten().map(Value::Bool),
            Self::Utf8(values) => values.get(row).cloned().flatten().map(Value::String),
            Self::Id(values) => values.get(row).and_then(Option::as_ref).map(|id| match id {
                EntityId::Int(value) => Value::from(*value),
                EntityId::Str(text) => Value::String(text.clone()),
            }),
        }
    }

    /// Integer cell
    pub fn int(&self, row: usize) -> Option<i64> {
        match self {
            Self::Int(values) => values.get(row).copied().flatten(),
            _ => None,
        }
    }

    /// Boolean cell
    pub fn bool(&self, row: usize) -> Option<bool> {
        match self {
            Self::Bool(values) => values.get(row).copied().flatten(),
            _ => None,
        }
    }

    /// String cell
    pub fn str(&self, row: usize) -> Option<&str> {
        match self {
            Self::Utf8(values) => values.get(row).and_then(|value| value.as_deref()),
            _ => None,
        }
    }

    /// Cell read as an identifier (integer, string or id columns)
    pub fn entity_id(&self, row: usize) -> Option<EntityId> {
        match self {
            Self::Id(values) => values.get(row).cloned().flatten(),
            Self::Int(values) => values.get(row).copied().flatten().map(EntityId::Int),
            Self::Utf8(values) => values
                .get(row)
                .cloned()
                .flatten()
                .map(EntityId::Str),
            _ => None,
        }
    }

    /// Infer a column from JSON cells.
    ///
    /// Integers stay integers unless mixed with other numbers; ids mixing
    /// numbers and strings become strings; objects and arrays are stored as
    /// serialized JSON text.
    pub fn from_json(name: &str, cells: Vec<Value>) -> Result<Self> {
        let present = || cells.iter().filter(|cell| !cell.is_null());
        if present().all(|cell| cell.is_i64()) {
            return Ok(Self::Int(cells.iter().map(Value::as_i64).collect()));
        }
        if present().all(Value::is_number) {
            return Ok(Self::Float(cells.iter().map(Value::as_f64).collect()));
        }
        if present().all(Value::is_boolean) {
            return Ok(Self::Bool(cells.iter().map(Value::as_bool).collect()));
        }
        if present().all(|cell| !cell.is_boolean()) {
            return Ok(Self::Utf8(
                cells
                    .iter()
                    .map(|cell| match cell {
                        Value::Null => None,
                        Value::String(text) => Some(text.clone()),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ));
        }
        Err(GraphError::ColumnType {
            column: name.to_string(),
            found: "mixed",
            expected: "a single JSON type",
        })
    }
}

impl From<Vec<EntityId>> for Column {
    fn from(values: Vec<EntityId>) -> Self {
        Self::Id(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<i64>>> for Column {
    fn from(values: Vec<Option<i64>>) -> Self {
        Self::Int(values.into())
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Self::Int(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<f64>>> for Column {
    fn from(values: Vec<Option<f64>>) -> Self {
        Self::Float(values.into())
    }
}

impl From<Vec<Option<bool>>> for Column {
    fn from(values: Vec<Option<bool>>) -> Self {
        Self::Bool(values.into())
    }
}

impl From<Vec<bool>> for Column {
    fn from(values: Vec<bool>) -> Self {
        Self::Bool(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<Option<String>>> for Column {
    fn from(values: Vec<Option<String>>) -> Self {
        Self::Utf8(values.into())
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Self::Utf8(values.into_iter().map(|value| Some(value.to_string())).collect())
    }
}

/// Named columns of equal length
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct ColumnTable {
    len: usize,
    columns: IndexMap<String, Column>,
}

impl ColumnTable {
    /// Start building a table
    pub fn builder() -> ColumnTableBuilder {
        ColumnTableBuilder::default()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Column by name, or [`GraphError::MissingColumn`]
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| GraphError::MissingColumn(name.to_string()))
    }

    /// Column names in insertion order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Check that `name`, when present, has one of the `expected` types
    pub fn expect_type(&self, name: &str, expected: &[&'static str]) -> Result<()> {
        match self.column(name) {
            Some(column) if !expected.contains(&column.type_name()) => {
                Err(GraphError::ColumnType {
                    column: name.to_string(),
                    found: column.type_name(),
                    expected: expected.first().copied().unwrap_or("any"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Builder for [`ColumnTable`] that validates column lengths
#[derive(Debug, Default)]
pub struct ColumnTableBuilder {
    len: Option<usize>,
    columns: IndexMap<String, Column>,
}

impl ColumnTableBuilder {
    /// Add a column
    pub fn column(mut self, name: impl Into<String>, column: impl Into<Column>) -> Self {
        self.columns.insert(name.into(), column.into());
        self
    }

    /// Fix the row count; otherwise the first column decides
    pub fn rows(mut self, len: usize) -> Self {
        self.len = Some(len);
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<ColumnTable> {
        let len = self
            .len
            .or_else(|| self.columns.values().next().map(Column::len))
            .unwrap_or(0);
        for (name, column) in &self.columns {
            if column.len() != len {
                return Err(GraphError::ColumnLength {
                    column: name.clone(),
                    found: column.len(),
                    expected: len,
                });
            }
        }
        Ok(ColumnTable {
            len,
            columns: self.columns,
        })
    }
}

/// JSON shape of a table: `{"length": n, "columns": {name: [cells]}}`
#[derive(Debug, Serialize, Deserialize)]
struct RawTable {
    #[serde(default)]
    length: Option<usize>,
    columns: IndexMap<String, Vec<Value>>,
}

impl TryFrom<RawTable> for ColumnTable {
    type Error = GraphError;

    fn try_from(raw: RawTable) -> Result<Self> {
        let mut builder = ColumnTable::builder();
        if let Some(length) = raw.length {
            builder = builder.rows(length);
        }
        for (name, cells) in raw.columns {
            let column = Column::from_json(&name, cells)?;
            builder = builder.column(name, column);
        }
        builder.build()
    }
}
