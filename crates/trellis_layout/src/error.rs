// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layout errors.

use trellis_graph::{EntityId, GraphError};

/// Error raised while configuring or computing a layout
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// A layered layout was given an undirected edge
    #[error("Edge {0} is undirected; this layout needs directed edges")]
    UndirectedEdge(EntityId),

    /// A layered layout was given a cyclic graph
    #[error("Graph contains a cycle through node {0}")]
    Cycle(EntityId),

    /// A props patch could not be applied
    #[error("Invalid layout props: {0}")]
    InvalidProps(String),

    /// Props (de)serialization failure
    #[error("Invalid layout props: {0}")]
    PropsJson(#[from] serde_json::Error),

    /// Layout settings could not be parsed
    #[error("Invalid layout settings: {0}")]
    Settings(#[from] ron::error::SpannedError),

    /// Layout settings could not be written
    #[error("Failed to serialize layout settings: {0}")]
    SettingsWrite(#[from] ron::Error),

    /// The background simulation went away before finishing
    #[error("Simulation worker stopped unexpectedly")]
    WorkerGone,

    /// Graph construction or conversion failure
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Result type for layout operations
pub type Result<T> = std::result::Result<T, LayoutError>;
