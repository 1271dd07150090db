// SPDX-License-Identifier: MIT OR Apache-2.0
//! Load a graph and layout settings, run the layout, collect positions.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use trellis_graph::{build_row_graph, RowGraphInput};
use trellis_layout::{EdgePosition, GraphEngine, LayoutError, LayoutSettings, LayoutState, Point};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Everything that can stop a run
#[derive(Debug, Error)]
pub enum AppError {
    /// Command line could not be understood
    #[error("usage: trellis <graph.json> [settings.ron]")]
    Usage,

    /// A file could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The graph file is not valid row input
    #[error("invalid graph file: {0}")]
    Graph(#[from] serde_json::Error),

    /// The settings file is not valid
    #[error(transparent)]
    Settings(#[from] LayoutError),

    /// The layout finished in the error state
    #[error("layout failed: {0}")]
    Layout(String),
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// Row-oriented JSON graph
    pub graph: PathBuf,
    /// Optional RON layout settings
    pub settings: Option<PathBuf>,
}

impl Args {
    /// Parse arguments, program name excluded
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, AppError> {
        let mut args = args.into_iter();
        let graph = args.next().ok_or(AppError::Usage)?;
        let settings = args.next();
        if args.next().is_some() {
            return Err(AppError::Usage);
        }
        Ok(Self {
            graph: graph.into(),
            settings: settings.map(PathBuf::from),
        })
    }
}

/// Positions of everything visible after the layout settled
#[derive(Debug, Default, Serialize)]
pub struct LayoutReport {
    /// Node positions by id
    pub nodes: BTreeMap<String, Point>,
    /// Edge geometry by id
    pub edges: BTreeMap<String, EdgePosition>,
}

fn read(path: &Path) -> Result<String, AppError> {
    fs::read_to_string(path).map_err(|source| AppError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse row-oriented graph JSON
pub fn parse_graph(text: &str) -> Result<RowGraphInput, AppError> {
    Ok(serde_json::from_str(text)?)
}

/// Lay out `input` with `settings` and collect the result
pub fn lay_out(input: RowGraphInput, settings: &LayoutSettings) -> Result<LayoutReport, AppError> {
    let graph = build_row_graph(input);
    let mut engine = GraphEngine::from_settings(Box::new(graph), settings);
    engine.run();

    let state = engine.block_until_settled(POLL_INTERVAL);
    if state == LayoutState::Error {
        let message = engine.layout_error().unwrap_or("unknown error").to_string();
        return Err(AppError::Layout(message));
    }

    let mut report = LayoutReport::default();
    for node in engine.visible_nodes() {
        let id = node.id();
        if let Some(point) = engine.node_position(&id).point() {
            report.nodes.insert(id.to_string(), point);
        }
    }
    for visible in engine.visible_edges() {
        let id = visible.edge.id();
        if let Some(position) = engine.edge_position(&id) {
            report.edges.insert(id.to_string(), position);
        }
    }
    Ok(report)
}

/// Full run for parsed arguments; returns the JSON to print
pub fn run(args: &Args) -> Result<String, AppError> {
    let input = parse_graph(&read(&args.graph)?)?;
    let settings = match &args.settings {
        Some(path) => LayoutSettings::from_ron(&read(path)?)?,
        None => LayoutSettings::default(),
    };
    tracing::info!(
        layout = settings.layout_name(),
        nodes = input.nodes.len(),
        edges = input.edges.len(),
        "Laying out {}",
        args.graph.display()
    );
    let report = lay_out(input, &settings)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_layout::{DagLayoutOptions, ForceLayoutOptions};

    const CHAIN: &str = r#"{
        "nodes": [{"id": "a"}, {"id": "b"}, {"id": "c"}, {"id": "d"}],
        "edges": [
            {"id": "ab", "sourceId": "a", "targetId": "b", "directed": true},
            {"id": "bc", "sourceId": "b", "targetId": "c", "directed": true},
            {"id": "cd", "sourceId": "c", "targetId": "d", "directed": true}
        ]
    }"#;

    #[test]
    fn test_parse_args() {
        let args = Args::parse(["g.json".to_string()]).unwrap();
        assert_eq!(args.graph, PathBuf::from("g.json"));
        assert_eq!(args.settings, None);

        let args = Args::parse(["g.json".to_string(), "s.ron".to_string()]).unwrap();
        assert_eq!(args.settings, Some(PathBuf::from("s.ron")));

        assert!(matches!(Args::parse(Vec::new()), Err(AppError::Usage)));
        assert!(matches!(
            Args::parse(["a", "b", "c"].map(String::from)),
            Err(AppError::Usage)
        ));
    }

    #[test]
    fn test_dag_report() {
        let input = parse_graph(CHAIN).unwrap();
        let report = lay_out(input, &LayoutSettings::default()).unwrap();
        assert_eq!(report.nodes.len(), 4);
        assert_eq!(report.edges.len(), 3);
        assert!(report.nodes["a"][1] < report.nodes["d"][1]);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["nodes"]["b"].is_array());
        assert!(json["edges"]["bc"].is_object());
    }

    #[test]
    fn test_collapsed_chain_report() {
        let input = parse_graph(CHAIN).unwrap();
        let settings = LayoutSettings::Dag(DagLayoutOptions {
            collapse_linear_chains: true,
            ..DagLayoutOptions::default()
        });
        let report = lay_out(input, &settings).unwrap();
        assert_eq!(report.nodes.keys().collect::<Vec<_>>(), ["a"]);
        assert!(report.edges.is_empty());
    }

    #[test]
    fn test_layout_errors_surface() {
        let input = parse_graph(
            r#"{"nodes": [{"id": 1}, {"id": 2}], "edges": [{"id": "loose", "sourceId": 1, "targetId": 2}]}"#,
        )
        .unwrap();
        let error = lay_out(input, &LayoutSettings::default()).unwrap_err();
        assert!(matches!(error, AppError::Layout(message) if message.contains("Edge loose is undirected")));
    }

    #[test]
    fn test_force_report() {
        let input = parse_graph(CHAIN).unwrap();
        let report = lay_out(input, &LayoutSettings::Force(ForceLayoutOptions::default())).unwrap();
        assert_eq!(report.nodes.len(), 4);
        assert_eq!(report.edges["ab"].source(), report.nodes["a"]);
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(parse_graph("{\"nodes\": 3}"), Err(AppError::Graph(_))));
        let missing = Args {
            graph: PathBuf::from("/nonexistent/graph.json"),
            settings: None,
        };
        assert!(matches!(run(&missing), Err(AppError::Read { .. })));
    }
}
