// SPDX-License-Identifier: MIT OR Apache-2.0
//! Background simulation runs.
//!
//! Each run owns a thread and talks to the layout only through channels:
//! commands go in, tick and end messages come out. Ticks carry only the
//! nodes that moved since the previous tick plus the edges touching them.
//! The end message carries everything and is always the last one sent.

use super::columns::{EdgeUpdateTable, NodeUpdateTable};
use super::simulation::{ForceSettings, Simulation};
use crate::layout::Point;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use trellis_graph::EntityId;
use uuid::Uuid;

/// Edge as sent to the simulation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationEdge {
    /// Edge id
    pub id: EntityId,
    /// Source node id
    pub source: EntityId,
    /// Target node id
    pub target: EntityId,
}

/// Everything a run needs
#[derive(Debug, Clone)]
pub struct SimulationRequest {
    /// Starting positions and pins
    pub nodes: NodeUpdateTable,
    /// Collision radius per node row
    pub radii: Option<Vec<f64>>,
    /// Edges
    pub edges: Vec<SimulationEdge>,
    /// Force settings
    pub options: ForceSettings,
}

/// Progress report kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageKind {
    /// Intermediate step; progress in `(0, 1]`
    Tick {
        /// Share of ticks done
        progress: f64,
    },
    /// Final positions
    End,
}

/// Message from a run
#[derive(Debug, Clone)]
pub struct SimulationMessage {
    /// Run that produced it
    pub run: Uuid,
    /// Tick or end
    pub kind: MessageKind,
    /// Moved nodes (all nodes for `End`)
    pub nodes: Option<NodeUpdateTable>,
    /// Edges touching moved nodes (all edges for `End`)
    pub edges: Option<EdgeUpdateTable>,
}

/// Instruction for a running simulation
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Pin a node
    Lock {
        /// Node id
        id: EntityId,
        /// Pinned position
        point: Point,
    },
    /// Release a node
    Unlock {
        /// Node id
        id: EntityId,
    },
}

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Fresh, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the run to stop
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Owner side of a background run. Dropping it cancels the run.
#[derive(Debug)]
pub struct SimulationHandle {
    run: Uuid,
    commands: mpsc::UnboundedSender<WorkerCommand>,
    messages: mpsc::UnboundedReceiver<SimulationMessage>,
    cancel: CancelToken,
}

impl SimulationHandle {
    /// Run id stamped on every message
    pub fn run(&self) -> Uuid {
        self.run
    }

    /// Forward a command; returns `false` once the run is gone
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Stop the run before it posts again
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next message without waiting
    pub fn try_recv(&mut self) -> Result<SimulationMessage, mpsc::error::TryRecvError> {
        self.messages.try_recv()
    }

    /// Next message, blocking the current thread; `None` once the run is
    /// over and drained. Must not be called from async code.
    pub fn blocking_recv(&mut self) -> Option<SimulationMessage> {
        self.messages.blocking_recv()
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start a run on its own thread
pub fn spawn_simulation(request: SimulationRequest) -> SimulationHandle {
    let run = Uuid::new_v4();
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (message_tx, message_rx) = mpsc::unbounded_channel();
    let cancel = CancelToken::new();
    let token = cancel.clone();

    std::thread::spawn(move || {
        simulate(
            run,
            request,
            &token,
            || {
                let mut pending = Vec::new();
                while let Ok(command) = command_rx.try_recv() {
                    pending.push(command);
                }
                pending
            },
            |message| message_tx.send(message).is_ok(),
        );
    });

    tracing::debug!(%run, "Spawned force simulation");
    SimulationHandle {
        run,
        commands: command_tx,
        messages: message_rx,
        cancel,
    }
}

/// Run a simulation to completion on the current thread.
///
/// `commands` is drained before every tick and `emit` receives each
/// message; the run stops early when `emit` returns `false` or `cancel`
/// is set.
pub fn simulate(
    run: Uuid,
    request: SimulationRequest,
    cancel: &CancelToken,
    mut commands: impl FnMut() -> Vec<WorkerCommand>,
    mut emit: impl FnMut(SimulationMessage) -> bool,
) {
    let SimulationRequest {
        nodes,
        radii,
        edges,
        mut options,
    } = request;
    let mut sim_nodes = nodes.to_sim_nodes();
    if let Some(radii) = &radii {
        for (node, radius) in sim_nodes.iter_mut().zip(radii) {
            node.radius = *radius;
        }
    }
    options.collide = radii.is_some();

    let pairs: Vec<(EntityId, EntityId)> = edges
        .iter()
        .map(|edge| (edge.source.clone(), edge.target.clone()))
        .collect();
    let mut sim = Simulation::new(sim_nodes, &pairs, options);

    let row_of: std::collections::HashMap<&EntityId, usize> = nodes
        .columns
        .id
        .iter()
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let ends: Vec<Option<(usize, usize)>> = edges
        .iter()
        .map(|edge| Some((*row_of.get(&edge.source)?, *row_of.get(&edge.target)?)))
        .collect();
    let mut incident = vec![Vec::new(); sim.nodes().len()];
    for (edge, end) in ends.iter().enumerate() {
        if let Some((s, t)) = *end {
            incident[s].push(edge);
            if s != t {
                incident[t].push(edge);
            }
        }
    }

    let ticks = sim.tick_count();
    let mut reported: Vec<Point> = sim.nodes().iter().map(|node| node.position()).collect();
    for step in 0..ticks {
        if cancel.is_cancelled() {
            tracing::debug!(%run, step, "Force simulation cancelled");
            return;
        }
        for command in commands() {
            match command {
                WorkerCommand::Lock { id, point } => sim.pin(&id, point),
                WorkerCommand::Unlock { id } => sim.unpin(&id),
            };
        }
        sim.tick();

        let mut moved = Vec::new();
        for (i, node) in sim.nodes().iter().enumerate() {
            let position = node.position();
            if position != reported[i] {
                reported[i] = position;
                moved.push(i);
            }
        }
        let mut touched = vec![false; edges.len()];
        for &i in &moved {
            for &edge in &incident[i] {
                touched[edge] = true;
            }
        }
        let nodes_table = NodeUpdateTable::from_nodes(moved.iter().map(|&i| &sim.nodes()[i]));
        let edges_table = edge_table(&edges, &ends, &reported, |edge| touched[edge]);
        let message = SimulationMessage {
            run,
            kind: MessageKind::Tick {
                progress: (step + 1) as f64 / ticks as f64,
            },
            nodes: (!nodes_table.is_empty()).then_some(nodes_table),
            edges: (!edges_table.is_empty()).then_some(edges_table),
        };
        if cancel.is_cancelled() || !emit(message) {
            return;
        }
    }

    if cancel.is_cancelled() {
        return;
    }
    let message = SimulationMessage {
        run,
        kind: MessageKind::End,
        nodes: Some(NodeUpdateTable::from_nodes(sim.nodes())),
        edges: Some(edge_table(&edges, &ends, &reported, |_| true)),
    };
    emit(message);
    tracing::debug!(%run, ticks, "Force simulation finished");
}

fn edge_table(
    edges: &[SimulationEdge],
    ends: &[Option<(usize, usize)>],
    positions: &[Point],
    include: impl Fn(usize) -> bool,
) -> EdgeUpdateTable {
    let mut table = EdgeUpdateTable::default();
    for (i, edge) in edges.iter().enumerate() {
        if let Some((s, t)) = ends[i] {
            if include(i) {
                table.push(edge.id.clone(), positions[s], positions[t]);
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::force::simulation::SimNode;

    fn two_node_request() -> SimulationRequest {
        SimulationRequest {
            nodes: NodeUpdateTable::from_nodes(&[SimNode::new("a"), SimNode::new("b")]),
            radii: None,
            edges: vec![SimulationEdge {
                id: "ab".into(),
                source: "a".into(),
                target: "b".into(),
            }],
            options: ForceSettings::default(),
        }
    }

    #[test]
    fn test_ticks_then_full_end() {
        let mut handle = spawn_simulation(two_node_request());
        let mut progress = Vec::new();
        let mut end = None;
        while let Some(message) = handle.blocking_recv() {
            assert_eq!(message.run, handle.run());
            match message.kind {
                MessageKind::Tick { progress: value } => {
                    assert!(end.is_none(), "tick after end");
                    progress.push(value);
                }
                MessageKind::End => end = Some(message),
            }
        }

        assert!(!progress.is_empty());
        assert!(progress.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(progress.last().copied(), Some(1.0));

        let end = end.expect("end message");
        let nodes = end.nodes.unwrap();
        assert_eq!(nodes.length, 2);
        let mut ids = nodes.columns.id.clone();
        ids.sort();
        assert_eq!(ids, vec![EntityId::from("a"), EntityId::from("b")]);
        assert_eq!(end.edges.unwrap().length, 1);
    }

    #[test]
    fn test_ticks_carry_only_moved_nodes() {
        let mut request = two_node_request();
        let mut pinned = SimNode::new("a");
        pinned.pin([0.0, 0.0]);
        request.nodes = NodeUpdateTable::from_nodes(&[pinned, SimNode::new("b").at([10.0, 0.0])]);

        let mut messages = Vec::new();
        simulate(Uuid::nil(), request, &CancelToken::new(), Vec::new, |message| {
            messages.push(message);
            true
        });
        let (end, ticks) = messages.split_last().unwrap();
        assert_eq!(end.kind, MessageKind::End);
        for tick in ticks {
            if let Some(nodes) = &tick.nodes {
                assert!(!nodes.columns.id.contains(&EntityId::from("a")));
            }
        }
    }

    #[test]
    fn test_lock_reaches_next_tick() {
        let mut messages = Vec::new();
        let mut sent = false;
        simulate(
            Uuid::nil(),
            two_node_request(),
            &CancelToken::new(),
            || {
                if sent {
                    return Vec::new();
                }
                sent = true;
                vec![WorkerCommand::Lock {
                    id: "a".into(),
                    point: [500.0, 500.0],
                }]
            },
            |message| {
                messages.push(message);
                true
            },
        );
        let first = messages[0].nodes.as_ref().unwrap();
        let row = first.rows().find(|(id, _, _)| **id == EntityId::from("a")).unwrap();
        assert_eq!(row.1, [500.0, 500.0]);
        assert_eq!(row.2, Some([500.0, 500.0]));
    }

    #[test]
    fn test_cancelled_run_stops_posting() {
        let cancel = CancelToken::new();
        let mut count = 0;
        simulate(Uuid::nil(), two_node_request(), &cancel, Vec::new, |_| {
            count += 1;
            if count == 3 {
                cancel.cancel();
            }
            true
        });
        assert_eq!(count, 3);

        let handle = spawn_simulation(two_node_request());
        handle.cancel();
        assert!(handle.is_cancelled());
    }
}
