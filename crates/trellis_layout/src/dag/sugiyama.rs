// SPDX-License-Identifier: MIT OR Apache-2.0
//! Layered drawing pipeline.
//!
//! 1. Rank nodes into layers
//! 2. Split edges spanning several layers with dummy nodes
//! 3. Reorder layers to reduce crossings
//! 4. Assign coordinates along each layer
//! 5. Rotate into the configured orientation and optionally center

use crate::error::{LayoutError, Result};
use crate::layout::Point;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet, VecDeque};
use trellis_graph::EntityId;

const SWEEPS: usize = 12;
const QUAD_ROUNDS: usize = 32;

/// Widest layer [`Decross::Opt`] permutes exhaustively
pub const OPT_LAYER_LIMIT: usize = 7;

/// Layer assignment strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Layering {
    /// Each node one layer below its deepest predecessor
    #[default]
    LongestPath,
    /// Longest path, then nodes slide toward the side with more edges to
    /// shorten total edge length
    Simplex,
    /// One layer per node, in topological order
    Topological,
}

/// Crossing reduction strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Decross {
    /// Alternating barycenter sweeps
    #[default]
    TwoLayer,
    /// Barycenter sweeps, then exhaustive search on narrow layers
    Opt,
}

/// Coordinate assignment within a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Coord {
    /// Evenly spaced, each layer centered on the widest
    #[default]
    Center,
    /// Each node pulled toward its parents, top down
    Greedy,
    /// Iterative relaxation toward all neighbors, minimising squared
    /// edge offsets
    Quad,
}

/// Direction ranks grow in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Orientation {
    /// Ranks grow along +y
    #[default]
    TopToBottom,
    /// Ranks grow along -y
    BottomToTop,
    /// Ranks grow along +x
    LeftToRight,
    /// Ranks grow along -x
    RightToLeft,
}

impl Orientation {
    fn is_vertical(self) -> bool {
        matches!(self, Self::TopToBottom | Self::BottomToTop)
    }

    fn place(self, along: f64, rank: f64) -> Point {
        match self {
            Self::TopToBottom => [along, rank],
            Self::BottomToTop => [along, -rank],
            Self::LeftToRight => [rank, along],
            Self::RightToLeft => [-rank, along],
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq)]
pub struct SugiyamaConfig {
    /// Layer assignment
    pub layering: Layering,
    /// Crossing reduction
    pub decross: Decross,
    /// Coordinate assignment
    pub coord: Coord,
    /// Output orientation
    pub orientation: Orientation,
    /// Node width and height
    pub node_size: [f64; 2],
    /// Horizontal and vertical gap between nodes
    pub gap: [f64; 2],
    /// Center the drawing on the origin
    pub center: bool,
}

impl Default for SugiyamaConfig {
    fn default() -> Self {
        Self {
            layering: Layering::default(),
            decross: Decross::default(),
            coord: Coord::default(),
            orientation: Orientation::default(),
            node_size: [100.0, 40.0],
            gap: [20.0, 40.0],
            center: true,
        }
    }
}

impl SugiyamaConfig {
    /// Spacing within a layer and between layers
    fn steps(&self) -> (f64, f64) {
        let horizontal = self.node_size[0] + self.gap[0];
        let vertical = self.node_size[1] + self.gap[1];
        if self.orientation.is_vertical() {
            (horizontal, vertical)
        } else {
            (vertical, horizontal)
        }
    }
}

/// Output of [`solve`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolvedLayout {
    /// Node centers
    pub nodes: HashMap<EntityId, Point>,
    /// Layer of each node
    pub ranks: HashMap<EntityId, usize>,
    /// Bend points per ordered `(source, target)` pair, shared by parallel
    /// edges
    pub edges: HashMap<(EntityId, EntityId), Vec<Point>>,
}

/// Lay out `nodes` connected by directed `edges`.
///
/// Edges naming unknown nodes are ignored and parallel edges collapse into
/// one pair. Fails with [`LayoutError::Cycle`] when the edges are cyclic.
pub fn solve(
    nodes: &[EntityId],
    edges: &[(EntityId, EntityId)],
    config: &SugiyamaConfig,
) -> Result<SolvedLayout> {
    let index: HashMap<&EntityId, usize> =
        nodes.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let mut pairs = Vec::new();
    let mut seen = HashSet::new();
    for (source, target) in edges {
        let (Some(&s), Some(&t)) = (index.get(source), index.get(target)) else {
            continue;
        };
        if s == t {
            return Err(LayoutError::Cycle(source.clone()));
        }
        if seen.insert((s, t)) {
            pairs.push((s, t));
        }
    }

    let mut succ = vec![Vec::new(); nodes.len()];
    let mut pred = vec![Vec::new(); nodes.len()];
    for &(s, t) in &pairs {
        succ[s].push(t);
        pred[t].push(s);
    }
    let order =
        topological_order(&succ, &pred).map_err(|node| LayoutError::Cycle(nodes[node].clone()))?;
    let ranks = match config.layering {
        Layering::LongestPath => longest_path(&order, &pred),
        Layering::Simplex => simplex(&order, &pred, &succ),
        Layering::Topological => {
            let mut ranks = vec![0; nodes.len()];
            for (rank, &node) in order.iter().enumerate() {
                ranks[node] = rank;
            }
            ranks
        }
    };

    let mut graph = LayerGraph::new(&ranks, &pairs);
    graph.minimize_crossings();
    if config.decross == Decross::Opt {
        graph.optimize_crossings();
    }

    let (order_step, rank_step) = config.steps();
    let mut along = graph.assign_coordinates(config.coord, order_step);
    let min = along.iter().copied().fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        along.iter_mut().for_each(|x| *x -= min);
    }
    let mut points: Vec<Point> = along
        .iter()
        .zip(&graph.rank)
        .map(|(&x, &rank)| config.orientation.place(x, rank as f64 * rank_step))
        .collect();
    if config.center {
        center(&mut points);
    }

    Ok(SolvedLayout {
        nodes: nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), points[i]))
            .collect(),
        ranks: nodes
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), ranks[i]))
            .collect(),
        edges: graph
            .paths
            .iter()
            .map(|((s, t), dummies)| {
                (
                    (nodes[*s].clone(), nodes[*t].clone()),
                    dummies.iter().map(|&d| points[d]).collect(),
                )
            })
            .collect(),
    })
}

/// Kahn's algorithm; on failure returns a node lying on a cycle
fn topological_order(succ: &[Vec<usize>], pred: &[Vec<usize>]) -> std::result::Result<Vec<usize>, usize> {
    let mut remaining: Vec<usize> = pred.iter().map(Vec::len).collect();
    let mut queue: VecDeque<usize> = (0..succ.len()).filter(|&v| remaining[v] == 0).collect();
    let mut done = vec![false; succ.len()];
    let mut order = Vec::with_capacity(succ.len());
    while let Some(v) = queue.pop_front() {
        done[v] = true;
        order.push(v);
        for &w in &succ[v] {
            remaining[w] -= 1;
            if remaining[w] == 0 {
                queue.push_back(w);
            }
        }
    }
    if order.len() == succ.len() {
        return Ok(order);
    }

    // Every leftover node has a leftover predecessor; walking back must loop.
    let mut node = (0..succ.len()).find(|&v| !done[v]).unwrap_or(0);
    let mut visited = HashSet::new();
    while visited.insert(node) {
        match pred[node].iter().find(|&&p| !done[p]) {
            Some(&previous) => node = previous,
            None => break,
        }
    }
    Err(node)
}

fn longest_path(order: &[usize], pred: &[Vec<usize>]) -> Vec<usize> {
    let mut ranks = vec![0; pred.len()];
    for &v in order {
        ranks[v] = pred[v].iter().map(|&u| ranks[u] + 1).max().unwrap_or(0);
    }
    ranks
}

/// Longest-path ranks improved by moving nodes to the bound on the side
/// with more edges. Each move strictly shortens total edge length.
fn simplex(order: &[usize], pred: &[Vec<usize>], succ: &[Vec<usize>]) -> Vec<usize> {
    let mut ranks: Vec<i64> = longest_path(order, pred)
        .into_iter()
        .map(|rank| rank as i64)
        .collect();
    for _ in 0..=order.len() {
        let mut moved = false;
        for &v in order {
            let target = match pred[v].len().cmp(&succ[v].len()) {
                Ordering::Greater => pred[v].iter().map(|&u| ranks[u] + 1).max(),
                Ordering::Less => succ[v].iter().map(|&w| ranks[w] - 1).min(),
                Ordering::Equal => None,
            };
            if let Some(target) = target {
                if target != ranks[v] {
                    ranks[v] = target;
                    moved = true;
                }
            }
        }
        if !moved {
            break;
        }
    }
    let min = ranks.iter().copied().min().unwrap_or(0);
    ranks.into_iter().map(|rank| (rank - min) as usize).collect()
}

/// Proper layered graph: real nodes first, dummies after
struct LayerGraph {
    rank: Vec<usize>,
    up: Vec<Vec<usize>>,
    down: Vec<Vec<usize>>,
    layers: Vec<Vec<usize>>,
    paths: Vec<((usize, usize), Vec<usize>)>,
}

impl LayerGraph {
    fn new(ranks: &[usize], pairs: &[(usize, usize)]) -> Self {
        let mut rank = ranks.to_vec();
        let mut up = vec![Vec::new(); ranks.len()];
        let mut down = vec![Vec::new(); ranks.len()];
        let mut paths = Vec::with_capacity(pairs.len());
        for &(s, t) in pairs {
            let mut previous = s;
            let mut dummies = Vec::new();
            for layer in ranks[s] + 1..ranks[t] {
                let dummy = rank.len();
                rank.push(layer);
                up.push(vec![previous]);
                down.push(Vec::new());
                down[previous].push(dummy);
                dummies.push(dummy);
                previous = dummy;
            }
            down[previous].push(t);
            up[t].push(previous);
            paths.push(((s, t), dummies));
        }

        let depth = rank.iter().max().map_or(0, |r| r + 1);
        let mut layers = vec![Vec::new(); depth];
        for (node, &r) in rank.iter().enumerate() {
            layers[r].push(node);
        }
        Self {
            rank,
            up,
            down,
            layers,
            paths,
        }
    }

    fn crossings(&self) -> usize {
        self.layers
            .windows(2)
            .map(|pair| layer_crossings(&pair[0], &pair[1], &self.down))
            .sum()
    }

    fn crossings_around(&self, layer: usize) -> usize {
        let mut total = 0;
        if layer > 0 {
            total += layer_crossings(&self.layers[layer - 1], &self.layers[layer], &self.down);
        }
        if layer + 1 < self.layers.len() {
            total += layer_crossings(&self.layers[layer], &self.layers[layer + 1], &self.down);
        }
        total
    }

    /// Alternating barycenter sweeps, keeping the best order seen
    fn minimize_crossings(&mut self) {
        if self.layers.len() < 2 {
            return;
        }
        let mut best = self.layers.clone();
        let mut best_crossings = self.crossings();
        for _ in 0..SWEEPS {
            if best_crossings == 0 {
                break;
            }
            for layer in 1..self.layers.len() {
                self.reorder(layer, layer - 1, true);
            }
            for layer in (0..self.layers.len() - 1).rev() {
                self.reorder(layer, layer + 1, false);
            }
            let crossings = self.crossings();
            if crossings < best_crossings {
                best_crossings = crossings;
                best = self.layers.clone();
            }
        }
        self.layers = best;
    }

    fn reorder(&mut self, layer: usize, fixed: usize, upward: bool) {
        let position: HashMap<usize, usize> = self.layers[fixed]
            .iter()
            .enumerate()
            .map(|(i, &node)| (node, i))
            .collect();
        let neighbors = if upward { &self.up } else { &self.down };
        let mut keyed: Vec<(f64, usize, usize)> = self.layers[layer]
            .iter()
            .enumerate()
            .map(|(i, &node)| {
                let linked: Vec<usize> = neighbors[node]
                    .iter()
                    .filter_map(|n| position.get(n).copied())
                    .collect();
                let key = if linked.is_empty() {
                    i as f64
                } else {
                    linked.iter().sum::<usize>() as f64 / linked.len() as f64
                };
                (key, i, node)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        self.layers[layer] = keyed.into_iter().map(|(_, _, node)| node).collect();
    }

    /// Exhaustive search over every permutation of narrow layers
    fn optimize_crossings(&mut self) {
        let mut too_wide = 0;
        for layer in 0..self.layers.len() {
            let width = self.layers[layer].len();
            if width < 2 {
                continue;
            }
            if width > OPT_LAYER_LIMIT {
                too_wide += 1;
                continue;
            }
            let original = self.layers[layer].clone();
            let mut best = original.clone();
            let mut best_crossings = self.crossings_around(layer);
            let mut permutation: Vec<usize> = (0..width).collect();
            while best_crossings > 0 && next_permutation(&mut permutation) {
                self.layers[layer] = permutation.iter().map(|&i| original[i]).collect();
                let crossings = self.crossings_around(layer);
                if crossings < best_crossings {
                    best_crossings = crossings;
                    best = self.layers[layer].clone();
                }
            }
            self.layers[layer] = best;
        }
        if too_wide > 0 {
            tracing::warn!(
                layers = too_wide,
                limit = OPT_LAYER_LIMIT,
                "Layers too wide for exact crossing minimisation; keeping heuristic order"
            );
        }
    }

    fn assign_coordinates(&self, coord: Coord, step: f64) -> Vec<f64> {
        let mut along = vec![0.0; self.rank.len()];
        let widest = self.layers.iter().map(Vec::len).max().unwrap_or(0);
        for layer in &self.layers {
            let offset = (widest - layer.len()) as f64 * step / 2.0;
            for (i, &node) in layer.iter().enumerate() {
                along[node] = offset + i as f64 * step;
            }
        }
        match coord {
            Coord::Center => {}
            Coord::Greedy => {
                for layer in 1..self.layers.len() {
                    self.align(layer, &mut along, step, false);
                }
            }
            Coord::Quad => {
                for round in 0..QUAD_ROUNDS {
                    if round % 2 == 0 {
                        for layer in 0..self.layers.len() {
                            self.align(layer, &mut along, step, true);
                        }
                    } else {
                        for layer in (0..self.layers.len()).rev() {
                            self.align(layer, &mut along, step, true);
                        }
                    }
                }
            }
        }
        along
    }

    /// Move a layer toward the mean of each node's neighbors, then restore
    /// separation without changing the layer's mean offset
    fn align(&self, layer: usize, along: &mut [f64], step: f64, both: bool) {
        let nodes = &self.layers[layer];
        if nodes.is_empty() {
            return;
        }
        let desired: Vec<f64> = nodes
            .iter()
            .map(|&node| {
                let below: &[usize] = if both { &self.down[node] } else { &[] };
                let (sum, count) = self.up[node]
                    .iter()
                    .chain(below)
                    .fold((0.0, 0usize), |(sum, count), &n| (sum + along[n], count + 1));
                if count == 0 {
                    along[node]
                } else {
                    sum / count as f64
                }
            })
            .collect();
        let mut placed: Vec<f64> = Vec::with_capacity(desired.len());
        for &x in &desired {
            let x = match placed.last() {
                Some(&previous) => x.max(previous + step),
                None => x,
            };
            placed.push(x);
        }
        let shift = (desired.iter().sum::<f64>() - placed.iter().sum::<f64>()) / placed.len() as f64;
        for (&node, x) in nodes.iter().zip(placed) {
            along[node] = x + shift;
        }
    }
}

fn layer_crossings(upper: &[usize], lower: &[usize], down: &[Vec<usize>]) -> usize {
    let position: HashMap<usize, usize> =
        lower.iter().enumerate().map(|(i, &node)| (node, i)).collect();
    let mut segments = Vec::new();
    for (i, &node) in upper.iter().enumerate() {
        for next in &down[node] {
            if let Some(&j) = position.get(next) {
                segments.push((i, j));
            }
        }
    }
    let mut count = 0;
    for (k, &(a1, b1)) in segments.iter().enumerate() {
        for &(a2, b2) in &segments[k + 1..] {
            if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                count += 1;
            }
        }
    }
    count
}

/// Advance to the next lexicographic permutation
fn next_permutation(items: &mut [usize]) -> bool {
    let Some(pivot) = (1..items.len()).rev().find(|&i| items[i - 1] < items[i]) else {
        return false;
    };
    let pivot = pivot - 1;
    let Some(swap) = (pivot + 1..items.len()).rev().find(|&i| items[i] > items[pivot]) else {
        return false;
    };
    items.swap(pivot, swap);
    items[pivot + 1..].reverse();
    true
}

fn center(points: &mut [Point]) {
    if points.is_empty() {
        return;
    }
    let mut min = [f64::INFINITY; 2];
    let mut max = [f64::NEG_INFINITY; 2];
    for point in points.iter() {
        for axis in 0..2 {
            min[axis] = min[axis].min(point[axis]);
            max[axis] = max[axis].max(point[axis]);
        }
    }
    let mid = [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0];
    for point in points.iter_mut() {
        point[0] -= mid[0];
        point[1] -= mid[1];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<EntityId> {
        names.iter().map(|name| EntityId::from(*name)).collect()
    }

    fn pairs(edges: &[(&str, &str)]) -> Vec<(EntityId, EntityId)> {
        edges
            .iter()
            .map(|(s, t)| (EntityId::from(*s), EntityId::from(*t)))
            .collect()
    }

    fn point(solved: &SolvedLayout, id: &str) -> Point {
        solved.nodes[&EntityId::from(id)]
    }

    #[test]
    fn test_layering_strategies() {
        let nodes = ids(&["a", "b", "c", "d", "x"]);
        let edges = pairs(&[("a", "b"), ("b", "c"), ("c", "d"), ("x", "d")]);
        let rank = |layering, id: &str| {
            let config = SugiyamaConfig {
                layering,
                ..SugiyamaConfig::default()
            };
            solve(&nodes, &edges, &config).unwrap().ranks[&EntityId::from(id)]
        };
        assert_eq!(rank(Layering::LongestPath, "x"), 0);
        assert_eq!(rank(Layering::Simplex, "x"), 2);
        assert_eq!(rank(Layering::Simplex, "d"), 3);
        assert_eq!(rank(Layering::Topological, "d"), 4);
    }

    #[test]
    fn test_orientations() {
        let nodes = ids(&["a", "b", "c"]);
        let edges = pairs(&[("a", "b"), ("b", "c")]);
        let layout = |orientation| {
            let config = SugiyamaConfig {
                orientation,
                ..SugiyamaConfig::default()
            };
            solve(&nodes, &edges, &config).unwrap()
        };

        let down = layout(Orientation::TopToBottom);
        assert!(point(&down, "a")[1] < point(&down, "b")[1]);
        assert!(point(&down, "b")[1] < point(&down, "c")[1]);
        let up = layout(Orientation::BottomToTop);
        assert!(point(&up, "a")[1] > point(&up, "c")[1]);
        let right = layout(Orientation::LeftToRight);
        assert!(point(&right, "a")[0] < point(&right, "c")[0]);
        assert_eq!(point(&right, "a")[1], point(&right, "c")[1]);
        let left = layout(Orientation::RightToLeft);
        assert!(point(&left, "a")[0] > point(&left, "c")[0]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let nodes = ids(&["a", "b", "c", "d"]);
        let edges = pairs(&[("d", "a"), ("a", "b"), ("b", "c"), ("c", "a")]);
        let err = solve(&nodes, &edges, &SugiyamaConfig::default()).unwrap_err();
        match err {
            LayoutError::Cycle(node) => assert_ne!(node, EntityId::from("d")),
            other => panic!("expected a cycle error, got {other:?}"),
        }

        let err = solve(&ids(&["a"]), &pairs(&[("a", "a")]), &SugiyamaConfig::default());
        assert!(matches!(err, Err(LayoutError::Cycle(_))));
    }

    #[test]
    fn test_long_edges_bend_through_dummies() {
        let nodes = ids(&["a", "b", "c"]);
        let edges = pairs(&[("a", "b"), ("b", "c"), ("a", "c"), ("a", "c")]);
        let solved = solve(&nodes, &edges, &SugiyamaConfig::default()).unwrap();
        let bends = &solved.edges[&(EntityId::from("a"), EntityId::from("c"))];
        assert_eq!(bends.len(), 1);
        assert_eq!(bends[0][1], point(&solved, "b")[1]);
        assert!(solved.edges[&(EntityId::from("a"), EntityId::from("b"))].is_empty());
        assert_eq!(solved.edges.len(), 3);
    }

    #[test]
    fn test_crossings_are_removed() {
        let nodes = ids(&["a", "b", "c", "d"]);
        let edges = pairs(&[("a", "d"), ("b", "c")]);
        for decross in [Decross::TwoLayer, Decross::Opt] {
            let config = SugiyamaConfig {
                decross,
                ..SugiyamaConfig::default()
            };
            let solved = solve(&nodes, &edges, &config).unwrap();
            assert!(point(&solved, "a")[0] < point(&solved, "b")[0]);
            assert!(point(&solved, "d")[0] < point(&solved, "c")[0]);
        }
    }

    #[test]
    fn test_coordinate_strategies_keep_separation() {
        let nodes = ids(&["r", "a", "b", "c", "s"]);
        let edges = pairs(&[("r", "a"), ("r", "b"), ("r", "c"), ("a", "s"), ("c", "s")]);
        for coord in [Coord::Center, Coord::Greedy, Coord::Quad] {
            let config = SugiyamaConfig {
                coord,
                ..SugiyamaConfig::default()
            };
            let (step, _) = config.steps();
            let solved = solve(&nodes, &edges, &config).unwrap();
            let mut xs: Vec<f64> = ["a", "b", "c"]
                .iter()
                .map(|id| point(&solved, id)[0])
                .collect();
            xs.sort_by(f64::total_cmp);
            assert!(xs[1] - xs[0] >= step - 1e-9, "{coord:?}");
            assert!(xs[2] - xs[1] >= step - 1e-9, "{coord:?}");
        }
    }

    #[test]
    fn test_centering() {
        let nodes = ids(&["a", "b"]);
        let edges = pairs(&[("a", "b")]);
        let solved = solve(&nodes, &edges, &SugiyamaConfig::default()).unwrap();
        assert_eq!(point(&solved, "a")[1], -point(&solved, "b")[1]);

        let config = SugiyamaConfig {
            center: false,
            ..SugiyamaConfig::default()
        };
        let solved = solve(&nodes, &edges, &config).unwrap();
        assert_eq!(point(&solved, "a"), [0.0, 0.0]);
    }

    #[test]
    fn test_next_permutation_visits_all() {
        let mut items = vec![0, 1, 2];
        let mut count = 1;
        while next_permutation(&mut items) {
            count += 1;
        }
        assert_eq!(count, 6);
        assert_eq!(items, vec![2, 1, 0]);
    }
}
