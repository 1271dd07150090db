// SPDX-License-Identifier: MIT OR Apache-2.0
//! Force simulation.
//!
//! Many-body repulsion, springs along edges, a centering force and optional
//! collision avoidance, integrated with velocity Verlet. Alpha decays
//! geometrically toward zero and the run ends once it drops below
//! [`ALPHA_MIN`].

use crate::layout::Point;
use std::collections::HashMap;
use trellis_graph::EntityId;

/// Alpha below which a run is finished
pub const ALPHA_MIN: f64 = 0.001;

/// Share of velocity lost per tick
pub const VELOCITY_DECAY: f64 = 0.4;

const INITIAL_RADIUS: f64 = 10.0;
// pi * (3 - sqrt(5))
const INITIAL_ANGLE: f64 = 2.399_963_229_728_653;

/// Per-tick alpha decay, reaching [`ALPHA_MIN`] from 1 in 300 ticks
pub fn alpha_decay() -> f64 {
    1.0 - ALPHA_MIN.powf(1.0 / 300.0)
}

/// One simulated node
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    /// Node id
    pub id: EntityId,
    /// Position, `NaN` until seeded
    pub x: f64,
    /// Position, `NaN` until seeded
    pub y: f64,
    /// Velocity
    pub vx: f64,
    /// Velocity
    pub vy: f64,
    /// Pinned x
    pub fx: Option<f64>,
    /// Pinned y
    pub fy: Option<f64>,
    /// Collision radius
    pub radius: f64,
}

impl SimNode {
    /// Unplaced node
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            x: f64::NAN,
            y: f64::NAN,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
            radius: 0.0,
        }
    }

    /// Start at a known position
    pub fn at(mut self, point: Point) -> Self {
        [self.x, self.y] = point;
        self
    }

    /// Current position
    pub fn position(&self) -> Point {
        [self.x, self.y]
    }

    /// Pin in place
    pub fn pin(&mut self, point: Point) {
        self.fx = Some(point[0]);
        self.fy = Some(point[1]);
        [self.x, self.y] = point;
        self.vx = 0.0;
        self.vy = 0.0;
    }

    /// Release the pin
    pub fn unpin(&mut self) {
        self.fx = None;
        self.fy = None;
    }

    /// Whether both coordinates are pinned
    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() && self.fy.is_some()
    }
}

/// Force strengths and ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForceSettings {
    /// Starting alpha
    pub alpha: f64,
    /// Many-body strength; negative repels
    pub n_body_strength: f64,
    /// Distance below which many-body force is softened
    pub distance_min: f64,
    /// Distance beyond which many-body force is ignored
    pub distance_max: f64,
    /// Rest length of edge springs
    pub link_distance: f64,
    /// Keep nodes from overlapping their radii
    pub collide: bool,
}

impl Default for ForceSettings {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            n_body_strength: -900.0,
            distance_min: 100.0,
            distance_max: 400.0,
            link_distance: 30.0,
            collide: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Link {
    source: usize,
    target: usize,
    strength: f64,
    bias: f64,
}

/// Deterministic linear congruential generator for jiggle
#[derive(Debug, Clone)]
struct Lcg(u64);

impl Lcg {
    const MODULUS: u64 = 4_294_967_296;

    fn next(&mut self) -> f64 {
        self.0 = self
            .0
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223)
            % Self::MODULUS;
        self.0 as f64 / Self::MODULUS as f64
    }

    fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

/// A running simulation
#[derive(Debug, Clone)]
pub struct Simulation {
    nodes: Vec<SimNode>,
    links: Vec<Link>,
    index: HashMap<EntityId, usize>,
    settings: ForceSettings,
    alpha: f64,
    decay: f64,
    random: Lcg,
}

impl Simulation {
    /// Seed unplaced nodes on a phyllotaxis spiral and link them by `edges`.
    ///
    /// Edges naming unknown nodes and self-loops exert no force.
    pub fn new(mut nodes: Vec<SimNode>, edges: &[(EntityId, EntityId)], settings: ForceSettings) -> Self {
        for (i, node) in nodes.iter_mut().enumerate() {
            if node.x.is_nan() || node.y.is_nan() {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle = i as f64 * INITIAL_ANGLE;
                node.x = radius * angle.cos();
                node.y = radius * angle.sin();
            }
            if let Some(fx) = node.fx {
                node.x = fx;
            }
            if let Some(fy) = node.fy {
                node.y = fy;
            }
            if !node.vx.is_finite() {
                node.vx = 0.0;
            }
            if !node.vy.is_finite() {
                node.vy = 0.0;
            }
        }

        let index: HashMap<EntityId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        let pairs: Vec<(usize, usize)> = edges
            .iter()
            .filter_map(|(source, target)| Some((*index.get(source)?, *index.get(target)?)))
            .filter(|(s, t)| s != t)
            .collect();
        let mut count = vec![0usize; nodes.len()];
        for &(s, t) in &pairs {
            count[s] += 1;
            count[t] += 1;
        }
        let links = pairs
            .into_iter()
            .map(|(source, target)| Link {
                source,
                target,
                strength: 1.0 / count[source].min(count[target]) as f64,
                bias: count[source] as f64 / (count[source] + count[target]) as f64,
            })
            .collect();

        Self {
            nodes,
            links,
            index,
            alpha: settings.alpha,
            settings,
            decay: alpha_decay(),
            random: Lcg(1),
        }
    }

    /// Nodes in input order
    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Current alpha
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Ticks needed for alpha to fall from its current value below
    /// [`ALPHA_MIN`]
    pub fn tick_count(&self) -> usize {
        let ticks = (ALPHA_MIN / self.alpha).ln() / (1.0 - self.decay).ln();
        ticks.ceil().max(1.0) as usize
    }

    /// Pin a node; returns `false` for unknown ids
    pub fn pin(&mut self, id: &EntityId, point: Point) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.nodes[i].pin(point);
                true
            }
            None => false,
        }
    }

    /// Release a node; returns `false` for unknown ids
    pub fn unpin(&mut self, id: &EntityId) -> bool {
        match self.index.get(id) {
            Some(&i) => {
                self.nodes[i].unpin();
                true
            }
            None => false,
        }
    }

    /// Advance one step
    pub fn tick(&mut self) {
        self.alpha -= self.alpha * self.decay;
        self.apply_links();
        self.apply_many_body();
        self.apply_center();
        if self.settings.collide {
            self.apply_collide();
        }
        for node in &mut self.nodes {
            match node.fx {
                Some(fx) => {
                    node.x = fx;
                    node.vx = 0.0;
                }
                None => {
                    node.vx *= 1.0 - VELOCITY_DECAY;
                    node.x += node.vx;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.y = fy;
                    node.vy = 0.0;
                }
                None => {
                    node.vy *= 1.0 - VELOCITY_DECAY;
                    node.y += node.vy;
                }
            }
        }
    }

    fn apply_links(&mut self) {
        let Self {
            nodes,
            links,
            random,
            settings,
            alpha,
            ..
        } = self;
        for link in links.iter() {
            let (source, target) = (&nodes[link.source], &nodes[link.target]);
            let mut dx = target.x + target.vx - source.x - source.vx;
            let mut dy = target.y + target.vy - source.y - source.vy;
            if dx == 0.0 {
                dx = random.jiggle();
            }
            if dy == 0.0 {
                dy = random.jiggle();
            }
            let distance = (dx * dx + dy * dy).sqrt();
            let pull = (distance - settings.link_distance) / distance * *alpha * link.strength;
            dx *= pull;
            dy *= pull;
            nodes[link.target].vx -= dx * link.bias;
            nodes[link.target].vy -= dy * link.bias;
            nodes[link.source].vx += dx * (1.0 - link.bias);
            nodes[link.source].vy += dy * (1.0 - link.bias);
        }
    }

    fn apply_many_body(&mut self) {
        let min2 = self.settings.distance_min * self.settings.distance_min;
        let max2 = self.settings.distance_max * self.settings.distance_max;
        let strength = self.settings.n_body_strength * self.alpha;
        for i in 0..self.nodes.len() {
            let (mut ax, mut ay) = (0.0, 0.0);
            for j in 0..self.nodes.len() {
                if i == j {
                    continue;
                }
                let mut dx = self.nodes[j].x - self.nodes[i].x;
                let mut dy = self.nodes[j].y - self.nodes[i].y;
                let mut l = dx * dx + dy * dy;
                if l >= max2 {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.random.jiggle();
                    l += dx * dx;
                }
                if dy == 0.0 {
                    dy = self.random.jiggle();
                    l += dy * dy;
                }
                if l < min2 {
                    l = (min2 * l).sqrt();
                }
                ax += dx * strength / l;
                ay += dy * strength / l;
            }
            self.nodes[i].vx += ax;
            self.nodes[i].vy += ay;
        }
    }

    fn apply_center(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let mean_x = self.nodes.iter().map(|node| node.x).sum::<f64>() / n;
        let mean_y = self.nodes.iter().map(|node| node.y).sum::<f64>() / n;
        for node in &mut self.nodes {
            node.x -= mean_x;
            node.y -= mean_y;
        }
    }

    fn apply_collide(&mut self) {
        for i in 0..self.nodes.len() {
            for j in i + 1..self.nodes.len() {
                let (a, b) = (&self.nodes[i], &self.nodes[j]);
                let reach = a.radius + b.radius;
                if reach <= 0.0 {
                    continue;
                }
                let mut dx = a.x + a.vx - b.x - b.vx;
                let mut dy = a.y + a.vy - b.y - b.vy;
                if dx == 0.0 {
                    dx = self.random.jiggle();
                }
                if dy == 0.0 {
                    dy = self.random.jiggle();
                }
                let l = dx * dx + dy * dy;
                if l >= reach * reach {
                    continue;
                }
                let l = l.sqrt();
                let push = (reach - l) / l;
                let (ra2, rb2) = (a.radius * a.radius, b.radius * b.radius);
                let weight = rb2 / (ra2 + rb2);
                self.nodes[i].vx += dx * push * weight;
                self.nodes[i].vy += dy * push * weight;
                self.nodes[j].vx -= dx * push * (1.0 - weight);
                self.nodes[j].vy -= dy * push * (1.0 - weight);
            }
        }
    }
}
