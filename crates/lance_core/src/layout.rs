//! Force-directed layout for the mesh graph.
//!
//! The simulation is a velocity-Verlet style integrator with four forces:
//! spring links, many-body repulsion, centering and collision. Each call to
//! [`Simulation::tick`] advances one step and cools the temperature (`alpha`)
//! toward `alpha_target`. Once alpha drops below `alpha_min` the simulation
//! goes idle and ticks do nothing until a pin reheats it.
//!
//! Nodes live in an arena indexed by id. Outside code can only read them;
//! the only mutations are [`Simulation::pin`], [`Simulation::unpin`] and the
//! tick itself.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use lance_logging::{lance_debug, lance_trace};

use crate::topology::{MeshEdge, MeshNode};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSettings {
    pub link_distance: f64,
    pub link_strength: f64,
    pub charge_strength: f64,
    pub collision_radius: f64,
    pub center_strength: f64,
    pub alpha_min: f64,
    pub alpha_decay: f64,
    pub velocity_decay: f64,
    /// Temperature the simulation is held at while a node is pinned.
    pub drag_alpha_target: f64,
    /// Floor applied to alpha when a restart changes the graph.
    pub reheat_alpha: f64,
    pub initial_radius: f64,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        let alpha_min = 0.001;
        Self {
            link_distance: 140.0,
            link_strength: 0.5,
            charge_strength: -400.0,
            collision_radius: 45.0,
            center_strength: 1.0,
            alpha_min,
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
            velocity_decay: 0.4,
            drag_alpha_target: 0.3,
            reheat_alpha: 0.3,
            initial_radius: 10.0,
        }
    }
}

/// A mesh node with its physics state.
#[derive(Debug, Clone, PartialEq)]
pub struct SimNode {
    node: MeshNode,
    position: Point,
    velocity: Point,
    pinned: Option<Point>,
}

impl SimNode {
    pub fn node(&self) -> &MeshNode {
        &self.node
    }

    pub fn id(&self) -> &str {
        &self.node.id
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn velocity(&self) -> Point {
        self.velocity
    }

    pub fn pinned(&self) -> Option<Point> {
        self.pinned
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Link {
    source: usize,
    target: usize,
    /// Share of the correction applied to the target, by relative degree.
    bias: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Idle,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodePosition {
    pub id: String,
    pub position: Point,
}

/// Positions published after each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickFrame {
    /// Identifies the simulation instance that produced the frame.
    pub generation: u64,
    pub tick: u64,
    pub alpha: f64,
    pub positions: Vec<NodePosition>,
}

type TickListener = Box<dyn FnMut(&TickFrame) + Send>;

/// Deterministic jitter source used to separate coincident nodes.
#[derive(Debug, Clone, Copy)]
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        f64::from(self.0) / 4_294_967_296.0
    }

    fn jiggle(&mut self) -> f64 {
        (self.next() - 0.5) * 1e-6
    }
}

pub struct Simulation {
    generation: u64,
    settings: LayoutSettings,
    center: Point,
    nodes: Vec<SimNode>,
    index: HashMap<String, usize>,
    links: Vec<Link>,
    alpha: f64,
    alpha_target: f64,
    ticks: u64,
    state: RunState,
    listeners: Vec<TickListener>,
    jitter: Lcg,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("generation", &self.generation)
            .field("nodes", &self.nodes.len())
            .field("links", &self.links.len())
            .field("alpha", &self.alpha)
            .field("ticks", &self.ticks)
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Simulation {
    /// Starts a simulation centered in a `width` x `height` viewport.
    pub fn start(nodes: &[MeshNode], edges: &[MeshEdge], width: f64, height: f64) -> Self {
        Self::with_settings(LayoutSettings::default(), nodes, edges, width, height)
    }

    pub fn with_settings(
        settings: LayoutSettings,
        nodes: &[MeshNode],
        edges: &[MeshEdge],
        width: f64,
        height: f64,
    ) -> Self {
        let mut sim = Self::empty(settings, width, height);
        sim.populate(nodes, edges, &HashMap::new());
        sim.alpha = 1.0;
        sim.state = if sim.nodes.is_empty() {
            RunState::Idle
        } else {
            RunState::Running
        };
        lance_debug!(
            "simulation {} started: {} nodes, {} links",
            sim.generation,
            sim.nodes.len(),
            sim.links.len()
        );
        sim
    }

    /// Stops this simulation and starts a new one for the given graph.
    ///
    /// Nodes whose id survives keep their position, velocity and pin. The new
    /// instance has a fresh generation, so frames from this one can be told
    /// apart from frames of its successor.
    pub fn restart(
        mut self,
        nodes: &[MeshNode],
        edges: &[MeshEdge],
        width: f64,
        height: f64,
    ) -> Simulation {
        let previous_edges = self.edges_by_id(&self.links);
        let previous_alpha = self.alpha;
        self.stop();
        let carried: HashMap<String, SimNode> = self
            .nodes
            .drain(..)
            .map(|node| (node.node.id.clone(), node))
            .collect();
        let mut previous_ids: Vec<String> = carried.keys().cloned().collect();
        previous_ids.sort();

        let mut next = Self::empty(self.settings.clone(), width, height);
        next.populate(nodes, edges, &carried);

        let mut next_ids: Vec<String> = next.index.keys().cloned().collect();
        next_ids.sort();
        let graph_changed = next_ids != previous_ids
            || next.edges_by_id(&next.links) != previous_edges
            || next.center != self.center;

        next.alpha = if graph_changed {
            previous_alpha.max(next.settings.reheat_alpha)
        } else {
            previous_alpha
        };
        if next.nodes.iter().any(|n| n.pinned.is_some()) {
            next.alpha_target = next.settings.drag_alpha_target;
        }
        next.state = if next.nodes.is_empty() {
            RunState::Idle
        } else if next.alpha >= next.settings.alpha_min || next.alpha_target > 0.0 {
            RunState::Running
        } else {
            RunState::Idle
        };
        lance_debug!(
            "simulation {} replaced by {} (graph changed: {})",
            self.generation,
            next.generation,
            graph_changed
        );
        next
    }

    fn empty(settings: LayoutSettings, width: f64, height: f64) -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::Relaxed),
            settings,
            center: Point::new(width / 2.0, height / 2.0),
            nodes: Vec::new(),
            index: HashMap::new(),
            links: Vec::new(),
            alpha: 0.0,
            alpha_target: 0.0,
            ticks: 0,
            state: RunState::Idle,
            listeners: Vec::new(),
            jitter: Lcg(1),
        }
    }

    fn populate(
        &mut self,
        nodes: &[MeshNode],
        edges: &[MeshEdge],
        carried: &HashMap<String, SimNode>,
    ) {
        let initial_angle = PI * (3.0 - 5.0_f64.sqrt());
        for node in nodes {
            if self.index.contains_key(&node.id) {
                continue;
            }
            let i = self.nodes.len();
            let sim_node = match carried.get(&node.id) {
                Some(existing) => SimNode {
                    node: node.clone(),
                    ..existing.clone()
                },
                None => {
                    let radius = self.settings.initial_radius * (0.5 + i as f64).sqrt();
                    let angle = i as f64 * initial_angle;
                    SimNode {
                        node: node.clone(),
                        position: Point::new(
                            self.center.x + radius * angle.cos(),
                            self.center.y + radius * angle.sin(),
                        ),
                        velocity: Point::default(),
                        pinned: None,
                    }
                }
            };
            self.index.insert(node.id.clone(), i);
            self.nodes.push(sim_node);
        }

        let mut links = Vec::with_capacity(edges.len());
        let mut degree = vec![0usize; self.nodes.len()];
        for edge in edges {
            let (Some(&source), Some(&target)) =
                (self.index.get(&edge.source), self.index.get(&edge.target))
            else {
                continue;
            };
            if source == target {
                continue;
            }
            degree[source] += 1;
            degree[target] += 1;
            links.push(Link {
                source,
                target,
                bias: 0.0,
            });
        }
        for link in &mut links {
            let s = degree[link.source] as f64;
            let t = degree[link.target] as f64;
            link.bias = s / (s + t);
        }
        self.links = links;
    }

    fn edges_by_id(&self, links: &[Link]) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = links
            .iter()
            .filter_map(|link| {
                Some((
                    self.nodes.get(link.source)?.node.id.clone(),
                    self.nodes.get(link.target)?.node.id.clone(),
                ))
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Registers a callback invoked with every frame this simulation produces.
    /// Callbacks are dropped when the simulation stops.
    pub fn on_tick(&mut self, listener: impl FnMut(&TickFrame) + Send + 'static) {
        if self.state == RunState::Stopped {
            return;
        }
        self.listeners.push(Box::new(listener));
    }

    /// Advances one step. Returns the frame, or `None` while idle or stopped.
    pub fn tick(&mut self) -> Option<TickFrame> {
        if self.state != RunState::Running {
            return None;
        }
        self.step();
        self.ticks += 1;
        lance_logging::set_frame_tick(self.ticks);

        let frame = TickFrame {
            generation: self.generation,
            tick: self.ticks,
            alpha: self.alpha,
            positions: self
                .nodes
                .iter()
                .map(|n| NodePosition {
                    id: n.node.id.clone(),
                    position: n.position,
                })
                .collect(),
        };
        for listener in &mut self.listeners {
            listener(&frame);
        }

        if self.alpha < self.settings.alpha_min {
            self.state = RunState::Idle;
            lance_debug!(
                "simulation {} idle after {} ticks",
                self.generation,
                self.ticks
            );
        }
        Some(frame)
    }

    /// Fixes a node at `(x, y)` and reheats the simulation so its neighbours
    /// react. Calling it again moves the pin. Returns false for unknown ids or
    /// a stopped simulation.
    pub fn pin(&mut self, id: &str, x: f64, y: f64) -> bool {
        if self.state == RunState::Stopped {
            return false;
        }
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        self.nodes[i].pinned = Some(Point::new(x, y));
        self.alpha_target = self.settings.drag_alpha_target;
        if self.state == RunState::Idle {
            lance_trace!("simulation {} reheated by pin on {}", self.generation, id);
            self.state = RunState::Running;
        }
        true
    }

    /// Releases a pinned node back to the forces. The simulation keeps running
    /// and cools down once no node is pinned.
    pub fn unpin(&mut self, id: &str) -> bool {
        if self.state == RunState::Stopped {
            return false;
        }
        let Some(&i) = self.index.get(id) else {
            return false;
        };
        if self.nodes[i].pinned.take().is_none() {
            return false;
        }
        if self.nodes.iter().all(|n| n.pinned.is_none()) {
            self.alpha_target = 0.0;
        }
        true
    }

    /// Halts ticking and releases tick listeners. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if self.state == RunState::Stopped {
            return;
        }
        self.state = RunState::Stopped;
        self.listeners.clear();
        lance_debug!("simulation {} stopped", self.generation);
    }

    /// Replaces descriptive fields of a node (name, status, skills) without
    /// touching its physics state.
    pub fn update_node(&mut self, node: &MeshNode) -> bool {
        match self.index.get(&node.id) {
            Some(&i) => {
                self.nodes[i].node = node.clone();
                true
            }
            None => false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn run_state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn settings(&self) -> &LayoutSettings {
        &self.settings
    }

    pub fn node(&self, id: &str) -> Option<&SimNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[SimNode] {
        &self.nodes
    }

    /// Laid-out links as (source, target) pairs.
    pub fn links(&self) -> impl Iterator<Item = (&SimNode, &SimNode)> {
        self.links
            .iter()
            .map(|link| (&self.nodes[link.source], &self.nodes[link.target]))
    }

    fn step(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.settings.alpha_decay;

        self.apply_links();
        self.apply_charge();
        self.apply_center();
        self.apply_collision();

        let retain = 1.0 - self.settings.velocity_decay;
        for node in &mut self.nodes {
            match node.pinned {
                Some(pin) => {
                    node.position = pin;
                    node.velocity = Point::default();
                }
                None => {
                    node.velocity.x *= retain;
                    node.velocity.y *= retain;
                    node.position.x += node.velocity.x;
                    node.position.y += node.velocity.y;
                }
            }
        }
    }

    fn apply_links(&mut self) {
        let distance = self.settings.link_distance;
        let strength = self.settings.link_strength;
        for link in &self.links {
            let s = &self.nodes[link.source];
            let t = &self.nodes[link.target];
            let mut x = t.position.x + t.velocity.x - s.position.x - s.velocity.x;
            let mut y = t.position.y + t.velocity.y - s.position.y - s.velocity.y;
            if x == 0.0 {
                x = self.jitter.jiggle();
            }
            if y == 0.0 {
                y = self.jitter.jiggle();
            }
            let len = (x * x + y * y).sqrt();
            let scale = (len - distance) / len * self.alpha * strength;
            x *= scale;
            y *= scale;

            let b = link.bias;
            let t = &mut self.nodes[link.target];
            t.velocity.x -= x * b;
            t.velocity.y -= y * b;
            let s = &mut self.nodes[link.source];
            s.velocity.x += x * (1.0 - b);
            s.velocity.y += y * (1.0 - b);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.settings.charge_strength;
        let count = self.nodes.len();
        for i in 0..count {
            let mut dvx = 0.0;
            let mut dvy = 0.0;
            let origin = self.nodes[i].position;
            for j in 0..count {
                if i == j {
                    continue;
                }
                let other = self.nodes[j].position;
                let mut x = other.x - origin.x;
                let mut y = other.y - origin.y;
                let mut l = x * x + y * y;
                if x == 0.0 {
                    x = self.jitter.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.jitter.jiggle();
                    l += y * y;
                }
                if l < 1.0 {
                    l = l.sqrt();
                }
                let w = strength * self.alpha / l;
                dvx += x * w;
                dvy += y * w;
            }
            self.nodes[i].velocity.x += dvx;
            self.nodes[i].velocity.y += dvy;
        }
    }

    fn apply_center(&mut self) {
        if self.nodes.is_empty() {
            return;
        }
        let n = self.nodes.len() as f64;
        let (sum_x, sum_y) = self
            .nodes
            .iter()
            .fold((0.0, 0.0), |(sx, sy), node| {
                (sx + node.position.x, sy + node.position.y)
            });
        let shift_x = (sum_x / n - self.center.x) * self.settings.center_strength;
        let shift_y = (sum_y / n - self.center.y) * self.settings.center_strength;
        for node in &mut self.nodes {
            node.position.x -= shift_x;
            node.position.y -= shift_y;
        }
    }

    fn apply_collision(&mut self) {
        let radius = self.settings.collision_radius;
        let reach = radius * 2.0;
        // Equal radii split the correction evenly.
        let share = 0.5;
        let count = self.nodes.len();
        for i in 0..count {
            let a = &self.nodes[i];
            let xi = a.position.x + a.velocity.x;
            let yi = a.position.y + a.velocity.y;
            for j in (i + 1)..count {
                let b = &self.nodes[j];
                let mut x = xi - b.position.x - b.velocity.x;
                let mut y = yi - b.position.y - b.velocity.y;
                let mut l = x * x + y * y;
                if l >= reach * reach {
                    continue;
                }
                if x == 0.0 {
                    x = self.jitter.jiggle();
                    l += x * x;
                }
                if y == 0.0 {
                    y = self.jitter.jiggle();
                    l += y * y;
                }
                let len = l.sqrt();
                let scale = (reach - len) / len;
                x *= scale;
                y *= scale;

                let a = &mut self.nodes[i];
                a.velocity.x += x * share;
                a.velocity.y += y * share;
                let b = &mut self.nodes[j];
                b.velocity.x -= x * share;
                b.velocity.y -= y * share;
            }
        }
    }
}
