//! Render surface contract: turns simulation state into screen-space shapes.
//!
//! Zoom and pan live in [`ViewTransform`] and are applied only here; the
//! simulation never sees screen coordinates.

use std::time::Duration;

use crate::layout::{Point, Simulation, TickFrame};
use crate::topology::NodeStatus;

/// Allowed zoom range, as (min, max) scale factors.
pub const ZOOM_EXTENT: (f64, f64) = (0.3, 3.0);
/// Node circle radius in simulation units.
pub const NODE_RADIUS: f64 = 22.0;

pub const PULSE_RISE: Duration = Duration::from_millis(300);
pub const PULSE_FALL: Duration = Duration::from_millis(600);

/// Affine map from simulation space to screen space: `screen = sim * k + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub k: f64,
    pub x: f64,
    pub y: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        k: 1.0,
        x: 0.0,
        y: 0.0,
    };

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.k + self.x, p.y * self.k + self.y)
    }

    pub fn invert(&self, p: Point) -> Point {
        Point::new((p.x - self.x) / self.k, (p.y - self.y) / self.k)
    }

    /// Scales by `factor` around a screen-space anchor, clamped to [`ZOOM_EXTENT`].
    pub fn zoom_at(&mut self, anchor: Point, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let k = (self.k * factor).clamp(ZOOM_EXTENT.0, ZOOM_EXTENT.1);
        let fixed = self.invert(anchor);
        self.k = k;
        self.x = anchor.x - fixed.x * k;
        self.y = anchor.y - fixed.y * k;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    fn lerp(self, other: Rgba, t: f64) -> Rgba {
        let channel = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
        Rgba {
            r: channel(self.r, other.r),
            g: channel(self.g, other.g),
            b: channel(self.b, other.b),
            a: self.a + (other.a - self.a) * t,
        }
    }
}

pub const EDGE_RESTING: Rgba = Rgba::new(255, 255, 255, 0.12);
pub const EDGE_HIGHLIGHT: Rgba = Rgba::new(92, 124, 250, 0.6);
const EDGE_RESTING_WIDTH: f64 = 1.5;
const EDGE_HIGHLIGHT_WIDTH: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeStyle {
    pub stroke: Rgba,
    pub width: f64,
}

impl EdgeStyle {
    /// Interpolates between the resting and highlighted edge look.
    pub fn at(intensity: f64) -> Self {
        let t = intensity.clamp(0.0, 1.0);
        Self {
            stroke: EDGE_RESTING.lerp(EDGE_HIGHLIGHT, t),
            width: EDGE_RESTING_WIDTH + (EDGE_HIGHLIGHT_WIDTH - EDGE_RESTING_WIDTH) * t,
        }
    }
}

/// Edge flash triggered by pulses: a short rise followed by a slower fade.
/// Times are offsets from any fixed epoch chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PulseAnimator {
    started_at: Option<Duration>,
}

impl PulseAnimator {
    /// Starts (or restarts) the flash at `now`.
    pub fn trigger(&mut self, now: Duration) {
        self.started_at = Some(now);
    }

    /// Highlight intensity in `[0, 1]` at `now`.
    pub fn intensity(&self, now: Duration) -> f64 {
        let Some(start) = self.started_at else {
            return 0.0;
        };
        let elapsed = now.saturating_sub(start);
        if elapsed < PULSE_RISE {
            elapsed.as_secs_f64() / PULSE_RISE.as_secs_f64()
        } else if elapsed < PULSE_RISE + PULSE_FALL {
            1.0 - (elapsed - PULSE_RISE).as_secs_f64() / PULSE_FALL.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn is_animating(&self, now: Duration) -> bool {
        self.started_at
            .is_some_and(|start| now.saturating_sub(start) < PULSE_RISE + PULSE_FALL)
    }
}

pub fn skill_color(skill: Option<&str>) -> &'static str {
    match skill {
        Some("writing") => "#34d399",
        Some("voice") => "#a78bfa",
        Some("image") => "#fbbf24",
        Some("code") => "#22d3ee",
        Some("orchestration") => "#fb7185",
        _ => "#5c7cfa",
    }
}

pub fn status_color(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Available => "#4ade80",
        NodeStatus::Busy => "#fbbf24",
        NodeStatus::Offline => "#6b7280",
    }
}

pub fn avatar_glyph(avatar: &str) -> &'static str {
    match avatar {
        "pencil" => "✍️",
        "microphone" => "🎙️",
        "palette" => "🎨",
        "terminal" => "💻",
        "network" => "🕸️",
        _ => "🤖",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub id: String,
    pub name: String,
    pub role: String,
    pub center: Point,
    pub radius: f64,
    pub color: &'static str,
    pub status_color: &'static str,
    pub glyph: &'static str,
    pub pinned: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneEdge {
    pub source: String,
    pub target: String,
    pub from: Point,
    pub to: Point,
    pub style: EdgeStyle,
}

/// Screen-space snapshot of the mesh, ready to draw.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    pub generation: u64,
    pub nodes: Vec<SceneNode>,
    pub edges: Vec<SceneEdge>,
}

impl Scene {
    /// Projects the simulation through `transform`. Every edge gets the same
    /// pulse intensity.
    pub fn build(sim: &Simulation, transform: &ViewTransform, edge_intensity: f64) -> Self {
        let style = EdgeStyle::at(edge_intensity);
        let nodes = sim
            .nodes()
            .iter()
            .map(|sim_node| {
                let node = sim_node.node();
                SceneNode {
                    id: node.id.clone(),
                    name: node.name.clone(),
                    role: node.role.clone(),
                    center: transform.apply(sim_node.position()),
                    radius: NODE_RADIUS * transform.k,
                    color: skill_color(node.primary_skill()),
                    status_color: status_color(node.status),
                    glyph: avatar_glyph(&node.avatar),
                    pinned: sim_node.pinned().is_some(),
                }
            })
            .collect();
        let edges = sim
            .links()
            .map(|(source, target)| SceneEdge {
                source: source.id().to_string(),
                target: target.id().to_string(),
                from: transform.apply(source.position()),
                to: transform.apply(target.position()),
                style,
            })
            .collect();
        Self {
            generation: sim.generation(),
            nodes,
            edges,
        }
    }
}

/// Finds the topmost node under a screen point. Hit-testing happens in
/// simulation space so it agrees with the drawn radius at any zoom.
pub fn hit_test(sim: &Simulation, transform: &ViewTransform, screen: Point) -> Option<String> {
    let target = transform.invert(screen);
    sim.nodes()
        .iter()
        .rev()
        .find(|node| node.position().distance(target) <= NODE_RADIUS)
        .map(|node| node.id().to_string())
}

/// Accepts tick frames only from the simulation instance it is bound to, so
/// frames still in flight from a replaced simulation are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameGate {
    bound: Option<u64>,
}

impl FrameGate {
    pub fn bind(&mut self, generation: u64) {
        self.bound = Some(generation);
    }

    pub fn unbind(&mut self) {
        self.bound = None;
    }

    pub fn accepts(&self, frame: &TickFrame) -> bool {
        self.bound == Some(frame.generation)
    }
}
