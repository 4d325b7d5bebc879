use std::collections::HashSet;

use lance_logging::lance_debug;
use serde::Deserialize;

/// Operational status of an agent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    #[default]
    Available,
    Busy,
    Offline,
}

impl NodeStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "available" => Some(Self::Available),
            "busy" => Some(Self::Busy),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        }
    }
}

/// An agent in the mesh as returned by `/api/mesh/topology`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MeshNode {
    pub id: String,
    pub name: String,
    pub role: String,
    pub status: NodeStatus,
    /// Ordered skill tags; the first one picks the node color.
    pub skills: Vec<String>,
    pub avatar: String,
}

impl MeshNode {
    pub fn primary_skill(&self) -> Option<&str> {
        self.skills.first().map(String::as_str)
    }
}

/// Directed "can hand off to" relation between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MeshEdge {
    pub source: String,
    pub target: String,
    pub source_name: String,
    pub target_name: String,
}

impl MeshEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct TopologySnapshot {
    pub nodes: Vec<MeshNode>,
    pub edges: Vec<MeshEdge>,
}

/// Body of `/api/mesh/health`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct MeshHealth {
    pub status: String,
    pub agents_total: u32,
    pub agents_available: u32,
}

/// Last known node/edge set of the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Topology {
    nodes: Vec<MeshNode>,
    edges: Vec<MeshEdge>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the node and edge sets.
    ///
    /// Nodes with a repeated id keep their first occurrence. Self-loops and
    /// edges whose source or target is not in the node set are dropped without
    /// error; returns how many were dropped.
    pub fn load_snapshot(&mut self, nodes: Vec<MeshNode>, edges: Vec<MeshEdge>) -> usize {
        let mut seen = HashSet::with_capacity(nodes.len());
        let nodes: Vec<MeshNode> = nodes
            .into_iter()
            .filter(|node| seen.insert(node.id.clone()))
            .collect();

        let edge_count = edges.len();
        let edges: Vec<MeshEdge> = edges
            .into_iter()
            .filter(|edge| {
                edge.source != edge.target
                    && seen.contains(&edge.source)
                    && seen.contains(&edge.target)
            })
            .collect();
        let dropped = edge_count - edges.len();
        if dropped > 0 {
            lance_debug!("topology snapshot: dropped {} dangling or self-loop edges", dropped);
        }

        self.nodes = nodes;
        self.edges = edges;
        dropped
    }

    pub fn nodes(&self) -> &[MeshNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[MeshEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&MeshNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Applies a status change pushed by the live channel. Returns the updated
    /// node, or `None` when the agent is unknown or already in that status.
    pub fn apply_status(&mut self, id: &str, status: NodeStatus) -> Option<&MeshNode> {
        let node = self.nodes.iter_mut().find(|node| node.id == id)?;
        if node.status == status {
            return None;
        }
        node.status = status;
        Some(node)
    }
}
