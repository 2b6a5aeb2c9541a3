//! Directed relationship graph

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// One `{from, to, type}` edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub relation: String,
}

impl Edge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            relation: relation.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct RawGraph {
    nodes: Vec<String>,
    edges: Vec<Edge>,
}

/// Nodes are manifest ids in registry order. Edges may point at ids that are
/// not nodes (dangling references).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawGraph", into = "RawGraph")]
pub struct RelationshipGraph {
    nodes: Vec<String>,
    edges: Vec<Edge>,
    index: HashMap<String, usize>,
    /// Edge indices leaving each node
    outgoing: Vec<Vec<usize>>,
}

impl RelationshipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; returns its index. Adding a known id is a no-op.
    pub fn add_node(&mut self, id: impl Into<String>) -> usize {
        let id = id.into();
        if let Some(&slot) = self.index.get(&id) {
            return slot;
        }
        let slot = self.nodes.len();
        self.index.insert(id.clone(), slot);
        self.nodes.push(id);
        self.outgoing.push(Vec::new());
        slot
    }

    pub fn add_edge(&mut self, edge: Edge) {
        if let Some(&slot) = self.index.get(&edge.from) {
            self.outgoing[slot].push(self.edges.len());
        }
        self.edges.push(edge);
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn has_edge(&self, from: &str, to: &str, relation: &str) -> bool {
        self.outgoing(from)
            .any(|e| e.to == to && e.relation == relation)
    }

    /// Edges leaving `id`, in insertion order
    pub fn outgoing<'a>(&'a self, id: &str) -> impl Iterator<Item = &'a Edge> + 'a {
        let slots = self
            .index
            .get(id)
            .map(|&slot| self.outgoing[slot].as_slice())
            .unwrap_or(&[]);
        slots.iter().map(move |&e| &self.edges[e])
    }

    /// Distinct targets of `id`, first occurrence order
    pub fn neighbors(&self, id: &str) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.outgoing(id)
            .map(|e| e.to.as_str())
            .filter(|to| seen.insert(*to))
            .collect()
    }

    /// Edges whose target is not a node
    pub fn dangling(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| !self.contains_node(&e.to))
    }
}

impl From<RawGraph> for RelationshipGraph {
    fn from(raw: RawGraph) -> Self {
        let mut graph = RelationshipGraph::new();
        for node in raw.nodes {
            graph.add_node(node);
        }
        for edge in raw.edges {
            graph.add_edge(edge);
        }
        graph
    }
}

impl From<RelationshipGraph> for RawGraph {
    fn from(graph: RelationshipGraph) -> Self {
        RawGraph {
            nodes: graph.nodes,
            edges: graph.edges,
        }
    }
}
