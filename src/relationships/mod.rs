//! Relationship resolution, cycle detection and graph construction

pub mod graph;

pub use graph::{Edge, RelationshipGraph};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::warn;

use crate::models::{Manifest, CHILDREN, DEPENDENCIES, PARENT, VALIDATORS};
use crate::registry::Registry;

/// Relation keys walked by [`build_relationship_graph`] when none are given
pub const DEFAULT_GRAPH_KEYS: [&str; 4] = [PARENT, CHILDREN, DEPENDENCIES, VALIDATORS];

/// A relationship diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelationshipIssue {
    /// `source` references `target` under `relation`, but `target` is not registered
    OrphanedRelationship {
        source: String,
        relation: String,
        target: String,
    },
    /// A cycle along the dependency key, closed: `[a, b, a]`
    CircularDependency { path: Vec<String> },
}

impl RelationshipIssue {
    pub fn kind(&self) -> &'static str {
        match self {
            RelationshipIssue::OrphanedRelationship { .. } => "orphaned_relationship",
            RelationshipIssue::CircularDependency { .. } => "circular_dependency",
        }
    }
}

impl std::fmt::Display for RelationshipIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationshipIssue::OrphanedRelationship {
                source,
                relation,
                target,
            } => write!(
                f,
                "{}: '{}' references unknown manifest {}",
                source, relation, target
            ),
            RelationshipIssue::CircularDependency { path } => {
                write!(f, "circular dependency: {}", path.join(" -> "))
            }
        }
    }
}

/// Registered manifests referenced by `manifest` under `key`, in declaration
/// order. Unknown ids are skipped.
pub fn resolve_relationships(
    registry: &Registry,
    manifest: &Manifest,
    key: &str,
) -> Vec<Arc<Manifest>> {
    manifest
        .relation_targets(key)
        .into_iter()
        .filter_map(|id| registry.get(id).cloned())
        .collect()
}

struct Frame<'a> {
    id: &'a str,
    targets: Vec<&'a str>,
    next: usize,
}

/// Depth-first search along `key` starting at `manifest`.
///
/// Returns the first cycle found as a closed path (`[a, b, a]`). The cycle
/// need not pass through the start. `manifest`'s own relationships are used
/// for the start node even when a different version is registered under its
/// id.
pub fn detect_circular_relationships(
    registry: &Registry,
    manifest: &Manifest,
    key: &str,
) -> Option<Vec<String>> {
    let start = manifest.id.as_str();
    let mut stack = vec![Frame {
        id: start,
        targets: manifest.relation_targets(key),
        next: 0,
    }];
    let mut on_path: HashSet<&str> = HashSet::from([start]);
    let mut finished: HashSet<&str> = HashSet::new();

    while let Some(frame) = stack.last_mut() {
        let Some(&target) = frame.targets.get(frame.next) else {
            on_path.remove(frame.id);
            finished.insert(frame.id);
            stack.pop();
            continue;
        };
        frame.next += 1;

        if on_path.contains(target) {
            let from = stack.iter().position(|f| f.id == target).unwrap_or(0);
            let mut cycle: Vec<String> =
                stack[from..].iter().map(|f| f.id.to_string()).collect();
            cycle.push(target.to_string());
            return Some(cycle);
        }
        if finished.contains(target) {
            continue;
        }

        on_path.insert(target);
        stack.push(Frame {
            id: target,
            targets: targets_of(registry, manifest, target, key),
            next: 0,
        });
    }

    None
}

fn targets_of<'a>(
    registry: &'a Registry,
    start: &'a Manifest,
    id: &str,
    key: &str,
) -> Vec<&'a str> {
    if id == start.id {
        return start.relation_targets(key);
    }
    registry
        .get(id)
        .map(|m| m.relation_targets(key))
        .unwrap_or_default()
}

/// One pass over the registry producing `{from, to, type}` edges for `keys`,
/// in key order and then declaration order per manifest.
pub fn build_relationship_graph<S: AsRef<str>>(
    registry: &Registry,
    keys: &[S],
) -> RelationshipGraph {
    let mut graph = RelationshipGraph::new();
    for id in registry.ids() {
        graph.add_node(id);
    }
    for manifest in registry.iter() {
        for key in keys {
            let key = key.as_ref();
            for target in manifest.relation_targets(key) {
                graph.add_edge(Edge::new(&manifest.id, target, key));
            }
        }
    }
    graph
}

/// Orphaned references under every relation key, then dependency cycles
pub fn validate_relationships(registry: &Registry) -> Vec<RelationshipIssue> {
    validate_relationships_along(registry, DEPENDENCIES)
}

/// Like [`validate_relationships`], with cycles looked for along `cycle_key`.
///
/// Every manifest that lies on a cycle appears in at least one reported
/// path. Cycles are reported in registry order of their first manifest.
pub fn validate_relationships_along(
    registry: &Registry,
    cycle_key: &str,
) -> Vec<RelationshipIssue> {
    let mut issues = Vec::new();

    for manifest in registry.iter() {
        let Some(relationships) = &manifest.relationships else {
            continue;
        };
        for relation in relationships.keys() {
            for target in relationships.targets(relation) {
                if !registry.has(target) {
                    issues.push(RelationshipIssue::OrphanedRelationship {
                        source: manifest.id.clone(),
                        relation: relation.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    let adjacency = Adjacency::build(registry, cycle_key);
    for cycle in adjacency.covering_cycles() {
        warn!(cycle = %cycle.join(" -> "), key = cycle_key, "relationship cycle found");
        issues.push(RelationshipIssue::CircularDependency { path: cycle });
    }

    issues
}

/// Registered manifests as dense indices with their outgoing edges along one key
struct Adjacency<'a> {
    ids: Vec<&'a str>,
    targets: Vec<Vec<usize>>,
}

const UNVISITED: usize = usize::MAX;

impl<'a> Adjacency<'a> {
    fn build(registry: &'a Registry, key: &str) -> Self {
        let ids: Vec<&str> = registry.ids().collect();
        let position: HashMap<&str, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let targets = registry
            .iter()
            .map(|m| {
                m.relation_targets(key)
                    .into_iter()
                    .filter_map(|id| position.get(id).copied())
                    .collect()
            })
            .collect();
        Self { ids, targets }
    }

    /// Strongly connected component of every node (iterative Tarjan)
    fn components(&self) -> Vec<usize> {
        let n = self.ids.len();
        let mut index = vec![UNVISITED; n];
        let mut low = vec![0; n];
        let mut on_stack = vec![false; n];
        let mut component = vec![UNVISITED; n];
        let mut stack = Vec::new();
        let mut next_index = 0;
        let mut next_component = 0;

        for root in 0..n {
            if index[root] != UNVISITED {
                continue;
            }
            // (node, next edge to try)
            let mut frames = vec![(root, 0usize)];
            index[root] = next_index;
            low[root] = next_index;
            next_index += 1;
            stack.push(root);
            on_stack[root] = true;

            while let Some(frame) = frames.last_mut() {
                let (node, edge) = *frame;
                if let Some(&target) = self.targets[node].get(edge) {
                    frame.1 += 1;
                    if index[target] == UNVISITED {
                        index[target] = next_index;
                        low[target] = next_index;
                        next_index += 1;
                        stack.push(target);
                        on_stack[target] = true;
                        frames.push((target, 0));
                    } else if on_stack[target] {
                        low[node] = low[node].min(index[target]);
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    low[parent] = low[parent].min(low[node]);
                }
                if low[node] == index[node] {
                    while let Some(member) = stack.pop() {
                        on_stack[member] = false;
                        component[member] = next_component;
                        if member == node {
                            break;
                        }
                    }
                    next_component += 1;
                }
            }
        }

        component
    }

    /// Closed cycle paths such that every node on some cycle is covered.
    ///
    /// Walking nodes in registry order, each uncovered cyclic node gets the
    /// shortest cycle through it, searched within its own component only.
    fn covering_cycles(&self) -> Vec<Vec<String>> {
        let component = self.components();
        let mut sizes: HashMap<usize, usize> = HashMap::new();
        for &c in &component {
            *sizes.entry(c).or_default() += 1;
        }
        let cyclic = |node: usize| {
            sizes.get(&component[node]).copied().unwrap_or(0) > 1
                || self.targets[node].contains(&node)
        };

        let mut covered = vec![false; self.ids.len()];
        let mut cycles = Vec::new();
        for node in 0..self.ids.len() {
            if covered[node] || !cyclic(node) {
                continue;
            }
            let Some(path) = self.shortest_cycle(node, &component) else {
                continue;
            };
            for &member in &path {
                covered[member] = true;
            }
            cycles.push(path.iter().map(|&i| self.ids[i].to_string()).collect());
        }
        cycles
    }

    /// Breadth-first search back to `start`, returned closed: `[start, .., start]`
    fn shortest_cycle(&self, start: usize, component: &[usize]) -> Option<Vec<usize>> {
        let mut came_from: HashMap<usize, usize> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            for &target in &self.targets[node] {
                if target == start {
                    let mut path = vec![start, node];
                    let mut current = node;
                    while let Some(&previous) = came_from.get(&current) {
                        path.push(previous);
                        current = previous;
                    }
                    path.reverse();
                    return Some(path);
                }
                if component[target] != component[start] || came_from.contains_key(&target) {
                    continue;
                }
                came_from.insert(target, node);
                queue.push_back(target);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(manifests: Vec<Manifest>) -> Registry {
        let mut registry = Registry::new();
        for manifest in manifests {
            registry.register(manifest).unwrap();
        }
        registry
    }

    #[test]
    fn test_resolve_drops_unknown() {
        let registry = registry(vec![
            Manifest::new("form", "container").with_children(["email", "ghost", "password"]),
            Manifest::new("email", "input"),
            Manifest::new("password", "input"),
        ]);
        let form = registry.get("form").unwrap();
        let children: Vec<_> = resolve_relationships(&registry, form, CHILDREN)
            .iter()
            .map(|m| m.id.clone())
            .collect();
        assert_eq!(children, vec!["email", "password"]);
        assert!(resolve_relationships(&registry, form, VALIDATORS).is_empty());
    }

    #[test]
    fn test_detect_cycle() {
        let registry = registry(vec![
            Manifest::new("a", "action").with_dependencies(["b"]),
            Manifest::new("b", "action").with_dependencies(["c"]),
            Manifest::new("c", "action").with_dependencies(["a"]),
        ]);
        let a = registry.get("a").unwrap();
        assert_eq!(
            detect_circular_relationships(&registry, a, DEPENDENCIES),
            Some(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
        assert_eq!(detect_circular_relationships(&registry, a, CHILDREN), None);
    }

    #[test]
    fn test_self_loop_and_acyclic() {
        let registry = registry(vec![
            Manifest::new("a", "action").with_dependencies(["a"]),
            Manifest::new("b", "action").with_dependencies(["c", "d"]),
            Manifest::new("c", "action").with_dependencies(["d"]),
            Manifest::new("d", "action"),
        ]);
        assert_eq!(
            detect_circular_relationships(&registry, registry.get("a").unwrap(), DEPENDENCIES),
            Some(vec!["a".into(), "a".into()])
        );
        assert_eq!(
            detect_circular_relationships(&registry, registry.get("b").unwrap(), DEPENDENCIES),
            None
        );
    }

    #[test]
    fn test_cycle_away_from_start() {
        let registry = registry(vec![
            Manifest::new("x", "action").with_dependencies(["y"]),
            Manifest::new("y", "action").with_dependencies(["z"]),
            Manifest::new("z", "action").with_dependencies(["y"]),
        ]);
        assert_eq!(
            detect_circular_relationships(&registry, registry.get("x").unwrap(), DEPENDENCIES),
            Some(vec!["y".into(), "z".into(), "y".into()])
        );
    }

    #[test]
    fn test_unregistered_start_uses_own_relationships() {
        let registry = registry(vec![Manifest::new("b", "action").with_dependencies(["draft"])]);
        let draft = Manifest::new("draft", "action").with_dependencies(["b"]);
        assert_eq!(
            detect_circular_relationships(&registry, &draft, DEPENDENCIES),
            Some(vec!["draft".into(), "b".into(), "draft".into()])
        );
    }

    #[test]
    fn test_graph_edges_in_order() {
        let registry = registry(vec![
            Manifest::new("form", "container")
                .with_children(["email", "password"])
                .with_validators(["ghost"]),
            Manifest::new("email", "input").with_parent("form"),
            Manifest::new("password", "input"),
        ]);
        let graph = build_relationship_graph(&registry, &DEFAULT_GRAPH_KEYS);

        assert_eq!(graph.nodes(), ["form", "email", "password"]);
        let edges: Vec<(&str, &str, &str)> = graph
            .edges()
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str(), e.relation.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![
                ("form", "email", "children"),
                ("form", "password", "children"),
                ("form", "ghost", "validators"),
                ("email", "form", "parent"),
            ]
        );

        let only_parents = build_relationship_graph(&registry, &["parent"]);
        assert_eq!(only_parents.edge_count(), 1);
    }

    #[test]
    fn test_validate_finds_orphans_and_every_cycle() {
        let registry = registry(vec![
            Manifest::new("a", "action").with_dependencies(["b"]),
            Manifest::new("b", "action").with_dependencies(["a"]),
            Manifest::new("c", "action").with_dependencies(["d"]),
            Manifest::new("d", "action")
                .with_dependencies(["c"])
                .with_children(["ghost"]),
        ]);
        let issues = validate_relationships(&registry);

        let orphans: Vec<_> = issues
            .iter()
            .filter(|i| i.kind() == "orphaned_relationship")
            .collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].to_string(), "d: 'children' references unknown manifest ghost");

        let cycles: Vec<_> = issues
            .iter()
            .filter_map(|i| match i {
                RelationshipIssue::CircularDependency { path } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(cycles.len(), 2);
        assert!(cycles.contains(&vec!["a".into(), "b".into(), "a".into()]));
        assert!(cycles.contains(&vec!["c".into(), "d".into(), "c".into()]));
    }

    #[test]
    fn test_validate_covers_cycles_through_a_shared_node() {
        let registry = registry(vec![
            Manifest::new("a", "action").with_dependencies(["b", "c"]),
            Manifest::new("b", "action").with_dependencies(["a"]),
            Manifest::new("c", "action").with_dependencies(["a"]),
            Manifest::new("d", "action").with_dependencies(["d"]),
            Manifest::new("e", "action").with_dependencies(["a"]),
        ]);
        let cycles: Vec<Vec<String>> = validate_relationships(&registry)
            .into_iter()
            .filter_map(|i| match i {
                RelationshipIssue::CircularDependency { path } => Some(path),
                _ => None,
            })
            .collect();

        assert_eq!(
            cycles,
            vec![
                vec!["a".to_string(), "b".into(), "a".into()],
                vec!["c".to_string(), "a".into(), "c".into()],
                vec!["d".to_string(), "d".into()],
            ]
        );
    }

    #[test]
    fn test_components_split_chain_from_ring() {
        let registry = registry(vec![
            Manifest::new("a", "action").with_dependencies(["b"]),
            Manifest::new("b", "action").with_dependencies(["c"]),
            Manifest::new("c", "action").with_dependencies(["b", "ghost"]),
        ]);
        let adjacency = Adjacency::build(&registry, DEPENDENCIES);
        let component = adjacency.components();
        assert_ne!(component[0], component[1]);
        assert_eq!(component[1], component[2]);
        assert_eq!(adjacency.targets[2], vec![1]);
    }

    #[test]
    fn test_issue_serde_tag() {
        let issue = RelationshipIssue::CircularDependency {
            path: vec!["a".into(), "a".into()],
        };
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(value["type"], "circular_dependency");
        assert_eq!(value["path"][1], "a");
    }
}
