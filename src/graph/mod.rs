/// Petgraph-based project dependency graph
///
/// Versions declare dependencies on projects; collapsed to the project level they
/// form a directed graph (dependent -> dependency). The graph answers two questions:
/// whether a new required dependency would close a cycle, and which projects are
/// affected, directly or transitively, when a project goes away.

use crate::marketplace::types::DependencyKind;
use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use std::collections::HashMap;

/// One project-level dependency edge
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ProjectEdge {
    /// Project whose version declares the dependency
    pub dependent: String,
    /// Project being depended on
    pub dependency: String,
    pub kind: DependencyKind,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, DependencyKind>,
    /// Mapping from project ID to graph node index
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build the graph from every edge
    pub fn from_edges<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = ProjectEdge>,
    {
        let mut graph = Self::default();
        for edge in edges {
            graph.add_edge(&edge.dependent, &edge.dependency, edge.kind);
        }

        tracing::debug!(
            "📊 Built dependency graph with {} projects and {} edges",
            graph.graph.node_count(),
            graph.graph.edge_count()
        );
        graph
    }

    /// Build the graph from required edges only, the ones that must stay acyclic
    pub fn required_only<I>(edges: I) -> Self
    where
        I: IntoIterator<Item = ProjectEdge>,
    {
        Self::from_edges(edges.into_iter().filter(|e| e.kind == DependencyKind::Required))
    }

    fn node(&mut self, project_id: &str) -> NodeIndex {
        if let Some(&index) = self.index.get(project_id) {
            return index;
        }
        let index = self.graph.add_node(project_id.to_string());
        self.index.insert(project_id.to_string(), index);
        index
    }

    pub fn add_edge(&mut self, dependent: &str, dependency: &str, kind: DependencyKind) {
        let from = self.node(dependent);
        let to = self.node(dependency);
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Would adding `dependent -> dependency` create a cycle?
    pub fn would_create_cycle(&self, dependent: &str, dependency: &str) -> bool {
        if dependent == dependency {
            return true;
        }

        match (self.index.get(dependency), self.index.get(dependent)) {
            (Some(&from), Some(&to)) => has_path_connecting(&self.graph, from, to, None),
            _ => false,
        }
    }

    /// Projects that depend on `project_id`, directly or through other projects
    ///
    /// Breadth-first over reversed edges, so nearer dependents come first.
    pub fn transitive_dependents(&self, project_id: &str) -> Vec<String> {
        let Some(&start) = self.index.get(project_id) else {
            return Vec::new();
        };

        let reversed = Reversed(&self.graph);
        let mut bfs = Bfs::new(reversed, start);
        let mut dependents = Vec::new();

        while let Some(index) = bfs.next(reversed) {
            if index != start {
                dependents.push(self.graph[index].clone());
            }
        }

        dependents
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(dependent: &str, dependency: &str, kind: DependencyKind) -> ProjectEdge {
        ProjectEdge {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
            kind,
        }
    }

    #[test]
    fn detects_cycles_through_required_edges() {
        // ui -> core -> lib
        let graph = DependencyGraph::required_only(vec![
            edge("ui", "core", DependencyKind::Required),
            edge("core", "lib", DependencyKind::Required),
            edge("lib", "extras", DependencyKind::Optional),
        ]);

        assert!(graph.would_create_cycle("lib", "ui"));
        assert!(graph.would_create_cycle("core", "core"));
        assert!(!graph.would_create_cycle("ui", "lib"));
        // optional edges are ignored, so extras -> lib is fine
        assert!(!graph.would_create_cycle("extras", "lib"));
        assert!(!graph.would_create_cycle("brand-new", "ui"));
    }

    #[test]
    fn transitive_dependents_walk_reverse_edges() {
        let graph = DependencyGraph::from_edges(vec![
            edge("ui", "core", DependencyKind::Required),
            edge("core", "lib", DependencyKind::Required),
            edge("sounds", "lib", DependencyKind::Optional),
            edge("lib", "base", DependencyKind::Embedded),
        ]);

        let mut dependents = graph.transitive_dependents("lib");
        assert_eq!(dependents.len(), 3);
        dependents.sort();
        assert_eq!(dependents, vec!["core", "sounds", "ui"]);

        assert!(graph.transitive_dependents("ui").is_empty());
        assert!(graph.transitive_dependents("unknown").is_empty());
    }

    #[test]
    fn duplicate_edges_are_collapsed() {
        let mut graph = DependencyGraph::default();
        graph.add_edge("a", "b", DependencyKind::Required);
        graph.add_edge("a", "b", DependencyKind::Required);
        assert_eq!(graph.graph.edge_count(), 1);
    }
}
