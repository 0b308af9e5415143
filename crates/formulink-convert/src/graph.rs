//! Incremental dependency graph with cycle search.
//!
//! Nodes are cell keys (`Sheet!A1`). Edges are added as each formula is
//! converted; the whole graph lives for exactly one export session.

use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: FxHashMap<String, FxHashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `target` depends on each of `referenced`.
    pub fn add_dependency<I, S>(&mut self, target: impl Into<String>, referenced: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.edges
            .entry(target.into())
            .or_default()
            .extend(referenced.into_iter().map(Into::into));
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }

    /// DFS from `start` with an explicit ancestor path. Returns the cyclic
    /// suffix (closing node repeated) the first time a node reappears in its
    /// own ancestor chain, e.g. `[A, B, C, A]`.
    pub fn detect_from(&self, start: &str) -> Option<Vec<String>> {
        let mut path: Vec<&str> = Vec::new();
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        self.dfs(start, &mut path, &mut visited)
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        path: &mut Vec<&'a str>,
        visited: &mut FxHashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(pos) = path.iter().position(|&ancestor| ancestor == node) {
            let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if !visited.insert(node) {
            return None;
        }
        path.push(node);
        if let Some(referenced) = self.edges.get(node) {
            for next in referenced {
                if let Some(cycle) = self.dfs(next, path, visited) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    /// Find all distinct cycles, visiting each node once. Nodes classified
    /// by an earlier start are skipped, keeping the pass O(V+E).
    pub fn validate_all(&self) -> Vec<Vec<String>> {
        let mut classified: FxHashSet<&str> = FxHashSet::default();
        let mut seen_keys: FxHashSet<Vec<String>> = FxHashSet::default();
        let mut cycles = Vec::new();
        let mut starts: Vec<&str> = self.edges.keys().map(String::as_str).collect();
        starts.sort_unstable();
        for start in starts {
            if classified.contains(start) {
                continue;
            }
            let mut path: Vec<&str> = Vec::new();
            if let Some(cycle) = self.dfs(start, &mut path, &mut classified) {
                if seen_keys.insert(canonical_key(&cycle)) {
                    cycles.push(cycle);
                }
            }
        }
        cycles
    }
}

/// Rotation-independent identity of a cycle, for deduplication.
fn canonical_key(cycle: &[String]) -> Vec<String> {
    // Drop the repeated closing node, rotate so the smallest member leads.
    let body = &cycle[..cycle.len().saturating_sub(1)];
    if body.is_empty() {
        return Vec::new();
    }
    let min = body
        .iter()
        .enumerate()
        .min_by_key(|(_, s)| s.as_str())
        .map(|(i, _)| i)
        .unwrap_or(0);
    body.iter()
        .cycle()
        .skip(min)
        .take(body.len())
        .cloned()
        .collect()
}
