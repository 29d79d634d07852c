use std::collections::{HashMap, HashSet};

use crate::kernel::error::{Error, Result};

/// Component dependency graph.
///
/// Keeps both directions: `forward[id]` lists what `id` depends on and
/// `reverse[id]` lists what depends on `id`. Edges may point at ids that are
/// not (yet) nodes; such dependencies are reported as missing but never
/// break traversal.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Registered nodes in insertion order
    nodes: Vec<String>,
    forward: HashMap<String, Vec<String>>,
    reverse: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its dependency edges. Duplicate dependency ids are
    /// collapsed, keeping first occurrence order.
    pub fn add_node(&mut self, id: &str, dependencies: &[String]) {
        if !self.contains(id) {
            self.nodes.push(id.to_string());
        }
        let mut deps: Vec<String> = Vec::with_capacity(dependencies.len());
        for dep in dependencies {
            if !deps.contains(dep) {
                deps.push(dep.clone());
            }
        }
        for dep in &deps {
            let dependents = self.reverse.entry(dep.clone()).or_default();
            if !dependents.iter().any(|d| d == id) {
                dependents.push(id.to_string());
            }
        }
        self.forward.insert(id.to_string(), deps);
    }

    /// Remove a node and its outgoing edges.
    ///
    /// Edges from dependents into `id` stay, so a later re-registration of
    /// `id` reconnects to them.
    pub fn remove_node(&mut self, id: &str) {
        self.nodes.retain(|n| n != id);
        if let Some(deps) = self.forward.remove(id) {
            for dep in deps {
                if let Some(dependents) = self.reverse.get_mut(&dep) {
                    dependents.retain(|d| d != id);
                    if dependents.is_empty() {
                        self.reverse.remove(&dep);
                    }
                }
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn dependencies_of(&self, id: &str) -> Vec<String> {
        self.forward.get(id).cloned().unwrap_or_default()
    }

    /// Registered components that declare `id` as a dependency
    pub fn dependents_of(&self, id: &str) -> Vec<String> {
        self.reverse
            .get(id)
            .map(|deps| deps.iter().filter(|d| self.contains(d)).cloned().collect())
            .unwrap_or_default()
    }

    /// Declared dependencies of `id` that are not nodes of the graph
    pub fn missing_dependencies(&self, id: &str) -> Vec<String> {
        self.dependencies_of(id)
            .into_iter()
            .filter(|dep| !self.contains(dep))
            .collect()
    }

    /// Order `subset` so every id follows the dependencies it shares with
    /// the subset. Ids outside the subset are neither visited nor returned.
    ///
    /// Ties follow the order of `subset`.
    pub fn topological_order(&self, subset: &[String]) -> Result<Vec<String>> {
        let scope: HashSet<&str> = subset.iter().map(String::as_str).collect();
        let mut visited = HashSet::new();
        let mut visiting = Vec::new();
        let mut order = Vec::with_capacity(subset.len());

        for id in subset {
            self.visit(id, &scope, &mut visiting, &mut visited, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        scope: &HashSet<&str>,
        visiting: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if visited.contains(id) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|v| *v == id) {
            let mut path: Vec<String> = visiting[start..].iter().map(|s| s.to_string()).collect();
            path.push(id.to_string());
            return Err(Error::Cycle { component_id: id.to_string(), path });
        }

        visiting.push(id);
        if let Some(deps) = self.forward.get(id) {
            for dep in deps {
                if scope.contains(dep.as_str()) {
                    self.visit(dep, scope, visiting, visited, order)?;
                }
            }
        }
        visiting.pop();
        visited.insert(id);
        order.push(id.to_string());
        Ok(())
    }

    /// Transitive dependencies of `id` in post-order (deepest first), with
    /// `id` itself last. Missing ids are included but not expanded; each id
    /// appears once.
    pub fn dependency_chain(&self, id: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        let mut chain = Vec::new();
        self.collect_chain(id, &mut visited, &mut chain);
        chain
    }

    fn collect_chain<'a>(&'a self, id: &'a str, visited: &mut HashSet<&'a str>, chain: &mut Vec<String>) {
        if !visited.insert(id) {
            return;
        }
        if let Some(deps) = self.forward.get(id) {
            for dep in deps {
                self.collect_chain(dep, visited, chain);
            }
        }
        chain.push(id.to_string());
    }

    /// Ids that lie on a dependency cycle reachable from `id`, sorted.
    pub fn find_cycles_from(&self, id: &str) -> Vec<String> {
        let mut on_cycle = HashSet::new();
        let mut visited = HashSet::new();
        let mut stack = Vec::new();
        self.cycle_dfs(id, &mut stack, &mut visited, &mut on_cycle);
        let mut ids: Vec<String> = on_cycle.into_iter().collect();
        ids.sort();
        ids
    }

    fn cycle_dfs<'a>(
        &'a self,
        id: &'a str,
        stack: &mut Vec<&'a str>,
        visited: &mut HashSet<&'a str>,
        on_cycle: &mut HashSet<String>,
    ) {
        if let Some(start) = stack.iter().position(|s| *s == id) {
            on_cycle.extend(stack[start..].iter().map(|s| s.to_string()));
            return;
        }
        if !visited.insert(id) {
            return;
        }
        stack.push(id);
        if let Some(deps) = self.forward.get(id) {
            for dep in deps {
                self.cycle_dfs(dep, stack, visited, on_cycle);
            }
        }
        stack.pop();
    }

    /// Check if the graph contains cycles
    pub fn has_cycles(&self) -> bool {
        self.topological_order(&self.nodes).is_err()
    }
}
