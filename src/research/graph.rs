use std::collections::{HashMap, HashSet};

use crate::types::Task;

/// Structural problems that make a batch of tasks unrunnable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("duplicate task id: {0}")]
    DuplicateTaskId(String),

    #[error("task {task_id} depends on unknown task {missing}")]
    DependencyNotFound { task_id: String, missing: String },

    #[error("task {0} depends on itself")]
    SelfDependency(String),

    #[error("circular dependency: {0}")]
    CircularDependency(String),
}

/// Validated dependency graph over a batch of tasks.
///
/// Holds each task's count of unmet dependencies plus the reverse edges
/// (dependency -> dependents) the scheduler walks when a task completes.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    in_degree: HashMap<String, usize>,
    dependents: HashMap<String, Vec<String>>,
    edges: HashMap<String, Vec<String>>,
    insertion_order: Vec<String>,
}

impl DependencyGraph {
    /// Build and validate the graph. Fails on duplicate ids, self edges,
    /// dangling dependencies, or any cycle.
    pub fn build(tasks: &[Task]) -> Result<Self, GraphError> {
        let mut edges: HashMap<String, Vec<String>> = HashMap::new();
        let mut insertion_order = Vec::with_capacity(tasks.len());

        for task in tasks {
            if edges.contains_key(&task.id) {
                return Err(GraphError::DuplicateTaskId(task.id.clone()));
            }
            // A dependency listed twice still counts once.
            let mut seen = HashSet::new();
            let deps: Vec<String> = task
                .dependencies
                .iter()
                .filter(|d| seen.insert(d.as_str()))
                .cloned()
                .collect();
            edges.insert(task.id.clone(), deps);
            insertion_order.push(task.id.clone());
        }

        let mut in_degree = HashMap::with_capacity(tasks.len());
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();

        for task_id in &insertion_order {
            let deps = &edges[task_id];
            for dep in deps {
                if dep == task_id {
                    return Err(GraphError::SelfDependency(task_id.clone()));
                }
                if !edges.contains_key(dep) {
                    return Err(GraphError::DependencyNotFound {
                        task_id: task_id.clone(),
                        missing: dep.clone(),
                    });
                }
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(task_id.clone());
            }
            in_degree.insert(task_id.clone(), deps.len());
        }

        let graph = Self {
            in_degree,
            dependents,
            edges,
            insertion_order,
        };

        if let Some(cycle) = graph.detect_cycle() {
            return Err(GraphError::CircularDependency(cycle));
        }

        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.insertion_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insertion_order.is_empty()
    }

    /// Task ids with no dependencies, in input order.
    pub fn ready(&self) -> Vec<String> {
        self.insertion_order
            .iter()
            .filter(|id| self.in_degree.get(*id) == Some(&0))
            .cloned()
            .collect()
    }

    /// Tasks that list `task_id` as a dependency, in input order.
    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.dependents
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Fresh copy of the unmet-dependency counters, for one run.
    pub fn in_degrees(&self) -> HashMap<String, usize> {
        self.in_degree.clone()
    }

    /// Group tasks into waves: every task in a wave only depends on tasks in
    /// earlier waves. Order inside a wave follows input order.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let position: HashMap<&str, usize> = self
            .insertion_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree = self.in_degrees();
        let mut waves = Vec::new();
        let mut current = self.ready();

        while !current.is_empty() {
            let mut next = Vec::new();
            for task_id in &current {
                for dependent in self.dependents_of(task_id) {
                    if let Some(degree) = in_degree.get_mut(dependent) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            next.sort_by_key(|id| position.get(id.as_str()).copied().unwrap_or(usize::MAX));
            waves.push(std::mem::replace(&mut current, next));
        }

        waves
    }

    fn detect_cycle(&self) -> Option<String> {
        let mut visited = HashSet::new();
        let mut stack = Vec::new();

        for task_id in &self.insertion_order {
            if !visited.contains(task_id) && self.dfs_cycle(task_id, &mut visited, &mut stack) {
                return Some(stack.join(" -> "));
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        stack: &mut Vec<String>,
    ) -> bool {
        visited.insert(node.to_string());
        stack.push(node.to_string());

        if let Some(deps) = self.edges.get(node) {
            for dep in deps {
                if let Some(pos) = stack.iter().position(|x| x == dep) {
                    stack.push(dep.clone());
                    *stack = stack[pos..].to_vec();
                    return true;
                }
                if !visited.contains(dep) && self.dfs_cycle(dep, visited, stack) {
                    return true;
                }
            }
        }

        stack.pop();
        false
    }
}
