//! The task graph produced by [`setup`](crate::setup).
//!
//! Composition returns this as an explicit value instead of mutating an
//! ambient task registry, so repeated setups can't interfere with each
//! other. The caller hands the graph to the executor to invoke any named
//! task; dependency edges point from a dependency to its dependents.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::TaskError;

pub(crate) type TaskFn = Arc<dyn Fn() -> Result<(), TaskError> + Send + Sync>;

pub(crate) struct TaskNode {
    pub name: String,
    /// Umbrella tasks carry no work of their own; their only role is the
    /// dependency edges pointing at them.
    pub work: Option<TaskFn>,
}

impl std::fmt::Debug for TaskNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TaskNode({})", self.name)
    }
}

/// A change-triggered re-invocation of one named task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub name: String,
    /// Glob the external notifier filters change events with.
    pub glob: String,
    /// The task re-invoked on every matching change.
    pub task: String,
}

/// The set of named, independently invocable build operations and their
/// dependency edges.
pub struct TaskGraph {
    pub(crate) graph: DiGraph<TaskNode, ()>,
    pub(crate) index: HashMap<String, NodeIndex>,
    pub(crate) bindings: Vec<WatchBinding>,
}

impl TaskGraph {
    pub(crate) fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            bindings: Vec::new(),
        }
    }

    pub(crate) fn add_task(&mut self, name: impl Into<String>, work: Option<TaskFn>) -> NodeIndex {
        let name = name.into();
        debug_assert!(!self.index.contains_key(&name), "duplicate task '{name}'");

        let node = self.graph.add_node(TaskNode {
            name: name.clone(),
            work,
        });
        self.index.insert(name, node);
        node
    }

    pub(crate) fn add_dependency(&mut self, dependency: NodeIndex, dependent: NodeIndex) {
        self.graph.add_edge(dependency, dependent, ());
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All registered task names, sorted for stable output.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    /// Names of the tasks `name` directly depends on.
    pub fn dependencies_of(&self, name: &str) -> Vec<&str> {
        let Some(node) = self.resolve(name) else {
            return Vec::new();
        };

        let mut deps: Vec<&str> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .map(|i| self.graph[i].name.as_str())
            .collect();
        deps.sort();
        deps
    }

    /// Watch bindings composed from the spec, one per watched category.
    pub fn watch_bindings(&self) -> &[WatchBinding] {
        &self.bindings
    }
}

impl std::fmt::Debug for TaskGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskGraph")
            .field("tasks", &self.task_names())
            .field("bindings", &self.bindings)
            .finish()
    }
}
