use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::ConfigError;
use crate::runner::Pipeline;
use crate::task::{ActionFn, Order, Task, TaskContext, TaskResult};

/// The table of tasks, filled in at startup.
///
/// Prerequisites may name tasks which are registered later, so they are only
/// resolved in [`Registry::finish`], which also rejects cyclic prerequisite
/// graphs. The result is an immutable [`Pipeline`].
///
/// # Example
///
/// ```rust,no_run
/// use tsumugi::Registry;
///
/// let mut registry = Registry::new();
/// registry.task("concat").run(|_| async { Ok(()) })?;
/// registry.task("minify").after(["concat"]).run(|_| async { Ok(()) })?;
/// let pipeline = registry.finish()?;
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Default)]
pub struct Registry {
    tasks: Vec<Task>,
    index: HashMap<Arc<str>, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the definition of a task called `name`.
    pub fn task(&mut self, name: impl Into<Arc<str>>) -> TaskDef<'_> {
        TaskDef {
            registry: self,
            name: name.into(),
            prerequisites: Vec::new(),
            order: Order::Serial,
        }
    }

    /// Registers a task running `action` after its `prerequisites`, which are
    /// brought up to date one after another.
    pub fn register<F, Fut>(
        &mut self,
        name: &str,
        prerequisites: impl IntoIterator<Item = impl Into<Arc<str>>>,
        action: F,
    ) -> Result<(), ConfigError>
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.task(name).after(prerequisites).run(action)
    }

    pub(crate) fn insert(&mut self, task: Task) -> Result<(), ConfigError> {
        if self.index.contains_key(&task.name) {
            return Err(ConfigError::DuplicateTask(task.name.to_string()));
        }

        self.index.insert(task.name.clone(), self.tasks.len());
        self.tasks.push(task);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Task, ConfigError> {
        self.index
            .get(name)
            .map(|&i| &self.tasks[i])
            .ok_or_else(|| ConfigError::UnknownTask(name.to_string()))
    }

    /// Resolves every prerequisite and freezes the table.
    pub fn finish(self) -> Result<Pipeline, ConfigError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(self.tasks.len(), 0);
        let nodes: Vec<NodeIndex> = (0..self.tasks.len()).map(|i| graph.add_node(i)).collect();

        for (i, task) in self.tasks.iter().enumerate() {
            for prerequisite in &task.prerequisites {
                let Some(&j) = self.index.get(prerequisite) else {
                    return Err(ConfigError::UnknownPrerequisite {
                        task: task.name.to_string(),
                        prerequisite: prerequisite.to_string(),
                    });
                };

                graph.add_edge(nodes[j], nodes[i], ());
            }
        }

        if let Err(cycle) = petgraph::algo::toposort(&graph, None) {
            let culprit = cycle.node_id();
            let members = petgraph::algo::tarjan_scc(&graph)
                .into_iter()
                .find(|scc| scc.contains(&culprit))
                .unwrap_or_else(|| vec![culprit]);

            let mut names: Vec<String> = members
                .into_iter()
                .map(|node| self.tasks[graph[node]].name.to_string())
                .collect();
            names.sort();

            return Err(ConfigError::Cycle(names));
        }

        Ok(Pipeline::new(self.tasks, self.index))
    }
}

/// Builder returned by [`Registry::task`].
pub struct TaskDef<'a> {
    registry: &'a mut Registry,
    name: Arc<str>,
    prerequisites: Vec<Arc<str>>,
    order: Order,
}

impl<'a> TaskDef<'a> {
    /// Tasks which must complete before this one starts.
    pub fn after(mut self, names: impl IntoIterator<Item = impl Into<Arc<str>>>) -> Self {
        self.prerequisites.extend(names.into_iter().map(Into::into));
        self
    }

    /// Run the prerequisites concurrently instead of one after another.
    pub fn parallel(mut self) -> Self {
        self.order = Order::Parallel;
        self
    }

    pub fn run<F, Fut>(self, action: F) -> Result<(), ConfigError>
    where
        F: Fn(TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let action: ActionFn = Arc::new(move |ctx| action(ctx).boxed());
        self.registry.insert(Task::new(
            self.name,
            self.prerequisites,
            self.order,
            Some(action),
        ))
    }

    /// Registers the task without an action of its own.
    pub fn group(self) -> Result<(), ConfigError> {
        self.registry
            .insert(Task::new(self.name, self.prerequisites, self.order, None))
    }
}
