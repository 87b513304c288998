use std::fmt::Debug;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::runner::Pipeline;

/// Result from a single task action.
pub type TaskResult<T = ()> = anyhow::Result<T, anyhow::Error>;

/// The completion signal of a task action.
pub type TaskFuture = BoxFuture<'static, TaskResult>;

/// Task action pointer. Called once per execution, the returned future is
/// spawned on the runtime and awaited by the runner.
pub(crate) type ActionFn = Arc<dyn Fn(TaskContext) -> TaskFuture + Send + Sync>;

/// How the prerequisites of a task are brought up to date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// One after another, in the listed order.
    #[default]
    Serial,
    /// All at once; the action starts after every one of them completed.
    Parallel,
}

/// Handed to a task action when it is invoked.
#[derive(Clone)]
pub struct TaskContext {
    /// The pipeline the task belongs to, for actions which orchestrate other
    /// tasks.
    pub pipeline: Pipeline,
    /// Name of the running task.
    pub name: Arc<str>,
}

/// A named unit of work. Immutable once registered.
pub struct Task {
    pub(crate) name: Arc<str>,
    pub(crate) prerequisites: Vec<Arc<str>>,
    pub(crate) order: Order,
    pub(crate) action: Option<ActionFn>,
}

impl Task {
    pub(crate) fn new(
        name: impl Into<Arc<str>>,
        prerequisites: Vec<Arc<str>>,
        order: Order,
        action: Option<ActionFn>,
    ) -> Self {
        Self {
            name: name.into(),
            prerequisites,
            order,
            action,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prerequisites(&self) -> &[Arc<str>] {
        &self.prerequisites
    }

    pub fn order(&self) -> Order {
        self.order
    }

    /// Tasks without an action only exist to pull in their prerequisites.
    pub fn is_orchestration(&self) -> bool {
        self.action.is_none()
    }
}

impl Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("prerequisites", &self.prerequisites)
            .field("order", &self.order)
            .field("action", &self.action.as_ref().map(|_| "*"))
            .finish()
    }
}
