//! The task runner.
//!
//! A run of a task happens inside an [`Invocation`], which remembers every
//! task that was already started while it lasts. The memo holds a shared
//! future per task, so a task needed by two branches of the same invocation
//! (serial or concurrent) executes exactly once, and every branch observes the
//! same outcome.
//!
//! The order of execution within one invocation is:
//! 1. The prerequisites of a task are run, one after another in the listed
//!    order, or all at once for [`Order::Parallel`] tasks.
//! 2. Once all of them succeeded, the task's own action is spawned on the
//!    runtime and awaited.
//! 3. The first failure ends the invocation. From then on no further action
//!    of the invocation is spawned, on any branch; actions already running
//!    are awaited.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::{self, BoxFuture, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tracing::{Instrument, Level};
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::error::{ConfigError, RunError, SharedError};
use crate::task::{Order, Task, TaskContext};

type SharedRun = Shared<BoxFuture<'static, Result<(), RunError>>>;

/// Completion-tracking scope of one top-level run.
#[derive(Clone, Default)]
pub(crate) struct Invocation {
    runs: Arc<Mutex<HashMap<Arc<str>, SharedRun>>>,
    aborted: Arc<AtomicBool>,
}

impl Invocation {
    fn abort(&self) {
        self.aborted.store(true, Ordering::SeqCst);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

struct Tasks {
    list: Vec<Arc<Task>>,
    index: HashMap<Arc<str>, usize>,
}

/// The frozen task table. Cloning is cheap, every clone refers to the same
/// tasks.
#[derive(Clone)]
pub struct Pipeline {
    tasks: Arc<Tasks>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.tasks.list.iter().map(|task| &task.name))
            .finish()
    }
}

impl Pipeline {
    pub(crate) fn new(tasks: Vec<Task>, index: HashMap<Arc<str>, usize>) -> Self {
        Self {
            tasks: Arc::new(Tasks {
                list: tasks.into_iter().map(Arc::new).collect(),
                index,
            }),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<Task>, ConfigError> {
        self.tasks
            .index
            .get(name)
            .map(|&i| &self.tasks.list[i])
            .ok_or_else(|| ConfigError::UnknownTask(name.to_string()))
    }

    /// Every task in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.list.iter()
    }

    /// Runs `name` and its prerequisites as a fresh invocation.
    ///
    /// Nothing happens until the returned future is polled.
    pub fn run(&self, name: &str) -> impl Future<Output = Result<(), RunError>> + Send + 'static {
        let pipeline = self.clone();
        let name = name.to_string();

        async move {
            let invocation = Invocation::default();
            pipeline.run_in(&invocation, &name).await
        }
    }

    pub(crate) fn run_in(
        &self,
        invocation: &Invocation,
        name: &str,
    ) -> BoxFuture<'static, Result<(), RunError>> {
        let task = match self.lookup(name) {
            Ok(task) => task.clone(),
            Err(err) => return future::ready(Err(err.into())).boxed(),
        };

        let mut runs = invocation
            .runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        runs.entry(task.name.clone())
            .or_insert_with(|| {
                let invocation = invocation.clone();
                let pipeline = self.clone();

                async move {
                    let result = pipeline.execute(invocation.clone(), task).await;
                    if result.is_err() {
                        invocation.abort();
                    }
                    result
                }
                .boxed()
                .shared()
            })
            .clone()
            .boxed()
    }

    async fn execute(self, invocation: Invocation, task: Arc<Task>) -> Result<(), RunError> {
        if invocation.is_aborted() {
            return Err(RunError::Aborted(task.name.clone()));
        }

        match task.order {
            Order::Serial => {
                for prerequisite in &task.prerequisites {
                    if invocation.is_aborted() {
                        return Err(RunError::Aborted(task.name.clone()));
                    }
                    self.run_in(&invocation, prerequisite).await?;
                }
            }
            Order::Parallel => {
                join_group(
                    &invocation,
                    task.prerequisites
                        .iter()
                        .map(|prerequisite| self.run_in(&invocation, prerequisite)),
                )
                .await?;
            }
        }

        let Some(action) = task.action.clone() else {
            tracing::debug!(task = %task.name, "all prerequisites finished");
            return Ok(());
        };

        if invocation.is_aborted() {
            return Err(RunError::Aborted(task.name.clone()));
        }

        let span = tracing::span!(Level::INFO, "task", name = %task.name);
        span.pb_set_style(&crate::utils::get_style_task());
        span.pb_set_message(&format!("Running {}", task.name));

        let context = TaskContext {
            pipeline: self,
            name: task.name.clone(),
        };

        let start = Instant::now();
        tracing::info!(parent: &span, "starting '{}'", task.name);

        // Spawned so that a started action always runs to completion, even
        // when the invocation waiting for it is dropped.
        let handle = tokio::spawn(action(context).instrument(span.clone()));

        match handle.await {
            Ok(Ok(())) => {
                tracing::info!(
                    parent: &span,
                    "finished '{}' {}",
                    task.name,
                    crate::utils::as_overhead(start)
                );
                Ok(())
            }
            Ok(Err(err)) => Err(RunError::Task(task.name.clone(), SharedError::from(err))),
            Err(err) if err.is_panic() => {
                let panic = err.into_panic();
                let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic.downcast_ref::<String>() {
                    s.clone()
                } else {
                    String::from("unknown payload")
                };

                Err(RunError::Panic(task.name.clone(), msg))
            }
            Err(err) => Err(RunError::Task(task.name.clone(), SharedError::new(err))),
        }
    }
}

/// Awaits every future of a concurrently started group of `invocation`.
///
/// The first failure aborts the invocation, so members still waiting on
/// prerequisites never spawn their actions. Members already running settle,
/// then the first real failure is reported.
pub(crate) async fn join_group<F>(
    invocation: &Invocation,
    group: impl IntoIterator<Item = F>,
) -> Result<(), RunError>
where
    F: Future<Output = Result<(), RunError>>,
{
    let mut pending: FuturesUnordered<F> = group.into_iter().collect();
    let mut first: Option<RunError> = None;

    while let Some(result) = pending.next().await {
        let Err(err) = result else { continue };
        invocation.abort();
        tracing::debug!("group member failed: {err}");

        let replace = match &first {
            None => true,
            Some(RunError::Aborted(_)) => !matches!(err, RunError::Aborted(_)),
            Some(_) => false,
        };
        if replace {
            first = Some(err);
        }
    }

    match first {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
