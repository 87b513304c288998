use std::future::Future;
use std::sync::Arc;

use crate::error::RunError;
use crate::runner::{Invocation, Pipeline, join_group};

/// One step of a [`Pipeline::sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// A single task.
    Task(Arc<str>),
    /// Tasks started together; the sequence proceeds once all of them
    /// completed.
    Parallel(Vec<Arc<str>>),
}

impl Step {
    pub(crate) fn names(&self) -> &[Arc<str>] {
        match self {
            Step::Task(name) => std::slice::from_ref(name),
            Step::Parallel(names) => names,
        }
    }
}

impl From<&str> for Step {
    fn from(name: &str) -> Self {
        Step::Task(name.into())
    }
}

impl<const N: usize> From<[&str; N]> for Step {
    fn from(names: [&str; N]) -> Self {
        Step::Parallel(names.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<&str>> for Step {
    fn from(names: Vec<&str>) -> Self {
        Step::Parallel(names.into_iter().map(Into::into).collect())
    }
}

impl Pipeline {
    /// Runs the steps in order. Each step is its own invocation, shared by the
    /// members of a parallel group, so prerequisites common to the group run
    /// once per step.
    ///
    /// The first failure stops the sequence; later steps never start.
    ///
    /// ```rust,no_run
    /// # async fn f(pipeline: tsumugi::Pipeline) -> Result<(), tsumugi::RunError> {
    /// use tsumugi::Step;
    ///
    /// pipeline
    ///     .sequence([Step::from("clean"), Step::from("styles"), Step::from(["images", "fonts"])])
    ///     .await
    /// # }
    /// ```
    pub fn sequence(
        &self,
        steps: impl IntoIterator<Item = Step>,
    ) -> impl Future<Output = Result<(), RunError>> + Send + 'static {
        let pipeline = self.clone();
        let steps: Vec<Step> = steps.into_iter().collect();

        async move {
            for name in steps.iter().flat_map(Step::names) {
                pipeline.lookup(name)?;
            }

            for (i, step) in steps.iter().enumerate() {
                tracing::debug!(step = i, tasks = ?step.names(), "sequence step");
                let invocation = Invocation::default();

                match step {
                    Step::Task(name) => pipeline.run_in(&invocation, name).await?,
                    Step::Parallel(names) => {
                        join_group(
                            &invocation,
                            names.iter().map(|name| pipeline.run_in(&invocation, name)),
                        )
                        .await?
                    }
                }
            }

            Ok(())
        }
    }
}
