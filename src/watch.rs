//! The file watcher.
//!
//! A [`Watcher`] holds a list of bindings, each one a glob pattern and the
//! tasks it triggers. Every filesystem event is checked against every binding
//! in registration order, and each task of a matching binding is started as
//! its own top-level run. Nothing is queued or debounced: a burst of events
//! starts a burst of runs, and the invocation memo of each run keeps it
//! internally consistent.
//!
//! `notify` is used directly, watching the static roots of the patterns
//! recursively. Roots nested inside other roots are collapsed first.

use std::collections::HashSet;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use notify::{EventKind, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::WatchConfig;
use crate::error::{ConfigError, WatchError};
use crate::glob::GlobPattern;
use crate::runner::Pipeline;

struct WatchBinding {
    pattern: GlobPattern,
    tasks: Vec<Arc<str>>,
}

pub struct Watcher {
    pipeline: Pipeline,
    bindings: Vec<WatchBinding>,
}

impl Watcher {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            bindings: Vec::new(),
        }
    }

    /// Creates a watcher with every configured binding.
    pub fn from_config(pipeline: Pipeline, config: &[WatchConfig]) -> Result<Self, ConfigError> {
        let mut watcher = Self::new(pipeline);
        for binding in config {
            watcher.watch(&binding.pattern, &binding.tasks)?;
        }
        Ok(watcher)
    }

    /// Binds `tasks` to changes of files matching `pattern`.
    ///
    /// Task names are checked right away, an unknown name is an error here
    /// and not when the first event arrives.
    pub fn watch(
        &mut self,
        pattern: &str,
        tasks: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<(), ConfigError> {
        let pattern = GlobPattern::new(pattern)?;
        let tasks = tasks
            .into_iter()
            .map(|name| Ok(self.pipeline.lookup(name.as_ref())?.name.clone()))
            .collect::<Result<Vec<_>, ConfigError>>()?;

        self.bindings.push(WatchBinding { pattern, tasks });
        Ok(())
    }

    /// Tasks triggered by a change of `path`, in the order they are started.
    pub fn triggered(&self, path: &Utf8Path) -> Vec<Arc<str>> {
        self.bindings
            .iter()
            .filter(|binding| binding.pattern.matches(path))
            .flat_map(|binding| binding.tasks.iter().cloned())
            .collect()
    }

    /// Starts a fresh run of every task triggered by `path`.
    ///
    /// Failures are logged; the returned handles resolve once the runs
    /// settle.
    pub fn dispatch(&self, path: &Utf8Path) -> Vec<JoinHandle<()>> {
        self.triggered(path)
            .into_iter()
            .map(|name| {
                tracing::info!(task = %name, "change detected in {path}");
                let run = self.pipeline.run(&name);

                tokio::spawn(async move {
                    if let Err(e) = run.await {
                        tracing::error!("{e:#}");
                    }
                })
            })
            .collect()
    }

    /// Directories to watch recursively.
    fn roots(&self) -> Result<Vec<Utf8PathBuf>, WatchError> {
        let mut roots = HashSet::new();

        for binding in &self.bindings {
            let root = nearest_existing(binding.pattern.root()).canonicalize_utf8()?;

            // Files are replaced on save by many editors, watch the directory.
            let root = match root.parent() {
                Some(parent) if root.is_file() => parent.to_path_buf(),
                _ => root,
            };

            roots.insert(root);
        }

        Ok(collapse_watch_paths(roots))
    }

    /// Listens for changes until the event source closes.
    pub async fn run(self) -> Result<(), WatchError> {
        let pwd = Utf8PathBuf::try_from(std::env::current_dir()?)?;
        let pwd = pwd.canonicalize_utf8().unwrap_or(pwd);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            // The receiver is only gone when the loop below has ended.
            let _ = tx.send(event);
        })?;

        for root in self.roots()? {
            tracing::info!("watching {root}");
            watcher.watch(root.as_std_path(), RecursiveMode::Recursive)?;
        }

        while let Some(event) = rx.recv().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!("watch error: {e:?}");
                    continue;
                }
            };

            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }

            for path in event.paths {
                let Ok(path) = Utf8PathBuf::try_from(path) else {
                    continue;
                };

                let path = path.strip_prefix(&pwd).unwrap_or(path.as_path());
                self.dispatch(path);
            }
        }

        Err(WatchError::Closed)
    }
}

/// The path itself, or its closest ancestor that exists, so patterns whose
/// directory does not exist yet are still covered.
fn nearest_existing(path: &Utf8Path) -> &Utf8Path {
    let path = if path.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        path
    };

    path.ancestors()
        .find(|p| !p.as_str().is_empty() && p.exists())
        .unwrap_or(Utf8Path::new("."))
}

/// Drops every root nested inside another root; watches are recursive.
fn collapse_watch_paths(paths: HashSet<Utf8PathBuf>) -> Vec<Utf8PathBuf> {
    let mut roots: Vec<_> = paths.into_iter().collect();
    roots.sort();
    roots.dedup_by(|nested, root| nested.starts_with(&*root));
    roots
}
