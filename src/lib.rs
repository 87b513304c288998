#![forbid(unsafe_code)]
//! A static-asset pipeline built from named tasks.
//!
//! Tasks are registered into a [`Registry`] together with their
//! prerequisites and an async action. Once every task is known, the registry
//! is frozen into a [`Pipeline`], which can run a task (bringing its
//! prerequisites up to date first, each of them exactly once), run a
//! [sequence](Pipeline::sequence) of steps, or be handed to a `Watcher` that
//! re-runs tasks whenever their sources change.
//!
//! ```rust,no_run
//! use tsumugi::{Registry, Step};
//!
//! # async fn f() -> anyhow::Result<()> {
//! let mut registry = Registry::new();
//! registry.task("concat").run(|_| async { Ok(()) })?;
//! registry.task("minify").after(["concat"]).run(|_| async { Ok(()) })?;
//! registry.task("styles").run(|_| async { Ok(()) })?;
//!
//! let pipeline = registry.finish()?;
//! pipeline.sequence([Step::from(["minify", "styles"])]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! The built-in tasks of the command line tool (SCSS, templates, images,
//! fonts, scripts, dev server and watcher) live in [`tasks`].

mod cache;
mod clean;
mod config;
mod env;
mod error;
mod glob;
pub mod loader;
#[cfg(feature = "logging")]
pub mod logging;
mod registry;
mod runner;
mod sequence;
#[cfg(feature = "server")]
pub mod server;
mod task;
pub mod tasks;
mod utils;
#[cfg(feature = "live")]
mod watch;

pub use crate::cache::{Hash32, HashCache};
pub use crate::clean::clean;
pub use crate::config::{
    CONFIG_FILE, Config, FontsConfig, ImagesConfig, ScriptsConfig, ServerConfig, StylesConfig,
    ViewsConfig, WatchConfig,
};
pub use crate::env::{Environment, Mode};
pub use crate::error::*;
pub use crate::glob::GlobPattern;
pub use crate::registry::{Registry, TaskDef};
pub use crate::runner::Pipeline;
pub use crate::sequence::Step;
pub use crate::task::{Order, Task, TaskContext, TaskFuture, TaskResult};
pub use crate::tasks::{DEFAULT_TASK, register_builtin};
#[cfg(feature = "live")]
pub use crate::watch::Watcher;
