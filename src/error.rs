use std::sync::Arc;

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors in the static description of the pipeline: the task table, the
/// watch bindings and the glob patterns. All of them are detected before any
/// task action runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),

    #[error("Task '{0}' is not registered")]
    UnknownTask(String),

    #[error("Task '{task}' depends on '{prerequisite}', which is not registered")]
    UnknownPrerequisite { task: String, prerequisite: String },

    #[error("Cyclic prerequisites between tasks: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("Invalid setting '{0}': {1}")]
    Setting(String, String),
}

/// A failure shared between every waiter of the same run.
#[derive(Debug, Clone)]
pub struct SharedError(pub(crate) Arc<anyhow::Error>);

impl SharedError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Arc::new(err.into()))
    }
}

impl From<anyhow::Error> for SharedError {
    fn from(e: anyhow::Error) -> Self {
        SharedError(Arc::new(e))
    }
}

impl std::fmt::Display for SharedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// What a task run resolves to when it does not succeed.
#[derive(Debug, Error, Clone)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Task '{0}' failed")]
    Task(Arc<str>, #[source] SharedError),

    #[error("Task '{0}' panicked: {1}")]
    Panic(Arc<str>, String),

    /// Another task of the same invocation failed first.
    #[error("Task '{0}' skipped after an earlier failure")]
    Aborted(Arc<str>),
}

impl RunError {
    /// Name of the task whose action failed, if the failure came from one.
    pub fn task(&self) -> Option<&str> {
        match self {
            RunError::Task(name, _) | RunError::Panic(name, _) => Some(name),
            RunError::Config(_) | RunError::Aborted(_) => None,
        }
    }
}

/// Errors raised by the asset steps and by `clean`.
#[derive(Debug, Error)]
pub enum AssetError {
    /// A delegated compiler, minifier or optimizer rejected its input.
    #[error("{tool} failed on '{path}':\n{message}")]
    Transform {
        tool: &'static str,
        path: Utf8PathBuf,
        message: String,
    },

    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Couldn't walk '{path}': {source}")]
    Walk {
        path: Utf8PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AssetError {
    pub(crate) fn fs(path: impl Into<Utf8PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| AssetError::Filesystem { path, source }
    }

    pub(crate) fn transform(
        tool: &'static str,
        path: impl Into<Utf8PathBuf>,
        message: impl ToString,
    ) -> Self {
        AssetError::Transform {
            tool,
            path: path.into(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("Couldn't read config file '{0}'.\n{1}")]
    Read(Utf8PathBuf, std::io::Error),

    #[error("Couldn't parse config file '{0}'.\n{1}")]
    Parse(Utf8PathBuf, toml::de::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(feature = "live")]
#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Notify(#[from] notify::Error),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),

    #[error("The watcher channel closed unexpectedly")]
    Closed,
}
