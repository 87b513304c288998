use std::sync::OnceLock;
use std::sync::mpsc::Sender;

use crate::cache::HashCache;
use crate::config::Config;

/// The mode the pipeline was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Run the requested task once and stop.
    Build,
    /// Serve the output, watch the sources and reload browsers on change.
    Watch,
}

/// Everything the built-in tasks share: the configuration, the image cache
/// and, once the dev server is up, the live-reload trigger.
#[derive(Debug)]
pub struct Environment {
    pub config: Config,
    pub mode: Mode,
    pub cache: HashCache,
    reload: OnceLock<Sender<()>>,
}

impl Environment {
    pub fn new(config: Config, mode: Mode) -> Self {
        let cache = HashCache::new(config.cache.join("images"));

        Self {
            config,
            mode,
            cache,
            reload: OnceLock::new(),
        }
    }

    /// Connects the live-reload trigger. Only the first call has an effect.
    pub fn set_reload(&self, tx: Sender<()>) {
        if self.reload.set(tx).is_err() {
            tracing::warn!("live reload is already connected");
        }
    }

    /// Asks connected browsers to reload. Does nothing without a dev server.
    pub fn reload(&self) {
        if let Some(tx) = self.reload.get()
            && tx.send(()).is_err()
        {
            tracing::debug!("live reload thread is gone");
        }
    }
}
