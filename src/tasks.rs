//! The built-in tasks.
//!
//! | task            | does                                              |
//! |-----------------|---------------------------------------------------|
//! | `concatScripts` | concatenates the scripts into one bundle          |
//! | `minifyScripts` | minifies the bundle, after `concatScripts`        |
//! | `styles`        | compiles SCSS                                     |
//! | `views`         | renders the page templates                        |
//! | `images`        | optimizes images                                  |
//! | `fonts`         | copies fonts                                      |
//! | `clean`         | removes the output and the image cache            |
//! | `browserSync`   | starts the dev server with live reload            |
//! | `watch`         | re-runs tasks when their sources change           |
//! | `default`       | builds everything, serves and watches             |
//! | `build`         | clean production build                            |

use std::sync::Arc;

use crate::env::{Environment, Mode};
use crate::error::{AssetError, ConfigError};
use crate::loader::{fonts, images, scripts, styles, views};
use crate::registry::Registry;
use crate::sequence::Step;
use crate::task::TaskResult;

/// Task started when none is named on the command line.
pub const DEFAULT_TASK: &str = "default";

/// Registers every built-in task into `registry`.
pub fn register_builtin(registry: &mut Registry, env: Arc<Environment>) -> Result<(), ConfigError> {
    asset(registry, &env, "concatScripts", &[], false, |env| {
        scripts::concat(&env.config.scripts).map(drop)
    })?;

    asset(registry, &env, "minifyScripts", &["concatScripts"], true, |env| {
        scripts::minify(&env.config.scripts).map(drop)
    })?;

    asset(registry, &env, "styles", &[], true, |env| {
        let outputs = styles::compile(&env.config.styles)?;
        tracing::debug!("compiled {} stylesheets", outputs.len());
        Ok(())
    })?;

    asset(registry, &env, "views", &[], true, |env| {
        let port = match env.mode {
            Mode::Watch => Some(env.config.server.reload_port),
            Mode::Build => None,
        };
        views::render(&env.config.views, port).map(drop)
    })?;

    asset(registry, &env, "images", &[], true, |env| {
        let summary = images::optimize(&env.config.images, &env.cache)?;
        tracing::info!("{} images written, {} from cache", summary.written, summary.cached);
        Ok(())
    })?;

    asset(registry, &env, "fonts", &[], true, |env| {
        fonts::copy(&env.config.fonts).map(drop)
    })?;

    asset(registry, &env, "clean", &[], false, |env| {
        crate::clean::clean(&env.config.clean, &env.cache)
    })?;

    #[cfg(feature = "server")]
    {
        let env = env.clone();
        registry.task("browserSync").run(move |_| {
            let env = env.clone();
            async move {
                crate::server::start(&env.config.server, &env).await?;
                Ok(())
            }
        })?;
    }

    #[cfg(feature = "live")]
    {
        let env = env.clone();
        registry.task("watch").run(move |ctx| {
            let env = env.clone();
            async move {
                let watcher = crate::watch::Watcher::from_config(ctx.pipeline, &env.config.watch)?;
                watcher.run().await?;
                Ok(())
            }
        })?;
    }

    #[cfg(all(feature = "live", feature = "server"))]
    registry.task(DEFAULT_TASK).run(|ctx| async move {
        ctx.pipeline.sequence(default_steps()).await?;
        Ok(())
    })?;

    registry.task("build").run(|ctx| async move {
        ctx.pipeline.sequence(build_steps()).await?;
        Ok(())
    })?;

    Ok(())
}

/// Everything built at once next to the dev server, then the watcher.
#[cfg(all(feature = "live", feature = "server"))]
fn default_steps() -> Vec<Step> {
    vec![
        Step::from(["styles", "views", "images", "fonts", "minifyScripts", "browserSync"]),
        Step::from("watch"),
    ]
}

fn build_steps() -> Vec<Step> {
    vec![
        Step::from("clean"),
        Step::from("styles"),
        Step::from(["images", "fonts"]),
    ]
}

/// Registers a task running a blocking asset step. With `reload` set,
/// connected browsers are reloaded after every successful run.
fn asset<F>(
    registry: &mut Registry,
    env: &Arc<Environment>,
    name: &str,
    after: &[&str],
    reload: bool,
    step: F,
) -> Result<(), ConfigError>
where
    F: Fn(&Environment) -> Result<(), AssetError> + Send + Sync + 'static,
{
    let env = env.clone();
    let step = Arc::new(step);

    registry
        .task(name)
        .after(after.iter().copied())
        .run(move |_| {
            let env = env.clone();
            let step = step.clone();

            async move {
                blocking({
                    let env = env.clone();
                    move || step(env.as_ref())
                })
                .await?;

                if reload {
                    env.reload();
                }

                Ok(())
            }
        })
}

/// Runs `f` on the blocking pool. A panic inside `f` is resumed, so the
/// runner reports it like a panic of the task itself.
async fn blocking<T, F>(f: F) -> TaskResult<T>
where
    F: FnOnce() -> Result<T, AssetError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(e.into()),
    }
}
