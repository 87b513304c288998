use std::future::Future;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use console::style;
use tsumugi::logging::{self, LogLevel};
use tsumugi::{Config, DEFAULT_TASK, Environment, Mode, Pipeline, Registry, RunError, Watcher};

/// Command-line arguments for `tsumugi`.
#[derive(Debug, Clone, Parser)]
#[command(name = "tsumugi", version, about = "Build, serve and watch static assets.")]
struct Cli {
    /// Task to run.
    #[arg(default_value = DEFAULT_TASK)]
    task: String,

    /// Path to the config file (TOML).
    ///
    /// Default: `tsumugi.toml` in the current working directory, if present.
    #[arg(long, value_name = "PATH")]
    config: Option<Utf8PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TSUMUGI_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Print the registered tasks and exit.
    #[arg(long)]
    list: bool,
}

/// Tasks which keep running to serve or watch.
const WATCH_TASKS: &[&str] = &[DEFAULT_TASK, "watch", "browserSync"];

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_logging(cli.log_level) {
        eprintln!("tsumugi error: {err:#}");
        return ExitCode::FAILURE;
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("couldn't start the runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let mode = if WATCH_TASKS.contains(&cli.task.as_str()) {
        Mode::Watch
    } else {
        Mode::Build
    };

    let watch = config.watch.clone();
    let env = Arc::new(Environment::new(config, mode));

    let mut registry = Registry::new();
    tsumugi::register_builtin(&mut registry, env)?;
    let pipeline = registry.finish()?;

    // Catch bad bindings before anything runs.
    Watcher::from_config(pipeline.clone(), &watch)?;

    if cli.list {
        list(&pipeline);
        return Ok(());
    }

    tracing::info!("running {}", style(&cli.task).cyan());
    execute(&pipeline, &cli.task, mode, ctrl_c()).await?;

    Ok(())
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("couldn't listen for Ctrl-C: {err}");
    }
}

/// Runs `task` until it settles or `shutdown` resolves. In watch mode a task
/// which settled successfully may have left servers running in the
/// background, so the process is kept alive until `shutdown`.
async fn execute(
    pipeline: &Pipeline,
    task: &str,
    mode: Mode,
    shutdown: impl Future<Output = ()>,
) -> Result<(), RunError> {
    tokio::pin!(shutdown);

    tokio::select! {
        result = pipeline.run(task) => result?,
        _ = &mut shutdown => {
            tracing::info!("interrupted");
            return Ok(());
        }
    }

    if mode == Mode::Watch {
        tracing::info!("{} is up, press Ctrl-C to stop", style(task).cyan());
        shutdown.await;
        tracing::info!("interrupted");
    }

    Ok(())
}

fn list(pipeline: &Pipeline) {
    for task in pipeline.tasks() {
        let prerequisites = task.prerequisites();

        if prerequisites.is_empty() {
            println!("{}", style(task.name()).cyan());
        } else {
            let names: Vec<&str> = prerequisites.iter().map(AsRef::as_ref).collect();
            println!("{} <- {}", style(task.name()).cyan(), names.join(", "));
        }
    }
}
