//! Command-line runner: load scripts and aliases, set up logging, execute.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use autoscript::{create_provider, AliasTable, RunOptions, Runner, Script};

#[derive(Parser, Debug)]
#[command(
    name = "autoscript",
    version,
    about = "Replay tabular action scripts against the desktop UI"
)]
struct Cli {
    /// Script files (TargetApp,Key,Action,Value), executed in order as one
    /// concatenated program
    #[arg(required = true)]
    scripts: Vec<PathBuf>,

    /// Alias files (AliasName,RPA_Path) substituted into Key cells at load;
    /// later files override earlier ones
    #[arg(short, long)]
    aliases: Vec<PathBuf>,

    /// Log every intended action without touching the UI
    #[arg(long)]
    dry_run: bool,

    /// Log action failures and keep going instead of halting
    #[arg(long)]
    force_run: bool,

    /// Fixed delay in seconds after each UI action
    #[arg(long)]
    wait_time: Option<f64>,

    /// Try native window focus before accessibility focus
    #[arg(long)]
    legacy_focus: bool,

    /// Seconds to wait for windows and elements to appear
    #[arg(long, default_value_t = 10.0)]
    timeout: f64,

    /// Mirror the log into this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log filter, e.g. "info" or "autoscript=debug"
    #[arg(long, default_value = "info", env = "AUTOSCRIPT_LOG")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _log_guard = init_logging(&cli)?;

    let mut aliases = AliasTable::new();
    for path in &cli.aliases {
        aliases
            .load_file(path)
            .with_context(|| format!("loading aliases from {}", path.display()))?;
    }
    let script = Script::load(&cli.scripts, &aliases).context("loading scripts")?;

    let provider = create_provider().context("initializing the accessibility backend")?;
    let settle_delay = cli
        .wait_time
        .map(|secs| {
            Duration::try_from_secs_f64(secs)
                .map_err(|_| anyhow::anyhow!("--wait-time {secs} is out of range"))
        })
        .transpose()?;
    let resolve_timeout = Duration::try_from_secs_f64(cli.timeout)
        .map_err(|_| anyhow::anyhow!("--timeout {} is out of range", cli.timeout))?;
    let options = RunOptions {
        simulate: cli.dry_run,
        force_continue: cli.force_run,
        settle_delay,
        legacy_focus: cli.legacy_focus,
        resolve_timeout,
    };
    if cli.dry_run {
        info!("dry-run mode: no UI action will be performed");
    }

    let summary = Runner::new(provider, options).run(script, aliases)?;
    info!("run finished: {}", serde_json::to_string(&summary)?);
    if summary.failures > 0 {
        warn!("{} action(s) failed and were skipped", summary.failures);
    }
    Ok(())
}

/// Stderr logging, plus an optional non-blocking file mirror. The returned
/// guard must stay alive for the file writer to flush.
fn init_logging(cli: &Cli) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log filter '{}'", cli.log_level))?;
    let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(false);
    let registry = tracing_subscriber::registry().with(filter).with(stderr_layer);

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("cannot create log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            registry
                .with(fmt::layer().with_writer(writer).with_target(false).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}
