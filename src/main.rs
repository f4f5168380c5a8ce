mod action;
mod app;
mod config;
mod file;
mod matching;
mod text;
mod ui;

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::Controller;
use config::{Config, LoggingSection, MatchOverrides, Settings, SideConfig};
use file::FileKind;
use ui::Session;

/// Reconcile variable names between two feature, mapping or identifier files
#[derive(Parser)]
#[command(name = "qc", version, about)]
struct Cli {
    /// First file
    #[arg(long, value_name = "PATH")]
    a: PathBuf,

    /// Second file
    #[arg(long, value_name = "PATH")]
    b: PathBuf,

    /// Type of the first file
    #[arg(long, value_enum, alias = "a_type")]
    a_type: FileKind,

    /// Type of the second file
    #[arg(long, value_enum, alias = "b_type")]
    b_type: FileKind,

    /// Only list names of a that are missing from b
    #[arg(long, alias = "a_only", conflicts_with = "b_only")]
    a_only: bool,

    /// Only list names of b that are missing from a
    #[arg(long, alias = "b_only")]
    b_only: bool,

    /// Rows shown per table, -1 for all
    #[arg(long, alias = "number_entries", allow_negative_numbers = true)]
    number_entries: Option<i64>,

    /// Suffixes ignored when comparing names
    #[arg(long, alias = "ignore_suffix", num_args = 0..)]
    ignore_suffix: Option<Vec<String>>,

    /// Lowest ratio at which a pairing is suggested (0 to 1)
    #[arg(long, alias = "similarity_threshold")]
    similarity_threshold: Option<f64>,

    /// Tables to compare
    #[arg(long, required = true, num_args = 1..)]
    table: Vec<String>,

    /// Where changes to a are written; a is read-only without it
    #[arg(long, alias = "update_a", value_name = "PATH")]
    update_a: Option<PathBuf>,

    /// Where changes to b are written; b is read-only without it
    #[arg(long, alias = "update_b", value_name = "PATH")]
    update_b: Option<PathBuf>,

    /// Settings file used instead of ./.qctool.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self, settings: &Settings) -> Result<Config> {
        let matching = settings.matching_with(MatchOverrides {
            similarity_threshold: self.similarity_threshold,
            max_entries: self.number_entries,
            ignore_suffix: self.ignore_suffix,
            a_only: self.a_only,
            b_only: self.b_only,
        })?;
        Ok(Config {
            a: SideConfig {
                path: self.a,
                kind: self.a_type,
                output: self.update_a,
            },
            b: SideConfig {
                path: self.b,
                kind: self.b_type,
                output: self.update_b,
            },
            tables: self.table,
            matching,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loaded = config::load_settings(cli.config.as_deref())?;
    let _log_guard = configure_logging(&loaded.settings.logging);
    install_panic_hook();
    for warning in &loaded.warnings {
        tracing::warn!("{warning}");
    }

    let config = cli.into_config(&loaded.settings)?;
    tracing::info!(
        a = %config.a.path.display(),
        b = %config.b.path.display(),
        tables = ?config.tables,
        "starting"
    );

    let session = Session::start()?;
    let mut controller = Controller::new(session, config)
        .inspect_err(|e| tracing::error!("startup failed: {e:#}"))?;
    controller.run()
}

/// File logging; the terminal belongs to the UI. The guard flushes on drop.
fn configure_logging(logging: &LoggingSection) -> Option<WorkerGuard> {
    let path = &logging.file;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path.file_name()?;

    let file_appender = tracing_appender::rolling::never(dir, file_name);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "panic", %info, "panic");
            default_panic(info);
        }));
    });
}
