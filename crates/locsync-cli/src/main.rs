mod commands;
mod ui;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use locsync_core::Result;
use locsync_services::SyncOptions;
use tracing::{debug, error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(
    name = "locsync",
    version,
    about = "Two-way sync between translation repositories and the translation database"
)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    cmd: Commands,
}

/// Where configuration and database come from.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Config file; without it locsync.toml is looked up in the current
    /// directory, then in the user config directory
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Database file, overriding the configured one
    #[arg(long)]
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sync projects between their repositories and the database
    Sync {
        /// Project slugs; every configured project when omitted
        projects: Vec<String>,
        /// Use the checkouts as they are instead of pulling
        #[arg(long)]
        no_pull: bool,
        /// Update the database but write and push no files
        #[arg(long)]
        no_commit: bool,
        /// Rescan every file even when nothing seems to have changed
        #[arg(long)]
        force: bool,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show translation statistics from the database
    Stats {
        /// Project slug; every project when omitted
        project: Option<String>,
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Write JSON Schemas of the report types
    Schema {
        #[arg(long, default_value = "./docs/assets/schemas")]
        out_dir: PathBuf,
    },
}

trait Runnable {
    fn run(self, use_color: bool) -> Result<ExitCode>;
}

impl Runnable for Commands {
    fn run(self, use_color: bool) -> Result<ExitCode> {
        let cmd_name = match &self {
            Commands::Sync { .. } => "sync",
            Commands::Stats { .. } => "stats",
            Commands::Schema { .. } => "schema",
        };
        info!(event = "command_started", command = cmd_name);

        let result = match self {
            Commands::Sync {
                projects,
                no_pull,
                no_commit,
                force,
                store,
                format,
            } => {
                debug!(?projects, no_pull, no_commit, force, ?store, "sync args");
                let options = SyncOptions {
                    no_pull,
                    no_commit,
                    force,
                };
                commands::sync::run_sync(&projects, options, &store, format, use_color).map(|ok| {
                    if ok {
                        ExitCode::SUCCESS
                    } else {
                        ExitCode::FAILURE
                    }
                })
            }
            Commands::Stats {
                project,
                store,
                format,
            } => commands::stats::run_stats(project.as_deref(), &store, format, use_color)
                .map(|()| ExitCode::SUCCESS),
            Commands::Schema { out_dir } => {
                commands::schema::run_schema(&out_dir).map(|()| ExitCode::SUCCESS)
            }
        };

        match &result {
            Ok(_) => info!(event = "command_finished", command = cmd_name),
            Err(e) => error!(event = "command_failed", command = cmd_name, error = ?e),
        }
        result
    }
}

/// Console output goes to stderr so that `--format json` keeps stdout clean.
fn init_tracing() -> WorkerGuard {
    let file_appender = rolling::daily("logs", "locsync.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let _guard = init_tracing();

    let cli = Cli::parse();

    let use_color = !cli.no_color
        && std::io::stdout().is_terminal()
        && std::env::var_os("NO_COLOR").is_none();

    cli.cmd.run(use_color)
}
