mod display;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vulngate_core::config::GateConfig;
use vulngate_core::notifier::{Credentials, TelegramNotifier};
use vulngate_core::scan::{self, ScanOutcome};
use vulngate_core::ArtifactBundle;

#[derive(Parser)]
#[command(
    name = "vulngate",
    version,
    about = "vulngate - CI security gate backed by a trained vulnerability classifier",
    long_about = "Classify every source file in a repository with a pretrained model and fail the build if any file is predicted vulnerable.\n\nRun with no arguments to scan the current directory."
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Sarif,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a repository and exit non-zero if any file is predicted vulnerable
    Scan {
        /// Repository root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Directory holding the trained artifacts, relative to the repository root (overrides config)
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Config file (defaults to <path>/.vulngate.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Post a one-line summary to the chat notifier after the scan
        #[arg(long)]
        notify: bool,
    },

    /// Post a message through the chat notifier (TELEGRAM_TOKEN / TELEGRAM_CHAT_ID)
    Notify {
        /// Message text
        message: Option<String>,

        /// Config file for notifier settings
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Load and validate the trained artifacts and print a summary
    Inspect {
        /// Repository root
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Directory holding the trained artifacts, relative to the repository root (overrides config)
        #[arg(long)]
        models_dir: Option<PathBuf>,

        /// Config file (defaults to <path>/.vulngate.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let command = cli.command.unwrap_or(Commands::Scan {
        path: PathBuf::from("."),
        format: OutputFormat::Text,
        models_dir: None,
        config: None,
        notify: false,
    });

    let result = match command {
        Commands::Scan {
            path,
            format,
            models_dir,
            config,
            notify,
        } => cmd_scan(&path, format, models_dir, config.as_deref(), notify),
        Commands::Notify { message, config } => cmd_notify(message, config.as_deref()),
        Commands::Inspect {
            path,
            models_dir,
            config,
        } => cmd_inspect(&path, models_dir, config.as_deref()),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            display::print_error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(root: &Path, explicit: Option<&Path>, models_dir: Option<PathBuf>) -> Result<GateConfig> {
    let config = match explicit {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::discover(root)?,
    };
    let mut config = config.merge_with_env();
    if let Some(dir) = models_dir {
        config.artifacts.dir = dir;
    }
    Ok(config)
}

fn cmd_scan(
    path: &Path,
    format: OutputFormat,
    models_dir: Option<PathBuf>,
    config: Option<&Path>,
    notify: bool,
) -> Result<ExitCode> {
    if !path.is_dir() {
        anyhow::bail!("'{}' is not a directory", path.display());
    }
    let config = load_config(path, config, models_dir)?;

    let outcome = scan::run_gate(path, &config);

    match (&outcome, format) {
        (ScanOutcome::Fatal(err), _) => display::print_fatal(err),
        (_, OutputFormat::Json) => {
            if let Some(report) = outcome.report() {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
        }
        (_, OutputFormat::Sarif) => {
            if let Some(report) = outcome.report() {
                let sarif = vulngate_core::scan::sarif::to_sarif(report);
                println!("{}", serde_json::to_string_pretty(&sarif)?);
            }
        }
        (_, OutputFormat::Text) => {
            if let Some(report) = outcome.report() {
                display::print_scan_report(report);
            }
        }
    }

    if notify {
        send_notification(&outcome.summary(), &config);
    }

    Ok(ExitCode::from(outcome.exit_code()))
}

/// Notification failures are reported but never change the gate's exit code.
fn send_notification(text: &str, config: &GateConfig) {
    let Some(credentials) = Credentials::from_env() else {
        display::print_error("Missing Telegram credentials (TELEGRAM_TOKEN / TELEGRAM_CHAT_ID)");
        return;
    };

    let sent = TelegramNotifier::new(credentials, &config.notify).and_then(|notifier| {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?
            .block_on(notifier.send(text))
    });

    if let Err(e) = sent {
        tracing::warn!(error = %format!("{:#}", e), "chat notification failed");
    }
}

fn cmd_notify(message: Option<String>, config: Option<&Path>) -> Result<ExitCode> {
    let config = match config {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::default(),
    };
    let message = message.unwrap_or_else(|| "Notification without message".to_string());
    send_notification(&message, &config);
    Ok(ExitCode::SUCCESS)
}

fn cmd_inspect(path: &Path, models_dir: Option<PathBuf>, config: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(path, config, models_dir)?;
    let paths = config.artifacts.paths(path);

    match ArtifactBundle::load(&paths, &config.artifacts.sha256) {
        Ok(bundle) => {
            display::print_bundle_summary(&paths, &bundle.summary(), config.artifacts.unknown_extension_code);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            display::print_fatal(&err.into());
            Ok(ExitCode::FAILURE)
        }
    }
}
