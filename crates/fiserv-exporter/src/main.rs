//! fiserv-exporter: entry point.

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use fiserv_exporter::config::{ExporterConfig, ResolvedConfig};
use fiserv_exporter::export::CsvExporter;
use fiserv_exporter::{daemon, logging};
use fiserv_session::INSTITUTIONS;

#[derive(Parser)]
#[command(
    name = "fiserv-exporter",
    about = "Export accounts and transactions from Fiserv-hosted online banking to CSV",
    version
)]
struct Cli {
    /// Directory holding `<env>.env.json`.
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Log level for the log file (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Status server, one export now, then exports at 06:00 and 18:00 UTC (default).
    Serve,

    /// Run a single export and exit. Exits non-zero if the run fails.
    Run,

    /// List supported institutions.
    Institutions,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   fiserv-exporter completions bash > ~/.local/share/bash-completion/completions/fiserv-exporter
    ///   fiserv-exporter completions zsh > ~/.zfunc/_fiserv-exporter
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// Load, start logging, then validate.
fn prepare(cli: &Cli) -> anyhow::Result<ResolvedConfig> {
    let config = ExporterConfig::load(&cli.config_dir)?;
    logging::init(
        &PathBuf::from(logging::LOG_FILE),
        &cli.log_level,
        logging::console_enabled(config.env, config.enable_tty),
    )?;

    tracing::debug!("logging configuration settings");
    for (key, value) in config.entries() {
        tracing::debug!("key: {key}, value: {value}");
    }
    tracing::debug!("done logging configuration settings");

    let resolved = config.resolve().context("invalid configuration")?;
    tracing::info!("institution: {}", resolved.institution.name);
    Ok(resolved)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.as_ref().unwrap_or(&Commands::Serve) {
        Commands::Serve => {
            let config = prepare(&cli)?;
            daemon::serve(config).await?;
        }

        Commands::Run => {
            let config = prepare(&cli)?;
            let orchestrator = daemon::build_orchestrator(&config)?;
            let exporter = CsvExporter::new(&config.output_dir);
            daemon::export_once(&orchestrator, &exporter).await?;
        }

        Commands::Institutions => {
            for institution in INSTITUTIONS.iter() {
                println!(
                    "{:<34} {:<36} {}",
                    institution.name, institution.homepage_url, institution.routing_number
                );
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "fiserv-exporter", &mut std::io::stdout());
        }
    }

    Ok(())
}
