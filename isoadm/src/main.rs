use std::path::PathBuf;
use std::process::ExitCode;

use answerfile::RenderError;
use anyhow::Result;
use clap::{Parser, Subcommand};
use ghclient::GitHubError;
use profile_schema::ValidationErrors;
use profile_store::StoreError;
use tracing_subscriber::EnvFilter;

use crate::commands::build::BuildCommand;
use crate::commands::github::GithubCommand;
use crate::commands::netboot::NetbootCommand;
use crate::commands::profile::ProfileCommand;
use crate::commands::settings::SettingsCommand;
use crate::commands::App;
use crate::config::AppSettings;
use crate::state::StateDir;

mod commands;
mod config;
mod state;

/// Manage Proxmox VE node profiles and hand them to the ISO build pipeline
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding profiles, settings and GitHub credentials
    #[arg(long, global = true, env = "ISOADM_STATE_DIR")]
    state_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create, edit and inspect node profiles
    #[command(subcommand)]
    Profile(ProfileCommand),

    /// Write every profile to a snapshot file
    Export {
        /// Output file, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Add the profiles of a snapshot file
    Import {
        /// Snapshot produced by `export`, `-` for stdin
        file: PathBuf,
    },

    /// Render the installer answer file of a profile
    Answer {
        /// Profile id or name
        profile: String,

        /// Emit build-time placeholders for missing secrets
        #[arg(short, long)]
        placeholders: bool,

        /// Output file, defaults to `<name>-answer.toml`; `-` for stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Network boot artifacts for the stored profiles
    #[command(subcommand)]
    Netboot(NetbootCommand),

    /// Build requests for the ISO pipeline
    #[command(subcommand)]
    Build(BuildCommand),

    /// Show or change application settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Publish profiles and drive the build workflow on GitHub
    #[command(subcommand)]
    Github(GithubCommand),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", into_report(err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let state = StateDir::resolve(cli.state_dir)?;
    let settings = AppSettings::load(&state)?;
    let app = App { state, settings };

    match cli.command {
        Commands::Profile(command) => commands::profile::run(&app, command),
        Commands::Export { output } => commands::transfer::export(&app, output.as_deref()),
        Commands::Import { file } => commands::transfer::import(&app, &file),
        Commands::Answer {
            profile,
            placeholders,
            output,
        } => commands::answer::run(&app, &profile, placeholders, output.as_deref()),
        Commands::Netboot(command) => commands::netboot::run(&app, command),
        Commands::Build(command) => commands::build::run(&app, command),
        Commands::Settings(command) => commands::settings::run(&app, command),
        Commands::Github(command) => commands::github::run(&app, command).await,
    }
}

/// Render errors from the workspace crates with their diagnostic codes and
/// help; anything else keeps its context chain.
fn into_report(err: anyhow::Error) -> miette::Report {
    let err = match err.downcast::<StoreError>() {
        Ok(e) => return miette::Report::new(e),
        Err(err) => err,
    };
    let err = match err.downcast::<ValidationErrors>() {
        Ok(e) => return miette::Report::new(e),
        Err(err) => err,
    };
    let err = match err.downcast::<RenderError>() {
        Ok(e) => return miette::Report::new(e),
        Err(err) => err,
    };
    match err.downcast::<GitHubError>() {
        Ok(e) => miette::Report::new(e),
        Err(err) => miette::miette!("{err:#}"),
    }
}
