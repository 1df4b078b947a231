//! vscode-installer - install or update a portable VS Code
//!
//! Downloads the official archive for a release channel and unpacks it into
//! a folder, keeping whatever user data already lives there.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vscode_installer::detect::detect_installation;
use vscode_installer::installer::{
    Channel, InstallEvent, InstallRequest, Installer, OperationOutcome,
};
use vscode_installer::settings::Settings;

#[derive(Parser)]
#[command(name = "vscode-installer")]
#[command(version)]
#[command(about = "Install or update a portable VS Code from the official archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (use RUST_LOG=debug for more detail)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the Stable archive URL
    #[arg(long, global = true, env = "VSCODE_STABLE_URL")]
    stable_url: Option<String>,

    /// Override the Insider archive URL
    #[arg(long, global = true, env = "VSCODE_INSIDER_URL")]
    insider_url: Option<String>,

    /// Scratch directory (default: <program-dir>/temp)
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which VS Code build a folder contains
    Detect {
        /// Folder to inspect
        dir: PathBuf,
    },

    /// Install VS Code into a folder
    Install {
        /// Target folder
        dir: PathBuf,

        /// Install the Insider build instead of Stable
        #[arg(long)]
        insider: bool,

        /// Skip creating the portable 'data' folder
        #[arg(long)]
        no_portable: bool,
    },

    /// Update an existing VS Code in place
    Update {
        /// Folder containing the installation
        dir: PathBuf,

        /// Channel to fetch (default: the one detected in the folder)
        #[arg(long, value_enum)]
        channel: Option<ChannelArg>,
    },

    /// Update if VS Code is already there, install otherwise
    Auto {
        /// Target folder
        dir: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ChannelArg {
    Stable,
    Insider,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Stable => Channel::Stable,
            ChannelArg::Insider => Channel::Insider,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Only initialize logging if verbose or RUST_LOG is set
    if cli.verbose || std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(if cli.verbose {
                    "vscode_installer=debug".parse()?
                } else {
                    "vscode_installer=warn".parse()?
                }),
            )
            .init();
    }

    let mut settings = Settings::load();
    if let Some(url) = cli.stable_url {
        settings.stable_url = url;
    }
    if let Some(url) = cli.insider_url {
        settings.insider_url = url;
    }
    let mut config = settings.installer_config()?;
    if let Some(workspace) = cli.workspace {
        config.workspace_dir = workspace;
    }

    let request = match cli.command {
        Commands::Detect { dir } => {
            let detection = detect_installation(&dir)
                .with_context(|| format!("Failed to inspect {}", dir.display()))?;
            println!("{}", detection.summary());
            return Ok(ExitCode::SUCCESS);
        }

        Commands::Install {
            dir,
            insider,
            no_portable,
        } => {
            let channel = if insider { Channel::Insider } else { settings.channel };
            InstallRequest::install(dir, channel, settings.portable && !no_portable)
        }

        Commands::Update { dir, channel } => {
            let channel = match channel {
                Some(channel) => channel.into(),
                None => detected_channel(&dir)?,
            };
            InstallRequest::update(dir, channel)
        }

        Commands::Auto { dir } => {
            let detection = detect_installation(&dir)
                .with_context(|| format!("Failed to inspect {}", dir.display()))?;
            println!("{}", detection.summary());
            match detection.channel {
                Some(channel) => InstallRequest::update(dir, channel),
                None => InstallRequest::install(dir, settings.channel, settings.portable),
            }
        }
    };

    let installer = Installer::new(config)?;
    run_operation(&installer, request).await
}

fn detected_channel(dir: &Path) -> Result<Channel> {
    let detection = detect_installation(dir)
        .with_context(|| format!("Failed to inspect {}", dir.display()))?;
    match detection.channel {
        Some(channel) => Ok(channel),
        None => bail!(
            "No VS Code installation detected in {}. Use 'install' or pass --channel.",
            dir.display()
        ),
    }
}

async fn run_operation(installer: &Installer, request: InstallRequest) -> Result<ExitCode> {
    let destination = request.destination.clone();
    let mut handle = installer.start(request)?;

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% | {wide_msg}")?
            .progress_chars("=>-"),
    );

    let cancel = handle.cancel_token();
    let signal_pb = pb.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_pb.println("Cancellation requested by user...");
            cancel.cancel();
        }
    });

    while let Some(event) = handle.next_event().await {
        match event {
            InstallEvent::Progress(progress) => {
                pb.set_position(progress.percent as u64);
                pb.set_message(progress.message);
            }
            InstallEvent::State(state) => tracing::debug!("Entered state {}", state),
            InstallEvent::Warning(warning) => pb.println(warning),
            InstallEvent::Finished(_) => {}
        }
    }
    ctrl_c.abort();

    let outcome = handle.wait().await;
    pb.finish_and_clear();

    match outcome {
        OperationOutcome::Success => {
            println!("VS Code is ready in {}", destination.display());
            Ok(ExitCode::SUCCESS)
        }
        OperationOutcome::Cancelled => {
            println!("Operation cancelled.");
            Ok(ExitCode::from(130))
        }
        OperationOutcome::Failed { kind, detail } => {
            eprintln!("Error: {}: {}", kind, detail);
            eprintln!("{}", kind.hint());
            Ok(ExitCode::from(1))
        }
    }
}
