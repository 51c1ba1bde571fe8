//! wpmcp-files - MCP server for WordPress file operations
//!
//! Exposes path-validated, backup-protected file operations on a local
//! WordPress installation to MCP clients over stdio.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wpmcp_files::{CapabilityGate, FileOperationsService, FilesConfig, McpServer};

/// MCP server for WordPress file operations.
#[derive(Parser, Debug)]
#[command(name = "wpmcp-files")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run in stdio mode (standard MCP transport).
    #[arg(long, default_value = "true")]
    stdio: bool,

    /// WordPress installation root (the directory holding wp-content).
    #[arg(long, env = "WPMCP_ROOT")]
    root: Option<PathBuf>,

    /// JSON file overriding allowed roots, extensions, size limit, or backup directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Acting user id recorded in backup metadata.
    #[arg(long, default_value_t = 0)]
    user_id: u64,

    /// Capability held by the acting user (repeatable).
    #[arg(long = "capability", default_values = ["edit_themes", "edit_plugins"])]
    capabilities: Vec<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Log output file (default: stderr).
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn load_config(args: &Args) -> anyhow::Result<FilesConfig> {
    let mut config = match &args.config {
        Some(path) => FilesConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => FilesConfig::default(),
    };

    if let Some(root) = &args.root {
        config.root = root.clone();
    }
    config.require_root()?;

    anyhow::ensure!(
        config.root.is_dir(),
        "WordPress root {} is not a directory",
        config.root.display()
    );
    Ok(config)
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Never log to stdout, which carries the MCP protocol.
    let (file_layer, stderr_layer) = match &args.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            (
                Some(fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file))),
                None,
            )
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args) {
        eprintln!("{:#}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        "Starting {} v{}",
        wpmcp_files::server::SERVER_NAME,
        wpmcp_files::server::SERVER_VERSION
    );

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        "Serving {} (roots: {})",
        config.root.display(),
        config.allowed_roots.join(", ")
    );

    let gate = CapabilityGate::new(args.user_id, args.capabilities.iter().cloned());
    let files = Arc::new(FileOperationsService::new(config, Arc::new(gate)));

    if let Err(e) = files.backups().ensure_store().await {
        tracing::warn!("Backup directory not ready, backups will be retried on use: {}", e);
    }

    let server = McpServer::new(files);

    if args.stdio {
        match server.run_stdio().await {
            Ok(()) => {
                tracing::info!("Server exited cleanly");
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("Server error: {}", e);
                ExitCode::FAILURE
            }
        }
    } else {
        tracing::error!("Only stdio mode is currently supported");
        ExitCode::FAILURE
    }
}
