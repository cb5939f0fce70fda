//! MGMS operator CLI.
//!
//! Side-channel tooling for local/offline operation: issue and verify
//! one-time codes against the backend database, and assemble zip archives
//! from mixed local/remote sources. The web/REST surface lives elsewhere;
//! this binary only wires the library crates to a terminal.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use mgms_archive::{ArchiveAssembler, FileDescriptor};
use mgms_core::Config;
use mgms_core::tracing_init::init_tracing;
use mgms_otp::{Mailer, OtpDatabase, OtpManager, OtpPurpose, SmtpMailer};

#[derive(Parser, Debug)]
#[command(name = "mgms")]
#[command(version, about = "MGMS backend operator tools")]
struct Cli {
    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "MGMS_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "MGMS_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Issue a one-time code for an email address.
    Issue {
        #[arg(long)]
        email: String,

        /// "verification" or "password-reset".
        #[arg(long)]
        purpose: OtpPurpose,
    },

    /// Verify a one-time code.
    Verify {
        #[arg(long)]
        email: String,

        /// "verification" or "password-reset".
        #[arg(long)]
        purpose: OtpPurpose,

        #[arg(long)]
        code: String,
    },

    /// Assemble a zip archive from local paths and remote URLs.
    Archive {
        /// Local files to include (repeatable).
        #[arg(long = "local")]
        locals: Vec<PathBuf>,

        /// Remote URLs to include (repeatable).
        #[arg(long = "remote")]
        remotes: Vec<String>,

        /// Scratch directory override for the output archive.
        #[arg(long, env = "MGMS_SCRATCH_DIR")]
        out_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("mgms={}", cli.log_level);
    init_tracing(&log_filter, cli.log_json);

    let config = Config::from_env();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting mgms CLI");

    match cli.command {
        Commands::Issue { email, purpose } => {
            let manager = open_manager(&config).await?;
            let code = manager.issue(&email, purpose).await?;
            // The local fallback channel: print the code for the operator.
            println!("{code}");
        }
        Commands::Verify {
            email,
            purpose,
            code,
        } => {
            let manager = open_manager(&config).await?;
            manager.verify(&email, &code, purpose).await?;
            println!("verified");
        }
        Commands::Archive {
            locals,
            remotes,
            out_dir,
        } => {
            let files = build_descriptors(&locals, &remotes);
            anyhow::ensure!(!files.is_empty(), "nothing to archive");

            let mut config = config;
            if let Some(dir) = out_dir {
                config.scratch_dir = dir;
            }
            let assembler = ArchiveAssembler::from_config(&config);
            let archive_path = assembler.assemble(&files).await?;
            println!("{}", archive_path.display());
        }
    }

    Ok(())
}

async fn open_manager(config: &Config) -> anyhow::Result<OtpManager> {
    let db = OtpDatabase::open(&config.database_path).await?;

    let mailer: Option<Arc<dyn Mailer>> = match &config.smtp {
        Some(smtp) => Some(Arc::new(SmtpMailer::from_config(smtp)?)),
        None => None,
    };

    Ok(OtpManager::new(db, mailer).with_ttl_secs(config.otp_ttl_secs))
}

/// Descriptors from CLI flags: local files are named after their stem,
/// remote URLs after the last path segment (or a positional fallback).
fn build_descriptors(locals: &[PathBuf], remotes: &[String]) -> Vec<FileDescriptor> {
    let mut files = Vec::with_capacity(locals.len() + remotes.len());

    for path in locals {
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("file")
            .to_string();
        files.push(FileDescriptor::local(path.clone(), name));
    }

    for (index, url) in remotes.iter().enumerate() {
        let name = url
            .rsplit('/')
            .next()
            .and_then(|segment| segment.split('.').next())
            .filter(|stem| !stem.is_empty())
            .map_or_else(|| format!("image-{}", index + 1), ToString::to_string);
        files.push(FileDescriptor::remote(url.clone(), name));
    }

    files
}
