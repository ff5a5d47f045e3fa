//! xlmeta - Metadata record diagnostics
//!
//! Inspects, verifies and exports the inline data of on-disk metadata
//! records. Documents go to stdout; logs and per-file errors go to stderr.

mod commands;
mod export;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::Settings;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use xlmeta_common::{ChecksumStatus, Config, Error};

#[derive(Parser, Debug)]
#[command(name = "xlmeta")]
#[command(about = "Inspect and verify xl.meta metadata records")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "XLMETA_CONFIG", default_value = "/etc/xlmeta/xlmeta.toml")]
    config: PathBuf,

    /// Log level (overrides the config file; RUST_LOG overrides both)
    #[arg(long)]
    log_level: Option<String>,

    /// Largest record file read, in bytes
    #[arg(long)]
    max_record_size: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print records as JSON documents
    Inspect {
        /// Record files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// One compact document per line
        #[arg(long)]
        ndjson: bool,
        /// Leave inline data sizes out of the documents
        #[arg(long)]
        no_data: bool,
    },
    /// List the version headers of a record
    Versions {
        /// Record file
        file: PathBuf,
    },
    /// Write every inline value of a record to its own file
    Export {
        /// Record file
        file: PathBuf,
        /// Output directory
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Replace existing files
        #[arg(long)]
        overwrite: bool,
    },
    /// Decode records and check their checksums
    Verify {
        /// Record files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// Exit code for a failed file
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>()
        .map_or(1, Error::exit_code)
        .try_into()
        .unwrap_or(1)
}

/// Print a per-file failure and fold its exit code into `status`
fn report(err: &anyhow::Error, status: &mut u8) {
    eprintln!("{err:#}");
    *status = (*status).max(exit_code(err));
}

fn run(args: Args, config: Config) -> u8 {
    let mut settings = Settings {
        ndjson: config.output.ndjson,
        include_inline: config.output.include_inline,
        max_record_size: args
            .max_record_size
            .unwrap_or(config.limits.max_record_size),
    };
    let mut status = 0u8;

    match args.command {
        Commands::Inspect {
            files,
            ndjson,
            no_data,
        } => {
            settings.ndjson |= ndjson;
            settings.include_inline &= !no_data;
            let mut stdout = std::io::stdout().lock();
            for path in &files {
                if let Err(e) = commands::inspect(path, &settings, &mut stdout)
                    .with_context(|| path.display().to_string())
                {
                    report(&e, &mut status);
                }
            }
            if let Err(e) = stdout.flush() {
                warn!("Failed to flush stdout: {}", e);
            }
        }
        Commands::Versions { file } => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = commands::versions(&file, &settings, &mut stdout)
                .with_context(|| file.display().to_string())
            {
                report(&e, &mut status);
            }
        }
        Commands::Export {
            file,
            out,
            overwrite,
        } => {
            let dir = out.unwrap_or(config.export.dir);
            let overwrite = overwrite || config.export.overwrite;
            match export::export_inline(&file, &dir, overwrite, settings.max_record_size)
                .with_context(|| file.display().to_string())
            {
                Ok(written) => {
                    for path in written {
                        println!("{}", path.display());
                    }
                }
                Err(e) => report(&e, &mut status),
            }
        }
        Commands::Verify { files } => {
            for path in &files {
                match commands::verify(path, &settings)
                    .with_context(|| path.display().to_string())
                {
                    Ok(ChecksumStatus::Absent) => {
                        println!("{}: ok (no checksum)", path.display());
                    }
                    Ok(_) => println!("{}: ok", path.display()),
                    Err(e) => report(&e, &mut status),
                }
            }
        }
    }

    status
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1));
        }
    };

    // Merge CLI args with config file (CLI takes precedence)
    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    // Initialize logging on stderr so stdout carries only documents
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Config file: {}", args.config.display());

    ExitCode::from(run(args, config))
}
