//! # repsync-cli
//!
//! CLI tool for driving and inspecting a local repsync device store.
//!
//! ## Commands
//!
//! - `init`: Initialize device identity
//! - `status`: Show device, program, and queue status
//! - `start`: Begin a workout (optionally from a template)
//! - `log`: Log one completed set
//! - `resume`: Show where to continue the active workout
//! - `flush`: Retry delivery of queued events
//! - `demo`: Run a two-device sync scenario in-process
//!
//! ## Example
//!
//! ```bash
//! # Initialize a companion device
//! repsync init --name "My Watch" --role companion
//!
//! # Start a workout and log sets (queued while offline)
//! repsync start
//! repsync log 0 1 --reps 10 --weight 60
//!
//! # Where was I?
//! repsync resume
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{demo, flush, init, log, resume, start, status};

/// CLI tool for driving a local repsync device store.
#[derive(Parser, Debug)]
#[command(name = "repsync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Data directory for the device store and identity
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize device identity
    Init {
        /// Device name
        #[arg(long, short)]
        name: String,

        /// Device role: primary or companion
        #[arg(long, default_value = "companion")]
        role: String,
    },

    /// Show device, program, and queue status
    Status,

    /// Begin a workout
    Start {
        /// Template to start from (UUID)
        #[arg(long)]
        template: Option<String>,
    },

    /// Log one completed set
    Log {
        /// Exercise position within the session's ordered list
        exercise_index: u32,

        /// Set number, 1-based
        set_number: u32,

        /// Repetitions performed
        #[arg(long, default_value = "10")]
        reps: u32,

        /// Weight used
        #[arg(long, default_value = "0")]
        weight: f64,
    },

    /// Show where to continue the active workout
    Resume,

    /// Retry delivery of queued events
    Flush,

    /// Run a two-device sync scenario in-process
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .context("Failed to create data directory")?;

    match cli.command {
        Commands::Init { name, role } => {
            init::run(&data_dir, &name, &role).await?;
        }
        Commands::Status => {
            status::run(&data_dir).await?;
        }
        Commands::Start { template } => {
            start::run(&data_dir, template.as_deref()).await?;
        }
        Commands::Log {
            exercise_index,
            set_number,
            reps,
            weight,
        } => {
            log::run(&data_dir, exercise_index, set_number, reps, weight).await?;
        }
        Commands::Resume => {
            resume::run(&data_dir).await?;
        }
        Commands::Flush => {
            flush::run(&data_dir).await?;
        }
        Commands::Demo => {
            demo::run().await?;
        }
    }

    Ok(())
}

/// Get the default data directory for repsync-cli.
fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "repsync", "repsync")
        .context("Could not determine home directory")?;
    Ok(dirs.data_dir().to_path_buf())
}
