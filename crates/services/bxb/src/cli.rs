//! Command-line interface for the bx benchmark driver.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface for bxb.
#[derive(Parser)]
#[command(name = "bxb")]
#[command(about = "bx driver - Build and run benchmark cases in isolated processes")]
pub struct Cli {
    /// Path to the suite configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Root folder for generated artifacts, overriding the configuration
    #[arg(short, long)]
    pub artifacts: Option<PathBuf>,

    /// Build and execute timeout in seconds, overriding the configuration
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Keep generated artifacts after running
    #[arg(long)]
    pub keep_files: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for bxb.
#[derive(Subcommand)]
pub enum Commands {
    /// Parse and display the configuration file
    Parse,
    /// Check every case against the toolchain of its runtime
    Validate,
    /// Validate, build and execute every case
    Run,
}
