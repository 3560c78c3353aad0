//! bx driver (bxb)
//!
//! Loads a benchmark suite from a TOML file and runs it through the
//! toolchains of the bx-toolchain crate:
//!
//! - **Parse**: print the loaded configuration
//! - **Validate**: report every case a toolchain cannot handle
//! - **Run**: build each partition of build-equivalent cases once and execute
//!   it as an isolated child process, printing the reported results
//!
//! Partitions run one after another, since each build is expected to use all
//! available cores.

mod cli;
mod commands;
mod error;
mod logs;
mod prelude;
mod run_output;
mod suite;

use bx_config::BxConfig;
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{handle_parse, handle_run, handle_validate};
use crate::prelude::*;
use crate::suite::{Suite, SuiteOverrides};

/// # Examples
///
/// ```bash
/// bxb --config suite.toml parse
/// bxb --config suite.toml validate
/// bxb --config suite.toml --timeout 60 --keep-files run
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bxb=info,bx_toolchain=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = BxConfig::from_file(&cli.config)?;
    if let Commands::Parse = cli.command {
        return handle_parse(&config);
    }

    let overrides = SuiteOverrides {
        artifacts: cli.artifacts,
        timeout_secs: cli.timeout,
    };
    let suite = Suite::create(config, overrides).await?;
    match cli.command {
        Commands::Parse => handle_parse(&suite.config),
        Commands::Validate => handle_validate(&suite),
        Commands::Run => handle_run(&suite, cli.keep_files).await,
    }
}
