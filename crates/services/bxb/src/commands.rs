//! Command handlers for the bx driver.
//!
//! - `parse` prints the loaded suite
//! - `validate` reports every validation error of every case
//! - `run` validates, then builds and executes each partition in turn

use std::io::{ErrorKind, stdout};

use bx_config::BxConfig;
use bx_io::runner::RunEvent;
use bx_toolchain::{BuildPartition, PipelineOutcome};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::logs::{dump_logs, dump_logs_to_temporary_file};
use crate::prelude::*;
use crate::run_output::BxRunOutput;
use crate::suite::Suite;

/// Display the configuration without probing any runtime.
pub fn handle_parse(config: &BxConfig) -> Result<()> {
    println!("Configuration parsed successfully");
    println!("Global version: {}", config.global.version);
    println!("Timeout: {}s", config.global.timeout_secs);
    println!("Number of runtimes: {}", config.runtimes.len());

    for (idx, runtime) in config.runtimes.iter().enumerate() {
        println!("\nRuntime {}: {}", idx + 1, runtime.name);
        println!("  Kind: {:?}", runtime.kind);
        println!("  Path: {:?}", runtime.path);
        println!("  Backend: {}", runtime.backend);
        println!("  AOT arguments: {:?}", runtime.aot_args);
        println!("  Base library path: {:?}", runtime.base_library_path);
    }

    println!("\nNumber of cases: {}", config.cases.len());
    for (idx, case) in config.cases.iter().enumerate() {
        println!("  Case {}: {}", idx + 1, case.name);
        println!("    Runtime: {:?}", case.runtime);
        println!("    Platform: {}", case.platform);
        println!("    Iterations: {}", case.iterations);
        println!("    Packages: {:?}", case.packages);
        println!("    References: {:?}", case.references);
    }

    Ok(())
}

/// Print all validation errors. Fails when any of them is critical.
pub fn handle_validate(suite: &Suite) -> Result<()> {
    let errors = suite.validation_errors();
    for error in errors.iter() {
        if error.is_critical {
            println!("error: {error}");
        } else {
            println!("warning: {error}");
        }
    }

    let critical = errors.iter().filter(|e| e.is_critical).count();
    if critical > 0 {
        return Err(Error::ValidationFailed(critical));
    }
    println!("{} case(s) are valid", suite.cases.len());
    Ok(())
}

pub async fn handle_run(suite: &Suite, keep_files: bool) -> Result<()> {
    handle_validate(suite)?;

    let partitions = suite.partitions()?;
    let count = partitions.len();
    let mut output = BxRunOutput::new(suite);
    let mut failed = 0;

    for (idx, partition) in partitions.iter().enumerate() {
        info!(
            "Partition {}/{}: {} ({} case(s))",
            idx + 1,
            count,
            partition.runtime(),
            partition.cases().len()
        );
        if !run_partition(suite, partition, &mut output).await {
            failed += 1;
        }
        print_results(&output, partition);

        if !keep_files {
            remove_artifacts(suite, partition).await;
        }
    }

    dump_logs(&output, stdout())?;
    if failed > 0 {
        dump_logs_to_temporary_file(&output);
        return Err(Error::PartitionsFailed(failed));
    }
    Ok(())
}

async fn run_partition(suite: &Suite, partition: &BuildPartition, output: &mut BxRunOutput<'_>) -> bool {
    let toolchain = suite.registry.get_or_create(partition.runtime());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let pipeline = toolchain.run(partition, &suite.artifacts, Some(tx));
    let collector = async {
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::ProcessCreationFailed(err) => {
                    error!("{} - Failed to create process - {err}", partition.id())
                }
                RunEvent::ProcessCreated => info!("{} - Execution started", partition.id()),
                RunEvent::ProcessEnd(success) => {
                    if success {
                        info!("{} - Execution ended successfully", partition.id());
                    } else {
                        error!("{} - Execution failed", partition.id());
                    }
                }
                RunEvent::ProcessNewOutputLine(line) | RunEvent::ProcessNewErrorLine(line) => {
                    output.record_line(partition, line)
                }
            }
        }
    };
    let (outcome, ()) = tokio::join!(pipeline, collector);

    let failure = match &outcome {
        PipelineOutcome::Invalid(errors) => Some(format!("{} validation error(s)", errors.len())),
        PipelineOutcome::GenerateFailed(generated) => generated.failure.clone(),
        PipelineOutcome::BuildFailed(build) => build.failure.as_ref().map(ToString::to_string),
        PipelineOutcome::Executed { execution, .. } => {
            execution.failure.as_ref().map(ToString::to_string)
        }
    };
    match failure {
        Some(failure) => {
            error!("{} - {failure}", partition.id());
            output.record_message(partition, failure);
            false
        }
        None => outcome.is_success(),
    }
}

fn print_results(output: &BxRunOutput, partition: &BuildPartition) {
    for case in partition.cases() {
        match output.results.get(&case.id) {
            Some(results) => {
                for result in results {
                    println!("{result}");
                }
            }
            None => println!("{}: no result", case.name),
        }
    }
}

async fn remove_artifacts(suite: &Suite, partition: &BuildPartition) {
    let folder = suite.artifacts.join(partition.id());
    match tokio::fs::remove_dir_all(&folder).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!("Failed to remove {}: {err}", folder.display()),
    }
}
