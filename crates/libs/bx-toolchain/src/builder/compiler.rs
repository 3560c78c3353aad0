//! Builds a generated program through a [`CompilerService`].

use std::{collections::HashSet, sync::Arc, time::Duration};

use async_trait::async_trait;
use bx_io::process::ProcessError;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, error, info, warn};

use crate::{
    artifacts::ArtifactsPaths,
    builder::Builder,
    compiler::{CompileOptions, CompileRequest, CompilerService, EmitOutcome},
    partition::BuildPartition,
    prelude::*,
    references::{
        LibraryIdentity, Reference, ReferenceResolver, dedup_references, framework_references,
        missing_reference_name,
    },
    results::{BuildFailureKind, BuildResult, GenerateResult},
};

/// Compiles the generated program, retrying once when the only problem was
/// libraries that were not passed to the compiler but can be found.
pub struct CompilerBuilder<C, R> {
    compiler: C,
    resolver: R,
    framework: Option<Arc<[Reference]>>,
}

impl<C, R> CompilerBuilder<C, R>
where
    C: CompilerService,
    R: ReferenceResolver,
{
    pub fn new(compiler: C, resolver: R) -> Self {
        Self {
            compiler,
            resolver,
            framework: None,
        }
    }

    /// Use `references` instead of the process-wide framework set.
    pub fn with_framework_references(mut self, references: Arc<[Reference]>) -> Self {
        self.framework = Some(references);
        self
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    fn framework_references(&self) -> Arc<[Reference]> {
        match &self.framework {
            Some(references) => Arc::clone(references),
            None => framework_references(),
        }
    }

    /// Case references and packages resolved up front, plus the framework.
    fn initial_references(&self, partition: &BuildPartition) -> Vec<Reference> {
        let mut wanted: Vec<LibraryIdentity> = Vec::new();
        for case in partition.cases() {
            wanted.extend(case.references.iter().cloned());
        }
        wanted.extend(partition.packages().iter().map(LibraryIdentity::new));

        let mut references = Vec::new();
        let mut seen = HashSet::new();
        for identity in wanted {
            if !seen.insert(identity.clone()) {
                continue;
            }
            match self.resolver.resolve(&identity) {
                Some(reference) => references.push(reference),
                None => warn!("Could not locate library {identity}"),
            }
        }
        references.extend(self.framework_references().iter().cloned());
        dedup_references(references)
    }

    /// Libraries the failed attempt reported as missing that the resolver can
    /// locate and that were not already passed in.
    fn recover_references(&self, outcome: &EmitOutcome, current: &[Reference]) -> Vec<Reference> {
        let contract = self.compiler.missing_reference_contract();
        let mut names = HashSet::new();
        let identities: Vec<LibraryIdentity> = outcome
            .errors()
            .filter_map(|diagnostic| missing_reference_name(diagnostic, contract))
            .filter(|name| names.insert(*name))
            .map(LibraryIdentity::parse)
            .collect();

        let known: HashSet<&LibraryIdentity> = current.iter().map(|r| &r.identity).collect();
        let recovered = identities
            .iter()
            .filter(|identity| !known.contains(identity))
            .filter_map(|identity| {
                let reference = self.resolver.resolve(identity);
                if reference.is_none() {
                    debug!("Missing library {identity} is not resolvable");
                }
                reference
            });
        dedup_references(recovered)
    }

    async fn compile_with_retry(
        &self,
        paths: &ArtifactsPaths,
        partition: &BuildPartition,
        deadline: Instant,
    ) -> Result<EmitOutcome> {
        // A missing program is a fault, not a compile error worth retrying
        tokio::fs::metadata(&paths.program_code_path).await?;
        let options = CompileOptions::release(partition.platform())
            .with_backend(partition.runtime().codegen_backend());
        if let Some(bin_dir) = paths.executable_path.parent() {
            tokio::fs::create_dir_all(bin_dir).await?;
        }
        tokio::fs::create_dir_all(&paths.intermediate_directory).await?;

        let crate_name = format!("bx_{}", partition.id());
        let references = self.initial_references(partition);
        let request = CompileRequest {
            crate_name: &crate_name,
            source_path: &paths.program_code_path,
            output_path: &paths.executable_path,
            intermediate_dir: &paths.intermediate_directory,
            options: &options,
            references: &references,
            metadata: partition.id(),
            deadline,
        };

        let outcome = self.compiler.compile(&request).await?;
        if outcome.success {
            return Ok(outcome);
        }

        let recovered = self.recover_references(&outcome, &references);
        if recovered.is_empty() {
            return Ok(outcome);
        }
        info!(
            "Retrying build of {} with {} recovered reference(s): {}",
            partition.id(),
            recovered.len(),
            recovered
                .iter()
                .map(|r| r.identity.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        );
        let expanded: Vec<Reference> = references.iter().cloned().chain(recovered).collect();
        let retry = CompileRequest {
            references: &expanded,
            ..request
        };
        self.compiler.compile(&retry).await
    }

    async fn timed_out(
        &self,
        generate_result: &GenerateResult,
        timeout: Duration,
    ) -> BuildResult {
        let executable = &generate_result.artifacts_paths.executable_path;
        if let Err(err) = tokio::fs::remove_file(executable).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove partial executable {}: {err}", executable.display());
            }
        }
        error!("Build timed out after {timeout:?}");
        BuildResult::timeout(generate_result.clone(), timeout)
    }
}

#[async_trait]
impl<C, R> Builder for CompilerBuilder<C, R>
where
    C: CompilerService,
    R: ReferenceResolver,
{
    async fn build(
        &self,
        generate_result: &GenerateResult,
        partition: &BuildPartition,
    ) -> BuildResult {
        if !generate_result.is_success() {
            return BuildResult::not_generated(generate_result.clone());
        }
        let paths = &generate_result.artifacts_paths;
        let timeout = partition.timeout();
        let deadline = Instant::now() + timeout;
        info!(
            "Building partition {} ({}), build script {}",
            partition.id(),
            partition.runtime(),
            paths.build_script_path.display()
        );

        let outcome = timeout_at(deadline, self.compile_with_retry(paths, partition, deadline)).await;
        match outcome {
            Err(_) | Ok(Err(Error::Process(ProcessError::Timeout))) => {
                self.timed_out(generate_result, timeout).await
            }
            Ok(Err(err)) => {
                error!("Compiler fault while building {}: {err}", partition.id());
                BuildResult::failure(
                    generate_result.clone(),
                    BuildFailureKind::Fault,
                    err.to_string(),
                )
            }
            Ok(Ok(outcome)) if outcome.success => {
                info!("Built {}", paths.executable_path.display());
                BuildResult::success(generate_result.clone())
            }
            Ok(Ok(outcome)) => {
                let message = outcome.error_message();
                error!("Build of {} failed:\n{message}", partition.id());
                BuildResult::failure(
                    generate_result.clone(),
                    BuildFailureKind::Unrecoverable,
                    message,
                )
            }
        }
    }
}
