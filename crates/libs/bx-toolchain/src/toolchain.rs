//! A generator, builder, executor and validator bound to one runtime family.

use std::{fmt, path::{Path, PathBuf}};

use bx_io::runner::RunEvent;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use crate::{
    builder::{Builder, CompilerBuilder, EditorBuilder},
    case::BenchmarkCase,
    compiler::rustc::Rustc,
    executor::{Executor, ProcessExecutor},
    generator::{EditorProjectGenerator, Generator, ProgramGenerator},
    partition::BuildPartition,
    references::SearchPathResolver,
    results::{BuildResult, ExecuteResult, GenerateResult},
    runtime::{EditorRuntime, JitRuntime, RuntimeFamily},
    validator::{ValidationError, Validator},
};

/// How far a partition got through the pipeline.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// Validation found critical errors; nothing was generated.
    Invalid(Vec<ValidationError>),
    GenerateFailed(GenerateResult),
    BuildFailed(BuildResult),
    Executed {
        build: BuildResult,
        execution: ExecuteResult,
    },
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Executed { execution, .. } if execution.is_success())
    }
}

pub struct Toolchain {
    name: String,
    family: RuntimeFamily,
    generator: Box<dyn Generator>,
    builder: Box<dyn Builder>,
    executor: Box<dyn Executor>,
    validator: Validator,
}

impl fmt::Debug for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolchain")
            .field("name", &self.name)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl Toolchain {
    pub fn new(
        name: impl Into<String>,
        generator: Box<dyn Generator>,
        builder: Box<dyn Builder>,
        executor: Box<dyn Executor>,
        validator: Validator,
    ) -> Self {
        Self {
            name: name.into(),
            family: validator.family(),
            generator,
            builder,
            executor,
            validator,
        }
    }

    /// Toolchain for the host `rustc`. `library_paths` are searched for
    /// referenced libraries.
    pub fn standard(library_paths: Vec<PathBuf>) -> Self {
        let name = "rustc";
        Self::new(
            name,
            Box::new(ProgramGenerator::new()),
            Box::new(CompilerBuilder::new(
                Rustc::default(),
                SearchPathResolver::new(library_paths),
            )),
            Box::new(ProcessExecutor::new()),
            Validator::new(RuntimeFamily::StandardManaged, name, true, true),
        )
    }

    /// Toolchain for an alternate compiler binary. The codegen backend is
    /// taken from each partition's runtime.
    pub fn alternate_jit(runtime: &JitRuntime, library_paths: Vec<PathBuf>) -> Self {
        let name = match &runtime.custom_path {
            Some(path) => format!("rustc ({})", path.display()),
            None => String::from("rustc (alternate)"),
        };
        Self::new(
            name.clone(),
            Box::new(ProgramGenerator::new()),
            Box::new(CompilerBuilder::new(
                Rustc::new(runtime.custom_path.clone()),
                SearchPathResolver::new(library_paths),
            )),
            Box::new(ProcessExecutor::new()),
            Validator::new(RuntimeFamily::AlternateJit, name, true, true),
        )
    }

    /// Toolchain for an engine editor. Editor builds are always release builds
    /// and cannot pull packages.
    pub fn editor(runtime: &EditorRuntime) -> Self {
        let name = format!("editor ({})", runtime.tool_path.display());
        Self::new(
            name.clone(),
            Box::new(EditorProjectGenerator::new()),
            Box::new(EditorBuilder::new()),
            Box::new(ProcessExecutor::player()),
            Validator::new(RuntimeFamily::EditorAutomated, name, false, false),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> RuntimeFamily {
        self.family
    }

    pub fn validate<'a>(
        &'a self,
        case: &'a BenchmarkCase,
    ) -> impl Iterator<Item = ValidationError> + 'a {
        self.validator.validate(case)
    }

    pub fn generate(&self, partition: &BuildPartition, root: &Path) -> GenerateResult {
        self.generator.generate(partition, root)
    }

    pub async fn build(&self, generate_result: &GenerateResult, partition: &BuildPartition) -> BuildResult {
        self.builder.build(generate_result, partition).await
    }

    pub async fn execute(
        &self,
        build: &BuildResult,
        partition: &BuildPartition,
        events: Option<UnboundedSender<RunEvent>>,
    ) -> ExecuteResult {
        self.executor.execute(build, partition, events).await
    }

    /// Validate every case, then generate, build and execute the partition.
    pub async fn run(
        &self,
        partition: &BuildPartition,
        root: &Path,
        events: Option<UnboundedSender<RunEvent>>,
    ) -> PipelineOutcome {
        let errors: Vec<ValidationError> = partition
            .cases()
            .iter()
            .flat_map(|case| self.validate(case))
            .collect();
        for warning in errors.iter().filter(|error| !error.is_critical) {
            warn!("{warning}");
        }
        if errors.iter().any(|error| error.is_critical) {
            for error in errors.iter().filter(|error| error.is_critical) {
                error!("{error}");
            }
            return PipelineOutcome::Invalid(errors);
        }

        info!("{}: partition {} with {} case(s)", self.name, partition.id(), partition.cases().len());
        let generated = self.generate(partition, root);
        if !generated.is_success() {
            return PipelineOutcome::GenerateFailed(generated);
        }
        let build = self.build(&generated, partition).await;
        if !build.is_build_success() {
            return PipelineOutcome::BuildFailed(build);
        }
        let execution = self.execute(&build, partition, events).await;
        PipelineOutcome::Executed { build, execution }
    }
}
