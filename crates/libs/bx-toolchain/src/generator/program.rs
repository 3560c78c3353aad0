//! Generates a standalone Rust program that times every case of a partition.

use std::{collections::HashSet, path::Path};

use bx_config::CodegenBackend;
use tracing::{error, info};

use crate::{
    artifacts::{ArtifactsPaths, PROGRAM_FILE_NAME},
    case::BenchmarkCase,
    compiler::CompilerPlatform,
    generator::{Generator, check_bodies, create_dir, render, write_file},
    partition::BuildPartition,
    results::{GenerateResult, RESULT_LINE_PREFIX},
};

const PROGRAM_TEMPLATE: &str = include_str!("templates/program.rs.tmpl");
const CASE_TEMPLATE: &str = include_str!("templates/case.rs.tmpl");
const BUILD_SCRIPT_TEMPLATE: &str = include_str!("templates/build.sh.tmpl");

/// Generator for the standard and alternate-jit families.
///
/// Run without arguments the program times every case, representative
/// first; `--case <index>` runs one of them.
#[derive(Debug, Clone, Default)]
pub struct ProgramGenerator;

impl ProgramGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Source text of the program for `partition`.
    pub fn program_source(&self, partition: &BuildPartition) -> String {
        let cases: String = partition
            .cases()
            .iter()
            .enumerate()
            .map(|(index, case)| case_source(index, case))
            .collect();
        let table = (0..partition.cases().len())
            .map(|index| format!("bx_case_{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let runtime = partition.runtime().to_string();

        render(
            PROGRAM_TEMPLATE,
            &[
                ("PARTITION_ID", partition.id()),
                ("RUNTIME", &runtime),
                ("EXTERN_CRATES", &extern_crates(partition)),
                ("CASES", &cases),
                ("CASE_TABLE", &table),
            ],
        )
    }

    /// The command line the builder runs, recorded for people reading the
    /// artifacts folder.
    fn build_script(&self, partition: &BuildPartition, paths: &ArtifactsPaths) -> String {
        let runtime = partition.runtime();
        let compiler = runtime
            .custom_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| String::from("rustc"));
        let executable = paths
            .executable_path
            .strip_prefix(&paths.build_artifacts_directory)
            .unwrap_or(&paths.executable_path);
        let mut command = format!(
            "{compiler} {PROGRAM_FILE_NAME} --edition 2021 --crate-type bin -C opt-level=3 -C codegen-units=1 -o {}",
            executable.display()
        );
        if let Some(target) = CompilerPlatform::from(partition.platform()).target_triple() {
            command.push_str(&format!(" --target {target}"));
        }
        if runtime.codegen_backend() == Some(CodegenBackend::Cranelift) {
            command.push_str(" -Z codegen-backend=cranelift");
        }

        let runtime = runtime.to_string();
        render(
            BUILD_SCRIPT_TEMPLATE,
            &[
                ("PARTITION_ID", partition.id()),
                ("RUNTIME", &runtime),
                ("COMMAND", &command),
            ],
        )
    }

    fn write_artifacts(&self, partition: &BuildPartition, paths: &ArtifactsPaths) -> Result<(), String> {
        check_bodies(partition)?;
        create_dir(&paths.build_artifacts_directory)?;
        create_dir(&paths.intermediate_directory)?;
        write_file(&paths.program_code_path, &self.program_source(partition))?;
        write_file(&paths.build_script_path, &self.build_script(partition, paths))
    }
}

fn extern_crates(partition: &BuildPartition) -> String {
    let mut seen = HashSet::new();
    let libraries = partition
        .cases()
        .iter()
        .flat_map(|case| case.references.iter().map(|r| r.crate_name()))
        .chain(partition.packages().iter().map(|p| p.replace('-', "_")));
    libraries
        .filter(|name| seen.insert(name.clone()))
        .map(|name| format!("extern crate {name};\n"))
        .collect()
}

fn case_source(index: usize, case: &BenchmarkCase) -> String {
    let index = index.to_string();
    let iterations = case.harness.iterations.to_string();
    let name = format!("{:?}", case.name);
    render(
        CASE_TEMPLATE,
        &[
            ("INDEX", &index),
            ("SETUP", case.harness.setup.as_deref().unwrap_or_default()),
            ("ITERATIONS", &iterations),
            ("BODY", case.harness.body.trim()),
            ("RESULT_PREFIX", RESULT_LINE_PREFIX),
            ("NAME", &name),
        ],
    )
}

impl Generator for ProgramGenerator {
    fn generate(&self, partition: &BuildPartition, root: &Path) -> GenerateResult {
        let paths = ArtifactsPaths::for_program(root, partition.id());
        match self.write_artifacts(partition, &paths) {
            Ok(()) => {
                info!(
                    "Generated {} for {} case(s)",
                    paths.program_code_path.display(),
                    partition.cases().len()
                );
                GenerateResult::success(paths)
            }
            Err(reason) => {
                error!("Generation of partition {} failed: {reason}", partition.id());
                GenerateResult::failure(paths, reason)
            }
        }
    }
}
