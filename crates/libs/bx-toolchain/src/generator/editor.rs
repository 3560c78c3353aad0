//! Generates an engine project that the editor turns into a benchmark player.
//!
//! The project holds three editor scripts, run one after another by the
//! editor builder, and a runtime script that times the cases inside the
//! player:
//!
//! 1. `BxProjectSetup.Setup` applies player settings (scripting backend,
//!    unsafe code, logging).
//! 2. `BxPrepareScene.Prepare` creates the single scene hosting the runner.
//! 3. `BxPlayerBuild.Build` builds the player to the path given after
//!    [`OUTPUT_ARG`].

use std::path::Path;

use tracing::{error, info};

use crate::{
    artifacts::ArtifactsPaths,
    case::BenchmarkCase,
    generator::{Generator, check_bodies, create_dir, render, write_file},
    partition::BuildPartition,
    results::{GenerateResult, RESULT_LINE_PREFIX},
    runtime::{EDITOR_BASE_ARGS, EditorRuntime, RuntimeVariant},
    version::ToolVersion,
};

pub const SETUP_METHOD: &str = "BxProjectSetup.Setup";
pub const PREPARE_SCENE_METHOD: &str = "BxPrepareScene.Prepare";
pub const BUILD_PLAYER_METHOD: &str = "BxPlayerBuild.Build";
/// Editor argument followed by the player output path.
pub const OUTPUT_ARG: &str = "-bxOutput";

const RUNNER_SCRIPT: &str = "BxRunner.cs";

/// First editor release with the named build target API.
const NAMED_BUILD_TARGET_SINCE: ToolVersion = ToolVersion::new(2021, 2, 0, 0);

const PROJECT_SETUP_TEMPLATE: &str = include_str!("templates/BxProjectSetup.cs.tmpl");
const PREPARE_SCENE_TEMPLATE: &str = include_str!("templates/BxPrepareScene.cs.tmpl");
const PLAYER_BUILD_TEMPLATE: &str = include_str!("templates/BxPlayerBuild.cs.tmpl");
const RUNNER_TEMPLATE: &str = include_str!("templates/BxRunner.cs.tmpl");
const RUNNER_CASE_TEMPLATE: &str = include_str!("templates/BxRunnerCase.cs.tmpl");
const BUILD_SCRIPT_TEMPLATE: &str = include_str!("templates/build.sh.tmpl");

#[derive(Debug, Clone, Default)]
pub struct EditorProjectGenerator;

impl EditorProjectGenerator {
    pub fn new() -> Self {
        Self
    }

    fn editor(partition: &BuildPartition) -> Result<&EditorRuntime, String> {
        match partition.runtime() {
            RuntimeVariant::EditorAutomated(editor) => Ok(editor),
            other => Err(format!("Runtime {other} cannot build an editor project")),
        }
    }

    fn check_packages(partition: &BuildPartition) -> Result<(), String> {
        match partition.packages() {
            [] => Ok(()),
            packages => Err(format!(
                "Editor projects cannot resolve packages: {}",
                packages.join(", ")
            )),
        }
    }

    /// Project setup script for `editor`.
    pub fn project_setup_source(&self, partition: &BuildPartition, editor: &EditorRuntime) -> String {
        let (using, target) = if editor.version() >= NAMED_BUILD_TARGET_SINCE {
            ("using UnityEditor.Build;", "NamedBuildTarget.Standalone")
        } else {
            ("", "BuildTargetGroup.Standalone")
        };
        let (backend, aot_settings) = if editor.is_aot() {
            let args = editor.aot_args.as_deref().unwrap_or_default();
            (
                "IL2CPP",
                format!(
                    "PlayerSettings.SetAdditionalIl2CppArgs({});",
                    csharp_string(args)
                ),
            )
        } else {
            ("Mono2x", String::new())
        };
        let product = format!("bx-{}", partition.id());
        render(
            PROJECT_SETUP_TEMPLATE,
            &[
                ("PARTITION_ID", partition.id()),
                ("BUILD_TARGET_USING", using),
                ("BUILD_TARGET", target),
                ("SCRIPTING_BACKEND", backend),
                ("AOT_SETTINGS", &aot_settings),
                ("PRODUCT_NAME", &product),
            ],
        )
    }

    /// Runtime script that times every case inside the player.
    pub fn runner_source(&self, partition: &BuildPartition) -> String {
        let calls = (0..partition.cases().len())
            .map(|index| format!("            Case{index}();"))
            .collect::<Vec<_>>()
            .join("\n");
        let cases: String = partition
            .cases()
            .iter()
            .enumerate()
            .map(|(index, case)| runner_case_source(index, case))
            .collect();
        render(
            RUNNER_TEMPLATE,
            &[
                ("PARTITION_ID", partition.id()),
                ("CASE_CALLS", &calls),
                ("CASES", &cases),
            ],
        )
    }

    fn build_script(&self, partition: &BuildPartition, editor: &EditorRuntime, paths: &ArtifactsPaths) -> String {
        let project = paths
            .project_directory
            .as_deref()
            .unwrap_or(&paths.build_artifacts_directory);
        let base = EDITOR_BASE_ARGS
            .iter()
            .map(|arg| if arg.contains(' ') { format!("\"{arg}\"") } else { arg.to_string() })
            .collect::<Vec<_>>()
            .join(" ");
        let command = [SETUP_METHOD, PREPARE_SCENE_METHOD, BUILD_PLAYER_METHOD]
            .iter()
            .map(|method| {
                let mut line = format!(
                    "\"{}\" {base} -projectPath \"{}\" -executeMethod {method}",
                    editor.tool_path.display(),
                    project.display()
                );
                if *method == BUILD_PLAYER_METHOD {
                    line.push_str(&format!(
                        " {OUTPUT_ARG} \"{}\"",
                        paths.executable_path.display()
                    ));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");
        let runtime = partition.runtime().to_string();
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
        let editor = Self::editor(partition)?;
        Self::check_packages(partition)?;
        check_bodies(partition)?;

        let project = paths
            .project_directory
            .as_deref()
            .ok_or_else(|| String::from("Editor layout has no project folder"))?;
        let editor_scripts = project.join("Assets").join("Editor");
        create_dir(&paths.build_artifacts_directory)?;
        create_dir(&paths.intermediate_directory)?;

        let id = partition.id();
        write_file(
            &editor_scripts.join("BxProjectSetup.cs"),
            &self.project_setup_source(partition, editor),
        )?;
        write_file(
            &editor_scripts.join("BxPrepareScene.cs"),
            &render(PREPARE_SCENE_TEMPLATE, &[("PARTITION_ID", id)]),
        )?;
        write_file(
            &editor_scripts.join("BxPlayerBuild.cs"),
            &render(
                PLAYER_BUILD_TEMPLATE,
                &[("PARTITION_ID", id), ("OUTPUT_ARG", OUTPUT_ARG)],
            ),
        )?;
        write_file(&paths.program_code_path, &self.runner_source(partition))?;
        write_file(
            &paths.build_script_path,
            &self.build_script(partition, editor, paths),
        )
    }
}

/// C# string literal holding `text`.
fn csharp_string(text: &str) -> String {
    let mut literal = String::with_capacity(text.len() + 2);
    literal.push('"');
    for c in text.chars() {
        match c {
            '"' => literal.push_str("\\\""),
            '\\' => literal.push_str("\\\\"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}

fn runner_case_source(index: usize, case: &BenchmarkCase) -> String {
    let index = index.to_string();
    let iterations = case.harness.iterations.to_string();
    let name = csharp_string(&case.name);
    render(
        RUNNER_CASE_TEMPLATE,
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

impl Generator for EditorProjectGenerator {
    fn generate(&self, partition: &BuildPartition, root: &Path) -> GenerateResult {
        let paths = ArtifactsPaths::for_editor_project(root, partition.id(), RUNNER_SCRIPT);
        match self.write_artifacts(partition, &paths) {
            Ok(()) => {
                info!(
                    "Generated editor project {} for {} case(s)",
                    paths.build_artifacts_directory.display(),
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

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::runtime::ManagedRuntime;

    fn editor(version: ToolVersion, aot_args: Option<&str>) -> RuntimeVariant {
        RuntimeVariant::EditorAutomated(EditorRuntime::with_version(
            "engine",
            "/opt/editor/Editor",
            aot_args.map(str::to_string),
            None,
            version,
        ))
    }

    fn partition(runtime: RuntimeVariant, cases: Vec<BenchmarkCase>) -> BuildPartition {
        let cases = cases
            .into_iter()
            .map(|case| case.with_runtime(runtime.clone()))
            .collect();
        BuildPartition::new(cases, Duration::from_secs(30)).unwrap()
    }

    fn runtime_of(partition: &BuildPartition) -> &EditorRuntime {
        EditorProjectGenerator::editor(partition).unwrap()
    }

    #[test]
    fn writes_project_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let partition = partition(
            editor(ToolVersion::new(2021, 3, 10, 1), None),
            vec![BenchmarkCase::new("sum", "1 + 1")],
        );

        let result = EditorProjectGenerator::new().generate(&partition, dir.path());
        assert!(result.is_success(), "{:?}", result.failure);
        let paths = result.artifacts_paths;
        let project = paths.project_directory.clone().unwrap();
        for script in ["BxProjectSetup.cs", "BxPrepareScene.cs", "BxPlayerBuild.cs"] {
            assert!(project.join("Assets").join("Editor").join(script).is_file());
        }
        assert!(paths.program_code_path.is_file());
        let build_script = std::fs::read_to_string(&paths.build_script_path).unwrap();
        assert!(build_script.contains("-executeMethod BxPlayerBuild.Build -bxOutput"));
        assert!(build_script.contains("\"Visible Meta Files\""));
    }

    #[test]
    fn build_target_api_follows_editor_version() {
        let generator = EditorProjectGenerator::new();

        let modern = partition(
            editor(ToolVersion::new(2021, 2, 0, 0), None),
            vec![BenchmarkCase::new("a", "1")],
        );
        let source = generator.project_setup_source(&modern, runtime_of(&modern));
        assert!(source.contains("NamedBuildTarget.Standalone"));
        assert!(source.contains("using UnityEditor.Build;"));

        let legacy = partition(
            editor(ToolVersion::new(2021, 1, 28, 1), None),
            vec![BenchmarkCase::new("a", "1")],
        );
        let source = generator.project_setup_source(&legacy, runtime_of(&legacy));
        assert!(source.contains("BuildTargetGroup.Standalone"));
        assert!(!source.contains("NamedBuildTarget"));
    }

    #[test]
    fn scripting_backend_follows_aot() {
        let generator = EditorProjectGenerator::new();

        let aot = partition(
            editor(ToolVersion::new(2022, 3, 0, 1), Some("--emit-null-checks=false")),
            vec![BenchmarkCase::new("a", "1")],
        );
        let source = generator.project_setup_source(&aot, runtime_of(&aot));
        assert!(source.contains("ScriptingImplementation.IL2CPP"));
        assert!(source.contains("SetAdditionalIl2CppArgs(\"--emit-null-checks=false\")"));

        let jit = partition(
            editor(ToolVersion::new(2022, 3, 0, 1), None),
            vec![BenchmarkCase::new("a", "1")],
        );
        let source = generator.project_setup_source(&jit, runtime_of(&jit));
        assert!(source.contains("ScriptingImplementation.Mono2x"));
        assert!(!source.contains("Il2CppArgs"));
    }

    #[test]
    fn runner_embeds_every_case() {
        let partition = partition(
            editor(ToolVersion::new(2021, 3, 10, 1), None),
            vec![
                BenchmarkCase::new("sum \"all\"", "Enumerable.Range(0, 10).Sum()")
                    .with_setup("var data = new int[10];")
                    .with_iterations(5),
                BenchmarkCase::new("len", "data.Length"),
            ],
        );
        let source = EditorProjectGenerator::new().runner_source(&partition);
        assert!(source.contains("Case0();"));
        assert!(source.contains("Case1();"));
        assert!(source.contains("Consume(Enumerable.Range(0, 10).Sum());"));
        assert!(source.contains("i < 5L"));
        assert!(source.contains(r#""sum \"all\"""#));
        assert!(!source.contains("{{"));
    }

    #[test]
    fn packages_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let partition = partition(
            editor(ToolVersion::new(2021, 3, 10, 1), None),
            vec![BenchmarkCase::new("a", "1").with_package("serde")],
        );
        let result = EditorProjectGenerator::new().generate(&partition, dir.path());
        assert!(result.failure.unwrap().contains("serde"));
    }

    #[test]
    fn non_editor_runtime_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let partition = partition(
            RuntimeVariant::StandardManaged(ManagedRuntime::host()),
            vec![BenchmarkCase::new("a", "1")],
        );
        let result = EditorProjectGenerator::new().generate(&partition, dir.path());
        assert!(!result.is_success());
    }
}
