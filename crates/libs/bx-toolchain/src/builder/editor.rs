//! Builds an editor project into a player by driving the editor in batch mode.

use std::{collections::VecDeque, path::Path};

use async_trait::async_trait;
use bx_io::runner::{RunEvent, RunExit, Runner};
use tokio::{sync::mpsc, time::Instant};
use tracing::{error, info, warn};

use crate::{
    builder::Builder,
    generator::editor::{BUILD_PLAYER_METHOD, OUTPUT_ARG, PREPARE_SCENE_METHOD, SETUP_METHOD},
    partition::BuildPartition,
    results::{BuildFailureKind, BuildResult, GenerateResult},
    runtime::{EDITOR_BASE_ARGS, EditorRuntime, RuntimeVariant},
};

/// Environment variable carrying the custom base library directory.
pub const BASE_LIBRARY_PATH_ENV: &str = "BX_BASE_LIBRARY_PATH";

/// Editor output lines kept for failure messages.
const OUTPUT_TAIL_LINES: usize = 20;

const STEPS: [&str; 3] = [SETUP_METHOD, PREPARE_SCENE_METHOD, BUILD_PLAYER_METHOD];

enum StepOutcome {
    Done,
    Failed(String),
    TimedOut,
    Fault(String),
}

#[derive(Debug, Clone, Default)]
pub struct EditorBuilder;

impl EditorBuilder {
    pub fn new() -> Self {
        Self
    }

    fn runner(editor: &EditorRuntime, project: &Path, method: &str, executable: &Path) -> Runner {
        let mut args: Vec<String> = EDITOR_BASE_ARGS.iter().map(|arg| arg.to_string()).collect();
        args.extend([
            String::from("-projectPath"),
            project.display().to_string(),
            String::from("-logFile"),
            String::from("-"),
            String::from("-executeMethod"),
            method.to_string(),
        ]);
        if method == BUILD_PLAYER_METHOD {
            args.push(OUTPUT_ARG.to_string());
            args.push(executable.display().to_string());
        }

        let mut runner = Runner::new(&editor.tool_path, args);
        if let Some(dir) = editor.tool_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            runner = runner.current_dir(dir);
        }
        if let Some(path) = &editor.base_library_path {
            runner = runner.env(BASE_LIBRARY_PATH_ENV, path.display().to_string());
        }
        runner
    }

    async fn run_step(runner: &Runner, method: &str, deadline: Instant) -> StepOutcome {
        info!("Editor step {method}: {}", runner.get_full_command());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let collect = async {
            let mut tail = VecDeque::with_capacity(OUTPUT_TAIL_LINES);
            while let Some(event) = rx.recv().await {
                let line = match event {
                    RunEvent::ProcessNewOutputLine(line) | RunEvent::ProcessNewErrorLine(line) => line,
                    _ => continue,
                };
                info!("[{method}] {line}");
                if tail.len() == OUTPUT_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        };
        let (exit, tail) = tokio::join!(runner.run(tx, deadline), collect);

        match exit {
            Ok(exit) if exit.success() => StepOutcome::Done,
            Ok(RunExit::TimedOut) => StepOutcome::TimedOut,
            Ok(exit) => {
                let code = exit
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| String::from("a signal"));
                let tail: Vec<String> = tail.into_iter().collect();
                StepOutcome::Failed(format!(
                    "Editor step {method} failed with {code}:\n{}",
                    tail.join("\n")
                ))
            }
            Err(err) => StepOutcome::Fault(format!("Failed to run the editor for {method}: {err}")),
        }
    }
}

#[async_trait]
impl Builder for EditorBuilder {
    async fn build(
        &self,
        generate_result: &GenerateResult,
        partition: &BuildPartition,
    ) -> BuildResult {
        if !generate_result.is_success() {
            return BuildResult::not_generated(generate_result.clone());
        }
        let RuntimeVariant::EditorAutomated(editor) = partition.runtime() else {
            return BuildResult::failure(
                generate_result.clone(),
                BuildFailureKind::Fault,
                format!("Runtime {} is not an editor runtime", partition.runtime()),
            );
        };
        let paths = &generate_result.artifacts_paths;
        let Some(project) = paths.project_directory.as_deref() else {
            return BuildResult::failure(
                generate_result.clone(),
                BuildFailureKind::Fault,
                "Generated artifacts have no editor project",
            );
        };
        if let Some(bin_dir) = paths.executable_path.parent() {
            if let Err(err) = tokio::fs::create_dir_all(bin_dir).await {
                return BuildResult::failure(
                    generate_result.clone(),
                    BuildFailureKind::Fault,
                    format!("Cannot create folder {}: {err}", bin_dir.display()),
                );
            }
        }

        let timeout = partition.timeout();
        let deadline = Instant::now() + timeout;
        info!(
            "Building partition {} with {}, build script {}",
            partition.id(),
            partition.runtime(),
            paths.build_script_path.display()
        );

        for method in STEPS {
            let runner = Self::runner(editor, project, method, &paths.executable_path);
            match Self::run_step(&runner, method, deadline).await {
                StepOutcome::Done => {}
                StepOutcome::TimedOut => {
                    if let Err(err) = tokio::fs::remove_file(&paths.executable_path).await {
                        if err.kind() != std::io::ErrorKind::NotFound {
                            warn!("Failed to remove partial player: {err}");
                        }
                    }
                    error!("Editor step {method} timed out after {timeout:?}");
                    return BuildResult::timeout(generate_result.clone(), timeout);
                }
                StepOutcome::Failed(message) => {
                    error!("{message}");
                    return BuildResult::failure(
                        generate_result.clone(),
                        BuildFailureKind::Unrecoverable,
                        message,
                    );
                }
                StepOutcome::Fault(message) => {
                    error!("{message}");
                    return BuildResult::failure(
                        generate_result.clone(),
                        BuildFailureKind::Fault,
                        message,
                    );
                }
            }
        }

        if !paths.executable_path.exists() {
            return BuildResult::failure(
                generate_result.clone(),
                BuildFailureKind::Unrecoverable,
                format!(
                    "The editor finished but produced no player at {}",
                    paths.executable_path.display()
                ),
            );
        }
        info!("Built player {}", paths.executable_path.display());
        BuildResult::success(generate_result.clone())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::{os::unix::fs::PermissionsExt, path::PathBuf, time::Duration};

    use super::*;
    use crate::{
        case::BenchmarkCase,
        generator::{EditorProjectGenerator, Generator},
        version::ToolVersion,
    };

    const FAKE_EDITOR: &str = r#"#!/bin/sh
echo "$@" >> "$(dirname "$0")/calls.log"
method=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    -executeMethod) method="$2"; shift ;;
    -bxOutput) out="$2"; shift ;;
  esac
  shift
done
echo "running $method"
echo "library: $BX_BASE_LIBRARY_PATH"
if [ "$method" = "$FAIL_METHOD" ]; then
  echo "Scene could not be saved" >&2
  exit 3
fi
if [ "$method" = "$HANG_METHOD" ]; then
  sleep 30
fi
if [ "$method" = "BxPlayerBuild.Build" ] && [ -z "$NO_PLAYER" ]; then
  echo player > "$out"
fi
exit 0
"#;

    fn fake_editor(dir: &Path, env: &str) -> PathBuf {
        let tool = dir.join("Editor");
        let script = FAKE_EDITOR.replacen("#!/bin/sh\n", &format!("#!/bin/sh\n{env}\n"), 1);
        std::fs::write(&tool, script).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        tool
    }

    async fn build_with(env: &str, timeout: Duration) -> (tempfile::TempDir, BuildResult) {
        let dir = tempfile::tempdir().unwrap();
        let tool = fake_editor(dir.path(), env);
        let runtime = RuntimeVariant::EditorAutomated(EditorRuntime::with_version(
            "engine",
            tool,
            None,
            Some(dir.path().join("bcl")),
            ToolVersion::new(2021, 3, 10, 1),
        ));
        let case = BenchmarkCase::new("a", "1").with_runtime(runtime);
        let partition = BuildPartition::new(vec![case], timeout).unwrap();
        let generated = EditorProjectGenerator::new().generate(&partition, &dir.path().join("artifacts"));
        assert!(generated.is_success());

        let result = EditorBuilder::new().build(&generated, &partition).await;
        (dir, result)
    }

    #[tokio::test]
    async fn runs_three_steps_and_finds_player() {
        let (dir, result) = build_with("", Duration::from_secs(20)).await;
        assert!(result.is_build_success(), "{:?}", result.failure);

        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        let methods: Vec<&str> = calls
            .lines()
            .map(|line| {
                let (_, rest) = line.split_once("-executeMethod ").unwrap();
                rest.split(' ').next().unwrap()
            })
            .collect();
        assert_eq!(methods, STEPS.to_vec());
        assert!(calls.lines().all(|line| line.starts_with("-batchmode -nographics -quit")));
        assert!(result.artifacts_paths().executable_path.is_file());
    }

    #[tokio::test]
    async fn failing_step_stops_the_build() {
        let (dir, result) = build_with("FAIL_METHOD=BxPrepareScene.Prepare", Duration::from_secs(20)).await;
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, BuildFailureKind::Unrecoverable);
        assert!(failure.message.contains("BxPrepareScene.Prepare failed with 3"));
        assert!(failure.message.contains("Scene could not be saved"));

        let calls = std::fs::read_to_string(dir.path().join("calls.log")).unwrap();
        assert_eq!(calls.lines().count(), 2);
    }

    #[tokio::test]
    async fn missing_player_is_a_failure() {
        let (_dir, result) = build_with("NO_PLAYER=1", Duration::from_secs(20)).await;
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, BuildFailureKind::Unrecoverable);
        assert!(failure.message.contains("produced no player"));
    }

    #[tokio::test]
    async fn timeout_covers_all_steps() {
        let started = std::time::Instant::now();
        let (_dir, result) = build_with("HANG_METHOD=BxProjectSetup.Setup", Duration::from_millis(500)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
        let failure = result.failure.unwrap();
        assert_eq!(failure.kind, BuildFailureKind::Timeout);
        assert!(failure.message.contains("500ms"));
    }
}
