//! On-disk layout of a partition's generated artifacts.

use std::{
    env::consts::EXE_SUFFIX,
    path::{Path, PathBuf},
};

pub const PROGRAM_FILE_NAME: &str = "program.rs";
pub const BUILD_SCRIPT_FILE_NAME: &str = "build.sh";
const INTERMEDIATE_DIR_NAME: &str = "obj";
const BIN_DIR_NAME: &str = "bin";
const PROJECT_DIR_NAME: &str = "project";

/// Where the files of one partition live.
///
/// Everything sits under `root/<partition id>/`, so two partitions never
/// write to the same place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactsPaths {
    pub root_artifacts_folder: PathBuf,
    pub build_artifacts_directory: PathBuf,
    pub program_code_path: PathBuf,
    /// Human-readable record of how the program is built. Never executed.
    pub build_script_path: PathBuf,
    pub executable_path: PathBuf,
    pub intermediate_directory: PathBuf,
    /// Engine project folder, for editor builds only.
    pub project_directory: Option<PathBuf>,
}

impl ArtifactsPaths {
    /// Layout for a program compiled directly by a compiler service.
    pub fn for_program(root: &Path, partition_id: &str) -> Self {
        let build_artifacts_directory = root.join(partition_id);
        Self {
            root_artifacts_folder: root.to_path_buf(),
            program_code_path: build_artifacts_directory.join(PROGRAM_FILE_NAME),
            build_script_path: build_artifacts_directory.join(BUILD_SCRIPT_FILE_NAME),
            executable_path: build_artifacts_directory
                .join(BIN_DIR_NAME)
                .join(format!("{partition_id}{EXE_SUFFIX}")),
            intermediate_directory: build_artifacts_directory.join(INTERMEDIATE_DIR_NAME),
            project_directory: None,
            build_artifacts_directory,
        }
    }

    /// Layout for an engine project built into a player by the editor.
    ///
    /// The runner script is the program code; the player lands in `bin/`.
    pub fn for_editor_project(root: &Path, partition_id: &str, runner_script: &str) -> Self {
        let mut paths = Self::for_program(root, partition_id);
        let project_directory = paths.build_artifacts_directory.join(PROJECT_DIR_NAME);
        paths.program_code_path = project_directory
            .join("Assets")
            .join("Scripts")
            .join(runner_script);
        paths.project_directory = Some(project_directory);
        paths
    }

    /// Partition id this layout was derived from.
    pub fn partition_id(&self) -> Option<&str> {
        self.build_artifacts_directory
            .file_name()
            .and_then(|name| name.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_layout_is_keyed_by_partition() {
        let paths = ArtifactsPaths::for_program(Path::new("/tmp/bx"), "0123abcd");
        assert_eq!(paths.build_artifacts_directory, Path::new("/tmp/bx/0123abcd"));
        assert_eq!(paths.program_code_path, Path::new("/tmp/bx/0123abcd/program.rs"));
        assert_eq!(paths.build_script_path, Path::new("/tmp/bx/0123abcd/build.sh"));
        assert_eq!(paths.intermediate_directory, Path::new("/tmp/bx/0123abcd/obj"));
        assert!(paths.executable_path.starts_with("/tmp/bx/0123abcd/bin"));
        assert_eq!(paths.partition_id(), Some("0123abcd"));
        assert_eq!(paths.project_directory, None);
    }

    #[test]
    fn editor_layout_places_script_in_project() {
        let paths =
            ArtifactsPaths::for_editor_project(Path::new("/tmp/bx"), "0123abcd", "BxRunner.cs");
        assert_eq!(
            paths.project_directory.as_deref(),
            Some(Path::new("/tmp/bx/0123abcd/project"))
        );
        assert_eq!(
            paths.program_code_path,
            Path::new("/tmp/bx/0123abcd/project/Assets/Scripts/BxRunner.cs")
        );
    }
}
