//! Pre-flight checks run before anything is generated.
//!
//! Each rule looks at one aspect of a case on its own, and every rule always
//! runs, so a case breaking several rules reports all of them.

use std::{fmt, path::Path};

use uuid::Uuid;

use crate::{
    case::BenchmarkCase,
    runtime::{RuntimeFamily, RuntimeVariant},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Critical errors prevent the case from being built.
    pub is_critical: bool,
    pub message: String,
    pub case: String,
    pub case_id: Uuid,
}

impl ValidationError {
    fn critical(case: &BenchmarkCase, message: String) -> Self {
        Self {
            is_critical: true,
            message,
            case: case.name.clone(),
            case_id: case.id,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = if self.is_critical { "error" } else { "warning" };
        write!(f, "{level}: {} ({})", self.message, self.case)
    }
}

/// Validation rules of one toolchain.
#[derive(Debug, Clone)]
pub struct Validator {
    family: RuntimeFamily,
    toolchain: String,
    /// Whether the toolchain can rebuild the source with another configuration.
    rebuild_allowed: bool,
    /// Whether the toolchain can fetch external packages.
    package_resolution: bool,
}

type Rule = fn(&Validator, &BenchmarkCase) -> Vec<ValidationError>;

static RULES: [Rule; 4] = [
    Validator::check_runtime,
    Validator::check_paths,
    Validator::check_build_configuration,
    Validator::check_packages,
];

impl Validator {
    pub fn new(
        family: RuntimeFamily,
        toolchain: impl Into<String>,
        rebuild_allowed: bool,
        package_resolution: bool,
    ) -> Self {
        Self {
            family,
            toolchain: toolchain.into(),
            rebuild_allowed,
            package_resolution,
        }
    }

    pub fn family(&self) -> RuntimeFamily {
        self.family
    }

    /// All problems with `case`, produced rule by rule as the iterator is
    /// consumed. An empty iterator means the case is valid.
    pub fn validate<'a>(
        &'a self,
        case: &'a BenchmarkCase,
    ) -> impl Iterator<Item = ValidationError> + 'a {
        RULES.iter().flat_map(move |rule| rule(self, case))
    }

    fn check_runtime(&self, case: &BenchmarkCase) -> Vec<ValidationError> {
        match &case.job.runtime {
            None => vec![ValidationError::critical(
                case,
                format!(
                    "The {} toolchain requires the runtime to be configured explicitly",
                    self.toolchain
                ),
            )],
            Some(runtime) if runtime.family() != self.family => vec![ValidationError::critical(
                case,
                format!(
                    "The {} toolchain targets {} runtimes, but {runtime} is {}",
                    self.toolchain,
                    self.family,
                    runtime.family()
                ),
            )],
            Some(_) => Vec::new(),
        }
    }

    fn check_paths(&self, case: &BenchmarkCase) -> Vec<ValidationError> {
        let Some(runtime) = &case.job.runtime else {
            return Vec::new();
        };
        let mut paths: Vec<(&str, &Path)> = Vec::new();
        match runtime {
            RuntimeVariant::AlternateJit(jit) => {
                if let Some(path) = jit.custom_path.as_deref() {
                    paths.push(("compiler path", path));
                }
            }
            RuntimeVariant::EditorAutomated(editor) => paths.push(("editor path", &editor.tool_path)),
            RuntimeVariant::StandardManaged(_) => {}
        }
        if let Some(path) = runtime.base_library_path() {
            paths.push(("base library path", path));
        }

        paths
            .into_iter()
            .filter(|(_, path)| !path.exists())
            .map(|(what, path)| {
                ValidationError::critical(
                    case,
                    format!(
                        "The {what} provided for the {} toolchain: {} does NOT exist",
                        self.toolchain,
                        path.display()
                    ),
                )
            })
            .collect()
    }

    fn check_build_configuration(&self, case: &BenchmarkCase) -> Vec<ValidationError> {
        if self.rebuild_allowed || !case.job.has_custom_build_configuration() {
            return Vec::new();
        }
        vec![ValidationError::critical(
            case,
            format!(
                "The {} toolchain does not allow to rebuild the source project, so the build configuration '{}' makes no sense",
                self.toolchain,
                case.job.build_configuration()
            ),
        )]
    }

    fn check_packages(&self, case: &BenchmarkCase) -> Vec<ValidationError> {
        if self.package_resolution || case.job.packages.is_empty() {
            return Vec::new();
        }
        vec![ValidationError::critical(
            case,
            format!(
                "The {} toolchain does not allow specifying package dependencies ({})",
                self.toolchain,
                case.job.packages.join(", ")
            ),
        )]
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use bx_config::CodegenBackend;

    use super::*;
    use crate::{
        runtime::{EditorRuntime, JitRuntime, ManagedRuntime},
        version::ToolVersion,
    };

    fn editor_validator() -> Validator {
        Validator::new(RuntimeFamily::EditorAutomated, "editor", false, false)
    }

    fn editor_runtime(tool: PathBuf, base: Option<PathBuf>) -> RuntimeVariant {
        RuntimeVariant::EditorAutomated(EditorRuntime::with_version(
            "engine",
            tool,
            None,
            base,
            ToolVersion::new(2021, 3, 10, 1),
        ))
    }

    #[test]
    fn valid_case_has_no_errors() {
        let validator = Validator::new(RuntimeFamily::StandardManaged, "rustc", true, true);
        let case = BenchmarkCase::new("a", "1")
            .with_runtime(RuntimeVariant::StandardManaged(ManagedRuntime::host()))
            .with_build_configuration("Debug")
            .with_package("fastmath");
        assert_eq!(validator.validate(&case).count(), 0);
    }

    #[test]
    fn missing_runtime_is_critical() {
        let validator = Validator::new(RuntimeFamily::StandardManaged, "rustc", true, true);
        let errors: Vec<_> = validator.validate(&BenchmarkCase::new("a", "1")).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_critical);
        assert_eq!(errors[0].case, "a");
    }

    #[test]
    fn reports_every_broken_rule() {
        let case = BenchmarkCase::new("a", "1")
            .with_runtime(RuntimeVariant::StandardManaged(ManagedRuntime::host()))
            .with_build_configuration("Debug")
            .with_package("serde");
        let errors: Vec<_> = editor_validator().validate(&case).collect();
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|error| error.is_critical));
        assert!(errors[0].message.contains("targets editor runtimes"));
        assert!(errors[1].message.contains("'Debug'"));
        assert!(errors[2].message.contains("serde"));
    }

    #[test]
    fn explicit_release_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let case = BenchmarkCase::new("a", "1")
            .with_runtime(editor_runtime(dir.path().to_path_buf(), None))
            .with_build_configuration("Release");
        assert_eq!(editor_validator().validate(&case).count(), 0);
    }

    #[test]
    fn missing_paths_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let case = BenchmarkCase::new("a", "1").with_runtime(editor_runtime(
            dir.path().join("Editor"),
            Some(dir.path().join("bcl")),
        ));
        let errors: Vec<_> = editor_validator().validate(&case).collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].message.contains("editor path"));
        assert!(errors[1].message.contains("base library path"));

        let jit = Validator::new(RuntimeFamily::AlternateJit, "cranelift", true, true);
        let case = BenchmarkCase::new("a", "1").with_runtime(RuntimeVariant::AlternateJit(
            JitRuntime {
                name: String::from("alt"),
                custom_path: Some(dir.path().join("rustc")),
                backend: CodegenBackend::Cranelift,
            },
        ));
        let errors: Vec<_> = jit.validate(&case).collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("compiler path"));
    }

    #[test]
    fn validation_is_lazy() {
        let case = BenchmarkCase::new("a", "1").with_build_configuration("Debug");
        let validator = editor_validator();
        let mut errors = validator.validate(&case);
        assert!(errors.next().unwrap().message.contains("runtime"));
        assert!(errors.next().unwrap().message.contains("'Debug'"));
        assert!(errors.next().is_none());
    }
}
