//! Target runtime descriptions.
//!
//! A [`RuntimeVariant`] says where a generated program will run: the host
//! compiler toolchain, an alternate compiler/codegen backend, or an external
//! engine editor that builds a player executable in batch mode.

use std::{
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    time::Duration,
};

use bx_config::{BxRuntime, BxRuntimeKind, CodegenBackend};
use bx_io::runner::Runner;
use tokio::time::Instant;
use tracing::info;

use crate::{prelude::*, version::ToolVersion};

/// Flags every batch-mode editor invocation starts with.
pub const EDITOR_BASE_ARGS: &[&str] = &[
    "-batchmode",
    "-nographics",
    "-quit",
    "-accept-apiupdate",
    "-ignorecompilererrors",
    "-releaseCodeOptimization",
    "-silent-crashes",
    "-disableManagedDebugger",
    "-enableIncompatibleAssetDowngrade",
    "-force-free",
    "-vcsMode",
    "Visible Meta Files",
    "-buildTarget",
    "Standalone",
];

const VERSION_QUERY_ARG: &str = "-version";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime families. One toolchain targets exactly one family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFamily {
    StandardManaged,
    AlternateJit,
    EditorAutomated,
}

impl fmt::Display for RuntimeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeFamily::StandardManaged => write!(f, "standard"),
            RuntimeFamily::AlternateJit => write!(f, "alternate-jit"),
            RuntimeFamily::EditorAutomated => write!(f, "editor"),
        }
    }
}

/// The host compiler toolchain.
#[derive(Debug, Clone)]
pub struct ManagedRuntime {
    pub name: String,
}

impl ManagedRuntime {
    pub fn host() -> Self {
        Self {
            name: String::from("Host rustc"),
        }
    }
}

/// An alternate compiler binary and/or codegen backend.
#[derive(Debug, Clone)]
pub struct JitRuntime {
    pub name: String,
    /// Compiler binary used instead of the one on `PATH`.
    pub custom_path: Option<PathBuf>,
    pub backend: CodegenBackend,
}

/// An engine editor driven in batch mode.
///
/// The editor version is detected once, when the runtime is created, and is
/// not part of the runtime identity.
#[derive(Debug, Clone)]
pub struct EditorRuntime {
    pub name: String,
    /// Editor executable.
    pub tool_path: PathBuf,
    /// Ahead-of-time compiler arguments.
    pub aot_args: Option<String>,
    /// Custom base library directory handed to the editor.
    pub base_library_path: Option<PathBuf>,
    version: ToolVersion,
}

impl EditorRuntime {
    /// Create the runtime by asking the editor for its version.
    ///
    /// The editor runs once with the batch flags plus `-version`, from its own
    /// directory, with stdout and stderr read line by line.
    pub async fn detect(
        name: impl Into<String>,
        tool_path: impl Into<PathBuf>,
        aot_args: Option<String>,
        base_library_path: Option<PathBuf>,
    ) -> Result<Self> {
        let tool_path = tool_path.into();
        let mut args: Vec<&str> = EDITOR_BASE_ARGS.to_vec();
        args.push(VERSION_QUERY_ARG);

        let mut runner = Runner::new(&tool_path, args);
        if let Some(dir) = tool_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            runner = runner.current_dir(dir);
        }
        info!("Detecting editor version: {}", runner.get_full_command());

        let output = runner
            .output(Instant::now() + VERSION_PROBE_TIMEOUT)
            .await
            .map_err(|err| Error::VersionProbe {
                path: tool_path.clone(),
                reason: err.to_string(),
            })?;
        let version =
            ToolVersion::from_output(&output.lines).map_err(|err| Error::VersionProbe {
                path: tool_path.clone(),
                reason: err.to_string(),
            })?;
        info!("Detected editor version {version} at {}", tool_path.display());

        Ok(Self::with_version(
            name,
            tool_path,
            aot_args,
            base_library_path,
            version,
        ))
    }

    /// Create the runtime for an editor whose version is already known.
    pub fn with_version(
        name: impl Into<String>,
        tool_path: impl Into<PathBuf>,
        aot_args: Option<String>,
        base_library_path: Option<PathBuf>,
        version: ToolVersion,
    ) -> Self {
        Self {
            name: name.into(),
            tool_path: tool_path.into(),
            aot_args,
            base_library_path,
            version,
        }
    }

    pub fn version(&self) -> ToolVersion {
        self.version
    }

    pub fn is_aot(&self) -> bool {
        self.aot_args.as_deref().is_some_and(|args| !args.is_empty())
    }
}

/// A target execution environment.
#[derive(Debug, Clone)]
pub enum RuntimeVariant {
    StandardManaged(ManagedRuntime),
    AlternateJit(JitRuntime),
    EditorAutomated(EditorRuntime),
}

/// The fields that decide whether two runtimes are the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeIdentity<'a> {
    pub moniker: &'a str,
    pub name: &'a str,
    pub custom_path: Option<&'a Path>,
    pub aot_args: Option<&'a str>,
    pub base_library_path: Option<&'a Path>,
}

impl RuntimeVariant {
    /// Build a runtime from its configuration. Editor runtimes are probed.
    pub async fn from_config(runtime: &BxRuntime) -> Result<Self> {
        Ok(match runtime.kind {
            BxRuntimeKind::Standard => RuntimeVariant::StandardManaged(ManagedRuntime {
                name: runtime.name.clone(),
            }),
            BxRuntimeKind::AlternateJit => RuntimeVariant::AlternateJit(JitRuntime {
                name: runtime.name.clone(),
                custom_path: runtime.path.clone(),
                backend: runtime.backend,
            }),
            BxRuntimeKind::Editor => {
                let tool_path = runtime
                    .path
                    .clone()
                    .ok_or_else(|| Error::MissingToolPath(runtime.name.clone()))?;
                RuntimeVariant::EditorAutomated(
                    EditorRuntime::detect(
                        runtime.name.clone(),
                        tool_path,
                        runtime.aot_args.clone(),
                        runtime.base_library_path.clone(),
                    )
                    .await?,
                )
            }
        })
    }

    pub fn family(&self) -> RuntimeFamily {
        match self {
            RuntimeVariant::StandardManaged(_) => RuntimeFamily::StandardManaged,
            RuntimeVariant::AlternateJit(_) => RuntimeFamily::AlternateJit,
            RuntimeVariant::EditorAutomated(_) => RuntimeFamily::EditorAutomated,
        }
    }

    /// Short machine-readable name of the runtime kind.
    pub fn moniker(&self) -> &'static str {
        match self {
            RuntimeVariant::StandardManaged(_) => "rustc",
            RuntimeVariant::AlternateJit(jit) => match jit.backend {
                CodegenBackend::Llvm => "rustc-llvm",
                CodegenBackend::Cranelift => "rustc-cranelift",
            },
            RuntimeVariant::EditorAutomated(_) => "editor",
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        match self {
            RuntimeVariant::StandardManaged(managed) => &managed.name,
            RuntimeVariant::AlternateJit(jit) => &jit.name,
            RuntimeVariant::EditorAutomated(editor) => &editor.name,
        }
    }

    pub fn is_aot(&self) -> bool {
        match self {
            RuntimeVariant::EditorAutomated(editor) => editor.is_aot(),
            _ => false,
        }
    }

    /// The tool this runtime is bound to, if it is not the default one.
    pub fn custom_path(&self) -> Option<&Path> {
        match self {
            RuntimeVariant::StandardManaged(_) => None,
            RuntimeVariant::AlternateJit(jit) => jit.custom_path.as_deref(),
            RuntimeVariant::EditorAutomated(editor) => Some(&editor.tool_path),
        }
    }

    pub fn aot_args(&self) -> Option<&str> {
        match self {
            RuntimeVariant::EditorAutomated(editor) => editor.aot_args.as_deref(),
            _ => None,
        }
    }

    pub fn base_library_path(&self) -> Option<&Path> {
        match self {
            RuntimeVariant::EditorAutomated(editor) => editor.base_library_path.as_deref(),
            _ => None,
        }
    }

    pub fn codegen_backend(&self) -> Option<CodegenBackend> {
        match self {
            RuntimeVariant::AlternateJit(jit) => Some(jit.backend),
            _ => None,
        }
    }

    pub fn identity(&self) -> RuntimeIdentity<'_> {
        RuntimeIdentity {
            moniker: self.moniker(),
            name: self.name(),
            custom_path: self.custom_path(),
            aot_args: self.aot_args(),
            base_library_path: self.base_library_path(),
        }
    }
}

impl PartialEq for RuntimeVariant {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for RuntimeVariant {}

impl Hash for RuntimeVariant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for RuntimeVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeVariant::EditorAutomated(editor) => {
                write!(f, "{} ({} {})", editor.name, self.moniker(), editor.version)
            }
            _ => write!(f, "{} ({})", self.name(), self.moniker()),
        }
    }
}
