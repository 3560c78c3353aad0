//! Runtime definition types.

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Which kind of target environment a runtime describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BxRuntimeKind {
    /// The host compiler toolchain.
    Standard,
    /// An alternate compiler binary or codegen backend.
    AlternateJit,
    /// An external engine editor driven in batch mode.
    Editor,
}

/// Code generation backend for alternate-jit runtimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodegenBackend {
    #[default]
    Llvm,
    Cranelift,
}

impl fmt::Display for CodegenBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodegenBackend::Llvm => write!(f, "llvm"),
            CodegenBackend::Cranelift => write!(f, "cranelift"),
        }
    }
}

/// User-defined runtime. Usually loaded from TOML files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxRuntime {
    /// Runtime name. Cases refer to runtimes by this name.
    pub name: String,
    /// Runtime kind.
    pub kind: BxRuntimeKind,
    /// Tool path. For `alternate-jit` this is the compiler binary, for `editor`
    /// the editor executable. Unused by `standard`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Codegen backend for `alternate-jit`.
    #[serde(default)]
    pub backend: CodegenBackend,
    /// Ahead-of-time compiler arguments. A non-empty value makes the runtime AOT.
    #[serde(default)]
    pub aot_args: Option<String>,
    /// Custom base library directory for `editor` runtimes.
    #[serde(default)]
    pub base_library_path: Option<PathBuf>,
}
