//! The compiler service the builder drives.
//!
//! [`CompilerService`] is the seam between the build algorithm and whatever
//! turns source text into an executable. The production implementation is
//! [`rustc::Rustc`]; tests plug in scripted fakes.

pub mod rustc;

use std::path::Path;

use async_trait::async_trait;
use bx_config::{CodegenBackend, Platform};
use tokio::time::Instant;

use crate::{prelude::*, references::{MissingReferenceContract, Reference}};

/// Target platforms the compiler service understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompilerPlatform {
    AnyCpu,
    X86,
    X64,
    Arm,
    Arm64,
}

impl From<Platform> for CompilerPlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::AnyCpu => CompilerPlatform::AnyCpu,
            Platform::X86 => CompilerPlatform::X86,
            Platform::X64 => CompilerPlatform::X64,
            Platform::Arm => CompilerPlatform::Arm,
            Platform::Arm64 => CompilerPlatform::Arm64,
        }
    }
}

impl CompilerPlatform {
    /// Target triple for this platform on the host operating system.
    /// `AnyCpu` compiles for the host.
    pub fn target_triple(&self) -> Option<String> {
        let arch = match self {
            CompilerPlatform::AnyCpu => return None,
            CompilerPlatform::X86 => "i686",
            CompilerPlatform::X64 => "x86_64",
            CompilerPlatform::Arm => "armv7",
            CompilerPlatform::Arm64 => "aarch64",
        };
        let os = match (std::env::consts::OS, self) {
            ("windows", _) => "pc-windows-msvc",
            ("macos", _) => "apple-darwin",
            ("linux", CompilerPlatform::Arm) => "unknown-linux-gnueabihf",
            _ => "unknown-linux-gnu",
        };
        Some(format!("{arch}-{os}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationLevel {
    Debug,
    Release,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub optimization: OptimizationLevel,
    pub allow_unsafe: bool,
    /// Same input, same output bytes.
    pub deterministic: bool,
    pub platform: CompilerPlatform,
    pub backend: Option<CodegenBackend>,
}

impl CompileOptions {
    pub fn release(platform: Platform) -> Self {
        Self {
            optimization: OptimizationLevel::Release,
            allow_unsafe: true,
            deterministic: true,
            platform: platform.into(),
            backend: None,
        }
    }

    pub fn with_backend(mut self, backend: Option<CodegenBackend>) -> Self {
        self.backend = backend;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CompileRequest<'a> {
    pub crate_name: &'a str,
    /// Program source file, checked to exist before the first attempt.
    pub source_path: &'a Path,
    pub output_path: &'a Path,
    pub intermediate_dir: &'a Path,
    pub options: &'a CompileOptions,
    pub references: &'a [Reference],
    /// Seed for symbol mangling, so artifacts of different partitions differ.
    pub metadata: &'a str,
    pub deadline: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Note,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub code: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(str::to_string),
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Result of one compile-and-emit attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmitOutcome {
    pub success: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl EmitOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// All error diagnostics, one per line.
    pub fn error_message(&self) -> String {
        self.errors()
            .map(|d| match &d.code {
                Some(code) => format!("error[{code}]: {}", d.message),
                None => format!("error: {}", d.message),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
pub trait CompilerService: Send + Sync {
    /// Compile and emit an executable. `Err` means the service itself failed;
    /// compile errors come back as an unsuccessful [`EmitOutcome`].
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<EmitOutcome>;

    /// How this compiler reports a missing library.
    fn missing_reference_contract(&self) -> &MissingReferenceContract;
}
