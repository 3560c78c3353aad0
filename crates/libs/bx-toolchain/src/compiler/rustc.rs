//! `rustc` as a compiler service.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bx_config::CodegenBackend;
use bx_io::{process::ProcessError, runner::{RunExit, Runner}};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    compiler::{
        CompileRequest, CompilerService, Diagnostic, EmitOutcome, OptimizationLevel, Severity,
    },
    prelude::*,
    references::{MissingReferenceContract, ReferenceKind},
};

const DEFAULT_RUSTC: &str = "rustc";
const EDITION: &str = "2021";

/// Compiles a single source file into a binary by running `rustc`.
///
/// Diagnostics are read from rustc's JSON output on stderr.
#[derive(Debug, Clone)]
pub struct Rustc {
    path: PathBuf,
    contract: MissingReferenceContract,
}

impl Default for Rustc {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Rustc {
    /// `path` overrides the `rustc` found on `PATH`.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_RUSTC)),
            contract: MissingReferenceContract::rustc(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Command line for one compile request.
    pub fn args(request: &CompileRequest<'_>) -> Vec<String> {
        let options = request.options;
        let mut args = vec![
            request.source_path.display().to_string(),
            String::from("--edition"),
            String::from(EDITION),
            String::from("--crate-type"),
            String::from("bin"),
            String::from("--crate-name"),
            request.crate_name.to_string(),
            String::from("-o"),
            request.output_path.display().to_string(),
            String::from("--error-format=json"),
        ];

        let codegen = |flag: &str| [String::from("-C"), flag.to_string()];
        match options.optimization {
            OptimizationLevel::Release => {
                args.extend(codegen("opt-level=3"));
                args.extend(codegen("debuginfo=0"));
            }
            OptimizationLevel::Debug => {
                args.extend(codegen("opt-level=0"));
                args.extend(codegen("debuginfo=2"));
            }
        }
        if options.deterministic {
            args.extend(codegen("codegen-units=1"));
            if let Some(dir) = request.source_path.parent() {
                args.push(format!("--remap-path-prefix={}=.", dir.display()));
            }
        }
        if !options.allow_unsafe {
            args.push(String::from("-Funsafe-code"));
        }
        args.extend(codegen(&format!("metadata={}", request.metadata)));

        if let Some(target) = options.platform.target_triple() {
            args.push(String::from("--target"));
            args.push(target);
        }
        if options.backend == Some(CodegenBackend::Cranelift) {
            args.push(String::from("-Z"));
            args.push(format!("codegen-backend={}", CodegenBackend::Cranelift));
        }

        // Framework libraries come from the sysroot; everything else is passed
        // explicitly, once per crate name.
        let mut seen_crates = HashSet::new();
        let mut seen_dirs = HashSet::new();
        for reference in request
            .references
            .iter()
            .filter(|reference| reference.kind == ReferenceKind::Library)
        {
            let crate_name = reference.identity.crate_name();
            if !seen_crates.insert(crate_name.clone()) {
                continue;
            }
            if let Some(dir) = reference.path.parent() {
                if seen_dirs.insert(dir.to_path_buf()) {
                    args.push(String::from("-L"));
                    args.push(format!("dependency={}", dir.display()));
                }
            }
            args.push(String::from("--extern"));
            args.push(format!("{crate_name}={}", reference.path.display()));
        }
        args
    }
}

#[derive(Deserialize)]
struct JsonDiagnostic {
    #[serde(rename = "$message_type")]
    message_type: Option<String>,
    message: String,
    code: Option<JsonCode>,
    level: String,
}

#[derive(Deserialize)]
struct JsonCode {
    code: String,
}

/// Parse one line of rustc's `--error-format=json` output.
fn parse_diagnostic(line: &str) -> Option<Diagnostic> {
    let raw: JsonDiagnostic = serde_json::from_str(line).ok()?;
    if raw
        .message_type
        .as_deref()
        .is_some_and(|kind| kind != "diagnostic")
    {
        return None;
    }
    let severity = match raw.level.as_str() {
        level if level.starts_with("error") => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Note,
    };
    Some(Diagnostic {
        code: raw.code.map(|code| code.code),
        severity,
        message: raw.message,
    })
}

#[async_trait]
impl CompilerService for Rustc {
    async fn compile(&self, request: &CompileRequest<'_>) -> Result<EmitOutcome> {
        let runner = Runner::new(&self.path, Self::args(request)).current_dir(request.intermediate_dir);
        debug!("Compiling: {}", runner.get_full_command());

        let output = runner.output(request.deadline).await?;
        if output.exit == RunExit::TimedOut {
            return Err(Error::Process(ProcessError::Timeout));
        }

        let mut diagnostics = Vec::new();
        for line in output.stderr.iter() {
            match parse_diagnostic(line) {
                Some(diagnostic) => diagnostics.push(diagnostic),
                None if !line.trim().is_empty() => {
                    warn!("rustc: {line}");
                }
                None => {}
            }
        }

        let success = output.exit.success();
        if !success && !diagnostics.iter().any(Diagnostic::is_error) {
            return Err(Error::Compiler(format!(
                "{} exited with {:?} without reporting an error",
                self.path.display(),
                output.exit.code()
            )));
        }
        Ok(EmitOutcome {
            success,
            diagnostics,
        })
    }

    fn missing_reference_contract(&self) -> &MissingReferenceContract {
        &self.contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compiler::CompileOptions,
        references::{LibraryIdentity, Reference},
    };
    use bx_config::Platform;
    use tokio::time::Instant;

    #[test]
    fn parses_json_diagnostics() {
        let line = r#"{"$message_type":"diagnostic","message":"can't find crate for `fastmath`","code":{"code":"E0463","explanation":null},"level":"error","spans":[],"children":[],"rendered":"error[E0463]"}"#;
        let diagnostic = parse_diagnostic(line).unwrap();
        assert_eq!(diagnostic.code.as_deref(), Some("E0463"));
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.message, "can't find crate for `fastmath`");

        let warning = r#"{"$message_type":"diagnostic","message":"unused variable","code":null,"level":"warning"}"#;
        assert_eq!(parse_diagnostic(warning).unwrap().severity, Severity::Warning);

        let artifact = r#"{"$message_type":"artifact","artifact":"x","emit":"link","message":"","level":""}"#;
        assert!(parse_diagnostic(artifact).is_none());
        assert!(parse_diagnostic("error: linking with `cc` failed").is_none());
    }

    #[test]
    fn args_cover_options_and_references() {
        let options = CompileOptions::release(Platform::AnyCpu)
            .with_backend(Some(CodegenBackend::Cranelift));
        let references = vec![
            Reference::framework(LibraryIdentity::new("std"), "/sysroot/libstd.rlib"),
            Reference::library(LibraryIdentity::new("fast-math"), "/deps/libfast_math-1.rlib"),
            Reference::library(LibraryIdentity::new("fast_math"), "/other/libfast_math-2.rlib"),
        ];
        let request = CompileRequest {
            crate_name: "bx_abc",
            source_path: Path::new("/tmp/bx/abc/program.rs"),
            output_path: Path::new("/tmp/bx/abc/bin/abc"),
            intermediate_dir: Path::new("/tmp/bx/abc/obj"),
            options: &options,
            references: &references,
            metadata: "abc",
            deadline: Instant::now(),
        };

        let args = Rustc::args(&request);
        let joined = args.join(" ");
        assert!(joined.starts_with("/tmp/bx/abc/program.rs --edition 2021 --crate-type bin"));
        assert!(joined.contains("-C opt-level=3"));
        assert!(joined.contains("-C codegen-units=1"));
        assert!(joined.contains("-C metadata=abc"));
        assert!(joined.contains("--remap-path-prefix=/tmp/bx/abc=."));
        assert!(joined.contains("-Z codegen-backend=cranelift"));
        assert!(joined.contains("-L dependency=/deps"));
        assert!(joined.contains("--extern fast_math=/deps/libfast_math-1.rlib"));
        assert!(!joined.contains("libfast_math-2"));
        assert!(!joined.contains("libstd"));
        assert!(!joined.contains("--target"));
    }
}
