//! Outcomes of the generate, build and execute phases.
//!
//! None of these phases return `Err` for a failed build or run. The failure is
//! part of the value so callers can report it next to the captured output.

use std::{fmt, time::Duration};

use crate::artifacts::ArtifactsPaths;

/// Prefix of the structured lines a generated program prints per case.
pub const RESULT_LINE_PREFIX: &str = "// bx-result";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateResult {
    pub artifacts_paths: ArtifactsPaths,
    pub failure: Option<String>,
}

impl GenerateResult {
    pub fn success(artifacts_paths: ArtifactsPaths) -> Self {
        Self {
            artifacts_paths,
            failure: None,
        }
    }

    pub fn failure(artifacts_paths: ArtifactsPaths, reason: impl Into<String>) -> Self {
        Self {
            artifacts_paths,
            failure: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildFailureKind {
    /// Nothing was built because generation had already failed.
    Generation,
    /// Compile errors, including a failed retry.
    Unrecoverable,
    Timeout,
    /// The compiler service itself broke.
    Fault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFailure {
    pub kind: BuildFailureKind,
    pub message: String,
}

impl fmt::Display for BuildFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub generate_result: GenerateResult,
    pub failure: Option<BuildFailure>,
}

impl BuildResult {
    pub fn success(generate_result: GenerateResult) -> Self {
        Self {
            generate_result,
            failure: None,
        }
    }

    pub fn failure(
        generate_result: GenerateResult,
        kind: BuildFailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            generate_result,
            failure: Some(BuildFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn timeout(generate_result: GenerateResult, timeout: Duration) -> Self {
        Self::failure(
            generate_result,
            BuildFailureKind::Timeout,
            format!("The configured timeout {timeout:?} was reached!"),
        )
    }

    /// Build result for a generation that did not succeed.
    pub fn not_generated(generate_result: GenerateResult) -> Self {
        let message = generate_result
            .failure
            .clone()
            .unwrap_or_else(|| String::from("Generation failed"));
        Self::failure(generate_result, BuildFailureKind::Generation, message)
    }

    pub fn is_build_success(&self) -> bool {
        self.failure.is_none() && self.generate_result.is_success()
    }

    pub fn artifacts_paths(&self) -> &ArtifactsPaths {
        &self.generate_result.artifacts_paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteFailure {
    /// The build did not produce an executable.
    NotBuilt,
    Launch(String),
    Timeout(Duration),
    /// Non-zero exit or killed by a signal.
    Faulted(Option<i32>),
}

impl fmt::Display for ExecuteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteFailure::NotBuilt => write!(f, "The benchmark program was not built"),
            ExecuteFailure::Launch(reason) => write!(f, "Failed to launch the program: {reason}"),
            ExecuteFailure::Timeout(timeout) => {
                write!(f, "The configured timeout {timeout:?} was reached!")
            }
            ExecuteFailure::Faulted(Some(code)) => write!(f, "Program exited with code {code}"),
            ExecuteFailure::Faulted(None) => write!(f, "Program was terminated by a signal"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub elapsed: Duration,
    pub failure: Option<ExecuteFailure>,
}

impl ExecuteResult {
    pub fn failed(failure: ExecuteFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Structured result lines found in the program's stdout.
    pub fn result_lines(&self) -> Vec<ResultLine> {
        self.stdout
            .iter()
            .filter_map(|line| ResultLine::parse(line))
            .collect()
    }
}

/// One measurement reported by a generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultLine {
    pub case: String,
    pub iterations: u64,
    pub elapsed: Duration,
}

impl ResultLine {
    /// Parse `// bx-result <case> <iterations> <nanos>`. Case names may contain
    /// spaces; the two numbers are always the last two fields.
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix(RESULT_LINE_PREFIX)?;
        let mut fields = rest.trim().rsplitn(3, ' ');
        let nanos: u64 = fields.next()?.parse().ok()?;
        let iterations: u64 = fields.next()?.parse().ok()?;
        let case = fields.next()?.trim();
        if case.is_empty() {
            return None;
        }
        Some(Self {
            case: case.to_string(),
            iterations,
            elapsed: Duration::from_nanos(nanos),
        })
    }

    pub fn nanos_per_iteration(&self) -> f64 {
        self.elapsed.as_nanos() as f64 / self.iterations.max(1) as f64
    }
}

impl fmt::Display for ResultLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} iterations in {:?} ({:.1} ns/iter)",
            self.case,
            self.iterations,
            self.elapsed,
            self.nanos_per_iteration()
        )
    }
}
