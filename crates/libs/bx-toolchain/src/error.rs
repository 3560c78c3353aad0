//! Toolchain error types.
//!
//! Build and execution failures are reported as values on
//! [`BuildResult`](crate::results::BuildResult) and
//! [`ExecuteResult`](crate::results::ExecuteResult); this type covers the
//! failures that happen while setting things up.

use std::path::PathBuf;

/// Toolchain errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// Supervised process error.
    #[error(transparent)]
    Process(#[from] bx_io::process::ProcessError),

    /// Partitions must hold at least one case.
    #[error("A build partition needs at least one benchmark case")]
    EmptyPartition,

    /// A case differs from the representative in a build-relevant way.
    #[error("Case '{case}' cannot share a build with '{representative}'")]
    NotBuildEquivalent { case: String, representative: String },

    /// A case has no runtime, so no toolchain can be picked for it.
    #[error("Case '{0}' has no runtime configured")]
    MissingRuntime(String),

    /// The external tool did not report a usable version.
    #[error("Failed to detect the version of {path}: {reason}")]
    VersionProbe { path: PathBuf, reason: String },

    /// A version string did not have four integer components.
    #[error("Invalid tool version '{0}'")]
    InvalidVersion(String),

    /// The runtime requires a path that was not configured.
    #[error("Runtime '{0}' requires a tool path")]
    MissingToolPath(String),

    /// The compiler service failed before producing diagnostics.
    #[error("Compiler service failed: {0}")]
    Compiler(String),
}
