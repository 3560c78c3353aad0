//! Toolchains that turn benchmark cases into isolated, measurable processes.
//!
//! A [`Toolchain`] binds four parts to one [`RuntimeFamily`]:
//!
//! - a [`Generator`] writing a program for a [`BuildPartition`] under a
//!   per-partition folder,
//! - a [`Builder`] compiling it within the partition timeout, retrying once
//!   when libraries were missing but can be located,
//! - an [`Executor`] running the result as a child process that is killed at
//!   the timeout,
//! - a [`Validator`] rejecting cases the toolchain cannot handle before any
//!   of the above runs.
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::{path::Path, time::Duration};
//!
//! use bx_toolchain::{
//!     BenchmarkCase, BuildPartition, ManagedRuntime, RuntimeVariant, ToolchainRegistry,
//! };
//!
//! # async fn example() -> bx_toolchain::prelude::Result<()> {
//! let runtime = RuntimeVariant::StandardManaged(ManagedRuntime::host());
//! let case = BenchmarkCase::new("sum", "(0..1000u64).sum::<u64>()").with_runtime(runtime.clone());
//! let partition = BuildPartition::new(vec![case], Duration::from_secs(30))?;
//!
//! let registry = ToolchainRegistry::default();
//! let toolchain = registry.get_or_create(&runtime);
//! let outcome = toolchain.run(&partition, Path::new("target/bx"), None).await;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod artifacts;
pub mod builder;
pub mod case;
pub mod compiler;
pub mod error;
pub mod executor;
pub mod generator;
pub mod partition;
pub mod prelude;
pub mod references;
pub mod registry;
pub mod results;
pub mod runtime;
pub mod toolchain;
pub mod validator;
pub mod version;

pub use artifacts::ArtifactsPaths;
pub use builder::{Builder, CompilerBuilder, EditorBuilder};
pub use case::{BenchmarkCase, CaseHarness, Job};
pub use compiler::{CompilerService, rustc::Rustc};
pub use executor::{Executor, ProcessExecutor};
pub use generator::{EditorProjectGenerator, Generator, ProgramGenerator};
pub use partition::BuildPartition;
pub use references::{LibraryIdentity, Reference, ReferenceResolver, SearchPathResolver};
pub use registry::ToolchainRegistry;
pub use results::{
    BuildFailure, BuildFailureKind, BuildResult, ExecuteFailure, ExecuteResult, GenerateResult,
    ResultLine,
};
pub use runtime::{EditorRuntime, JitRuntime, ManagedRuntime, RuntimeFamily, RuntimeVariant};
pub use toolchain::{PipelineOutcome, Toolchain};
pub use validator::{ValidationError, Validator};
pub use version::ToolVersion;
