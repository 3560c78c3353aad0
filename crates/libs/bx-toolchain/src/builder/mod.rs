//! Turning generated artifacts into an executable.

pub mod compiler;
pub mod editor;

use async_trait::async_trait;

use crate::{
    partition::BuildPartition,
    results::{BuildResult, GenerateResult},
};

pub use compiler::CompilerBuilder;
pub use editor::EditorBuilder;

#[async_trait]
pub trait Builder: Send + Sync {
    /// Build the generated artifacts within the partition's timeout.
    ///
    /// Never fails with `Err`: timeouts, compile errors and compiler faults
    /// are all reported through the returned [`BuildResult`].
    async fn build(&self, generate_result: &GenerateResult, partition: &BuildPartition)
    -> BuildResult;
}
