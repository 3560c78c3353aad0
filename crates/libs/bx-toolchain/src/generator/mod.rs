//! Writing a partition's program and build files to disk.

pub mod editor;
pub mod program;

use std::{fs, path::Path};

use crate::{partition::BuildPartition, results::GenerateResult};

pub use editor::EditorProjectGenerator;
pub use program::ProgramGenerator;

pub trait Generator: Send + Sync {
    /// Write everything the builder needs under `root/<partition id>/`.
    ///
    /// Failures are reported through [`GenerateResult::failure`].
    fn generate(&self, partition: &BuildPartition, root: &Path) -> GenerateResult;
}

/// Replace every `{{KEY}}` in `template` in one pass. Substituted values are
/// never scanned again, and unknown keys are left as they are.
pub(crate) fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut text = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        text.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find("}}").and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                text.push_str(value);
                rest = &after[end + 2..];
            }
            None => {
                text.push_str("{{");
                rest = after;
            }
        }
    }
    text.push_str(rest);
    text
}

pub(crate) fn create_dir(path: &Path) -> Result<(), String> {
    fs::create_dir_all(path)
        .map_err(|err| format!("Cannot create folder {}: {err}", path.display()))
}

pub(crate) fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    fs::write(path, contents).map_err(|err| format!("Cannot write {}: {err}", path.display()))
}

/// Reject partitions whose cases have nothing to run.
pub(crate) fn check_bodies(partition: &BuildPartition) -> Result<(), String> {
    match partition
        .cases()
        .iter()
        .find(|case| case.harness.body.trim().is_empty())
    {
        Some(case) => Err(format!("Case '{}' has an empty body", case.name)),
        None => Ok(()),
    }
}
