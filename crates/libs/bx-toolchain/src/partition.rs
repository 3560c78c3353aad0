//! Build partitions: groups of cases that share one generated program.

use std::time::Duration;

use bx_config::Platform;
use sha2::{Digest, Sha256};

use crate::{case::BenchmarkCase, prelude::*, runtime::RuntimeVariant};

/// Length of the hex partition id used for artifact folder names.
const PARTITION_ID_LEN: usize = 16;

/// Build-equivalent benchmark cases built as one artifact.
///
/// The first case is the representative; its runtime, platform and build
/// settings apply to the whole partition. Partitions are immutable.
#[derive(Debug, Clone)]
pub struct BuildPartition {
    cases: Vec<BenchmarkCase>,
    runtime: RuntimeVariant,
    platform: Platform,
    timeout: Duration,
    id: String,
}

impl BuildPartition {
    /// Create a partition. Fails if `cases` is empty, the representative has
    /// no runtime, or any case is not build-equivalent with the representative.
    pub fn new(cases: Vec<BenchmarkCase>, timeout: Duration) -> Result<Self> {
        let representative = cases.first().ok_or(Error::EmptyPartition)?;
        let runtime = representative
            .job
            .runtime
            .clone()
            .ok_or_else(|| Error::MissingRuntime(representative.name.clone()))?;

        let key = representative.build_key();
        if let Some(case) = cases.iter().find(|case| case.build_key() != key) {
            return Err(Error::NotBuildEquivalent {
                case: case.name.clone(),
                representative: representative.name.clone(),
            });
        }

        let platform = representative.job.platform;
        let id = partition_id(&cases, &runtime, platform);
        Ok(Self {
            cases,
            runtime,
            platform,
            timeout,
            id,
        })
    }

    /// Split cases into partitions of build-equivalent cases, keeping the
    /// order in which each build configuration first appears.
    pub fn group(cases: Vec<BenchmarkCase>, timeout: Duration) -> Result<Vec<Self>> {
        let mut groups: Vec<Vec<BenchmarkCase>> = Vec::new();
        for case in cases {
            match groups
                .iter_mut()
                .find(|group| group[0].build_key() == case.build_key())
            {
                Some(group) => group.push(case),
                None => groups.push(vec![case]),
            }
        }
        groups
            .into_iter()
            .map(|group| Self::new(group, timeout))
            .collect()
    }

    pub fn representative(&self) -> &BenchmarkCase {
        &self.cases[0]
    }

    pub fn cases(&self) -> &[BenchmarkCase] {
        &self.cases
    }

    pub fn runtime(&self) -> &RuntimeVariant {
        &self.runtime
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Stable identity of the partition, used to key its artifact folder.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn build_configuration(&self) -> &str {
        self.representative().job.build_configuration()
    }

    pub fn packages(&self) -> &[String] {
        &self.representative().job.packages
    }
}

/// Feed one field, length-prefixed so adjacent fields cannot run together.
fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Hash everything that ends up in the generated program, so equal inputs
/// always land in the same folder and different inputs never share one.
fn partition_id(cases: &[BenchmarkCase], runtime: &RuntimeVariant, platform: Platform) -> String {
    let identity = runtime.identity();
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, identity.moniker.as_bytes());
    hash_field(&mut hasher, identity.name.as_bytes());
    for part in [
        identity.custom_path.map(|p| p.to_string_lossy().into_owned()),
        identity.aot_args.map(str::to_string),
        identity.base_library_path.map(|p| p.to_string_lossy().into_owned()),
    ] {
        hash_field(&mut hasher, part.unwrap_or_default().as_bytes());
    }
    hash_field(&mut hasher, platform.to_string().as_bytes());
    hasher.update((cases.len() as u64).to_le_bytes());
    for case in cases {
        hash_field(&mut hasher, case.name.as_bytes());
        hash_field(&mut hasher, case.harness.setup.as_deref().unwrap_or_default().as_bytes());
        hash_field(&mut hasher, case.harness.body.as_bytes());
        hasher.update(case.harness.iterations.to_le_bytes());
        hash_field(&mut hasher, case.job.build_configuration().as_bytes());
        hasher.update((case.job.packages.len() as u64).to_le_bytes());
        for package in case.job.packages.iter() {
            hash_field(&mut hasher, package.as_bytes());
        }
        hasher.update((case.references.len() as u64).to_le_bytes());
        for reference in case.references.iter() {
            hash_field(&mut hasher, reference.to_string().as_bytes());
        }
    }
    let mut id = format!("{:x}", hasher.finalize());
    id.truncate(PARTITION_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManagedRuntime;

    fn host() -> RuntimeVariant {
        RuntimeVariant::StandardManaged(ManagedRuntime::host())
    }

    #[test]
    fn rejects_empty_partition() {
        let err = BuildPartition::new(Vec::new(), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::EmptyPartition));
    }

    #[test]
    fn rejects_missing_runtime() {
        let err = BuildPartition::new(vec![BenchmarkCase::new("a", "1")], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, Error::MissingRuntime(ref name) if name == "a"));
    }

    #[test]
    fn rejects_mixed_platforms() {
        let cases = vec![
            BenchmarkCase::new("a", "1").with_runtime(host()),
            BenchmarkCase::new("b", "2")
                .with_runtime(host())
                .with_platform(Platform::Arm64),
        ];
        let err = BuildPartition::new(cases, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::NotBuildEquivalent { ref case, .. } if case == "b"));
    }

    #[test]
    fn id_is_stable_and_input_sensitive() {
        let make = |body: &str| {
            BuildPartition::new(
                vec![BenchmarkCase::new("a", body).with_runtime(host())],
                Duration::from_secs(1),
            )
            .unwrap()
        };
        assert_eq!(make("1").id(), make("1").id());
        assert_ne!(make("1").id(), make("2").id());
        assert_eq!(make("1").id().len(), PARTITION_ID_LEN);
    }

    #[test]
    fn id_separates_adjacent_fields() {
        let make = |configuration: &str, packages: &[&str]| {
            let mut case = BenchmarkCase::new("a", "1")
                .with_runtime(host())
                .with_build_configuration(configuration);
            for package in packages {
                case = case.with_package(*package);
            }
            BuildPartition::new(vec![case], Duration::from_secs(1)).unwrap()
        };
        assert_ne!(make("Release", &["ab", "c"]).id(), make("Release", &["a", "bc"]).id());
        assert_ne!(make("Debugfoo", &[]).id(), make("Debug", &["foo"]).id());
    }

    #[test]
    fn explicit_release_matches_default() {
        let cases = vec![
            BenchmarkCase::new("a", "1").with_runtime(host()),
            BenchmarkCase::new("b", "2")
                .with_runtime(host())
                .with_build_configuration("Release"),
        ];
        let partition = BuildPartition::new(cases, Duration::from_secs(1)).unwrap();
        assert_eq!(partition.cases().len(), 2);
        assert_eq!(partition.representative().name, "a");
    }

    #[test]
    fn group_splits_by_build_settings() {
        let cases = vec![
            BenchmarkCase::new("a", "1").with_runtime(host()),
            BenchmarkCase::new("b", "2")
                .with_runtime(host())
                .with_platform(Platform::X64),
            BenchmarkCase::new("c", "3").with_runtime(host()),
        ];
        let partitions = BuildPartition::group(cases, Duration::from_secs(1)).unwrap();
        assert_eq!(partitions.len(), 2);
        let names: Vec<_> = partitions[0].cases().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(partitions[1].platform(), Platform::X64);
    }
}
