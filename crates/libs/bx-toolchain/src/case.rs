//! Benchmark cases and their build-relevant job settings.

use bx_config::{BxCase, Platform};
use uuid::Uuid;

use crate::{references::LibraryIdentity, runtime::RuntimeVariant};

/// The only build configuration pre-built runtimes accept.
pub const RELEASE_CONFIGURATION: &str = "Release";

const DEFAULT_ITERATIONS: u64 = 1_000;

/// The code a generated program runs for one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseHarness {
    /// Statements run once before timing.
    pub setup: Option<String>,
    /// Expression evaluated on every timed iteration.
    pub body: String,
    pub iterations: u64,
}

/// Settings that decide how a case is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Job {
    pub runtime: Option<RuntimeVariant>,
    pub platform: Platform,
    pub build_configuration: Option<String>,
    /// External packages that must be resolved before building.
    pub packages: Vec<String>,
}

impl Job {
    pub fn build_configuration(&self) -> &str {
        self.build_configuration
            .as_deref()
            .unwrap_or(RELEASE_CONFIGURATION)
    }

    /// Whether the job asks for something other than the release configuration.
    pub fn has_custom_build_configuration(&self) -> bool {
        self.build_configuration() != RELEASE_CONFIGURATION
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchmarkCase {
    pub id: Uuid,
    pub name: String,
    pub harness: CaseHarness,
    pub job: Job,
    /// Libraries the harness links against.
    pub references: Vec<LibraryIdentity>,
}

impl BenchmarkCase {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            harness: CaseHarness {
                setup: None,
                body: body.into(),
                iterations: DEFAULT_ITERATIONS,
            },
            job: Job::default(),
            references: Vec::new(),
        }
    }

    /// Convert a configured case. `runtime` is the already resolved runtime
    /// the case names, if any.
    pub fn from_config(case: &BxCase, runtime: Option<RuntimeVariant>) -> Self {
        Self {
            id: case.id,
            name: case.name.clone(),
            harness: CaseHarness {
                setup: case.setup.clone(),
                body: case.body.clone(),
                iterations: case.iterations,
            },
            job: Job {
                runtime,
                platform: case.platform,
                build_configuration: case.build_configuration.clone(),
                packages: case.packages.clone(),
            },
            references: case
                .references
                .iter()
                .map(|display_name| LibraryIdentity::parse(display_name))
                .collect(),
        }
    }

    pub fn with_runtime(mut self, runtime: RuntimeVariant) -> Self {
        self.job.runtime = Some(runtime);
        self
    }

    pub fn with_setup(mut self, setup: impl Into<String>) -> Self {
        self.harness.setup = Some(setup.into());
        self
    }

    pub fn with_iterations(mut self, iterations: u64) -> Self {
        self.harness.iterations = iterations;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.job.platform = platform;
        self
    }

    pub fn with_build_configuration(mut self, configuration: impl Into<String>) -> Self {
        self.job.build_configuration = Some(configuration.into());
        self
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.job.packages.push(package.into());
        self
    }

    pub fn with_reference(mut self, reference: LibraryIdentity) -> Self {
        self.references.push(reference);
        self
    }

    /// Two cases can share one generated program when these keys match.
    pub(crate) fn build_key(&self) -> BuildKey<'_> {
        BuildKey {
            runtime: self.job.runtime.as_ref(),
            platform: self.job.platform,
            build_configuration: self.job.build_configuration(),
            packages: &self.job.packages,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
pub(crate) struct BuildKey<'a> {
    runtime: Option<&'a RuntimeVariant>,
    platform: Platform,
    build_configuration: &'a str,
    packages: &'a [String],
}
