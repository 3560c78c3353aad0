//! A loaded benchmark suite: resolved runtimes, cases and shared toolchains.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use bx_config::BxConfig;
use bx_toolchain::{
    BenchmarkCase, BuildPartition, RuntimeVariant, ToolchainRegistry, ValidationError,
};
use tracing::info;

use crate::prelude::*;

const DEFAULT_ARTIFACTS_PATH: &str = "bx-artifacts";

/// Command-line overrides of the configured globals.
#[derive(Debug, Clone, Default)]
pub struct SuiteOverrides {
    pub artifacts: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

pub struct Suite {
    pub config: BxConfig,
    pub artifacts: PathBuf,
    pub timeout: Duration,
    pub runtimes: HashMap<String, RuntimeVariant>,
    pub cases: Vec<BenchmarkCase>,
    pub registry: ToolchainRegistry,
}

impl Suite {
    /// Resolve every configured runtime, probing editors for their version,
    /// and convert the configured cases.
    pub async fn create(config: BxConfig, overrides: SuiteOverrides) -> Result<Self> {
        let mut runtimes = HashMap::new();
        for runtime in config.runtimes.iter() {
            let variant = RuntimeVariant::from_config(runtime).await?;
            info!("Runtime {}: {variant}", runtime.name);
            runtimes.insert(runtime.name.clone(), variant);
        }

        let cases = config
            .cases
            .iter()
            .map(|case| {
                let runtime = case
                    .runtime
                    .as_ref()
                    .and_then(|name| runtimes.get(name))
                    .cloned();
                BenchmarkCase::from_config(case, runtime)
            })
            .collect();

        let artifacts = overrides
            .artifacts
            .or_else(|| config.global.artifacts_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_PATH));
        let timeout = Duration::from_secs(
            overrides
                .timeout_secs
                .unwrap_or(config.global.timeout_secs),
        );
        let registry = ToolchainRegistry::new(config.global.library_paths.clone());

        Ok(Self {
            config,
            artifacts,
            timeout,
            runtimes,
            cases,
            registry,
        })
    }

    /// Every validation error of every case, from the toolchain its runtime
    /// selects.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        self.cases
            .iter()
            .flat_map(|case| {
                let toolchain = self.registry.for_runtime(case.job.runtime.as_ref());
                toolchain.validate(case).collect::<Vec<_>>()
            })
            .collect()
    }

    /// Cases grouped into partitions that can share one build. Cases without a
    /// runtime are left out; validation reports them.
    pub fn partitions(&self) -> Result<Vec<BuildPartition>> {
        let cases: Vec<BenchmarkCase> = self
            .cases
            .iter()
            .filter(|case| case.job.runtime.is_some())
            .cloned()
            .collect();
        Ok(BuildPartition::group(cases, self.timeout)?)
    }
}

#[cfg(test)]
mod tests {
    use bx_config::BxUserConfig;

    use super::*;

    const CONFIG: &str = r#"
        [global]
        version = "1.0.0"
        artifacts_path = "target/bx"
        timeout_secs = 30

        [[runtimes]]
        name = "host"
        kind = "standard"

        [[runtimes]]
        name = "cranelift"
        kind = "alternate-jit"
        backend = "cranelift"

        [[cases]]
        name = "a"
        runtime = "host"
        body = "1"

        [[cases]]
        name = "b"
        runtime = "cranelift"
        body = "2"

        [[cases]]
        name = "c"
        runtime = "host"
        body = "3"

        [[cases]]
        name = "orphan"
        body = "4"
    "#;

    fn config() -> BxConfig {
        BxConfig::from_user_config(BxUserConfig::from_toml(CONFIG).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn groups_cases_by_runtime() {
        let suite = Suite::create(config(), SuiteOverrides::default()).await.unwrap();
        assert_eq!(suite.artifacts, PathBuf::from("target/bx"));
        assert_eq!(suite.timeout, Duration::from_secs(30));

        let partitions = suite.partitions().unwrap();
        assert_eq!(partitions.len(), 2);
        let names: Vec<_> = partitions[0].cases().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(partitions[1].runtime().moniker(), "rustc-cranelift");
    }

    #[tokio::test]
    async fn overrides_win() {
        let overrides = SuiteOverrides {
            artifacts: Some(PathBuf::from("/tmp/elsewhere")),
            timeout_secs: Some(5),
        };
        let suite = Suite::create(config(), overrides).await.unwrap();
        assert_eq!(suite.artifacts, PathBuf::from("/tmp/elsewhere"));
        assert_eq!(suite.timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn case_without_runtime_fails_validation() {
        let suite = Suite::create(config(), SuiteOverrides::default()).await.unwrap();
        let errors = suite.validation_errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].case, "orphan");
        assert!(errors[0].is_critical);
    }
}
