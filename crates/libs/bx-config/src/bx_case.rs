//! Benchmark case configuration types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Target processor architecture of a generated program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    AnyCpu,
    X86,
    X64,
    Arm,
    Arm64,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::AnyCpu => write!(f, "AnyCpu"),
            Platform::X86 => write!(f, "X86"),
            Platform::X64 => write!(f, "X64"),
            Platform::Arm => write!(f, "Arm"),
            Platform::Arm64 => write!(f, "Arm64"),
        }
    }
}

fn default_iterations() -> u64 {
    1_000
}

/// User-defined benchmark case. Usually loaded from TOML files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxUserCase {
    /// Case name. Recommended to be unique, it is printed on every result line.
    pub name: String,
    /// Name of the runtime this case targets.
    #[serde(default)]
    pub runtime: Option<String>,
    /// Target platform.
    #[serde(default)]
    pub platform: Platform,
    /// Number of timed iterations of `body`.
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    /// Statements run once before timing. Bindings are visible to `body`.
    #[serde(default)]
    pub setup: Option<String>,
    /// Expression measured on every iteration.
    pub body: String,
    /// Build configuration. Only "Release" is accepted by pre-built runtimes.
    #[serde(default)]
    pub build_configuration: Option<String>,
    /// External packages the body depends on.
    #[serde(default)]
    pub packages: Vec<String>,
    /// Library display names (`name, Version=x.y.z`) the body links against.
    #[serde(default)]
    pub references: Vec<String>,
}

/// Internal benchmark case with UUID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BxCase {
    /// Unique case identifier assigned by the system.
    pub id: Uuid,
    /// Case name from user input.
    pub name: String,
    /// Runtime name from user input.
    pub runtime: Option<String>,
    /// Target platform from user input.
    pub platform: Platform,
    /// Iteration count from user input.
    pub iterations: u64,
    /// Setup statements from user input.
    pub setup: Option<String>,
    /// Measured expression from user input.
    pub body: String,
    /// Build configuration from user input.
    pub build_configuration: Option<String>,
    /// Package names from user input.
    pub packages: Vec<String>,
    /// Library display names from user input.
    pub references: Vec<String>,
}

impl BxCase {
    /// Convert user case to internal case with UUID.
    pub fn from_user_case(value: BxUserCase) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: value.name,
            runtime: value.runtime,
            platform: value.platform,
            iterations: value.iterations,
            setup: value.setup,
            body: value.body,
            build_configuration: value.build_configuration,
            packages: value.packages,
            references: value.references,
        }
    }
}
