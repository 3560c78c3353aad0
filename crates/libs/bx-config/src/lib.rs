//! Benchmark suite configuration for bx.
//!
//! Provides the TOML-facing descriptions of runtimes and benchmark cases, and
//! the conversion into an internal configuration with generated case ids.
//!
//! # Usage
//!
//! ```rust
//! use bx_config::{BxConfig, BxUserConfig};
//!
//! let user_config = BxUserConfig::from_toml(
//!     r#"
//!     [global]
//!     version = "1.0.0"
//!
//!     [[runtimes]]
//!     name = "host"
//!     kind = "standard"
//!
//!     [[cases]]
//!     name = "noop"
//!     runtime = "host"
//!     body = "()"
//!     "#,
//! )
//! .unwrap();
//!
//! let config = BxConfig::from_user_config(user_config).unwrap();
//! assert_eq!(config.cases.len(), 1);
//! ```

pub mod bx_case;
pub mod bx_config;
pub mod bx_runtime;
pub mod error;
pub mod prelude;

pub use bx_case::{BxCase, BxUserCase, Platform};
pub use bx_config::{BxConfig, BxGlobalConfig, BxUserConfig};
pub use bx_runtime::{BxRuntime, BxRuntimeKind, CodegenBackend};
