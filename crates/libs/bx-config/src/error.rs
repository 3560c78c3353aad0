//! Configuration error types.

/// Configuration errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    #[error(transparent)]
    IO(#[from] std::io::Error),

    /// TOML deserialization failed.
    #[error(transparent)]
    Deserialization(#[from] toml::de::Error),

    /// TOML serialization failed.
    #[error(transparent)]
    Serialization(#[from] toml::ser::Error),

    /// A case names a runtime that is not declared.
    #[error("Case '{case}' uses runtime '{runtime}' which is not declared in [[runtimes]]")]
    UnknownRuntime { case: String, runtime: String },

    /// Two runtimes share a name.
    #[error("Runtime '{0}' is declared more than once")]
    DuplicateRuntime(String),
}
