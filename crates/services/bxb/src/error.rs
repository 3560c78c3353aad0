#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] bx_config::error::Error),

    #[error(transparent)]
    Toolchain(#[from] bx_toolchain::error::Error),

    #[error("Validation found {0} critical error(s)")]
    ValidationFailed(usize),

    #[error("{0} partition(s) failed")]
    PartitionsFailed(usize),
}
