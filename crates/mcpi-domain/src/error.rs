/// Shared error type used across all interaction-engine crates.
///
/// Crate-boundary errors (`mcpi_protocol::RpcError`, `mcpi_sessions::SessionError`,
/// `mcpi_engine::EngineError`) convert into this type at their own boundary;
/// this variant set only covers concerns ambient to every crate: I/O,
/// serialization, configuration, and an escape hatch for the rest.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
