use mcpi_protocol::RpcError;
use mcpi_sessions::SessionError;

/// Errors surfaced by tool registration, execution, and the rendezvous
/// between a suspended handler and the dispatcher.
#[derive(thiserror::Error, Debug, Clone)]
pub enum EngineError {
    #[error("no tool registered under name {0:?}")]
    NoSuchTool(String),

    #[error("tool {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("session {0} was cancelled while waiting for a response")]
    Cancelled(String),
}

impl From<EngineError> for RpcError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NoSuchTool(name) => {
                RpcError::InvalidParams(format!("no tool registered under name {name:?}"))
            }
            EngineError::AlreadyRegistered(name) => {
                RpcError::Internal(format!("tool {name:?} is already registered"))
            }
            EngineError::Session(e) => e.into(),
            EngineError::Cancelled(id) => {
                RpcError::AlreadyCancelled(format!("session {id} was cancelled"))
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
