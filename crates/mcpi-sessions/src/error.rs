use mcpi_protocol::RpcError;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session expired: {0}")]
    Expired(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("session cap reached ({0} sessions)")]
    CapReached(usize),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("session already terminal: {0}")]
    AlreadyTerminal(String),

    #[error("no active prompt for session {0}")]
    NoActivePrompt(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SessionError> for RpcError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => RpcError::SessionNotFound(id),
            SessionError::Expired(id) => RpcError::SessionExpired(id),
            SessionError::InvalidTransition(msg) => RpcError::InvalidStateTransition(msg),
            SessionError::CapReached(n) => {
                RpcError::Internal(format!("session cap reached ({n} sessions)"))
            }
            SessionError::PayloadTooLarge(msg) => RpcError::ValidationFailed(msg),
            SessionError::InvalidKey(msg) => RpcError::ValidationFailed(msg),
            SessionError::AlreadyTerminal(id) => RpcError::AlreadyCancelled(id),
            SessionError::NoActivePrompt(id) => RpcError::InvalidStateTransition(
                format!("no active prompt for session {id}"),
            ),
            SessionError::Internal(msg) => RpcError::Internal(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
