//! Engine-specific JSON-RPC error codes and the `RpcError` type the
//! dispatcher composes into a wire-level `JsonRpcError`.

use crate::envelope::JsonRpcError;

/// Standard JSON-RPC 2.0 reserved codes the engine itself can emit.
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// Engine-specific error codes, `-32050..-32099`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session expired: {0}")]
    SessionExpired(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("peer is not interactive: {0}")]
    NotInteractive(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RpcError {
    /// Maps a variant to its JSON-RPC error code. Engine-specific codes
    /// occupy the `-32050..-32099` implementation-defined range; the rest
    /// reuse the JSON-RPC 2.0 reserved codes.
    pub fn code(&self) -> i64 {
        match self {
            RpcError::SessionNotFound(_) => -32050,
            RpcError::SessionExpired(_) => -32051,
            RpcError::InvalidStateTransition(_) => -32052,
            RpcError::ValidationFailed(_) => -32053,
            RpcError::Timeout(_) => -32054,
            RpcError::AlreadyCancelled(_) => -32055,
            RpcError::NotInteractive(_) => -32056,
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::Internal(_) => INTERNAL_ERROR,
        }
    }
}

impl From<RpcError> for JsonRpcError {
    fn from(err: RpcError) -> Self {
        JsonRpcError {
            code: err.code(),
            message: err.to_string(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_codes_fall_in_reserved_range() {
        let codes = [
            RpcError::SessionNotFound(String::new()).code(),
            RpcError::SessionExpired(String::new()).code(),
            RpcError::InvalidStateTransition(String::new()).code(),
            RpcError::ValidationFailed(String::new()).code(),
            RpcError::Timeout(String::new()).code(),
            RpcError::AlreadyCancelled(String::new()).code(),
            RpcError::NotInteractive(String::new()).code(),
        ];
        for code in codes {
            assert!((-32099..=-32050).contains(&code), "{code} out of range");
        }
    }

    #[test]
    fn method_not_found_uses_standard_code() {
        assert_eq!(RpcError::MethodNotFound("x".into()).code(), -32601);
    }

    #[test]
    fn converts_into_wire_error() {
        let wire: JsonRpcError = RpcError::SessionNotFound("abc".into()).into();
        assert_eq!(wire.code, -32050);
        assert!(wire.message.contains("abc"));
    }
}
