//! Wire types for the interaction engine: JSON-RPC 2.0 envelopes, the
//! `initialize` handshake, prompt/response value types, session snapshots,
//! and the engine's error code taxonomy.

pub mod envelope;
pub mod error;
pub mod prompt;
pub mod session;

pub use envelope::{
    ClientInfo, InitializeParams, InitializeResult, InteractiveCapabilities, InteractiveFeatures,
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ServerInfo,
    PROTOCOL_VERSION,
};
pub use error::{RpcError, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR};
pub use prompt::{ChoiceFields, ChoiceOption, Prompt, PromptFields, Response, Validation};
pub use session::{SessionMetadata, SessionState, SessionSummary, SessionValue, Turn};
