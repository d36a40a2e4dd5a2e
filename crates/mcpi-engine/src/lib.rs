//! The tool registry and execution context: the component that bridges a
//! suspended tool handler to the JSON-RPC dispatcher via a rendezvous
//! waiter table.

pub mod cancel;
pub mod context;
pub mod engine;
pub mod error;
pub mod registry;
pub mod waiter;

pub use cancel::{CancelTable, CancelToken};
pub use context::{ExecutionContext, Progress, ProgressHook, PromptHook};
pub use engine::{InteractionEngine, RespondOutcome};
pub use error::{EngineError, Result};
pub use registry::{Tool, ToolHandler, ToolRegistry};
pub use waiter::{WaiterMessage, WaiterTable};
