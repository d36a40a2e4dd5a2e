//! Session lifecycle management for the interaction engine: the state
//! machine, the pluggable storage abstraction (in-memory + distributed),
//! and the session manager built on top of it.

pub mod distributed;
pub mod error;
pub mod manager;
pub mod state_machine;
pub mod storage;

pub use distributed::{DistributedStorage, ExpirationEvent, RemoteKv};
pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use state_machine::{is_legal_transition, transition_event, Transition};
pub use storage::{ExpiryCallback, InMemoryStorage, SessionStorage};
