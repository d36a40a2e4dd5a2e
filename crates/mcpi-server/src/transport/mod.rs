//! Server-side transports. The reference implementation is newline-delimited
//! JSON-RPC over stdio: it reads requests and writes responses, with an
//! extra writer lock so push notifications (`interaction.prompt`/
//! `interaction.continue`) never interleave with a response mid-line.

pub mod stdio;

pub use stdio::StdioServerTransport;
