//! NetPad Proxy - local HTTP proxy between Claude Code and a NetPad server.
//!
//! Claude Code talks to this proxy on localhost. Every request is forwarded to
//! the NetPad MCP API (`<netpadUrl>/api/mcp/...`) with the stored API key
//! attached, and the upstream outcome is folded into a small, stable error
//! taxonomy so client tooling can branch on `error.code`.
//!
//! Layout:
//! - [`config`]: credential store and runtime settings.
//! - [`transport`]: the outbound HTTP adapter.
//! - [`forwarder`]: builds and issues the upstream call for an inbound request.
//! - [`normalize`]: classifies call outcomes into [`NormalizedResult`].
//! - [`translation`]: NetPad tool descriptors -> OpenAI function schema.
//! - [`server`]: the Actix Web route table.

pub mod config;
pub mod error;
pub mod forwarder;
pub mod normalize;
pub mod server;
pub mod translation;
pub mod transport;

pub use config::{
    CredentialKey, CredentialStore, FileCredentialStore, MemoryCredentialStore, ProxyConfig,
};
pub use error::{ProxyError, Result};
pub use forwarder::{Forwarder, InboundRequest, Route};
pub use normalize::{CallOutcome, NormalizedResult};
pub use server::serve;
pub use transport::{HttpTransport, OutboundCall, Transport};
