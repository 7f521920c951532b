//! Embedded sandbox frame transport.
//!
//! The preview frame loads the embedded host document (see [`crate::embed`])
//! and connects back over a local WebSocket. Each accepted connection is
//! assigned a fresh [`SandboxId`](crate::channel::SandboxId) and surfaced as
//! a [`SandboxLink`](crate::channel::SandboxLink), ready to be wrapped in a
//! [`CommandChannel`](crate::channel::CommandChannel).

mod server;

pub use server::start_sandbox_server;
