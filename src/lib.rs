//! Component playground core.
//!
//! Turns editable single-file component source into two runnable program
//! variants (client-rendering and server-rendering) and executes the client
//! variant inside an isolated preview frame, streaming back its console,
//! error and lifecycle events.
//!
//! ```text
//! store --edit--> CompilePipeline::compile(file) --> OutputSlot { client, ssr, css }
//!                         |
//!                 ComponentCompiler + TransformSource (injected)
//!
//! CommandChannel::run(scripts) --eval--> [sandbox frame] --cmd_ok/events--> caller
//! ```
//!
//! # Modules
//!
//! | Module     | Purpose                                                  |
//! |------------|----------------------------------------------------------|
//! | `core`     | File categories, logical files, compile identities       |
//! | `compiler` | The multi-stage compilation pipeline                     |
//! | `channel`  | Correlated command/response protocol to the frame        |
//! | `sandbox`  | WebSocket transport pairing frames with channels         |
//! | `config`   | `atelier.toml` options layer                             |
//! | `embed`    | Embedded sandbox host document                           |
//! | `logger`   | `log!`/`debug!` macros with colored prefixes             |
//!
//! The component-format compiler and the strict-superset source transform
//! are injected capabilities: this crate orchestrates them but never parses
//! component source itself.

pub mod channel;
pub mod compiler;
pub mod config;
pub mod core;
pub mod embed;
pub mod logger;
pub mod sandbox;

pub use channel::{
    ChannelError, CommandChannel, EventHandlers, RemoteError, SandboxId, SandboxLink,
    ScriptPayload,
};
pub use compiler::{
    CompileOptions, CompilePipeline, CompileReport, ComponentCompiler, CustomElementMatcher,
    TransformSource,
};
pub use config::{ConfigError, PlaygroundConfig};
pub use crate::core::{CompileIdentity, FileCategory, LogicalFile, OutputSlot};
pub use sandbox::start_sandbox_server;
