//! Sandbox Command Protocol
//!
//! Defines the JSON message format exchanged with an embedded preview
//! frame. Outbound commands carry a correlation id that the frame echoes in
//! its `cmd_ok`/`cmd_error` reply; every other inbound action is an
//! unsolicited event.
//!
//! # Inbound actions
//!
//! - `cmd_ok` / `cmd_error`: correlated replies
//! - `fetch_progress`: dependency fetch countdown
//! - `error` / `unhandledrejection`: runtime failures
//! - `console`, `console_group`, `console_group_collapsed`,
//!   `console_group_end`: console traffic

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of one embedded preview frame connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SandboxId(pub u64);

impl fmt::Display for SandboxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

/// Command posted to the sandbox frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SandboxCommand {
    /// Execute script modules inside the frame
    Eval { cmd_id: u64, args: EvalArgs },
    /// Intercept link clicks inside the frame
    CatchClicks { cmd_id: u64, args: EmptyArgs },
}

impl SandboxCommand {
    pub fn cmd_id(&self) -> u64 {
        match self {
            Self::Eval { cmd_id, .. } | Self::CatchClicks { cmd_id, .. } => *cmd_id,
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"action":"eval"}"#.to_string())
    }
}

/// Payload of an `eval` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalArgs {
    pub script: Vec<String>,
}

/// Empty command payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyArgs {}

/// Payload of a `fetch_progress` event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ProgressArgs {
    /// Modules still being fetched
    pub remaining: u64,
}

/// Message received from the sandbox frame.
///
/// Closed over the recognized actions: anything else fails to parse and is
/// dropped by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SandboxMessage {
    /// Reply: the correlated command succeeded
    CmdOk {
        cmd_id: u64,
        #[serde(default)]
        args: Value,
    },
    /// Reply: the correlated command failed in the frame
    CmdError {
        cmd_id: u64,
        message: String,
        #[serde(default)]
        stack: String,
    },
    /// Dependency fetch countdown
    FetchProgress { args: ProgressArgs },
    /// Uncaught runtime error
    Error {
        #[serde(flatten)]
        event: Value,
    },
    /// Unhandled promise rejection
    #[serde(rename = "unhandledrejection")]
    UnhandledRejection {
        #[serde(flatten)]
        event: Value,
    },
    /// Console log entry
    Console {
        #[serde(flatten)]
        event: Value,
    },
    /// Console group opened
    ConsoleGroup {
        #[serde(flatten)]
        event: Value,
    },
    /// Console group opened collapsed
    ConsoleGroupCollapsed {
        #[serde(flatten)]
        event: Value,
    },
    /// Console group closed
    ConsoleGroupEnd,
}

impl SandboxMessage {
    /// Parse from JSON string
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}

/// Raw inbound message with its origin attached by the transport.
///
/// The dispatcher drops envelopes whose source is not the channel's own
/// frame before any parsing happens.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub source: SandboxId,
    pub payload: Value,
}
