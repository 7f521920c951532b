//! Embedded static resources.
//!
//! The preview frame is seeded with a self-contained host document that
//! implements the frame side of the command protocol: it connects back to
//! the sandbox WebSocket, executes `eval` payloads as module scripts,
//! intercepts link clicks on request, and forwards console and error
//! traffic.
//!
//! # Usage
//!
//! ```ignore
//! use atelier::embed::{SANDBOX_HOST_HTML, SandboxHostVars};
//!
//! let html = SANDBOX_HOST_HTML.render(&SandboxHostVars { ws_port: 35931 });
//! ```

mod template;

pub use template::{Template, TemplateVars};

/// Variables for sandbox host.html.
pub struct SandboxHostVars {
    /// Port of the sandbox WebSocket server the frame connects back to.
    pub ws_port: u16,
}

impl TemplateVars for SandboxHostVars {
    fn apply(&self, content: &str) -> String {
        content.replace("__ATELIER_WS_PORT__", &self.ws_port.to_string())
    }
}

/// Sandbox host document with WebSocket port injection.
pub const SANDBOX_HOST_HTML: Template<SandboxHostVars> =
    Template::new(include_str!("sandbox/host.html"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_document_port_injection() {
        let html = SANDBOX_HOST_HTML.render(&SandboxHostVars { ws_port: 35931 });
        assert!(html.contains("ws://127.0.0.1:35931"));
        assert!(!html.contains("__ATELIER_WS_PORT__"));
    }

    #[test]
    fn test_host_document_speaks_the_protocol() {
        let html = SANDBOX_HOST_HTML.content();
        for action in [
            "cmd_ok",
            "cmd_error",
            "console",
            "console_group",
            "console_group_collapsed",
            "console_group_end",
            "unhandledrejection",
            "catch_clicks",
        ] {
            assert!(html.contains(action), "host document is missing {action}");
        }
    }
}
