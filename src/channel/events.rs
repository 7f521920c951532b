//! Caller-supplied handlers for unsolicited sandbox events.

use serde_json::Value;

type EventFn = Box<dyn Fn(Value) + Send + Sync>;

/// The fixed set of callbacks a channel owner supplies.
///
/// Handlers observe frame traffic; they hold no channel internals and may
/// fire any number of times, in any order relative to pending commands.
/// Every handler defaults to a no-op.
pub struct EventHandlers {
    pub(crate) on_fetch_progress: Box<dyn Fn(u64) + Send + Sync>,
    pub(crate) on_error: EventFn,
    pub(crate) on_unhandled_rejection: EventFn,
    pub(crate) on_console: EventFn,
    pub(crate) on_console_group: EventFn,
    pub(crate) on_console_group_collapsed: EventFn,
    pub(crate) on_console_group_end: Box<dyn Fn() + Send + Sync>,
}

impl Default for EventHandlers {
    fn default() -> Self {
        Self {
            on_fetch_progress: Box::new(|_| {}),
            on_error: Box::new(|_| {}),
            on_unhandled_rejection: Box::new(|_| {}),
            on_console: Box::new(|_| {}),
            on_console_group: Box::new(|_| {}),
            on_console_group_collapsed: Box::new(|_| {}),
            on_console_group_end: Box::new(|| {}),
        }
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dependency fetch countdown (remaining module count).
    pub fn with_fetch_progress(mut self, f: impl Fn(u64) + Send + Sync + 'static) -> Self {
        self.on_fetch_progress = Box::new(f);
        self
    }

    /// Uncaught runtime error in the frame.
    pub fn with_error(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_error = Box::new(f);
        self
    }

    /// Unhandled promise rejection in the frame.
    pub fn with_unhandled_rejection(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_unhandled_rejection = Box::new(f);
        self
    }

    /// Console log entry.
    pub fn with_console(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_console = Box::new(f);
        self
    }

    /// Console group opened.
    pub fn with_console_group(mut self, f: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.on_console_group = Box::new(f);
        self
    }

    /// Console group opened collapsed.
    pub fn with_console_group_collapsed(
        mut self,
        f: impl Fn(Value) + Send + Sync + 'static,
    ) -> Self {
        self.on_console_group_collapsed = Box::new(f);
        self
    }

    /// Console group closed.
    pub fn with_console_group_end(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_console_group_end = Box::new(f);
        self
    }
}
