//! Command channel to an embedded sandbox frame.
//!
//! Turns the preview frame into a request/response peer: commands are
//! posted fire-and-forget with a fresh correlation id, and the returned
//! future settles when the frame's matching `cmd_ok`/`cmd_error` reply
//! arrives. Unsolicited lifecycle and console events are routed to
//! caller-supplied handlers immediately, out of band from any pending
//! command.
//!
//! ```text
//! run(scripts) --eval{cmd_id}--> [frame] --cmd_ok{cmd_id}--> resolve
//!                                   |
//!                                   +--console/error/...--> EventHandlers
//! ```
//!
//! Replies correlate strictly by id, never by order; many commands may be
//! in flight at once. There is no timeout or cancellation - callers wrap
//! the returned future if they need one.

pub mod events;
pub mod message;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

pub use events::EventHandlers;
pub use message::{EmptyArgs, Envelope, EvalArgs, SandboxCommand, SandboxId, SandboxMessage};

// =============================================================================
// Errors
// =============================================================================

/// Runtime failure reconstructed from a `cmd_error` reply.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RemoteError {
    pub message: String,
    /// Stack trace as rendered inside the frame
    pub stack: String,
}

/// Why a command's future settled without a successful reply.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The frame reported a runtime failure for this command
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The channel was torn down before a reply arrived
    #[error("channel closed")]
    Closed,
    /// The transport to the frame is gone
    #[error("sandbox disconnected")]
    Disconnected,
}

// =============================================================================
// Payloads and links
// =============================================================================

/// Scripts accepted by [`CommandChannel::run`]: one module or many.
#[derive(Debug, Clone)]
pub struct ScriptPayload(pub Vec<String>);

impl From<String> for ScriptPayload {
    fn from(script: String) -> Self {
        Self(vec![script])
    }
}

impl From<&str> for ScriptPayload {
    fn from(script: &str) -> Self {
        Self(vec![script.to_owned()])
    }
}

impl From<Vec<String>> for ScriptPayload {
    fn from(scripts: Vec<String>) -> Self {
        Self(scripts)
    }
}

/// Transport endpoints for one sandbox frame, produced by the transport
/// layer (see [`crate::sandbox`]).
pub struct SandboxLink {
    pub id: SandboxId,
    /// Outbound command queue, drained by the transport in posting order
    pub commands: mpsc::Sender<SandboxCommand>,
    /// Inbound traffic as tagged by the transport
    pub events: mpsc::Receiver<Envelope>,
}

// =============================================================================
// Channel
// =============================================================================

type PendingSlot = oneshot::Sender<Result<Value, ChannelError>>;
type PendingTable = Mutex<FxHashMap<u64, PendingSlot>>;

/// Request/response peer over one embedded sandbox frame.
///
/// Must be created inside a tokio runtime: the inbound dispatcher runs as a
/// spawned task. Dropping (or [`close`](Self::close)-ing) the channel
/// rejects every still-pending command with [`ChannelError::Closed`].
pub struct CommandChannel {
    sandbox: SandboxId,
    commands: mpsc::Sender<SandboxCommand>,
    pending: Arc<PendingTable>,
    /// Per-channel correlation counter; ids are never reused
    next_id: AtomicU64,
    dispatcher: JoinHandle<()>,
}

impl CommandChannel {
    /// Attach to a frame link and start dispatching its inbound traffic.
    pub fn connect(link: SandboxLink, handlers: EventHandlers) -> Self {
        let pending: Arc<PendingTable> = Arc::new(Mutex::new(FxHashMap::default()));
        let dispatcher = tokio::spawn(dispatch_loop(
            link.id,
            link.events,
            Arc::clone(&pending),
            handlers,
        ));
        Self {
            sandbox: link.id,
            commands: link.commands,
            pending,
            next_id: AtomicU64::new(1),
            dispatcher,
        }
    }

    /// The frame this channel is bound to.
    pub fn sandbox(&self) -> SandboxId {
        self.sandbox
    }

    /// Execute compiled script modules inside the frame.
    ///
    /// Resolves with the reply payload once the frame reports completion;
    /// rejects with the reconstructed error if execution failed.
    pub async fn run(&self, scripts: impl Into<ScriptPayload>) -> Result<Value, ChannelError> {
        let ScriptPayload(script) = scripts.into();
        self.issue(|cmd_id| SandboxCommand::Eval {
            cmd_id,
            args: EvalArgs { script },
        })
        .await
    }

    /// Ask the frame to intercept link clicks instead of navigating.
    pub async fn intercept_links(&self) -> Result<Value, ChannelError> {
        self.issue(|cmd_id| SandboxCommand::CatchClicks {
            cmd_id,
            args: EmptyArgs::default(),
        })
        .await
    }

    /// Allocate an id, register the pending slot, post the command.
    async fn issue(
        &self,
        build: impl FnOnce(u64) -> SandboxCommand,
    ) -> Result<Value, ChannelError> {
        let cmd_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(cmd_id, tx);

        if self.commands.send(build(cmd_id)).await.is_err() {
            self.pending.lock().remove(&cmd_id);
            return Err(ChannelError::Disconnected);
        }

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Closed),
        }
    }

    /// Stop dispatching and reject every still-pending command.
    pub fn close(&self) {
        self.dispatcher.abort();
        let drained: Vec<(u64, PendingSlot)> = self.pending.lock().drain().collect();
        for (cmd_id, slot) in drained {
            crate::debug!("channel"; "rejecting pending command {} on close", cmd_id);
            let _ = slot.send(Err(ChannelError::Closed));
        }
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

// =============================================================================
// Inbound dispatch
// =============================================================================

/// Consume inbound envelopes for one frame: settle correlated replies,
/// route events to handlers, drop everything else.
async fn dispatch_loop(
    sandbox: SandboxId,
    mut events: mpsc::Receiver<Envelope>,
    pending: Arc<PendingTable>,
    handlers: EventHandlers,
) {
    while let Some(envelope) = events.recv().await {
        // The transport may carry traffic from unrelated frames.
        if envelope.source != sandbox {
            crate::debug!("channel"; "ignoring message from {} (bound to {})", envelope.source, sandbox);
            continue;
        }

        let message: SandboxMessage = match serde_json::from_value(envelope.payload) {
            Ok(message) => message,
            Err(_) => {
                crate::debug!("channel"; "dropping unrecognized message from {}", sandbox);
                continue;
            }
        };

        match message {
            SandboxMessage::CmdOk { cmd_id, args } => settle(&pending, cmd_id, Ok(args)),
            SandboxMessage::CmdError {
                cmd_id,
                message,
                stack,
            } => settle(
                &pending,
                cmd_id,
                Err(RemoteError { message, stack }.into()),
            ),
            SandboxMessage::FetchProgress { args } => (handlers.on_fetch_progress)(args.remaining),
            SandboxMessage::Error { event } => (handlers.on_error)(event),
            SandboxMessage::UnhandledRejection { event } => {
                (handlers.on_unhandled_rejection)(event)
            }
            SandboxMessage::Console { event } => (handlers.on_console)(event),
            SandboxMessage::ConsoleGroup { event } => (handlers.on_console_group)(event),
            SandboxMessage::ConsoleGroupCollapsed { event } => {
                (handlers.on_console_group_collapsed)(event)
            }
            SandboxMessage::ConsoleGroupEnd => (handlers.on_console_group_end)(),
        }
    }
}

/// Settle the pending command for a reply id, exactly once.
fn settle(pending: &PendingTable, cmd_id: u64, result: Result<Value, ChannelError>) {
    match pending.lock().remove(&cmd_id) {
        // The caller may have given up on the future; that's fine.
        Some(slot) => {
            let _ = slot.send(result);
        }
        None => {
            crate::log!("channel"; "reply for unknown command id {}", cmd_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn test_link(
        id: SandboxId,
    ) -> (
        SandboxLink,
        mpsc::Receiver<SandboxCommand>,
        mpsc::Sender<Envelope>,
    ) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = mpsc::channel(16);
        (
            SandboxLink {
                id,
                commands: command_tx,
                events: event_rx,
            },
            command_rx,
            event_tx,
        )
    }

    fn reply_ok(id: SandboxId, cmd_id: u64, args: Value) -> Envelope {
        Envelope {
            source: id,
            payload: json!({"action": "cmd_ok", "cmd_id": cmd_id, "args": args}),
        }
    }

    #[tokio::test]
    async fn test_run_resolves_on_matching_reply() {
        let id = SandboxId(1);
        let (link, mut commands, events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let run = channel.run("export default {}");
        tokio::pin!(run);

        // Polling the run future posts the command; pull it off the queue.
        let posted = tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };
        assert!(matches!(posted, SandboxCommand::Eval { .. }));
        events
            .send(reply_ok(id, posted.cmd_id(), json!("done")))
            .await
            .unwrap();

        let result = run.await.expect("resolves");
        assert_eq!(result, json!("done"));
    }

    #[tokio::test]
    async fn test_out_of_order_replies_settle_by_id() {
        let id = SandboxId(2);
        let (link, mut commands, events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let first = channel.run("first");
        let second = channel.run("second");
        tokio::pin!(first);
        tokio::pin!(second);

        let first_cmd = tokio::select! {
            _ = &mut first => panic!("first settled before any reply"),
            cmd = commands.recv() => cmd.expect("first command posted"),
        };
        let second_cmd = tokio::select! {
            _ = &mut second => panic!("second settled before any reply"),
            cmd = commands.recv() => cmd.expect("second command posted"),
        };
        assert!(first_cmd.cmd_id() < second_cmd.cmd_id());

        // Reply to the second command only.
        events
            .send(reply_ok(id, second_cmd.cmd_id(), json!(2)))
            .await
            .unwrap();
        assert_eq!(second.await.unwrap(), json!(2));

        // The first command is still pending.
        tokio::select! {
            _ = &mut first => panic!("first command must not settle"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }

        events
            .send(reply_ok(id, first_cmd.cmd_id(), json!(1)))
            .await
            .unwrap();
        assert_eq!(first.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_cmd_error_rejects_with_reconstructed_error() {
        let id = SandboxId(3);
        let (link, mut commands, events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let run = channel.run("boom()");
        tokio::pin!(run);

        let posted = tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };
        events
            .send(Envelope {
                source: id,
                payload: json!({
                    "action": "cmd_error",
                    "cmd_id": posted.cmd_id(),
                    "message": "x",
                    "stack": "at boom (eval:1:1)",
                }),
            })
            .await
            .unwrap();

        match run.await {
            Err(ChannelError::Remote(remote)) => {
                assert_eq!(remote.message, "x");
                assert_eq!(remote.stack, "at boom (eval:1:1)");
                assert_eq!(remote.to_string(), "x");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_reply_id_settles_nothing() {
        let id = SandboxId(4);
        let (link, mut commands, events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let run = channel.run("pending");
        tokio::pin!(run);
        let posted = tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };

        // Reply to an id that was never issued.
        events.send(reply_ok(id, 999, json!(null))).await.unwrap();

        tokio::select! {
            _ = &mut run => panic!("stray reply must not settle a live command"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }

        events
            .send(reply_ok(id, posted.cmd_id(), json!(null)))
            .await
            .unwrap();
        run.await.expect("real reply still resolves");
    }

    #[tokio::test]
    async fn test_foreign_source_is_ignored_entirely() {
        let id = SandboxId(5);
        let (link, mut commands, events) = test_link(id);

        let console_hits = Arc::new(AtomicUsize::new(0));
        let hits = Arc::clone(&console_hits);
        let handlers =
            EventHandlers::new().with_console(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        let channel = CommandChannel::connect(link, handlers);

        let run = channel.run("pending");
        tokio::pin!(run);
        let posted = tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };

        // Same wire shapes, wrong source: neither pending commands nor
        // handlers may be touched.
        let foreign = SandboxId(99);
        events
            .send(reply_ok(foreign, posted.cmd_id(), json!(null)))
            .await
            .unwrap();
        events
            .send(Envelope {
                source: foreign,
                payload: json!({"action": "console", "level": "log"}),
            })
            .await
            .unwrap();

        tokio::select! {
            _ = &mut run => panic!("foreign reply must not settle a command"),
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
        assert_eq!(console_hits.load(Ordering::SeqCst), 0);

        events
            .send(reply_ok(id, posted.cmd_id(), json!(null)))
            .await
            .unwrap();
        run.await.expect("own reply resolves");
    }

    #[tokio::test]
    async fn test_events_reach_handlers_while_commands_pend() {
        let id = SandboxId(6);
        let (link, mut commands, events) = test_link(id);

        let (seen_tx, mut seen_rx) = mpsc::channel::<Value>(4);
        let progress = Arc::new(AtomicUsize::new(0));
        let progress_hits = Arc::clone(&progress);
        let handlers = EventHandlers::new()
            .with_console(move |event| {
                let _ = seen_tx.try_send(event);
            })
            .with_fetch_progress(move |remaining| {
                progress_hits.store(remaining as usize, Ordering::SeqCst);
            });
        let channel = CommandChannel::connect(link, handlers);

        let run = channel.run("pending");
        tokio::pin!(run);
        let posted = tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };

        events
            .send(Envelope {
                source: id,
                payload: json!({"action": "console", "level": "log", "args": ["hi"]}),
            })
            .await
            .unwrap();
        events
            .send(Envelope {
                source: id,
                payload: json!({"action": "fetch_progress", "args": {"remaining": 3}}),
            })
            .await
            .unwrap();

        let console_event = seen_rx.recv().await.expect("console handler fired");
        assert_eq!(console_event["args"][0], json!("hi"));
        assert_eq!(progress.load(Ordering::SeqCst), 3);

        events
            .send(reply_ok(id, posted.cmd_id(), json!(null)))
            .await
            .unwrap();
        run.await.expect("command unaffected by event traffic");
    }

    #[tokio::test]
    async fn test_close_rejects_pending_commands() {
        let id = SandboxId(7);
        let (link, mut commands, _events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let run = channel.run("never answered");
        tokio::pin!(run);
        tokio::select! {
            _ = &mut run => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };

        channel.close();
        match run.await {
            Err(ChannelError::Closed) => {}
            other => panic!("expected closed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ids_are_unique_and_increasing() {
        let id = SandboxId(8);
        let (link, mut commands, events) = test_link(id);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        let a = channel.run("a");
        let b = channel.intercept_links();
        tokio::pin!(a);
        tokio::pin!(b);

        let first = tokio::select! {
            _ = &mut a => panic!("run settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };
        let second = tokio::select! {
            _ = &mut b => panic!("intercept settled before any reply"),
            cmd = commands.recv() => cmd.expect("command posted"),
        };
        assert_ne!(first.cmd_id(), second.cmd_id());
        assert!(second.cmd_id() > first.cmd_id());

        events
            .send(reply_ok(id, first.cmd_id(), json!(null)))
            .await
            .unwrap();
        events
            .send(reply_ok(id, second.cmd_id(), json!(null)))
            .await
            .unwrap();
        a.await.unwrap();
        b.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnected_transport_fails_fast() {
        let id = SandboxId(9);
        let (link, commands, _events) = test_link(id);
        drop(commands);
        let channel = CommandChannel::connect(link, EventHandlers::default());

        match channel.run("anything").await {
            Err(ChannelError::Disconnected) => {}
            other => panic!("expected disconnected, got {other:?}"),
        }
        // The failed command must not leave a pending entry behind.
        assert!(channel.pending.lock().is_empty());
    }
}
