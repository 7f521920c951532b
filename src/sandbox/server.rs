//! WebSocket Server for Sandbox Frames
//!
//! Accepts connections from embedded preview frames. Each accepted frame
//! becomes a `SandboxLink` sent to the owner via channel; a per-connection
//! pump thread moves commands out and inbound traffic in.

use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use crate::channel::message::{Envelope, SandboxCommand, SandboxId};
use crate::channel::SandboxLink;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// Poll interval for an idle connection pump
const PUMP_IDLE_INTERVAL: Duration = Duration::from_millis(20);

/// Queue depth for per-frame command/event channels
const LINK_BUFFER: usize = 64;

// =============================================================================
// Sandbox WebSocket Server
// =============================================================================

/// Start the WebSocket server that pairs each connecting frame with a
/// `SandboxLink`.
///
/// Links are sent through the channel for the owner to attach a
/// `CommandChannel`. Returns the actually bound port (the base port is
/// retried upward when occupied).
pub fn start_sandbox_server(
    base_port: u16,
    link_tx: mpsc::Sender<SandboxLink>,
) -> Result<u16> {
    let (listener, actual_port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
    listener.set_nonblocking(true)?;

    let next_frame = Arc::new(AtomicU64::new(1));

    // Spawn acceptor thread
    std::thread::spawn(move || {
        loop {
            match listener.accept() {
                Ok((stream, addr)) => {
                    crate::debug!("sandbox"; "frame connected: {}", addr);

                    // Set blocking for the WebSocket handshake
                    let _ = stream.set_nonblocking(false);

                    let id = SandboxId(next_frame.fetch_add(1, Ordering::Relaxed));
                    match accept_frame(id, stream) {
                        Ok(link) => {
                            if link_tx.blocking_send(link).is_err() {
                                crate::log!("sandbox"; "failed to hand link to owner");
                                break;
                            }
                        }
                        Err(e) => {
                            crate::log!("sandbox"; "handshake failed: {}", e);
                        }
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(100));
                    continue;
                }
                Err(e) => {
                    crate::log!("sandbox"; "accept error: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    });

    Ok(actual_port)
}

/// Perform the WebSocket handshake and wire up the per-frame pump.
fn accept_frame(id: SandboxId, stream: TcpStream) -> Result<SandboxLink> {
    let ws = match tungstenite::accept(stream) {
        Ok(ws) => ws,
        Err(e) => return Err(anyhow::anyhow!("websocket handshake failed: {e}")),
    };
    // Non-blocking from here on; the pump polls reads
    ws.get_ref().set_nonblocking(true)?;

    let (command_tx, command_rx) = mpsc::channel(LINK_BUFFER);
    let (event_tx, event_rx) = mpsc::channel(LINK_BUFFER);

    std::thread::spawn(move || frame_pump(id, ws, command_rx, event_tx));

    Ok(SandboxLink {
        id,
        commands: command_tx,
        events: event_rx,
    })
}

/// Per-connection pump: drains outbound commands and polls inbound frames.
///
/// Commands leave in posting order. Inbound text frames are parsed as JSON
/// and tagged with this connection's id; the channel layer does all further
/// interpretation. Returns (ending the thread) when either side goes away.
fn frame_pump(
    id: SandboxId,
    mut ws: WebSocket<TcpStream>,
    mut commands: mpsc::Receiver<SandboxCommand>,
    events: mpsc::Sender<Envelope>,
) {
    loop {
        let mut idle = true;

        // Outbound: drain everything queued
        loop {
            match commands.try_recv() {
                Ok(command) => {
                    idle = false;
                    if let Err(e) = ws.send(Message::Text(command.to_json().into())) {
                        crate::debug!("sandbox"; "{} send failed: {}", id, e);
                        return;
                    }
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // Channel owner is gone; close the socket politely
                    let _ = ws.close(None);
                    return;
                }
            }
        }

        // Inbound: non-blocking read
        match ws.read() {
            Ok(Message::Text(text)) => {
                idle = false;
                match serde_json::from_str::<serde_json::Value>(&text) {
                    Ok(payload) => {
                        if events
                            .blocking_send(Envelope {
                                source: id,
                                payload,
                            })
                            .is_err()
                        {
                            return;
                        }
                    }
                    Err(e) => {
                        crate::debug!("sandbox"; "{} sent invalid json: {}", id, e);
                    }
                }
            }
            Ok(Message::Close(_)) => {
                crate::debug!("sandbox"; "{} closed", id);
                return;
            }
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => {
                crate::debug!("sandbox"; "{} read error: {}", id, e);
                return;
            }
            _ => {}
        }

        if idle {
            std::thread::sleep(PUMP_IDLE_INTERVAL);
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(format!("127.0.0.1:{}", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => {
                last_error = Some(e);
                continue;
            }
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind sandbox WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_bind_port_retries_past_occupied() {
        let (first, port) = try_bind_port(0, 1).expect("ephemeral bind");
        // Port 0 always binds; now occupy a concrete port and retry past it.
        let (_second, second_port) = try_bind_port(port, MAX_PORT_RETRIES).expect("retry bind");
        assert_ne!(second_port, 0);
        assert_ne!(second_port, port);
        drop(first);
    }
}
