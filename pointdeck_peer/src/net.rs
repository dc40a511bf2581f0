// TCP transport for the star topology.
//
// Thread-per-reader with a central `mpsc` funnel:
//
// - **Accept thread** (host only): a non-blocking `TcpListener::accept()`
//   loop that hands new sockets to the control thread and checks the
//   shutdown flag between attempts.
// - **Reader threads** (one per connection): call `read_frame()` in a loop,
//   deserialize `Envelope`, and send `NetEvent::Inbound` to the control
//   thread. EOF or a read error reports the connection closed; a frame that
//   fails to parse is skipped, since the protocol ignores unrecognized
//   messages rather than dropping the sender.
// - **Control thread** (`node.rs`): the only writer to any socket, through
//   the `ConnectionHandle` write halves it owns.
//
// Sends are fire-and-forget. A write error is logged and swallowed; the
// reader thread for that socket will observe the close and report it.

use std::io::{BufReader, BufWriter};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use log::{debug, warn};
use pointdeck_protocol::framing::{read_frame, write_frame};
use pointdeck_protocol::message::Envelope;

use crate::node::NodeEvent;

/// Locally-assigned identifier for one open connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

/// Transport events delivered to the control thread.
#[derive(Debug)]
pub enum NetEvent {
    /// A new inbound connection (host only). The control thread assigns an
    /// id and spawns the reader.
    Accepted { stream: TcpStream },
    /// A framed envelope arrived on a connection.
    Inbound {
        conn: ConnectionId,
        envelope: Envelope,
    },
    /// A connection closed (EOF or read error).
    Closed { conn: ConnectionId },
}

/// Write half of one connection.
pub struct ConnectionHandle {
    writer: BufWriter<TcpStream>,
}

impl ConnectionHandle {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            writer: BufWriter::new(stream),
        }
    }

    /// Serialize and send an envelope. Fire-and-forget: a closed connection
    /// swallows the frame, and the reader side reports the close.
    pub fn send(&mut self, envelope: &Envelope) {
        match serde_json::to_vec(envelope) {
            Ok(json) => {
                if let Err(e) = write_frame(&mut self.writer, &json) {
                    debug!("dropping frame for closed connection: {e}");
                }
            }
            Err(e) => warn!("failed to serialize envelope: {e}"),
        }
    }
}

/// Spawn the accept thread for a hosting node. The listener is switched to
/// non-blocking so the thread can observe shutdown between accepts.
pub fn spawn_accept_loop(
    listener: TcpListener,
    tx: Sender<NodeEvent>,
    keep_running: Arc<AtomicBool>,
) {
    listener.set_nonblocking(true).ok();
    thread::spawn(move || {
        while keep_running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _addr)) => {
                    stream.set_nonblocking(false).ok();
                    if tx
                        .send(NodeEvent::Net(NetEvent::Accepted { stream }))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(50));
                }
                Err(_) => break,
            }
        }
    });
}

/// Spawn the reader thread for one connection.
pub fn spawn_reader(
    stream: TcpStream,
    conn: ConnectionId,
    tx: Sender<NodeEvent>,
    keep_running: Arc<AtomicBool>,
) {
    thread::spawn(move || {
        let mut reader = BufReader::new(stream);
        while keep_running.load(Ordering::SeqCst) {
            match read_frame(&mut reader) {
                Ok(bytes) => match serde_json::from_slice::<Envelope>(&bytes) {
                    Ok(envelope) => {
                        if tx
                            .send(NodeEvent::Net(NetEvent::Inbound { conn, envelope }))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("ignoring malformed message on connection {}: {e}", conn.0);
                    }
                },
                Err(_) => {
                    let _ = tx.send(NodeEvent::Net(NetEvent::Closed { conn }));
                    break;
                }
            }
        }
    });
}
