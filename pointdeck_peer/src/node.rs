// Session node: the single control thread of a Pointdeck process.
//
// One `mpsc` channel funnels transport events (`net.rs`) and local user
// actions (`NodeHandle`) into a loop that owns the session store, the round
// controller, and every connection's write half. Each event is handled to
// completion before the next is received, so applying a message to the
// store and relaying it onward is one atomic step: no forward can
// interleave with a mutation that would change the snapshot being sent.
//
// Host and participant run the same loop. The topology role decides the
// routing (`router.rs`) and gates the host-only control actions
// (`round.rs`). Host duties on top of plain application:
// - answer every `Join` with an authoritative `FullSync` to all connections,
// - push a `FullSync` the moment a mutation completes the round,
// - broadcast `Reveal`/`Reset` for its own control actions,
// - turn a closed connection into the departure of the participant that
//   joined on it.

use std::collections::BTreeMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use pointdeck_protocol::message::{Envelope, PeerMessage, SessionSnapshot};
use pointdeck_protocol::types::{ParticipantId, RoomToken};

use crate::net::{self, ConnectionHandle, ConnectionId, NetEvent};
use crate::room;
use crate::round::{RoundController, RoundPhase};
use crate::router::{self, RouteDecision, TopologyRole};
use crate::store::SessionStore;

/// Local user actions, injected through `NodeHandle`.
#[derive(Clone, Debug)]
pub enum LocalAction {
    Submit { value: i64 },
    Rename { nickname: String },
    Reveal,
    Reset,
    Leave,
}

/// Events handled by the control thread.
#[derive(Debug)]
pub enum NodeEvent {
    Net(NetEvent),
    Local(LocalAction),
}

/// Callback invoked after every applied mutation with the current state
/// and round phase. This is the presentation boundary: the core never
/// renders anything itself.
pub type StateSink = Box<dyn FnMut(&SessionSnapshot, RoundPhase) + Send>;

/// Configuration for hosting a room.
pub struct HostConfig {
    pub port: u16,
    pub token: RoomToken,
    pub nickname: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            token: room::generate_room_token(),
            nickname: "HOST".into(),
        }
    }
}

/// Configuration for joining a room.
pub struct JoinConfig {
    /// Transport address of the hosting process.
    pub addr: String,
    pub token: RoomToken,
    pub nickname: String,
}

/// Handle for driving a running node from the outside.
pub struct NodeHandle {
    tx: Sender<NodeEvent>,
    keep_running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NodeHandle {
    pub fn submit(&self, value: i64) {
        self.send(LocalAction::Submit { value });
    }

    pub fn rename(&self, nickname: &str) {
        self.send(LocalAction::Rename {
            nickname: nickname.into(),
        });
    }

    /// Host only; a policy no-op elsewhere.
    pub fn reveal(&self) {
        self.send(LocalAction::Reveal);
    }

    /// Host only; a policy no-op elsewhere.
    pub fn reset(&self) {
        self.send(LocalAction::Reset);
    }

    /// Announce departure and stop the control thread.
    pub fn stop(mut self) {
        let _ = self.tx.send(NodeEvent::Local(LocalAction::Leave));
        self.keep_running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn send(&self, action: LocalAction) {
        let _ = self.tx.send(NodeEvent::Local(action));
    }
}

/// The state owned by the control thread.
struct SessionNode {
    role: TopologyRole,
    self_id: ParticipantId,
    /// Participant identity the roster must contain (derived from the room
    /// token on a joining node).
    expected_host: Option<ParticipantId>,
    store: SessionStore,
    round: RoundController,
    connections: BTreeMap<ConnectionId, ConnectionHandle>,
    /// Host side: which participant joined on which connection, so a closed
    /// connection removes its participant.
    conn_participants: BTreeMap<ConnectionId, ParticipantId>,
    next_conn_id: u32,
    tx: Sender<NodeEvent>,
    keep_running: Arc<AtomicBool>,
    sink: StateSink,
}

/// Start hosting a room: bind the listener, seed the roster with the host's
/// own record, and spawn the control thread. Returns the handle and the
/// bound address (useful with port 0).
pub fn start_host(config: HostConfig, sink: StateSink) -> io::Result<(NodeHandle, SocketAddr)> {
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    let addr = listener.local_addr()?;
    let keep_running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel();

    let self_id = config.token.host_identity();
    let mut node = SessionNode::new(
        TopologyRole::Host,
        self_id.clone(),
        None,
        tx.clone(),
        keep_running.clone(),
        sink,
    );
    node.store.apply_join(self_id, config.nickname);

    net::spawn_accept_loop(listener, tx.clone(), keep_running.clone());
    let thread = thread::spawn(move || node.run(rx));

    Ok((
        NodeHandle {
            tx,
            keep_running,
            thread: Some(thread),
        },
        addr,
    ))
}

/// Join a room: connect to the host, announce ourselves, and spawn the
/// control thread. The roster arrives with the host's first `FullSync`.
pub fn start_participant(config: JoinConfig, sink: StateSink) -> Result<NodeHandle, String> {
    let stream = TcpStream::connect(&config.addr)
        .map_err(|e| format!("connect to {} failed: {e}", config.addr))?;
    let reader_stream = stream
        .try_clone()
        .map_err(|e| format!("clone failed: {e}"))?;

    let keep_running = Arc::new(AtomicBool::new(true));
    let (tx, rx) = mpsc::channel();

    let self_id = room::random_participant_id();
    let mut node = SessionNode::new(
        TopologyRole::Participant,
        self_id.clone(),
        Some(config.token.host_identity()),
        tx.clone(),
        keep_running.clone(),
        sink,
    );

    let conn = ConnectionId(node.next_conn_id);
    node.next_conn_id += 1;
    node.connections.insert(conn, ConnectionHandle::new(stream));
    net::spawn_reader(reader_stream, conn, tx.clone(), keep_running.clone());

    // The join is applied locally first, then announced to the host.
    let nickname = config.nickname;
    node.store.apply_join(self_id.clone(), nickname.clone());
    node.send_out(PeerMessage::Join {
        participant_id: self_id,
        nickname,
    });

    let thread = thread::spawn(move || node.run(rx));

    Ok(NodeHandle {
        tx,
        keep_running,
        thread: Some(thread),
    })
}

impl SessionNode {
    fn new(
        role: TopologyRole,
        self_id: ParticipantId,
        expected_host: Option<ParticipantId>,
        tx: Sender<NodeEvent>,
        keep_running: Arc<AtomicBool>,
        sink: StateSink,
    ) -> Self {
        Self {
            role,
            self_id,
            expected_host,
            store: SessionStore::new(),
            round: RoundController::new(role),
            connections: BTreeMap::new(),
            conn_participants: BTreeMap::new(),
            next_conn_id: 0,
            tx,
            keep_running,
            sink,
        }
    }

    /// Control loop. Runs until the handle stops it or, on a participant,
    /// until the host connection closes.
    fn run(mut self, rx: Receiver<NodeEvent>) {
        self.notify();
        loop {
            let Ok(event) = rx.recv() else { break };
            self.handle_event(event);
            if !self.keep_running.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    fn handle_event(&mut self, event: NodeEvent) {
        match event {
            NodeEvent::Net(net_event) => self.handle_net(net_event),
            NodeEvent::Local(action) => self.handle_local(action),
        }
    }

    fn handle_net(&mut self, event: NetEvent) {
        match event {
            NetEvent::Accepted { stream } => self.handle_accepted(stream),
            NetEvent::Inbound { conn, envelope } => self.handle_inbound(conn, envelope),
            NetEvent::Closed { conn } => self.handle_closed(conn),
        }
    }

    /// Register an accepted connection and spawn its reader. Participants
    /// never listen, so this only happens on the host.
    fn handle_accepted(&mut self, stream: TcpStream) {
        if self.role != TopologyRole::Host {
            return;
        }
        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to clone accepted stream: {e}");
                return;
            }
        };
        let conn = ConnectionId(self.next_conn_id);
        self.next_conn_id += 1;
        net::spawn_reader(
            reader_stream,
            conn,
            self.tx.clone(),
            self.keep_running.clone(),
        );
        self.connections.insert(conn, ConnectionHandle::new(stream));
        debug!("connection {} open", conn.0);
    }

    fn handle_inbound(&mut self, origin: ConnectionId, envelope: Envelope) {
        let RouteDecision { apply, relay } = router::route_inbound(envelope, self.role);
        // Relay before applying, so a completion broadcast triggered by the
        // apply lands after the message that caused it.
        if let Some(relay) = &relay {
            self.broadcast_except(origin, relay);
        }
        self.apply_inbound(origin, apply);
    }

    fn apply_inbound(&mut self, origin: ConnectionId, message: PeerMessage) {
        match message {
            PeerMessage::Join {
                participant_id,
                nickname,
            } => {
                self.store.apply_join(participant_id.clone(), nickname);
                if self.role == TopologyRole::Host {
                    self.conn_participants.insert(origin, participant_id);
                    // Authoritative roster push: the newcomer gets the state
                    // it missed, everyone else gets the newcomer.
                    let snapshot = self.store.issue_snapshot();
                    self.broadcast(&Envelope::direct(PeerMessage::FullSync { snapshot }));
                }
                self.sync_round_and_notify();
            }
            PeerMessage::Submission {
                participant_id,
                value,
            } => {
                if self.store.apply_submission(&participant_id, value) {
                    self.sync_round_and_notify();
                }
            }
            PeerMessage::Rename {
                participant_id,
                nickname,
            } => {
                if self.store.apply_rename(&participant_id, nickname) {
                    self.notify();
                }
            }
            PeerMessage::Leave { participant_id } => {
                if self.role == TopologyRole::Host {
                    self.conn_participants.remove(&origin);
                    self.connections.remove(&origin);
                }
                self.remove_participant(&participant_id);
            }
            PeerMessage::FullSync { snapshot } => {
                if self.role == TopologyRole::Host {
                    debug!("ignoring FullSync on the host; snapshots originate here");
                    return;
                }
                let wrong_room = self
                    .expected_host
                    .as_ref()
                    .is_some_and(|expected| !snapshot.participants.contains_key(expected));
                if wrong_room {
                    warn!("roster is missing the host record; wrong room token?");
                }
                if self.store.replace_all(snapshot) {
                    self.round
                        .observe_sync(self.store.is_round_complete(), self.store.any_revealed());
                    self.notify();
                }
            }
            PeerMessage::Reveal { snapshot } => {
                if self.role == TopologyRole::Host {
                    debug!("ignoring Reveal on the host; reveals originate here");
                    return;
                }
                if self.store.replace_all(snapshot) {
                    self.round.observe_reveal();
                    self.notify();
                }
            }
            PeerMessage::Reset => {
                if self.role == TopologyRole::Host {
                    debug!("ignoring Reset on the host; resets originate here");
                    return;
                }
                self.store.apply_reset();
                self.round.observe_reset();
                self.notify();
            }
        }
    }

    fn handle_closed(&mut self, conn: ConnectionId) {
        self.connections.remove(&conn);
        if let Some(participant_id) = self.conn_participants.remove(&conn) {
            info!("{participant_id} disconnected");
            self.remove_participant(&participant_id);
        } else if self.role == TopologyRole::Participant {
            warn!("lost connection to the host; leaving the session");
            self.keep_running.store(false, Ordering::SeqCst);
        }
    }

    fn handle_local(&mut self, action: LocalAction) {
        match action {
            LocalAction::Submit { value } => {
                // Applied locally before it is sent; its order relative to
                // remote events is whatever the host decides.
                if self.store.apply_submission(&self.self_id, value) {
                    let participant_id = self.self_id.clone();
                    self.send_out(PeerMessage::Submission {
                        participant_id,
                        value,
                    });
                    self.sync_round_and_notify();
                }
            }
            LocalAction::Rename { nickname } => {
                if self.store.apply_rename(&self.self_id, nickname.clone()) {
                    let participant_id = self.self_id.clone();
                    self.send_out(PeerMessage::Rename {
                        participant_id,
                        nickname,
                    });
                    self.notify();
                }
            }
            LocalAction::Reveal => {
                // The controller enforces the host-only policy.
                if self.round.request_reveal() {
                    self.store.apply_reveal();
                    let snapshot = self.store.issue_snapshot();
                    self.broadcast(&Envelope::direct(PeerMessage::Reveal { snapshot }));
                    self.notify();
                }
            }
            LocalAction::Reset => {
                if self.round.request_reset() {
                    self.store.apply_reset();
                    self.broadcast(&Envelope::direct(PeerMessage::Reset));
                    self.notify();
                }
            }
            LocalAction::Leave => {
                if self.role == TopologyRole::Participant {
                    let participant_id = self.self_id.clone();
                    self.send_out(PeerMessage::Leave { participant_id });
                }
                // A departing host simply ends the room; the dropped
                // connections tell the participants.
            }
        }
    }

    /// Remove a departed participant and, on the host, tell everyone else.
    fn remove_participant(&mut self, participant_id: &ParticipantId) {
        if self.store.apply_leave(participant_id) {
            if self.role == TopologyRole::Host {
                self.broadcast(&Envelope::direct(PeerMessage::Leave {
                    participant_id: participant_id.clone(),
                }));
            }
            self.sync_round_and_notify();
        }
    }

    /// Re-derive the round phase after a store mutation; the host pushes an
    /// authoritative `FullSync` the moment the mutation completes the round.
    fn sync_round_and_notify(&mut self) {
        let complete = self.store.is_round_complete();
        if self.round.reevaluate(complete) && self.role == TopologyRole::Host {
            let snapshot = self.store.issue_snapshot();
            self.broadcast(&Envelope::direct(PeerMessage::FullSync { snapshot }));
        }
        self.notify();
    }

    /// Send one of our own messages into the topology: the host broadcasts
    /// to every connection, a participant sends to the host.
    fn send_out(&mut self, payload: PeerMessage) {
        let envelope = router::route_outbound(payload, self.role);
        self.broadcast(&envelope);
    }

    fn broadcast(&mut self, envelope: &Envelope) {
        for handle in self.connections.values_mut() {
            handle.send(envelope);
        }
    }

    /// Star fan-out: every connection except the origin.
    fn broadcast_except(&mut self, origin: ConnectionId, envelope: &Envelope) {
        for (conn, handle) in &mut self.connections {
            if *conn != origin {
                handle.send(envelope);
            }
        }
    }

    fn notify(&mut self) {
        let view = self.store.view();
        (self.sink)(&view, self.round.phase());
    }
}
