// Test-only participant harness for end-to-end session tests.
//
// Wraps a real `NodeHandle` with an mpsc-backed state sink so tests can
// block until the replicated state reaches an expected shape. All
// networking uses the same code paths as the CLI binary; the only
// test-specific code is the blocking wait helpers.
//
// See also: `tests/full_round.rs` for the scenarios.

use std::net::SocketAddr;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use pointdeck_peer::node::{
    HostConfig, JoinConfig, NodeHandle, StateSink, start_host, start_participant,
};
use pointdeck_peer::round::RoundPhase;
use pointdeck_protocol::message::SessionSnapshot;
use pointdeck_protocol::types::RoomToken;

/// Default timeout for blocking wait operations.
const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep between checks while waiting.
const WAIT_INTERVAL: Duration = Duration::from_millis(10);

/// One node of a test session, in either role.
pub struct TestParticipant {
    handle: Option<NodeHandle>,
    states: Receiver<(SessionSnapshot, RoundPhase)>,
    last: Option<(SessionSnapshot, RoundPhase)>,
}

impl TestParticipant {
    /// Host a room on an OS-assigned port.
    pub fn host(token: &str, nickname: &str) -> (Self, SocketAddr) {
        let (sink, states) = state_probe();
        let config = HostConfig {
            port: 0,
            token: RoomToken::parse(token).expect("valid test token"),
            nickname: nickname.into(),
        };
        let (handle, addr) = start_host(config, sink).expect("start_host failed");
        (
            Self {
                handle: Some(handle),
                states,
                last: None,
            },
            addr,
        )
    }

    /// Join a hosted room.
    pub fn join(addr: SocketAddr, token: &str, nickname: &str) -> Self {
        let (sink, states) = state_probe();
        let config = JoinConfig {
            addr: format!("127.0.0.1:{}", addr.port()),
            token: RoomToken::parse(token).expect("valid test token"),
            nickname: nickname.into(),
        };
        let handle = start_participant(config, sink).expect("start_participant failed");
        Self {
            handle: Some(handle),
            states,
            last: None,
        }
    }

    pub fn submit(&self, value: i64) {
        self.handle().submit(value);
    }

    pub fn rename(&self, nickname: &str) {
        self.handle().rename(nickname);
    }

    pub fn reveal(&self) {
        self.handle().reveal();
    }

    pub fn reset(&self) {
        self.handle().reset();
    }

    /// Leave the session and stop the node.
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }

    /// Block until the replicated state satisfies the predicate, returning
    /// that state. Panics after `WAIT_TIMEOUT`.
    pub fn wait_for<F>(&mut self, what: &str, mut predicate: F) -> (SessionSnapshot, RoundPhase)
    where
        F: FnMut(&SessionSnapshot, RoundPhase) -> bool,
    {
        let deadline = Instant::now() + WAIT_TIMEOUT;
        loop {
            self.drain();
            let matched = self
                .last
                .as_ref()
                .is_some_and(|(snapshot, phase)| predicate(snapshot, *phase));
            if matched {
                return self.last.clone().expect("matched state present");
            }
            assert!(
                Instant::now() < deadline,
                "timed out waiting for {what}; last state: {:?}",
                self.last
            );
            std::thread::sleep(WAIT_INTERVAL);
        }
    }

    /// The most recently observed state, after draining pending updates.
    pub fn current(&mut self) -> Option<(SessionSnapshot, RoundPhase)> {
        self.drain();
        self.last.clone()
    }

    fn drain(&mut self) {
        while let Ok(state) = self.states.try_recv() {
            self.last = Some(state);
        }
    }

    fn handle(&self) -> &NodeHandle {
        self.handle.as_ref().expect("node already stopped")
    }
}

fn state_probe() -> (StateSink, Receiver<(SessionSnapshot, RoundPhase)>) {
    let (tx, rx) = mpsc::channel();
    let sink: StateSink = Box::new(move |snapshot: &SessionSnapshot, phase| {
        let _ = tx.send((snapshot.clone(), phase));
    });
    (sink, rx)
}
