// Session messages and the relay envelope.
//
// `PeerMessage` is the full protocol vocabulary. Participant-originated
// messages (`Join`, `Submission`, `Rename`, `Leave`) travel to the host;
// host-originated messages (`FullSync`, `Reveal`, `Reset`) travel to every
// participant. Supporting structs (`Participant`, `SessionSnapshot`) are the
// replicated state itself. All types derive `Serialize`/`Deserialize` for
// JSON framing (see `framing.rs`).
//
// The `Envelope` carries a payload plus its relay scope. It is constructed
// at send time and never mutated after receipt: when the host relays a
// `ForwardToAll` payload, it wraps the payload in a fresh `Direct` envelope,
// so the forwarding request is never propagated twice.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{ParticipantId, SnapshotSeq};

/// One participant's record for the current round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Display nickname. Non-empty once the record exists.
    pub nickname: String,
    /// Submitted estimate, `None` until the participant submits this round.
    pub value: Option<i64>,
    /// Whether the value is visible to others. Monotonic within a round.
    pub revealed: bool,
}

impl Participant {
    /// Fresh record: no value yet, nothing revealed.
    pub fn new(nickname: String) -> Self {
        Self {
            nickname,
            value: None,
            revealed: false,
        }
    }
}

/// The full session state at a point in time, sent wholesale to
/// synchronize a node. Tagged with a host-assigned sequence number so a
/// stale snapshot can never overwrite fresher state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub seq: SnapshotSeq,
    pub participants: BTreeMap<ParticipantId, Participant>,
}

/// Messages exchanged between session peers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// Announce a participant to the host. The host answers with an
    /// authoritative `FullSync` to every connection.
    Join {
        participant_id: ParticipantId,
        nickname: String,
    },
    /// A numeric estimate for the current round.
    Submission {
        participant_id: ParticipantId,
        value: i64,
    },
    /// Nickname change.
    Rename {
        participant_id: ParticipantId,
        nickname: String,
    },
    /// The participant is leaving the session.
    Leave { participant_id: ParticipantId },
    /// Authoritative full state push (host to all).
    FullSync { snapshot: SessionSnapshot },
    /// Round reveal, carrying the revealed state (host to all).
    Reveal { snapshot: SessionSnapshot },
    /// Start a new round (host to all).
    Reset,
}

/// How far a message should travel past the node that receives it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelayScope {
    /// Apply on the receiving node only.
    Direct,
    /// The host must re-send the payload to every other connection.
    ForwardToAll,
}

/// Wire envelope: a payload and its relay scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub scope: RelayScope,
    pub payload: PeerMessage,
}

impl Envelope {
    pub fn direct(payload: PeerMessage) -> Self {
        Self {
            scope: RelayScope::Direct,
            payload,
        }
    }

    pub fn forward_to_all(payload: PeerMessage) -> Self {
        Self {
            scope: RelayScope::ForwardToAll,
            payload,
        }
    }
}
