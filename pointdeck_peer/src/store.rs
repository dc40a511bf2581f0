// Session state store: the authoritative participant roster.
//
// `SessionStore` owns the mapping from participant identity to the current
// round's record. All mutation happens through methods called from the
// node's single control thread (see `node.rs`); there is no internal
// locking. Mutations follow the protocol's tolerance rules: an operation
// referencing an unknown participant logs and leaves the state untouched,
// because a submission can outrun the join that introduces its sender.
//
// Snapshot exchange: `issue_snapshot()` captures the roster under the next
// sequence number for a host broadcast; `replace_all()` applies a received
// snapshot wholesale. Replacement is last-write-wins, gated by the sequence
// number: a snapshot that is not newer than the last one applied is dropped,
// so a delayed broadcast cannot overwrite fresher state.

use std::collections::BTreeMap;

use log::{debug, warn};
use pointdeck_protocol::message::{Participant, SessionSnapshot};
use pointdeck_protocol::types::{ParticipantId, SnapshotSeq};

/// Authoritative participant roster for the current session.
#[derive(Debug, Default)]
pub struct SessionStore {
    participants: BTreeMap<ParticipantId, Participant>,
    /// Highest snapshot sequence issued (host) or applied (participant).
    seq: SnapshotSeq,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a participant with no value and nothing revealed. A duplicate
    /// join is a no-op: the first join wins. An empty nickname falls back to
    /// the truncated identifier.
    ///
    /// Returns true if the roster changed.
    pub fn apply_join(&mut self, id: ParticipantId, nickname: String) -> bool {
        if self.participants.contains_key(&id) {
            debug!("duplicate join from {id}, ignoring");
            return false;
        }
        let nickname = if nickname.trim().is_empty() {
            id.short_name()
        } else {
            nickname
        };
        self.participants.insert(id, Participant::new(nickname));
        true
    }

    /// Record a submission. Unknown participants are logged and ignored;
    /// the mutation is expected to be retried implicitly by the next
    /// authoritative snapshot.
    pub fn apply_submission(&mut self, id: &ParticipantId, value: i64) -> bool {
        match self.participants.get_mut(id) {
            Some(record) => {
                record.value = Some(value);
                true
            }
            None => {
                warn!("submission from unknown participant {id}, ignoring");
                false
            }
        }
    }

    /// Change a participant's nickname. Unknown participants and blank
    /// nicknames are logged and ignored.
    pub fn apply_rename(&mut self, id: &ParticipantId, nickname: String) -> bool {
        if nickname.trim().is_empty() {
            debug!("blank rename from {id}, ignoring");
            return false;
        }
        match self.participants.get_mut(id) {
            Some(record) => {
                record.nickname = nickname;
                true
            }
            None => {
                warn!("rename from unknown participant {id}, ignoring");
                false
            }
        }
    }

    /// Remove a departed participant. Returns true if the record existed.
    pub fn apply_leave(&mut self, id: &ParticipantId) -> bool {
        self.participants.remove(id).is_some()
    }

    /// Mark every record revealed. Values are untouched, and the flag is
    /// never cleared except by a reset.
    pub fn apply_reveal(&mut self) {
        for record in self.participants.values_mut() {
            record.revealed = true;
        }
    }

    /// Start a new round: clear every value and every revealed flag.
    pub fn apply_reset(&mut self) {
        for record in self.participants.values_mut() {
            record.value = None;
            record.revealed = false;
        }
    }

    /// Replace the whole roster with a received snapshot. Drops the
    /// snapshot if its sequence is not newer than the last one applied.
    ///
    /// Returns true if the roster was replaced.
    pub fn replace_all(&mut self, snapshot: SessionSnapshot) -> bool {
        if snapshot.seq <= self.seq {
            debug!(
                "stale snapshot {:?} (already at {:?}), ignoring",
                snapshot.seq, self.seq
            );
            return false;
        }
        self.seq = snapshot.seq;
        self.participants = snapshot.participants;
        true
    }

    /// True once every participant has submitted this round. An empty
    /// roster is never a complete round.
    pub fn is_round_complete(&self) -> bool {
        !self.participants.is_empty()
            && self.participants.values().all(|record| record.value.is_some())
    }

    /// True if any record is revealed this round.
    pub fn any_revealed(&self) -> bool {
        self.participants.values().any(|record| record.revealed)
    }

    /// Capture the roster under the next sequence number, for an
    /// authoritative host broadcast.
    pub fn issue_snapshot(&mut self) -> SessionSnapshot {
        self.seq = SnapshotSeq(self.seq.0 + 1);
        SessionSnapshot {
            seq: self.seq,
            participants: self.participants.clone(),
        }
    }

    /// The current state without advancing the sequence, for presentation.
    pub fn view(&self) -> SessionSnapshot {
        SessionSnapshot {
            seq: self.seq,
            participants: self.participants.clone(),
        }
    }

    pub fn get(&self, id: &ParticipantId) -> Option<&Participant> {
        self.participants.get(id)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.participants.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
