// pointdeck_protocol: wire protocol for Pointdeck estimation sessions.
//
// This crate defines the message vocabulary, the relay envelope, and the
// framing used by every node in a session to communicate over TCP. It is
// shared between the host and participant roles (both live in
// `pointdeck_peer`) and has no dependency on the runtime.
//
// Module overview:
// - `types.rs`:    Identity newtypes (`ParticipantId`, `RoomToken`,
//                  `SnapshotSeq`) plus the token-to-host-identity transform.
// - `message.rs`:  `PeerMessage` (the full catalogue), the replicated state
//                  types (`Participant`, `SessionSnapshot`), and the
//                  `Envelope` with its `RelayScope`.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload.
//
// Design decisions:
// - **JSON serialization.** Human-debuggable on the wire and cheap at this
//   message rate. Binary framing can be swapped in later if it ever matters.
// - **Explicit relay envelope.** The forwarding request is part of the
//   envelope type, not a flag mutated on the message in flight; relaying
//   re-wraps the payload so the request never propagates past the host.
// - **No async runtime.** Framing works on blocking `std::io` streams,
//   matching the thread-per-reader transport in `pointdeck_peer`.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_FRAME_SIZE, read_frame, write_frame};
pub use message::{Envelope, Participant, PeerMessage, RelayScope, SessionSnapshot};
pub use types::{ParticipantId, RoomToken, SnapshotSeq};

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::io::Cursor;

    use super::*;

    /// Serialize an envelope to JSON, frame it, read it back, deserialize.
    fn wire_roundtrip(envelope: &Envelope) -> Envelope {
        let json = serde_json::to_vec(envelope).unwrap();
        let mut wire = Vec::new();
        write_frame(&mut wire, &json).unwrap();

        let mut cursor = Cursor::new(&wire);
        let recovered = read_frame(&mut cursor).unwrap();
        serde_json::from_slice(&recovered).unwrap()
    }

    #[test]
    fn forwarded_submission_survives_the_wire() {
        let envelope = Envelope::forward_to_all(PeerMessage::Submission {
            participant_id: ParticipantId("a1b2c3".into()),
            value: 13,
        });
        assert_eq!(wire_roundtrip(&envelope), envelope);
    }

    #[test]
    fn snapshot_keeps_sequence_and_records() {
        let mut participants = BTreeMap::new();
        participants.insert(
            ParticipantId("room-Q7XK2M".into()),
            Participant {
                nickname: "HOST".into(),
                value: Some(5),
                revealed: true,
            },
        );
        participants.insert(
            ParticipantId("a1b2c3".into()),
            Participant::new("Dana".into()),
        );

        let envelope = Envelope::direct(PeerMessage::FullSync {
            snapshot: SessionSnapshot {
                seq: SnapshotSeq(7),
                participants,
            },
        });
        let recovered = wire_roundtrip(&envelope);
        assert_eq!(recovered, envelope);

        let Envelope {
            payload: PeerMessage::FullSync { snapshot },
            ..
        } = recovered
        else {
            panic!("expected FullSync");
        };
        assert_eq!(snapshot.seq, SnapshotSeq(7));
        assert_eq!(snapshot.participants.len(), 2);
    }
}
