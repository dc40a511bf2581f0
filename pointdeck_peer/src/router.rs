// Relay routing: who applies a message, and where it travels next.
//
// The star topology has one rule: everything funnels through the host. A
// participant sends its own round actions to the host tagged `ForwardToAll`
// and never relays anything it receives (it has exactly one connection). The
// host applies every inbound payload and re-sends `ForwardToAll` payloads,
// re-wrapped as `Direct`, to every connection except the one they arrived on
// (the origin never hears its own message back).
//
// Because all participant traffic transits the host, the host observes a
// total order of events, and the order it relays them in is the order every
// participant applies them in. A node's own action is applied locally before
// it is sent, so only its position relative to remote events is undefined.
//
// Routing is a pure function of the envelope and the topology role. The
// connection fan-out itself lives in `node.rs`, which owns the write halves.

use pointdeck_protocol::message::{Envelope, PeerMessage, RelayScope};

/// Structural role of this node in the star topology. Exactly one node in a
/// session is the host: the one every other node's connection targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TopologyRole {
    Host,
    Participant,
}

/// What to do with an inbound envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteDecision {
    /// Payload to apply to the local store.
    pub apply: PeerMessage,
    /// Envelope to re-send to every connection except the origin. Only ever
    /// populated on the host.
    pub relay: Option<Envelope>,
}

/// Route an inbound envelope according to the topology role. The forwarding
/// request is consumed here: a relayed envelope is always `Direct`.
pub fn route_inbound(envelope: Envelope, role: TopologyRole) -> RouteDecision {
    let Envelope { scope, payload } = envelope;
    let relay = match (role, scope) {
        (TopologyRole::Host, RelayScope::ForwardToAll) => Some(Envelope::direct(payload.clone())),
        _ => None,
    };
    RouteDecision {
        apply: payload,
        relay,
    }
}

/// Wrap one of this node's own messages for sending. The host sends direct
/// to its connections; a participant asks the host to fan out, except for
/// `Join` and `Leave`, which address the host itself (the host answers with
/// authoritative state of its own).
pub fn route_outbound(payload: PeerMessage, role: TopologyRole) -> Envelope {
    if role == TopologyRole::Host {
        return Envelope::direct(payload);
    }
    match payload {
        PeerMessage::Join { .. } | PeerMessage::Leave { .. } => Envelope::direct(payload),
        _ => Envelope::forward_to_all(payload),
    }
}

#[cfg(test)]
mod tests {
    use pointdeck_protocol::types::ParticipantId;

    use super::*;

    fn submission() -> PeerMessage {
        PeerMessage::Submission {
            participant_id: ParticipantId("alice".into()),
            value: 3,
        }
    }

    #[test]
    fn host_relays_forwarded_payloads_as_direct() {
        let decision = route_inbound(
            Envelope::forward_to_all(submission()),
            TopologyRole::Host,
        );
        assert_eq!(decision.apply, submission());
        assert_eq!(decision.relay, Some(Envelope::direct(submission())));
    }

    #[test]
    fn host_does_not_relay_direct_payloads() {
        let decision = route_inbound(Envelope::direct(submission()), TopologyRole::Host);
        assert_eq!(decision.relay, None);
    }

    #[test]
    fn participant_never_relays() {
        let decision = route_inbound(
            Envelope::forward_to_all(submission()),
            TopologyRole::Participant,
        );
        assert_eq!(decision.apply, submission());
        assert_eq!(decision.relay, None);
    }

    #[test]
    fn participant_tags_round_actions_for_fan_out() {
        let envelope = route_outbound(submission(), TopologyRole::Participant);
        assert_eq!(envelope.scope, RelayScope::ForwardToAll);
    }

    #[test]
    fn participant_join_and_leave_address_the_host_only() {
        let join = route_outbound(
            PeerMessage::Join {
                participant_id: ParticipantId("alice".into()),
                nickname: "Alice".into(),
            },
            TopologyRole::Participant,
        );
        assert_eq!(join.scope, RelayScope::Direct);

        let leave = route_outbound(
            PeerMessage::Leave {
                participant_id: ParticipantId("alice".into()),
            },
            TopologyRole::Participant,
        );
        assert_eq!(leave.scope, RelayScope::Direct);
    }

    #[test]
    fn host_output_is_always_direct() {
        let envelope = route_outbound(submission(), TopologyRole::Host);
        assert_eq!(envelope.scope, RelayScope::Direct);
    }
}
