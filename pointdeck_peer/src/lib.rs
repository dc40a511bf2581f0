// pointdeck_peer: node runtime for Pointdeck estimation sessions.
//
// A Pointdeck session is a star: one participant hosts a room, everyone
// else holds a single TCP connection to the host, and the host relays state
// so every node converges on the same roster, submissions, and round phase.
// This crate implements one node of that topology, in either role.
//
// Module overview:
// - `store.rs`:  Session state store: the authoritative participant roster
//                and the mutation contract every replicated message maps to.
// - `round.rs`:  Round lifecycle state machine (collecting, all-submitted,
//                revealed) with the host-only policy checks.
// - `router.rs`: Relay routing: pure decisions from (envelope, role) to
//                local application and fan-out.
// - `net.rs`:    TCP transport: accept thread, one reader thread per
//                connection, buffered fire-and-forget write halves.
// - `node.rs`:   The single control thread tying the above together, plus
//                the `start_host`/`start_participant` entry points.
// - `room.rs`:   Room token and participant identity generation.
//
// Dependencies: `pointdeck_protocol` (message types and framing). The
// binary (`main.rs`) adds terminal rendering and stdin input on top.

pub mod net;
pub mod node;
pub mod room;
pub mod round;
pub mod router;
pub mod store;

pub use node::{HostConfig, JoinConfig, NodeHandle, StateSink, start_host, start_participant};
pub use round::RoundPhase;
pub use router::TopologyRole;
