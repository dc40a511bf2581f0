// Core identity types for the session protocol.
//
// These are lightweight newtypes shared by `message.rs` (wire messages) and
// the peer runtime (`pointdeck_peer`). A participant identity is a
// globally-addressable string, one per process instance; a room token is the
// short human-shareable handle a host hands out, from which the host's own
// identity is derived by a fixed-prefix transform.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Globally-addressable participant identity. One per process instance,
/// stable for the lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Default display nickname: the first five characters of the
    /// identifier, uppercased.
    pub fn short_name(&self) -> String {
        self.0.chars().take(5).collect::<String>().to_uppercase()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short human-shareable room handle. Joining a room requires only this
/// token; the host's session identity is derived from it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomToken(pub String);

impl RoomToken {
    /// Parse user input into a token: trims, uppercases, and rejects
    /// anything that is not 1 to 16 ASCII alphanumeric characters.
    pub fn parse(input: &str) -> Result<Self, String> {
        let token = input.trim().to_uppercase();
        if token.is_empty() {
            return Err("room token is empty".into());
        }
        if token.len() > 16 {
            return Err(format!("room token too long: {} chars (max 16)", token.len()));
        }
        if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(format!("room token contains invalid characters: {token}"));
        }
        Ok(Self(token))
    }

    /// The host's session identity, derived from the token by the fixed
    /// `room-` prefix transform. Every joiner connects to the participant
    /// carrying this identity.
    pub fn host_identity(&self) -> ParticipantId {
        ParticipantId(format!("room-{}", self.0))
    }
}

impl fmt::Display for RoomToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Monotonically increasing snapshot sequence number, assigned by the host.
/// A node never applies a snapshot whose sequence is not newer than the last
/// one it applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SnapshotSeq(pub u64);
