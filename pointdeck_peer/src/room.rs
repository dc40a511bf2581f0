// Room identity helpers.
//
// A room is addressed by a short shareable token; the host's session
// identity is derived from it (`RoomToken::host_identity`). Every other
// participant gets a fresh UUID per process, which also seeds its default
// nickname.

use pointdeck_protocol::types::{ParticipantId, RoomToken};
use rand::Rng;
use uuid::Uuid;

const TOKEN_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const TOKEN_LEN: usize = 6;

/// Generate a six-character shareable room token.
pub fn generate_room_token() -> RoomToken {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.gen_range(0..TOKEN_ALPHABET.len())] as char)
        .collect();
    RoomToken(token)
}

/// Generate this process's participant identity.
pub fn random_participant_id() -> ParticipantId {
    ParticipantId(Uuid::new_v4().to_string())
}
