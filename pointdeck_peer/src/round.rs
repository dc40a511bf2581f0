// Round lifecycle state machine.
//
// Collecting -> AllSubmitted -> Revealed -> (reset) -> Collecting.
//
// Submissions drive the first transition through store completeness; reveal
// and reset are host-only control actions, rejected as no-ops when invoked
// on a participant node. Observations of remote reveal/reset messages are
// unconditional: the host's word is authoritative, whatever phase a node
// thought it was in.

use log::debug;

use crate::router::TopologyRole;

/// Lifecycle phase of the current round.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundPhase {
    /// Waiting for submissions. Initial phase, and the phase after a reset.
    Collecting,
    /// Every participant has a value. The host may now reveal.
    AllSubmitted,
    /// Values are visible. Only a reset leaves this phase.
    Revealed,
}

/// Small state machine governing the round lifecycle for one node.
#[derive(Debug)]
pub struct RoundController {
    phase: RoundPhase,
    role: TopologyRole,
}

impl RoundController {
    pub fn new(role: TopologyRole) -> Self {
        Self {
            phase: RoundPhase::Collecting,
            role,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Re-derive the phase after a roster mutation. Completeness moves
    /// `Collecting` to `AllSubmitted`; losing completeness (a late join)
    /// moves back. `Revealed` is sticky until a reset.
    ///
    /// Returns true when the round just became complete.
    pub fn reevaluate(&mut self, complete: bool) -> bool {
        match (self.phase, complete) {
            (RoundPhase::Collecting, true) => {
                self.phase = RoundPhase::AllSubmitted;
                true
            }
            (RoundPhase::AllSubmitted, false) => {
                self.phase = RoundPhase::Collecting;
                false
            }
            _ => false,
        }
    }

    /// Local reveal request. Only the host may reveal, and only once every
    /// participant has submitted. Returns whether the reveal proceeds.
    pub fn request_reveal(&mut self) -> bool {
        if self.role != TopologyRole::Host {
            debug!("ignoring reveal request on a participant node");
            return false;
        }
        if self.phase != RoundPhase::AllSubmitted {
            debug!("ignoring reveal request in phase {:?}", self.phase);
            return false;
        }
        self.phase = RoundPhase::Revealed;
        true
    }

    /// Local reset request. Only the host may start a new round; a host
    /// reset is valid from any phase.
    pub fn request_reset(&mut self) -> bool {
        if self.role != TopologyRole::Host {
            debug!("ignoring reset request on a participant node");
            return false;
        }
        self.phase = RoundPhase::Collecting;
        true
    }

    /// A remote reveal was observed. Unconditional.
    pub fn observe_reveal(&mut self) {
        self.phase = RoundPhase::Revealed;
    }

    /// A remote reset was observed. Unconditional and authoritative.
    pub fn observe_reset(&mut self) {
        self.phase = RoundPhase::Collecting;
    }

    /// Derive the phase from a freshly applied snapshot: any revealed
    /// record means the round is revealed, otherwise completeness decides.
    pub fn observe_sync(&mut self, complete: bool, any_revealed: bool) {
        self.phase = if any_revealed {
            RoundPhase::Revealed
        } else if complete {
            RoundPhase::AllSubmitted
        } else {
            RoundPhase::Collecting
        };
    }
}
