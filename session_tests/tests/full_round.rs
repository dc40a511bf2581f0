// End-to-end tests for session replication over real TCP.
//
// Each test starts a real hosting node, joins real participant nodes, and
// drives rounds through the public handles, observing the replicated state
// through the presentation sink. These exercise the same code paths as the
// CLI binary.

use std::thread;
use std::time::Duration;

use pointdeck_peer::round::RoundPhase;
use pointdeck_protocol::message::SessionSnapshot;
use pointdeck_protocol::types::ParticipantId;
use session_tests::TestParticipant;

const TOKEN: &str = "Q7XK2M";

fn host_id() -> ParticipantId {
    ParticipantId(format!("room-{TOKEN}"))
}

/// Value submitted by the participant with the given nickname, if any.
fn value_of(snapshot: &SessionSnapshot, nickname: &str) -> Option<i64> {
    snapshot
        .participants
        .values()
        .find(|p| p.nickname == nickname)
        .and_then(|p| p.value)
}

fn submitted_count(snapshot: &SessionSnapshot) -> usize {
    snapshot
        .participants
        .values()
        .filter(|p| p.value.is_some())
        .count()
}

/// Start a host plus two joined participants; wait until every node sees
/// all three records.
fn three_party_session() -> (TestParticipant, TestParticipant, TestParticipant) {
    let (mut host, addr) = TestParticipant::host(TOKEN, "HOST");
    let mut a = TestParticipant::join(addr, TOKEN, "Ada");
    let mut b = TestParticipant::join(addr, TOKEN, "Brin");
    for node in [&mut host, &mut a, &mut b] {
        node.wait_for("3 participants", |snapshot, _| {
            snapshot.participants.len() == 3
        });
    }
    (host, a, b)
}

/// Three submissions complete the round exactly on the third, reveal shows
/// unchanged values, reset clears everything.
#[test]
fn full_round_lifecycle() {
    let (mut host, mut a, mut b) = three_party_session();

    a.submit(3);
    b.submit(5);

    // Two of three submitted: still collecting, on every node.
    for node in [&mut host, &mut a, &mut b] {
        let (_, phase) = node.wait_for("two submissions", |snapshot, _| {
            submitted_count(snapshot) == 2
        });
        assert_eq!(phase, RoundPhase::Collecting);
    }

    // The host's own submission is the third: the round completes.
    host.submit(4);
    for node in [&mut host, &mut a, &mut b] {
        let (snapshot, _) = node.wait_for("round complete", |_, phase| {
            phase == RoundPhase::AllSubmitted
        });
        assert_eq!(value_of(&snapshot, "HOST"), Some(4));
        assert_eq!(value_of(&snapshot, "Ada"), Some(3));
        assert_eq!(value_of(&snapshot, "Brin"), Some(5));
        assert!(snapshot.participants.values().all(|p| !p.revealed));
    }

    host.reveal();
    for node in [&mut host, &mut a, &mut b] {
        let (snapshot, _) = node.wait_for("reveal", |_, phase| phase == RoundPhase::Revealed);
        assert!(snapshot.participants.values().all(|p| p.revealed));
        assert_eq!(value_of(&snapshot, "HOST"), Some(4));
        assert_eq!(value_of(&snapshot, "Ada"), Some(3));
        assert_eq!(value_of(&snapshot, "Brin"), Some(5));
    }

    host.reset();
    for node in [&mut host, &mut a, &mut b] {
        let (snapshot, _) = node.wait_for("reset", |snapshot, phase| {
            phase == RoundPhase::Collecting && submitted_count(snapshot) == 0
        });
        assert!(
            snapshot
                .participants
                .values()
                .all(|p| p.value.is_none() && !p.revealed)
        );
        assert_eq!(snapshot.participants.len(), 3);
    }

    a.stop();
    b.stop();
    host.stop();
}

/// A reveal invoked on a participant node is rejected by policy: nothing
/// is broadcast and no state changes anywhere.
#[test]
fn participant_reveal_is_rejected() {
    let (mut host, mut a, mut b) = three_party_session();

    a.reveal();
    thread::sleep(Duration::from_millis(200));

    for node in [&mut host, &mut a, &mut b] {
        let (snapshot, phase) = node.current().expect("state observed");
        assert_ne!(phase, RoundPhase::Revealed);
        assert!(snapshot.participants.values().all(|p| !p.revealed));
    }

    a.stop();
    b.stop();
    host.stop();
}

/// A late joiner is brought up to date by the host's authoritative sync:
/// it sees the full roster, including values submitted before it arrived.
#[test]
fn late_joiner_receives_full_roster() {
    let (mut host, addr) = TestParticipant::host(TOKEN, "HOST");
    let mut a = TestParticipant::join(addr, TOKEN, "Ada");
    for node in [&mut host, &mut a] {
        node.wait_for("2 participants", |snapshot, _| {
            snapshot.participants.len() == 2
        });
    }
    a.submit(8);
    host.wait_for("ada's submission", |snapshot, _| {
        value_of(snapshot, "Ada") == Some(8)
    });

    let mut b = TestParticipant::join(addr, TOKEN, "Brin");
    let (snapshot, phase) = b.wait_for("full roster", |snapshot, _| {
        snapshot.participants.len() == 3
    });
    assert!(snapshot.participants.contains_key(&host_id()));
    assert_eq!(value_of(&snapshot, "Ada"), Some(8));
    // The newcomer has not submitted, so the round is open again.
    assert_eq!(phase, RoundPhase::Collecting);

    a.stop();
    b.stop();
    host.stop();
}

/// A departing participant stops blocking completion: when everyone still
/// present has submitted, the round completes on the remaining nodes.
#[test]
fn leave_unblocks_the_round() {
    let (mut host, mut a, b) = three_party_session();

    a.submit(3);
    host.submit(4);
    for node in [&mut host, &mut a] {
        let (_, phase) = node.wait_for("two submissions", |snapshot, _| {
            submitted_count(snapshot) == 2
        });
        assert_eq!(phase, RoundPhase::Collecting);
    }

    // Brin leaves without submitting.
    b.stop();
    for node in [&mut host, &mut a] {
        let (snapshot, phase) = node.wait_for("departure completes round", |snapshot, _| {
            snapshot.participants.len() == 2
        });
        assert_eq!(phase, RoundPhase::AllSubmitted);
        assert_eq!(submitted_count(&snapshot), 2);
    }

    a.stop();
    host.stop();
}

/// Nickname changes propagate to every node.
#[test]
fn rename_propagates() {
    let (mut host, mut a, mut b) = three_party_session();

    a.rename("Grace");
    for node in [&mut host, &mut a, &mut b] {
        node.wait_for("rename", |snapshot, _| {
            snapshot
                .participants
                .values()
                .any(|p| p.nickname == "Grace")
        });
    }

    a.stop();
    b.stop();
    host.stop();
}

/// Submissions may change while the round stays complete; the revealed
/// flag survives a post-reveal submission.
#[test]
fn revealed_flag_survives_a_changed_value() {
    let (mut host, mut a, mut b) = three_party_session();

    a.submit(3);
    b.submit(5);
    host.submit(4);
    host.wait_for("round complete", |_, phase| phase == RoundPhase::AllSubmitted);
    host.reveal();
    for node in [&mut host, &mut a, &mut b] {
        node.wait_for("reveal", |_, phase| phase == RoundPhase::Revealed);
    }

    a.submit(13);
    for node in [&mut host, &mut a, &mut b] {
        let (snapshot, phase) = node.wait_for("changed value", |snapshot, _| {
            value_of(snapshot, "Ada") == Some(13)
        });
        assert_eq!(phase, RoundPhase::Revealed);
        assert!(snapshot.participants.values().all(|p| p.revealed));
    }

    a.stop();
    b.stop();
    host.stop();
}
