//! Waiting Room
//!
//! Parties begin Assembling (waiting room on, not playing). Each arriving
//! viewer is held paused and counted ready; once the quorum is met the whole
//! party is released at once.

use tracing::{debug, info};

use super::Outcome;
use crate::party::Party;
use crate::sync::{PartyRuntime, PlaystateCommand};

/// A participant started playback while the party is assembling
pub(super) fn admit(
    party: &mut Party,
    runtime: &mut PartyRuntime,
    participant_id: &str,
    session_id: &str,
    out: &mut Outcome,
) {
    info!("[Party {}] {} started playback, marking ready", party.id, participant_id);
    runtime.mark_ready(participant_id);

    info!("[Party {}] Holding {} in the waiting room", party.id, participant_id);
    out.send(&party.id, session_id, PlaystateCommand::Pause);
    runtime.expect_pause(session_id, true);

    evaluate(party, runtime, out);
}

/// Check the quorum and start the party if it is met. Returns true if the party started.
pub(super) fn evaluate(party: &mut Party, runtime: &mut PartyRuntime, out: &mut Outcome) -> bool {
    if !party.is_waiting_room || party.is_playing {
        debug!(
            "[Party {}] Skipping waiting room check (waiting room: {}, playing: {})",
            party.id, party.is_waiting_room, party.is_playing
        );
        return false;
    }

    let ready = runtime.ready_count(party);
    let required = if party.is_restricted() {
        party.allowed_participant_ids.len()
    } else {
        runtime.len()
    };
    info!("[Party {}] Waiting room: {}/{} ready", party.id, ready, required);

    if !party.auto_start_when_ready || ready < party.min_ready_count {
        info!(
            "[Party {}] Auto-start not met (enabled: {}, ready {} of minimum {})",
            party.id, party.auto_start_when_ready, ready, party.min_ready_count
        );
        return false;
    }

    let quorum = if party.is_restricted() {
        ready >= required
    } else {
        required > 0 && ready >= required
    };
    if !quorum {
        info!("[Party {}] Not everyone is ready yet: {}/{}", party.id, ready, required);
        return false;
    }

    info!("[Party {}] Everyone ready, starting party", party.id);
    start(party, runtime, out);
    true
}

/// Leave the waiting room and release every connected participant
pub(super) fn start(party: &mut Party, runtime: &mut PartyRuntime, out: &mut Outcome) {
    party.is_waiting_room = false;
    party.is_playing = true;
    out.persist(party);

    for session_id in runtime.sessions_except(None) {
        info!("[Party {}] Starting playback for session {}", party.id, session_id);
        runtime.expect_pause(&session_id, false);
        out.send(&party.id, &session_id, PlaystateCommand::Unpause);
    }
}
