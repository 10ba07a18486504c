//! Pause Arbiter
//!
//! Runs on pause/unpause edges of a single session and decides whether the
//! change spreads to the party or gets reversed.

use tracing::{debug, info, warn};

use super::Outcome;
use crate::party::{Party, PauseControl};
use crate::sync::{PartyRuntime, PlaystateCommand};

/// Pause votes needed with `connected` participants
pub fn required_votes(connected: usize) -> usize {
    connected.div_ceil(2).max(1)
}

/// Send `command` to every session but `origin`, recording the pause state we expect back
fn broadcast(
    party: &Party,
    runtime: &mut PartyRuntime,
    origin: Option<&str>,
    command: PlaystateCommand,
    out: &mut Outcome,
) {
    let paused = command == PlaystateCommand::Pause;
    for session_id in runtime.sessions_except(origin) {
        debug!("[Party {}] {} session {}", party.id, command.as_str(), session_id);
        runtime.expect_pause(&session_id, paused);
        out.send(&party.id, &session_id, command);
    }
}

/// Send `command` back to the session that broke the rules
fn reverse(party: &Party, runtime: &mut PartyRuntime, session_id: &str, command: PlaystateCommand, out: &mut Outcome) {
    runtime.expect_pause(session_id, command == PlaystateCommand::Pause);
    out.send(&party.id, session_id, command);
}

/// A session went from playing to paused
pub(super) fn on_pause(
    party: &Party,
    runtime: &mut PartyRuntime,
    participant_id: &str,
    session_id: &str,
    is_host: bool,
    out: &mut Outcome,
) {
    if runtime.party_paused {
        debug!("[Party {}] {} paused along with the party", party.id, participant_id);
        return;
    }

    match party.pause_control {
        PauseControl::Anyone => {
            info!("[Party {}] {} paused, pausing everyone else", party.id, participant_id);
            runtime.party_paused = true;
            broadcast(party, runtime, Some(session_id), PlaystateCommand::Pause, out);
        }
        PauseControl::Host if is_host => {
            info!("[Party {}] Host {} paused, pausing everyone else", party.id, participant_id);
            runtime.party_paused = true;
            broadcast(party, runtime, Some(session_id), PlaystateCommand::Pause, out);
        }
        PauseControl::Host => {
            warn!("[Party {}] {} tried to pause (host only), unpausing", party.id, participant_id);
            reverse(party, runtime, session_id, PlaystateCommand::Unpause, out);
        }
        PauseControl::Vote => {
            runtime.pause_votes.insert(participant_id.to_string());
            let votes = runtime.pause_votes.len();
            let required = required_votes(runtime.len());
            info!("[Party {}] Pause vote: {}/{} (participants: {})", party.id, votes, required, runtime.len());

            if votes >= required {
                info!("[Party {}] Pause vote passed, pausing everyone", party.id);
                runtime.party_paused = true;
                broadcast(party, runtime, Some(session_id), PlaystateCommand::Pause, out);
            } else {
                info!("[Party {}] Not enough votes, unpausing {}", party.id, participant_id);
                reverse(party, runtime, session_id, PlaystateCommand::Unpause, out);
            }
        }
    }
}

/// A session went from paused to playing
pub(super) fn on_unpause(
    party: &Party,
    runtime: &mut PartyRuntime,
    session_id: &str,
    is_host: bool,
    out: &mut Outcome,
) {
    let who = runtime
        .by_session(session_id)
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| session_id.to_string());

    match party.pause_control {
        PauseControl::Anyone => {
            info!("[Party {}] {} unpaused, unpausing everyone else", party.id, who);
            runtime.party_paused = false;
            broadcast(party, runtime, Some(session_id), PlaystateCommand::Unpause, out);
        }
        PauseControl::Host if is_host => {
            info!("[Party {}] Host {} unpaused, unpausing everyone else", party.id, who);
            runtime.party_paused = false;
            broadcast(party, runtime, Some(session_id), PlaystateCommand::Unpause, out);
        }
        PauseControl::Host => {
            if runtime.party_paused {
                warn!("[Party {}] {} tried to unpause (host only), re-pausing", party.id, who);
                reverse(party, runtime, session_id, PlaystateCommand::Pause, out);
            }
        }
        PauseControl::Vote => {
            info!("[Party {}] {} unpaused, clearing pause votes", party.id, who);
            runtime.pause_votes.clear();
            runtime.party_paused = false;
            broadcast(party, runtime, Some(session_id), PlaystateCommand::Unpause, out);
        }
    }
}
