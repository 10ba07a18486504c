//! Host Authority
//!
//! Only the host's reports move the party clock. Nobody else is consulted,
//! which keeps "where is the party" a single-writer value.

use tracing::info;

use super::Outcome;
use crate::party::Party;
use crate::sync::PartyRuntime;

/// Make `participant_id` host if the party has none
pub(super) fn claim_if_vacant(
    party: &mut Party,
    runtime: &mut PartyRuntime,
    participant_id: &str,
    session_id: &str,
    out: &mut Outcome,
) {
    if party.host_participant_id.as_deref().is_some_and(|h| !h.is_empty()) {
        return;
    }
    info!("[Party {}] No host set, {} takes over", party.id, participant_id);
    party.host_participant_id = Some(participant_id.to_string());
    runtime.host_session_id = Some(session_id.to_string());
    out.persist(party);
}

/// The host stopped watching: pause the clock, wipe per-session tracking so
/// returning viewers resync cleanly, and hand authority to the earliest
/// remaining joiner. The party position is kept.
pub(super) fn on_host_departure(party: &mut Party, runtime: &mut PartyRuntime, out: &mut Outcome) {
    info!(
        "[Party {}] Host {} stopped (keeping position {}ms)",
        party.id,
        party.host_participant_id.as_deref().unwrap_or("?"),
        party.position_ms
    );

    party.is_playing = false;
    runtime.reset_sync();
    runtime.host_session_id = None;

    if let Some(next) = runtime.earliest_joined() {
        info!("[Party {}] Assigned new host: {}", party.id, next.display_name);
        party.host_participant_id = Some(next.participant_id.clone());
        runtime.host_session_id = Some(next.session_id.clone());
    }

    out.persist(party);
}
