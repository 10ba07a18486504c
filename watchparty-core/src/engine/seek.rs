//! Seek Guard

use tracing::warn;

use super::Outcome;
use crate::party::Party;

/// Check a playing, non-host session against the party's seek rules.
/// Returns true if a correction was issued.
pub(super) fn guard(party: &Party, session_id: &str, position_ms: u64, offset_ms: u64, out: &mut Outcome) -> bool {
    if !party.host_only_seek && !party.lock_seek_ahead {
        return false;
    }

    let canonical = party.position_ms;
    let tolerance = party.tolerance_ms();

    let ahead = position_ms.saturating_sub(canonical);
    if party.lock_seek_ahead && ahead > tolerance {
        warn!(
            "[Party {}] Session {} seeked ahead {:.1}s, syncing back",
            party.id,
            session_id,
            ahead as f64 / 1000.0
        );
        out.correct(party, session_id, offset_ms);
        return true;
    }

    let drift = position_ms.abs_diff(canonical);
    if party.host_only_seek && drift > tolerance {
        warn!(
            "[Party {}] Session {} seeked {:.1}s away (host only), syncing back",
            party.id,
            session_id,
            drift as f64 / 1000.0
        );
        out.correct(party, session_id, offset_ms);
        return true;
    }

    false
}
