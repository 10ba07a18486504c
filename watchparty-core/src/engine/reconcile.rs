//! Position Reconciler
//!
//! The periodic pass over every active party: evicts idle participants,
//! flags viewers that fell far behind, and seeks drifting sessions back to
//! the party position.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{authority, locate, ContentIndex, Outcome, PartyEngine};
use crate::party::Party;
use crate::sync::LiveSession;

impl PartyEngine {
    /// Run one reconciliation tick against the live session list
    pub fn on_tick(
        &mut self,
        parties: &mut [Party],
        index: &ContentIndex,
        sessions: &[LiveSession],
        now: DateTime<Utc>,
    ) -> Outcome {
        let mut out = Outcome::default();
        self.retain_parties(parties);

        for party in parties.iter() {
            if index.is_unresolvable(&party.id) {
                warn!("[Party {}] Item {} no longer exists", party.id, party.item_id);
                out.unresolvable.push(party.id.clone());
            }
        }

        // Resolve each session's party once for the whole tick
        let owners: Vec<Option<usize>> = sessions
            .iter()
            .map(|s| s.item.as_ref().and_then(|item| locate(parties, index, item)))
            .collect();

        let offset = self.sync_offset_ms;

        for (i, party) in parties.iter_mut().enumerate() {
            if !party.is_active || index.is_unresolvable(&party.id) {
                continue;
            }
            let runtime = self.runtimes.entry(party.id.clone()).or_default();

            if party.auto_kick_inactive {
                let timeout = Duration::minutes(party.inactive_timeout_minutes.max(1));
                let mut host_evicted = false;
                for p in runtime.evict_inactive(timeout, now) {
                    info!(
                        "[Party {}] Removing inactive participant {} (idle since {})",
                        party.id, p.display_name, p.last_activity_at
                    );
                    host_evicted |= party.is_host(&p.participant_id);
                    out.evicted.push((party.id.clone(), p.participant_id));
                }
                if host_evicted {
                    authority::on_host_departure(party, runtime, &mut out);
                }
            }

            if party.position_ms == 0 && !party.is_waiting_room {
                continue;
            }
            debug!("[Party {}] Periodic sync check at {}ms", party.id, party.position_ms);

            let tolerance = party.tolerance_ms();
            let buffer_threshold = party.buffer_threshold_ms();

            for (session, _) in sessions.iter().zip(&owners).filter(|(_, owner)| **owner == Some(i)) {
                runtime.update_activity(&session.participant_id, session.position_ms, session.paused, now);

                let diff = session.position_ms.abs_diff(party.position_ms);
                let behind = session.position_ms < party.position_ms;

                if diff > buffer_threshold && behind {
                    warn!(
                        "[Party {}] Session {} is {:.1}s behind (exceeds buffer threshold)",
                        party.id,
                        session.session_id,
                        diff as f64 / 1000.0
                    );
                    if let Some(p) = runtime.participants.get_mut(&session.participant_id) {
                        p.is_buffering = true;
                    }
                }

                if diff > tolerance {
                    info!(
                        "[Party {}] Session {} is {:.1}s out of sync, syncing",
                        party.id,
                        session.session_id,
                        diff as f64 / 1000.0
                    );
                    out.correct(party, &session.session_id, offset);
                } else {
                    debug!(
                        "[Party {}] Session {} is in sync (diff: {:.1}s)",
                        party.id,
                        session.session_id,
                        diff as f64 / 1000.0
                    );
                    if let Some(p) = runtime.participants.get_mut(&session.participant_id) {
                        p.is_buffering = false;
                    }
                }
            }
        }

        out
    }
}
