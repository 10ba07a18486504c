//! Sync Engine
//!
//! A synchronous state machine over the party list. Each entry point takes
//! the current parties, applies one event, and returns an [`Outcome`]:
//! commands for the transport and field updates for the store. Nothing in
//! here performs I/O, so the rules can be driven directly from tests.

mod authority;
mod locator;
mod pause;
mod reconcile;
mod seek;
mod waiting_room;

pub use locator::*;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::party::{Party, PartyUpdate};
use crate::store::DEFAULT_SYNC_OFFSET_MS;
use crate::sync::{
    ParticipantSnapshot, PartyRuntime, PlaybackProgress, PlaybackStart, PlaybackStop,
    PlaystateCommand, SessionCommand,
};

/// Side effects produced by one engine step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Commands to send, in issue order
    pub commands: Vec<SessionCommand>,
    /// Runtime-owned party fields to persist (one entry per party)
    pub updates: Vec<PartyUpdate>,
    /// Parties whose content no longer resolves
    pub unresolvable: Vec<String>,
    /// Participants evicted for inactivity, as (party ID, participant ID)
    pub evicted: Vec<(String, String)>,
}

impl Outcome {
    /// Queue a command
    pub fn send(&mut self, party_id: &str, session_id: &str, command: PlaystateCommand) {
        self.commands.push(SessionCommand::new(party_id, session_id, command));
    }

    /// Queue a seek that brings a session to the party position
    pub fn correct(&mut self, party: &Party, session_id: &str, offset_ms: u64) {
        let target = party.position_ms.saturating_add(offset_ms);
        self.send(&party.id, session_id, PlaystateCommand::SeekTo(target));
    }

    /// Record the party's runtime-owned fields for persistence
    pub fn persist(&mut self, party: &Party) {
        let update = party.runtime_update();
        match self.updates.iter_mut().find(|u| u.party_id == update.party_id) {
            Some(existing) => *existing = update,
            None => self.updates.push(update),
        }
    }

    /// Number of correction seeks queued
    pub fn corrections(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c.command, PlaystateCommand::SeekTo(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty() && self.updates.is_empty() && self.unresolvable.is_empty()
    }
}

/// Owns the runtime state of every party
#[derive(Debug)]
pub struct PartyEngine {
    runtimes: HashMap<String, PartyRuntime>,
    /// Forward offset added to correction seeks, covering command latency
    sync_offset_ms: u64,
}

impl Default for PartyEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PartyEngine {
    pub fn new() -> Self {
        Self {
            runtimes: HashMap::new(),
            sync_offset_ms: DEFAULT_SYNC_OFFSET_MS,
        }
    }

    /// Set the correction offset (re-read from settings before each step)
    pub fn set_sync_offset_ms(&mut self, offset_ms: u64) {
        self.sync_offset_ms = offset_ms;
    }

    pub fn sync_offset_ms(&self) -> u64 {
        self.sync_offset_ms
    }

    /// Runtime state of a party, if any participant ever showed up
    pub fn runtime(&self, party_id: &str) -> Option<&PartyRuntime> {
        self.runtimes.get(party_id)
    }

    /// Participant listing for a party
    pub fn participants(&self, party: &Party) -> Vec<ParticipantSnapshot> {
        self.runtimes
            .get(&party.id)
            .map(|rt| rt.snapshot(party))
            .unwrap_or_default()
    }

    /// Drop runtime state of parties that were removed from the store
    pub fn retain_parties(&mut self, parties: &[Party]) {
        let live: HashSet<&str> = parties.iter().map(|p| p.id.as_str()).collect();
        self.runtimes.retain(|id, _| {
            let keep = live.contains(id.as_str());
            if !keep {
                info!("Party {} was removed, cleaning up", id);
            }
            keep
        });
    }

    /// A session started playing something
    pub fn on_playback_start(
        &mut self,
        parties: &mut [Party],
        index: &ContentIndex,
        event: &PlaybackStart,
        now: DateTime<Utc>,
    ) -> Outcome {
        let mut out = Outcome::default();
        let Some(i) = locate(parties, index, &event.item) else {
            debug!("Item {} is not watch party content", event.item.item_id);
            return out;
        };
        let party = &mut parties[i];
        if !party.is_active {
            debug!("[Party {}] Not active, ignoring start", party.id);
            return out;
        }

        let offset = self.sync_offset_ms;
        let runtime = self.runtimes.entry(party.id.clone()).or_default();
        let pid = event.participant_id.as_str();
        let sid = event.session_id.as_str();

        if !runtime.can_join(party, pid) {
            warn!("[Party {}] Access denied for {}", party.id, pid);
            out.send(&party.id, sid, PlaystateCommand::Stop);
            return out;
        }

        let is_new = !runtime.contains(pid);
        let participant = runtime.get_or_create(pid, &event.display_name, sid, now);
        if participant.session_id != sid {
            debug!("[Party {}] {} moved to session {}", party.id, pid, sid);
            participant.session_id = sid.to_string();
        }
        if is_new {
            info!("[Party {}] New participant: {} ({})", party.id, event.display_name, pid);
        }
        runtime.update_activity(pid, event.position_ms, false, now);

        authority::claim_if_vacant(party, runtime, pid, sid, &mut out);
        let is_host = party.is_host(pid);
        if is_host {
            runtime.host_session_id = Some(sid.to_string());
        }

        let was_synced = runtime.synced_sessions.contains(sid);
        let was_paused = runtime.session_pause.get(sid).copied().unwrap_or(false);

        // Watch parties start from the party position, never from a personal resume point
        if !was_synced && !was_paused {
            runtime.synced_sessions.insert(sid.to_string());
            if !is_host && (event.position_ms > 0 || party.position_ms > 0) {
                info!(
                    "[Party {}] First sync for {} ({}ms, party at {}ms)",
                    party.id, pid, event.position_ms, party.position_ms
                );
                out.correct(party, sid, offset);
            }
        }

        if party.is_waiting_room && !party.is_playing {
            waiting_room::admit(party, runtime, pid, sid, &mut out);
            return out;
        }

        if was_paused {
            info!("[Party {}] {} resumed from pause, forcing sync", party.id, pid);
            runtime.session_pause.insert(sid.to_string(), false);
            out.correct(party, sid, offset);
        }

        out
    }

    /// A session reported its position
    pub fn on_playback_progress(
        &mut self,
        parties: &mut [Party],
        index: &ContentIndex,
        event: &PlaybackProgress,
        now: DateTime<Utc>,
    ) -> Outcome {
        let mut out = Outcome::default();
        let Some(i) = locate(parties, index, &event.item) else {
            return out;
        };
        let party = &mut parties[i];
        if !party.is_active || !party.allows(&event.participant_id) {
            return out;
        }

        let offset = self.sync_offset_ms;
        let runtime = self.runtimes.entry(party.id.clone()).or_default();
        let pid = event.participant_id.as_str();
        let sid = event.session_id.as_str();

        if !runtime.update_activity(pid, event.position_ms, event.paused, now) {
            debug!("[Party {}] Progress from unknown participant {}", party.id, pid);
            return out;
        }

        let was_paused = runtime
            .session_pause
            .insert(sid.to_string(), event.paused)
            .unwrap_or(false);
        // Reports still catching up with a command we sent are not edges
        let commanded = runtime.settle_pause(sid, event.paused);

        let is_host = party.is_host(pid);
        let assembling = party.is_waiting_room && !party.is_playing;

        if !assembling && !commanded {
            if event.paused && !was_paused {
                pause::on_pause(party, runtime, pid, sid, is_host, &mut out);
            } else if !event.paused && was_paused {
                pause::on_unpause(party, runtime, sid, is_host, &mut out);
            }
        }

        if !event.paused && !is_host {
            seek::guard(party, sid, event.position_ms, offset, &mut out);
        }

        if is_host {
            party.position_ms = event.position_ms;
            party.is_playing = !event.paused;
            runtime.host_session_id = Some(sid.to_string());
            debug!(
                "[Party {}] Host moved party to {}ms, playing: {}",
                party.id, party.position_ms, party.is_playing
            );
            out.persist(party);
        }

        out
    }

    /// A session stopped playing
    pub fn on_playback_stop(
        &mut self,
        parties: &mut [Party],
        index: &ContentIndex,
        event: &PlaybackStop,
        _now: DateTime<Utc>,
    ) -> Outcome {
        let mut out = Outcome::default();
        let Some(i) = locate(parties, index, &event.item) else {
            return out;
        };
        let party = &mut parties[i];
        if !party.is_active {
            return out;
        }

        let runtime = self.runtimes.entry(party.id.clone()).or_default();
        let pid = event.participant_id.as_str();

        if let Some(p) = runtime.remove(pid) {
            info!("[Party {}] Participant left: {}", party.id, p.display_name);
        }

        if party.is_host(pid) {
            authority::on_host_departure(party, runtime, &mut out);
        } else {
            runtime.forget_session(pid, &event.session_id);
            // Readiness of listed participants counts for the whole episode
            if !party.is_restricted() {
                runtime.unmark_ready(pid);
            }
        }

        out
    }

    /// Admin start: leave the waiting room without a quorum
    pub fn start_party(&mut self, party: &mut Party) -> Outcome {
        let mut out = Outcome::default();
        let runtime = self.runtimes.entry(party.id.clone()).or_default();
        if party.is_playing && !party.is_waiting_room {
            debug!("[Party {}] Already playing", party.id);
            return out;
        }
        waiting_room::start(party, runtime, &mut out);
        out
    }

    /// Admin ready toggle for a participant
    pub fn set_ready(&mut self, party: &mut Party, participant_id: &str, ready: bool) -> Outcome {
        let mut out = Outcome::default();
        let runtime = self.runtimes.entry(party.id.clone()).or_default();
        if ready {
            runtime.mark_ready(participant_id);
            waiting_room::evaluate(party, runtime, &mut out);
        } else {
            runtime.unmark_ready(participant_id);
        }
        out
    }
}
