//! Party Runtime State
//!
//! Everything the engine knows about a party that is not persisted:
//! who is connected, where they are, and the per-session bookkeeping used
//! by the pause, seek and waiting-room rules.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::party::Party;

/// A participant currently inside a party
#[derive(Debug, Clone)]
pub struct Participant {
    pub participant_id: String,
    pub display_name: String,
    /// Session handle owned by the transport
    pub session_id: String,
    pub joined_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub position_ms: u64,
    pub is_paused: bool,
    pub is_buffering: bool,
    pub is_ready: bool,
}

/// Read-only view of a participant, for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub participant_id: String,
    pub display_name: String,
    pub is_host: bool,
    pub is_ready: bool,
    pub is_buffering: bool,
    pub is_paused: bool,
    pub position_ms: u64,
    pub joined_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

/// Runtime state of one party
#[derive(Debug, Default)]
pub struct PartyRuntime {
    /// Connected participants keyed by participant ID
    pub participants: HashMap<String, Participant>,
    /// Sessions that have been brought to the party position at least once
    pub synced_sessions: HashSet<String>,
    /// Last pause flag reported per session
    pub session_pause: HashMap<String, bool>,
    /// Pause state commanded per session and not yet confirmed by a report
    pub expected_pause: HashMap<String, bool>,
    /// Participants currently voting for a pause
    pub pause_votes: HashSet<String>,
    /// Participants that signalled ready in the current waiting-room episode
    pub ready: HashSet<String>,
    /// Session handle of the current host
    pub host_session_id: Option<String>,
    /// Whether a pause has been spread to the whole party
    pub party_paused: bool,
}

impl PartyRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the participant, creating it if this is its first appearance
    pub fn get_or_create(
        &mut self,
        participant_id: &str,
        display_name: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> &mut Participant {
        self.participants
            .entry(participant_id.to_string())
            .or_insert_with(|| Participant {
                participant_id: participant_id.to_string(),
                display_name: if display_name.is_empty() {
                    participant_id.to_string()
                } else {
                    display_name.to_string()
                },
                session_id: session_id.to_string(),
                joined_at: now,
                last_activity_at: now,
                position_ms: 0,
                is_paused: false,
                is_buffering: false,
                is_ready: false,
            })
    }

    /// Record a position report. Returns false if the participant is unknown.
    pub fn update_activity(
        &mut self,
        participant_id: &str,
        position_ms: u64,
        paused: bool,
        now: DateTime<Utc>,
    ) -> bool {
        match self.participants.get_mut(participant_id) {
            Some(p) => {
                p.last_activity_at = now;
                p.position_ms = position_ms;
                p.is_paused = paused;
                true
            }
            None => false,
        }
    }

    /// Remove a participant
    pub fn remove(&mut self, participant_id: &str) -> Option<Participant> {
        self.participants.remove(participant_id)
    }

    /// Whether the participant is connected
    pub fn contains(&self, participant_id: &str) -> bool {
        self.participants.contains_key(participant_id)
    }

    /// Number of connected participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Whether the participant may enter the party
    pub fn can_join(&self, party: &Party, participant_id: &str) -> bool {
        if !party.allows(participant_id) {
            return false;
        }
        // Participants already inside are never turned away by the cap
        self.contains(participant_id) || self.len() < party.max_participants
    }

    /// Session handles of every connected participant except `exclude`
    pub fn sessions_except(&self, exclude: Option<&str>) -> Vec<String> {
        let mut sessions: Vec<String> = self
            .participants
            .values()
            .map(|p| p.session_id.clone())
            .filter(|s| Some(s.as_str()) != exclude)
            .collect();
        sessions.sort();
        sessions.dedup();
        sessions
    }

    /// Participant whose session is `session_id`
    pub fn by_session(&self, session_id: &str) -> Option<&Participant> {
        self.participants.values().find(|p| p.session_id == session_id)
    }

    /// Mark a participant ready. Returns true if newly marked.
    pub fn mark_ready(&mut self, participant_id: &str) -> bool {
        if let Some(p) = self.participants.get_mut(participant_id) {
            p.is_ready = true;
        }
        self.ready.insert(participant_id.to_string())
    }

    /// Withdraw a participant's ready signal
    pub fn unmark_ready(&mut self, participant_id: &str) {
        if let Some(p) = self.participants.get_mut(participant_id) {
            p.is_ready = false;
        }
        self.ready.remove(participant_id);
    }

    /// Ready signals that count towards the quorum
    pub fn ready_count(&self, party: &Party) -> usize {
        self.ready.iter().filter(|id| party.allows(id)).count()
    }

    /// Remember the pause state a command will put `session_id` in
    pub fn expect_pause(&mut self, session_id: &str, paused: bool) {
        self.expected_pause.insert(session_id.to_string(), paused);
    }

    /// Match a report against the commanded state. Returns true while a
    /// command is outstanding for the session: a matching report confirms
    /// it, any other report predates it and leaves it pending.
    pub fn settle_pause(&mut self, session_id: &str, paused: bool) -> bool {
        match self.expected_pause.get(session_id) {
            Some(&expected) if expected == paused => {
                self.expected_pause.remove(session_id);
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Drop every per-session trace of a participant
    pub fn forget_session(&mut self, participant_id: &str, session_id: &str) {
        self.synced_sessions.remove(session_id);
        self.session_pause.remove(session_id);
        self.expected_pause.remove(session_id);
        self.pause_votes.remove(participant_id);
    }

    /// Clear sync, pause, vote and ready tracking (membership is kept)
    pub fn reset_sync(&mut self) {
        self.synced_sessions.clear();
        self.session_pause.clear();
        self.expected_pause.clear();
        self.pause_votes.clear();
        self.ready.clear();
        self.party_paused = false;
        for p in self.participants.values_mut() {
            p.is_ready = false;
        }
    }

    /// Remove participants idle since before `now - timeout`. Returns the evicted participants.
    pub fn evict_inactive(&mut self, timeout: Duration, now: DateTime<Utc>) -> Vec<Participant> {
        let threshold = now - timeout;
        let stale: Vec<String> = self
            .participants
            .values()
            .filter(|p| p.last_activity_at < threshold)
            .map(|p| p.participant_id.clone())
            .collect();

        let mut evicted = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(p) = self.participants.remove(&id) {
                self.forget_session(&p.participant_id, &p.session_id);
                evicted.push(p);
            }
        }
        evicted
    }

    /// Earliest joiner, ties broken by participant ID
    pub fn earliest_joined(&self) -> Option<&Participant> {
        self.participants
            .values()
            .min_by(|a, b| {
                a.joined_at
                    .cmp(&b.joined_at)
                    .then_with(|| a.participant_id.cmp(&b.participant_id))
            })
    }

    /// Participant list (host first, then others sorted by display name)
    pub fn snapshot(&self, party: &Party) -> Vec<ParticipantSnapshot> {
        let mut list: Vec<ParticipantSnapshot> = self
            .participants
            .values()
            .map(|p| ParticipantSnapshot {
                participant_id: p.participant_id.clone(),
                display_name: p.display_name.clone(),
                is_host: party.is_host(&p.participant_id),
                is_ready: p.is_ready,
                is_buffering: p.is_buffering,
                is_paused: p.is_paused,
                position_ms: p.position_ms,
                joined_at: p.joined_at,
                last_activity_at: p.last_activity_at,
            })
            .collect();
        list.sort_by(|a, b| match (a.is_host, b.is_host) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => a.display_name.to_lowercase().cmp(&b.display_name.to_lowercase()),
        });
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut rt = PartyRuntime::new();
        rt.get_or_create("alice", "Alice", "s1", at(0));
        rt.get_or_create("alice", "Alice Again", "s2", at(10));

        assert_eq!(rt.len(), 1);
        let alice = &rt.participants["alice"];
        assert_eq!(alice.display_name, "Alice");
        assert_eq!(alice.session_id, "s1");
        assert_eq!(alice.joined_at, at(0));
    }

    #[test]
    fn test_update_unknown_participant_is_noop() {
        let mut rt = PartyRuntime::new();
        assert!(!rt.update_activity("ghost", 100, false, at(0)));
        assert!(rt.is_empty());
    }

    #[test]
    fn test_can_join_checks_access_list_and_cap() {
        let mut rt = PartyRuntime::new();
        let party = Party {
            max_participants: 1,
            allowed_participant_ids: vec!["alice".into(), "bob".into()],
            ..Default::default()
        };

        assert!(!rt.can_join(&party, "mallory"));
        assert!(rt.can_join(&party, "alice"));
        rt.get_or_create("alice", "Alice", "s1", at(0));
        assert!(!rt.can_join(&party, "bob"));
        assert!(rt.can_join(&party, "alice"));
    }

    #[test]
    fn test_evict_inactive_clears_session_state() {
        let mut rt = PartyRuntime::new();
        rt.get_or_create("alice", "Alice", "s1", at(0));
        rt.get_or_create("bob", "Bob", "s2", at(0));
        rt.update_activity("bob", 10, false, at(20 * 60));
        rt.synced_sessions.insert("s1".into());
        rt.session_pause.insert("s1".into(), true);
        rt.expect_pause("s1", false);
        rt.pause_votes.insert("alice".into());

        let evicted = rt.evict_inactive(Duration::minutes(15), at(21 * 60));

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].participant_id, "alice");
        assert!(!rt.contains("alice"));
        assert!(rt.contains("bob"));
        assert!(rt.synced_sessions.is_empty());
        assert!(rt.session_pause.is_empty());
        assert!(rt.expected_pause.is_empty());
        assert!(rt.pause_votes.is_empty());
    }

    #[test]
    fn test_settle_pause_waits_for_matching_report() {
        let mut rt = PartyRuntime::new();
        assert!(!rt.settle_pause("s1", true));

        rt.expect_pause("s1", true);
        // A report sent before the command landed
        assert!(rt.settle_pause("s1", false));
        assert_eq!(rt.expected_pause.get("s1"), Some(&true));

        assert!(rt.settle_pause("s1", true));
        assert!(rt.expected_pause.is_empty());
        assert!(!rt.settle_pause("s1", false));
    }

    #[test]
    fn test_earliest_joined_breaks_ties_by_id() {
        let mut rt = PartyRuntime::new();
        rt.get_or_create("carol", "Carol", "s3", at(5));
        rt.get_or_create("bob", "Bob", "s2", at(1));
        rt.get_or_create("alice", "Alice", "s1", at(1));

        assert_eq!(rt.earliest_joined().unwrap().participant_id, "alice");
    }

    #[test]
    fn test_snapshot_lists_host_first() {
        let mut rt = PartyRuntime::new();
        rt.get_or_create("zed", "zed", "s1", at(0));
        rt.get_or_create("amy", "Amy", "s2", at(0));
        rt.get_or_create("bob", "bob", "s3", at(0));
        let party = Party {
            host_participant_id: Some("zed".into()),
            ..Default::default()
        };

        let names: Vec<String> = rt.snapshot(&party).into_iter().map(|p| p.display_name).collect();
        assert_eq!(names, vec!["zed", "Amy", "bob"]);
    }
}
