//! Party Definitions
//!
//! The durable description of a watch party as kept by the configuration
//! store. Every field has a default so a partially written document still
//! loads.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::CoreError;

/// Who may pause and unpause the party
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PauseControl {
    /// Any participant pauses everyone
    #[default]
    Anyone,
    /// Only the host pauses everyone; other attempts are reversed
    Host,
    /// A majority of participants must ask for the pause
    Vote,
}

impl From<String> for PauseControl {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "host" => PauseControl::Host,
            "vote" => PauseControl::Vote,
            "anyone" => PauseControl::Anyone,
            other => {
                tracing::warn!("Unknown pause control '{}', falling back to Anyone", other);
                PauseControl::Anyone
            }
        }
    }
}

impl From<PauseControl> for String {
    fn from(value: PauseControl) -> Self {
        match value {
            PauseControl::Anyone => "Anyone",
            PauseControl::Host => "Host",
            PauseControl::Vote => "Vote",
        }
        .to_string()
    }
}

/// The runtime-owned fields of a party, written back to the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyUpdate {
    pub party_id: String,
    pub position_ms: u64,
    pub is_playing: bool,
    pub is_waiting_room: bool,
    pub host_participant_id: Option<String>,
}

/// A watch party as stored in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Party {
    pub id: String,

    // === Content ===
    pub item_id: String,
    pub item_name: String,
    pub item_type: Option<String>,
    pub series_id: Option<String>,
    pub season_id: Option<String>,

    // === Artifact placement ===
    pub collection_name: String,
    pub target_library_id: Option<String>,
    pub target_library_path: Option<String>,

    // === Runtime-owned state ===
    pub is_active: bool,
    pub position_ms: u64,
    pub is_playing: bool,
    pub is_waiting_room: bool,
    #[serde(alias = "masterUserId", alias = "hostUserId")]
    pub host_participant_id: Option<String>,

    // === Membership ===
    pub max_participants: usize,
    pub allowed_participant_ids: Vec<String>,
    pub password_hash: Option<String>,

    // === Waiting room ===
    pub auto_start_when_ready: bool,
    pub min_ready_count: usize,

    // === Playback policy ===
    pub pause_control: PauseControl,
    pub host_only_seek: bool,
    pub lock_seek_ahead: bool,
    pub sync_tolerance_seconds: u64,
    pub max_buffer_threshold_seconds: u64,

    // === Inactivity ===
    pub auto_kick_inactive: bool,
    pub inactive_timeout_minutes: i64,

    pub created_at: DateTime<Utc>,
}

impl Default for Party {
    fn default() -> Self {
        Self {
            id: String::new(),
            item_id: String::new(),
            item_name: String::new(),
            item_type: None,
            series_id: None,
            season_id: None,
            collection_name: "Watch Party".to_string(),
            target_library_id: None,
            target_library_path: None,
            is_active: true,
            position_ms: 0,
            is_playing: false,
            is_waiting_room: true,
            host_participant_id: None,
            max_participants: 50,
            allowed_participant_ids: Vec::new(),
            password_hash: None,
            auto_start_when_ready: true,
            min_ready_count: 1,
            pause_control: PauseControl::Anyone,
            host_only_seek: true,
            lock_seek_ahead: true,
            sync_tolerance_seconds: 10,
            max_buffer_threshold_seconds: 30,
            auto_kick_inactive: true,
            inactive_timeout_minutes: 15,
            created_at: Utc::now(),
        }
    }
}

impl Party {
    /// Sync tolerance in milliseconds
    pub fn tolerance_ms(&self) -> u64 {
        self.sync_tolerance_seconds.saturating_mul(1000)
    }

    /// Buffer threshold in milliseconds
    pub fn buffer_threshold_ms(&self) -> u64 {
        self.max_buffer_threshold_seconds.saturating_mul(1000)
    }

    /// Whether an access list restricts membership
    pub fn is_restricted(&self) -> bool {
        !self.allowed_participant_ids.is_empty()
    }

    /// Whether the participant appears on the access list (always true for public parties)
    pub fn allows(&self, participant_id: &str) -> bool {
        !self.is_restricted() || self.allowed_participant_ids.iter().any(|id| id == participant_id)
    }

    /// Whether the participant is the authoritative host
    pub fn is_host(&self, participant_id: &str) -> bool {
        self.host_participant_id.as_deref() == Some(participant_id)
    }

    /// Check a plain password against the stored hash. Parties without a password accept anything.
    pub fn verify_password(&self, password: Option<&str>) -> bool {
        match self.password_hash.as_deref().filter(|h| !h.is_empty()) {
            None => true,
            Some(hash) => password
                .filter(|p| !p.is_empty())
                .is_some_and(|p| hash_password(p) == hash),
        }
    }

    /// Whether a user may see this party in listings
    pub fn is_visible_to(&self, participant_id: Option<&str>, password: Option<&str>) -> bool {
        if !self.verify_password(password) {
            return false;
        }
        match participant_id {
            Some(id) => self.allows(id),
            None => true,
        }
    }

    /// Snapshot of the fields this crate owns
    pub fn runtime_update(&self) -> PartyUpdate {
        PartyUpdate {
            party_id: self.id.clone(),
            position_ms: self.position_ms,
            is_playing: self.is_playing,
            is_waiting_room: self.is_waiting_room,
            host_participant_id: self.host_participant_id.clone(),
        }
    }

    /// Apply a runtime update coming back from the engine
    pub fn apply(&mut self, update: &PartyUpdate) {
        self.position_ms = update.position_ms;
        self.is_playing = update.is_playing;
        self.is_waiting_room = update.is_waiting_room;
        self.host_participant_id = update.host_participant_id.clone();
    }
}

/// Fresh party identifier
pub fn new_party_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Hash a party password (SHA-256, base64 encoded)
pub fn hash_password(password: &str) -> String {
    if password.is_empty() {
        return String::new();
    }
    BASE64.encode(Sha256::digest(password.as_bytes()))
}

/// Request to create a party, before validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartyDraft {
    pub item_id: String,
    pub item_name: String,
    pub item_type: Option<String>,
    pub series_id: Option<String>,
    pub season_id: Option<String>,
    pub collection_name: Option<String>,
    pub target_library_id: Option<String>,
    pub host_participant_id: Option<String>,
    pub allowed_participant_ids: Vec<String>,
    pub password: Option<String>,
    pub max_participants: Option<usize>,
    pub auto_start_when_ready: Option<bool>,
    pub min_ready_count: Option<usize>,
    pub pause_control: Option<PauseControl>,
    pub host_only_seek: Option<bool>,
    pub lock_seek_ahead: Option<bool>,
    pub sync_tolerance_seconds: Option<u64>,
    pub max_buffer_threshold_seconds: Option<u64>,
    pub auto_kick_inactive: Option<bool>,
    pub inactive_timeout_minutes: Option<i64>,
}

impl PartyDraft {
    /// Turn the draft into a party, filling defaults and rejecting nonsense
    pub fn validate(self) -> Result<Party, CoreError> {
        let defaults = Party::default();

        if self.item_id.trim().is_empty() {
            return Err(CoreError::InvalidParty("item id is required".to_string()));
        }

        let party = Party {
            id: new_party_id(),
            item_id: self.item_id.trim().to_string(),
            item_name: self.item_name,
            item_type: self.item_type,
            series_id: self.series_id,
            season_id: self.season_id,
            collection_name: self
                .collection_name
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(defaults.collection_name.clone()),
            target_library_id: self.target_library_id,
            host_participant_id: self.host_participant_id.filter(|h| !h.is_empty()),
            allowed_participant_ids: self.allowed_participant_ids,
            password_hash: self
                .password
                .filter(|p| !p.is_empty())
                .map(|p| hash_password(&p)),
            max_participants: self.max_participants.unwrap_or(defaults.max_participants),
            auto_start_when_ready: self
                .auto_start_when_ready
                .unwrap_or(defaults.auto_start_when_ready),
            min_ready_count: self.min_ready_count.unwrap_or(defaults.min_ready_count),
            pause_control: self.pause_control.unwrap_or_default(),
            host_only_seek: self.host_only_seek.unwrap_or(defaults.host_only_seek),
            lock_seek_ahead: self.lock_seek_ahead.unwrap_or(defaults.lock_seek_ahead),
            sync_tolerance_seconds: self
                .sync_tolerance_seconds
                .unwrap_or(defaults.sync_tolerance_seconds),
            max_buffer_threshold_seconds: self
                .max_buffer_threshold_seconds
                .unwrap_or(defaults.max_buffer_threshold_seconds),
            auto_kick_inactive: self.auto_kick_inactive.unwrap_or(defaults.auto_kick_inactive),
            inactive_timeout_minutes: self
                .inactive_timeout_minutes
                .unwrap_or(defaults.inactive_timeout_minutes),
            ..defaults
        };

        if party.max_participants < 1 {
            return Err(CoreError::InvalidParty("participant cap must be at least 1".to_string()));
        }
        if party.min_ready_count < 1 {
            return Err(CoreError::InvalidParty("minimum ready count must be at least 1".to_string()));
        }
        if party.sync_tolerance_seconds < 1 {
            return Err(CoreError::InvalidParty("sync tolerance must be at least 1 second".to_string()));
        }
        if party.max_buffer_threshold_seconds < party.sync_tolerance_seconds {
            return Err(CoreError::InvalidParty(
                "buffer threshold must not be smaller than the sync tolerance".to_string(),
            ));
        }
        if party.auto_kick_inactive && party.inactive_timeout_minutes < 1 {
            return Err(CoreError::InvalidParty("inactivity timeout must be at least 1 minute".to_string()));
        }

        Ok(party)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let party: Party = serde_json::from_str(r#"{"id":"p1","itemId":"42","pauseControl":"whatever"}"#).unwrap();
        assert_eq!(party.id, "p1");
        assert_eq!(party.max_participants, 50);
        assert_eq!(party.pause_control, PauseControl::Anyone);
        assert_eq!(party.sync_tolerance_seconds, 10);
        assert_eq!(party.max_buffer_threshold_seconds, 30);
        assert!(party.is_waiting_room);
        assert!(party.host_only_seek && party.lock_seek_ahead);
    }

    #[test]
    fn test_legacy_master_field_maps_to_host() {
        let party: Party = serde_json::from_str(r#"{"id":"p1","masterUserId":"alice","pauseControl":"Vote"}"#).unwrap();
        assert_eq!(party.host_participant_id.as_deref(), Some("alice"));
        assert_eq!(party.pause_control, PauseControl::Vote);
    }

    #[test]
    fn test_password_verification() {
        let party = Party {
            password_hash: Some(hash_password("hunter2")),
            ..Default::default()
        };
        assert!(party.verify_password(Some("hunter2")));
        assert!(!party.verify_password(Some("hunter3")));
        assert!(!party.verify_password(None));

        let open = Party::default();
        assert!(open.verify_password(None));
    }

    #[test]
    fn test_visibility_respects_access_list() {
        let party = Party {
            allowed_participant_ids: vec!["alice".into()],
            ..Default::default()
        };
        assert!(party.is_visible_to(Some("alice"), None));
        assert!(!party.is_visible_to(Some("bob"), None));
        assert!(party.is_visible_to(None, None));
    }

    #[test]
    fn test_draft_validation() {
        assert!(matches!(
            PartyDraft::default().validate(),
            Err(CoreError::InvalidParty(_))
        ));

        let draft = PartyDraft {
            item_id: "42".into(),
            password: Some("secret".into()),
            sync_tolerance_seconds: Some(20),
            max_buffer_threshold_seconds: Some(5),
            ..Default::default()
        };
        assert!(draft.validate().is_err());

        let party = PartyDraft {
            item_id: " 42 ".into(),
            password: Some("secret".into()),
            pause_control: Some(PauseControl::Host),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(party.item_id, "42");
        assert!(!party.id.is_empty());
        assert_eq!(party.pause_control, PauseControl::Host);
        assert!(party.verify_password(Some("secret")));
        assert!(party.is_waiting_room);
    }
}
