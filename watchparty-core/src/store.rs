//! Party Store
//!
//! The durable settings document: sync cadence plus the list of parties.
//! Every read goes back to the source so edits are picked up without a
//! restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::party::{new_party_id, Party, PartyUpdate};

/// Default seconds between reconciliation ticks
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 5;

/// Default forward offset added to every correction seek (ms)
pub const DEFAULT_SYNC_OFFSET_MS: u64 = 1000;

/// Media server ticks per millisecond (legacy positions are stored in ticks)
const TICKS_PER_MS: u64 = 10_000;

/// Settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub sync_interval_seconds: u64,
    pub sync_offset_milliseconds: u64,
    pub watch_parties: Vec<Party>,

    // === Legacy single-party layout ===
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_item_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_series_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_season_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    pub is_party_active: bool,
    pub current_position_ticks: u64,
    pub is_playing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_participants: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            sync_offset_milliseconds: DEFAULT_SYNC_OFFSET_MS,
            watch_parties: Vec::new(),
            selected_item_id: None,
            selected_item_name: None,
            selected_item_type: None,
            selected_series_id: None,
            selected_season_id: None,
            collection_name: None,
            is_party_active: false,
            current_position_ticks: 0,
            is_playing: false,
            max_participants: None,
        }
    }
}

impl Settings {
    /// Parse a settings document
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let mut settings: Settings = serde_json::from_str(json)?;
        settings.normalize();
        Ok(settings)
    }

    /// Interval between ticks (never below one second)
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_seconds.max(1))
    }

    /// Look up a party by ID
    pub fn party(&self, party_id: &str) -> Option<&Party> {
        self.watch_parties.iter().find(|p| p.id == party_id)
    }

    /// Mutable party lookup
    pub fn party_mut(&mut self, party_id: &str) -> Option<&mut Party> {
        self.watch_parties.iter_mut().find(|p| p.id == party_id)
    }

    /// Give IDs to parties that lack one and fold a legacy single-party
    /// layout into the party list. Returns true if anything changed.
    pub fn normalize(&mut self) -> bool {
        let mut changed = false;

        for party in self.watch_parties.iter_mut().filter(|p| p.id.is_empty()) {
            party.id = new_party_id();
            changed = true;
        }

        if let Some(item_id) = self.selected_item_id.take().filter(|id| !id.is_empty()) {
            if self.watch_parties.is_empty() {
                info!("Migrating legacy single-party configuration");
                let defaults = Party::default();
                let party = Party {
                    id: new_party_id(),
                    item_id,
                    item_name: self.selected_item_name.take().unwrap_or_default(),
                    item_type: self.selected_item_type.take(),
                    series_id: self.selected_series_id.take(),
                    season_id: self.selected_season_id.take(),
                    collection_name: self
                        .collection_name
                        .take()
                        .unwrap_or(defaults.collection_name.clone()),
                    is_active: self.is_party_active,
                    position_ms: self.current_position_ticks / TICKS_PER_MS,
                    is_playing: self.is_playing,
                    max_participants: self.max_participants.take().unwrap_or(defaults.max_participants),
                    ..defaults
                };
                info!("Migrated legacy party: {}", party.item_name);
                self.watch_parties.push(party);
            }
            self.is_party_active = false;
            self.current_position_ticks = 0;
            self.is_playing = false;
            changed = true;
        }

        changed
    }
}

/// Durable storage of parties
pub trait PartyStore: Send + Sync {
    /// Current settings (always re-read)
    fn settings(&self) -> Result<Settings, StoreError>;

    /// Write back the runtime-owned fields of one party
    fn apply(&self, update: &PartyUpdate) -> Result<(), StoreError>;

    /// Add a party
    fn insert(&self, party: Party) -> Result<(), StoreError>;

    /// Remove a party. Returns false if it did not exist.
    fn prune(&self, party_id: &str) -> Result<bool, StoreError>;
}

/// Store held in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RwLock<Settings>,
}

impl MemoryStore {
    pub fn new(mut settings: Settings) -> Self {
        settings.normalize();
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Replace the whole document, as an external editor would
    pub fn replace(&self, mut settings: Settings) {
        settings.normalize();
        *self.settings.write() = settings;
    }
}

impl PartyStore for MemoryStore {
    fn settings(&self) -> Result<Settings, StoreError> {
        Ok(self.settings.read().clone())
    }

    fn apply(&self, update: &PartyUpdate) -> Result<(), StoreError> {
        let mut settings = self.settings.write();
        let party = settings
            .party_mut(&update.party_id)
            .ok_or_else(|| StoreError::PartyNotFound(update.party_id.clone()))?;
        party.apply(update);
        Ok(())
    }

    fn insert(&self, party: Party) -> Result<(), StoreError> {
        self.settings.write().watch_parties.push(party);
        Ok(())
    }

    fn prune(&self, party_id: &str) -> Result<bool, StoreError> {
        let mut settings = self.settings.write();
        let before = settings.watch_parties.len();
        settings.watch_parties.retain(|p| p.id != party_id);
        Ok(settings.watch_parties.len() != before)
    }
}

/// Store backed by a JSON file
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Settings, StoreError> {
        if !self.path.exists() {
            debug!("Settings file {} missing, using defaults", self.path.display());
            return Ok(Settings::default());
        }
        let json = fs::read_to_string(&self.path)?;
        let mut settings: Settings = serde_json::from_str(&json)?;
        if settings.normalize() {
            self.write(&settings)?;
        }
        Ok(settings)
    }

    fn write(&self, settings: &Settings) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify<T>(&self, f: impl FnOnce(&mut Settings) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.write_lock.lock();
        let mut settings = self.read()?;
        let result = f(&mut settings)?;
        self.write(&settings)?;
        Ok(result)
    }
}

impl PartyStore for JsonFileStore {
    fn settings(&self) -> Result<Settings, StoreError> {
        let _guard = self.write_lock.lock();
        self.read()
    }

    fn apply(&self, update: &PartyUpdate) -> Result<(), StoreError> {
        self.modify(|settings| {
            let party = settings
                .party_mut(&update.party_id)
                .ok_or_else(|| StoreError::PartyNotFound(update.party_id.clone()))?;
            party.apply(update);
            Ok(())
        })
    }

    fn insert(&self, party: Party) -> Result<(), StoreError> {
        self.modify(|settings| {
            settings.watch_parties.push(party);
            Ok(())
        })
    }

    fn prune(&self, party_id: &str) -> Result<bool, StoreError> {
        self.modify(|settings| {
            let before = settings.watch_parties.len();
            settings.watch_parties.retain(|p| p.id != party_id);
            Ok(settings.watch_parties.len() != before)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings = Settings::from_json(r#"{"watchParties":[{"itemId":"42"}]}"#).unwrap();
        assert_eq!(settings.sync_interval(), Duration::from_secs(5));
        assert_eq!(settings.sync_offset_milliseconds, 1000);
        assert_eq!(settings.watch_parties.len(), 1);
        assert!(!settings.watch_parties[0].id.is_empty());
    }

    #[test]
    fn test_interval_has_floor() {
        let settings = Settings {
            sync_interval_seconds: 0,
            ..Default::default()
        };
        assert_eq!(settings.sync_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_legacy_layout_is_migrated() {
        let settings = Settings::from_json(
            r#"{
                "selectedItemId": "abc",
                "selectedItemName": "Movie",
                "isPartyActive": true,
                "currentPositionTicks": 600000000,
                "maxParticipants": 8
            }"#,
        )
        .unwrap();

        assert_eq!(settings.watch_parties.len(), 1);
        let party = &settings.watch_parties[0];
        assert_eq!(party.item_id, "abc");
        assert_eq!(party.item_name, "Movie");
        assert_eq!(party.position_ms, 60_000);
        assert_eq!(party.max_participants, 8);
        assert!(party.is_active);
        assert!(settings.selected_item_id.is_none());
    }

    #[test]
    fn test_memory_store_apply_and_prune() {
        let store = MemoryStore::new(Settings {
            watch_parties: vec![Party {
                id: "p1".into(),
                item_id: "42".into(),
                ..Default::default()
            }],
            ..Default::default()
        });

        store
            .apply(&PartyUpdate {
                party_id: "p1".into(),
                position_ms: 1234,
                is_playing: true,
                is_waiting_room: false,
                host_participant_id: Some("alice".into()),
            })
            .unwrap();
        let party = store.settings().unwrap().watch_parties[0].clone();
        assert_eq!(party.position_ms, 1234);
        assert!(party.is_playing && !party.is_waiting_room);

        assert!(store.apply(&PartyUpdate { party_id: "nope".into(), ..party.runtime_update() }).is_err());
        assert!(store.prune("p1").unwrap());
        assert!(!store.prune("p1").unwrap());
    }

    #[test]
    fn test_json_file_store_round_trip() {
        let path = std::env::temp_dir().join(format!("watchparty-store-{}.json", new_party_id()));
        let store = JsonFileStore::new(&path);
        assert!(store.settings().unwrap().watch_parties.is_empty());

        store
            .insert(Party {
                id: "p1".into(),
                item_id: "42".into(),
                ..Default::default()
            })
            .unwrap();
        let mut update = store.settings().unwrap().watch_parties[0].runtime_update();
        update.position_ms = 90_000;
        store.apply(&update).unwrap();

        let reloaded = JsonFileStore::new(&path).settings().unwrap();
        assert_eq!(reloaded.party("p1").unwrap().position_ms, 90_000);

        let _ = fs::remove_file(&path);
    }
}
