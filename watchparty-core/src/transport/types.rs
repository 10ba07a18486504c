//! Types for media server API responses

use serde::Deserialize;

use crate::catalog::{CatalogItem, Collection};
use crate::sync::{ItemRef, LiveSession};

/// Media server ticks (100 ns) per millisecond
pub const TICKS_PER_MS: u64 = 10_000;

/// Convert server ticks to milliseconds
pub fn ticks_to_ms(ticks: i64) -> u64 {
    (ticks.max(0) as u64) / TICKS_PER_MS
}

/// Convert milliseconds to server ticks
pub fn ms_to_ticks(ms: u64) -> u64 {
    ms.saturating_mul(TICKS_PER_MS)
}

/// One entry of `GET /Sessions`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionInfo {
    pub id: String,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub now_playing_item: Option<NowPlayingItem>,

    #[serde(default)]
    pub play_state: Option<PlayState>,
}

/// Item a session is playing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NowPlayingItem {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub path: Option<String>,
}

/// Playback state of a session
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayState {
    /// Position in 100 ns ticks
    #[serde(default)]
    pub position_ticks: Option<i64>,

    #[serde(default)]
    pub is_paused: bool,
}

impl SessionInfo {
    /// Sessions without a user are not viewers
    pub fn into_live(self) -> Option<LiveSession> {
        let participant_id = self.user_id.filter(|u| !u.is_empty())?;
        let state = self.play_state.unwrap_or_default();

        Some(LiveSession {
            session_id: self.id,
            display_name: self.user_name.unwrap_or_else(|| participant_id.clone()),
            participant_id,
            item: self.now_playing_item.map(|item| {
                let r = ItemRef::item(item.id);
                match item.path {
                    Some(path) => r.with_path(path),
                    None => r,
                }
            }),
            position_ms: state.position_ticks.map(ticks_to_ms).unwrap_or(0),
            paused: state.is_paused,
        })
    }
}

/// Response of `GET /Items`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<ItemDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemDto {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub path: Option<String>,
}

impl From<ItemDto> for CatalogItem {
    fn from(dto: ItemDto) -> Self {
        CatalogItem {
            id: dto.id,
            name: dto.name,
            path: dto.path,
        }
    }
}

/// One entry of `GET /Library/VirtualFolders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VirtualFolder {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub item_id: String,

    #[serde(default)]
    pub locations: Vec<String>,
}

impl From<VirtualFolder> for Collection {
    fn from(folder: VirtualFolder) -> Self {
        Collection {
            id: folder.item_id,
            name: folder.name,
            locations: folder.locations,
        }
    }
}
