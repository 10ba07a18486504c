//! Playback Events and Commands
//!
//! Events flow in from the session transport, commands flow back out to it.

use serde::{Deserialize, Serialize};

/// File extension of an indirection artifact
pub const ARTIFACT_EXTENSION: &str = "strm";

/// What a session is playing, as reported by the media server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    /// Catalog item ID
    pub item_id: String,
    /// Path of the item on disk, if the catalog exposes it
    pub path: Option<String>,
    /// Stored target path, when the item is an indirection artifact
    pub artifact_target: Option<String>,
}

impl ItemRef {
    /// Reference to a plain catalog item
    pub fn item(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Default::default()
        }
    }

    /// Attach the on-disk path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach the content read from an indirection artifact
    pub fn with_artifact_target(mut self, target: impl Into<String>) -> Self {
        self.artifact_target = Some(target.into());
        self
    }

    /// Whether the path points at an indirection artifact
    pub fn is_artifact(&self) -> bool {
        self.path
            .as_deref()
            .and_then(|p| p.rsplit('.').next().filter(|_| p.contains('.')))
            .is_some_and(|ext| ext.eq_ignore_ascii_case(ARTIFACT_EXTENSION))
    }
}

/// A session started playing an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStart {
    pub session_id: String,
    pub participant_id: String,
    pub display_name: String,
    pub item: ItemRef,
    pub position_ms: u64,
}

/// Periodic position report from a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub session_id: String,
    pub participant_id: String,
    pub item: ItemRef,
    pub position_ms: u64,
    pub paused: bool,
}

/// A session stopped playing an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackStop {
    pub session_id: String,
    pub participant_id: String,
    pub item: ItemRef,
}

/// Snapshot of one live session, as listed by the transport
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveSession {
    pub session_id: String,
    pub participant_id: String,
    pub display_name: String,
    /// None when the session is idle
    pub item: Option<ItemRef>,
    pub position_ms: u64,
    pub paused: bool,
}

/// Playstate command understood by playback clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaystateCommand {
    Pause,
    Unpause,
    /// Seek to position in milliseconds
    SeekTo(u64),
    /// Stop playback (used to turn away participants who may not join)
    Stop,
}

impl PlaystateCommand {
    /// Name used in the media server's playstate endpoint
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaystateCommand::Pause => "Pause",
            PlaystateCommand::Unpause => "Unpause",
            PlaystateCommand::SeekTo(_) => "Seek",
            PlaystateCommand::Stop => "Stop",
        }
    }
}

/// A command addressed to one session on behalf of one party
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCommand {
    pub party_id: String,
    pub session_id: String,
    pub command: PlaystateCommand,
}

impl SessionCommand {
    pub fn new(party_id: &str, session_id: &str, command: PlaystateCommand) -> Self {
        Self {
            party_id: party_id.to_string(),
            session_id: session_id.to_string(),
            command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_detection() {
        assert!(ItemRef::item("1").with_path("/lib/Movie.strm").is_artifact());
        assert!(ItemRef::item("1").with_path("C:\\lib\\Movie.STRM").is_artifact());
        assert!(!ItemRef::item("1").with_path("/media/Movie.mkv").is_artifact());
        assert!(!ItemRef::item("1").with_path("/media/strm").is_artifact());
        assert!(!ItemRef::item("1").is_artifact());
    }
}
