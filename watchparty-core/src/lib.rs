//! Watch Party - Core Library
//!
//! This library keeps many independent playback sessions of the same media
//! item on one shared timeline: it resolves playback events to parties,
//! tracks who is watching, arbitrates pauses and seeks, and periodically
//! pulls drifting sessions back to the party position.

pub mod artifact;
pub mod catalog;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod party;
pub mod store;
pub mod sync;
pub mod transport;

// Re-exports for convenience
pub use artifact::{ArtifactReader, MemoryArtifacts};
pub use catalog::{Catalog, CatalogItem, Collection, MemoryCatalog};
pub use coordinator::{Coordinator, TickSummary};
pub use engine::{Outcome, PartyEngine};
pub use error::{CatalogError, CoreError, StoreError, TransportError};
pub use party::{Party, PartyDraft, PartyUpdate, PauseControl};
pub use store::{JsonFileStore, MemoryStore, PartyStore, Settings};
pub use sync::{ItemRef, LiveSession, PlaybackProgress, PlaybackStart, PlaybackStop, PlaystateCommand};
pub use transport::{CommandDispatcher, CommandReport, MediaServerClient, SessionTransport};
