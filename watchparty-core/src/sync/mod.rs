//! Sync State
//!
//! Playback events, commands and the per-party runtime records.

mod protocol;
mod state;

pub use protocol::*;
pub use state::*;
