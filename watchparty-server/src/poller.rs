//! Session polling
//!
//! The media server only offers a session listing, so playback events are
//! derived by comparing consecutive snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::oneshot;
use tracing::{info, warn};

use watchparty_core::sync::{LiveSession, PlaybackProgress, PlaybackStart, PlaybackStop};
use watchparty_core::{Coordinator, SessionTransport};

use crate::metrics::{LogLevel, Metrics};

/// A playback event derived from two snapshots
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start(PlaybackStart),
    Progress(PlaybackProgress),
    Stop(PlaybackStop),
}

/// Remembers the previous snapshot of every playing session
#[derive(Debug, Default)]
pub struct SessionTracker {
    playing: HashMap<String, LiveSession>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `sessions` with the previous snapshot and emit events.
    /// Stops come before starts so a session switching items leaves its old party first.
    pub fn diff(&mut self, sessions: Vec<LiveSession>) -> Vec<SessionEvent> {
        let mut stops = Vec::new();
        let mut events = Vec::new();
        let mut next: HashMap<String, LiveSession> = HashMap::new();

        for session in sessions {
            let Some(item) = session.item.clone() else {
                continue;
            };

            match self.playing.remove(&session.session_id) {
                Some(prev) if prev.item.as_ref().is_some_and(|p| p.item_id == item.item_id) => {
                    events.push(SessionEvent::Progress(PlaybackProgress {
                        session_id: session.session_id.clone(),
                        participant_id: session.participant_id.clone(),
                        item,
                        position_ms: session.position_ms,
                        paused: session.paused,
                    }));
                }
                prev => {
                    if let Some(prev) = prev {
                        stops.extend(stop_event(prev));
                    }
                    events.push(SessionEvent::Start(PlaybackStart {
                        session_id: session.session_id.clone(),
                        participant_id: session.participant_id.clone(),
                        display_name: session.display_name.clone(),
                        item,
                        position_ms: session.position_ms,
                    }));
                }
            }

            next.insert(session.session_id.clone(), session);
        }

        // Whatever is left stopped playing or disappeared
        for (_, prev) in self.playing.drain() {
            stops.extend(stop_event(prev));
        }
        self.playing = next;

        stops.into_iter().chain(events).collect()
    }
}

fn stop_event(prev: LiveSession) -> Option<SessionEvent> {
    let item = prev.item?;
    Some(SessionEvent::Stop(PlaybackStop {
        session_id: prev.session_id,
        participant_id: prev.participant_id,
        item,
    }))
}

/// Poll sessions and feed events to the coordinator until cancelled
pub async fn run(
    coordinator: Arc<Coordinator>,
    transport: Arc<dyn SessionTransport>,
    metrics: Arc<RwLock<Metrics>>,
    interval: Duration,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    info!("Session poller started (every {:?})", interval);
    let mut tracker = SessionTracker::new();
    let mut reachable = true;

    loop {
        if cancel_rx.try_recv().is_ok() {
            info!("Session poller cancelled");
            break;
        }

        match transport.live_sessions().await {
            Ok(sessions) => {
                if !reachable {
                    info!("Media server reachable again");
                    metrics.write().log(LogLevel::Info, "Media server reachable again");
                    reachable = true;
                }

                metrics.write().live_sessions = sessions.len();

                for event in tracker.diff(sessions) {
                    dispatch(&coordinator, &metrics, event).await;
                }
            }
            Err(e) => {
                if reachable {
                    warn!("Could not poll sessions: {}", e);
                    metrics.write().log(LogLevel::Warning, format!("Session poll failed: {}", e));
                    reachable = false;
                }
            }
        }

        tokio::time::sleep(interval).await;
    }
}

async fn dispatch(coordinator: &Coordinator, metrics: &RwLock<Metrics>, event: SessionEvent) {
    match event {
        SessionEvent::Start(e) => {
            metrics.write().starts += 1;
            coordinator.on_playback_start(e).await;
        }
        SessionEvent::Progress(e) => {
            metrics.write().progress_reports += 1;
            coordinator.on_playback_progress(e).await;
        }
        SessionEvent::Stop(e) => {
            metrics.write().stops += 1;
            coordinator.on_playback_stop(e).await;
        }
    }
}
