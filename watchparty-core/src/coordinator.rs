//! Coordinator
//!
//! Drives a [`PartyEngine`] from async entry points. Every step re-reads the
//! party list from the store, runs the engine under a single lock, writes
//! the owned fields back, then dispatches the resulting commands without
//! waiting for them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactReader;
use crate::catalog::{Catalog, Collection};
use crate::engine::{artifact_path_for, library_path_for, ContentIndex, Outcome, PartyContent, PartyEngine};
use crate::error::CoreError;
use crate::party::{Party, PartyDraft};
use crate::store::{PartyStore, Settings, DEFAULT_SYNC_INTERVAL_SECS};
use crate::sync::{ItemRef, ParticipantSnapshot, PlaybackProgress, PlaybackStart, PlaybackStop};
use crate::transport::{CommandDispatcher, CommandReport, SessionTransport};

/// What one reconciliation tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub parties: usize,
    pub sessions: usize,
    pub corrections: usize,
    pub evicted: usize,
    /// Parties removed because their content is gone
    pub pruned: Vec<String>,
}

/// Async front of the sync engine
pub struct Coordinator {
    store: Arc<dyn PartyStore>,
    catalog: Arc<dyn Catalog>,
    artifacts: Option<Arc<dyn ArtifactReader>>,
    dispatcher: CommandDispatcher,
    engine: Mutex<PartyEngine>,
    /// Resolved content per party, refreshed every tick
    content: Mutex<HashMap<String, PartyContent>>,
    /// Artifact path -> stored target, kept while some session plays the artifact
    artifact_targets: Mutex<HashMap<String, Option<String>>>,
    /// Held for the duration of a tick so ticks never overlap
    tick_guard: tokio::sync::Mutex<()>,
}

impl Coordinator {
    pub fn new(store: Arc<dyn PartyStore>, catalog: Arc<dyn Catalog>, transport: Arc<dyn SessionTransport>) -> Self {
        Self {
            store,
            catalog,
            artifacts: None,
            dispatcher: CommandDispatcher::new(transport),
            engine: Mutex::new(PartyEngine::new()),
            content: Mutex::new(HashMap::new()),
            artifact_targets: Mutex::new(HashMap::new()),
            tick_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Read indirection artifacts through `artifacts`. Without a reader only
    /// targets already carried on the inbound item are matched.
    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactReader>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Publish the result of every dispatched command on `reports`
    pub fn with_command_reports(mut self, reports: mpsc::UnboundedSender<CommandReport>) -> Self {
        self.dispatcher = self.dispatcher.with_reports(reports);
        self
    }

    // ========================================================================
    // Playback events
    // ========================================================================

    pub async fn on_playback_start(&self, mut event: PlaybackStart) {
        debug!("Playback start: {} on session {}", event.participant_id, event.session_id);
        event.item = self.resolve_artifact(event.item).await;
        self.step(|engine, parties, index, now| {
            engine.on_playback_start(parties, index, &event, now)
        })
        .await;
    }

    pub async fn on_playback_progress(&self, mut event: PlaybackProgress) {
        event.item = self.resolve_artifact(event.item).await;
        self.step(|engine, parties, index, now| {
            engine.on_playback_progress(parties, index, &event, now)
        })
        .await;
    }

    pub async fn on_playback_stop(&self, mut event: PlaybackStop) {
        debug!("Playback stop: {} on session {}", event.participant_id, event.session_id);
        event.item = self.resolve_artifact(event.item).await;
        self.step(|engine, parties, index, now| {
            engine.on_playback_stop(parties, index, &event, now)
        })
        .await;
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Run one tick. Returns None if another tick is still running or the store is unreadable.
    pub async fn on_tick(&self) -> Option<TickSummary> {
        let Ok(_guard) = self.tick_guard.try_lock() else {
            debug!("Previous tick still running, skipping");
            return None;
        };

        let settings = self.load_settings()?;
        let index = self.content_index(&settings.watch_parties, true).await;

        let mut sessions = match self.dispatcher.transport().live_sessions().await {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!("Could not list sessions: {}", e);
                Vec::new()
            }
        };

        self.artifact_targets.lock().retain(|path, _| {
            sessions
                .iter()
                .filter_map(|s| s.item.as_ref())
                .any(|i| i.path.as_deref() == Some(path.as_str()))
        });
        for session in sessions.iter_mut() {
            if let Some(item) = session.item.take() {
                session.item = Some(self.resolve_artifact(item).await);
            }
        }

        let (outcome, parties) = {
            let mut engine = self.engine.lock();
            let mut settings = self.load_settings()?;
            engine.set_sync_offset_ms(settings.sync_offset_milliseconds);
            let outcome = engine.on_tick(&mut settings.watch_parties, &index, &sessions, Utc::now());
            self.persist(&outcome);
            (outcome, settings.watch_parties.len())
        };

        let mut pruned = Vec::new();
        for party_id in &outcome.unresolvable {
            match self.store.prune(party_id) {
                Ok(true) => {
                    info!("[Party {}] Content is gone, removed party", party_id);
                    self.content.lock().remove(party_id);
                    pruned.push(party_id.clone());
                }
                Ok(false) => {}
                Err(e) => warn!("[Party {}] Failed to remove party: {}", party_id, e),
            }
        }

        let summary = TickSummary {
            parties,
            sessions: sessions.len(),
            corrections: outcome.corrections(),
            evicted: outcome.evicted.len(),
            pruned,
        };
        self.dispatcher.dispatch(outcome.commands);
        Some(summary)
    }

    /// Run ticks until the returned sender is used or dropped. The interval is
    /// re-read from the store before every tick. Each tick's summary (None when
    /// skipped) is published on `summaries` if given.
    pub fn spawn_ticker(
        self: &Arc<Self>,
        summaries: Option<mpsc::UnboundedSender<Option<TickSummary>>>,
    ) -> oneshot::Sender<()> {
        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            info!("Sync ticker started");
            loop {
                let interval = match this.store.settings() {
                    Ok(settings) => settings.sync_interval(),
                    Err(_) => std::time::Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
                };

                tokio::select! {
                    _ = &mut cancel_rx => {
                        info!("Sync ticker cancelled");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        let tick = Arc::clone(&this);
                        let summaries = summaries.clone();
                        tokio::spawn(async move {
                            let summary = tick.on_tick().await;
                            debug!("Tick done: {:?}", summary);
                            if let Some(tx) = summaries {
                                let _ = tx.send(summary);
                            }
                        });
                    }
                }
            }
        });

        cancel_tx
    }

    // ========================================================================
    // Admin operations
    // ========================================================================

    /// Leave the waiting room. With a requester, only the designated host may do this.
    pub fn start_party(&self, party_id: &str, requester: Option<&str>) -> Result<(), CoreError> {
        let outcome = self.admin(party_id, |engine, party| {
            if let Some(requester) = requester {
                if !party.is_host(requester) {
                    warn!("[Party {}] {} tried to start the party but is not the host", party.id, requester);
                    return Err(CoreError::NotHost);
                }
            }
            info!("[Party {}] Manually starting party", party.id);
            Ok(engine.start_party(party))
        })?;
        self.dispatcher.dispatch(outcome.commands);
        Ok(())
    }

    /// Set or clear a participant's ready signal
    pub fn set_ready(&self, party_id: &str, participant_id: &str, ready: bool) -> Result<(), CoreError> {
        let outcome = self.admin(party_id, |engine, party| Ok(engine.set_ready(party, participant_id, ready)))?;
        self.dispatcher.dispatch(outcome.commands);
        Ok(())
    }

    /// Connected participants of a party
    pub fn participants(&self, party_id: &str) -> Result<Vec<ParticipantSnapshot>, CoreError> {
        let settings = self.store.settings()?;
        let party = settings
            .party(party_id)
            .ok_or_else(|| CoreError::PartyNotFound(party_id.to_string()))?;
        Ok(self.engine.lock().participants(party))
    }

    /// Parties a user may see
    pub fn visible_parties(&self, participant_id: Option<&str>, password: Option<&str>) -> Result<Vec<Party>, CoreError> {
        let settings = self.store.settings()?;
        Ok(settings
            .watch_parties
            .into_iter()
            .filter(|p| p.is_active && p.is_visible_to(participant_id, password))
            .collect())
    }

    /// Validate and store a new party
    pub fn create_party(&self, draft: PartyDraft) -> Result<Party, CoreError> {
        let party = draft.validate()?;
        self.store.insert(party.clone())?;
        info!("[Party {}] Created for item {}", party.id, party.item_id);
        Ok(party)
    }

    /// Delete a party and everything known about it
    pub fn remove_party(&self, party_id: &str) -> Result<(), CoreError> {
        if !self.store.prune(party_id)? {
            return Err(CoreError::PartyNotFound(party_id.to_string()));
        }
        self.content.lock().remove(party_id);
        let settings = self.store.settings()?;
        self.engine.lock().retain_parties(&settings.watch_parties);
        info!("[Party {}] Removed", party_id);
        Ok(())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn load_settings(&self) -> Option<Settings> {
        match self.store.settings() {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Could not read settings: {}", e);
                None
            }
        }
    }

    /// Run one engine step for a playback event
    async fn step<F>(&self, f: F)
    where
        F: FnOnce(&mut PartyEngine, &mut [Party], &ContentIndex, DateTime<Utc>) -> Outcome,
    {
        let Some(settings) = self.load_settings() else {
            return;
        };
        let index = self.content_index(&settings.watch_parties, false).await;

        let outcome = {
            let mut engine = self.engine.lock();
            // Re-read under the lock so concurrent events see each other's writes
            let Some(mut settings) = self.load_settings() else {
                return;
            };
            engine.set_sync_offset_ms(settings.sync_offset_milliseconds);
            let outcome = f(&mut engine, &mut settings.watch_parties, &index, Utc::now());
            self.persist(&outcome);
            outcome
        };

        self.dispatcher.dispatch(outcome.commands);
    }

    /// Run an admin operation on one party under the engine lock
    fn admin<F>(&self, party_id: &str, f: F) -> Result<Outcome, CoreError>
    where
        F: FnOnce(&mut PartyEngine, &mut Party) -> Result<Outcome, CoreError>,
    {
        let mut engine = self.engine.lock();
        let mut settings = self.store.settings()?;
        let party = settings
            .party_mut(party_id)
            .ok_or_else(|| CoreError::PartyNotFound(party_id.to_string()))?;
        let outcome = f(&mut engine, party)?;
        self.persist(&outcome);
        Ok(outcome)
    }

    /// Attach the stored target to an artifact-backed item, reading it once per path
    async fn resolve_artifact(&self, item: ItemRef) -> ItemRef {
        if !item.is_artifact() || item.artifact_target.is_some() {
            return item;
        }
        let (Some(artifacts), Some(path)) = (&self.artifacts, item.path.clone()) else {
            return item;
        };

        let cached = self.artifact_targets.lock().get(&path).cloned();
        let target = match cached {
            Some(target) => target,
            None => {
                let target = artifacts.read_target(&path).await;
                self.artifact_targets.lock().insert(path, target.clone());
                target
            }
        };

        match target {
            Some(target) => item.with_artifact_target(target),
            None => item,
        }
    }

    fn persist(&self, outcome: &Outcome) {
        for update in &outcome.updates {
            if let Err(e) = self.store.apply(update) {
                warn!("[Party {}] Failed to save party state: {}", update.party_id, e);
            }
        }
    }

    /// Resolve every party's content, from cache unless `refresh` is set
    async fn content_index(&self, parties: &[Party], refresh: bool) -> ContentIndex {
        let cached: HashMap<String, PartyContent> = {
            let mut content = self.content.lock();
            content.retain(|id, _| parties.iter().any(|p| &p.id == id));
            content.clone()
        };

        let mut index = ContentIndex::new();
        let mut stale: Vec<&Party> = Vec::new();
        for party in parties.iter().filter(|p| !p.item_id.is_empty()) {
            match cached.get(&party.id) {
                Some(entry) if !refresh => index.insert(party.id.clone(), entry.clone()),
                _ => stale.push(party),
            }
        }
        if stale.is_empty() {
            return index;
        }

        let lookups = join_all(stale.iter().map(|p| self.catalog.item(&p.item_id))).await;
        let collections: Vec<Collection> = if lookups.iter().any(|r| matches!(r, Ok(Some(_)))) {
            self.catalog.collections().await.unwrap_or_else(|e| {
                warn!("Could not list collections: {}", e);
                Vec::new()
            })
        } else {
            Vec::new()
        };

        for (party, lookup) in stale.into_iter().zip(lookups) {
            let entry = match lookup {
                Ok(Some(item)) => {
                    let artifact_path = library_path_for(party, &collections)
                        .and_then(|library| artifact_path_for(party, item.path.as_deref(), &library));
                    if artifact_path.is_none() {
                        debug!("[Party {}] No library for artifact", party.id);
                    }
                    PartyContent {
                        resolvable: true,
                        item_path: item.path,
                        artifact_path,
                    }
                }
                Ok(None) => PartyContent::default(),
                Err(e) => {
                    // Not cached, so the next step asks again
                    warn!("[Party {}] Catalog lookup failed: {}", party.id, e);
                    index.insert(party.id.clone(), PartyContent::unknown());
                    continue;
                }
            };

            self.content.lock().insert(party.id.clone(), entry.clone());
            index.insert(party.id.clone(), entry);
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::artifact::MemoryArtifacts;
    use crate::catalog::{CatalogItem, MemoryCatalog};
    use crate::error::TransportError;
    use crate::store::MemoryStore;
    use crate::sync::{ItemRef, LiveSession, PlaystateCommand};

    #[derive(Default)]
    struct FakeTransport {
        sessions: Mutex<Vec<LiveSession>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl SessionTransport for FakeTransport {
        async fn send_command(&self, _session_id: &str, _command: PlaystateCommand) -> Result<(), TransportError> {
            Ok(())
        }

        async fn live_sessions(&self) -> Result<Vec<LiveSession>, TransportError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.sessions.lock().clone())
        }
    }

    struct Harness {
        coordinator: Arc<Coordinator>,
        store: Arc<MemoryStore>,
        catalog: Arc<MemoryCatalog>,
        artifacts: Arc<MemoryArtifacts>,
        transport: Arc<FakeTransport>,
        reports: mpsc::UnboundedReceiver<CommandReport>,
    }

    fn harness(parties: Vec<Party>, transport: FakeTransport) -> Harness {
        let store = Arc::new(MemoryStore::new(Settings {
            watch_parties: parties,
            ..Default::default()
        }));
        let catalog = Arc::new(MemoryCatalog::new());
        catalog.insert_item(CatalogItem {
            id: "42".into(),
            name: "Film".into(),
            path: Some("/movies/Film.mkv".into()),
        });
        let artifacts = Arc::new(MemoryArtifacts::new());
        let transport = Arc::new(transport);
        let (tx, reports) = mpsc::unbounded_channel();
        let coordinator = Arc::new(
            Coordinator::new(store.clone(), catalog.clone(), transport.clone())
                .with_artifacts(artifacts.clone())
                .with_command_reports(tx),
        );
        Harness {
            coordinator,
            store,
            catalog,
            artifacts,
            transport,
            reports,
        }
    }

    fn party(id: &str) -> Party {
        Party {
            id: id.into(),
            item_id: "42".into(),
            item_name: "Film".into(),
            ..Default::default()
        }
    }

    fn started(pid: &str, item: ItemRef) -> PlaybackStart {
        PlaybackStart {
            session_id: format!("s-{pid}"),
            participant_id: pid.into(),
            display_name: pid.into(),
            item,
            position_ms: 0,
        }
    }

    /// Receive `n` command reports, sorted by session
    async fn collect(reports: &mut mpsc::UnboundedReceiver<CommandReport>, n: usize) -> Vec<(String, PlaystateCommand)> {
        let mut list = Vec::new();
        for _ in 0..n {
            let report = tokio::time::timeout(Duration::from_secs(5), reports.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(report.is_ok());
            list.push((report.command.session_id, report.command.command));
        }
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }

    #[tokio::test]
    async fn test_lone_viewer_starts_the_party() {
        let mut h = harness(vec![party("p1")], FakeTransport::default());

        h.coordinator.on_playback_start(started("alice", ItemRef::item("42"))).await;

        let sent = collect(&mut h.reports, 2).await;
        assert!(sent.contains(&("s-alice".to_string(), PlaystateCommand::Pause)));
        assert!(sent.contains(&("s-alice".to_string(), PlaystateCommand::Unpause)));

        let stored = h.store.settings().unwrap();
        let p = stored.party("p1").unwrap();
        assert!(p.is_playing);
        assert!(!p.is_waiting_room);
        assert_eq!(p.host_participant_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_artifact_resolves_to_party() {
        let mut h = harness(vec![party("p1")], FakeTransport::default());
        h.catalog.insert_collection(Collection {
            id: "lib1".into(),
            name: "watch party".into(),
            locations: vec!["/media/watchparty".into()],
        });

        let item = ItemRef::item("strm-7").with_path("/media/watchparty/Film.strm");
        h.coordinator.on_playback_start(started("alice", item)).await;

        collect(&mut h.reports, 2).await;
        let stored = h.store.settings().unwrap();
        assert_eq!(stored.party("p1").unwrap().host_participant_id.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_tick_corrects_drifting_session() {
        let transport = FakeTransport::default();
        transport.sessions.lock().push(LiveSession {
            session_id: "s-v".into(),
            participant_id: "v".into(),
            display_name: "v".into(),
            item: Some(ItemRef::item("42")),
            position_ms: 50_000,
            paused: false,
        });
        let mut h = harness(
            vec![Party {
                position_ms: 100_000,
                is_playing: true,
                is_waiting_room: false,
                host_participant_id: Some("h".into()),
                ..party("p1")
            }],
            transport,
        );

        let summary = h.coordinator.on_tick().await.unwrap();
        assert_eq!(summary.corrections, 1);
        assert_eq!(summary.sessions, 1);

        let sent = collect(&mut h.reports, 1).await;
        assert_eq!(sent, vec![("s-v".to_string(), PlaystateCommand::SeekTo(101_000))]);
    }

    #[tokio::test]
    async fn test_tick_corrects_session_on_artifact_pointing_at_content() {
        let transport = FakeTransport::default();
        transport.sessions.lock().push(LiveSession {
            session_id: "s-v".into(),
            participant_id: "v".into(),
            display_name: "v".into(),
            item: Some(ItemRef::item("strm-9").with_path("/elsewhere/Film.strm")),
            position_ms: 50_000,
            paused: false,
        });
        let mut h = harness(
            vec![Party {
                position_ms: 100_000,
                is_playing: true,
                is_waiting_room: false,
                host_participant_id: Some("h".into()),
                ..party("p1")
            }],
            transport,
        );
        h.artifacts.insert("/elsewhere/Film.strm", "/movies/Film.mkv");

        let summary = h.coordinator.on_tick().await.unwrap();
        assert_eq!(summary.corrections, 1);
        let sent = collect(&mut h.reports, 1).await;
        assert_eq!(sent, vec![("s-v".to_string(), PlaystateCommand::SeekTo(101_000))]);

        // Events resolve the same artifact the same way
        let item = ItemRef::item("strm-9").with_path("/elsewhere/Film.strm");
        h.coordinator.on_playback_start(started("v", item)).await;
        let sent = collect(&mut h.reports, 1).await;
        assert_eq!(sent, vec![("s-v".to_string(), PlaystateCommand::SeekTo(101_000))]);
    }

    #[tokio::test]
    async fn test_tick_prunes_parties_whose_item_is_gone() {
        let h = harness(vec![party("p1"), Party { item_id: "gone".into(), ..party("p2") }], FakeTransport::default());

        let summary = h.coordinator.on_tick().await.unwrap();
        assert_eq!(summary.pruned, vec!["p2".to_string()]);
        let stored = h.store.settings().unwrap();
        assert!(stored.party("p1").is_some());
        assert!(stored.party("p2").is_none());
    }

    #[tokio::test]
    async fn test_overlapping_ticks_are_skipped() {
        let h = harness(
            vec![party("p1")],
            FakeTransport {
                delay: Some(Duration::from_millis(100)),
                ..Default::default()
            },
        );

        let (first, second) = tokio::join!(h.coordinator.on_tick(), h.coordinator.on_tick());
        assert!(first.is_some());
        assert!(second.is_none());
        assert!(h.coordinator.on_tick().await.is_some());
    }

    #[tokio::test]
    async fn test_new_parties_are_picked_up_without_restart() {
        let mut h = harness(Vec::new(), FakeTransport::default());
        h.coordinator.on_playback_start(started("alice", ItemRef::item("42"))).await;
        assert!(h.reports.try_recv().is_err());

        h.store.replace(Settings {
            watch_parties: vec![party("p1")],
            ..Default::default()
        });
        h.coordinator.on_playback_start(started("alice", ItemRef::item("42"))).await;
        collect(&mut h.reports, 2).await;
    }

    #[tokio::test]
    async fn test_only_host_may_start() {
        let mut h = harness(
            vec![Party {
                host_participant_id: Some("h".into()),
                auto_start_when_ready: false,
                ..party("p1")
            }],
            FakeTransport::default(),
        );
        h.coordinator.on_playback_start(started("a", ItemRef::item("42"))).await;
        let sent = collect(&mut h.reports, 1).await;
        assert_eq!(sent, vec![("s-a".to_string(), PlaystateCommand::Pause)]);

        assert!(matches!(h.coordinator.start_party("p1", Some("a")), Err(CoreError::NotHost)));
        assert!(matches!(
            h.coordinator.start_party("nope", None),
            Err(CoreError::PartyNotFound(_))
        ));

        h.coordinator.start_party("p1", Some("h")).unwrap();
        let sent = collect(&mut h.reports, 1).await;
        assert_eq!(sent, vec![("s-a".to_string(), PlaystateCommand::Unpause)]);
        assert!(h.store.settings().unwrap().party("p1").unwrap().is_playing);
    }

    #[tokio::test]
    async fn test_party_without_host_rejects_requesters() {
        let h = harness(
            vec![Party {
                auto_start_when_ready: false,
                ..party("p1")
            }],
            FakeTransport::default(),
        );

        assert!(matches!(h.coordinator.start_party("p1", Some("a")), Err(CoreError::NotHost)));
        assert!(!h.store.settings().unwrap().party("p1").unwrap().is_playing);

        // Admin starts carry no requester
        h.coordinator.start_party("p1", None).unwrap();
        assert!(h.store.settings().unwrap().party("p1").unwrap().is_playing);
    }

    #[tokio::test]
    async fn test_create_list_and_remove_parties() {
        let h = harness(Vec::new(), FakeTransport::default());

        let open = h
            .coordinator
            .create_party(PartyDraft {
                item_id: "42".into(),
                ..Default::default()
            })
            .unwrap();
        let locked = h
            .coordinator
            .create_party(PartyDraft {
                item_id: "42".into(),
                password: Some("secret".into()),
                ..Default::default()
            })
            .unwrap();

        let visible = h.coordinator.visible_parties(Some("alice"), None).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, open.id);
        assert_eq!(h.coordinator.visible_parties(Some("alice"), Some("secret")).unwrap().len(), 2);

        h.coordinator.remove_party(&locked.id).unwrap();
        assert!(matches!(
            h.coordinator.remove_party(&locked.id),
            Err(CoreError::PartyNotFound(_))
        ));
        assert!(h.coordinator.participants(&open.id).unwrap().is_empty());
        assert!(h.transport.sessions.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ticker_runs_until_cancelled() {
        let h = harness(
            vec![Party {
                position_ms: 10_000,
                ..party("p1")
            }],
            FakeTransport::default(),
        );
        h.store.replace(Settings {
            sync_interval_seconds: 1,
            watch_parties: h.store.settings().unwrap().watch_parties,
            ..Default::default()
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = h.coordinator.spawn_ticker(Some(tx));

        let summary = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(summary.parties, 1);

        cancel.send(()).unwrap();
    }
}
