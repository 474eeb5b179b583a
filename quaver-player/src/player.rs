//! Player facade
//!
//! Composition root for the playback core: owns the store, the transition
//! engine, and the resolver, and exposes the operation surface outer layers
//! call (play requests, transport, queue edits, session persistence, media
//! keys). All methods take `&self`; the engine sits behind an async mutex so
//! transport commands serialize against slot events.
//!
//! Play requests carry a generation number. Each new request bumps the
//! counter before resolution starts; when resolution finishes, a request
//! whose generation is no longer current is dropped without touching the
//! queue. A slow resolution can therefore never clobber a newer request.

use crate::config::PlaybackConfig;
use crate::playback::engine::TransitionEngine;
use crate::playback::slot::{SlotEvent, SlotPair};
use crate::queue::{EnqueueMode, Queue};
use crate::resolver::{FetchParams, MetadataApi, PlaySource, TrackResolver};
use crate::state::PlayerStore;
use quaver_common::events::{MediaKeyCommand, NoticeBus, PlayerNotice};
use quaver_common::types::{PersistedSession, PlaybackStatus, QueuedTrack, RepeatMode, Track};
use quaver_common::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Elapsed seconds beyond which "previous" restarts the current track
/// instead of moving back
const PREVIOUS_RESTART_THRESHOLD_SECS: f64 = 3.0;

/// The playback core's public face
pub struct Player {
    store: Arc<PlayerStore>,
    engine: Mutex<TransitionEngine>,
    resolver: TrackResolver,
    /// Current play-request generation; stale requests are dropped
    generation: AtomicU64,
}

impl Player {
    pub fn new(api: Arc<dyn MetadataApi>, slots: SlotPair, config: PlaybackConfig) -> Self {
        let notices = NoticeBus::new(64);
        let store = Arc::new(PlayerStore::new(notices));
        let resolver = TrackResolver::new(api, config.max_folder_depth);
        let engine = TransitionEngine::new(slots, store.clone(), config);
        Self {
            store,
            engine: Mutex::new(engine),
            resolver,
            generation: AtomicU64::new(0),
        }
    }

    /// Shared handle to the state store (slice subscriptions, snapshots)
    pub fn store(&self) -> Arc<PlayerStore> {
        self.store.clone()
    }

    /// Handle to the discrete notice bus
    pub fn notices(&self) -> NoticeBus {
        self.store.notices()
    }

    // ========== Play requests ==========

    /// Resolve a play source and apply it to the queue
    ///
    /// Resolution is all-or-nothing: an error leaves the queue untouched.
    /// If a newer play request was issued while this one resolved, the
    /// result is discarded.
    pub async fn play(
        &self,
        source: &PlaySource,
        mode: EnqueueMode,
        params: &FetchParams,
    ) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let resolved = self.resolver.resolve(source, params).await?;

        let mut engine = self.engine.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("dropping stale play request (generation {})", generation);
            return Ok(());
        }
        if resolved.tracks.is_empty() {
            info!("play source resolved to no tracks");
            return Ok(());
        }

        let entries: Vec<QueuedTrack> =
            resolved.tracks.into_iter().map(QueuedTrack::new).collect();
        self.apply_enqueue(&mut engine, entries, mode).await
    }

    /// Apply an already-resolved track list to the queue
    pub async fn play_tracks(&self, tracks: Vec<Track>, mode: EnqueueMode) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut engine = self.engine.lock().await;
        if tracks.is_empty() {
            return Ok(());
        }
        let entries: Vec<QueuedTrack> = tracks.into_iter().map(QueuedTrack::new).collect();
        self.apply_enqueue(&mut engine, entries, mode).await
    }

    async fn apply_enqueue(
        &self,
        engine: &mut TransitionEngine,
        entries: Vec<QueuedTrack>,
        mode: EnqueueMode,
    ) -> Result<()> {
        let before = self.store.queue();
        let was_empty = before.is_empty();
        let queue = before.enqueue(entries, mode, None, &mut rand::rng());
        self.store.set_queue(queue);

        // Next/Last add without interrupting; everything else (and any
        // enqueue into an empty queue) starts the new current track
        let starts_playback = was_empty
            || matches!(
                mode,
                EnqueueMode::Now
                    | EnqueueMode::Index(_)
                    | EnqueueMode::Shuffle
            );
        if starts_playback {
            engine.play_current().await?;
        }
        Ok(())
    }

    // ========== Transport ==========

    /// Move to the next track (manual skip; repeat One does not hold it back)
    pub async fn skip_next(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        match self.store.queue().next_position(true) {
            Some(pos) => engine.skip_to(pos).await,
            None => {
                info!("skip past the end of the queue, stopping");
                engine.stop().await
            }
        }
    }

    /// Move to the previous track, or restart the current one when more than
    /// a few seconds in
    pub async fn skip_previous(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        if self.store.snapshot().timestamp_secs > PREVIOUS_RESTART_THRESHOLD_SECS {
            return engine.seek(0.0).await;
        }
        match self.store.queue().previous_position() {
            Some(pos) => engine.skip_to(pos).await,
            None => engine.seek(0.0).await,
        }
    }

    pub async fn pause(&self) -> Result<()> {
        self.engine.lock().await.pause().await
    }

    pub async fn resume(&self) -> Result<()> {
        self.engine.lock().await.resume().await
    }

    pub async fn toggle_playback(&self) -> Result<()> {
        match self.store.snapshot().status {
            PlaybackStatus::Playing => self.pause().await,
            PlaybackStatus::Paused => self.resume().await,
        }
    }

    pub async fn seek(&self, seconds: f64) -> Result<()> {
        self.engine.lock().await.seek(seconds).await
    }

    // ========== Session knobs ==========

    pub async fn set_volume(&self, volume: u8) {
        self.store.set_volume(volume);
        self.engine.lock().await.apply_gain();
    }

    pub async fn set_mute(&self, muted: bool) {
        self.store.set_mute(muted);
        self.engine.lock().await.apply_gain();
    }

    pub async fn set_speed(&self, speed: f32) {
        self.store.set_speed(speed);
        let applied = self.store.snapshot().speed;
        self.engine.lock().await.apply_speed(applied);
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.store.set_repeat(mode);
    }

    pub fn set_shuffle(&self, on: bool) {
        self.store.set_shuffle(on);
    }

    // ========== Queue edits ==========

    /// Remove entries by instance id
    ///
    /// If the audible entry is removed while playing, whatever slides into
    /// the cursor starts playing; emptying the queue stops playback.
    pub async fn remove_tracks(&self, instance_ids: &[Uuid]) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let before = self.store.queue();
        let current_before = before.current().map(|t| t.instance_id);
        let queue = before.remove_by_instance_ids(instance_ids);
        let current_after = queue.current().map(|t| t.instance_id);
        let playing = self.store.snapshot().status == PlaybackStatus::Playing;
        self.store.set_queue(queue);

        if current_before != current_after {
            match current_after {
                Some(_) if playing => engine.play_current().await?,
                Some(_) => engine.load_current_paused().await?,
                None => engine.stop().await?,
            }
        }
        Ok(())
    }

    /// Reorder a block of play-order positions
    pub fn move_tracks(&self, from: usize, to: usize, count: usize) {
        let queue = self.store.queue().move_range(from, to, count);
        self.store.set_queue(queue);
    }

    /// Empty the queue and stop playback
    pub async fn clear_queue(&self) -> Result<()> {
        // cancel any in-flight play request so it cannot repopulate the queue
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut engine = self.engine.lock().await;
        let queue = self.store.queue().clear();
        self.store.set_queue(queue);
        engine.stop().await
    }

    // ========== Session persistence ==========

    /// Seed the queue from a persisted session, paused at the saved entry
    pub async fn restore_session(&self, session: &PersistedSession) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let mut engine = self.engine.lock().await;
        let queue = Queue::from_session(session, &mut rand::rng());
        let entries = queue.len();
        self.store.set_queue(queue);
        self.store.set_volume(session.volume);
        self.store.notices().emit_lossy(PlayerNotice::QueueRestored {
            entries,
            timestamp: chrono::Utc::now(),
        });

        if entries > 0 {
            // a failed load here is not fatal: the session is restored and
            // the listener's first resume retries
            if let Err(e) = engine.load_current_paused().await {
                warn!("restored session track failed to load: {}", e);
            }
        }
        info!("session restored with {} entries", entries);
        Ok(())
    }

    /// Serializable snapshot for the persistence layer
    pub fn session_snapshot(&self) -> PersistedSession {
        let state = self.store.snapshot();
        state.queue.to_session(state.volume)
    }

    // ========== Host integration ==========

    /// Dispatch an OS media-key press
    pub async fn handle_media_key(&self, command: MediaKeyCommand) -> Result<()> {
        self.store.notices().emit_lossy(PlayerNotice::MediaKey {
            command,
            timestamp: chrono::Utc::now(),
        });
        match command {
            MediaKeyCommand::Next => self.skip_next().await,
            MediaKeyCommand::Previous => self.skip_previous().await,
        }
    }

    /// Feed a host-reported slot event into the engine
    pub async fn handle_slot_event(&self, event: SlotEvent) -> Result<()> {
        self.engine.lock().await.handle_event(event).await
    }
}
