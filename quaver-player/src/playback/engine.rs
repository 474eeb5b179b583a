//! Dual-slot transition engine
//!
//! Owns the two audio slots and the transition state machine:
//!
//! - **Steady**: one slot audible, the other idle and empty
//! - **Preloading**: the idle slot holds (or is loading) the upcoming track
//! - **Transitioning**: both slots audible while a crossfade runs
//!
//! The engine is event-driven: the host reports slot progress, natural ends,
//! and failures through [`SlotEvent`], and each event advances the machine.
//! Preloading starts when the audible track's remaining time drops under the
//! configured look-ahead. In gapless mode the swap happens at the natural
//! end; in crossfade mode the fade begins while the outgoing track is still
//! playing, and the incoming slot's own progress drives the gain ramp.
//!
//! Failure policy: a track that fails to load or play never advances the
//! cursor. The failure is surfaced as a notice and playback stops where it
//! was, so the listener decides what to do next.

use crate::config::{PlaybackConfig, TransitionStyle};
use crate::curves::volume_to_gain;
use crate::playback::slot::{SlotEvent, SlotPair};
use crate::state::{PlaybackPhase, PlayerStore};
use quaver_common::events::PlayerNotice;
use quaver_common::types::{PlaybackStatus, QueuedTrack};
use quaver_common::{Error, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An in-progress crossfade
struct Fade {
    /// Slot index still audible and ramping down
    outgoing: usize,
    /// Fade length in seconds; the incoming slot's position over this
    /// duration is the normalized curve position
    duration: f64,
}

/// The dual-slot playback state machine
pub struct TransitionEngine {
    slots: SlotPair,
    store: Arc<PlayerStore>,
    config: PlaybackConfig,
    phase: PlaybackPhase,
    fade: Option<Fade>,
}

impl TransitionEngine {
    pub fn new(slots: SlotPair, store: Arc<PlayerStore>, config: PlaybackConfig) -> Self {
        Self {
            slots,
            store,
            config,
            phase: PlaybackPhase::Steady,
            fade: None,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    /// Slot gain for full volume, derived from the session volume and mute
    fn master_gain(&self) -> f32 {
        let state = self.store.snapshot();
        if state.muted {
            0.0
        } else {
            volume_to_gain(state.volume)
        }
    }

    fn set_phase(&mut self, phase: PlaybackPhase) {
        self.phase = phase;
        self.store.set_phase(phase);
    }

    // ========== Commands from the player facade ==========

    /// Load the queue's current entry into the active slot and start playing
    pub async fn play_current(&mut self) -> Result<()> {
        let entry = self
            .store
            .current_track()
            .ok_or_else(|| Error::InvalidState("no current track to play".into()))?;
        self.cancel_fade().await?;
        self.slots.clear_slot(self.slots.idle_index()).await?;

        if let Err(e) = self.slots.load_active(entry.clone()).await {
            self.fail_current(&entry, &e.to_string()).await?;
            return Err(e);
        }
        let gain = self.master_gain();
        self.slots.active().set_gain(gain);
        self.slots.active().play().await?;
        self.set_phase(PlaybackPhase::Steady);
        self.store.set_status(PlaybackStatus::Playing);
        self.store.set_timestamp(0.0);
        info!("playing {}", entry.track.name);
        Ok(())
    }

    /// Load the queue's current entry without starting playback
    ///
    /// Used after session restore: the track is ready at position 0 but the
    /// session stays paused until the listener acts.
    pub async fn load_current_paused(&mut self) -> Result<()> {
        let entry = self
            .store
            .current_track()
            .ok_or_else(|| Error::InvalidState("no current track to load".into()))?;
        self.cancel_fade().await?;
        self.slots.load_active(entry).await?;
        let gain = self.master_gain();
        self.slots.active().set_gain(gain);
        self.set_phase(PlaybackPhase::Steady);
        self.store.set_timestamp(0.0);
        Ok(())
    }

    /// Jump to play-order position `pos`
    ///
    /// The target loads into the idle slot before anything is torn down, so
    /// a load failure leaves the current track playing and the cursor where
    /// it was.
    pub async fn skip_to(&mut self, pos: usize) -> Result<()> {
        let entry = self
            .store
            .queue()
            .track_at(pos)
            .cloned()
            .ok_or_else(|| Error::InvalidState(format!("no queue entry at position {pos}")))?;

        self.cancel_fade().await?;
        if let Err(e) = self.slots.load_idle(entry.clone()).await {
            self.store.notices().emit_lossy(PlayerNotice::PlaybackError {
                track: entry.track,
                message: e.to_string(),
                timestamp: chrono::Utc::now(),
            });
            return Err(e);
        }

        let old = self.slots.active_index();
        self.slots.swap_active();
        self.store.advance_to(pos);
        self.store.set_active_slot(self.slots.active_index());
        let gain = self.master_gain();
        self.slots.active().set_gain(gain);
        self.slots.active().play().await?;
        self.slots.clear_slot(old).await?;
        self.set_phase(PlaybackPhase::Steady);
        self.store.set_status(PlaybackStatus::Playing);
        debug!("skipped to position {}", pos);
        Ok(())
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.slots.active().pause().await?;
        if let Some(fade) = &self.fade {
            let outgoing = fade.outgoing;
            self.slots.slot(outgoing).pause().await?;
        }
        self.store.set_status(PlaybackStatus::Paused);
        Ok(())
    }

    pub async fn resume(&mut self) -> Result<()> {
        if self.slots.loaded_active().is_none() {
            // nothing loaded yet (e.g. restored session); start from queue
            return self.play_current().await;
        }
        self.slots.active().play().await?;
        if let Some(fade) = &self.fade {
            let outgoing = fade.outgoing;
            self.slots.slot(outgoing).play().await?;
        }
        self.store.set_status(PlaybackStatus::Playing);
        Ok(())
    }

    /// Seek within the current track
    ///
    /// Seeking mid-fade resolves the fade immediately: the incoming track
    /// snaps to full gain and the outgoing slot stops. Seeking backward past
    /// the look-ahead window discards an in-flight preload; the window will
    /// re-trigger it when the boundary approaches again.
    pub async fn seek(&mut self, seconds: f64) -> Result<()> {
        self.cancel_fade().await?;
        self.slots.active().seek(seconds).await?;
        self.store.set_timestamp(seconds);

        if self.phase == PlaybackPhase::Preloading {
            let outside_window = self
                .slots
                .loaded_active()
                .map(|e| e.track.duration_secs() - seconds > self.config.preload_lookahead_secs())
                .unwrap_or(false);
            if outside_window {
                let idle = self.slots.idle_index();
                self.slots.clear_slot(idle).await?;
                self.set_phase(PlaybackPhase::Steady);
            }
        }
        Ok(())
    }

    /// Re-apply volume/mute to the slots
    ///
    /// Mid-fade the next progress tick recomputes both ramp gains from the
    /// new master, so only the steady case is handled here.
    pub fn apply_gain(&mut self) {
        if self.fade.is_none() {
            let gain = self.master_gain();
            self.slots.active().set_gain(gain);
        }
    }

    pub fn apply_speed(&mut self, speed: f32) {
        self.slots.set_speed_both(speed);
    }

    /// Tear down both slots and halt
    pub async fn stop(&mut self) -> Result<()> {
        self.fade = None;
        self.slots.clear_slot(0).await?;
        self.slots.clear_slot(1).await?;
        self.set_phase(PlaybackPhase::Steady);
        self.store.set_status(PlaybackStatus::Paused);
        self.store.set_timestamp(0.0);
        Ok(())
    }

    // ========== Host events ==========

    pub async fn handle_event(&mut self, event: SlotEvent) -> Result<()> {
        match event {
            SlotEvent::Progress { slot, seconds } => self.on_progress(slot, seconds).await,
            SlotEvent::Ended { slot } => self.on_ended(slot).await,
            SlotEvent::Failed { slot, message } => self.on_failed(slot, &message).await,
        }
    }

    async fn on_progress(&mut self, slot: usize, seconds: f64) -> Result<()> {
        if slot != self.slots.active_index() {
            // outgoing slot ticking down during a fade; its gain is driven
            // by the incoming slot's progress
            return Ok(());
        }
        self.store.set_timestamp(seconds);

        if let Some(fade) = &self.fade {
            let t = (seconds / fade.duration) as f32;
            let outgoing = fade.outgoing;
            let master = self.master_gain();
            let (out_gain, in_gain) = self.config.crossfade_curve.gain_pair(t);
            self.slots.slot(outgoing).set_gain(out_gain * master);
            self.slots.active().set_gain(in_gain * master);
            if t >= 1.0 {
                self.finish_fade().await?;
            }
            return Ok(());
        }

        let Some(duration) = self.slots.loaded_active().map(|e| e.track.duration_secs())
        else {
            return Ok(());
        };
        if duration <= 0.0 {
            return Ok(());
        }
        let remaining = duration - seconds;

        if self.phase == PlaybackPhase::Steady
            && remaining <= self.config.preload_lookahead_secs()
        {
            self.start_preload().await;
        }

        if self.config.transition == TransitionStyle::Crossfade
            && self.phase == PlaybackPhase::Preloading
            && remaining <= self.config.crossfade_duration_secs()
        {
            self.maybe_begin_fade().await?;
        }
        Ok(())
    }

    /// Load the next queue entry into the idle slot ahead of the boundary
    async fn start_preload(&mut self) {
        let queue = self.store.queue();
        let Some(next) = queue
            .next_position(false)
            .and_then(|pos| queue.track_at(pos).cloned())
        else {
            return;
        };
        debug!("preloading {}", next.track.name);
        // Preloading is entered even if the load fails: the boundary handler
        // treats an empty idle slot as a miss and retries inline
        self.set_phase(PlaybackPhase::Preloading);
        if let Err(e) = self.slots.load_idle(next).await {
            warn!("preload failed, will retry at the boundary: {}", e);
        }
    }

    /// Begin the crossfade if the preloaded entry still matches the queue
    async fn maybe_begin_fade(&mut self) -> Result<()> {
        let queue = self.store.queue();
        let Some(pos) = queue.next_position(false) else {
            return Ok(());
        };
        let Some(expected) = queue.track_at(pos) else {
            return Ok(());
        };
        if self.slots.loaded_idle().map(|e| e.instance_id) != Some(expected.instance_id) {
            // queue changed since the preload; the boundary handler reloads
            return Ok(());
        }

        let master = self.master_gain();
        let (out_gain, in_gain) = self.config.crossfade_curve.gain_pair(0.0);
        let outgoing = self.slots.active_index();
        self.slots.slot(outgoing).set_gain(out_gain * master);
        self.slots.idle().set_gain(in_gain * master);
        self.slots.idle().play().await?;
        self.slots.swap_active();
        self.store.advance_to(pos);
        self.store.set_active_slot(self.slots.active_index());
        self.fade = Some(Fade {
            outgoing,
            duration: self.config.crossfade_duration_secs(),
        });
        self.set_phase(PlaybackPhase::Transitioning);
        debug!(
            "crossfade started ({} curve, {:.1}s)",
            self.config.crossfade_curve.as_str(),
            self.config.crossfade_duration_secs()
        );
        Ok(())
    }

    /// Ramp complete: silence and release the outgoing slot
    async fn finish_fade(&mut self) -> Result<()> {
        if let Some(fade) = self.fade.take() {
            self.slots.clear_slot(fade.outgoing).await?;
        }
        let gain = self.master_gain();
        self.slots.active().set_gain(gain);
        self.set_phase(PlaybackPhase::Steady);
        Ok(())
    }

    /// Resolve an in-progress fade immediately (skip, seek, new play request)
    async fn cancel_fade(&mut self) -> Result<()> {
        if let Some(fade) = self.fade.take() {
            self.slots.clear_slot(fade.outgoing).await?;
            let gain = self.master_gain();
            self.slots.active().set_gain(gain);
            self.set_phase(PlaybackPhase::Steady);
        }
        Ok(())
    }

    async fn on_ended(&mut self, slot: usize) -> Result<()> {
        // an outgoing track may run out before its ramp does
        if let Some(fade) = &self.fade {
            if slot == fade.outgoing {
                return self.finish_fade().await;
            }
        }
        if slot != self.slots.active_index() {
            return Ok(());
        }

        let queue = self.store.queue();
        let Some(pos) = queue.next_position(false) else {
            // queue exhausted; cursor stays on the last entry
            info!("queue exhausted, stopping");
            let active = self.slots.active_index();
            self.slots.clear_slot(active).await?;
            self.set_phase(PlaybackPhase::Steady);
            self.store.set_status(PlaybackStatus::Paused);
            self.store.set_timestamp(0.0);
            return Ok(());
        };
        let expected = queue
            .track_at(pos)
            .cloned()
            .ok_or_else(|| Error::InvalidState(format!("queue has no entry at {pos}")))?;

        if self.slots.loaded_idle().map(|e| e.instance_id) != Some(expected.instance_id) {
            // preload missed (slow load, or the queue changed under it)
            self.store.notices().emit_lossy(PlayerNotice::PreloadMissed {
                track: expected.track.clone(),
                timestamp: chrono::Utc::now(),
            });
            if let Err(e) = self.slots.load_idle(expected.clone()).await {
                self.fail_current(&expected, &e.to_string()).await?;
                return Ok(());
            }
        }

        let old = self.slots.active_index();
        self.slots.swap_active();
        self.store.advance_to(pos);
        self.store.set_active_slot(self.slots.active_index());
        let gain = self.master_gain();
        self.slots.active().set_gain(gain);
        self.slots.active().play().await?;
        self.slots.clear_slot(old).await?;
        self.set_phase(PlaybackPhase::Steady);
        Ok(())
    }

    async fn on_failed(&mut self, slot: usize, message: &str) -> Result<()> {
        if slot == self.slots.active_index() {
            let entry = self
                .slots
                .loaded_active()
                .cloned()
                .or_else(|| self.store.current_track());
            if let Some(fade) = self.fade.take() {
                self.slots.clear_slot(fade.outgoing).await?;
            }
            if let Some(entry) = entry {
                self.fail_current(&entry, message).await?;
            }
            return Ok(());
        }

        // idle/preload failure is non-fatal; the boundary handler retries
        warn!("preload slot failed: {}", message);
        self.slots.clear_slot(slot).await?;
        if self.phase == PlaybackPhase::Preloading {
            self.set_phase(PlaybackPhase::Steady);
        }
        Ok(())
    }

    /// Surface a failure on the audible track and halt without advancing
    async fn fail_current(&mut self, entry: &QueuedTrack, message: &str) -> Result<()> {
        warn!("playback failed for {}: {}", entry.track.name, message);
        self.store.notices().emit_lossy(PlayerNotice::PlaybackError {
            track: entry.track.clone(),
            message: message.to_string(),
            timestamp: chrono::Utc::now(),
        });
        let active = self.slots.active_index();
        self.slots.clear_slot(active).await?;
        self.set_phase(PlaybackPhase::Steady);
        self.store.set_status(PlaybackStatus::Paused);
        Ok(())
    }
}
