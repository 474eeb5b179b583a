//! Audio slot boundary
//!
//! A *slot* is one independently controllable audio source (one decoder +
//! output chain in the host). The engine drives exactly two of them so a
//! second track can be loaded, started, and faded while the first is still
//! audible. Everything below the [`AudioSlot`] trait — decoding, buffering,
//! the output device — is the host's concern; the engine only issues
//! commands and consumes [`SlotEvent`]s the host reports back.

use async_trait::async_trait;
use quaver_common::types::{QueuedTrack, Track};
use quaver_common::Result;

/// Occurrence reported by the host for one slot
///
/// `slot` is the index (0 or 1) the engine addressed the slot by.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent {
    /// Playback position advanced, in seconds into the track
    Progress { slot: usize, seconds: f64 },
    /// The loaded track played to its natural end
    Ended { slot: usize },
    /// The slot failed while loading or playing
    Failed { slot: usize, message: String },
}

/// One controllable audio source
///
/// Commands are applied in order per slot. `load` replaces whatever the slot
/// held before; a failed `load` leaves the slot empty. Gain and speed are
/// cheap synchronous knobs the host applies to the next buffer it renders.
#[async_trait]
pub trait AudioSlot: Send {
    /// Prepare the slot to play `track` from its stream URL, paused at 0
    async fn load(&mut self, track: &Track) -> Result<()>;

    /// Begin or resume audible output
    async fn play(&mut self) -> Result<()>;

    /// Suspend output, keeping position
    async fn pause(&mut self) -> Result<()>;

    /// Discard the loaded source and release its resources
    async fn stop(&mut self) -> Result<()>;

    /// Jump to an absolute position in seconds
    async fn seek(&mut self, seconds: f64) -> Result<()>;

    /// Output gain multiplier, 0.0-1.0
    fn set_gain(&mut self, gain: f32);

    /// Playback rate multiplier
    fn set_speed(&mut self, speed: f32);
}

/// One slot plus what the engine believes it holds
struct SlotHandle {
    audio: Box<dyn AudioSlot>,
    loaded: Option<QueuedTrack>,
}

/// The engine's pair of slots with an audible/idle role assignment
///
/// Index 0/1 is the host-facing slot identity and never changes; which index
/// is *active* (audible) swaps at every transition. The pair also tracks the
/// queue entry each slot holds, so the engine can verify at a boundary that
/// the preloaded entry is still the right one.
pub struct SlotPair {
    slots: [SlotHandle; 2],
    active: usize,
}

impl SlotPair {
    pub fn new(a: Box<dyn AudioSlot>, b: Box<dyn AudioSlot>) -> Self {
        Self {
            slots: [
                SlotHandle {
                    audio: a,
                    loaded: None,
                },
                SlotHandle {
                    audio: b,
                    loaded: None,
                },
            ],
            active: 0,
        }
    }

    /// Index of the audible slot
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Index of the idle (preload) slot
    pub fn idle_index(&self) -> usize {
        1 - self.active
    }

    pub fn active(&mut self) -> &mut dyn AudioSlot {
        self.slots[self.active].audio.as_mut()
    }

    pub fn idle(&mut self) -> &mut dyn AudioSlot {
        self.slots[1 - self.active].audio.as_mut()
    }

    pub fn slot(&mut self, index: usize) -> &mut dyn AudioSlot {
        self.slots[index].audio.as_mut()
    }

    /// Queue entry the slot at `index` holds
    pub fn loaded(&self, index: usize) -> Option<&QueuedTrack> {
        self.slots[index].loaded.as_ref()
    }

    pub fn loaded_active(&self) -> Option<&QueuedTrack> {
        self.loaded(self.active)
    }

    pub fn loaded_idle(&self) -> Option<&QueuedTrack> {
        self.loaded(1 - self.active)
    }

    /// Load `entry` into the idle slot
    ///
    /// On failure the idle slot is marked empty and the active slot is
    /// untouched.
    pub async fn load_idle(&mut self, entry: QueuedTrack) -> Result<()> {
        let idle = 1 - self.active;
        self.slots[idle].loaded = None;
        self.slots[idle].audio.load(&entry.track).await?;
        self.slots[idle].loaded = Some(entry);
        Ok(())
    }

    /// Load `entry` into the active slot
    pub async fn load_active(&mut self, entry: QueuedTrack) -> Result<()> {
        let active = self.active;
        self.slots[active].loaded = None;
        self.slots[active].audio.load(&entry.track).await?;
        self.slots[active].loaded = Some(entry);
        Ok(())
    }

    /// Make the idle slot the active one (roles swap; contents stay put)
    pub fn swap_active(&mut self) {
        self.active = 1 - self.active;
    }

    /// Stop the slot at `index` and forget its contents
    pub async fn clear_slot(&mut self, index: usize) -> Result<()> {
        self.slots[index].loaded = None;
        self.slots[index].audio.stop().await
    }

    /// Set the same gain on both slots
    pub fn set_gain_both(&mut self, gain: f32) {
        for handle in &mut self.slots {
            handle.audio.set_gain(gain);
        }
    }

    /// Set the same speed on both slots
    pub fn set_speed_both(&mut self, speed: f32) {
        for handle in &mut self.slots {
            handle.audio.set_speed(speed);
        }
    }
}
