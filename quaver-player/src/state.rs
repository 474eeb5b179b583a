//! Player state store with slice subscriptions
//!
//! **Responsibilities:**
//! - Hold the canonical playback session state plus the current queue snapshot
//! - Funnel all mutation through a small set of named operations
//! - After each mutation, compute which named slices changed and notify only
//!   the subscribers registered for those slices, with `(next, previous)` so
//!   consumers can diff
//!
//! The store is an explicitly constructed object owned by the composition
//! root and passed by reference; there is no ambient global. Subscribers for
//! one slice are notified FIFO in subscription order. High-frequency slices
//! (Timestamp) support a throttled subscription mode so low-priority
//! consumers do not receive every tick.

use crate::queue::Queue;
use quaver_common::events::{NoticeBus, PlayerNotice};
use quaver_common::types::{PlaybackStatus, QueuedTrack, RepeatMode};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

/// Transition substate of the dual-slot engine, mirrored into session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    /// One slot audible, the other idle
    #[default]
    Steady,
    /// The idle slot holds (or is loading) the upcoming track
    Preloading,
    /// Both slots participate in an in-progress transition
    Transitioning,
}

/// Canonical playback session state
#[derive(Debug, Clone)]
pub struct PlayerState {
    /// Current queue snapshot (copy-on-write; never aliased by subscribers)
    pub queue: Queue,

    /// Playing or Paused
    pub status: PlaybackStatus,

    /// Position within the current track, in seconds
    pub timestamp_secs: f64,

    /// UI volume, 0-100 linear
    pub volume: u8,

    /// Mute flag (volume value is preserved while muted)
    pub muted: bool,

    /// Playback speed multiplier
    pub speed: f32,

    /// Index of the slot currently driving audible output (0 or 1)
    pub active_slot: usize,

    /// Engine transition substate
    pub phase: PlaybackPhase,
}

impl PlayerState {
    fn new() -> Self {
        Self {
            queue: Queue::new(),
            status: PlaybackStatus::Paused,
            timestamp_secs: 0.0,
            volume: 75,
            muted: false,
            speed: 1.0,
            active_slot: 0,
            phase: PlaybackPhase::Steady,
        }
    }

    /// The queue entry under the cursor, if any
    pub fn current_track(&self) -> Option<&QueuedTrack> {
        self.queue.current()
    }
}

impl Default for PlayerState {
    fn default() -> Self {
        Self::new()
    }
}

/// Named state slices subscribers can observe independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slice {
    CurrentTrack,
    Status,
    Timestamp,
    Volume,
    Mute,
    Speed,
    Queue,
    Repeat,
    Shuffle,
}

impl Slice {
    /// All slices in dispatch order (order across slices is an
    /// implementation detail; order within a slice is FIFO)
    pub const ALL: [Slice; 9] = [
        Slice::CurrentTrack,
        Slice::Status,
        Slice::Timestamp,
        Slice::Volume,
        Slice::Mute,
        Slice::Speed,
        Slice::Queue,
        Slice::Repeat,
        Slice::Shuffle,
    ];
}

/// Handle returned by subscribe; pass back to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    slice: Slice,
    id: u64,
}

type SliceCallback = Box<dyn FnMut(&PlayerState, &PlayerState) + Send>;

struct SubEntry {
    id: u64,
    /// Minimum interval between deliveries; None = every change
    min_interval: Option<Duration>,
    last_delivered: Option<Instant>,
    callback: SliceCallback,
}

struct Inner {
    state: PlayerState,
    subs: HashMap<Slice, Vec<SubEntry>>,
    next_id: u64,
    /// Ids unsubscribed while their bucket was out for dispatch
    dead: HashSet<u64>,
}

/// The single process-wide player state container
pub struct PlayerStore {
    inner: Mutex<Inner>,
    notices: NoticeBus,
}

impl PlayerStore {
    pub fn new(notices: NoticeBus) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: PlayerState::new(),
                subs: HashMap::new(),
                next_id: 0,
                dead: HashSet::new(),
            }),
            notices,
        }
    }

    /// Handle to the discrete notice bus shared with this store
    pub fn notices(&self) -> NoticeBus {
        self.notices.clone()
    }

    /// Clone of the full current state
    pub fn snapshot(&self) -> PlayerState {
        self.inner.lock().unwrap().state.clone()
    }

    /// Clone of the current queue snapshot
    pub fn queue(&self) -> Queue {
        self.inner.lock().unwrap().state.queue.clone()
    }

    /// Clone of the current queue entry, if any
    pub fn current_track(&self) -> Option<QueuedTrack> {
        self.inner.lock().unwrap().state.current_track().cloned()
    }

    // ========== Subscription ==========

    /// Subscribe to one slice; the callback receives `(next, previous)`
    pub fn subscribe<F>(&self, slice: Slice, callback: F) -> Subscription
    where
        F: FnMut(&PlayerState, &PlayerState) + Send + 'static,
    {
        self.subscribe_inner(slice, None, Box::new(callback))
    }

    /// Subscribe with a minimum delivery interval
    ///
    /// Deliveries arriving sooner than `min_interval` after the previous one
    /// are dropped for this subscriber (not queued). Intended for
    /// high-frequency slices like Timestamp.
    pub fn subscribe_throttled<F>(
        &self,
        slice: Slice,
        min_interval: Duration,
        callback: F,
    ) -> Subscription
    where
        F: FnMut(&PlayerState, &PlayerState) + Send + 'static,
    {
        self.subscribe_inner(slice, Some(min_interval), Box::new(callback))
    }

    fn subscribe_inner(
        &self,
        slice: Slice,
        min_interval: Option<Duration>,
        callback: SliceCallback,
    ) -> Subscription {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subs.entry(slice).or_default().push(SubEntry {
            id,
            min_interval,
            last_delivered: None,
            callback,
        });
        Subscription { slice, id }
    }

    /// Remove a subscription; safe to call from inside a callback
    pub fn unsubscribe(&self, sub: Subscription) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(bucket) = inner.subs.get_mut(&sub.slice) {
            let before = bucket.len();
            bucket.retain(|e| e.id != sub.id);
            if bucket.len() < before {
                return;
            }
        }
        // bucket is currently out for dispatch; drop it on merge-back
        inner.dead.insert(sub.id);
    }

    // ========== Named mutation operations ==========

    /// Replace the queue snapshot (enqueue/remove/reorder results)
    pub fn set_queue(&self, queue: Queue) {
        self.commit(move |s| s.queue = queue);
    }

    /// Move the cursor to a play-order position; resets the timestamp
    pub fn advance_to(&self, pos: usize) {
        self.commit(move |s| {
            s.queue = s.queue.advance_to(pos);
            s.timestamp_secs = 0.0;
        });
    }

    pub fn set_status(&self, status: PlaybackStatus) {
        self.commit(move |s| s.status = status);
    }

    /// Progress tick from the engine, in seconds
    pub fn set_timestamp(&self, seconds: f64) {
        self.commit(move |s| s.timestamp_secs = seconds);
    }

    pub fn set_volume(&self, volume: u8) {
        let volume = if volume > 100 {
            warn!("volume {} above 100, clamping", volume);
            100
        } else {
            volume
        };
        self.commit(move |s| s.volume = volume);
    }

    pub fn set_mute(&self, muted: bool) {
        self.commit(move |s| s.muted = muted);
    }

    pub fn set_speed(&self, speed: f32) {
        let speed = if !(0.25..=3.0).contains(&speed) {
            let clamped = speed.clamp(0.25, 3.0);
            warn!("speed {} outside 0.25-3.0, clamping to {}", speed, clamped);
            clamped
        } else {
            speed
        };
        self.commit(move |s| s.speed = speed);
    }

    pub fn set_repeat(&self, mode: RepeatMode) {
        self.commit(move |s| s.queue = s.queue.set_repeat(mode));
    }

    /// Toggle shuffle on the current queue
    pub fn set_shuffle(&self, on: bool) {
        let mut rng = rand::rng();
        self.commit(move |s| s.queue = s.queue.toggle_shuffle(on, &mut rng));
    }

    /// Engine-internal session fields; not part of any slice
    pub fn set_phase(&self, phase: PlaybackPhase) {
        self.commit(move |s| s.phase = phase);
    }

    pub fn set_active_slot(&self, slot: usize) {
        self.commit(move |s| s.active_slot = slot);
    }

    // ========== Dispatch ==========

    /// Apply a mutation, diff slices, notify affected subscribers
    ///
    /// Callbacks run outside the store lock so they may re-enter the store
    /// (subscribe, unsubscribe, read snapshots). Re-entrant *mutation* from a
    /// callback is not supported and would interleave notifications.
    fn commit<F: FnOnce(&mut PlayerState)>(&self, mutate: F) {
        let (prev, next, changed, mut taken) = {
            let mut inner = self.inner.lock().unwrap();
            let prev = inner.state.clone();
            mutate(&mut inner.state);
            let next = inner.state.clone();
            let changed = changed_slices(&prev, &next);
            if changed.is_empty() {
                return;
            }
            let mut taken: Vec<(Slice, Vec<SubEntry>)> = Vec::new();
            for slice in &changed {
                if let Some(bucket) = inner.subs.get_mut(slice) {
                    if !bucket.is_empty() {
                        taken.push((*slice, std::mem::take(bucket)));
                    }
                }
            }
            (prev, next, changed, taken)
        };

        let now = Instant::now();
        for (_, entries) in taken.iter_mut() {
            for entry in entries.iter_mut() {
                if let Some(min) = entry.min_interval {
                    if let Some(last) = entry.last_delivered {
                        if now.duration_since(last) < min {
                            continue;
                        }
                    }
                }
                (entry.callback)(&next, &prev);
                entry.last_delivered = Some(now);
            }
        }

        {
            let mut inner = self.inner.lock().unwrap();
            for (slice, mut entries) in taken {
                entries.retain(|e| !inner.dead.remove(&e.id));
                let bucket = inner.subs.entry(slice).or_default();
                // dispatched entries keep their FIFO position ahead of any
                // added during dispatch
                let added = std::mem::take(bucket);
                *bucket = entries;
                bucket.extend(added);
            }
        }

        // Removing the last entry signals "queue cleared", distinct from the
        // current track merely becoming undefined
        if changed.contains(&Slice::Queue) && next.queue.is_empty() && !prev.queue.is_empty() {
            self.notices.emit_lossy(PlayerNotice::QueueCleared {
                timestamp: chrono::Utc::now(),
            });
        }
    }
}

/// Which slices differ between two states
fn changed_slices(prev: &PlayerState, next: &PlayerState) -> Vec<Slice> {
    let mut changed = Vec::new();

    let current_id = |s: &PlayerState| -> Option<Uuid> {
        s.current_track().map(|t| t.instance_id)
    };

    if current_id(prev) != current_id(next) {
        changed.push(Slice::CurrentTrack);
    }
    if prev.status != next.status {
        changed.push(Slice::Status);
    }
    if prev.timestamp_secs != next.timestamp_secs {
        changed.push(Slice::Timestamp);
    }
    if prev.volume != next.volume {
        changed.push(Slice::Volume);
    }
    if prev.muted != next.muted {
        changed.push(Slice::Mute);
    }
    if prev.speed != next.speed {
        changed.push(Slice::Speed);
    }
    if queue_slice_changed(&prev.queue, &next.queue) {
        changed.push(Slice::Queue);
    }
    if prev.queue.repeat() != next.queue.repeat() {
        changed.push(Slice::Repeat);
    }
    if prev.queue.is_shuffled() != next.queue.is_shuffled() {
        changed.push(Slice::Shuffle);
    }
    changed
}

/// Queue slice covers contents, visible order, and cursor (not repeat/shuffle
/// flags, which have their own slices)
fn queue_slice_changed(a: &Queue, b: &Queue) -> bool {
    a.cursor() != b.cursor()
        || a.len() != b.len()
        || a.entries() != b.entries()
        || !a
            .iter_play_order()
            .map(|t| t.instance_id)
            .eq(b.iter_play_order().map(|t| t.instance_id))
}
