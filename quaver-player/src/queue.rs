//! Play queue model
//!
//! **Responsibilities:**
//! - Ordered track sequence with a play-order cursor
//! - Shuffle permutation (play-order -> physical bijection) and repeat mode
//! - Pure copy-on-write mutations: every operation returns a new snapshot
//!
//! The queue does no I/O and emits no events; the player store publishes
//! snapshots to subscribers. Because snapshots never alias, a subscriber can
//! hold a previous snapshot and diff it against the next one safely.
//!
//! Two index spaces appear throughout:
//! - *physical*: position in the underlying entry vector
//! - *play-order*: position in the order tracks will actually play; equals
//!   physical order unless shuffle is active
//!
//! Invariant: the cursor is a play-order index in `[0, len)` whenever the
//! queue is non-empty, and `None` when empty.

use quaver_common::types::{PersistedSession, QueuedTrack, RepeatMode};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use uuid::Uuid;

/// Placement mode for [`Queue::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueMode {
    /// Replace the queue and start at the anchor (or the first track)
    Now,
    /// Insert immediately after the current play-order position
    Next,
    /// Append to the end of the play order
    Last,
    /// Replace the queue and start at the given index within the new tracks
    Index(usize),
    /// Like Now, but the incoming tracks are randomized first
    Shuffle,
    /// Like Next, but the incoming tracks are randomized first
    NextShuffle,
    /// Like Last, but the incoming tracks are randomized first
    LastShuffle,
}

/// Ordered, copy-on-write play queue
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Queue {
    /// Entries in physical order
    entries: Vec<QueuedTrack>,

    /// Shuffle permutation, play-order -> physical; `None` means identity
    order: Option<Vec<usize>>,

    /// Play-order index of the current entry
    cursor: Option<usize>,

    /// Repeat mode
    repeat: RepeatMode,
}

impl Queue {
    /// Empty queue with default repeat mode
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a shuffle permutation is active
    pub fn is_shuffled(&self) -> bool {
        self.order.is_some()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    /// Play-order index of the current entry (`None` when empty)
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// Entries in physical order
    pub fn entries(&self) -> &[QueuedTrack] {
        &self.entries
    }

    /// Physical index behind play-order position `pos`
    pub fn physical_index(&self, pos: usize) -> usize {
        match &self.order {
            Some(order) => order[pos],
            None => pos,
        }
    }

    /// Entry at play-order position `pos`
    pub fn track_at(&self, pos: usize) -> Option<&QueuedTrack> {
        if pos < self.len() {
            Some(&self.entries[self.physical_index(pos)])
        } else {
            None
        }
    }

    /// The current entry, if any
    pub fn current(&self) -> Option<&QueuedTrack> {
        self.cursor.and_then(|c| self.track_at(c))
    }

    /// Iterate entries in play order
    pub fn iter_play_order(&self) -> impl Iterator<Item = &QueuedTrack> + '_ {
        (0..self.len()).map(move |pos| &self.entries[self.physical_index(pos)])
    }

    /// Play-order position of an instance id
    pub fn position_of_instance(&self, instance_id: Uuid) -> Option<usize> {
        (0..self.len()).find(|&pos| {
            self.entries[self.physical_index(pos)].instance_id == instance_id
        })
    }

    /// Insert tracks according to `mode`
    ///
    /// Enqueueing into an empty queue always behaves like `Now` regardless of
    /// the requested mode (`Index` keeps its start position). The `*Shuffle`
    /// modes randomize the incoming block itself, independent of whether
    /// queue-level shuffle is active.
    ///
    /// `anchor` selects the starting entry for `Now` by instance id.
    pub fn enqueue(
        &self,
        mut tracks: Vec<QueuedTrack>,
        mode: EnqueueMode,
        anchor: Option<Uuid>,
        rng: &mut (impl Rng + ?Sized),
    ) -> Queue {
        if tracks.is_empty() {
            return self.clone();
        }

        let mode = match mode {
            EnqueueMode::Shuffle => {
                tracks.shuffle(rng);
                EnqueueMode::Now
            }
            EnqueueMode::NextShuffle => {
                tracks.shuffle(rng);
                EnqueueMode::Next
            }
            EnqueueMode::LastShuffle => {
                tracks.shuffle(rng);
                EnqueueMode::Last
            }
            other => other,
        };

        let mode = if self.is_empty() {
            match mode {
                EnqueueMode::Index(start) => EnqueueMode::Index(start),
                _ => EnqueueMode::Now,
            }
        } else {
            mode
        };

        match mode {
            EnqueueMode::Now => {
                let start = anchor
                    .and_then(|id| tracks.iter().position(|t| t.instance_id == id))
                    .unwrap_or(0);
                self.replace_with(tracks, start, rng)
            }
            EnqueueMode::Index(start) => {
                let start = start.min(tracks.len() - 1);
                self.replace_with(tracks, start, rng)
            }
            EnqueueMode::Next => self.splice_after_cursor(tracks),
            EnqueueMode::Last => self.append(tracks),
            // shuffle variants were rewritten above
            EnqueueMode::Shuffle | EnqueueMode::NextShuffle | EnqueueMode::LastShuffle => {
                unreachable!()
            }
        }
    }

    /// Remove all entries whose instance id is in `ids`
    ///
    /// If the current entry is removed, the cursor holds its play-order
    /// position (the next track slides into it), wrapping to 0 under repeat
    /// All or clamping to the new end otherwise. Removing the last remaining
    /// entry yields the empty queue with an undefined cursor; the store turns
    /// that into a distinct queue-cleared notice.
    pub fn remove_by_instance_ids(&self, ids: &[Uuid]) -> Queue {
        let remove: HashSet<Uuid> = ids.iter().copied().collect();
        if remove.is_empty() {
            return self.clone();
        }

        let old_len = self.len();
        let mut new_physical = vec![usize::MAX; old_len];
        let mut entries = Vec::with_capacity(old_len);
        for (i, entry) in self.entries.iter().enumerate() {
            if !remove.contains(&entry.instance_id) {
                new_physical[i] = entries.len();
                entries.push(entry.clone());
            }
        }

        let order = self.order.as_ref().map(|order| {
            order
                .iter()
                .filter(|&&phys| new_physical[phys] != usize::MAX)
                .map(|&phys| new_physical[phys])
                .collect::<Vec<_>>()
        });

        let new_len = entries.len();
        let cursor = match self.cursor {
            None => None,
            Some(_) if new_len == 0 => None,
            Some(c) => {
                let surviving_before = (0..c)
                    .filter(|&pos| {
                        let phys = self.physical_index(pos);
                        !remove.contains(&self.entries[phys].instance_id)
                    })
                    .count();

                let current_removed = self
                    .current()
                    .map(|t| remove.contains(&t.instance_id))
                    .unwrap_or(false);

                if !current_removed {
                    Some(surviving_before)
                } else if surviving_before < new_len {
                    Some(surviving_before)
                } else if self.repeat == RepeatMode::All {
                    Some(0)
                } else {
                    Some(new_len - 1)
                }
            }
        };

        Queue {
            entries,
            order,
            cursor,
            repeat: self.repeat,
        }
    }

    /// Reorder a contiguous block of `count` play-order positions starting at
    /// `from` so it begins at `to` (interpreted after the block is lifted out)
    ///
    /// The cursor follows the current entry wherever it lands, including when
    /// it is inside the moved block.
    pub fn move_range(&self, from: usize, to: usize, count: usize) -> Queue {
        let len = self.len();
        if len == 0 || count == 0 || from >= len {
            return self.clone();
        }
        let count = count.min(len - from);
        let current_id = self.current().map(|t| t.instance_id);

        let mut visible: Vec<usize> = match &self.order {
            Some(order) => order.clone(),
            None => (0..len).collect(),
        };
        let block: Vec<usize> = visible.drain(from..from + count).collect();
        let insert_at = to.min(visible.len());
        for (i, phys) in block.into_iter().enumerate() {
            visible.insert(insert_at + i, phys);
        }

        let mut next = self.clone();
        if self.is_shuffled() {
            // physical order untouched; only the permutation changes
            next.order = Some(visible);
        } else {
            next.entries = visible
                .iter()
                .map(|&phys| self.entries[phys].clone())
                .collect();
        }
        if let Some(id) = current_id {
            next.cursor = next.position_of_instance(id);
        }
        next
    }

    /// Enable or disable shuffle
    ///
    /// Enabling pins the current entry to permutation position 0 and
    /// randomizes the remainder, so the audible track never changes.
    /// Disabling reverts to physical order (which shuffle never altered)
    /// with the cursor following the current entry.
    pub fn toggle_shuffle(&self, on: bool, rng: &mut (impl Rng + ?Sized)) -> Queue {
        match (on, self.is_shuffled()) {
            (true, false) => {
                let mut next = self.clone();
                match self.cursor {
                    Some(c) => {
                        let anchor_phys = self.physical_index(c);
                        next.order = Some(anchored_permutation(self.len(), anchor_phys, rng));
                        next.cursor = Some(0);
                    }
                    None => next.order = Some(Vec::new()),
                }
                next
            }
            (false, true) => {
                let mut next = self.clone();
                next.cursor = self.cursor.map(|c| self.physical_index(c));
                next.order = None;
                next
            }
            _ => self.clone(),
        }
    }

    /// Change repeat mode (no reordering)
    pub fn set_repeat(&self, mode: RepeatMode) -> Queue {
        let mut next = self.clone();
        next.repeat = mode;
        next
    }

    /// Move the cursor to play-order position `pos` (clamped to bounds)
    pub fn advance_to(&self, pos: usize) -> Queue {
        let mut next = self.clone();
        if !next.is_empty() {
            next.cursor = Some(pos.min(next.len() - 1));
        }
        next
    }

    /// Remove every entry, preserving repeat mode and the shuffle flag
    pub fn clear(&self) -> Queue {
        Queue {
            entries: Vec::new(),
            order: self.order.as_ref().map(|_| Vec::new()),
            cursor: None,
            repeat: self.repeat,
        }
    }

    /// Play-order position that follows the cursor
    ///
    /// `manual` distinguishes a user-initiated skip from a natural track
    /// boundary: repeat One repeats only at natural boundaries; a manual
    /// skip always moves on. Returns `None` when playback should stop
    /// (queue exhausted without repeat All).
    pub fn next_position(&self, manual: bool) -> Option<usize> {
        let c = self.cursor?;
        if self.repeat == RepeatMode::One && !manual {
            return Some(c);
        }
        if c + 1 < self.len() {
            Some(c + 1)
        } else if self.repeat == RepeatMode::All {
            Some(0)
        } else {
            None
        }
    }

    /// Play-order position preceding the cursor
    ///
    /// Wraps to the end under repeat All; otherwise `None` at the start
    /// (callers typically restart the current track instead).
    pub fn previous_position(&self) -> Option<usize> {
        let c = self.cursor?;
        if c > 0 {
            Some(c - 1)
        } else if self.repeat == RepeatMode::All && self.len() > 1 {
            Some(self.len() - 1)
        } else {
            None
        }
    }

    /// Serializable snapshot for the persistence layer
    ///
    /// The stored cursor is the *physical* index of the current entry; the
    /// shuffle permutation itself is not persisted and is rebuilt on restore.
    pub fn to_session(&self, volume: u8) -> PersistedSession {
        PersistedSession {
            tracks: self.entries.clone(),
            cursor: self.cursor.map(|c| self.physical_index(c)),
            repeat: self.repeat,
            shuffled: self.is_shuffled(),
            volume,
        }
    }

    /// Rebuild a queue from a persisted snapshot
    ///
    /// A persisted shuffle flag produces a fresh permutation anchored on the
    /// restored current entry.
    pub fn from_session(session: &PersistedSession, rng: &mut (impl Rng + ?Sized)) -> Queue {
        let len = session.tracks.len();
        let cursor = session
            .cursor
            .filter(|&c| c < len)
            .or(if len > 0 { Some(0) } else { None });

        let mut queue = Queue {
            entries: session.tracks.clone(),
            order: None,
            cursor,
            repeat: session.repeat,
        };

        if session.shuffled {
            match cursor {
                Some(phys) => {
                    queue.order = Some(anchored_permutation(len, phys, rng));
                    queue.cursor = Some(0);
                }
                None => queue.order = Some(Vec::new()),
            }
        }
        queue
    }

    // ========== Internal helpers ==========

    /// Replace the queue contents, starting at physical position `start`
    fn replace_with(
        &self,
        tracks: Vec<QueuedTrack>,
        start: usize,
        rng: &mut (impl Rng + ?Sized),
    ) -> Queue {
        let mut next = Queue {
            entries: tracks,
            order: None,
            cursor: Some(start),
            repeat: self.repeat,
        };
        if self.is_shuffled() {
            next.order = Some(anchored_permutation(next.entries.len(), start, rng));
            next.cursor = Some(0);
        }
        next
    }

    /// Insert tracks immediately after the current play-order position
    fn splice_after_cursor(&self, tracks: Vec<QueuedTrack>) -> Queue {
        let cursor = self
            .cursor
            .expect("non-empty queue always has a cursor");
        let mut next = self.clone();
        match &mut next.order {
            None => {
                next.entries.splice(cursor + 1..cursor + 1, tracks);
            }
            Some(order) => {
                // physical placement is an append; play-order placement is
                // right after the cursor
                let base = next.entries.len();
                let added = tracks.len();
                order.splice(cursor + 1..cursor + 1, base..base + added);
                next.entries.extend(tracks);
            }
        }
        next
    }

    /// Append tracks to the end of the play order
    fn append(&self, tracks: Vec<QueuedTrack>) -> Queue {
        let mut next = self.clone();
        let base = next.entries.len();
        let added = tracks.len();
        next.entries.extend(tracks);
        if let Some(order) = &mut next.order {
            order.extend(base..base + added);
        }
        next
    }
}

/// Permutation of `0..len` with `anchor_physical` first and the rest
/// Fisher-Yates shuffled
fn anchored_permutation(
    len: usize,
    anchor_physical: usize,
    rng: &mut (impl Rng + ?Sized),
) -> Vec<usize> {
    let mut rest: Vec<usize> = (0..len).filter(|&i| i != anchor_physical).collect();
    rest.shuffle(rng);
    let mut order = Vec::with_capacity(len);
    order.push(anchor_physical);
    order.extend(rest);
    order
}
