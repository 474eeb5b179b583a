//! Discrete notice bus
//!
//! Carries occurrences that are events rather than state: media-key commands,
//! queue restoration, queue clearing, and surfaced playback errors. State
//! observation goes through the player store's slice subscriptions instead;
//! nothing on this bus can be queried later.
//!
//! Built on `tokio::sync::broadcast` for one-to-many fan-out: every consumer
//! (rendering layer, remote presence, notifications) gets its own receiver.

use crate::types::Track;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Media-key transport command forwarded from the OS integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKeyCommand {
    Next,
    Previous,
}

/// Discrete player occurrences
///
/// Serializable so outer layers can forward notices verbatim (e.g. to a
/// developer console or an IPC surface).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerNotice {
    /// A media key was pressed (fire-and-forget, no retained value)
    MediaKey {
        command: MediaKeyCommand,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue was seeded from persisted storage (playback stays paused)
    QueueRestored {
        /// Number of entries restored
        entries: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue became empty through removal or clearing
    ///
    /// Distinct from the current-track slice becoming None, so consumers can
    /// tell "stopped/cleared" from "track changed".
    QueueCleared {
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track failed to load or play; the cursor was not advanced
    PlaybackError {
        /// The track that failed
        track: Track,
        /// Human-readable failure description
        message: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A preload missed the track boundary; playback fell back to an abrupt swap
    PreloadMissed {
        /// The track that was still loading at the boundary
        track: Track,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

/// Broadcast bus for [`PlayerNotice`]
///
/// Cheap to clone; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<PlayerNotice>,
    capacity: usize,
}

impl NoticeBus {
    /// Create a bus buffering up to `capacity` notices per lagging receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future notices
    ///
    /// Notices emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerNotice> {
        self.tx.subscribe()
    }

    /// Emit a notice to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` otherwise.
    pub fn emit(
        &self,
        notice: PlayerNotice,
    ) -> Result<usize, broadcast::error::SendError<PlayerNotice>> {
        self.tx.send(notice)
    }

    /// Emit a notice, ignoring the no-subscribers case
    pub fn emit_lossy(&self, notice: PlayerNotice) {
        if let Err(e) = self.tx.send(notice) {
            tracing::trace!("notice dropped, no subscribers: {:?}", e.0);
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
