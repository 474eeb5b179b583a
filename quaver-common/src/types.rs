//! Core data types shared across the Quaver playback core
//!
//! Track records are immutable snapshots of remote library items. A track
//! gains a locally generated instance id when it enters a queue, so the same
//! underlying track can appear multiple times and still be addressed
//! unambiguously.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable snapshot of one playable item from a remote library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Source identifier on the owning server
    pub track_id: String,

    /// Identifier of the server/source this track came from
    pub server_id: String,

    /// Total duration in milliseconds
    pub duration_ms: u64,

    /// Stream locator handed to a playback slot
    pub stream_url: String,

    /// Display name
    pub name: String,

    /// Artist display names (may be empty for untagged items)
    pub artists: Vec<String>,

    /// Album display name, if the track belongs to one
    pub album: Option<String>,

    /// Cover image reference, if any
    pub image_url: Option<String>,
}

impl Track {
    /// Duration in whole seconds, for progress/remaining-time arithmetic
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}

/// A track as it sits in the play queue
///
/// `instance_id` is generated locally at enqueue time and is distinct from
/// `track.track_id`: two queue entries for the same track carry different
/// instance ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedTrack {
    /// Locally generated identifier for this queue occurrence
    pub instance_id: Uuid,

    /// The underlying track snapshot
    pub track: Track,
}

impl QueuedTrack {
    /// Wrap a track with a fresh instance id
    pub fn new(track: Track) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            track,
        }
    }
}

/// Queue repeat mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatMode {
    /// Stop when the queue is exhausted
    #[default]
    None,
    /// Wrap to the first entry after the last
    All,
    /// Repeat the current entry at each natural boundary
    One,
}

/// Playback status (Playing or Paused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Playing,
    Paused,
}

/// Serializable session snapshot for the external persistence layer
///
/// Written on shutdown and handed back via restore on startup. Restoring
/// never starts audio; status is forced to Paused until the user presses
/// play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSession {
    /// Queue entries in physical order
    pub tracks: Vec<QueuedTrack>,

    /// Physical index (into `tracks`) of the current entry (None when empty)
    pub cursor: Option<usize>,

    /// Repeat mode at shutdown
    pub repeat: RepeatMode,

    /// Whether shuffle was enabled at shutdown
    pub shuffled: bool,

    /// UI volume 0-100
    pub volume: u8,
}
