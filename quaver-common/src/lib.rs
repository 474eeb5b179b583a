//! # Quaver Common
//!
//! Shared leaf crate for the Quaver playback core: error taxonomy, track and
//! session data types, and the discrete notice bus used for occurrences that
//! are events rather than observable state.

pub mod error;
pub mod events;
pub mod types;

pub use error::{Error, Result};
pub use events::{MediaKeyCommand, NoticeBus, PlayerNotice};
pub use types::{PersistedSession, PlaybackStatus, QueuedTrack, RepeatMode, Track};
