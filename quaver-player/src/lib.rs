//! Quaver playback core
//!
//! The queue, transition, and session machinery of a multi-backend music
//! client, with no rendering or audio I/O of its own:
//!
//! - [`queue`]: ordered play queue with shuffle permutation and repeat modes
//! - [`resolver`]: async expansion of play sources (albums, folders, search)
//!   into concrete track lists over a [`resolver::MetadataApi`] backend
//! - [`playback`]: the dual-slot gapless/crossfade transition engine behind
//!   the [`playback::AudioSlot`] host boundary
//! - [`curves`]: volume-to-gain mapping and crossfade curve evaluation
//! - [`state`]: the slice-subscription player state store
//! - [`player`]: the facade tying it all together
//!
//! Shared types, errors, and the discrete notice bus live in `quaver-common`.

pub mod config;
pub mod curves;
pub mod playback;
pub mod player;
pub mod queue;
pub mod resolver;
pub mod state;

pub use config::{PlaybackConfig, TransitionStyle};
pub use curves::CrossfadeCurve;
pub use playback::{AudioSlot, SlotEvent, SlotPair, TransitionEngine};
pub use player::Player;
pub use queue::{EnqueueMode, Queue};
pub use resolver::{FetchParams, MetadataApi, PlaySource, TrackResolver};
pub use state::{PlaybackPhase, PlayerState, PlayerStore, Slice};
