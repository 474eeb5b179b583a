//! Dual-slot playback: the audio slot boundary and the transition engine

pub mod engine;
pub mod slot;

pub use engine::TransitionEngine;
pub use slot::{AudioSlot, SlotEvent, SlotPair};
