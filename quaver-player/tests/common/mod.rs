//! Shared test fixtures: an in-memory metadata backend and recording slots
#![allow(dead_code)]

use async_trait::async_trait;
use quaver_common::types::Track;
use quaver_common::{Error, Result};
use quaver_player::resolver::{FetchParams, FolderListing, MetadataApi, TrackPage};
use quaver_player::{AudioSlot, PlaybackConfig, Player, SlotPair};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Opt-in log output for debugging a failing test (`RUST_LOG=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn track(name: &str) -> Track {
    Track {
        track_id: name.to_string(),
        server_id: "srv".to_string(),
        duration_ms: 180_000,
        stream_url: format!("stream://{name}"),
        name: name.to_string(),
        artists: vec!["tester".to_string()],
        album: None,
        image_url: None,
    }
}

pub fn tracks(names: &[&str]) -> Vec<Track> {
    names.iter().map(|n| track(n)).collect()
}

/// In-memory metadata backend
///
/// `search_tracks` blocks on the gate until `release_search` is called, so
/// tests can hold a play request mid-resolution.
pub struct MockApi {
    albums: HashMap<String, Vec<Track>>,
    search_results: Vec<Track>,
    search_gate: Semaphore,
}

impl MockApi {
    pub fn new() -> Self {
        Self {
            albums: HashMap::new(),
            search_results: Vec::new(),
            search_gate: Semaphore::new(0),
        }
    }

    pub fn with_album(mut self, id: &str, names: &[&str]) -> Self {
        self.albums.insert(id.to_string(), tracks(names));
        self
    }

    pub fn with_search_results(mut self, names: &[&str]) -> Self {
        self.search_results = tracks(names);
        self
    }

    /// Let one pending `search_tracks` call proceed
    pub fn release_search(&self) {
        self.search_gate.add_permits(1);
    }
}

#[async_trait]
impl MetadataApi for MockApi {
    async fn tracks_by_album(&self, id: &str, _params: &FetchParams) -> Result<TrackPage> {
        match self.albums.get(id) {
            Some(tracks) => Ok(TrackPage {
                tracks: tracks.clone(),
                total: tracks.len() as u64,
            }),
            None => Err(Error::Resolution(format!("album not found: {id}"))),
        }
    }

    async fn tracks_by_artist(&self, id: &str, params: &FetchParams) -> Result<TrackPage> {
        self.tracks_by_album(id, params).await
    }

    async fn tracks_by_genre(&self, id: &str, params: &FetchParams) -> Result<TrackPage> {
        self.tracks_by_album(id, params).await
    }

    async fn tracks_by_playlist(&self, id: &str, params: &FetchParams) -> Result<TrackPage> {
        self.tracks_by_album(id, params).await
    }

    async fn folder_children(&self, id: &str, _params: &FetchParams) -> Result<FolderListing> {
        Err(Error::Resolution(format!("folder not found: {id}")))
    }

    async fn search_tracks(&self, _query: &str, _params: &FetchParams) -> Result<TrackPage> {
        let permit = self
            .search_gate
            .acquire()
            .await
            .map_err(|e| Error::Resolution(e.to_string()))?;
        permit.forget();
        Ok(TrackPage {
            tracks: self.search_results.clone(),
            total: self.search_results.len() as u64,
        })
    }
}

/// Slot that records every command it receives as `"<index>:<command>"`
pub struct RecordingSlot {
    index: usize,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AudioSlot for RecordingSlot {
    async fn load(&mut self, track: &Track) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:load {}", self.index, track.name));
        Ok(())
    }

    async fn play(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(format!("{}:play", self.index));
        Ok(())
    }

    async fn pause(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(format!("{}:pause", self.index));
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.lock().unwrap().push(format!("{}:stop", self.index));
        Ok(())
    }

    async fn seek(&mut self, seconds: f64) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:seek {}", self.index, seconds));
        Ok(())
    }

    fn set_gain(&mut self, _gain: f32) {}

    fn set_speed(&mut self, _speed: f32) {}
}

pub fn recording_pair() -> (SlotPair, Arc<Mutex<Vec<String>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let pair = SlotPair::new(
        Box::new(RecordingSlot {
            index: 0,
            log: log.clone(),
        }),
        Box::new(RecordingSlot {
            index: 1,
            log: log.clone(),
        }),
    );
    (pair, log)
}

pub fn player_with(api: Arc<MockApi>) -> (Arc<Player>, Arc<Mutex<Vec<String>>>) {
    let (pair, log) = recording_pair();
    let player = Player::new(api, pair, PlaybackConfig::default());
    (Arc::new(player), log)
}
