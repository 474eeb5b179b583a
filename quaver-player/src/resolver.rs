//! Track resolver
//!
//! **Responsibilities:**
//! - Expand an abstract play source ("this album", "these genres", "this
//!   folder recursively") into a concrete ordered track list
//! - Recursive folder descent as an explicit depth-capped work stack
//! - Sequential multi-id resolution that aborts on the first error
//!
//! Resolution is all-or-nothing: a failure surfaces to the caller and the
//! queue is never mutated with a partial result. Folder traversal is
//! depth-first and strictly sequential so repeated calls against an
//! unchanged remote source produce the same ordering; parallelizing it
//! would make track order non-deterministic.
//!
//! The network transport lives behind [`MetadataApi`]; the resolver never
//! talks to a server directly.

use async_trait::async_trait;
use quaver_common::types::Track;
use quaver_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

/// Sort direction for fetch parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Caller-supplied ordering and paging window, passed through to the API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchParams {
    /// Server-side sort field name (backend-specific vocabulary)
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// Paging window start
    pub offset: Option<u32>,
    /// Paging window size
    pub limit: Option<u32>,
}

/// One page of tracks plus the server-reported total count
#[derive(Debug, Clone, Default)]
pub struct TrackPage {
    pub tracks: Vec<Track>,
    pub total: u64,
}

/// Direct children of one folder
#[derive(Debug, Clone, Default)]
pub struct FolderListing {
    /// Tracks directly inside the folder, in server order
    pub tracks: Vec<Track>,
    /// Sub-folder ids, in server order
    pub subfolders: Vec<String>,
}

/// Async metadata source boundary (one per configured server backend)
///
/// Implementations own transport, authentication, and response mapping; the
/// resolver treats them as opaque data sources. Every method is independently
/// retryable and side-effect-free on failure.
#[async_trait]
pub trait MetadataApi: Send + Sync {
    async fn tracks_by_album(&self, id: &str, params: &FetchParams) -> Result<TrackPage>;
    async fn tracks_by_artist(&self, id: &str, params: &FetchParams) -> Result<TrackPage>;
    async fn tracks_by_genre(&self, id: &str, params: &FetchParams) -> Result<TrackPage>;
    async fn tracks_by_playlist(&self, id: &str, params: &FetchParams) -> Result<TrackPage>;
    async fn folder_children(&self, id: &str, params: &FetchParams) -> Result<FolderListing>;
    async fn search_tracks(&self, query: &str, params: &FetchParams) -> Result<TrackPage>;
}

/// Abstract play request source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "ids", rename_all = "snake_case")]
pub enum PlaySource {
    Albums(Vec<String>),
    Artists(Vec<String>),
    Genres(Vec<String>),
    Playlists(Vec<String>),
    /// Root folders, each resolved recursively
    Folders(Vec<String>),
    /// Ad-hoc query string
    Search(String),
}

/// Fully resolved play request
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    /// Concrete ordered track list
    pub tracks: Vec<Track>,
    /// Sum of server-reported totals across resolved ids
    pub total: u64,
}

/// Expands play sources into ordered track lists
pub struct TrackResolver {
    api: Arc<dyn MetadataApi>,
    max_folder_depth: usize,
}

impl TrackResolver {
    pub fn new(api: Arc<dyn MetadataApi>, max_folder_depth: usize) -> Self {
        Self {
            api,
            max_folder_depth,
        }
    }

    /// Resolve a play source into a concrete ordered track list
    ///
    /// Multi-id sources resolve sequentially, concatenating results and
    /// summing totals; an error on one id aborts the rest and surfaces.
    pub async fn resolve(&self, source: &PlaySource, params: &FetchParams) -> Result<Resolved> {
        debug!("resolving play source: {:?}", source);
        match source {
            PlaySource::Albums(ids) => {
                self.resolve_pages(ids, params, |id, p| self.api.tracks_by_album(id, p))
                    .await
            }
            PlaySource::Artists(ids) => {
                self.resolve_pages(ids, params, |id, p| self.api.tracks_by_artist(id, p))
                    .await
            }
            PlaySource::Genres(ids) => {
                self.resolve_pages(ids, params, |id, p| self.api.tracks_by_genre(id, p))
                    .await
            }
            PlaySource::Playlists(ids) => {
                self.resolve_pages(ids, params, |id, p| self.api.tracks_by_playlist(id, p))
                    .await
            }
            PlaySource::Folders(ids) => {
                let mut resolved = Resolved::default();
                for id in ids {
                    let tracks = self.resolve_folder(id, params).await?;
                    resolved.total += tracks.len() as u64;
                    resolved.tracks.extend(tracks);
                }
                Ok(resolved)
            }
            PlaySource::Search(query) => {
                let page = self.api.search_tracks(query, params).await?;
                Ok(Resolved {
                    tracks: page.tracks,
                    total: page.total,
                })
            }
        }
    }

    /// Sequential per-id page fetch with abort-on-error aggregation
    async fn resolve_pages<'a, F, Fut>(
        &'a self,
        ids: &'a [String],
        params: &'a FetchParams,
        fetch: F,
    ) -> Result<Resolved>
    where
        F: Fn(&'a str, &'a FetchParams) -> Fut,
        Fut: std::future::Future<Output = Result<TrackPage>>,
    {
        let mut resolved = Resolved::default();
        for id in ids {
            let page = fetch(id, params).await?;
            resolved.total += page.total;
            resolved.tracks.extend(page.tracks);
        }
        Ok(resolved)
    }

    /// Depth-first recursive folder resolution
    ///
    /// Implemented as an explicit work stack rather than recursive calls:
    /// memory stays bounded and cancellation is dropping the stack. Each
    /// stack entry carries its depth; exceeding the cap fails the whole
    /// resolution instead of hanging on a pathological folder cycle.
    pub async fn resolve_folder(&self, root_id: &str, params: &FetchParams) -> Result<Vec<Track>> {
        let mut tracks = Vec::new();
        let mut stack: Vec<(String, usize)> = vec![(root_id.to_string(), 0)];
        let mut visited = 0usize;

        while let Some((folder_id, depth)) = stack.pop() {
            if depth >= self.max_folder_depth {
                return Err(Error::RecursionDepth(self.max_folder_depth));
            }

            let listing = self.api.folder_children(&folder_id, params).await?;
            visited += 1;
            trace!(
                "folder {} at depth {}: {} tracks, {} subfolders",
                folder_id,
                depth,
                listing.tracks.len(),
                listing.subfolders.len()
            );

            tracks.extend(listing.tracks);
            // push in reverse so the first subfolder is resolved next
            // (depth-first, stable order)
            for sub in listing.subfolders.into_iter().rev() {
                stack.push((sub, depth + 1));
            }
        }

        debug!(
            "folder {} resolved: {} tracks across {} folders",
            root_id,
            tracks.len(),
            visited
        );
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn track(name: &str) -> Track {
        Track {
            track_id: name.to_string(),
            server_id: "srv".to_string(),
            duration_ms: 60_000,
            stream_url: format!("stream://{name}"),
            name: name.to_string(),
            artists: vec![],
            album: None,
            image_url: None,
        }
    }

    /// Fixed in-memory library tree
    struct MockApi {
        albums: HashMap<String, Vec<Track>>,
        folders: HashMap<String, FolderListing>,
    }

    impl MockApi {
        fn new() -> Self {
            Self {
                albums: HashMap::new(),
                folders: HashMap::new(),
            }
        }

        fn with_album(mut self, id: &str, names: &[&str]) -> Self {
            self.albums
                .insert(id.to_string(), names.iter().map(|n| track(n)).collect());
            self
        }

        fn with_folder(mut self, id: &str, track_names: &[&str], subfolders: &[&str]) -> Self {
            self.folders.insert(
                id.to_string(),
                FolderListing {
                    tracks: track_names.iter().map(|n| track(n)).collect(),
                    subfolders: subfolders.iter().map(|s| s.to_string()).collect(),
                },
            );
            self
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
            match self.folders.get(id) {
                Some(listing) => Ok(listing.clone()),
                None => Err(Error::Resolution(format!("folder not found: {id}"))),
            }
        }

        async fn search_tracks(&self, _query: &str, _params: &FetchParams) -> Result<TrackPage> {
            Ok(TrackPage::default())
        }
    }

    fn resolver(api: MockApi) -> TrackResolver {
        TrackResolver::new(Arc::new(api), 8)
    }

    fn names(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_album_resolution() {
        let r = resolver(MockApi::new().with_album("al-1", &["a1", "a2"]));
        let resolved = r
            .resolve(&PlaySource::Albums(vec!["al-1".into()]), &FetchParams::default())
            .await
            .unwrap();
        assert_eq!(names(&resolved.tracks), ["a1", "a2"]);
        assert_eq!(resolved.total, 2);
    }

    #[tokio::test]
    async fn test_multi_id_concatenates_and_sums() {
        let r = resolver(
            MockApi::new()
                .with_album("g1", &["a", "b"])
                .with_album("g2", &["c"]),
        );
        let resolved = r
            .resolve(
                &PlaySource::Genres(vec!["g1".into(), "g2".into()]),
                &FetchParams::default(),
            )
            .await
            .unwrap();
        assert_eq!(names(&resolved.tracks), ["a", "b", "c"]);
        assert_eq!(resolved.total, 3);
    }

    #[tokio::test]
    async fn test_multi_id_aborts_on_first_error() {
        let r = resolver(MockApi::new().with_album("g1", &["a"]));
        let err = r
            .resolve(
                &PlaySource::Genres(vec!["g1".into(), "missing".into(), "g1".into()]),
                &FetchParams::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn test_folder_resolution_depth_first_order() {
        // root: [trackA, subfolder1], subfolder1: [trackB, trackC]
        let r = resolver(
            MockApi::new()
                .with_folder("root", &["trackA"], &["subfolder1"])
                .with_folder("subfolder1", &["trackB", "trackC"], &[]),
        );

        // deterministic across repeated calls
        for _ in 0..3 {
            let tracks = r.resolve_folder("root", &FetchParams::default()).await.unwrap();
            assert_eq!(names(&tracks), ["trackA", "trackB", "trackC"]);
        }
    }

    #[tokio::test]
    async fn test_folder_resolution_sibling_order() {
        let r = resolver(
            MockApi::new()
                .with_folder("root", &["r1"], &["s1", "s2"])
                .with_folder("s1", &["s1a"], &["s1x"])
                .with_folder("s1x", &["s1x1"], &[])
                .with_folder("s2", &["s2a"], &[]),
        );
        let tracks = r.resolve_folder("root", &FetchParams::default()).await.unwrap();
        // s1's whole subtree precedes s2
        assert_eq!(names(&tracks), ["r1", "s1a", "s1x1", "s2a"]);
    }

    #[tokio::test]
    async fn test_folder_cycle_hits_depth_cap() {
        let r = resolver(
            MockApi::new()
                .with_folder("a", &["ta"], &["b"])
                .with_folder("b", &["tb"], &["a"]),
        );
        let err = r
            .resolve_folder("a", &FetchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RecursionDepth(8)));
    }

    #[tokio::test]
    async fn test_folder_error_propagates() {
        let r = resolver(MockApi::new().with_folder("root", &["a"], &["gone"]));
        let err = r
            .resolve_folder("root", &FetchParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}
