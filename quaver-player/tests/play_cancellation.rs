//! A slow play request must never clobber a newer one

mod common;

use common::{player_with, MockApi};
use quaver_player::resolver::FetchParams;
use quaver_player::{EnqueueMode, PlaySource};
use std::sync::Arc;

fn queue_names(player: &quaver_player::Player) -> Vec<String> {
    player
        .store()
        .queue()
        .iter_play_order()
        .map(|t| t.track.name.clone())
        .collect()
}

#[tokio::test]
async fn test_stale_request_is_dropped() {
    let api = Arc::new(
        MockApi::new()
            .with_album("al", &["a", "b"])
            .with_search_results(&["stale1", "stale2"]),
    );
    let (player, _) = player_with(api.clone());
    let params = FetchParams::default();

    // request 1 blocks inside resolution
    let slow_player = player.clone();
    let slow = tokio::spawn(async move {
        slow_player
            .play(
                &PlaySource::Search("anything".into()),
                EnqueueMode::Now,
                &FetchParams::default(),
            )
            .await
    });
    tokio::task::yield_now().await;

    // request 2 arrives and completes while 1 is still resolving
    player
        .play(&PlaySource::Albums(vec!["al".into()]), EnqueueMode::Now, &params)
        .await
        .unwrap();
    assert_eq!(queue_names(&player), ["a", "b"]);

    // request 1 finally resolves; its result must be discarded
    api.release_search();
    slow.await.unwrap().unwrap();
    assert_eq!(queue_names(&player), ["a", "b"]);
    assert_eq!(
        player.store().current_track().unwrap().track.name,
        "a"
    );
}

#[tokio::test]
async fn test_latest_request_wins_even_when_slowest() {
    let api = Arc::new(
        MockApi::new()
            .with_album("al", &["old"])
            .with_search_results(&["newest"]),
    );
    let (player, _) = player_with(api.clone());
    let params = FetchParams::default();

    player
        .play(&PlaySource::Albums(vec!["al".into()]), EnqueueMode::Now, &params)
        .await
        .unwrap();

    // the newest request is the slow one; it must still apply
    let slow_player = player.clone();
    let slow = tokio::spawn(async move {
        slow_player
            .play(
                &PlaySource::Search("anything".into()),
                EnqueueMode::Now,
                &FetchParams::default(),
            )
            .await
    });
    tokio::task::yield_now().await;
    api.release_search();
    slow.await.unwrap().unwrap();

    assert_eq!(queue_names(&player), ["newest"]);
}

#[tokio::test]
async fn test_clear_cancels_inflight_request() {
    let api = Arc::new(MockApi::new().with_search_results(&["late"]));
    let (player, _) = player_with(api.clone());

    let slow_player = player.clone();
    let slow = tokio::spawn(async move {
        slow_player
            .play(
                &PlaySource::Search("anything".into()),
                EnqueueMode::Now,
                &FetchParams::default(),
            )
            .await
    });
    tokio::task::yield_now().await;

    player.clear_queue().await.unwrap();
    api.release_search();
    slow.await.unwrap().unwrap();

    // the cleared queue stays cleared
    assert!(player.store().queue().is_empty());
}
