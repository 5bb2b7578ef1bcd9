//! Integration tests for full queue builds
//!
//! Every test drives `QueueOrchestrator` against the in-memory catalog and
//! checks both the published snapshot and the engine mirror.

mod common;

use common::{assert_in_step, drain, ids, orchestrator, raw, test_config, FakeCatalog};
use soul_queue::{
    BuildKind, BuildOptions, BuildPhase, CatalogError, QueueConfig, QueueError, QueueEvent, TrackId,
};
use std::time::Duration;

// ===== Request validation =====

#[tokio::test]
async fn test_empty_playlist_rejected() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    let result = queue
        .play_target(TrackId(1), &[], BuildOptions::default())
        .await;

    assert!(matches!(result, Err(QueueError::EmptyPlaylist)));
    assert!(catalog.metadata_calls().is_empty());
    assert!(controller.calls().is_empty());
    assert!(queue.current_session().is_none());
}

#[tokio::test]
async fn test_target_outside_list_rejected_without_touching_queue() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    let list = ids(1..=10);
    queue
        .play_target(TrackId(3), &list, BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();
    let before = queue.snapshot().track_ids();
    let calls_before = controller.calls().len();

    let result = queue
        .play_target(TrackId(99), &list, BuildOptions::default())
        .await;

    assert!(matches!(result, Err(QueueError::TargetNotFound(TrackId(99)))));
    assert_eq!(queue.snapshot().track_ids(), before);
    assert_eq!(controller.calls().len(), calls_before);
}

// ===== Ordering =====

#[tokio::test]
async fn test_full_build_matches_input_order() {
    let catalog = FakeCatalog::shared();
    let config = QueueConfig {
        window_size: 10,
        window_chunk_size: 3,
        background_chunk_size: 7,
        concurrency: 3,
        ..test_config()
    };
    let (queue, controller) = orchestrator(&catalog, config.clone());

    let list = ids(1..=120);
    let mut handle = queue
        .play_target(TrackId(60), &list, BuildOptions::from(&config))
        .await
        .unwrap();

    assert_eq!(handle.kind(), BuildKind::Rebuild);
    assert_eq!(handle.playable().await.unwrap(), 0);
    handle.settled().await.unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.track_ids(), list);
    assert_eq!(snapshot.current().unwrap().track_id, TrackId(60));
    assert_eq!(snapshot.current_index, 59);
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_target_at_list_edges() {
    for target in [1, 40] {
        let catalog = FakeCatalog::shared();
        let (queue, controller) = orchestrator(&catalog, test_config());
        let list = ids(1..=40);

        queue
            .play_target(TrackId(target), &list, BuildOptions::default())
            .await
            .unwrap()
            .settled()
            .await
            .unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.track_ids(), list);
        assert_eq!(snapshot.current().unwrap().track_id, TrackId(target));
        assert_in_step(&queue, &controller);
    }
}

#[tokio::test]
async fn test_order_holds_when_chunks_finish_out_of_order() {
    let list = ids(1..=1000);
    for target in [1, 2, 334, 501, 999, 1000] {
        let catalog = FakeCatalog::shared();
        catalog.scramble_latency(target as u64, 8);
        let (queue, controller) = orchestrator(&catalog, test_config());

        queue
            .play_target(TrackId(target), &list, BuildOptions::default())
            .await
            .unwrap()
            .settled()
            .await
            .unwrap();

        let snapshot = queue.snapshot();
        assert_eq!(snapshot.track_ids(), list, "target {}", target);
        assert_eq!(snapshot.current().unwrap().track_id, TrackId(target));
        assert_in_step(&queue, &controller);
    }
}

#[tokio::test]
async fn test_duplicate_input_ids_keep_first_occurrence() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    let list: Vec<TrackId> = [1, 2, 3, 2, 4, 1, 5].into_iter().map(TrackId).collect();
    queue
        .play_target(TrackId(4), &list, BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    assert_eq!(raw(&queue.snapshot().track_ids()), vec![1, 2, 3, 4, 5]);
    assert_eq!(queue.snapshot().current_index, 3);
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_single_track_list() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    let mut rx = queue.subscribe();
    queue
        .play_target(TrackId(7), &[TrackId(7)], BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    assert_eq!(raw(&queue.snapshot().track_ids()), vec![7]);
    assert_in_step(&queue, &controller);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, QueueEvent::BuildCompleted { loaded: 1, .. })));
}

// ===== Immediate playability =====

#[tokio::test]
async fn test_target_playable_while_window_is_blocked() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());
    catalog.hold_batches(2);

    let list = ids(1..=1000);
    let mut handle = queue
        .play_target(TrackId(500), &list, BuildOptions::default())
        .await
        .unwrap();

    assert_eq!(handle.playable().await.unwrap(), 0);

    let snapshot = queue.snapshot();
    assert_eq!(raw(&snapshot.track_ids()), vec![500]);
    controller.with(|engine| {
        assert!(engine.playing);
        assert_eq!(engine.track_ids(), vec![TrackId(500)]);
    });

    catalog.release();
    handle.settled().await.unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.track_ids(), list);
    assert_eq!(snapshot.current().unwrap().track_id, TrackId(500));
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_phases_reported_in_order() {
    let catalog = FakeCatalog::shared();
    let (queue, _controller) = orchestrator(&catalog, test_config());
    let mut rx = queue.subscribe();

    let list = ids(1..=200);
    let handle = queue
        .play_target(TrackId(100), &list, BuildOptions::default())
        .await
        .unwrap();
    let session = handle.session();
    handle.settled().await.unwrap();

    let phases: Vec<BuildPhase> = drain(&mut rx)
        .into_iter()
        .filter_map(|e| match e {
            QueueEvent::PhaseCompleted { session: s, phase } if s == session => Some(phase),
            _ => None,
        })
        .collect();
    assert_eq!(
        phases,
        vec![BuildPhase::Target, BuildPhase::Window, BuildPhase::Backfill]
    );
}

// ===== Degraded entries =====

#[tokio::test]
async fn test_missing_tracks_become_placeholders_in_place() {
    let catalog = FakeCatalog::shared();
    catalog.mark_missing([7, 8, 33]);
    let (queue, controller) = orchestrator(&catalog, test_config());

    let list = ids(1..=40);
    queue
        .play_target(TrackId(20), &list, BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.track_ids(), list);
    for entry in snapshot.entries.iter() {
        let missing = [7, 8, 33].contains(&entry.track_id.0);
        assert_eq!(entry.is_placeholder(), missing, "track {}", entry.track_id);
    }
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_target_missing_from_catalog_still_plays() {
    let catalog = FakeCatalog::shared();
    catalog.mark_missing([5]);
    let (queue, _controller) = orchestrator(&catalog, test_config());

    let mut handle = queue
        .play_target(TrackId(5), &ids(1..=10), BuildOptions::default())
        .await
        .unwrap();

    assert_eq!(handle.playable().await.unwrap(), 0);
    handle.settled().await.unwrap();

    let snapshot = queue.snapshot();
    assert!(snapshot.current().unwrap().is_placeholder());
    assert_eq!(snapshot.len(), 10);
}

#[tokio::test]
async fn test_target_fetch_failure_is_reported() {
    let catalog = FakeCatalog::shared();
    catalog.fail_batches_with(5, CatalogError::Parse("bad json".to_string()), 1);
    let (queue, controller) = orchestrator(&catalog, test_config());
    let mut rx = queue.subscribe();

    let mut handle = queue
        .play_target(TrackId(5), &ids(1..=10), BuildOptions::default())
        .await
        .unwrap();

    let result = handle.playable().await;
    assert!(matches!(
        result,
        Err(QueueError::Catalog(CatalogError::Parse(_)))
    ));
    handle.settled().await.unwrap();

    assert!(queue.snapshot().is_empty());
    assert!(controller.with(|engine| !engine.playing));

    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, QueueEvent::Error { .. })));
    assert!(events.iter().any(|e| matches!(
        e,
        QueueEvent::BuildAbandoned {
            phase: BuildPhase::Target,
            ..
        }
    )));
}

#[tokio::test]
async fn test_transient_chunk_failure_is_retried() {
    let catalog = FakeCatalog::shared();
    catalog.fail_batches_with(10, CatalogError::Network("reset".to_string()), 1);
    let (queue, _controller) = orchestrator(&catalog, test_config());

    queue
        .play_target(TrackId(1), &ids(1..=30), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.len(), 30);
    assert!(snapshot.entries.iter().all(|e| !e.is_placeholder()));
    assert_eq!(catalog.calls_containing(10), 2);
}

#[tokio::test]
async fn test_chunk_failing_after_retries_keeps_slots() {
    let catalog = FakeCatalog::shared();
    catalog.fail_batches_with(10, CatalogError::Timeout, 2);
    let (queue, controller) = orchestrator(&catalog, test_config());

    // Window of 50 covers 2..=26 after the target in one chunk
    queue
        .play_target(TrackId(1), &ids(1..=30), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.track_ids(), ids(1..=30));
    for entry in snapshot.entries.iter() {
        let in_failed_chunk = (2..=26).contains(&entry.track_id.0);
        assert_eq!(entry.is_placeholder(), in_failed_chunk, "track {}", entry.track_id);
    }
    assert_in_step(&queue, &controller);
}

// ===== Concurrency =====

#[tokio::test(start_paused = true)]
async fn test_in_flight_calls_bounded_by_concurrency() {
    let catalog = FakeCatalog::shared();
    catalog.set_delay(Duration::from_millis(50));
    let config = QueueConfig {
        window_size: 20,
        window_chunk_size: 2,
        background_chunk_size: 5,
        concurrency: 2,
        ..test_config()
    };
    let (queue, controller) = orchestrator(&catalog, config.clone());

    let list = ids(1..=100);
    queue
        .play_target(TrackId(50), &list, BuildOptions::from(&config))
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    assert!(catalog.max_in_flight() <= 2, "max {}", catalog.max_in_flight());
    assert!(catalog.max_in_flight() >= 1);
    assert_eq!(queue.snapshot().track_ids(), list);
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_each_track_fetched_once() {
    let catalog = FakeCatalog::shared();
    let (queue, _controller) = orchestrator(&catalog, test_config());

    queue
        .play_target(TrackId(250), &ids(1..=500), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    for id in 1..=500 {
        assert_eq!(catalog.calls_containing(id), 1, "track {}", id);
    }
    assert_eq!(queue.prepared_count(), 500);
}

// ===== User edits =====

#[tokio::test]
async fn test_remove_adjusts_current_index() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    queue
        .play_target(TrackId(5), &ids(1..=10), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();
    assert_eq!(queue.snapshot().current_index, 4);

    // Before the current entry: index follows the entry
    queue.remove_track(TrackId(2)).await.unwrap();
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.current_index, 3);
    assert_eq!(snapshot.current().unwrap().track_id, TrackId(5));
    assert_in_step(&queue, &controller);

    // The current entry itself: index now refers to the next track
    queue.remove_track(TrackId(5)).await.unwrap();
    let snapshot = queue.snapshot();
    assert_eq!(snapshot.current_index, 3);
    assert_eq!(snapshot.current().unwrap().track_id, TrackId(6));
    assert_in_step(&queue, &controller);

    let err = queue.remove_track(TrackId(5)).await.unwrap_err();
    assert!(matches!(err, QueueError::TrackNotQueued(TrackId(5))));
}

#[tokio::test]
async fn test_removed_track_not_brought_back_by_backfill() {
    let catalog = FakeCatalog::shared();
    let config = QueueConfig {
        window_size: 4,
        ..test_config()
    };
    let (queue, controller) = orchestrator(&catalog, config.clone());
    catalog.hold_batches(2);

    let list = ids(1..=200);
    let mut first = queue
        .play_target(TrackId(100), &list, BuildOptions::from(&config))
        .await
        .unwrap();
    first.playable().await.unwrap();

    // Jump ahead while the window is still loading
    let jump = queue
        .play_target(TrackId(150), &list, BuildOptions::from(&config))
        .await
        .unwrap();
    assert_eq!(jump.kind(), BuildKind::SameList);
    jump.settled().await.unwrap();
    assert_eq!(raw(&queue.snapshot().track_ids()), vec![100, 150]);

    queue.remove_track(TrackId(150)).await.unwrap();

    catalog.release();
    first.settled().await.unwrap();

    let expected: Vec<TrackId> = list.iter().copied().filter(|id| id.0 != 150).collect();
    assert_eq!(queue.snapshot().track_ids(), expected);
    assert_in_step(&queue, &controller);
}

#[tokio::test]
async fn test_play_index_pause_and_resume() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    queue
        .play_target(TrackId(1), &ids(1..=5), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();

    queue.play_index(3).await.unwrap();
    assert_eq!(queue.snapshot().current_index, 3);
    assert_eq!(controller.current(), 3);

    queue.pause().await;
    assert!(controller.with(|engine| !engine.playing));
    queue.resume().await.unwrap();
    assert!(controller.with(|engine| engine.playing));

    let err = queue.play_index(5).await.unwrap_err();
    assert!(matches!(err, QueueError::IndexOutOfBounds(5)));
}

#[tokio::test]
async fn test_clear_empties_queue_and_engine() {
    let catalog = FakeCatalog::shared();
    let (queue, controller) = orchestrator(&catalog, test_config());

    queue
        .play_target(TrackId(1), &ids(1..=5), BuildOptions::default())
        .await
        .unwrap()
        .settled()
        .await
        .unwrap();
    let session = queue.current_session().unwrap();

    queue.clear().await;

    assert!(queue.snapshot().is_empty());
    assert!(controller.track_ids().is_empty());
    assert_eq!(queue.prepared_count(), 0);
    assert_ne!(queue.current_session(), Some(session));
    assert!(matches!(
        queue.resume().await,
        Err(QueueError::EmptyPlaylist)
    ));
}
