// tests/session_lifecycle.rs
use std::sync::Arc;
use std::time::Duration;

use hn_delta_relay::feed::FixtureFeed;
use hn_delta_relay::scheduler::{DeltaScheduler, SchedulerCfg};
use hn_delta_relay::session::{SessionManager, SinkCfg};
use hn_delta_relay::stream::EventKind;
use hn_delta_relay::SeenSet;

fn manager(feed: Arc<FixtureFeed>, seen: Arc<SeenSet>) -> Arc<SessionManager> {
    let scheduler = DeltaScheduler::new(feed, seen, SchedulerCfg::default());
    SessionManager::new(scheduler, SinkCfg::default())
}

#[tokio::test]
async fn session_streams_connected_then_initial_batch() {
    let feed = Arc::new(FixtureFeed::with_stories(&[1, 2, 3]));
    let seen = Arc::new(SeenSet::new());
    let mgr = manager(feed, seen.clone());

    let mut s = mgr.open();
    let first = s.events.recv().await.unwrap();
    assert_eq!(first.kind, EventKind::Connected);
    assert!(first.data.starts_with("Connected to HN stream at "));

    for expected in [1, 2, 3] {
        let ev = s.events.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::NewStory);
        assert_eq!(ev.id, Some(expected));
    }
    assert_eq!(mgr.active_sessions(), 1);
    assert_eq!(seen.len(), 3);

    s.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), s.task)
        .await
        .expect("session task should end after cancel")
        .unwrap();
    assert_eq!(mgr.active_sessions(), 0);
}

#[tokio::test]
async fn dropping_the_client_stream_ends_the_session() {
    let feed = Arc::new(FixtureFeed::with_stories(&[1]));
    let mgr = manager(feed.clone(), Arc::new(SeenSet::new()));

    let mut s = mgr.open();
    assert_eq!(s.events.recv().await.unwrap().kind, EventKind::Connected);
    assert_eq!(s.events.recv().await.unwrap().kind, EventKind::NewStory);

    drop(s.events);
    tokio::time::timeout(Duration::from_secs(5), s.task)
        .await
        .expect("disconnect should cancel the session")
        .unwrap();

    assert!(s.cancel.is_cancelled());
    assert_eq!(mgr.active_sessions(), 0);
    assert_eq!(feed.list_calls(), 1, "no feed calls after disconnect");
}

#[tokio::test]
async fn shutdown_cancels_every_session() {
    let feed = Arc::new(FixtureFeed::with_stories(&[1, 2]));
    let mgr = manager(feed, Arc::new(SeenSet::new()));

    let a = mgr.open();
    let b = mgr.open();
    assert_ne!(a.id, b.id);

    mgr.shutdown();
    for s in [a, b] {
        tokio::time::timeout(Duration::from_secs(5), s.task)
            .await
            .expect("shutdown should end the session")
            .unwrap();
        assert!(s.cancel.is_cancelled());
    }
    assert_eq!(mgr.active_sessions(), 0);

    // sessions opened after shutdown start cancelled
    let late = mgr.open();
    assert!(late.cancel.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn initial_failure_falls_through_to_periodic_phase() {
    let feed = Arc::new(FixtureFeed::with_stories(&[1, 2, 3]));
    feed.fail_next_lists(1);
    let mgr = manager(feed, Arc::new(SeenSet::new()));

    let mut s = mgr.open();
    assert_eq!(s.events.recv().await.unwrap().kind, EventKind::Connected);
    assert_eq!(s.events.recv().await.unwrap().kind, EventKind::Error);

    // first tick: nothing was seeded, so the whole (short) list is new
    let mut ids = Vec::new();
    for _ in 0..3 {
        let ev = s.events.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::NewStory);
        ids.extend(ev.id);
    }
    assert_eq!(ids, vec![1, 2, 3]);

    s.cancel.cancel();
    s.task.await.unwrap();
}

#[tokio::test]
async fn second_client_still_gets_a_snapshot() {
    let feed = Arc::new(FixtureFeed::with_stories(&[7, 8]));
    let seen = Arc::new(SeenSet::new());
    let mgr = manager(feed, seen.clone());

    let mut first = mgr.open();
    let mut second = mgr.open();

    for s in [&mut first, &mut second] {
        assert_eq!(s.events.recv().await.unwrap().kind, EventKind::Connected);
        assert_eq!(s.events.recv().await.unwrap().id, Some(7));
        assert_eq!(s.events.recv().await.unwrap().id, Some(8));
    }
    assert_eq!(seen.len(), 2);
    assert_eq!(mgr.active_sessions(), 2);

    mgr.shutdown();
}
