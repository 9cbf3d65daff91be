//! End-to-end flow against the in-process backend: search, recents that
//! survive a restart, and a notification feed kept live by realtime inserts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use critter_client::backend::LocalBackend;
use critter_client::clock::ManualClock;
use critter_client::kv::SqliteStore;
use critter_client::notifications::FeedPhase;
use critter_client::{NotificationFeed, RecentSearchCache, SearchSession};
use critter_db::Database;
use critter_types::{NotificationTarget, UserSnapshot};

async fn seed_users(backend: &LocalBackend) {
    for (id, name) in [("me", "Maya"), ("u1", "Mochi"), ("u2", "Moose"), ("u3", "Biscuit")] {
        backend
            .upsert_user(&UserSnapshot::new(id).with_name(name))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn recent_searches_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("critter.db");

    {
        let db = Arc::new(Database::open(&path).unwrap());
        let backend = LocalBackend::new(db.clone());
        seed_users(&backend).await;

        let clock = Arc::new(ManualClock::new(1_000));
        let recents = Arc::new(RecentSearchCache::with_clock(
            Arc::new(SqliteStore::new(db)),
            clock.clone(),
        ));
        let session = SearchSession::new(Arc::new(backend), recents, Some("me".into()));

        let hits = session.search("mo").await.unwrap();
        let names: Vec<_> = hits.iter().filter_map(|u| u.name.as_deref()).collect();
        assert_eq!(names, ["Mochi", "Moose"]);

        for user in hits {
            clock.advance(10);
            session.select(user).await;
        }
        let me = session.search("maya").await.unwrap().remove(0);
        assert!(!session.select(me).await);
    }

    let db = Arc::new(Database::open(&path).unwrap());
    let recents = RecentSearchCache::new(Arc::new(SqliteStore::new(db)));
    let ids: Vec<_> = recents.load().await.into_iter().map(|e| e.user.id).collect();
    assert_eq!(ids, ["u2", "u1"]);

    recents.remove("u2").await;
    assert!(!recents.contains("u2").await);
    recents.clear_all().await;
    assert!(recents.load().await.is_empty());
}

#[tokio::test]
async fn feed_tracks_backend_inserts_and_deletes() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let backend = Arc::new(LocalBackend::new(db));
    seed_users(&backend).await;

    let old = backend
        .notify("me", Some("u1"), "Mochi followed you", &json!({"userId": "u1"}))
        .await
        .unwrap();

    let mut feed = NotificationFeed::new(backend.clone());
    feed.set_user(Some("me".into())).await;
    assert_eq!(feed.phase(), FeedPhase::Ready);
    assert_eq!(feed.items(), vec![old.clone()]);
    assert_eq!(backend.dispatcher().channel_count().await, 1);

    let mut changes = feed.changes();
    let fresh = backend
        .notify(
            "me",
            Some("u3"),
            "Biscuit tagged your pet",
            &json!({"postId": "p7", "commentId": "c1"}),
        )
        .await
        .unwrap();
    // Someone else's notification must not show up
    backend
        .notify("u2", Some("u1"), "not for me", &json!({"userId": "u1"}))
        .await
        .unwrap();

    tokio::time::timeout(Duration::from_secs(2), changes.changed())
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let items = feed.items();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, fresh.id);
    assert_eq!(items[0].sender.as_ref().unwrap().name, "Biscuit");
    assert_eq!(
        items[0].target(),
        Some(NotificationTarget::Post {
            post_id: "p7".into(),
            comment_id: Some("c1".into())
        })
    );

    assert!(feed.delete(&old.id).await);
    assert_eq!(feed.items().len(), 1);

    feed.close().await;
    assert_eq!(backend.dispatcher().channel_count().await, 0);

    backend
        .notify("me", None, "after close", &json!({}))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feed.items().len(), 1);
}
