//! Autosave sessions driving the reference stores.

use std::sync::Arc;
use std::time::Duration;

use sitebook_autosave::{AutosaveConfig, AutosaveEvent, NO_RESPONSE, spawn_session};
use sitebook_store::{MemoryItemStore, SqliteItemStore, StoredItem};
use sitebook_types::{ItemUpdate, RowId, SaveStatus, VersionToken};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fast_config() -> AutosaveConfig {
    AutosaveConfig::default()
        .with_debounce(Duration::from_millis(20))
        .with_batch_window(Duration::from_millis(10))
}

fn footing(quantity: f64) -> ItemUpdate {
    ItemUpdate::new("r1")
        .with_category("Concrete")
        .with_description("Strip footing")
        .with_quantity(quantity)
        .with_unit("m3")
        .with_unit_price(180.0)
}

// SQLite work runs on the blocking pool, so these use the real clock.

#[tokio::test]
async fn test_sqlite_session_persists_edits() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteItemStore::open(dir.path().join("estimate.db")).unwrap());
    let session = spawn_session(Arc::clone(&store), fast_config());

    session.queue_update(footing(4.0));
    session.queue_update(ItemUpdate::new("r2").with_description("Anchor bolts"));
    assert!(session.flush_pending_saves().await);

    assert_eq!(session.row_state("r1").await.unwrap().status, SaveStatus::Saved);
    let items = store.with_db(|db| db.list_items()).unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, RowId::from("r1"));
    assert_eq!(items[0].quantity, 4.0);

    // Debounced path, carrying the version from the first save
    session.queue_update(ItemUpdate::new("r1").with_markup_percent(12.0));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let r1 = store.with_db(|db| db.get_item(&RowId::from("r1"))).unwrap().unwrap();
    assert_eq!(r1.markup_percent, 12.0);
    assert_eq!(r1.quantity, 4.0);
    assert_eq!(session.pending_count().await.unwrap(), 0);
    session.shutdown();
}

#[tokio::test]
async fn test_sqlite_conflict_then_force_local() {
    init_tracing();
    let store = Arc::new(SqliteItemStore::in_memory().unwrap());
    let session = spawn_session(Arc::clone(&store), fast_config());

    session.queue_update(footing(4.0));
    assert!(session.flush_pending_saves().await);

    // Someone in the office edits the same row
    let revised = ItemUpdate::new("r1").with_description("Strip footing, revised");
    let theirs = store.with_db(|db| db.upsert_row(&revised)).unwrap();
    let their_version = theirs.updated_at.unwrap();

    session.queue_update(ItemUpdate::new("r1").with_quantity(6.0));
    assert!(session.flush_pending_saves().await);

    let state = session.row_state("r1").await.unwrap();
    assert_eq!(state.status, SaveStatus::Conflict);
    assert_eq!(state.server_updated_at, Some(their_version));
    let stored = store.with_db(|db| db.get_item(&RowId::from("r1"))).unwrap().unwrap();
    assert_eq!(stored.quantity, 4.0);

    session.force_local_version("r1", footing(6.0));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(session.flush_pending_saves().await);

    assert_eq!(session.row_state("r1").await.unwrap().status, SaveStatus::Saved);
    let stored = store.with_db(|db| db.get_item(&RowId::from("r1"))).unwrap().unwrap();
    assert_eq!(stored.quantity, 6.0);
    assert_eq!(stored.description, "Strip footing");
}

#[tokio::test]
async fn test_sqlite_accept_server_version() {
    init_tracing();
    let store = Arc::new(SqliteItemStore::in_memory().unwrap());
    let session = spawn_session(Arc::clone(&store), fast_config());
    let mut events = session.subscribe();

    session.queue_update(footing(4.0));
    assert!(session.flush_pending_saves().await);
    let theirs = store
        .with_db(|db| db.upsert_row(&ItemUpdate::new("r1").with_quantity(5.0)))
        .unwrap();
    let their_version = theirs.updated_at.unwrap();

    session.queue_update(ItemUpdate::new("r1").with_quantity(6.0));
    assert!(session.flush_pending_saves().await);
    session.accept_server_version("r1", their_version);
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut refetch = false;
    while let Ok(event) = events.try_recv() {
        if event == (AutosaveEvent::RefetchRequested { id: RowId::from("r1") }) {
            refetch = true;
        }
    }
    assert!(refetch);

    // Building on their version now succeeds
    session.queue_update(ItemUpdate::new("r1").with_unit_price(190.0));
    assert!(session.flush_pending_saves().await);
    let stored = store.with_db(|db| db.get_item(&RowId::from("r1"))).unwrap().unwrap();
    assert_eq!(stored.quantity, 5.0);
    assert_eq!(stored.unit_price, 190.0);
    assert_eq!(session.row_state("r1").await.unwrap().status, SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn test_memory_store_faults_through_session() {
    init_tracing();
    let store = Arc::new(MemoryItemStore::new());
    store.insert(StoredItem::new("r1", VersionToken::from_millis(1)));
    let session = spawn_session(Arc::clone(&store), AutosaveConfig::default());

    store.fail_next_call("database is locked");
    session.queue_update(ItemUpdate::new("r1").with_quantity(2.0));
    tokio::time::sleep(Duration::from_millis(600)).await;
    let state = session.row_state("r1").await.unwrap();
    assert_eq!(state.status, SaveStatus::Error);
    assert!(state.error.unwrap().contains("database is locked"));

    store.omit_row("r2");
    session.queue_update(ItemUpdate::new("r2").with_quantity(1.0));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(session.row_state("r1").await.unwrap().status, SaveStatus::Saved);
    let r2 = session.row_state("r2").await.unwrap();
    assert_eq!(r2.status, SaveStatus::Error);
    assert_eq!(r2.error.as_deref(), Some(NO_RESPONSE));
    assert_eq!(store.get(&RowId::from("r1")).unwrap().quantity, 2.0);
    assert_eq!(store.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_memory_store_stall_times_out() {
    init_tracing();
    let store = Arc::new(MemoryItemStore::new());
    let config = AutosaveConfig::default().with_request_timeout(Some(Duration::from_secs(5)));
    let session = spawn_session(Arc::clone(&store), config);

    store.stall();
    session.queue_update(ItemUpdate::new("r1").with_quantity(2.0));
    tokio::time::sleep(Duration::from_secs(6)).await;

    let state = session.row_state("r1").await.unwrap();
    assert_eq!(state.status, SaveStatus::Error);
    assert_eq!(session.pending_count().await.unwrap(), 1);
    assert!(store.get(&RowId::from("r1")).is_none());

    // The retained edit goes out with the next one
    session.queue_update(ItemUpdate::new("r1").with_unit("t"));
    tokio::time::sleep(Duration::from_millis(600)).await;
    let stored = store.get(&RowId::from("r1")).unwrap();
    assert_eq!(stored.quantity, 2.0);
    assert_eq!(stored.unit, "t");
}
