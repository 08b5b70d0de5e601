//! Local state survives closing and reopening the on-disk store

use std::collections::HashMap;

use coursetimers::runtime::TimerRuntime;

mod common;

#[tokio::test]
async fn test_offsets_roundtrip_through_reopened_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let expected = {
        let local = common::open_local_state(&dir);
        let (_clock, _gateway, runtime) = common::scripted_runtime(local);
        runtime.adjust_offset("math", -60);
        runtime.adjust_offset("physics", 300);
        runtime.adjust_offset("math", 15);
        runtime.snapshot().offsets
        // Runtime and store drop here, releasing the sled lock.
    };
    assert_eq!(
        expected,
        HashMap::from([("math".to_string(), -45), ("physics".to_string(), 300)])
    );

    let local = common::open_local_state(&dir);
    let (_clock, _gateway, runtime) = common::scripted_runtime(local);
    assert_eq!(runtime.snapshot().offsets, expected);
}

#[tokio::test]
async fn test_banked_time_and_username_survive_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    {
        let local = common::open_local_state(&dir);
        local.set_username("ada");
        let (clock, _gateway, runtime) = common::scripted_runtime(local);
        runtime.start_timer("art").await.unwrap();
        clock.advance(chrono::Duration::seconds(75));
        runtime.stop_timer().await.unwrap();
    }

    let local = common::open_local_state(&dir);
    assert_eq!(local.username().as_deref(), Some("ada"));
    assert!(local.load_active_session().is_none());
    assert!(local.load_session_adjustments().is_empty());

    let (_clock, _gateway, runtime): (_, _, TimerRuntime) = common::scripted_runtime(local);
    let snapshot = runtime.snapshot();
    assert_eq!(snapshot.banked.get("art"), Some(&75));
    assert_eq!(snapshot.display_seconds("art"), 75);
}

#[test]
fn test_corrupt_values_decode_to_defaults() {
    use coursetimers::storage::{KeyValueStore, LocalState, SledStore};
    use std::sync::Arc;

    let dir = tempfile::TempDir::new().unwrap();
    let store = SledStore::open(dir.path().join("state")).unwrap();
    store.set("coursetimers.timerOffsets", b"{\"math\": \"oops\", \"art\": 12}").unwrap();
    store.set("coursetimers.timerElapsed", b"not json at all").unwrap();
    store.set("coursetimers.activeSession", b"{\"activeSession\": 7}").unwrap();

    let local = LocalState::new(Arc::new(store), "coursetimers");
    assert_eq!(
        local.load_offsets(),
        HashMap::from([("math".to_string(), 0), ("art".to_string(), 12)])
    );
    assert!(local.load_banked().is_empty());
    assert!(local.load_active_session().is_none());
}
