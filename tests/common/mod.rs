use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;

use coursetimers::clock::ManualClock;
use coursetimers::gateway::fake::ScriptedGateway;
use coursetimers::runtime::{RuntimeSettings, TimerRuntime};
use coursetimers::storage::{LocalState, SledStore};

#[allow(dead_code)]
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 8, 0, 0).unwrap()
}

/// Local state in a sled database under a fresh temp dir
#[allow(dead_code)]
pub fn temp_local_state() -> (LocalState, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let local = open_local_state(&tmp);
    (local, tmp)
}

/// Reopen the sled database under `dir`
#[allow(dead_code)]
pub fn open_local_state(dir: &TempDir) -> LocalState {
    let store = SledStore::open(dir.path().join("state")).expect("failed to open sled store");
    LocalState::new(Arc::new(store), "coursetimers")
}

#[allow(dead_code)]
pub fn scripted_runtime(
    local: LocalState,
) -> (Arc<ManualClock>, Arc<ScriptedGateway>, TimerRuntime) {
    let clock = Arc::new(ManualClock::new(t0()));
    let gateway = Arc::new(ScriptedGateway::new(clock.clone()));
    let runtime = TimerRuntime::new(
        gateway.clone(),
        local,
        clock.clone(),
        RuntimeSettings::default(),
    );
    (clock, gateway, runtime)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
