use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mission_deck::config::TailConfig;
use mission_deck::state::{self, StateHandle};
use mission_deck::tail::spawn_tailer;
use mission_deck_core::models::{DeckSnapshot, Stage};
use mission_deck_core::{LogTailer, MissionDeck};

fn todays_log(dir: &Path) -> PathBuf {
    LogTailer::new(dir, "gateway").path_for(Utc::now().date_naive())
}

fn append(path: &Path, text: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("Failed to open log");
    file.write_all(text.as_bytes()).expect("Failed to append");
}

fn config(dir: &Path) -> TailConfig {
    TailConfig {
        dir: dir.to_path_buf(),
        prefix: "gateway".to_string(),
        poll_interval: Duration::from_millis(20),
    }
}

async fn wait_for_state(
    state: &StateHandle,
    predicate: impl FnMut(&Arc<DeckSnapshot>) -> bool,
) -> Arc<DeckSnapshot> {
    let mut snapshots = state.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(predicate))
        .await
        .expect("state reached")
        .expect("actor alive")
        .clone();
    snapshot
}

#[tokio::test]
async fn lines_already_in_todays_log_are_replayed() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    append(&todays_log(dir.path()), "[frodo] calling tool browser\n");

    let (state, _actor) = state::spawn(MissionDeck::default());
    let tailer = spawn_tailer(config(dir.path()), state.clone());

    let snapshot = wait_for_state(&state, |s| s.pipeline.stage == Stage::Execution).await;
    assert_eq!(snapshot.workforce["frodo"].task.as_deref(), Some("browser"));

    tailer.abort();
}

#[tokio::test]
async fn appended_lines_are_picked_up_on_later_polls() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let log = todays_log(dir.path());

    let (state, _actor) = state::spawn(MissionDeck::default());
    let tailer = spawn_tailer(config(dir.path()), state.clone());
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(state.snapshot().pipeline.stage, Stage::Idle);

    append(&log, "exec approval required id=ap-9 ");
    append(&log, "command=\"cargo publish\"\n");

    let snapshot = wait_for_state(&state, |s| !s.approvals.is_empty()).await;
    assert_eq!(snapshot.approvals[0].id, "ap-9");
    assert_eq!(snapshot.approvals[0].command, "cargo publish");

    tailer.abort();
}
