use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::time::Duration;

use nrtk_core::{Layout, Snapshot};
use nrtk_daemon::{run, DaemonError, Schedule, Scheduler, SchedulerSummary};
use nrtk_sync::fetcher::parse_response;
use nrtk_sync::lock::SyncLock;
use nrtk_sync::{FetchError, Fetcher, SyncError, Synchronizer};
use tempfile::TempDir;

/// Replays one canned API body per cycle; repeats the last one when exhausted.
struct Replay {
    bodies: RefCell<VecDeque<String>>,
}

impl Replay {
    fn new(checksums: &[&str]) -> Self {
        Self {
            bodies: RefCell::new(checksums.iter().map(|c| body(c)).collect()),
        }
    }
}

impl Fetcher for Replay {
    fn fetch(&self) -> Result<Snapshot, FetchError> {
        let mut bodies = self.bodies.borrow_mut();
        let body = if bodies.len() > 1 {
            bodies.pop_front()
        } else {
            bodies.front().cloned()
        };
        match body {
            Some(body) => parse_response(&body),
            None => Err(FetchError::Malformed("no response".to_string())),
        }
    }
}

fn body(checksum: &str) -> String {
    format!(
        r#"{{
            "title": "Daily", "entity": "daily", "homepage_url": "https://news.example",
            "error_page": "oops", "checksum": "{checksum}",
            "stories": [{{
                "anchor": "a1", "content": "content {checksum}", "is_landing": false,
                "hash": "{checksum}", "canonical_url": "https://news.example/a1",
                "updated_at": "2025-03-01T10:00:00Z", "title": "A1", "uid": "1", "credits": []
            }}]
        }}"#
    )
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn repeat_mode_archives_each_superseded_snapshot() {
    let base = TempDir::new().unwrap();
    let layout = Layout::from_base(base.path());
    let sync = Synchronizer::new(Replay::new(&["v1", "v1", "v2"]), layout.clone());
    let scheduler = Scheduler::new(Schedule::Every(Duration::from_secs(60))).with_max_cycles(3);

    let summary = run(&sync, &scheduler, None).await.expect("run");

    assert_eq!(summary, SchedulerSummary { cycles: 3, updated: 2, failed: 0 });
    assert_eq!(
        fs::read_to_string(layout.www_dir.join("a1")).unwrap(),
        "content v2"
    );
    assert_eq!(
        fs::read_to_string(layout.archive_dir("v1").join("a1")).unwrap(),
        "content v1"
    );
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v2");
}

#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn once_mode_reports_cycle_failure() {
    let base = TempDir::new().unwrap();
    let layout = Layout::from_base(base.path());
    let sync = Synchronizer::new(Replay::new(&[]), layout);

    let err = run(&sync, &Scheduler::new(Schedule::Once), None)
        .await
        .unwrap_err();
    assert!(
        matches!(err, DaemonError::Sync(SyncError::Fetch(_))),
        "got: {err}"
    );
}

#[cfg(unix)]
#[tokio::test(start_paused = true, flavor = "current_thread")]
async fn second_runner_is_refused_while_lock_is_held() {
    let base = TempDir::new().unwrap();
    let layout = Layout::from_base(base.path());
    let _held = SyncLock::acquire(&layout.lock_path()).unwrap();
    let sync = Synchronizer::new(Replay::new(&["v1"]), layout.clone());

    let err = run(&sync, &Scheduler::new(Schedule::Once), None)
        .await
        .unwrap_err();
    assert!(matches!(err, DaemonError::Sync(SyncError::Locked { .. })));
    assert!(!layout.www_dir.exists());
}
