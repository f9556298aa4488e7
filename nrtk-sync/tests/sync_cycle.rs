use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nrtk_core::{Layout, Snapshot};
use nrtk_sync::fetcher::parse_response;
use nrtk_sync::lock::SyncLock;
use nrtk_sync::{CycleOutcome, FetchError, Fetcher, SyncError, Synchronizer};
use serde_json::{json, Value};
use tempfile::TempDir;

/// Serves whatever body was set last, like an API that changes between polls.
struct FakeApi {
    body: RefCell<Result<String, u16>>,
}

impl FakeApi {
    fn serving(body: Value) -> Self {
        Self {
            body: RefCell::new(Ok(body.to_string())),
        }
    }

    fn set(&self, body: Value) {
        *self.body.borrow_mut() = Ok(body.to_string());
    }

    fn fail(&self, code: u16) {
        *self.body.borrow_mut() = Err(code);
    }
}

impl Fetcher for FakeApi {
    fn fetch(&self) -> Result<Snapshot, FetchError> {
        match &*self.body.borrow() {
            Ok(body) => parse_response(body),
            Err(code) => Err(FetchError::Status {
                url: "http://api.test/instance".to_string(),
                code: *code,
            }),
        }
    }
}

fn story(anchor: &str, content: &str, is_landing: bool) -> Value {
    json!({
        "anchor": anchor,
        "content": content,
        "is_landing": is_landing,
        "hash": format!("h-{content}"),
        "canonical_url": format!("https://news.example/{anchor}"),
        "updated_at": "2025-03-01T10:00:00.000000Z",
        "title": anchor,
        "uid": format!("uid-{anchor}"),
        "credits": [],
    })
}

fn response(checksum: &str, stories: Vec<Value>) -> Value {
    json!({
        "title": "Daily",
        "entity": "daily",
        "homepage_url": "https://news.example",
        "error_page": "<h1>Not found</h1>",
        "stories": stories,
        "checksum": checksum,
    })
}

/// File name → content for every regular file directly under `dir`.
fn read_tree(dir: &Path) -> BTreeMap<String, String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return BTreeMap::new();
    };
    entries
        .map(|e| e.expect("dir entry"))
        .filter(|e| e.path().is_file())
        .map(|e| {
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read_to_string(e.path()).expect("read file"),
            )
        })
        .collect()
}

fn names(dir: &Path) -> Vec<String> {
    read_tree(dir).into_keys().collect()
}

fn setup() -> (TempDir, Layout) {
    let base = TempDir::new().expect("base dir");
    let layout = Layout::from_base(base.path());
    (base, layout)
}

#[test]
fn first_run_publishes_every_item_and_commits() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response(
        "v1",
        vec![story("home", "Welcome", true), story("a1", "Hello", false)],
    ));
    let sync = Synchronizer::new(&api, layout.clone());

    let outcome = sync.run_once(false).expect("first run");
    match &outcome {
        CycleOutcome::Updated {
            previous, archived, ..
        } => {
            assert!(previous.is_none());
            assert!(archived.is_none(), "nothing to archive on first run");
        }
        other => panic!("expected Updated, got {other:?}"),
    }

    assert_eq!(
        names(&layout.www_dir),
        vec!["a1", "error.html", "index", "sitemap.xml"]
    );
    let www = read_tree(&layout.www_dir);
    assert_eq!(www["index"], "Welcome");
    assert_eq!(www["a1"], "Hello");
    assert_eq!(www["error.html"], "<h1>Not found</h1>");
    assert!(www["sitemap.xml"].contains("<loc>https://news.example/a1</loc>"));
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v1");
    assert!(names(&layout.bin_dir).is_empty());
}

#[test]
fn first_run_removes_untracked_files() {
    let (_base, layout) = setup();
    fs::create_dir_all(&layout.www_dir).unwrap();
    fs::write(layout.www_dir.join("stray.html"), "left over").unwrap();

    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    Synchronizer::new(&api, layout.clone()).run_once(false).unwrap();

    assert_eq!(names(&layout.www_dir), vec!["a1", "error.html", "sitemap.xml"]);
}

#[test]
fn update_archives_previous_snapshot_then_writes_new_one() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response(
        "abc",
        vec![story("home", "Home", true), story("a1", "Hello", false)],
    ));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();
    let before = read_tree(&layout.www_dir);

    api.set(response(
        "xyz",
        vec![
            story("home", "Home", true),
            story("a1", "Hello!", false),
            story("a2", "World", false),
        ],
    ));
    let outcome = sync.run_once(false).expect("update");

    let CycleOutcome::Updated {
        previous,
        current,
        archived,
        changes,
        ..
    } = outcome
    else {
        panic!("expected Updated");
    };
    assert_eq!(previous.unwrap().as_str(), "abc");
    assert_eq!(current.as_str(), "xyz");
    assert_eq!(changes.added, vec!["a2"]);
    assert_eq!(changes.updated, vec!["a1"]);
    assert_eq!(changes.unchanged, vec!["index"]);

    let archive_dir = layout.archive_dir("abc");
    assert_eq!(archived.unwrap().path, archive_dir);
    assert_eq!(read_tree(&archive_dir), before, "archive mirrors the old store");
    assert_eq!(read_tree(&archive_dir)["a1"], "Hello");

    let www = read_tree(&layout.www_dir);
    assert_eq!(www["a1"], "Hello!");
    assert_eq!(www["a2"], "World");
    assert_eq!(www["index"], "Home");
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "xyz");
    assert!(!layout.staging_dir().exists());
}

#[test]
fn unchanged_checksum_touches_nothing() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();

    let meta_before = fs::read_to_string(layout.meta_path()).unwrap();
    let mtime_before = fs::metadata(layout.www_dir.join("a1")).unwrap().modified().unwrap();

    let outcome = sync.run_once(false).unwrap();
    assert!(matches!(outcome, CycleOutcome::Unchanged { .. }));
    assert_eq!(fs::read_to_string(layout.meta_path()).unwrap(), meta_before);
    assert_eq!(
        fs::metadata(layout.www_dir.join("a1")).unwrap().modified().unwrap(),
        mtime_before
    );
    assert!(names(&layout.bin_dir).is_empty());
}

#[test]
fn empty_article_set_leaves_only_fixed_files() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response(
        "v1",
        vec![story("a1", "One", false), story("a2", "Two", false)],
    ));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();

    api.set(response("v2", vec![]));
    sync.run_once(false).unwrap();

    assert_eq!(names(&layout.www_dir), vec!["error.html", "sitemap.xml"]);
    assert_eq!(
        names(&layout.archive_dir("v1")),
        vec!["a1", "a2", "error.html", "sitemap.xml"]
    );
}

#[test]
fn fetch_failure_leaves_everything_untouched() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();
    let www_before = read_tree(&layout.www_dir);

    api.fail(503);
    let err = sync.run_once(false).unwrap_err();
    assert!(
        matches!(err, SyncError::Fetch(FetchError::Status { code: 503, .. })),
        "got: {err}"
    );

    assert_eq!(read_tree(&layout.www_dir), www_before);
    assert!(names(&layout.bin_dir).is_empty());
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v1");
}

#[test]
fn malformed_response_leaves_everything_untouched() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();

    api.set(json!({ "title": "Daily", "stories": [] }));
    let err = sync.run_once(false).unwrap_err();
    assert!(matches!(err, SyncError::Fetch(_)), "got: {err}");
    assert_eq!(read_tree(&layout.www_dir)["a1"], "Hello");
}

#[test]
fn interrupted_commit_surfaces_archive_conflict_on_next_run() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "One", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();
    let committed_v1 = fs::read_to_string(layout.meta_path()).unwrap();

    api.set(response("v2", vec![story("a1", "Two", false)]));
    sync.run_once(false).unwrap();

    // Simulate a crash after archiving and writing v2 but before the commit.
    fs::write(layout.meta_path(), committed_v1).unwrap();
    let www_before = read_tree(&layout.www_dir);

    api.set(response("v3", vec![story("a1", "Three", false)]));
    let err = sync.run_once(false).unwrap_err();
    match &err {
        SyncError::ArchiveConflict { checksum, path } => {
            assert_eq!(checksum.as_str(), "v1");
            assert_eq!(path, &layout.archive_dir("v1"));
        }
        other => panic!("expected ArchiveConflict, got {other}"),
    }

    assert_eq!(read_tree(&layout.www_dir), www_before);
    assert_eq!(read_tree(&layout.archive_dir("v1"))["a1"], "One");
    assert!(!layout.staging_dir().exists());
}

#[test]
fn dry_run_reports_without_writing() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());

    let outcome = sync.run_once(true).unwrap();
    let CycleOutcome::WouldUpdate { writes, changes, .. } = outcome else {
        panic!("expected WouldUpdate");
    };
    assert_eq!(writes.len(), 3);
    assert_eq!(changes.added, vec!["a1"]);
    assert!(!layout.www_dir.exists());
    assert!(!layout.app_dir.exists());
}

#[test]
fn concurrent_run_is_refused() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());

    let _held = SyncLock::acquire(&layout.lock_path()).unwrap();
    if cfg!(unix) {
        let err = sync.run_once(false).unwrap_err();
        assert!(matches!(err, SyncError::Locked { .. }), "got: {err}");
        assert!(!layout.www_dir.exists());
    }
}

#[test]
fn legacy_meta_record_is_honoured() {
    let (_base, layout) = setup();
    fs::create_dir_all(&layout.app_dir).unwrap();
    fs::write(
        layout.meta_path(),
        r#"{"checksum": "old", "title": "Daily", "entity": "daily", "homepage_url": "https://news.example"}"#,
    )
    .unwrap();
    fs::create_dir_all(&layout.www_dir).unwrap();
    fs::write(layout.www_dir.join("a1"), "Legacy").unwrap();

    let api = FakeApi::serving(response("new", vec![story("a1", "Fresh", false)]));
    Synchronizer::new(&api, layout.clone()).run_once(false).unwrap();

    assert_eq!(read_tree(&layout.archive_dir("old"))["a1"], "Legacy");
    assert_eq!(read_tree(&layout.www_dir)["a1"], "Fresh");
}

#[test]
fn anchor_shaped_like_a_temp_file_is_published() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "Hello", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();

    api.set(response(
        "v2",
        vec![story("error.html.nrtk.tmp", "Story", false)],
    ));
    let outcome = sync.run_once(false).expect("update");
    assert!(outcome.is_update());

    let www = read_tree(&layout.www_dir);
    assert_eq!(www["error.html.nrtk.tmp"], "Story");
    assert_eq!(www["error.html"], "<h1>Not found</h1>");
    assert_eq!(read_tree(&layout.archive_dir("v1"))["a1"], "Hello");
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v2");
}

#[test]
#[cfg(unix)]
fn content_store_on_another_filesystem_is_synced() {
    use std::os::unix::fs::MetadataExt;

    let shm = Path::new("/dev/shm");
    if !shm.is_dir() {
        return;
    }
    let (base, mut layout) = setup();
    let other = TempDir::new_in(shm).expect("tmpfs dir");
    if fs::metadata(base.path()).unwrap().dev() == fs::metadata(other.path()).unwrap().dev() {
        return;
    }
    layout.www_dir = other.path().join("www");
    fs::create_dir_all(&layout.www_dir).unwrap();
    fs::write(layout.www_dir.join("stray.html"), "left over").unwrap();

    let api = FakeApi::serving(response("v1", vec![story("a1", "One", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).expect("first run");
    assert_eq!(names(&layout.www_dir), vec!["a1", "error.html", "sitemap.xml"]);

    fs::create_dir_all(layout.www_dir.join("assets")).unwrap();
    fs::write(layout.www_dir.join("assets/site.css"), "body{}").unwrap();
    api.set(response("v2", vec![story("a1", "Two", false)]));
    sync.run_once(false).expect("update across filesystems");

    let archive_dir = layout.archive_dir("v1");
    assert_eq!(read_tree(&archive_dir)["a1"], "One");
    assert_eq!(
        fs::read_to_string(archive_dir.join("assets/site.css")).unwrap(),
        "body{}"
    );
    assert_eq!(names(&layout.www_dir), vec!["a1", "error.html", "sitemap.xml"]);
    assert!(!layout.www_dir.join("assets").exists());
    assert_eq!(read_tree(&layout.www_dir)["a1"], "Two");
    assert!(!layout.staging_dir().exists());
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v2");
}

#[test]
fn archive_failing_part_way_is_incomplete() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "One", false)]));
    Synchronizer::new(&api, layout.clone()).run_once(false).unwrap();

    // An archive root inside the last content entry: that entry cannot be
    // moved into itself, after every other entry has been.
    let mut nested = layout.clone();
    nested.bin_dir = layout.www_dir.join("zz/bin");
    fs::create_dir_all(&nested.bin_dir).unwrap();
    let sync = Synchronizer::new(&api, nested.clone());

    api.set(response("v2", vec![story("a1", "Two", false)]));
    let err = sync.run_once(false).unwrap_err();
    match &err {
        SyncError::ArchiveIncomplete { checksum, path, .. } => {
            assert_eq!(checksum.as_str(), "v1");
            assert_eq!(path, &nested.archive_dir("v1"));
        }
        other => panic!("expected ArchiveIncomplete, got {other}"),
    }

    assert_eq!(
        names(&nested.archive_dir("v1")),
        vec!["a1", "error.html", "sitemap.xml"]
    );
    assert!(read_tree(&layout.www_dir).is_empty());
    assert!(layout.www_dir.join("zz").is_dir());
    assert!(!layout.staging_dir().exists(), "staged content discarded");
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v1");
}

#[test]
#[cfg(unix)]
fn promotion_failure_after_archiving_keeps_staged_content() {
    let (base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "One", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();

    // A dangling symlink reads as an empty store but cannot be created as a
    // directory, so archiving succeeds and promotion fails.
    fs::remove_dir_all(&layout.www_dir).unwrap();
    std::os::unix::fs::symlink(base.path().join("unmounted"), &layout.www_dir).unwrap();

    api.set(response("v2", vec![story("a1", "Two", false)]));
    let err = sync.run_once(false).unwrap_err();
    match &err {
        SyncError::Write { path, .. } => assert_eq!(path, &layout.www_dir),
        other => panic!("expected Write, got {other}"),
    }

    assert!(layout.archive_dir("v1").is_dir(), "archiving already happened");
    let staged = read_tree(&layout.staging_dir());
    assert_eq!(staged["a1"], "Two");
    assert_eq!(
        names(&layout.staging_dir()),
        vec!["a1", "error.html", "sitemap.xml"]
    );
    assert_eq!(sync.tracker().current_checksum().unwrap().unwrap().as_str(), "v1");
}

#[test]
fn tracker_failure_after_writing_leaves_new_content_uncommitted() {
    let (_base, layout) = setup();
    let api = FakeApi::serving(response("v1", vec![story("a1", "One", false)]));
    let sync = Synchronizer::new(&api, layout.clone());
    sync.run_once(false).unwrap();
    let tracked = sync.tracker().read_current().unwrap();

    // A non-empty directory where meta.json lives: the final rename fails.
    fs::remove_file(layout.meta_path()).unwrap();
    fs::create_dir_all(layout.meta_path().join("blocker")).unwrap();

    api.set(response("v2", vec![story("a1", "Two", false)]));
    let err = sync.cycle(tracked.as_ref(), false).unwrap_err();
    assert!(matches!(err, SyncError::Tracker { .. }), "got: {err}");

    assert_eq!(read_tree(&layout.www_dir)["a1"], "Two");
    assert_eq!(read_tree(&layout.archive_dir("v1"))["a1"], "One");
    assert!(layout.meta_path().is_dir(), "tracker never committed v2");
}
