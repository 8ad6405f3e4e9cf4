//! Directory walks over real temporary trees.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use codecorpus_ingest::{
    Completion, DirectoryWalker, IngestError, ProgressSink, ProgressSnapshot, SkipReason,
    WalkOptions,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn write(root: &Path, rel: &str, len: usize) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "x".repeat(len)).unwrap();
}

fn relative_paths(outcome: &codecorpus_ingest::IngestOutcome) -> Vec<String> {
    outcome
        .corpus
        .sorted_records()
        .into_iter()
        .map(|record| record.relative_path().replace('\\', "/"))
        .collect()
}

fn py_only() -> WalkOptions {
    WalkOptions::default().with_allowed_extensions([".py"])
}

#[tokio::test]
async fn excluded_directories_are_pruned() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", 500);
    write(dir.path(), "b.py", 500);
    write(dir.path(), "node_modules/c.py", 500);

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["a.py", "b.py"]);
    assert_eq!(outcome.completion, Completion::Complete);
    assert_eq!(outcome.report.files_found, 2);
    assert_eq!(outcome.report.files_ingested, 2);
    assert!(outcome.report.is_clean());
}

#[tokio::test]
async fn exclusion_applies_at_any_depth() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/keep.py", 10);
    write(dir.path(), "src/deep/bin/drop.py", 10);
    write(dir.path(), "src/deep/er/OBJ/drop.py", 10);
    write(dir.path(), "src/.cache/drop.py", 10);
    write(dir.path(), ".git/hooks/drop.py", 10);
    write(dir.path(), "a/b/c/d/e/f/.hidden/drop.py", 10);
    write(dir.path(), "a/b/c/d/e/f/keep.py", 10);

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await.unwrap();

    assert_eq!(
        relative_paths(&outcome),
        vec!["a/b/c/d/e/f/keep.py", "src/keep.py"]
    );
}

#[tokio::test]
async fn oversize_files_are_excluded() {
    let dir = TempDir::new().unwrap();
    // One KB over a 1 KB ceiling.
    write(dir.path(), "big.py", 2 * 1024);
    write(dir.path(), "exact.py", 1024);
    write(dir.path(), "small.py", 10);

    let options = py_only().with_max_file_size_kb(1);
    let outcome = DirectoryWalker::new(options).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["exact.py", "small.py"]);
    assert_eq!(outcome.report.skipped.len(), 1);
    assert_eq!(
        outcome.report.skipped[0].reason,
        SkipReason::TooLarge {
            size_bytes: 2048,
            limit_bytes: 1024
        }
    );
}

#[tokio::test]
async fn allow_list_filters_and_groups_by_extension() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "main.rs", 10);
    write(dir.path(), "Tool.PY", 10);
    write(dir.path(), "notes.md", 10);
    write(dir.path(), "Makefile", 10);

    let options = WalkOptions::default().with_allowed_extensions(["rs", ".py"]);
    let outcome = DirectoryWalker::new(options).walk(dir.path()).await.unwrap();

    let corpus = &outcome.corpus;
    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.files(".rs").len(), 1);
    assert_eq!(corpus.files(".py").len(), 1);
    assert!(corpus.files(".md").is_empty());
}

#[tokio::test]
async fn deep_trees_are_walked_sequentially_past_threshold() {
    let dir = TempDir::new().unwrap();
    let mut expected = Vec::new();
    let mut rel = String::new();
    for depth in 0..8 {
        rel.push_str(&format!("d{depth}/"));
        for sibling in 0..3 {
            let file = format!("{rel}s{sibling}/f.py");
            write(dir.path(), &file, 20);
            expected.push(file);
        }
    }
    expected.sort();

    let options = py_only().with_parallelism(2).with_parallel_depth_threshold(1);
    let outcome = DirectoryWalker::new(options).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), expected);
}

#[tokio::test]
async fn many_files_with_small_parallelism() {
    let dir = TempDir::new().unwrap();
    for i in 0..200 {
        write(dir.path(), &format!("pkg{}/m{i}.py", i % 7), 64);
    }

    let options = py_only().with_parallelism(1);
    let outcome = DirectoryWalker::new(options).walk(dir.path()).await.unwrap();

    assert_eq!(outcome.corpus.len(), 200);
    assert_eq!(outcome.report.files_ingested, 200);
    assert_eq!(outcome.corpus.total_bytes(), 200 * 64);
}

#[tokio::test]
async fn invalid_utf8_is_skipped_and_reported() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "good.py", 10);
    fs::write(dir.path().join("bad.py"), [0xff, 0xfe, 0x00, 0x41]).unwrap();

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["good.py"]);
    assert_eq!(outcome.report.files_found, 2);
    assert_eq!(outcome.report.files_ingested, 1);
    assert_eq!(outcome.report.skipped[0].reason, SkipReason::InvalidUtf8);
}

#[cfg(unix)]
#[tokio::test]
async fn broken_symlink_is_skipped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "real.py", 10);
    std::os::unix::fs::symlink(dir.path().join("missing.py"), dir.path().join("dangling.py"))
        .unwrap();

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["real.py"]);
    assert!(matches!(
        outcome.report.skipped[0].reason,
        SkipReason::Unreadable { .. }
    ));
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_directories_are_not_followed() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "src/a.py", 10);
    std::os::unix::fs::symlink(dir.path().join("src"), dir.path().join("loop")).unwrap();

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["src/a.py"]);
}

#[tokio::test]
async fn missing_root_fails() {
    let dir = TempDir::new().unwrap();
    let err = DirectoryWalker::default()
        .walk(dir.path().join("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::RootNotFound(_)));
}

#[tokio::test]
async fn file_root_fails() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "file.py", 10);
    let err = DirectoryWalker::default()
        .walk(dir.path().join("file.py"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::RootNotDirectory(_)));
}

#[tokio::test]
async fn cancelled_walk_reports_partial_result() {
    let dir = TempDir::new().unwrap();
    for i in 0..20 {
        write(dir.path(), &format!("f{i}.py"), 10);
    }
    let token = CancellationToken::new();
    token.cancel();

    let outcome = DirectoryWalker::new(py_only())
        .with_cancellation(token)
        .walk(dir.path())
        .await
        .unwrap();

    assert_eq!(outcome.completion, Completion::Cancelled);
    assert!(!outcome.is_complete());
    assert!(outcome.corpus.is_empty());
}

#[tokio::test]
async fn progress_reports_final_counts() {
    let dir = TempDir::new().unwrap();
    for i in 0..12 {
        write(dir.path(), &format!("dir{}/f{i}.py", i % 3), 10);
    }
    let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::default();
    let sink_seen = Arc::clone(&seen);
    let sink = ProgressSink::new(move |snapshot| sink_seen.lock().unwrap().push(snapshot))
        .with_interval(Duration::from_secs(3600));

    DirectoryWalker::new(py_only())
        .with_progress(sink)
        .walk(dir.path())
        .await
        .unwrap();

    let seen = seen.lock().unwrap();
    // Throttled events coalesce; the final report is always delivered.
    assert!((1..=2).contains(&seen.len()), "got {} events", seen.len());
    assert_eq!(
        seen.last().copied(),
        Some(ProgressSnapshot {
            files_found: 12,
            files_processed: 12
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_progress_callback_does_not_stall_walk() {
    let dir = TempDir::new().unwrap();
    for i in 0..80 {
        write(dir.path(), &format!("dir{}/f{i}.py", i % 4), 10);
    }
    let calls: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::default();
    let sink_calls = Arc::clone(&calls);
    let sink = ProgressSink::new(move |snapshot| {
        std::thread::sleep(Duration::from_millis(20));
        sink_calls.lock().unwrap().push(snapshot);
    })
    .with_interval(Duration::ZERO);

    let started = std::time::Instant::now();
    let outcome = DirectoryWalker::new(py_only())
        .with_progress(sink)
        .walk(dir.path())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(outcome.corpus.len(), 80);
    // Inline delivery would cost at least 80 * 20ms.
    assert!(elapsed < Duration::from_millis(800), "walk took {elapsed:?}");
    let calls = calls.lock().unwrap();
    assert!(!calls.is_empty());
    assert_eq!(
        calls.last().copied(),
        Some(ProgressSnapshot {
            files_found: 80,
            files_processed: 80
        })
    );
}

#[cfg(unix)]
#[tokio::test]
async fn unreadable_directory_is_skipped_and_siblings_still_count() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", 10);
    write(dir.path(), "sib/b.py", 10);
    write(dir.path(), "locked/c.py", 10);
    let locked = dir.path().join("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Running with CAP_DAC_OVERRIDE; permissions are not enforced.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let outcome = DirectoryWalker::new(py_only()).walk(dir.path()).await;
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let outcome = outcome.unwrap();

    assert_eq!(relative_paths(&outcome), vec!["a.py", "sib/b.py"]);
    assert_eq!(outcome.completion, Completion::Complete);
    assert_eq!(outcome.report.files_ingested, 2);
    assert!(outcome.report.skipped.iter().any(|entry| {
        entry.path.ends_with("locked")
            && matches!(entry.reason, SkipReason::DirectoryUnreadable { .. })
    }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn walk_runs_on_multi_thread_runtime() {
    let dir = TempDir::new().unwrap();
    for i in 0..50 {
        write(dir.path(), &format!("a{}/b{}/f{i}.py", i % 5, i % 3), 10);
    }
    let walker = DirectoryWalker::new(py_only());
    let root = dir.path().to_path_buf();
    let outcome = tokio::spawn(async move { walker.walk(root).await })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome.corpus.len(), 50);
}
