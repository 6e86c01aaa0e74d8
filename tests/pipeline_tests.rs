use s3ship::pipeline::{ResultSink, Scheduler, Source, run_pipeline, start_pipeline};
use s3ship::upload::{LocalStoreUploader, UploadError, UploadRequest, Uploader};
use s3ship::{ConcurrencyPolicy, KeyLayout, Opts, Target, transfer};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    let mut lines: Vec<String> = fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

/// Source tree with three files in nested directories.
fn sample_tree(root: &Path) {
    write_file(&root.join("one.txt"), b"first file");
    write_file(&root.join("nested/two.txt"), b"second file");
    write_file(&root.join("nested/deep/three.log"), b"third file");
}

fn local_opts(work: &Path, src: &Path) -> Opts {
    Opts {
        path: src.to_path_buf(),
        workers: 2,
        target: Some(Target::LocalStore {
            root: work.join("store"),
        }),
        output_success: work.join("ok.csv"),
        output_failure: work.join("failed.csv"),
        ..Default::default()
    }
}

// --- end to end with the local store ---

#[test]
fn test_transfer_walk_into_local_store() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = local_opts(work.path(), &src);

    let summary = transfer(&opts).unwrap();
    assert_eq!(summary.enumerated, 3);
    assert_eq!(summary.sink.succeeded, 3);
    assert_eq!(summary.sink.failed, 0);
    assert_eq!(summary.sink.write_errors, 0);

    let store = work.path().join("store");
    assert_eq!(fs::read(store.join("one.txt")).unwrap(), b"first file");
    assert_eq!(fs::read(store.join("two.txt")).unwrap(), b"second file");
    assert_eq!(fs::read(store.join("three.log")).unwrap(), b"third file");

    assert_eq!(read_lines(&opts.output_success).len(), 3);
    assert!(read_lines(&opts.output_failure).is_empty());
}

#[test]
fn test_transfer_preserve_tree_and_pool() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = Opts {
        key_layout: KeyLayout::RelativePath,
        policy: ConcurrencyPolicy::SteadyPool,
        ..local_opts(work.path(), &src)
    };

    let summary = transfer(&opts).unwrap();
    assert_eq!(summary.sink.succeeded, 3);
    assert_eq!(summary.scheduler.barriers, 0);
    let store = work.path().join("store");
    assert!(store.join("nested/deep/three.log").is_file());
    assert!(store.join("nested/two.txt").is_file());
}

#[test]
fn test_transfer_manifest_mixed_outcomes() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    write_file(&src.join("test1.tsv"), b"a\tb");
    write_file(&src.join("test1.txt"), b"ab");
    let manifest = work.path().join("manifest.csv");
    let rows = format!(
        "{src}/test1.*,/dst/test1.*\n{src}/missing.*,/dst/missing.*\n,\n{src}/test1.txt,../escape.txt\n",
        src = src.display()
    );
    fs::write(&manifest, rows).unwrap();
    let opts = Opts {
        manifest: Some(manifest),
        ..local_opts(work.path(), &src)
    };

    let summary = transfer(&opts).unwrap();
    assert_eq!(summary.enumerated, 3);
    assert_eq!(summary.sink.succeeded, 1);
    assert_eq!(summary.sink.failed, 2);
    assert_eq!(summary.scheduler.passed_through, 1);

    let store = work.path().join("store");
    assert_eq!(fs::read(store.join("dst/test1.tsv")).unwrap(), b"a\tb");
    assert!(!work.path().join("escape.txt").exists());

    let failed = read_lines(&opts.output_failure);
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().any(|l| l.contains("unable to find file with name missing")));
    assert!(failed.iter().any(|l| l.contains("escapes the store")));
}

#[test]
fn test_output_closure_matches_enumeration() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    for i in 0..23 {
        write_file(&src.join(format!("d{}/f{i}.dat", i % 4)), format!("{i}").as_bytes());
    }
    let opts = Opts {
        workers: 5,
        ..local_opts(work.path(), &src)
    };

    let summary = transfer(&opts).unwrap();
    let records =
        read_lines(&opts.output_success).len() + read_lines(&opts.output_failure).len();
    assert_eq!(summary.enumerated, 23);
    assert_eq!(records, 23);
    assert_eq!(summary.sink.total(), 23);
    assert!(summary.scheduler.peak_in_flight <= 5);
}

#[test]
fn test_transfer_is_idempotent() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = local_opts(work.path(), &src);

    transfer(&opts).unwrap();
    let first = read_lines(&opts.output_success);
    transfer(&opts).unwrap();
    let second = read_lines(&opts.output_success);
    assert_eq!(first, second);
}

#[test]
fn test_dry_run_uploads_nothing() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = Opts {
        dry_run: true,
        target: None,
        ..local_opts(work.path(), &src)
    };

    let summary = transfer(&opts).unwrap();
    assert_eq!(summary.sink.succeeded, 3);
    assert_eq!(summary.scheduler.admitted, 3);
    assert!(!work.path().join("store").exists());
    assert_eq!(read_lines(&opts.output_success).len(), 3);
}

#[test]
fn test_missing_root_fails_before_outputs() {
    let work = tempfile::tempdir().unwrap();
    let opts = local_opts(work.path(), &work.path().join("absent"));
    assert!(transfer(&opts).is_err());
    assert!(!opts.output_success.exists());
}

#[test]
fn test_missing_target_is_setup_error() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = Opts {
        target: None,
        ..local_opts(work.path(), &src)
    };
    assert!(transfer(&opts).is_err());
}

// --- fatal abort through the whole pipeline ---

struct BrokenStore {
    calls: AtomicUsize,
}

impl Uploader for BrokenStore {
    fn upload(&self, _request: UploadRequest<'_>) -> Result<String, UploadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(UploadError::Misconfigured("region does not exist".into()))
    }
}

#[test]
fn test_fatal_upload_error_aborts_after_flush() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    for i in 0..30 {
        write_file(&src.join(format!("f{i}.txt")), b"x");
    }
    let opts = Opts {
        path: src.clone(),
        ..Default::default()
    };
    let broken = Arc::new(BrokenStore {
        calls: AtomicUsize::new(0),
    });
    let scheduler = Scheduler::new(3).uploader(broken.clone());
    let mut sink = ResultSink::new(Vec::new(), Vec::new());

    let err = run_pipeline(Source::from_opts(&opts).unwrap(), scheduler, &mut sink).unwrap_err();
    assert!(format!("{err:#}").contains("region does not exist"));

    let summary = sink.summary();
    assert_eq!(summary.succeeded, 0);
    assert!(summary.failed >= 1);
    assert!(summary.failed < 30);
    assert_eq!(summary.failed, broken.calls.load(Ordering::SeqCst));
    let (_, failure) = sink.into_inner().unwrap();
    assert_eq!(
        String::from_utf8(failure).unwrap().lines().count(),
        summary.failed
    );
}

/// Every item the enumerator hands over on an aborted run is recorded by the sink.
fn assert_abort_records_every_handed_item(policy: ConcurrencyPolicy) {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    for i in 0..10 {
        write_file(&src.join(format!("f{i}.txt")), b"x");
    }
    let opts = Opts {
        path: src.clone(),
        ..Default::default()
    };
    let broken = Arc::new(BrokenStore {
        calls: AtomicUsize::new(0),
    });
    let scheduler = Scheduler::new(3).uploader(broken.clone()).policy(policy);
    let mut sink = ResultSink::new(Vec::new(), Vec::new());

    let handles = start_pipeline(Source::from_opts(&opts).unwrap(), scheduler);
    let recorded = sink.drain(handles.completed_rx);
    assert!(handles.scheduler_handle.join().unwrap().is_err());
    let handed_over = handles.enumerator_handle.join().unwrap();

    assert!(handed_over < 10);
    assert_eq!(recorded.total(), handed_over);
    assert_eq!(recorded.failed, broken.calls.load(Ordering::SeqCst));
}

#[test]
fn test_burst_abort_loses_no_items() {
    assert_abort_records_every_handed_item(ConcurrencyPolicy::LockstepBurst);
}

#[test]
fn test_pool_abort_loses_no_items() {
    assert_abort_records_every_handed_item(ConcurrencyPolicy::SteadyPool);
}

#[test]
fn test_run_pipeline_with_local_uploader() {
    let work = tempfile::tempdir().unwrap();
    let src = work.path().join("src");
    sample_tree(&src);
    let opts = Opts {
        path: src.clone(),
        ..Default::default()
    };
    let store = LocalStoreUploader::open(&work.path().join("objects")).unwrap();
    let scheduler = Scheduler::new(1).uploader(Arc::new(store));
    let mut sink = ResultSink::new(Vec::new(), Vec::new());

    let summary = run_pipeline(Source::from_opts(&opts).unwrap(), scheduler, &mut sink).unwrap();
    assert_eq!(summary.enumerated, 3);
    assert_eq!(summary.scheduler.admitted, 3);
    assert_eq!(summary.scheduler.barriers, 3);
    assert_eq!(summary.scheduler.peak_in_flight, 1);
    assert!(work.path().join("objects/three.log").is_file());
}
