use crossbeam_channel::bounded;
use s3ship::error::ItemError;
use s3ship::pipeline::ResultSink;
use s3ship::upload::UploadError;
use s3ship::{Fingerprint, ItemDescriptor};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

fn ok_item(name: &str, size: u64) -> ItemDescriptor {
    ItemDescriptor::new(
        PathBuf::from(format!("/data/{name}")),
        Fingerprint {
            digest: format!("{:064x}", size),
            size,
        },
        format!("dst/{name}"),
    )
}

fn failed_item(name: &str) -> ItemDescriptor {
    let mut item = ok_item(name, 3);
    item.failure = Some(ItemError::Transfer {
        path: item.source_path.clone(),
        source: UploadError::Rejected("access denied".into()),
    });
    item
}

fn drain_all(sink: &mut ResultSink<impl Write>, items: Vec<ItemDescriptor>) {
    let (tx, rx) = bounded(0);
    let feeder = thread::spawn(move || {
        for item in items {
            tx.send(item).unwrap();
        }
    });
    sink.drain(rx);
    feeder.join().unwrap();
}

fn lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8(bytes.to_vec())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

/// Writer whose first `failures` writes fail, optionally after accepting `partial` bytes;
/// everything else lands in a shared buffer.
#[derive(Clone, Default)]
struct FlakyWriter {
    failures: Arc<Mutex<usize>>,
    partial: Arc<Mutex<usize>>,
    data: Arc<Mutex<Vec<u8>>>,
}

impl Write for FlakyWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut failures = self.failures.lock().unwrap();
        if *failures > 0 {
            let mut partial = self.partial.lock().unwrap();
            if *partial > 0 {
                let n = (*partial).min(buf.len());
                *partial = 0;
                self.data.lock().unwrap().extend_from_slice(&buf[..n]);
                return Ok(n);
            }
            *failures -= 1;
            return Err(io::Error::other("disk full"));
        }
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// --- partitioning ---

#[test]
fn test_sink_partitions_by_failure() {
    let mut sink = ResultSink::new(Vec::new(), Vec::new());
    drain_all(
        &mut sink,
        vec![ok_item("a", 1), failed_item("b"), ok_item("c", 2)],
    );
    let summary = sink.summary();
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.write_errors, 0);
    assert_eq!(summary.total(), 3);

    let (success, failure) = sink.into_inner().unwrap();
    assert_eq!(lines(&success).len(), 2);
    assert_eq!(lines(&failure).len(), 1);
}

#[test]
fn test_success_record_format() {
    let mut sink = ResultSink::new(Vec::new(), Vec::new());
    sink.record(&ok_item("report.csv", 18));
    let (success, failure) = sink.into_inner().unwrap();
    assert_eq!(
        lines(&success),
        vec![format!("/data/report.csv,dst/report.csv,{:064x},18,", 18)]
    );
    assert!(failure.is_empty());
}

#[test]
fn test_failure_record_carries_error_text() {
    let mut sink = ResultSink::new(Vec::new(), Vec::new());
    sink.record(&failed_item("b"));
    let (_, failure) = sink.into_inner().unwrap();
    let rows = lines(&failure);
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("/data/b,dst/b,"));
    assert!(rows[0].ends_with("error uploading /data/b: failed to upload: access denied"));
}

#[test]
fn test_fields_with_commas_are_quoted() {
    let mut sink = ResultSink::new(Vec::new(), Vec::new());
    sink.record(&ok_item("a,b.txt", 1));
    let (success, _) = sink.into_inner().unwrap();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(success.as_slice());
    let record = reader.records().next().unwrap().unwrap();
    assert_eq!(&record[0], "/data/a,b.txt");
    assert_eq!(&record[1], "dst/a,b.txt");
    assert_eq!(&record[4], "");
}

#[test]
fn test_empty_stream_writes_nothing() {
    let mut sink = ResultSink::new(Vec::new(), Vec::new());
    drain_all(&mut sink, Vec::new());
    assert_eq!(sink.summary().total(), 0);
    let (success, failure) = sink.into_inner().unwrap();
    assert!(success.is_empty() && failure.is_empty());
}

// --- write errors ---

#[test]
fn test_write_error_is_counted_and_processing_continues() {
    let success = FlakyWriter {
        failures: Arc::new(Mutex::new(1)),
        ..Default::default()
    };
    let failure = FlakyWriter::default();
    let success_data = Arc::clone(&success.data);

    let mut sink = ResultSink::new(success, failure);
    drain_all(
        &mut sink,
        vec![ok_item("a", 1), ok_item("b", 2), ok_item("c", 3)],
    );
    let summary = sink.summary();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.write_errors, 1);

    // The record that failed is dropped; the next ones are written once each.
    let rows = lines(&success_data.lock().unwrap());
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("/data/b,"));
    assert!(rows[1].starts_with("/data/c,"));
}

#[test]
fn test_partial_write_is_not_repeated() {
    let success = FlakyWriter {
        failures: Arc::new(Mutex::new(1)),
        partial: Arc::new(Mutex::new(8)),
        ..Default::default()
    };
    let success_data = Arc::clone(&success.data);

    let mut sink = ResultSink::new(success, FlakyWriter::default());
    drain_all(&mut sink, vec![ok_item("a", 1), ok_item("b", 2)]);
    assert_eq!(sink.summary().write_errors, 1);

    let text = String::from_utf8(success_data.lock().unwrap().clone()).unwrap();
    assert_eq!(text.matches("/data/a").count(), 1);
    assert_eq!(text.matches("/data/b").count(), 1);
    assert!(text.starts_with("/data/a,/data/b,dst/b,"));
}

// --- files ---

#[test]
fn test_create_truncates_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let ok = dir.path().join("ok.csv");
    let bad = dir.path().join("bad.csv");
    std::fs::write(&ok, "stale\n").unwrap();

    let mut sink = ResultSink::create(&ok, &bad).unwrap();
    drain_all(&mut sink, vec![ok_item("x", 1)]);
    drop(sink);

    let rows = lines(&std::fs::read(&ok).unwrap());
    assert_eq!(rows.len(), 1);
    assert!(rows[0].starts_with("/data/x,dst/x,"));
    assert!(std::fs::read(&bad).unwrap().is_empty());
}

#[test]
fn test_create_in_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("no/such/dir/ok.csv");
    assert!(ResultSink::create(&missing, &dir.path().join("bad.csv")).is_err());
}
