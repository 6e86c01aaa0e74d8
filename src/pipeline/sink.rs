//! Result Sink: partitions completed items into success and failure records.

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use log::{debug, error};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::engine::progress::{ProgressBar, finish_bar, update_progress_bar};
use crate::{ItemDescriptor, SinkSummary};

pub struct ResultSink<W: Write> {
    success: W,
    failure: W,
    progress: Option<ProgressBar>,
    summary: SinkSummary,
}

impl ResultSink<File> {
    /// Create (truncate) both output files. Failure is a setup error.
    pub fn create(success: &Path, failure: &Path) -> Result<Self> {
        let success_file = File::create(success)
            .with_context(|| format!("can't create success output {}", success.display()))?;
        let failure_file = File::create(failure)
            .with_context(|| format!("can't create failure output {}", failure.display()))?;
        Ok(Self::new(success_file, failure_file))
    }
}

/// One CSV line, quoted as needed: source, key, digest, size, failure text.
fn encode_record(item: &ItemDescriptor) -> Result<Vec<u8>> {
    let failure_text = item
        .failure
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_default();
    let mut line = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    line.write_record([
        &*item.source_path.to_string_lossy(),
        item.destination_key.as_str(),
        item.content_digest.as_str(),
        item.byte_size.to_string().as_str(),
        failure_text.as_str(),
    ])?;
    line.into_inner()
        .map_err(|e| anyhow::anyhow!("encoding record: {}", e.error()))
}

impl<W: Write> ResultSink<W> {
    pub fn new(success: W, failure: W) -> Self {
        Self {
            success,
            failure,
            progress: None,
            summary: SinkSummary::default(),
        }
    }

    pub fn with_progress(mut self, pb: ProgressBar) -> Self {
        self.progress = Some(pb);
        self
    }

    pub fn summary(&self) -> SinkSummary {
        self.summary
    }

    /// Append one record and flush it so the outputs stay usable if the process dies. A write
    /// error is logged and counted, and that record is dropped; bytes the writer accepted before
    /// failing stay in the output as a truncated line.
    pub fn record(&mut self, item: &ItemDescriptor) {
        let (writer, label) = match item.failure {
            Some(_) => {
                self.summary.failed += 1;
                (&mut self.failure, "failure")
            }
            None => {
                self.summary.succeeded += 1;
                (&mut self.success, "success")
            }
        };
        let written = encode_record(item).and_then(|line| {
            writer.write_all(&line)?;
            writer.flush()?;
            Ok(())
        });
        match written {
            Ok(()) => debug!(
                "{} record: {} -> {}",
                label,
                item.source_path.display(),
                item.destination_key
            ),
            Err(e) => {
                self.summary.write_errors += 1;
                error!(
                    "error writing {} record for {}: {:#}",
                    label,
                    item.source_path.display(),
                    e
                );
            }
        }
        if let Some(pb) = &self.progress {
            update_progress_bar(pb, 1);
        }
    }

    /// Record every item until the channel closes, then flush both outputs.
    pub fn drain(&mut self, completed: Receiver<ItemDescriptor>) -> SinkSummary {
        for item in completed.iter() {
            self.record(&item);
        }
        for (writer, label) in [(&mut self.success, "success"), (&mut self.failure, "failure")] {
            if let Err(e) = writer.flush() {
                self.summary.write_errors += 1;
                error!("error flushing {} output: {}", label, e);
            }
        }
        if let Some(pb) = &self.progress {
            finish_bar(pb);
        }
        debug!("sink: completed stream drained, {:?}", self.summary);
        self.summary
    }

    /// Flush and hand back the underlying writers.
    pub fn into_inner(mut self) -> Result<(W, W)> {
        self.success.flush().context("flushing success output")?;
        self.failure.flush().context("flushing failure output")?;
        Ok((self.success, self.failure))
    }
}
