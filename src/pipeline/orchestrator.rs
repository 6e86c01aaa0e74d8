use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use std::io::Write;
use std::thread::{self, JoinHandle};

use crate::pipeline::{self, ResultSink, Scheduler, Source};
use crate::upload::UploadError;
use crate::{ItemDescriptor, RunSummary, SchedulerStats};

/// Enumerator thread: pull items from `source` and hand each to the scheduler. Stops early if
/// the scheduler has gone away. Returns how many items were handed over.
pub fn spawn_enumerator(source: Source, item_tx: Sender<ItemDescriptor>) -> JoinHandle<usize> {
    thread::spawn(move || {
        let strategy = source.strategy_name();
        let mut count = 0;
        for item in source {
            if item_tx.send(item).is_err() {
                debug!("enumerator: scheduler stopped, ending {} early", strategy);
                break;
            }
            count += 1;
        }
        debug!("enumerator: {} finished, {} items", strategy, count);
        count
    })
}

pub fn spawn_scheduler(
    scheduler: Scheduler,
    item_rx: Receiver<ItemDescriptor>,
    completed_tx: Sender<ItemDescriptor>,
) -> JoinHandle<Result<SchedulerStats, UploadError>> {
    thread::spawn(move || scheduler.run(item_rx, completed_tx))
}

/// Start the enumerator and scheduler threads. Caller drains `completed_rx` and must then join
/// both handles.
pub fn start_pipeline(source: Source, scheduler: Scheduler) -> pipeline::PipelineHandles {
    let channels = pipeline::create_pipeline_channels();
    let enumerator_handle = spawn_enumerator(source, channels.item_tx);
    let scheduler_handle = spawn_scheduler(scheduler, channels.item_rx, channels.completed_tx);
    pipeline::PipelineHandles {
        completed_rx: channels.completed_rx,
        enumerator_handle,
        scheduler_handle,
    }
}

/// Enumerator → Scheduler → Sink. The sink runs on the calling thread; returns once the
/// completed stream is drained, both outputs are flushed and both threads have been joined.
/// A fatal upload error is returned after the sink has recorded everything that completed.
pub fn run_pipeline<W: Write>(
    source: Source,
    scheduler: Scheduler,
    sink: &mut ResultSink<W>,
) -> Result<RunSummary> {
    let pipeline::PipelineHandles {
        completed_rx,
        enumerator_handle,
        scheduler_handle,
    } = start_pipeline(source, scheduler);

    let sink_summary = sink.drain(completed_rx);

    let scheduled = scheduler_handle
        .join()
        .map_err(|_| anyhow::anyhow!("scheduler thread panicked"))?;
    let enumerated = enumerator_handle
        .join()
        .map_err(|_| anyhow::anyhow!("enumerator thread panicked"))?;

    match scheduled {
        Ok(stats) => Ok(RunSummary {
            enumerated,
            scheduler: stats,
            sink: sink_summary,
        }),
        Err(e) => {
            warn!(
                "run aborted after {} items ({} recorded as failed)",
                sink_summary.total(),
                sink_summary.failed
            );
            Err(anyhow::Error::new(e).context("transfer aborted"))
        }
    }
}
