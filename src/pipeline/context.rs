//! Pipeline channels and thread handles.

use crossbeam_channel::{Receiver, Sender, bounded};
use std::thread::JoinHandle;

use crate::upload::UploadError;
use crate::{ItemDescriptor, SchedulerStats};

/// Handles returned by [`crate::pipeline::start_pipeline`]: the sink receives from
/// `completed_rx`, then joins both threads.
/// `enumerator_handle` yields the number of items handed to the scheduler.
pub struct PipelineHandles {
    pub completed_rx: Receiver<ItemDescriptor>,
    pub enumerator_handle: JoinHandle<usize>,
    pub scheduler_handle: JoinHandle<Result<SchedulerStats, UploadError>>,
}

/// Item stream (enumerator → scheduler) and completed stream (scheduler → sink).
pub struct PipelineChannels {
    pub item_tx: Sender<ItemDescriptor>,
    pub item_rx: Receiver<ItemDescriptor>,
    pub completed_tx: Sender<ItemDescriptor>,
    pub completed_rx: Receiver<ItemDescriptor>,
}

/// Both channels are rendezvous channels: a send blocks until the next stage takes the item.
pub fn create_pipeline_channels() -> PipelineChannels {
    let (item_tx, item_rx) = bounded::<ItemDescriptor>(0);
    let (completed_tx, completed_rx) = bounded::<ItemDescriptor>(0);
    PipelineChannels {
        item_tx,
        item_rx,
        completed_tx,
        completed_rx,
    }
}
