//! Pipeline components: enumeration strategies, scheduler, sink and the threads tying them.

pub mod context;
pub mod manifest;
pub mod orchestrator;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod walk;

pub use context::{PipelineChannels, PipelineHandles, create_pipeline_channels};
pub use manifest::{ManifestSource, resolve_wildcard};
pub use orchestrator::{run_pipeline, spawn_enumerator, spawn_scheduler, start_pipeline};
pub use scheduler::{CompletionTracker, Scheduler};
pub use sink::ResultSink;
pub use source::Source;
pub use walk::{WalkOutcome, WalkSource, to_outcome_walkdir};
