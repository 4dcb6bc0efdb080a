//! Recording pipeline.
//!
//! Connects the folder watcher to the uploader: every allow-listed file that
//! shows up in the watched folder gets its own background upload task with
//! bounded retry. Tasks are never awaited, deduplicated or ordered.

pub mod service;

pub use service::{OnOutcomeFn, PipelineConfig, RecordingService};
