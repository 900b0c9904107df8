//! Event delivery to front ends.
//!
//! The pipeline publishes [`PipelineEvent`]s through an [`EventSink`] held by
//! its session; there is no global sink.

mod sink;

pub use crate::core::PipelineEvent;
pub use sink::{CollectingEventSink, EventSink, FanoutEventSink, LoggingEventSink, NoOpEventSink};
