//! Printing pipeline events to the terminal.

use async_trait::async_trait;
use std::io::Write;
use tesslaflow::events::{EventSink, PipelineEvent};

/// Where a rendered event goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Renders the events a terminal user cares about.
///
/// Program output goes to stdout as is; everything else is a line on stderr.
pub fn render(event: &PipelineEvent) -> Option<(Stream, String)> {
    match event {
        PipelineEvent::Console { text } => Some((Stream::Stdout, text.clone())),
        PipelineEvent::ErrorText { text, .. } => Some((Stream::Stderr, text.clone())),
        PipelineEvent::StageStarted { stage, command } => {
            Some((Stream::Stderr, format!("==> {stage}: {command}\n")))
        }
        PipelineEvent::StageSucceeded { summary, .. } => {
            Some((Stream::Stderr, format!("ok: {summary}\n")))
        }
        PipelineEvent::StageFailed { summary, .. } => {
            Some((Stream::Stderr, format!("error: {summary}\n")))
        }
        PipelineEvent::PreconditionFailed { title, detail } => {
            Some((Stream::Stderr, format!("error: {title}\n  {detail}\n")))
        }
        PipelineEvent::Warning { title, detail } => {
            Some((Stream::Stderr, format!("warning: {title}\n  {detail}\n")))
        }
        PipelineEvent::SpecError { file, error } => Some((
            Stream::Stderr,
            format!(
                "{}:{}:{}: {}: {}\n",
                file.display(),
                error.start.line + 1,
                error.start.column + 1,
                error.kind,
                error.message
            ),
        )),
        _ => None,
    }
}

/// Event sink writing to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleEventSink;

impl ConsoleEventSink {
    fn write(event: &PipelineEvent) {
        let Some((stream, text)) = render(event) else {
            return;
        };
        // A closed terminal is not worth failing the pipeline over.
        let _ = match stream {
            Stream::Stdout => {
                let mut out = std::io::stdout().lock();
                out.write_all(text.as_bytes()).and_then(|()| out.flush())
            }
            Stream::Stderr => std::io::stderr().lock().write_all(text.as_bytes()),
        };
    }
}

#[async_trait]
impl EventSink for ConsoleEventSink {
    async fn emit(&self, event: &PipelineEvent) {
        Self::write(event);
    }

    fn try_emit(&self, event: &PipelineEvent) {
        Self::write(event);
    }
}
