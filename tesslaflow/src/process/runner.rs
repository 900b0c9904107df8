//! Spawning one subprocess and collecting what it prints.

use super::guard::ProcessTicket;
use crate::core::{CommandSpec, PipelineEvent, StageKind, StageOutcome};
use crate::events::EventSink;
use crate::observability::SpanTimer;
use chrono::Utc;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 8192;
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// Runs stage commands and streams their output as events.
#[derive(Clone)]
pub struct ProcessRunner {
    sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for ProcessRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRunner").finish_non_exhaustive()
    }
}

impl ProcessRunner {
    /// Creates a runner publishing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Spawns `command` and waits for it to exit.
    ///
    /// Every chunk is published as soon as it is read: stderr as
    /// [`PipelineEvent::ErrorText`], stdout as [`PipelineEvent::Console`] when
    /// `echo_stdout` is set. The ticket is released once the process has
    /// exited, before the outcome is returned. Failing to spawn is reported
    /// as an outcome with a single stderr chunk.
    pub async fn run(
        &self,
        mut ticket: ProcessTicket,
        command: &CommandSpec,
        echo_stdout: bool,
    ) -> StageOutcome {
        let stage = ticket.stage();
        let timer = SpanTimer::start(stage.to_string());

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.working_dir {
            cmd.current_dir(dir);
        }
        match command.stdout_file {
            Some(ref file) => match std::fs::File::create(file) {
                Ok(file) => {
                    cmd.stdout(Stdio::from(file));
                }
                Err(err) => {
                    let message = format!("Failed to create '{}': {err}", file.display());
                    return self
                        .finish(ticket, StageOutcome::spawn_failure(message, Utc::now()))
                        .await;
                }
            },
            None => {
                cmd.stdout(Stdio::piped());
            }
        }

        let started_at = Utc::now();
        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(%stage, command = %command, error = %err, "Failed to spawn process");
                let message = format!("Failed to start '{}': {err}", command.program.display());
                return self
                    .finish(ticket, StageOutcome::spawn_failure(message, started_at))
                    .await;
            }
        };
        if let Some(pid) = child.id() {
            ticket.set_pid(pid);
        }
        info!(%stage, pid = ?child.id(), command = %command, "Process spawned");

        let (tx, rx) = mpsc::unbounded_channel();
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, Stream::Stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, Stream::Stderr, tx.clone())));
        }
        drop(tx);

        let kill_rx = ticket.take_kill_signal();
        let exited = async {
            let result = wait_or_kill(&mut child, kill_rx).await;
            close_pumps(stage, pumps).await;
            result
        };
        let ((stdout_chunks, stderr_chunks), (status, cancelled)) =
            tokio::join!(self.collect(stage, rx, echo_stdout), exited);

        let mut outcome = StageOutcome {
            exit_code: None,
            signal: None,
            stdout_chunks,
            stderr_chunks,
            started_at,
        };
        match status {
            Ok(status) => {
                outcome.exit_code = status.code();
                outcome.signal = termination_signal(status);
            }
            Err(err) => {
                outcome
                    .stderr_chunks
                    .push(format!("Failed to wait for process: {err}"));
            }
        }
        if cancelled && outcome.signal.is_none() {
            outcome.signal = Some(signal_name(SIGKILL));
        }

        info!(
            %stage,
            exit_code = ?outcome.exit_code,
            signal = ?outcome.signal,
            duration_ms = timer.finish(),
            "Process exited"
        );
        self.finish(ticket, outcome).await
    }

    async fn collect(
        &self,
        stage: StageKind,
        mut rx: mpsc::UnboundedReceiver<(Stream, String)>,
        echo_stdout: bool,
    ) -> (Vec<String>, Vec<String>) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        while let Some((stream, text)) = rx.recv().await {
            match stream {
                Stream::Stdout => {
                    if echo_stdout {
                        self.sink.emit(&PipelineEvent::console(text.as_str())).await;
                    }
                    stdout.push(text);
                }
                Stream::Stderr => {
                    self.sink
                        .emit(&PipelineEvent::error_text(stage, text.as_str()))
                        .await;
                    stderr.push(text);
                }
            }
        }

        (stdout, stderr)
    }

    async fn finish(&self, ticket: ProcessTicket, outcome: StageOutcome) -> StageOutcome {
        let stage = ticket.stage();
        drop(ticket);

        self.sink.emit(&PipelineEvent::controls(false)).await;
        if stage.announces_exit() {
            if let Some(message) = outcome.exit_message() {
                self.sink
                    .emit(&PipelineEvent::console(format!("\n{message}\n\n")))
                    .await;
            }
        }
        outcome
    }
}

/// Waits for `child`, killing it first if the kill signal fires.
///
/// The second value tells whether a kill was sent.
async fn wait_or_kill(
    child: &mut Child,
    kill_rx: Option<oneshot::Receiver<()>>,
) -> (io::Result<ExitStatus>, bool) {
    let Some(mut kill_rx) = kill_rx else {
        return (child.wait().await, false);
    };

    tokio::select! {
        status = child.wait() => (status, false),
        Ok(()) = &mut kill_rx => {
            if let Err(err) = child.start_kill() {
                debug!(error = %err, "Process ended before it could be killed");
            }
            (child.wait().await, true)
        }
    }
}

/// Lets the output readers drain after the process exited, then aborts the
/// ones still blocked.
///
/// A grandchild that inherited the pipes keeps them open after the process
/// itself is gone; its later output is dropped.
async fn close_pumps(stage: StageKind, pumps: Vec<JoinHandle<()>>) {
    for handle in pumps {
        let abort = handle.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, handle).await.is_err() {
            debug!(%stage, "Output pipe still open after exit, abandoning it");
            abort.abort();
        }
    }
}

/// Forwards everything `reader` yields as text until EOF.
///
/// Multi-byte characters split across reads are held back until complete.
async fn pump<R>(mut reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER_SIZE];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                pending.extend_from_slice(&buf[..n]);
                let text = take_decodable(&mut pending);
                if !text.is_empty() && tx.send((stream, text)).is_err() {
                    return;
                }
            }
            Err(err) => {
                debug!(?stream, error = %err, "Stopped reading process output");
                break;
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send((stream, String::from_utf8_lossy(&pending).into_owned()));
    }
}

/// Decodes the longest prefix of `pending` that does not end inside a
/// multi-byte character, leaving the incomplete tail in place.
fn take_decodable(pending: &mut Vec<u8>) -> String {
    let complete = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(complete);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

const SIGKILL: i32 = 9;

#[cfg(unix)]
fn termination_signal(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map(signal_name)
}

#[cfg(not(unix))]
fn termination_signal(_status: ExitStatus) -> Option<String> {
    None
}

fn signal_name(signal: i32) -> String {
    match signal {
        1 => "SIGHUP".to_string(),
        2 => "SIGINT".to_string(),
        3 => "SIGQUIT".to_string(),
        6 => "SIGABRT".to_string(),
        SIGKILL => "SIGKILL".to_string(),
        11 => "SIGSEGV".to_string(),
        13 => "SIGPIPE".to_string(),
        15 => "SIGTERM".to_string(),
        other => format!("SIG{other}"),
    }
}
