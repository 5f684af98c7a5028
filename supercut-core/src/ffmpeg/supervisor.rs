//! Runs one external tool to completion while following its `-progress`
//! stream over a loopback socket.
//!
//! Two helper threads are involved: one waits on the child and drains its
//! pipes, the other accepts the progress connection and parses ticks. Both
//! watch a shared cancel flag, so dropping a [`ProgressStream`] early kills
//! the child and releases the socket within a bounded grace period. An
//! interrupt flag set from outside is polled while waiting and has the same
//! effect.

use std::{
    ffi::OsString,
    fmt::Display,
    io::{self, BufRead, BufReader, ErrorKind, Read},
    net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{
    ffmpeg::progress::{Progress, ProgressKey, TickParser},
    string_or_bytes::StringOrBytes,
    util::printable_command,
};

/// How long a tool gets to connect to the progress listener.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(30);
/// How long teardown waits for each helper thread before leaving it behind.
pub const JOIN_GRACE: Duration = Duration::from_secs(1);
const READ_TIMEOUT: Duration = Duration::from_millis(200);
const POLL_INTERVAL: Duration = Duration::from_millis(20);
const STDERR_TAIL_LINES: usize = 20;

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub program: String,
    pub args:    Vec<String>,
    pub status:  ExitStatus,
    pub stdout:  StringOrBytes,
    pub stderr:  StringOrBytes,
}

impl ToolOutput {
    #[inline]
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

impl Display for ToolOutput {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} exited with {}\nCOMMAND:\n        {}\nSTDERR:\n{}",
            self.program,
            self.status,
            printable_command(self.program.as_ref(), &self.args),
            textwrap::indent(&self.stderr.tail(STDERR_TAIL_LINES), "        ")
        )
    }
}

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("{name} not found. Is it installed in the system path?")]
    ToolNotFound { name: String },
    #[error("Failed to open progress listener")]
    Listener(#[source] io::Error),
    #[error("Failed to start {program}")]
    Spawn {
        program: String,
        #[source]
        source:  io::Error,
    },
    #[error("Lost track of {program} while waiting for it")]
    Wait {
        program: String,
        #[source]
        source:  io::Error,
    },
    #[error("{0}")]
    ToolFailed(Box<ToolOutput>),
    #[error("{program} was cancelled")]
    Cancelled { program: String },
    #[error("{program} stopped without reporting an exit status")]
    Abandoned { program: String },
    #[error("Unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },
}

/// A single command line to run under supervision.
///
/// The final argument vector is `global_args`, then `-progress <url>` when
/// progress is followed, then `args`.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program:        PathBuf,
    pub global_args:    Vec<OsString>,
    pub args:           Vec<OsString>,
    pub accept_timeout: Duration,
    pub interrupt:      Option<Arc<AtomicBool>>,
}

impl Invocation {
    #[inline]
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program:        program.into(),
            global_args:    Vec::new(),
            args:           args.into_iter().map(Into::into).collect(),
            accept_timeout: DEFAULT_ACCEPT_TIMEOUT,
            interrupt:      None,
        }
    }

    #[inline]
    pub fn with_global_args<I, S>(mut self, global_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.global_args = global_args.into_iter().map(Into::into).collect();
        self
    }

    #[inline]
    pub fn with_accept_timeout(mut self, accept_timeout: Duration) -> Self {
        self.accept_timeout = accept_timeout;
        self
    }

    /// Kills the tool once `interrupt` is set, ending its stream with
    /// [`FfmpegError::Cancelled`].
    #[inline]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(interrupt);
        self
    }

    fn command_line(&self, progress_url: Option<&str>) -> Vec<OsString> {
        let mut line = self.global_args.clone();
        if let Some(url) = progress_url {
            line.push("-progress".into());
            line.push(url.into());
        }
        line.extend(self.args.iter().cloned());
        line
    }

    /// Runs the tool without a progress listener and waits for it.
    #[inline]
    pub fn run(self) -> Result<ToolOutput, FfmpegError> {
        self.spawn::<()>(None)?.finish()
    }

    /// Starts the tool. With a `progress` key, a loopback listener is opened
    /// first and its address passed as `-progress tcp://127.0.0.1:<port>`.
    #[tracing::instrument(level = "debug", skip_all, fields(program = %self.program.display()))]
    #[inline]
    pub fn spawn<T: Send + 'static>(
        self,
        progress: Option<ProgressKey<T>>,
    ) -> Result<ProgressStream<T>, FfmpegError> {
        let program = self.program.to_string_lossy().into_owned();

        let listener = progress.as_ref().map(|_| open_listener()).transpose()?;
        let address = listener
            .as_ref()
            .map(TcpListener::local_addr)
            .transpose()
            .map_err(FfmpegError::Listener)?;
        let url = address.map(|address| format!("tcp://{address}"));

        let args = self.command_line(url.as_deref());
        debug!("{}", printable_command(self.program.as_os_str(), &args));

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| FfmpegError::Spawn {
                program: program.clone(),
                source,
            })?;
        let pid = child.id();

        let cancel = Arc::new(AtomicBool::new(false));
        let exited = Arc::new(AtomicBool::new(false));
        let (exit_tx, exit_rx) = crossbeam_channel::bounded(1);

        let runner = {
            let cancel = Arc::clone(&cancel);
            let exited = Arc::clone(&exited);
            let program = program.clone();
            let args = args.iter().map(|arg| arg.to_string_lossy().into_owned()).collect();
            thread::spawn(move || {
                let result = supervise_child(child, program, args, &cancel, &exited);
                exit_tx.send(result).ok();
            })
        };

        let (progress_rx, reader) = match (listener, progress) {
            (Some(listener), Some(key)) => {
                let (tx, rx) = crossbeam_channel::unbounded();
                let cancel = Arc::clone(&cancel);
                let accept_timeout = self.accept_timeout;
                let reader = thread::spawn(move || {
                    if let Some(stream) = accept_connection(listener, &cancel, &exited, accept_timeout) {
                        read_progress(stream, &key, &tx, &cancel);
                    }
                });
                (Some(rx), Some(reader))
            },
            _ => (None, None),
        };

        Ok(ProgressStream {
            program,
            progress: progress_rx,
            exit: exit_rx,
            output: None,
            reader,
            runner: Some(runner),
            cancel,
            interrupt: self.interrupt,
            address,
            pid,
            done: false,
        })
    }
}

fn open_listener() -> Result<TcpListener, FfmpegError> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).map_err(FfmpegError::Listener)?;
    listener.set_nonblocking(true).map_err(FfmpegError::Listener)?;
    Ok(listener)
}

fn drain(mut pipe: impl Read + Send + 'static) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Err(e) = pipe.read_to_end(&mut buffer) {
            trace!("pipe closed with error: {e}");
        }
        buffer
    })
}

fn collect(pipe: Option<JoinHandle<Vec<u8>>>) -> StringOrBytes {
    pipe.and_then(|handle| handle.join().ok()).map(StringOrBytes::from).unwrap_or_default()
}

fn supervise_child(
    mut child: Child,
    program: String,
    args: Vec<String>,
    cancel: &AtomicBool,
    exited: &AtomicBool,
) -> Result<ToolOutput, FfmpegError> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let mut killed = false;

    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if !killed && cancel.load(Ordering::Acquire) {
                    debug!("terminating {program} (pid {})", child.id());
                    // an error here means it is already gone
                    child.kill().ok();
                    killed = true;
                }
                thread::sleep(POLL_INTERVAL);
            },
            Err(source) => {
                child.kill().ok();
                exited.store(true, Ordering::Release);
                // the pipes may never close, so the drain threads are not joined
                trace!("abandoning output pipes of {program}");
                return Err(FfmpegError::Wait {
                    program,
                    source,
                });
            },
        }
    };
    exited.store(true, Ordering::Release);

    if killed {
        // pipes may still be held open by grandchildren, so they are not joined
        return Err(FfmpegError::Cancelled {
            program,
        });
    }

    Ok(ToolOutput {
        program,
        args,
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn accept_connection(
    listener: TcpListener,
    cancel: &AtomicBool,
    exited: &AtomicBool,
    timeout: Duration,
) -> Option<TcpStream> {
    let deadline = Instant::now() + timeout;

    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                trace!("progress connection from {peer}");
                return Some(stream);
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {},
            Err(e) => {
                debug!("progress listener failed: {e}");
                return None;
            },
        }

        if cancel.load(Ordering::Acquire) {
            return None;
        }
        if exited.load(Ordering::Acquire) {
            // the child may have connected right before exiting
            return listener.accept().ok().map(|(stream, _)| stream);
        }
        if Instant::now() >= deadline {
            debug!("no progress connection within {timeout:?}, continuing without progress");
            return None;
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn read_progress<T>(stream: TcpStream, key: &ProgressKey<T>, tx: &Sender<Progress<T>>, cancel: &AtomicBool) {
    if let Err(e) = stream.set_nonblocking(false).and_then(|()| stream.set_read_timeout(Some(READ_TIMEOUT))) {
        debug!("could not configure progress socket: {e}");
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut parser = TickParser::default();
    let mut line = Vec::new();

    loop {
        if cancel.load(Ordering::Acquire) {
            return;
        }

        let hangup = match reader.read_until(b'\n', &mut line) {
            Ok(0) => true,
            Ok(_) if line.ends_with(b"\n") => false,
            // unterminated line, the next read reports the hangup
            Ok(_) => continue,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                continue;
            },
            Err(e) => {
                debug!("progress stream failed: {e}");
                return;
            },
        };

        if let Some(progress) = parser.push_line(&line).and_then(|tick| key.extract(&tick)) {
            if tx.send(progress).is_err() {
                return;
            }
        }
        line.clear();

        if hangup {
            return;
        }
    }
}

fn join_bounded(handle: JoinHandle<()>, deadline: Instant, name: &str, pid: u32) {
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("{name} for pid {pid} did not stop in time, leaving it behind");
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    if handle.join().is_err() {
        warn!("{name} for pid {pid} panicked");
    }
}

/// Progress values of a running tool, in the order they were reported.
///
/// Iteration ends once the tool has exited. A failed or cancelled run is
/// reported as a final `Err` item. Dropping the stream before that kills the
/// tool.
pub struct ProgressStream<T> {
    program:   String,
    progress:  Option<Receiver<Progress<T>>>,
    exit:      Receiver<Result<ToolOutput, FfmpegError>>,
    output:    Option<ToolOutput>,
    reader:    Option<JoinHandle<()>>,
    runner:    Option<JoinHandle<()>>,
    cancel:    Arc<AtomicBool>,
    interrupt: Option<Arc<AtomicBool>>,
    address:   Option<SocketAddr>,
    pid:       u32,
    done:      bool,
}

impl<T> ProgressStream<T> {
    #[inline]
    pub fn child_id(&self) -> u32 {
        self.pid
    }

    /// Address of the progress listener, if one was opened.
    #[inline]
    pub fn progress_address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// Discards remaining progress and waits for the tool to exit.
    #[inline]
    pub fn finish(mut self) -> Result<ToolOutput, FfmpegError> {
        while let Some(item) = self.next() {
            item?;
        }
        self.output.take().ok_or_else(|| FfmpegError::Abandoned {
            program: self.program.clone(),
        })
    }

    /// Passes a set interrupt flag on to the helper threads.
    fn check_interrupt(&self) -> bool {
        let interrupted = self.interrupt.as_ref().is_some_and(|interrupt| interrupt.load(Ordering::Acquire));
        if interrupted {
            self.cancel.store(true, Ordering::Release);
        }
        interrupted
    }

    fn wait_for_exit(&mut self) -> Option<Result<Progress<T>, FfmpegError>> {
        self.done = true;
        self.progress = None;
        if let Some(reader) = self.reader.take() {
            join_bounded(reader, Instant::now() + JOIN_GRACE, "progress reader", self.pid);
        }

        let exit = loop {
            match self.exit.recv_timeout(READ_TIMEOUT) {
                Ok(exit) => break Some(exit),
                Err(RecvTimeoutError::Timeout) => {
                    self.check_interrupt();
                },
                Err(RecvTimeoutError::Disconnected) => break None,
            }
        };

        match exit {
            Some(Ok(output)) if output.success() => {
                self.output = Some(output);
                None
            },
            Some(Ok(output)) => Some(Err(FfmpegError::ToolFailed(Box::new(output)))),
            Some(Err(error)) => Some(Err(error)),
            None => Some(Err(FfmpegError::Abandoned {
                program: self.program.clone(),
            })),
        }
    }
}

impl<T> Iterator for ProgressStream<T> {
    type Item = Result<Progress<T>, FfmpegError>;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(progress) = &self.progress {
            if self.check_interrupt() {
                break;
            }
            match progress.recv_timeout(READ_TIMEOUT) {
                Ok(value) => return Some(Ok(value)),
                Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.wait_for_exit()
    }
}

impl<T> Drop for ProgressStream<T> {
    #[inline]
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.progress = None;

        let deadline = Instant::now() + JOIN_GRACE;
        if let Some(reader) = self.reader.take() {
            join_bounded(reader, deadline, "progress reader", self.pid);
        }
        if let Some(runner) = self.runner.take() {
            join_bounded(runner, deadline, "process supervisor", self.pid);
        }
    }
}
