/// Bounded output collection for child process streams
///
/// Each stream is drained on its own thread so the child can never block on a
/// full pipe. Bytes beyond the per-stream limit are read and discarded, and the
/// stream is marked as truncated.
use crate::config::types::OutputIntegrity;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Output limits configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLimits {
    /// Per-stream stdout limit (bytes)
    pub stdout_limit: usize,
    /// Per-stream stderr limit (bytes)
    pub stderr_limit: usize,
    /// How long to wait for collectors after the child is gone (milliseconds)
    pub collection_timeout_ms: u64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        OutputLimits {
            stdout_limit: 1024 * 1024,
            stderr_limit: 1024 * 1024,
            collection_timeout_ms: 5000,
        }
    }
}

/// One captured stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedStream {
    pub data: Vec<u8>,
    pub integrity: OutputIntegrity,
}

impl CapturedStream {
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

/// Output collection result
#[derive(Debug, Clone, Default)]
pub struct OutputResult {
    pub stdout: CapturedStream,
    pub stderr: CapturedStream,
}

impl OutputResult {
    pub fn combined_integrity(&self) -> OutputIntegrity {
        self.stdout.integrity.worst(self.stderr.integrity)
    }
}

/// Output collector with bounded collection
#[derive(Debug, Clone)]
pub struct OutputCollector {
    limits: OutputLimits,
}

/// Collectors started for a running child
pub struct PendingOutput {
    stdout: Option<Receiver<CapturedStream>>,
    stderr: Option<Receiver<CapturedStream>>,
    collection_timeout: Duration,
}

impl OutputCollector {
    pub fn new(limits: OutputLimits) -> Self {
        OutputCollector { limits }
    }

    pub fn limits(&self) -> &OutputLimits {
        &self.limits
    }

    /// Start draining both streams. Must be called before waiting on the child.
    pub fn start<O, E>(&self, stdout: Option<O>, stderr: Option<E>) -> PendingOutput
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        PendingOutput {
            stdout: stdout.map(|s| spawn_collector(s, self.limits.stdout_limit)),
            stderr: stderr.map(|s| spawn_collector(s, self.limits.stderr_limit)),
            collection_timeout: Duration::from_millis(self.limits.collection_timeout_ms),
        }
    }
}

impl PendingOutput {
    /// Wait for both collectors, bounded by the collection timeout.
    /// A collector that has not finished in time (a descendant still holds the
    /// pipe open) yields an empty, truncated stream.
    pub fn finish(self) -> OutputResult {
        let deadline = Instant::now() + self.collection_timeout;
        OutputResult {
            stdout: receive(self.stdout, deadline),
            stderr: receive(self.stderr, deadline),
        }
    }
}

fn receive(rx: Option<Receiver<CapturedStream>>, deadline: Instant) -> CapturedStream {
    let Some(rx) = rx else {
        return CapturedStream::default();
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(captured) => captured,
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("Output collector did not finish before the collection timeout");
            CapturedStream {
                data: Vec::new(),
                integrity: OutputIntegrity::TruncatedByCollectorLimit,
            }
        }
        Err(RecvTimeoutError::Disconnected) => CapturedStream {
            data: Vec::new(),
            integrity: OutputIntegrity::ReadError,
        },
    }
}

fn spawn_collector<R: Read + Send + 'static>(stream: R, limit: usize) -> Receiver<CapturedStream> {
    let (tx, rx) = channel();
    thread::spawn(move || {
        let _ = tx.send(collect_stream(stream, limit));
    });
    rx
}

/// Read a stream to EOF, keeping at most `limit` bytes
fn collect_stream<R: Read>(mut stream: R, limit: usize) -> CapturedStream {
    let mut data = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut integrity = OutputIntegrity::Complete;

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let room = limit.saturating_sub(data.len());
                if n > room {
                    data.extend_from_slice(&chunk[..room]);
                    integrity = OutputIntegrity::TruncatedByCollectorLimit;
                } else {
                    data.extend_from_slice(&chunk[..n]);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                integrity = if e.kind() == std::io::ErrorKind::BrokenPipe {
                    OutputIntegrity::TruncatedByProgramClose
                } else {
                    OutputIntegrity::ReadError
                };
                break;
            }
        }
    }

    CapturedStream { data, integrity }
}
