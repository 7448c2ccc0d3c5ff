//! Serialized human-facing output shared by all workers

use parking_lot::Mutex;
use std::fmt::Display;
use std::io::Write;
use std::sync::Arc;

/// Line-oriented output behind one lock.
///
/// Every line is written and flushed while the lock is held, so lines from
/// concurrent workers never interleave.
#[derive(Clone)]
pub struct ProgressSink {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

impl ProgressSink {
    /// Sink writing to any writer
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Sink writing to stdout
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }

    /// Sink that discards everything
    #[must_use]
    pub fn discard() -> Self {
        Self::new(std::io::sink())
    }

    /// Write one line.
    ///
    /// Blocks the calling thread, runtime worker threads included, until the
    /// line is flushed; a stalled consumer stalls the workers that print.
    pub fn line(&self, message: impl Display) {
        let mut out = self.out.lock();
        if let Err(e) = writeln!(out, "{message}").and_then(|()| out.flush()) {
            tracing::debug!(error = %e, "Failed to write progress line");
        }
    }

    /// Timestamped progress line for one worker
    pub fn batches_imported(&self, worker_id: u64, batches: u64) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        self.line(format!(
            "{now} Have imported {batches} batches for worker {worker_id}."
        ));
    }
}

/// Writer handing out clones of one in-memory buffer; lets callers read back
/// what a [`ProgressSink`] produced
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Empty buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    #[must_use]
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock()).into_owned()
    }

    /// Written lines
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
