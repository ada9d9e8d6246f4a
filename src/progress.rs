// Byte counting reader that reports progress to an injected sink.
//
// The reader never buffers: every `read` is forwarded to the wrapped
// source and whatever it returned is counted. How the progress is shown
// (and how often it is repainted) is up to the sink.

use std::io::{self, Read};

/// Cumulative progress of one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    /// Expected size of the stream, `0` when unknown.
    pub total_size: u64,
    /// Bytes read from the stream so far.
    pub bytes_so_far: u64,
}

impl ProgressState {
    pub fn new(total_size: u64) -> Self {
        Self {
            total_size,
            bytes_so_far: 0,
        }
    }

    /// Percentage done, or `None` when the total is unknown.
    ///
    /// Capped at 100 in case the source yields more than announced.
    pub fn percentage(&self) -> Option<f64> {
        if self.total_size == 0 {
            return None;
        }
        let pct = self.bytes_so_far as f64 / self.total_size as f64 * 100.0;
        Some(pct.min(100.0))
    }
}

/// Wraps a reader and calls `sink` with the running [`ProgressState`]
/// after every successful read, as long as the total size is known.
pub struct ProgressReader<R, F> {
    inner: R,
    state: ProgressState,
    sink: F,
}

impl<R, F> ProgressReader<R, F>
where
    R: Read,
    F: FnMut(&ProgressState),
{
    pub fn new(inner: R, total_size: u64, sink: F) -> Self {
        Self {
            inner,
            state: ProgressState::new(total_size),
            sink,
        }
    }

    pub fn state(&self) -> ProgressState {
        self.state
    }

    pub fn bytes_read(&self) -> u64 {
        self.state.bytes_so_far
    }
}

impl<R, F> Read for ProgressReader<R, F>
where
    R: Read,
    F: FnMut(&ProgressState),
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.state.bytes_so_far += n as u64;
        if self.state.total_size > 0 {
            (self.sink)(&self.state);
        }
        Ok(n)
    }
}
