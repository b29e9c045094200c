//! Shared Streams
//!
//! Cloneable, lock-guarded handles over the agent's byte streams.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

struct ReaderInner {
    stream: Mutex<Option<Box<dyn Read + Send>>>,
    closed: AtomicBool,
}

/// Concurrency-safe input stream
///
/// Reads after `close` report end-of-stream. Closing while another thread
/// is blocked in `read` marks the stream closed; the blocked reader drops
/// the underlying stream when its read returns.
#[derive(Clone)]
pub struct SharedReader {
    inner: Arc<ReaderInner>,
}

impl SharedReader {
    pub fn new(stream: impl Read + Send + 'static) -> Self {
        Self::from_boxed(Box::new(stream))
    }

    pub fn from_boxed(stream: Box<dyn Read + Send>) -> Self {
        Self {
            inner: Arc::new(ReaderInner {
                stream: Mutex::new(Some(stream)),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Close the stream; later reads see end-of-stream
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(mut stream) = self.inner.stream.try_lock() {
            stream.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }
}

impl Read for SharedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Ok(0);
        }

        let mut guard = self.inner.stream.lock();
        let Some(stream) = guard.as_mut() else {
            return Ok(0);
        };
        let n = stream.read(buf)?;

        // closed while we were blocked
        if self.is_closed() {
            guard.take();
            return Ok(0);
        }
        Ok(n)
    }
}

/// Concurrency-safe output stream
///
/// Writes after `close` fail with `BrokenPipe`.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<Mutex<Option<Box<dyn Write + Send>>>>,
}

impl SharedWriter {
    pub fn new(stream: impl Write + Send + 'static) -> Self {
        Self::from_boxed(Box::new(stream))
    }

    pub fn from_boxed(stream: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(stream))),
        }
    }

    /// Flush and close the stream
    pub fn close(&self) -> io::Result<()> {
        match self.inner.lock().take() {
            Some(mut stream) => stream.flush(),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl Write for SharedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.inner.lock().as_mut() {
            Some(stream) => stream.write(buf),
            None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "stream closed")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.lock().as_mut() {
            Some(stream) => stream.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SharedWriter {
    type Writer = SharedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
