//! Agent Module
//!
//! The protocol engine that connects the client's streams to the store.
//!
//! ## Responsibilities
//! - Resolve the codec and wrap the raw streams
//! - Decode requests in arrival order and hand them to the store
//! - Encode responses and pushes under one write lock
//! - Shut down exactly once, in a fixed order

use std::io::{self, BufReader, BufWriter, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam::channel::{self, Receiver, Sender};
use crossbeam::sync::WaitGroup;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, BUILD_ERROR_ENV};
use crate::error::{AgentError, Result};
use crate::ipc::{SharedReader, SharedWriter};
use crate::protocol::{AgentRequest, AgentResponse, CodecRegistry, Format};
use crate::store::{
    ActionRegistry, EnvStatus, Reducer, Shutdown, Started, StatusDedup, Store, ViewSync,
};

/// The agent side of the IPC protocol
///
/// ## Concurrency Model
///
/// - **Reads**: one decode loop, on the thread that calls `run`. Requests
///   are decoded and handed to the store strictly in arrival order.
/// - **Writes**: any thread may publish a state; encode + flush happen
///   under `output` so messages never interleave.
/// - **Shutdown**: runs on whichever thread triggers it first; later
///   triggers return immediately once it has finished.
pub struct Agent {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    format: Format,

    stdin: SharedReader,
    stdout: SharedWriter,
    stderr: SharedWriter,

    /// Decoder side; only the decode loop touches it
    input: Mutex<BufReader<SharedReader>>,

    /// Encoder side; the engine-wide write lock
    output: Mutex<BufWriter<SharedWriter>>,

    store: Store,
    actions: ActionRegistry,

    /// Pending-work counter; taken when shutdown starts
    pending: Mutex<Option<WaitGroup>>,

    /// One-shot shutdown flag
    closed: Mutex<bool>,

    /// Dropped when shutdown completes
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

impl Agent {
    /// Create an agent from `config`
    ///
    /// An invalid codec name falls back to the default codec and the error
    /// is returned next to the agent; the agent is always usable.
    pub fn new(config: AgentConfig) -> (Self, Option<AgentError>) {
        let AgentConfig {
            agent_name,
            codec,
            stdin,
            stdout,
            stderr,
            actions,
            reducers,
        } = config;

        let (format, codec_err) = CodecRegistry::standard().resolve(&codec);

        let stdin = SharedReader::from_boxed(stdin.unwrap_or_else(|| Box::new(io::stdin())));
        let stdout = SharedWriter::from_boxed(stdout.unwrap_or_else(|| Box::new(io::stdout())));
        let stderr = SharedWriter::from_boxed(stderr.unwrap_or_else(|| Box::new(io::stderr())));

        let mut uses = reducers;
        if let Some(message) = std::env::var(BUILD_ERROR_ENV).ok().filter(|e| !e.is_empty()) {
            uses.push(Arc::new(EnvStatus::new(message)));
        }

        let (done_tx, done_rx) = channel::bounded(0);

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let store = Store::new(
                &agent_name,
                Box::new(move |res| {
                    if let Some(inner) = weak.upgrade() {
                        Inner::listen(&inner, res);
                    }
                }),
            )
            .before(default_before())
            .use_reducers(uses)
            .after(default_after());

            Inner {
                input: Mutex::new(BufReader::new(stdin.clone())),
                output: Mutex::new(BufWriter::new(stdout.clone())),
                name: agent_name,
                format,
                stdin,
                stdout,
                stderr,
                store,
                actions,
                pending: Mutex::new(Some(WaitGroup::new())),
                closed: Mutex::new(false),
                done_tx: Mutex::new(Some(done_tx)),
                done_rx,
            }
        });

        (Self { inner }, codec_err)
    }

    /// Serve requests until the input stream ends
    ///
    /// Returns `Ok(())` on a clean end-of-stream and `AgentError::Decode`
    /// for malformed input. Shutdown has completed when this returns, on
    /// every exit path.
    pub fn run(&self) -> Result<()> {
        let _shutdown = ShutdownGuard(&self.inner);
        self.inner.communicate()
    }

    /// Shut the agent down; safe to call any number of times
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// A receiver that disconnects once shutdown completes
    pub fn done(&self) -> Receiver<()> {
        self.inner.done_rx.clone()
    }

    /// True once shutdown has started
    pub fn is_shut_down(&self) -> bool {
        *self.inner.closed.lock()
    }

    /// Publish `res` to the client
    pub fn send(&self, res: &AgentResponse) -> Result<()> {
        self.inner.send(res)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn format(&self) -> Format {
        self.inner.format
    }

    pub fn store(&self) -> &Store {
        &self.inner.store
    }

    /// Writer over the configured log stream, usable with `tracing_subscriber`
    pub fn log_writer(&self) -> SharedWriter {
        self.inner.stderr.clone()
    }
}

impl Inner {
    fn communicate(&self) -> Result<()> {
        info!(agent = %self.name, codec = %self.format, "started");
        self.store.dispatch(Arc::new(Started));
        self.store.ready();

        let mut input = self.input.lock();
        loop {
            let mut rq = match self.format.decode_request(&mut *input)? {
                Some(rq) => rq,
                None => {
                    debug!("input stream ended");
                    return Ok(());
                }
            };

            rq.props.finalize(&self.name, self.store.session());
            self.handle_request(&rq);
        }
    }

    fn handle_request(&self, rq: &AgentRequest) {
        let Some(_pending) = self.pending.lock().clone() else {
            warn!(cookie = %rq.cookie, "shutting down, request dropped");
            return;
        };

        // The store serializes updates, so requests apply in decode order.
        debug!(cookie = %rq.cookie, actions = rq.actions.len(), "handling request");
        self.store.sync_request(rq, &self.actions);
    }

    /// Store listener: send, and shut down off-thread if that fails
    fn listen(inner: &Arc<Inner>, res: AgentResponse) {
        if let Err(e) = inner.send(&res) {
            error!(error = %e, "agent.send failed. shutting down ipc");
            let inner = Arc::clone(inner);
            thread::spawn(move || inner.shutdown());
        }
    }

    fn send(&self, res: &AgentResponse) -> Result<()> {
        let mut output = self.output.lock();

        let encoded = self.format.encode(&mut *output, &res.project());
        let flushed = output.flush();

        encoded?;
        flushed?;
        Ok(())
    }

    /// Shutdown sequence:
    /// 1. stop incoming requests
    /// 2. wait for all requests to complete
    /// 3. tell the store we're shutting down
    /// 4. stop outgoing responses
    /// 5. tell the world we're done
    fn shutdown(&self) {
        let mut closed = self.closed.lock();
        if *closed {
            return;
        }
        *closed = true;

        info!("shutting down");

        step("close input", || self.stdin.close());

        step("wait for requests", || {
            let pending = self.pending.lock().take();
            if let Some(wg) = pending {
                wg.wait();
            }
        });

        step("dispatch shutdown", || self.store.dispatch(Arc::new(Shutdown)));

        step("close output", || {
            let mut output = self.output.lock();
            if let Err(e) = output.flush() {
                warn!(error = %e, "flush before close failed");
            }
            if let Err(e) = self.stdout.close() {
                warn!(error = %e, "close output failed");
            }
        });

        step("signal done", || drop(self.done_tx.lock().take()));

        info!("shut down");
    }
}

/// Run one shutdown step; a panic is logged and the sequence continues
fn step(name: &str, f: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(f)).is_err() {
        error!(step = name, "shutdown step panicked");
    }
}

/// Shuts the agent down when `run` returns, by any path
struct ShutdownGuard<'a>(&'a Inner);

impl Drop for ShutdownGuard<'_> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

fn default_before() -> Vec<Arc<dyn Reducer>> {
    vec![Arc::new(ViewSync)]
}

fn default_after() -> Vec<Arc<dyn Reducer>> {
    vec![Arc::new(StatusDedup)]
}
