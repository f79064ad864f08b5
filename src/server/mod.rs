//! Food Server
//!
//! TCP front end: a single reactor thread multiplexes every client socket and
//! hands complete requests to a pool of worker threads.
//!
//! # Architecture
//!
//! ```text
//!  clients ──TCP──▶ reactor thread (tokio current-thread + LocalSet)
//!                     │  per connection: Readable → Dispatched → Writable
//!                     │
//!                     ├──Job{request, buffer}──▶ crossbeam channel ──▶ M workers
//!                     │                                                  │
//!                     ◀───────────── oneshot(buffer) ────────────────────┘
//! ```

mod connection;
mod pool;
mod reactor;

pub use connection::{ConnectionState, OutputBuffer};
pub use pool::{WorkerPool, DEFAULT_WORKER_THREADS};

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::request::RequestHandler;
use reactor::ReactorSettings;

/// Default listen port
pub const DEFAULT_PORT: u16 = 7777;

/// Default per-connection reply buffer size
pub const DEFAULT_OUTPUT_BUFFER_BYTES: usize = 256 * 1024;

/// Bytes read from a socket per request
pub const READ_BUFFER_BYTES: usize = 512;

const MIN_OUTPUT_BUFFER_BYTES: usize = 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on; port 0 picks a free port
    pub bind_addr: SocketAddr,

    /// Number of request workers
    pub worker_threads: usize,

    /// Reply buffer capacity per connection
    pub output_buffer_bytes: usize,

    /// Maximum request size read in one go
    pub read_buffer_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            worker_threads: DEFAULT_WORKER_THREADS,
            output_buffer_bytes: DEFAULT_OUTPUT_BUFFER_BYTES,
            read_buffer_bytes: READ_BUFFER_BYTES,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config("worker_threads must be at least 1".into()));
        }
        if self.output_buffer_bytes < MIN_OUTPUT_BUFFER_BYTES {
            return Err(Error::Config(format!(
                "output_buffer_bytes must be at least {}",
                MIN_OUTPUT_BUFFER_BYTES
            )));
        }
        if self.read_buffer_bytes == 0 {
            return Err(Error::Config("read_buffer_bytes must be at least 1".into()));
        }
        Ok(())
    }
}

/// A running server
pub struct Server {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    reactor: Option<JoinHandle<()>>,
    workers: Option<WorkerPool>,
}

impl Server {
    /// Bind, start the workers, then start the reactor.
    ///
    /// Returns once the socket is listening; connections are served in the
    /// background until [`Server::shutdown`].
    pub fn start(config: ServerConfig, handler: Arc<RequestHandler>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr)?;
        let local_addr = listener.local_addr()?;

        let workers = WorkerPool::spawn(config.worker_threads, handler)?;
        let dispatcher = workers
            .dispatcher()
            .ok_or_else(|| Error::Internal("worker pool already shut down".into()))?;

        let shutdown = CancellationToken::new();
        let reactor = reactor::spawn(
            listener,
            dispatcher,
            ReactorSettings {
                read_size: config.read_buffer_bytes,
                output_capacity: config.output_buffer_bytes,
            },
            shutdown.clone(),
        )?;

        info!(
            addr = %local_addr,
            workers = config.worker_threads,
            output_buffer = config.output_buffer_bytes,
            "Server started"
        );

        Ok(Self {
            local_addr,
            shutdown,
            reactor: Some(reactor),
            workers: Some(workers),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close every connection, then drain the workers.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.shutdown.cancel();

        if let Some(reactor) = self.reactor.take() {
            if reactor.join().is_err() {
                error!("Reactor thread panicked");
            }
        }
        if let Some(mut workers) = self.workers.take() {
            workers.shutdown();
            info!("Server stopped");
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Tests
// =============================================================================
