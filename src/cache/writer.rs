//! Cache Writer Pool
//!
//! Fixed set of background threads that drain the [`IngestionQueue`] into
//! the [`CacheIndex`] and the durable log.
//!
//! # Design
//!
//! - Each writer loops: dequeue, index, append; the index update for
//!   different records runs in parallel, the append is serialized by the sink
//! - A writer whose append fails logs the error and exits; it is not
//!   respawned, so the pool shrinks for the rest of the process lifetime
//! - Writers exit only once the queue is closed and empty, so joining the
//!   pool after `close` is a graceful drain

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use super::index::CacheIndex;
use super::journal::RecordSink;
use super::metrics::CacheMetrics;
use super::queue::IngestionQueue;
use crate::error::Result;

/// Shared state every writer holds a handle to
#[derive(Clone)]
pub struct WriterContext {
    pub queue: Arc<IngestionQueue>,
    pub index: Arc<CacheIndex>,
    pub sink: Arc<dyn RecordSink>,
    pub metrics: Arc<CacheMetrics>,
}

/// Handles to the running writer threads
pub struct WriterPool {
    handles: Vec<JoinHandle<()>>,
}

impl WriterPool {
    /// Spawn `count` writer threads
    pub fn spawn(count: usize, ctx: WriterContext) -> Result<Self> {
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let worker_ctx = ctx.clone();
            ctx.metrics.record_writer_started();

            let spawned = thread::Builder::new()
                .name(format!("cache-writer-{}", id))
                .spawn(move || writer_main(id, worker_ctx));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    ctx.metrics.record_writer_stopped(true);
                    error!(writer = id, "Could not spawn cache writer: {}", e);
                    Self { handles }.abandon(&ctx.queue);
                    return Err(e.into());
                }
            }
        }

        debug!(writers = count, "Cache writers started");
        Ok(Self { handles })
    }

    /// Number of writer threads spawned
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Check if the pool has no writers
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every writer to exit. Returns the number that panicked.
    ///
    /// Writers only exit once the queue is closed and drained, so close the
    /// queue first or this blocks forever.
    pub fn join(self) -> usize {
        let mut panicked = 0;
        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("cache-writer").to_string();
            if handle.join().is_err() {
                error!(writer = %name, "Cache writer panicked");
                panicked += 1;
            }
        }
        panicked
    }

    /// Close `queue` and wait for the writers already running. Used when the
    /// pool cannot be brought up completely.
    fn abandon(self, queue: &IngestionQueue) -> usize {
        queue.close();
        self.join()
    }
}

/// Decrements the live-writer gauge however the writer exits
struct LiveWriter<'a> {
    metrics: &'a CacheMetrics,
    clean: bool,
}

impl Drop for LiveWriter<'_> {
    fn drop(&mut self) {
        self.metrics.record_writer_stopped(!self.clean);
    }
}

fn writer_main(id: usize, ctx: WriterContext) {
    let mut live = LiveWriter {
        metrics: &ctx.metrics,
        clean: false,
    };

    match drain(&ctx) {
        Ok(persisted) => {
            live.clean = true;
            debug!(writer = id, persisted, "Cache writer drained queue, exiting");
        }
        Err(e) => {
            error!(writer = id, "Cache writer error: {}", e);
            warn!(
                live_writers = ctx.metrics.live_writers().saturating_sub(1),
                "Cache writer will not be replaced"
            );
        }
    }
}

fn drain(ctx: &WriterContext) -> Result<u64> {
    let mut persisted = 0;
    while let Some(food) = ctx.queue.next_pending() {
        ctx.index.store(&food);
        ctx.sink.append(&food)?;
        ctx.metrics.record_persisted();
        persisted += 1;
    }
    Ok(persisted)
}

// =============================================================================
// Tests
// =============================================================================
