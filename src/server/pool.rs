//! Request Worker Pool
//!
//! Fixed set of threads that run request jobs off the reactor thread.
//!
//! # Design
//!
//! - Jobs travel over an unbounded crossbeam channel; workers exit once every
//!   sender is gone and the channel is drained
//! - A panicking request is answered with a server error so the worker and
//!   the connection both survive

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use crossbeam::channel::{unbounded, Receiver, SendError, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error};

use super::connection::OutputBuffer;
use crate::error::Result;
use crate::request::{RequestHandler, Response};

/// Default number of request workers
pub const DEFAULT_WORKER_THREADS: usize = 9;

/// One request in flight, together with the buffer its reply goes into
pub(crate) struct Job {
    pub(crate) request: Bytes,
    pub(crate) buffer: OutputBuffer,
    pub(crate) reply: oneshot::Sender<OutputBuffer>,
}

/// Cloneable handle for submitting jobs
#[derive(Clone)]
pub(crate) struct Dispatcher {
    sender: Sender<Job>,
}

impl Dispatcher {
    /// Hand a job to the pool; gives it back if every worker is gone
    pub(crate) fn dispatch(&self, job: Job) -> std::result::Result<(), Job> {
        self.sender.send(job).map_err(|SendError(job)| job)
    }
}

/// Request worker threads
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers sharing `handler`
    pub fn spawn(count: usize, handler: Arc<RequestHandler>) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let mut handles = Vec::with_capacity(count);

        for id in 0..count {
            let receiver = receiver.clone();
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("request-worker-{}", id))
                .spawn(move || worker_main(id, receiver, handler))?;
            handles.push(handle);
        }

        debug!(workers = count, "Request workers started");
        Ok(Self {
            sender: Some(sender),
            handles,
        })
    }

    pub(crate) fn dispatcher(&self) -> Option<Dispatcher> {
        self.sender.as_ref().map(|sender| Dispatcher {
            sender: sender.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Drop the pool's sender and wait for the workers to finish.
    ///
    /// Workers keep running while any [`Dispatcher`] is alive, so the reactor
    /// must be stopped first.
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                error!("Request worker panicked outside a request");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_main(id: usize, jobs: Receiver<Job>, handler: Arc<RequestHandler>) {
    for job in jobs.iter() {
        run_job(&handler, job);
    }
    debug!(worker = id, "Request worker exiting");
}

fn run_job(handler: &RequestHandler, job: Job) {
    let Job {
        request,
        mut buffer,
        reply,
    } = job;

    let response = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(&request)))
        .unwrap_or_else(|_| {
            error!("Request handler panicked");
            Response::server_error()
        });

    buffer.fill_or_too_large(&response);

    // The connection may already be gone
    let _ = reply.send(buffer);
}

// =============================================================================
// Tests
// =============================================================================
