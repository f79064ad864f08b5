//! Client Connections
//!
//! Per-connection state machine driven on the reactor thread.
//!
//! # Design
//!
//! - A connection is always in exactly one [`ConnectionState`]:
//!   `Readable -> Dispatched -> Writable -> Readable ...` until `Closed`
//! - At most one request per connection is in flight; the socket is not
//!   read again until the reply has been written
//! - The [`OutputBuffer`] travels with the request: it is moved into the
//!   worker job and comes back through a one-shot channel

use std::net::SocketAddr;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::pool::{Dispatcher, Job};
use crate::error::{Error, Result};
use crate::request::{Response, TOO_LARGE_BYTES};

// =============================================================================
// Output Buffer
// =============================================================================

/// Fixed-capacity reply buffer owned by one connection
#[derive(Debug)]
pub struct OutputBuffer {
    bytes: BytesMut,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace the contents with `response` and its trailing newline.
    ///
    /// Fails with [`Error::ResultTooLarge`] if the reply does not fit; the
    /// buffer is left empty in that case.
    pub fn fill(&mut self, response: &Response) -> Result<()> {
        self.bytes.clear();
        let rendered = response.to_bytes()?;
        if rendered.len() > self.capacity {
            return Err(Error::ResultTooLarge {
                size: rendered.len(),
                capacity: self.capacity,
            });
        }
        self.bytes.put_slice(&rendered);
        Ok(())
    }

    /// Fill with `response`, or with the "too big" reply if it does not fit
    pub fn fill_or_too_large(&mut self, response: &Response) {
        if let Err(e) = self.fill(response) {
            debug!("Replacing reply: {}", e);
            self.bytes.clear();
            self.bytes.put_slice(&TOO_LARGE_BYTES);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// =============================================================================
// Connection State Machine
// =============================================================================

/// Where a connection is in its request/reply cycle
#[derive(Debug)]
pub enum ConnectionState {
    /// Waiting for the next request; owns the idle output buffer
    Readable(OutputBuffer),
    /// A worker owns the buffer; the reply arrives on the receiver
    Dispatched(oneshot::Receiver<OutputBuffer>),
    /// Reply ready to be written
    Writable(OutputBuffer),
    Closed,
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, ConnectionState::Closed)
    }
}

pub(crate) struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Dispatcher,
    read_size: usize,
}

impl Connection {
    /// Accept a fresh stream; the returned state is where driving starts
    pub(crate) fn accept(
        stream: TcpStream,
        peer: SocketAddr,
        dispatcher: Dispatcher,
        read_size: usize,
        output_capacity: usize,
    ) -> (Self, ConnectionState) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer, "Could not disable Nagle: {}", e);
        }
        let connection = Self {
            stream,
            peer,
            dispatcher,
            read_size,
        };
        (connection, ConnectionState::Readable(OutputBuffer::new(output_capacity)))
    }

    /// Drive the connection until the peer leaves or shutdown is signalled
    pub(crate) async fn run(mut self, mut state: ConnectionState, shutdown: CancellationToken) {
        debug!(peer = %self.peer, "Connection opened");

        while !state.is_closed() {
            state = tokio::select! {
                _ = shutdown.cancelled() => ConnectionState::Closed,
                next = self.step(state) => next,
            };
        }

        debug!(peer = %self.peer, "Connection closed");
    }

    async fn step(&mut self, state: ConnectionState) -> ConnectionState {
        match state {
            ConnectionState::Readable(buffer) => self.read(buffer).await,
            ConnectionState::Dispatched(reply) => match reply.await {
                Ok(buffer) => ConnectionState::Writable(buffer),
                Err(_) => {
                    warn!(peer = %self.peer, "Worker dropped the reply");
                    ConnectionState::Closed
                }
            },
            ConnectionState::Writable(mut buffer) => {
                match self.stream.write_all(buffer.as_bytes()).await {
                    Ok(()) => {
                        buffer.clear();
                        ConnectionState::Readable(buffer)
                    }
                    Err(e) => {
                        debug!(peer = %self.peer, "Write failed: {}", e);
                        ConnectionState::Closed
                    }
                }
            }
            ConnectionState::Closed => ConnectionState::Closed,
        }
    }

    async fn read(&mut self, buffer: OutputBuffer) -> ConnectionState {
        let mut request = BytesMut::zeroed(self.read_size);

        match self.stream.read(&mut request[..]).await {
            Ok(0) => ConnectionState::Closed,
            Ok(n) => {
                debug!(peer = %self.peer, bytes = n, "Request received");
                request.truncate(n);
                self.dispatch(request.freeze(), buffer)
            }
            Err(e) => {
                debug!(peer = %self.peer, "Read failed: {}", e);
                ConnectionState::Closed
            }
        }
    }

    fn dispatch(&self, request: Bytes, buffer: OutputBuffer) -> ConnectionState {
        let (reply, receiver) = oneshot::channel();
        let job = Job {
            request,
            buffer,
            reply,
        };

        match self.dispatcher.dispatch(job) {
            Ok(()) => ConnectionState::Dispatched(receiver),
            Err(_) => {
                warn!(peer = %self.peer, "Worker pool is gone, dropping connection");
                ConnectionState::Closed
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Food;
    use crate::request::TOO_LARGE_MESSAGE;
    use assert_matches::assert_matches;

    #[test]
    fn test_fill_appends_newline() {
        let mut buffer = OutputBuffer::new(1024);
        buffer.fill(&Response::not_found()).unwrap();

        assert_eq!(buffer.as_bytes().last(), Some(&b'\n'));
        assert_eq!(buffer.as_bytes().iter().filter(|b| **b == b'\n').count(), 1);
    }

    #[test]
    fn test_fill_replaces_previous_contents() {
        let mut buffer = OutputBuffer::new(1024);
        buffer.fill(&Response::server_error()).unwrap();
        buffer.fill(&Response::ok_food(Food::new(1))).unwrap();

        assert_eq!(buffer.as_bytes(), b"{\"status\":\"OK\",\"food\":{\"fdcId\":1}}\n");
    }

    #[test]
    fn test_oversized_reply_is_rejected() {
        let mut buffer = OutputBuffer::new(64);
        let foods = (0..100).map(|id| Food::new(id).with_description("x".repeat(10))).collect();

        assert_matches!(
            buffer.fill(&Response::ok_foods(foods)),
            Err(Error::ResultTooLarge { capacity: 64, .. })
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_fill_or_too_large_substitutes_error() {
        let mut buffer = OutputBuffer::new(64);
        let foods = (0..100).map(Food::new).collect();
        buffer.fill_or_too_large(&Response::ok_foods(foods));

        let reply = Response::from_bytes(buffer.as_bytes()).unwrap();
        assert_eq!(reply.message.as_deref(), Some(TOO_LARGE_MESSAGE));
    }

    #[test]
    fn test_exact_fit_is_accepted() {
        let reply = Response::not_found();
        let size = reply.to_bytes().unwrap().len();

        let mut buffer = OutputBuffer::new(size);
        buffer.fill(&reply).unwrap();
        assert_eq!(buffer.len(), size);
        assert_eq!(buffer.capacity(), size);
    }
}
