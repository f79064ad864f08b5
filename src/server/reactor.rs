//! Socket Reactor
//!
//! One dedicated thread owns every client socket. It runs a current-thread
//! tokio runtime with a `LocalSet`, so all connection tasks are polled on
//! that one thread and readiness waits never block a worker.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::connection::Connection;
use super::pool::Dispatcher;
use crate::error::Result;

// Pause after a failed accept (e.g. descriptor exhaustion) before retrying
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ReactorSettings {
    pub(crate) read_size: usize,
    pub(crate) output_capacity: usize,
}

/// Start the reactor thread over an already bound listener
pub(crate) fn spawn(
    listener: std::net::TcpListener,
    dispatcher: Dispatcher,
    settings: ReactorSettings,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    listener.set_nonblocking(true)?;
    let runtime = Builder::new_current_thread().enable_all().build()?;

    let handle = thread::Builder::new()
        .name("reactor".into())
        .spawn(move || reactor_main(runtime, listener, dispatcher, settings, shutdown))?;
    Ok(handle)
}

fn reactor_main(
    runtime: Runtime,
    listener: std::net::TcpListener,
    dispatcher: Dispatcher,
    settings: ReactorSettings,
    shutdown: CancellationToken,
) {
    let local = LocalSet::new();
    let outcome = local.block_on(
        &runtime,
        accept_loop(listener, dispatcher, settings, shutdown),
    );

    match outcome {
        Ok(()) => info!("Reactor stopped"),
        Err(e) => error!("Reactor failed: {}", e),
    }
}

async fn accept_loop(
    listener: std::net::TcpListener,
    dispatcher: Dispatcher,
    settings: ReactorSettings,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::from_std(listener)?;
    info!(addr = %listener.local_addr()?, "Reactor accepting connections");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let (connection, state) = Connection::accept(
                        stream,
                        peer,
                        dispatcher.clone(),
                        settings.read_size,
                        settings.output_capacity,
                    );
                    tokio::task::spawn_local(connection.run(state, shutdown.clone()));
                }
                Err(e) => {
                    warn!("Accept failed: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    debug!("Accept loop exiting");
    Ok(())
}
