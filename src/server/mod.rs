//! HTTP front end for the cache.
//!
//! A small hyper 1.x HTTP/1 server. Every connection gets its own task;
//! requests are routed by [`handler::respond`].

pub mod handler;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::core::facade::CacheFacade;
use crate::error::{AgdashError, Result};

pub use handler::AppState;

/// Server tuning knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerOptions {
    /// Give up on a request that waits for the metrics source after this long.
    pub request_timeout: Option<Duration>,
}

/// A bound, not yet running, HTTP server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    ///
    /// Returns [`AgdashError::Bind`] if the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        facade: Arc<CacheFacade>,
        options: ServerOptions,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AgdashError::Bind {
                addr: addr.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            listener,
            state: Arc::new(AppState::new(facade, options)),
        })
    }

    /// The address actually bound (useful with port 0).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to `true` or its sender drops.
    ///
    /// Connections already accepted finish on their own tasks.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if accepting fails.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "Dashboard API listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };
                    let io = TokioIo::new(stream);
                    let state = Arc::clone(&self.state);

                    tokio::spawn(async move {
                        let service = service_fn(move |req: Request<Incoming>| {
                            let state = Arc::clone(&state);
                            async move { handler::handle(req, state).await }
                        });

                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            tracing::debug!(%peer, error = %e, "Connection closed with error");
                        }
                    });
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(%addr, "Dashboard API stopped");
        Ok(())
    }
}
