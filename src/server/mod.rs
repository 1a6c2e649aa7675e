//! Async WebSocket relay server using Tokio.
//!
//! Accepts TCP connections, upgrades them to WebSocket and hands each one to
//! [`realtime::serve`](crate::realtime::serve). The eviction sweeper runs
//! alongside the accept loop for as long as the server does.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, error, info, warn};

use crate::background::Sweeper;
use crate::config::{ConfigError, RelayConfig};
use crate::dispatcher::Dispatcher;
use crate::realtime;
use crate::registry::{ChannelId, Registry};

/// Pause after a failed `accept()` so a persistent error such as `EMFILE`
/// does not spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// The relay server.
///
/// Owns the listener and the shared [`Registry`]; every accepted connection
/// is served on its own Tokio task.
///
/// # Examples
///
/// ```rust,no_run
/// use rtrelay::config::RelayConfig;
/// use rtrelay::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = Server::bind(RelayConfig::default()).await?;
///     println!("Listening on ws://{}", server.local_addr());
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: RelayConfig,
    registry: Arc<Registry>,
    next_channel_id: AtomicU64,
    connection_limit: Option<Arc<Semaphore>>,
}

impl Server {
    /// Validates `config` and binds to its address.
    ///
    /// # Errors
    ///
    /// - [`ServerError::Config`] if the configuration is invalid.
    /// - [`ServerError::Bind`] if the address cannot be bound
    ///   (e.g. port already in use, insufficient permissions).
    pub async fn bind(config: RelayConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: config.bind_addr,
                source: e,
            })?;
        let local_addr = listener.local_addr()?;

        let connection_limit = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Ok(Self {
            listener,
            local_addr,
            config,
            registry: Arc::new(Registry::new()),
            next_channel_id: AtomicU64::new(1),
            connection_limit,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the registry shared by every connection.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Accepts connections until the process exits.
    ///
    /// # Errors
    ///
    /// Accept failures are logged and retried, so this only returns on a
    /// fatal listener error.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Accepts connections until `shutdown` resolves, then stops the sweeper.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(address = %self.local_addr, "rtrelay listening");

        let dispatcher = Dispatcher::new(Arc::clone(&self.registry));
        let sweeper = Sweeper::from_config(Arc::clone(&self.registry), &self.config).spawn();

        let result = tokio::select! {
            _ = shutdown => {
                info!("shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&dispatcher) => result,
        };

        sweeper.abort();
        result
    }

    async fn accept_loop(&self, dispatcher: &Dispatcher) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => self.handle_connection(stream, peer_addr, dispatcher),
                Err(e) => accept_failed(&e).await,
            }
        }
    }

    fn handle_connection(&self, stream: TcpStream, peer_addr: SocketAddr, dispatcher: &Dispatcher) {
        let permit = match &self.connection_limit {
            Some(limit) => match Arc::clone(limit).try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    warn!(peer = %peer_addr, "connection rejected: limit reached");
                    return;
                }
            },
            None => None,
        };

        let channel_id = ChannelId::new(self.next_channel_id.fetch_add(1, Ordering::Relaxed));
        debug!(peer = %peer_addr, channel = %channel_id, "connection accepted");

        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %peer_addr, error = %e, "failed to set TCP_NODELAY");
        }

        let ws_config = self.websocket_config();
        let dispatcher = dispatcher.clone();

        tokio::spawn(async move {
            let _permit = permit;
            match tokio_tungstenite::accept_async_with_config(stream, Some(ws_config)).await {
                Ok(ws) => realtime::serve(ws, peer_addr, channel_id, dispatcher).await,
                Err(e) => {
                    warn!(peer = %peer_addr, error = %e, "websocket handshake failed");
                }
            }
        });
    }

    fn websocket_config(&self) -> WebSocketConfig {
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(self.config.max_frame_size);
        ws_config.max_frame_size = Some(self.config.max_frame_size);
        ws_config
    }
}

/// Logs a failed `accept()` and waits [`ACCEPT_BACKOFF`] before the next one.
async fn accept_failed(e: &std::io::Error) {
    error!(
        error = %e,
        backoff_ms = ACCEPT_BACKOFF.as_millis() as u64,
        "failed to accept connection"
    );
    tokio::time::sleep(ACCEPT_BACKOFF).await;
}
