//! Line-delimited TCP transport
//!
//! One JSON event per line in each direction, framed with [`EventCodec`].
//! Useful for terminal clients and load scripts that don't speak WebSocket.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use lp_protocol::{ClientEvent, ConnectionId, EventCodec, ServerEvent};

use crate::coordinator::CoordinatorHandle;

type ServerCodec = EventCodec<ClientEvent, ServerEvent>;

/// TCP listener feeding connections to the coordinator
pub struct TcpTransport {
    coordinator: CoordinatorHandle,
    outbound_capacity: usize,
    shutdown: CancellationToken,
}

impl TcpTransport {
    /// Create a new TCP transport
    pub fn new(
        coordinator: CoordinatorHandle,
        outbound_capacity: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            coordinator,
            outbound_capacity,
            shutdown,
        }
    }

    /// Bind to `address` and serve until shutdown
    pub async fn run(&self, address: &str) -> Result<()> {
        let listener = TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind TCP transport to {}", address))?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!("TCP transport listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("TCP transport shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer_addr)) => {
                            let coordinator = self.coordinator.clone();
                            let capacity = self.outbound_capacity;
                            let shutdown = self.shutdown.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_client(stream, peer_addr, coordinator, capacity, shutdown).await
                                {
                                    tracing::warn!("TCP client {} error: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept TCP connection: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn handle_client(
    stream: TcpStream,
    peer_addr: SocketAddr,
    coordinator: CoordinatorHandle,
    outbound_capacity: usize,
    shutdown: CancellationToken,
) -> Result<()> {
    let id = ConnectionId::generate();
    let (outbound_tx, outbound_rx) = mpsc::channel(outbound_capacity);

    coordinator.connected(id.clone(), outbound_tx).await?;
    tracing::info!("TCP client connected: {} from {}", id, peer_addr);

    let framed = Framed::new(stream, ServerCodec::new());
    let result = pump(framed, outbound_rx, &coordinator, &id, &shutdown).await;

    let _ = coordinator.disconnected(id.clone()).await;
    tracing::info!("TCP client disconnected: {}", id);
    result
}

async fn pump(
    framed: Framed<TcpStream, ServerCodec>,
    mut outbound_rx: mpsc::Receiver<ServerEvent>,
    coordinator: &CoordinatorHandle,
    id: &ConnectionId,
    shutdown: &CancellationToken,
) -> Result<()> {
    let (mut sink, mut stream) = framed.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(event)) => coordinator.client_event(id.clone(), event).await?,
                    Some(Err(e)) => return Err(e.into()),
                    None => break, // EOF
                }
            }
            event = outbound_rx.recv() => {
                match event {
                    Some(event) => sink.send(event).await?,
                    None => break,
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    Ok(())
}
