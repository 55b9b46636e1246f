//! Plain TCP stand-in for the anonymizing overlay transport, used by the
//! seed/peer processes on the test network. Envelopes travel as
//! newline-delimited JSON; a connection is attributed to the peer address
//! its envelopes carry as sender.

use async_trait::async_trait;
use bazaar_network::{Envelope, LifecycleEvent, Transport};
use bazaar_types::{BazaarError, NodeAddress, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{tcp::OwnedWriteHalf, TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

pub struct TcpTransport {
    local: NodeAddress,
    peers: RwLock<HashMap<NodeAddress, mpsc::UnboundedSender<Envelope>>>,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    lifecycle_tx: mpsc::UnboundedSender<LifecycleEvent>,
    max_connections: usize,
}

impl TcpTransport {
    /// Bind the listen address (port 0 picks a free port) and start
    /// accepting connections.
    pub async fn bind(
        listen: &NodeAddress,
        max_connections: usize,
    ) -> anyhow::Result<(
        Arc<Self>,
        mpsc::UnboundedReceiver<Envelope>,
        mpsc::UnboundedReceiver<LifecycleEvent>,
    )> {
        let listener = TcpListener::bind((listen.host_name.as_str(), listen.port)).await?;
        let local = NodeAddress::new(listen.host_name.clone(), listener.local_addr()?.port());

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (lifecycle_tx, lifecycle_rx) = mpsc::unbounded_channel();

        let transport = Arc::new(Self {
            local: local.clone(),
            peers: RwLock::new(HashMap::new()),
            inbound_tx,
            lifecycle_tx,
            max_connections,
        });

        // The socket stack is up; our address is now reachable.
        transport.notify(LifecycleEvent::TorNodeReady);

        let accept_transport = Arc::clone(&transport);
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        let connected = accept_transport.peers.read().await.len();
                        if connected >= accept_transport.max_connections {
                            warn!(remote = %remote, "Connection limit reached, rejecting");
                            continue;
                        }
                        debug!(remote = %remote, "Inbound connection");
                        accept_transport.clone().handle_connection(stream, None).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                    }
                }
            }
        });

        info!(address = %local, "Listening");
        transport.notify(LifecycleEvent::HiddenServicePublished);
        Ok((transport, inbound_rx, lifecycle_rx))
    }

    /// Dial a peer and keep the connection for later sends.
    pub async fn connect(self: &Arc<Self>, peer: &NodeAddress) -> anyhow::Result<()> {
        let stream = TcpStream::connect((peer.host_name.as_str(), peer.port)).await?;
        info!(peer = %peer, "Connected");
        self.clone().handle_connection(stream, Some(peer.clone())).await;
        Ok(())
    }

    /// Push a lifecycle event to whoever consumes the channel.
    pub fn notify(&self, event: LifecycleEvent) {
        let _ = self.lifecycle_tx.send(event);
    }

    async fn handle_connection(self: Arc<Self>, stream: TcpStream, peer: Option<NodeAddress>) {
        let (read_half, write_half) = stream.into_split();
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        if let Some(addr) = &peer {
            self.peers.write().await.insert(addr.clone(), write_tx.clone());
        }

        tokio::spawn(write_loop(write_half, write_rx));

        let transport = Arc::clone(&self);
        tokio::spawn(async move {
            let mut lines = BufReader::new(read_half).lines();
            let mut registered = peer;

            while let Ok(Some(line)) = lines.next_line().await {
                let envelope: Envelope = match serde_json::from_str(&line) {
                    Ok(env) => env,
                    Err(e) => {
                        warn!(error = %e, "Malformed envelope, dropping connection");
                        break;
                    }
                };

                // Attribute the connection to the first sender we see on it.
                if registered.is_none() {
                    let sender = envelope.sender.clone();
                    transport
                        .peers
                        .write()
                        .await
                        .insert(sender.clone(), write_tx.clone());
                    registered = Some(sender);
                }

                if transport.inbound_tx.send(envelope).is_err() {
                    break;
                }
            }

            if let Some(addr) = registered {
                debug!(peer = %addr, "Peer disconnected");
                transport.peers.write().await.remove(&addr);
            }
        });
    }
}

async fn write_loop(mut write_half: OwnedWriteHalf, mut rx: mpsc::UnboundedReceiver<Envelope>) {
    while let Some(envelope) = rx.recv().await {
        let mut line = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "Envelope serialization failed");
                continue;
            }
        };
        line.push('\n');
        if write_half.write_all(line.as_bytes()).await.is_err() {
            break;
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_address(&self) -> NodeAddress {
        self.local.clone()
    }

    async fn connected_peers(&self) -> Vec<NodeAddress> {
        self.peers.read().await.keys().cloned().collect()
    }

    async fn send(&self, peer: &NodeAddress, envelope: Envelope) -> Result<()> {
        let peers = self.peers.read().await;
        let tx = peers
            .get(peer)
            .ok_or_else(|| BazaarError::Network(format!("peer {} not connected", peer)))?;
        tx.send(envelope)
            .map_err(|_| BazaarError::Network(format!("connection to {} closed", peer)))
    }
}
