// P2P message service
// Owns the typed protocol over established peer channels: stamping,
// broadcast/unicast, inbound dispatch, and peer lifecycle events. One reader
// task per attached peer feeds a single event stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::p2p::protocol::{MessagePayload, ProtocolMessage};
use crate::p2p::transport::PeerChannel;

/// Events surfaced to the layer above (the lobby controller).
#[derive(Debug)]
pub enum P2pEvent {
    PeerConnected { peer_id: String },
    PeerDisconnected { peer_id: String },
    /// A well-formed inbound message (anything but `error`).
    Message {
        peer_id: String,
        message: ProtocolMessage,
    },
    /// An `error` payload from the remote side.
    RemoteError {
        peer_id: String,
        code: String,
        message: String,
    },
}

struct PeerHandle {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
}

type PeerMap = Arc<Mutex<HashMap<String, PeerHandle>>>;

// Held only for map access, never across an await
fn lock_peers(peers: &Mutex<HashMap<String, PeerHandle>>) -> std::sync::MutexGuard<'_, HashMap<String, PeerHandle>> {
    peers.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct P2pService {
    local_id: String,
    peers: PeerMap,
    event_tx: mpsc::UnboundedSender<P2pEvent>,
}

impl P2pService {
    pub fn new(local_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<P2pEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                local_id: local_id.into(),
                peers: Arc::new(Mutex::new(HashMap::new())),
                event_tx,
            },
            event_rx,
        )
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Wire an established channel into the dispatch loop. Idempotent:
    /// attaching an already-known peer is a no-op.
    pub fn attach_peer(&self, peer_id: &str, channel: PeerChannel) {
        let mut peers = lock_peers(&self.peers);
        if peers.contains_key(peer_id) {
            debug!("peer {} already attached, ignoring", peer_id);
            return;
        }

        let (outbound, inbound) = channel.into_halves();
        let reader = self.spawn_reader(peer_id.to_string(), inbound);
        peers.insert(peer_id.to_string(), PeerHandle { outbound, reader });
        drop(peers);

        info!("peer {} attached", peer_id);
        let _ = self.event_tx.send(P2pEvent::PeerConnected {
            peer_id: peer_id.to_string(),
        });
    }

    /// Drop a peer's channel and stop its reader.
    pub fn detach_peer(&self, peer_id: &str) {
        let removed = lock_peers(&self.peers).remove(peer_id);
        if let Some(handle) = removed {
            handle.reader.abort();
            info!("peer {} detached", peer_id);
            let _ = self.event_tx.send(P2pEvent::PeerDisconnected {
                peer_id: peer_id.to_string(),
            });
        }
    }

    /// Send a stamped message to every attached peer. Peers whose channel
    /// already closed are skipped; their disconnect is reported by the
    /// reader, not by broadcast.
    pub fn broadcast(&self, payload: MessagePayload) -> Result<(), ChannelError> {
        let bytes = ProtocolMessage::new(self.local_id.clone(), payload).to_bytes()?;
        let peers = lock_peers(&self.peers);
        for (peer_id, handle) in peers.iter() {
            if handle.outbound.send(bytes.clone()).is_err() {
                warn!("broadcast to {} skipped, channel closed", peer_id);
            }
        }
        Ok(())
    }

    /// Send a stamped message to one peer.
    pub fn send_to(&self, peer_id: &str, payload: MessagePayload) -> Result<(), ChannelError> {
        let bytes = ProtocolMessage::new(self.local_id.clone(), payload).to_bytes()?;
        let peers = lock_peers(&self.peers);
        let handle = peers
            .get(peer_id)
            .ok_or_else(|| ChannelError::UnknownPeer(peer_id.to_string()))?;
        handle.outbound.send(bytes).map_err(|_| ChannelError::Closed)
    }

    /// Forward an already-stamped envelope to everyone except its origin.
    /// Used by the host to fan out guest chatter without re-attributing it.
    pub fn relay_except(
        &self,
        except: &str,
        message: &ProtocolMessage,
    ) -> Result<(), ChannelError> {
        let bytes = message.to_bytes()?;
        let peers = lock_peers(&self.peers);
        for (peer_id, handle) in peers.iter() {
            if peer_id == except {
                continue;
            }
            if handle.outbound.send(bytes.clone()).is_err() {
                warn!("relay to {} skipped, channel closed", peer_id);
            }
        }
        Ok(())
    }

    pub fn peer_ids(&self) -> Vec<String> {
        lock_peers(&self.peers).keys().cloned().collect()
    }

    pub fn peer_count(&self) -> usize {
        lock_peers(&self.peers).len()
    }

    /// Tear down every channel and reader synchronously with the call.
    pub fn shutdown(&self) {
        let mut peers = lock_peers(&self.peers);
        for (peer_id, handle) in peers.drain() {
            handle.reader.abort();
            debug!("peer {} dropped on shutdown", peer_id);
        }
    }

    fn spawn_reader(
        &self,
        peer_id: String,
        mut inbound: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> JoinHandle<()> {
        let event_tx = self.event_tx.clone();
        let peers = Arc::clone(&self.peers);

        tokio::spawn(async move {
            while let Some(bytes) = inbound.recv().await {
                match ProtocolMessage::from_bytes(&bytes) {
                    Ok(message) => {
                        if let MessagePayload::Error { code, message: text } = &message.payload {
                            warn!("peer {} reported error {}: {}", peer_id, code, text);
                            let _ = event_tx.send(P2pEvent::RemoteError {
                                peer_id: peer_id.clone(),
                                code: code.clone(),
                                message: text.clone(),
                            });
                        } else {
                            let _ = event_tx.send(P2pEvent::Message {
                                peer_id: peer_id.clone(),
                                message,
                            });
                        }
                    }
                    // Malformed inbound data is dropped, never fatal
                    Err(err) => {
                        warn!("dropping malformed frame from {}: {}", peer_id, err);
                    }
                }
            }

            // Channel closed by the remote side. Whoever removes the map
            // entry reports the disconnect, so duplicates are impossible.
            if lock_peers(&peers).remove(&peer_id).is_some() {
                info!("peer {} disconnected", peer_id);
                let _ = event_tx.send(P2pEvent::PeerDisconnected { peer_id });
            }
        })
    }
}

impl Drop for P2pService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
