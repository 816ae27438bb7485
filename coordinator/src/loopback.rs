//! In-memory transport double for tests and the sandbox harness
//!
//! Consumes the coordinator's transport commands and answers them from
//! per-peer scripts, without any real networking. Requests and
//! fire-and-forget sends are recorded so tests can assert on exactly
//! what crossed the boundary.

use crate::transport::{TransportCmd, TransportHandle};
use log::debug;
use shared::{Packet, PeerId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// How a scripted peer answers `AssignZone` offers.
#[derive(Debug, Clone)]
pub enum PeerScript {
    /// Accept every offer with this public address. An empty string
    /// makes the coordinator synthesize one from the connection address.
    Accept(String),
    /// Accept, but only after sitting on the offer for a while. Keeps
    /// the handshake observably in flight.
    AcceptAfter(Duration, String),
    /// Deny every offer with this reason.
    Deny(String),
    /// Never answer; the offer runs into the request timeout.
    Ignore,
}

#[derive(Default)]
struct Shared {
    scripts: HashMap<PeerId, PeerScript>,
    requests: Vec<(PeerId, Packet)>,
    sent: HashMap<PeerId, Vec<Packet>>,
}

fn locked(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Routes coordinator traffic to scripted in-process peers, standing in
/// for the real transport at the channel boundary.
pub struct LoopbackTransport {
    shared: Arc<Mutex<Shared>>,
    handle: TransportHandle,
}

impl LoopbackTransport {
    pub fn start(request_timeout: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Mutex::new(Shared::default()));

        tokio::spawn(run(rx, Arc::clone(&shared)));

        Self {
            shared,
            handle: TransportHandle::new(tx, request_timeout),
        }
    }

    pub fn handle(&self) -> TransportHandle {
        self.handle.clone()
    }

    /// Registers (or replaces) the script a peer answers offers with.
    pub fn set_script(&self, peer: PeerId, script: PeerScript) {
        locked(&self.shared).scripts.insert(peer, script);
    }

    /// Forgets a peer; its pending and future requests fail as dropped.
    pub fn drop_peer(&self, peer: PeerId) {
        locked(&self.shared).scripts.remove(&peer);
    }

    /// Every request dispatched so far, in arrival order.
    pub fn requests(&self) -> Vec<(PeerId, Packet)> {
        locked(&self.shared).requests.clone()
    }

    /// Fire-and-forget packets delivered to `peer` so far.
    pub fn sent_to(&self, peer: PeerId) -> Vec<Packet> {
        locked(&self.shared)
            .sent
            .get(&peer)
            .cloned()
            .unwrap_or_default()
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<TransportCmd>, shared: Arc<Mutex<Shared>>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            TransportCmd::Request {
                peer,
                packet,
                reply,
            } => {
                let script = {
                    let mut guard = locked(&shared);
                    guard.requests.push((peer, packet.clone()));
                    guard.scripts.get(&peer).cloned()
                };

                match (script, packet) {
                    (Some(PeerScript::Accept(public_addr)), Packet::AssignZone { zone }) => {
                        debug!("Loopback peer {} accepting zone {}", peer, zone.id);
                        let _ = reply.send(Ok(Packet::AssignZoneAck { public_addr }));
                    }
                    (Some(PeerScript::AcceptAfter(delay, public_addr)), Packet::AssignZone { zone }) => {
                        debug!("Loopback peer {} accepting zone {} after {:?}", peer, zone.id, delay);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = reply.send(Ok(Packet::AssignZoneAck { public_addr }));
                        });
                    }
                    (Some(PeerScript::Deny(reason)), Packet::AssignZone { zone }) => {
                        debug!("Loopback peer {} denying zone {}", peer, zone.id);
                        let _ = reply.send(Ok(Packet::AssignZoneDenied { reason }));
                    }
                    (Some(PeerScript::Ignore), _) => {
                        // Park the reply slot so the request runs into
                        // the timeout instead of failing fast.
                        tokio::spawn(async move {
                            tokio::time::sleep(Duration::from_secs(60)).await;
                            drop(reply);
                        });
                    }
                    // Unknown peer, or a request the script does not
                    // cover: behave like a dead connection.
                    _ => drop(reply),
                }
            }
            TransportCmd::Send { peer, packet } => {
                debug!("Loopback delivering {:?} to peer {}", packet, peer);
                locked(&shared).sent.entry(peer).or_default().push(packet);
            }
        }
    }
}
