//! Zone manager: the coordinator event loop
//!
//! Owns the zone registry, the candidate pool, and the identifier
//! allocator outright. Every mutation happens inside the loop, so
//! handshake tasks and external callers never observe a torn state.
//! Callers hold a cloneable [`ZoneManagerHandle`]; request/response
//! operations carry a oneshot reply slot, peer lifecycle events are
//! fire-and-forget. Handshake tasks report back through the same
//! message channel as everything else, which makes event processing
//! order simply the channel arrival order.

use crate::allocator::BlockAllocator;
use crate::assignment::{self, AssignmentOutcome};
use crate::pool::{Candidate, CandidatePool};
use crate::registry::ZoneRegistry;
use crate::transport::TransportHandle;
use crate::zone::AuthorityRef;
use log::{debug, info, warn};
use shared::{
    PeerId, Vec3, ZoneConfig, ZoneDescriptor, OBJECT_ID_BLOCK_SIZE, OBJECT_ID_CEILING,
    OBJECT_ID_FLOOR,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagerError {
    #[error("cannot create zone: identifier space exhausted")]
    IdSpaceExhausted,
    #[error("zone manager is no longer running")]
    Closed,
}

/// Read-only snapshot of one zone's assignment state.
#[derive(Debug, Clone)]
pub struct ZoneStatus {
    pub descriptor: ZoneDescriptor,
    pub authority: Option<AuthorityRef>,
    pub authority_addr: Option<SocketAddr>,
    pub assigned: bool,
    pub available: bool,
}

/// Events delivered to the co-located zone server when the local
/// process itself holds zone authority.
#[derive(Debug, Clone)]
pub enum LocalZoneEvent {
    /// The local process was assigned authority over this zone.
    ZoneAssigned(ZoneDescriptor),
    /// A zone held by the local process gained this neighbor.
    PeerAdded(ZoneDescriptor),
}

pub(crate) enum Message {
    CreateZone {
        position: Vec3,
        config: ZoneConfig,
        reply: oneshot::Sender<Result<ZoneDescriptor, ManagerError>>,
    },
    FindZone {
        position: Vec3,
        reply: oneshot::Sender<Option<ZoneStatus>>,
    },
    Zones {
        reply: oneshot::Sender<Vec<ZoneStatus>>,
    },
    PeerConnected {
        peer: PeerId,
        addr: SocketAddr,
    },
    PeerDisconnected {
        peer: PeerId,
    },
    AddSelf,
    AssignmentFinished(AssignmentOutcome),
    Shutdown,
}

pub struct ZoneManagerConfig {
    /// Address this process is reachable at when it takes zone
    /// authority itself.
    pub local_addr: SocketAddr,
    pub id_floor: u64,
    pub id_block_size: u64,
    pub id_ceiling: u64,
}

impl ZoneManagerConfig {
    pub fn new(local_addr: SocketAddr) -> Self {
        Self {
            local_addr,
            id_floor: OBJECT_ID_FLOOR,
            id_block_size: OBJECT_ID_BLOCK_SIZE,
            id_ceiling: OBJECT_ID_CEILING,
        }
    }
}

/// Coordinator for zone creation and assignment of peers to
/// unassigned zones.
pub struct ZoneManager {
    registry: ZoneRegistry,
    pool: CandidatePool,
    allocator: BlockAllocator,
    /// Connected peers, candidates or not.
    peers: HashMap<PeerId, SocketAddr>,
    /// Zone id -> remote candidate whose handshake is currently in
    /// flight. Guards against stale outcomes after a revert.
    in_flight: HashMap<u32, PeerId>,
    transport: TransportHandle,
    local_events: mpsc::UnboundedSender<LocalZoneEvent>,
    local_addr: SocketAddr,
    msg_tx: mpsc::UnboundedSender<Message>,
    msg_rx: mpsc::UnboundedReceiver<Message>,
}

impl ZoneManager {
    /// Builds a manager plus the handle and local-event stream its host
    /// wires up. Call [`ZoneManager::run`] on a task to start it.
    pub fn new(
        config: ZoneManagerConfig,
        transport: TransportHandle,
    ) -> (
        Self,
        ZoneManagerHandle,
        mpsc::UnboundedReceiver<LocalZoneEvent>,
    ) {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (local_tx, local_rx) = mpsc::unbounded_channel();

        let manager = Self {
            registry: ZoneRegistry::new(),
            pool: CandidatePool::new(),
            allocator: BlockAllocator::with_limits(
                config.id_floor,
                config.id_block_size,
                config.id_ceiling,
            ),
            peers: HashMap::new(),
            in_flight: HashMap::new(),
            transport,
            local_events: local_tx,
            local_addr: config.local_addr,
            msg_tx: msg_tx.clone(),
            msg_rx,
        };

        (manager, ZoneManagerHandle { tx: msg_tx }, local_rx)
    }

    /// Event loop. Runs until a shutdown message arrives.
    pub async fn run(mut self) {
        info!("Zone manager started, local address {}", self.local_addr);

        while let Some(message) = self.msg_rx.recv().await {
            if self.handle_message(message) {
                break;
            }
        }

        info!("Zone manager stopped");
    }

    /// Returns true when the loop should stop.
    fn handle_message(&mut self, message: Message) -> bool {
        match message {
            Message::CreateZone {
                position,
                config,
                reply,
            } => {
                let result = self.create_zone(position, config);
                let _ = reply.send(result);
            }
            Message::FindZone { position, reply } => {
                let status = self.registry.find_zone(position).map(ZoneStatus::of);
                let _ = reply.send(status);
            }
            Message::Zones { reply } => {
                let statuses = self.registry.zones().iter().map(ZoneStatus::of).collect();
                let _ = reply.send(statuses);
            }
            Message::PeerConnected { peer, addr } => self.peer_connected(peer, addr),
            Message::PeerDisconnected { peer } => self.peer_disconnected(peer),
            Message::AddSelf => self.add_self(),
            Message::AssignmentFinished(outcome) => self.finish_assignment(outcome),
            Message::Shutdown => return true,
        }
        false
    }

    fn create_zone(
        &mut self,
        position: Vec3,
        config: ZoneConfig,
    ) -> Result<ZoneDescriptor, ManagerError> {
        let descriptor = self
            .registry
            .create_zone(&mut self.allocator, position, config)
            .map_err(|_| ManagerError::IdSpaceExhausted)?;

        self.drain();

        // Re-read so a synchronous local assignment shows in the reply.
        let current = self
            .registry
            .get(descriptor.id)
            .map(|z| z.descriptor())
            .unwrap_or(descriptor);
        Ok(current)
    }

    fn peer_connected(&mut self, peer: PeerId, addr: SocketAddr) {
        self.peers.insert(peer, addr);
        if self.pool.add(AuthorityRef::Remote(peer), addr) {
            info!("Peer {} connected from {}, pooled as zone candidate", peer, addr);
        }
        self.drain();
    }

    fn peer_disconnected(&mut self, peer: PeerId) {
        self.peers.remove(&peer);
        self.pool.remove(AuthorityRef::Remote(peer));

        let released = self.registry.release_authority(AuthorityRef::Remote(peer));
        if released.is_empty() {
            info!("Peer {} disconnected", peer);
        } else {
            info!("Peer {} disconnected, zones {:?} lost their authority", peer, released);
        }

        // Released zones may pair with candidates that are still idle.
        self.drain();
    }

    fn add_self(&mut self) {
        if self.pool.add(AuthorityRef::Local, self.local_addr) {
            info!("Local process registered as zone candidate");
        }
        self.drain();
    }

    /// The drain step: pairs idle candidates with unassigned zones in
    /// registry order. Synchronous and non-suspending; it only
    /// dispatches handshakes, it never waits on them.
    fn drain(&mut self) {
        if !self.pool.has_idle() {
            return;
        }

        for zone_id in self.registry.unassigned_ids() {
            let Some(candidate) = self.pool.claim_first_idle() else {
                return;
            };
            self.dispatch(candidate, zone_id);
        }
    }

    fn dispatch(&mut self, candidate: Candidate, zone_id: u32) {
        let Some(zone) = self.registry.get_mut(zone_id) else {
            self.pool.release(candidate.peer);
            return;
        };

        // Reserve the zone before the candidate answers.
        zone.assigned = true;
        let descriptor = zone.descriptor();

        match candidate.peer {
            AuthorityRef::Local => {
                // A handshake from a previous offer may still be in
                // flight for this zone; its outcome is now stale.
                self.in_flight.remove(&zone_id);
                self.finish_local_assignment(zone_id);
            }
            AuthorityRef::Remote(peer) => {
                debug!("Offering zone {} to peer {}", zone_id, peer);
                self.in_flight.insert(zone_id, peer);

                let transport = self.transport.clone();
                let msg_tx = self.msg_tx.clone();
                tokio::spawn(async move {
                    let outcome = assignment::offer_zone(transport, peer, descriptor).await;
                    let _ = msg_tx.send(Message::AssignmentFinished(outcome));
                });
            }
        }
    }

    /// The local process accepts a zone without a round trip.
    fn finish_local_assignment(&mut self, zone_id: u32) {
        let local_addr = self.local_addr;
        let Some(zone) = self.registry.get_mut(zone_id) else {
            return;
        };

        zone.authority = Some(AuthorityRef::Local);
        zone.authority_addr = Some(local_addr);
        zone.public_addr = Some(local_addr.to_string());
        let descriptor = zone.descriptor();

        let _ = self
            .local_events
            .send(LocalZoneEvent::ZoneAssigned(descriptor));
        self.pool.remove(AuthorityRef::Local);
        self.notify_neighbors(zone_id);

        if let Some(zone) = self.registry.get_mut(zone_id) {
            zone.available = true;
        }
        info!("Local process assigned to zone {}, public address {}", zone_id, local_addr);
    }

    fn finish_assignment(&mut self, outcome: AssignmentOutcome) {
        let AssignmentOutcome {
            zone_id,
            peer,
            result,
        } = outcome;

        // A zone can be reverted and re-offered while an old handshake
        // is still in flight; only the current offer's outcome counts.
        if self.in_flight.get(&zone_id) != Some(&peer) {
            debug!("Ignoring stale assignment outcome for zone {} from peer {}", zone_id, peer);
            return;
        }
        self.in_flight.remove(&zone_id);

        let supplied_addr = match result {
            Ok(addr) => addr,
            Err(err) => {
                warn!("Assignment of zone {} to peer {} failed: {}", zone_id, peer, err);
                self.rollback(zone_id, peer);
                return;
            }
        };

        let Some(&peer_addr) = self.peers.get(&peer) else {
            warn!("Peer {} disconnected before zone {} assignment completed", peer, zone_id);
            self.rollback(zone_id, peer);
            return;
        };

        let Some(zone) = self.registry.get_mut(zone_id) else {
            return;
        };
        zone.authority = Some(AuthorityRef::Remote(peer));
        zone.authority_addr = Some(peer_addr);
        let public_addr = supplied_addr.unwrap_or_else(|| peer_addr.to_string());
        zone.public_addr = Some(public_addr.clone());

        // A successfully assigned server is no longer an unassigned
        // candidate; it registers again if it wants further zones.
        self.pool.remove(AuthorityRef::Remote(peer));
        self.notify_neighbors(zone_id);

        if let Some(zone) = self.registry.get_mut(zone_id) {
            zone.available = true;
        }
        info!("Peer {} assigned to zone {}, public address {}", peer, zone_id, public_addr);
    }

    /// Frees a zone and its candidate after a failed handshake. The
    /// zone re-enters the queue on the next pool or registry change;
    /// retrying immediately would spin against a candidate that keeps
    /// declining.
    fn rollback(&mut self, zone_id: u32, peer: PeerId) {
        if let Some(zone) = self.registry.get_mut(zone_id) {
            zone.assigned = false;
        }
        self.pool.release(AuthorityRef::Remote(peer));
    }

    /// Tells every pair (existing assigned zone, newly assigned zone)
    /// about each other, both directions. Local authorities get the
    /// notification through the local event stream instead of the wire.
    fn notify_neighbors(&self, zone_id: u32) {
        let Some(new_zone) = self.registry.get(zone_id) else {
            return;
        };
        let Some(new_authority) = new_zone.authority else {
            return;
        };
        let new_descriptor = new_zone.descriptor();

        for other in self.registry.zones() {
            if other.id == zone_id {
                continue;
            }
            let Some(other_authority) = other.authority else {
                continue;
            };

            self.notify_authority(other_authority, new_descriptor.clone());
            self.notify_authority(new_authority, other.descriptor());
        }
    }

    fn notify_authority(&self, authority: AuthorityRef, zone: ZoneDescriptor) {
        match authority {
            AuthorityRef::Local => {
                let _ = self.local_events.send(LocalZoneEvent::PeerAdded(zone));
            }
            AuthorityRef::Remote(peer) => {
                self.transport.send(peer, shared::Packet::AddPeer { zone });
            }
        }
    }
}

impl ZoneStatus {
    fn of(zone: &crate::zone::Zone) -> Self {
        Self {
            descriptor: zone.descriptor(),
            authority: zone.authority,
            authority_addr: zone.authority_addr,
            assigned: zone.assigned,
            available: zone.available,
        }
    }
}

/// Cloneable handle for talking to a running zone manager.
#[derive(Debug, Clone)]
pub struct ZoneManagerHandle {
    tx: mpsc::UnboundedSender<Message>,
}

impl ZoneManagerHandle {
    /// Creates a zone at `position` with default thresholds and offers
    /// it to an idle candidate right away, if one exists.
    pub async fn create_zone(&self, position: Vec3) -> Result<ZoneDescriptor, ManagerError> {
        self.create_zone_with(position, ZoneConfig::default()).await
    }

    pub async fn create_zone_with(
        &self,
        position: Vec3,
        config: ZoneConfig,
    ) -> Result<ZoneDescriptor, ManagerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::CreateZone {
                position,
                config,
                reply: reply_tx,
            })
            .map_err(|_| ManagerError::Closed)?;
        reply_rx.await.map_err(|_| ManagerError::Closed)?
    }

    /// Closest available zone covering `position`, if any. Zones whose
    /// handshake is still in flight never match.
    pub async fn find_zone(&self, position: Vec3) -> Result<Option<ZoneStatus>, ManagerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::FindZone {
                position,
                reply: reply_tx,
            })
            .map_err(|_| ManagerError::Closed)?;
        reply_rx.await.map_err(|_| ManagerError::Closed)
    }

    /// Snapshot of every zone in creation order.
    pub async fn zones(&self) -> Result<Vec<ZoneStatus>, ManagerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(Message::Zones { reply: reply_tx })
            .map_err(|_| ManagerError::Closed)?;
        reply_rx.await.map_err(|_| ManagerError::Closed)
    }

    /// Feeds a transport peer-connected event into the manager. A peer
    /// that was already assigned a zone may be announced again to
    /// re-enter the candidate pool.
    pub fn peer_connected(&self, peer: PeerId, addr: SocketAddr) {
        let _ = self.tx.send(Message::PeerConnected { peer, addr });
    }

    pub fn peer_disconnected(&self, peer: PeerId) {
        let _ = self.tx.send(Message::PeerDisconnected { peer });
    }

    /// Registers the local process as a zone-authority candidate.
    pub fn add_self(&self) {
        let _ = self.tx.send(Message::AddSelf);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(Message::Shutdown);
    }
}
