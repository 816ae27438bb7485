//! The assignment handshake: one zone offered to one remote candidate
//!
//! Each handshake runs as an independent task that performs a single
//! `AssignZone` round trip and reports its outcome back into the
//! coordinator loop. The task never touches the registry or the pool;
//! all state transitions happen when the outcome message is processed.

use crate::transport::{RequestError, TransportHandle};
use shared::{Packet, PeerId, ZoneDescriptor};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error("assignment request timed out")]
    Timeout,
    #[error("candidate declined the zone: {0}")]
    Denied(String),
    #[error("connection to the candidate was lost")]
    PeerLost,
    #[error("candidate answered with an unexpected packet")]
    BadResponse,
}

/// Result of a handshake, delivered back to the coordinator loop.
/// On success carries the public address supplied by the peer, if any.
#[derive(Debug)]
pub struct AssignmentOutcome {
    pub zone_id: u32,
    pub peer: PeerId,
    pub result: Result<Option<String>, AssignError>,
}

/// Offers `zone` to `peer` and waits for its answer. The suspension
/// point is the transport round trip; everything else is immediate.
pub(crate) async fn offer_zone(
    transport: TransportHandle,
    peer: PeerId,
    zone: ZoneDescriptor,
) -> AssignmentOutcome {
    let zone_id = zone.id;

    let result = match transport.request(peer, Packet::AssignZone { zone }).await {
        Ok(Packet::AssignZoneAck { public_addr }) => {
            if public_addr.is_empty() {
                Ok(None)
            } else {
                Ok(Some(public_addr))
            }
        }
        Ok(Packet::AssignZoneDenied { reason }) => Err(AssignError::Denied(reason)),
        Ok(_) => Err(AssignError::BadResponse),
        Err(RequestError::Timeout) => Err(AssignError::Timeout),
        Err(RequestError::Dropped) => Err(AssignError::PeerLost),
    };

    AssignmentOutcome {
        zone_id,
        peer,
        result,
    }
}
