//! Channel boundary to the external transport collaborator
//!
//! The coordinator never owns a socket. All wire traffic goes through a
//! command channel consumed by whatever transport the host process
//! provides: `Request` carries a oneshot reply slot for round trips,
//! `Send` is fire-and-forget. The transport answers a request by
//! fulfilling the reply sender, or signals failure by dropping it (the
//! convention for a connection that died while the request was pending).

use shared::{Packet, PeerId};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("request dropped by the transport")]
    Dropped,
}

/// Commands consumed by the transport collaborator.
#[derive(Debug)]
pub enum TransportCmd {
    Request {
        peer: PeerId,
        packet: Packet,
        reply: oneshot::Sender<Result<Packet, RequestError>>,
    },
    Send {
        peer: PeerId,
        packet: Packet,
    },
}

/// Cloneable sending side of the transport boundary.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    tx: mpsc::UnboundedSender<TransportCmd>,
    request_timeout: Duration,
}

impl TransportHandle {
    pub fn new(tx: mpsc::UnboundedSender<TransportCmd>, request_timeout: Duration) -> Self {
        Self {
            tx,
            request_timeout,
        }
    }

    /// Sends a request and suspends until the response arrives, the
    /// transport drops the reply slot, or the request timeout elapses.
    pub async fn request(&self, peer: PeerId, packet: Packet) -> Result<Packet, RequestError> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(TransportCmd::Request {
                peer,
                packet,
                reply: reply_tx,
            })
            .map_err(|_| RequestError::Dropped)?;

        match timeout(self.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RequestError::Dropped),
            Err(_) => Err(RequestError::Timeout),
        }
    }

    /// Fire-and-forget send. Delivery failures are the transport's to log.
    pub fn send(&self, peer: PeerId, packet: Packet) {
        let _ = self.tx.send(TransportCmd::Send { peer, packet });
    }
}
