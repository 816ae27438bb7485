//! # Zone Authority Coordinator
//!
//! This library is the spatial-zone authority core of a multiplayer
//! networking layer. It partitions a continuous world into zones,
//! assigns each zone to exactly one authoritative server among the
//! connected peers, grants every zone a disjoint block of world-object
//! identifiers, and keeps assigned authorities aware of each other so
//! that downstream handover logic can move connections directly between
//! neighboring servers.
//!
//! ## Architecture
//!
//! A single manager task owns all coordination state — the zone
//! registry, the candidate pool, and the identifier allocator — and
//! mutates it only while processing one message at a time. Assignment
//! handshakes run as independent spawned tasks that perform a single
//! request round trip through the transport boundary and feed their
//! outcome back into the manager's message queue. Nothing in this crate
//! opens a socket: the transport collaborator consumes
//! [`transport::TransportCmd`] values and the host process feeds peer
//! lifecycle events through the manager handle.
//!
//! Failure handling is strictly local: an exhausted identifier space
//! fails the one zone-creation call, a declined or timed-out handshake
//! returns the zone to the assignment queue, and a lost peer releases
//! every zone it owned. Nothing escalates to a process abort; the
//! system degrades to "zone temporarily has no authority".
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use coordinator::loopback::LoopbackTransport;
//! use coordinator::manager::{ZoneManager, ZoneManagerConfig};
//! use shared::Vec3;
//! use tokio::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let transport = LoopbackTransport::start(Duration::from_secs(5));
//!     let config = ZoneManagerConfig::new("127.0.0.1:9000".parse()?);
//!     let (manager, handle, _local_events) = ZoneManager::new(config, transport.handle());
//!     tokio::spawn(manager.run());
//!
//!     // Zones queue up until candidate servers connect.
//!     handle.create_zone(Vec3::new(0.0, 0.0, 0.0)).await?;
//!     handle.create_zone(Vec3::new(1000.0, 0.0, 0.0)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod allocator;
pub mod assignment;
pub mod loopback;
pub mod manager;
pub mod pool;
pub mod registry;
pub mod transport;
pub mod zone;
