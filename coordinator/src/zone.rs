//! Zone record: immutable spatial configuration plus mutable authority state

use crate::allocator::IdRange;
use shared::{PeerId, Vec3, ZoneConfig, ZoneDescriptor};
use std::net::SocketAddr;

/// Which process holds authority over a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityRef {
    /// The process running the coordinator itself.
    Local,
    /// A remote peer, addressed by its transport connection handle.
    Remote(PeerId),
}

/// A bounded spatial region owned by at most one authoritative server.
///
/// The spatial fields never change after creation. The authority fields
/// are mutated only by the assignment protocol and by authority removal
/// on peer disconnect. `assigned` is set the moment an offer is
/// dispatched; `available` only once the handshake has succeeded — the
/// window between the two is the in-flight handshake state.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: u32,
    pub center: Vec3,
    pub config: ZoneConfig,
    pub id_range: IdRange,
    pub authority: Option<AuthorityRef>,
    pub authority_addr: Option<SocketAddr>,
    pub public_addr: Option<String>,
    pub assigned: bool,
    pub available: bool,
}

impl Zone {
    pub(crate) fn new(center: Vec3, config: ZoneConfig, id_range: IdRange) -> Self {
        Self {
            id: rand::random::<u32>(),
            center,
            config,
            id_range,
            authority: None,
            authority_addr: None,
            public_addr: None,
            assigned: false,
            available: false,
        }
    }

    pub fn descriptor(&self) -> ZoneDescriptor {
        ZoneDescriptor {
            id: self.id,
            center: self.center,
            config: self.config,
            id_range_min: self.id_range.min,
            id_range_max: self.id_range.max,
            public_addr: self.public_addr.clone(),
        }
    }

    pub fn distance(&self, position: Vec3) -> f32 {
        self.center.distance(position)
    }

    pub fn in_range(&self, position: Vec3) -> bool {
        self.distance(position) < self.config.zone_size
    }

    pub fn in_range_max(&self, position: Vec3) -> bool {
        self.distance(position) < self.config.handover_max_distance
    }

    /// Reverts the zone to the unassigned state so it re-enters the
    /// assignment queue on the next drain.
    pub(crate) fn remove_authority(&mut self) {
        self.authority = None;
        self.authority_addr = None;
        self.public_addr = None;
        self.assigned = false;
        self.available = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_zone() -> Zone {
        Zone::new(
            Vec3::new(100.0, 0.0, 100.0),
            ZoneConfig::default(),
            IdRange {
                min: 1_000,
                max: 32_999,
            },
        )
    }

    #[test]
    fn test_new_zone_is_unassigned() {
        let zone = test_zone();

        assert!(zone.authority.is_none());
        assert!(zone.authority_addr.is_none());
        assert!(zone.public_addr.is_none());
        assert!(!zone.assigned);
        assert!(!zone.available);
    }

    #[test]
    fn test_zone_ids_are_process_unique() {
        // Random u32 ids; two fresh zones colliding would be a broken RNG.
        let a = test_zone();
        let b = test_zone();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_descriptor_mirrors_zone() {
        let mut zone = test_zone();
        zone.public_addr = Some("10.0.0.5:9000".to_string());

        let descriptor = zone.descriptor();
        assert_eq!(descriptor.id, zone.id);
        assert_eq!(descriptor.center, zone.center);
        assert_eq!(descriptor.id_range_min, 1_000);
        assert_eq!(descriptor.id_range_max, 32_999);
        assert_eq!(descriptor.public_addr.as_deref(), Some("10.0.0.5:9000"));
    }

    #[test]
    fn test_remove_authority_reverts_everything() {
        let mut zone = test_zone();
        zone.authority = Some(AuthorityRef::Remote(3));
        zone.authority_addr = Some("192.168.0.3:7000".parse().unwrap());
        zone.public_addr = Some("10.0.0.3:7000".to_string());
        zone.assigned = true;
        zone.available = true;

        zone.remove_authority();

        assert!(zone.authority.is_none());
        assert!(zone.authority_addr.is_none());
        assert!(zone.public_addr.is_none());
        assert!(!zone.assigned);
        assert!(!zone.available);
    }

    #[test]
    fn test_range_checks_use_config() {
        let zone = test_zone();

        assert!(zone.in_range(Vec3::new(100.0, 0.0, 100.0)));
        assert!(zone.in_range(Vec3::new(350.0, 0.0, 100.0)));
        assert!(!zone.in_range(Vec3::new(450.0, 0.0, 100.0)));

        assert!(zone.in_range_max(Vec3::new(450.0, 0.0, 100.0)));
        assert!(!zone.in_range_max(Vec3::new(600.0, 0.0, 100.0)));
    }
}
