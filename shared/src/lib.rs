use serde::{Deserialize, Serialize};

/// First world-object identifier handed out to any zone.
pub const OBJECT_ID_FLOOR: u64 = 1_000;
/// Identifiers are granted to zones in blocks of this size.
pub const OBJECT_ID_BLOCK_SIZE: u64 = 32_000;
/// Upper limit of the identifier space; allocation fails past this point.
pub const OBJECT_ID_CEILING: u64 = 1_025_000;

pub const DEFAULT_ZONE_SIZE: f32 = 300.0;
pub const DEFAULT_HANDOVER_DISTANCE: f32 = 200.0;
pub const DEFAULT_HANDOVER_MIN_DISTANCE: f32 = 100.0;
pub const DEFAULT_HANDOVER_MAX_DISTANCE: f32 = 400.0;

/// Opaque connection handle issued by the transport layer.
pub type PeerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Distance thresholds governing a zone's footprint and handover behavior.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ZoneConfig {
    /// Radius the zone nominally controls.
    pub zone_size: f32,
    /// A connection closer than this to the zone center is handed over to it.
    pub handover_distance: f32,
    /// A connection inside this radius is forced to hand over to this zone.
    pub handover_min_distance: f32,
    /// Beyond this distance from center a connection must leave the zone.
    pub handover_max_distance: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            zone_size: DEFAULT_ZONE_SIZE,
            handover_distance: DEFAULT_HANDOVER_DISTANCE,
            handover_min_distance: DEFAULT_HANDOVER_MIN_DISTANCE,
            handover_max_distance: DEFAULT_HANDOVER_MAX_DISTANCE,
        }
    }
}

impl ZoneConfig {
    /// Whether the thresholds are ordered
    /// `handover_min <= handover <= zone_size <= handover_max`.
    /// Ordering is the caller's responsibility; the registry only warns.
    pub fn is_ordered(&self) -> bool {
        self.handover_min_distance <= self.handover_distance
            && self.handover_distance <= self.zone_size
            && self.zone_size <= self.handover_max_distance
    }
}

/// Wire form of a zone, carried by `AssignZone` offers and `AddPeer`
/// neighbor notifications.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ZoneDescriptor {
    pub id: u32,
    pub center: Vec3,
    pub config: ZoneConfig,
    /// Inclusive lower bound of the object-identifier block owned by this zone.
    pub id_range_min: u64,
    /// Inclusive upper bound of the object-identifier block owned by this zone.
    pub id_range_max: u64,
    /// Externally reachable address of the zone's authority, once assigned.
    pub public_addr: Option<String>,
}

impl ZoneDescriptor {
    pub fn distance(&self, position: Vec3) -> f32 {
        self.center.distance(position)
    }

    pub fn in_range(&self, position: Vec3) -> bool {
        self.distance(position) < self.config.zone_size
    }

    pub fn in_range_max(&self, position: Vec3) -> bool {
        self.distance(position) < self.config.handover_max_distance
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    /// Offer a zone to a candidate server. Answered with
    /// `AssignZoneAck` on acceptance or `AssignZoneDenied` otherwise.
    AssignZone { zone: ZoneDescriptor },
    /// Acceptance of an `AssignZone` offer. An empty address string lets
    /// the coordinator synthesize one from the connection address.
    AssignZoneAck { public_addr: String },
    AssignZoneDenied { reason: String },
    /// Informs an assigned authority about a neighboring zone.
    AddPeer { zone: ZoneDescriptor },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_vec3_distance() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(3.0, 4.0, 0.0);
        assert_approx_eq!(a.distance(b), 5.0, 0.001);
        assert_approx_eq!(b.distance(a), 5.0, 0.001);
        assert_approx_eq!(a.distance(a), 0.0, 0.001);
    }

    #[test]
    fn test_vec3_distance_3d() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(1.0, 2.0, 3.0);
        assert_approx_eq!(a.distance(b), 0.0, 0.001);

        let c = Vec3::new(1.0, 2.0, 7.0);
        assert_approx_eq!(a.distance(c), 4.0, 0.001);
    }

    #[test]
    fn test_default_config_is_ordered() {
        let config = ZoneConfig::default();
        assert!(config.is_ordered());
        assert_eq!(config.zone_size, 300.0);
        assert_eq!(config.handover_distance, 200.0);
        assert_eq!(config.handover_min_distance, 100.0);
        assert_eq!(config.handover_max_distance, 400.0);
    }

    #[test]
    fn test_unordered_config_detected() {
        let config = ZoneConfig {
            zone_size: 100.0,
            handover_distance: 500.0,
            handover_min_distance: 50.0,
            handover_max_distance: 400.0,
        };
        assert!(!config.is_ordered());
    }

    fn test_descriptor(center: Vec3) -> ZoneDescriptor {
        ZoneDescriptor {
            id: 7,
            center,
            config: ZoneConfig::default(),
            id_range_min: 1_000,
            id_range_max: 32_999,
            public_addr: None,
        }
    }

    #[test]
    fn test_descriptor_range_checks() {
        let zone = test_descriptor(Vec3::ZERO);

        assert!(zone.in_range(Vec3::new(299.0, 0.0, 0.0)));
        assert!(!zone.in_range(Vec3::new(300.0, 0.0, 0.0)));

        assert!(zone.in_range_max(Vec3::new(399.0, 0.0, 0.0)));
        assert!(!zone.in_range_max(Vec3::new(400.0, 0.0, 0.0)));
    }

    #[test]
    fn test_packet_serialization_assign_zone() {
        let packet = Packet::AssignZone {
            zone: test_descriptor(Vec3::new(1000.0, 0.0, -250.0)),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::AssignZone { zone } => {
                assert_eq!(zone.id, 7);
                assert_eq!(zone.center, Vec3::new(1000.0, 0.0, -250.0));
                assert_eq!(zone.id_range_min, 1_000);
                assert_eq!(zone.id_range_max, 32_999);
                assert_eq!(zone.public_addr, None);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_ack() {
        let packet = Packet::AssignZoneAck {
            public_addr: "10.0.0.5:9000".to_string(),
        };
        let serialized = bincode::serialize(&packet).unwrap();
        let deserialized: Packet = bincode::deserialize(&serialized).unwrap();

        match deserialized {
            Packet::AssignZoneAck { public_addr } => {
                assert_eq!(public_addr, "10.0.0.5:9000");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }
}
