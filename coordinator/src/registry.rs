//! Zone registry: creation-ordered roster of every zone plus spatial lookup

use crate::allocator::{AllocError, BlockAllocator};
use crate::zone::{AuthorityRef, Zone};
use log::{info, warn};
use shared::{Vec3, ZoneConfig, ZoneDescriptor};

/// Authoritative in-memory list of all zones. Iteration order is
/// creation order; zones are never deleted.
#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new() -> Self {
        Self { zones: Vec::new() }
    }

    /// Creates a zone at `center`, backed by a fresh identifier block.
    /// On allocator exhaustion the registry is left unchanged.
    pub fn create_zone(
        &mut self,
        allocator: &mut BlockAllocator,
        center: Vec3,
        config: ZoneConfig,
    ) -> Result<ZoneDescriptor, AllocError> {
        let id_range = allocator.allocate()?;

        if !config.is_ordered() {
            warn!(
                "Zone at ({}, {}, {}) has unordered handover thresholds",
                center.x, center.y, center.z
            );
        }

        let zone = Zone::new(center, config, id_range);
        info!(
            "Created zone {} at ({}, {}, {}), ids {}..={}",
            zone.id, center.x, center.y, center.z, id_range.min, id_range.max
        );

        let descriptor = zone.descriptor();
        self.zones.push(zone);
        Ok(descriptor)
    }

    /// Finds the closest available zone within its own handover-max
    /// radius of `position`. Zones whose handshake has not completed are
    /// invisible; equal distances keep the earliest-created zone.
    pub fn find_zone(&self, position: Vec3) -> Option<&Zone> {
        let mut closest: Option<&Zone> = None;
        let mut closest_distance = f32::MAX;

        for zone in &self.zones {
            if !zone.available {
                continue;
            }

            let distance = zone.distance(position);
            if distance > zone.config.handover_max_distance {
                continue;
            }
            if distance < closest_distance {
                closest = Some(zone);
                closest_distance = distance;
            }
        }

        closest
    }

    pub fn get(&self, zone_id: u32) -> Option<&Zone> {
        self.zones.iter().find(|z| z.id == zone_id)
    }

    pub fn get_mut(&mut self, zone_id: u32) -> Option<&mut Zone> {
        self.zones.iter_mut().find(|z| z.id == zone_id)
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    /// Ids of zones with no dispatched assignment, in creation order.
    pub fn unassigned_ids(&self) -> Vec<u32> {
        self.zones
            .iter()
            .filter(|z| !z.assigned)
            .map(|z| z.id)
            .collect()
    }

    /// Reverts every zone owned by `peer` to the unassigned state.
    /// Returns the ids of the zones that were released.
    pub fn release_authority(&mut self, peer: AuthorityRef) -> Vec<u32> {
        let mut released = Vec::new();
        for zone in &mut self.zones {
            if zone.authority == Some(peer) {
                zone.remove_authority();
                released.push(zone.id);
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_available(registry: &mut ZoneRegistry, zone_id: u32, peer: AuthorityRef) {
        let zone = registry.get_mut(zone_id).unwrap();
        zone.authority = Some(peer);
        zone.assigned = true;
        zone.available = true;
    }

    #[test]
    fn test_created_zones_have_disjoint_id_ranges() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        for i in 0..8 {
            registry
                .create_zone(
                    &mut allocator,
                    Vec3::new(i as f32 * 1000.0, 0.0, 0.0),
                    ZoneConfig::default(),
                )
                .unwrap();
        }

        let zones = registry.zones();
        for a in 0..zones.len() {
            for b in (a + 1)..zones.len() {
                let (ra, rb) = (zones[a].id_range, zones[b].id_range);
                assert!(
                    ra.max < rb.min || rb.max < ra.min,
                    "zones {} and {} overlap in id range",
                    zones[a].id,
                    zones[b].id
                );
            }
        }
    }

    #[test]
    fn test_exhaustion_leaves_registry_unchanged() {
        // Room for exactly one block.
        let mut allocator = BlockAllocator::with_limits(0, 10, 10);
        let mut registry = ZoneRegistry::new();

        registry
            .create_zone(&mut allocator, Vec3::ZERO, ZoneConfig::default())
            .unwrap();
        assert_eq!(registry.len(), 1);

        let result = registry.create_zone(
            &mut allocator,
            Vec3::new(1000.0, 0.0, 0.0),
            ZoneConfig::default(),
        );
        assert!(result.is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_zone_prefers_closest_within_max() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        let a = registry
            .create_zone(&mut allocator, Vec3::ZERO, ZoneConfig::default())
            .unwrap()
            .id;
        let b = registry
            .create_zone(
                &mut allocator,
                Vec3::new(1000.0, 0.0, 0.0),
                ZoneConfig::default(),
            )
            .unwrap()
            .id;

        make_available(&mut registry, a, AuthorityRef::Remote(1));
        make_available(&mut registry, b, AuthorityRef::Remote(2));

        let found = registry.find_zone(Vec3::new(50.0, 0.0, 0.0)).unwrap();
        assert_eq!(found.id, a);

        let found = registry.find_zone(Vec3::new(950.0, 0.0, 0.0)).unwrap();
        assert_eq!(found.id, b);

        // Equidistant from both centers and past handover_max of each.
        assert!(registry.find_zone(Vec3::new(500.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_find_zone_skips_unavailable_zones() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        let id = registry
            .create_zone(&mut allocator, Vec3::ZERO, ZoneConfig::default())
            .unwrap()
            .id;

        assert!(registry.find_zone(Vec3::ZERO).is_none());

        // Mid-handshake: dispatched but not yet acknowledged.
        registry.get_mut(id).unwrap().assigned = true;
        assert!(registry.find_zone(Vec3::ZERO).is_none());

        registry.get_mut(id).unwrap().available = true;
        assert!(registry.find_zone(Vec3::ZERO).is_some());
    }

    #[test]
    fn test_find_zone_tie_keeps_first_created() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        let first = registry
            .create_zone(
                &mut allocator,
                Vec3::new(-100.0, 0.0, 0.0),
                ZoneConfig::default(),
            )
            .unwrap()
            .id;
        let second = registry
            .create_zone(
                &mut allocator,
                Vec3::new(100.0, 0.0, 0.0),
                ZoneConfig::default(),
            )
            .unwrap()
            .id;

        make_available(&mut registry, first, AuthorityRef::Remote(1));
        make_available(&mut registry, second, AuthorityRef::Remote(2));

        let found = registry.find_zone(Vec3::ZERO).unwrap();
        assert_eq!(found.id, first);
    }

    #[test]
    fn test_release_authority_reverts_all_owned_zones() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        let z1 = registry
            .create_zone(&mut allocator, Vec3::ZERO, ZoneConfig::default())
            .unwrap()
            .id;
        let z2 = registry
            .create_zone(
                &mut allocator,
                Vec3::new(1000.0, 0.0, 0.0),
                ZoneConfig::default(),
            )
            .unwrap()
            .id;
        let z3 = registry
            .create_zone(
                &mut allocator,
                Vec3::new(2000.0, 0.0, 0.0),
                ZoneConfig::default(),
            )
            .unwrap()
            .id;

        make_available(&mut registry, z1, AuthorityRef::Remote(1));
        make_available(&mut registry, z2, AuthorityRef::Remote(2));
        make_available(&mut registry, z3, AuthorityRef::Remote(1));

        let released = registry.release_authority(AuthorityRef::Remote(1));
        assert_eq!(released, vec![z1, z3]);

        for id in [z1, z3] {
            let zone = registry.get(id).unwrap();
            assert!(zone.authority.is_none());
            assert!(!zone.assigned);
            assert!(!zone.available);
        }
        assert!(registry.get(z2).unwrap().available);

        assert_eq!(registry.unassigned_ids(), vec![z1, z3]);
    }

    #[test]
    fn test_unassigned_ids_in_creation_order() {
        let mut allocator = BlockAllocator::new();
        let mut registry = ZoneRegistry::new();

        let mut created = Vec::new();
        for i in 0..3 {
            created.push(
                registry
                    .create_zone(
                        &mut allocator,
                        Vec3::new(i as f32 * 1000.0, 0.0, 0.0),
                        ZoneConfig::default(),
                    )
                    .unwrap()
                    .id,
            );
        }

        assert_eq!(registry.unassigned_ids(), created);

        registry.get_mut(created[1]).unwrap().assigned = true;
        assert_eq!(registry.unassigned_ids(), vec![created[0], created[2]]);
    }
}
