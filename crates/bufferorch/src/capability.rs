//! Hardware capability queries consumed by the buffer accounting engine.

use crate::buffer::TileReductionPolicy;
use crate::config::HardwareProfile;

/// What the switch ASIC reports about its buffer memory.
pub trait HardwareCapability: Send + Sync {
    /// Maximum number of pools of one direction.
    fn max_pools_per_direction(&self) -> u32;

    /// Total buffer memory in bytes.
    fn total_buffer_bytes(&self) -> u64;

    /// Number of tiles. Hardware with one tile (or none) is non-tiled.
    fn tile_count(&self) -> u32;

    /// The tile a port is wired to.
    fn tile_of(&self, hw_port_number: u32) -> u32;

    /// How per-tile reservations fold into a pool's shared size.
    fn tile_reduction(&self) -> &dyn TileReductionPolicy;

    fn is_tiled(&self) -> bool {
        self.tile_count() > 1
    }
}

/// Capability answered from a static hardware profile.
#[derive(Debug)]
pub struct StaticCapability {
    profile: HardwareProfile,
    reduction: Box<dyn TileReductionPolicy>,
}

impl StaticCapability {
    pub fn new(profile: HardwareProfile) -> Self {
        let reduction = profile.reduction.build(profile.replication);
        Self { profile, reduction }
    }

    pub fn profile(&self) -> &HardwareProfile {
        &self.profile
    }
}

impl HardwareCapability for StaticCapability {
    fn max_pools_per_direction(&self) -> u32 {
        self.profile.max_pools_per_direction
    }

    fn total_buffer_bytes(&self) -> u64 {
        self.profile.total_buffer_bytes
    }

    fn tile_count(&self) -> u32 {
        self.profile.tile_count
    }

    fn tile_of(&self, hw_port_number: u32) -> u32 {
        let last_tile = self.profile.tile_count.saturating_sub(1);
        if let Some(tile) = self.profile.port_tiles.get(hw_port_number as usize) {
            return (*tile).min(last_tile);
        }
        match self.profile.ports_per_tile {
            Some(per_tile) if per_tile > 0 => (hw_port_number / per_tile).min(last_tile),
            _ => 0,
        }
    }

    fn tile_reduction(&self) -> &dyn TileReductionPolicy {
        self.reduction.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::ReductionKind;

    #[test]
    fn test_tile_from_ports_per_tile() {
        let cap = StaticCapability::new(HardwareProfile {
            tile_count: 4,
            ports_per_tile: Some(8),
            ..HardwareProfile::default()
        });

        assert!(cap.is_tiled());
        assert_eq!(cap.tile_of(0), 0);
        assert_eq!(cap.tile_of(7), 0);
        assert_eq!(cap.tile_of(8), 1);
        assert_eq!(cap.tile_of(31), 3);
        assert_eq!(cap.tile_of(200), 3);
    }

    #[test]
    fn test_explicit_port_tiles_win() {
        let cap = StaticCapability::new(HardwareProfile {
            tile_count: 2,
            ports_per_tile: Some(1),
            port_tiles: vec![1, 0],
            ..HardwareProfile::default()
        });

        assert_eq!(cap.tile_of(0), 1);
        assert_eq!(cap.tile_of(1), 0);
        assert_eq!(cap.tile_of(5), 1);
    }

    #[test]
    fn test_non_tiled_defaults() {
        let cap = StaticCapability::new(HardwareProfile::default());
        assert!(!cap.is_tiled());
        assert_eq!(cap.tile_of(17), 0);
        assert_eq!(cap.tile_reduction().name(), "broadcast_max");
    }

    #[test]
    fn test_reduction_from_profile() {
        let cap = StaticCapability::new(HardwareProfile {
            reduction: ReductionKind::PerTileSum,
            ..HardwareProfile::default()
        });
        assert_eq!(cap.tile_reduction().name(), "per_tile_sum");
    }
}
