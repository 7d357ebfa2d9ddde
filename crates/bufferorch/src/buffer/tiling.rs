//! Tile reduction policies.
//!
//! On tiled hardware every port sits on one tile and each tile carves its
//! own reservations out of a pool. How the per-tile reservations fold into
//! the pool's shared size depends on the buffer architecture, so the fold
//! is a policy chosen by the hardware profile.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Folds per-tile reservations into pool-level figures.
pub trait TileReductionPolicy: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// The pool's `TILES_TOTAL_RESERVED_SIZE` for the given reservations.
    fn tiles_total_reserved(&self, tile_reserved: &[u64]) -> u64;

    /// The pool's shared size, or `None` if the reservations do not fit.
    fn shared_size(&self, pool_size: u64, tile_reserved: &[u64]) -> Option<u64>;
}

/// Every tile mirrors the largest tile reservation.
///
/// `replication` is the number of buffer slices each reservation is
/// duplicated into; it multiplies the amount taken from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastMax {
    pub replication: u64,
}

impl TileReductionPolicy for BroadcastMax {
    fn name(&self) -> &'static str {
        "broadcast_max"
    }

    fn tiles_total_reserved(&self, tile_reserved: &[u64]) -> u64 {
        let max = tile_reserved.iter().copied().max().unwrap_or(0);
        max.saturating_mul(tile_reserved.len() as u64)
    }

    fn shared_size(&self, pool_size: u64, tile_reserved: &[u64]) -> Option<u64> {
        let max = tile_reserved.iter().copied().max().unwrap_or(0);
        let total = max.checked_mul(tile_reserved.len() as u64)?;
        pool_size.checked_sub(total.checked_mul(self.replication)?)
    }
}

/// Each tile keeps only its own reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PerTileSum;

impl TileReductionPolicy for PerTileSum {
    fn name(&self) -> &'static str {
        "per_tile_sum"
    }

    fn tiles_total_reserved(&self, tile_reserved: &[u64]) -> u64 {
        tile_reserved.iter().fold(0u64, |acc, r| acc.saturating_add(*r))
    }

    fn shared_size(&self, pool_size: u64, tile_reserved: &[u64]) -> Option<u64> {
        let total = tile_reserved
            .iter()
            .try_fold(0u64, |acc, r| acc.checked_add(*r))?;
        pool_size.checked_sub(total)
    }
}

/// Policy selector as it appears in the hardware profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionKind {
    #[default]
    BroadcastMax,
    PerTileSum,
}

impl ReductionKind {
    pub fn build(self, replication: u64) -> Box<dyn TileReductionPolicy> {
        match self {
            ReductionKind::BroadcastMax => Box::new(BroadcastMax { replication }),
            ReductionKind::PerTileSum => Box::new(PerTileSum),
        }
    }
}
