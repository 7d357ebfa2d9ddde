//! Buffer accounting: derives pool shared sizes from reservations.
//!
//! Every mutation that can move reserved bytes is first described as a
//! [`Change`]. [`Accounting`] evaluates the affected pools as if the change
//! had already happened, without touching the store, and returns the new
//! totals only if every pool still fits. The caller applies the structural
//! change and the totals together, so a rejected request never leaves a
//! partially updated pool behind.
//!
//! Reservation rules:
//! - Only profiles with at least one consumer reserve memory.
//! - Non-tiled hardware: each attached profile reserves its size once.
//! - Tiled hardware: an attached profile reserves its size, plus PFC
//!   headroom `max(xoff, xon)` for ingress pools, on every tile where it
//!   has a consumer. The tile reduction policy folds the tiles into the
//!   pool's shared size.

use sonic_orch_common::ObjectStore;
use sonic_sai::{ObjectKey, SaiError, SaiResult};

use super::types::{BufferList, BufferObject, BufferPoolType};
use crate::capability::HardwareCapability;

/// A pending mutation, evaluated before it is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Attach a consumer to a profile, or detach it with `None`.
    Bind {
        consumer: ObjectKey,
        profile: Option<ObjectKey>,
    },
    ProfileSize { profile: ObjectKey, size: u64 },
    ProfileHeadroom { profile: ObjectKey, xoff: u64, xon: u64 },
    ProfilePool { profile: ObjectKey, pool: ObjectKey },
    PoolSize { pool: ObjectKey, size: u64 },
    /// No structural change; re-derive a pool as it stands.
    Recompute { pool: ObjectKey },
}

/// Derived figures of one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolTotals {
    pub shared_size: u64,
    pub tile_reserved: Vec<u64>,
    pub tiles_total_reserved_size: u64,
}

/// New totals for every pool a change touches.
pub type AccountingPlan = Vec<(ObjectKey, PoolTotals)>;

/// What-if evaluator over the committed store.
pub struct Accounting<'a> {
    store: &'a ObjectStore<BufferObject>,
    capability: &'a dyn HardwareCapability,
    change: Change,
}

impl<'a> Accounting<'a> {
    pub fn new(
        store: &'a ObjectStore<BufferObject>,
        capability: &'a dyn HardwareCapability,
        change: Change,
    ) -> Self {
        Self {
            store,
            capability,
            change,
        }
    }

    /// Evaluates the change and returns the totals to commit.
    ///
    /// Fails with `InsufficientResources` if any affected pool would end up
    /// with a negative shared size.
    pub fn plan(&self) -> SaiResult<AccountingPlan> {
        self.affected_pools()?
            .into_iter()
            .map(|pool| Ok((pool, self.pool_totals(&pool)?)))
            .collect()
    }

    /// Pools whose totals depend on the change.
    pub fn affected_pools(&self) -> SaiResult<Vec<ObjectKey>> {
        let mut pools = Vec::with_capacity(2);
        match self.change {
            Change::Bind { consumer, profile } => {
                if let Some(current) = self.store.get(&consumer)?.attached_profile() {
                    pools.push(self.pool_of(&current)?);
                }
                if let Some(profile) = profile {
                    pools.push(self.pool_of(&profile)?);
                }
            }
            Change::ProfileSize { profile, .. } | Change::ProfileHeadroom { profile, .. } => {
                pools.push(self.pool_of(&profile)?);
            }
            Change::ProfilePool { profile, pool } => {
                pools.push(self.pool_of(&profile)?);
                pools.push(pool);
            }
            Change::PoolSize { pool, .. } | Change::Recompute { pool } => pools.push(pool),
        }
        pools.dedup();
        Ok(pools)
    }

    /// Derives one pool's totals as if the change were applied.
    pub fn pool_totals(&self, pool: &ObjectKey) -> SaiResult<PoolTotals> {
        let (size, pool_type) = self.pool_size(pool)?;
        let profiles = self.profiles_of(pool)?;

        if !self.capability.is_tiled() {
            let mut reserved = 0u64;
            for profile in &profiles {
                if self.consumers_of(profile)?.is_empty() {
                    continue;
                }
                let (profile_size, _) = self.profile_charge(profile)?;
                reserved = reserved
                    .checked_add(profile_size)
                    .ok_or_else(|| overflow(pool))?;
            }
            let shared_size = size.checked_sub(reserved).ok_or_else(|| {
                SaiError::insufficient_resources(format!(
                    "pool {} of {} bytes cannot hold {} reserved bytes",
                    pool, size, reserved
                ))
            })?;
            return Ok(PoolTotals {
                shared_size,
                tile_reserved: Vec::new(),
                tiles_total_reserved_size: 0,
            });
        }

        let tiles = self.capability.tile_count() as usize;
        let mut tile_reserved = vec![0u64; tiles];
        for profile in &profiles {
            let consumers = self.consumers_of(profile)?;
            if consumers.is_empty() {
                continue;
            }
            let (profile_size, headroom) = self.profile_charge(profile)?;
            let charge = match pool_type {
                BufferPoolType::Ingress => profile_size.checked_add(headroom),
                BufferPoolType::Egress => Some(profile_size),
            }
            .ok_or_else(|| overflow(pool))?;

            let mut touched = vec![false; tiles];
            for consumer in &consumers {
                let tile = self.tile_of_consumer(consumer)? as usize;
                touched[tile.min(tiles - 1)] = true;
            }
            for (reserved, _) in tile_reserved
                .iter_mut()
                .zip(touched)
                .filter(|(_, touched)| *touched)
            {
                *reserved = reserved.checked_add(charge).ok_or_else(|| overflow(pool))?;
            }
        }

        let policy = self.capability.tile_reduction();
        let shared_size = policy.shared_size(size, &tile_reserved).ok_or_else(|| {
            SaiError::insufficient_resources(format!(
                "pool {} of {} bytes cannot hold tile reservations {:?} ({})",
                pool,
                size,
                tile_reserved,
                policy.name()
            ))
        })?;

        Ok(PoolTotals {
            shared_size,
            tiles_total_reserved_size: policy.tiles_total_reserved(&tile_reserved),
            tile_reserved,
        })
    }

    fn pool_size(&self, pool: &ObjectKey) -> SaiResult<(u64, BufferPoolType)> {
        let entry = self
            .store
            .get(pool)?
            .as_pool()
            .ok_or_else(|| SaiError::not_found(format!("buffer pool {}", pool)))?;
        let size = match self.change {
            Change::PoolSize { pool: p, size } if p == *pool => size,
            _ => entry.size,
        };
        Ok((size, entry.pool_type))
    }

    fn pool_of(&self, profile: &ObjectKey) -> SaiResult<ObjectKey> {
        self.store
            .get(profile)?
            .as_profile()
            .and_then(|p| p.pool())
            .ok_or_else(|| SaiError::not_found(format!("pool of buffer profile {}", profile)))
    }

    fn profiles_of(&self, pool: &ObjectKey) -> SaiResult<Vec<ObjectKey>> {
        let mut profiles: Vec<ObjectKey> =
            self.store.members(BufferList::PoolProfiles, pool)?.collect();
        if let Change::ProfilePool {
            profile,
            pool: target,
        } = self.change
        {
            profiles.retain(|p| *p != profile);
            if target == *pool {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }

    fn consumers_of(&self, profile: &ObjectKey) -> SaiResult<Vec<ObjectKey>> {
        let mut consumers: Vec<ObjectKey> = self
            .store
            .members(BufferList::ProfileConsumers, profile)?
            .collect();
        if let Change::Bind {
            consumer,
            profile: target,
        } = self.change
        {
            consumers.retain(|c| *c != consumer);
            if target == Some(*profile) {
                consumers.push(consumer);
            }
        }
        Ok(consumers)
    }

    /// Returns `(size, headroom)` of a profile under the change.
    fn profile_charge(&self, profile: &ObjectKey) -> SaiResult<(u64, u64)> {
        let entry = self
            .store
            .get(profile)?
            .as_profile()
            .ok_or_else(|| SaiError::not_found(format!("buffer profile {}", profile)))?;
        let size = match self.change {
            Change::ProfileSize { profile: p, size } if p == *profile => size,
            _ => entry.size,
        };
        let headroom = match self.change {
            Change::ProfileHeadroom { profile: p, xoff, xon } if p == *profile => xoff.max(xon),
            _ => entry.headroom(),
        };
        Ok((size, headroom))
    }

    fn tile_of_consumer(&self, consumer: &ObjectKey) -> SaiResult<u32> {
        let record = self.store.get(consumer)?;
        let port = match record {
            BufferObject::Port(port) => return Ok(port.tile),
            other => other.parent_port().ok_or_else(|| {
                SaiError::invalid_parameter(format!("{} is not a buffer consumer", consumer))
            })?,
        };
        self.store
            .get(&port)?
            .as_port()
            .map(|p| p.tile)
            .ok_or_else(|| SaiError::not_found(format!("port {}", port)))
    }
}

fn overflow(pool: &ObjectKey) -> SaiError {
    SaiError::insufficient_resources(format!("reservation overflow in pool {}", pool))
}
