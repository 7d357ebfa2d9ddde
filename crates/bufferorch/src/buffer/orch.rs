//! Buffer orchestration logic.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use sonic_orch_common::ObjectStore;
use sonic_sai::{
    BufferPoolAttr, BufferPoolOid, BufferProfileAttr, BufferProfileOid, IngressPriorityGroupAttr,
    IngressPriorityGroupOid, ObjectKey, PortAttr, PortOid, QueueAttr, QueueOid, RawSaiObjectId,
    SaiAttrId, SaiAttribute, SaiAttributeValue, SaiError, SaiObjectId, SaiObjectKind,
    SaiObjectType, SaiResult,
};
use tracing::{debug, info};

use super::accounting::{Accounting, AccountingPlan, Change};
use super::types::{
    effective_threshold_mode, BufferList, BufferObject, BufferPoolEntry, BufferPoolType,
    BufferProfileEntry, BufferStats, ConsumerSnapshot, ObjectSnapshot, PoolSnapshot,
    PortEntry, PortSnapshot, PriorityGroupEntry, ProfileSnapshot, ProfileThresholdMode,
    QueueEntry, Threshold, ThresholdMode,
};
use crate::audit::{AuditCategory, AuditRecord};
use crate::audit_log;
use crate::capability::{HardwareCapability, StaticCapability};
use crate::config::BufferOrchConfig;
use crate::validation::find_attr;

#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferOrchStats {
    pub stats: BufferStats,
    /// Rejected requests of any kind.
    pub errors: u64,
}

/// Hook towards the hardware-programming side.
///
/// Called after a mutation has been committed, never for rejected requests.
/// Snapshots carry the finalized state, so a pool is announced after the
/// totals of every profile it serves have been written.
pub trait BufferOrchCallbacks: Send + Sync {
    fn on_pool_state_changed(&self, pool: BufferPoolOid, snapshot: &PoolSnapshot);
    fn on_pool_removed(&self, pool: BufferPoolOid);
    fn on_profile_state_changed(&self, profile: BufferProfileOid, snapshot: &ProfileSnapshot);
    fn on_profile_removed(&self, profile: BufferProfileOid);
}

/// Parameters of a new buffer profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParams {
    pub pool: BufferPoolOid,
    pub size: u64,
    pub threshold_mode: ProfileThresholdMode,
    pub threshold: Threshold,
    pub xoff_threshold: Option<u64>,
    pub xon_threshold: Option<u64>,
}

impl ProfileParams {
    /// A profile inheriting a dynamic pool's mode.
    pub fn dynamic(pool: BufferPoolOid, size: u64, alpha: i8) -> Self {
        Self {
            pool,
            size,
            threshold_mode: ProfileThresholdMode::Inherited,
            threshold: Threshold::Dynamic(alpha),
            xoff_threshold: None,
            xon_threshold: None,
        }
    }

    /// A profile inheriting a static pool's mode.
    pub fn static_limit(pool: BufferPoolOid, size: u64, limit: u64) -> Self {
        Self {
            threshold: Threshold::Static(limit),
            ..Self::dynamic(pool, size, 0)
        }
    }

    pub fn with_mode(mut self, threshold_mode: ProfileThresholdMode) -> Self {
        self.threshold_mode = threshold_mode;
        self
    }

    pub fn with_headroom(mut self, xoff: u64, xon: u64) -> Self {
        self.xoff_threshold = Some(xoff);
        self.xon_threshold = Some(xon);
        self
    }

    pub fn to_attributes(&self) -> Vec<SaiAttribute> {
        let mut attrs = vec![
            SaiAttribute::new(
                BufferProfileAttr::PoolId,
                SaiAttributeValue::Oid(self.pool.as_raw()),
            ),
            SaiAttribute::new(
                BufferProfileAttr::ReservedBufferSize,
                SaiAttributeValue::U64(self.size),
            ),
        ];
        if self.threshold_mode.is_explicit() {
            attrs.push(SaiAttribute::new(
                BufferProfileAttr::ThresholdMode,
                SaiAttributeValue::S32(self.threshold_mode.to_sai()),
            ));
        }
        attrs.push(match self.threshold {
            Threshold::Dynamic(alpha) => {
                SaiAttribute::new(BufferProfileAttr::SharedDynamicTh, SaiAttributeValue::I8(alpha))
            }
            Threshold::Static(limit) => {
                SaiAttribute::new(BufferProfileAttr::SharedStaticTh, SaiAttributeValue::U64(limit))
            }
        });
        if let Some(xoff) = self.xoff_threshold {
            attrs.push(SaiAttribute::new(BufferProfileAttr::XoffTh, SaiAttributeValue::U64(xoff)));
        }
        if let Some(xon) = self.xon_threshold {
            attrs.push(SaiAttribute::new(BufferProfileAttr::XonTh, SaiAttributeValue::U64(xon)));
        }
        attrs
    }
}

/// Shared buffer resource manager.
///
/// Owns every pool, profile, priority group, queue and port record of one
/// switch, keeps pool shared sizes consistent with the profiles attached to
/// consumers, and rejects any request that would overcommit buffer memory.
pub struct BufferOrch {
    capability: Arc<dyn HardwareCapability>,
    store: ObjectStore<BufferObject>,
    callbacks: Option<Arc<dyn BufferOrchCallbacks>>,
    stats: BufferOrchStats,
}

impl BufferOrch {
    pub fn new(capability: Arc<dyn HardwareCapability>) -> Self {
        Self {
            capability,
            store: ObjectStore::new(),
            callbacks: None,
            stats: BufferOrchStats::default(),
        }
    }

    /// Creates an orch backed by the configured hardware profile.
    pub fn from_config(config: &BufferOrchConfig) -> Self {
        Self::new(Arc::new(StaticCapability::new(config.hardware.clone())))
    }

    pub fn set_callbacks(&mut self, callbacks: Arc<dyn BufferOrchCallbacks>) {
        self.callbacks = Some(callbacks);
    }

    pub fn capability(&self) -> &dyn HardwareCapability {
        self.capability.as_ref()
    }

    pub fn stats(&self) -> &BufferOrchStats {
        &self.stats
    }

    pub fn pool_count(&self) -> usize {
        self.store.count_kind(SaiObjectType::BufferPool)
    }

    pub fn profile_count(&self) -> usize {
        self.store.count_kind(SaiObjectType::BufferProfile)
    }

    pub(super) fn store(&self) -> &ObjectStore<BufferObject> {
        &self.store
    }

    pub(super) fn record_error(&mut self) {
        self.stats.errors = self.stats.errors.saturating_add(1);
    }

    // ---------------------------------------------------------------------
    // Ports
    // ---------------------------------------------------------------------

    /// Brings up a port with its priority groups and queues.
    ///
    /// Ports, priority groups and queues are never created through
    /// [`create`](Self::create); this is their only source.
    pub fn register_port(
        &mut self,
        hw_port_number: u32,
        num_priority_groups: u32,
        num_queues: u32,
    ) -> SaiResult<PortOid> {
        if self.find_port(hw_port_number).is_some() {
            return Err(SaiError::already_exists(format!(
                "port with hardware number {}",
                hw_port_number
            )));
        }

        let tile = self.capability.tile_of(hw_port_number);
        let port = self.store.insert_new(SaiObjectType::Port, |_| {
            BufferObject::Port(PortEntry {
                hw_port_number,
                tile,
                priority_groups: Default::default(),
                queues: Default::default(),
                profile_link: None,
                ref_count: 0,
            })
        })?;

        for index in 0..num_priority_groups {
            let pg = self
                .store
                .insert_new(SaiObjectType::IngressPriorityGroup, |_| {
                    BufferObject::PriorityGroup(PriorityGroupEntry {
                        index,
                        port_link: None,
                        profile_link: None,
                    })
                })?;
            self.store
                .attach(BufferList::PortPriorityGroups, &port, &pg)?;
        }
        for index in 0..num_queues {
            let queue = self.store.insert_new(SaiObjectType::Queue, |_| {
                BufferObject::Queue(QueueEntry {
                    index,
                    port_link: None,
                    profile_link: None,
                })
            })?;
            self.store.attach(BufferList::PortQueues, &port, &queue)?;
        }

        audit(
            AuditCategory::PortLifecycle,
            "register_port",
            Some(&port),
            Ok(json!({
                "hw_port_number": hw_port_number,
                "tile": tile,
                "priority_groups": num_priority_groups,
                "queues": num_queues,
            })),
        );
        typed(port)
    }

    pub fn find_port(&self, hw_port_number: u32) -> Option<PortOid> {
        self.store
            .iter_kind(SaiObjectType::Port)
            .find(|(_, record)| {
                record
                    .as_port()
                    .is_some_and(|p| p.hw_port_number == hw_port_number)
            })
            .and_then(|(key, _)| PortOid::from_key(*key))
    }

    /// Priority groups of a port, in index order.
    pub fn port_priority_groups(&self, port: PortOid) -> SaiResult<Vec<IngressPriorityGroupOid>> {
        self.store
            .members(BufferList::PortPriorityGroups, &port.key())?
            .map(typed)
            .collect()
    }

    /// Queues of a port, in index order.
    pub fn port_queues(&self, port: PortOid) -> SaiResult<Vec<QueueOid>> {
        self.store
            .members(BufferList::PortQueues, &port.key())?
            .map(typed)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Typed operations
    // ---------------------------------------------------------------------

    pub fn create_pool(
        &mut self,
        pool_type: BufferPoolType,
        size: u64,
        threshold_mode: Option<ThresholdMode>,
    ) -> SaiResult<BufferPoolOid> {
        let mut attrs = vec![
            SaiAttribute::new(BufferPoolAttr::Type, SaiAttributeValue::S32(pool_type.to_sai())),
            SaiAttribute::new(BufferPoolAttr::Size, SaiAttributeValue::U64(size)),
        ];
        if let Some(mode) = threshold_mode {
            attrs.push(SaiAttribute::new(
                BufferPoolAttr::ThresholdMode,
                SaiAttributeValue::S32(mode.to_sai()),
            ));
        }
        let oid = self.create(SaiObjectType::BufferPool, &attrs)?;
        typed_raw(oid)
    }

    pub fn create_profile(&mut self, params: &ProfileParams) -> SaiResult<BufferProfileOid> {
        let oid = self.create(SaiObjectType::BufferProfile, &params.to_attributes())?;
        typed_raw(oid)
    }

    pub fn set_pool_size(&mut self, pool: BufferPoolOid, size: u64) -> SaiResult<()> {
        self.set_attribute(
            pool.as_raw(),
            &SaiAttribute::new(BufferPoolAttr::Size, SaiAttributeValue::U64(size)),
        )
    }

    pub fn set_profile_attribute(
        &mut self,
        profile: BufferProfileOid,
        attr: BufferProfileAttr,
        value: SaiAttributeValue,
    ) -> SaiResult<()> {
        self.set_attribute(profile.as_raw(), &SaiAttribute::new(attr, value))
    }

    /// Attaches a profile to a priority group, or detaches it with `None`.
    pub fn set_pg_profile(
        &mut self,
        pg: IngressPriorityGroupOid,
        profile: Option<BufferProfileOid>,
    ) -> SaiResult<()> {
        self.set_attribute(
            pg.as_raw(),
            &profile_attr(IngressPriorityGroupAttr::BufferProfile, profile),
        )
    }

    pub fn set_queue_profile(
        &mut self,
        queue: QueueOid,
        profile: Option<BufferProfileOid>,
    ) -> SaiResult<()> {
        self.set_attribute(
            queue.as_raw(),
            &profile_attr(QueueAttr::BufferProfileId, profile),
        )
    }

    pub fn set_port_profile(
        &mut self,
        port: PortOid,
        profile: Option<BufferProfileOid>,
    ) -> SaiResult<()> {
        self.set_attribute(
            port.as_raw(),
            &profile_attr(PortAttr::QosIngressBufferProfile, profile),
        )
    }

    pub fn remove_pool(&mut self, pool: BufferPoolOid) -> SaiResult<()> {
        self.remove(pool.as_raw())
    }

    pub fn remove_profile(&mut self, profile: BufferProfileOid) -> SaiResult<()> {
        self.remove(profile.as_raw())
    }

    pub fn pool_snapshot(&self, pool: BufferPoolOid) -> SaiResult<PoolSnapshot> {
        let key = pool.key();
        Ok(PoolSnapshot::new(key, self.pool_entry(&key)?))
    }

    pub fn profile_snapshot(&self, profile: BufferProfileOid) -> SaiResult<ProfileSnapshot> {
        let key = profile.key();
        self.profile_snapshot_of(&key, self.profile_entry(&key)?)
    }

    /// Snapshots of every object, ports first, in store order.
    pub fn dump(&self) -> Vec<ObjectSnapshot> {
        let mut objects = Vec::with_capacity(self.store.len());
        let mut cursor = self.store.first_ordered();
        while let Some(key) = cursor {
            if let Ok(snapshot) = self.snapshot(&key) {
                objects.push(snapshot);
            }
            cursor = self.store.next_ordered(&key);
        }
        objects
    }

    pub fn snapshot(&self, key: &ObjectKey) -> SaiResult<ObjectSnapshot> {
        Ok(match self.store.get(key)? {
            BufferObject::Pool(pool) => ObjectSnapshot::BufferPool(PoolSnapshot::new(*key, pool)),
            BufferObject::Profile(profile) => {
                ObjectSnapshot::BufferProfile(self.profile_snapshot_of(key, profile)?)
            }
            BufferObject::PriorityGroup(pg) => {
                ObjectSnapshot::IngressPriorityGroup(ConsumerSnapshot {
                    oid: key.id,
                    port: pg.port_link.map_or(0, |l| l.owner.id),
                    index: pg.index,
                    profile: pg.profile_link.map(|l| l.owner.id),
                })
            }
            BufferObject::Queue(queue) => ObjectSnapshot::Queue(ConsumerSnapshot {
                oid: key.id,
                port: queue.port_link.map_or(0, |l| l.owner.id),
                index: queue.index,
                profile: queue.profile_link.map(|l| l.owner.id),
            }),
            BufferObject::Port(port) => ObjectSnapshot::Port(PortSnapshot {
                oid: key.id,
                hw_port_number: port.hw_port_number,
                tile: port.tile,
                priority_groups: port.priority_groups.len,
                queues: port.queues.len,
                profile: port.profile_link.map(|l| l.owner.id),
            }),
        })
    }

    // ---------------------------------------------------------------------
    // Pools
    // ---------------------------------------------------------------------

    pub(super) fn create_pool_from_attrs(&mut self, attrs: &[SaiAttribute]) -> SaiResult<ObjectKey> {
        let result = self.try_create_pool(attrs);
        match &result {
            Ok(key) => {
                self.stats.stats.pools_created = self.stats.stats.pools_created.saturating_add(1);
                info!(pool = %key, "Created buffer pool");
                audit(
                    AuditCategory::PoolLifecycle,
                    "create_buffer_pool",
                    Some(key),
                    Ok(self.details(key)),
                );
            }
            Err(err) => audit(AuditCategory::PoolLifecycle, "create_buffer_pool", None, Err(err)),
        }
        result
    }

    fn try_create_pool(&mut self, attrs: &[SaiAttribute]) -> SaiResult<ObjectKey> {
        let (type_index, raw_type) = required(
            attrs,
            BufferPoolAttr::Type.id(),
            BufferPoolAttr::Type.name(),
            SaiAttributeValue::as_s32,
        )?;
        let pool_type = BufferPoolType::from_sai(raw_type).ok_or_else(|| {
            SaiError::invalid_attribute_value(type_index, format!("unknown pool type {}", raw_type))
        })?;
        let (_, size) = required(
            attrs,
            BufferPoolAttr::Size.id(),
            BufferPoolAttr::Size.name(),
            SaiAttributeValue::as_u64,
        )?;
        let threshold_mode = match optional(
            attrs,
            BufferPoolAttr::ThresholdMode.id(),
            BufferPoolAttr::ThresholdMode.name(),
            SaiAttributeValue::as_s32,
        )? {
            Some((index, raw)) => ThresholdMode::from_sai(raw).ok_or_else(|| {
                SaiError::invalid_attribute_value(index, format!("unknown threshold mode {}", raw))
            })?,
            None => ThresholdMode::Dynamic,
        };

        self.check_direction_capacity(pool_type, None, size)?;

        let tiles = if self.capability.is_tiled() {
            self.capability.tile_count() as usize
        } else {
            0
        };
        let key = self.store.insert_new(SaiObjectType::BufferPool, |_| {
            BufferObject::Pool(BufferPoolEntry::new(pool_type, size, threshold_mode, tiles))
        })?;
        self.notify_pool(&key);
        Ok(key)
    }

    /// Checks a pool of `size` bytes fits next to the other pools of its
    /// direction. `resized` excludes a pool being resized from the sums.
    fn check_direction_capacity(
        &self,
        pool_type: BufferPoolType,
        resized: Option<&ObjectKey>,
        size: u64,
    ) -> SaiResult<()> {
        let mut count = 0u32;
        let mut total = size;
        for (key, record) in self.store.iter_kind(SaiObjectType::BufferPool) {
            let Some(pool) = record.as_pool() else {
                continue;
            };
            if pool.pool_type != pool_type || Some(key) == resized {
                continue;
            }
            count += 1;
            total = total.saturating_add(pool.size);
        }

        if resized.is_none() && count >= self.capability.max_pools_per_direction() {
            return Err(SaiError::insufficient_resources(format!(
                "{:?} pool limit of {} reached",
                pool_type,
                self.capability.max_pools_per_direction()
            )));
        }
        if total > self.capability.total_buffer_bytes() {
            return Err(SaiError::insufficient_resources(format!(
                "{:?} pools would need {} of {} buffer bytes",
                pool_type,
                total,
                self.capability.total_buffer_bytes()
            )));
        }
        Ok(())
    }

    pub(super) fn set_pool_attr(&mut self, pool: ObjectKey, attr: &SaiAttribute) -> SaiResult<()> {
        let result = match BufferPoolAttr::from_id(attr.id) {
            Some(BufferPoolAttr::Size) => value(attr, SaiAttributeValue::as_u64)
                .and_then(|size| self.resize_pool(pool, size)),
            Some(other) => Err(SaiError::invalid_attribute(
                0,
                format!("{} cannot be set", other.name()),
            )),
            None => Err(SaiError::unknown_attribute(0)),
        };
        audit(
            AuditCategory::AttributeChange,
            "set_buffer_pool_attribute",
            Some(&pool),
            result.as_ref().map(|_| self.details(&pool)),
        );
        result
    }

    fn resize_pool(&mut self, pool: ObjectKey, size: u64) -> SaiResult<()> {
        let pool_type = self.pool_entry(&pool)?.pool_type;
        self.check_direction_capacity(pool_type, Some(&pool), size)?;
        let plan = self.plan(Change::PoolSize { pool, size })?;
        self.pool_entry_mut(&pool)?.size = size;
        self.commit(plan)
    }

    fn destroy_pool(&mut self, pool: ObjectKey) -> SaiResult<()> {
        let result = self
            .store
            .remove_associated(&pool)
            .map(|_| ())
            .map_err(SaiError::from);
        match &result {
            Ok(()) => {
                self.stats.stats.pools_removed = self.stats.stats.pools_removed.saturating_add(1);
                info!(pool = %pool, "Removed buffer pool");
                audit(
                    AuditCategory::PoolLifecycle,
                    "remove_buffer_pool",
                    Some(&pool),
                    Ok(json!({})),
                );
                if let (Some(callbacks), Some(oid)) = (&self.callbacks, BufferPoolOid::from_key(pool))
                {
                    callbacks.on_pool_removed(oid);
                }
            }
            Err(err) => audit(
                AuditCategory::PoolLifecycle,
                "remove_buffer_pool",
                Some(&pool),
                Err(err),
            ),
        }
        result
    }

    // ---------------------------------------------------------------------
    // Profiles
    // ---------------------------------------------------------------------

    pub(super) fn create_profile_from_attrs(
        &mut self,
        attrs: &[SaiAttribute],
    ) -> SaiResult<ObjectKey> {
        let result = self.try_create_profile(attrs);
        match &result {
            Ok(key) => {
                self.stats.stats.profiles_created =
                    self.stats.stats.profiles_created.saturating_add(1);
                info!(profile = %key, "Created buffer profile");
                audit(
                    AuditCategory::ProfileLifecycle,
                    "create_buffer_profile",
                    Some(key),
                    Ok(self.details(key)),
                );
            }
            Err(err) => audit(
                AuditCategory::ProfileLifecycle,
                "create_buffer_profile",
                None,
                Err(err),
            ),
        }
        result
    }

    fn try_create_profile(&mut self, attrs: &[SaiAttribute]) -> SaiResult<ObjectKey> {
        let (pool_index, raw_pool) = required(
            attrs,
            BufferProfileAttr::PoolId.id(),
            BufferProfileAttr::PoolId.name(),
            SaiAttributeValue::as_oid,
        )?;
        let (_, size) = required(
            attrs,
            BufferProfileAttr::ReservedBufferSize.id(),
            BufferProfileAttr::ReservedBufferSize.name(),
            SaiAttributeValue::as_u64,
        )?;
        let pool = self
            .resolve(raw_pool, SaiObjectType::BufferPool)
            .ok_or_else(|| {
                SaiError::invalid_attribute_value(pool_index, format!("unknown buffer pool 0x{:x}", raw_pool))
            })?;
        let (pool_type, pool_mode) = {
            let entry = self.pool_entry(&pool)?;
            (entry.pool_type, entry.threshold_mode)
        };

        let threshold_mode = match optional(
            attrs,
            BufferProfileAttr::ThresholdMode.id(),
            BufferProfileAttr::ThresholdMode.name(),
            SaiAttributeValue::as_s32,
        )? {
            Some((index, raw)) => ProfileThresholdMode::from_sai(raw).ok_or_else(|| {
                SaiError::invalid_attribute_value(index, format!("unknown threshold mode {}", raw))
            })?,
            None => ProfileThresholdMode::Inherited,
        };
        let dynamic = optional(
            attrs,
            BufferProfileAttr::SharedDynamicTh.id(),
            BufferProfileAttr::SharedDynamicTh.name(),
            SaiAttributeValue::as_i8,
        )?;
        let fixed = optional(
            attrs,
            BufferProfileAttr::SharedStaticTh.id(),
            BufferProfileAttr::SharedStaticTh.name(),
            SaiAttributeValue::as_u64,
        )?;
        let threshold = resolve_threshold(
            effective_threshold_mode(threshold_mode, pool_mode),
            dynamic,
            fixed,
        )?;

        let xoff = optional(
            attrs,
            BufferProfileAttr::XoffTh.id(),
            BufferProfileAttr::XoffTh.name(),
            SaiAttributeValue::as_u64,
        )?;
        let xon = optional(
            attrs,
            BufferProfileAttr::XonTh.id(),
            BufferProfileAttr::XonTh.name(),
            SaiAttributeValue::as_u64,
        )?;
        if pool_type == BufferPoolType::Egress {
            let first = [xoff.map(|(i, _)| i), xon.map(|(i, _)| i)]
                .into_iter()
                .flatten()
                .min();
            if let Some(index) = first {
                return Err(SaiError::invalid_attribute(
                    index,
                    "headroom thresholds apply to ingress pools only",
                ));
            }
        }

        let key = self.store.insert_new(SaiObjectType::BufferProfile, |_| {
            BufferObject::Profile(BufferProfileEntry {
                size,
                threshold_mode,
                threshold,
                xoff_threshold: xoff.map_or(0, |(_, v)| v),
                xon_threshold: xon.map_or(0, |(_, v)| v),
                pool_link: None,
                consumers: Default::default(),
                ref_count: 0,
            })
        })?;
        if let Err(err) = self.store.attach(BufferList::PoolProfiles, &pool, &key) {
            self.store.remove(&key);
            self.store.release(&key);
            return Err(err.into());
        }
        self.notify_pool(&pool);
        self.notify_profile(&key);
        Ok(key)
    }

    pub(super) fn set_profile_attr(
        &mut self,
        profile: ObjectKey,
        attr: &SaiAttribute,
    ) -> SaiResult<()> {
        let result = match BufferProfileAttr::from_id(attr.id) {
            Some(BufferProfileAttr::PoolId) => {
                value(attr, SaiAttributeValue::as_oid).and_then(|pool| self.move_profile(profile, pool))
            }
            Some(BufferProfileAttr::ReservedBufferSize) => value(attr, SaiAttributeValue::as_u64)
                .and_then(|size| self.resize_profile(profile, size)),
            Some(BufferProfileAttr::SharedDynamicTh) => value(attr, SaiAttributeValue::as_i8)
                .and_then(|alpha| self.set_threshold(profile, Threshold::Dynamic(alpha))),
            Some(BufferProfileAttr::SharedStaticTh) => value(attr, SaiAttributeValue::as_u64)
                .and_then(|limit| self.set_threshold(profile, Threshold::Static(limit))),
            Some(BufferProfileAttr::XoffTh) => value(attr, SaiAttributeValue::as_u64)
                .and_then(|xoff| self.set_headroom(profile, Some(xoff), None)),
            Some(BufferProfileAttr::XonTh) => value(attr, SaiAttributeValue::as_u64)
                .and_then(|xon| self.set_headroom(profile, None, Some(xon))),
            Some(other) => Err(SaiError::invalid_attribute(
                0,
                format!("{} cannot be set", other.name()),
            )),
            None => Err(SaiError::unknown_attribute(0)),
        };
        audit(
            AuditCategory::AttributeChange,
            "set_buffer_profile_attribute",
            Some(&profile),
            result.as_ref().map(|_| self.details(&profile)),
        );
        result
    }

    /// Moves a profile, with its consumers, to another pool.
    ///
    /// The target must have the same direction, and its mode must equal the
    /// profile's effective mode. This also binds inherited profiles: a profile
    /// holds exactly one threshold, the one of its effective mode, and a pool
    /// of the other mode would leave it without an active threshold.
    fn move_profile(&mut self, profile: ObjectKey, raw_pool: RawSaiObjectId) -> SaiResult<()> {
        let target = self
            .resolve(raw_pool, SaiObjectType::BufferPool)
            .ok_or_else(|| {
                SaiError::invalid_attribute_value(0, format!("unknown buffer pool 0x{:x}", raw_pool))
            })?;
        let (current, profile_mode) = {
            let entry = self.profile_entry(&profile)?;
            (self.pool_of(&profile, entry)?, entry.threshold_mode)
        };
        if current == target {
            return Ok(());
        }

        let (current_type, current_mode) = {
            let entry = self.pool_entry(&current)?;
            (entry.pool_type, entry.threshold_mode)
        };
        let (target_type, target_mode) = {
            let entry = self.pool_entry(&target)?;
            (entry.pool_type, entry.threshold_mode)
        };
        if current_type != target_type {
            return Err(SaiError::invalid_attribute(
                0,
                format!("cannot move a {:?} profile to a {:?} pool", current_type, target_type),
            ));
        }
        let required_mode = effective_threshold_mode(profile_mode, current_mode);
        if target_mode != required_mode {
            return Err(SaiError::invalid_attribute(
                0,
                format!(
                    "profile needs a {:?} pool, target is {:?}",
                    required_mode, target_mode
                ),
            ));
        }

        let plan = self.plan(Change::ProfilePool {
            profile,
            pool: target,
        })?;
        self.store
            .detach(BufferList::PoolProfiles, &current, &profile)?;
        self.store.attach(BufferList::PoolProfiles, &target, &profile)?;
        debug!(profile = %profile, from = %current, to = %target, "Moved buffer profile");
        self.commit(plan)?;
        self.notify_profile(&profile);
        Ok(())
    }

    fn resize_profile(&mut self, profile: ObjectKey, size: u64) -> SaiResult<()> {
        let plan = self.plan(Change::ProfileSize { profile, size })?;
        self.profile_entry_mut(&profile)?.size = size;
        self.commit(plan)?;
        self.notify_profile(&profile);
        Ok(())
    }

    /// Thresholds leave the totals alone, but the owning pool is still
    /// re-announced so hardware sees the profile under its pool.
    fn set_threshold(&mut self, profile: ObjectKey, threshold: Threshold) -> SaiResult<()> {
        let (pool, effective) = {
            let entry = self.profile_entry(&profile)?;
            let pool = self.pool_of(&profile, entry)?;
            let mode =
                effective_threshold_mode(entry.threshold_mode, self.pool_entry(&pool)?.threshold_mode);
            (pool, mode)
        };
        if threshold.mode() != effective {
            return Err(SaiError::invalid_attribute(
                0,
                format!("profile threshold mode is {:?}", effective),
            ));
        }
        self.profile_entry_mut(&profile)?.threshold = threshold;
        self.notify_pool(&pool);
        self.notify_profile(&profile);
        Ok(())
    }

    fn set_headroom(
        &mut self,
        profile: ObjectKey,
        xoff: Option<u64>,
        xon: Option<u64>,
    ) -> SaiResult<()> {
        let (pool, current_xoff, current_xon) = {
            let entry = self.profile_entry(&profile)?;
            (
                self.pool_of(&profile, entry)?,
                entry.xoff_threshold,
                entry.xon_threshold,
            )
        };
        if self.pool_entry(&pool)?.pool_type != BufferPoolType::Ingress {
            return Err(SaiError::invalid_attribute(
                0,
                "headroom thresholds apply to ingress pools only",
            ));
        }

        let xoff = xoff.unwrap_or(current_xoff);
        let xon = xon.unwrap_or(current_xon);
        let plan = self.plan(Change::ProfileHeadroom { profile, xoff, xon })?;
        let entry = self.profile_entry_mut(&profile)?;
        entry.xoff_threshold = xoff;
        entry.xon_threshold = xon;
        self.commit(plan)?;
        self.notify_profile(&profile);
        Ok(())
    }

    fn destroy_profile(&mut self, profile: ObjectKey) -> SaiResult<()> {
        let result = self.try_destroy_profile(profile);
        match &result {
            Ok(()) => {
                self.stats.stats.profiles_removed =
                    self.stats.stats.profiles_removed.saturating_add(1);
                info!(profile = %profile, "Removed buffer profile");
                audit(
                    AuditCategory::ProfileLifecycle,
                    "remove_buffer_profile",
                    Some(&profile),
                    Ok(json!({})),
                );
                if let (Some(callbacks), Some(oid)) =
                    (&self.callbacks, BufferProfileOid::from_key(profile))
                {
                    callbacks.on_profile_removed(oid);
                }
            }
            Err(err) => audit(
                AuditCategory::ProfileLifecycle,
                "remove_buffer_profile",
                Some(&profile),
                Err(err),
            ),
        }
        result
    }

    fn try_destroy_profile(&mut self, profile: ObjectKey) -> SaiResult<()> {
        let pool = {
            let entry = self.profile_entry(&profile)?;
            self.pool_of(&profile, entry)?
        };
        self.store.remove_associated(&profile)?;
        let plan = self.plan(Change::Recompute { pool })?;
        self.commit(plan)
    }

    // ---------------------------------------------------------------------
    // Consumers
    // ---------------------------------------------------------------------

    /// Points a priority group, queue or port at a profile; a null id
    /// detaches.
    pub(super) fn bind_consumer(
        &mut self,
        consumer: ObjectKey,
        raw_profile: RawSaiObjectId,
    ) -> SaiResult<()> {
        let result = self.try_bind(consumer, raw_profile);
        match &result {
            Ok(Some(target)) => {
                let stats = &mut self.stats.stats;
                let counter = match (target, consumer.object_type) {
                    (None, _) => &mut stats.unbindings,
                    (Some(_), SaiObjectType::IngressPriorityGroup) => &mut stats.pg_bindings,
                    (Some(_), SaiObjectType::Queue) => &mut stats.queue_bindings,
                    (Some(_), _) => &mut stats.port_bindings,
                };
                *counter = counter.saturating_add(1);
                audit(
                    AuditCategory::ConsumerBinding,
                    "bind_buffer_profile",
                    Some(&consumer),
                    Ok(json!({ "profile": target.map(|k| k.to_string()) })),
                );
            }
            Ok(None) => debug!(consumer = %consumer, "Buffer profile binding unchanged"),
            Err(err) => audit(
                AuditCategory::ConsumerBinding,
                "bind_buffer_profile",
                Some(&consumer),
                Err(err),
            ),
        }
        result.map(|_| ())
    }

    /// Returns the new binding, or `None` if nothing changed.
    fn try_bind(
        &mut self,
        consumer: ObjectKey,
        raw_profile: RawSaiObjectId,
    ) -> SaiResult<Option<Option<ObjectKey>>> {
        let target = if raw_profile == 0 {
            None
        } else {
            let profile = self
                .resolve(raw_profile, SaiObjectType::BufferProfile)
                .ok_or_else(|| {
                    SaiError::invalid_attribute_value(
                        0,
                        format!("0x{:x} is not a buffer profile", raw_profile),
                    )
                })?;
            let pool_type = {
                let entry = self.profile_entry(&profile)?;
                self.pool_entry(&self.pool_of(&profile, entry)?)?.pool_type
            };
            if !pool_type.accepts(consumer.object_type) {
                return Err(SaiError::invalid_attribute_value(
                    0,
                    format!(
                        "{:?} pool cannot serve {}",
                        pool_type, consumer.object_type
                    ),
                ));
            }
            Some(profile)
        };

        let current = self.store.get(&consumer)?.attached_profile();
        if current == target {
            return Ok(None);
        }

        let plan = self.plan(Change::Bind {
            consumer,
            profile: target,
        })?;
        if let Some(current) = current {
            self.store
                .detach(BufferList::ProfileConsumers, &current, &consumer)?;
        }
        if let Some(target) = target {
            self.store
                .attach(BufferList::ProfileConsumers, &target, &consumer)?;
        }
        self.commit(plan)?;
        for profile in current.iter().chain(target.iter()) {
            self.notify_profile(profile);
        }
        Ok(Some(target))
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    pub(super) fn destroy(&mut self, key: ObjectKey) -> SaiResult<()> {
        match key.object_type {
            SaiObjectType::BufferPool => self.destroy_pool(key),
            SaiObjectType::BufferProfile => self.destroy_profile(key),
            other => Err(SaiError::not_supported(format!(
                "removing {} objects",
                other
            ))),
        }
    }

    fn plan(&self, change: Change) -> SaiResult<AccountingPlan> {
        Accounting::new(&self.store, self.capability.as_ref(), change).plan()
    }

    /// Writes planned totals and announces every touched pool.
    fn commit(&mut self, plan: AccountingPlan) -> SaiResult<()> {
        let mut touched = Vec::with_capacity(plan.len());
        for (pool, totals) in plan {
            let entry = self.pool_entry_mut(&pool)?;
            entry.shared_size = totals.shared_size;
            entry.tile_reserved = totals.tile_reserved;
            entry.tiles_total_reserved_size = totals.tiles_total_reserved_size;
            debug!(
                pool = %pool,
                shared_size = entry.shared_size,
                tiles_total_reserved_size = entry.tiles_total_reserved_size,
                "Committed buffer pool totals"
            );
            touched.push(pool);
        }
        for pool in &touched {
            self.notify_pool(pool);
        }
        Ok(())
    }

    fn notify_pool(&self, pool: &ObjectKey) {
        let Some(callbacks) = &self.callbacks else {
            return;
        };
        if let (Some(oid), Ok(entry)) = (BufferPoolOid::from_key(*pool), self.pool_entry(pool)) {
            callbacks.on_pool_state_changed(oid, &PoolSnapshot::new(*pool, entry));
        }
    }

    fn notify_profile(&self, profile: &ObjectKey) {
        let Some(callbacks) = &self.callbacks else {
            return;
        };
        let snapshot = self
            .profile_entry(profile)
            .and_then(|entry| self.profile_snapshot_of(profile, entry));
        if let (Some(oid), Ok(snapshot)) = (BufferProfileOid::from_key(*profile), snapshot) {
            callbacks.on_profile_state_changed(oid, &snapshot);
        }
    }

    /// Resolves a raw id to a live object of the expected type.
    pub(super) fn resolve(
        &self,
        raw: RawSaiObjectId,
        object_type: SaiObjectType,
    ) -> Option<ObjectKey> {
        ObjectKey::from_raw(raw)
            .filter(|key| key.object_type == object_type && self.store.contains(key))
    }

    fn pool_entry(&self, pool: &ObjectKey) -> SaiResult<&BufferPoolEntry> {
        self.store
            .get(pool)?
            .as_pool()
            .ok_or_else(|| SaiError::not_found(format!("buffer pool {}", pool)))
    }

    fn pool_entry_mut(&mut self, pool: &ObjectKey) -> SaiResult<&mut BufferPoolEntry> {
        self.store
            .get_mut(pool)?
            .as_pool_mut()
            .ok_or_else(|| SaiError::not_found(format!("buffer pool {}", pool)))
    }

    fn profile_entry(&self, profile: &ObjectKey) -> SaiResult<&BufferProfileEntry> {
        self.store
            .get(profile)?
            .as_profile()
            .ok_or_else(|| SaiError::not_found(format!("buffer profile {}", profile)))
    }

    fn profile_entry_mut(&mut self, profile: &ObjectKey) -> SaiResult<&mut BufferProfileEntry> {
        self.store
            .get_mut(profile)?
            .as_profile_mut()
            .ok_or_else(|| SaiError::not_found(format!("buffer profile {}", profile)))
    }

    fn pool_of(&self, profile: &ObjectKey, entry: &BufferProfileEntry) -> SaiResult<ObjectKey> {
        entry
            .pool()
            .ok_or_else(|| SaiError::not_found(format!("pool of buffer profile {}", profile)))
    }

    fn profile_snapshot_of(
        &self,
        key: &ObjectKey,
        profile: &BufferProfileEntry,
    ) -> SaiResult<ProfileSnapshot> {
        let pool = self.pool_of(key, profile)?;
        let pool_mode = self.pool_entry(&pool)?.threshold_mode;
        Ok(ProfileSnapshot {
            oid: key.id,
            pool: pool.id,
            size: profile.size,
            threshold_mode: profile.threshold_mode,
            effective_mode: effective_threshold_mode(profile.threshold_mode, pool_mode),
            threshold: profile.threshold,
            xoff_threshold: profile.xoff_threshold,
            xon_threshold: profile.xon_threshold,
            reference_count: profile.ref_count,
            consumers: self
                .store
                .members(BufferList::ProfileConsumers, key)?
                .map(|consumer| consumer.id)
                .collect(),
        })
    }

    fn details(&self, key: &ObjectKey) -> serde_json::Value {
        self.snapshot(key)
            .ok()
            .and_then(|snapshot| serde_json::to_value(snapshot).ok())
            .unwrap_or_default()
    }
}

impl fmt::Debug for BufferOrch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferOrch")
            .field("objects", &self.store.len())
            .field("pools", &self.pool_count())
            .field("profiles", &self.profile_count())
            .field("tiled", &self.capability.is_tiled())
            .field("has_callbacks", &self.callbacks.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}

fn audit(
    category: AuditCategory,
    action: &str,
    object: Option<&ObjectKey>,
    result: Result<serde_json::Value, &SaiError>,
) {
    let mut record = AuditRecord::new(category, "BufferOrch", action);
    if let Some(key) = object {
        record = record.with_object(key);
    }
    let record = match result {
        Ok(details) => record.with_details(details),
        Err(err) => record.with_rejection(err),
    };
    audit_log!(record);
}

fn typed<T: SaiObjectKind>(key: ObjectKey) -> SaiResult<SaiObjectId<T>> {
    SaiObjectId::from_key(key).ok_or_else(|| {
        SaiError::invalid_parameter(format!("{:?} is not a {}", key, T::type_name()))
    })
}

fn typed_raw<T: SaiObjectKind>(raw: RawSaiObjectId) -> SaiResult<SaiObjectId<T>> {
    SaiObjectId::from_raw(raw).ok_or_else(|| {
        SaiError::invalid_parameter(format!("0x{:016x} is not a {}", raw, T::type_name()))
    })
}

fn profile_attr(
    id: impl Into<SaiAttrId>,
    profile: Option<BufferProfileOid>,
) -> SaiAttribute {
    SaiAttribute::new(
        id,
        SaiAttributeValue::Oid(profile.map_or(0, |p| p.as_raw())),
    )
}

fn required<T>(
    attrs: &[SaiAttribute],
    id: SaiAttrId,
    name: &str,
    decode: impl FnOnce(&SaiAttributeValue) -> Option<T>,
) -> SaiResult<(usize, T)> {
    optional(attrs, id, name, decode)?.ok_or_else(|| SaiError::mandatory_missing(name))
}

fn optional<T>(
    attrs: &[SaiAttribute],
    id: SaiAttrId,
    name: &str,
    decode: impl FnOnce(&SaiAttributeValue) -> Option<T>,
) -> SaiResult<Option<(usize, T)>> {
    match find_attr(attrs, id) {
        Some((index, attr)) => decode(&attr.value).map(|v| Some((index, v))).ok_or_else(|| {
            SaiError::invalid_attribute_value(index, format!("bad value for {}", name))
        }),
        None => Ok(None),
    }
}

fn value<T>(
    attr: &SaiAttribute,
    decode: impl FnOnce(&SaiAttributeValue) -> Option<T>,
) -> SaiResult<T> {
    decode(&attr.value)
        .ok_or_else(|| SaiError::invalid_attribute_value(0, format!("bad value {:?}", attr.value)))
}

/// Picks the threshold matching the profile's effective mode.
fn resolve_threshold(
    effective: ThresholdMode,
    dynamic: Option<(usize, i8)>,
    fixed: Option<(usize, u64)>,
) -> SaiResult<Threshold> {
    if dynamic.is_some() && fixed.is_some() {
        return Err(SaiError::invalid_parameter(
            "static and dynamic thresholds are mutually exclusive",
        ));
    }
    match effective {
        ThresholdMode::Dynamic => {
            if let Some((index, _)) = fixed {
                return Err(SaiError::invalid_attribute(
                    index,
                    "static threshold on a dynamic profile",
                ));
            }
            dynamic
                .map(|(_, alpha)| Threshold::Dynamic(alpha))
                .ok_or_else(|| {
                    SaiError::mandatory_missing(BufferProfileAttr::SharedDynamicTh.name())
                })
        }
        ThresholdMode::Static => {
            if let Some((index, _)) = dynamic {
                return Err(SaiError::invalid_attribute(
                    index,
                    "dynamic threshold on a static profile",
                ));
            }
            fixed
                .map(|(_, limit)| Threshold::Static(limit))
                .ok_or_else(|| SaiError::mandatory_missing(BufferProfileAttr::SharedStaticTh.name()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HardwareProfile;
    use pretty_assertions::assert_eq;
    use sonic_sai::SaiStatus;
    use std::sync::Mutex;

    const MIB: u64 = 1024 * 1024;

    #[derive(Default)]
    struct Recorder {
        changed: Mutex<Vec<(BufferPoolOid, u64)>>,
        removed: Mutex<Vec<BufferPoolOid>>,
        profiles: Mutex<Vec<ProfileSnapshot>>,
        profiles_removed: Mutex<Vec<BufferProfileOid>>,
    }

    impl Recorder {
        fn last_profile(&self) -> Option<ProfileSnapshot> {
            self.profiles.lock().unwrap().last().cloned()
        }
    }

    impl BufferOrchCallbacks for Recorder {
        fn on_pool_state_changed(&self, pool: BufferPoolOid, snapshot: &PoolSnapshot) {
            self.changed.lock().unwrap().push((pool, snapshot.shared_size));
        }

        fn on_pool_removed(&self, pool: BufferPoolOid) {
            self.removed.lock().unwrap().push(pool);
        }

        fn on_profile_state_changed(&self, _profile: BufferProfileOid, snapshot: &ProfileSnapshot) {
            self.profiles.lock().unwrap().push(snapshot.clone());
        }

        fn on_profile_removed(&self, profile: BufferProfileOid) {
            self.profiles_removed.lock().unwrap().push(profile);
        }
    }

    fn create_test_orch() -> BufferOrch {
        let mut config = BufferOrchConfig::default();
        config.hardware.total_buffer_bytes = 32 * MIB;
        config.hardware.max_pools_per_direction = 2;
        BufferOrch::from_config(&config)
    }

    fn create_tiled_orch() -> BufferOrch {
        BufferOrch::from_config(&BufferOrchConfig {
            hardware: HardwareProfile {
                tile_count: 4,
                ports_per_tile: Some(1),
                replication: 2,
                ..HardwareProfile::default()
            },
            ..BufferOrchConfig::default()
        })
    }

    fn first_pg(orch: &mut BufferOrch, hw_port_number: u32) -> IngressPriorityGroupOid {
        let port = orch.register_port(hw_port_number, 2, 2).unwrap();
        orch.port_priority_groups(port).unwrap()[0]
    }

    #[test]
    fn test_create_pool() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();

        let snapshot = orch.pool_snapshot(pool).unwrap();
        assert_eq!(snapshot.shared_size, 10 * MIB);
        assert_eq!(snapshot.threshold_mode, ThresholdMode::Dynamic);
        assert!(snapshot.tile_reserved.is_empty());
        assert_eq!(orch.stats().stats.pools_created, 1);
    }

    #[test]
    fn test_pool_limits_per_direction() {
        let mut orch = create_test_orch();
        orch.create_pool(BufferPoolType::Ingress, 20 * MIB, None)
            .unwrap();

        let err = orch
            .create_pool(BufferPoolType::Ingress, 20 * MIB, None)
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);

        // Egress is accounted separately
        orch.create_pool(BufferPoolType::Egress, 20 * MIB, None)
            .unwrap();
        orch.create_pool(BufferPoolType::Egress, MIB, None).unwrap();
        let err = orch
            .create_pool(BufferPoolType::Egress, MIB, None)
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
        assert_eq!(orch.pool_count(), 3);
        assert_eq!(orch.stats().errors, 2);
    }

    #[test]
    fn test_create_profile_threshold_rules() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, Some(ThresholdMode::Dynamic))
            .unwrap();

        let err = orch
            .create_profile(&ProfileParams::static_limit(pool, MIB, 4096))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(2));

        let profile = orch
            .create_profile(
                &ProfileParams::static_limit(pool, MIB, 4096)
                    .with_mode(ProfileThresholdMode::Static),
            )
            .unwrap();
        let snapshot = orch.profile_snapshot(profile).unwrap();
        assert_eq!(snapshot.effective_mode, ThresholdMode::Static);
        assert_eq!(snapshot.threshold, Threshold::Static(4096));
    }

    #[test]
    fn test_both_thresholds_rejected() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let mut attrs = ProfileParams::dynamic(pool, MIB, 0).to_attributes();
        attrs.push(SaiAttribute::new(
            BufferProfileAttr::SharedStaticTh,
            SaiAttributeValue::U64(1),
        ));

        let err = orch
            .create(SaiObjectType::BufferProfile, &attrs)
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidParameter);
        assert_eq!(orch.profile_count(), 0);
    }

    #[test]
    fn test_missing_threshold_is_mandatory() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let attrs = vec![
            SaiAttribute::new(BufferProfileAttr::PoolId, SaiAttributeValue::Oid(pool.as_raw())),
            SaiAttribute::new(BufferProfileAttr::ReservedBufferSize, SaiAttributeValue::U64(MIB)),
        ];

        let err = orch
            .create(SaiObjectType::BufferProfile, &attrs)
            .unwrap_err();
        assert_eq!(
            err,
            SaiError::mandatory_missing("SAI_BUFFER_PROFILE_ATTR_SHARED_DYNAMIC_TH")
        );
    }

    #[test]
    fn test_egress_profile_rejects_headroom() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Egress, 10 * MIB, None)
            .unwrap();

        let err = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0).with_headroom(100, 200))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(3));
    }

    #[test]
    fn test_bind_and_unbind_pg() {
        let mut orch = create_test_orch();
        let recorder = Arc::new(Recorder::default());
        orch.set_callbacks(recorder.clone());

        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pg = first_pg(&mut orch, 0);

        orch.set_pg_profile(pg, Some(profile)).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 9 * MIB);
        assert_eq!(orch.profile_snapshot(profile).unwrap().reference_count, 1);

        // Same binding again changes nothing
        orch.set_pg_profile(pg, Some(profile)).unwrap();
        assert_eq!(orch.stats().stats.pg_bindings, 1);

        orch.set_pg_profile(pg, None).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 10 * MIB);
        assert_eq!(orch.stats().stats.unbindings, 1);

        let changed = recorder.changed.lock().unwrap();
        let shared: Vec<u64> = changed.iter().map(|(_, shared)| *shared).collect();
        assert_eq!(shared, vec![10 * MIB, 10 * MIB, 9 * MIB, 10 * MIB]);
    }

    #[test]
    fn test_queue_rejects_ingress_profile() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let port = orch.register_port(0, 1, 1).unwrap();
        let queue = orch.port_queues(port).unwrap()[0];

        let err = orch.set_queue_profile(queue, Some(profile)).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttributeValue(0));
        assert_eq!(orch.profile_snapshot(profile).unwrap().reference_count, 0);

        // Ports are ingress consumers
        orch.set_port_profile(port, Some(profile)).unwrap();
        assert_eq!(orch.stats().stats.port_bindings, 1);
    }

    #[test]
    fn test_rebind_is_atomic() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let small = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let large = orch
            .create_profile(&ProfileParams::dynamic(pool, 5 * MIB, 0))
            .unwrap();
        let pg = first_pg(&mut orch, 0);

        orch.set_pg_profile(pg, Some(small)).unwrap();
        let err = orch.set_pg_profile(pg, Some(large)).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);

        assert_eq!(orch.profile_snapshot(small).unwrap().consumers, vec![pg.as_raw()]);
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 3 * MIB);
    }

    #[test]
    fn test_remove_profile_in_use() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        let pg = first_pg(&mut orch, 0);
        orch.set_pg_profile(pg, Some(profile)).unwrap();

        let err = orch.remove_profile(profile).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ObjectInUse);
        assert_eq!(orch.pool_snapshot(pool).unwrap().profile_count, 1);

        let err = orch.remove_pool(pool).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ObjectInUse);

        orch.set_pg_profile(pg, None).unwrap();
        orch.remove_profile(profile).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().profile_count, 0);
        orch.remove_pool(pool).unwrap();
        assert_eq!(
            orch.pool_snapshot(pool).unwrap_err().status(),
            SaiStatus::ItemNotFound
        );
    }

    #[test]
    fn test_remove_pool_notifies() {
        let mut orch = create_test_orch();
        let recorder = Arc::new(Recorder::default());
        orch.set_callbacks(recorder.clone());

        let pool = orch
            .create_pool(BufferPoolType::Egress, MIB, None)
            .unwrap();
        orch.remove_pool(pool).unwrap();
        assert_eq!(*recorder.removed.lock().unwrap(), vec![pool]);
        assert_eq!(orch.stats().stats.pools_removed, 1);
    }

    #[test]
    fn test_move_profile_between_pools() {
        let mut orch = create_test_orch();
        let a = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, None)
            .unwrap();
        let b = orch
            .create_pool(BufferPoolType::Ingress, 4 * MIB, None)
            .unwrap();
        let egress = orch
            .create_pool(BufferPoolType::Egress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(a, 2 * MIB, 0))
            .unwrap();
        let pg = first_pg(&mut orch, 0);
        orch.set_pg_profile(pg, Some(profile)).unwrap();

        let err = orch
            .set_profile_attribute(
                profile,
                BufferProfileAttr::PoolId,
                SaiAttributeValue::Oid(egress.as_raw()),
            )
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(0));

        orch.set_profile_attribute(
            profile,
            BufferProfileAttr::PoolId,
            SaiAttributeValue::Oid(b.as_raw()),
        )
        .unwrap();
        assert_eq!(orch.pool_snapshot(a).unwrap().shared_size, 8 * MIB);
        assert_eq!(orch.pool_snapshot(b).unwrap().shared_size, 2 * MIB);
        assert_eq!(orch.profile_snapshot(profile).unwrap().pool, b.as_raw());
    }

    #[test]
    fn test_move_inherited_profile_keeps_mode() {
        let mut orch = create_test_orch();
        let dynamic = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, Some(ThresholdMode::Dynamic))
            .unwrap();
        let fixed = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, Some(ThresholdMode::Static))
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(dynamic, MIB, 0))
            .unwrap();

        let err = orch
            .set_profile_attribute(
                profile,
                BufferProfileAttr::PoolId,
                SaiAttributeValue::Oid(fixed.as_raw()),
            )
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(0));
    }

    #[test]
    fn test_threshold_set_must_match_mode() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();

        orch.set_profile_attribute(profile, BufferProfileAttr::SharedDynamicTh, SaiAttributeValue::I8(-2))
            .unwrap();
        let err = orch
            .set_profile_attribute(profile, BufferProfileAttr::SharedStaticTh, SaiAttributeValue::U64(9))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InvalidAttribute(0));
        assert_eq!(
            orch.profile_snapshot(profile).unwrap().threshold,
            Threshold::Dynamic(-2)
        );
    }

    #[test]
    fn test_profile_mutations_are_announced() {
        let mut orch = create_test_orch();
        let recorder = Arc::new(Recorder::default());
        orch.set_callbacks(recorder.clone());

        let pool = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0))
            .unwrap();
        assert_eq!(recorder.last_profile().unwrap().oid, profile.as_raw());

        let pools_before = recorder.changed.lock().unwrap().len();
        orch.set_profile_attribute(profile, BufferProfileAttr::SharedDynamicTh, SaiAttributeValue::I8(-3))
            .unwrap();
        assert_eq!(recorder.changed.lock().unwrap().len(), pools_before + 1);
        assert_eq!(recorder.last_profile().unwrap().threshold, Threshold::Dynamic(-3));

        orch.set_profile_attribute(
            profile,
            BufferProfileAttr::ReservedBufferSize,
            SaiAttributeValue::U64(2 * MIB),
        )
        .unwrap();
        assert_eq!(recorder.last_profile().unwrap().size, 2 * MIB);

        orch.set_profile_attribute(profile, BufferProfileAttr::XoffTh, SaiAttributeValue::U64(3 * MIB))
            .unwrap();
        assert_eq!(recorder.last_profile().unwrap().xoff_threshold, 3 * MIB);

        let pg = first_pg(&mut orch, 0);
        orch.set_pg_profile(pg, Some(profile)).unwrap();
        assert_eq!(recorder.last_profile().unwrap().reference_count, 1);
        orch.set_pg_profile(pg, None).unwrap();
        assert_eq!(recorder.last_profile().unwrap().reference_count, 0);

        let target = orch
            .create_pool(BufferPoolType::Ingress, 8 * MIB, None)
            .unwrap();
        orch.set_profile_attribute(
            profile,
            BufferProfileAttr::PoolId,
            SaiAttributeValue::Oid(target.as_raw()),
        )
        .unwrap();
        assert_eq!(recorder.last_profile().unwrap().pool, target.as_raw());

        let announced = recorder.profiles.lock().unwrap().len();
        assert!(orch
            .set_profile_attribute(profile, BufferProfileAttr::SharedStaticTh, SaiAttributeValue::U64(9))
            .is_err());
        assert_eq!(recorder.profiles.lock().unwrap().len(), announced);

        orch.remove_profile(profile).unwrap();
        assert_eq!(*recorder.profiles_removed.lock().unwrap(), vec![profile]);
    }

    #[test]
    fn test_resize_pool_respects_reservations() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Egress, 4 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, 3 * MIB, 0))
            .unwrap();
        let port = orch.register_port(0, 0, 1).unwrap();
        let queue = orch.port_queues(port).unwrap()[0];
        orch.set_queue_profile(queue, Some(profile)).unwrap();

        let err = orch.set_pool_size(pool, 2 * MIB).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
        assert_eq!(orch.pool_snapshot(pool).unwrap().size, 4 * MIB);

        orch.set_pool_size(pool, 6 * MIB).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().shared_size, 3 * MIB);

        let err = orch.set_pool_size(pool, 64 * MIB).unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
    }

    #[test]
    fn test_tiled_headroom_update() {
        let mut orch = create_tiled_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, 10 * MIB, None)
            .unwrap();
        let profile = orch
            .create_profile(&ProfileParams::dynamic(pool, MIB, 0).with_headroom(0, 0))
            .unwrap();
        let pg = first_pg(&mut orch, 0);
        orch.set_pg_profile(pg, Some(profile)).unwrap();
        assert_eq!(orch.pool_snapshot(pool).unwrap().tile_reserved, vec![MIB, 0, 0, 0]);

        orch.set_profile_attribute(profile, BufferProfileAttr::XoffTh, SaiAttributeValue::U64(MIB / 4))
            .unwrap();
        let snapshot = orch.pool_snapshot(pool).unwrap();
        assert_eq!(snapshot.tile_reserved, vec![MIB + MIB / 4, 0, 0, 0]);
        assert_eq!(snapshot.shared_size, 0);

        let err = orch
            .set_profile_attribute(profile, BufferProfileAttr::XonTh, SaiAttributeValue::U64(MIB / 2))
            .unwrap_err();
        assert_eq!(err.status(), SaiStatus::InsufficientResources);
        assert_eq!(orch.profile_snapshot(profile).unwrap().xon_threshold, 0);
    }

    #[test]
    fn test_register_port_assigns_tile() {
        let mut orch = create_tiled_orch();
        let port = orch.register_port(2, 8, 8).unwrap();

        assert_eq!(orch.find_port(2), Some(port));
        assert_eq!(orch.port_priority_groups(port).unwrap().len(), 8);
        let err = orch.register_port(2, 8, 8).unwrap_err();
        assert_eq!(err.status(), SaiStatus::ItemAlreadyExists);

        match orch.snapshot(&port.key()).unwrap() {
            ObjectSnapshot::Port(snapshot) => assert_eq!(snapshot.tile, 2),
            other => panic!("unexpected snapshot {:?}", other),
        }
    }

    #[test]
    fn test_dump_is_ordered_by_kind() {
        let mut orch = create_test_orch();
        let pool = orch
            .create_pool(BufferPoolType::Ingress, MIB, None)
            .unwrap();
        orch.create_profile(&ProfileParams::dynamic(pool, 1024, 0))
            .unwrap();
        orch.register_port(0, 1, 1).unwrap();

        let kinds: Vec<&str> = orch
            .dump()
            .iter()
            .map(|s| match s {
                ObjectSnapshot::Port(_) => "port",
                ObjectSnapshot::Queue(_) => "queue",
                ObjectSnapshot::BufferPool(_) => "pool",
                ObjectSnapshot::BufferProfile(_) => "profile",
                ObjectSnapshot::IngressPriorityGroup(_) => "pg",
            })
            .collect();
        assert_eq!(kinds, vec!["port", "queue", "pool", "profile", "pg"]);
    }
}
