//! Buffer pool, profile and consumer records.

use serde::{Deserialize, Serialize};
use sonic_orch_common::{Associated, HasRefCount, Link, ListHead};
use sonic_sai::{ObjectKey, RawSaiObjectId, SaiObjectType};

/// Pool direction (`sai_buffer_pool_type_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferPoolType {
    Ingress,
    Egress,
}

impl BufferPoolType {
    pub fn from_sai(value: i32) -> Option<Self> {
        match value {
            0 => Some(BufferPoolType::Ingress),
            1 => Some(BufferPoolType::Egress),
            _ => None,
        }
    }

    pub fn to_sai(self) -> i32 {
        match self {
            BufferPoolType::Ingress => 0,
            BufferPoolType::Egress => 1,
        }
    }

    /// Returns true if consumers of `object_type` may draw from this pool.
    ///
    /// Ingress pools serve ports and priority groups, egress pools serve
    /// queues.
    pub fn accepts(self, object_type: SaiObjectType) -> bool {
        matches!(
            (self, object_type),
            (BufferPoolType::Ingress, SaiObjectType::Port)
                | (BufferPoolType::Ingress, SaiObjectType::IngressPriorityGroup)
                | (BufferPoolType::Egress, SaiObjectType::Queue)
        )
    }
}

/// Pool threshold mode (`sai_buffer_pool_threshold_mode_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThresholdMode {
    Static,
    Dynamic,
}

impl ThresholdMode {
    pub fn from_sai(value: i32) -> Option<Self> {
        match value {
            0 => Some(ThresholdMode::Static),
            1 => Some(ThresholdMode::Dynamic),
            _ => None,
        }
    }

    pub fn to_sai(self) -> i32 {
        match self {
            ThresholdMode::Static => 0,
            ThresholdMode::Dynamic => 1,
        }
    }
}

/// Profile threshold mode (`sai_buffer_profile_threshold_mode_t`).
///
/// `Inherited` is never rewritten to the pool's mode. It is resolved at
/// the point of use with [`effective_threshold_mode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileThresholdMode {
    Inherited,
    Static,
    Dynamic,
}

impl ProfileThresholdMode {
    pub fn from_sai(value: i32) -> Option<Self> {
        match value {
            0 => Some(ProfileThresholdMode::Static),
            1 => Some(ProfileThresholdMode::Dynamic),
            2 => Some(ProfileThresholdMode::Inherited),
            _ => None,
        }
    }

    pub fn to_sai(self) -> i32 {
        match self {
            ProfileThresholdMode::Static => 0,
            ProfileThresholdMode::Dynamic => 1,
            ProfileThresholdMode::Inherited => 2,
        }
    }

    pub fn is_explicit(self) -> bool {
        self != ProfileThresholdMode::Inherited
    }
}

/// Resolves a profile's threshold mode against its pool's mode.
pub fn effective_threshold_mode(
    profile_mode: ProfileThresholdMode,
    pool_mode: ThresholdMode,
) -> ThresholdMode {
    match profile_mode {
        ProfileThresholdMode::Inherited => pool_mode,
        ProfileThresholdMode::Static => ThresholdMode::Static,
        ProfileThresholdMode::Dynamic => ThresholdMode::Dynamic,
    }
}

/// The shared-buffer threshold a profile enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum Threshold {
    /// Byte limit on shared buffer usage.
    Static(u64),
    /// Alpha exponent: usage limit is `2^alpha` times the free shared buffer.
    Dynamic(i8),
}

impl Threshold {
    pub fn mode(&self) -> ThresholdMode {
        match self {
            Threshold::Static(_) => ThresholdMode::Static,
            Threshold::Dynamic(_) => ThresholdMode::Dynamic,
        }
    }
}

/// The lists that tie buffer records together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferList {
    /// Profiles carved from a pool.
    PoolProfiles,
    /// Ports, priority groups and queues attached to a profile.
    ProfileConsumers,
    /// Priority groups of a port.
    PortPriorityGroups,
    /// Queues of a port.
    PortQueues,
}

const ALL_LISTS: &[BufferList] = &[
    BufferList::PoolProfiles,
    BufferList::ProfileConsumers,
    BufferList::PortPriorityGroups,
    BufferList::PortQueues,
];

#[derive(Debug, Clone)]
pub struct BufferPoolEntry {
    pub pool_type: BufferPoolType,
    pub size: u64,
    pub threshold_mode: ThresholdMode,
    pub shared_size: u64,
    /// Reserved bytes per tile. Empty on non-tiled hardware.
    pub tile_reserved: Vec<u64>,
    pub tiles_total_reserved_size: u64,
    pub profiles: ListHead,
    pub ref_count: u32,
}

impl BufferPoolEntry {
    pub fn new(pool_type: BufferPoolType, size: u64, threshold_mode: ThresholdMode, tiles: usize) -> Self {
        Self {
            pool_type,
            size,
            threshold_mode,
            shared_size: size,
            tile_reserved: vec![0; tiles],
            tiles_total_reserved_size: 0,
            profiles: ListHead::default(),
            ref_count: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferProfileEntry {
    pub size: u64,
    pub threshold_mode: ProfileThresholdMode,
    pub threshold: Threshold,
    pub xoff_threshold: u64,
    pub xon_threshold: u64,
    /// Membership in the owning pool's profile list.
    pub pool_link: Option<Link>,
    pub consumers: ListHead,
    pub ref_count: u32,
}

impl BufferProfileEntry {
    pub fn pool(&self) -> Option<ObjectKey> {
        self.pool_link.map(|link| link.owner)
    }

    /// PFC headroom on top of the reserved size.
    pub fn headroom(&self) -> u64 {
        self.xoff_threshold.max(self.xon_threshold)
    }
}

#[derive(Debug, Clone)]
pub struct PriorityGroupEntry {
    pub index: u32,
    pub port_link: Option<Link>,
    pub profile_link: Option<Link>,
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub index: u32,
    pub port_link: Option<Link>,
    pub profile_link: Option<Link>,
}

#[derive(Debug, Clone)]
pub struct PortEntry {
    pub hw_port_number: u32,
    pub tile: u32,
    pub priority_groups: ListHead,
    pub queues: ListHead,
    pub profile_link: Option<Link>,
    pub ref_count: u32,
}

/// One record of the buffer object store.
#[derive(Debug, Clone)]
pub enum BufferObject {
    Pool(BufferPoolEntry),
    Profile(BufferProfileEntry),
    PriorityGroup(PriorityGroupEntry),
    Queue(QueueEntry),
    Port(PortEntry),
}

impl BufferObject {
    pub fn as_pool(&self) -> Option<&BufferPoolEntry> {
        match self {
            BufferObject::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_pool_mut(&mut self) -> Option<&mut BufferPoolEntry> {
        match self {
            BufferObject::Pool(pool) => Some(pool),
            _ => None,
        }
    }

    pub fn as_profile(&self) -> Option<&BufferProfileEntry> {
        match self {
            BufferObject::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn as_profile_mut(&mut self) -> Option<&mut BufferProfileEntry> {
        match self {
            BufferObject::Profile(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn as_port(&self) -> Option<&PortEntry> {
        match self {
            BufferObject::Port(port) => Some(port),
            _ => None,
        }
    }

    /// The port a priority group or queue belongs to.
    pub fn parent_port(&self) -> Option<ObjectKey> {
        match self {
            BufferObject::PriorityGroup(pg) => pg.port_link.map(|l| l.owner),
            BufferObject::Queue(queue) => queue.port_link.map(|l| l.owner),
            _ => None,
        }
    }

    /// The profile a consumer is attached to.
    pub fn attached_profile(&self) -> Option<ObjectKey> {
        self.owner_in(BufferList::ProfileConsumers)
    }
}

impl HasRefCount for BufferObject {
    fn increment_ref(&mut self) -> u32 {
        match self {
            BufferObject::Pool(p) => {
                p.ref_count = p.ref_count.saturating_add(1);
                p.ref_count
            }
            BufferObject::Profile(p) => {
                p.ref_count = p.ref_count.saturating_add(1);
                p.ref_count
            }
            BufferObject::Port(p) => {
                p.ref_count = p.ref_count.saturating_add(1);
                p.ref_count
            }
            BufferObject::PriorityGroup(_) | BufferObject::Queue(_) => 0,
        }
    }

    fn decrement_ref(&mut self) -> Option<u32> {
        let count = match self {
            BufferObject::Pool(p) => &mut p.ref_count,
            BufferObject::Profile(p) => &mut p.ref_count,
            BufferObject::Port(p) => &mut p.ref_count,
            BufferObject::PriorityGroup(_) | BufferObject::Queue(_) => return None,
        };
        *count = count.checked_sub(1)?;
        Some(*count)
    }

    fn ref_count(&self) -> u32 {
        match self {
            BufferObject::Pool(p) => p.ref_count,
            BufferObject::Profile(p) => p.ref_count,
            BufferObject::Port(p) => p.ref_count,
            BufferObject::PriorityGroup(_) | BufferObject::Queue(_) => 0,
        }
    }
}

impl Associated for BufferObject {
    type List = BufferList;

    fn lists() -> &'static [BufferList] {
        ALL_LISTS
    }

    fn list_head(&self, list: BufferList) -> Option<&ListHead> {
        match (self, list) {
            (BufferObject::Pool(p), BufferList::PoolProfiles) => Some(&p.profiles),
            (BufferObject::Profile(p), BufferList::ProfileConsumers) => Some(&p.consumers),
            (BufferObject::Port(p), BufferList::PortPriorityGroups) => Some(&p.priority_groups),
            (BufferObject::Port(p), BufferList::PortQueues) => Some(&p.queues),
            _ => None,
        }
    }

    fn list_head_mut(&mut self, list: BufferList) -> Option<&mut ListHead> {
        match (self, list) {
            (BufferObject::Pool(p), BufferList::PoolProfiles) => Some(&mut p.profiles),
            (BufferObject::Profile(p), BufferList::ProfileConsumers) => Some(&mut p.consumers),
            (BufferObject::Port(p), BufferList::PortPriorityGroups) => {
                Some(&mut p.priority_groups)
            }
            (BufferObject::Port(p), BufferList::PortQueues) => Some(&mut p.queues),
            _ => None,
        }
    }

    fn link_slot(&self, list: BufferList) -> Option<&Option<Link>> {
        match (self, list) {
            (BufferObject::Profile(p), BufferList::PoolProfiles) => Some(&p.pool_link),
            (BufferObject::PriorityGroup(pg), BufferList::ProfileConsumers) => {
                Some(&pg.profile_link)
            }
            (BufferObject::Queue(q), BufferList::ProfileConsumers) => Some(&q.profile_link),
            (BufferObject::Port(p), BufferList::ProfileConsumers) => Some(&p.profile_link),
            (BufferObject::PriorityGroup(pg), BufferList::PortPriorityGroups) => {
                Some(&pg.port_link)
            }
            (BufferObject::Queue(q), BufferList::PortQueues) => Some(&q.port_link),
            _ => None,
        }
    }

    fn link_slot_mut(&mut self, list: BufferList) -> Option<&mut Option<Link>> {
        match (self, list) {
            (BufferObject::Profile(p), BufferList::PoolProfiles) => Some(&mut p.pool_link),
            (BufferObject::PriorityGroup(pg), BufferList::ProfileConsumers) => {
                Some(&mut pg.profile_link)
            }
            (BufferObject::Queue(q), BufferList::ProfileConsumers) => Some(&mut q.profile_link),
            (BufferObject::Port(p), BufferList::ProfileConsumers) => Some(&mut p.profile_link),
            (BufferObject::PriorityGroup(pg), BufferList::PortPriorityGroups) => {
                Some(&mut pg.port_link)
            }
            (BufferObject::Queue(q), BufferList::PortQueues) => Some(&mut q.port_link),
            _ => None,
        }
    }
}

/// Committed view of a pool, handed to the hardware-programming side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub oid: RawSaiObjectId,
    pub pool_type: BufferPoolType,
    pub threshold_mode: ThresholdMode,
    pub size: u64,
    pub shared_size: u64,
    pub tile_reserved: Vec<u64>,
    pub tiles_total_reserved_size: u64,
    pub profile_count: u32,
}

impl PoolSnapshot {
    pub fn new(key: ObjectKey, pool: &BufferPoolEntry) -> Self {
        Self {
            oid: key.id,
            pool_type: pool.pool_type,
            threshold_mode: pool.threshold_mode,
            size: pool.size,
            shared_size: pool.shared_size,
            tile_reserved: pool.tile_reserved.clone(),
            tiles_total_reserved_size: pool.tiles_total_reserved_size,
            profile_count: pool.profiles.len,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSnapshot {
    pub oid: RawSaiObjectId,
    pub pool: RawSaiObjectId,
    pub size: u64,
    pub threshold_mode: ProfileThresholdMode,
    pub effective_mode: ThresholdMode,
    pub threshold: Threshold,
    pub xoff_threshold: u64,
    pub xon_threshold: u64,
    pub reference_count: u32,
    pub consumers: Vec<RawSaiObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumerSnapshot {
    pub oid: RawSaiObjectId,
    pub port: RawSaiObjectId,
    pub index: u32,
    pub profile: Option<RawSaiObjectId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSnapshot {
    pub oid: RawSaiObjectId,
    pub hw_port_number: u32,
    pub tile: u32,
    pub priority_groups: u32,
    pub queues: u32,
    pub profile: Option<RawSaiObjectId>,
}

/// One entry of [`BufferOrch::dump`](super::BufferOrch::dump), in store order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "object_type", rename_all = "snake_case")]
pub enum ObjectSnapshot {
    Port(PortSnapshot),
    Queue(ConsumerSnapshot),
    BufferPool(PoolSnapshot),
    BufferProfile(ProfileSnapshot),
    IngressPriorityGroup(ConsumerSnapshot),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BufferStats {
    pub pools_created: u64,
    pub pools_removed: u64,
    pub profiles_created: u64,
    pub profiles_removed: u64,
    pub pg_bindings: u64,
    pub queue_bindings: u64,
    pub port_bindings: u64,
    pub unbindings: u64,
}
