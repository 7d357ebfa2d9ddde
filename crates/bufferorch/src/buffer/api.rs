//! Generic SAI-style entry points: create, remove, set and get by object id.
//!
//! Every request is checked against the attribute metadata first; only a
//! clean request reaches the per-attribute handlers of the engine.

use sonic_orch_common::{Associated, HasRefCount};
use sonic_sai::{
    BufferPoolAttr, BufferProfileAttr, IngressPriorityGroupAttr, ObjectKey, PortAttr, QueueAttr,
    RawSaiObjectId, SaiAttribute, SaiAttributeValue, SaiError, SaiList, SaiObjectType,
    SaiResult,
};
use tracing::warn;

use super::orch::BufferOrch;
use super::types::{BufferList, BufferObject, Threshold};
use crate::validation;

impl BufferOrch {
    /// Creates a pool or profile and returns its object id.
    pub fn create(
        &mut self,
        object_type: SaiObjectType,
        attrs: &[SaiAttribute],
    ) -> SaiResult<RawSaiObjectId> {
        let result = validation::validate_create(object_type, attrs).and_then(|()| {
            match object_type {
                SaiObjectType::BufferPool => self.create_pool_from_attrs(attrs),
                SaiObjectType::BufferProfile => self.create_profile_from_attrs(attrs),
                other => Err(SaiError::not_supported(format!(
                    "creating {} objects",
                    other
                ))),
            }
        });
        self.finish("create", result.map(|key| key.id))
    }

    /// Removes a pool or profile.
    pub fn remove(&mut self, oid: RawSaiObjectId) -> SaiResult<()> {
        let result = object_key(oid).and_then(|key| self.destroy(key));
        self.finish("remove", result)
    }

    /// Sets one attribute of any buffer object.
    ///
    /// For priority groups, queues and ports the only settable attribute is
    /// the buffer profile, which binds or (with a null id) unbinds it.
    pub fn set_attribute(&mut self, oid: RawSaiObjectId, attr: &SaiAttribute) -> SaiResult<()> {
        let result = object_key(oid).and_then(|key| {
            validation::validate_set(key.object_type, attr)?;
            self.store().get(&key)?;
            match key.object_type {
                SaiObjectType::BufferPool => self.set_pool_attr(key, attr),
                SaiObjectType::BufferProfile => self.set_profile_attr(key, attr),
                SaiObjectType::IngressPriorityGroup
                | SaiObjectType::Queue
                | SaiObjectType::Port => {
                    let profile = attr.value.as_oid().ok_or_else(|| {
                        SaiError::invalid_attribute_value(0, "expected an object id")
                    })?;
                    self.bind_consumer(key, profile)
                }
                SaiObjectType::Switch => Err(SaiError::not_supported("switch attributes")),
            }
        });
        self.finish("set_attribute", result)
    }

    /// Fills the values of the requested attributes.
    ///
    /// List attributes are filled up to the capacity given by the caller in
    /// `count`. If a list does not fit, `count` is set to the required size
    /// and the call fails with a retryable `BufferOverflow` for that index.
    pub fn get_attributes(
        &self,
        oid: RawSaiObjectId,
        attrs: &mut [SaiAttribute],
    ) -> SaiResult<()> {
        let key = object_key(oid)?;
        validation::validate_get(key.object_type, attrs)?;
        let record = self.store().get(&key)?;

        for (index, attr) in attrs.iter_mut().enumerate() {
            match record {
                BufferObject::Pool(_) => self.get_pool_attr(&key, record, index, attr)?,
                BufferObject::Profile(_) => self.get_profile_attr(&key, record, index, attr)?,
                BufferObject::PriorityGroup(_) | BufferObject::Queue(_) => {
                    get_consumer_attr(key.object_type, record, index, attr)?
                }
                BufferObject::Port(_) => self.get_port_attr(&key, record, index, attr)?,
            }
        }
        Ok(())
    }

    fn finish<T>(&mut self, operation: &str, result: SaiResult<T>) -> SaiResult<T> {
        if let Err(err) = &result {
            self.record_error();
            warn!(operation, status = %err.status(), "Buffer request rejected: {}", err);
        }
        result
    }

    fn get_pool_attr(
        &self,
        key: &ObjectKey,
        record: &BufferObject,
        index: usize,
        attr: &mut SaiAttribute,
    ) -> SaiResult<()> {
        let pool = record
            .as_pool()
            .ok_or_else(|| SaiError::not_found(format!("buffer pool {}", key)))?;
        let value = match BufferPoolAttr::from_id(attr.id) {
            Some(BufferPoolAttr::SharedSize) => SaiAttributeValue::U64(pool.shared_size),
            Some(BufferPoolAttr::Type) => SaiAttributeValue::S32(pool.pool_type.to_sai()),
            Some(BufferPoolAttr::Size) => SaiAttributeValue::U64(pool.size),
            Some(BufferPoolAttr::ThresholdMode) => {
                SaiAttributeValue::S32(pool.threshold_mode.to_sai())
            }
            Some(BufferPoolAttr::TilesTotalReservedSize) => {
                SaiAttributeValue::U64(pool.tiles_total_reserved_size)
            }
            Some(BufferPoolAttr::TileReservedSizes) => {
                return match &mut attr.value {
                    SaiAttributeValue::U64List(list) => {
                        fill_list(index, list, pool.tile_reserved.clone())
                    }
                    _ => Err(SaiError::invalid_attribute_value(index, "expected a u64 list")),
                };
            }
            None => return Err(SaiError::unknown_attribute(index)),
        };
        attr.value = value;
        Ok(())
    }

    fn get_profile_attr(
        &self,
        key: &ObjectKey,
        record: &BufferObject,
        index: usize,
        attr: &mut SaiAttribute,
    ) -> SaiResult<()> {
        let profile = record
            .as_profile()
            .ok_or_else(|| SaiError::not_found(format!("buffer profile {}", key)))?;
        let value = match BufferProfileAttr::from_id(attr.id) {
            Some(BufferProfileAttr::PoolId) => {
                SaiAttributeValue::Oid(profile.pool().map_or(0, |pool| pool.id))
            }
            Some(BufferProfileAttr::ReservedBufferSize) => SaiAttributeValue::U64(profile.size),
            Some(BufferProfileAttr::ThresholdMode) => {
                SaiAttributeValue::S32(profile.threshold_mode.to_sai())
            }
            Some(BufferProfileAttr::SharedDynamicTh) => SaiAttributeValue::I8(match profile.threshold {
                Threshold::Dynamic(alpha) => alpha,
                Threshold::Static(_) => 0,
            }),
            Some(BufferProfileAttr::SharedStaticTh) => SaiAttributeValue::U64(match profile.threshold {
                Threshold::Static(limit) => limit,
                Threshold::Dynamic(_) => 0,
            }),
            Some(BufferProfileAttr::XoffTh) => SaiAttributeValue::U64(profile.xoff_threshold),
            Some(BufferProfileAttr::XonTh) => SaiAttributeValue::U64(profile.xon_threshold),
            Some(BufferProfileAttr::ReferenceCount) => SaiAttributeValue::U32(record.ref_count()),
            Some(BufferProfileAttr::ConsumerList) => {
                let consumers = self.member_ids(BufferList::ProfileConsumers, key)?;
                return fill_object_list(index, &mut attr.value, consumers);
            }
            None => return Err(SaiError::unknown_attribute(index)),
        };
        attr.value = value;
        Ok(())
    }

    fn get_port_attr(
        &self,
        key: &ObjectKey,
        record: &BufferObject,
        index: usize,
        attr: &mut SaiAttribute,
    ) -> SaiResult<()> {
        let port = record
            .as_port()
            .ok_or_else(|| SaiError::not_found(format!("port {}", key)))?;
        let value = match PortAttr::from_id(attr.id) {
            Some(PortAttr::HwPortNumber) => SaiAttributeValue::U32(port.hw_port_number),
            Some(PortAttr::NumberOfIngressPriorityGroups) => {
                SaiAttributeValue::U32(port.priority_groups.len)
            }
            Some(PortAttr::IngressPriorityGroupList) => {
                let pgs = self.member_ids(BufferList::PortPriorityGroups, key)?;
                return fill_object_list(index, &mut attr.value, pgs);
            }
            Some(PortAttr::QosNumberOfQueues) => SaiAttributeValue::U32(port.queues.len),
            Some(PortAttr::QosQueueList) => {
                let queues = self.member_ids(BufferList::PortQueues, key)?;
                return fill_object_list(index, &mut attr.value, queues);
            }
            Some(PortAttr::QosIngressBufferProfile) => {
                SaiAttributeValue::Oid(record.attached_profile().map_or(0, |p| p.id))
            }
            Some(PortAttr::Tile) => SaiAttributeValue::U32(port.tile),
            None => return Err(SaiError::unknown_attribute(index)),
        };
        attr.value = value;
        Ok(())
    }

    fn member_ids(&self, list: BufferList, owner: &ObjectKey) -> SaiResult<Vec<RawSaiObjectId>> {
        Ok(self.store().members(list, owner)?.map(|key| key.id).collect())
    }
}

fn get_consumer_attr(
    object_type: SaiObjectType,
    record: &BufferObject,
    index: usize,
    attr: &mut SaiAttribute,
) -> SaiResult<()> {
    let (port, consumer_index) = match record {
        BufferObject::PriorityGroup(pg) => (pg.port_link, pg.index),
        BufferObject::Queue(queue) => (queue.port_link, queue.index),
        _ => return Err(SaiError::invalid_parameter("not a buffer consumer")),
    };
    let port = SaiAttributeValue::Oid(port.map_or(0, |link| link.owner.id));
    let profile =
        SaiAttributeValue::Oid(record.owner_in(BufferList::ProfileConsumers).map_or(0, |p| p.id));

    let value = match object_type {
        SaiObjectType::IngressPriorityGroup => match IngressPriorityGroupAttr::from_id(attr.id) {
            Some(IngressPriorityGroupAttr::BufferProfile) => profile,
            Some(IngressPriorityGroupAttr::Port) => port,
            Some(IngressPriorityGroupAttr::Index) => SaiAttributeValue::U32(consumer_index),
            None => return Err(SaiError::unknown_attribute(index)),
        },
        _ => match QueueAttr::from_id(attr.id) {
            Some(QueueAttr::BufferProfileId) => profile,
            Some(QueueAttr::Port) => port,
            Some(QueueAttr::Index) => SaiAttributeValue::U32(consumer_index),
            None => return Err(SaiError::unknown_attribute(index)),
        },
    };
    attr.value = value;
    Ok(())
}

fn object_key(oid: RawSaiObjectId) -> SaiResult<ObjectKey> {
    ObjectKey::from_raw(oid).ok_or_else(|| SaiError::not_found(format!("object 0x{:016x}", oid)))
}

fn fill_object_list(
    index: usize,
    value: &mut SaiAttributeValue,
    ids: Vec<RawSaiObjectId>,
) -> SaiResult<()> {
    match value {
        SaiAttributeValue::ObjectList(list) => fill_list(index, list, ids),
        _ => Err(SaiError::invalid_attribute_value(index, "expected an object list")),
    }
}

fn fill_list<T>(index: usize, list: &mut SaiList<T>, values: Vec<T>) -> SaiResult<()> {
    let required = values.len() as u32;
    if list.count < required {
        list.count = required;
        list.list.clear();
        return Err(SaiError::BufferOverflow {
            index: index as u32,
            required,
        });
    }
    *list = SaiList::from_vec(values);
    Ok(())
}
