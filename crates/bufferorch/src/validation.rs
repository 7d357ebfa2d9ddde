//! Attribute metadata and generic attribute-list validation.
//!
//! Each object type has a static table describing its attributes: id,
//! name, value kind and flags. Create, set and get requests are checked
//! against the table before any per-attribute handling happens, and the
//! first violation rejects the whole request.

use bitflags::bitflags;
use sonic_sai::{
    BufferPoolAttr, BufferProfileAttr, IngressPriorityGroupAttr, PortAttr, QueueAttr, SaiAttrId,
    SaiAttribute, SaiError, SaiObjectType, SaiResult, SaiValueKind,
};

bitflags! {
    /// Attribute access flags (`sai_attr_flags_t`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AttrFlags: u8 {
        const MANDATORY_ON_CREATE = 0b0001;
        const CREATE_ONLY = 0b0010;
        const CREATE_AND_SET = 0b0100;
        const READ_ONLY = 0b1000;
    }
}

/// Static description of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrMetadata {
    pub id: SaiAttrId,
    pub name: &'static str,
    pub kind: SaiValueKind,
    pub flags: AttrFlags,
}

impl AttrMetadata {
    pub fn is_mandatory(&self) -> bool {
        self.flags.contains(AttrFlags::MANDATORY_ON_CREATE)
    }

    pub fn is_settable(&self) -> bool {
        self.flags.contains(AttrFlags::CREATE_AND_SET)
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.contains(AttrFlags::READ_ONLY)
    }
}

const MANDATORY_CREATE_ONLY: AttrFlags =
    AttrFlags::MANDATORY_ON_CREATE.union(AttrFlags::CREATE_ONLY);
const MANDATORY_CREATE_AND_SET: AttrFlags =
    AttrFlags::MANDATORY_ON_CREATE.union(AttrFlags::CREATE_AND_SET);

macro_rules! meta {
    ($attr:expr, $kind:ident, $flags:expr) => {
        AttrMetadata {
            id: $attr.id(),
            name: $attr.name(),
            kind: SaiValueKind::$kind,
            flags: $flags,
        }
    };
}

static BUFFER_POOL_ATTRS: &[AttrMetadata] = &[
    meta!(BufferPoolAttr::SharedSize, U64, AttrFlags::READ_ONLY),
    meta!(BufferPoolAttr::Type, S32, MANDATORY_CREATE_ONLY),
    meta!(BufferPoolAttr::Size, U64, MANDATORY_CREATE_AND_SET),
    meta!(BufferPoolAttr::ThresholdMode, S32, AttrFlags::CREATE_ONLY),
    meta!(BufferPoolAttr::TilesTotalReservedSize, U64, AttrFlags::READ_ONLY),
    meta!(BufferPoolAttr::TileReservedSizes, U64List, AttrFlags::READ_ONLY),
];

static BUFFER_PROFILE_ATTRS: &[AttrMetadata] = &[
    meta!(BufferProfileAttr::PoolId, Oid, MANDATORY_CREATE_AND_SET),
    meta!(BufferProfileAttr::ReservedBufferSize, U64, MANDATORY_CREATE_AND_SET),
    meta!(BufferProfileAttr::ThresholdMode, S32, AttrFlags::CREATE_ONLY),
    meta!(BufferProfileAttr::SharedDynamicTh, I8, AttrFlags::CREATE_AND_SET),
    meta!(BufferProfileAttr::SharedStaticTh, U64, AttrFlags::CREATE_AND_SET),
    meta!(BufferProfileAttr::XoffTh, U64, AttrFlags::CREATE_AND_SET),
    meta!(BufferProfileAttr::XonTh, U64, AttrFlags::CREATE_AND_SET),
    meta!(BufferProfileAttr::ReferenceCount, U32, AttrFlags::READ_ONLY),
    meta!(BufferProfileAttr::ConsumerList, ObjectList, AttrFlags::READ_ONLY),
];

static INGRESS_PRIORITY_GROUP_ATTRS: &[AttrMetadata] = &[
    meta!(IngressPriorityGroupAttr::BufferProfile, Oid, AttrFlags::CREATE_AND_SET),
    meta!(IngressPriorityGroupAttr::Port, Oid, MANDATORY_CREATE_ONLY),
    meta!(IngressPriorityGroupAttr::Index, U32, MANDATORY_CREATE_ONLY),
];

static QUEUE_ATTRS: &[AttrMetadata] = &[
    meta!(QueueAttr::Port, Oid, MANDATORY_CREATE_ONLY),
    meta!(QueueAttr::Index, U32, MANDATORY_CREATE_ONLY),
    meta!(QueueAttr::BufferProfileId, Oid, AttrFlags::CREATE_AND_SET),
];

static PORT_ATTRS: &[AttrMetadata] = &[
    meta!(PortAttr::HwPortNumber, U32, MANDATORY_CREATE_ONLY),
    meta!(PortAttr::NumberOfIngressPriorityGroups, U32, AttrFlags::READ_ONLY),
    meta!(PortAttr::IngressPriorityGroupList, ObjectList, AttrFlags::READ_ONLY),
    meta!(PortAttr::QosNumberOfQueues, U32, AttrFlags::READ_ONLY),
    meta!(PortAttr::QosQueueList, ObjectList, AttrFlags::READ_ONLY),
    meta!(PortAttr::QosIngressBufferProfile, Oid, AttrFlags::CREATE_AND_SET),
    meta!(PortAttr::Tile, U32, AttrFlags::READ_ONLY),
];

/// Returns the attribute table for an object type.
pub fn metadata_for(object_type: SaiObjectType) -> Option<&'static [AttrMetadata]> {
    match object_type {
        SaiObjectType::BufferPool => Some(BUFFER_POOL_ATTRS),
        SaiObjectType::BufferProfile => Some(BUFFER_PROFILE_ATTRS),
        SaiObjectType::IngressPriorityGroup => Some(INGRESS_PRIORITY_GROUP_ATTRS),
        SaiObjectType::Queue => Some(QUEUE_ATTRS),
        SaiObjectType::Port => Some(PORT_ATTRS),
        SaiObjectType::Switch => None,
    }
}

/// Looks up one attribute of an object type.
pub fn lookup(object_type: SaiObjectType, id: SaiAttrId) -> Option<&'static AttrMetadata> {
    metadata_for(object_type)?.iter().find(|meta| meta.id == id)
}

fn table(object_type: SaiObjectType) -> SaiResult<&'static [AttrMetadata]> {
    metadata_for(object_type)
        .ok_or_else(|| SaiError::not_supported(format!("attributes of {}", object_type)))
}

/// Checks a create request's attribute list.
///
/// Per attribute, in order: unknown id, read-only id, repeated id, wrong
/// value kind. Then every mandatory-on-create attribute must be present.
pub fn validate_create(object_type: SaiObjectType, attrs: &[SaiAttribute]) -> SaiResult<()> {
    let table = table(object_type)?;
    let mut seen: Vec<SaiAttrId> = Vec::with_capacity(attrs.len());

    for (i, attr) in attrs.iter().enumerate() {
        let meta = table
            .iter()
            .find(|meta| meta.id == attr.id)
            .ok_or_else(|| SaiError::unknown_attribute(i))?;

        if meta.is_read_only() {
            return Err(SaiError::invalid_attribute(
                i,
                format!("{} is read-only", meta.name),
            ));
        }
        if seen.contains(&attr.id) {
            return Err(SaiError::invalid_attribute(
                i,
                format!("{} given more than once", meta.name),
            ));
        }
        if attr.value.kind() != meta.kind {
            return Err(SaiError::invalid_attribute_value(
                i,
                format!("{} expects {:?}", meta.name, meta.kind),
            ));
        }
        seen.push(attr.id);
    }

    if let Some(missing) = table
        .iter()
        .find(|meta| meta.is_mandatory() && !seen.contains(&meta.id))
    {
        return Err(SaiError::mandatory_missing(missing.name));
    }

    Ok(())
}

/// Checks a set request. Errors always point at index 0.
pub fn validate_set(
    object_type: SaiObjectType,
    attr: &SaiAttribute,
) -> SaiResult<&'static AttrMetadata> {
    let meta = table(object_type)?
        .iter()
        .find(|meta| meta.id == attr.id)
        .ok_or_else(|| SaiError::unknown_attribute(0))?;

    if !meta.is_settable() {
        let reason = if meta.is_read_only() {
            "is read-only"
        } else {
            "can only be given on create"
        };
        return Err(SaiError::invalid_attribute(
            0,
            format!("{} {}", meta.name, reason),
        ));
    }
    if attr.value.kind() != meta.kind {
        return Err(SaiError::invalid_attribute_value(
            0,
            format!("{} expects {:?}", meta.name, meta.kind),
        ));
    }

    Ok(meta)
}

/// Checks a get request's attribute ids.
pub fn validate_get(object_type: SaiObjectType, attrs: &[SaiAttribute]) -> SaiResult<()> {
    let table = table(object_type)?;
    for (i, attr) in attrs.iter().enumerate() {
        if !table.iter().any(|meta| meta.id == attr.id) {
            return Err(SaiError::unknown_attribute(i));
        }
    }
    Ok(())
}

/// Finds an attribute by id, returning its position in the list.
pub fn find_attr(attrs: &[SaiAttribute], id: impl Into<SaiAttrId>) -> Option<(usize, &SaiAttribute)> {
    let id = id.into();
    attrs.iter().enumerate().find(|(_, attr)| attr.id == id)
}
