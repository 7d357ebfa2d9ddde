//! SAI attribute ids and values.
//!
//! Attributes travel as `(id, value)` pairs. Ids stay raw `u32` on the wire
//! so that unknown ids can be reported at their index; the typed enums below
//! give each buffer-related object type its own id space.

use crate::types::RawSaiObjectId;

/// Raw attribute id (`sai_attr_id_t`).
pub type SaiAttrId = u32;

/// Start of the vendor-custom attribute range.
pub const SAI_CUSTOM_RANGE_START: SaiAttrId = 0x1000_0000;

/// A counted list (`sai_object_list_t`, `sai_u64_list_t`).
///
/// On a get request `count` is the capacity the caller is willing to
/// receive. On return it holds the actual number of elements, which is also
/// how an undersized buffer learns the capacity it needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaiList<T> {
    pub count: u32,
    pub list: Vec<T>,
}

impl<T> SaiList<T> {
    /// An empty request buffer able to hold `capacity` elements.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            count: capacity,
            list: Vec::new(),
        }
    }

    /// A filled list.
    pub fn from_vec(list: Vec<T>) -> Self {
        Self {
            count: list.len() as u32,
            list,
        }
    }
}

/// Attribute value (`sai_attribute_value_t`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaiAttributeValue {
    Bool(bool),
    U32(u32),
    U64(u64),
    I8(i8),
    S32(i32),
    Oid(RawSaiObjectId),
    ObjectList(SaiList<RawSaiObjectId>),
    U64List(SaiList<u64>),
}

/// Value type tag used by attribute metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiValueKind {
    Bool,
    U32,
    U64,
    I8,
    S32,
    Oid,
    ObjectList,
    U64List,
}

impl SaiAttributeValue {
    pub fn kind(&self) -> SaiValueKind {
        match self {
            SaiAttributeValue::Bool(_) => SaiValueKind::Bool,
            SaiAttributeValue::U32(_) => SaiValueKind::U32,
            SaiAttributeValue::U64(_) => SaiValueKind::U64,
            SaiAttributeValue::I8(_) => SaiValueKind::I8,
            SaiAttributeValue::S32(_) => SaiValueKind::S32,
            SaiAttributeValue::Oid(_) => SaiValueKind::Oid,
            SaiAttributeValue::ObjectList(_) => SaiValueKind::ObjectList,
            SaiAttributeValue::U64List(_) => SaiValueKind::U64List,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SaiAttributeValue::U64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            SaiAttributeValue::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            SaiAttributeValue::I8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_s32(&self) -> Option<i32> {
        match self {
            SaiAttributeValue::S32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_oid(&self) -> Option<RawSaiObjectId> {
        match self {
            SaiAttributeValue::Oid(v) => Some(*v),
            _ => None,
        }
    }

    /// A placeholder of the given kind, used to build get requests.
    pub fn empty(kind: SaiValueKind) -> Self {
        match kind {
            SaiValueKind::Bool => SaiAttributeValue::Bool(false),
            SaiValueKind::U32 => SaiAttributeValue::U32(0),
            SaiValueKind::U64 => SaiAttributeValue::U64(0),
            SaiValueKind::I8 => SaiAttributeValue::I8(0),
            SaiValueKind::S32 => SaiAttributeValue::S32(0),
            SaiValueKind::Oid => SaiAttributeValue::Oid(0),
            SaiValueKind::ObjectList => SaiAttributeValue::ObjectList(SaiList::default()),
            SaiValueKind::U64List => SaiAttributeValue::U64List(SaiList::default()),
        }
    }
}

/// One attribute (`sai_attribute_t`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaiAttribute {
    pub id: SaiAttrId,
    pub value: SaiAttributeValue,
}

impl SaiAttribute {
    pub fn new(id: impl Into<SaiAttrId>, value: SaiAttributeValue) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

macro_rules! define_attr_ids {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($variant:ident = $value:expr => $sai_name:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant = $value,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn from_id(id: SaiAttrId) -> Option<Self> {
                match id {
                    $(v if v == $value => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub const fn id(&self) -> SaiAttrId {
                *self as SaiAttrId
            }

            pub const fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $sai_name,)+
                }
            }
        }

        impl From<$name> for SaiAttrId {
            fn from(attr: $name) -> SaiAttrId {
                attr as SaiAttrId
            }
        }
    };
}

define_attr_ids! {
    /// `sai_buffer_pool_attr_t` plus custom tile accounting counters.
    BufferPoolAttr {
        SharedSize = 0 => "SAI_BUFFER_POOL_ATTR_SHARED_SIZE",
        Type = 1 => "SAI_BUFFER_POOL_ATTR_TYPE",
        Size = 2 => "SAI_BUFFER_POOL_ATTR_SIZE",
        ThresholdMode = 3 => "SAI_BUFFER_POOL_ATTR_THRESHOLD_MODE",
        TilesTotalReservedSize = SAI_CUSTOM_RANGE_START => "SAI_BUFFER_POOL_ATTR_TILES_TOTAL_RESERVED_SIZE",
        TileReservedSizes = SAI_CUSTOM_RANGE_START + 1 => "SAI_BUFFER_POOL_ATTR_TILE_RESERVED_SIZES",
    }
}

define_attr_ids! {
    /// `sai_buffer_profile_attr_t` plus custom reference counters.
    BufferProfileAttr {
        PoolId = 0 => "SAI_BUFFER_PROFILE_ATTR_POOL_ID",
        ReservedBufferSize = 1 => "SAI_BUFFER_PROFILE_ATTR_RESERVED_BUFFER_SIZE",
        ThresholdMode = 2 => "SAI_BUFFER_PROFILE_ATTR_THRESHOLD_MODE",
        SharedDynamicTh = 3 => "SAI_BUFFER_PROFILE_ATTR_SHARED_DYNAMIC_TH",
        SharedStaticTh = 4 => "SAI_BUFFER_PROFILE_ATTR_SHARED_STATIC_TH",
        XoffTh = 5 => "SAI_BUFFER_PROFILE_ATTR_XOFF_TH",
        XonTh = 6 => "SAI_BUFFER_PROFILE_ATTR_XON_TH",
        ReferenceCount = SAI_CUSTOM_RANGE_START => "SAI_BUFFER_PROFILE_ATTR_REFERENCE_COUNT",
        ConsumerList = SAI_CUSTOM_RANGE_START + 1 => "SAI_BUFFER_PROFILE_ATTR_CONSUMER_LIST",
    }
}

define_attr_ids! {
    /// `sai_ingress_priority_group_attr_t`.
    IngressPriorityGroupAttr {
        BufferProfile = 0 => "SAI_INGRESS_PRIORITY_GROUP_ATTR_BUFFER_PROFILE",
        Port = 1 => "SAI_INGRESS_PRIORITY_GROUP_ATTR_PORT",
        Index = 2 => "SAI_INGRESS_PRIORITY_GROUP_ATTR_INDEX",
    }
}

define_attr_ids! {
    /// `sai_queue_attr_t`.
    QueueAttr {
        Port = 1 => "SAI_QUEUE_ATTR_PORT",
        Index = 2 => "SAI_QUEUE_ATTR_INDEX",
        BufferProfileId = 5 => "SAI_QUEUE_ATTR_BUFFER_PROFILE_ID",
    }
}

define_attr_ids! {
    /// Buffer-related subset of `sai_port_attr_t`.
    PortAttr {
        HwPortNumber = 0 => "SAI_PORT_ATTR_HW_PORT_NUMBER",
        NumberOfIngressPriorityGroups = 1 => "SAI_PORT_ATTR_NUMBER_OF_INGRESS_PRIORITY_GROUPS",
        IngressPriorityGroupList = 2 => "SAI_PORT_ATTR_INGRESS_PRIORITY_GROUP_LIST",
        QosNumberOfQueues = 3 => "SAI_PORT_ATTR_QOS_NUMBER_OF_QUEUES",
        QosQueueList = 4 => "SAI_PORT_ATTR_QOS_QUEUE_LIST",
        QosIngressBufferProfile = 5 => "SAI_PORT_ATTR_QOS_INGRESS_BUFFER_PROFILE",
        Tile = SAI_CUSTOM_RANGE_START => "SAI_PORT_ATTR_TILE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attr_id_round_trip() {
        for attr in BufferProfileAttr::ALL {
            assert_eq!(BufferProfileAttr::from_id(attr.id()), Some(*attr));
        }
        assert_eq!(BufferPoolAttr::from_id(99), None);
        assert_eq!(QueueAttr::from_id(0), None);
    }

    #[test]
    fn test_custom_range() {
        assert_eq!(
            BufferPoolAttr::TileReservedSizes.id(),
            SAI_CUSTOM_RANGE_START + 1
        );
        assert_eq!(
            BufferPoolAttr::TilesTotalReservedSize.name(),
            "SAI_BUFFER_POOL_ATTR_TILES_TOTAL_RESERVED_SIZE"
        );
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(SaiAttributeValue::U64(1).kind(), SaiValueKind::U64);
        assert_eq!(
            SaiAttributeValue::empty(SaiValueKind::ObjectList).kind(),
            SaiValueKind::ObjectList
        );
        assert_eq!(SaiAttributeValue::Oid(5).as_oid(), Some(5));
        assert_eq!(SaiAttributeValue::Oid(5).as_u64(), None);
    }

    #[test]
    fn test_list_capacity_request() {
        let request: SaiList<u64> = SaiList::with_capacity(4);
        assert_eq!(request.count, 4);
        assert!(request.list.is_empty());

        let filled = SaiList::from_vec(vec![1u64, 2, 3]);
        assert_eq!(filled.count, 3);
        assert_eq!(filled, SaiList { count: 3, list: vec![1, 2, 3] });
    }
}
