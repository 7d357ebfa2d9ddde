//! Type-safe SAI object ID wrappers.
//!
//! This module provides strongly-typed wrappers for SAI object IDs, preventing
//! accidental mixing of different object types (e.g., passing a pool OID where
//! a profile OID is expected).
//!
//! A raw object ID packs three fields, most significant first:
//!
//! ```text
//!  63      56 55     48 47            32 31                    0
//! +----------+---------+----------------+-----------------------+
//! | reserved |  type   |   generation   |         index         |
//! +----------+---------+----------------+-----------------------+
//! ```
//!
//! The generation lets a recycled index be told apart from the handle that
//! previously occupied it.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw SAI object ID type (matches sai_object_id_t in C).
pub type RawSaiObjectId = u64;

const OBJECT_TYPE_SHIFT: u32 = 48;
const OBJECT_TYPE_MASK: u64 = 0xFF;
const GENERATION_SHIFT: u32 = 32;
const GENERATION_MASK: u64 = 0xFFFF;
const INDEX_MASK: u64 = 0xFFFF_FFFF;

/// SAI object types handled by the buffer subsystem.
///
/// Discriminants follow `sai_object_type_t`. The derived ordering is what
/// keeps object kinds in separate, contiguous partitions of an ordered store.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SaiObjectType {
    Port = 1,
    Queue = 21,
    BufferPool = 24,
    BufferProfile = 25,
    IngressPriorityGroup = 26,
    Switch = 33,
}

impl SaiObjectType {
    /// Converts a raw `sai_object_type_t` value.
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(SaiObjectType::Port),
            21 => Some(SaiObjectType::Queue),
            24 => Some(SaiObjectType::BufferPool),
            25 => Some(SaiObjectType::BufferProfile),
            26 => Some(SaiObjectType::IngressPriorityGroup),
            33 => Some(SaiObjectType::Switch),
            _ => None,
        }
    }

    /// Extracts the object type encoded in a raw object ID.
    pub fn of(oid: RawSaiObjectId) -> Option<Self> {
        Self::from_raw(((oid >> OBJECT_TYPE_SHIFT) & OBJECT_TYPE_MASK) as u8)
    }

    pub fn as_raw(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for SaiObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiObjectType::Port => "SAI_OBJECT_TYPE_PORT",
            SaiObjectType::Queue => "SAI_OBJECT_TYPE_QUEUE",
            SaiObjectType::BufferPool => "SAI_OBJECT_TYPE_BUFFER_POOL",
            SaiObjectType::BufferProfile => "SAI_OBJECT_TYPE_BUFFER_PROFILE",
            SaiObjectType::IngressPriorityGroup => "SAI_OBJECT_TYPE_INGRESS_PRIORITY_GROUP",
            SaiObjectType::Switch => "SAI_OBJECT_TYPE_SWITCH",
        };
        write!(f, "{}", s)
    }
}

/// Untyped store key: an object type plus the full object ID.
///
/// Ordering compares the object type first, so keys of different kinds never
/// interleave and never collide.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey {
    pub object_type: SaiObjectType,
    pub id: RawSaiObjectId,
}

impl ObjectKey {
    /// Builds the key for the handle `(object_type, generation, index)`.
    pub const fn new(object_type: SaiObjectType, generation: u16, index: u32) -> Self {
        let id = ((object_type as u64) << OBJECT_TYPE_SHIFT)
            | ((generation as u64) << GENERATION_SHIFT)
            | index as u64;
        Self { object_type, id }
    }

    /// Parses a raw object ID, returning `None` for null or unknown types.
    pub fn from_raw(oid: RawSaiObjectId) -> Option<Self> {
        SaiObjectType::of(oid).map(|object_type| Self {
            object_type,
            id: oid,
        })
    }

    pub const fn index(&self) -> u32 {
        (self.id & INDEX_MASK) as u32
    }

    pub const fn generation(&self) -> u16 {
        ((self.id >> GENERATION_SHIFT) & GENERATION_MASK) as u16
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:016x})", self.object_type, self.id)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.id)
    }
}

/// Marker trait for SAI object kinds.
///
/// Each SAI object type implements this trait to enable compile-time
/// type checking of object IDs.
pub trait SaiObjectKind: Send + Sync + 'static {
    /// The SAI object type this marker stands for.
    const OBJECT_TYPE: SaiObjectType;

    /// Returns the SAI object type name for debugging.
    fn type_name() -> &'static str;
}

/// A type-safe SAI object ID.
///
/// This wrapper ensures that object IDs of different types cannot be
/// accidentally mixed. The phantom type parameter `T` indicates what
/// kind of SAI object this ID refers to.
///
/// # Examples
///
/// ```
/// use sonic_sai::{BufferPoolOid, ObjectKey, SaiObjectType};
///
/// let key = ObjectKey::new(SaiObjectType::BufferPool, 0, 7);
/// let pool = BufferPoolOid::from_key(key).unwrap();
/// assert_eq!(pool.index(), 7);
///
/// // A profile key cannot become a pool OID.
/// let profile = ObjectKey::new(SaiObjectType::BufferProfile, 0, 7);
/// assert!(BufferPoolOid::from_key(profile).is_none());
/// ```
#[derive(Clone, Copy)]
pub struct SaiObjectId<T: SaiObjectKind> {
    raw: RawSaiObjectId,
    _marker: PhantomData<T>,
}

impl<T: SaiObjectKind> SaiObjectId<T> {
    /// The null object ID (SAI_NULL_OBJECT_ID).
    pub const NULL: Self = Self {
        raw: 0,
        _marker: PhantomData,
    };

    /// Creates a new object ID from a raw value.
    ///
    /// Returns `None` if the raw value is null or encodes another object type.
    pub fn from_raw(raw: RawSaiObjectId) -> Option<Self> {
        match SaiObjectType::of(raw) {
            Some(object_type) if object_type == T::OBJECT_TYPE => Some(Self {
                raw,
                _marker: PhantomData,
            }),
            _ => None,
        }
    }

    /// Creates a typed ID from a store key of the matching object type.
    pub fn from_key(key: ObjectKey) -> Option<Self> {
        if key.object_type == T::OBJECT_TYPE {
            Some(Self {
                raw: key.id,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }

    /// Returns the store key for this object.
    pub const fn key(&self) -> ObjectKey {
        ObjectKey {
            object_type: T::OBJECT_TYPE,
            id: self.raw,
        }
    }

    /// Returns the raw object ID value.
    pub const fn as_raw(&self) -> RawSaiObjectId {
        self.raw
    }

    pub const fn index(&self) -> u32 {
        (self.raw & INDEX_MASK) as u32
    }

    /// Returns true if this is a null object ID.
    pub const fn is_null(&self) -> bool {
        self.raw == 0
    }

    /// Returns true if this is a valid (non-null) object ID.
    pub const fn is_valid(&self) -> bool {
        self.raw != 0
    }
}

impl<T: SaiObjectKind> fmt::Debug for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:016x})", T::type_name(), self.raw)
    }
}

impl<T: SaiObjectKind> fmt::Display for SaiObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.raw)
    }
}

impl<T: SaiObjectKind> PartialEq for SaiObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: SaiObjectKind> Eq for SaiObjectId<T> {}

impl<T: SaiObjectKind> Hash for SaiObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: SaiObjectKind> Default for SaiObjectId<T> {
    fn default() -> Self {
        Self::NULL
    }
}

// ============================================================================
// Object Kind Markers
// ============================================================================

macro_rules! define_object_kind {
    ($name:ident, $object_type:ident, $type_name:literal, $oid_alias:ident) => {
        #[doc = concat!("Marker type for SAI ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl SaiObjectKind for $name {
            const OBJECT_TYPE: SaiObjectType = SaiObjectType::$object_type;

            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Type alias for ", $type_name, " object IDs.")]
        pub type $oid_alias = SaiObjectId<$name>;
    };
}

define_object_kind!(SwitchKind, Switch, "Switch", SwitchOid);
define_object_kind!(PortKind, Port, "Port", PortOid);
define_object_kind!(QueueKind, Queue, "Queue", QueueOid);
define_object_kind!(BufferPoolKind, BufferPool, "BufferPool", BufferPoolOid);
define_object_kind!(BufferProfileKind, BufferProfile, "BufferProfile", BufferProfileOid);
define_object_kind!(
    IngressPriorityGroupKind,
    IngressPriorityGroup,
    "IngressPriorityGroup",
    IngressPriorityGroupOid
);
