//! SAI (Switch Abstraction Interface) vocabulary for the buffer subsystem.
//!
//! This crate provides the type-safe building blocks shared by every layer
//! that manipulates SAI buffer objects, preventing common errors like mixing
//! object IDs of different types and ensuring status codes carry the index of
//! the attribute that caused them.
//!
//! # Architecture
//!
//! - [`types`]: SAI object types, store keys and type-safe object IDs
//! - [`error`]: Status codes (including index-qualified ranges) and errors
//! - [`attr`]: Attribute ids per object type and attribute values
//!
//! # Example
//!
//! ```
//! use sonic_sai::{BufferProfileAttr, SaiAttribute, SaiAttributeValue, SaiError, SaiStatus};
//!
//! let attr = SaiAttribute::new(BufferProfileAttr::ReservedBufferSize, SaiAttributeValue::U64(4096));
//! assert_eq!(attr.id, 1);
//!
//! let err = SaiError::invalid_attribute(1, "xoff on egress pool");
//! assert_eq!(err.status(), SaiStatus::InvalidAttribute(1));
//! ```

pub mod attr;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use types::{
    BufferPoolKind, BufferPoolOid, BufferProfileKind, BufferProfileOid, IngressPriorityGroupKind,
    IngressPriorityGroupOid, ObjectKey, PortKind, PortOid, QueueKind, QueueOid, RawSaiObjectId,
    SaiObjectId, SaiObjectKind, SaiObjectType, SwitchKind, SwitchOid,
};

pub use attr::{
    BufferPoolAttr, BufferProfileAttr, IngressPriorityGroupAttr, PortAttr, QueueAttr, SaiAttrId,
    SaiAttribute, SaiAttributeValue, SaiList, SaiValueKind, SAI_CUSTOM_RANGE_START,
};

pub use error::{SaiError, SaiResult, SaiStatus};
