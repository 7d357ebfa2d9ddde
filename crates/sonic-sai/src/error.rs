//! SAI error types and status handling.
//!
//! This module provides safe error handling for SAI operations, converting
//! raw SAI status codes into Rust's Result type. Attribute-level failures
//! carry the index of the offending attribute, matching the SAI convention of
//! encoding the index into the status code itself.

use std::fmt;
use thiserror::Error;

const INVALID_ATTRIBUTE_0: u32 = 0xFFFE_0000;
const INVALID_ATTR_VALUE_0: u32 = 0xFFFD_0000;
const UNKNOWN_ATTRIBUTE_0: u32 = 0xFFFB_0000;
const ATTR_INDEX_MASK: u32 = 0xFFFF;

/// SAI status codes matching the SAI C API.
///
/// The fieldless variants correspond one-to-one to `sai_status_t` values.
/// The index-qualified variants cover the `SAI_STATUS_*_0 + index` ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaiStatus {
    Success,
    Failure,
    NotSupported,
    NoMemory,
    InsufficientResources,
    InvalidParameter,
    ItemAlreadyExists,
    ItemNotFound,
    BufferOverflow,
    Uninitialized,
    TableFull,
    MandatoryAttributeMissing,
    NotImplemented,
    ObjectInUse,
    InvalidObjectType,
    InvalidObjectId,
    /// `SAI_STATUS_INVALID_ATTRIBUTE_0 + index`
    InvalidAttribute(u32),
    /// `SAI_STATUS_INVALID_ATTR_VALUE_0 + index`
    InvalidAttributeValue(u32),
    /// `SAI_STATUS_UNKNOWN_ATTRIBUTE_0 + index`
    UnknownAttribute(u32),
}

impl SaiStatus {
    /// Creates a SaiStatus from a raw `sai_status_t` value.
    pub fn from_raw(status: i32) -> Self {
        match status {
            0 => SaiStatus::Success,
            -1 => SaiStatus::Failure,
            -2 => SaiStatus::NotSupported,
            -3 => SaiStatus::NoMemory,
            -4 => SaiStatus::InsufficientResources,
            -5 => SaiStatus::InvalidParameter,
            -6 => SaiStatus::ItemAlreadyExists,
            -7 => SaiStatus::ItemNotFound,
            -8 => SaiStatus::BufferOverflow,
            -12 => SaiStatus::Uninitialized,
            -13 => SaiStatus::TableFull,
            -14 => SaiStatus::MandatoryAttributeMissing,
            -15 => SaiStatus::NotImplemented,
            -17 => SaiStatus::ObjectInUse,
            -18 => SaiStatus::InvalidObjectType,
            -19 => SaiStatus::InvalidObjectId,
            _ => {
                let raw = status as u32;
                let index = raw & ATTR_INDEX_MASK;
                match raw & !ATTR_INDEX_MASK {
                    INVALID_ATTRIBUTE_0 => SaiStatus::InvalidAttribute(index),
                    INVALID_ATTR_VALUE_0 => SaiStatus::InvalidAttributeValue(index),
                    UNKNOWN_ATTRIBUTE_0 => SaiStatus::UnknownAttribute(index),
                    _ => SaiStatus::Failure,
                }
            }
        }
    }

    /// Returns the raw `sai_status_t` value.
    pub fn to_raw(&self) -> i32 {
        match self {
            SaiStatus::Success => 0,
            SaiStatus::Failure => -1,
            SaiStatus::NotSupported => -2,
            SaiStatus::NoMemory => -3,
            SaiStatus::InsufficientResources => -4,
            SaiStatus::InvalidParameter => -5,
            SaiStatus::ItemAlreadyExists => -6,
            SaiStatus::ItemNotFound => -7,
            SaiStatus::BufferOverflow => -8,
            SaiStatus::Uninitialized => -12,
            SaiStatus::TableFull => -13,
            SaiStatus::MandatoryAttributeMissing => -14,
            SaiStatus::NotImplemented => -15,
            SaiStatus::ObjectInUse => -17,
            SaiStatus::InvalidObjectType => -18,
            SaiStatus::InvalidObjectId => -19,
            SaiStatus::InvalidAttribute(i) => (INVALID_ATTRIBUTE_0 + (i & ATTR_INDEX_MASK)) as i32,
            SaiStatus::InvalidAttributeValue(i) => {
                (INVALID_ATTR_VALUE_0 + (i & ATTR_INDEX_MASK)) as i32
            }
            SaiStatus::UnknownAttribute(i) => (UNKNOWN_ATTRIBUTE_0 + (i & ATTR_INDEX_MASK)) as i32,
        }
    }

    /// Returns the attribute index for index-qualified codes.
    pub fn attr_index(&self) -> Option<u32> {
        match self {
            SaiStatus::InvalidAttribute(i)
            | SaiStatus::InvalidAttributeValue(i)
            | SaiStatus::UnknownAttribute(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns true if the status indicates success.
    pub fn is_success(&self) -> bool {
        *self == SaiStatus::Success
    }

    /// Returns true if the status indicates an error.
    pub fn is_error(&self) -> bool {
        *self != SaiStatus::Success
    }
}

impl fmt::Display for SaiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SaiStatus::Success => "SAI_STATUS_SUCCESS",
            SaiStatus::Failure => "SAI_STATUS_FAILURE",
            SaiStatus::NotSupported => "SAI_STATUS_NOT_SUPPORTED",
            SaiStatus::NoMemory => "SAI_STATUS_NO_MEMORY",
            SaiStatus::InsufficientResources => "SAI_STATUS_INSUFFICIENT_RESOURCES",
            SaiStatus::InvalidParameter => "SAI_STATUS_INVALID_PARAMETER",
            SaiStatus::ItemAlreadyExists => "SAI_STATUS_ITEM_ALREADY_EXISTS",
            SaiStatus::ItemNotFound => "SAI_STATUS_ITEM_NOT_FOUND",
            SaiStatus::BufferOverflow => "SAI_STATUS_BUFFER_OVERFLOW",
            SaiStatus::Uninitialized => "SAI_STATUS_UNINITIALIZED",
            SaiStatus::TableFull => "SAI_STATUS_TABLE_FULL",
            SaiStatus::MandatoryAttributeMissing => "SAI_STATUS_MANDATORY_ATTRIBUTE_MISSING",
            SaiStatus::NotImplemented => "SAI_STATUS_NOT_IMPLEMENTED",
            SaiStatus::ObjectInUse => "SAI_STATUS_OBJECT_IN_USE",
            SaiStatus::InvalidObjectType => "SAI_STATUS_INVALID_OBJECT_TYPE",
            SaiStatus::InvalidObjectId => "SAI_STATUS_INVALID_OBJECT_ID",
            SaiStatus::InvalidAttribute(i) => {
                return write!(f, "SAI_STATUS_INVALID_ATTRIBUTE_{}", i)
            }
            SaiStatus::InvalidAttributeValue(i) => {
                return write!(f, "SAI_STATUS_INVALID_ATTR_VALUE_{}", i)
            }
            SaiStatus::UnknownAttribute(i) => {
                return write!(f, "SAI_STATUS_UNKNOWN_ATTRIBUTE_{}", i)
            }
        };
        write!(f, "{}", s)
    }
}

/// Error type for SAI operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SaiError {
    /// A mandatory-on-create attribute was not supplied.
    #[error("Mandatory attribute missing: {attribute}")]
    MandatoryAttributeMissing { attribute: String },

    /// The attribute at `index` is not valid in this context.
    #[error("Invalid attribute at index {index}: {reason}")]
    InvalidAttribute { index: u32, reason: String },

    /// The attribute at `index` carries an unacceptable value.
    #[error("Invalid attribute value at index {index}: {reason}")]
    InvalidAttributeValue { index: u32, reason: String },

    /// The attribute id at `index` is unknown for the object type.
    #[error("Unknown attribute at index {index}")]
    UnknownAttribute { index: u32 },

    /// Object is in use and cannot be removed.
    #[error("Object in use: {object}")]
    ObjectInUse { object: String },

    /// The requested item was not found.
    #[error("Item not found: {item}")]
    NotFound { item: String },

    /// The item already exists.
    #[error("Item already exists: {item}")]
    AlreadyExists { item: String },

    /// Not enough buffer memory (or pool slots) to satisfy the request.
    #[error("Insufficient resources: {message}")]
    InsufficientResources { message: String },

    /// Invalid parameter combination.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The requested operation is not supported for this object.
    #[error("Operation not supported: {feature}")]
    NotSupported { feature: String },

    /// A list attribute did not fit; `required` is the element count needed.
    #[error("Buffer overflow at index {index}: {required} elements required")]
    BufferOverflow { index: u32, required: u32 },
}

impl SaiError {
    /// Creates a mandatory attribute missing error.
    pub fn mandatory_missing(attribute: impl Into<String>) -> Self {
        SaiError::MandatoryAttributeMissing {
            attribute: attribute.into(),
        }
    }

    /// Creates an invalid attribute error at the given index.
    pub fn invalid_attribute(index: usize, reason: impl Into<String>) -> Self {
        SaiError::InvalidAttribute {
            index: index as u32,
            reason: reason.into(),
        }
    }

    /// Creates an invalid attribute value error at the given index.
    pub fn invalid_attribute_value(index: usize, reason: impl Into<String>) -> Self {
        SaiError::InvalidAttributeValue {
            index: index as u32,
            reason: reason.into(),
        }
    }

    /// Creates an unknown attribute error at the given index.
    pub fn unknown_attribute(index: usize) -> Self {
        SaiError::UnknownAttribute {
            index: index as u32,
        }
    }

    /// Creates an object in use error.
    pub fn object_in_use(object: impl Into<String>) -> Self {
        SaiError::ObjectInUse {
            object: object.into(),
        }
    }

    /// Creates a not found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        SaiError::NotFound { item: item.into() }
    }

    /// Creates an already exists error.
    pub fn already_exists(item: impl Into<String>) -> Self {
        SaiError::AlreadyExists { item: item.into() }
    }

    /// Creates an insufficient resources error.
    pub fn insufficient_resources(message: impl Into<String>) -> Self {
        SaiError::InsufficientResources {
            message: message.into(),
        }
    }

    /// Creates an invalid parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        SaiError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a not supported error with a feature description.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        SaiError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Returns the SAI status code this error is reported as.
    pub fn status(&self) -> SaiStatus {
        match self {
            SaiError::MandatoryAttributeMissing { .. } => SaiStatus::MandatoryAttributeMissing,
            SaiError::InvalidAttribute { index, .. } => SaiStatus::InvalidAttribute(*index),
            SaiError::InvalidAttributeValue { index, .. } => {
                SaiStatus::InvalidAttributeValue(*index)
            }
            SaiError::UnknownAttribute { index } => SaiStatus::UnknownAttribute(*index),
            SaiError::ObjectInUse { .. } => SaiStatus::ObjectInUse,
            SaiError::NotFound { .. } => SaiStatus::ItemNotFound,
            SaiError::AlreadyExists { .. } => SaiStatus::ItemAlreadyExists,
            SaiError::InsufficientResources { .. } => SaiStatus::InsufficientResources,
            SaiError::InvalidParameter { .. } => SaiStatus::InvalidParameter,
            SaiError::NotSupported { .. } => SaiStatus::NotSupported,
            SaiError::BufferOverflow { .. } => SaiStatus::BufferOverflow,
        }
    }

    /// Returns true if the caller can retry with corrected input.
    ///
    /// Only a list overflow qualifies: the caller resizes its buffer to
    /// `required` and asks again. Everything else is a capacity or input
    /// condition that will fail identically on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SaiError::BufferOverflow { .. })
    }
}

/// Result type for SAI operations.
pub type SaiResult<T> = Result<T, SaiError>;
