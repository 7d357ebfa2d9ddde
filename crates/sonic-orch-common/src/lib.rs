//! Common object bookkeeping for SONiC orchestration.
//!
//! This crate provides the storage primitives every configuration subsystem
//! builds on:
//!
//! - [`ObjectStore`]: Ordered, typed repository that never auto-vivifies
//!   entries and hands out generation-checked object handles
//! - [`Associated`]: Intrusive owner/member lists kept inside the stored
//!   records, with reference counting via [`HasRefCount`]
//!
//! # Example
//!
//! ```
//! use sonic_orch_common::{ObjectStore, StoreError};
//! use sonic_sai::{ObjectKey, SaiObjectType};
//!
//! let mut store: ObjectStore<u64> = ObjectStore::new();
//! let pool = store.insert_new(SaiObjectType::BufferPool, |_| 10_485_760).unwrap();
//!
//! assert_eq!(store.get(&pool), Ok(&10_485_760));
//!
//! let missing = ObjectKey::new(SaiObjectType::BufferPool, 0, 42);
//! assert_eq!(store.get(&missing), Err(StoreError::NotFound(missing)));
//! ```

mod association;
mod object_store;

pub use association::{Associated, AssociationError, Link, ListHead, Members};
pub use object_store::{HasRefCount, ObjectStore, StoreError};
