//! Ordered, typed object repository that never auto-vivifies.
//!
//! `ObjectStore` keeps every record of every SAI object kind in a single
//! ordered map keyed by [`ObjectKey`]. Because keys compare by object type
//! first, each kind occupies its own contiguous partition and kinds never
//! collide.
//!
//! The store also hands out identities. A handle packs `(kind, generation,
//! index)`; releasing a handle recycles its index under the next generation,
//! so a stale handle kept by a caller resolves to [`StoreError::NotFound`]
//! instead of silently aliasing the new occupant. An index whose generations
//! are used up is retired rather than wrapped.
//!
//! Lookups are explicit:
//! - `get()` / `get_mut()` return `Err(NotFound)` for missing keys
//! - `insert()` returns `Err(DuplicateKey)` instead of overwriting
//! - `remove()` returns `None` for missing keys

use std::collections::BTreeMap;
use std::ops::Bound;

use sonic_sai::{ObjectKey, SaiError, SaiObjectType};
use thiserror::Error;

/// Error type for ObjectStore operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Duplicate key {0:?}")]
    DuplicateKey(ObjectKey),

    #[error("Key not found {0:?}")]
    NotFound(ObjectKey),

    #[error("Object index space exhausted for {0}")]
    Exhausted(SaiObjectType),

    #[error("Reference count underflow on {0:?}")]
    RefCountUnderflow(ObjectKey),
}

impl From<StoreError> for SaiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => SaiError::already_exists(format!("{:?}", key)),
            StoreError::NotFound(key) => SaiError::not_found(format!("{:?}", key)),
            StoreError::Exhausted(kind) => {
                SaiError::insufficient_resources(format!("no free {} handles", kind))
            }
            StoreError::RefCountUnderflow(key) => {
                SaiError::invalid_parameter(format!("reference count underflow on {:?}", key))
            }
        }
    }
}

/// Trait for types that have a reference count.
pub trait HasRefCount {
    /// Increments the reference count and returns the new value.
    fn increment_ref(&mut self) -> u32;

    /// Decrements the reference count and returns the new value.
    ///
    /// Returns `None` if the count would underflow.
    fn decrement_ref(&mut self) -> Option<u32>;

    /// Returns the current reference count.
    fn ref_count(&self) -> u32;
}

/// Per-kind index allocator.
#[derive(Debug, Clone, Default)]
struct IndexAllocator {
    next_index: u32,
    /// Released indices with the generation their next handle will carry.
    free: Vec<(u32, u16)>,
}

impl IndexAllocator {
    fn allocate(&mut self) -> Option<(u32, u16)> {
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }
        let index = self.next_index;
        self.next_index = self.next_index.checked_add(1)?;
        Some((index, 0))
    }

    fn release(&mut self, index: u32, generation: u16) {
        if index >= self.next_index || self.free.iter().any(|(i, _)| *i == index) {
            return;
        }
        // Out of generations: the index is never handed out again.
        if let Some(next) = generation.checked_add(1) {
            self.free.push((index, next));
        }
    }
}

/// An ordered map from [`ObjectKey`] to records, with identity allocation.
///
/// # Example
///
/// ```
/// use sonic_orch_common::ObjectStore;
/// use sonic_sai::SaiObjectType;
///
/// let mut store: ObjectStore<&str> = ObjectStore::new();
/// let key = store.insert_new(SaiObjectType::BufferPool, |_| "ingress_lossless_pool").unwrap();
///
/// assert_eq!(store.get(&key), Ok(&"ingress_lossless_pool"));
/// assert_eq!(store.remove(&key), Some("ingress_lossless_pool"));
/// store.release(&key);
///
/// // The stale handle stays dead even after the index is reused.
/// let reused = store.insert_new(SaiObjectType::BufferPool, |_| "egress_lossy_pool").unwrap();
/// assert_eq!(reused.index(), key.index());
/// assert!(store.get(&key).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStore<R> {
    records: BTreeMap<ObjectKey, R>,
    allocators: BTreeMap<SaiObjectType, IndexAllocator>,
}

impl<R> ObjectStore<R> {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            records: BTreeMap::new(),
            allocators: BTreeMap::new(),
        }
    }

    /// Returns the number of records across all kinds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of records of one kind.
    pub fn count_kind(&self, kind: SaiObjectType) -> usize {
        self.iter_kind(kind).count()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.records.contains_key(key)
    }

    /// Returns a reference to the record for `key`.
    ///
    /// **This never creates entries.**
    pub fn get(&self, key: &ObjectKey) -> Result<&R, StoreError> {
        self.records.get(key).ok_or(StoreError::NotFound(*key))
    }

    /// Returns a mutable reference to the record for `key`.
    ///
    /// **This never creates entries.**
    pub fn get_mut(&mut self, key: &ObjectKey) -> Result<&mut R, StoreError> {
        self.records.get_mut(key).ok_or(StoreError::NotFound(*key))
    }

    /// Inserts a record under a key that must not be present yet.
    pub fn insert(&mut self, key: ObjectKey, record: R) -> Result<(), StoreError> {
        if self.records.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        self.records.insert(key, record);
        Ok(())
    }

    /// Allocates a fresh handle of `kind` and inserts the record built for it.
    pub fn insert_new<F>(&mut self, kind: SaiObjectType, build: F) -> Result<ObjectKey, StoreError>
    where
        F: FnOnce(ObjectKey) -> R,
    {
        let key = self.allocate(kind)?;
        let record = build(key);
        self.insert(key, record)?;
        Ok(key)
    }

    /// Removes a record. Safe on absence.
    pub fn remove(&mut self, key: &ObjectKey) -> Option<R> {
        self.records.remove(key)
    }

    /// Hands out the next free handle of `kind`.
    pub fn allocate(&mut self, kind: SaiObjectType) -> Result<ObjectKey, StoreError> {
        let allocator = self.allocators.entry(kind).or_default();
        let (index, generation) = allocator.allocate().ok_or(StoreError::Exhausted(kind))?;
        Ok(ObjectKey::new(kind, generation, index))
    }

    /// Returns a handle's index to its kind's free list under a new generation.
    ///
    /// Releasing a handle whose record is still stored is ignored.
    pub fn release(&mut self, key: &ObjectKey) {
        if self.records.contains_key(key) {
            return;
        }
        if let Some(allocator) = self.allocators.get_mut(&key.object_type) {
            allocator.release(key.index(), key.generation());
        }
    }

    /// Returns the smallest key in the store.
    pub fn first_ordered(&self) -> Option<ObjectKey> {
        self.records.keys().next().copied()
    }

    /// Returns the smallest key strictly greater than `key`.
    ///
    /// `key` does not have to be present, so a scan survives the removal of
    /// the entry it is positioned on.
    pub fn next_ordered(&self, key: &ObjectKey) -> Option<ObjectKey> {
        self.records
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next()
            .map(|(k, _)| *k)
    }

    /// Iterates over one kind's records in ascending key order.
    pub fn iter_kind(&self, kind: SaiObjectType) -> impl Iterator<Item = (&ObjectKey, &R)> {
        let lo = ObjectKey {
            object_type: kind,
            id: 0,
        };
        let hi = ObjectKey {
            object_type: kind,
            id: u64::MAX,
        };
        self.records.range(lo..=hi)
    }

    /// Iterates over every record in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &R)> {
        self.records.iter()
    }
}

impl<R: HasRefCount> ObjectStore<R> {
    /// Increments the reference count of an existing record.
    ///
    /// **This never creates entries.**
    pub fn increment_ref(&mut self, key: &ObjectKey) -> Result<u32, StoreError> {
        Ok(self.get_mut(key)?.increment_ref())
    }

    /// Decrements the reference count of an existing record.
    pub fn decrement_ref(&mut self, key: &ObjectKey) -> Result<u32, StoreError> {
        self.get_mut(key)?
            .decrement_ref()
            .ok_or(StoreError::RefCountUnderflow(*key))
    }

    /// Returns the reference count for `key`, or `None` if absent.
    pub fn ref_count(&self, key: &ObjectKey) -> Option<u32> {
        self.records.get(key).map(|r| r.ref_count())
    }
}

impl<R> Default for ObjectStore<R> {
    fn default() -> Self {
        Self::new()
    }
}
