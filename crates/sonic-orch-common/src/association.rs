//! Bidirectional reference lists between stored records.
//!
//! Associations are intrusive: an owner record embeds one [`ListHead`] per
//! list it owns and a member record embeds one optional [`Link`] per list
//! it can join. All pointers are [`ObjectKey`]s into the same
//! [`ObjectStore`], so attach and detach are O(1) and a record can always
//! find both its owner and its members without a side index.
//!
//! Every attach bumps the owner's reference count and every detach drops
//! it, which is what makes [`ObjectStore::can_remove`] a constant-time
//! check.

use std::fmt;

use sonic_sai::{ObjectKey, SaiError};
use thiserror::Error;

use crate::object_store::{HasRefCount, ObjectStore, StoreError};

/// Head of an owner's member list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListHead {
    pub head: Option<ObjectKey>,
    pub tail: Option<ObjectKey>,
    pub len: u32,
}

impl ListHead {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// A member's position in one owner list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub owner: ObjectKey,
    pub prev: Option<ObjectKey>,
    pub next: Option<ObjectKey>,
}

/// Records that can own lists and be members of lists.
///
/// `List` names the list kinds of a domain (for example "profiles of a
/// pool"). A record returns `None` from the accessors for lists it cannot
/// own or join.
pub trait Associated: HasRefCount {
    type List: Copy + Eq + fmt::Debug + 'static;

    /// Every list kind of the domain.
    fn lists() -> &'static [Self::List];

    fn list_head(&self, list: Self::List) -> Option<&ListHead>;

    fn list_head_mut(&mut self, list: Self::List) -> Option<&mut ListHead>;

    fn link_slot(&self, list: Self::List) -> Option<&Option<Link>>;

    fn link_slot_mut(&mut self, list: Self::List) -> Option<&mut Option<Link>>;

    /// The `(list, owner)` pairs this record currently belongs to.
    fn memberships(&self) -> Vec<(Self::List, ObjectKey)> {
        Self::lists()
            .iter()
            .filter_map(|list| {
                self.link_slot(*list)
                    .and_then(|slot| slot.as_ref())
                    .map(|link| (*list, link.owner))
            })
            .collect()
    }

    /// The owner of this record in `list`, if attached.
    fn owner_in(&self, list: Self::List) -> Option<ObjectKey> {
        self.link_slot(list)
            .and_then(|slot| slot.as_ref())
            .map(|link| link.owner)
    }
}

/// Error type for association operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssociationError {
    #[error("Owner not found: {0:?}")]
    OwnerNotFound(ObjectKey),

    #[error("Member not found: {0:?}")]
    MemberNotFound(ObjectKey),

    #[error("{key:?} has no list {list}")]
    NoSuchList { key: ObjectKey, list: String },

    #[error("{member:?} is already attached to {owner:?}")]
    AlreadyAttached { member: ObjectKey, owner: ObjectKey },

    #[error("{member:?} is not attached to {owner:?}")]
    NotAttached { member: ObjectKey, owner: ObjectKey },

    #[error("{key:?} is referenced {ref_count} times")]
    ObjectInUse { key: ObjectKey, ref_count: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AssociationError> for SaiError {
    fn from(err: AssociationError) -> Self {
        match err {
            AssociationError::OwnerNotFound(key) | AssociationError::MemberNotFound(key) => {
                SaiError::not_found(format!("{:?}", key))
            }
            AssociationError::ObjectInUse { key, ref_count } => {
                SaiError::object_in_use(format!("{:?} ({} references)", key, ref_count))
            }
            AssociationError::AlreadyAttached { .. } => SaiError::already_exists(err.to_string()),
            AssociationError::NotAttached { .. } | AssociationError::NoSuchList { .. } => {
                SaiError::invalid_parameter(err.to_string())
            }
            AssociationError::Store(e) => e.into(),
        }
    }
}

/// Iterator over the members of one owner list, in attach order.
pub struct Members<'a, R: Associated> {
    store: &'a ObjectStore<R>,
    list: R::List,
    cursor: Option<ObjectKey>,
}

impl<'a, R: Associated> Iterator for Members<'a, R> {
    type Item = ObjectKey;

    fn next(&mut self) -> Option<ObjectKey> {
        let key = self.cursor?;
        self.cursor = self
            .store
            .get(&key)
            .ok()
            .and_then(|record| record.link_slot(self.list))
            .and_then(|slot| slot.as_ref())
            .and_then(|link| link.next);
        Some(key)
    }
}

impl<R: Associated> ObjectStore<R> {
    fn owner_head(&self, list: R::List, owner: &ObjectKey) -> Result<ListHead, AssociationError> {
        let record = self
            .get(owner)
            .map_err(|_| AssociationError::OwnerNotFound(*owner))?;
        record
            .list_head(list)
            .copied()
            .ok_or_else(|| AssociationError::NoSuchList {
                key: *owner,
                list: format!("{:?}", list),
            })
    }

    fn member_link(
        &self,
        list: R::List,
        member: &ObjectKey,
    ) -> Result<Option<Link>, AssociationError> {
        let record = self
            .get(member)
            .map_err(|_| AssociationError::MemberNotFound(*member))?;
        record
            .link_slot(list)
            .copied()
            .ok_or_else(|| AssociationError::NoSuchList {
                key: *member,
                list: format!("{:?}", list),
            })
    }

    fn set_link(&mut self, list: R::List, key: &ObjectKey, link: Option<Link>) -> Result<(), StoreError> {
        if let Some(slot) = self.get_mut(key)?.link_slot_mut(list) {
            *slot = link;
        }
        Ok(())
    }

    fn update_link<F>(&mut self, list: R::List, key: &ObjectKey, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Link),
    {
        if let Some(Some(link)) = self.get_mut(key)?.link_slot_mut(list) {
            f(link);
        }
        Ok(())
    }

    fn update_head<F>(&mut self, list: R::List, key: &ObjectKey, f: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut ListHead),
    {
        if let Some(head) = self.get_mut(key)?.list_head_mut(list) {
            f(head);
        }
        Ok(())
    }

    /// Appends `member` to `owner`'s `list` and bumps the owner's count.
    ///
    /// Validates everything before touching any record, so a failed attach
    /// leaves the store unchanged.
    pub fn attach(
        &mut self,
        list: R::List,
        owner: &ObjectKey,
        member: &ObjectKey,
    ) -> Result<(), AssociationError> {
        let head = self.owner_head(list, owner)?;
        if let Some(existing) = self.member_link(list, member)? {
            return Err(AssociationError::AlreadyAttached {
                member: *member,
                owner: existing.owner,
            });
        }

        self.set_link(
            list,
            member,
            Some(Link {
                owner: *owner,
                prev: head.tail,
                next: None,
            }),
        )?;
        if let Some(tail) = head.tail {
            self.update_link(list, &tail, |link| link.next = Some(*member))?;
        }
        self.update_head(list, owner, |h| {
            if h.head.is_none() {
                h.head = Some(*member);
            }
            h.tail = Some(*member);
            h.len += 1;
        })?;
        self.increment_ref(owner)?;
        Ok(())
    }

    /// Unlinks `member` from `owner`'s `list` and drops the owner's count.
    pub fn detach(
        &mut self,
        list: R::List,
        owner: &ObjectKey,
        member: &ObjectKey,
    ) -> Result<(), AssociationError> {
        self.owner_head(list, owner)?;
        let link = match self.member_link(list, member)? {
            Some(link) if link.owner == *owner => link,
            _ => {
                return Err(AssociationError::NotAttached {
                    member: *member,
                    owner: *owner,
                })
            }
        };
        if self.ref_count(owner).unwrap_or(0) == 0 {
            return Err(StoreError::RefCountUnderflow(*owner).into());
        }

        match link.prev {
            Some(prev) => self.update_link(list, &prev, |l| l.next = link.next)?,
            None => self.update_head(list, owner, |h| h.head = link.next)?,
        }
        match link.next {
            Some(next) => self.update_link(list, &next, |l| l.prev = link.prev)?,
            None => self.update_head(list, owner, |h| h.tail = link.prev)?,
        }
        self.update_head(list, owner, |h| h.len = h.len.saturating_sub(1))?;
        self.set_link(list, member, None)?;
        self.decrement_ref(owner)?;
        Ok(())
    }

    /// Iterates over `owner`'s `list` in attach order.
    pub fn members(
        &self,
        list: R::List,
        owner: &ObjectKey,
    ) -> Result<Members<'_, R>, AssociationError> {
        let head = self.owner_head(list, owner)?;
        Ok(Members {
            store: self,
            list,
            cursor: head.head,
        })
    }

    /// Returns true if nothing references `key`.
    pub fn can_remove(&self, key: &ObjectKey) -> Result<bool, AssociationError> {
        Ok(self.get(key)?.ref_count() == 0)
    }

    /// Removes an unreferenced record together with its memberships.
    ///
    /// A referenced record fails with [`AssociationError::ObjectInUse`] and
    /// nothing changes. On success the handle is released for reuse.
    pub fn remove_associated(&mut self, key: &ObjectKey) -> Result<R, AssociationError> {
        let record = self.get(key)?;
        let ref_count = record.ref_count();
        if ref_count > 0 {
            return Err(AssociationError::ObjectInUse {
                key: *key,
                ref_count,
            });
        }

        for (list, owner) in record.memberships() {
            self.detach(list, &owner, key)?;
        }
        let removed = self.remove(key).ok_or(StoreError::NotFound(*key))?;
        self.release(key);
        Ok(removed)
    }
}
