//! Generation-checked storage for the shapes a kernel session hands out.
//!
//! Every entry is either an owner or a view. Views are created by traversal
//! and always point at an owner; they die with it. An owner keeps one view per
//! distinct sub-shape key, so traversing it again hands back the same ids.

use std::collections::HashMap;

use slotmap::SlotMap;

use crate::types::{KernelError, ShapeId};

#[derive(Debug)]
struct Slot<S> {
    shape: S,
    owner: Option<ShapeId>,
    views: HashMap<u64, ShapeId>,
}

#[derive(Debug)]
pub struct ShapeArena<S> {
    slots: SlotMap<ShapeId, Slot<S>>,
    owners: usize,
}

impl<S> Default for ShapeArena<S> {
    fn default() -> Self {
        Self {
            slots: SlotMap::with_key(),
            owners: 0,
        }
    }
}

impl<S> ShapeArena<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an owning entry.
    pub fn insert(&mut self, shape: S) -> ShapeId {
        self.owners += 1;
        self.slots.insert(Slot {
            shape,
            owner: None,
            views: HashMap::new(),
        })
    }

    /// Stores a view that lives as long as the owner of `parent`.
    /// `parent` may itself be a view; the view is attached to its owner.
    ///
    /// `key` identifies the oriented sub-shape within the owner. A key the
    /// owner already holds returns the existing view and drops `shape`.
    pub fn insert_view(&mut self, parent: ShapeId, key: u64, shape: S) -> Result<ShapeId, KernelError> {
        let owner = self.owner_of(parent)?;
        if let Some(&existing) = self.slots.get(owner).and_then(|slot| slot.views.get(&key)) {
            return Ok(existing);
        }
        let id = self.slots.insert(Slot {
            shape,
            owner: Some(owner),
            views: HashMap::new(),
        });
        if let Some(slot) = self.slots.get_mut(owner) {
            slot.views.insert(key, id);
        }
        Ok(id)
    }

    pub fn get(&self, id: ShapeId) -> Result<&S, KernelError> {
        let slot = self.slots.get(id).ok_or(KernelError::StaleHandle)?;
        if let Some(owner) = slot.owner {
            // A view outliving its owner would have been removed with it.
            debug_assert!(self.slots.contains_key(owner));
        }
        Ok(&slot.shape)
    }

    pub fn contains(&self, id: ShapeId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn is_view(&self, id: ShapeId) -> Result<bool, KernelError> {
        let slot = self.slots.get(id).ok_or(KernelError::StaleHandle)?;
        Ok(slot.owner.is_some())
    }

    /// The owning entry `id` belongs to (itself for owners).
    pub fn owner_of(&self, id: ShapeId) -> Result<ShapeId, KernelError> {
        let slot = self.slots.get(id).ok_or(KernelError::StaleHandle)?;
        Ok(slot.owner.unwrap_or(id))
    }

    /// Removes an owner together with all of its views.
    pub fn release(&mut self, id: ShapeId) -> Result<(), KernelError> {
        let slot = self.slots.get(id).ok_or(KernelError::StaleHandle)?;
        if slot.owner.is_some() {
            return Err(KernelError::ViewRelease);
        }
        if let Some(slot) = self.slots.remove(id) {
            for view in slot.views.into_values() {
                self.slots.remove(view);
            }
            self.owners -= 1;
        }
        Ok(())
    }

    /// Number of owning entries.
    pub fn live_owners(&self) -> usize {
        self.owners
    }

    /// Number of entries, views included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<S: Clone> ShapeArena<S> {
    /// Promotes any entry to a fresh owner sharing the same shape.
    pub fn detach(&mut self, id: ShapeId) -> Result<ShapeId, KernelError> {
        let shape = self.get(id)?.clone();
        Ok(self.insert(shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_cascades_to_views() {
        let mut arena = ShapeArena::new();
        let owner = arena.insert("solid");
        let face = arena.insert_view(owner, 1, "face").unwrap();
        let edge = arena.insert_view(face, 2, "edge").unwrap();
        assert_eq!(arena.owner_of(edge).unwrap(), owner);
        assert_eq!(arena.len(), 3);
        assert_eq!(arena.live_owners(), 1);

        arena.release(owner).unwrap();
        assert!(matches!(arena.get(face), Err(KernelError::StaleHandle)));
        assert!(matches!(arena.get(edge), Err(KernelError::StaleHandle)));
        assert!(arena.is_empty());
        assert_eq!(arena.live_owners(), 0);
    }

    #[test]
    fn repeated_views_reuse_entries() {
        let mut arena = ShapeArena::new();
        let owner = arena.insert("solid");
        let first: Vec<ShapeId> = (0..4u64)
            .map(|k| arena.insert_view(owner, k, "edge").unwrap())
            .collect();
        for _ in 0..100 {
            for (k, id) in first.iter().enumerate() {
                assert_eq!(arena.insert_view(owner, k as u64, "edge").unwrap(), *id);
            }
        }
        assert_eq!(arena.len(), 5);

        // Keys are per owner.
        let other = arena.insert("other");
        let foreign = arena.insert_view(other, 0, "edge").unwrap();
        assert_ne!(foreign, first[0]);
        arena.release(owner).unwrap();
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn views_cannot_be_released_directly() {
        let mut arena = ShapeArena::new();
        let owner = arena.insert(1);
        let view = arena.insert_view(owner, 7, 2).unwrap();
        assert!(matches!(arena.release(view), Err(KernelError::ViewRelease)));
        assert_eq!(*arena.get(view).unwrap(), 2);
    }

    #[test]
    fn released_key_is_not_reused() {
        let mut arena = ShapeArena::new();
        let first = arena.insert(1);
        arena.release(first).unwrap();
        let second = arena.insert(2);
        assert_ne!(first, second);
        assert!(arena.get(first).is_err());
        assert!(matches!(arena.release(first), Err(KernelError::StaleHandle)));
    }

    #[test]
    fn detach_outlives_owner() {
        let mut arena = ShapeArena::new();
        let owner = arena.insert("face");
        let view = arena.insert_view(owner, 1, "wire").unwrap();
        let detached = arena.detach(view).unwrap();
        arena.release(owner).unwrap();
        assert_eq!(*arena.get(detached).unwrap(), "wire");
        assert_eq!(arena.live_owners(), 1);
    }
}
