//! Typed node arena.
//!
//! Nodes of one union live in one [`Arena`] and are addressed by [`Idx`].
//! Nothing is ever freed individually; the arena is dropped with the
//! compilation unit that owns it.
//!
//! A slot may be *reserved* before its node exists. The binary reader uses
//! this for symbols referenced ahead of their definition; the slot is filled
//! once the definition is decoded.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::ice;

/// Index into an [`Arena<T>`].
///
/// Four bytes, `Copy`, compared by value. The type parameter keeps ids of
/// different unions from being mixed up.
#[repr(transparent)]
pub struct Idx<T> {
    raw: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Idx<T> {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Idx {
            raw,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.raw
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl<T> Clone for Idx<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Idx<T> {}

impl<T> PartialEq for Idx<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Idx<T> {}

impl<T> PartialOrd for Idx<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Idx<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for Idx<T> {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Idx<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

/// Append-only storage for the nodes of one union.
#[derive(Clone, Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    pub const fn new() -> Self {
        Arena { slots: Vec::new() }
    }

    fn next_idx(&self) -> Idx<T> {
        match u32::try_from(self.slots.len()) {
            Ok(raw) => Idx::from_raw(raw),
            Err(_) => ice::arena_overflow(std::any::type_name::<T>()),
        }
    }

    /// Allocate a node, returning its id.
    pub fn alloc(&mut self, node: T) -> Idx<T> {
        let id = self.next_idx();
        self.slots.push(Some(node));
        id
    }

    /// Reserve a slot to be filled later with [`Arena::fill`].
    pub fn reserve(&mut self) -> Idx<T> {
        let id = self.next_idx();
        self.slots.push(None);
        id
    }

    /// Store a node into a reserved slot.
    ///
    /// Returns the node back if the slot is already occupied or out of range.
    pub fn fill(&mut self, id: Idx<T>, node: T) -> Result<(), T> {
        match self.slots.get_mut(id.index()) {
            Some(slot @ None) => {
                *slot = Some(node);
                Ok(())
            }
            _ => Err(node),
        }
    }

    pub fn get(&self, id: Idx<T>) -> Option<&T> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: Idx<T>) -> Option<&mut T> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Whether `id` names an allocated, filled slot.
    pub fn is_filled(&self, id: Idx<T>) -> bool {
        self.get(id).is_some()
    }

    /// Number of slots, reserved ones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop every slot from `len` on, reserved or filled.
    ///
    /// Ids into the dropped range become dangling; only use this to undo
    /// allocations nothing else refers to yet.
    pub fn truncate(&mut self, len: usize) {
        self.slots.truncate(len);
    }

    /// Filled slots in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (Idx<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            let node = slot.as_ref()?;
            let raw = u32::try_from(i).ok()?;
            Some((Idx::from_raw(raw), node))
        })
    }
}

impl<T> Index<Idx<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Idx<T>) -> &T {
        match self.get(id) {
            Some(node) => node,
            None => ice::unfilled_slot(std::any::type_name::<T>(), id.raw()),
        }
    }
}

impl<T> IndexMut<Idx<T>> for Arena<T> {
    fn index_mut(&mut self, id: Idx<T>) -> &mut T {
        match self.slots.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => ice::unfilled_slot(std::any::type_name::<T>(), id.raw()),
        }
    }
}
