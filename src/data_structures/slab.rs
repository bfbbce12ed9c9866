use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};

/// Stable handle to a slot of a [Slab].
///
/// Handles stay valid while other slots are inserted or removed, which is what lets chips and
/// pins keep pointing at each other while the circuit is edited.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[repr(transparent)]
pub struct SlabIndex(pub(super) usize);
impl Display for SlabIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Arena of same-typed items addressed by [SlabIndex].
///
/// Freed slots are recycled by later inserts, so a circuit that keeps adding and removing
/// sub chips does not grow without bound.
///
/// # Example
///
/// ```
/// # use chipsim::data_structures::Slab;
/// let mut pins = Slab::new();
/// let clock = pins.insert("CLK");
/// let data = pins.insert("D");
///
/// assert_eq!(pins.remove(clock), Some("CLK"));
/// assert_eq!(pins.get(clock), None);
/// assert_eq!(pins[data], "D");
///
/// // The freed slot is handed out again.
/// assert_eq!(pins.insert("Q"), clock);
/// ```
#[derive(Debug, Clone)]
pub struct Slab<T> {
    slots: Vec<Option<T>>,
    free: Vec<SlabIndex>,
}
impl<T> Slab<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Stores `item` and returns its handle, recycling a freed slot when there is one.
    pub fn insert(&mut self, item: T) -> SlabIndex {
        match self.free.pop() {
            Some(index) => {
                self.slots[index.0] = Some(item);
                index
            }
            None => {
                self.slots.push(Some(item));
                SlabIndex(self.slots.len() - 1)
            }
        }
    }

    pub fn get(&self, index: SlabIndex) -> Option<&T> {
        self.slots.get(index.0)?.as_ref()
    }

    pub fn get_mut(&mut self, index: SlabIndex) -> Option<&mut T> {
        self.slots.get_mut(index.0)?.as_mut()
    }

    /// Borrows two distinct items mutably at once, in argument order.
    ///
    /// Returns [None] if `a == b` or if either slot is empty.
    pub fn get_pair_mut(&mut self, a: SlabIndex, b: SlabIndex) -> Option<(&mut T, &mut T)> {
        if a == b {
            return None;
        }
        let (low, high) = (a.0.min(b.0), a.0.max(b.0));
        if high >= self.slots.len() {
            return None;
        }
        let (head, tail) = self.slots.split_at_mut(high);
        let low = head[low].as_mut()?;
        let high = tail[0].as_mut()?;
        if a.0 < b.0 {
            Some((low, high))
        } else {
            Some((high, low))
        }
    }

    /// Takes the item out of its slot, freeing the slot for reuse.
    ///
    /// Returns [None] if the slot is already empty.
    pub fn remove(&mut self, index: SlabIndex) -> Option<T> {
        let item = self.slots.get_mut(index.0)?.take()?;
        self.free.push(index);
        Some(item)
    }

    /// Number of live items.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over live items in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlabIndex, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| Some((SlabIndex(i), slot.as_ref()?)))
    }

    /// Iterates mutably over live items in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlabIndex, &mut T)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| Some((SlabIndex(i), slot.as_mut()?)))
    }
}

impl<T> Default for Slab<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// # Panics
///
/// Panics if the slot at `index` is empty.
impl<T> Index<SlabIndex> for Slab<T> {
    type Output = T;
    fn index(&self, index: SlabIndex) -> &T {
        self.get(index).unwrap_or_else(|| panic!("slot {} is empty", index))
    }
}

/// # Panics
///
/// Panics if the slot at `index` is empty.
impl<T> IndexMut<SlabIndex> for Slab<T> {
    fn index_mut(&mut self, index: SlabIndex) -> &mut T {
        self.get_mut(index).unwrap_or_else(|| panic!("slot {} is empty", index))
    }
}
