use std::fmt;
use std::marker::PhantomData;

/// Slot index plus generation, shared by every arena-allocated identity.
pub(crate) trait ArenaKey: Copy {
    fn from_parts(idx: u32, generation: u32) -> Self;
    fn idx(self) -> u32;
    fn generation(self) -> u32;
}

/// Identity of a display node in a [`SceneGraph`](crate::SceneGraph).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct NodeId {
    idx: u32,
    generation: u32,
}

/// Opaque backend render-node handle issued by the [`RenderBridge`](crate::RenderBridge).
///
/// Contains both a slot index and a generation counter so that stale handles are detected with
/// one comparison after the node is destroyed and the slot reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct HandleId {
    idx: u32,
    generation: u32,
}

macro_rules! arena_key {
    ($ty:ident, $label:literal) => {
        impl ArenaKey for $ty {
            fn from_parts(idx: u32, generation: u32) -> Self {
                Self { idx, generation }
            }

            fn idx(self) -> u32 {
                self.idx
            }

            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl $ty {
            /// Returns the raw slot index (for diagnostics only).
            #[must_use]
            pub const fn index(self) -> u32 {
                self.idx
            }

            /// Returns the generation counter.
            #[must_use]
            pub const fn generation(self) -> u32 {
                self.generation
            }

            /// Pack into one word: generation in the high half, slot in the low half.
            #[must_use]
            pub const fn to_bits(self) -> u64 {
                ((self.generation as u64) << 32) | self.idx as u64
            }

            /// Inverse of [`Self::to_bits`].
            #[must_use]
            pub const fn from_bits(bits: u64) -> Self {
                Self {
                    idx: bits as u32,
                    generation: (bits >> 32) as u32,
                }
            }
        }

        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({}@gen{})"), self.idx, self.generation)
            }
        }
    };
}

arena_key!(NodeId, "NodeId");
arena_key!(HandleId, "HandleId");

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generational slot arena.
///
/// Removed slots are recycled through a free list; the generation is bumped on removal so old
/// keys stop resolving immediately.
#[derive(Debug)]
pub(crate) struct Arena<K, T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K: ArenaKey, T> Default for Arena<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ArenaKey, T> Arena<K, T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            live: 0,
            _key: PhantomData,
        }
    }

    pub(crate) fn insert(&mut self, value: T) -> K {
        self.live += 1;
        if let Some(idx) = self.free_list.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.value = Some(value);
            return K::from_parts(idx, slot.generation);
        }
        let idx = u32::try_from(self.slots.len()).unwrap_or_else(|_| panic!("arena exhausted"));
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        K::from_parts(idx, 0)
    }

    pub(crate) fn remove(&mut self, key: K) -> Option<T> {
        let slot = self.slots.get_mut(key.idx() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(key.idx());
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn get(&self, key: K) -> Option<&T> {
        let slot = self.slots.get(key.idx() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, key: K) -> Option<&mut T> {
        let slot = self.slots.get_mut(key.idx() as usize)?;
        if slot.generation != key.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub(crate) fn contains(&self, key: K) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/ids.rs"]
mod tests;
