//! Typed opaque handles.
//!
//! Objects referenced across the process boundary travel as [`RemoteRef`]s. The
//! side that owns the objects resolves them through a [`HandleRegistry`], a
//! generation-checked arena: a stale or forged reference fails the lookup instead
//! of aliasing another object.

use arabridge_wire::codec::{Decode, Encode};
use arabridge_wire::{ArgKey, MessageDecoder, MessageEncoder};
use std::fmt;

/// Opaque reference to an object owned by the peer process.
///
/// Only the owning side interprets the value. `NULL` is never issued by a registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RemoteRef(u64);

impl RemoteRef {
    pub const NULL: RemoteRef = RemoteRef(0);

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | index as u64)
    }

    fn index(self) -> usize {
        (self.0 & u64::from(u32::MAX)) as usize
    }

    fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

impl fmt::Debug for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "RemoteRef(null)")
        } else {
            write!(f, "RemoteRef({}v{})", self.index(), self.generation())
        }
    }
}

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Encode for RemoteRef {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_size(key, self.0);
    }
}

impl Decode for RemoteRef {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_size(key).map(RemoteRef)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Generation-checked arena mapping [`RemoteRef`]s to owned objects.
pub struct HandleRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Store `value` and return the reference that resolves to it.
    pub fn insert(&mut self, value: T) -> RemoteRef {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return RemoteRef::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(value),
        });
        RemoteRef::new(index, 1)
    }

    pub fn get(&self, handle: RemoteRef) -> Option<&T> {
        let slot = self.slots.get(handle.index())?;
        if handle.is_null() || slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_ref()
    }

    pub fn get_mut(&mut self, handle: RemoteRef) -> Option<&mut T> {
        let slot = self.slots.get_mut(handle.index())?;
        if handle.is_null() || slot.generation != handle.generation() {
            return None;
        }
        slot.value.as_mut()
    }

    pub fn contains(&self, handle: RemoteRef) -> bool {
        self.get(handle).is_some()
    }

    /// Remove the object; every outstanding reference to it becomes stale.
    pub fn remove(&mut self, handle: RemoteRef) -> Option<T> {
        let index = handle.index();
        let slot = self.slots.get_mut(index)?;
        if handle.is_null() || slot.generation != handle.generation() {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1).max(1);
        self.free.push(index as u32);
        self.len -= 1;
        Some(value)
    }

    /// Remove every object matching `predicate`, returning them.
    pub fn drain_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<T> {
        let handles: Vec<RemoteRef> = self
            .iter()
            .filter(|(_, value)| predicate(value))
            .map(|(handle, _)| handle)
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| self.remove(handle))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RemoteRef, &T)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (RemoteRef::new(index as u32, slot.generation), value))
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
