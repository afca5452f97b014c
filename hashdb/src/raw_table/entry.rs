use std::fmt;

use crate::layout::{Geometry, LINK_SIZE, read_u64};

/// Index of a slot in the node arena. Slot 0 is the "no slot" sentinel.
pub type SlotIndex = u64;

/// Terminates the free list and every bucket chain.
pub const NIL: SlotIndex = 0;

/// Read-only view of one slot inside the mapped region.
#[derive(Clone, Copy)]
pub struct EntryRef<'a> {
    index: SlotIndex,
    bytes: &'a [u8],
    geometry: &'a Geometry,
}

/// Mutable view of one slot inside the mapped region.
pub struct EntryMut<'a> {
    index: SlotIndex,
    bytes: &'a mut [u8],
    geometry: &'a Geometry,
}

impl<'a> EntryRef<'a> {
    pub(crate) fn new(index: SlotIndex, bytes: &'a [u8], geometry: &'a Geometry) -> Self {
        Self {
            index,
            bytes,
            geometry,
        }
    }

    /// Arena index of this slot; stable across close and reopen.
    pub fn index(&self) -> SlotIndex {
        self.index
    }

    /// Stored key, `key_size` bytes including zero padding.
    pub fn key(&self) -> &'a [u8] {
        &self.bytes[self.geometry.key_range()]
    }

    /// Stored value, `value_size` bytes including zero padding.
    pub fn value(&self) -> &'a [u8] {
        &self.bytes[self.geometry.value_range()]
    }

    pub(crate) fn next(&self) -> SlotIndex {
        read_u64(self.bytes, 0..LINK_SIZE)
    }
}

impl<'a> EntryMut<'a> {
    pub(crate) fn new(index: SlotIndex, bytes: &'a mut [u8], geometry: &'a Geometry) -> Self {
        Self {
            index,
            bytes,
            geometry,
        }
    }

    pub fn index(&self) -> SlotIndex {
        self.index
    }

    pub fn key(&self) -> &[u8] {
        &self.bytes[self.geometry.key_range()]
    }

    pub fn value(&self) -> &[u8] {
        &self.bytes[self.geometry.value_range()]
    }

    /// Value bytes for in-place updates; writes land in the file directly.
    pub fn value_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.geometry.value_range()]
    }

    /// Consumes the view, keeping the value borrowed for the full lifetime.
    pub fn into_value_mut(self) -> &'a mut [u8] {
        let Self { bytes, geometry, .. } = self;
        &mut bytes[geometry.value_range()]
    }

    pub(crate) fn key_mut(&mut self) -> &mut [u8] {
        &mut self.bytes[self.geometry.key_range()]
    }
}

impl fmt::Debug for EntryRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryRef")
            .field("index", &self.index)
            .field("key", &self.key())
            .field("value", &self.value())
            .finish()
    }
}

impl fmt::Debug for EntryMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryMut")
            .field("index", &self.index)
            .field("key", &self.key())
            .field("value", &self.value())
            .finish()
    }
}
