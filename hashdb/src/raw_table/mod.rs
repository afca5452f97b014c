use crate::byte_store::ByteStore;
use crate::error::{Error, Result};
use crate::header::{FREE_HEAD_RANGE, Header};
use crate::layout::{Geometry, LINK_SIZE, read_u64, write_u64};

pub mod arena;
pub mod chain;
pub mod entry;
pub mod integrity;

pub use chain::Chain;
pub use entry::{EntryMut, EntryRef, NIL, SlotIndex};

/// The storage engine: header, node arena and bucket table laid out in one
/// contiguous [`ByteStore`].
///
/// Slots are linked by index, never by address, so a table stays valid when
/// the same file is mapped again at a different address. Every slot in
/// `1..=node_capacity` is always on exactly one list: the free list or a
/// single bucket chain.
///
/// Several tables may map the same file. Only the layout fields of the
/// header are cached; the free list head and every link are read from the
/// store on each use, so changes made through another mapping are seen.
pub struct RawTable<S: ByteStore> {
    store: S,
    header: Header,
    geometry: Geometry,
}

impl RawTable<Vec<u8>> {
    /// Formats a table in a freshly allocated, heap-backed buffer.
    pub fn in_memory(header: Header) -> Result<Self> {
        let geometry = Geometry::from_header(&header)
            .ok_or_else(|| Error::invalid_argument("table does not fit in the address space"))?;
        Self::format(vec![0u8; geometry.file_size], header)
    }
}

impl<S: ByteStore> RawTable<S> {
    /// Lays out an empty table in `store`, which must be exactly as large as
    /// the file size `header` implies.
    ///
    /// All slots are linked into one free list `1 -> 2 -> .. -> N -> 0` and
    /// every bucket is empty.
    pub fn format(mut store: S, header: Header) -> Result<Self> {
        let header = Header {
            free_head: 1,
            ..header
        };
        if let Some(defect) = header.defect() {
            return Err(Error::InvalidArgument(defect));
        }
        let geometry = Geometry::from_header(&header)
            .ok_or_else(|| Error::invalid_argument("table does not fit in the address space"))?;
        if store.as_ref().len() != geometry.file_size {
            return Err(Error::invalid_argument(format!(
                "store holds {} bytes, table needs {}",
                store.as_ref().len(),
                geometry.file_size
            )));
        }

        let bytes = store.as_mut();
        bytes.fill(0);
        header.write(bytes);
        for index in 1..header.node_capacity {
            let start = geometry.slot_range(index).start;
            write_u64(bytes, start..start + LINK_SIZE, index + 1);
        }

        Ok(Self {
            store,
            header,
            geometry,
        })
    }

    /// Reads the header out of an existing table and recomputes its layout.
    ///
    /// Nothing is written. The free list is walked once so a cyclic or
    /// dangling list is rejected here.
    pub fn load(store: S) -> Result<Self> {
        let header = Header::read(store.as_ref())?;
        if let Some(defect) = header.defect() {
            return Err(Error::Corrupted(defect));
        }
        let geometry = Geometry::from_header(&header)
            .ok_or_else(|| Error::corrupted("header describes a layout that overflows"))?;
        if store.as_ref().len() != geometry.file_size {
            return Err(Error::corrupted(format!(
                "file holds {} bytes, header implies {}",
                store.as_ref().len(),
                geometry.file_size
            )));
        }

        let table = Self {
            store,
            header,
            geometry,
        };
        table.free_list_len()?;
        Ok(table)
    }

    /// Checks that the cached layout still agrees with itself, the store
    /// length and the layout fields of the mapped header.
    ///
    /// The mapped `free_head` is only range-checked; other mappings of the
    /// same file move it legitimately.
    pub fn validate(&self) -> Result<()> {
        if let Some(defect) = self.header.defect() {
            return Err(Error::InvalidState(defect));
        }
        if Geometry::from_header(&self.header) != Some(self.geometry) {
            return Err(Error::invalid_state("derived offsets do not match the header"));
        }
        let mapped = self.store.as_ref().len();
        if mapped != self.geometry.file_size {
            return Err(Error::invalid_state(format!(
                "mapping holds {mapped} bytes, expected {}",
                self.geometry.file_size
            )));
        }
        let mapped = Header::read(self.store.as_ref())?;
        if !mapped.same_shape(&self.header) {
            return Err(Error::invalid_state("mapped header describes a different layout"));
        }
        if mapped.free_head > self.header.node_capacity {
            return Err(Error::invalid_state(format!(
                "mapped free head {} is past node capacity {}",
                mapped.free_head, self.header.node_capacity
            )));
        }
        Ok(())
    }

    /// Layout fields of the cached header with `free_head` as currently mapped.
    pub fn header(&self) -> Header {
        Header {
            free_head: self.free_head(),
            ..self.header
        }
    }

    /// First free slot, read from the mapped header.
    pub fn free_head(&self) -> SlotIndex {
        read_u64(self.store.as_ref(), FREE_HEAD_RANGE)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Number of slots currently on a bucket chain, counted as
    /// `node_capacity` minus the free list length.
    pub fn len(&self) -> Result<u64> {
        Ok(self.header.node_capacity - self.free_list_len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.free_list_len()? == self.header.node_capacity)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Claims a free slot, fills it and puts it at the head of `bucket`.
    pub fn insert(&mut self, bucket: u64, key: &[u8], value: &[u8]) -> Result<SlotIndex> {
        self.check_bucket(bucket)?;
        if key.len() != self.geometry.key_size || value.len() != self.geometry.value_size {
            return Err(Error::invalid_argument(format!(
                "slot takes {}+{} bytes, got {}+{}",
                self.geometry.key_size,
                self.geometry.value_size,
                key.len(),
                value.len()
            )));
        }

        let index = self.allocate()?;
        let mut entry = self.entry_mut(index);
        entry.key_mut().copy_from_slice(key);
        entry.value_mut().copy_from_slice(value);
        self.insert_at_head(bucket, index)?;
        Ok(index)
    }

    /// Takes `index` off the chain of `bucket` and gives it back to the free list.
    pub fn remove_at(&mut self, bucket: u64, index: SlotIndex) -> Result<()> {
        self.unlink(bucket, index)?;
        self.release(index)
    }

    /// View of slot `index`. Callers pass an index in `1..=node_capacity`.
    pub fn entry(&self, index: SlotIndex) -> EntryRef<'_> {
        let range = self.geometry.slot_range(index);
        EntryRef::new(index, &self.store.as_ref()[range], &self.geometry)
    }

    /// Mutable view of slot `index`. Callers pass an index in `1..=node_capacity`.
    pub fn entry_mut(&mut self, index: SlotIndex) -> EntryMut<'_> {
        let range = self.geometry.slot_range(index);
        EntryMut::new(index, &mut self.store.as_mut()[range], &self.geometry)
    }

    /// Cached header, bypassing the file.
    #[cfg(test)]
    pub(crate) fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    fn set_free_head(&mut self, index: SlotIndex) {
        self.header.free_head = index;
        write_u64(self.store.as_mut(), FREE_HEAD_RANGE, index);
    }

    fn link(&self, index: SlotIndex) -> SlotIndex {
        let start = self.geometry.slot_range(index).start;
        read_u64(self.store.as_ref(), start..start + LINK_SIZE)
    }

    fn set_link(&mut self, index: SlotIndex, next: SlotIndex) {
        let start = self.geometry.slot_range(index).start;
        write_u64(self.store.as_mut(), start..start + LINK_SIZE, next);
    }

    fn check_index(&self, index: SlotIndex) -> Result<()> {
        if index == NIL || index > self.header.node_capacity {
            return Err(Error::corrupted(format!(
                "slot index {index} outside 1..={}",
                self.header.node_capacity
            )));
        }
        Ok(())
    }

    fn check_bucket(&self, bucket: u64) -> Result<()> {
        if bucket >= self.header.bucket_count {
            return Err(Error::invalid_argument(format!(
                "bucket {bucket} outside 0..{}",
                self.header.bucket_count
            )));
        }
        Ok(())
    }

    /// Walks a list from `start`, failing on out-of-range links or on more
    /// than `node_capacity` steps.
    fn links(&self, start: SlotIndex) -> Links<'_, S> {
        Links {
            table: self,
            curr: start,
            steps: 0,
            done: false,
        }
    }
}

struct Links<'a, S: ByteStore> {
    table: &'a RawTable<S>,
    curr: SlotIndex,
    steps: u64,
    done: bool,
}

impl<S: ByteStore> Iterator for Links<'_, S> {
    type Item = Result<SlotIndex>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.curr == NIL {
            return None;
        }
        let index = self.curr;
        if let Err(err) = self.table.check_index(index) {
            self.done = true;
            return Some(Err(err));
        }
        if self.steps == self.table.header.node_capacity {
            self.done = true;
            return Some(Err(Error::corrupted(format!(
                "list revisits slot {index}, it has a cycle"
            ))));
        }
        self.steps += 1;
        self.curr = self.table.link(index);
        Some(Ok(index))
    }
}
