use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use tracing::{info, warn};

use crate::byte_store::{ByteStore, MMapFile};
use crate::config::{HashDbConfig, Validation};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::layout::Geometry;
use crate::raw_table::{EntryMut, EntryRef, RawTable, SlotIndex};
use crate::strategy::{ExactEq, KeyEq, KeyHasher, PolynomialHash};

/// A chained hash table whose header, slots and buckets all live in one
/// [`ByteStore`], by default a memory-mapped file.
///
/// Keys and values have the fixed widths chosen at creation. Shorter inputs
/// are zero-padded to that width before they are hashed, compared or
/// stored; longer inputs are rejected.
///
/// # Example
///
/// ```
/// use hashdb::{HashDb, HashDbConfig};
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("users.db");
///
/// let mut db = HashDb::create(&path, &HashDbConfig::new(16, 8, 32, 32)).unwrap();
/// db.set(b"alice", b"admin").unwrap();
/// db.close(false).unwrap();
///
/// let db = HashDb::open(&path, Default::default()).unwrap();
/// assert!(db.get(b"alice").unwrap().value().starts_with(b"admin"));
/// db.close(true).unwrap();
/// ```
pub struct HashDb<BS: ByteStore = MMapFile, H = PolynomialHash, E = ExactEq> {
    table: RawTable<BS>,
    hasher: H,
    key_eq: E,
    validation: Validation,
}

/// Snapshot of a table's shape, as printed by [`HashDb::dump`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpStats {
    pub node_capacity: u64,
    pub bucket_count: u64,
    pub key_size: u64,
    pub value_size: u64,
    pub free_head: SlotIndex,
    pub free_list_len: u64,
    pub occupied: u64,
    pub longest_chain: u64,
}

impl fmt::Display for DumpStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nr_nodes:    {}", self.node_capacity)?;
        writeln!(f, "nr_buckets:  {}", self.bucket_count)?;
        writeln!(f, "key_size:    {}", self.key_size)?;
        writeln!(f, "value_size:  {}", self.value_size)?;
        writeln!(f, "free:        {}", self.free_head)?;
        writeln!(f, "freelistlen: {}", self.free_list_len)
    }
}

fn check_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::invalid_argument("path is empty"));
    }
    Ok(())
}

/// Zero-pads `bytes` to exactly `width` bytes.
fn fit<'a>(bytes: &'a [u8], width: usize, what: &str) -> Result<Cow<'a, [u8]>> {
    match bytes.len().cmp(&width) {
        Ordering::Equal => Ok(Cow::Borrowed(bytes)),
        Ordering::Less => {
            let mut padded = vec![0u8; width];
            padded[..bytes.len()].copy_from_slice(bytes);
            Ok(Cow::Owned(padded))
        }
        Ordering::Greater => Err(Error::invalid_argument(format!(
            "{what} is {} bytes, table holds {width}",
            bytes.len()
        ))),
    }
}

impl HashDb<MMapFile> {
    /// Creates a table file with the default hash and comparator.
    pub fn create(path: impl AsRef<Path>, config: &HashDbConfig) -> Result<Self> {
        Self::create_with(path, config, PolynomialHash, ExactEq)
    }

    /// Opens a table file with the default hash and comparator.
    pub fn open(path: impl AsRef<Path>, validation: Validation) -> Result<Self> {
        Self::open_with(path, validation, PolynomialHash, ExactEq)
    }
}

impl<H: KeyHasher, E: KeyEq> HashDb<MMapFile, H, E> {
    /// Creates or truncates the file at `path`, sizes it for `config` and
    /// writes an empty table into it.
    ///
    /// On failure after the file was created, the file is removed again and
    /// only the original error is returned.
    pub fn create_with(
        path: impl AsRef<Path>,
        config: &HashDbConfig,
        hasher: H,
        key_eq: E,
    ) -> Result<Self> {
        let path = path.as_ref();
        check_path(path)?;
        let header = config.header()?;
        let geometry = Geometry::from_header(&header)
            .ok_or_else(|| Error::invalid_argument("table does not fit in the address space"))?;

        let store = MMapFile::create(path, geometry.file_size as u64, config.permissions)?;
        let table = match RawTable::format(store, header) {
            Ok(table) => table,
            Err(err) => {
                if let Err(rm_err) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %rm_err, "failed to remove partial file");
                }
                return Err(err);
            }
        };

        info!(
            path = %path.display(),
            node_capacity = header.node_capacity,
            bucket_count = header.bucket_count,
            key_size = header.key_size,
            value_size = header.value_size,
            file_size = geometry.file_size,
            "table created"
        );
        if !config.validation.is_sane() {
            warn!(path = %path.display(), "validation disabled for this handle");
        }

        Ok(Self {
            table,
            hasher,
            key_eq,
            validation: config.validation,
        })
    }

    /// Maps an existing table file and recomputes its layout from the header.
    /// Nothing in the file is rewritten.
    pub fn open_with(
        path: impl AsRef<Path>,
        validation: Validation,
        hasher: H,
        key_eq: E,
    ) -> Result<Self> {
        let path = path.as_ref();
        check_path(path)?;
        let store = MMapFile::open(path)?;
        let table = RawTable::load(store)?;

        let header = table.header();
        info!(
            path = %path.display(),
            node_capacity = header.node_capacity,
            bucket_count = header.bucket_count,
            key_size = header.key_size,
            value_size = header.value_size,
            len = table.len()?,
            "table opened"
        );
        if !validation.is_sane() {
            warn!(path = %path.display(), "validation disabled for this handle");
        }

        Ok(Self {
            table,
            hasher,
            key_eq,
            validation,
        })
    }

    pub fn path(&self) -> &Path {
        self.table.store().path()
    }

    /// Forces dirty pages of the mapping out to the file.
    ///
    /// Never needed for other mappings of the same file to see changes;
    /// only for durability at a chosen point.
    pub fn flush(&self) -> Result<()> {
        self.ensure_valid()?;
        self.table.store().flush()?;
        Ok(())
    }

    /// Unmaps the table and closes the file, deleting it when `destroy` is set.
    ///
    /// Under [`Validation::Sane`] a handle whose cached layout no longer
    /// matches the mapping fails with [`Error::InvalidState`] before anything
    /// else happens. The handle is consumed either way: the mapping is
    /// dropped unflushed and the file is left in place even when `destroy`
    /// was requested.
    pub fn close(self, destroy: bool) -> Result<()> {
        self.ensure_valid()?;
        let path = self.table.into_store().close()?;
        if destroy {
            fs::remove_file(&path)?;
            info!(path = %path.display(), "table closed and removed");
        } else {
            info!(path = %path.display(), "table closed");
        }
        Ok(())
    }
}

impl HashDb<Vec<u8>> {
    /// Builds a heap-backed table with the default hash and comparator.
    pub fn in_memory(config: &HashDbConfig) -> Result<Self> {
        Self::in_memory_with(config, PolynomialHash, ExactEq)
    }
}

impl<H: KeyHasher, E: KeyEq> HashDb<Vec<u8>, H, E> {
    /// Builds a heap-backed table; same layout as a file, nothing persisted.
    pub fn in_memory_with(config: &HashDbConfig, hasher: H, key_eq: E) -> Result<Self> {
        let table = RawTable::in_memory(config.header()?)?;
        Ok(Self {
            table,
            hasher,
            key_eq,
            validation: config.validation,
        })
    }
}

impl<BS: ByteStore, H: KeyHasher, E: KeyEq> HashDb<BS, H, E> {
    fn ensure_valid(&self) -> Result<()> {
        if self.validation.is_sane() {
            self.table.validate()?;
        }
        Ok(())
    }

    fn locate(&self, key: &[u8]) -> Result<(u64, Option<SlotIndex>)> {
        let bucket = self.table.bucket_for(self.hasher.hash_key(key));
        let found = self
            .table
            .find(bucket, key, |lookup, stored| self.key_eq.key_eq(lookup, stored))?;
        Ok((bucket, found))
    }

    fn padded_key<'k>(&self, key: &'k [u8]) -> Result<Cow<'k, [u8]>> {
        fit(key, self.table.geometry().key_size, "key")
    }

    /// Inserts `key` or overwrites its value in place.
    ///
    /// Updating an existing key rewrites only the value bytes, never the key:
    /// with a comparator looser than byte equality the stored key keeps its
    /// original spelling. Fails with [`Error::OutOfSpace`] when `key` is new
    /// and every slot is taken; the table is left untouched in that case.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<EntryMut<'_>> {
        self.ensure_valid()?;
        let key = self.padded_key(key)?;
        let value = fit(value, self.table.geometry().value_size, "value")?;

        let (bucket, found) = self.locate(&key)?;
        let index = match found {
            Some(index) => {
                self.table.entry_mut(index).value_mut().copy_from_slice(&value);
                index
            }
            None => self.table.insert(bucket, &key, &value)?,
        };
        Ok(self.table.entry_mut(index))
    }

    /// Looks `key` up without touching the table.
    pub fn get(&self, key: &[u8]) -> Result<EntryRef<'_>> {
        self.ensure_valid()?;
        let key = self.padded_key(key)?;
        match self.locate(&key)? {
            (_, Some(index)) => Ok(self.table.entry(index)),
            (_, None) => Err(Error::NotFound),
        }
    }

    /// Looks `key` up and hands out its value for in-place updates.
    pub fn get_mut(&mut self, key: &[u8]) -> Result<EntryMut<'_>> {
        self.ensure_valid()?;
        let key = self.padded_key(key)?;
        match self.locate(&key)? {
            (_, Some(index)) => Ok(self.table.entry_mut(index)),
            (_, None) => Err(Error::NotFound),
        }
    }

    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(Error::NotFound) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Removes `key`, returning its slot to the free list.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.ensure_valid()?;
        let key = self.padded_key(key)?;
        let (bucket, found) = self.locate(&key)?;
        let index = found.ok_or(Error::NotFound)?;
        self.table.remove_at(bucket, index)
    }

    /// Every live entry, bucket by bucket, each chain most recent first.
    pub fn iter(&self) -> impl Iterator<Item = EntryRef<'_>> + '_ {
        (0..self.table.geometry().bucket_count).flat_map(move |bucket| self.table.chain(bucket))
    }

    /// Number of live entries, including those written through other
    /// handles on the same file. Walks the free list.
    pub fn len(&self) -> Result<u64> {
        self.table.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> u64 {
        self.table.geometry().node_capacity
    }

    pub fn bucket_count(&self) -> u64 {
        self.table.geometry().bucket_count
    }

    pub fn key_size(&self) -> usize {
        self.table.geometry().key_size
    }

    pub fn value_size(&self) -> usize {
        self.table.geometry().value_size
    }

    /// Header as currently mapped.
    pub fn header(&self) -> Header {
        self.table.header()
    }

    pub fn geometry(&self) -> &Geometry {
        self.table.geometry()
    }

    pub fn validation(&self) -> Validation {
        self.validation
    }

    pub fn stats(&self) -> Result<DumpStats> {
        self.ensure_valid()?;
        let header = self.table.header();
        let free_list_len = self.table.free_list_len()?;
        let longest_chain = self
            .table
            .chain_lengths()?
            .into_iter()
            .max()
            .unwrap_or_default();
        Ok(DumpStats {
            node_capacity: header.node_capacity,
            bucket_count: header.bucket_count,
            key_size: header.key_size,
            value_size: header.value_size,
            free_head: header.free_head,
            free_list_len,
            occupied: header.node_capacity - free_list_len,
            longest_chain,
        })
    }

    /// Writes the header fields and the free list length to `sink`.
    pub fn dump(&self, mut sink: impl Write) -> Result<()> {
        let stats = self.stats()?;
        write!(sink, "{stats}")?;
        Ok(())
    }

    /// Walks every list once and checks that they partition the arena.
    pub fn check_integrity(&self) -> Result<()> {
        self.table
            .check_partition(|key| self.hasher.hash_key(key))
    }
}

impl<BS: ByteStore, H, E> fmt::Debug for HashDb<BS, H, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashDb")
            .field("header", &self.table.header())
            .field("validation", &self.validation)
            .finish()
    }
}
