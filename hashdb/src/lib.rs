//! A chained hash table stored entirely inside one memory-mapped file.
//!
//! The file holds a fixed header, an arena of fixed-width key/value slots and
//! an array of bucket heads. Slots link to each other by index, so the file
//! can be unmapped, copied and mapped again anywhere. See [`layout`] for the
//! exact byte layout.

pub mod byte_store;
pub mod config;
pub mod error;
mod hash_db;
pub mod header;
pub mod layout;
pub mod raw_table;
pub mod strategy;

pub use byte_store::{ByteStore, MMapFile};
pub use config::{HashDbConfig, Validation};
pub use error::{Error, Result};
pub use hash_db::{DumpStats, HashDb};
pub use header::{HEADER_SIZE, Header};
pub use layout::Geometry;
pub use raw_table::{EntryMut, EntryRef, NIL, RawTable, SlotIndex};
pub use strategy::{ExactEq, FxKeyHasher, KeyEq, KeyHasher, PolynomialHash};
