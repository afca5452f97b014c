use crate::error::Result;
use crate::header::Header;

/// Default unix permissions of a newly created table file.
pub const DEFAULT_PERMISSIONS: u32 = 0o666;

pub const DEFAULT_NODE_CAPACITY: u64 = 8192;
pub const DEFAULT_BUCKET_COUNT: u64 = 4096;
pub const DEFAULT_KEY_SIZE: u64 = 64;
pub const DEFAULT_VALUE_SIZE: u64 = 64;

/// How much a handle checks before each operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Validation {
    /// Check the handle geometry before every operation and fail with
    /// `InvalidState` when it is inconsistent.
    #[default]
    Sane,
    /// Skip the checks. This is a trust boundary: the caller guarantees the
    /// handle and the file are not tampered with, and misuse can corrupt the
    /// table silently.
    Trusted,
}

impl Validation {
    pub fn is_sane(self) -> bool {
        self == Validation::Sane
    }
}

/// Parameters of a new table file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashDbConfig {
    /// Number of slots; also the maximum number of live entries.
    pub node_capacity: u64,
    pub bucket_count: u64,
    /// Key width in bytes, rounded up to a multiple of 8 on create.
    pub key_size: u64,
    /// Value width in bytes, rounded up to a multiple of 8 on create.
    pub value_size: u64,
    /// Unix mode for the created file; ignored elsewhere.
    pub permissions: u32,
    pub validation: Validation,
}

impl HashDbConfig {
    pub fn new(node_capacity: u64, bucket_count: u64, key_size: u64, value_size: u64) -> Self {
        Self {
            node_capacity,
            bucket_count,
            key_size,
            value_size,
            permissions: DEFAULT_PERMISSIONS,
            validation: Validation::default(),
        }
    }

    pub fn with_capacity(mut self, node_capacity: u64, bucket_count: u64) -> Self {
        self.node_capacity = node_capacity;
        self.bucket_count = bucket_count;
        self
    }

    pub fn with_sizes(mut self, key_size: u64, value_size: u64) -> Self {
        self.key_size = key_size;
        self.value_size = value_size;
        self
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    /// Header of a fresh table with these parameters.
    pub fn header(&self) -> Result<Header> {
        Header::new(
            self.node_capacity,
            self.bucket_count,
            self.key_size,
            self.value_size,
        )
    }
}

impl Default for HashDbConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_NODE_CAPACITY,
            DEFAULT_BUCKET_COUNT,
            DEFAULT_KEY_SIZE,
            DEFAULT_VALUE_SIZE,
        )
    }
}
