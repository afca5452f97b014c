use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use tracing::warn;

/// Contiguous bytes a table lives in.
///
/// The table never resizes, so a store only has to hand out its bytes and
/// optionally push them to durable storage.
pub trait ByteStore: AsRef<[u8]> + AsMut<[u8]> {
    /// Writes outstanding changes to the backing medium, if there is one.
    fn flush(&self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteStore for Vec<u8> {}

impl ByteStore for Box<[u8]> {}

/// A read/write shared mapping of a whole file.
pub struct MMapFile {
    mmap: MmapMut,
    file: File,
    path: PathBuf,
}

impl MMapFile {
    /// Creates (or truncates) `path`, sizes it to `len` bytes and maps it.
    ///
    /// If sizing or mapping fails the file handle is closed and the partially
    /// created file is removed before the original error is returned.
    pub fn create(path: &Path, len: u64, mode: u32) -> io::Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(mode);
        }
        #[cfg(not(unix))]
        let _ = mode;

        let file = options.open(path)?;
        let mapped = file
            .set_len(len)
            .and_then(|_| unsafe { MmapMut::map_mut(&file) });

        match mapped {
            Ok(mmap) => Ok(Self {
                mmap,
                file,
                path: path.to_path_buf(),
            }),
            Err(err) => {
                drop(file);
                if let Err(rm_err) = fs::remove_file(path) {
                    warn!(path = %path.display(), error = %rm_err, "failed to remove partial file");
                }
                warn!(path = %path.display(), error = %err, "create unwound");
                Err(err)
            }
        }
    }

    /// Opens an existing file read/write and maps all of it.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        // surfaces stat failures before mapping
        file.metadata()?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(Self {
            mmap,
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Flushes the mapping, then unmaps it and closes the file.
    /// Returns the path the mapping was backed by.
    pub fn close(self) -> io::Result<PathBuf> {
        let Self { mmap, file, path } = self;
        mmap.flush()?;
        drop(mmap);
        drop(file);
        Ok(path)
    }
}

impl AsRef<[u8]> for MMapFile {
    fn as_ref(&self) -> &[u8] {
        &self.mmap
    }
}

impl AsMut<[u8]> for MMapFile {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

impl ByteStore for MMapFile {
    fn flush(&self) -> io::Result<()> {
        self.mmap.flush()
    }
}
