//! Raw byte-level view over one `mime.cache` file.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{CacheError, Result};

/// Header positions of the section offsets.
pub const POS_ALIAS_LIST: usize = 4;
pub const POS_PARENT_LIST: usize = 8;
pub const POS_LITERAL_LIST: usize = 12;
pub const POS_SUFFIX_TREE: usize = 16;
pub const POS_GLOB_LIST: usize = 20;
pub const POS_MAGIC_LIST: usize = 24;
pub const POS_ICONS_LIST: usize = 32;
pub const POS_GENERIC_ICONS_LIST: usize = 36;

/// Size of the fixed header, through the generic-icons offset.
pub const HEADER_SIZE: usize = 40;

/// Backing bytes of a cache file.
///
/// Files on disk are memory-mapped; owned buffers exist for tests and for
/// callers that already hold the bytes.
pub enum CacheStorage {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl CacheStorage {
    fn bytes(&self) -> &[u8] {
        match self {
            CacheStorage::Owned(buf) => buf,
            CacheStorage::Mapped(map) => map,
        }
    }
}

/// One validated cache file plus typed accessors over its bytes.
///
/// All multi-byte integers in the format are big-endian. Every accessor
/// bounds-checks: offsets come from the file itself and are untrusted.
pub struct CacheFile {
    storage: CacheStorage,
    path: PathBuf,
}

impl CacheFile {
    /// Map a cache file from disk and validate its version header.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // Read-only mapping of a file we never truncate ourselves.
        let map = unsafe { Mmap::map(&file)? };
        Self::new(CacheStorage::Mapped(map), path.to_path_buf())
    }

    /// Wrap an in-memory buffer, validating the version header.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::new(CacheStorage::Owned(bytes), PathBuf::from("<memory>"))
    }

    fn new(storage: CacheStorage, path: PathBuf) -> Result<Self> {
        let file = Self { storage, path };
        if file.bytes().len() < HEADER_SIZE {
            return Err(CacheError::OutOfBounds {
                offset: 0,
                len: HEADER_SIZE,
            });
        }
        let major = file.get_u16(0)?;
        let minor = file.get_u16(2)?;
        if major != 1 || !(1..=2).contains(&minor) {
            return Err(CacheError::UnsupportedVersion { major, minor });
        }
        Ok(file)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        let bytes = self
            .bytes()
            .get(offset..offset + 2)
            .ok_or(CacheError::OutOfBounds { offset, len: 2 })?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self
            .bytes()
            .get(offset..offset + 4)
            .ok_or(CacheError::OutOfBounds { offset, len: 4 })?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a section offset from the header and return it as `usize`.
    pub fn section(&self, pos: usize) -> Result<usize> {
        Ok(self.get_u32(pos)? as usize)
    }

    /// Read a nul-terminated UTF-8 string at `offset`.
    pub fn get_cstr(&self, offset: usize) -> Result<&str> {
        let bytes = self
            .bytes()
            .get(offset..)
            .ok_or(CacheError::BadString { offset })?;
        let nul = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or(CacheError::BadString { offset })?;
        std::str::from_utf8(&bytes[..nul]).map_err(|_| CacheError::BadString { offset })
    }

    /// Read `len` raw bytes at `offset`.
    pub fn get_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.bytes()
            .get(offset..offset + len)
            .ok_or(CacheError::OutOfBounds { offset, len })
    }
}
