use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use log::debug;
use tempfile::NamedTempFile;

use crate::data::osm::{ElementType, OsmId};
use crate::errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub element_type: ElementType,
    pub element_id: OsmId,
}

impl CacheKey {
    pub fn new(element_type: ElementType, element_id: OsmId) -> CacheKey {
        CacheKey {
            element_type,
            element_id,
        }
    }

    fn file_name(&self, extension: &str) -> String {
        format!("{}-{}.{}", self.element_type, self.element_id, extension)
    }
}

/// Append-only byte store. Entries are never overwritten, so concurrent writers of the same
/// key keep whichever value landed first.
pub trait ByteCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;

    /// Returns false when the key already had a value.
    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> Result<bool>;

    fn fetch_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<Vec<u8>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
        Self: Sized,
    {
        if let Some(bytes) = self.get(key)? {
            debug!(element_type = key.element_type.as_str(), element_id = key.element_id; "Cache hit");
            return Ok(bytes);
        }
        let bytes = compute()?;
        self.put_if_absent(key, &bytes)?;
        Ok(bytes)
    }
}

pub struct DirCache {
    dir: PathBuf,
    extension: String,
}

impl DirCache {
    pub fn new(dir: &Path, extension: &str) -> Result<DirCache> {
        fs::create_dir_all(dir)?;
        Ok(DirCache {
            dir: dir.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name(&self.extension))
    }

    pub fn remove(&self, key: &CacheKey) -> Result<()> {
        match fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn clear(&self) -> Result<()> {
        if self.dir.try_exists()? {
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

impl ByteCache for DirCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        match fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Entries are written to a temporary file next to the final path and only then linked
    /// into place, so readers never see a partly written entry.
    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> Result<bool> {
        let mut file = NamedTempFile::new_in(&self.dir)?;
        file.write_all(bytes)?;
        file.as_file().sync_all()?;
        match file.persist_noclobber(self.path(key)) {
            Ok(_) => Ok(true),
            Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.error.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ByteCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.lock().map_err(|err| err.to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> Result<bool> {
        let mut entries = self.entries.lock().map_err(|err| err.to_string())?;
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(*key, bytes.to_vec());
        Ok(true)
    }
}
