use image::RgbaImage;
use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::PageNaming;
use crate::error::{BamError, Result};
use crate::pvrz::decode_page;

/// `prefix * 1000 + local`, e.g. prefix 17, local 3 -> 17003.
#[inline]
pub fn global_page_id(prefix: u32, local: u32) -> u32 {
    prefix * 1000 + local
}

#[inline]
pub fn page_prefix(global_id: u32) -> u32 {
    global_id / 1000
}

#[inline]
pub fn page_local(global_id: u32) -> u32 {
    global_id % 1000
}

/// Moves a page id into another prefix namespace, keeping its local index: (2005, 9) -> 9005.
#[inline]
pub fn reassigned_page_id(global_id: u32, new_prefix: u32) -> u32 {
    global_page_id(new_prefix, page_local(global_id))
}

/// A directory holding page files named by [`PageNaming`].
#[derive(Debug, Clone)]
pub struct PageDirectory {
    root: PathBuf,
    naming: PageNaming,
}

impl PageDirectory {
    pub fn new(root: impl Into<PathBuf>, naming: PageNaming) -> Self {
        Self {
            root: root.into(),
            naming,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn naming(&self) -> &PageNaming {
        &self.naming
    }

    pub fn path_for(&self, global_id: u32) -> PathBuf {
        self.root.join(self.naming.file_name(global_id))
    }

    pub fn exists(&self, global_id: u32) -> bool {
        self.path_for(global_id).is_file()
    }

    pub fn read(&self, global_id: u32) -> Result<Vec<u8>> {
        let path = self.path_for(global_id);
        if !path.is_file() {
            return Err(BamError::MissingFile { path });
        }
        Ok(std::fs::read(path)?)
    }

    pub fn write(&self, global_id: u32, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let path = self.path_for(global_id);
        std::fs::write(&path, bytes)?;
        Ok(path)
    }

    pub fn rename(&self, from: u32, to: u32) -> Result<()> {
        std::fs::rename(self.path_for(from), self.path_for(to))?;
        Ok(())
    }

    /// Smallest prefix >= 1 that no page file in the directory uses yet.
    ///
    /// Scans for `<naming.prefix><digits>.<naming.extension>` (extension matched
    /// case-insensitively) and collects `digits / 1000`. A missing directory has
    /// every prefix free.
    pub fn free_prefix(&self) -> Result<u32> {
        if !self.root.is_dir() {
            return Ok(1);
        }
        let mut used = BTreeSet::new();
        for entry in std::fs::read_dir(&self.root)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(id) = self.naming.parse_file_name(name) {
                used.insert(page_prefix(id));
            }
        }
        let free = (1..=u32::MAX)
            .find(|p| !used.contains(p))
            .ok_or_else(|| BamError::InvalidConfig("no free page prefix left".into()))?;
        debug!(dir = %self.root.display(), prefixes = used.len(), free, "free prefix");
        Ok(free)
    }

    /// Removes a page file; returns its path if it existed.
    pub fn remove(&self, global_id: u32) -> Result<Option<PathBuf>> {
        let path = self.path_for(global_id);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::remove_file(&path)?;
        Ok(Some(path))
    }
}

/// Decoded pages keyed by global id, scoped to one container read.
pub struct PageCache<'a> {
    dir: &'a PageDirectory,
    pages: HashMap<u32, RgbaImage>,
}

impl<'a> PageCache<'a> {
    pub fn new(dir: &'a PageDirectory) -> Self {
        Self {
            dir,
            pages: HashMap::new(),
        }
    }

    /// Returns the decoded page, loading it on first use.
    pub fn get(&mut self, global_id: u32) -> Result<&RgbaImage> {
        match self.pages.entry(global_id) {
            Entry::Occupied(o) => Ok(o.into_mut()),
            Entry::Vacant(v) => {
                let bytes = self.dir.read(global_id)?;
                let page = decode_page(&bytes)?;
                debug!(page = global_id, "page loaded");
                Ok(v.insert(page.image))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
