//! Moves a container's pages into another numeric namespace without re-encoding.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::bam::BamHeader;
use crate::bytes::{read_u32, write_u32};
use crate::config::PageNaming;
use crate::error::{BamError, Result};
use crate::pages::{PageDirectory, reassigned_page_id};

/// Offset of every page-id field in the data-block table.
fn page_field_offsets(header: &BamHeader) -> impl Iterator<Item = usize> + '_ {
    (0..header.data_blocks as usize).map(move |i| header.data_block_offset(i))
}

/// Distinct page ids referenced by the data-block table, sorted.
pub fn linked_pages(data: &[u8]) -> Result<BTreeSet<u32>> {
    let header = BamHeader::parse(data)?;
    page_field_offsets(&header)
        .map(|offset| read_u32(data, offset, "data block page"))
        .collect()
}

#[instrument(skip(data, pages), fields(len = data.len(), dir = %pages.root().display()))]
/// Renames every page file referenced by `data` to `new_prefix` and returns the
/// container bytes with each page-id field rewritten to match.
///
/// All checks run before the first rename: a missing source page or an occupied
/// destination leaves both the directory and `data` untouched. An I/O failure
/// between renames is not rolled back.
pub fn reassign_pages(data: &[u8], new_prefix: u32, pages: &PageDirectory) -> Result<Vec<u8>> {
    if new_prefix > (u32::MAX - 999) / 1000 {
        return Err(BamError::InvalidConfig(format!(
            "page prefix {new_prefix} overflows 32-bit page ids"
        )));
    }
    let header = BamHeader::parse(data)?;
    let linked = linked_pages(data)?;

    let mut moves: BTreeMap<u32, u32> = BTreeMap::new();
    let mut claimed: BTreeMap<u32, u32> = BTreeMap::new();
    for &old in &linked {
        if !pages.exists(old) {
            return Err(BamError::MissingFile {
                path: pages.path_for(old),
            });
        }
        let new = reassigned_page_id(old, new_prefix);
        if new == old {
            continue;
        }
        // two sources folding onto one id, or a file already sitting there
        if claimed.insert(new, old).is_some() || pages.exists(new) {
            return Err(BamError::Collision {
                path: pages.path_for(new),
            });
        }
        moves.insert(old, new);
    }

    for (&old, &new) in &moves {
        pages.rename(old, new)?;
        debug!(from = old, to = new, "page renamed");
    }

    let mut out = data.to_vec();
    for offset in page_field_offsets(&header) {
        let old = read_u32(&out, offset, "data block page")?;
        if let Some(&new) = moves.get(&old) {
            write_u32(&mut out, offset, new);
        }
    }

    info!(
        prefix = new_prefix,
        pages = moves.len(),
        blocks = header.data_blocks,
        "reassigned pages"
    );
    Ok(out)
}

/// Reassigns the pages of the BAM at `path` (pages live next to it) and rewrites it in place.
pub fn reassign_file(path: &Path, new_prefix: u32, naming: &PageNaming) -> Result<()> {
    if !path.is_file() {
        return Err(BamError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path)?;
    let dir = PageDirectory::new(
        path.parent().unwrap_or_else(|| Path::new(".")),
        naming.clone(),
    );
    let rewritten = reassign_pages(&data, new_prefix, &dir)?;
    std::fs::write(path, rewritten)?;
    Ok(())
}

/// Deletes every existing page linked from the BAM at `path`, then the BAM itself.
/// Returns the removed paths, pages first.
pub fn delete_bam(path: &Path, naming: &PageNaming) -> Result<Vec<PathBuf>> {
    if !path.is_file() {
        return Err(BamError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path)?;
    let dir = PageDirectory::new(
        path.parent().unwrap_or_else(|| Path::new(".")),
        naming.clone(),
    );
    let mut removed = Vec::new();
    for id in linked_pages(&data)? {
        if let Some(page) = dir.remove(id)? {
            removed.push(page);
        }
    }
    std::fs::remove_file(path)?;
    removed.push(path.to_path_buf());
    info!(path = %path.display(), files = removed.len(), "deleted bam");
    Ok(removed)
}
