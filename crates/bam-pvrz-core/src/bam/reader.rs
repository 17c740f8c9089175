use image::RgbaImage;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use tracing::{debug, instrument};

use super::{BamHeader, CYCLE_ENTRY_SIZE, CycleEntry, FRAME_ENTRY_SIZE, FrameEntry, parse_data_block};
use crate::compositing::blit_rgba;
use crate::config::PageNaming;
use crate::error::{BamError, Result};
use crate::model::{Bam, Frame, Placement};
use crate::pages::{PageCache, PageDirectory};

/// Reads the data blocks a frame entry points at.
fn frame_blocks(data: &[u8], header: &BamHeader, entry: &FrameEntry) -> Result<Vec<Placement>> {
    if entry.block_start < 0 || entry.block_count < 0 {
        return Err(BamError::InvalidInput(format!(
            "frame data block range start={} count={} is negative",
            entry.block_start, entry.block_count
        )));
    }
    let start = entry.block_start as usize;
    (start..start + entry.block_count as usize)
        .map(|i| parse_data_block(data, header.data_block_offset(i)))
        .collect()
}

/// Assembles a frame's pixels from its blocks.
fn assemble_frame(
    entry: &FrameEntry,
    blocks: &[Placement],
    cache: &mut PageCache<'_>,
) -> Result<Frame> {
    let frame = Frame::new(entry.width, entry.height, entry.center_x, entry.center_y);
    let (w, h) = frame.pixel_size();
    let mut image = RgbaImage::new(w, h);
    for block in blocks {
        if block.source.is_empty() {
            continue;
        }
        let page = cache.get(block.page)?;
        blit_rgba(
            page,
            &mut image,
            block.target_x,
            block.target_y,
            block.source.x,
            block.source.y,
            block.source.w,
            block.source.h,
        );
    }
    Ok(frame.with_image(image))
}

#[instrument(skip_all, fields(len = data.len(), dir = %pages.root().display()))]
/// Decodes a BAM V2 byte stream, resolving pixel data from the page files in `pages`.
///
/// Frame-table entries with identical fields collapse into one logical frame
/// (first occurrence wins); cycles refer to the deduplicated frames.
pub fn read_bam(data: &[u8], pages: &PageDirectory) -> Result<Bam> {
    let header = BamHeader::parse(data)?;
    let mut cache = PageCache::new(pages);
    let mut bam = Bam::new();

    let frame_entries = header.frame_entries as usize;
    let mut seen: HashMap<FrameEntry, usize> = HashMap::new();
    let mut raw_to_logical: Vec<usize> =
        Vec::with_capacity(frame_entries.min(data.len() / FRAME_ENTRY_SIZE));
    for raw in 0..frame_entries {
        let offset = header.frame_table_offset as usize + FRAME_ENTRY_SIZE * raw;
        let entry = FrameEntry::parse(data, offset)?;
        let logical = match seen.entry(entry) {
            Entry::Occupied(o) => *o.get(),
            Entry::Vacant(v) => {
                let blocks = frame_blocks(data, &header, &entry)?;
                let frame = assemble_frame(&entry, &blocks, &mut cache)?;
                *v.insert(bam.add_frame(frame))
            }
        };
        raw_to_logical.push(logical);
    }

    for c in 0..header.cycle_entries as usize {
        let offset = header.cycle_table_offset as usize + CYCLE_ENTRY_SIZE * c;
        let entry = CycleEntry::parse(data, offset)?;
        if entry.frame_count < 0 || entry.start < 0 {
            return Err(BamError::InvalidInput(format!(
                "cycle {c} has negative frame count {} or start {}",
                entry.frame_count, entry.start
            )));
        }
        let cycle = bam.add_cycle();
        let start = entry.start as usize;
        for raw in start..start + entry.frame_count as usize {
            let logical = *raw_to_logical.get(raw).ok_or_else(|| {
                BamError::InvalidInput(format!(
                    "cycle {c} references frame entry {raw}, table holds {frame_entries}"
                ))
            })?;
            bam.add_frame_to_cycle(cycle, logical)?;
        }
    }

    debug!(
        raw_frames = frame_entries,
        frames = bam.frame_count(),
        cycles = bam.cycle_count(),
        pages = cache.len(),
        "bam decoded"
    );
    Ok(bam)
}

/// Reads a BAM file; page files are resolved next to it.
pub fn read_bam_file(path: &Path, naming: &PageNaming) -> Result<Bam> {
    if !path.is_file() {
        return Err(BamError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let data = std::fs::read(path)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    read_bam(&data, &PageDirectory::new(dir, naming.clone()))
}
