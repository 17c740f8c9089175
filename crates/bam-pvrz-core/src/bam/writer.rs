use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use super::{
    BamHeader, CYCLE_ENTRY_SIZE, CycleEntry, DATA_BLOCK_SIZE, FRAME_ENTRY_SIZE, FrameEntry,
    HEADER_SIZE, write_data_block,
};
use crate::compressor::BlockCompressor;
use crate::config::WriteOptions;
use crate::error::{BamError, Result};
use crate::model::{Bam, Placement};
use crate::packer::{PackItem, pack_frames};
use crate::pages::{PageDirectory, global_page_id};
use crate::pvrz::encode_page;

/// Local page indices are the low three decimal digits of a global id.
const MAX_PAGES_PER_PREFIX: usize = 1000;

/// One encoded page file, ready to be written under its global id.
#[derive(Debug, Clone)]
pub struct EncodedPage {
    pub global_id: u32,
    pub bytes: Vec<u8>,
}

/// A serialized container plus the pages it references.
#[derive(Debug, Clone)]
pub struct EncodedBam {
    pub bytes: Vec<u8>,
    pub pages: Vec<EncodedPage>,
}

/// Paths produced by [`write_bam_file`].
#[derive(Debug, Clone)]
pub struct WrittenBam {
    pub bam_path: PathBuf,
    pub page_paths: Vec<PathBuf>,
}

fn to_i16(value: usize, what: &str) -> Result<i16> {
    i16::try_from(value).map_err(|_| {
        BamError::InvalidInput(format!("{what} {value} does not fit a 16-bit table field"))
    })
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| BamError::InvalidInput(format!("{what} {value} exceeds u32")))
}

#[instrument(skip_all, fields(frames = bam.frame_count(), cycles = bam.cycle_count(), prefix = options.page_prefix))]
/// Packs the frames onto pages, compresses the pages and serializes the container.
///
/// Cycles are flattened: every cycle occurrence of a frame becomes its own
/// frame-table entry, all pointing at the same data blocks.
pub fn encode_bam(
    bam: &Bam,
    options: &WriteOptions,
    compressor: &dyn BlockCompressor,
) -> Result<EncodedBam> {
    options.validate()?;
    bam.validate()?;

    let items: Vec<PackItem<'_>> = bam
        .frames()
        .iter()
        .map(|f| {
            let (w, h) = f.pixel_size();
            PackItem::new(w, h, f.image.as_ref())
        })
        .collect();
    let packed = pack_frames(&items, &options.packer)?;
    if packed.pages.len() > MAX_PAGES_PER_PREFIX {
        return Err(BamError::InvalidInput(format!(
            "{} pages do not fit one page prefix (max {MAX_PAGES_PER_PREFIX})",
            packed.pages.len()
        )));
    }

    let mut pages = Vec::with_capacity(packed.pages.len());
    for (local, image) in packed.pages.iter().enumerate() {
        let global_id = global_page_id(options.page_prefix, local as u32);
        if image.width() == 0 || image.height() == 0 {
            debug!(page = global_id, "skipping zero-area page");
            continue;
        }
        let bytes = encode_page(image, options.format, compressor)?;
        pages.push(EncodedPage { global_id, bytes });
    }

    // first data block of each logical frame
    let mut block_starts = Vec::with_capacity(packed.placements.len());
    let mut running = 0usize;
    for placements in &packed.placements {
        block_starts.push(running);
        running += placements.len();
    }
    let total_blocks = running;

    let raw_frames = bam.total_raw_frames();
    let cycle_count = bam.cycle_count();
    let frame_table_offset = HEADER_SIZE;
    let cycle_table_offset = frame_table_offset + FRAME_ENTRY_SIZE * raw_frames;
    let data_table_offset = cycle_table_offset + CYCLE_ENTRY_SIZE * cycle_count;

    let header = BamHeader {
        frame_entries: to_u32(raw_frames, "frame entry count")?,
        cycle_entries: to_u32(cycle_count, "cycle count")?,
        data_blocks: to_u32(total_blocks, "data block count")?,
        frame_table_offset: to_u32(frame_table_offset, "frame table offset")?,
        cycle_table_offset: to_u32(cycle_table_offset, "cycle table offset")?,
        data_table_offset: to_u32(data_table_offset, "data table offset")?,
    };

    let mut out = Vec::with_capacity(data_table_offset + DATA_BLOCK_SIZE * total_blocks);
    header.write(&mut out);

    for cycle in bam.cycles() {
        for &fi in cycle {
            let frame = &bam.frames()[fi];
            FrameEntry {
                width: frame.width,
                height: frame.height,
                center_x: frame.center_x,
                center_y: frame.center_y,
                block_start: to_i16(block_starts[fi], "data block index")?,
                block_count: to_i16(packed.placements[fi].len(), "data block count")?,
            }
            .write(&mut out);
        }
    }

    let mut start = 0usize;
    for cycle in bam.cycles() {
        CycleEntry {
            frame_count: to_i16(cycle.len(), "cycle length")?,
            start: to_i16(start, "cycle start index")?,
        }
        .write(&mut out);
        start += cycle.len();
    }

    for placement in packed.placements.iter().flatten() {
        let block = Placement {
            page: global_page_id(options.page_prefix, placement.page),
            ..*placement
        };
        write_data_block(&block, &mut out);
    }

    debug!(
        raw_frames,
        blocks = total_blocks,
        pages = pages.len(),
        bytes = out.len(),
        "bam encoded"
    );
    Ok(EncodedBam { bytes: out, pages })
}

/// Encodes `bam` and writes the pages into `pages`, returning the container bytes.
pub fn write_bam(
    bam: &Bam,
    options: &WriteOptions,
    pages: &PageDirectory,
    compressor: &dyn BlockCompressor,
) -> Result<Vec<u8>> {
    let encoded = encode_bam(bam, options, compressor)?;
    for page in &encoded.pages {
        pages.write(page.global_id, &page.bytes)?;
    }
    Ok(encoded.bytes)
}

/// Writes the container to `path` and its pages next to it, named per `options.naming`.
pub fn write_bam_file(
    bam: &Bam,
    path: &Path,
    options: &WriteOptions,
    compressor: &dyn BlockCompressor,
) -> Result<WrittenBam> {
    let encoded = encode_bam(bam, options, compressor)?;
    let dir = PageDirectory::new(
        path.parent().unwrap_or_else(|| Path::new(".")),
        options.naming.clone(),
    );
    let page_paths = encoded
        .pages
        .iter()
        .map(|page| dir.write(page.global_id, &page.bytes))
        .collect::<Result<Vec<_>>>()?;
    std::fs::write(path, &encoded.bytes)?;
    info!(
        path = %path.display(),
        pages = page_paths.len(),
        "wrote bam"
    );
    Ok(WrittenBam {
        bam_path: path.to_path_buf(),
        page_paths,
    })
}
