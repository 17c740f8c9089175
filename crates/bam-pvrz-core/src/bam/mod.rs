//! BAM V2 container layout: 32-byte header, frame table, cycle table, data-block table.

use serde::{Deserialize, Serialize};

use crate::bytes::{read_i16, read_tag, read_u32};
use crate::error::{BamError, Result};
use crate::model::{Placement, Rect};

pub mod reader;
pub mod writer;

pub use reader::{read_bam, read_bam_file};
pub use writer::{EncodedBam, EncodedPage, WrittenBam, encode_bam, write_bam, write_bam_file};

pub const BAM_SIGNATURE: &[u8; 4] = b"BAM ";
pub const BAM_VERSION: &[u8; 4] = b"V2  ";
pub const HEADER_SIZE: usize = 32;
pub const FRAME_ENTRY_SIZE: usize = 12;
pub const CYCLE_ENTRY_SIZE: usize = 4;
pub const DATA_BLOCK_SIZE: usize = 28;

/// Fixed header. `data_blocks` is informational on read and recomputed on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BamHeader {
    pub frame_entries: u32,
    pub cycle_entries: u32,
    pub data_blocks: u32,
    pub frame_table_offset: u32,
    pub cycle_table_offset: u32,
    pub data_table_offset: u32,
}

impl BamHeader {
    /// Checks signature and version, then reads the six table fields.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let signature = read_tag(data, 0, "signature")?;
        if &signature != BAM_SIGNATURE {
            return Err(BamError::BadSignature {
                expected: "BAM ",
                found: String::from_utf8_lossy(&signature).into_owned(),
            });
        }
        let version = read_tag(data, 4, "version")?;
        if &version != BAM_VERSION {
            return Err(BamError::BadVersion {
                found: String::from_utf8_lossy(&version).into_owned(),
            });
        }
        Ok(Self {
            frame_entries: read_u32(data, 8, "frame entry count")?,
            cycle_entries: read_u32(data, 12, "cycle entry count")?,
            data_blocks: read_u32(data, 16, "data block count")?,
            frame_table_offset: read_u32(data, 20, "frame table offset")?,
            cycle_table_offset: read_u32(data, 24, "cycle table offset")?,
            data_table_offset: read_u32(data, 28, "data table offset")?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(BAM_SIGNATURE);
        out.extend_from_slice(BAM_VERSION);
        for v in [
            self.frame_entries,
            self.cycle_entries,
            self.data_blocks,
            self.frame_table_offset,
            self.cycle_table_offset,
            self.data_table_offset,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }

    /// Byte offset of data block `index`.
    pub fn data_block_offset(&self, index: usize) -> usize {
        self.data_table_offset as usize + DATA_BLOCK_SIZE * index
    }
}

/// One 12-byte frame-table entry. Entries with equal fields describe the same logical frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameEntry {
    pub width: i16,
    pub height: i16,
    pub center_x: i16,
    pub center_y: i16,
    pub block_start: i16,
    pub block_count: i16,
}

impl FrameEntry {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        Ok(Self {
            width: read_i16(data, offset, "frame width")?,
            height: read_i16(data, offset + 2, "frame height")?,
            center_x: read_i16(data, offset + 4, "frame center x")?,
            center_y: read_i16(data, offset + 6, "frame center y")?,
            block_start: read_i16(data, offset + 8, "frame data block index")?,
            block_count: read_i16(data, offset + 10, "frame data block count")?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        for v in [
            self.width,
            self.height,
            self.center_x,
            self.center_y,
            self.block_start,
            self.block_count,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// One 4-byte cycle-table entry; `start` indexes the raw frame table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEntry {
    pub frame_count: i16,
    pub start: i16,
}

impl CycleEntry {
    pub fn parse(data: &[u8], offset: usize) -> Result<Self> {
        Ok(Self {
            frame_count: read_i16(data, offset, "cycle frame count")?,
            start: read_i16(data, offset + 2, "cycle start frame index")?,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.frame_count.to_le_bytes());
        out.extend_from_slice(&self.start.to_le_bytes());
    }
}

/// Reads the 28-byte data block at `offset`.
pub fn parse_data_block(data: &[u8], offset: usize) -> Result<Placement> {
    Ok(Placement::new(
        read_u32(data, offset, "data block page")?,
        Rect::new(
            read_u32(data, offset + 4, "data block source x")?,
            read_u32(data, offset + 8, "data block source y")?,
            read_u32(data, offset + 12, "data block width")?,
            read_u32(data, offset + 16, "data block height")?,
        ),
        read_u32(data, offset + 20, "data block target x")?,
        read_u32(data, offset + 24, "data block target y")?,
    ))
}

pub fn write_data_block(block: &Placement, out: &mut Vec<u8>) {
    for v in [
        block.page,
        block.source.x,
        block.source.y,
        block.source.w,
        block.source.h,
        block.target_x,
        block.target_y,
    ] {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Table-level view of a container, without resolving any page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BamLayout {
    pub header: BamHeader,
    pub frames: Vec<FrameEntry>,
    pub cycles: Vec<CycleEntry>,
    pub blocks: Vec<Placement>,
}

impl BamLayout {
    /// Parses all three tables using the header counts.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = BamHeader::parse(data)?;
        let frames = (0..header.frame_entries as usize)
            .map(|i| FrameEntry::parse(data, header.frame_table_offset as usize + FRAME_ENTRY_SIZE * i))
            .collect::<Result<Vec<_>>>()?;
        let cycles = (0..header.cycle_entries as usize)
            .map(|i| CycleEntry::parse(data, header.cycle_table_offset as usize + CYCLE_ENTRY_SIZE * i))
            .collect::<Result<Vec<_>>>()?;
        let blocks = (0..header.data_blocks as usize)
            .map(|i| parse_data_block(data, header.data_block_offset(i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            header,
            frames,
            cycles,
            blocks,
        })
    }
}
