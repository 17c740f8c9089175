//! Core library for BAM V2 sprite containers and their PVRZ texture pages.
//!
//! - Container codec: `read_bam` / `encode_bam` over the binary BAM V2 layout
//! - Page codec: PVR v3 header + BC1/BC3 payload, zlib-wrapped (`decode_page`, `encode_page`)
//! - Shelf packer: lays frames out on pages bounded by `PackerConfig`
//! - Reassignment: moves a container's pages to another numeric prefix in place
//!
//! Quick example:
//! ```ignore
//! use bam_pvrz_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut bam = Bam::new();
//! let img = image::open("walk0.png")?.to_rgba8();
//! let frame = bam.add_frame(Frame::from_image(img, 16, 40)?);
//! let cycle = bam.add_cycle();
//! bam.add_frame_to_cycle(cycle, frame)?;
//! let opts = WriteOptions::builder().page_prefix(17).build();
//! write_bam_file(&bam, "out/walk.bam".as_ref(), &opts, &IspcCompressor)?;
//! # Ok(()) }
//! ```

pub mod bam;
pub mod bytes;
pub mod compositing;
pub mod compressor;
pub mod config;
pub mod error;
pub mod model;
pub mod packer;
pub mod pages;
pub mod pvrz;
pub mod reassign;

pub use bam::*;
pub use compressor::*;
pub use config::*;
pub use error::*;
pub use model::*;
pub use packer::{PackItem, PackOutput, ShelfPacker, pack_frames, round_up_to_4};
pub use pages::*;
pub use pvrz::{DecodedPage, PvrHeader, decode_page, encode_page};
pub use reassign::*;

/// Convenience prelude for common types and functions.
/// Importing `bam_pvrz_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::bam::{encode_bam, read_bam, read_bam_file, write_bam, write_bam_file};
    pub use crate::compressor::{BlockCompressor, IspcCompressor, Texconv};
    pub use crate::config::{
        PackerConfig, PageNaming, TexconvConfig, TextureFormat, WriteOptions, WriteOptionsBuilder,
    };
    pub use crate::error::{BamError, Result};
    pub use crate::model::{Bam, Frame, Placement, Rect};
    pub use crate::pages::PageDirectory;
    pub use crate::reassign::{delete_bam, linked_pages, reassign_file, reassign_pages};
}
