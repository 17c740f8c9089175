use image::RgbaImage;
use tracing::instrument;

use crate::config::PackerConfig;
use crate::error::Result;
use crate::model::Placement;

pub mod shelf;

pub use shelf::ShelfPacker;

/// Rounds `n` up to the next multiple of 4 (BC texel-block alignment); 0 stays 0.
/// Values above `u32::MAX - 3` saturate to the largest multiple of 4.
#[inline]
pub fn round_up_to_4(n: u32) -> u32 {
    n.checked_next_multiple_of(4).unwrap_or(u32::MAX & !3)
}

/// One image to place. `image` may be absent for frames without pixels yet;
/// the declared size still drives the layout.
#[derive(Debug, Clone, Copy)]
pub struct PackItem<'a> {
    pub width: u32,
    pub height: u32,
    pub image: Option<&'a RgbaImage>,
}

impl<'a> PackItem<'a> {
    pub fn new(width: u32, height: u32, image: Option<&'a RgbaImage>) -> Self {
        Self {
            width,
            height,
            image,
        }
    }
}

/// Cropped RGBA pages plus, per input item, the placements that reference them.
/// Placement page numbers are page-local indices into `pages`.
#[derive(Debug, Clone)]
pub struct PackOutput {
    pub pages: Vec<RgbaImage>,
    pub placements: Vec<Vec<Placement>>,
}

impl PackOutput {
    /// Total number of placement records across all items.
    pub fn block_count(&self) -> usize {
        self.placements.iter().map(Vec::len).sum()
    }
}

#[instrument(skip_all, fields(items = items.len()))]
/// Packs `items` in order onto shelf pages bounded by `cfg`.
///
/// Single greedy pass: each item goes to the current shelf, else a fresh shelf,
/// else a fresh page (clipped if it is larger than a page).
pub fn pack_frames(items: &[PackItem<'_>], cfg: &PackerConfig) -> Result<PackOutput> {
    cfg.validate()?;
    let mut packer = ShelfPacker::new(cfg.clone());
    let placements = items
        .iter()
        .enumerate()
        .map(|(idx, item)| vec![packer.place(idx, item)])
        .collect();
    let pages = packer.finish();
    Ok(PackOutput { pages, placements })
}
