use image::RgbaImage;
use image::imageops;
use tracing::{debug, warn};

use super::{PackItem, round_up_to_4};
use crate::compositing::blit_rgba;
use crate::config::PackerConfig;
use crate::model::{Placement, Rect};

/// Left-to-right, top-to-bottom shelf packer over fixed-size pages.
///
/// Fit tests are strict (`left + w < max_width`), so an item touching the page
/// edge does not fit on a shelf. Cursors advance in multiples of 4.
pub struct ShelfPacker {
    config: PackerConfig,
    canvas: RgbaImage,
    page: u32,
    left: u32,
    top: u32,
    max_left: u32,
    row_height: u32,
    finished: Vec<RgbaImage>,
}

impl ShelfPacker {
    pub fn new(config: PackerConfig) -> Self {
        let canvas = RgbaImage::new(config.max_width, config.max_height);
        Self {
            config,
            canvas,
            page: 0,
            left: 0,
            top: 0,
            max_left: 0,
            row_height: 0,
            finished: Vec::new(),
        }
    }

    /// Page-local index of the page currently being filled.
    pub fn current_page(&self) -> u32 {
        self.page
    }

    fn fits(&self, w: u32, h: u32) -> bool {
        (self.left as u64 + w as u64) < self.config.max_width as u64
            && (self.top as u64 + h as u64) < self.config.max_height as u64
    }

    /// Places one item and returns its placement. `index` is only used for diagnostics.
    pub fn place(&mut self, index: usize, item: &PackItem<'_>) -> Placement {
        let (w, h) = (item.width, item.height);
        if self.fits(w, h) {
            return self.put(item, w, h);
        }

        // new shelf
        self.top += round_up_to_4(self.row_height);
        self.left = 0;
        self.row_height = 0;
        if self.fits(w, h) {
            return self.put(item, w, h);
        }

        // new page
        if self.top > 0 || self.left > 0 {
            self.finish_page();
        }
        let clip_w = w.min(self.config.max_width - self.left);
        let clip_h = h.min(self.config.max_height - self.top);
        if clip_w < w || clip_h < h {
            warn!(
                frame = index,
                width = w,
                height = h,
                max_width = self.config.max_width,
                max_height = self.config.max_height,
                "frame is larger than a page; pixels will be lost"
            );
        }
        let placement = self.put(item, clip_w, clip_h);
        // cursors follow the declared size, not the clipped one
        self.left = placement.source.x + round_up_to_4(w);
        self.max_left = self.max_left.max(self.left);
        self.row_height = self.row_height.max(h);
        placement
    }

    fn put(&mut self, item: &PackItem<'_>, w: u32, h: u32) -> Placement {
        let (x, y) = (self.left, self.top);
        if let Some(img) = item.image {
            blit_rgba(img, &mut self.canvas, x, y, 0, 0, w, h);
        }
        self.left += round_up_to_4(w);
        self.max_left = self.max_left.max(self.left);
        self.row_height = self.row_height.max(h);
        Placement::new(self.page, Rect::new(x, y, w, h), 0, 0)
    }

    /// Bounding size of what has been placed on the current page.
    fn used_size(&self) -> (u32, u32) {
        (
            self.max_left.min(self.config.max_width),
            round_up_to_4(self.top + self.row_height).min(self.config.max_height),
        )
    }

    fn finish_page(&mut self) {
        let (w, h) = self.used_size();
        debug!(page = self.page, width = w, height = h, "page finished");
        let canvas = std::mem::replace(
            &mut self.canvas,
            RgbaImage::new(self.config.max_width, self.config.max_height),
        );
        self.finished
            .push(imageops::crop_imm(&canvas, 0, 0, w, h).to_image());
        self.page += 1;
        self.left = 0;
        self.top = 0;
        self.max_left = 0;
        self.row_height = 0;
    }

    /// Crops the last page (even if empty) and returns all pages in order.
    pub fn finish(mut self) -> Vec<RgbaImage> {
        let (w, h) = self.used_size();
        debug!(page = self.page, width = w, height = h, "last page finished");
        self.finished
            .push(imageops::crop_imm(&self.canvas, 0, 0, w, h).to_image());
        self.finished
    }
}
