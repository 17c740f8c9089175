use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{BamError, Result};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// One rectangle copy between a page and a frame.
///
/// On read `page` is a global page id; packer output carries the page-local index
/// until the writer folds in the prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Placement {
    pub page: u32,
    /// Region inside the page.
    pub source: Rect,
    /// Where the region lands inside the frame.
    pub target_x: u32,
    pub target_y: u32,
}

impl Placement {
    pub fn new(page: u32, source: Rect, target_x: u32, target_y: u32) -> Self {
        Self {
            page,
            source,
            target_x,
            target_y,
        }
    }
}

/// A logical sprite frame: size, anchor and (once loaded or assigned) its pixels.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub width: i16,
    pub height: i16,
    pub center_x: i16,
    pub center_y: i16,
    pub image: Option<RgbaImage>,
}

impl Frame {
    pub fn new(width: i16, height: i16, center_x: i16, center_y: i16) -> Self {
        Self {
            width,
            height,
            center_x,
            center_y,
            image: None,
        }
    }

    /// Builds a frame sized after `image`. Fails if the image does not fit the 16-bit fields.
    pub fn from_image(image: RgbaImage, center_x: i16, center_y: i16) -> Result<Self> {
        let (w, h) = image.dimensions();
        let width = i16::try_from(w)
            .map_err(|_| BamError::InvalidInput(format!("frame width {w} exceeds i16")))?;
        let height = i16::try_from(h)
            .map_err(|_| BamError::InvalidInput(format!("frame height {h} exceeds i16")))?;
        Ok(Self {
            width,
            height,
            center_x,
            center_y,
            image: Some(image),
        })
    }

    pub fn with_image(mut self, image: RgbaImage) -> Self {
        self.image = Some(image);
        self
    }

    pub fn size(&self) -> (i16, i16) {
        (self.width, self.height)
    }

    pub fn center(&self) -> (i16, i16) {
        (self.center_x, self.center_y)
    }

    /// Declared size as pixel dimensions; negative sizes count as zero.
    pub fn pixel_size(&self) -> (u32, u32) {
        (self.width.max(0) as u32, self.height.max(0) as u32)
    }
}

/// BAM V2 container: logical frames plus cycles of frame indices.
#[derive(Debug, Clone, Default)]
pub struct Bam {
    frames: Vec<Frame>,
    cycles: Vec<Vec<usize>>,
}

impl Bam {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a frame and returns its index.
    pub fn add_frame(&mut self, frame: Frame) -> usize {
        self.frames.push(frame);
        self.frames.len() - 1
    }

    /// Appends an empty cycle and returns its index.
    pub fn add_cycle(&mut self) -> usize {
        self.cycles.push(Vec::new());
        self.cycles.len() - 1
    }

    pub fn add_frame_to_cycle(&mut self, cycle: usize, frame: usize) -> Result<()> {
        if frame >= self.frames.len() {
            return Err(BamError::InvalidInput(format!(
                "frame index {frame} out of range ({} frames)",
                self.frames.len()
            )));
        }
        let frames = self.cycles.get_mut(cycle).ok_or_else(|| {
            BamError::InvalidInput(format!("cycle index {cycle} out of range"))
        })?;
        frames.push(frame);
        Ok(())
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    pub fn frame_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.frames.get_mut(index)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn cycle(&self, index: usize) -> Option<&[usize]> {
        self.cycles.get(index).map(Vec::as_slice)
    }

    pub fn cycles(&self) -> &[Vec<usize>] {
        &self.cycles
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn cycle_count(&self) -> usize {
        self.cycles.len()
    }

    /// Number of frame-table entries the container serializes to (sum of cycle lengths).
    pub fn total_raw_frames(&self) -> usize {
        self.cycles.iter().map(Vec::len).sum()
    }

    /// Checks that every cycle references an existing frame.
    pub fn validate(&self) -> Result<()> {
        for (ci, cycle) in self.cycles.iter().enumerate() {
            if let Some(&bad) = cycle.iter().find(|&&f| f >= self.frames.len()) {
                return Err(BamError::InvalidInput(format!(
                    "cycle {ci} references frame {bad}, container holds {} frames",
                    self.frames.len()
                )));
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> BamSummary {
        BamSummary {
            frames: self
                .frames
                .iter()
                .map(|f| FrameSummary {
                    width: f.width,
                    height: f.height,
                    center_x: f.center_x,
                    center_y: f.center_y,
                    has_image: f.image.is_some(),
                })
                .collect(),
            cycles: self.cycles.clone(),
        }
    }

    /// Writes every frame that has pixels as `<dir>/<name_prefix><index>.png`.
    pub fn save_frames(&self, dir: &Path, name_prefix: &str) -> Result<Vec<std::path::PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.frames.len());
        for (idx, frame) in self.frames.iter().enumerate() {
            if let Some(img) = &frame.image {
                let path = dir.join(format!("{name_prefix}{idx}.png"));
                img.save(&path)?;
                written.push(path);
            }
        }
        Ok(written)
    }
}

/// Serializable overview of a container (no pixels).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BamSummary {
    pub frames: Vec<FrameSummary>,
    pub cycles: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSummary {
    pub width: i16,
    pub height: i16,
    pub center_x: i16,
    pub center_y: i16,
    pub has_image: bool,
}

impl fmt::Display for Bam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "bam V2")?;
        writeln!(f, "{} frames", self.frames.len())?;
        for frame in &self.frames {
            writeln!(
                f,
                "\tsize {:?} center {:?}",
                frame.size(),
                frame.center()
            )?;
        }
        write!(f, "{} cycles", self.cycles.len())?;
        for cycle in &self.cycles {
            write!(f, "\n\t{cycle:?}")?;
        }
        Ok(())
    }
}
