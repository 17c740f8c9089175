use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Block-compression formats a page can be stored in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TextureFormat {
    /// BC1, 4 bits per pixel, 1-bit alpha.
    Dxt1,
    /// BC3, 8 bits per pixel, interpolated alpha.
    Dxt5,
}

impl TextureFormat {
    /// Pixel-format code stored in the page header.
    pub fn pixel_format_code(self) -> u64 {
        match self {
            Self::Dxt1 => 7,
            Self::Dxt5 => 11,
        }
    }

    pub fn from_pixel_format_code(code: u64) -> Option<Self> {
        match code {
            7 => Some(Self::Dxt1),
            11 => Some(Self::Dxt5),
            _ => None,
        }
    }

    /// Bytes per 4x4 block.
    pub fn block_bytes(self) -> usize {
        match self {
            Self::Dxt1 => 8,
            Self::Dxt5 => 16,
        }
    }

    /// Selector understood by the external compressor.
    pub fn tool_name(self) -> &'static str {
        match self {
            Self::Dxt1 => "DXT1",
            Self::Dxt5 => "DXT5",
        }
    }
}

impl FromStr for TextureFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dxt1" | "bc1" => Ok(Self::Dxt1),
            "dxt5" | "bc3" => Ok(Self::Dxt5),
            _ => Err(()),
        }
    }
}

/// Shelf packer limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackerConfig {
    /// Maximum page width in pixels.
    pub max_width: u32,
    /// Maximum page height in pixels.
    pub max_height: u32,
}

impl Default for PackerConfig {
    fn default() -> Self {
        Self {
            max_width: 1024,
            max_height: 1024,
        }
    }
}

impl PackerConfig {
    pub fn builder() -> PackerConfigBuilder {
        PackerConfigBuilder::new()
    }

    /// Validates the configuration parameters.
    ///
    /// Returns an error if either page dimension is zero.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BamError;

        if self.max_width == 0 || self.max_height == 0 {
            return Err(BamError::InvalidConfig(format!(
                "page dimensions must be non-zero, got {}x{}",
                self.max_width, self.max_height
            )));
        }
        Ok(())
    }
}

/// Builder for `PackerConfig`.
#[derive(Debug, Default, Clone)]
pub struct PackerConfigBuilder {
    cfg: PackerConfig,
}

impl PackerConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: PackerConfig::default(),
        }
    }
    pub fn max_width(mut self, v: u32) -> Self {
        self.cfg.max_width = v;
        self
    }
    pub fn max_height(mut self, v: u32) -> Self {
        self.cfg.max_height = v;
        self
    }
    pub fn build(self) -> PackerConfig {
        self.cfg
    }
}

/// Location of the external block compressor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TexconvConfig {
    /// Explicit executable; falls back to `$BAM_PVRZ_TEXCONV`, then `texconv` on `PATH`.
    #[serde(default)]
    pub program: Option<PathBuf>,
}

impl TexconvConfig {
    pub fn resolve(&self) -> PathBuf {
        self.program
            .clone()
            .or_else(|| std::env::var_os(crate::compressor::TEXCONV_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("texconv"))
    }
}

/// How page files are named on disk: `<prefix><id / 1000><id % 1000 as 3 digits>.<extension>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageNaming {
    #[serde(default = "default_name_prefix")]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for PageNaming {
    fn default() -> Self {
        Self {
            prefix: default_name_prefix(),
            extension: default_extension(),
        }
    }
}

impl PageNaming {
    /// File name for a global page id, e.g. `17003` -> `MOS17003.pvrz`, `3` -> `MOS0003.pvrz`.
    pub fn file_name(&self, global_id: u32) -> String {
        format!(
            "{}{}{:03}.{}",
            self.prefix,
            global_id / 1000,
            global_id % 1000,
            self.extension
        )
    }

    /// Global page id encoded in a file name of this naming, if any.
    /// The extension is compared case-insensitively: `MOS2001.PVRZ` -> 2001.
    pub fn parse_file_name(&self, name: &str) -> Option<u32> {
        let (stem, ext) = name.rsplit_once('.')?;
        if !ext.eq_ignore_ascii_case(&self.extension) {
            return None;
        }
        let digits = stem.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

fn default_name_prefix() -> String {
    "MOS".into()
}
fn default_extension() -> String {
    "pvrz".into()
}
fn default_format() -> TextureFormat {
    TextureFormat::Dxt5
}

/// Options for writing a container and its pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Numeric namespace of the written pages (`global_id = page_prefix * 1000 + local`).
    pub page_prefix: u32,
    #[serde(default = "default_format")]
    pub format: TextureFormat,
    #[serde(default)]
    pub packer: PackerConfig,
    #[serde(default)]
    pub naming: PageNaming,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            page_prefix: 0,
            format: default_format(),
            packer: PackerConfig::default(),
            naming: PageNaming::default(),
        }
    }
}

impl WriteOptions {
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::BamError;

        self.packer.validate()?;
        if self.page_prefix > (u32::MAX - 999) / 1000 {
            return Err(BamError::InvalidConfig(format!(
                "page_prefix {} overflows 32-bit page ids",
                self.page_prefix
            )));
        }
        Ok(())
    }

    /// Create a fluent builder for `WriteOptions`.
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::new()
    }
}

/// Builder for `WriteOptions` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct WriteOptionsBuilder {
    opts: WriteOptions,
}

impl WriteOptionsBuilder {
    pub fn new() -> Self {
        Self {
            opts: WriteOptions::default(),
        }
    }
    pub fn page_prefix(mut self, v: u32) -> Self {
        self.opts.page_prefix = v;
        self
    }
    pub fn format(mut self, v: TextureFormat) -> Self {
        self.opts.format = v;
        self
    }
    pub fn with_max_dimensions(mut self, w: u32, h: u32) -> Self {
        self.opts.packer.max_width = w;
        self.opts.packer.max_height = h;
        self
    }
    pub fn naming(mut self, v: PageNaming) -> Self {
        self.opts.naming = v;
        self
    }
    pub fn build(self) -> WriteOptions {
        self.opts
    }
}
