//! PVRZ page codec: a PVR v3 header plus a BC1/BC3 payload, usually zlib-wrapped
//! behind a 4-byte uncompressed-size prefix.

use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use image::RgbaImage;
use std::borrow::Cow;
use std::io::{Read, Write};
use tracing::{debug, instrument, warn};

use crate::bytes::{read_u32, read_u64};
use crate::compressor::BlockCompressor;
use crate::config::TextureFormat;
use crate::error::{BamError, Result};

pub mod block;

pub use block::decode_blocks;

/// "PVR" followed by version 3, read as a little-endian u32.
pub const PVR_MAGIC: u32 = 0x0352_5650;
/// Size of the fixed header preceding the metadata block.
pub const PVR_HEADER_SIZE: usize = 0x34;

// Sanity cap on the size prefix used to pre-size the inflate buffer.
const MAX_PREALLOC: usize = 64 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvrFlags {
    None,
    PreMultiplied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

/// Decoded fields of the fixed 52-byte page header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PvrHeader {
    pub flags: PvrFlags,
    pub format: TextureFormat,
    pub color_space: ColorSpace,
    pub channel_type: u32,
    pub height: u32,
    pub width: u32,
    pub depth: u32,
    pub surfaces: u32,
    pub faces: u32,
    pub mip_maps: u32,
    pub metadata_size: u32,
}

impl PvrHeader {
    /// Header for a single-surface, single-mip page without metadata.
    pub fn new(width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            flags: PvrFlags::None,
            format,
            color_space: ColorSpace::Linear,
            channel_type: 0,
            height,
            width,
            depth: 1,
            surfaces: 1,
            faces: 1,
            mip_maps: 1,
            metadata_size: 0,
        }
    }

    /// Parses and validates the header at the start of an inflated page buffer.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() <= PVR_HEADER_SIZE {
            return Err(BamError::TruncatedInput {
                field: "PVR header",
                offset: 0,
                needed: PVR_HEADER_SIZE + 1,
                len: buf.len(),
            });
        }
        let magic = read_u32(buf, 0, "PVR magic")?;
        if magic != PVR_MAGIC {
            return Err(BamError::BadSignature {
                expected: "PVR\\x03",
                found: String::from_utf8_lossy(&magic.to_le_bytes()).into_owned(),
            });
        }

        let flags = match read_u32(buf, 4, "flags")? {
            0 => PvrFlags::None,
            1 => PvrFlags::PreMultiplied,
            other => {
                return Err(BamError::UnsupportedFormat {
                    field: "PVR flags",
                    value: other as u64,
                });
            }
        };

        // high 32 bits set means a custom channel layout, which is never BC1/BC3
        let pixel_format = read_u64(buf, 8, "pixel format")?;
        let format = TextureFormat::from_pixel_format_code(pixel_format).ok_or(
            BamError::UnsupportedFormat {
                field: "pixel format (only DXT1=7 and DXT5=11)",
                value: pixel_format,
            },
        )?;

        let color_space = match read_u32(buf, 16, "color space")? {
            0 => ColorSpace::Linear,
            1 => ColorSpace::Srgb,
            other => {
                return Err(BamError::UnsupportedFormat {
                    field: "color space",
                    value: other as u64,
                });
            }
        };

        let channel_type = read_u32(buf, 20, "channel type")?;
        if channel_type != 0 {
            return Err(BamError::UnsupportedFormat {
                field: "channel type (only UBYTE_NORM=0)",
                value: channel_type as u64,
            });
        }

        let header = Self {
            flags,
            format,
            color_space,
            channel_type,
            height: read_u32(buf, 24, "height")?,
            width: read_u32(buf, 28, "width")?,
            depth: read_u32(buf, 32, "depth")?,
            surfaces: read_u32(buf, 36, "surface count")?,
            faces: read_u32(buf, 40, "face count")?,
            mip_maps: read_u32(buf, 44, "mip-map count")?,
            metadata_size: read_u32(buf, 48, "metadata size")?,
        };

        if header.metadata_size > 0 && header.payload_offset() > buf.len() {
            return Err(BamError::TruncatedInput {
                field: "PVR metadata",
                offset: PVR_HEADER_SIZE,
                needed: header.metadata_size as usize,
                len: buf.len(),
            });
        }
        Ok(header)
    }

    /// Offset of the compressed payload (after header and metadata).
    pub fn payload_offset(&self) -> usize {
        PVR_HEADER_SIZE.saturating_add(self.metadata_size as usize)
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&PVR_MAGIC.to_le_bytes());
        let flags: u32 = match self.flags {
            PvrFlags::None => 0,
            PvrFlags::PreMultiplied => 1,
        };
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&self.format.pixel_format_code().to_le_bytes());
        let color_space: u32 = match self.color_space {
            ColorSpace::Linear => 0,
            ColorSpace::Srgb => 1,
        };
        out.extend_from_slice(&color_space.to_le_bytes());
        for v in [
            self.channel_type,
            self.height,
            self.width,
            self.depth,
            self.surfaces,
            self.faces,
            self.mip_maps,
            self.metadata_size,
        ] {
            out.extend_from_slice(&v.to_le_bytes());
        }
    }
}

/// A decoded page: its header and RGBA pixels.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    pub header: PvrHeader,
    pub image: RgbaImage,
}

/// Returns the raw PVR buffer, inflating it first unless it already starts with the magic.
pub fn inflate(bytes: &[u8]) -> Result<Cow<'_, [u8]>> {
    if bytes.len() >= 4 && read_u32(bytes, 0, "PVR magic")? == PVR_MAGIC {
        return Ok(Cow::Borrowed(bytes));
    }
    let declared = read_u32(bytes, 0, "uncompressed size")? as usize;
    let mut out = Vec::with_capacity(declared.min(MAX_PREALLOC));
    ZlibDecoder::new(&bytes[4..])
        .read_to_end(&mut out)
        .map_err(|e| BamError::Codec(format!("zlib inflate failed: {e}")))?;
    if out.len() != declared {
        warn!(
            declared,
            actual = out.len(),
            "page size prefix does not match inflated size"
        );
    }
    Ok(Cow::Owned(out))
}

#[instrument(skip_all, fields(len = bytes.len()))]
/// Decodes a page file (zlib-wrapped or bare) into RGBA pixels.
pub fn decode_page(bytes: &[u8]) -> Result<DecodedPage> {
    let buf = inflate(bytes)?;
    let header = PvrHeader::parse(&buf)?;
    let payload = &buf[header.payload_offset()..];
    let image = decode_blocks(payload, header.width, header.height, header.format)?;
    debug!(
        width = header.width,
        height = header.height,
        format = ?header.format,
        "page decoded"
    );
    Ok(DecodedPage { header, image })
}

/// Prepends a page header to `payload`, zlib-compresses the result and
/// prefixes the uncompressed length.
pub fn wrap_payload(width: u32, height: u32, format: TextureFormat, payload: &[u8]) -> Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(PVR_HEADER_SIZE + payload.len());
    PvrHeader::new(width, height, format).write(&mut raw);
    raw.extend_from_slice(payload);

    let raw_len = u32::try_from(raw.len()).map_err(|_| {
        BamError::InvalidInput(format!("page of {} bytes exceeds 4 GiB", raw.len()))
    })?;
    let mut out = raw_len.to_le_bytes().to_vec();
    let mut enc = ZlibEncoder::new(&mut out, Compression::default());
    enc.write_all(&raw)?;
    enc.finish()?;
    Ok(out)
}

#[instrument(skip_all, fields(width = image.width(), height = image.height(), ?format))]
/// Block-compresses `image` through `compressor` and wraps it as a page file.
pub fn encode_page(
    image: &RgbaImage,
    format: TextureFormat,
    compressor: &dyn BlockCompressor,
) -> Result<Vec<u8>> {
    let payload = compressor.compress(image, format)?;
    wrap_payload(image.width(), image.height(), format, &payload)
}
