//! Block compressors turning an RGBA page into a raw BC1/BC3 payload.

use image::RgbaImage;
use std::borrow::Cow;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

use crate::config::{TexconvConfig, TextureFormat};
use crate::error::{BamError, Result};

/// Environment variable naming the external compressor executable.
pub const TEXCONV_ENV: &str = "BAM_PVRZ_TEXCONV";

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const DDS_HEADER_SIZE: usize = 128;
const DDS_FOURCC_OFFSET: usize = 0x54;
const DX10_HEADER_SIZE: usize = 20;

/// Converts an RGBA image into a raw block-compressed payload (no container header).
pub trait BlockCompressor {
    fn compress(&self, image: &RgbaImage, format: TextureFormat) -> Result<Vec<u8>>;
}

/// In-process BC1/BC3 encoder backed by the ISPC kernels of `intel_tex_2`.
///
/// BC1 output is always opaque; pages that need alpha should use BC3.
#[derive(Debug, Clone, Copy, Default)]
pub struct IspcCompressor;

impl BlockCompressor for IspcCompressor {
    fn compress(&self, image: &RgbaImage, format: TextureFormat) -> Result<Vec<u8>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let padded = pad_to_blocks(image);
        let surface = intel_tex_2::RgbaSurface {
            width: padded.width(),
            height: padded.height(),
            stride: padded.width() * 4,
            data: padded.as_raw(),
        };
        let blocks = match format {
            TextureFormat::Dxt1 => intel_tex_2::bc1::compress_blocks(&surface),
            TextureFormat::Dxt5 => intel_tex_2::bc3::compress_blocks(&surface),
        };
        debug!(
            width = image.width(),
            height = image.height(),
            bytes = blocks.len(),
            "blocks compressed"
        );
        Ok(blocks)
    }
}

/// Grows `image` to whole 4x4 blocks by repeating its last column and row.
fn pad_to_blocks(image: &RgbaImage) -> Cow<'_, RgbaImage> {
    let (w, h) = image.dimensions();
    let (pw, ph) = (w.next_multiple_of(4), h.next_multiple_of(4));
    if (pw, ph) == (w, h) {
        return Cow::Borrowed(image);
    }
    Cow::Owned(RgbaImage::from_fn(pw, ph, |x, y| {
        *image.get_pixel(x.min(w - 1), y.min(h - 1))
    }))
}

/// External `texconv`-style compressor.
///
/// The page is staged as PNG in a temporary directory, converted with
/// `<program> -f DXT1|DXT5 -o <dir> -y <png>`, and the DDS header of the
/// result is stripped. The directory is removed on every exit path.
#[derive(Debug, Clone)]
pub struct Texconv {
    pub program: PathBuf,
}

impl Default for Texconv {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Texconv {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Uses `$BAM_PVRZ_TEXCONV` when set, otherwise `texconv` from `PATH`.
    pub fn from_env() -> Self {
        Self::from_config(&TexconvConfig::default())
    }

    pub fn from_config(cfg: &TexconvConfig) -> Self {
        Self {
            program: cfg.resolve(),
        }
    }

    fn tool_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl BlockCompressor for Texconv {
    fn compress(&self, image: &RgbaImage, format: TextureFormat) -> Result<Vec<u8>> {
        let staging = tempfile::Builder::new().prefix("bam-pvrz-").tempdir()?;
        let png_path = staging.path().join("page.png");
        image.save(&png_path)?;

        debug!(tool = %self.tool_name(), format = format.tool_name(), "running external compressor");
        let output = Command::new(&self.program)
            .arg("-f")
            .arg(format.tool_name())
            .arg("-o")
            .arg(staging.path())
            .arg("-y")
            .arg(&png_path)
            .output()
            .map_err(|e| BamError::ExternalToolFailure {
                tool: self.tool_name(),
                status: "failed to start".into(),
                stderr: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(BamError::ExternalToolFailure {
                tool: self.tool_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let dds_path = staging.path().join("page.dds");
        let dds = std::fs::read(&dds_path).map_err(|e| {
            BamError::Codec(format!(
                "compressor produced no output at {}: {e}",
                dds_path.display()
            ))
        })?;
        strip_dds_header(&dds).map(<[u8]>::to_vec)
    }
}

/// Returns the block payload of a DDS file (skips the 128-byte header, plus the
/// DX10 extension when present).
pub fn strip_dds_header(dds: &[u8]) -> Result<&[u8]> {
    if dds.len() < DDS_HEADER_SIZE || &dds[..4] != DDS_MAGIC {
        return Err(BamError::Codec(format!(
            "compressor output is not a DDS file ({} bytes)",
            dds.len()
        )));
    }
    let start = if &dds[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4] == b"DX10" {
        DDS_HEADER_SIZE + DX10_HEADER_SIZE
    } else {
        DDS_HEADER_SIZE
    };
    dds.get(start..)
        .ok_or_else(|| BamError::Codec("DDS output truncated inside the DX10 header".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_legacy_dds_header() {
        let mut dds = vec![0u8; DDS_HEADER_SIZE];
        dds[..4].copy_from_slice(DDS_MAGIC);
        dds[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4].copy_from_slice(b"DXT5");
        dds.extend_from_slice(&[1, 2, 3]);
        assert_eq!(strip_dds_header(&dds).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn strips_dx10_extension() {
        let mut dds = vec![0u8; DDS_HEADER_SIZE + DX10_HEADER_SIZE];
        dds[..4].copy_from_slice(DDS_MAGIC);
        dds[DDS_FOURCC_OFFSET..DDS_FOURCC_OFFSET + 4].copy_from_slice(b"DX10");
        dds.push(9);
        assert_eq!(strip_dds_header(&dds).unwrap(), &[9]);
    }

    #[test]
    fn rejects_short_output() {
        assert!(matches!(
            strip_dds_header(b"DDS "),
            Err(BamError::Codec(_))
        ));
    }

    #[test]
    fn missing_tool_is_external_failure() {
        let tool = Texconv::new("/nonexistent/bam-pvrz-texconv");
        let img = RgbaImage::new(4, 4);
        match tool.compress(&img, TextureFormat::Dxt1) {
            Err(BamError::ExternalToolFailure { tool, .. }) => {
                assert!(tool.contains("bam-pvrz-texconv"));
            }
            other => panic!("expected ExternalToolFailure, got {other:?}"),
        }
    }

    #[test]
    fn odd_pages_are_padded_to_whole_blocks() {
        let mut img = RgbaImage::new(5, 2);
        img.put_pixel(4, 1, image::Rgba([9, 8, 7, 6]));
        let padded = pad_to_blocks(&img);
        assert_eq!(padded.dimensions(), (8, 4));
        assert_eq!(padded.get_pixel(7, 3).0, [9, 8, 7, 6]);
        assert!(matches!(pad_to_blocks(&RgbaImage::new(8, 4)), Cow::Borrowed(_)));
    }

    #[test]
    fn ispc_payload_has_one_block_per_4x4_tile() {
        let img = RgbaImage::from_pixel(6, 5, image::Rgba([0, 0, 255, 255]));
        for format in [TextureFormat::Dxt1, TextureFormat::Dxt5] {
            let payload = IspcCompressor.compress(&img, format).unwrap();
            assert_eq!(payload.len(), 2 * 2 * format.block_bytes());
        }
        assert!(IspcCompressor.compress(&RgbaImage::new(0, 3), TextureFormat::Dxt5).unwrap().is_empty());
    }

    /// Writes an executable shell script standing in for the external tool.
    /// It records its staging directory (`-o <dir>` is `$4`) in `record`.
    #[cfg(unix)]
    fn fake_tool(dir: &std::path::Path, record: &std::path::Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-texconv.sh");
        let text = format!("#!/bin/sh\nprintf '%s' \"$4\" > '{}'\n{body}\n", record.display());
        std::fs::write(&script, text).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_reports_status_and_stderr_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("staging.txt");
        let script = fake_tool(dir.path(), &record, "echo 'unsupported input' >&2\nexit 3");
        let img = RgbaImage::new(4, 4);
        match Texconv::new(&script).compress(&img, TextureFormat::Dxt5) {
            Err(BamError::ExternalToolFailure { status, stderr, .. }) => {
                assert!(status.contains('3'), "{status}");
                assert_eq!(stderr, "unsupported input");
            }
            other => panic!("expected ExternalToolFailure, got {other:?}"),
        }
        let staging = std::fs::read_to_string(&record).unwrap();
        assert!(!staging.is_empty());
        assert!(!std::path::Path::new(&staging).exists());
    }

    #[cfg(unix)]
    #[test]
    fn successful_tool_output_is_stripped_and_staging_removed() {
        let dir = tempfile::tempdir().unwrap();
        let record = dir.path().join("staging.txt");
        let body = "printf 'DDS ' > \"$4/page.dds\"\n\
                    head -c 124 /dev/zero >> \"$4/page.dds\"\n\
                    printf 'ABCDEFGH' >> \"$4/page.dds\"";
        let script = fake_tool(dir.path(), &record, body);
        let img = RgbaImage::new(4, 4);
        let payload = Texconv::new(&script).compress(&img, TextureFormat::Dxt1).unwrap();
        assert_eq!(payload, b"ABCDEFGH");
        let staging = std::fs::read_to_string(&record).unwrap();
        assert!(std::path::Path::new(&staging).is_absolute());
        assert!(!std::path::Path::new(&staging).exists());
    }
}
