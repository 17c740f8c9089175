//! BC1 (DXT1) and BC3 (DXT5) block decoders.
//!
//! Decoding only, following the DX9 "ideal" interpolation. Encoding goes
//! through [`crate::compressor::BlockCompressor`].

use image::RgbaImage;

use crate::config::TextureFormat;
use crate::error::{BamError, Result};

type Texel = [u8; 4];

#[inline]
fn expand_565(c: u16) -> [u8; 3] {
    let r = ((c >> 11) & 0x1F) as u8;
    let g = ((c >> 5) & 0x3F) as u8;
    let b = (c & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

/// Colour palette of a BC1/BC3 colour block. `four_colour` is forced for BC3.
fn colour_palette(c0: u16, c1: u16, four_colour: bool) -> [Texel; 4] {
    let [r0, g0, b0] = expand_565(c0);
    let [r1, g1, b1] = expand_565(c1);
    let mix = |a: u8, b: u8, wa: u32, wb: u32| ((wa * a as u32 + wb * b as u32) / (wa + wb)) as u8;
    let mut dict = [[0u8; 4]; 4];
    dict[0] = [r0, g0, b0, 255];
    dict[1] = [r1, g1, b1, 255];
    if four_colour || c0 > c1 {
        dict[2] = [mix(r0, r1, 2, 1), mix(g0, g1, 2, 1), mix(b0, b1, 2, 1), 255];
        dict[3] = [mix(r0, r1, 1, 2), mix(g0, g1, 1, 2), mix(b0, b1, 1, 2), 255];
    } else {
        dict[2] = [mix(r0, r1, 1, 1), mix(g0, g1, 1, 1), mix(b0, b1, 1, 1), 255];
        // transparent black
        dict[3] = [0, 0, 0, 0];
    }
    dict
}

fn alpha_palette(a0: u8, a1: u8) -> [u8; 8] {
    let (a0w, a1w) = (a0 as u16, a1 as u16);
    let mut values = [0u8; 8];
    values[0] = a0;
    values[1] = a1;
    if a0 > a1 {
        for i in 1..7u16 {
            values[i as usize + 1] = (((7 - i) * a0w + i * a1w) / 7) as u8;
        }
    } else {
        for i in 1..5u16 {
            values[i as usize + 1] = (((5 - i) * a0w + i * a1w) / 5) as u8;
        }
        values[6] = 0;
        values[7] = 255;
    }
    values
}

/// Decodes one 8-byte colour block into 16 texels (row-major).
fn decode_colour_block(src: &[u8], four_colour: bool, out: &mut [Texel; 16]) {
    let c0 = u16::from_le_bytes([src[0], src[1]]);
    let c1 = u16::from_le_bytes([src[2], src[3]]);
    let idx = u32::from_le_bytes([src[4], src[5], src[6], src[7]]);
    let dict = colour_palette(c0, c1, four_colour);
    for (i, texel) in out.iter_mut().enumerate() {
        *texel = dict[((idx >> (2 * i)) & 0x3) as usize];
    }
}

fn decode_alpha_block(src: &[u8], out: &mut [Texel; 16]) {
    let values = alpha_palette(src[0], src[1]);
    let mut bits = [0u8; 8];
    bits[..6].copy_from_slice(&src[2..8]);
    let bits = u64::from_le_bytes(bits);
    for (i, texel) in out.iter_mut().enumerate() {
        texel[3] = values[((bits >> (3 * i)) & 0x7) as usize];
    }
}

/// Decodes a BC1/BC3 payload into an RGBA image of `width` x `height`.
///
/// Partial edge blocks are clipped. Extra trailing bytes are ignored; a payload
/// shorter than `ceil(w/4) * ceil(h/4)` blocks is a codec error.
pub fn decode_blocks(
    data: &[u8],
    width: u32,
    height: u32,
    format: TextureFormat,
) -> Result<RgbaImage> {
    let bw = width.div_ceil(4) as usize;
    let bh = height.div_ceil(4) as usize;
    let block_bytes = format.block_bytes();
    let needed = bw
        .checked_mul(bh)
        .and_then(|blocks| blocks.checked_mul(block_bytes))
        .ok_or_else(|| {
            BamError::Codec(format!(
                "{format:?} payload for {width}x{height} overflows the address space"
            ))
        })?;
    if data.len() < needed {
        return Err(BamError::Codec(format!(
            "{format:?} payload for {width}x{height} needs {needed} bytes, got {}",
            data.len()
        )));
    }

    let mut img = RgbaImage::new(width, height);
    let mut texels = [[0u8; 4]; 16];
    for by in 0..bh {
        for bx in 0..bw {
            let block = &data[(by * bw + bx) * block_bytes..][..block_bytes];
            match format {
                TextureFormat::Dxt1 => decode_colour_block(block, false, &mut texels),
                TextureFormat::Dxt5 => {
                    decode_colour_block(&block[8..], true, &mut texels);
                    decode_alpha_block(&block[..8], &mut texels);
                }
            }
            for (i, texel) in texels.iter().enumerate() {
                let x = (bx * 4 + i % 4) as u32;
                let y = (by * 4 + i / 4) as u32;
                if x < width && y < height {
                    img.put_pixel(x, y, image::Rgba(*texel));
                }
            }
        }
    }
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn decode_bc1_solid_red_block() {
        let block = [
            0x00, 0xF8, // c0 = R:31 G:0 B:0
            0x00, 0xF8, // c1 identical
            0x00, 0x00, 0x00, 0x00, // all texels use index 0
        ];
        let img = decode_blocks(&block, 4, 4, TextureFormat::Dxt1).expect("decode");
        for px in img.pixels() {
            assert_eq!(*px, Rgba([255, 0, 0, 255]));
        }
    }

    #[test]
    fn decode_bc1_three_colour_mode_has_transparent_index() {
        // c0 < c1 selects 3-colour mode; index 3 everywhere is transparent black
        let block = [0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        let img = decode_blocks(&block, 4, 4, TextureFormat::Dxt1).expect("decode");
        assert!(img.pixels().all(|p| p.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn decode_bc3_alpha_endpoints() {
        let mut block = [0u8; 16];
        block[0] = 200; // a0
        block[1] = 10; // a1
        // texel 0 -> index 1 (a1), the rest index 0 (a0)
        block[2] = 0b001;
        block[8..10].copy_from_slice(&0xFFFFu16.to_le_bytes());
        block[10..12].copy_from_slice(&0xFFFFu16.to_le_bytes());
        let img = decode_blocks(&block, 4, 4, TextureFormat::Dxt5).expect("decode");
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 10]);
        assert_eq!(img.get_pixel(1, 0).0, [255, 255, 255, 200]);
    }

    #[test]
    fn short_payload_is_codec_error() {
        let err = decode_blocks(&[0u8; 8], 8, 4, TextureFormat::Dxt1).unwrap_err();
        assert!(matches!(err, BamError::Codec(_)));
    }

    #[test]
    fn partial_edge_blocks_are_clipped() {
        let img = decode_blocks(&[0u8; 4 * 16], 5, 6, TextureFormat::Dxt5).expect("decode");
        assert_eq!(img.dimensions(), (5, 6));
    }
}
