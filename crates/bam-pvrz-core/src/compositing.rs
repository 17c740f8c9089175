use image::RgbaImage;

/// Blit a sub-rectangle from `src` into `canvas` at destination (dx, dy).
///
/// - (sx, sy, sw, sh): source rectangle within `src`
/// - (dx, dy): destination top-left in `canvas`
///
/// Texels falling outside either image are skipped, so callers may pass
/// rectangles that overhang the source page or the destination frame.
#[allow(clippy::too_many_arguments)]
pub fn blit_rgba(
    src: &RgbaImage,
    canvas: &mut RgbaImage,
    dx: u32,
    dy: u32,
    sx: u32,
    sy: u32,
    sw: u32,
    sh: u32,
) {
    let (cw, ch) = canvas.dimensions();
    let (iw, ih) = src.dimensions();
    let w = sw
        .min(iw.saturating_sub(sx))
        .min(cw.saturating_sub(dx));
    let h = sh
        .min(ih.saturating_sub(sy))
        .min(ch.saturating_sub(dy));

    for yy in 0..h {
        for xx in 0..w {
            let px = *src.get_pixel(sx + xx, sy + yy);
            canvas.put_pixel(dx + xx, dy + yy, px);
        }
    }
}
