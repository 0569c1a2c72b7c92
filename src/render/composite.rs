//! Premultiplied RGBA8 pixel operators and whole-buffer filters.

use crate::foundation::core::BlendMode;
use crate::foundation::error::{StageError, StageResult};

// Keeps the tap count within Q16 so every weight stays non-zero.
const MAX_BLUR_RADIUS: u32 = (1 << 15) - 1;

/// One premultiplied pixel in memory order.
pub type PremulRgba8 = [u8; 4];

/// Composite `src` onto `dst` with `mode`, scaling the source by `opacity`.
pub fn blend(mode: BlendMode, dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    match mode {
        BlendMode::Normal => over(dst, src, opacity),
        BlendMode::Add => add(dst, src, opacity),
        BlendMode::Erase => erase(dst, src, opacity),
        BlendMode::Multiply => multiply(dst, src, opacity),
    }
}

fn scaled_source(src: PremulRgba8, opacity: f32) -> Option<(PremulRgba8, u8)> {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return None;
    }
    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let s = src.map(|c| mul_div255(u16::from(c), op));
    if s[3] == 0 { None } else { Some((s, s[3])) }
}

/// Source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let Some((s, sa)) = scaled_source(src, opacity) else {
        return dst;
    };
    let inv = 255u16 - u16::from(sa);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(s[i], mul_div255(u16::from(dst[i]), inv));
    }
    out
}

/// Saturating addition.
pub fn add(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let Some((s, _)) = scaled_source(src, opacity) else {
        return dst;
    };
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = add_sat_u8(dst[i], s[i]);
    }
    out
}

/// Destination-out: source coverage removes destination.
pub fn erase(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let Some((_, sa)) = scaled_source(src, opacity) else {
        return dst;
    };
    let inv = 255u16 - u16::from(sa);
    dst.map(|c| mul_div255(u16::from(c), inv))
}

/// Multiply: `s*d + s*(1-da) + d*(1-sa)` per color channel, source-over alpha.
pub fn multiply(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let Some((s, sa)) = scaled_source(src, opacity) else {
        return dst;
    };
    let da = dst[3];
    let inv_sa = 255u16 - u16::from(sa);
    let inv_da = 255u16 - u16::from(da);
    let mut out = [0u8; 4];
    for i in 0..3 {
        let sd = mul_div255(u16::from(s[i]), u16::from(dst[i]));
        let s_only = mul_div255(u16::from(s[i]), inv_da);
        let d_only = mul_div255(u16::from(dst[i]), inv_sa);
        out[i] = add_sat_u8(add_sat_u8(sd, s_only), d_only);
    }
    out[3] = add_sat_u8(sa, mul_div255(u16::from(da), inv_sa));
    out
}

/// Scale every channel by `coverage / 255` (destination-in with a coverage value).
pub fn dst_in(px: PremulRgba8, coverage: u8) -> PremulRgba8 {
    px.map(|c| mul_div255(u16::from(c), u16::from(coverage)))
}

/// Separable box blur of a premultiplied buffer, in place. Radii are in pixels and are capped at
/// the buffer size along their axis.
pub fn box_blur_in_place(
    data: &mut [u8],
    width: u32,
    height: u32,
    radius_x: u32,
    radius_y: u32,
) -> StageResult<()> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(4))
        .ok_or_else(|| StageError::validation("blur buffer size overflow"))?;
    if data.len() != expected_len {
        return Err(StageError::validation(
            "box_blur_in_place expects data matching width*height*4",
        ));
    }
    let radius_x = radius_x.min(width);
    let radius_y = radius_y.min(height);
    if width == 0 || height == 0 || (radius_x == 0 && radius_y == 0) {
        return Ok(());
    }

    let mut tmp = vec![0u8; expected_len];
    if radius_x > 0 {
        horizontal_pass(data, &mut tmp, width, height, &box_kernel_q16(radius_x));
        data.copy_from_slice(&tmp);
    }
    if radius_y > 0 {
        vertical_pass(data, &mut tmp, width, height, &box_kernel_q16(radius_y));
        data.copy_from_slice(&tmp);
    }
    Ok(())
}

// Equal Q16 weights; the rounding remainder goes to the center tap so the sum is exactly 1.0.
fn box_kernel_q16(radius: u32) -> Vec<u32> {
    let radius = radius.min(MAX_BLUR_RADIUS);
    let taps = 2 * radius + 1;
    let w = (1u32 << 16) / taps;
    let mut k = vec![w; taps as usize];
    k[radius as usize] += (1u32 << 16) - w * taps;
    k
}

fn horizontal_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    for y in 0..height as i32 {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sx = (x + ki as i32 - radius).clamp(0, w - 1);
                let idx = ((y * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn vertical_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, k: &[u32]) {
    let radius = (k.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in k.iter().enumerate() {
                let sy = (y + ki as i32 - radius).clamp(0, h - 1);
                let idx = ((sy * w + x) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + (1 << 15)) >> 16).min(255) as u8
}

/// Apply a 4x5 color matrix (straight RGBA in `[0, 255]`, offsets in column 5) in place.
pub fn color_matrix_in_place(data: &mut [u8], m: &[f32; 20]) {
    for px in data.chunks_exact_mut(4) {
        let a = px[3];
        if a == 0 && m[19] <= 0.0 {
            continue;
        }
        let straight = unpremultiply([px[0], px[1], px[2], a]).map(f32::from);
        let mut out = [0u8; 4];
        for (row, o) in out.iter_mut().enumerate() {
            let r = &m[row * 5..row * 5 + 5];
            let v = r[0] * straight[0]
                + r[1] * straight[1]
                + r[2] * straight[2]
                + r[3] * straight[3]
                + r[4];
            *o = v.round().clamp(0.0, 255.0) as u8;
        }
        let p = premultiply(out);
        px.copy_from_slice(&p);
    }
}

/// Premultiplied to straight alpha.
pub fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = px[3];
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| ((u32::from(c) * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), a]
}

/// Straight to premultiplied alpha.
pub fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255(u16::from(px[0]), a),
        mul_div255(u16::from(px[1]), a),
        mul_div255(u16::from(px[2]), a),
        px[3],
    ]
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}

#[cfg(test)]
#[path = "../../tests/unit/render/composite.rs"]
mod tests;
