//! Software render target.
//!
//! A [`RenderBuffer`] is premultiplied RGBA8 plus a canvas-style draw state stack. Geometry is
//! point-sampled at pixel centers without anti-aliasing.

use std::io::Cursor;

use kurbo::{Shape, Stroke, StrokeOpts};

use crate::foundation::core::{Affine, BezPath, BlendMode, Point, Rect, Rgba8Premul};
use crate::foundation::error::{StageError, StageResult};
use crate::render::composite::{self, PremulRgba8};

const STROKE_TOLERANCE: f64 = 0.1;

/// Borrowed premultiplied RGBA8 image.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` premultiplied bytes.
    pub pixels: &'a [u8],
}

impl ImageView<'_> {
    fn texel(&self, x: u32, y: u32) -> PremulRgba8 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Current transform, clip and compositing settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    /// Local-to-device transform.
    pub matrix: Affine,
    /// Device-space clip; `None` is the whole buffer.
    pub clip: Option<Rect>,
    /// Operator for subsequent draws.
    pub blend: BlendMode,
    /// Opacity multiplied into subsequent draws.
    pub alpha: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            matrix: Affine::IDENTITY,
            clip: None,
            blend: BlendMode::Normal,
            alpha: 1.0,
        }
    }
}

/// Offscreen or on-screen pixel buffer with a draw state stack.
#[derive(Clone, Debug, Default)]
pub struct RenderBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl RenderBuffer {
    /// Transparent buffer of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; byte_len(width, height)],
            state: DrawState::default(),
            stack: Vec::new(),
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Premultiplied bytes, row-major.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes currently allocated for pixels.
    pub fn allocated_bytes(&self) -> usize {
        self.data.capacity()
    }

    /// Borrow as an image.
    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            pixels: &self.data,
        }
    }

    /// Pixel at `(x, y)`; transparent outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> PremulRgba8 {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        self.view().texel(x, y)
    }

    /// Change the size. With `content_offset` the old pixels are kept, moved by the offset and
    /// cropped; without it the buffer is cleared. Either way the draw state is reset.
    pub fn resize(&mut self, width: u32, height: u32, content_offset: Option<(i32, i32)>) {
        self.state = DrawState::default();
        self.stack.clear();
        let Some((dx, dy)) = content_offset else {
            self.width = width;
            self.height = height;
            self.data.clear();
            self.data.resize(byte_len(width, height), 0);
            return;
        };
        let mut next = vec![0u8; byte_len(width, height)];
        for y in 0..self.height {
            let ty = i64::from(y) + i64::from(dy);
            if ty < 0 || ty >= i64::from(height) {
                continue;
            }
            for x in 0..self.width {
                let tx = i64::from(x) + i64::from(dx);
                if tx < 0 || tx >= i64::from(width) {
                    continue;
                }
                let src = (y as usize * self.width as usize + x as usize) * 4;
                let dst = (ty as usize * width as usize + tx as usize) * 4;
                next[dst..dst + 4].copy_from_slice(&self.data[src..src + 4]);
            }
        }
        self.width = width;
        self.height = height;
        self.data = next;
    }

    /// Set every pixel to transparent without touching the draw state.
    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Drop the pixel storage, leaving a 0x0 buffer.
    pub(crate) fn collapse(&mut self) {
        self.width = 0;
        self.height = 0;
        self.data = Vec::new();
        self.state = DrawState::default();
        self.stack.clear();
    }

    // -- Draw state --

    /// Push the draw state.
    pub fn save(&mut self) {
        self.stack.push(self.state);
    }

    /// Pop the draw state. Unbalanced calls are ignored.
    pub fn restore(&mut self) {
        if let Some(s) = self.stack.pop() {
            self.state = s;
        }
    }

    /// Current draw state.
    pub fn state(&self) -> &DrawState {
        &self.state
    }

    /// Current local-to-device transform.
    pub fn matrix(&self) -> Affine {
        self.state.matrix
    }

    /// Replace the transform.
    pub fn set_matrix(&mut self, m: Affine) {
        self.state.matrix = m;
    }

    /// Reset the transform to identity.
    pub fn reset_matrix(&mut self) {
        self.state.matrix = Affine::IDENTITY;
    }

    /// Pre-multiply the transform by a translation.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transform(Affine::translate((dx, dy)));
    }

    /// Pre-multiply the transform by `m` (applied to local coordinates first).
    pub fn transform(&mut self, m: Affine) {
        self.state.matrix *= m;
    }

    /// Operator for subsequent draws.
    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.state.blend = mode;
    }

    /// Opacity for subsequent draws.
    pub fn set_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Intersect the clip with `rect` in local coordinates. Rotated rects clip to their
    /// device-space bounding box.
    pub fn clip_rect(&mut self, rect: Rect) {
        let dev = self.state.matrix.transform_rect_bbox(rect);
        let clip = match self.state.clip {
            Some(c) => c.intersect(dev),
            None => dev,
        };
        self.state.clip = Some(clip);
    }

    // -- Drawing --

    // Pixel range whose centers fall inside `dev` and the clip.
    fn span(&self, dev: Rect) -> Option<(u32, u32, u32, u32)> {
        let mut r = dev.intersect(Rect::new(
            0.0,
            0.0,
            f64::from(self.width),
            f64::from(self.height),
        ));
        if let Some(c) = self.state.clip {
            r = r.intersect(c);
        }
        if !(r.width() > 0.0 && r.height() > 0.0) {
            return None;
        }
        let x0 = (r.x0 - 0.5).ceil().max(0.0) as u32;
        let y0 = (r.y0 - 0.5).ceil().max(0.0) as u32;
        let x1 = ((r.x1 - 0.5).ceil().max(0.0) as u32).min(self.width);
        let y1 = ((r.y1 - 0.5).ceil().max(0.0) as u32).min(self.height);
        (x0 < x1 && y0 < y1).then_some((x0, y0, x1, y1))
    }

    fn inverse(&self) -> Option<Affine> {
        let m = self.state.matrix;
        (m.determinant().abs() > f64::EPSILON).then(|| m.inverse())
    }

    fn put(&mut self, x: u32, y: u32, src: PremulRgba8, opacity: f32) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let dst = [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ];
        let out = composite::blend(self.state.blend, dst, src, opacity * self.state.alpha);
        self.data[i..i + 4].copy_from_slice(&out);
    }

    /// Zero the pixels covered by `rect` (local coordinates), honoring the clip.
    pub fn clear_rect(&mut self, rect: Rect) {
        let dev = self.state.matrix.transform_rect_bbox(rect);
        let Some((x0, y0, x1, y1)) = self.span(dev) else {
            return;
        };
        for y in y0..y1 {
            let row = y as usize * self.width as usize;
            self.data[(row + x0 as usize) * 4..(row + x1 as usize) * 4].fill(0);
        }
    }

    /// Fill `path` (nonzero winding, local coordinates) with `color`.
    pub fn fill_path(&mut self, path: &BezPath, color: Rgba8Premul) {
        let Some(inv) = self.inverse() else {
            return;
        };
        let dev = self.state.matrix.transform_rect_bbox(path.bounding_box());
        let Some((x0, y0, x1, y1)) = self.span(dev) else {
            return;
        };
        let src = color.to_array();
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if path.contains(p) {
                    self.put(x, y, src, 1.0);
                }
            }
        }
    }

    /// Fill `rect` (local coordinates) with `color`.
    pub fn fill_rect(&mut self, rect: Rect, color: Rgba8Premul) {
        self.fill_path(&rect.to_path(STROKE_TOLERANCE), color);
    }

    /// Stroke `path` with a line of `width` local units.
    pub fn stroke_path(&mut self, path: &BezPath, width: f64, color: Rgba8Premul) {
        if width <= 0.0 {
            return;
        }
        let outline = kurbo::stroke(
            path.iter(),
            &Stroke::new(width),
            &StrokeOpts::default(),
            STROKE_TOLERANCE,
        );
        self.fill_path(&outline, color);
    }

    /// Draw the `src` region of `image` into the `dst` rect (local coordinates).
    ///
    /// `smoothing` selects bilinear sampling; otherwise nearest. Samples never read outside
    /// `src`, so adjacent regions of one image do not bleed into each other.
    pub fn draw_image(&mut self, image: ImageView<'_>, src: Rect, dst: Rect, smoothing: bool) {
        let src = src.intersect(image.bounds());
        if src.width() <= 0.0 || src.height() <= 0.0 || dst.width() <= 0.0 || dst.height() <= 0.0
        {
            return;
        }
        let Some(inv) = self.inverse() else {
            return;
        };
        let dev = self.state.matrix.transform_rect_bbox(dst);
        let Some((x0, y0, x1, y1)) = self.span(dev) else {
            return;
        };
        let sx = src.width() / dst.width();
        let sy = src.height() / dst.height();
        for y in y0..y1 {
            for x in x0..x1 {
                let p = inv * Point::new(f64::from(x) + 0.5, f64::from(y) + 0.5);
                if !dst.contains(p) {
                    continue;
                }
                let u = src.x0 + (p.x - dst.x0) * sx;
                let v = src.y0 + (p.y - dst.y0) * sy;
                let texel = if smoothing {
                    sample_bilinear(&image, src, u, v)
                } else {
                    sample_nearest(&image, src, u, v)
                };
                self.put(x, y, texel, 1.0);
            }
        }
    }

    /// Draw another buffer with its top-left corner at `(dx, dy)` in local coordinates.
    pub fn draw_buffer(&mut self, other: &RenderBuffer, dx: f64, dy: f64) {
        let view = other.view();
        let dst = Rect::new(
            dx,
            dy,
            dx + f64::from(other.width),
            dy + f64::from(other.height),
        );
        self.draw_image(view, view.bounds(), dst, false);
    }

    /// Multiply every pixel by the alpha of the matching `mask` pixel. Pixels outside the
    /// mask become transparent.
    pub fn apply_mask(&mut self, mask: &RenderBuffer) {
        for y in 0..self.height {
            for x in 0..self.width {
                let i = (y as usize * self.width as usize + x as usize) * 4;
                let cov = mask.pixel(x, y)[3];
                let px = [
                    self.data[i],
                    self.data[i + 1],
                    self.data[i + 2],
                    self.data[i + 3],
                ];
                self.data[i..i + 4].copy_from_slice(&composite::dst_in(px, cov));
            }
        }
    }

    /// Copy of the pixels in `rect` (device pixels), premultiplied. Out-of-range pixels are
    /// transparent.
    pub fn get_pixels(&self, x: u32, y: u32, width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(byte_len(width, height));
        for yy in y..y.saturating_add(height) {
            for xx in x..x.saturating_add(width) {
                out.extend_from_slice(&self.pixel(xx, yy));
            }
        }
        out
    }

    /// Straight-alpha copy of the whole buffer.
    pub fn to_straight_rgba(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|p| composite::unpremultiply([p[0], p[1], p[2], p[3]]))
            .collect()
    }

    /// Encode as PNG.
    pub fn to_png(&self) -> StageResult<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(StageError::surface("cannot encode an empty buffer"));
        }
        let img = image::RgbaImage::from_raw(self.width, self.height, self.to_straight_rgba())
            .ok_or_else(|| StageError::surface("pixel buffer does not match its size"))?;
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .map_err(|e| StageError::surface(format!("png encode: {e}")))?;
        Ok(out)
    }

    /// PNG as a `data:` URL.
    pub fn to_data_url(&self) -> StageResult<String> {
        use base64::Engine as _;
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

fn byte_len(width: u32, height: u32) -> usize {
    (width as usize) * (height as usize) * 4
}

// Texel index range covered by `src`, inclusive.
fn texel_range(src: Rect) -> (i64, i64, i64, i64) {
    let x0 = src.x0.floor() as i64;
    let y0 = src.y0.floor() as i64;
    let x1 = ((src.x1.ceil() as i64) - 1).max(x0);
    let y1 = ((src.y1.ceil() as i64) - 1).max(y0);
    (x0, y0, x1, y1)
}

fn sample_nearest(image: &ImageView<'_>, src: Rect, u: f64, v: f64) -> PremulRgba8 {
    let (x0, y0, x1, y1) = texel_range(src);
    let x = (u.floor() as i64).clamp(x0, x1);
    let y = (v.floor() as i64).clamp(y0, y1);
    image.texel(x as u32, y as u32)
}

fn sample_bilinear(image: &ImageView<'_>, src: Rect, u: f64, v: f64) -> PremulRgba8 {
    let (x0, y0, x1, y1) = texel_range(src);
    let fx = u - 0.5;
    let fy = v - 0.5;
    let bx = fx.floor();
    let by = fy.floor();
    let tx = fx - bx;
    let ty = fy - by;
    let xa = (bx as i64).clamp(x0, x1) as u32;
    let xb = (bx as i64 + 1).clamp(x0, x1) as u32;
    let ya = (by as i64).clamp(y0, y1) as u32;
    let yb = (by as i64 + 1).clamp(y0, y1) as u32;
    let (p00, p10, p01, p11) = (
        image.texel(xa, ya),
        image.texel(xb, ya),
        image.texel(xa, yb),
        image.texel(xb, yb),
    );
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = f64::from(p00[c]) * (1.0 - tx) + f64::from(p10[c]) * tx;
        let bottom = f64::from(p01[c]) * (1.0 - tx) + f64::from(p11[c]) * tx;
        out[c] = (top * (1.0 - ty) + bottom * ty).round().clamp(0.0, 255.0) as u8;
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
