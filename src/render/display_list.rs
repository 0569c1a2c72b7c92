//! Draw pass over the backend render tree.
//!
//! Children draw back to front. Transforms concatenate and alpha multiplies down the tree. A node
//! with filters, a mask, a non-normal blend mode or cache-as-bitmap renders its subtree into an
//! offscreen buffer the size of the target first, using the same device transform, then
//! composites it.

use kurbo::{Circle, Ellipse, Shape};
use smallvec::SmallVec;

use crate::foundation::core::{Affine, BezPath, BlendMode, Rect, Rgba8Premul, Vec2};
use crate::foundation::ids::HandleId;
use crate::render::composite;
use crate::render::registry::NodeRegistry;
use crate::render::surface::RenderBuffer;
use crate::render::surface_pool::SurfacePool;
use crate::render::texture::TextureStore;
use crate::scene::props::{
    BitmapProps, FillMode, Filter, GraphicsCommand, NodeContent, TextFieldProps,
};

const MAX_DEPTH: u32 = 256;
const PATH_TOLERANCE: f64 = 0.1;

/// Shared state for one draw pass.
pub(crate) struct DrawCtx<'a> {
    pub(crate) registry: &'a mut NodeRegistry,
    pub(crate) textures: &'a TextureStore,
    pub(crate) pool: &'a mut SurfacePool,
    /// Clear dirty flags of drawn nodes. Off for draws that do not reach a stage.
    pub(crate) settle: bool,
}

impl DrawCtx<'_> {
    /// Draw `handle` and its subtree into `target` under the target's current state.
    pub(crate) fn draw_node(&mut self, target: &mut RenderBuffer, handle: HandleId) {
        self.draw_at_depth(target, handle, 0);
    }

    /// Draw only the children of `handle`.
    pub(crate) fn draw_children(&mut self, target: &mut RenderBuffer, handle: HandleId) {
        let children: SmallVec<[HandleId; 8]> = match self.registry.get(handle) {
            Some(n) => n.children.clone(),
            None => return,
        };
        for c in children {
            self.draw_at_depth(target, c, 1);
        }
        self.settle_node(handle);
    }

    fn settle_node(&mut self, handle: HandleId) {
        if self.settle
            && let Some(n) = self.registry.get_mut(handle)
        {
            n.dirty = false;
        }
    }

    fn draw_at_depth(&mut self, target: &mut RenderBuffer, handle: HandleId, depth: u32) {
        if depth > MAX_DEPTH {
            tracing::warn!(?handle, "render tree too deep or cyclic, subtree skipped");
            return;
        }
        let Some(node) = self.registry.get(handle) else {
            return;
        };
        let props = &node.props;
        if !props.visible || props.alpha <= 0.0 {
            return;
        }
        let offscreen = node.mask.is_some()
            || !props.filters.is_empty()
            || props.cache_as_bitmap
            || props.blend_mode != BlendMode::Normal;

        target.save();
        target.transform(props.matrix);
        if let Some(r) = props.mask_rect {
            target.clip_rect(r);
        }
        if offscreen {
            self.draw_offscreen(target, handle, depth);
        } else {
            let alpha = target.state().alpha * props.alpha;
            target.set_alpha(alpha);
            self.draw_body(target, handle, depth);
        }
        target.restore();
        self.settle_node(handle);
    }

    // Scroll rect, own content, then children.
    fn draw_body(&mut self, target: &mut RenderBuffer, handle: HandleId, depth: u32) {
        let Some(node) = self.registry.get(handle) else {
            return;
        };
        if let Some(sr) = node.props.scroll_rect {
            target.clip_rect(Rect::new(0.0, 0.0, sr.width(), sr.height()));
            target.translate(-sr.x0, -sr.y0);
        }
        draw_content(target, &node.payload, self.textures);
        let children = node.children.clone();
        for c in children {
            self.draw_at_depth(target, c, depth + 1);
        }
    }

    fn draw_offscreen(&mut self, target: &mut RenderBuffer, handle: HandleId, depth: u32) {
        let device = target.matrix();
        let (w, h) = target.size();
        let Some(node) = self.registry.get_mut(handle) else {
            return;
        };
        let alpha = node.props.alpha;
        let blend = node.props.blend_mode;
        let cache_as_bitmap = node.props.cache_as_bitmap;
        let cached = cache_as_bitmap
            && !node.dirty
            && node.cache_matrix == device
            && node.cache.as_ref().is_some_and(|c| c.size() == (w, h));

        let layer = if cached {
            tracing::trace!(?handle, "cached rendering reused");
            node.cache.take()
        } else {
            None
        };
        let layer = match layer {
            Some(layer) => layer,
            None => {
                let stale = node.cache.take();
                let mut layer = match stale {
                    Some(mut c) if cache_as_bitmap => {
                        c.resize(w, h, None);
                        c
                    }
                    _ if cache_as_bitmap => self.pool.make_render_buffer(w, h),
                    _ => self.pool.acquire(w, h),
                };
                self.render_layer(&mut layer, handle, device, depth);
                layer
            }
        };

        target.save();
        target.reset_matrix();
        target.set_blend_mode(blend);
        let a = target.state().alpha * alpha;
        target.set_alpha(a);
        target.draw_buffer(&layer, 0.0, 0.0);
        target.restore();

        if cache_as_bitmap {
            if let Some(node) = self.registry.get_mut(handle) {
                node.cache = Some(layer);
                node.cache_matrix = device;
            }
        } else {
            self.pool.recycle(layer);
        }
    }

    // Subtree, mask and filters into `layer`, which is already cleared.
    fn render_layer(
        &mut self,
        layer: &mut RenderBuffer,
        handle: HandleId,
        device: Affine,
        depth: u32,
    ) {
        layer.set_matrix(device);
        self.draw_body(layer, handle, depth);

        let Some(node) = self.registry.get(handle) else {
            return;
        };
        let mask = node.mask;
        let filters = node.props.filters.clone();

        if let Some(m) = mask {
            let (w, h) = layer.size();
            let mut coverage = self.pool.acquire(w, h);
            coverage.set_matrix(device);
            self.draw_at_depth(&mut coverage, m, depth + 1);
            layer.apply_mask(&coverage);
            self.pool.recycle(coverage);
        }
        let (w, h) = layer.size();
        for f in &filters {
            match f {
                Filter::Blur { blur_x, blur_y } => {
                    // Float-to-int casts saturate; NaN becomes 0.
                    let rx = (blur_x.max(0.0).round() as u32).min(w);
                    let ry = (blur_y.max(0.0).round() as u32).min(h);
                    if let Err(e) = composite::box_blur_in_place(layer.data_mut(), w, h, rx, ry) {
                        tracing::warn!(error = %e, "blur filter skipped");
                    }
                }
                Filter::ColorMatrix { matrix } => {
                    composite::color_matrix_in_place(layer.data_mut(), matrix);
                }
            }
        }
    }
}

fn draw_content(target: &mut RenderBuffer, content: &NodeContent, textures: &TextureStore) {
    match content {
        NodeContent::Node | NodeContent::Stage(_) => {}
        NodeContent::Bitmap(b) => draw_bitmap(target, b, textures),
        NodeContent::Graphics(g) => draw_graphics(target, &g.commands),
        NodeContent::TextField(t) => draw_text_box(target, t),
    }
}

fn draw_bitmap(target: &mut RenderBuffer, props: &BitmapProps, textures: &TextureStore) {
    let Some(tex) = props.texture.as_deref().and_then(|k| textures.get(k)) else {
        return;
    };
    let view = tex.view();
    let (tw, th) = (f64::from(tex.width()), f64::from(tex.height()));
    if tw <= 0.0 || th <= 0.0 {
        return;
    }
    let natural = Rect::new(0.0, 0.0, tw, th);
    let bounds = match props.size {
        Some(s) => Rect::new(0.0, 0.0, s.x, s.y),
        None => natural,
    };
    match (props.fill_mode, props.scale9_grid) {
        (FillMode::Scale, Some(grid)) => {
            for (src, dst) in nine_slice(natural, grid, bounds) {
                target.draw_image(view, src, dst, props.smoothing);
            }
        }
        (FillMode::Scale, None) => target.draw_image(view, natural, bounds, props.smoothing),
        (FillMode::Clip, _) => {
            target.save();
            target.clip_rect(bounds);
            target.draw_image(view, natural, natural, props.smoothing);
            target.restore();
        }
        (FillMode::Repeat, _) => {
            target.save();
            target.clip_rect(bounds);
            let cols = (bounds.width() / tw).ceil() as u32;
            let rows = (bounds.height() / th).ceil() as u32;
            for row in 0..rows {
                for col in 0..cols {
                    let dst = natural + Vec2::new(f64::from(col) * tw, f64::from(row) * th);
                    target.draw_image(view, natural, dst, props.smoothing);
                }
            }
            target.restore();
        }
    }
}

/// Split `src` along `grid` into up to nine `(source, destination)` pairs filling `dst`.
///
/// Corners keep their size, edges stretch along one axis, the center along both. When `dst` is
/// smaller than the fixed edges, the edges shrink proportionally. Empty slices are dropped.
pub fn nine_slice(src: Rect, grid: Rect, dst: Rect) -> SmallVec<[(Rect, Rect); 9]> {
    let grid = grid.intersect(src);
    let sx = [src.x0, grid.x0, grid.x1, src.x1];
    let sy = [src.y0, grid.y0, grid.y1, src.y1];
    let dx = slice_axis(sx, dst.x0, dst.x1);
    let dy = slice_axis(sy, dst.y0, dst.y1);

    let mut out = SmallVec::new();
    for row in 0..3 {
        for col in 0..3 {
            let s = Rect::new(sx[col], sy[row], sx[col + 1], sy[row + 1]);
            let d = Rect::new(dx[col], dy[row], dx[col + 1], dy[row + 1]);
            if s.width() > 0.0 && s.height() > 0.0 && d.width() > 0.0 && d.height() > 0.0 {
                out.push((s, d));
            }
        }
    }
    out
}

fn slice_axis(s: [f64; 4], d0: f64, d1: f64) -> [f64; 4] {
    let mut lead = s[1] - s[0];
    let mut trail = s[3] - s[2];
    let span = d1 - d0;
    if lead + trail > span && lead + trail > 0.0 {
        let k = span.max(0.0) / (lead + trail);
        lead *= k;
        trail *= k;
    }
    [d0, d0 + lead, d1 - trail, d1]
}

#[derive(Default)]
struct PathState {
    path: BezPath,
    open: bool,
    fill: Option<Rgba8Premul>,
    line: Option<(f64, Rgba8Premul)>,
}

impl PathState {
    fn flush(&mut self, target: &mut RenderBuffer) {
        if self.path.elements().is_empty() {
            return;
        }
        if let Some(color) = self.fill {
            target.fill_path(&self.path, color);
        }
        if let Some((width, color)) = self.line {
            target.stroke_path(&self.path, width, color);
        }
        self.path = BezPath::new();
        self.open = false;
    }

    fn pen(&mut self) {
        if !self.open {
            self.path.move_to((0.0, 0.0));
            self.open = true;
        }
    }

    fn shape(&mut self, shape: impl Shape) {
        self.path.extend(shape.path_elements(PATH_TOLERANCE));
        self.open = true;
    }
}

fn draw_graphics(target: &mut RenderBuffer, commands: &[GraphicsCommand]) {
    let mut st = PathState::default();
    for cmd in commands {
        match *cmd {
            GraphicsCommand::BeginFill { color, alpha } => {
                st.flush(target);
                st.fill = Some(Rgba8Premul::from_rgb_alpha(color, alpha));
            }
            GraphicsCommand::EndFill => {
                st.flush(target);
                st.fill = None;
            }
            GraphicsCommand::LineStyle {
                thickness,
                color,
                alpha,
            } => {
                st.flush(target);
                st.line = (thickness > 0.0)
                    .then(|| (f64::from(thickness), Rgba8Premul::from_rgb_alpha(color, alpha)));
            }
            GraphicsCommand::MoveTo { x, y } => {
                st.path.move_to((f64::from(x), f64::from(y)));
                st.open = true;
            }
            GraphicsCommand::LineTo { x, y } => {
                st.pen();
                st.path.line_to((f64::from(x), f64::from(y)));
            }
            GraphicsCommand::CurveTo { cx, cy, x, y } => {
                st.pen();
                st.path
                    .quad_to((f64::from(cx), f64::from(cy)), (f64::from(x), f64::from(y)));
            }
            GraphicsCommand::DrawRect { x, y, w, h } => {
                let (x, y) = (f64::from(x), f64::from(y));
                st.shape(Rect::new(x, y, x + f64::from(w), y + f64::from(h)));
            }
            GraphicsCommand::DrawCircle { x, y, r } => {
                st.shape(Circle::new((f64::from(x), f64::from(y)), f64::from(r)));
            }
            GraphicsCommand::DrawEllipse { x, y, w, h } => {
                let (x, y) = (f64::from(x), f64::from(y));
                st.shape(Ellipse::from_rect(Rect::new(
                    x,
                    y,
                    x + f64::from(w),
                    y + f64::from(h),
                )));
            }
        }
    }
    st.flush(target);
}

// Glyphs belong to the host text engine; only the box is drawn here.
fn draw_text_box(target: &mut RenderBuffer, t: &TextFieldProps) {
    let (w, h) = (t.size.x, t.size.y);
    if t.background {
        target.fill_rect(
            Rect::new(0.0, 0.0, w, h),
            Rgba8Premul::from_rgb_alpha(t.background_color, 1.0),
        );
    }
    if t.border && w > 1.0 && h > 1.0 {
        let outline = Rect::new(0.5, 0.5, w - 0.5, h - 0.5).to_path(PATH_TOLERANCE);
        target.stroke_path(
            &outline,
            1.0,
            Rgba8Premul::from_rgb_alpha(t.border_color, 1.0),
        );
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/display_list.rs"]
mod tests;
