use super::*;
use crate::foundation::ids::NodeId;
use crate::render::texture::Texture;
use crate::scene::props::GraphicsProps;

const RED: u32 = 0xff0000;

struct Fixture {
    reg: NodeRegistry,
    textures: TextureStore,
    pool: SurfacePool,
    next: u64,
}

impl Fixture {
    fn new() -> Self {
        Self {
            reg: NodeRegistry::new(),
            textures: TextureStore::new(),
            pool: SurfacePool::default(),
            next: 0,
        }
    }

    fn add(&mut self, parent: Option<HandleId>, content: NodeContent) -> HandleId {
        self.next += 1;
        let h = self
            .reg
            .make_node(NodeId::from_bits(self.next), content.node_type());
        self.reg.get_mut(h).unwrap().payload = content;
        if let Some(p) = parent {
            self.reg.get_mut(p).unwrap().children.push(h);
            self.reg.get_mut(h).unwrap().parent = Some(p);
        }
        h
    }

    fn draw(&mut self, target: &mut RenderBuffer, root: HandleId) {
        let mut ctx = DrawCtx {
            registry: &mut self.reg,
            textures: &self.textures,
            pool: &mut self.pool,
            settle: true,
        };
        ctx.draw_children(target, root);
    }
}

fn rect_fill(x: f32, y: f32, w: f32, h: f32, color: u32) -> NodeContent {
    NodeContent::Graphics(GraphicsProps {
        commands: vec![
            GraphicsCommand::BeginFill { color, alpha: 1.0 },
            GraphicsCommand::DrawRect { x, y, w, h },
            GraphicsCommand::EndFill,
        ],
    })
}

#[test]
fn nine_slice_keeps_corners_and_stretches_center() {
    let src = Rect::new(0.0, 0.0, 30.0, 30.0);
    let grid = Rect::new(10.0, 10.0, 20.0, 20.0);
    let dst = Rect::new(0.0, 0.0, 60.0, 40.0);
    let parts = nine_slice(src, grid, dst);
    assert_eq!(parts.len(), 9);
    assert_eq!(
        parts[0],
        (
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 0.0, 10.0, 10.0)
        )
    );
    assert_eq!(
        parts[4],
        (
            Rect::new(10.0, 10.0, 20.0, 20.0),
            Rect::new(10.0, 10.0, 50.0, 30.0)
        )
    );
    assert_eq!(
        parts[8],
        (
            Rect::new(20.0, 20.0, 30.0, 30.0),
            Rect::new(50.0, 30.0, 60.0, 40.0)
        )
    );
}

#[test]
fn nine_slice_shrinks_edges_when_box_is_small() {
    let src = Rect::new(0.0, 0.0, 30.0, 30.0);
    let grid = Rect::new(10.0, 10.0, 20.0, 20.0);
    let parts = nine_slice(src, grid, Rect::new(0.0, 0.0, 10.0, 30.0));
    // Center column collapses; the left and right columns split the width.
    assert_eq!(parts.len(), 6);
    assert_eq!(parts[0].1, Rect::new(0.0, 0.0, 5.0, 10.0));
    assert_eq!(parts[1].1, Rect::new(5.0, 0.0, 10.0, 10.0));
}

#[test]
fn children_draw_back_to_front_with_matrices() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let back = fx.add(Some(root), rect_fill(0.0, 0.0, 4.0, 4.0, RED));
    let front = fx.add(Some(root), rect_fill(0.0, 0.0, 2.0, 2.0, 0x0000ff));
    fx.reg.get_mut(front).unwrap().props.matrix = Affine::translate((1.0, 1.0));

    let mut target = RenderBuffer::new(4, 4);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(target.pixel(1, 1), [0, 0, 255, 255]);
    assert_eq!(target.pixel(3, 3), [255, 0, 0, 255]);
    assert!(!fx.reg.get(back).unwrap().is_dirty());
    assert!(!fx.reg.get(root).unwrap().is_dirty());
}

#[test]
fn hidden_and_transparent_nodes_are_skipped() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let a = fx.add(Some(root), rect_fill(0.0, 0.0, 1.0, 1.0, RED));
    let b = fx.add(Some(root), rect_fill(1.0, 0.0, 1.0, 1.0, RED));
    fx.reg.get_mut(a).unwrap().props.visible = false;
    fx.reg.get_mut(b).unwrap().props.alpha = 0.0;
    let mut target = RenderBuffer::new(2, 1);
    fx.draw(&mut target, root);
    assert!(target.data().iter().all(|&v| v == 0));
}

#[test]
fn alpha_multiplies_down_the_tree() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let group = fx.add(Some(root), NodeContent::Node);
    let leaf = fx.add(Some(group), rect_fill(0.0, 0.0, 1.0, 1.0, RED));
    fx.reg.get_mut(group).unwrap().props.alpha = 0.5;
    fx.reg.get_mut(leaf).unwrap().props.alpha = 0.5;
    let mut target = RenderBuffer::new(1, 1);
    fx.draw(&mut target, root);
    let a = target.pixel(0, 0)[3];
    assert!((63..=65).contains(&a), "alpha {a}");
}

#[test]
fn scroll_rect_clips_and_offsets() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let view = fx.add(Some(root), NodeContent::Node);
    fx.add(Some(view), rect_fill(0.0, 0.0, 4.0, 1.0, RED));
    fx.reg.get_mut(view).unwrap().props.scroll_rect = Some(Rect::new(2.0, 0.0, 3.0, 1.0));
    let mut target = RenderBuffer::new(4, 1);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 0)[3], 255);
    assert_eq!(target.pixel(1, 0)[3], 0);
}

#[test]
fn mask_node_limits_coverage() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let content = fx.add(Some(root), rect_fill(0.0, 0.0, 4.0, 1.0, RED));
    let mask = fx.add(None, rect_fill(0.0, 0.0, 2.0, 1.0, 0xffffff));
    fx.reg.get_mut(content).unwrap().mask = Some(mask);
    let mut target = RenderBuffer::new(4, 1);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(1, 0), [255, 0, 0, 255]);
    assert_eq!(target.pixel(2, 0), [0, 0, 0, 0]);
    // Offscreen temporaries went back to the pool.
    assert_eq!(fx.pool.stats().outstanding, 0);
}

#[test]
fn cache_as_bitmap_reuses_the_rendering_while_clean() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    let cached = fx.add(Some(root), rect_fill(0.0, 0.0, 2.0, 2.0, RED));
    fx.reg.get_mut(cached).unwrap().props.cache_as_bitmap = true;

    let mut target = RenderBuffer::new(2, 2);
    fx.draw(&mut target, root);
    assert!(fx.reg.get(cached).unwrap().has_cache());
    assert_eq!(fx.pool.stats().dedicated, 1);

    // Content edits that skip invalidation are not seen: the cache is used.
    if let NodeContent::Graphics(g) = &mut fx.reg.get_mut(cached).unwrap().payload {
        g.commands.clear();
    }
    target.clear();
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(fx.pool.stats().dedicated, 1);

    fx.reg.invalidate(cached);
    target.clear();
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 0), [0, 0, 0, 0]);
}

#[test]
fn blend_mode_composites_the_group() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    fx.add(Some(root), rect_fill(0.0, 0.0, 2.0, 1.0, RED));
    let hole = fx.add(Some(root), rect_fill(0.0, 0.0, 1.0, 1.0, 0xffffff));
    fx.reg.get_mut(hole).unwrap().props.blend_mode = BlendMode::Erase;
    let mut target = RenderBuffer::new(2, 1);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(target.pixel(1, 0), [255, 0, 0, 255]);
}

#[test]
fn bitmap_repeat_tiles_the_texture() {
    let mut fx = Fixture::new();
    fx.textures.insert(
        "dot",
        Texture::from_premul(1, 1, vec![0, 255, 0, 255]).unwrap(),
    );
    let root = fx.add(None, NodeContent::Node);
    fx.add(
        Some(root),
        NodeContent::Bitmap(BitmapProps {
            texture: Some("dot".into()),
            size: Some(Vec2::new(3.0, 1.0)),
            fill_mode: FillMode::Repeat,
            ..BitmapProps::default()
        }),
    );
    let mut target = RenderBuffer::new(4, 1);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(2, 0), [0, 255, 0, 255]);
    assert_eq!(target.pixel(3, 0), [0, 0, 0, 0]);
}

#[test]
fn missing_texture_draws_nothing() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    fx.add(
        Some(root),
        NodeContent::Bitmap(BitmapProps {
            texture: Some("absent".into()),
            ..BitmapProps::default()
        }),
    );
    let mut target = RenderBuffer::new(2, 2);
    fx.draw(&mut target, root);
    assert!(target.data().iter().all(|&v| v == 0));
}

#[test]
fn text_field_draws_background_and_border() {
    let mut fx = Fixture::new();
    let root = fx.add(None, NodeContent::Node);
    fx.add(
        Some(root),
        NodeContent::TextField(TextFieldProps {
            text: "ignored".into(),
            background: true,
            background_color: 0x00ff00,
            border: true,
            border_color: 0x0000ff,
            size: Vec2::new(6.0, 6.0),
            ..TextFieldProps::default()
        }),
    );
    let mut target = RenderBuffer::new(6, 6);
    fx.draw(&mut target, root);
    assert_eq!(target.pixel(0, 3), [0, 0, 255, 255]);
    assert_eq!(target.pixel(3, 3), [0, 255, 0, 255]);
}
