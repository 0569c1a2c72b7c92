use super::*;

const RED: Rgba8Premul = Rgba8Premul {
    r: 255,
    g: 0,
    b: 0,
    a: 255,
};

fn filled(w: u32, h: u32, color: Rgba8Premul) -> RenderBuffer {
    let mut b = RenderBuffer::new(w, h);
    b.fill_rect(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)), color);
    b
}

#[test]
fn fill_rect_covers_pixel_centers_only() {
    let mut b = RenderBuffer::new(4, 4);
    b.fill_rect(Rect::new(1.0, 1.0, 3.0, 3.0), RED);
    assert_eq!(b.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(b.pixel(1, 1), RED.to_array());
    assert_eq!(b.pixel(2, 2), RED.to_array());
    assert_eq!(b.pixel(3, 3), [0, 0, 0, 0]);
}

#[test]
fn transform_and_restore() {
    let mut b = RenderBuffer::new(8, 8);
    b.save();
    b.translate(4.0, 4.0);
    b.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), RED);
    b.restore();
    assert_eq!(b.matrix(), Affine::IDENTITY);
    assert_eq!(b.pixel(4, 4), RED.to_array());
    assert_eq!(b.pixel(0, 0), [0, 0, 0, 0]);

    // Unbalanced restore is harmless.
    b.restore();
}

#[test]
fn clip_rect_limits_fills_until_restore() {
    let mut b = RenderBuffer::new(4, 1);
    b.save();
    b.clip_rect(Rect::new(0.0, 0.0, 2.0, 1.0));
    b.fill_rect(Rect::new(0.0, 0.0, 4.0, 1.0), RED);
    b.restore();
    assert_eq!(b.pixel(1, 0)[3], 255);
    assert_eq!(b.pixel(2, 0)[3], 0);
}

#[test]
fn clear_rect_zeroes_region() {
    let mut b = filled(4, 4, RED);
    b.clear_rect(Rect::new(0.0, 0.0, 2.0, 4.0));
    assert_eq!(b.pixel(1, 3), [0, 0, 0, 0]);
    assert_eq!(b.pixel(2, 0), RED.to_array());
}

#[test]
fn resize_with_offset_keeps_content() {
    let mut b = RenderBuffer::new(2, 2);
    b.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), RED);
    b.resize(4, 4, Some((1, 2)));
    assert_eq!(b.size(), (4, 4));
    assert_eq!(b.pixel(1, 2), RED.to_array());
    assert_eq!(b.pixel(0, 0), [0, 0, 0, 0]);

    b.resize(3, 3, None);
    assert!(b.data().iter().all(|&v| v == 0));
}

#[test]
fn erase_blend_mode_clears_coverage() {
    let mut b = filled(2, 1, RED);
    b.set_blend_mode(BlendMode::Erase);
    b.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), RED);
    assert_eq!(b.pixel(0, 0), [0, 0, 0, 0]);
    assert_eq!(b.pixel(1, 0), RED.to_array());
}

#[test]
fn draw_image_scales_with_nearest_sampling() {
    // 2x1 image: red, blue.
    let pixels = [255, 0, 0, 255, 0, 0, 255, 255];
    let img = ImageView {
        width: 2,
        height: 1,
        pixels: &pixels,
    };
    let mut b = RenderBuffer::new(4, 1);
    b.draw_image(
        img,
        Rect::new(0.0, 0.0, 2.0, 1.0),
        Rect::new(0.0, 0.0, 4.0, 1.0),
        false,
    );
    assert_eq!(b.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(b.pixel(1, 0), [255, 0, 0, 255]);
    assert_eq!(b.pixel(2, 0), [0, 0, 255, 255]);
    assert_eq!(b.pixel(3, 0), [0, 0, 255, 255]);
}

#[test]
fn bilinear_sampling_stays_inside_source_region() {
    let pixels = [255, 0, 0, 255, 0, 0, 255, 255];
    let img = ImageView {
        width: 2,
        height: 1,
        pixels: &pixels,
    };
    let mut b = RenderBuffer::new(4, 1);
    // Only the red texel, stretched: the blue neighbor must not bleed in.
    b.draw_image(
        img,
        Rect::new(0.0, 0.0, 1.0, 1.0),
        Rect::new(0.0, 0.0, 4.0, 1.0),
        true,
    );
    for x in 0..4 {
        assert_eq!(b.pixel(x, 0), [255, 0, 0, 255]);
    }
}

#[test]
fn draw_buffer_composites_at_offset() {
    let src = filled(1, 1, RED);
    let mut b = RenderBuffer::new(3, 3);
    b.draw_buffer(&src, 2.0, 1.0);
    assert_eq!(b.pixel(2, 1), RED.to_array());
    assert_eq!(b.pixel(1, 1), [0, 0, 0, 0]);
}

#[test]
fn mask_multiplies_by_coverage() {
    let mut b = filled(2, 1, RED);
    let mut mask = RenderBuffer::new(2, 1);
    mask.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), RED);
    b.apply_mask(&mask);
    assert_eq!(b.pixel(0, 0), RED.to_array());
    assert_eq!(b.pixel(1, 0), [0, 0, 0, 0]);
}

#[test]
fn get_pixels_pads_out_of_range() {
    let b = filled(1, 1, RED);
    let px = b.get_pixels(0, 0, 2, 1);
    assert_eq!(px, vec![255, 0, 0, 255, 0, 0, 0, 0]);
}

#[test]
fn data_url_is_png() {
    let b = filled(2, 2, RED);
    let url = b.to_data_url().unwrap();
    assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    assert!(RenderBuffer::new(0, 0).to_png().is_err());
}

#[test]
fn stroke_draws_outline_only() {
    let mut b = RenderBuffer::new(10, 10);
    let rect = Rect::new(2.0, 2.0, 8.0, 8.0).to_path(0.1);
    b.stroke_path(&rect, 2.0, RED);
    assert_eq!(b.pixel(2, 5)[3], 255);
    assert_eq!(b.pixel(5, 5)[3], 0);
}
