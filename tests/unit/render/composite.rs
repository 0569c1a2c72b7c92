use super::*;

#[test]
fn over_opacity_0_is_noop() {
    let dst = [1, 2, 3, 4];
    let src = [200, 200, 200, 200];
    assert_eq!(over(dst, src, 0.0), dst);
}

#[test]
fn over_src_opaque_replaces_dst() {
    let dst = [0, 0, 0, 255];
    let src = [255, 0, 0, 255];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn over_dst_transparent_returns_scaled_src() {
    let dst = [0, 0, 0, 0];
    let src = [100, 110, 120, 200];
    assert_eq!(over(dst, src, 1.0), src);
}

#[test]
fn add_saturates() {
    let dst = [200, 10, 0, 255];
    let src = [100, 10, 0, 255];
    assert_eq!(add(dst, src, 1.0), [255, 20, 0, 255]);
}

#[test]
fn erase_punches_holes() {
    let dst = [50, 60, 70, 255];
    assert_eq!(erase(dst, [0, 0, 0, 255], 1.0), [0, 0, 0, 0]);
    assert_eq!(erase(dst, [0, 0, 0, 0], 1.0), dst);
}

#[test]
fn multiply_by_white_keeps_dst() {
    let dst = [40, 80, 120, 255];
    assert_eq!(multiply(dst, [255, 255, 255, 255], 1.0), dst);
    assert_eq!(multiply(dst, [0, 0, 0, 255], 1.0), [0, 0, 0, 255]);
}

#[test]
fn blend_dispatches_on_mode() {
    let dst = [10, 10, 10, 255];
    let src = [20, 20, 20, 255];
    assert_eq!(blend(BlendMode::Normal, dst, src, 1.0), src);
    assert_eq!(blend(BlendMode::Add, dst, src, 1.0), [30, 30, 30, 255]);
}

#[test]
fn box_blur_spreads_a_single_pixel() {
    let (w, h) = (5u32, 1u32);
    let mut data = vec![0u8; (w * h * 4) as usize];
    data[8..12].copy_from_slice(&[255, 255, 255, 255]);
    box_blur_in_place(&mut data, w, h, 1, 0).unwrap();
    assert_eq!(data[0..4], [0, 0, 0, 0]);
    assert_eq!(data[4..8], [85, 85, 85, 85]);
    assert_eq!(data[8..12], [85, 85, 85, 85]);
    assert_eq!(data[12..16], [85, 85, 85, 85]);
}

#[test]
fn box_blur_rejects_size_mismatch() {
    let mut data = vec![0u8; 12];
    assert!(box_blur_in_place(&mut data, 2, 2, 1, 1).is_err());
}

#[test]
fn color_matrix_identity_is_noop_and_offsets_apply() {
    let mut identity = [0f32; 20];
    for i in 0..4 {
        identity[i * 5 + i] = 1.0;
    }
    let mut data = vec![100, 50, 25, 255];
    color_matrix_in_place(&mut data, &identity);
    assert_eq!(data, [100, 50, 25, 255]);

    let mut brighten = identity;
    brighten[4] = 10.0;
    color_matrix_in_place(&mut data, &brighten);
    assert_eq!(data, [110, 50, 25, 255]);
}

#[test]
fn premultiply_round_trip_on_opaque() {
    let px = [12, 34, 56, 255];
    assert_eq!(unpremultiply(premultiply(px)), px);
    assert_eq!(unpremultiply([0, 0, 0, 0]), [0, 0, 0, 0]);
}

#[test]
fn box_blur_caps_radius_at_buffer_size() {
    let (w, h) = (3u32, 1u32);
    let mut data = vec![0u8; (w * h * 4) as usize];
    data[4..8].copy_from_slice(&[255, 255, 255, 255]);
    box_blur_in_place(&mut data, w, h, u32::MAX, u32::MAX).unwrap();
    let first = [data[0], data[1], data[2], data[3]];
    assert!(first[3] > 0);
    for px in data.chunks_exact(4) {
        assert_eq!(px, first);
    }
}

#[test]
fn box_kernel_weights_stay_nonzero_for_huge_radius() {
    let k = box_kernel_q16(u32::MAX);
    assert_eq!(k.len(), (2 * MAX_BLUR_RADIUS + 1) as usize);
    assert!(k.iter().all(|&w| w > 0));
    assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 1 << 16);
}
