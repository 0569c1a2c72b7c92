use super::*;

#[test]
fn premul_rounds_half_up() {
    let c = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(c.to_array(), [128, 64, 0, 128]);
}

#[test]
fn rgb_alpha_splits_channels() {
    let c = Rgba8Premul::from_rgb_alpha(0x11_22_33, 1.0);
    assert_eq!(c.to_array(), [0x11, 0x22, 0x33, 255]);
    assert_eq!(Rgba8Premul::from_rgb_alpha(0xffffff, 0.0), Rgba8Premul::transparent());
}

#[test]
fn blend_mode_wire_values_round_trip() {
    for mode in [
        BlendMode::Normal,
        BlendMode::Add,
        BlendMode::Erase,
        BlendMode::Multiply,
    ] {
        assert_eq!(BlendMode::from_u8(mode as u8), Some(mode));
    }
    assert_eq!(BlendMode::from_u8(42), None);
}
