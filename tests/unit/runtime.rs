use super::*;
use crate::render::screen::FrameCapture;
use crate::render::stage_loop::ManualClock;
use crate::scene::props::{GraphicsCommand, NodeType};

#[test]
fn opts_parse_with_defaults() {
    let opts = RuntimeOpts::from_json_str(r#"{"pool_capacity": 2}"#).unwrap();
    assert_eq!(opts.pool_capacity, 2);
    assert_eq!(opts.wire_initial_capacity, 4096);
    assert!(RuntimeOpts::from_json_str("{").is_err());

    let colored = RuntimeOpts::from_json_str(
        r#"{"clear_color": {"r": 0, "g": 0, "b": 0, "a": 255}, "log_metrics": true}"#,
    )
    .unwrap();
    assert_eq!(colored.clear_color.map(|c| c.a), Some(255));
    assert!(colored.log_metrics);
}

#[test]
fn frames_sync_then_render() {
    let mut rt = Runtime::default();
    rt.bridge_mut().set_clock(Box::new(ManualClock::new()));
    let (stage, handle) = rt.create_stage(StageDisplayRule::fixed(2, 2));
    let capture = FrameCapture::new();
    rt.bridge_mut().attach_screen(handle, Box::new(capture.clone()));

    let g = rt.scene_mut().create_node(NodeType::Graphics);
    rt.scene_mut().add_child(stage, g).unwrap();
    rt.scene_mut().push_graphics(
        g,
        GraphicsCommand::BeginFill {
            color: 0x00ff00,
            alpha: 1.0,
        },
    );
    rt.scene_mut().push_graphics(
        g,
        GraphicsCommand::DrawRect {
            x: 0.0,
            y: 0.0,
            w: 1.0,
            h: 1.0,
        },
    );

    let t = rt.advance_frame(3.0).unwrap();
    assert!(t.triggered_by_frame);
    assert_eq!(t.script_ms, 3.0);
    assert_eq!(t.stages_drawn, 1);
    assert_eq!(capture.last_frame().unwrap().pixel(0, 0), [0, 255, 0, 255]);

    let t = rt.render_on_demand().unwrap();
    assert!(!t.triggered_by_frame);
    assert_eq!(t.stages_skipped, 1);

    rt.scene_mut().set_alpha(g, 0.0);
    rt.advance_frame(0.0).unwrap();
    assert_eq!(capture.last_frame().unwrap().pixel(0, 0), [0, 0, 0, 0]);

    let stats = rt.frame_stats();
    assert_eq!((stats.frames, stats.frames_drawn, stats.frames_skipped), (3, 2, 1));
}

#[test]
fn destroyed_stage_stops_rendering() {
    let mut rt = Runtime::default();
    let (stage, handle) = rt.create_stage(StageDisplayRule::fixed(2, 2));
    rt.advance_frame(0.0).unwrap();
    rt.destroy_node(stage);
    assert!(!rt.bridge().registry().contains(handle));
    let t = rt.advance_frame(0.0).unwrap();
    assert_eq!(t.stages_drawn + t.stages_skipped, 0);
}

#[test]
fn draw_to_bitmap_is_immediate() {
    let mut rt = Runtime::default();
    let g = rt.scene_mut().create_node(NodeType::Graphics);
    rt.scene_mut().push_graphics(
        g,
        GraphicsCommand::BeginFill {
            color: 0xffffff,
            alpha: 1.0,
        },
    );
    rt.scene_mut().push_graphics(
        g,
        GraphicsCommand::DrawCircle {
            x: 2.0,
            y: 2.0,
            r: 2.0,
        },
    );
    rt.draw_to_bitmap(g, "disc", 4, 4, Affine::IDENTITY).unwrap();
    let tex = rt.bridge().textures().get("disc").unwrap();
    assert_eq!(tex.width(), 4);
}
