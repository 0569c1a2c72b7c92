use super::*;

#[test]
fn stats_split_drawn_and_skipped_frames() {
    let mut stats = FrameStats::default();
    stats.record(&FrameTiming {
        render_ms: 4.0,
        stages_drawn: 1,
        ..FrameTiming::default()
    });
    stats.record(&FrameTiming {
        render_ms: 1.0,
        stages_skipped: 2,
        ..FrameTiming::default()
    });
    assert_eq!(stats.frames, 2);
    assert_eq!(stats.frames_drawn, 1);
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.max_render_ms, 4.0);
    assert_eq!(stats.mean_render_ms(), 2.5);
}

#[test]
fn total_adds_every_phase() {
    let t = FrameTiming {
        script_ms: 1.0,
        sync_ms: 2.0,
        render_ms: 3.0,
        ..FrameTiming::default()
    };
    assert_eq!(t.total_ms(), 6.0);
    assert_eq!(FrameStats::default().mean_render_ms(), 0.0);
}
