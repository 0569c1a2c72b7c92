/// Cost of one `render` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameTiming {
    /// `true` when the render was driven by the frame tick rather than an on-demand request.
    pub triggered_by_frame: bool,
    /// Host script time reported by the caller.
    pub script_ms: f64,
    /// Synchronization time reported by the caller.
    pub sync_ms: f64,
    /// Sum of every stage's render cost.
    pub render_ms: f64,
    /// Stages that drew and presented.
    pub stages_drawn: u32,
    /// Stages that found nothing to redraw.
    pub stages_skipped: u32,
}

impl FrameTiming {
    /// Script, sync and render cost together.
    pub fn total_ms(&self) -> f64 {
        self.script_ms + self.sync_ms + self.render_ms
    }
}

/// Receiver of per-frame timings.
pub trait MetricsSink {
    /// Called once per `render`, after every stage ran.
    fn record(&mut self, timing: &FrameTiming);
}

/// Sink that ignores every timing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn record(&mut self, _timing: &FrameTiming) {}
}

/// Sink that emits one `debug` event per frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl MetricsSink for TracingMetrics {
    fn record(&mut self, t: &FrameTiming) {
        tracing::debug!(
            triggered_by_frame = t.triggered_by_frame,
            script_ms = t.script_ms,
            sync_ms = t.sync_ms,
            render_ms = t.render_ms,
            drawn = t.stages_drawn,
            skipped = t.stages_skipped,
            "frame"
        );
    }
}

/// Running totals over many frames.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameStats {
    /// `render` calls recorded.
    pub frames: u64,
    /// Calls where at least one stage drew.
    pub frames_drawn: u64,
    /// Calls where every stage was skipped.
    pub frames_skipped: u64,
    /// Sum of render cost.
    pub render_ms: f64,
    /// Largest single render cost.
    pub max_render_ms: f64,
}

impl FrameStats {
    /// Fold in one frame.
    pub fn add(&mut self, t: &FrameTiming) {
        self.frames += 1;
        if t.stages_drawn > 0 {
            self.frames_drawn += 1;
        } else {
            self.frames_skipped += 1;
        }
        self.render_ms += t.render_ms;
        self.max_render_ms = self.max_render_ms.max(t.render_ms);
    }

    /// Mean render cost, zero before the first frame.
    pub fn mean_render_ms(&self) -> f64 {
        if self.frames == 0 {
            0.0
        } else {
            self.render_ms / self.frames as f64
        }
    }
}

impl MetricsSink for FrameStats {
    fn record(&mut self, timing: &FrameTiming) {
        self.add(timing);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/metrics.rs"]
mod tests;
