use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Millisecond time source for render cost measurement.
pub trait FrameClock {
    /// Monotonic time in milliseconds from an arbitrary origin.
    fn now_ms(&self) -> f64;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl FrameClock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Clock that only moves when told to. Clones share one time value.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Clock reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `ms`.
    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl FrameClock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

/// The four phases of one stage frame, driven by [`StageRenderLoop::render`].
pub trait StagePass {
    /// Apply pending changes and recompute the clip. Returns `true` when anything visible
    /// changed.
    fn update(&mut self) -> bool;
    /// Clear the stage's dirty-transform flag.
    fn clear_transform_dirty(&mut self);
    /// Draw the display list into the backing surface.
    fn draw(&mut self);
    /// Hand the surface to the screen.
    fn present(&mut self);
}

/// Per-stage frame driver.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageRenderLoop {
    drawn: u64,
    skipped: u64,
}

impl StageRenderLoop {
    /// Loop with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one frame and return its cost in milliseconds.
    ///
    /// An unchanged stage costs only the update check; it is neither drawn nor presented.
    pub fn render(&mut self, pass: &mut dyn StagePass, clock: &dyn FrameClock) -> f64 {
        let start = clock.now_ms();
        let changed = pass.update();
        pass.clear_transform_dirty();
        if !changed {
            self.skipped += 1;
            return clock.now_ms() - start;
        }
        pass.draw();
        pass.present();
        self.drawn += 1;
        clock.now_ms() - start
    }

    /// Frames drawn and presented.
    pub fn drawn(&self) -> u64 {
        self.drawn
    }

    /// Frames skipped because nothing changed.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/stage_loop.rs"]
mod tests;
