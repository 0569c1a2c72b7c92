use std::cell::RefCell;
use std::rc::Rc;

use crate::foundation::error::StageResult;
use crate::render::surface::RenderBuffer;
use crate::scene::props::StageDisplayRule;

/// Destination a stage presents its finished surface to.
///
/// `present` is called once per drawn frame, never for skipped frames. An error is logged by the
/// render loop and does not abort the frame.
pub trait Screen {
    /// Show `surface` according to `rule`.
    fn present(&mut self, surface: &RenderBuffer, rule: &StageDisplayRule) -> StageResult<()>;
}

/// Screen that discards every frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScreen;

impl Screen for NullScreen {
    fn present(&mut self, _surface: &RenderBuffer, _rule: &StageDisplayRule) -> StageResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct CaptureState {
    last: Option<RenderBuffer>,
    rule: Option<StageDisplayRule>,
    presents: u64,
}

/// In-memory screen for tests and the CLI.
///
/// Clones share one capture, so a copy kept by the caller observes frames presented through the
/// copy handed to the bridge.
#[derive(Debug, Default, Clone)]
pub struct FrameCapture {
    inner: Rc<RefCell<CaptureState>>,
}

impl FrameCapture {
    /// Create an empty capture.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames presented so far.
    pub fn present_count(&self) -> u64 {
        self.inner.borrow().presents
    }

    /// Copy of the most recently presented frame.
    pub fn last_frame(&self) -> Option<RenderBuffer> {
        self.inner.borrow().last.clone()
    }

    /// Display rule of the most recent frame.
    pub fn last_rule(&self) -> Option<StageDisplayRule> {
        self.inner.borrow().rule
    }
}

impl Screen for FrameCapture {
    fn present(&mut self, surface: &RenderBuffer, rule: &StageDisplayRule) -> StageResult<()> {
        let mut st = self.inner.borrow_mut();
        match st.last.as_mut() {
            Some(last) => last.clone_from(surface),
            None => st.last = Some(surface.clone()),
        }
        st.rule = Some(*rule);
        st.presents += 1;
        Ok(())
    }
}
