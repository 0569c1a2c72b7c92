//! Top-level frame driver owning one scene graph and one render bridge.

use std::time::Instant;

use crate::foundation::core::{Affine, Rgba8Premul};
use crate::foundation::error::StageResult;
use crate::foundation::ids::{HandleId, NodeId};
use crate::render::bridge::RenderBridge;
use crate::render::metrics::{FrameStats, FrameTiming};
use crate::render::surface_pool::DEFAULT_POOL_CAPACITY;
use crate::scene::graph::SceneGraph;
use crate::scene::props::StageDisplayRule;
use crate::sync::synchronizer::{BitmapDraw, SyncStats};

/// Options for a [`Runtime`] and its [`RenderBridge`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RuntimeOpts {
    /// Idle offscreen buffers kept across frames.
    pub pool_capacity: usize,
    /// Initial wire buffer capacity in bytes.
    pub wire_initial_capacity: usize,
    /// Fill for stage surfaces before drawing; `None` leaves them transparent.
    pub clear_color: Option<Rgba8Premul>,
    /// Emit a `debug` event with the timings of every frame.
    pub log_metrics: bool,
}

impl Default for RuntimeOpts {
    fn default() -> Self {
        Self {
            pool_capacity: DEFAULT_POOL_CAPACITY,
            wire_initial_capacity: 4096,
            clear_color: None,
            log_metrics: false,
        }
    }
}

impl RuntimeOpts {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> StageResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Scene graph plus backend, driven one frame at a time.
///
/// Within a frame the order is: synchronize every stage (drain, emit, apply), then render every
/// stage.
#[derive(Debug)]
pub struct Runtime {
    scene: SceneGraph,
    bridge: RenderBridge,
    stages: Vec<NodeId>,
    stats: FrameStats,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(RuntimeOpts::default())
    }
}

impl Runtime {
    /// Empty runtime.
    pub fn new(opts: RuntimeOpts) -> Self {
        Self {
            scene: SceneGraph::new(),
            bridge: RenderBridge::new(&opts),
            stages: Vec::new(),
            stats: FrameStats::default(),
        }
    }

    /// The scene graph.
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Mutable scene graph; edits are picked up by the next frame.
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// The render bridge.
    pub fn bridge(&self) -> &RenderBridge {
        &self.bridge
    }

    /// Mutable render bridge, for screens, textures, clocks and metrics.
    pub fn bridge_mut(&mut self) -> &mut RenderBridge {
        &mut self.bridge
    }

    /// Totals over every frame rendered so far.
    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    /// Create a stage root and register it with the backend.
    pub fn create_stage(&mut self, rule: StageDisplayRule) -> (NodeId, HandleId) {
        let node = self.scene.create_stage(rule);
        let handle = self.bridge.make_stage(node);
        self.stages.push(node);
        (node, handle)
    }

    /// Destroy a scene node and its backend handle. Children are orphaned, not destroyed.
    pub fn destroy_node(&mut self, node: NodeId) {
        self.scene.destroy(node);
        self.bridge.destroy_node(node);
        self.stages.retain(|s| *s != node);
    }

    /// Synchronize one subtree.
    pub fn sync_node(&mut self, node: NodeId) -> StageResult<SyncStats> {
        self.bridge.sync_node(&mut self.scene, node)
    }

    fn sync_stages(&mut self) -> StageResult<()> {
        for i in 0..self.stages.len() {
            let stage = self.stages[i];
            self.bridge.sync_node(&mut self.scene, stage)?;
        }
        Ok(())
    }

    /// Frame tick: synchronize every stage, then render. `script_ms` is the host's own cost for
    /// the frame and is passed through to the metrics.
    pub fn advance_frame(&mut self, script_ms: f64) -> StageResult<FrameTiming> {
        self.frame(true, script_ms)
    }

    /// Out-of-band render, for example after a resize.
    pub fn render_on_demand(&mut self) -> StageResult<FrameTiming> {
        self.frame(false, 0.0)
    }

    fn frame(&mut self, triggered_by_frame: bool, script_ms: f64) -> StageResult<FrameTiming> {
        let start = Instant::now();
        self.sync_stages()?;
        let sync_ms = start.elapsed().as_secs_f64() * 1000.0;
        let timing = self.bridge.render(triggered_by_frame, script_ms, sync_ms);
        self.stats.add(&timing);
        Ok(timing)
    }

    /// Render `source`'s subtree into the texture `texture` now. `matrix` applies on top of the
    /// source's own transform.
    pub fn draw_to_bitmap(
        &mut self,
        source: NodeId,
        texture: &str,
        width: u32,
        height: u32,
        matrix: Affine,
    ) -> StageResult<()> {
        self.bridge.request_draw(BitmapDraw {
            source,
            texture: texture.to_owned(),
            width,
            height,
            matrix,
        });
        self.bridge.sync_node(&mut self.scene, source)?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/runtime.rs"]
mod tests;
