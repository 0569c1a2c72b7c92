//! Boundary between the scene side and the software backend.
//!
//! The [`RenderBridge`] owns every piece of backend state for one runtime: the node registry,
//! the live-stage list, the surface pool, the texture store and the reusable wire buffer. There
//! are no process-wide statics, so independent bridges can coexist.

use std::fmt;

use crate::foundation::core::{Affine, Rect, Rgba8Premul};
use crate::foundation::error::StageResult;
use crate::foundation::ids::{HandleId, NodeId};
use crate::render::display_list::DrawCtx;
use crate::render::metrics::{FrameTiming, MetricsSink, NoopMetrics, TracingMetrics};
use crate::render::registry::{NodeRegistry, RenderNode};
use crate::render::screen::{NullScreen, Screen};
use crate::render::stage_loop::{FrameClock, StagePass, StageRenderLoop, SystemClock};
use crate::render::surface::RenderBuffer;
use crate::render::surface_pool::{SurfacePool, SurfacePoolStats};
use crate::render::texture::{Texture, TextureStore};
use crate::runtime::RuntimeOpts;
use crate::scene::graph::SceneGraph;
use crate::scene::props::{NodeContent, NodeType, StageDisplayRule};
use crate::sync::dirty::StageDirty;
use crate::sync::protocol::{DrawRequest, Message, MessageReader};
use crate::sync::synchronizer::{BitmapDraw, HandleSource, SyncStats, Synchronizer};
use crate::sync::wire::WireBuffer;

struct StageTarget {
    surface: RenderBuffer,
    screen: Box<dyn Screen>,
    transform_dirty: bool,
    rule: StageDisplayRule,
    clip: Rect,
}

struct StageEntry {
    handle: HandleId,
    render_loop: StageRenderLoop,
    target: StageTarget,
}

/// Backend state owned by one [`RenderBridge`].
pub struct RenderBridgeState {
    registry: NodeRegistry,
    stages: Vec<StageEntry>,
    pool: SurfacePool,
    textures: TextureStore,
    wire: WireBuffer,
    sync: Synchronizer,
    pending_draws: Vec<BitmapDraw>,
    clock: Box<dyn FrameClock>,
    metrics: Box<dyn MetricsSink>,
    clear_color: Option<Rgba8Premul>,
}

impl fmt::Debug for RenderBridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderBridgeState")
            .field("nodes", &self.registry.len())
            .field("stages", &self.stages.len())
            .field("pool", &self.pool.stats())
            .field("textures", &self.textures.len())
            .finish_non_exhaustive()
    }
}

/// Scene-to-backend boundary: node and stage lifetime, synchronization and frame rendering.
#[derive(Debug)]
pub struct RenderBridge {
    state: RenderBridgeState,
}

impl Default for RenderBridge {
    fn default() -> Self {
        Self::new(&RuntimeOpts::default())
    }
}

impl RenderBridge {
    /// Bridge configured from `opts`.
    pub fn new(opts: &RuntimeOpts) -> Self {
        let metrics: Box<dyn MetricsSink> = if opts.log_metrics {
            Box::new(TracingMetrics)
        } else {
            Box::new(NoopMetrics)
        };
        Self {
            state: RenderBridgeState {
                registry: NodeRegistry::new(),
                stages: Vec::new(),
                pool: SurfacePool::new(opts.pool_capacity),
                textures: TextureStore::new(),
                wire: WireBuffer::with_capacity(opts.wire_initial_capacity),
                sync: Synchronizer::new(),
                pending_draws: Vec::new(),
                clock: Box::new(SystemClock::default()),
                metrics,
                clear_color: opts.clear_color,
            },
        }
    }

    /// Replace the time source used for render costs.
    pub fn set_clock(&mut self, clock: Box<dyn FrameClock>) {
        self.state.clock = clock;
    }

    /// Replace the receiver of per-frame timings.
    pub fn set_metrics(&mut self, metrics: Box<dyn MetricsSink>) {
        self.state.metrics = metrics;
    }

    /// Backend node for `node` with a payload of `kind`.
    ///
    /// Idempotent for the same kind. A live handle of a different kind is destroyed first, so a
    /// node never holds two handles.
    pub fn make_node(&mut self, node: NodeId, kind: NodeType) -> HandleId {
        self.state.handles().bind(node, kind).0
    }

    /// [`RenderBridge::make_node`] with a raw kind value; unknown values create a plain node.
    pub fn make_node_raw(&mut self, node: NodeId, raw_kind: i32) -> HandleId {
        self.make_node(node, NodeType::from_raw(raw_kind))
    }

    /// Stage node for `node`, registered in the live-stage list.
    pub fn make_stage(&mut self, node: NodeId) -> HandleId {
        let h = self.make_node(node, NodeType::Stage);
        let st = &mut self.state;
        if !st.stages.iter().any(|s| s.handle == h) {
            st.stages.push(StageEntry {
                handle: h,
                render_loop: StageRenderLoop::new(),
                target: StageTarget {
                    surface: RenderBuffer::new(0, 0),
                    screen: Box::new(NullScreen),
                    transform_dirty: true,
                    rule: StageDisplayRule::default(),
                    clip: Rect::ZERO,
                },
            });
            tracing::debug!(stage = ?h, live = st.stages.len(), "stage registered");
        }
        h
    }

    /// Unbind a stage and drop it from the live-stage list. Unknown handles are ignored.
    pub fn destroy_stage(&mut self, handle: HandleId) {
        self.state.destroy_handle(handle);
    }

    /// Destroy the handle bound to `node`, if any.
    pub fn destroy_node(&mut self, node: NodeId) {
        if let Some(h) = self.state.registry.handle_for(node) {
            self.state.destroy_handle(h);
        }
    }

    /// Queue a render of `draw.source` into a texture; it runs with the next
    /// [`RenderBridge::sync_node`].
    pub fn request_draw(&mut self, draw: BitmapDraw) {
        self.state.pending_draws.push(draw);
    }

    /// Synchronize the subtree under `root` and apply the resulting messages.
    #[tracing::instrument(level = "debug", skip(self, scene))]
    pub fn sync_node(&mut self, scene: &mut SceneGraph, root: NodeId) -> StageResult<SyncStats> {
        let st = &mut self.state;
        st.wire.reset();
        let draws = std::mem::take(&mut st.pending_draws);
        let mut handles = BridgeHandles {
            registry: &mut st.registry,
            textures: &mut st.textures,
            stages: &mut st.stages,
        };
        let stats = st.sync.flush(scene, &mut handles, root, &draws, &mut st.wire);
        let wire = std::mem::take(&mut st.wire);
        let applied = st.apply_wire(&wire);
        st.wire = wire;
        applied?;
        Ok(stats)
    }

    /// Decode and apply a finished buffer produced elsewhere. Returns the number of messages
    /// applied. A protocol error stops at the offending message; earlier ones stay applied.
    pub fn apply_wire(&mut self, wire: &WireBuffer) -> StageResult<usize> {
        self.state.apply_wire(wire)
    }

    /// Store a straight-alpha RGBA8 texture. Returns `true` when its content changed, in which
    /// case every bitmap drawing it is invalidated.
    pub fn register_texture(
        &mut self,
        key: &str,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
    ) -> StageResult<bool> {
        let tex = Texture::from_straight_rgba(width, height, pixels)?;
        Ok(self.state.store_texture(key, tex))
    }

    /// Present the stage behind `stage` into `screen` from now on. Returns `false` for an unknown
    /// stage.
    pub fn attach_screen(&mut self, stage: HandleId, screen: Box<dyn Screen>) -> bool {
        let Some(entry) = self.state.stages.iter_mut().find(|s| s.handle == stage) else {
            return false;
        };
        entry.target.screen = screen;
        entry.target.transform_dirty = true;
        true
    }

    /// Render every live stage.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn render(&mut self, triggered_by_frame: bool, script_ms: f64, sync_ms: f64) -> FrameTiming {
        let st = &mut self.state;
        let registry = &st.registry;
        st.stages.retain(|s| registry.contains(s.handle));

        let mut timing = FrameTiming {
            triggered_by_frame,
            script_ms,
            sync_ms,
            ..FrameTiming::default()
        };
        for entry in &mut st.stages {
            let before = entry.render_loop.drawn();
            let mut frame = StageFrame {
                handle: entry.handle,
                target: &mut entry.target,
                registry: &mut st.registry,
                textures: &st.textures,
                pool: &mut st.pool,
                clear_color: st.clear_color,
            };
            timing.render_ms += entry.render_loop.render(&mut frame, st.clock.as_ref());
            if entry.render_loop.drawn() > before {
                timing.stages_drawn += 1;
            } else {
                timing.stages_skipped += 1;
            }
        }
        st.pool.flush();
        st.metrics.record(&timing);
        timing
    }

    /// Backing surface of a stage.
    pub fn stage_surface(&self, stage: HandleId) -> Option<&RenderBuffer> {
        self.state
            .stages
            .iter()
            .find(|s| s.handle == stage)
            .map(|s| &s.target.surface)
    }

    /// Frame counters of a stage.
    pub fn stage_loop(&self, stage: HandleId) -> Option<StageRenderLoop> {
        self.state
            .stages
            .iter()
            .find(|s| s.handle == stage)
            .map(|s| s.render_loop)
    }

    /// Handles of the live stages in registration order.
    pub fn stages(&self) -> Vec<HandleId> {
        self.state.stages.iter().map(|s| s.handle).collect()
    }

    /// The backend node table.
    pub fn registry(&self) -> &NodeRegistry {
        &self.state.registry
    }

    /// The texture store.
    pub fn textures(&self) -> &TextureStore {
        &self.state.textures
    }

    /// Surface pool counters.
    pub fn pool_stats(&self) -> SurfacePoolStats {
        self.state.pool.stats()
    }

    /// The last synchronized buffer.
    pub fn last_wire(&self) -> &WireBuffer {
        &self.state.wire
    }

    /// All backend state.
    pub fn state(&self) -> &RenderBridgeState {
        &self.state
    }
}

impl RenderBridgeState {
    fn handles(&mut self) -> BridgeHandles<'_> {
        BridgeHandles {
            registry: &mut self.registry,
            textures: &mut self.textures,
            stages: &mut self.stages,
        }
    }

    fn destroy_handle(&mut self, handle: HandleId) {
        self.handles().destroy(handle);
    }

    fn store_texture(&mut self, key: &str, tex: Texture) -> bool {
        if !self.textures.insert(key, tex) {
            tracing::trace!(key, "texture unchanged");
            return false;
        }
        let linked = self.textures.linked(key).to_vec();
        for h in linked {
            self.registry.invalidate(h);
        }
        true
    }

    fn apply_wire(&mut self, wire: &WireBuffer) -> StageResult<usize> {
        let mut applied = 0;
        for msg in MessageReader::new(wire) {
            let msg = msg?;
            match &msg {
                Message::DrawToBitmap { source, request } => self.draw_to_texture(*source, request),
                Message::UpdateStage { target, dirty, .. } => {
                    self.registry.apply(&msg, &mut self.textures);
                    if dirty.intersects(StageDirty::DISPLAY_RECT | StageDirty::CONTENT_SCALE)
                        && let Some(s) = self.stages.iter_mut().find(|s| s.handle == *target)
                    {
                        s.target.transform_dirty = true;
                    }
                }
                _ => self.registry.apply(&msg, &mut self.textures),
            }
            applied += 1;
        }
        tracing::trace!(applied, bytes = wire.len(), "wire applied");
        Ok(applied)
    }

    fn draw_to_texture(&mut self, source: HandleId, request: &DrawRequest) {
        if !self.registry.contains(source) {
            tracing::trace!(?source, "draw request for stale handle skipped");
            return;
        }
        let mut buf = RenderBuffer::new(request.width, request.height);
        buf.set_matrix(request.matrix);
        let mut ctx = DrawCtx {
            registry: &mut self.registry,
            textures: &self.textures,
            pool: &mut self.pool,
            settle: false,
        };
        ctx.draw_node(&mut buf, source);
        match Texture::from_premul(request.width, request.height, buf.data().to_vec()) {
            Ok(tex) => {
                self.store_texture(&request.texture, tex);
            }
            Err(e) => tracing::warn!(error = %e, texture = %request.texture, "draw to bitmap failed"),
        }
    }
}

/// Handle lifetime over the registry plus everything keyed by handle. Every destruction, including
/// the replacement on a kind change, goes through here.
struct BridgeHandles<'a> {
    registry: &'a mut NodeRegistry,
    textures: &'a mut TextureStore,
    stages: &'a mut Vec<StageEntry>,
}

impl BridgeHandles<'_> {
    fn bind(&mut self, node: NodeId, kind: NodeType) -> (HandleId, bool) {
        if let Some(h) = self.registry.handle_for(node) {
            if self.registry.get(h).is_some_and(|n| n.node_type() == kind) {
                return (h, false);
            }
            tracing::debug!(?node, ?kind, old = ?h, "node kind changed, replacing handle");
            self.destroy(h);
        }
        (self.registry.make_node(node, kind), true)
    }

    fn destroy(&mut self, handle: HandleId) {
        self.stages.retain(|s| s.handle != handle);
        if let Some(node) = self.registry.destroy(handle) {
            unlink_texture(self.textures, &node, handle);
        }
    }
}

impl HandleSource for BridgeHandles<'_> {
    fn ensure_handle(&mut self, node: NodeId, kind: NodeType) -> (HandleId, bool) {
        self.bind(node, kind)
    }
}

fn unlink_texture(textures: &mut TextureStore, node: &RenderNode, handle: HandleId) {
    if let NodeContent::Bitmap(b) = node.payload()
        && let Some(key) = &b.texture
    {
        textures.unlink(key, handle);
    }
}

struct StageFrame<'a> {
    handle: HandleId,
    target: &'a mut StageTarget,
    registry: &'a mut NodeRegistry,
    textures: &'a TextureStore,
    pool: &'a mut SurfacePool,
    clear_color: Option<Rgba8Premul>,
}

impl StagePass for StageFrame<'_> {
    fn update(&mut self) -> bool {
        let Some(node) = self.registry.get(self.handle) else {
            return false;
        };
        let NodeContent::Stage(rule) = node.payload() else {
            return false;
        };
        let mut changed = node.is_dirty() || self.target.transform_dirty;
        self.target.rule = *rule;
        self.target.clip = rule.content_clip();
        let (w, h) = rule.surface_size();
        if self.target.surface.size() != (w, h) {
            self.target.surface.resize(w, h, Some((0, 0)));
            changed = true;
        }
        changed
    }

    fn clear_transform_dirty(&mut self) {
        self.target.transform_dirty = false;
    }

    fn draw(&mut self) {
        let surface = &mut self.target.surface;
        surface.clear();
        surface.save();
        surface.reset_matrix();
        if let Some(c) = self.clear_color {
            let (w, h) = surface.size();
            surface.fill_rect(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)), c);
        }
        surface.transform(Affine::scale(self.target.rule.content_scale));
        surface.clip_rect(self.target.clip);
        let mut ctx = DrawCtx {
            registry: &mut *self.registry,
            textures: self.textures,
            pool: &mut *self.pool,
            settle: true,
        };
        ctx.draw_children(surface, self.handle);
        surface.restore();
    }

    fn present(&mut self) {
        if let Err(e) = self
            .target
            .screen
            .present(&self.target.surface, &self.target.rule)
        {
            tracing::warn!(stage = ?self.handle, error = %e, "present failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/bridge.rs"]
mod tests;
