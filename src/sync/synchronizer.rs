//! Scene-to-wire flush.

use std::collections::HashSet;

use smallvec::SmallVec;

use crate::foundation::core::Affine;
use crate::foundation::ids::{HandleId, NodeId};
use crate::scene::graph::SceneGraph;
use crate::scene::props::{NodeContent, NodeType};
use crate::sync::dirty::{DirtyMask, DisplayDirty};
use crate::sync::protocol::{
    DrawRequest, encode_bitmap, encode_children, encode_display_object, encode_draw_to_bitmap,
    encode_graphics, encode_stage, encode_text_field,
};
use crate::sync::wire::WireBuffer;

/// Source of backend handles for scene nodes.
pub trait HandleSource {
    /// Handle bound to `node`, creating one for `kind` when there is none. The flag is `true`
    /// when the handle was created by this call.
    fn ensure_handle(&mut self, node: NodeId, kind: NodeType) -> (HandleId, bool);
}

/// Queued request to render a node's subtree into a texture.
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapDraw {
    /// Subtree root.
    pub source: NodeId,
    /// Texture key the result is registered under.
    pub texture: String,
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Transform applied on top of the source's own matrix.
    pub matrix: Affine,
}

/// Counters for one flush.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Nodes visited.
    pub visited: u32,
    /// Messages written, excluding the terminator.
    pub messages: u32,
    /// Handles created during the flush.
    pub new_handles: u32,
}

/// Walks dirty parts of a [`SceneGraph`] and writes their changes into a [`WireBuffer`].
///
/// Per node the order is: child list, generic attributes, kind content. The mask node, if any,
/// follows the node that references it; children follow in z-order. Clean subtrees are skipped.
/// A node whose handle is new is sent in full together with its entire subtree.
#[derive(Debug, Default)]
pub struct Synchronizer {
    stack: Vec<NodeId>,
    visited: HashSet<NodeId>,
    fresh: HashSet<NodeId>,
}

impl Synchronizer {
    /// Create a synchronizer with empty scratch state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flush the subtree under `root`, then `draws`, then terminate the buffer.
    ///
    /// A destroyed `root` writes only the terminator.
    #[tracing::instrument(level = "trace", skip_all, fields(root = ?root))]
    pub fn flush(
        &mut self,
        scene: &mut SceneGraph,
        handles: &mut dyn HandleSource,
        root: NodeId,
        draws: &[BitmapDraw],
        buf: &mut WireBuffer,
    ) -> SyncStats {
        self.visited.clear();
        self.fresh.clear();
        let mut stats = SyncStats::default();

        self.walk(scene, handles, root, buf, &mut stats);
        for draw in draws {
            self.walk(scene, handles, draw.source, buf, &mut stats);
            let Some(kind) = scene.get(draw.source).map(|n| n.node_type()) else {
                tracing::trace!(source = ?draw.source, "draw request for destroyed node skipped");
                continue;
            };
            let (source, _) = handles.ensure_handle(draw.source, kind);
            encode_draw_to_bitmap(
                buf,
                source,
                &DrawRequest {
                    texture: draw.texture.clone(),
                    width: draw.width,
                    height: draw.height,
                    matrix: draw.matrix,
                },
            );
            stats.messages += 1;
        }
        buf.finish();
        tracing::trace!(?stats, bytes = buf.len(), "flush done");
        stats
    }

    fn ensure(
        &mut self,
        handles: &mut dyn HandleSource,
        node: NodeId,
        kind: NodeType,
        stats: &mut SyncStats,
    ) -> HandleId {
        let (h, created) = handles.ensure_handle(node, kind);
        if created {
            self.fresh.insert(node);
            stats.new_handles += 1;
        }
        h
    }

    fn walk(
        &mut self,
        scene: &mut SceneGraph,
        handles: &mut dyn HandleSource,
        root: NodeId,
        buf: &mut WireBuffer,
        stats: &mut SyncStats,
    ) {
        self.stack.clear();
        self.stack.push(root);
        while let Some(node) = self.stack.pop() {
            if !self.visited.insert(node) {
                continue;
            }
            self.visit(scene, handles, node, buf, stats);
        }
    }

    fn visit(
        &mut self,
        scene: &mut SceneGraph,
        handles: &mut dyn HandleSource,
        node: NodeId,
        buf: &mut WireBuffer,
        stats: &mut SyncStats,
    ) {
        let Some(kind) = scene.get(node).map(|n| n.node_type()) else {
            tracing::trace!(?node, "stale node skipped");
            return;
        };
        stats.visited += 1;
        let handle = self.ensure(handles, node, kind, stats);
        let whole = self.fresh.contains(&node);

        let dirty = scene.dirty_mut();
        let mut mask = dirty.drain(node);
        dirty.take_descendant(node);
        if whole {
            mask = mask.union(DirtyMask::full(kind));
        }

        let Some(n) = scene.get(node) else {
            return;
        };

        // A new backend node starts with no children.
        if mask.children && !(whole && n.children().is_empty()) {
            let child_handles: SmallVec<[HandleId; 8]> = n
                .children()
                .iter()
                .filter_map(|&c| {
                    let kind = scene.get(c)?.node_type();
                    Some(self.ensure(handles, c, kind, stats))
                })
                .collect();
            encode_children(buf, handle, &child_handles);
            stats.messages += 1;
        }

        let mask_node = n.mask();
        if !mask.display.is_empty() {
            let mask_handle = if mask.display.contains(DisplayDirty::MASK) {
                mask_node.and_then(|m| {
                    let kind = scene.get(m)?.node_type();
                    Some(self.ensure(handles, m, kind, stats))
                })
            } else {
                None
            };
            encode_display_object(buf, handle, mask.display, n.props(), mask_handle);
            stats.messages += 1;
        }

        let wrote = match n.content() {
            NodeContent::Node => false,
            NodeContent::Stage(rule) if !mask.stage.is_empty() => {
                encode_stage(buf, handle, mask.stage, rule);
                true
            }
            NodeContent::Bitmap(props) if !mask.bitmap.is_empty() => {
                encode_bitmap(buf, handle, mask.bitmap, props);
                true
            }
            NodeContent::Graphics(g) if !mask.graphics.is_empty() => {
                encode_graphics(buf, handle, &g.commands);
                true
            }
            NodeContent::TextField(props) if !mask.text_field.is_empty() => {
                encode_text_field(buf, handle, mask.text_field, props);
                true
            }
            _ => false,
        };
        if wrote {
            stats.messages += 1;
        }

        // Stack order: children pushed last-first, mask on top so it is visited next.
        let tracker = scene.dirty();
        for &c in n.children().iter().rev() {
            if whole || self.fresh.contains(&c) || tracker.needs_visit(c) {
                self.stack.push(c);
            }
        }
        if let Some(m) = mask_node
            && (self.fresh.contains(&m) || tracker.needs_visit(m))
        {
            self.stack.push(m);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/synchronizer.rs"]
mod tests;
