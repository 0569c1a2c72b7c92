//! Backend render nodes and the handle table that binds them to scene nodes.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::foundation::core::Affine;
use crate::foundation::ids::{Arena, HandleId, NodeId};
use crate::render::surface::RenderBuffer;
use crate::render::texture::TextureStore;
use crate::scene::props::{DisplayProps, NodeContent, NodeType};
use crate::sync::dirty::DisplayDirty;
use crate::sync::protocol::Message;

/// Display fields that change only how a node is composited onto its parent, not what it
/// renders into its own cache.
const COMPOSITE_ONLY: DisplayDirty = DisplayDirty::MATRIX
    .union(DisplayDirty::ALPHA)
    .union(DisplayDirty::VISIBLE)
    .union(DisplayDirty::BLEND_MODE);

/// Backend mirror of one display node.
#[derive(Debug)]
pub struct RenderNode {
    owner: NodeId,
    pub(crate) parent: Option<HandleId>,
    pub(crate) children: SmallVec<[HandleId; 8]>,
    pub(crate) props: DisplayProps,
    pub(crate) mask: Option<HandleId>,
    mask_owners: SmallVec<[HandleId; 2]>,
    pub(crate) payload: NodeContent,
    pub(crate) cache: Option<RenderBuffer>,
    pub(crate) cache_matrix: Affine,
    pub(crate) dirty: bool,
}

impl RenderNode {
    fn new(owner: NodeId, kind: NodeType) -> Self {
        Self {
            owner,
            parent: None,
            children: SmallVec::new(),
            props: DisplayProps::default(),
            mask: None,
            mask_owners: SmallVec::new(),
            payload: NodeContent::for_type(kind),
            cache: None,
            cache_matrix: Affine::IDENTITY,
            dirty: true,
        }
    }

    /// Scene node this render node mirrors.
    pub fn owner(&self) -> NodeId {
        self.owner
    }

    /// Parent handle, if attached.
    pub fn parent(&self) -> Option<HandleId> {
        self.parent
    }

    /// Child handles, back to front.
    pub fn children(&self) -> &[HandleId] {
        &self.children
    }

    /// Generic attributes as last applied.
    pub fn props(&self) -> &DisplayProps {
        &self.props
    }

    /// Mask handle.
    pub fn mask(&self) -> Option<HandleId> {
        self.mask
    }

    /// Kind content as last applied.
    pub fn payload(&self) -> &NodeContent {
        &self.payload
    }

    /// Kind of the payload.
    pub fn node_type(&self) -> NodeType {
        self.payload.node_type()
    }

    /// Returns `true` when the node or something below it changed since it was last drawn.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns `true` when a cached rendering is held.
    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }
}

/// Handle table for backend render nodes.
///
/// Each scene node has at most one live handle. Handles are generational, so a handle kept after
/// [`NodeRegistry::destroy`] never resolves again, even when its slot is reused.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Arena<HandleId, RenderNode>,
    by_owner: HashMap<NodeId, HandleId>,
}

impl NodeRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `owner` with a payload of `kind`.
    ///
    /// Returns the existing handle when its kind matches; a handle of another kind is destroyed
    /// and replaced. State keyed by handle outside the registry, such as texture links, is left
    /// alone; [`crate::RenderBridge::make_node`] clears that too.
    pub fn make_node(&mut self, owner: NodeId, kind: NodeType) -> HandleId {
        if let Some(&h) = self.by_owner.get(&owner) {
            match self.nodes.get(h) {
                Some(n) if n.node_type() == kind => return h,
                Some(n) => {
                    tracing::debug!(?owner, old = ?n.node_type(), new = ?kind, "node kind changed, replacing handle");
                    self.destroy(h);
                }
                None => {}
            }
        }
        let h = self.nodes.insert(RenderNode::new(owner, kind));
        self.by_owner.insert(owner, h);
        tracing::trace!(?owner, handle = ?h, ?kind, "render node created");
        h
    }

    /// Live handle bound to `owner`.
    pub fn handle_for(&self, owner: NodeId) -> Option<HandleId> {
        self.by_owner
            .get(&owner)
            .copied()
            .filter(|h| self.nodes.contains(*h))
    }

    /// Destroy `handle`, detaching it from its parent, children and mask relations. Returns the
    /// removed node; a stale handle returns `None`.
    pub fn destroy(&mut self, handle: HandleId) -> Option<RenderNode> {
        let node = self.nodes.remove(handle)?;
        if self.by_owner.get(&node.owner) == Some(&handle) {
            self.by_owner.remove(&node.owner);
        }
        if let Some(p) = node.parent
            && let Some(parent) = self.nodes.get_mut(p)
        {
            parent.children.retain(|c| *c != handle);
            self.invalidate(p);
        }
        for &c in &node.children {
            if let Some(child) = self.nodes.get_mut(c)
                && child.parent == Some(handle)
            {
                child.parent = None;
            }
        }
        if let Some(m) = node.mask
            && let Some(mask) = self.nodes.get_mut(m)
        {
            mask.mask_owners.retain(|o| *o != handle);
        }
        for &o in &node.mask_owners {
            if let Some(owner) = self.nodes.get_mut(o)
                && owner.mask == Some(handle)
            {
                owner.mask = None;
                self.invalidate(o);
            }
        }
        tracing::trace!(handle = ?handle, "render node destroyed");
        Some(node)
    }

    /// Returns `true` if `handle` is live.
    pub fn contains(&self, handle: HandleId) -> bool {
        self.nodes.contains(handle)
    }

    /// Node behind `handle`.
    pub fn get(&self, handle: HandleId) -> Option<&RenderNode> {
        self.nodes.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: HandleId) -> Option<&mut RenderNode> {
        self.nodes.get_mut(handle)
    }

    /// Live node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when no node is live.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Mark `handle` and everything that composites it as needing a redraw: the parent chain,
    /// plus the nodes it masks and their chains.
    pub fn invalidate(&mut self, handle: HandleId) {
        let mut work: SmallVec<[HandleId; 16]> = SmallVec::new();
        work.push(handle);
        // Bounded so a cyclic stream cannot spin forever.
        let mut budget = self.nodes.len() * 2 + 1;
        while let Some(h) = work.pop() {
            if budget == 0 {
                tracing::warn!("invalidation budget exhausted, render tree is cyclic");
                break;
            }
            budget -= 1;
            let Some(node) = self.nodes.get_mut(h) else {
                continue;
            };
            node.dirty = true;
            work.extend(node.mask_owners.iter().copied());
            if let Some(p) = node.parent {
                work.push(p);
            }
        }
    }

    fn invalidate_parent(&mut self, handle: HandleId) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };
        let upstream: SmallVec<[HandleId; 4]> = node
            .parent
            .into_iter()
            .chain(node.mask_owners.iter().copied())
            .collect();
        for h in upstream {
            self.invalidate(h);
        }
    }

    /// Apply one decoded message. `DrawToBitmap` is not a node update and is ignored here.
    ///
    /// Messages for stale handles, or whose payload kind does not match the node, are skipped.
    pub fn apply(&mut self, msg: &Message, textures: &mut TextureStore) {
        let target = msg.target();
        let Some(node) = self.nodes.get_mut(target) else {
            tracing::trace!(?target, tag = ?msg.tag(), "message for stale handle skipped");
            return;
        };
        match msg {
            Message::UpdateDisplayObject { update, .. } => {
                node.props.apply(update.dirty, &update.props);
                if !node.props.cache_as_bitmap {
                    node.cache = None;
                }
                let mask_changed =
                    update.dirty.contains(DisplayDirty::MASK) && node.mask != update.mask;
                if mask_changed {
                    let old = node.mask;
                    self.set_mask(target, old, update.mask);
                }
                if COMPOSITE_ONLY.contains(update.dirty) && !mask_changed {
                    self.invalidate_parent(target);
                } else {
                    self.invalidate(target);
                }
            }
            Message::UpdateChildren { children, .. } => {
                let old = std::mem::take(&mut node.children);
                self.set_children(target, &old, children);
                self.invalidate(target);
            }
            Message::UpdateStage { dirty, rule, .. } => {
                let NodeContent::Stage(cur) = &mut node.payload else {
                    return kind_mismatch(target, msg);
                };
                cur.apply(*dirty, rule);
                self.invalidate(target);
            }
            Message::UpdateBitmap { dirty, props, .. } => {
                let NodeContent::Bitmap(cur) = &mut node.payload else {
                    return kind_mismatch(target, msg);
                };
                let old_key = cur.texture.clone();
                cur.apply(*dirty, props);
                if old_key != cur.texture {
                    if let Some(k) = &old_key {
                        textures.unlink(k, target);
                    }
                    if let Some(k) = &cur.texture {
                        textures.link(k, target);
                    }
                }
                self.invalidate(target);
            }
            Message::UpdateGraphics { commands, .. } => {
                let NodeContent::Graphics(cur) = &mut node.payload else {
                    return kind_mismatch(target, msg);
                };
                cur.commands.clone_from(commands);
                self.invalidate(target);
            }
            Message::UpdateTextField { dirty, props, .. } => {
                let NodeContent::TextField(cur) = &mut node.payload else {
                    return kind_mismatch(target, msg);
                };
                cur.apply(*dirty, props);
                self.invalidate(target);
            }
            Message::DrawToBitmap { .. } => {}
        }
    }

    fn set_mask(&mut self, target: HandleId, old: Option<HandleId>, new: Option<HandleId>) {
        if let Some(m) = old
            && let Some(mask) = self.nodes.get_mut(m)
        {
            mask.mask_owners.retain(|o| *o != target);
        }
        let new = new.filter(|m| *m != target && self.nodes.contains(*m));
        if let Some(m) = new
            && let Some(mask) = self.nodes.get_mut(m)
            && !mask.mask_owners.contains(&target)
        {
            mask.mask_owners.push(target);
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.mask = new;
        }
    }

    fn set_children(&mut self, target: HandleId, old: &[HandleId], new: &[HandleId]) {
        for &c in old {
            if !new.contains(&c)
                && let Some(child) = self.nodes.get_mut(c)
                && child.parent == Some(target)
            {
                child.parent = None;
            }
        }
        let mut kept: SmallVec<[HandleId; 8]> = SmallVec::with_capacity(new.len());
        for &c in new {
            if c == target || kept.contains(&c) {
                continue;
            }
            let Some(child) = self.nodes.get_mut(c) else {
                tracing::trace!(parent = ?target, child = ?c, "stale child handle skipped");
                continue;
            };
            let prev = child.parent.replace(target);
            if let Some(p) = prev
                && p != target
                && let Some(prev_parent) = self.nodes.get_mut(p)
            {
                prev_parent.children.retain(|h| *h != c);
            }
            kept.push(c);
        }
        if let Some(node) = self.nodes.get_mut(target) {
            node.children = kept;
        }
    }
}

fn kind_mismatch(target: HandleId, msg: &Message) {
    tracing::trace!(?target, tag = ?msg.tag(), "message does not match node kind, skipped");
}

#[cfg(test)]
#[path = "../../tests/unit/render/registry.rs"]
mod tests;
