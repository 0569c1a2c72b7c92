use smallvec::SmallVec;

use crate::foundation::core::{Affine, BlendMode, Rect};
use crate::foundation::error::{StageError, StageResult};
use crate::foundation::ids::{Arena, NodeId};
use crate::scene::props::{
    BitmapProps, DisplayProps, Filter, GraphicsCommand, NodeContent, NodeType, StageDisplayRule,
    TextFieldProps,
};
use crate::sync::dirty::{DirtyMask, DirtyTracker, DisplayDirty, GraphicsDirty};

/// Child list. Index 0 is drawn first (back-most).
pub type Children = SmallVec<[NodeId; 8]>;

/// One display object as the application sees it.
#[derive(Clone, Debug)]
pub struct DisplayNode {
    parent: Option<NodeId>,
    children: Children,
    props: DisplayProps,
    mask: Option<NodeId>,
    masked: SmallVec<[NodeId; 2]>,
    content: NodeContent,
}

impl DisplayNode {
    /// Parent, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in z-order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Generic attributes.
    pub fn props(&self) -> &DisplayProps {
        &self.props
    }

    /// Node whose coverage masks this one.
    pub fn mask(&self) -> Option<NodeId> {
        self.mask
    }

    /// Kind-specific content.
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// Kind tag.
    pub fn node_type(&self) -> NodeType {
        self.content.node_type()
    }
}

/// Application-side display tree.
///
/// Every setter records the changed attribute in the owned [`DirtyTracker`] and flags the
/// ancestors so a flush can skip clean subtrees. Setting an attribute to its current value
/// records nothing.
///
/// Operations on a destroyed [`NodeId`] are ignored, except topology changes, which report a
/// validation error.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Arena<NodeId, DisplayNode>,
    dirty: DirtyTracker,
}

impl SceneGraph {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node of `kind` with default content.
    pub fn create_node(&mut self, kind: NodeType) -> NodeId {
        self.create_with(NodeContent::for_type(kind))
    }

    /// Create a detached node with the given content.
    pub fn create_with(&mut self, content: NodeContent) -> NodeId {
        let kind = content.node_type();
        let id = self.nodes.insert(DisplayNode {
            parent: None,
            children: Children::new(),
            props: DisplayProps::default(),
            mask: None,
            masked: SmallVec::new(),
            content,
        });
        self.dirty.reset(id);
        self.dirty.mark_dirty(id, DirtyMask::full(kind));
        id
    }

    /// Create a detached stage root.
    pub fn create_stage(&mut self, rule: StageDisplayRule) -> NodeId {
        self.create_with(NodeContent::Stage(rule))
    }

    /// Detach `node` from its parent, orphan its children and free it.
    ///
    /// Returns `false` if the node was already gone.
    pub fn destroy(&mut self, node: NodeId) -> bool {
        let Some(n) = self.nodes.get(node) else {
            return false;
        };
        let parent = n.parent;
        let children = n.children.clone();
        let masked = n.masked.clone();
        if let Some(p) = parent {
            self.unlink(p, node);
        }
        for c in children {
            if let Some(child) = self.nodes.get_mut(c) {
                child.parent = None;
            }
        }
        for m in masked {
            self.set_mask(m, None);
        }
        self.set_mask(node, None);
        self.nodes.remove(node);
        self.dirty.reset(node);
        true
    }

    /// Returns `true` while `node` is alive.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Look up a node.
    pub fn get(&self, node: NodeId) -> Option<&DisplayNode> {
        self.nodes.get(node)
    }

    /// Children of `node` in z-order (empty for unknown nodes).
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.nodes.get(node).map_or(&[][..], |n| n.children.as_slice())
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` when the scene holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 0
    }

    /// Pending-change tracker.
    pub fn dirty(&self) -> &DirtyTracker {
        &self.dirty
    }

    pub(crate) fn dirty_mut(&mut self) -> &mut DirtyTracker {
        &mut self.dirty
    }

    /// Record a change on `node` and flag its ancestors.
    pub fn mark_dirty(&mut self, node: NodeId, bits: impl Into<DirtyMask>) {
        if !self.nodes.contains(node) {
            tracing::trace!(?node, "mark_dirty on destroyed node ignored");
            return;
        }
        self.dirty.mark_dirty(node, bits);
        self.flag_ancestors(node);
    }

    // A mask node counts as a descendant of every node it masks, so mask edits reach them even
    // when the mask itself is detached.
    fn flag_ancestors(&mut self, node: NodeId) {
        let mut pending: SmallVec<[NodeId; 8]> = SmallVec::new();
        self.push_upstream(node, &mut pending);
        while let Some(p) = pending.pop() {
            if !self.dirty.mark_descendant(p) {
                self.push_upstream(p, &mut pending);
            }
        }
    }

    fn push_upstream(&self, node: NodeId, out: &mut SmallVec<[NodeId; 8]>) {
        if let Some(n) = self.nodes.get(node) {
            out.extend(n.parent);
            out.extend(n.masked.iter().copied());
        }
    }

    // -- Topology --

    /// Append `child` on top of `parent`'s children, detaching it from any previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> StageResult<()> {
        let len = self.children(parent).len();
        self.add_child_at(parent, child, len)
    }

    /// Insert `child` at `index` (clamped) in `parent`'s children.
    pub fn add_child_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> StageResult<()> {
        self.check_alive(parent)?;
        self.check_alive(child)?;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(StageError::validation(
                "add_child would create a cycle in the display tree",
            ));
        }
        if let Some(old) = self.nodes.get(child).and_then(|n| n.parent) {
            self.unlink(old, child);
        }
        let Some(p) = self.nodes.get_mut(parent) else {
            return Ok(());
        };
        let index = index.min(p.children.len());
        p.children.insert(index, child);
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        self.mark_dirty(parent, DirtyMask::CHILDREN);
        if self.dirty.needs_visit(child) {
            self.flag_ancestors(child);
        }
        Ok(())
    }

    /// Detach `child` from `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> StageResult<()> {
        self.check_alive(parent)?;
        if self.nodes.get(child).and_then(|n| n.parent) != Some(parent) {
            return Err(StageError::validation("remove_child: not a child of parent"));
        }
        self.unlink(parent, child);
        Ok(())
    }

    /// Move `child` to `index` (clamped) within its parent.
    pub fn set_child_index(&mut self, parent: NodeId, child: NodeId, index: usize) -> StageResult<()> {
        self.check_alive(parent)?;
        let Some(p) = self.nodes.get_mut(parent) else {
            return Ok(());
        };
        let Some(pos) = p.children.iter().position(|&c| c == child) else {
            return Err(StageError::validation(
                "set_child_index: not a child of parent",
            ));
        };
        let index = index.min(p.children.len() - 1);
        if pos == index {
            return Ok(());
        }
        let c = p.children.remove(pos);
        p.children.insert(index, c);
        self.mark_dirty(parent, DirtyMask::CHILDREN);
        Ok(())
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|c| *c != child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
        self.mark_dirty(parent, DirtyMask::CHILDREN);
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.nodes.get(p).and_then(|n| n.parent);
        }
        false
    }

    fn check_alive(&self, node: NodeId) -> StageResult<()> {
        if self.nodes.contains(node) {
            Ok(())
        } else {
            Err(StageError::validation(format!("unknown node {node:?}")))
        }
    }

    // -- Generic attributes --

    fn update_props(
        &mut self,
        node: NodeId,
        bit: DisplayDirty,
        f: impl FnOnce(&mut DisplayProps) -> bool,
    ) {
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        if f(&mut n.props) {
            self.mark_dirty(node, bit);
        }
    }

    /// Set the local transform.
    pub fn set_matrix(&mut self, node: NodeId, matrix: Affine) {
        self.update_props(node, DisplayDirty::MATRIX, |p| {
            std::mem::replace(&mut p.matrix, matrix) != matrix
        });
    }

    /// Set the opacity.
    pub fn set_alpha(&mut self, node: NodeId, alpha: f32) {
        self.update_props(node, DisplayDirty::ALPHA, |p| {
            std::mem::replace(&mut p.alpha, alpha) != alpha
        });
    }

    /// Show or hide the subtree.
    pub fn set_visible(&mut self, node: NodeId, visible: bool) {
        self.update_props(node, DisplayDirty::VISIBLE, |p| {
            std::mem::replace(&mut p.visible, visible) != visible
        });
    }

    /// Set the compositing operator.
    pub fn set_blend_mode(&mut self, node: NodeId, mode: BlendMode) {
        self.update_props(node, DisplayDirty::BLEND_MODE, |p| {
            std::mem::replace(&mut p.blend_mode, mode) != mode
        });
    }

    /// Set or clear the scroll viewport.
    pub fn set_scroll_rect(&mut self, node: NodeId, rect: Option<Rect>) {
        self.update_props(node, DisplayDirty::SCROLL_RECT, |p| {
            std::mem::replace(&mut p.scroll_rect, rect) != rect
        });
    }

    /// Replace the filter list.
    pub fn set_filters(&mut self, node: NodeId, filters: Vec<Filter>) {
        self.update_props(node, DisplayDirty::FILTERS, |p| {
            if p.filters == filters {
                return false;
            }
            p.filters = filters;
            true
        });
    }

    /// Toggle subtree caching.
    pub fn set_cache_as_bitmap(&mut self, node: NodeId, cache: bool) {
        self.update_props(node, DisplayDirty::CACHE_AS_BITMAP, |p| {
            std::mem::replace(&mut p.cache_as_bitmap, cache) != cache
        });
    }

    /// Set or clear the rectangular clip.
    pub fn set_mask_rect(&mut self, node: NodeId, rect: Option<Rect>) {
        self.update_props(node, DisplayDirty::MASK_RECT, |p| {
            std::mem::replace(&mut p.mask_rect, rect) != rect
        });
    }

    /// Set or clear the mask node. A node cannot mask itself.
    pub fn set_mask(&mut self, node: NodeId, mask: Option<NodeId>) {
        if mask == Some(node) || mask.is_some_and(|m| !self.nodes.contains(m)) {
            tracing::debug!(?node, ?mask, "rejected mask reference");
            return;
        }
        let Some(n) = self.nodes.get_mut(node) else {
            return;
        };
        let old = std::mem::replace(&mut n.mask, mask);
        if old == mask {
            return;
        }
        if let Some(m) = old.and_then(|m| self.nodes.get_mut(m)) {
            m.masked.retain(|o| *o != node);
        }
        if let Some(m) = mask.and_then(|m| self.nodes.get_mut(m)) {
            m.masked.push(node);
        }
        self.mark_dirty(node, DisplayDirty::MASK);
        if let Some(m) = mask
            && self.dirty.needs_visit(m)
        {
            self.flag_ancestors(m);
        }
    }

    // -- Kind content --

    /// Replace a stage's display rule (window resize, DPI change).
    pub fn set_display_rule(&mut self, stage: NodeId, rule: StageDisplayRule) {
        let Some(NodeContent::Stage(cur)) = self.nodes.get_mut(stage).map(|n| &mut n.content)
        else {
            return;
        };
        let diff = cur.diff(&rule);
        *cur = rule;
        if !diff.is_empty() {
            self.mark_dirty(stage, diff);
        }
    }

    /// Edit a bitmap's content; changed fields are detected by comparison.
    pub fn update_bitmap(&mut self, node: NodeId, f: impl FnOnce(&mut BitmapProps)) {
        let Some(NodeContent::Bitmap(cur)) = self.nodes.get_mut(node).map(|n| &mut n.content)
        else {
            return;
        };
        let before = cur.clone();
        f(&mut *cur);
        let diff = before.diff(cur);
        if !diff.is_empty() {
            self.mark_dirty(node, diff);
        }
    }

    /// Edit a text field; changed fields are detected by comparison.
    pub fn update_text_field(&mut self, node: NodeId, f: impl FnOnce(&mut TextFieldProps)) {
        let Some(NodeContent::TextField(cur)) = self.nodes.get_mut(node).map(|n| &mut n.content)
        else {
            return;
        };
        let before = cur.clone();
        f(&mut *cur);
        let diff = before.diff(cur);
        if !diff.is_empty() {
            self.mark_dirty(node, diff);
        }
    }

    /// Append one drawing command.
    pub fn push_graphics(&mut self, node: NodeId, cmd: GraphicsCommand) {
        let Some(NodeContent::Graphics(g)) = self.nodes.get_mut(node).map(|n| &mut n.content)
        else {
            return;
        };
        g.commands.push(cmd);
        self.mark_dirty(node, GraphicsDirty::COMMANDS);
    }

    /// Drop every drawing command.
    pub fn clear_graphics(&mut self, node: NodeId) {
        let Some(NodeContent::Graphics(g)) = self.nodes.get_mut(node).map(|n| &mut n.content)
        else {
            return;
        };
        if g.commands.is_empty() {
            return;
        }
        g.commands.clear();
        self.mark_dirty(node, GraphicsDirty::COMMANDS);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/graph.rs"]
mod tests;
