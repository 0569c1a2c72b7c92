//! Per-node dirty bits.
//!
//! Each node kind owns its own bit group. Bit positions are part of the wire contract: the mask
//! written ahead of an update message is the raw value of the matching group, and the fields that
//! follow appear in ascending bit order.

use bitflags::bitflags;

use crate::foundation::ids::NodeId;
use crate::scene::props::NodeType;

bitflags! {
    /// Attributes shared by every display object.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct DisplayDirty: u32 {
        /// Local transform.
        const MATRIX = 1 << 0;
        /// Scroll viewport.
        const SCROLL_RECT = 1 << 1;
        /// Filter list.
        const FILTERS = 1 << 2;
        /// Visibility.
        const VISIBLE = 1 << 3;
        /// Subtree caching toggle.
        const CACHE_AS_BITMAP = 1 << 4;
        /// Opacity.
        const ALPHA = 1 << 5;
        /// Compositing operator.
        const BLEND_MODE = 1 << 6;
        /// Mask node reference.
        const MASK = 1 << 7;
        /// Rectangular clip.
        const MASK_RECT = 1 << 8;
    }
}

bitflags! {
    /// Stage display rule fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct StageDirty: u32 {
        /// Logical content width and height.
        const CONTENT_SIZE = 1 << 0;
        /// Placement on the physical screen.
        const DISPLAY_RECT = 1 << 1;
        /// Backing-store pixels per content unit.
        const CONTENT_SCALE = 1 << 2;
    }
}

bitflags! {
    /// Bitmap fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct BitmapDirty: u32 {
        /// Texture key and size.
        const BITMAP_DATA = 1 << 0;
        /// Scale, clip or repeat.
        const FILL_MODE = 1 << 1;
        /// Bilinear sampling toggle.
        const SMOOTHING = 1 << 2;
        /// Nine-slice grid.
        const SCALE9_GRID = 1 << 3;
    }
}

bitflags! {
    /// Vector graphics command list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct GraphicsDirty: u32 {
        /// The whole command list.
        const COMMANDS = 1 << 0;
    }
}

bitflags! {
    /// Text field fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
    pub struct TextFieldDirty: u32 {
        /// Text content.
        const TEXT = 1 << 0;
        /// Font family name.
        const FONT_FAMILY = 1 << 1;
        /// Font size.
        const FONT_SIZE = 1 << 2;
        /// Bold toggle.
        const BOLD = 1 << 3;
        /// Italic toggle.
        const ITALIC = 1 << 4;
        /// Glyph color.
        const TEXT_COLOR = 1 << 5;
        /// Horizontal alignment.
        const TEXT_ALIGN = 1 << 6;
        /// Vertical alignment.
        const VERTICAL_ALIGN = 1 << 7;
        /// Extra line spacing.
        const LINE_SPACING = 1 << 8;
        /// Glyph outline width.
        const STROKE = 1 << 9;
        /// Glyph outline color.
        const STROKE_COLOR = 1 << 10;
        /// Background fill toggle.
        const BACKGROUND = 1 << 11;
        /// Background color.
        const BACKGROUND_COLOR = 1 << 12;
        /// Border toggle.
        const BORDER = 1 << 13;
        /// Border color.
        const BORDER_COLOR = 1 << 14;
        /// Word wrapping toggle.
        const WORD_WRAP = 1 << 15;
        /// Input length limit.
        const MAX_CHARS = 1 << 16;
        /// Multiline toggle.
        const MULTILINE = 1 << 17;
        /// Input restriction pattern.
        const PATTERN = 1 << 18;
        /// Password masking toggle.
        const DISPLAY_AS_PASSWORD = 1 << 19;
        /// Input kind.
        const INPUT_TYPE = 1 << 20;
        /// Box size.
        const SIZE = 1 << 21;
    }
}

/// Everything pending for one node: every bit group plus the structural flag.
///
/// Only the group matching the node's kind is ever populated by the scene graph; the others stay
/// empty and are ignored by the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirtyMask {
    /// Generic display-object attributes.
    pub display: DisplayDirty,
    /// Stage display rule.
    pub stage: StageDirty,
    /// Bitmap fields.
    pub bitmap: BitmapDirty,
    /// Graphics command list.
    pub graphics: GraphicsDirty,
    /// Text field fields.
    pub text_field: TextFieldDirty,
    /// Child list membership or order changed.
    pub children: bool,
}

impl DirtyMask {
    /// No pending change.
    pub const EMPTY: Self = Self {
        display: DisplayDirty::empty(),
        stage: StageDirty::empty(),
        bitmap: BitmapDirty::empty(),
        graphics: GraphicsDirty::empty(),
        text_field: TextFieldDirty::empty(),
        children: false,
    };

    /// Structural change only.
    pub const CHILDREN: Self = Self {
        children: true,
        ..Self::EMPTY
    };

    /// Every bit a node of `kind` can carry; used for first synchronization.
    pub fn full(kind: NodeType) -> Self {
        let mut mask = Self {
            display: DisplayDirty::all(),
            children: true,
            ..Self::EMPTY
        };
        match kind {
            NodeType::Node => {}
            NodeType::Stage => mask.stage = StageDirty::all(),
            NodeType::Bitmap => mask.bitmap = BitmapDirty::all(),
            NodeType::Graphics => mask.graphics = GraphicsDirty::all(),
            NodeType::TextField => mask.text_field = TextFieldDirty::all(),
        }
        mask
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Bitwise union.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            display: self.display | other.display,
            stage: self.stage | other.stage,
            bitmap: self.bitmap | other.bitmap,
            graphics: self.graphics | other.graphics,
            text_field: self.text_field | other.text_field,
            children: self.children || other.children,
        }
    }
}

macro_rules! mask_from_group {
    ($group:ty, $field:ident) => {
        impl From<$group> for DirtyMask {
            fn from(bits: $group) -> Self {
                Self {
                    $field: bits,
                    ..Self::EMPTY
                }
            }
        }
    };
}

mask_from_group!(DisplayDirty, display);
mask_from_group!(StageDirty, stage);
mask_from_group!(BitmapDirty, bitmap);
mask_from_group!(GraphicsDirty, graphics);
mask_from_group!(TextFieldDirty, text_field);

/// Pending-change masks indexed by node slot.
///
/// Bits are cleared only by [`DirtyTracker::drain`]. A skipped or failed frame leaves them set, so
/// the next flush still carries the change.
///
/// The tracker addresses nodes by slot and does not check generations; the owning
/// [`SceneGraph`](crate::SceneGraph) resets a slot whenever it is reused.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    masks: Vec<DirtyMask>,
    descendants: Vec<bool>,
}

impl DirtyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, node: NodeId) -> usize {
        let i = node.index() as usize;
        if i >= self.masks.len() {
            self.masks.resize(i + 1, DirtyMask::EMPTY);
            self.descendants.resize(i + 1, false);
        }
        i
    }

    /// Set `bits` on `node`. Setting an already-set bit changes nothing.
    pub fn mark_dirty(&mut self, node: NodeId, bits: impl Into<DirtyMask>) {
        let i = self.slot(node);
        self.masks[i] = self.masks[i].union(bits.into());
    }

    /// Return the pending mask of `node` and clear it.
    pub fn drain(&mut self, node: NodeId) -> DirtyMask {
        match self.masks.get_mut(node.index() as usize) {
            Some(mask) => std::mem::take(mask),
            None => DirtyMask::EMPTY,
        }
    }

    /// Pending mask without clearing it.
    pub fn peek(&self, node: NodeId) -> DirtyMask {
        self.masks
            .get(node.index() as usize)
            .copied()
            .unwrap_or_default()
    }

    /// Returns `true` when `node` or anything below it has pending changes.
    pub fn needs_visit(&self, node: NodeId) -> bool {
        let i = node.index() as usize;
        self.masks.get(i).is_some_and(|m| !m.is_empty())
            || self.descendants.get(i).copied().unwrap_or(false)
    }

    /// Flag that some descendant of `node` is dirty. Returns the previous flag value.
    pub(crate) fn mark_descendant(&mut self, node: NodeId) -> bool {
        let i = self.slot(node);
        std::mem::replace(&mut self.descendants[i], true)
    }

    pub(crate) fn take_descendant(&mut self, node: NodeId) -> bool {
        match self.descendants.get_mut(node.index() as usize) {
            Some(flag) => std::mem::take(flag),
            None => false,
        }
    }

    pub(crate) fn reset(&mut self, node: NodeId) {
        let i = self.slot(node);
        self.masks[i] = DirtyMask::EMPTY;
        self.descendants[i] = false;
    }

    /// Number of nodes with a non-empty mask.
    pub fn pending_count(&self) -> usize {
        self.masks.iter().filter(|m| !m.is_empty()).count()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sync/dirty.rs"]
mod tests;
